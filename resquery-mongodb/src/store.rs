use async_trait::async_trait;
use bson::{Document, doc, oid::ObjectId};
use futures::TryStreamExt;
use log::debug;
use mongodb::{
    Client, Collection as MongoCollection,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{ClientOptions, FindOptions},
};
use resquery_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{ResourceError, ResourceResult},
    query::{Projection, Query, QueryVisitor},
    schema::ID_FIELD,
};

use crate::query::{MongoQueryTranslator, projection_document, sort_document};

const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }
}

fn backend_error(e: MongoError) -> ResourceError {
    ResourceError::Backend(e.to_string())
}

/// Index of the first document rejected with a duplicate key, if any.
fn duplicate_key_index(e: &MongoError) -> Option<usize> {
    match e.kind.as_ref() {
        ErrorKind::InsertMany(failure) => failure
            .write_errors
            .as_ref()?
            .iter()
            .find(|write_error| write_error.code == DUPLICATE_KEY)
            .map(|write_error| write_error.index),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY => Some(0),
        _ => None,
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn insert_documents(&self, documents: Vec<Document>, collection: &str) -> ResourceResult<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let ids = documents
            .iter()
            .map(|doc| doc.get(ID_FIELD).map(ToString::to_string).unwrap_or_default())
            .collect::<Vec<_>>();

        self.get_collection(collection)
            .insert_many(documents)
            .await
            .map_err(|e| match duplicate_key_index(&e) {
                Some(index) => ResourceError::DocumentAlreadyExists(
                    ids.get(index).cloned().unwrap_or_default(),
                    collection.to_string(),
                ),
                None => backend_error(e),
            })?;

        Ok(())
    }

    async fn delete_documents(&self, ids: Vec<ObjectId>, collection: &str) -> ResourceResult<()> {
        let result = self
            .get_collection(collection)
            .delete_many(doc! { ID_FIELD: { "$in": ids } })
            .await
            .map_err(backend_error)?;

        debug!("deleted {} documents from {collection}", result.deleted_count);

        Ok(())
    }

    async fn get_documents(
        &self,
        ids: Vec<ObjectId>,
        collection: &str,
        projection: Option<Projection>,
    ) -> ResourceResult<Vec<Document>> {
        let mut options = FindOptions::default();
        options.projection = projection
            .as_ref()
            .filter(|projection| !projection.is_empty())
            .map(projection_document);

        self.get_collection(collection)
            .find(doc! { ID_FIELD: { "$in": ids } })
            .with_options(options)
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)
    }

    async fn query_documents(&self, query: Query, collection: &str) -> ResourceResult<Vec<Document>> {
        let mut options = FindOptions::default();

        if let Some(limit) = query.limit {
            options.limit = Some(limit);
        }
        // The driver takes an unsigned offset; negative values mean no offset.
        if let Some(skip) = query.skip {
            options.skip = Some(skip.max(0) as u64);
        }
        if !query.sort.is_empty() {
            options.sort = Some(sort_document(&query.sort));
        }
        options.projection = query
            .projection
            .as_ref()
            .filter(|projection| !projection.is_empty())
            .map(projection_document);

        let filter = match &query.filter {
            Some(expr) => MongoQueryTranslator.visit_expr(expr)?,
            None => doc! {},
        };

        self.get_collection(collection)
            .find(filter)
            .with_options(options)
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)
    }

    async fn create_collection(&self, name: &str) -> ResourceResult<()> {
        self.client
            .database(&self.database)
            .create_collection(name)
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> ResourceResult<()> {
        if !self.list_collections().await?.iter().any(|existing| existing == name) {
            return Err(ResourceError::CollectionNotFound(name.to_string()));
        }

        self.get_collection(name)
            .drop()
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn list_collections(&self) -> ResourceResult<Vec<String>> {
        let mut names = self
            .client
            .database(&self.database)
            .list_collection_names()
            .await
            .map_err(backend_error)?;
        names.sort();

        Ok(names)
    }

    async fn shutdown(self) -> ResourceResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> ResourceResult<Self::Backend> {
        Ok(MongoDbStore::new(
            Client::with_options(
                ClientOptions::parse(&self.dsn)
                    .await
                    .map_err(|e| ResourceError::Initialization(e.to_string()))?,
            )
            .map_err(|e| ResourceError::Initialization(e.to_string()))?,
            self.database,
        ))
    }
}

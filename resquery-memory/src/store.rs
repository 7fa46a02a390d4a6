//! In-memory storage implementation for the resource layer.
//!
//! This module provides a simple in-memory backend that stores documents in ordered
//! maps keyed by their `_id`, guarded by async-safe read-write locks.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use bson::{Document, oid::ObjectId};
use log::debug;
use mea::rwlock::RwLock;

use resquery_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{ResourceError, ResourceResult},
    query::{Projection, Query, SortDirection},
    schema::ID_FIELD,
};

use crate::{
    evaluator::{DocumentEvaluator, first_value, sort_order},
    projection::apply_projection,
};

type CollectionMap = BTreeMap<ObjectId, Document>;
type StoreMap = HashMap<String, CollectionMap>;

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, so clones share
/// the same data. Queries scan the whole collection; unsorted results come back in `_id`
/// order.
///
/// # Example
///
/// ```ignore
/// use resquery_memory::InMemoryStore;
/// use resquery::backend::StoreBackend;
/// use bson::{doc, oid::ObjectId};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = InMemoryStore::new();
///
///     let id = ObjectId::new();
///     store.insert_documents(vec![doc! { "_id": id, "name": "Alice" }], "users").await?;
///
///     let docs = store.get_documents(vec![id], "users", None).await?;
///     assert_eq!(docs.len(), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> (document id -> document)
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self { store: Arc::new(RwLock::new(StoreMap::new())) }
    }

    /// Creates a builder, optionally seeding collections with documents.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }
}

fn document_id(document: &Document, collection: &str) -> ResourceResult<ObjectId> {
    document.get_object_id(ID_FIELD).map_err(|_| {
        ResourceError::InvalidArgument(format!("document in {collection} has no ObjectId {ID_FIELD}"))
    })
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_documents(&self, documents: Vec<Document>, collection: &str) -> ResourceResult<()> {
        let mut store = self.store.write().await;
        let collection_map = store
            .entry(collection.to_string())
            .or_default();

        let mut staged = Vec::with_capacity(documents.len());
        for doc in documents {
            let id = document_id(&doc, collection)?;

            if collection_map.contains_key(&id) || staged.iter().any(|(staged_id, _)| *staged_id == id) {
                return Err(ResourceError::DocumentAlreadyExists(id.to_hex(), collection.to_string()));
            }

            staged.push((id, doc));
        }

        collection_map.extend(staged);

        Ok(())
    }

    async fn delete_documents(&self, ids: Vec<ObjectId>, collection: &str) -> ResourceResult<()> {
        let mut store = self.store.write().await;

        if let Some(collection_map) = store.get_mut(collection) {
            for id in ids {
                if collection_map.remove(&id).is_none() {
                    debug!("{id} not found in {collection}, nothing to delete");
                }
            }
        }

        Ok(())
    }

    async fn get_documents(
        &self,
        ids: Vec<ObjectId>,
        collection: &str,
        projection: Option<Projection>,
    ) -> ResourceResult<Vec<Document>> {
        let store = self.store.read().await;
        let Some(collection_map) = store.get(collection) else {
            return Ok(vec![]);
        };

        Ok(ids
            .iter()
            .filter_map(|id| collection_map.get(id))
            .map(|doc| match &projection {
                Some(projection) => apply_projection(doc.clone(), projection),
                None => doc.clone(),
            })
            .collect())
    }

    async fn query_documents(&self, query: Query, collection: &str) -> ResourceResult<Vec<Document>> {
        let store = self.store.read().await;
        let Some(collection_map) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut documents = match &query.filter {
            Some(filter) => DocumentEvaluator::filter_documents(collection_map.values(), filter)?,
            None => collection_map.values().cloned().collect(),
        };

        if !query.sort.is_empty() {
            documents.sort_by(|a, b| {
                query
                    .sort
                    .iter()
                    .map(|sort| {
                        let ordering = sort_order(first_value(a, &sort.field), first_value(b, &sort.field));
                        match sort.direction {
                            SortDirection::Asc => ordering,
                            SortDirection::Desc => ordering.reverse(),
                        }
                    })
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        // Negative offsets are treated as no offset.
        let skip = query.skip.unwrap_or(0).max(0) as usize;
        let limit = match query.limit {
            Some(limit) if limit > 0 => limit as usize,
            _ => usize::MAX,
        };

        Ok(documents
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|doc| match &query.projection {
                Some(projection) => apply_projection(doc, projection),
                None => doc,
            })
            .collect())
    }

    async fn create_collection(&self, name: &str) -> ResourceResult<()> {
        self.store
            .write()
            .await
            .entry(name.to_string())
            .or_default();

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> ResourceResult<()> {
        let mut store = self.store.write().await;

        if store.remove(name).is_none() {
            return Err(ResourceError::CollectionNotFound(name.to_string()));
        }

        Ok(())
    }

    async fn list_collections(&self) -> ResourceResult<Vec<String>> {
        let mut names = self
            .store
            .read()
            .await
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        names.sort();

        Ok(names)
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use resquery_memory::InMemoryStore;
/// use resquery::backend::StoreBackendBuilder;
///
/// #[tokio::main]
/// async fn main() {
///     let store = InMemoryStore::builder()
///         .with_documents("users", vec![doc! { "_id": ObjectId::new(), "name": "Alice" }])
///         .build()
///         .await
///         .unwrap();
/// }
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder {
    seed: Vec<(String, Vec<Document>)>,
}

impl InMemoryStoreBuilder {
    /// Adds documents to insert into `collection` when the store is built.
    pub fn with_documents(mut self, collection: impl Into<String>, documents: Vec<Document>) -> Self {
        self.seed.push((collection.into(), documents));
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds the store and inserts the seeded documents.
    ///
    /// # Errors
    ///
    /// Fails like [`StoreBackend::insert_documents`] for documents without an ObjectId
    /// `_id` or with duplicate ids.
    async fn build(self) -> ResourceResult<Self::Backend> {
        let store = InMemoryStore::new();

        for (collection, documents) in self.seed {
            store.insert_documents(documents, &collection).await?;
        }

        Ok(store)
    }
}

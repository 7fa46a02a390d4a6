//! Collection handle bound to a backend and a schema.
//!
//! A [`Collection`] executes compiled queries (including their shallow population
//! directives) and performs the writes the resource layer needs: inserts that fill in
//! identifiers and timestamps, and deletes that leave a journal entry behind.
//!
//! # Example
//!
//! ```ignore
//! use resquery::prelude::*;
//!
//! # async fn example(store: &ResourceStore<InMemoryStore>) -> ResourceResult<()> {
//! let users = store.collection("user")?;
//! let ids = users.insert(vec![doc! { "name": "Alice" }]).await?;
//! users.delete(ids).await?;
//! # Ok(()) }
//! ```

use bson::{Bson, DateTime, Document, oid::ObjectId, ser::serialize_to_bson};
use log::{debug, warn};
use serde::Serialize;

use crate::{
    backend::StoreBackend,
    config::ResourceConfig,
    error::{ResourceError, ResourceResult},
    journal::DeleteJournal,
    populate::populate_path,
    query::{Projection, Query},
    schema::{ID_FIELD, Schema},
};

const CREATED_FIELD: &str = "created";
const UPDATED_FIELD: &str = "updated";

/// A collection with a reference to its schema and a storage backend.
///
/// # Type Parameters
///
/// * `'a` - Lifetime of the store the collection was obtained from
/// * `B` - The storage backend type
#[derive(Debug)]
pub struct Collection<'a, B: StoreBackend> {
    schema: &'a Schema,
    backend: &'a B,
    config: &'a ResourceConfig,
}

impl<'a, B: StoreBackend> Collection<'a, B> {
    pub(crate) fn new(schema: &'a Schema, backend: &'a B, config: &'a ResourceConfig) -> Self {
        Self { schema, backend, config }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        self.schema.name()
    }

    pub fn schema(&self) -> &Schema {
        self.schema
    }

    /// Executes a query, then runs its populate directives over the result.
    ///
    /// Each directive with a known target costs one batched fetch. Directives without a
    /// target are skipped.
    ///
    /// # Errors
    ///
    /// Returns the backend error of the query or of the first failing fetch.
    pub async fn exec(&self, mut query: Query) -> ResourceResult<Vec<Document>> {
        let directives = std::mem::take(&mut query.populate);
        let mut documents = self
            .backend
            .query_documents(query, self.name())
            .await?;
        debug!("{} returned {} documents", self.name(), documents.len());

        if documents.is_empty() {
            return Ok(documents);
        }

        for directive in directives {
            match directive.target.as_deref() {
                Some(target) => {
                    populate_path(
                        self.backend,
                        &mut documents,
                        &directive.path,
                        target,
                        directive.projection.clone(),
                        None,
                    )
                    .await?;
                }
                None => warn!("cannot populate {} of {}: no reference target", directive.path, self.name()),
            }
        }

        Ok(documents)
    }

    /// Retrieves documents by their IDs. Unknown IDs are omitted.
    pub async fn get(&self, ids: Vec<ObjectId>, projection: Option<Projection>) -> ResourceResult<Vec<Document>> {
        self.backend
            .get_documents(ids, self.name(), projection)
            .await
    }

    /// Inserts documents, assigning an `_id` where missing and filling the timestamps the
    /// schema declares.
    ///
    /// Returns the IDs of the inserted documents, in order.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::InvalidArgument`] when a document carries an `_id` that is
    /// not an ObjectId, and [`ResourceError::DocumentAlreadyExists`] for duplicate IDs.
    pub async fn insert(&self, documents: Vec<Document>) -> ResourceResult<Vec<ObjectId>> {
        let now = DateTime::now();
        let mut ids = Vec::with_capacity(documents.len());

        let documents = documents
            .into_iter()
            .map(|mut document| {
                let id = match document.get(ID_FIELD) {
                    Some(Bson::ObjectId(id)) => *id,
                    Some(other) => {
                        return Err(ResourceError::InvalidArgument(format!(
                            "{ID_FIELD} must be an ObjectId, got {other}"
                        )));
                    }
                    None => {
                        let id = ObjectId::new();
                        document.insert(ID_FIELD, id);
                        id
                    }
                };
                for field in [CREATED_FIELD, UPDATED_FIELD] {
                    if self.schema.field(field).is_some() && !document.contains_key(field) {
                        document.insert(field, now);
                    }
                }
                ids.push(id);
                Ok(document)
            })
            .collect::<ResourceResult<Vec<_>>>()?;

        self.backend
            .insert_documents(documents, self.name())
            .await?;

        Ok(ids)
    }

    /// Serializes `values` with serde and inserts them.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Serialization`] if a value does not serialize to a document.
    pub async fn insert_serialized<T: Serialize + Sync>(&self, values: &[T]) -> ResourceResult<Vec<ObjectId>> {
        let documents = values
            .iter()
            .map(|value| match serialize_to_bson(value)? {
                Bson::Document(document) => Ok(document),
                other => Err(ResourceError::Serialization(format!(
                    "expected a document, got {other}"
                ))),
            })
            .collect::<ResourceResult<Vec<_>>>()?;

        self.insert(documents).await
    }

    /// Deletes documents by their IDs and records each deletion in the delete journal.
    pub async fn delete(&self, ids: Vec<ObjectId>) -> ResourceResult<()> {
        self.backend
            .delete_documents(ids.clone(), self.name())
            .await?;

        DeleteJournal::new(self.backend, &self.config.journal_collection)
            .record(self.name(), &ids)
            .await
    }
}

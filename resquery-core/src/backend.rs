//! Storage backend abstraction for the resource layer.
//!
//! This module defines the traits that abstract over document store implementations,
//! allowing the query pipeline and the population engines to run against any backend
//! (in-memory, MongoDB, ...).
//!
//! # Overview
//!
//! The [`StoreBackend`] trait provides a unified async interface for the storage
//! operations the resource layer needs: document insertion, retrieval by identifier,
//! deletion, structured querying and collection management. Implementations are required
//! to be thread-safe (`Send + Sync`) so one backend can serve concurrent requests.
//!
//! # Examples
//!
//! ```ignore
//! use resquery::backend::StoreBackend;
//! use bson::{doc, oid::ObjectId};
//!
//! let backend = MyBackendImpl::new();
//!
//! let id = ObjectId::new();
//! backend.insert_documents(vec![doc! { "_id": id, "name": "Alice" }], "users").await?;
//! let found = backend.get_documents(vec![id], "users", None).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::{Document, oid::ObjectId};
use std::fmt::Debug;

use crate::{
    error::ResourceResult,
    query::{Projection, Query},
};

/// Abstract interface for document storage backends.
///
/// Documents are identified by the [`ObjectId`] stored under their `_id` key.
///
/// # Thread Safety
///
/// All implementations must support concurrent access from multiple async tasks. The
/// exact concurrency model is implementation-specific.
///
/// # Error Handling
///
/// Operations return [`ResourceResult<T>`](crate::error::ResourceResult). Store failures
/// are reported as [`ResourceError::Backend`](crate::error::ResourceError::Backend) unless
/// a more specific variant is documented.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts new documents into a collection.
    ///
    /// Every document must carry an `_id`. The collection is created if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::DocumentAlreadyExists`](crate::error::ResourceError::DocumentAlreadyExists)
    /// if a document with the same `_id` is already stored.
    async fn insert_documents(&self, documents: Vec<Document>, collection: &str) -> ResourceResult<()>;

    /// Deletes documents from a collection by their IDs.
    ///
    /// Unknown IDs are silently skipped.
    async fn delete_documents(&self, ids: Vec<ObjectId>, collection: &str) -> ResourceResult<()>;

    /// Retrieves documents from a collection by their IDs in a single round trip.
    ///
    /// Unknown IDs are omitted from the result; the result order is not guaranteed to
    /// match the request order. The optional projection is applied to every document.
    async fn get_documents(
        &self,
        ids: Vec<ObjectId>,
        collection: &str,
        projection: Option<Projection>,
    ) -> ResourceResult<Vec<Document>>;

    /// Queries documents in a collection using a structured query.
    ///
    /// Applies the filter, sort keys, skip, limit and projection of `query`. Populate
    /// directives are not interpreted by backends.
    async fn query_documents(&self, query: Query, collection: &str) -> ResourceResult<Vec<Document>>;

    /// Creates a new, empty collection.
    async fn create_collection(&self, name: &str) -> ResourceResult<()>;

    /// Drops a collection and all its documents.
    async fn drop_collection(&self, name: &str) -> ResourceResult<()>;

    /// Lists the names of all collections in the store.
    async fn list_collections(&self) -> ResourceResult<Vec<String>>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> ResourceResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<'a, B> StoreBackend for &'a B
where
    B: StoreBackend,
{
    async fn insert_documents(&self, documents: Vec<Document>, collection: &str) -> ResourceResult<()> {
        (*self)
            .insert_documents(documents, collection)
            .await
    }

    async fn delete_documents(&self, ids: Vec<ObjectId>, collection: &str) -> ResourceResult<()> {
        (*self)
            .delete_documents(ids, collection)
            .await
    }

    async fn get_documents(
        &self,
        ids: Vec<ObjectId>,
        collection: &str,
        projection: Option<Projection>,
    ) -> ResourceResult<Vec<Document>> {
        (*self)
            .get_documents(ids, collection, projection)
            .await
    }

    async fn query_documents(&self, query: Query, collection: &str) -> ResourceResult<Vec<Document>> {
        (*self)
            .query_documents(query, collection)
            .await
    }

    async fn create_collection(&self, name: &str) -> ResourceResult<()> {
        (*self).create_collection(name).await
    }

    async fn drop_collection(&self, name: &str) -> ResourceResult<()> {
        (*self).drop_collection(name).await
    }

    async fn list_collections(&self) -> ResourceResult<Vec<String>> {
        (*self).list_collections().await
    }
}

/// Factory trait for constructing backend instances asynchronously.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> ResourceResult<Self::Backend>;
}

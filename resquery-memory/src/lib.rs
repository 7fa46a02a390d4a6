//! In-memory storage backend for resquery.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is meant for development,
//! tests and small deployments.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **BSON storage** - Documents are kept as `bson::Document`, keyed by their `_id`
//! - **Full query support** - Filtering, multi-key sorting, pagination and projections
//!
//! # Quick Start
//!
//! ```ignore
//! use resquery::{memory::InMemoryStore, prelude::*};
//! use bson::{doc, oid::ObjectId};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder()
//!         .with_documents("user", vec![doc! { "_id": ObjectId::new(), "name": "Alice" }])
//!         .build()
//!         .await?;
//!
//!     let store = ResourceStore::new(backend, registry, ResourceConfig::default())?;
//!     let users = store
//!         .find_all("user", &QueryRequest::from_pairs([("filter[name]", "ali")]), &RequestContext::new())
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as resquery_memory;

pub mod evaluator;
pub(crate) mod projection;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};

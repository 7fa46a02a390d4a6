//! Main resquery crate providing a generic resource-access layer over document stores.
//!
//! This crate is the primary entry point for users of resquery. It re-exports the core
//! types from the sub-crates and gives access to the storage backends.
//!
//! # Features
//!
//! - **Query parameter compilation** - `filter[...]`, `sort`, `limit`, `skip`, `populate` and
//!   `populatedeep` become a backend-neutral query plan
//! - **Schema aware coercion** - Filter values are typed from the collection schema, references
//!   are validated as ObjectIds
//! - **Reference population** - Single-hop and multi-hop expansion with one batched fetch per path
//! - **Sync support** - `updated` watermarks merged with the delete journal
//! - **Multiple backends** - In-memory and MongoDB storage behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use resquery::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> ResourceResult<()> {
//!     let registry = SchemaRegistry::builder()
//!         .register(
//!             Schema::builder("user")
//!                 .field(Field::new("name", FieldType::Primitive(PrimitiveType::String)))
//!                 .build()?,
//!         )
//!         .register(
//!             Schema::builder("post")
//!                 .field(Field::new("title", FieldType::Primitive(PrimitiveType::String)).localized())
//!                 .field(Field::new("author", FieldType::reference("user")))
//!                 .timestamps()
//!                 .build()?,
//!         )
//!         .build()?;
//!
//!     let store = ResourceStore::new(InMemoryStore::new(), registry, ResourceConfig::default())?;
//!
//!     let request = QueryRequest::from_pairs([
//!         ("filter[title]", "rust"),
//!         ("populate", "author"),
//!         ("sort", "-created"),
//!         ("limit", "20"),
//!     ]);
//!     let posts = store
//!         .find_all("post", &request, &RequestContext::new().with_locale_hint("de"))
//!         .await?;
//!
//!     println!("Found posts: {:?}", posts);
//!
//!     store.shutdown().await
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires `mongodb` feature)

pub mod prelude;

pub use resquery_core::{
    assemble, backend, collection, config, deep, document, error, filter, journal, locale, page, params,
    pipeline, populate, query, schema, sort, store,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use resquery_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use resquery_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}

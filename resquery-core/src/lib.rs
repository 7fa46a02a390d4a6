//! A generic resource access layer between HTTP handlers and a document store.
//!
//! This crate is the core of the resquery project and provides:
//!
//! - **Query compilation** ([`pipeline`]) - Turns request parameters into an executable [`QueryPlan`](pipeline::QueryPlan)
//! - **Filter compiler** ([`filter`]) - Operator prefixes, type-aware coercion and AND/OR/WHERE combination
//! - **Sort and pagination** ([`sort`], [`page`]) - Ordered sort keys and a clamped page size
//! - **Population** ([`populate`], [`deep`]) - Single-hop and multi-hop reference expansion with batched fetches
//! - **Result assembly** ([`assemble`], [`journal`]) - Deep population and delete journal merging for sync requests
//! - **Schema introspection** ([`schema`]) - Read-only registry of collection schemas
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing storage backends
//! - **Resource store** ([`store`], [`collection`]) - Generic list/get/delete operations
//! - **Error handling** ([`error`]) - Error types and result types
//! - **Configuration** ([`config`], [`locale`]) - Limits, field names and supported locales
//!
//! # Example
//!
//! ```ignore
//! use resquery::prelude::*;
//!
//! let registry = SchemaRegistry::builder()
//!     .register(Schema::builder("user").field(Field::new("name", FieldType::Primitive(PrimitiveType::String))).build()?)
//!     .build()?;
//! let store = ResourceStore::new(InMemoryStore::new(), registry, ResourceConfig::default())?;
//!
//! let request = QueryRequest::from_pairs([("filter[name]", "ali"), ("sort", "name"), ("limit", "20")]);
//! let users = store.find_all("user", &request, &RequestContext::new()).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as resquery_core;

pub mod assemble;
pub mod backend;
pub mod collection;
pub mod config;
pub mod deep;
pub mod document;
pub mod error;
pub mod filter;
pub mod journal;
pub mod locale;
pub mod page;
pub mod params;
pub mod pipeline;
pub mod populate;
pub mod query;
pub mod schema;
pub mod sort;
pub mod store;

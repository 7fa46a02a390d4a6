//! Convenient re-exports of commonly used types from resquery.
//!
//! ```ignore
//! use resquery::prelude::*;
//! ```

pub use resquery_core::{
    assemble::ResultAssembler,
    backend::{StoreBackend, StoreBackendBuilder},
    collection::Collection,
    config::{LocaleConfig, ResourceConfig},
    deep::{DeepPopulateOptions, DeepPopulationEngine},
    document::DocumentSet,
    error::{ResourceError, ResourceResult},
    filter::FilterCompiler,
    journal::DeleteJournal,
    page::Pagination,
    params::QueryRequest,
    pipeline::{QueryOptionsPipeline, QueryPlan, RequestContext},
    query::{DbQuery, Expr, FieldOp, Filter, PopulateDirective, Projection, Query, QueryBuilder, QueryVisitor, Sort, SortDirection},
    schema::{Field, FieldType, PrimitiveType, Schema, SchemaRegistry},
    store::ResourceStore,
};

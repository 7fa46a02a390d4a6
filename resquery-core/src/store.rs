//! Main entry point of the resource layer.
//!
//! [`ResourceStore`] owns a backend, the schema registry and the configuration, and
//! exposes the generic list/get/delete operations HTTP handlers are built on. It does not
//! know about transports or authentication: callers pass the request parameters and a
//! [`RequestContext`] describing the caller.
//!
//! # Example
//!
//! ```ignore
//! use resquery::prelude::*;
//!
//! let store = ResourceStore::new(InMemoryStore::new(), registry, ResourceConfig::default())?;
//!
//! let request = QueryRequest::from_pairs([("filter[age]", ">>18"), ("populate", "author")]);
//! let posts = store.find_all("post", &request, &RequestContext::new()).await?;
//! ```

use bson::Document;

use crate::{
    assemble::ResultAssembler,
    backend::StoreBackend,
    collection::Collection,
    config::ResourceConfig,
    document::{DocumentSet, parse_object_id},
    error::{ResourceError, ResourceResult},
    params::QueryRequest,
    pipeline::{QueryOptionsPipeline, RequestContext},
    query::{Expr, Filter},
    schema::{ID_FIELD, SchemaRegistry},
};

/// A resource store bound to a specific backend implementation.
///
/// # Type Parameters
///
/// * `B` - The backend implementation type
#[derive(Debug)]
pub struct ResourceStore<B: StoreBackend> {
    backend: B,
    registry: SchemaRegistry,
    config: ResourceConfig,
}

impl<B: StoreBackend> ResourceStore<B> {
    /// Creates a new store.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Configuration`] if the registry has no schema for the
    /// configured journal collection.
    pub fn new(backend: B, registry: SchemaRegistry, config: ResourceConfig) -> ResourceResult<Self> {
        if registry.get(&config.journal_collection).is_none() {
            return Err(ResourceError::Configuration(format!(
                "journal collection {} is not registered",
                config.journal_collection
            )));
        }

        Ok(Self { backend, registry, config })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    pub fn pipeline(&self) -> QueryOptionsPipeline<'_> {
        QueryOptionsPipeline::new(&self.registry, &self.config)
    }

    pub fn assembler(&self) -> ResultAssembler<'_, B> {
        ResultAssembler::new(&self.backend, &self.registry, &self.config)
    }

    /// Gets the collection with the given name.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::CollectionNotFound`] if no schema is registered for it.
    pub fn collection(&self, name: &str) -> ResourceResult<Collection<'_, B>> {
        let schema = self.registry.schema(name)?;
        Ok(Collection::new(schema, &self.backend, &self.config))
    }

    /// Lists a collection according to the request parameters.
    pub async fn find_all(
        &self,
        collection: &str,
        request: &QueryRequest,
        ctx: &RequestContext,
    ) -> ResourceResult<Vec<Document>> {
        let handle = self.collection(collection)?;
        let plan = self.pipeline().plan(collection, request, ctx)?;

        let documents = handle.exec(plan.query.clone()).await?;
        let result = self
            .assembler()
            .assemble(DocumentSet::Many(documents), &plan)
            .await?;

        Ok(result.into_vec())
    }

    /// Loads one document, honouring the selection and population parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::MissingParameter`] for an empty id,
    /// [`ResourceError::InvalidArgument`] for a malformed one and
    /// [`ResourceError::ResourceNotFound`] when no document has it.
    pub async fn find_by_id(
        &self,
        collection: &str,
        id: &str,
        request: &QueryRequest,
        ctx: &RequestContext,
    ) -> ResourceResult<Document> {
        if id.is_empty() {
            return Err(ResourceError::MissingParameter("id".to_string()));
        }
        let oid = parse_object_id(id)?;
        let handle = self.collection(collection)?;
        let mut plan = self.pipeline().plan(collection, request, ctx)?;

        let by_id = Filter::eq(ID_FIELD, oid);
        plan.query.filter = Some(match plan.query.filter.take() {
            Some(filter) => Expr::And(vec![filter, by_id]),
            None => by_id,
        });
        plan.query.skip = None;
        plan.query.limit = Some(1);

        let document = handle
            .exec(plan.query.clone())
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ResourceError::ResourceNotFound(id.to_string(), collection.to_string()))?;

        match self
            .assembler()
            .assemble(DocumentSet::One(document), &plan)
            .await?
        {
            DocumentSet::One(document) => Ok(document),
            DocumentSet::Many(documents) => documents
                .into_iter()
                .next()
                .ok_or_else(|| ResourceError::ResourceNotFound(id.to_string(), collection.to_string())),
        }
    }

    /// Deletes one document and journals the deletion.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::InvalidArgument`] for a malformed id and
    /// [`ResourceError::ResourceNotFound`] when no document has it.
    pub async fn delete_by_id(&self, collection: &str, id: &str) -> ResourceResult<()> {
        let oid = parse_object_id(id)?;
        let handle = self.collection(collection)?;

        if handle.get(vec![oid], None).await?.is_empty() {
            return Err(ResourceError::ResourceNotFound(id.to_string(), collection.to_string()));
        }

        handle.delete(vec![oid]).await
    }

    /// Shuts down the underlying backend.
    pub async fn shutdown(self) -> ResourceResult<()> {
        self.backend.shutdown().await
    }
}

//! Final shaping of query results.

use log::debug;

use crate::{
    backend::StoreBackend,
    config::ResourceConfig,
    deep::{DeepPopulateOptions, DeepPopulationEngine},
    document::DocumentSet,
    error::ResourceResult,
    journal::DeleteJournal,
    pipeline::QueryPlan,
    schema::SchemaRegistry,
};

/// Turns executed results into the response document set.
#[derive(Debug)]
pub struct ResultAssembler<'a, B: StoreBackend> {
    backend: &'a B,
    registry: &'a SchemaRegistry,
    config: &'a ResourceConfig,
}

impl<'a, B: StoreBackend> ResultAssembler<'a, B> {
    pub fn new(backend: &'a B, registry: &'a SchemaRegistry, config: &'a ResourceConfig) -> Self {
        Self { backend, registry, config }
    }

    /// Runs deep population for the plan's paths, then appends the delete journal
    /// entries of sync plans to list results.
    ///
    /// An empty list is returned as is, without touching the store.
    pub async fn assemble(&self, mut result: DocumentSet, plan: &QueryPlan) -> ResourceResult<DocumentSet> {
        if result.is_empty() {
            return Ok(result);
        }

        if !plan.deep_paths.is_empty() {
            let options = DeepPopulateOptions {
                collection: plan.collection.clone(),
                locale: plan.locale.clone(),
            };
            DeepPopulationEngine::new(self.backend, self.registry)
                .resolve(&mut result, &plan.deep_paths, &options)
                .await?;
        }

        if let (Some(sync), DocumentSet::Many(documents)) = (&plan.sync, &mut result) {
            let deletes = DeleteJournal::new(self.backend, &self.config.journal_collection)
                .deleted_since(&sync.collection, sync.since)
                .await?;
            debug!("appending {} journal entries for {}", deletes.len(), sync.collection);
            documents.extend(deletes);
        }

        Ok(result)
    }
}

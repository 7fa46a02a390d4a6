//! Multi-hop reference expansion ("deep populate").
//!
//! A deep path such as `comments.author` is resolved against documents that are already
//! materialized: the engine collects the sub-documents reached by every segment but the
//! last, then replaces the reference identifiers held by the last segment with the
//! referenced documents, fetched in one batch per path. Longer chains are expressed as
//! several paths, each building on the documents inserted by the ones before it:
//!
//! ```text
//! populatedeep=author,author.company,comments.author
//! ```
//!
//! Paths run one after another, in the order given.

use log::{debug, warn};

use crate::{
    backend::StoreBackend,
    document::{DocumentSet, documents_at_path},
    error::ResourceResult,
    populate::populate_path,
    schema::{Schema, SchemaRegistry},
};

/// Options of one deep population run.
#[derive(Debug, Clone, PartialEq)]
pub struct DeepPopulateOptions {
    /// Collection the top-level documents belong to.
    pub collection: String,
    /// Locale stamped on every populated document.
    pub locale: String,
}

#[derive(Debug)]
pub struct DeepPopulationEngine<'a, B: StoreBackend> {
    backend: &'a B,
    registry: &'a SchemaRegistry,
}

impl<'a, B: StoreBackend> DeepPopulationEngine<'a, B> {
    pub fn new(backend: &'a B, registry: &'a SchemaRegistry) -> Self {
        Self { backend, registry }
    }

    /// Resolves every path over `documents`.
    ///
    /// A path is skipped when no document holds a sub-document at its prefix, or when its
    /// last segment is not a reference in the schema governing those sub-documents. The
    /// schema of a hop is found by walking the path prefix from the root collection:
    /// embedded fields stay in the current schema and references switch to the schema of
    /// their target collection.
    ///
    /// # Errors
    ///
    /// A failed fetch aborts the remaining paths and is returned. Paths resolved before
    /// the failure keep their effect on `documents`.
    pub async fn resolve(
        &self,
        documents: &mut DocumentSet,
        paths: &[String],
        options: &DeepPopulateOptions,
    ) -> ResourceResult<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let root = self.registry.schema(&options.collection)?;

        for path in paths {
            let segments = path.split('.').collect::<Vec<_>>();
            let Some((last, prefix)) = segments.split_last() else {
                continue;
            };

            let has_candidates = documents.as_slice().iter().any(|document| {
                let mut candidates = Vec::new();
                documents_at_path(document, prefix, &mut candidates);
                !candidates.is_empty()
            });
            if !has_candidates {
                debug!("no documents at {path}, skipping");
                continue;
            }

            let target = self
                .registry
                .governing_schema(root, prefix)
                .and_then(|schema| schema.field_type(last))
                .and_then(|field_type| field_type.reference_target());
            let Some(target) = target else {
                warn!(
                    "{path} does not end in a reference from {}, skipping",
                    options.collection
                );
                continue;
            };

            let fetched = populate_path(
                self.backend,
                documents.as_mut_slice(),
                path,
                target,
                self.registry.get(target).and_then(Schema::admin_exclusions),
                Some(&options.locale),
            )
            .await?;
            debug!("populated {path}: {fetched} documents from {target}");
        }

        Ok(())
    }
}

//! Single-hop reference expansion ("shallow populate").
//!
//! [`ReferenceResolver`] turns `populate` parameters into [`PopulateDirective`]s at
//! compile time. [`populate_path`] executes one directive against already fetched
//! documents: it gathers every identifier found at the path, fetches all referents with
//! one backend call and swaps them in. The deep population engine runs each of its hops
//! through the same routine.

use std::collections::{HashMap, HashSet};

use bson::{Document, oid::ObjectId};
use log::{debug, warn};

use crate::{
    backend::StoreBackend,
    document::{documents_at_path, reference_ids, replace_references},
    error::ResourceResult,
    params::bracket_segments,
    query::{PopulateDirective, Projection},
    schema::{ID_FIELD, Schema, SchemaRegistry},
    sort::split_list,
};

pub const POPULATE_PARAM: &str = "populate";

/// Resolves requested population paths against the schema registry.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceResolver<'a> {
    registry: &'a SchemaRegistry,
    supported_locales: &'a [String],
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(registry: &'a SchemaRegistry, supported_locales: &'a [String]) -> Self {
        Self { registry, supported_locales }
    }

    /// Builds one directive per requested path.
    ///
    /// Accepts `populate=<path> <path>,<path>` as well as the bracket form
    /// `populate[comments]=author,editor`, which prefixes every listed path with
    /// `comments.`. Pairs of other parameter families are ignored.
    pub fn resolve<'p, I>(&self, params: I, schema: &Schema, locale: &str) -> Vec<PopulateDirective>
    where
        I: IntoIterator<Item = &'p (String, String)>,
    {
        params
            .into_iter()
            .filter_map(|(key, value)| {
                bracket_segments(key, POPULATE_PARAM).map(|segments| (segments, value))
            })
            .flat_map(|(segments, value)| {
                let base = segments
                    .iter()
                    .filter(|s| !s.is_empty())
                    .map(|s| format!("{s}."))
                    .collect::<String>();
                split_list(value)
                    .map(|path| format!("{base}{path}"))
                    .collect::<Vec<_>>()
            })
            .map(|path| self.directive(path, schema, locale))
            .collect()
    }

    fn directive(&self, path: String, schema: &Schema, locale: &str) -> PopulateDirective {
        let Some(target) = schema.path_type(&path).and_then(|t| t.reference_target()) else {
            debug!(
                "populate path {path} of {} does not resolve to a reference",
                schema.name()
            );
            return PopulateDirective::new(path);
        };

        let projection = self.registry.get(target).and_then(|target| {
            match (
                target.admin_exclusions(),
                target.locale_projection(locale, self.supported_locales),
            ) {
                (Some(mut hidden), Some(locales)) => {
                    hidden.merge(locales);
                    Some(hidden)
                }
                (hidden, locales) => hidden.or(locales),
            }
        });

        PopulateDirective::new(path)
            .with_target(target)
            .with_projection(projection)
    }
}

/// Replaces the identifiers stored at `path` in `documents` with the referenced
/// documents of `target`, fetched in one batch.
///
/// When `locale` is given every inserted document is stamped with it. Identifiers
/// without a referent stay in place. Returns the number of distinct referents fetched.
///
/// # Errors
///
/// Propagates the backend error of the batched fetch. The documents are left untouched
/// in that case.
pub async fn populate_path<B: StoreBackend>(
    backend: &B,
    documents: &mut [Document],
    path: &str,
    target: &str,
    projection: Option<Projection>,
    locale: Option<&str>,
) -> ResourceResult<usize> {
    let segments = path.split('.').collect::<Vec<_>>();
    let Some((last, prefix)) = segments.split_last() else {
        return Ok(0);
    };

    let mut ids = Vec::new();
    for document in documents.iter() {
        let mut candidates = Vec::new();
        documents_at_path(document, prefix, &mut candidates);
        for candidate in candidates {
            reference_ids(candidate.get(last), &mut ids);
        }
    }

    let mut seen = HashSet::new();
    ids.retain(|id| seen.insert(*id));
    if ids.is_empty() {
        return Ok(0);
    }

    debug!("populating {path} from {target} with {} ids", ids.len());
    let referents = backend
        .get_documents(ids, target, projection)
        .await?
        .into_iter()
        .filter_map(|document| {
            document
                .get_object_id(ID_FIELD)
                .ok()
                .map(|id| (id, document))
        })
        .collect::<HashMap<ObjectId, Document>>();

    let replaced = documents
        .iter_mut()
        .map(|document| replace_references(document, &segments, &referents, locale))
        .sum::<usize>();
    if replaced == 0 {
        warn!("no referents found in {target} for {path}");
    }

    Ok(referents.len())
}

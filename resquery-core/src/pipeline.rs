//! Assembly of an executable query from request parameters.
//!
//! [`QueryOptionsPipeline::apply`] runs the compile stages in a fixed order, each one
//! consuming its own keys from the threaded [`RemainingParams`]:
//!
//! 1. pagination (`limit`, `skip`)
//! 2. shallow population (`populate`, `populate[...]`)
//! 3. sort (`sort`)
//! 4. filter (`filter[...]`)
//!
//! [`QueryOptionsPipeline::plan`] is the standard per-route entry point. It adds the
//! admin-only and locale exclusions and the incremental-sync bound before running `apply`,
//! and returns everything the executor and the result assembler need as a [`QueryPlan`].

use bson::DateTime;
use log::debug;

use crate::{
    config::ResourceConfig,
    error::{ResourceError, ResourceResult},
    filter::{FILTER_PARAM, FilterCompiler, apply_clauses, parse_date},
    locale::LocaleResolver,
    page::Pagination,
    params::{QueryRequest, RemainingParams},
    populate::{POPULATE_PARAM, ReferenceResolver},
    query::{DbQuery, Filter, Query},
    schema::{Schema, SchemaRegistry},
    sort::{SORT_PARAM, parse_sort, split_list},
};

pub const POPULATE_DEEP_PARAM: &str = "populatedeep";

/// Per-request facts supplied by the HTTP layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    /// Locale requested by the client, e.g. from `Accept-Language`.
    pub locale_hint: Option<String>,
    /// Whether the caller holds elevated privileges on the target collection.
    pub elevated: bool,
    /// RFC 3339 lower bound of an incremental-sync request.
    pub updates_since: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_locale_hint(mut self, hint: impl Into<String>) -> Self {
        self.locale_hint = Some(hint.into());
        self
    }

    pub fn elevated(mut self) -> Self {
        self.elevated = true;
        self
    }

    pub fn with_updates_since(mut self, since: impl Into<String>) -> Self {
        self.updates_since = Some(since.into());
        self
    }
}

/// Collection and lower bound of an incremental-sync request.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncScope {
    pub collection: String,
    pub since: DateTime,
}

/// A compiled, ready to execute request.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub collection: String,
    pub query: Query,
    /// Dotted paths to resolve with the deep population engine after execution.
    pub deep_paths: Vec<String>,
    /// Effective locale of the request.
    pub locale: String,
    pub sync: Option<SyncScope>,
}

/// Runs the compile stages against the schema registry.
#[derive(Debug, Clone)]
pub struct QueryOptionsPipeline<'a> {
    registry: &'a SchemaRegistry,
    config: &'a ResourceConfig,
    locales: LocaleResolver,
    filters: FilterCompiler,
}

impl<'a> QueryOptionsPipeline<'a> {
    pub fn new(registry: &'a SchemaRegistry, config: &'a ResourceConfig) -> Self {
        Self {
            registry,
            config,
            locales: LocaleResolver::new(&config.i18n),
            filters: FilterCompiler::new(config.primary_key.clone()),
        }
    }

    pub fn locales(&self) -> &LocaleResolver {
        &self.locales
    }

    /// Applies pagination, shallow population, sort and filter to `query`, in that order.
    ///
    /// Returns the query together with the parameters none of the stages consumed.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::InvalidArgument`] when a filter value cannot be compiled.
    /// Nothing has been sent to the store at that point.
    pub fn apply<Q: DbQuery>(
        &self,
        params: RemainingParams,
        query: Q,
        schema: &Schema,
        locale: &str,
    ) -> ResourceResult<(Q, RemainingParams)> {
        let (pagination, params) = Pagination::extract(params, self.config);
        let query = pagination.apply(query);

        let (populate, params) = params.take_family(POPULATE_PARAM);
        let query = ReferenceResolver::new(self.registry, self.locales.supported())
            .resolve(&populate, schema, locale)
            .into_iter()
            .fold(query, DbQuery::populate);

        let (sort, params) = params.take(SORT_PARAM);
        let query = parse_sort(&sort)
            .into_iter()
            .fold(query, DbQuery::sort);

        let (filters, params) = params.take_family(FILTER_PARAM);
        let clauses = self.filters.compile(&filters, schema)?;
        let query = apply_clauses(query, clauses);

        Ok((query, params))
    }

    /// Compiles a request against the standard per-route options.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::CollectionNotFound`] for unknown collections and
    /// [`ResourceError::InvalidArgument`] for a malformed `updates_since` or filter value.
    pub fn plan(&self, collection: &str, request: &QueryRequest, ctx: &RequestContext) -> ResourceResult<QueryPlan> {
        let schema = self.registry.schema(collection)?;
        let locale = self.locales.resolve(ctx.locale_hint.as_deref());
        let mut query = Query::builder();

        if !ctx.elevated {
            if let Some(projection) = schema.admin_exclusions() {
                query = query.select(projection);
            }
        }

        if let Some(projection) = schema.locale_projection(&locale, self.locales.supported()) {
            query = query.select(projection);
        }

        let sync = match ctx.updates_since.as_deref() {
            Some(raw) => {
                let since = parse_date(raw).ok_or_else(|| {
                    ResourceError::InvalidArgument(format!("updatesSince \"{raw}\" is not a valid timestamp"))
                })?;
                query = query.where_expr(Filter::gte(self.config.updated_field.clone(), since));
                Some(SyncScope { collection: collection.to_string(), since })
            }
            None => None,
        };

        let (deep, params) = request.remaining().take(POPULATE_DEEP_PARAM);
        let deep_paths = deep
            .iter()
            .flat_map(|value| split_list(value))
            .map(String::from)
            .collect();

        let (query, rest) = self.apply(params, query, schema, &locale)?;
        if !rest.is_empty() {
            debug!(
                "unused parameters for {collection}: {}",
                rest.keys().collect::<Vec<_>>().join(", ")
            );
        }

        let plan = QueryPlan { collection: collection.to_string(), query: query.build(), deep_paths, locale, sync };
        debug!("compiled plan for {collection}: {plan:?}");

        Ok(plan)
    }
}

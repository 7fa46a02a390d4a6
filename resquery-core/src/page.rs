//! Pagination parameters for list queries.
//!
//! This module parses the `limit` and `skip` parameters into a [`Pagination`] value.
//! The page size is always bounded by the configured maximum; the offset is passed to
//! the store as requested.

use std::cmp::min;

use crate::{
    config::ResourceConfig,
    params::RemainingParams,
    query::DbQuery,
};

pub const LIMIT_PARAM: &str = "limit";
pub const SKIP_PARAM: &str = "skip";

/// Offset and page size of a list query.
///
/// # Example
///
/// ```ignore
/// use resquery::page::Pagination;
///
/// let request = QueryRequest::from_pairs([("limit", "5000"), ("skip", "-3")]);
/// let (page, _rest) = Pagination::extract(request.remaining(), &ResourceConfig::default());
///
/// assert_eq!(page, Pagination { skip: -3, limit: 1000 });
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Number of documents to skip. Never clamped.
    pub skip: i64,
    /// Maximum number of documents to return.
    pub limit: i64,
}

impl Pagination {
    /// Consumes `limit` and `skip` from the parameters.
    ///
    /// A missing, non-numeric or non-positive `limit` falls back to the configured default;
    /// larger values are reduced to the configured maximum. A missing or non-numeric
    /// `skip` is 0.
    pub fn extract(params: RemainingParams, config: &ResourceConfig) -> (Pagination, RemainingParams) {
        let (limits, params) = params.take(LIMIT_PARAM);
        let (skips, params) = params.take(SKIP_PARAM);

        let limit = limits
            .first()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|limit| *limit > 0)
            .unwrap_or(config.default_limit);
        let skip = skips
            .first()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .unwrap_or(0);

        let pagination = Pagination { skip, limit: min(limit, config.max_limit) };

        (pagination, params)
    }

    pub fn apply<Q: DbQuery>(&self, query: Q) -> Q {
        query.skip(self.skip).limit(self.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self { skip: 0, limit: crate::config::DEFAULT_LIMIT }
    }
}

//! Compilation of the `filter[...]` parameter family into typed predicate clauses.
//!
//! Each parameter `filter[<combinator><field>]=<operator><value>` becomes one
//! [`FilterClause`]:
//!
//! | key prefix | combinator |
//! |---|---|
//! | `+` | [`Combinator::And`] |
//! | `-` | [`Combinator::Or`] |
//! | none | [`Combinator::Where`] |
//!
//! | value prefix | operator |
//! |---|---|
//! | `<<` | less than |
//! | `<` | less than or equal |
//! | `>>` | greater than |
//! | `>` | greater than or equal |
//! | `*!` | field does not exist |
//! | `*` | field exists |
//! | `!` | not equal, or a negated case-insensitive match on string fields |
//! | none | equal, or a case-insensitive match on string fields |
//!
//! Values are coerced to the declared type of the field. Reference fields only accept
//! well-formed identifiers, and a comma separated list of them becomes one `In` clause.

use bson::{Bson, DateTime, oid::ObjectId};
use chrono::{NaiveDate, Utc};
use log::debug;
use regex::RegexBuilder;

use crate::{
    document::parse_object_id,
    error::{ResourceError, ResourceResult},
    params::bracket_segments,
    query::{DbQuery, Expr, FieldOp, Filter},
    schema::{FieldType, PrimitiveType, Schema},
};

/// Root of the filter parameter family.
pub const FILTER_PARAM: &str = "filter";

/// How a clause is combined with the rest of the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// Joined into an explicit AND group.
    And,
    /// Forms its own OR group.
    Or,
    /// Independent predicate; all of them must hold.
    Where,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Exists,
    NotExists,
    Regex,
    NotRegex,
    In,
}

/// One compiled predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    pub field: String,
    pub combinator: Combinator,
    pub op: FilterOp,
    pub value: Bson,
}

impl FilterClause {
    pub fn into_expr(self) -> Expr {
        let op = match self.op {
            FilterOp::Exists => return Filter::exists(self.field),
            FilterOp::NotExists => return Filter::not_exists(self.field),
            FilterOp::In => {
                return match self.value {
                    Bson::Array(values) => Filter::any_of(self.field, values),
                    other => Filter::any_of(self.field, [other]),
                };
            }
            FilterOp::Eq => FieldOp::Eq,
            FilterOp::Ne => FieldOp::Ne,
            FilterOp::Lt => FieldOp::Lt,
            FilterOp::Lte => FieldOp::Lte,
            FilterOp::Gt => FieldOp::Gt,
            FilterOp::Gte => FieldOp::Gte,
            FilterOp::Regex => FieldOp::Regex,
            FilterOp::NotRegex => FieldOp::NotRegex,
        };

        Expr::field(self.field, op, self.value)
    }
}

/// Operator encoded in the leading characters of a filter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prefix {
    Lt,
    Lte,
    Gt,
    Gte,
    NotExists,
    Exists,
    Not,
    None,
}

// Longer prefixes first.
const PREFIXES: [(&str, Prefix); 7] = [
    ("<<", Prefix::Lt),
    ("<", Prefix::Lte),
    (">>", Prefix::Gt),
    (">", Prefix::Gte),
    ("*!", Prefix::NotExists),
    ("*", Prefix::Exists),
    ("!", Prefix::Not),
];

fn split_prefix(value: &str) -> (Prefix, &str) {
    PREFIXES
        .iter()
        .find_map(|(token, prefix)| value.strip_prefix(token).map(|rest| (*prefix, rest)))
        .unwrap_or((Prefix::None, value))
}

/// Compiles filter parameters against a collection schema.
#[derive(Debug, Clone)]
pub struct FilterCompiler {
    primary_key: String,
}

impl FilterCompiler {
    /// `primary_key` is the store-side field the client-side name `id` maps to.
    pub fn new(primary_key: impl Into<String>) -> Self {
        Self { primary_key: primary_key.into() }
    }

    /// Compiles every `filter[...]` pair, in order.
    ///
    /// Pairs of other parameter families are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::InvalidArgument`] for malformed reference identifiers and
    /// for values that cannot be coerced to the field type.
    pub fn compile<'p, I>(&self, params: I, schema: &Schema) -> ResourceResult<Vec<FilterClause>>
    where
        I: IntoIterator<Item = &'p (String, String)>,
    {
        let mut clauses = Vec::new();

        for (key, value) in params {
            let Some(segments) = bracket_segments(key, FILTER_PARAM) else {
                continue;
            };
            // `filter[age][0]` and `filter[age][1]` both target `age`.
            let Some(field) = segments
                .first()
                .and_then(|segment| segment.split('.').next())
                .filter(|field| !field.is_empty())
            else {
                debug!("ignoring filter parameter without a field: {key}");
                continue;
            };

            clauses.extend(self.compile_clause(field, value, schema)?);
        }

        Ok(clauses)
    }

    /// Compiles one `field` / `value` pair, `field` possibly carrying a combinator prefix.
    pub fn compile_clause(&self, field: &str, value: &str, schema: &Schema) -> ResourceResult<Option<FilterClause>> {
        let (combinator, field) = match field.as_bytes().first() {
            Some(b'+') => (Combinator::And, &field[1..]),
            Some(b'-') => (Combinator::Or, &field[1..]),
            _ => (Combinator::Where, field),
        };
        if field.is_empty() {
            return Ok(None);
        }
        let field = if field == "id" { self.primary_key.as_str() } else { field };
        let field_type = schema.field_type(field);

        let (op, value) = match field_type {
            Some(field_type) if field_type.is_identifier() => identifier_operand(value)?,
            _ => typed_operand(value, field_type)?,
        };

        Ok(Some(FilterClause { field: field.to_string(), combinator, op, value }))
    }
}

fn identifier_operand(raw: &str) -> ResourceResult<(FilterOp, Bson)> {
    let (prefix, value) = split_prefix(raw);

    match prefix {
        Prefix::Exists => return Ok((FilterOp::Exists, Bson::Boolean(true))),
        Prefix::NotExists => return Ok((FilterOp::NotExists, Bson::Boolean(false))),
        _ => {}
    }

    if raw.contains(',') {
        let ids = raw
            .split(',')
            .map(|token| parse_object_id(token).map(Bson::ObjectId))
            .collect::<ResourceResult<Vec<_>>>()?;
        return Ok((FilterOp::In, Bson::Array(ids)));
    }

    let op = match prefix {
        Prefix::Not => FilterOp::Ne,
        Prefix::Lt => FilterOp::Lt,
        Prefix::Lte => FilterOp::Lte,
        Prefix::Gt => FilterOp::Gt,
        Prefix::Gte => FilterOp::Gte,
        _ => FilterOp::Eq,
    };
    let id: ObjectId = parse_object_id(value)?;

    Ok((op, Bson::ObjectId(id)))
}

fn typed_operand(raw: &str, field_type: Option<&FieldType>) -> ResourceResult<(FilterOp, Bson)> {
    let primitive = field_type.and_then(FieldType::primitive);
    let is_string = primitive == Some(PrimitiveType::String);
    let (prefix, value) = split_prefix(raw);

    let op = match prefix {
        Prefix::Lt => FilterOp::Lt,
        Prefix::Lte => FilterOp::Lte,
        Prefix::Gt => FilterOp::Gt,
        Prefix::Gte => FilterOp::Gte,
        Prefix::Exists => return Ok((FilterOp::Exists, Bson::Boolean(true))),
        Prefix::NotExists => return Ok((FilterOp::NotExists, Bson::Boolean(false))),
        Prefix::Not if is_string => return Ok((FilterOp::NotRegex, pattern(value)?)),
        Prefix::Not => FilterOp::Ne,
        Prefix::None if is_string => return Ok((FilterOp::Regex, pattern(value)?)),
        Prefix::None => FilterOp::Eq,
    };

    Ok((op, coerce(value, primitive)?))
}

/// Checks that a string-field value compiles as a case-insensitive pattern.
fn pattern(value: &str) -> ResourceResult<Bson> {
    RegexBuilder::new(value)
        .case_insensitive(true)
        .build()
        .map(|_| Bson::String(value.to_string()))
        .map_err(|err| {
            ResourceError::InvalidArgument(format!("the value \"{value}\" is not a valid pattern: {err}"))
        })
}

/// Converts a raw filter value to the declared primitive type.
///
/// Unknown fields keep the raw string.
pub fn coerce(value: &str, primitive: Option<PrimitiveType>) -> ResourceResult<Bson> {
    let invalid = |kind: &str| {
        ResourceError::InvalidArgument(format!("the value \"{value}\" is not a valid {kind}"))
    };

    match primitive {
        Some(PrimitiveType::Number) => value
            .parse::<i64>()
            .map(Bson::Int64)
            .or_else(|_| value.parse::<f64>().map(Bson::Double))
            .map_err(|_| invalid("number")),
        Some(PrimitiveType::Boolean) => match value {
            "true" => Ok(Bson::Boolean(true)),
            "false" => Ok(Bson::Boolean(false)),
            _ => Err(invalid("boolean")),
        },
        Some(PrimitiveType::Date) => parse_date(value)
            .map(Bson::DateTime)
            .ok_or_else(|| invalid("date")),
        Some(PrimitiveType::ObjectId) => parse_object_id(value).map(Bson::ObjectId),
        Some(PrimitiveType::String) | None => Ok(Bson::String(value.to_string())),
    }
}

/// Parses an RFC 3339 timestamp, or a plain `YYYY-MM-DD` date taken as midnight UTC.
pub fn parse_date(value: &str) -> Option<DateTime> {
    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(value) {
        return Some(DateTime::from_chrono(parsed.with_timezone(&Utc)));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| DateTime::from_chrono(midnight.and_utc()))
}

/// Adds compiled clauses to a query according to their combinators.
///
/// Every `Or` clause forms its own OR group; groups are not merged.
pub fn apply_clauses<Q: DbQuery>(query: Q, clauses: Vec<FilterClause>) -> Q {
    clauses.into_iter().fold(query, |query, clause| {
        let combinator = clause.combinator;
        let expr = clause.into_expr();

        match combinator {
            Combinator::Where => query.where_expr(expr),
            Combinator::And => query.and(vec![expr]),
            Combinator::Or => query.or(vec![expr]),
        }
    })
}

//! Query expression evaluation for in-memory document filtering.
//!
//! Field names are dotted paths. A path walks through embedded documents and through
//! arrays of documents, and a comparison succeeds when any value reached by the path,
//! or any element of an array value, satisfies it. Negated operators (`Ne`, `NotRegex`)
//! are the exact complement of their positive form, so they also match documents that
//! lack the field.

use std::{cmp::Ordering, collections::HashMap};

use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};
use regex::{Regex, RegexBuilder};

use resquery_core::{
    error::{ResourceError, ResourceResult},
    query::{Expr, FieldOp, QueryVisitor},
};

/// Type-erased, comparable representation of BSON values.
///
/// All numeric types are normalized to f64.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    ObjectId(ObjectId),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            _ => Comparable::Null,
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Ordering used by sorts: missing and null values first, incomparable values equal.
pub(crate) fn sort_order(left: Option<&Bson>, right: Option<&Bson>) -> Ordering {
    let left = left.map(Comparable::from).unwrap_or(Comparable::Null);
    let right = right.map(Comparable::from).unwrap_or(Comparable::Null);

    match (&left, &right) {
        (Comparable::Null, Comparable::Null) => Ordering::Equal,
        (Comparable::Null, _) => Ordering::Less,
        (_, Comparable::Null) => Ordering::Greater,
        _ => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
    }
}

/// Collects every value reached by the dotted `segments` from `value`.
pub(crate) fn values_at<'a>(value: &'a Bson, segments: &[&str], out: &mut Vec<&'a Bson>) {
    let Some((head, rest)) = segments.split_first() else {
        out.push(value);
        return;
    };

    match value {
        Bson::Document(doc) => {
            if let Some(next) = doc.get(head) {
                values_at(next, rest, out);
            }
        }
        Bson::Array(items) => {
            for item in items.iter().filter(|item| matches!(item, Bson::Document(_))) {
                values_at(item, segments, out);
            }
        }
        _ => {}
    }
}

/// Returns the first value reached by a dotted path.
pub(crate) fn first_value<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let segments = path.split('.').collect::<Vec<_>>();
    let (head, rest) = segments.split_first()?;
    let mut out = Vec::new();
    values_at(document.get(head)?, rest, &mut out);
    out.into_iter().next()
}

/// Compiled case-insensitive patterns, shared by all documents of one query.
#[derive(Debug, Default)]
pub(crate) struct PatternCache {
    patterns: HashMap<String, Regex>,
}

impl PatternCache {
    fn get(&mut self, pattern: &str) -> ResourceResult<&Regex> {
        if !self.patterns.contains_key(pattern) {
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| ResourceError::InvalidArgument(format!("invalid pattern \"{pattern}\": {e}")))?;
            self.patterns.insert(pattern.to_string(), regex);
        }

        self.patterns
            .get(pattern)
            .ok_or_else(|| ResourceError::Backend(format!("pattern {pattern} not cached")))
    }
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
    patterns: &'a mut PatternCache,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document, patterns: &'a mut PatternCache) -> Self {
        Self { document, patterns }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> ResourceResult<bool> {
        self.visit_expr(expr)
    }

    /// Returns clones of the documents matching `expr`.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::InvalidArgument`] for an invalid regular expression.
    pub fn filter_documents<'d>(
        documents: impl IntoIterator<Item = &'d Document>,
        expr: &Expr,
    ) -> ResourceResult<Vec<Document>> {
        let mut patterns = PatternCache::default();
        let mut matched = Vec::new();

        for document in documents {
            if DocumentEvaluator::new(document, &mut patterns).evaluate(expr)? {
                matched.push(document.clone());
            }
        }

        Ok(matched)
    }

    /// Values at `field`, with the elements of array values added.
    fn candidates(&self, field: &str) -> Vec<&'a Bson> {
        let segments = field.split('.').collect::<Vec<_>>();
        let Some((head, rest)) = segments.split_first() else {
            return Vec::new();
        };
        let mut values = Vec::new();
        if let Some(value) = self.document.get(head) {
            values_at(value, rest, &mut values);
        }

        values
            .into_iter()
            .flat_map(|value| {
                let mut expanded = vec![value];
                if let Bson::Array(items) = value {
                    expanded.extend(items.iter());
                }
                expanded
            })
            .collect()
    }

    fn matches_eq(&self, field: &str, value: &Bson) -> bool {
        let expected = Comparable::from(value);
        self.candidates(field)
            .into_iter()
            .any(|candidate| Comparable::from(candidate) == expected)
    }

    fn matches_regex(&mut self, field: &str, value: &Bson) -> ResourceResult<bool> {
        let Bson::String(pattern) = value else {
            return Err(ResourceError::InvalidArgument(format!(
                "regular expression on {field} must be a string"
            )));
        };
        let candidates = self.candidates(field);
        let regex = self.patterns.get(pattern)?;

        Ok(candidates.into_iter().any(|candidate| match candidate {
            Bson::String(text) => regex.is_match(text),
            _ => false,
        }))
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = ResourceError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(self.candidates(field).is_empty() != should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        match op {
            FieldOp::Eq => Ok(self.matches_eq(field, value)),
            FieldOp::Ne => Ok(!self.matches_eq(field, value)),
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => {
                let expected = Comparable::from(value);
                Ok(self.candidates(field).into_iter().any(|candidate| {
                    match Comparable::from(candidate).partial_cmp(&expected) {
                        Some(ordering) => match op {
                            FieldOp::Gt => ordering == Ordering::Greater,
                            FieldOp::Gte => ordering != Ordering::Less,
                            FieldOp::Lt => ordering == Ordering::Less,
                            _ => ordering != Ordering::Greater,
                        },
                        None => false,
                    }
                }))
            }
            FieldOp::Regex => self.matches_regex(field, value),
            FieldOp::NotRegex => Ok(!self.matches_regex(field, value)?),
            FieldOp::In => match value {
                Bson::Array(values) => Ok(values.iter().any(|value| self.matches_eq(field, value))),
                other => Ok(self.matches_eq(field, other)),
            },
        }
    }
}

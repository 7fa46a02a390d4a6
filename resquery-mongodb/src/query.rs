//! Query translation from resquery's AST to MongoDB query syntax.
//!
//! Filter expressions become MongoDB query documents; sort keys and projections become
//! the `sort` and `projection` documents of the find options.

use bson::{Bson, Document, doc};

use resquery_core::{
    error::ResourceError,
    query::{Expr, FieldOp, Projection, QueryVisitor, Sort, SortDirection},
};

/// Translates resquery query expressions into MongoDB query documents.
///
/// Pattern operators are matched case-insensitively, like the in-memory backend.
pub(crate) struct MongoQueryTranslator;

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = ResourceError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$exists": should_exist },
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: match op {
                FieldOp::Eq => doc! { "$eq": value.clone() },
                FieldOp::Ne => doc! { "$ne": value.clone() },
                FieldOp::Gt => doc! { "$gt": value.clone() },
                FieldOp::Gte => doc! { "$gte": value.clone() },
                FieldOp::Lt => doc! { "$lt": value.clone() },
                FieldOp::Lte => doc! { "$lte": value.clone() },
                FieldOp::Regex => doc! { "$regex": pattern(field, value)?, "$options": "i" },
                FieldOp::NotRegex => doc! {
                    "$not": { "$regex": pattern(field, value)?, "$options": "i" },
                },
                FieldOp::In => match value {
                    Bson::Array(values) => doc! { "$in": values.clone() },
                    other => doc! { "$in": [other.clone()] },
                },
            }
        })
    }
}

fn pattern<'a>(field: &str, value: &'a Bson) -> Result<&'a str, ResourceError> {
    value.as_str().ok_or_else(|| {
        ResourceError::InvalidArgument(format!("pattern for {field} must be a string, got {value}"))
    })
}

/// Builds the MongoDB sort document, keys in order.
pub(crate) fn sort_document(sort: &[Sort]) -> Document {
    sort.iter()
        .map(|key| {
            let direction = match key.direction {
                SortDirection::Asc => 1,
                SortDirection::Desc => -1,
            };
            (key.field.clone(), Bson::Int32(direction))
        })
        .collect()
}

pub(crate) fn projection_document(projection: &Projection) -> Document {
    projection
        .entries()
        .map(|(path, included)| (path.to_string(), Bson::Int32(i32::from(included))))
        .collect()
}

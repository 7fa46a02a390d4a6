//! Query construction API shared by the compiler and the store backends.
//!
//! The compiler never talks to a concrete store. It drives any query builder through the
//! [`DbQuery`] capability trait, which every builder declares statically. The bundled
//! [`QueryBuilder`] produces a backend-neutral [`Query`] that backends execute by
//! walking its filter expression with a [`QueryVisitor`].
//!
//! ```ignore
//! use resquery::query::{DbQuery, Filter, Query, Sort, SortDirection};
//!
//! let query = Query::builder()
//!     .where_expr(Filter::eq("status", "active"))
//!     .or(vec![Filter::gt("age", 18)])
//!     .sort(Sort::new("created", SortDirection::Desc))
//!     .limit(10)
//!     .build();
//! ```

use bson::Bson;

use crate::error::ResourceError;

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

/// One sort key. Queries sort by a list of keys, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self { field: field.into(), direction }
    }
}

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// Equal to (exact match).
    Eq,
    /// Not equal to.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// Case-insensitive regular expression match. The value is the pattern.
    Regex,
    /// Negated case-insensitive regular expression match.
    NotRegex,
    /// Value is one of the array of values.
    In,
}

/// A filter expression for querying documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match).
    And(Vec<Expr>),
    /// Logical OR of multiple expressions (any must match).
    Or(Vec<Expr>),
    /// Checks if a field exists or doesn't exist.
    Exists(String, bool),
    /// Field comparison expression.
    Field {
        /// The field name (or dotted path) to compare.
        field: String,
        /// The comparison operator.
        op: FieldOp,
        /// The value to compare against.
        value: Bson,
    },
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }
}

/// Helper struct for constructing filter expressions.
pub struct Filter;

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Ne, value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gt, value.into())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gte, value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lt, value.into())
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lte, value.into())
    }

    /// Matches documents whose string field matches `pattern`, ignoring case.
    pub fn regex(field: impl Into<String>, pattern: impl Into<String>) -> Expr {
        Expr::field(field.into(), FieldOp::Regex, Bson::String(pattern.into()))
    }

    pub fn not_regex(field: impl Into<String>, pattern: impl Into<String>) -> Expr {
        Expr::field(field.into(), FieldOp::NotRegex, Bson::String(pattern.into()))
    }

    /// Matches documents where the field equals one of `values`.
    pub fn any_of(field: impl Into<String>, values: impl IntoIterator<Item = impl Into<Bson>>) -> Expr {
        Expr::field(
            field.into(),
            FieldOp::In,
            Bson::Array(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), true)
    }

    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), false)
    }
}

/// A field selection with MongoDB projection semantics.
///
/// Entries are `(path, included)` pairs. A projection containing any inclusion keeps only
/// the included paths (plus the primary key); otherwise the excluded paths are removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    entries: Vec<(String, bool)>,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(mut self, path: impl Into<String>) -> Self {
        self.set(path.into(), true);
        self
    }

    pub fn exclude(mut self, path: impl Into<String>) -> Self {
        self.set(path.into(), false);
        self
    }

    /// Merges `other` into this projection; entries of `other` win on the same path.
    pub fn merge(&mut self, other: Projection) {
        for (path, included) in other.entries {
            self.set(path, included);
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, bool)> {
        self.entries
            .iter()
            .map(|(path, included)| (path.as_str(), *included))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if the projection selects fields rather than hiding them.
    pub fn is_inclusive(&self) -> bool {
        self.entries.iter().any(|(_, included)| *included)
    }

    fn set(&mut self, path: String, included: bool) {
        match self.entries.iter_mut().find(|(p, _)| *p == path) {
            Some(entry) => entry.1 = included,
            None => self.entries.push((path, included)),
        }
    }
}

/// A single-hop reference expansion attached to a query.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulateDirective {
    /// Dotted path of the reference field, relative to the queried documents.
    pub path: String,
    /// Collection the reference points to, when the schema knows it.
    pub target: Option<String>,
    /// Field selection applied to the fetched referents.
    pub projection: Option<Projection>,
}

impl PopulateDirective {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), target: None, projection: None }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_projection(mut self, projection: Option<Projection>) -> Self {
        self.projection = projection;
        self
    }
}

/// A structured query for retrieving and filtering documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Optional filter expression to match documents.
    pub filter: Option<Expr>,
    /// Maximum number of documents to return.
    pub limit: Option<i64>,
    /// Number of documents to skip. Passed through as requested, negative values included.
    pub skip: Option<i64>,
    /// Sort keys, applied in order.
    pub sort: Vec<Sort>,
    /// Field selection for the returned documents.
    pub projection: Option<Projection>,
    /// Reference expansions run after the query is executed.
    pub populate: Vec<PopulateDirective>,
}

impl Query {
    /// Creates a new empty query with no filters or limits.
    pub fn new() -> Self {
        Query::default()
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }
}

/// Capabilities the query compiler needs from a store query builder.
///
/// Every builder implements all of them; a builder that cannot express one of them
/// does not implement the trait at all.
pub trait DbQuery: Sized {
    /// Adds an independent predicate. All `where` predicates must hold.
    fn where_expr(self, expr: Expr) -> Self;
    /// Adds a group of predicates that must all hold.
    fn and(self, exprs: Vec<Expr>) -> Self;
    /// Adds a group of predicates of which at least one must hold.
    fn or(self, exprs: Vec<Expr>) -> Self;
    /// Appends a sort key after the ones already present.
    fn sort(self, sort: Sort) -> Self;
    fn skip(self, skip: i64) -> Self;
    fn limit(self, limit: i64) -> Self;
    /// Merges a field selection into the current one.
    fn select(self, projection: Projection) -> Self;
    /// Requests a single-hop reference expansion.
    fn populate(self, directive: PopulateDirective) -> Self;
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    predicates: Vec<Expr>,
    query: Query,
}

impl QueryBuilder {
    /// Creates a new query builder.
    pub fn new() -> Self {
        QueryBuilder::default()
    }

    /// Builds and returns the final query.
    ///
    /// A single predicate becomes the filter as is; several are AND-joined.
    pub fn build(self) -> Query {
        let mut query = self.query;
        let mut predicates = self.predicates;

        query.filter = match predicates.len() {
            0 => None,
            1 => predicates.pop(),
            _ => Some(Expr::And(predicates)),
        };

        query
    }
}

impl DbQuery for QueryBuilder {
    fn where_expr(mut self, expr: Expr) -> Self {
        self.predicates.push(expr);
        self
    }

    fn and(mut self, exprs: Vec<Expr>) -> Self {
        self.predicates.push(Expr::And(exprs));
        self
    }

    fn or(mut self, exprs: Vec<Expr>) -> Self {
        self.predicates.push(Expr::Or(exprs));
        self
    }

    fn sort(mut self, sort: Sort) -> Self {
        self.query.sort.push(sort);
        self
    }

    fn skip(mut self, skip: i64) -> Self {
        self.query.skip = Some(skip);
        self
    }

    fn limit(mut self, limit: i64) -> Self {
        self.query.limit = Some(limit);
        self
    }

    fn select(mut self, projection: Projection) -> Self {
        match self.query.projection.as_mut() {
            Some(current) => current.merge(projection),
            None => self.query.projection = Some(projection),
        }
        self
    }

    fn populate(mut self, directive: PopulateDirective) -> Self {
        self.query.populate.push(directive);
        self
    }
}

pub trait QueryVisitor {
    type Output;
    type Error: Into<ResourceError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}

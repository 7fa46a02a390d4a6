//! Schema introspection for the collections the layer serves.
//!
//! A [`SchemaRegistry`] is built once at startup from the application's [`Schema`]
//! definitions and passed by reference into the pipeline and the population engines.
//! It is never mutated afterwards, so it can be shared between concurrent requests
//! without synchronization.
//!
//! ```ignore
//! use resquery::schema::{Field, FieldType, PrimitiveType, Schema, SchemaRegistry};
//!
//! let user = Schema::builder("user")
//!     .field(Field::new("name", FieldType::Primitive(PrimitiveType::String)))
//!     .field(Field::new("bio", FieldType::Primitive(PrimitiveType::String)).localized())
//!     .build()?;
//!
//! let post = Schema::builder("post")
//!     .field(Field::new("author", FieldType::reference("user")))
//!     .timestamps()
//!     .build()?;
//!
//! let registry = SchemaRegistry::builder()
//!     .register(user)
//!     .register(post)
//!     .build()?;
//! ```

use std::collections::{HashMap, HashSet};

use crate::{
    error::{ResourceError, ResourceResult},
    journal,
    query::Projection,
};

/// Suffix of the storage key holding the per-locale variants of a localized field.
pub const I18N_SUFFIX: &str = "I18n";

/// Name of the primary identifier field every schema declares.
pub const ID_FIELD: &str = "_id";

/// Scalar field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    String,
    Number,
    Boolean,
    Date,
    /// An identifier that does not point into another collection.
    ObjectId,
}

/// Declared type of a schema field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Primitive(PrimitiveType),
    /// Identifier of a document in the named collection.
    Reference(String),
    /// A sub-document stored inline, described by its own schema.
    Embedded(Schema),
    Array(Box<FieldType>),
}

impl FieldType {
    pub fn reference(target: impl Into<String>) -> Self {
        FieldType::Reference(target.into())
    }

    pub fn array(element: FieldType) -> Self {
        FieldType::Array(Box::new(element))
    }

    /// Returns the element type, looking through any number of array layers.
    pub fn element(&self) -> &FieldType {
        match self {
            FieldType::Array(inner) => inner.element(),
            other => other,
        }
    }

    /// Returns the referenced collection for references and arrays of references.
    pub fn reference_target(&self) -> Option<&str> {
        match self.element() {
            FieldType::Reference(target) => Some(target),
            _ => None,
        }
    }

    pub fn embedded_schema(&self) -> Option<&Schema> {
        match self.element() {
            FieldType::Embedded(schema) => Some(schema),
            _ => None,
        }
    }

    /// Returns `true` if values of this type are reference identifiers.
    pub fn is_identifier(&self) -> bool {
        matches!(
            self.element(),
            FieldType::Reference(_) | FieldType::Primitive(PrimitiveType::ObjectId)
        )
    }

    pub fn primitive(&self) -> Option<PrimitiveType> {
        match self.element() {
            FieldType::Primitive(primitive) => Some(*primitive),
            _ => None,
        }
    }
}

/// A named, typed field of a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    /// Localized fields store one variant per supported locale under `<name>I18n`.
    pub localized: bool,
    /// Admin-only fields are loaded for elevated callers only.
    pub admin_only: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self { name: name.into(), field_type, localized: false, admin_only: false }
    }

    pub fn localized(mut self) -> Self {
        self.localized = true;
        self
    }

    pub fn admin_only(mut self) -> Self {
        self.admin_only = true;
        self
    }

    /// Key under which the field's value is stored in documents.
    pub fn storage_key(&self) -> String {
        if self.localized {
            format!("{}{}", self.name, I18N_SUFFIX)
        } else {
            self.name.clone()
        }
    }
}

/// Field catalogue of one collection (or of one embedded sub-document type).
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    name: String,
    fields: Vec<Field>,
}

impl Schema {
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_type(&self, name: &str) -> Option<&FieldType> {
        self.field(name).map(|f| &f.field_type)
    }

    /// Resolves a dotted path through embedded sub-schemas of this schema.
    ///
    /// The path never crosses a reference: `comments.author` resolves when `comments`
    /// is an embedded (array of) sub-document declaring `author`.
    pub fn path_type(&self, path: &str) -> Option<&FieldType> {
        let mut schema = self;
        let mut segments = path.split('.').peekable();

        while let Some(segment) = segments.next() {
            let field_type = schema.field_type(segment)?;
            if segments.peek().is_none() {
                return Some(field_type);
            }
            schema = field_type.embedded_schema()?;
        }

        None
    }

    /// Builds the selection hiding admin-only fields from callers without elevated
    /// privileges, including admin-only fields of embedded sub-documents.
    ///
    /// Returns `None` when no field at any depth is admin-only.
    pub fn admin_exclusions(&self) -> Option<Projection> {
        let mut projection = Projection::new();
        self.collect_admin_exclusions("", &mut projection);

        if projection.is_empty() {
            None
        } else {
            Some(projection)
        }
    }

    fn collect_admin_exclusions(&self, base: &str, projection: &mut Projection) {
        for field in &self.fields {
            if field.admin_only {
                *projection =
                    std::mem::take(projection).exclude(format!("{base}{}", field.storage_key()));
            } else if let Some(sub) = field.field_type.embedded_schema() {
                sub.collect_admin_exclusions(&format!("{base}{}.", field.name), projection);
            }
        }
    }

    /// Builds the selection that loads only `locale`'s variant of every localized field,
    /// including localized fields of embedded sub-documents.
    ///
    /// Returns `None` when the schema has no localized field at any depth.
    pub fn locale_projection(&self, locale: &str, supported: &[String]) -> Option<Projection> {
        let mut projection = Projection::new();
        self.collect_locale_exclusions(locale, supported, "", &mut projection);

        if projection.is_empty() {
            None
        } else {
            Some(projection)
        }
    }

    fn collect_locale_exclusions(
        &self,
        locale: &str,
        supported: &[String],
        base: &str,
        projection: &mut Projection,
    ) {
        for field in &self.fields {
            if field.localized {
                for lng in supported.iter().filter(|l| l.as_str() != locale) {
                    *projection = std::mem::take(projection)
                        .exclude(format!("{base}{}.{lng}", field.storage_key()));
                }
            }
            if let Some(sub) = field.field_type.embedded_schema() {
                sub.collect_locale_exclusions(
                    locale,
                    supported,
                    &format!("{base}{}.", field.name),
                    projection,
                );
            }
        }
    }

    fn references(&self) -> Vec<&str> {
        self.fields
            .iter()
            .flat_map(|field| {
                let mut targets = field
                    .field_type
                    .reference_target()
                    .into_iter()
                    .collect::<Vec<_>>();
                if let Some(sub) = field.field_type.embedded_schema() {
                    targets.extend(sub.references());
                }
                targets
            })
            .collect()
    }
}

/// Builder for [`Schema`] definitions.
pub struct SchemaBuilder {
    name: String,
    fields: Vec<Field>,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), fields: Vec::new() }
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Declares the `created` and `updated` date fields maintained by the store.
    pub fn timestamps(self) -> Self {
        self.field(Field::new("created", FieldType::Primitive(PrimitiveType::Date)))
            .field(Field::new("updated", FieldType::Primitive(PrimitiveType::Date)))
    }

    /// Builds the schema, adding the implicit `_id` field when it was not declared.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::InvalidSchema`] if two fields share a name.
    pub fn build(self) -> ResourceResult<Schema> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(ResourceError::InvalidSchema(format!(
                    "duplicate field {} in schema {}",
                    field.name, self.name
                )));
            }
        }
        let declares_id = seen.contains(ID_FIELD);

        let mut fields = self.fields;
        if !declares_id {
            fields.insert(0, Field::new(ID_FIELD, FieldType::Primitive(PrimitiveType::ObjectId)));
        }

        Ok(Schema { name: self.name, fields })
    }
}

/// Read-only lookup table of every collection schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Schema>,
}

impl SchemaRegistry {
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::new()
    }

    pub fn get(&self, collection: &str) -> Option<&Schema> {
        self.schemas.get(collection)
    }

    /// Looks up a collection schema.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::CollectionNotFound`] for unregistered collections.
    pub fn schema(&self, collection: &str) -> ResourceResult<&Schema> {
        self.get(collection)
            .ok_or_else(|| ResourceError::CollectionNotFound(collection.to_string()))
    }

    pub fn collections(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    /// Returns the schema governing the sub-documents reached by following `segments`
    /// from documents of `root`.
    ///
    /// Embedded fields keep the walk inside the collection; reference fields continue in
    /// the referenced collection's schema. Any other field type ends the walk.
    pub fn governing_schema<'a>(&'a self, root: &'a Schema, segments: &[&str]) -> Option<&'a Schema> {
        let mut current = root;

        for segment in segments {
            current = match current.field_type(segment)?.element() {
                FieldType::Embedded(schema) => schema,
                FieldType::Reference(target) => self.get(target)?,
                FieldType::Primitive(_) | FieldType::Array(_) => return None,
            };
        }

        Some(current)
    }
}

/// Builder for [`SchemaRegistry`].
pub struct SchemaRegistryBuilder {
    schemas: Vec<Schema>,
    journal_collection: String,
}

impl SchemaRegistryBuilder {
    pub fn new() -> Self {
        Self {
            schemas: Vec::new(),
            journal_collection: journal::DEFAULT_JOURNAL_COLLECTION.to_string(),
        }
    }

    pub fn register(mut self, schema: Schema) -> Self {
        self.schemas.push(schema);
        self
    }

    /// Overrides the name of the delete-journal collection registered alongside.
    pub fn with_journal_collection(mut self, collection: impl Into<String>) -> Self {
        self.journal_collection = collection.into();
        self
    }

    /// Builds the registry.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::InvalidSchema`] if a collection is registered twice or a
    /// reference field names an unregistered collection.
    pub fn build(self) -> ResourceResult<SchemaRegistry> {
        let mut schemas = HashMap::new();

        for schema in self
            .schemas
            .into_iter()
            .chain(std::iter::once(journal::journal_schema(&self.journal_collection)?))
        {
            let name = schema.name().to_string();
            if schemas.insert(name.clone(), schema).is_some() {
                return Err(ResourceError::InvalidSchema(format!(
                    "collection {name} is registered twice"
                )));
            }
        }

        for schema in schemas.values() {
            for target in schema.references() {
                if !schemas.contains_key(target) {
                    return Err(ResourceError::InvalidSchema(format!(
                        "schema {} references unknown collection {target}",
                        schema.name()
                    )));
                }
            }
        }

        Ok(SchemaRegistry { schemas })
    }
}

impl Default for SchemaRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string() -> FieldType {
        FieldType::Primitive(PrimitiveType::String)
    }

    fn comment() -> Schema {
        Schema::builder("comment")
            .field(Field::new("text", string()).localized())
            .field(Field::new("author", FieldType::reference("user")))
            .build()
            .unwrap()
    }

    fn registry() -> SchemaRegistry {
        SchemaRegistry::builder()
            .register(
                Schema::builder("user")
                    .field(Field::new("name", string()))
                    .field(Field::new("bio", string()).localized())
                    .build()
                    .unwrap(),
            )
            .register(
                Schema::builder("post")
                    .field(Field::new("author", FieldType::reference("user")))
                    .field(Field::new("comments", FieldType::array(FieldType::Embedded(comment()))))
                    .build()
                    .unwrap(),
            )
            .register(
                Schema::builder("feed")
                    .field(Field::new("posts", FieldType::array(FieldType::reference("post"))))
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn implicit_id_field() {
        let schema = Schema::builder("tag").build().unwrap();
        assert_eq!(
            schema.field_type(ID_FIELD),
            Some(&FieldType::Primitive(PrimitiveType::ObjectId))
        );
    }

    #[test]
    fn declared_id_field_is_kept() {
        let schema = Schema::builder("tag")
            .field(Field::new("label", string()))
            .field(Field::new(ID_FIELD, FieldType::Primitive(PrimitiveType::ObjectId)))
            .build()
            .unwrap();
        let names = schema.fields().iter().map(|f| f.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["label", ID_FIELD]);
    }

    #[test]
    fn duplicate_fields_are_rejected() {
        let err = Schema::builder("tag")
            .field(Field::new("name", string()))
            .field(Field::new("name", string()))
            .build()
            .unwrap_err();
        assert!(matches!(err, ResourceError::InvalidSchema(_)));
    }

    #[test]
    fn dangling_references_are_rejected() {
        let err = SchemaRegistry::builder()
            .register(
                Schema::builder("post")
                    .field(Field::new("author", FieldType::reference("nobody")))
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, ResourceError::InvalidSchema(_)));
    }

    #[test]
    fn path_type_walks_embedded_schemas() {
        let registry = registry();
        let post = registry.schema("post").unwrap();

        assert_eq!(post.path_type("comments.author").and_then(FieldType::reference_target), Some("user"));
        assert_eq!(post.path_type("author").and_then(FieldType::reference_target), Some("user"));
        assert!(post.path_type("author.name").is_none());
        assert!(post.path_type("missing").is_none());
    }

    #[test]
    fn governing_schema_crosses_references() {
        let registry = registry();
        let feed = registry.schema("feed").unwrap();

        assert_eq!(registry.governing_schema(feed, &[]).map(Schema::name), Some("feed"));
        assert_eq!(registry.governing_schema(feed, &["posts"]).map(Schema::name), Some("post"));
        assert_eq!(
            registry.governing_schema(feed, &["posts", "comments"]).map(Schema::name),
            Some("comment")
        );
        assert!(registry.governing_schema(feed, &["nope"]).is_none());
    }

    #[test]
    fn locale_projection_excludes_other_locales() {
        let registry = registry();
        let supported = ["en", "de", "fr"].map(String::from);

        let projection = registry
            .schema("user")
            .unwrap()
            .locale_projection("fr", &supported)
            .unwrap();
        let entries = projection.entries().collect::<Vec<_>>();
        assert_eq!(entries, vec![("bioI18n.en", false), ("bioI18n.de", false)]);

        let projection = registry
            .schema("post")
            .unwrap()
            .locale_projection("de", &supported)
            .unwrap();
        let entries = projection.entries().collect::<Vec<_>>();
        assert_eq!(
            entries,
            vec![("comments.textI18n.en", false), ("comments.textI18n.fr", false)]
        );

        assert!(registry.schema("feed").unwrap().locale_projection("de", &supported).is_none());
    }

    #[test]
    fn admin_exclusions_hide_admin_only_fields() {
        let audit = Schema::builder("audit")
            .field(Field::new("note", string()))
            .field(Field::new("reviewer", string()).admin_only())
            .build()
            .unwrap();
        let schema = Schema::builder("ticket")
            .field(Field::new("title", string()).localized())
            .field(Field::new("secret", string()).localized().admin_only())
            .field(Field::new("internal", FieldType::Embedded(audit.clone())).admin_only())
            .field(Field::new("audits", FieldType::array(FieldType::Embedded(audit))))
            .build()
            .unwrap();

        let projection = schema.admin_exclusions().unwrap();
        assert!(!projection.is_inclusive());
        assert_eq!(
            projection.entries().collect::<Vec<_>>(),
            vec![("secretI18n", false), ("internal", false), ("audits.reviewer", false)]
        );

        assert!(registry().schema("post").unwrap().admin_exclusions().is_none());
    }

    #[test]
    fn journal_schema_is_registered() {
        let registry = registry();
        assert!(registry.get(journal::DEFAULT_JOURNAL_COLLECTION).is_some());
    }
}

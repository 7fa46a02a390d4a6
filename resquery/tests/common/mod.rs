#![allow(dead_code)]

use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use bson::{Document, doc, oid::ObjectId};
use resquery::{memory::InMemoryStore, prelude::*};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn registry() -> SchemaRegistry {
    let comment = Schema::builder("comment")
        .field(Field::new("text", FieldType::Primitive(PrimitiveType::String)).localized())
        .field(Field::new("author", FieldType::reference("user")))
        .build()
        .unwrap();

    SchemaRegistry::builder()
        .register(
            Schema::builder("company")
                .field(Field::new("name", FieldType::Primitive(PrimitiveType::String)))
                .build()
                .unwrap(),
        )
        .register(
            Schema::builder("user")
                .field(Field::new("name", FieldType::Primitive(PrimitiveType::String)))
                .field(Field::new("bio", FieldType::Primitive(PrimitiveType::String)).localized())
                .field(Field::new("email", FieldType::Primitive(PrimitiveType::String)).admin_only())
                .field(Field::new("company", FieldType::reference("company")))
                .build()
                .unwrap(),
        )
        .register(
            Schema::builder("post")
                .field(Field::new("title", FieldType::Primitive(PrimitiveType::String)).localized())
                .field(Field::new("status", FieldType::Primitive(PrimitiveType::String)))
                .field(Field::new("secret", FieldType::Primitive(PrimitiveType::String)).admin_only())
                .field(Field::new("age", FieldType::Primitive(PrimitiveType::Number)))
                .field(Field::new("author", FieldType::reference("user")))
                .field(Field::new("comments", FieldType::array(FieldType::Embedded(comment))))
                .timestamps()
                .build()
                .unwrap(),
        )
        .build()
        .unwrap()
}

pub fn user(name: &str, company: Option<ObjectId>) -> Document {
    let mut user = doc! {
        "_id": ObjectId::new(),
        "name": name,
        "email": format!("{name}@example.com"),
        "bioI18n": {
            "en": format!("{name} in English"),
            "de": format!("{name} auf Deutsch"),
            "fr": format!("{name} en français"),
            "it": format!("{name} in italiano"),
        },
    };
    if let Some(company) = company {
        user.insert("company", company);
    }
    user
}

pub fn id_of(document: &Document) -> ObjectId {
    document.get_object_id("_id").unwrap()
}

/// Backend wrapper counting the calls that reach the store.
#[derive(Debug, Default)]
pub struct CountingStore {
    pub inner: InMemoryStore,
    pub queries: AtomicUsize,
    pub fetches: Mutex<Vec<(String, usize)>>,
    /// Batched fetches from this collection fail after being recorded.
    pub failing: Option<String>,
}

impl CountingStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self { inner, ..Default::default() }
    }

    pub fn failing_on(mut self, collection: impl Into<String>) -> Self {
        self.failing = Some(collection.into());
        self
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// `(collection, number of ids)` of every batched fetch, in order.
    pub fn fetches(&self) -> Vec<(String, usize)> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl StoreBackend for CountingStore {
    async fn insert_documents(&self, documents: Vec<Document>, collection: &str) -> ResourceResult<()> {
        self.inner.insert_documents(documents, collection).await
    }

    async fn delete_documents(&self, ids: Vec<ObjectId>, collection: &str) -> ResourceResult<()> {
        self.inner.delete_documents(ids, collection).await
    }

    async fn get_documents(
        &self,
        ids: Vec<ObjectId>,
        collection: &str,
        projection: Option<Projection>,
    ) -> ResourceResult<Vec<Document>> {
        self.fetches
            .lock()
            .unwrap()
            .push((collection.to_string(), ids.len()));
        if self.failing.as_deref() == Some(collection) {
            return Err(ResourceError::Backend(format!("{collection} is unavailable")));
        }
        self.inner.get_documents(ids, collection, projection).await
    }

    async fn query_documents(&self, query: Query, collection: &str) -> ResourceResult<Vec<Document>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.query_documents(query, collection).await
    }

    async fn create_collection(&self, name: &str) -> ResourceResult<()> {
        self.inner.create_collection(name).await
    }

    async fn drop_collection(&self, name: &str) -> ResourceResult<()> {
        self.inner.drop_collection(name).await
    }

    async fn list_collections(&self) -> ResourceResult<Vec<String>> {
        self.inner.list_collections().await
    }
}

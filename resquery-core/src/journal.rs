//! Delete journal backing incremental sync.
//!
//! Every delete issued through a [`Collection`](crate::collection::Collection) leaves one
//! entry `{_id, model, deleted}` in the journal collection, keyed by the deleted
//! document's identifier. Sync requests read the entries of their collection that are
//! newer than the sync bound and return them next to the changed documents.

use bson::{DateTime, Document, doc, oid::ObjectId};
use log::debug;

use crate::{
    backend::StoreBackend,
    error::{ResourceError, ResourceResult},
    query::{DbQuery, Filter, Query},
    schema::{Field, FieldType, ID_FIELD, PrimitiveType, Schema},
};

pub const DEFAULT_JOURNAL_COLLECTION: &str = "deletejournal";
pub const MODEL_FIELD: &str = "model";
pub const DELETED_FIELD: &str = "deleted";

/// Schema of the journal collection.
pub fn journal_schema(collection: &str) -> ResourceResult<Schema> {
    Schema::builder(collection)
        .field(Field::new(MODEL_FIELD, FieldType::Primitive(PrimitiveType::String)))
        .field(Field::new(DELETED_FIELD, FieldType::Primitive(PrimitiveType::Date)))
        .build()
}

pub fn journal_entry(id: ObjectId, model: &str, deleted: DateTime) -> Document {
    doc! {
        ID_FIELD: id,
        MODEL_FIELD: model,
        DELETED_FIELD: deleted,
    }
}

/// Reads and writes journal entries in one journal collection.
#[derive(Debug)]
pub struct DeleteJournal<'a, B: StoreBackend> {
    backend: &'a B,
    collection: &'a str,
}

impl<'a, B: StoreBackend> DeleteJournal<'a, B> {
    pub fn new(backend: &'a B, collection: &'a str) -> Self {
        Self { backend, collection }
    }

    /// Records the deletion of `ids` from `model`.
    ///
    /// An identifier that is already journaled (a document deleted, re-created and
    /// deleted again) has its entry replaced, so `deleted` always holds the latest delete.
    pub async fn record(&self, model: &str, ids: &[ObjectId]) -> ResourceResult<()> {
        let deleted = DateTime::now();

        for id in ids {
            let entry = journal_entry(*id, model, deleted);
            match self
                .backend
                .insert_documents(vec![entry.clone()], self.collection)
                .await
            {
                Ok(()) => debug!("journaled delete of {id} from {model}"),
                Err(ResourceError::DocumentAlreadyExists(..)) => {
                    self.backend
                        .delete_documents(vec![*id], self.collection)
                        .await?;
                    self.backend
                        .insert_documents(vec![entry], self.collection)
                        .await?;
                    debug!("refreshed journaled delete of {id} from {model}");
                }
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }

    /// Entries of `model` deleted at or after `since`.
    pub async fn deleted_since(&self, model: &str, since: DateTime) -> ResourceResult<Vec<Document>> {
        let query = Query::builder()
            .where_expr(Filter::eq(MODEL_FIELD, model))
            .where_expr(Filter::gte(DELETED_FIELD, since))
            .build();

        self.backend
            .query_documents(query, self.collection)
            .await
    }
}

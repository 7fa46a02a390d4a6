//! Helpers for reading and rewriting weakly-typed documents.
//!
//! Documents are plain [`bson::Document`] values. Reference fields hold
//! [`ObjectId`]s (or arrays of them) until population replaces them with the
//! referenced documents.

use std::collections::HashMap;

use bson::{Bson, Document, oid::ObjectId};

use crate::error::{ResourceError, ResourceResult};

/// Key stamped on populated documents naming the locale they were loaded for.
pub const LOCALE_KEY: &str = "$locale";

/// Parses a client supplied reference identifier (exactly 24 hexadecimal characters).
///
/// # Errors
///
/// Returns [`ResourceError::InvalidArgument`] naming the offending value.
pub fn parse_object_id(value: &str) -> ResourceResult<ObjectId> {
    ObjectId::parse_str(value).map_err(|_| ResourceError::invalid_reference(value))
}

/// Result of a query or a single-document lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentSet {
    One(Document),
    Many(Vec<Document>),
}

impl DocumentSet {
    /// Returns `true` for an empty list. A single document is never empty.
    pub fn is_empty(&self) -> bool {
        match self {
            DocumentSet::One(_) => false,
            DocumentSet::Many(documents) => documents.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn as_slice(&self) -> &[Document] {
        match self {
            DocumentSet::One(document) => std::slice::from_ref(document),
            DocumentSet::Many(documents) => documents,
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [Document] {
        match self {
            DocumentSet::One(document) => std::slice::from_mut(document),
            DocumentSet::Many(documents) => documents,
        }
    }

    pub fn into_vec(self) -> Vec<Document> {
        match self {
            DocumentSet::One(document) => vec![document],
            DocumentSet::Many(documents) => documents,
        }
    }
}

impl From<Document> for DocumentSet {
    fn from(document: Document) -> Self {
        DocumentSet::One(document)
    }
}

impl From<Vec<Document>> for DocumentSet {
    fn from(documents: Vec<Document>) -> Self {
        DocumentSet::Many(documents)
    }
}

/// Collects the sub-documents reached from `document` by following `segments`.
///
/// An empty segment list yields the document itself. An absent value contributes
/// nothing, an array contributes each of its elements, and any other value
/// contributes itself; the rest of the path is then followed from every contributed
/// value. Only embedded documents are collected.
pub fn documents_at_path<'a>(document: &'a Document, segments: &[&str], out: &mut Vec<&'a Document>) {
    let Some((head, rest)) = segments.split_first() else {
        out.push(document);
        return;
    };

    match document.get(head) {
        Some(Bson::Document(sub)) => documents_at_path(sub, rest, out),
        Some(Bson::Array(items)) => {
            for item in items {
                if let Bson::Document(sub) = item {
                    documents_at_path(sub, rest, out);
                }
            }
        }
        _ => {}
    }
}

/// Appends the reference identifiers held by `value` to `out`.
pub fn reference_ids(value: Option<&Bson>, out: &mut Vec<ObjectId>) {
    match value {
        Some(Bson::ObjectId(id)) => out.push(*id),
        Some(Bson::Array(items)) => out.extend(items.iter().filter_map(|item| match item {
            Bson::ObjectId(id) => Some(*id),
            _ => None,
        })),
        _ => {}
    }
}

/// Replaces the identifiers found at the dotted `segments` of `document` with their
/// referents, stamping each inserted document with `locale` when given.
///
/// Identifiers without a referent are left in place. Returns the number of
/// identifiers replaced.
pub fn replace_references(
    document: &mut Document,
    segments: &[&str],
    referents: &HashMap<ObjectId, Document>,
    locale: Option<&str>,
) -> usize {
    match segments {
        [] => 0,
        [last] => document
            .get_mut(last)
            .map(|value| replace_value(value, referents, locale))
            .unwrap_or(0),
        [head, rest @ ..] => match document.get_mut(head) {
            Some(Bson::Document(sub)) => replace_references(sub, rest, referents, locale),
            Some(Bson::Array(items)) => items
                .iter_mut()
                .map(|item| match item {
                    Bson::Document(sub) => replace_references(sub, rest, referents, locale),
                    _ => 0,
                })
                .sum(),
            _ => 0,
        },
    }
}

fn replace_value(value: &mut Bson, referents: &HashMap<ObjectId, Document>, locale: Option<&str>) -> usize {
    match value {
        Bson::Array(items) => items
            .iter_mut()
            .map(|item| replace_value(item, referents, locale))
            .sum(),
        Bson::ObjectId(id) => match referents.get(&*id) {
            Some(found) => {
                let mut found = found.clone();
                if let Some(locale) = locale {
                    found.insert(LOCALE_KEY, locale);
                }
                *value = Bson::Document(found);
                1
            }
            None => 0,
        },
        _ => 0,
    }
}

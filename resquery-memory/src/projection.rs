//! Field selection for in-memory query results.
//!
//! Follows MongoDB projection rules: a projection with at least one inclusion keeps the
//! included paths and `_id` (unless `_id` is excluded explicitly); otherwise every
//! excluded path is removed. Paths reach into embedded documents and into every element
//! of arrays of documents.

use bson::{Bson, Document};

use resquery_core::{query::Projection, schema::ID_FIELD};

pub(crate) fn apply_projection(document: Document, projection: &Projection) -> Document {
    if projection.is_empty() {
        return document;
    }

    if projection.is_inclusive() {
        let mut selected = Document::new();
        let keep_id = !projection
            .entries()
            .any(|(path, included)| path == ID_FIELD && !included);
        if keep_id {
            if let Some(id) = document.get(ID_FIELD) {
                selected.insert(ID_FIELD, id.clone());
            }
        }
        for (path, _) in projection.entries().filter(|(_, included)| *included) {
            let segments = path.split('.').collect::<Vec<_>>();
            include_path(&document, &segments, &mut selected);
        }
        selected
    } else {
        let mut document = document;
        for (path, _) in projection.entries() {
            let segments = path.split('.').collect::<Vec<_>>();
            exclude_path(&mut document, &segments);
        }
        document
    }
}

fn include_path(source: &Document, segments: &[&str], target: &mut Document) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    let Some(value) = source.get(head) else {
        return;
    };
    if rest.is_empty() {
        target.insert(*head, value.clone());
        return;
    }

    match value {
        Bson::Document(sub) => {
            if !matches!(target.get(head), Some(Bson::Document(_))) {
                target.insert(*head, Document::new());
            }
            if let Some(Bson::Document(sub_target)) = target.get_mut(head) {
                include_path(sub, rest, sub_target);
            }
        }
        Bson::Array(items) => {
            let elements = items
                .iter()
                .filter_map(Bson::as_document)
                .collect::<Vec<_>>();
            if !matches!(target.get(head), Some(Bson::Array(existing)) if existing.len() == elements.len()) {
                target.insert(
                    *head,
                    elements
                        .iter()
                        .map(|_| Bson::Document(Document::new()))
                        .collect::<Vec<_>>(),
                );
            }
            if let Some(Bson::Array(targets)) = target.get_mut(head) {
                for (element, slot) in elements.into_iter().zip(targets.iter_mut()) {
                    if let Bson::Document(slot) = slot {
                        include_path(element, rest, slot);
                    }
                }
            }
        }
        _ => {}
    }
}

fn exclude_path(document: &mut Document, segments: &[&str]) {
    match segments {
        [] => {}
        [last] => {
            document.remove(*last);
        }
        [head, rest @ ..] => match document.get_mut(*head) {
            Some(Bson::Document(sub)) => exclude_path(sub, rest),
            Some(Bson::Array(items)) => {
                for item in items {
                    if let Bson::Document(sub) = item {
                        exclude_path(sub, rest);
                    }
                }
            }
            _ => {}
        },
    }
}

mod common;

use std::time::Duration;

use bson::{Bson, DateTime, Document, doc, oid::ObjectId};
use resquery::{
    journal::{DELETED_FIELD, DEFAULT_JOURNAL_COLLECTION, MODEL_FIELD},
    memory::InMemoryStore,
    prelude::*,
};

use common::{CountingStore, id_of, init_logging, registry, user};

async fn counting(seed: Vec<(&str, Vec<Document>)>) -> CountingStore {
    let backend = seed
        .into_iter()
        .fold(InMemoryStore::builder(), |builder, (collection, documents)| {
            builder.with_documents(collection, documents)
        })
        .build()
        .await
        .unwrap();

    CountingStore::new(backend)
}

fn titles(documents: &[Document]) -> Vec<&str> {
    documents
        .iter()
        .map(|d| d.get_document("titleI18n").unwrap().get_str("en").unwrap())
        .collect()
}

fn post(title: &str, author: ObjectId, comment_authors: &[ObjectId]) -> Document {
    doc! {
        "_id": ObjectId::new(),
        "titleI18n": { "en": title, "de": format!("{title} (de)") },
        "author": author,
        "comments": comment_authors
            .iter()
            .map(|author| Bson::Document(doc! { "textI18n": { "en": "nice" }, "author": *author }))
            .collect::<Vec<_>>(),
    }
}

#[tokio::test]
async fn numeric_filter_compiles_to_strict_comparison() {
    init_logging();
    let backend = counting(vec![(
        "post",
        [10_i64, 18, 30]
            .iter()
            .map(|age| doc! { "_id": ObjectId::new(), "titleI18n": { "en": format!("age {age}") }, "age": *age })
            .collect(),
    )])
    .await;
    let store = ResourceStore::new(&backend, registry(), ResourceConfig::default()).unwrap();
    let request = QueryRequest::from_pairs([("filter[age]", ">>18")]);

    let plan = store.pipeline().plan("post", &request, &RequestContext::new()).unwrap();
    assert_eq!(plan.query.filter, Some(Filter::gt("age", 18_i64)));

    let posts = store.find_all("post", &request, &RequestContext::new()).await.unwrap();
    assert_eq!(titles(&posts), vec!["age 30"]);
}

#[tokio::test]
async fn and_and_or_combinators_are_separate_groups() {
    let backend = counting(vec![(
        "post",
        ["active", "pending", "active, pending review"]
            .iter()
            .map(|status| doc! { "_id": ObjectId::new(), "titleI18n": { "en": *status }, "status": *status })
            .collect(),
    )])
    .await;
    let store = ResourceStore::new(&backend, registry(), ResourceConfig::default()).unwrap();
    let request = QueryRequest::from_pairs([("filter[+status]", "active"), ("filter[-status]", "pending")]);

    let plan = store.pipeline().plan("post", &request, &RequestContext::new()).unwrap();
    assert_eq!(
        plan.query.filter,
        Some(Expr::And(vec![
            Expr::And(vec![Filter::regex("status", "active")]),
            Expr::Or(vec![Filter::regex("status", "pending")]),
        ]))
    );

    let posts = store.find_all("post", &request, &RequestContext::new()).await.unwrap();
    assert_eq!(titles(&posts), vec!["active, pending review"]);
}

#[tokio::test]
async fn shallow_populate_selects_the_request_locale() {
    init_logging();
    let alice = user("alice", None);
    let backend = counting(vec![
        ("post", vec![post("hello", id_of(&alice), &[])]),
        ("user", vec![alice.clone()]),
    ])
    .await;
    let store = ResourceStore::new(&backend, registry(), ResourceConfig::default()).unwrap();
    let request = QueryRequest::from_pairs([("populate", "author")]);

    let posts = store
        .find_all("post", &request, &RequestContext::new().with_locale_hint("fr-CH"))
        .await
        .unwrap();

    let author = posts[0].get_document("author").unwrap();
    assert_eq!(author.get_str("name").unwrap(), "alice");
    assert!(author.get("email").is_none());
    assert_eq!(author.get_document("bioI18n").unwrap(), &doc! { "fr": "alice en français" });
    assert_eq!(posts[0].get_document("titleI18n").unwrap(), &doc! {});
    assert_eq!(backend.fetches(), vec![("user".to_string(), 1)]);
}

#[tokio::test]
async fn deep_populate_fetches_each_path_in_one_batch() {
    init_logging();
    let users = (0..6).map(|i| user(&format!("user {i}"), None)).collect::<Vec<_>>();
    let ids = users.iter().map(id_of).collect::<Vec<_>>();
    let posts = ids
        .chunks(2)
        .map(|pair| post("post", ids[0], pair))
        .collect::<Vec<_>>();
    let backend = counting(vec![("post", posts), ("user", users)]).await;
    let store = ResourceStore::new(&backend, registry(), ResourceConfig::default()).unwrap();
    let request = QueryRequest::from_pairs([("populatedeep", "comments.author")]);

    let posts = store.find_all("post", &request, &RequestContext::new()).await.unwrap();

    assert_eq!(posts.len(), 3);
    assert_eq!(backend.query_count(), 1);
    assert_eq!(backend.fetches(), vec![("user".to_string(), 6)]);
    for post in &posts {
        for comment in post.get_array("comments").unwrap() {
            let author = comment.as_document().unwrap().get_document("author").unwrap();
            assert!(author.get_str("name").unwrap().starts_with("user "));
            assert_eq!(author.get_str("$locale").unwrap(), "en");
        }
        // Only the requested path is expanded.
        assert!(post.get_object_id("author").is_ok());
    }
}

#[tokio::test]
async fn deep_paths_build_on_each_other() {
    let acme = doc! { "_id": ObjectId::new(), "name": "acme" };
    let alice = user("alice", Some(id_of(&acme)));
    let backend = counting(vec![
        ("post", vec![post("hello", id_of(&alice), &[])]),
        ("user", vec![alice]),
        ("company", vec![acme]),
    ])
    .await;
    let store = ResourceStore::new(&backend, registry(), ResourceConfig::default()).unwrap();
    let request = QueryRequest::from_pairs([("populatedeep", "author,author.company")]);

    let posts = store
        .find_all("post", &request, &RequestContext::new().with_locale_hint("de"))
        .await
        .unwrap();

    let company = posts[0]
        .get_document("author")
        .unwrap()
        .get_document("company")
        .unwrap();
    assert_eq!(company.get_str("name").unwrap(), "acme");
    assert_eq!(company.get_str("$locale").unwrap(), "de");
    assert!(posts[0].get_document("author").unwrap().get("email").is_none());
    assert_eq!(
        backend.fetches(),
        vec![("user".to_string(), 1), ("company".to_string(), 1)]
    );
}

#[tokio::test]
async fn failed_deep_fetch_aborts_later_paths() {
    init_logging();
    let acme = doc! { "_id": ObjectId::new(), "name": "acme" };
    let alice = user("alice", Some(id_of(&acme)));
    let backend = counting(vec![
        ("post", vec![post("hello", id_of(&alice), &[id_of(&alice)])]),
        ("user", vec![alice]),
        ("company", vec![acme]),
    ])
    .await
    .failing_on("company");
    let store = ResourceStore::new(&backend, registry(), ResourceConfig::default()).unwrap();
    let request = QueryRequest::from_pairs([("populatedeep", "author,author.company,comments.author")]);

    let err = store
        .find_all("post", &request, &RequestContext::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ResourceError::Backend(_)));
    assert!(!err.is_client_error());
    assert_eq!(
        backend.fetches(),
        vec![("user".to_string(), 1), ("company".to_string(), 1)]
    );
}

#[tokio::test]
async fn failed_deep_fetch_keeps_earlier_paths() {
    let acme = doc! { "_id": ObjectId::new(), "name": "acme" };
    let alice = user("alice", Some(id_of(&acme)));
    let alice_id = id_of(&alice);
    let backend = counting(vec![("user", vec![alice]), ("company", vec![acme.clone()])])
        .await
        .failing_on("company");
    let registry = registry();
    let mut documents = DocumentSet::from(vec![post("hello", alice_id, &[alice_id])]);
    let options = DeepPopulateOptions { collection: "post".to_string(), locale: "en".to_string() };
    let paths = ["author", "author.company", "comments.author"].map(String::from);

    let err = DeepPopulationEngine::new(&backend, &registry)
        .resolve(&mut documents, &paths, &options)
        .await
        .unwrap_err();
    assert!(matches!(err, ResourceError::Backend(_)));

    let post = &documents.as_slice()[0];
    let author = post.get_document("author").unwrap();
    assert_eq!(author.get_str("name").unwrap(), "alice");
    assert_eq!(author.get_str("$locale").unwrap(), "en");
    assert_eq!(author.get_object_id("company").unwrap(), id_of(&acme));
    let comment = post.get_array("comments").unwrap()[0].as_document().unwrap();
    assert_eq!(comment.get_object_id("author").unwrap(), alice_id);
    assert_eq!(backend.fetches().len(), 2);
}

#[tokio::test]
async fn unresolvable_deep_paths_are_skipped() {
    init_logging();
    let alice = user("alice", None);
    let backend = counting(vec![
        ("post", vec![post("hello", id_of(&alice), &[id_of(&alice)])]),
        ("user", vec![alice]),
    ])
    .await;
    let store = ResourceStore::new(&backend, registry(), ResourceConfig::default()).unwrap();
    let request = QueryRequest::from_pairs([("populatedeep", "title missing.author,comments.author")]);

    let posts = store.find_all("post", &request, &RequestContext::new()).await.unwrap();

    assert_eq!(backend.fetches(), vec![("user".to_string(), 1)]);
    let comment = posts[0].get_array("comments").unwrap()[0].as_document().unwrap();
    assert_eq!(comment.get_document("author").unwrap().get_str("name").unwrap(), "alice");
}

#[tokio::test]
async fn missing_referents_leave_identifiers_in_place() {
    let ghost = ObjectId::new();
    let original = post("hello", ghost, &[ghost]);
    let backend = counting(vec![("post", vec![original.clone()])]).await;
    let store = ResourceStore::new(&backend, registry(), ResourceConfig::default()).unwrap();
    let request = QueryRequest::from_pairs([("populatedeep", "author,comments.author")]);

    let posts = store.find_all("post", &request, &RequestContext::new()).await.unwrap();

    assert_eq!(posts[0].get_object_id("author").unwrap(), ghost);
    assert_eq!(posts[0].get("comments"), original.get("comments"));
    assert_eq!(backend.fetches().len(), 2);
}

#[tokio::test]
async fn empty_results_short_circuit() {
    let backend = counting(vec![("user", vec![user("alice", None)])]).await;
    let store = ResourceStore::new(&backend, registry(), ResourceConfig::default()).unwrap();
    let request = QueryRequest::from_pairs([("populate", "author"), ("populatedeep", "comments.author")]);

    let posts = store
        .find_all("post", &request, &RequestContext::new().with_updates_since("2020-01-01"))
        .await
        .unwrap();

    assert!(posts.is_empty());
    assert_eq!(backend.query_count(), 1);
    assert!(backend.fetches().is_empty());
}

#[tokio::test]
async fn page_size_is_clamped_and_negative_skip_passes_through() {
    let posts = (0..4).map(|i| post(&format!("p{i}"), ObjectId::new(), &[])).collect();
    let backend = counting(vec![("post", posts)]).await;
    let store = ResourceStore::new(&backend, registry(), ResourceConfig::default()).unwrap();
    let request = QueryRequest::from_pairs([("limit", "5000"), ("skip", "-3")]);

    let plan = store.pipeline().plan("post", &request, &RequestContext::new()).unwrap();
    assert_eq!(plan.query.limit, Some(1000));
    assert_eq!(plan.query.skip, Some(-3));

    let found = store.find_all("post", &request, &RequestContext::new()).await.unwrap();
    assert_eq!(found.len(), 4);
}

#[tokio::test]
async fn sync_requests_include_journaled_deletes() {
    init_logging();
    let backend = InMemoryStore::new();
    let store = ResourceStore::new(&backend, registry(), ResourceConfig::default()).unwrap();
    let posts = store.collection("post").unwrap();
    let users = store.collection("user").unwrap();

    let ids = posts
        .insert(vec![
            doc! { "titleI18n": { "en": "kept" } },
            doc! { "titleI18n": { "en": "removed" } },
        ])
        .await
        .unwrap();
    let user_ids = users.insert(vec![user("alice", None)]).await.unwrap();

    store.delete_by_id("post", &ids[1].to_hex()).await.unwrap();
    store.delete_by_id("user", &user_ids[0].to_hex()).await.unwrap();

    let ctx = RequestContext::new().with_updates_since("2000-01-01T00:00:00Z");
    let result = store.find_all("post", &QueryRequest::new(), &ctx).await.unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(id_of(&result[0]), ids[0]);
    assert!(result[0].get_datetime("updated").is_ok());
    let entry = &result[1];
    assert_eq!(id_of(entry), ids[1]);
    assert_eq!(entry.get_str(MODEL_FIELD).unwrap(), "post");
    assert!(entry.get_datetime(DELETED_FIELD).is_ok());

    let later = RequestContext::new().with_updates_since("2999-01-01");
    assert!(store.find_all("post", &QueryRequest::new(), &later).await.unwrap().is_empty());

    let bad = RequestContext::new().with_updates_since("yesterday");
    assert!(matches!(
        store.find_all("post", &QueryRequest::new(), &bad).await,
        Err(ResourceError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn admin_only_fields_are_loaded_for_elevated_callers_only() {
    let hello = doc! {
        "_id": ObjectId::new(),
        "titleI18n": { "en": "hello", "de": "hallo" },
        "status": "draft",
        "secret": "launch code",
    };
    let backend = counting(vec![("post", vec![hello])]).await;
    let store = ResourceStore::new(&backend, registry(), ResourceConfig::default()).unwrap();
    let request = QueryRequest::new();

    let regular = store
        .find_all("post", &request, &RequestContext::new().with_locale_hint("de"))
        .await
        .unwrap();
    assert!(regular[0].get("secret").is_none());
    assert_eq!(regular[0].get_str("status").unwrap(), "draft");
    assert_eq!(regular[0].get_document("titleI18n").unwrap(), &doc! { "de": "hallo" });

    let elevated = store
        .find_all("post", &request, &RequestContext::new().with_locale_hint("de").elevated())
        .await
        .unwrap();
    assert_eq!(elevated[0].get_str("secret").unwrap(), "launch code");
    assert_eq!(elevated[0].get_str("status").unwrap(), "draft");
    assert_eq!(elevated[0].get_document("titleI18n").unwrap(), &doc! { "de": "hallo" });
}

#[tokio::test]
async fn find_by_id_validates_and_reports_missing_documents() {
    let alice = user("alice", None);
    let hello = post("hello", id_of(&alice), &[]);
    let backend = InMemoryStore::builder()
        .with_documents("post", vec![hello.clone()])
        .with_documents("user", vec![alice])
        .build()
        .await
        .unwrap();
    let store = ResourceStore::new(backend, registry(), ResourceConfig::default()).unwrap();
    let ctx = RequestContext::new();
    let request = QueryRequest::from_pairs([("populatedeep", "author")]);

    let found = store
        .find_by_id("post", &id_of(&hello).to_hex(), &request, &ctx)
        .await
        .unwrap();
    assert_eq!(found.get_document("author").unwrap().get_str("name").unwrap(), "alice");

    let err = store.find_by_id("post", "", &request, &ctx).await.unwrap_err();
    assert!(matches!(err, ResourceError::MissingParameter(_)));

    let err = store.find_by_id("post", "not-an-id", &request, &ctx).await.unwrap_err();
    assert!(matches!(err, ResourceError::InvalidArgument(_)));
    assert!(err.is_client_error());

    let err = store
        .find_by_id("post", &ObjectId::new().to_hex(), &request, &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, ResourceError::ResourceNotFound(..)));

    let err = store
        .find_by_id("nope", &id_of(&hello).to_hex(), &request, &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, ResourceError::CollectionNotFound(_)));
}

#[tokio::test]
async fn delete_by_id_journals_once() {
    let hello = post("hello", ObjectId::new(), &[]);
    let id = id_of(&hello);
    let backend = InMemoryStore::builder()
        .with_documents("post", vec![hello])
        .build()
        .await
        .unwrap();
    let store = ResourceStore::new(&backend, registry(), ResourceConfig::default()).unwrap();

    store.delete_by_id("post", &id.to_hex()).await.unwrap();
    let err = store.delete_by_id("post", &id.to_hex()).await.unwrap_err();
    assert!(matches!(err, ResourceError::ResourceNotFound(..)));

    let journal = backend
        .query_documents(Query::new(), DEFAULT_JOURNAL_COLLECTION)
        .await
        .unwrap();
    assert_eq!(journal.len(), 1);
    assert_eq!(id_of(&journal[0]), id);
    let first = *journal[0].get_datetime(DELETED_FIELD).unwrap();

    // Deleting a journaled id again refreshes its entry.
    std::thread::sleep(Duration::from_millis(5));
    store
        .collection("post")
        .unwrap()
        .delete(vec![id])
        .await
        .unwrap();
    let journal = backend
        .query_documents(Query::new(), DEFAULT_JOURNAL_COLLECTION)
        .await
        .unwrap();
    assert_eq!(journal.len(), 1);
    assert!(*journal[0].get_datetime(DELETED_FIELD).unwrap() > first);
}

#[tokio::test]
async fn recreated_and_deleted_documents_reach_later_syncs() {
    let backend = InMemoryStore::new();
    let store = ResourceStore::new(&backend, registry(), ResourceConfig::default()).unwrap();
    let posts = store.collection("post").unwrap();
    let journal = DeleteJournal::new(&backend, DEFAULT_JOURNAL_COLLECTION);

    let ids = posts
        .insert(vec![doc! { "titleI18n": { "en": "phoenix" } }])
        .await
        .unwrap();
    store.delete_by_id("post", &ids[0].to_hex()).await.unwrap();
    let first = *journal
        .deleted_since("post", DateTime::MIN)
        .await
        .unwrap()[0]
        .get_datetime(DELETED_FIELD)
        .unwrap();

    std::thread::sleep(Duration::from_millis(5));
    posts
        .insert(vec![doc! { "_id": ids[0], "titleI18n": { "en": "phoenix" } }])
        .await
        .unwrap();
    store.delete_by_id("post", &ids[0].to_hex()).await.unwrap();

    let since = DateTime::from_millis(first.timestamp_millis() + 1);
    let entries = journal.deleted_since("post", since).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(id_of(&entries[0]), ids[0]);
    assert_eq!(entries[0].get_str(MODEL_FIELD).unwrap(), "post");
}

#[tokio::test]
async fn unknown_journal_collection_is_a_configuration_error() {
    let config = ResourceConfig::builder().with_journal_collection("trash").build();
    let err = ResourceStore::new(InMemoryStore::new(), registry(), config).unwrap_err();
    assert!(matches!(err, ResourceError::Configuration(_)));
}

//! Integration tests for the sled-backed entity store

use super::test_utils::{mark, mastery, page, user};
use pageload::store::{Fixture, ListingQuery, RecordSink, RecordSource, SledEntityStore};
use pageload::types::{MasteryId, PageId, UserId};
use pageload::{
    EntityMaps, LoadPipeline, MasteryOptions, PageOptions, ResolveOptions, ViewerContext,
};
use std::sync::Arc;
use tempfile::TempDir;

const FIXTURE: &str = r#"{
    "pages": [
        {"page_id": "p1", "page_type": "wiki", "title": "Bayes' rule", "creator_id": "u9",
         "created_at": "2016-01-01T00:00:00Z", "text": "Odds form [todo: example]",
         "link_ids": ["p2", "nowhere"], "requirement_ids": ["p2"]},
        {"page_id": "p2", "page_type": "wiki", "title": "Probability", "creator_id": "u8",
         "created_at": "2016-01-02T00:00:00Z"}
    ],
    "users": [
        {"user_id": "u9", "first_name": "Thomas", "last_name": "Bayes"},
        {"user_id": "u8", "first_name": "Pierre", "last_name": "Laplace"}
    ],
    "masteries": [
        {"mastery_id": "p2", "user_id": "u1", "has": true, "level": 2,
         "updated_at": "2016-02-01T00:00:00Z"}
    ]
}"#;

fn open_store(temp_dir: &TempDir) -> Arc<SledEntityStore> {
    Arc::new(SledEntityStore::new(temp_dir.path().join("store")).unwrap())
}

#[tokio::test]
async fn test_fixture_import_then_resolve() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir);
    let summary = Fixture::from_json(FIXTURE)
        .unwrap()
        .apply(store.as_ref())
        .unwrap();
    assert_eq!(summary.pages, 2);
    assert_eq!(summary.masteries, 1);

    let mut maps = EntityMaps::new();
    maps.stage_page("p1", PageOptions::PRIMARY_PAGE);
    let report = LoadPipeline::new(store.clone())
        .resolve(&ViewerContext::user("u1"), &mut maps, &ResolveOptions::default())
        .await
        .unwrap();

    assert!(maps.is_saturated());
    // p1, then its links and prerequisite, then the prerequisite's author.
    assert_eq!(report.iterations, 3);

    let primary = maps.pages.get(&PageId::new("p1")).unwrap();
    assert_eq!(primary.red_link_count, Some(1));
    assert_eq!(primary.todo_count, Some(1));
    assert_eq!(primary.requirement_ids.as_deref(), Some(&[PageId::new("p2")][..]));

    let requisite = maps.pages.get(&PageId::new("p2")).unwrap();
    assert_eq!(requisite.title.as_deref(), Some("Probability"));
    assert!(requisite.text.is_none());

    let known = maps.masteries.get(&MasteryId::new("p2")).unwrap();
    assert_eq!(known.level, Some(2));
    assert!(maps.users.get(&UserId::new("u8")).is_some());
}

#[tokio::test]
async fn test_rows_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    {
        let store = open_store(&temp_dir);
        store.put_page(&page("p1", "u1")).unwrap();
        store.put_user(&user("u1")).unwrap();
        store.put_mastery(&mastery("u1", "p1", 1)).unwrap();
        store.flush().unwrap();
    }

    let store = open_store(&temp_dir);
    assert_eq!(store.page_count(), 1);
    assert!(store.page_record(&PageId::new("p1")).unwrap().is_some());
    assert!(store
        .mastery_record(&UserId::new("u1"), &MasteryId::new("p1"))
        .unwrap()
        .is_some());
    assert!(store
        .mastery_record(&UserId::new("u2"), &MasteryId::new("p1"))
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_marks_are_scoped_to_their_page() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir);
    store.put_page(&page("p1", "u1")).unwrap();
    store.put_page(&page("p10", "u1")).unwrap();
    store.put_user(&user("u1")).unwrap();
    store.put_user(&user("u2")).unwrap();
    store.put_mark(&mark("p1", "m1", "u2", None)).unwrap();
    store.put_mark(&mark("p10", "m2", "u3", None)).unwrap();

    assert_eq!(store.marks_for_page(&PageId::new("p1")).unwrap().len(), 1);

    let mut maps = EntityMaps::new();
    maps.stage_page("p1", PageOptions::ALL_MARKS);
    LoadPipeline::new(store.clone())
        .resolve(&ViewerContext::anonymous(), &mut maps, &ResolveOptions::default())
        .await
        .unwrap();

    let marks = maps.pages.get(&PageId::new("p1")).unwrap().marks.clone().unwrap();
    assert_eq!(marks.len(), 1);
    assert!(maps.users.get(&UserId::new("u2")).is_some());
    assert!(!maps.users.contains(&UserId::new("u3")));
}

#[tokio::test]
async fn test_listing_and_masteries_match_memory_semantics() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir);
    Fixture::from_json(FIXTURE)
        .unwrap()
        .apply(store.as_ref())
        .unwrap();

    let mut maps = EntityMaps::new();
    maps.stage_mastery("p2", MasteryOptions::LEVEL);
    let listing = LoadPipeline::new(store.clone())
        .load_listing(
            &ViewerContext::anonymous(),
            &mut maps,
            &ListingQuery::Recent { limit: 1 },
            PageOptions::TITLE,
            &ResolveOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(listing.page_ids, vec![PageId::new("p2")]);
    assert!(maps.masteries.is_tombstone(&MasteryId::new("p2")));
}

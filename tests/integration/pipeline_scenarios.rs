//! End-to-end resolve scenarios against the in-memory store

use super::test_utils::{at, mark, mastery, page, store_with, user};
use async_trait::async_trait;
use pageload::entity::{Mastery, Page, PageType, User};
use pageload::error::StorageError;
use pageload::store::{
    EntityKind, EntityStore, ListingQuery, MasteryBatch, MemoryEntityStore, PageBatch,
    RecordSink, UserBatch,
};
use pageload::types::{MasteryId, PageId, UserId};
use pageload::{
    fetch_page, CancelFlag, EntityMaps, LoadError, LoadPipeline, MasteryOptions, PageOptions,
    ResolveOptions, ResultBundle, StageOutcome, UserOptions, ViewerContext, VisibilityScope,
};
use pageload::config::PipelineConfig;
use std::sync::Arc;

fn pipeline(store: &Arc<MemoryEntityStore>) -> LoadPipeline {
    LoadPipeline::new(store.clone())
}

fn pipeline_with_cap(store: &Arc<MemoryEntityStore>, max_iterations: usize) -> LoadPipeline {
    let config = PipelineConfig {
        max_iterations,
        ..PipelineConfig::default()
    };
    LoadPipeline::with_config(store.clone(), config)
}

#[tokio::test]
async fn test_creator_loaded_in_second_iteration() {
    let store = store_with(vec![page("p1", "u9")], vec![user("u9")]);
    let mut maps = EntityMaps::new();
    maps.stage_page("p1", PageOptions::TITLE);

    let report = pipeline(&store)
        .resolve(&ViewerContext::user("u1"), &mut maps, &ResolveOptions::default())
        .await
        .unwrap();

    assert_eq!(report.iterations, 2);
    assert_eq!(report.page_queries, 1);
    assert_eq!(report.user_queries, 1);
    let author = maps.users.get(&UserId::new("u9")).unwrap();
    assert_eq!(author.first_name.as_deref(), Some("First u9"));
    assert_eq!(
        maps.users.entry(&UserId::new("u9")).unwrap().requested(),
        &UserOptions::NAME
    );
}

#[tokio::test]
async fn test_missing_page_becomes_tombstone() {
    let store = store_with(vec![], vec![]);
    let mut maps = EntityMaps::new();
    maps.stage_page("p2", PageOptions::ALL_MARKS);

    let report = pipeline(&store)
        .resolve(&ViewerContext::anonymous(), &mut maps, &ResolveOptions::default())
        .await
        .unwrap();

    assert_eq!(report.iterations, 1);
    assert_eq!(report.tombstoned, 1);
    assert!(maps.pages.is_tombstone(&PageId::new("p2")));
    assert!(maps.pages.get(&PageId::new("p2")).is_none());
    assert!(maps.users.is_empty());
}

#[tokio::test]
async fn test_listing_issues_one_page_query_per_iteration() {
    let mut pages = Vec::new();
    for (n, id) in ["p3", "p4", "p5"].iter().enumerate() {
        let mut record = page(id, "u1");
        record.tag_ids = vec![PageId::new("t1")];
        record.created_at = at(n as u32 + 1);
        pages.push(record);
    }
    pages.push(page("t1", "u1"));
    let mut comment = page("c1", "u2");
    comment.page_type = PageType::Comment;
    comment.tag_ids = vec![PageId::new("t1")];
    comment.created_at = at(10);
    pages.push(comment);
    let store = store_with(pages, vec![user("u1"), user("u2")]);

    let viewer = ViewerContext::user("u1");
    let mut maps = EntityMaps::new();
    let listing = pipeline(&store)
        .load_listing(
            &viewer,
            &mut maps,
            &ListingQuery::TaggedWith {
                tag_id: PageId::new("t1"),
                limit: 10,
            },
            PageOptions::TITLE_PLUS,
            &ResolveOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(
        listing.page_ids,
        vec![PageId::new("p5"), PageId::new("p4"), PageId::new("p3")]
    );
    let report = listing.report;
    assert_eq!(report.iterations, 2);
    assert_eq!(report.page_queries, 2);
    assert_eq!(report.user_queries, 1);

    let page_queries: Vec<_> = store
        .query_log()
        .into_iter()
        .filter(|entry| entry.kind == EntityKind::Page)
        .collect();
    assert_eq!(page_queries[0].ids, vec!["p3", "p4", "p5"]);
    assert_eq!(page_queries[1].ids, vec!["t1"]);

    assert!(maps.pages.get(&PageId::new("t1")).is_some());
    assert!(!maps.pages.contains(&PageId::new("c1")));
    assert!(!maps.users.contains(&UserId::new("u2")));
}

#[tokio::test]
async fn test_listing_may_include_comments_when_configured() {
    let mut comment = page("c1", "u2");
    comment.page_type = PageType::Comment;
    let store = store_with(vec![comment], vec![user("u2")]);
    let config = PipelineConfig {
        exclude_comments_in_listings: false,
        ..PipelineConfig::default()
    };
    let pipeline = LoadPipeline::with_config(store.clone(), config);

    let mut maps = EntityMaps::new();
    let listing = pipeline
        .load_listing(
            &ViewerContext::anonymous(),
            &mut maps,
            &ListingQuery::Recent { limit: 5 },
            PageOptions::TITLE,
            &ResolveOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(listing.page_ids, vec![PageId::new("c1")]);
}

#[tokio::test]
async fn test_requirement_cycle_terminates() {
    let mut a = page("a", "u1");
    a.requirement_ids = vec![PageId::new("b")];
    let mut b = page("b", "u1");
    b.requirement_ids = vec![PageId::new("a")];
    let store = store_with(vec![a, b], vec![user("u1")]);
    store.put_mastery(&mastery("u1", "b", 2)).unwrap();

    let mut maps = EntityMaps::new();
    maps.stage_page("a", PageOptions::REQUISITE);
    let report = pipeline(&store)
        .resolve(&ViewerContext::user("u1"), &mut maps, &ResolveOptions::default())
        .await
        .unwrap();

    assert_eq!(report.iterations, 3);
    assert!(maps.is_saturated());
    let queried_a = store
        .query_log()
        .iter()
        .filter(|entry| entry.kind == EntityKind::Page && entry.ids.contains(&"a".to_string()))
        .count();
    assert_eq!(queried_a, 1);

    let known = maps.masteries.get(&MasteryId::new("b")).unwrap();
    assert_eq!(known.level, Some(2));
    assert!(maps.masteries.is_tombstone(&MasteryId::new("a")));
}

#[tokio::test]
async fn test_duplicate_staging_queries_once() {
    let store = store_with(vec![page("p1", "u1")], vec![user("u1")]);
    let mut maps = EntityMaps::new();
    assert_eq!(maps.stage_page("p1", PageOptions::TITLE), StageOutcome::Inserted);
    assert_eq!(maps.stage_page("p1", PageOptions::TITLE), StageOutcome::Unchanged);

    pipeline(&store)
        .resolve(&ViewerContext::anonymous(), &mut maps, &ResolveOptions::default())
        .await
        .unwrap();

    assert_eq!(store.query_count(EntityKind::Page), 1);
    assert_eq!(store.query_log()[0].ids, vec!["p1"]);
}

#[tokio::test]
async fn test_growth_after_resolve_requeries_merged_options() {
    let store = store_with(vec![page("p1", "u1")], vec![user("u1")]);
    let pipeline = pipeline(&store);
    let viewer = ViewerContext::anonymous();
    let mut maps = EntityMaps::new();

    maps.stage_page("p1", PageOptions::TITLE);
    pipeline
        .resolve(&viewer, &mut maps, &ResolveOptions::default())
        .await
        .unwrap();
    assert!(maps.pages.get(&PageId::new("p1")).unwrap().text.is_none());

    assert_eq!(
        maps.stage_page("p1", PageOptions::NONE.with_text()),
        StageOutcome::Grown
    );
    assert!(!maps.pages.is_resolved(&PageId::new("p1")));

    let report = pipeline
        .resolve(&viewer, &mut maps, &ResolveOptions::default())
        .await
        .unwrap();
    assert_eq!(report.page_queries, 1);
    let loaded = maps.pages.get(&PageId::new("p1")).unwrap();
    assert_eq!(loaded.title.as_deref(), Some("Title of p1"));
    assert_eq!(loaded.text.as_deref(), Some("Body of p1"));
    assert_eq!(
        maps.pages.entry(&PageId::new("p1")).unwrap().resolved(),
        Some(&PageOptions::COMMENT)
    );
}

#[tokio::test]
async fn test_title_growth_fetches_title() {
    let store = store_with(vec![page("p1", "u1")], vec![user("u1")]);
    let pipeline = pipeline(&store);
    let viewer = ViewerContext::anonymous();
    let mut maps = EntityMaps::new();

    maps.stage_page("p1", PageOptions::NONE.with_text());
    pipeline
        .resolve(&viewer, &mut maps, &ResolveOptions::default())
        .await
        .unwrap();
    let body_only = maps.pages.get(&PageId::new("p1")).unwrap();
    assert!(body_only.title.is_none());
    assert!(body_only.text.is_some());

    assert_eq!(maps.stage_page("p1", PageOptions::TITLE), StageOutcome::Grown);
    pipeline
        .resolve(&viewer, &mut maps, &ResolveOptions::default())
        .await
        .unwrap();
    let loaded = maps.pages.get(&PageId::new("p1")).unwrap();
    assert_eq!(loaded.title.as_deref(), Some("Title of p1"));
    assert!(loaded.text.is_some());
}

#[tokio::test]
async fn test_every_entry_resolved_after_success() {
    let mut primary = page("p1", "u1");
    primary.parent_ids = vec![PageId::new("p0"), PageId::new("gone")];
    primary.lens_ids = vec![PageId::new("l1")];
    primary.comment_ids = vec![PageId::new("c1")];
    primary.subject_ids = vec![PageId::new("s1")];
    let mut lens = page("l1", "u2");
    lens.page_type = PageType::Lens;
    lens.requirement_ids = vec![PageId::new("r1")];
    let mut comment = page("c1", "u3");
    comment.page_type = PageType::Comment;
    let mut deleted = page("gone", "u1");
    deleted.is_deleted = true;
    let store = store_with(
        vec![primary, page("p0", "u1"), lens, comment, deleted, page("s1", "u1"), page("r1", "u4")],
        vec![user("u1"), user("u2"), user("u3"), user("u4")],
    );
    store.put_mark(&mark("p1", "m1", "u5", Some("u1"))).unwrap();

    let mut bundle = ResultBundle::new(ViewerContext::user("u1"));
    bundle.maps.stage_page("p1", PageOptions::PRIMARY_PAGE);
    let report = pipeline(&store)
        .resolve_bundle(&mut bundle, &ResolveOptions::default())
        .await
        .unwrap();

    let maps = &bundle.maps;
    assert!(maps.is_saturated());
    assert_eq!(maps.unresolved_count(), 0);
    assert!(report.iterations <= 4);

    // Lens inherits body text because the primary page requested text.
    let lens = maps.pages.get(&PageId::new("l1")).unwrap();
    assert!(lens.text.is_some());
    assert!(maps.pages.get(&PageId::new("r1")).is_some());
    assert!(maps.pages.get(&PageId::new("c1")).unwrap().text.is_some());
    assert!(maps.pages.is_tombstone(&PageId::new("gone")));

    // Mark creator u5 has no user row.
    assert!(maps.users.is_tombstone(&UserId::new("u5")));
    assert!(maps.users.get(&UserId::new("u4")).is_some());

    let json = bundle.to_json().unwrap();
    assert_eq!(json["pages"]["gone"]["state"], "tombstone");
    assert_eq!(json["masteries"]["s1"]["state"], "tombstone");
}

#[tokio::test]
async fn test_iteration_cap_on_long_prerequisite_chain() {
    let mut pages = Vec::new();
    for n in 0..10 {
        let mut record = page(&format!("p{}", n), "u1");
        record.requirement_ids = vec![PageId::new(format!("p{}", n + 1))];
        pages.push(record);
    }
    let store = store_with(pages, vec![user("u1")]);

    let mut maps = EntityMaps::new();
    maps.stage_page("p0", PageOptions::REQUISITE);
    let result = pipeline_with_cap(&store, 3)
        .resolve(&ViewerContext::anonymous(), &mut maps, &ResolveOptions::default())
        .await;

    match result {
        Err(LoadError::IterationCapExceeded { cap, pending }) => {
            assert_eq!(cap, 3);
            assert!(pending > 0);
        }
        other => panic!("expected iteration cap error, got {:?}", other),
    }
    assert_eq!(store.query_count(EntityKind::Page), 3);
}

#[tokio::test]
async fn test_deep_chain_needs_raised_cap() {
    let depth = 40;
    let mut pages = Vec::new();
    for n in 0..depth {
        let mut record = page(&format!("p{}", n), "u1");
        if n + 1 < depth {
            record.requirement_ids = vec![PageId::new(format!("p{}", n + 1))];
        }
        pages.push(record);
    }
    let store = store_with(pages, vec![user("u1")]);

    let mut maps = EntityMaps::new();
    maps.stage_page("p0", PageOptions::REQUISITE);
    let result = pipeline(&store)
        .resolve(&ViewerContext::anonymous(), &mut maps, &ResolveOptions::default())
        .await;
    assert!(matches!(
        result,
        Err(LoadError::IterationCapExceeded { cap: 32, .. })
    ));

    let mut maps = EntityMaps::new();
    maps.stage_page("p0", PageOptions::REQUISITE);
    let report = pipeline_with_cap(&store, 64)
        .resolve(&ViewerContext::anonymous(), &mut maps, &ResolveOptions::default())
        .await
        .unwrap();
    assert!(report.iterations > 32);
    assert!(maps.pages.get(&PageId::new("p39")).is_some());
}

#[tokio::test]
async fn test_storage_failure_aborts_resolve() {
    let store = store_with(vec![page("p1", "u1")], vec![user("u1")]);
    store.fail_queries(EntityKind::User);

    let mut maps = EntityMaps::new();
    maps.stage_page("p1", PageOptions::TITLE);
    let result = pipeline(&store)
        .resolve(&ViewerContext::anonymous(), &mut maps, &ResolveOptions::default())
        .await;
    assert!(matches!(result, Err(LoadError::Storage(StorageError::Backend(_)))));
}

/// Store wrapper that trips a cancel flag after answering its first page query
struct CancellingStore {
    inner: Arc<MemoryEntityStore>,
    cancel: CancelFlag,
}

#[async_trait]
impl EntityStore for CancellingStore {
    async fn query_pages(&self, batch: &PageBatch) -> Result<Vec<Page>, StorageError> {
        let pages = self.inner.query_pages(batch).await?;
        self.cancel.cancel();
        Ok(pages)
    }

    async fn query_users(&self, batch: &UserBatch) -> Result<Vec<User>, StorageError> {
        self.inner.query_users(batch).await
    }

    async fn query_masteries(&self, batch: &MasteryBatch) -> Result<Vec<Mastery>, StorageError> {
        self.inner.query_masteries(batch).await
    }

    async fn list_pages(
        &self,
        query: &ListingQuery,
        scope: &VisibilityScope,
    ) -> Result<Vec<PageId>, StorageError> {
        self.inner.list_pages(query, scope).await
    }
}

#[tokio::test]
async fn test_cancellation_between_iterations() {
    let inner = store_with(vec![page("p1", "u9")], vec![user("u9")]);
    let cancel = CancelFlag::new();
    let store = Arc::new(CancellingStore {
        inner: inner.clone(),
        cancel: cancel.clone(),
    });

    let mut maps = EntityMaps::new();
    maps.stage_page("p1", PageOptions::TITLE);
    let result = LoadPipeline::new(store)
        .resolve(
            &ViewerContext::anonymous(),
            &mut maps,
            &ResolveOptions::default().with_cancel(cancel),
        )
        .await;

    assert!(matches!(result, Err(LoadError::Cancelled { iteration: 2 })));
    assert_eq!(inner.query_count(EntityKind::User), 0);
}

#[tokio::test]
async fn test_fetch_page_agrees_with_pipeline_visibility() {
    let mut restricted = page("secret", "u1");
    restricted.see_domain_id = Some("math".into());
    let mut deleted = page("gone", "u1");
    deleted.is_deleted = true;
    let store = store_with(
        vec![page("open", "u1"), restricted, deleted],
        vec![user("u1")],
    );

    let viewers = [
        ViewerContext::anonymous(),
        ViewerContext::user("u2"),
        ViewerContext::user("u3").with_domain("math"),
        ViewerContext::user("root").with_admin(true),
    ];
    for viewer in &viewers {
        let mut maps = EntityMaps::new();
        for id in ["open", "secret", "gone", "absent"] {
            maps.stage_page(id, PageOptions::TITLE);
        }
        pipeline(&store)
            .resolve(viewer, &mut maps, &ResolveOptions::default())
            .await
            .unwrap();

        for id in ["open", "secret", "gone", "absent"] {
            let page_id = PageId::new(id);
            let direct = fetch_page(store.as_ref(), viewer, &page_id, PageOptions::TITLE)
                .await
                .unwrap();
            assert_eq!(
                direct.as_ref(),
                maps.pages.get(&page_id),
                "viewer {:?} disagrees on {}",
                viewer,
                id
            );
        }
    }
}

#[tokio::test]
async fn test_masteries_need_a_signed_in_viewer() {
    let mut lesson = page("p1", "u1");
    lesson.subject_ids = vec![PageId::new("s1")];
    let store = store_with(vec![lesson, page("s1", "u1")], vec![user("u1")]);
    store.put_mastery(&mastery("u1", "s1", 3)).unwrap();

    let mut anonymous = EntityMaps::new();
    anonymous.stage_page("p1", PageOptions::LENS);
    pipeline(&store)
        .resolve(&ViewerContext::anonymous(), &mut anonymous, &ResolveOptions::default())
        .await
        .unwrap();
    assert!(anonymous.masteries.is_tombstone(&MasteryId::new("s1")));

    let mut signed_in = EntityMaps::new();
    signed_in.stage_page("p1", PageOptions::LENS);
    signed_in.stage_mastery("s1", MasteryOptions::FULL);
    pipeline(&store)
        .resolve(&ViewerContext::user("u1"), &mut signed_in, &ResolveOptions::default())
        .await
        .unwrap();
    let known = signed_in.masteries.get(&MasteryId::new("s1")).unwrap();
    assert_eq!(known.has, Some(true));
    assert!(known.updated_at.is_some());
}

//! Shared row builders and store setup for integration tests

use chrono::{DateTime, TimeZone, Utc};
use pageload::entity::{Mark, PageType};
use pageload::store::{MasteryRecord, MemoryEntityStore, PageRecord, RecordSink, UserRecord};
use pageload::types::{MarkId, MasteryId, PageId, UserId};
use std::sync::Arc;

/// Deterministic creation time; larger `n` is newer
pub fn at(n: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::minutes(n as i64)
}

pub fn page(id: &str, creator: &str) -> PageRecord {
    PageRecord {
        page_id: PageId::new(id),
        page_type: PageType::Wiki,
        title: format!("Title of {}", id),
        clickbait: String::new(),
        creator_id: UserId::new(creator),
        created_at: at(0),
        see_domain_id: None,
        is_deleted: false,
        summary: format!("Summary of {}", id),
        text: format!("Body of {}", id),
        link_ids: vec![],
        parent_ids: vec![],
        child_ids: vec![],
        tag_ids: vec![],
        lens_ids: vec![],
        comment_ids: vec![],
        requirement_ids: vec![],
        subject_ids: vec![],
        edits: vec![],
    }
}

pub fn user(id: &str) -> UserRecord {
    UserRecord {
        user_id: UserId::new(id),
        first_name: format!("First {}", id),
        last_name: format!("Last {}", id),
        bio: String::new(),
        profile_page_id: None,
        domain_ids: vec![],
    }
}

pub fn mastery(user_id: &str, page_id: &str, level: u8) -> MasteryRecord {
    MasteryRecord {
        mastery_id: MasteryId::new(page_id),
        user_id: UserId::new(user_id),
        has: level > 0,
        wants: false,
        level,
        updated_at: at(0),
    }
}

pub fn mark(page_id: &str, mark_id: &str, creator: &str, resolved_by: Option<&str>) -> Mark {
    Mark {
        mark_id: MarkId::new(mark_id),
        page_id: PageId::new(page_id),
        creator_id: UserId::new(creator),
        text: "Confusing step".to_string(),
        resolved_by: resolved_by.map(UserId::new),
    }
}

/// Memory store seeded with the given rows
pub fn store_with(pages: Vec<PageRecord>, users: Vec<UserRecord>) -> Arc<MemoryEntityStore> {
    let store = Arc::new(MemoryEntityStore::new());
    for record in &pages {
        store.put_page(record).unwrap();
    }
    for record in &users {
        store.put_user(record).unwrap();
    }
    store
}

//! Entity Store
//!
//! Query executor abstraction the pipeline is injected with. A store answers
//! one batched query per call and applies the caller's `VisibilityScope` to
//! every row it returns; rows it omits resolve as tombstones.
//!
//! The two implementations share one synchronous core (`RecordSource` plus the
//! `select_*` functions) so visibility and projection rules cannot drift.

pub mod fixture;
pub mod memory;
pub mod persistence;

pub use fixture::Fixture;
pub use memory::{MemoryEntityStore, QueryLogEntry};
pub use persistence::SledEntityStore;

use crate::entity::{Edit, Mark, Mastery, Page, PageType, User};
use crate::error::StorageError;
use crate::options::{MasteryOptions, PageOptions, UserOptions};
use crate::types::{DomainId, MasteryId, PageId, UserId};
use crate::viewer::VisibilityScope;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Entity kind enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Page,
    User,
    Mastery,
    Listing,
}

/// Stored page row with every field, independent of load options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub page_id: PageId,
    pub page_type: PageType,
    pub title: String,
    #[serde(default)]
    pub clickbait: String,
    pub creator_id: UserId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub see_domain_id: Option<DomainId>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub link_ids: Vec<PageId>,
    #[serde(default)]
    pub parent_ids: Vec<PageId>,
    #[serde(default)]
    pub child_ids: Vec<PageId>,
    #[serde(default)]
    pub tag_ids: Vec<PageId>,
    #[serde(default)]
    pub lens_ids: Vec<PageId>,
    #[serde(default)]
    pub comment_ids: Vec<PageId>,
    #[serde(default)]
    pub requirement_ids: Vec<PageId>,
    #[serde(default)]
    pub subject_ids: Vec<PageId>,
    #[serde(default)]
    pub edits: Vec<Edit>,
}

impl PageRecord {
    pub fn is_visible_to(&self, scope: &VisibilityScope) -> bool {
        scope.admits(self.page_type, self.see_domain_id.as_ref(), self.is_deleted)
    }

    /// Number of `[todo: ...]` markers left in the body
    pub fn todo_count(&self) -> u32 {
        self.text.matches("[todo:").count() as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: UserId,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub profile_page_id: Option<PageId>,
    #[serde(default)]
    pub domain_ids: Vec<DomainId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasteryRecord {
    pub mastery_id: MasteryId,
    pub user_id: UserId,
    #[serde(default)]
    pub has: bool,
    #[serde(default)]
    pub wants: bool,
    #[serde(default)]
    pub level: u8,
    pub updated_at: DateTime<Utc>,
}

/// One batched page query: every id shares the same options
#[derive(Debug, Clone, PartialEq)]
pub struct PageBatch {
    pub ids: Vec<PageId>,
    pub options: PageOptions,
    pub scope: VisibilityScope,
}

/// User rows are public; every existing user is returned whatever the scope.
#[derive(Debug, Clone, PartialEq)]
pub struct UserBatch {
    pub ids: Vec<UserId>,
    pub options: UserOptions,
    pub scope: VisibilityScope,
}

/// Masteries are per viewer; an anonymous viewer has none.
#[derive(Debug, Clone, PartialEq)]
pub struct MasteryBatch {
    pub ids: Vec<MasteryId>,
    pub options: MasteryOptions,
    pub user_id: Option<UserId>,
}

/// Custom listing queries used by dashboard-style handlers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ListingQuery {
    Recent { limit: usize },
    ByCreator { creator_id: UserId, limit: usize },
    ChildrenOf { parent_id: PageId, limit: usize },
    TaggedWith { tag_id: PageId, limit: usize },
}

impl ListingQuery {
    pub fn limit(&self) -> usize {
        match self {
            ListingQuery::Recent { limit }
            | ListingQuery::ByCreator { limit, .. }
            | ListingQuery::ChildrenOf { limit, .. }
            | ListingQuery::TaggedWith { limit, .. } => *limit,
        }
    }

    fn matches(&self, record: &PageRecord) -> bool {
        match self {
            ListingQuery::Recent { .. } => true,
            ListingQuery::ByCreator { creator_id, .. } => record.creator_id == *creator_id,
            ListingQuery::ChildrenOf { parent_id, .. } => record.parent_ids.contains(parent_id),
            ListingQuery::TaggedWith { tag_id, .. } => record.tag_ids.contains(tag_id),
        }
    }
}

/// Entity store interface
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Visible pages among `batch.ids`, projected to `batch.options`
    async fn query_pages(&self, batch: &PageBatch) -> Result<Vec<Page>, StorageError>;

    async fn query_users(&self, batch: &UserBatch) -> Result<Vec<User>, StorageError>;

    async fn query_masteries(&self, batch: &MasteryBatch) -> Result<Vec<Mastery>, StorageError>;

    /// Ordered page ids for a listing, newest first
    async fn list_pages(
        &self,
        query: &ListingQuery,
        scope: &VisibilityScope,
    ) -> Result<Vec<PageId>, StorageError>;
}

/// Synchronous row access shared by the store implementations
pub trait RecordSource {
    fn page_record(&self, page_id: &PageId) -> Result<Option<PageRecord>, StorageError>;

    fn page_records(&self) -> Result<Vec<PageRecord>, StorageError>;

    fn marks_for_page(&self, page_id: &PageId) -> Result<Vec<Mark>, StorageError>;

    fn user_record(&self, user_id: &UserId) -> Result<Option<UserRecord>, StorageError>;

    fn mastery_record(
        &self,
        user_id: &UserId,
        mastery_id: &MasteryId,
    ) -> Result<Option<MasteryRecord>, StorageError>;
}

/// Row writes used by fixture import
pub trait RecordSink {
    fn put_page(&self, record: &PageRecord) -> Result<(), StorageError>;
    fn put_user(&self, record: &UserRecord) -> Result<(), StorageError>;
    fn put_mastery(&self, record: &MasteryRecord) -> Result<(), StorageError>;
    fn put_mark(&self, mark: &Mark) -> Result<(), StorageError>;
}

fn page_exists<S: RecordSource + ?Sized>(
    source: &S,
    page_id: &PageId,
) -> Result<bool, StorageError> {
    Ok(source
        .page_record(page_id)?
        .map(|record| !record.is_deleted)
        .unwrap_or(false))
}

fn when<T>(flag: bool, value: impl FnOnce() -> T) -> Option<T> {
    if flag {
        Some(value())
    } else {
        None
    }
}

/// Project a stored row to the detail requested by `options`.
pub fn project_page<S: RecordSource + ?Sized>(
    source: &S,
    record: &PageRecord,
    options: &PageOptions,
) -> Result<Page, StorageError> {
    let red_link_count = if options.red_link_count {
        let mut missing = 0u32;
        for link_id in &record.link_ids {
            if !page_exists(source, link_id)? {
                missing += 1;
            }
        }
        Some(missing)
    } else {
        None
    };

    let marks = if options.all_marks {
        Some(source.marks_for_page(&record.page_id)?)
    } else {
        None
    };

    let edits = when(options.edit_history > 0, || {
        let mut edits = record.edits.clone();
        edits.sort_by(|a, b| b.edit_number.cmp(&a.edit_number));
        edits.truncate(options.edit_history as usize);
        edits
    });

    Ok(Page {
        page_id: record.page_id.clone(),
        page_type: record.page_type,
        title: when(options.title, || record.title.clone()),
        clickbait: when(options.title, || record.clickbait.clone()),
        creator_id: record.creator_id.clone(),
        created_at: record.created_at,
        see_domain_id: record.see_domain_id.clone(),
        summary: when(options.summaries, || record.summary.clone()),
        text: when(options.text, || record.text.clone()),
        link_ids: when(options.links, || record.link_ids.clone()),
        red_link_count,
        todo_count: when(options.todo_count, || record.todo_count()),
        parent_ids: when(options.parents, || record.parent_ids.clone()),
        child_ids: when(options.children, || record.child_ids.clone()),
        tag_ids: when(options.tags, || record.tag_ids.clone()),
        lens_ids: when(options.lenses, || record.lens_ids.clone()),
        comment_ids: when(options.comments, || record.comment_ids.clone()),
        requirement_ids: when(options.requirements, || record.requirement_ids.clone()),
        subject_ids: when(options.subjects, || record.subject_ids.clone()),
        marks,
        edits,
    })
}

pub fn project_user(record: &UserRecord, options: &UserOptions) -> User {
    User {
        user_id: record.user_id.clone(),
        first_name: when(options.name, || record.first_name.clone()),
        last_name: when(options.name, || record.last_name.clone()),
        bio: when(options.profile, || record.bio.clone()),
        profile_page_id: if options.profile {
            record.profile_page_id.clone()
        } else {
            None
        },
        domain_ids: when(options.domains, || record.domain_ids.clone()),
    }
}

pub fn project_mastery(record: &MasteryRecord, options: &MasteryOptions) -> Mastery {
    Mastery {
        mastery_id: record.mastery_id.clone(),
        user_id: record.user_id.clone(),
        has: when(options.level, || record.has),
        wants: when(options.level, || record.wants),
        level: when(options.level, || record.level),
        updated_at: when(options.timestamps, || record.updated_at),
    }
}

/// Run a page batch against a record source, applying the batch scope.
pub fn select_pages<S: RecordSource + ?Sized>(
    source: &S,
    batch: &PageBatch,
) -> Result<Vec<Page>, StorageError> {
    let mut pages = Vec::with_capacity(batch.ids.len());
    for page_id in &batch.ids {
        let Some(record) = source.page_record(page_id)? else {
            continue;
        };
        if !record.is_visible_to(&batch.scope) {
            continue;
        }
        pages.push(project_page(source, &record, &batch.options)?);
    }
    Ok(pages)
}

pub fn select_users<S: RecordSource + ?Sized>(
    source: &S,
    batch: &UserBatch,
) -> Result<Vec<User>, StorageError> {
    let mut users = Vec::with_capacity(batch.ids.len());
    for user_id in &batch.ids {
        if let Some(record) = source.user_record(user_id)? {
            users.push(project_user(&record, &batch.options));
        }
    }
    Ok(users)
}

pub fn select_masteries<S: RecordSource + ?Sized>(
    source: &S,
    batch: &MasteryBatch,
) -> Result<Vec<Mastery>, StorageError> {
    let Some(user_id) = &batch.user_id else {
        return Ok(Vec::new());
    };
    let mut masteries = Vec::with_capacity(batch.ids.len());
    for mastery_id in &batch.ids {
        if let Some(record) = source.mastery_record(user_id, mastery_id)? {
            masteries.push(project_mastery(&record, &batch.options));
        }
    }
    Ok(masteries)
}

/// Visible pages matching a listing, newest first with id as tiebreak.
pub fn select_listing<S: RecordSource + ?Sized>(
    source: &S,
    query: &ListingQuery,
    scope: &VisibilityScope,
) -> Result<Vec<PageId>, StorageError> {
    let mut matches: Vec<PageRecord> = source
        .page_records()?
        .into_iter()
        .filter(|record| record.is_visible_to(scope) && query.matches(record))
        .collect();
    matches.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.page_id.cmp(&b.page_id))
    });
    Ok(matches
        .into_iter()
        .take(query.limit())
        .map(|record| record.page_id)
        .collect())
}

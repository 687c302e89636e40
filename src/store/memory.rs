//! In-memory entity store
//!
//! Keeps rows in `parking_lot` locked maps and records every query it answers,
//! which lets callers assert how many round trips a pipeline run made.

use crate::entity::{Mark, Mastery, Page, User};
use crate::error::StorageError;
use crate::store::{
    select_listing, select_masteries, select_pages, select_users, EntityKind, EntityStore,
    ListingQuery, MasteryBatch, MasteryRecord, PageBatch, PageRecord, RecordSink, RecordSource,
    UserBatch, UserRecord,
};
use crate::types::{MasteryId, PageId, UserId};
use crate::viewer::VisibilityScope;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashSet};

/// One answered query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryLogEntry {
    pub kind: EntityKind,
    pub ids: Vec<String>,
}

#[derive(Default)]
pub struct MemoryEntityStore {
    pages: RwLock<BTreeMap<PageId, PageRecord>>,
    users: RwLock<BTreeMap<UserId, UserRecord>>,
    masteries: RwLock<BTreeMap<(UserId, MasteryId), MasteryRecord>>,
    marks: RwLock<BTreeMap<PageId, Vec<Mark>>>,
    log: Mutex<Vec<QueryLogEntry>>,
    failing: RwLock<HashSet<EntityKind>>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queries answered so far, in order
    pub fn query_log(&self) -> Vec<QueryLogEntry> {
        self.log.lock().clone()
    }

    pub fn query_count(&self, kind: EntityKind) -> usize {
        self.log.lock().iter().filter(|e| e.kind == kind).count()
    }

    pub fn clear_log(&self) {
        self.log.lock().clear();
    }

    /// Make every subsequent query of `kind` fail with a backend error
    pub fn fail_queries(&self, kind: EntityKind) {
        self.failing.write().insert(kind);
    }

    fn record_query(&self, kind: EntityKind, ids: Vec<String>) -> Result<(), StorageError> {
        if self.failing.read().contains(&kind) {
            return Err(StorageError::Backend(format!(
                "{:?} query rejected by memory store",
                kind
            )));
        }
        self.log.lock().push(QueryLogEntry { kind, ids });
        Ok(())
    }
}

impl RecordSource for MemoryEntityStore {
    fn page_record(&self, page_id: &PageId) -> Result<Option<PageRecord>, StorageError> {
        Ok(self.pages.read().get(page_id).cloned())
    }

    fn page_records(&self) -> Result<Vec<PageRecord>, StorageError> {
        Ok(self.pages.read().values().cloned().collect())
    }

    fn marks_for_page(&self, page_id: &PageId) -> Result<Vec<Mark>, StorageError> {
        Ok(self.marks.read().get(page_id).cloned().unwrap_or_default())
    }

    fn user_record(&self, user_id: &UserId) -> Result<Option<UserRecord>, StorageError> {
        Ok(self.users.read().get(user_id).cloned())
    }

    fn mastery_record(
        &self,
        user_id: &UserId,
        mastery_id: &MasteryId,
    ) -> Result<Option<MasteryRecord>, StorageError> {
        Ok(self
            .masteries
            .read()
            .get(&(user_id.clone(), mastery_id.clone()))
            .cloned())
    }
}

impl RecordSink for MemoryEntityStore {
    fn put_page(&self, record: &PageRecord) -> Result<(), StorageError> {
        self.pages
            .write()
            .insert(record.page_id.clone(), record.clone());
        Ok(())
    }

    fn put_user(&self, record: &UserRecord) -> Result<(), StorageError> {
        self.users
            .write()
            .insert(record.user_id.clone(), record.clone());
        Ok(())
    }

    fn put_mastery(&self, record: &MasteryRecord) -> Result<(), StorageError> {
        self.masteries.write().insert(
            (record.user_id.clone(), record.mastery_id.clone()),
            record.clone(),
        );
        Ok(())
    }

    fn put_mark(&self, mark: &Mark) -> Result<(), StorageError> {
        let mut marks = self.marks.write();
        let page_marks = marks.entry(mark.page_id.clone()).or_default();
        page_marks.retain(|existing| existing.mark_id != mark.mark_id);
        page_marks.push(mark.clone());
        page_marks.sort_by(|a, b| a.mark_id.cmp(&b.mark_id));
        Ok(())
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn query_pages(&self, batch: &PageBatch) -> Result<Vec<Page>, StorageError> {
        self.record_query(
            EntityKind::Page,
            batch.ids.iter().map(|id| id.to_string()).collect(),
        )?;
        select_pages(self, batch)
    }

    async fn query_users(&self, batch: &UserBatch) -> Result<Vec<User>, StorageError> {
        self.record_query(
            EntityKind::User,
            batch.ids.iter().map(|id| id.to_string()).collect(),
        )?;
        select_users(self, batch)
    }

    async fn query_masteries(&self, batch: &MasteryBatch) -> Result<Vec<Mastery>, StorageError> {
        self.record_query(
            EntityKind::Mastery,
            batch.ids.iter().map(|id| id.to_string()).collect(),
        )?;
        select_masteries(self, batch)
    }

    async fn list_pages(
        &self,
        query: &ListingQuery,
        scope: &VisibilityScope,
    ) -> Result<Vec<PageId>, StorageError> {
        self.record_query(EntityKind::Listing, Vec::new())?;
        select_listing(self, query, scope)
    }
}

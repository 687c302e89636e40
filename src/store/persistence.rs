//! Persistence layer for the entity store

use crate::entity::{Mark, Mastery, Page, User};
use crate::error::StorageError;
use crate::store::{
    select_listing, select_masteries, select_pages, select_users, EntityStore, ListingQuery,
    MasteryBatch, MasteryRecord, PageBatch, PageRecord, RecordSink, RecordSource, UserBatch,
    UserRecord,
};
use crate::types::{MasteryId, PageId, UserId};
use crate::viewer::VisibilityScope;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

const PAGES_TREE: &str = "pages";
const USERS_TREE: &str = "users";
const MASTERIES_TREE: &str = "masteries";
const MARKS_TREE: &str = "marks";


/// Sled-based implementation of EntityStore
///
/// Rows live in one tree per kind, encoded with bincode. Masteries are keyed
/// by `(user_id, mastery_id)` and marks by `(page_id, mark_id)` composite keys
/// so that a page's marks are one prefix scan.
pub struct SledEntityStore {
    db: sled::Db,
    pages: sled::Tree,
    users: sled::Tree,
    masteries: sled::Tree,
    marks: sled::Tree,
}

impl SledEntityStore {
    /// Open (or create) a store at the given directory
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path.as_ref()).map_err(|e| {
            StorageError::Backend(format!(
                "Failed to open sled database at {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;
        Self::from_db(db)
    }

    /// Temporary store removed on drop
    pub fn temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, StorageError> {
        Ok(Self {
            pages: db.open_tree(PAGES_TREE)?,
            users: db.open_tree(USERS_TREE)?,
            masteries: db.open_tree(MASTERIES_TREE)?,
            marks: db.open_tree(MARKS_TREE)?,
            db,
        })
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// `len(first)` as big-endian u32, then `first`, then `second`.
/// A scan on `composite_key(first, "")` matches exactly one `first`.
fn composite_key(first: &str, second: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(4 + first.len() + second.len());
    key.extend_from_slice(&(first.len() as u32).to_be_bytes());
    key.extend_from_slice(first.as_bytes());
    key.extend_from_slice(second.as_bytes());
    key
}

fn encode<T: Serialize>(kind: &'static str, value: &T) -> Result<Vec<u8>, StorageError> {
    bincode::serialize(value).map_err(|e| StorageError::Codec {
        kind,
        message: e.to_string(),
    })
}

fn decode<T: DeserializeOwned>(kind: &'static str, bytes: &[u8]) -> Result<T, StorageError> {
    bincode::deserialize(bytes).map_err(|e| StorageError::Codec {
        kind,
        message: e.to_string(),
    })
}

fn get_decoded<T: DeserializeOwned>(
    tree: &sled::Tree,
    kind: &'static str,
    key: &[u8],
) -> Result<Option<T>, StorageError> {
    match tree.get(key)? {
        Some(bytes) => Ok(Some(decode(kind, &bytes)?)),
        None => Ok(None),
    }
}

impl RecordSource for SledEntityStore {
    fn page_record(&self, page_id: &PageId) -> Result<Option<PageRecord>, StorageError> {
        get_decoded(&self.pages, "page", page_id.as_str().as_bytes())
    }

    fn page_records(&self) -> Result<Vec<PageRecord>, StorageError> {
        let mut records = Vec::with_capacity(self.pages.len());
        for item in self.pages.iter() {
            let (_, value) = item?;
            records.push(decode("page", &value)?);
        }
        Ok(records)
    }

    fn marks_for_page(&self, page_id: &PageId) -> Result<Vec<Mark>, StorageError> {
        let prefix = composite_key(page_id.as_str(), "");
        let mut marks = Vec::new();
        for item in self.marks.scan_prefix(prefix) {
            let (_, value) = item?;
            let mark: Mark = decode("mark", &value)?;
            if mark.page_id == *page_id {
                marks.push(mark);
            }
        }
        Ok(marks)
    }

    fn user_record(&self, user_id: &UserId) -> Result<Option<UserRecord>, StorageError> {
        get_decoded(&self.users, "user", user_id.as_str().as_bytes())
    }

    fn mastery_record(
        &self,
        user_id: &UserId,
        mastery_id: &MasteryId,
    ) -> Result<Option<MasteryRecord>, StorageError> {
        get_decoded(
            &self.masteries,
            "mastery",
            &composite_key(user_id.as_str(), mastery_id.as_str()),
        )
    }
}

impl RecordSink for SledEntityStore {
    fn put_page(&self, record: &PageRecord) -> Result<(), StorageError> {
        self.pages
            .insert(record.page_id.as_str().as_bytes(), encode("page", record)?)?;
        Ok(())
    }

    fn put_user(&self, record: &UserRecord) -> Result<(), StorageError> {
        self.users
            .insert(record.user_id.as_str().as_bytes(), encode("user", record)?)?;
        Ok(())
    }

    fn put_mastery(&self, record: &MasteryRecord) -> Result<(), StorageError> {
        let key = composite_key(record.user_id.as_str(), record.mastery_id.as_str());
        self.masteries.insert(key, encode("mastery", record)?)?;
        Ok(())
    }

    fn put_mark(&self, mark: &Mark) -> Result<(), StorageError> {
        let key = composite_key(mark.page_id.as_str(), mark.mark_id.as_str());
        self.marks.insert(key, encode("mark", mark)?)?;
        Ok(())
    }
}

#[async_trait]
impl EntityStore for SledEntityStore {
    async fn query_pages(&self, batch: &PageBatch) -> Result<Vec<Page>, StorageError> {
        debug!(ids = batch.ids.len(), "sled page query");
        select_pages(self, batch)
    }

    async fn query_users(&self, batch: &UserBatch) -> Result<Vec<User>, StorageError> {
        debug!(ids = batch.ids.len(), "sled user query");
        select_users(self, batch)
    }

    async fn query_masteries(&self, batch: &MasteryBatch) -> Result<Vec<Mastery>, StorageError> {
        debug!(ids = batch.ids.len(), "sled mastery query");
        select_masteries(self, batch)
    }

    async fn list_pages(
        &self,
        query: &ListingQuery,
        scope: &VisibilityScope,
    ) -> Result<Vec<PageId>, StorageError> {
        select_listing(self, query, scope)
    }
}

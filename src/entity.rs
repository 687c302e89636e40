//! Entity values produced by the load pipeline.
//!
//! Optional fields are populated only when the corresponding load option was
//! requested; `None` means "not loaded", not "empty".

use crate::types::{DomainId, MarkId, MasteryId, PageId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Page type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Wiki,
    Lens,
    Question,
    Answer,
    Comment,
    Group,
    Domain,
}

/// A single edit in a page's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    pub edit_number: u32,
    pub creator_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// An inline mark (highlight, confusion note) left on a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mark {
    pub mark_id: MarkId,
    pub page_id: PageId,
    pub creator_id: UserId,
    pub text: String,
    pub resolved_by: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub page_id: PageId,
    pub page_type: PageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clickbait: Option<String>,
    pub creator_id: UserId,
    pub created_at: DateTime<Utc>,
    /// Only members of this domain may see the page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub see_domain_id: Option<DomainId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_ids: Option<Vec<PageId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub red_link_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub todo_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_ids: Option<Vec<PageId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_ids: Option<Vec<PageId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_ids: Option<Vec<PageId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lens_ids: Option<Vec<PageId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_ids: Option<Vec<PageId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirement_ids: Option<Vec<PageId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_ids: Option<Vec<PageId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marks: Option<Vec<Mark>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edits: Option<Vec<Edit>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_page_id: Option<PageId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_ids: Option<Vec<DomainId>>,
}

/// The viewer's mastery of one requisite page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mastery {
    pub mastery_id: MasteryId,
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wants: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

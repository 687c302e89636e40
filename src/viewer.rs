//! Viewer context and visibility scoping.
//!
//! The viewer is supplied by the (external) session layer and is never loaded
//! through the pipeline. Every store query carries a `VisibilityScope` derived
//! from it; batched and direct fetches share `VisibilityScope::admits`.

use crate::entity::PageType;
use crate::types::{DomainId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The requesting user, or anonymous.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerContext {
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub domain_ids: BTreeSet<DomainId>,
}

impl ViewerContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    pub fn with_domain(mut self, domain_id: impl Into<DomainId>) -> Self {
        self.domain_ids.insert(domain_id.into());
        self
    }

    pub fn with_admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
    }

    /// Scope for entity lookups on behalf of this viewer.
    pub fn scope(&self) -> VisibilityScope {
        VisibilityScope {
            user_id: self.user_id.clone(),
            is_admin: self.is_admin,
            domain_ids: self.domain_ids.clone(),
            excluded_types: BTreeSet::new(),
        }
    }

    /// Scope for listing queries, which hide comment pages.
    pub fn listing_scope(&self) -> VisibilityScope {
        self.scope().excluding(PageType::Comment)
    }
}

/// Visibility restriction applied to every store query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityScope {
    pub user_id: Option<UserId>,
    pub is_admin: bool,
    pub domain_ids: BTreeSet<DomainId>,
    pub excluded_types: BTreeSet<PageType>,
}

impl VisibilityScope {
    pub fn excluding(mut self, page_type: PageType) -> Self {
        self.excluded_types.insert(page_type);
        self
    }

    /// Whether a page with these attributes is visible within the scope.
    ///
    /// Deleted pages are never visible and type exclusions apply to admins too.
    pub fn admits(
        &self,
        page_type: PageType,
        see_domain_id: Option<&DomainId>,
        is_deleted: bool,
    ) -> bool {
        if is_deleted || self.excluded_types.contains(&page_type) {
            return false;
        }
        if self.is_admin {
            return true;
        }
        match see_domain_id {
            Some(domain_id) => self.domain_ids.contains(domain_id),
            None => true,
        }
    }
}

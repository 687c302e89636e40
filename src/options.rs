//! Load-option algebra
//!
//! Describes how much of an entity a request needs. Each entity kind has a
//! closed set of flags; two option sets merge by OR-ing every boolean flag and
//! taking the maximum of every integer flag. Merge is commutative, associative
//! and idempotent, and never drops previously requested detail.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

/// Common behavior of every per-kind option set.
pub trait LoadOptionSet: Copy + Eq + Hash + Default + Debug + Send + Sync + 'static {
    /// Combine two option sets into one that satisfies both.
    fn merge(&self, other: &Self) -> Self;

    /// True when every flag requested by `self` is also requested by `other`.
    fn is_subset_of(&self, other: &Self) -> bool;

    /// Merge in place, returning true when the requested set grew.
    fn absorb(&mut self, other: &Self) -> bool {
        let merged = self.merge(other);
        let grew = merged != *self;
        *self = merged;
        grew
    }
}

/// Detail requested for a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PageOptions {
    /// Title and clickbait; id, type, creator and visibility fields always load
    pub title: bool,
    pub summaries: bool,
    /// Full body text
    pub text: bool,
    /// Ids of pages linked from the body
    pub links: bool,
    pub red_link_count: bool,
    pub todo_count: bool,
    pub parents: bool,
    pub children: bool,
    pub tags: bool,
    pub lenses: bool,
    pub comments: bool,
    /// Prerequisite pages and the viewer's masteries of them
    pub requirements: bool,
    /// Pages this page teaches
    pub subjects: bool,
    pub all_marks: bool,
    /// Number of most recent edits to load
    pub edit_history: u8,
}

impl PageOptions {
    pub const NONE: PageOptions = PageOptions {
        title: false,
        summaries: false,
        text: false,
        links: false,
        red_link_count: false,
        todo_count: false,
        parents: false,
        children: false,
        tags: false,
        lenses: false,
        comments: false,
        requirements: false,
        subjects: false,
        all_marks: false,
        edit_history: 0,
    };

    pub const TITLE: PageOptions = PageOptions {
        title: true,
        ..Self::NONE
    };

    pub const TITLE_PLUS: PageOptions = PageOptions {
        summaries: true,
        tags: true,
        todo_count: true,
        red_link_count: true,
        ..Self::TITLE
    };

    pub const INTRASITE_POPOVER: PageOptions = PageOptions {
        summaries: true,
        requirements: true,
        ..Self::TITLE
    };

    pub const ALL_MARKS: PageOptions = PageOptions {
        all_marks: true,
        ..Self::TITLE
    };

    /// Title plus the transitive prerequisite chain.
    pub const REQUISITE: PageOptions = PageOptions {
        requirements: true,
        ..Self::TITLE
    };

    pub const LENS: PageOptions = PageOptions {
        summaries: true,
        text: true,
        links: true,
        requirements: true,
        subjects: true,
        ..Self::TITLE
    };

    pub const COMMENT: PageOptions = PageOptions {
        text: true,
        ..Self::TITLE
    };

    pub const PRIMARY_PAGE: PageOptions = PageOptions {
        title: true,
        summaries: true,
        text: true,
        links: true,
        red_link_count: true,
        todo_count: true,
        parents: true,
        children: true,
        tags: true,
        lenses: true,
        comments: true,
        requirements: true,
        subjects: true,
        all_marks: true,
        edit_history: 10,
    };

    /// Look up a named preset.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "title" => Some(Self::TITLE),
            "title-plus" => Some(Self::TITLE_PLUS),
            "intrasite-popover" => Some(Self::INTRASITE_POPOVER),
            "all-marks" => Some(Self::ALL_MARKS),
            "requisite" => Some(Self::REQUISITE),
            "lens" => Some(Self::LENS),
            "comment" => Some(Self::COMMENT),
            "primary-page" => Some(Self::PRIMARY_PAGE),
            _ => None,
        }
    }

    pub fn with_text(mut self) -> Self {
        self.text = true;
        self
    }

    pub fn with_all_marks(mut self) -> Self {
        self.all_marks = true;
        self
    }

    pub fn with_edit_history(mut self, limit: u8) -> Self {
        self.edit_history = self.edit_history.max(limit);
        self
    }
}

impl LoadOptionSet for PageOptions {
    fn merge(&self, other: &Self) -> Self {
        PageOptions {
            title: self.title || other.title,
            summaries: self.summaries || other.summaries,
            text: self.text || other.text,
            links: self.links || other.links,
            red_link_count: self.red_link_count || other.red_link_count,
            todo_count: self.todo_count || other.todo_count,
            parents: self.parents || other.parents,
            children: self.children || other.children,
            tags: self.tags || other.tags,
            lenses: self.lenses || other.lenses,
            comments: self.comments || other.comments,
            requirements: self.requirements || other.requirements,
            subjects: self.subjects || other.subjects,
            all_marks: self.all_marks || other.all_marks,
            edit_history: self.edit_history.max(other.edit_history),
        }
    }

    fn is_subset_of(&self, other: &Self) -> bool {
        self.merge(other) == *other
    }
}

/// Detail requested for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserOptions {
    /// First and last name
    pub name: bool,
    /// Bio and profile page
    pub profile: bool,
    /// Domain memberships
    pub domains: bool,
}

impl UserOptions {
    pub const NONE: UserOptions = UserOptions {
        name: false,
        profile: false,
        domains: false,
    };

    pub const NAME: UserOptions = UserOptions {
        name: true,
        ..Self::NONE
    };

    pub const PROFILE: UserOptions = UserOptions {
        name: true,
        profile: true,
        domains: true,
    };

    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "name" => Some(Self::NAME),
            "profile" => Some(Self::PROFILE),
            _ => None,
        }
    }
}

impl LoadOptionSet for UserOptions {
    fn merge(&self, other: &Self) -> Self {
        UserOptions {
            name: self.name || other.name,
            profile: self.profile || other.profile,
            domains: self.domains || other.domains,
        }
    }

    fn is_subset_of(&self, other: &Self) -> bool {
        self.merge(other) == *other
    }
}

/// Detail requested for the viewer's mastery of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MasteryOptions {
    /// Has/wants flags and level
    pub level: bool,
    pub timestamps: bool,
}

impl MasteryOptions {
    pub const NONE: MasteryOptions = MasteryOptions {
        level: false,
        timestamps: false,
    };

    pub const LEVEL: MasteryOptions = MasteryOptions {
        level: true,
        ..Self::NONE
    };

    pub const FULL: MasteryOptions = MasteryOptions {
        level: true,
        timestamps: true,
    };

    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "level" => Some(Self::LEVEL),
            "full" => Some(Self::FULL),
            _ => None,
        }
    }
}

impl LoadOptionSet for MasteryOptions {
    fn merge(&self, other: &Self) -> Self {
        MasteryOptions {
            level: self.level || other.level,
            timestamps: self.timestamps || other.timestamps,
        }
    }

    fn is_subset_of(&self, other: &Self) -> bool {
        self.merge(other) == *other
    }
}

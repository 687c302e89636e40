//! Identifier types shared across the pipeline.
//!
//! Every identifier is an opaque string key, unique within its registry.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Page identifier
    PageId
);
string_id!(
    /// User identifier
    UserId
);
string_id!(
    /// Mastery identifier: names the requisite page the mastery is about
    MasteryId
);
string_id!(
    /// Domain identifier used for visibility scoping
    DomainId
);
string_id!(MarkId);

impl MasteryId {
    /// The page this mastery is about.
    pub fn page_id(&self) -> PageId {
        PageId(self.0.clone())
    }
}

impl From<&PageId> for MasteryId {
    fn from(page_id: &PageId) -> Self {
        MasteryId(page_id.0.clone())
    }
}

//! Reference extraction
//!
//! Declared mapping from each entity kind to the fields that may reference
//! other entities, and the options each referenced entity is staged with.
//! Extraction is purely additive: it only produces staging requests.

use crate::entity::{Mastery, Page, User};
use crate::options::{MasteryOptions, PageOptions, UserOptions};
use crate::registry::{EntityMaps, StageOutcome};
use crate::types::{MasteryId, PageId, UserId};

/// A staging request discovered in a loaded entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Page(PageId, PageOptions),
    User(UserId, UserOptions),
    Mastery(MasteryId, MasteryOptions),
}

/// Reference-bearing page fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageField {
    Creator,
    EditCreators,
    MarkUsers,
    Parents,
    Children,
    Tags,
    Links,
    Lenses,
    Comments,
    Requirements,
    Subjects,
}

/// Every page field the extractor inspects
pub const PAGE_REFERENCE_FIELDS: &[PageField] = &[
    PageField::Creator,
    PageField::EditCreators,
    PageField::MarkUsers,
    PageField::Parents,
    PageField::Children,
    PageField::Tags,
    PageField::Links,
    PageField::Lenses,
    PageField::Comments,
    PageField::Requirements,
    PageField::Subjects,
];

fn title_only(ids: &Option<Vec<PageId>>) -> Vec<Reference> {
    ids.iter()
        .flatten()
        .map(|id| Reference::Page(id.clone(), PageOptions::TITLE))
        .collect()
}

impl PageField {
    /// References held by this field of `page`.
    ///
    /// `requested` is the option set the page was loaded with; lens pages
    /// inherit body text when the referencing page needed it.
    pub fn references(self, page: &Page, requested: &PageOptions) -> Vec<Reference> {
        match self {
            PageField::Creator => vec![Reference::User(page.creator_id.clone(), UserOptions::NAME)],
            PageField::EditCreators => page
                .edits
                .iter()
                .flatten()
                .map(|edit| Reference::User(edit.creator_id.clone(), UserOptions::NAME))
                .collect(),
            PageField::MarkUsers => page
                .marks
                .iter()
                .flatten()
                .flat_map(|mark| {
                    std::iter::once(&mark.creator_id).chain(mark.resolved_by.as_ref())
                })
                .map(|user_id| Reference::User(user_id.clone(), UserOptions::NAME))
                .collect(),
            PageField::Parents => title_only(&page.parent_ids),
            PageField::Children => title_only(&page.child_ids),
            PageField::Tags => title_only(&page.tag_ids),
            PageField::Links => title_only(&page.link_ids),
            PageField::Lenses => {
                let options = if requested.text {
                    PageOptions::LENS
                } else {
                    PageOptions::TITLE
                };
                page.lens_ids
                    .iter()
                    .flatten()
                    .map(|id| Reference::Page(id.clone(), options))
                    .collect()
            }
            PageField::Comments => page
                .comment_ids
                .iter()
                .flatten()
                .map(|id| Reference::Page(id.clone(), PageOptions::COMMENT))
                .collect(),
            PageField::Requirements => page
                .requirement_ids
                .iter()
                .flatten()
                .flat_map(|id| {
                    [
                        Reference::Page(id.clone(), PageOptions::REQUISITE),
                        Reference::Mastery(MasteryId::from(id), MasteryOptions::LEVEL),
                    ]
                })
                .collect(),
            PageField::Subjects => page
                .subject_ids
                .iter()
                .flatten()
                .flat_map(|id| {
                    [
                        Reference::Page(id.clone(), PageOptions::TITLE),
                        Reference::Mastery(MasteryId::from(id), MasteryOptions::LEVEL),
                    ]
                })
                .collect(),
        }
    }
}

pub fn page_references(page: &Page, requested: &PageOptions) -> Vec<Reference> {
    PAGE_REFERENCE_FIELDS
        .iter()
        .flat_map(|field| field.references(page, requested))
        .collect()
}

pub fn user_references(user: &User) -> Vec<Reference> {
    user.profile_page_id
        .iter()
        .map(|id| Reference::Page(id.clone(), PageOptions::TITLE))
        .collect()
}

pub fn mastery_references(mastery: &Mastery) -> Vec<Reference> {
    vec![Reference::Page(mastery.mastery_id.page_id(), PageOptions::TITLE)]
}

/// Stage one reference into the matching registry.
pub fn stage_reference(maps: &mut EntityMaps, reference: Reference) -> StageOutcome {
    match reference {
        Reference::Page(id, options) => maps.pages.stage(id, options),
        Reference::User(id, options) => maps.users.stage(id, options),
        Reference::Mastery(id, options) => maps.masteries.stage(id, options),
    }
}

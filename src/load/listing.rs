//! Listing helper and direct single-entity fetch.

use crate::entity::Page;
use crate::error::{LoadError, StorageError};
use crate::load::pipeline::{LoadPipeline, ResolveOptions, ResolveReport};
use crate::options::PageOptions;
use crate::registry::EntityMaps;
use crate::store::{EntityStore, ListingQuery, PageBatch};
use crate::types::PageId;
use crate::viewer::ViewerContext;
use serde::Serialize;
use tracing::debug;

/// Ordered ids returned by a listing plus the resolve summary
#[derive(Debug, Clone, Serialize)]
pub struct ListingResult {
    pub page_ids: Vec<PageId>,
    pub report: ResolveReport,
}

impl LoadPipeline {
    /// Run a listing query, stage every returned id with `page_options`, then resolve.
    ///
    /// Comment pages are hidden from listings unless the pipeline config says otherwise.
    pub async fn load_listing(
        &self,
        viewer: &ViewerContext,
        maps: &mut EntityMaps,
        query: &ListingQuery,
        page_options: PageOptions,
        options: &ResolveOptions,
    ) -> Result<ListingResult, LoadError> {
        let scope = if self.config().exclude_comments_in_listings {
            viewer.listing_scope()
        } else {
            viewer.scope()
        };
        let page_ids = self.store().list_pages(query, &scope).await?;
        debug!(count = page_ids.len(), ?query, "listing returned pages");

        for page_id in &page_ids {
            maps.stage_page(page_id.clone(), page_options);
        }
        let report = self.resolve(viewer, maps, options).await?;
        Ok(ListingResult { page_ids, report })
    }
}

/// Fetch one page outside the pipeline, under the same visibility rules.
pub async fn fetch_page(
    store: &dyn EntityStore,
    viewer: &ViewerContext,
    page_id: &PageId,
    options: PageOptions,
) -> Result<Option<Page>, StorageError> {
    let batch = PageBatch {
        ids: vec![page_id.clone()],
        options,
        scope: viewer.scope(),
    };
    Ok(store
        .query_pages(&batch)
        .await?
        .into_iter()
        .find(|page| page.page_id == *page_id))
}

//! Entity load pipeline: query executors, reference extraction and the
//! fixpoint driver.

mod executor;
pub mod extract;
mod listing;
mod pipeline;

pub use extract::{PageField, Reference, PAGE_REFERENCE_FIELDS};
pub use listing::{fetch_page, ListingResult};
pub use pipeline::{CancelFlag, LoadPipeline, ResolveOptions, ResolveReport};

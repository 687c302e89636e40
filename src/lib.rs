//! pageload: request-scoped entity loading
//!
//! Handlers stage the pages, users and masteries they need, each with a set of
//! load options. The pipeline then resolves everything in as few batched,
//! visibility-scoped store queries as it can, following references from loaded
//! entities until nothing new is staged.

pub mod bundle;
pub mod cli;
pub mod config;
pub mod entity;
pub mod error;
pub mod load;
pub mod logging;
pub mod options;
pub mod registry;
pub mod store;
pub mod types;
pub mod viewer;

pub use bundle::ResultBundle;
pub use error::{LoadError, StorageError};
pub use load::{fetch_page, CancelFlag, LoadPipeline, ResolveOptions, ResolveReport};
pub use options::{LoadOptionSet, MasteryOptions, PageOptions, UserOptions};
pub use registry::{EntityMaps, EntityState, StageOutcome};
pub use viewer::{ViewerContext, VisibilityScope};

//! Pipeline driver
//!
//! Runs the fixpoint loop: query every unresolved entry, extract references
//! from what was loaded, stage them, and repeat until every registry is
//! saturated. Each iteration issues at most one query per (kind, option
//! shape, chunk); the three kinds are queried concurrently.

use crate::bundle::ResultBundle;
use crate::config::PipelineConfig;
use crate::error::{LoadError, StorageError};
use crate::load::executor::{execute_masteries, execute_pages, execute_users, KindOutcome};
use crate::load::extract::{
    mastery_references, page_references, stage_reference, user_references, Reference,
};
use crate::options::LoadOptionSet;
use crate::registry::{EntityMaps, Registry};
use crate::store::EntityStore;
use crate::viewer::{ViewerContext, VisibilityScope};
use serde::Serialize;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Cooperative cancellation shared between a request and its pipeline run
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-invocation controls. Both are checked between iterations only.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Overall request deadline
    pub deadline: Option<Instant>,
    pub cancel: Option<CancelFlag>,
}

impl ResolveOptions {
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn check(&self, iteration: usize) -> Result<(), LoadError> {
        if self.cancel.as_ref().map(CancelFlag::is_cancelled).unwrap_or(false) {
            warn!(iteration, "entity load cancelled");
            return Err(LoadError::Cancelled { iteration });
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                warn!(iteration, "entity load deadline exceeded");
                return Err(LoadError::DeadlineExceeded { iteration });
            }
        }
        Ok(())
    }
}

/// Summary of one `resolve` call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolveReport {
    pub iterations: usize,
    pub page_queries: usize,
    pub user_queries: usize,
    pub mastery_queries: usize,
    pub loaded: usize,
    pub tombstoned: usize,
    /// References that added an id or grew an existing entry
    pub references_staged: usize,
}

impl ResolveReport {
    pub fn queries(&self) -> usize {
        self.page_queries + self.user_queries + self.mastery_queries
    }
}

/// Request-scoped entity loader over an injected store
#[derive(Clone)]
pub struct LoadPipeline {
    store: Arc<dyn EntityStore>,
    config: PipelineConfig,
}

impl LoadPipeline {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self::with_config(store, PipelineConfig::default())
    }

    pub fn with_config(store: Arc<dyn EntityStore>, config: PipelineConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Resolve every staged entry in `maps` on behalf of `viewer`.
    ///
    /// On success every entry is loaded or tombstoned. On error the maps may
    /// be partially resolved and must be discarded.
    pub async fn resolve(
        &self,
        viewer: &ViewerContext,
        maps: &mut EntityMaps,
        options: &ResolveOptions,
    ) -> Result<ResolveReport, LoadError> {
        let scope = viewer.scope();
        let cap = self.config.max_iterations;
        let mut report = ResolveReport::default();

        loop {
            let pending = maps.unresolved_count();
            if pending == 0 {
                break;
            }
            if report.iterations >= cap {
                error!(
                    cap,
                    pending,
                    "entity load did not converge; reference extraction keeps staging new work"
                );
                return Err(LoadError::IterationCapExceeded { cap, pending });
            }
            let iteration = report.iterations + 1;
            options.check(iteration)?;
            report.iterations = iteration;

            let staged = self
                .run_iteration(&scope, maps, &mut report)
                .await
                .map_err(|e| {
                    error!(iteration, error = %e, "entity query failed; aborting load");
                    LoadError::Storage(e)
                })?;
            debug!(iteration, pending, staged, "entity load iteration complete");
        }

        info!(
            iterations = report.iterations,
            queries = report.queries(),
            loaded = report.loaded,
            tombstoned = report.tombstoned,
            "entity load resolved"
        );
        Ok(report)
    }

    /// Resolve the maps of `bundle` for its own viewer.
    pub async fn resolve_bundle(
        &self,
        bundle: &mut ResultBundle,
        options: &ResolveOptions,
    ) -> Result<ResolveReport, LoadError> {
        let viewer = bundle.viewer.clone();
        self.resolve(&viewer, &mut bundle.maps, options).await
    }

    /// One round: query all unresolved entries, record results, stage references.
    /// Returns the number of references that added new work.
    async fn run_iteration(
        &self,
        scope: &VisibilityScope,
        maps: &mut EntityMaps,
        report: &mut ResolveReport,
    ) -> Result<usize, StorageError> {
        let store = self.store.as_ref();
        let batch_size = self.config.max_batch_size;
        let pages_pending = maps.pages.all_unresolved();
        let users_pending = maps.users.all_unresolved();
        let masteries_pending = maps.masteries.all_unresolved();

        let (pages, users, masteries) = if self.config.concurrent_kinds {
            tokio::try_join!(
                execute_pages(store, pages_pending, scope, batch_size),
                execute_users(store, users_pending, scope, batch_size),
                execute_masteries(store, masteries_pending, scope, batch_size),
            )?
        } else {
            (
                execute_pages(store, pages_pending, scope, batch_size).await?,
                execute_users(store, users_pending, scope, batch_size).await?,
                execute_masteries(store, masteries_pending, scope, batch_size).await?,
            )
        };

        report.page_queries += pages.queries;
        report.user_queries += users.queries;
        report.mastery_queries += masteries.queries;

        let mut references: Vec<Reference> = Vec::new();
        apply(&mut maps.pages, pages, report, |page, options| {
            references.extend(page_references(page, options))
        });
        apply(&mut maps.users, users, report, |user, _| {
            references.extend(user_references(user))
        });
        apply(&mut maps.masteries, masteries, report, |mastery, _| {
            references.extend(mastery_references(mastery))
        });

        let mut staged = 0;
        for reference in references {
            if stage_reference(maps, reference).is_new_work() {
                staged += 1;
            }
        }
        report.references_staged += staged;
        Ok(staged)
    }
}

fn apply<K, O, V>(
    registry: &mut Registry<K, O, V>,
    outcome: KindOutcome<K, O, V>,
    report: &mut ResolveReport,
    mut on_loaded: impl FnMut(&V, &O),
) where
    K: Clone + Eq + Hash + Ord,
    O: LoadOptionSet,
{
    for completion in outcome.completions {
        match &completion.value {
            Some(value) => {
                on_loaded(value, &completion.options);
                report.loaded += 1;
            }
            None => report.tombstoned += 1,
        }
        registry.complete(&completion.id, completion.options, completion.value);
    }
}

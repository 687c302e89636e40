//! CLI route: single route table and run context. Dispatches to the load pipeline and store.

use crate::bundle::ResultBundle;
use crate::cli::output::format_report_text;
use crate::cli::parse::{parse_staged_id, Commands, ListCommands, ViewerArgs};
use crate::config::{ConfigLoader, PageloadConfig};
use crate::error::{LoadError, StorageError};
use crate::load::{LoadPipeline, ResolveOptions, ResolveReport};
use crate::options::{MasteryOptions, PageOptions, UserOptions};
use crate::store::fixture::Fixture;
use crate::store::persistence::SledEntityStore;
use crate::store::ListingQuery;
use crate::types::{PageId, UserId};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Runtime context for CLI execution: config, store and pipeline.
/// Built from an optional config path using ConfigLoader only.
pub struct RunContext {
    config: PageloadConfig,
    store: Arc<SledEntityStore>,
    pipeline: LoadPipeline,
}

impl RunContext {
    /// Load config and open the store it names.
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, LoadError> {
        let config = Self::load_config(config_path.as_deref())?;
        Self::from_config(config)
    }

    pub fn load_config(config_path: Option<&Path>) -> Result<PageloadConfig, LoadError> {
        match config_path {
            Some(path) => ConfigLoader::load_from_file(path),
            None => {
                let cwd = std::env::current_dir()
                    .map_err(|e| LoadError::Storage(StorageError::IoError(e)))?;
                ConfigLoader::load(&cwd)
            }
        }
    }

    pub fn from_config(config: PageloadConfig) -> Result<Self, LoadError> {
        std::fs::create_dir_all(&config.storage.path)
            .map_err(|e| LoadError::Storage(StorageError::IoError(e)))?;
        let store = Arc::new(SledEntityStore::new(&config.storage.path)?);
        let pipeline = LoadPipeline::with_config(store.clone(), config.pipeline.clone());
        Ok(Self {
            config,
            store,
            pipeline,
        })
    }

    pub fn config(&self) -> &PageloadConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &LoadPipeline {
        &self.pipeline
    }

    /// Execute a command and return its printable output.
    pub async fn execute(&self, command: &Commands) -> Result<String, LoadError> {
        match command {
            Commands::Import { file } => self.handle_import(file),
            Commands::Resolve {
                pages,
                users,
                masteries,
                viewer,
                timeout_ms,
                format,
            } => {
                self.handle_resolve(pages, users, masteries, viewer, *timeout_ms, format)
                    .await
            }
            Commands::List {
                query,
                preset,
                limit,
                viewer,
                format,
            } => self.handle_list(query, preset, *limit, viewer, format).await,
            Commands::Config => self.config.to_toml(),
        }
    }

    fn handle_import(&self, file: &Path) -> Result<String, LoadError> {
        let fixture = Fixture::from_path(file)?;
        let summary = fixture.apply(self.store.as_ref())?;
        self.store.flush()?;
        info!(file = %file.display(), "fixture imported");
        Ok(format!(
            "Imported {} pages, {} users, {} masteries, {} marks",
            summary.pages, summary.users, summary.masteries, summary.marks
        ))
    }

    async fn handle_resolve(
        &self,
        pages: &[String],
        users: &[String],
        masteries: &[String],
        viewer: &ViewerArgs,
        timeout_ms: Option<u64>,
        format: &str,
    ) -> Result<String, LoadError> {
        let mut bundle = ResultBundle::new(viewer.to_viewer());
        for arg in pages {
            let (id, options) =
                parse_staged_id(arg, PageOptions::PRIMARY_PAGE, PageOptions::preset)?;
            bundle.maps.stage_page(id, options);
        }
        for arg in users {
            let (id, options) = parse_staged_id(arg, UserOptions::NAME, UserOptions::preset)?;
            bundle.maps.stage_user(id, options);
        }
        for arg in masteries {
            let (id, options) =
                parse_staged_id(arg, MasteryOptions::LEVEL, MasteryOptions::preset)?;
            bundle.maps.stage_mastery(id, options);
        }

        let report = self
            .pipeline
            .resolve_bundle(&mut bundle, &resolve_options(timeout_ms))
            .await?;
        render(&mut bundle, &report, format)
    }

    async fn handle_list(
        &self,
        query: &ListCommands,
        preset: &str,
        limit: usize,
        viewer: &ViewerArgs,
        format: &str,
    ) -> Result<String, LoadError> {
        let page_options = PageOptions::preset(preset)
            .ok_or_else(|| LoadError::InvalidInput(format!("Unknown page preset '{}'", preset)))?;
        let query = match query {
            ListCommands::Recent => ListingQuery::Recent { limit },
            ListCommands::ByCreator { user_id } => ListingQuery::ByCreator {
                creator_id: UserId::from(user_id.as_str()),
                limit,
            },
            ListCommands::Children { page_id } => ListingQuery::ChildrenOf {
                parent_id: PageId::from(page_id.as_str()),
                limit,
            },
            ListCommands::Tagged { tag_id } => ListingQuery::TaggedWith {
                tag_id: PageId::from(tag_id.as_str()),
                limit,
            },
        };

        let mut bundle = ResultBundle::new(viewer.to_viewer());
        let listing = self
            .pipeline
            .load_listing(
                &bundle.viewer.clone(),
                &mut bundle.maps,
                &query,
                page_options,
                &ResolveOptions::default(),
            )
            .await?;
        bundle.set_result("page_ids", &listing.page_ids)?;
        render(&mut bundle, &listing.report, format)
    }
}

fn resolve_options(timeout_ms: Option<u64>) -> ResolveOptions {
    match timeout_ms {
        Some(ms) => ResolveOptions::default()
            .with_deadline(tokio::time::Instant::now() + Duration::from_millis(ms)),
        None => ResolveOptions::default(),
    }
}

fn render(
    bundle: &mut ResultBundle,
    report: &ResolveReport,
    format: &str,
) -> Result<String, LoadError> {
    match format {
        "json" => {
            bundle.set_result("report", report)?;
            bundle.to_json_pretty()
        }
        "text" => Ok(format_report_text(bundle, report)),
        other => Err(LoadError::InvalidInput(format!(
            "Invalid format: {} (must be 'json' or 'text')",
            other
        ))),
    }
}

//! CLI parse: clap types for pageload. Definitions plus argument helpers.

use crate::error::LoadError;
use crate::viewer::ViewerContext;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// pageload - batched entity loading for pages, users and masteries
#[derive(Parser)]
#[command(name = "pageload")]
#[command(about = "Resolve pages, users and masteries with batched, visibility-scoped queries")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (overrides default config loading)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, global = true, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import a JSON fixture of pages, users, masteries and marks into the store
    Import {
        /// Fixture file
        file: PathBuf,
    },
    /// Stage entities and resolve them to a result bundle
    Resolve {
        /// Page to stage, as ID or ID=PRESET (default preset: primary-page)
        #[arg(long = "page", value_name = "ID[=PRESET]")]
        pages: Vec<String>,
        /// User to stage, as ID or ID=PRESET (default preset: name)
        #[arg(long = "user", value_name = "ID[=PRESET]")]
        users: Vec<String>,
        /// Mastery to stage, as ID or ID=PRESET (default preset: level)
        #[arg(long = "mastery", value_name = "ID[=PRESET]")]
        masteries: Vec<String>,
        #[command(flatten)]
        viewer: ViewerArgs,
        /// Abort if not resolved within this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Output format (json or text)
        #[arg(long, default_value = "json")]
        format: String,
    },
    /// Run a listing query and resolve every returned page
    List {
        #[command(subcommand)]
        query: ListCommands,
        /// Page preset applied to every listed page
        #[arg(long, default_value = "title-plus")]
        preset: String,
        /// Maximum number of pages
        #[arg(long, default_value = "20")]
        limit: usize,
        #[command(flatten)]
        viewer: ViewerArgs,
        /// Output format (json or text)
        #[arg(long, default_value = "json")]
        format: String,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Subcommand)]
pub enum ListCommands {
    /// Most recently created pages
    Recent,
    /// Pages created by a user
    ByCreator { user_id: String },
    /// Children of a page
    Children { page_id: String },
    /// Pages carrying a tag
    Tagged { tag_id: String },
}

/// Who the request is made for
#[derive(Args, Debug, Clone, Default)]
pub struct ViewerArgs {
    /// Viewer user id (anonymous when omitted)
    #[arg(long)]
    pub viewer: Option<String>,
    /// Viewer is an administrator
    #[arg(long)]
    pub admin: bool,
    /// Domain the viewer belongs to (repeatable)
    #[arg(long = "domain")]
    pub domains: Vec<String>,
}

impl ViewerArgs {
    pub fn to_viewer(&self) -> ViewerContext {
        let mut viewer = match &self.viewer {
            Some(user_id) => ViewerContext::user(user_id.as_str()),
            None => ViewerContext::anonymous(),
        };
        for domain in &self.domains {
            viewer = viewer.with_domain(domain.as_str());
        }
        viewer.with_admin(self.admin)
    }
}

/// Split `ID` or `ID=PRESET` into an id and its options.
pub fn parse_staged_id<O>(
    arg: &str,
    default: O,
    preset: fn(&str) -> Option<O>,
) -> Result<(String, O), LoadError> {
    let (id, options) = match arg.split_once('=') {
        Some((id, name)) => {
            let options = preset(name.trim()).ok_or_else(|| {
                LoadError::InvalidInput(format!("Unknown preset '{}' for '{}'", name, id))
            })?;
            (id.trim(), options)
        }
        None => (arg.trim(), default),
    };
    if id.is_empty() {
        return Err(LoadError::InvalidInput(format!("Missing id in '{}'", arg)));
    }
    Ok((id.to_string(), options))
}

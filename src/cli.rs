//! CLI domain: parse, route and output only.
//! No pipeline logic; the route table dispatches to the load pipeline and stores.

mod output;
mod parse;
mod route;

pub use output::{format_report_text, map_error};
pub use parse::{parse_staged_id, Cli, Commands, ListCommands, ViewerArgs};
pub use route::RunContext;

//! CLI output: error mapping and text rendering of pipeline results.

use crate::bundle::ResultBundle;
use crate::error::LoadError;
use crate::load::ResolveReport;

/// Map pipeline errors to a string for CLI output.
pub fn map_error(e: &LoadError) -> String {
    match e {
        LoadError::IterationCapExceeded { .. } => {
            format!("{} (raise pipeline.max_iterations if this is expected)", e)
        }
        _ => e.to_string(),
    }
}

/// One line per registry entry, sorted by id, plus the resolve summary.
pub fn format_report_text(bundle: &ResultBundle, report: &ResolveReport) -> String {
    let mut lines = Vec::new();

    let mut pages: Vec<_> = bundle.maps.pages.iter().collect();
    pages.sort_by(|a, b| a.id().cmp(b.id()));
    for entry in pages {
        let detail = match entry.value() {
            Some(page) => format!(
                "{:?}  {}",
                page.page_type,
                page.title.as_deref().unwrap_or("")
            ),
            None => "(not found)".to_string(),
        };
        lines.push(format!("page     {}  {}", entry.id(), detail));
    }

    let mut users: Vec<_> = bundle.maps.users.iter().collect();
    users.sort_by(|a, b| a.id().cmp(b.id()));
    for entry in users {
        let detail = match entry.value() {
            Some(user) => [user.first_name.as_deref(), user.last_name.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" "),
            None => "(not found)".to_string(),
        };
        lines.push(format!("user     {}  {}", entry.id(), detail));
    }

    let mut masteries: Vec<_> = bundle.maps.masteries.iter().collect();
    masteries.sort_by(|a, b| a.id().cmp(b.id()));
    for entry in masteries {
        let detail = match entry.value() {
            Some(mastery) => format!(
                "level {}{}",
                mastery.level.unwrap_or(0),
                if mastery.has.unwrap_or(false) { " (has)" } else { "" }
            ),
            None => "(none)".to_string(),
        };
        lines.push(format!("mastery  {}  {}", entry.id(), detail));
    }

    lines.push(format!(
        "resolved in {} iteration(s), {} queries: {} loaded, {} not found",
        report.iterations,
        report.queries(),
        report.loaded,
        report.tombstoned
    ));
    lines.join("\n")
}

//! Table rendering for reconciliation reports

use shadowlink_sync::reconciliation::PlanItem;
use shadowlink_sync::ReconciliationReport;

const ID_WIDTH: usize = 36;
const NAME_WIDTH: usize = 28;
const SLUG_WIDTH: usize = 24;

/// Truncate a string for table display, handling Unicode safely.
///
/// If the string exceeds `max_len` characters, it is truncated with "..."
/// appended.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

fn row(action: &str, source: &str, mirror: &str, name: &str, slug: &str) -> String {
    format!(
        "{:<7} {:<id$} {:<id$} {:<name_w$} {}",
        action,
        source,
        mirror,
        truncate(name, NAME_WIDTH),
        truncate(slug, SLUG_WIDTH),
        id = ID_WIDTH,
        name_w = NAME_WIDTH,
    )
}

fn item_row(item: &PlanItem) -> String {
    let source = item.source_id.map(|id| id.to_string()).unwrap_or_else(|| "-".into());
    let mirror = item.mirror_id.map(|id| id.to_string()).unwrap_or_else(|| "(new)".into());
    row(item.action.as_str(), &source, &mirror, &item.name, &item.slug)
}

/// Render the planned changes of a report, one line per action.
#[must_use]
pub fn render_changes(report: &ReconciliationReport) -> String {
    if report.items.is_empty() {
        return "No changes.".to_string();
    }

    let mut lines = Vec::with_capacity(report.items.len() + 2);
    let header = row("ACTION", "SOURCE", "MIRROR", "NAME", "SLUG");
    lines.push(header.trim_end().to_string());
    lines.push("-".repeat(header.trim_end().chars().count()));
    lines.extend(report.items.iter().map(|item| item_row(item).trim_end().to_string()));
    lines.join("\n")
}

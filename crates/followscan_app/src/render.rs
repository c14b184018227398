//! Plain-text rendering of the popup view for a terminal.

use followscan_core::{ExtensionState, Status, StatusView};
use followscan_engine::Connectivity;

/// One-line progress update, printed while a scan runs.
pub fn progress_line(view: &StatusView) -> String {
    match view.count {
        Some(count) if view.status == Status::Scraping => format!("[{count:>6}] {}", view.headline),
        _ => view.headline.clone(),
    }
}

/// Full panel for a finished (or idle) state.
pub fn panel(state: &ExtensionState) -> String {
    let view = state.view();
    let mut lines = vec![view.headline.clone()];

    if let Some(detail) = &view.detail {
        if view.status == Status::Error {
            lines.push(format!("  details: {detail}"));
        }
    }
    if let Some(result) = &state.result {
        lines.push(format!(
            "  completed {}",
            result.completed_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        if let Some(url) = &state.source_url {
            lines.push(format!("  from {url}"));
        }
    }
    for tip in &view.tips {
        lines.push(format!("  - {tip}"));
    }
    if let Some(note) = &view.upload_note {
        lines.push(note.clone());
    }

    let mut actions = Vec::new();
    if view.can_start {
        actions.push("scan");
    }
    if view.can_upload {
        actions.push("upload");
    }
    if !actions.is_empty() {
        lines.push(format!("available: {}", actions.join(", ")));
    }
    lines.join("\n")
}

pub fn connectivity(status: &Connectivity) -> String {
    match (&status.session, status.service_up) {
        (Some(session), _) => format!("Signed in as @{}", session.handle),
        (None, true) => "Matching service is up but you are not signed in".to_string(),
        (None, false) => "Matching service is unreachable".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use followscan_core::{ErrorCategory, ErrorReport, Progress};

    #[test]
    fn scraping_line_shows_the_running_count() {
        let state = ExtensionState {
            status: Status::Scraping,
            progress: Some(Progress::scraping(42, "Found 42 accounts...")),
            ..ExtensionState::default()
        };

        assert_eq!(
            progress_line(&state.view()),
            "[    42] Scanning your list... 42 found"
        );
    }

    #[test]
    fn error_panel_lists_details_and_tips() {
        let state = ExtensionState {
            status: Status::Error,
            error: Some(ErrorReport {
                raw: "page detached: gone".to_string(),
                category: ErrorCategory::PageNavigated,
                user_message: "The page changed before the scan finished.".to_string(),
                troubleshooting_tips: vec!["Keep the tab open.".to_string()],
            }),
            ..ExtensionState::default()
        };

        let text = panel(&state);

        assert!(text.starts_with("The page changed before the scan finished."));
        assert!(text.contains("  details: page detached: gone"));
        assert!(text.contains("  - Keep the tab open."));
        assert!(text.ends_with("available: scan"));
    }
}

use crate::{ExtensionState, Status, UploadOutcome};

/// Render-ready projection of an [`ExtensionState`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusView {
    pub status: Status,
    pub headline: String,
    pub detail: Option<String>,
    pub count: Option<u64>,
    pub tips: Vec<String>,
    pub can_start: bool,
    pub can_upload: bool,
    pub upload_note: Option<String>,
}

impl StatusView {
    pub fn from_state(state: &ExtensionState) -> Self {
        let count = state.progress.as_ref().map(|p| p.count);
        let list = match (state.platform, state.page_type) {
            (Some(platform), Some(page_type)) => {
                format!("{} {} list", platform.display_name(), page_type)
            }
            _ => "list".to_string(),
        };

        let headline = match state.status {
            Status::Idle => "Open a supported Following page to begin".to_string(),
            Status::Ready => format!("Ready to scan your {list}"),
            Status::Scraping => format!("Scanning your {list}... {} found", count.unwrap_or(0)),
            Status::Complete => {
                let total = state.result.as_ref().map_or(0, |r| r.total_count);
                format!("Scan complete: {total} accounts")
            }
            Status::Error => state
                .error
                .as_ref()
                .map(|e| e.user_message.clone())
                .unwrap_or_else(|| "The scan failed.".to_string()),
            Status::Uploading => {
                let total = state.result.as_ref().map_or(0, |r| r.total_count);
                format!("Uploading {total} accounts...")
            }
        };

        let detail = match state.status {
            Status::Error => state.error.as_ref().map(|e| e.raw.clone()),
            _ => state.progress.as_ref().map(|p| p.message.clone()),
        };

        let tips = state
            .error
            .as_ref()
            .map(|e| e.troubleshooting_tips.clone())
            .unwrap_or_default();

        let has_result = state
            .result
            .as_ref()
            .is_some_and(|r| !r.identifiers.is_empty());

        let upload_note = state.upload.as_ref().map(|outcome| match outcome {
            UploadOutcome::Succeeded(receipt) => format!(
                "Uploaded {} accounts. Continue at {}",
                receipt.username_count, receipt.redirect_url
            ),
            UploadOutcome::Failed { message } => format!("Upload failed: {message}"),
        });

        Self {
            status: state.status,
            headline,
            detail,
            count,
            tips,
            can_start: matches!(state.status, Status::Ready | Status::Complete | Status::Error),
            can_upload: state.status == Status::Complete && has_result,
            upload_note,
        }
    }
}

use crate::{Effect, ExtensionState, Msg, Progress, ProgressStatus, Status, UploadOutcome};

pub const STARTING_MESSAGE: &str = "Starting scan...";

/// Upload outcome recorded when the context that began an upload is gone.
pub const UPLOAD_INTERRUPTED: &str = "The upload was interrupted before it finished.";

/// Pure merge: computes the next record from the current one and a message.
///
/// The returned state is a full replacement. Messages that do not apply to the
/// current status leave the state untouched and produce no effects.
pub fn merge(state: ExtensionState, msg: Msg) -> (ExtensionState, Vec<Effect>) {
    let next = match msg {
        Msg::PageReady {
            platform,
            page_type,
        } => match state.status {
            // A fresh page context means any run still marked scraping lost its page.
            Status::Idle | Status::Ready | Status::Scraping => ExtensionState {
                status: Status::Ready,
                platform: Some(platform),
                page_type: Some(page_type),
                ..ExtensionState::default()
            },
            _ => return unchanged(state),
        },
        Msg::ScrapeStarted {
            platform,
            page_type,
            source_url,
        } => {
            if state.status == Status::Uploading {
                return unchanged(state);
            }
            ExtensionState {
                status: Status::Scraping,
                platform: Some(platform),
                page_type: Some(page_type),
                source_url,
                progress: Some(Progress::scraping(0, STARTING_MESSAGE)),
                ..ExtensionState::default()
            }
        }
        Msg::ScrapeProgress { count, message } => {
            if state.status != Status::Scraping {
                return unchanged(state);
            }
            // Count never goes backwards within a run.
            let count = count.max(state.progress_count());
            ExtensionState {
                progress: Some(Progress::scraping(count, message)),
                ..state
            }
        }
        Msg::ScrapeCompleted(result) => {
            // Terminal events only close the run that is in flight.
            if state.status != Status::Scraping || result.validate().is_err() {
                return unchanged(state);
            }
            let total = result.total_count;
            ExtensionState {
                status: Status::Complete,
                progress: Some(Progress {
                    count: total,
                    status: ProgressStatus::Complete,
                    message: format!("Found {total} accounts"),
                }),
                result: Some(result),
                error: None,
                upload: None,
                ..state
            }
        }
        Msg::ScrapeFailed(report) => {
            if state.status != Status::Scraping {
                return unchanged(state);
            }
            let progress = Progress {
                count: state.progress_count(),
                status: ProgressStatus::Error,
                message: report.user_message.clone(),
            };
            ExtensionState {
                status: Status::Error,
                progress: Some(progress),
                result: None,
                error: Some(report),
                upload: None,
                ..state
            }
        }
        Msg::UploadStarted => {
            if state.status != Status::Complete || state.result.is_none() {
                return unchanged(state);
            }
            ExtensionState {
                status: Status::Uploading,
                upload: None,
                ..state
            }
        }
        Msg::UploadSucceeded(receipt) => {
            match finish_upload(state, UploadOutcome::Succeeded(receipt)) {
                Ok(next) => next,
                Err(state) => return unchanged(state),
            }
        }
        Msg::UploadFailed { message } => {
            match finish_upload(state, UploadOutcome::Failed { message }) {
                Ok(next) => next,
                Err(state) => return unchanged(state),
            }
        }
        Msg::Reset => ExtensionState::idle(),
    };

    (next, vec![Effect::Persist, Effect::NotifyUi])
}

fn finish_upload(
    state: ExtensionState,
    outcome: UploadOutcome,
) -> Result<ExtensionState, ExtensionState> {
    if state.status != Status::Uploading {
        return Err(state);
    }
    Ok(ExtensionState {
        status: Status::Complete,
        upload: Some(outcome),
        ..state
    })
}

fn unchanged(state: ExtensionState) -> (ExtensionState, Vec<Effect>) {
    (state, Vec::new())
}

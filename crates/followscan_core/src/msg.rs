use crate::{ErrorReport, InvariantError, PageType, Platform, ScrapeResult, UploadReceipt};

/// State-changing inputs accepted by [`crate::merge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// A supported list page finished loading in the page context.
    PageReady {
        platform: Platform,
        page_type: PageType,
    },
    /// The page context began a new run.
    ScrapeStarted {
        platform: Platform,
        page_type: PageType,
        source_url: Option<String>,
    },
    /// Running count of identifiers collected so far.
    ScrapeProgress { count: u64, message: String },
    /// The run converged.
    ScrapeCompleted(ScrapeResult),
    /// The run aborted with a classified failure.
    ScrapeFailed(ErrorReport),
    /// The UI began uploading the current result.
    UploadStarted,
    UploadSucceeded(UploadReceipt),
    /// Upload failed; carries the raw error text.
    UploadFailed { message: String },
    /// Explicit reset back to idle.
    Reset,
}

impl Msg {
    /// Payload checks that decoding alone cannot express.
    pub fn validate(&self) -> Result<(), InvariantError> {
        match self {
            Msg::ScrapeCompleted(result) => result.validate(),
            _ => Ok(()),
        }
    }
}

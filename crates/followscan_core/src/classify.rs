use std::time::Duration;

use crate::{ErrorCategory, ErrorReport};

/// Runs longer than this get an extra hint about long lists.
const LONG_RUN: Duration = Duration::from_secs(120);

/// What the engine knew when a run stopped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Diagnostics {
    pub elements_found: u64,
    pub scroll_attempts: u32,
    pub elapsed: Duration,
    pub page_url: String,
}

/// Where a run failed, as seen by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    /// The page went away (navigation, tab closed, context destroyed).
    PageDetached,
    /// Reading the rendered document failed.
    DomAccess,
    /// The strategy's selector could not be used.
    SelectorInvalid,
    /// The list converged without a single identifier.
    NothingFound,
    Other,
}

/// Turn a raw failure plus diagnostics into a user-facing report.
pub fn classify(raw: impl Into<String>, cause: FailureCause, diag: &Diagnostics) -> ErrorReport {
    let raw = raw.into();
    let (category, user_message) = match cause {
        FailureCause::NothingFound => (
            ErrorCategory::NoAccountsFound,
            "No accounts were found on this page.",
        ),
        FailureCause::PageDetached => (
            ErrorCategory::PageNavigated,
            "The page changed before the scan finished.",
        ),
        FailureCause::DomAccess | FailureCause::SelectorInvalid => (
            ErrorCategory::PageStructure,
            "The page layout was not recognised.",
        ),
        FailureCause::Other => (ErrorCategory::Unknown, "The scan stopped unexpectedly."),
    };

    ErrorReport {
        raw,
        category,
        user_message: user_message.to_string(),
        troubleshooting_tips: tips(category, diag),
    }
}

fn tips(category: ErrorCategory, diag: &Diagnostics) -> Vec<String> {
    let mut tips = Vec::new();
    match category {
        ErrorCategory::NoAccountsFound => {
            tips.push("Make sure you are logged in and the list is visible.".to_string());
            tips.push(
                "Open your Following page, wait for it to load, then scan again.".to_string(),
            );
            if diag.scroll_attempts > 0 {
                tips.push(format!(
                    "Nothing appeared after {} scrolls; the list may be empty or private.",
                    diag.scroll_attempts
                ));
            }
        }
        ErrorCategory::PageNavigated => {
            tips.push("Keep the tab open on the list until the scan finishes.".to_string());
            if diag.elements_found > 0 {
                tips.push(format!(
                    "{} accounts were collected before the page changed; start a new scan to \
                     collect them all.",
                    diag.elements_found
                ));
            }
        }
        ErrorCategory::PageStructure => {
            tips.push("Reload the page and try again.".to_string());
            tips.push(
                "The site may have changed its layout; check for an extension update.".to_string(),
            );
        }
        ErrorCategory::Unknown => {
            tips.push("Reload the page and try again.".to_string());
        }
    }

    if diag.elapsed >= LONG_RUN {
        tips.push(format!(
            "The scan ran for {}s; long lists are faster with the tab in the foreground.",
            diag.elapsed.as_secs()
        ));
    }
    if !diag.page_url.is_empty() {
        tips.push(format!("Page: {}", diag.page_url));
    }
    tips
}

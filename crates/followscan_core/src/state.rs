use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::view_model::StatusView;
use crate::{PageType, Platform};

/// Coarse activity of the extension. Exactly one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Idle,
    Ready,
    Scraping,
    Complete,
    Error,
    Uploading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Scraping,
    Complete,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub count: u64,
    pub status: ProgressStatus,
    pub message: String,
}

impl Progress {
    pub fn scraping(count: u64, message: impl Into<String>) -> Self {
        Self {
            count,
            status: ProgressStatus::Scraping,
            message: message.into(),
        }
    }
}

/// Final identifier set of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResult {
    pub identifiers: BTreeSet<String>,
    pub total_count: u64,
    pub completed_at: DateTime<Utc>,
}

impl ScrapeResult {
    pub fn new(identifiers: BTreeSet<String>, completed_at: DateTime<Utc>) -> Self {
        let total_count = identifiers.len() as u64;
        Self {
            identifiers,
            total_count,
            completed_at,
        }
    }

    /// The declared total must be the size of the identifier set.
    pub fn validate(&self) -> Result<(), InvariantError> {
        let actual = self.identifiers.len() as u64;
        if self.total_count != actual {
            return Err(InvariantError::TotalMismatch {
                total: self.total_count,
                actual,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The list rendered no recognisable accounts.
    NoAccountsFound,
    /// The page was navigated away or torn down mid-run.
    PageNavigated,
    /// Selector or DOM assumptions no longer hold.
    PageStructure,
    Unknown,
}

/// Classified failure of a run, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub raw: String,
    pub category: ErrorCategory,
    pub user_message: String,
    pub troubleshooting_tips: Vec<String>,
}

/// Successful upload response from the matching service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub import_id: String,
    pub username_count: u64,
    pub redirect_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadOutcome {
    Succeeded(UploadReceipt),
    Failed { message: String },
}

/// The single canonical record shared by every context.
///
/// Transitions always produce a whole new record; see [`crate::merge`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionState {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_type: Option<PageType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ScrapeResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload: Option<UploadOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantError {
    #[error("result and error are both present")]
    ResultAndError,
    #[error("result present while status is {0:?}")]
    UnexpectedResult(Status),
    #[error("error present while status is {0:?}")]
    UnexpectedError(Status),
    #[error("result total {total} does not match {actual} identifiers")]
    TotalMismatch { total: u64, actual: u64 },
    #[error("progress count {count} exceeds result total {total}")]
    ProgressExceedsTotal { count: u64, total: u64 },
}

impl ExtensionState {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn view(&self) -> StatusView {
        StatusView::from_state(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, Status::Complete | Status::Error)
    }

    pub fn progress_count(&self) -> u64 {
        self.progress.as_ref().map_or(0, |p| p.count)
    }

    /// Check the cross-field invariants of the record.
    pub fn validate(&self) -> Result<(), InvariantError> {
        if self.result.is_some() && self.error.is_some() {
            return Err(InvariantError::ResultAndError);
        }
        if let Some(result) = &self.result {
            if !matches!(self.status, Status::Complete | Status::Uploading) {
                return Err(InvariantError::UnexpectedResult(self.status));
            }
            result.validate()?;
            let count = self.progress_count();
            if count > result.total_count {
                return Err(InvariantError::ProgressExceedsTotal {
                    count,
                    total: result.total_count,
                });
            }
        }
        if self.error.is_some() && self.status != Status::Error {
            return Err(InvariantError::UnexpectedError(self.status));
        }
        Ok(())
    }
}

//! Followscan core: data model, pure merge function and view-model helpers.
mod classify;
mod effect;
mod msg;
mod platform;
mod state;
mod update;
mod view_model;

pub use classify::{classify, Diagnostics, FailureCause};
pub use effect::Effect;
pub use msg::Msg;
pub use platform::{detect_page, PageContext, PageType, Platform};
pub use state::{
    ErrorCategory, ErrorReport, ExtensionState, InvariantError, Progress, ProgressStatus,
    ScrapeResult, Status, UploadOutcome, UploadReceipt,
};
pub use update::{merge, STARTING_MESSAGE, UPLOAD_INTERRUPTED};
pub use view_model::StatusView;

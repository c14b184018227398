use followscan_core::{ErrorReport, ScrapeResult};

/// Events emitted by one scrape run, in order. A run ends with exactly one
/// `Completed` or `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeEvent {
    Progress { count: u64, message: String },
    Completed(ScrapeResult),
    Failed(ErrorReport),
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ScrapeEvent);
}

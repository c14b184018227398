use std::collections::BTreeSet;
use std::time::Duration;

use chrono::Utc;
use followscan_core::{classify, Diagnostics, ErrorReport, FailureCause, ScrapeResult};
use scan_logging::{scan_debug, scan_info, scan_warn};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{Page, PageError, ProgressSink, ScrapeEvent, Strategy};

#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    /// Pause after each scroll so lazy rows can render.
    pub settle_interval: Duration,
    /// Consecutive no-growth iterations that end the run.
    pub stable_threshold: u32,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            settle_interval: Duration::from_millis(1000),
            stable_threshold: 3,
        }
    }
}

/// State of one run; lives only for the duration of [`ScrapeEngine::run`].
struct ScrapeRun {
    identifiers: BTreeSet<String>,
    stable_count: u32,
    last_size: usize,
    scroll_attempts: u32,
    started: Instant,
}

impl ScrapeRun {
    fn new() -> Self {
        Self {
            identifiers: BTreeSet::new(),
            stable_count: 0,
            last_size: 0,
            scroll_attempts: 0,
            started: Instant::now(),
        }
    }

    fn count(&self) -> u64 {
        self.identifiers.len() as u64
    }

    /// Record the size after an iteration; returns the current stall streak.
    fn observe(&mut self) -> u32 {
        let size = self.identifiers.len();
        if size == self.last_size {
            self.stable_count += 1;
        } else {
            self.stable_count = 0;
            self.last_size = size;
        }
        self.stable_count
    }

    fn diagnostics(&self, page_url: String) -> Diagnostics {
        Diagnostics {
            elements_found: self.count(),
            scroll_attempts: self.scroll_attempts,
            elapsed: self.started.elapsed(),
            page_url,
        }
    }
}

/// Drives one [`Strategy`] over a lazily-loading list until it stops growing.
#[derive(Debug, Clone)]
pub struct ScrapeEngine {
    strategy: Strategy,
    settings: ScrapeSettings,
}

impl ScrapeEngine {
    pub fn new(strategy: Strategy, settings: ScrapeSettings) -> Self {
        Self { strategy, settings }
    }

    /// Scan, scroll and settle until `stable_threshold` consecutive
    /// iterations add nothing.
    ///
    /// Every iteration emits a progress event; the run ends with exactly one
    /// `Completed` or `Failed` event, mirrored by the return value. Page
    /// errors and cancellation stop the run immediately; there are no retries.
    pub async fn run<P>(
        &self,
        page: &mut P,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<ScrapeResult, ErrorReport>
    where
        P: Page + ?Sized,
    {
        let mut run = ScrapeRun::new();
        scan_info!(
            "Scrape started platform={} url={}",
            self.strategy.platform(),
            page.location()
        );

        loop {
            let rendered = match page.html() {
                Ok(html) => self.strategy.scan(&html, &mut run.identifiers),
                Err(err) => return Err(self.fail(&run, page, &err, sink)),
            };
            let count = run.count();
            scan_debug!("Scan pass rendered={} collected={}", rendered, count);
            sink.emit(ScrapeEvent::Progress {
                count,
                message: format!("Found {count} accounts..."),
            });

            if let Err(err) = page.scroll_forward() {
                return Err(self.fail(&run, page, &err, sink));
            }
            run.scroll_attempts += 1;

            tokio::select! {
                _ = tokio::time::sleep(self.settings.settle_interval) => {}
                _ = cancel.cancelled() => {
                    let err = PageError::Detached("navigated away during scan".to_string());
                    return Err(self.fail(&run, page, &err, sink));
                }
            }

            if run.observe() >= self.settings.stable_threshold {
                break;
            }
        }

        if run.identifiers.is_empty() {
            let diag = run.diagnostics(page.location());
            let report = classify(
                "no identifiers found after the list stopped growing",
                FailureCause::NothingFound,
                &diag,
            );
            scan_warn!("Scrape found nothing after {} scrolls", diag.scroll_attempts);
            sink.emit(ScrapeEvent::Failed(report.clone()));
            return Err(report);
        }

        let scroll_attempts = run.scroll_attempts;
        let result = ScrapeResult::new(run.identifiers, Utc::now());
        scan_info!(
            "Scrape converged total={} scrolls={}",
            result.total_count,
            scroll_attempts
        );
        sink.emit(ScrapeEvent::Completed(result.clone()));
        Ok(result)
    }

    fn fail<P>(
        &self,
        run: &ScrapeRun,
        page: &P,
        err: &PageError,
        sink: &dyn ProgressSink,
    ) -> ErrorReport
    where
        P: Page + ?Sized,
    {
        let diag = run.diagnostics(page.location());
        scan_warn!(
            "Scrape failed: {} (found={} scrolls={} elapsed={:?} url={})",
            err,
            diag.elements_found,
            diag.scroll_attempts,
            diag.elapsed,
            diag.page_url
        );
        let report = classify(err.to_string(), err.cause(), &diag);
        sink.emit(ScrapeEvent::Failed(report.clone()));
        report
    }
}

use std::sync::{Arc, Mutex};
use std::time::Duration;

use followscan_core::{ErrorCategory, Platform};
use followscan_engine::{
    Page, PageError, ProgressSink, ScrapeEngine, ScrapeEvent, ScrapeSettings, SnapshotPage,
    Strategy,
};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

const LOCATION: &str = "https://x.com/alice/following";

#[derive(Default)]
struct TestSink {
    events: Arc<Mutex<Vec<ScrapeEvent>>>,
}

impl TestSink {
    fn take(&self) -> Vec<ScrapeEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl ProgressSink for TestSink {
    fn emit(&self, event: ScrapeEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Serves frames until `healthy_reads` is used up, then reports a detached page.
struct DetachingPage {
    inner: SnapshotPage,
    healthy_reads: usize,
}

impl Page for DetachingPage {
    fn location(&self) -> String {
        self.inner.location()
    }

    fn html(&self) -> Result<String, PageError> {
        if self.healthy_reads == 0 {
            return Err(PageError::Detached("execution context was destroyed".to_string()));
        }
        self.inner.html()
    }

    fn scroll_forward(&mut self) -> Result<(), PageError> {
        self.healthy_reads = self.healthy_reads.saturating_sub(1);
        self.inner.scroll_forward()
    }
}

fn frame(handles: &[&str]) -> String {
    let cells: String = handles
        .iter()
        .map(|h| {
            format!(
                r#"<div data-testid="UserCell"><span>{h} display</span><span>@{h}</span></div>"#
            )
        })
        .collect();
    format!("<html><body>{cells}</body></html>")
}

fn handles(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{prefix}{i}")).collect()
}

fn as_refs(owned: &[String]) -> Vec<&str> {
    owned.iter().map(String::as_str).collect()
}

fn engine() -> ScrapeEngine {
    ScrapeEngine::new(
        Strategy::for_platform(Platform::Twitter).expect("strategy"),
        ScrapeSettings {
            settle_interval: Duration::from_millis(1000),
            stable_threshold: 3,
        },
    )
}

fn progress_counts(events: &[ScrapeEvent]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|event| match event {
            ScrapeEvent::Progress { count, .. } => Some(*count),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn run_stops_after_three_stable_iterations() {
    let first = handles("user", 5);
    let all = handles("user", 9);
    let mut page = SnapshotPage::new(
        LOCATION,
        vec![frame(&as_refs(&first)), frame(&as_refs(&all))],
    );
    let sink = TestSink::default();

    let result = engine()
        .run(&mut page, &sink, &CancellationToken::new())
        .await
        .expect("scrape ok");

    assert_eq!(result.total_count, 9);
    let events = sink.take();
    assert_eq!(progress_counts(&events), vec![5, 9, 9, 9, 9]);
    assert_eq!(events.last(), Some(&ScrapeEvent::Completed(result)));
}

#[tokio::test(start_paused = true)]
async fn overlapping_windows_are_deduplicated() {
    // A virtualized list: each render shows a sliding window of rows.
    let frames = vec![
        frame(&["a", "b", "c"]),
        frame(&["b", "c", "d"]),
        frame(&["c", "d", "e"]),
        frame(&["d", "e"]),
    ];
    let mut page = SnapshotPage::new(LOCATION, frames);
    let sink = TestSink::default();

    let result = engine()
        .run(&mut page, &sink, &CancellationToken::new())
        .await
        .expect("scrape ok");

    assert_eq!(
        result.identifiers.iter().cloned().collect::<Vec<_>>(),
        vec!["a", "b", "c", "d", "e"]
    );
    assert_eq!(result.total_count, 5);
    let counts = progress_counts(&sink.take());
    assert!(counts.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[tokio::test(start_paused = true)]
async fn page_error_ends_the_run_with_diagnostics() {
    let mut page = DetachingPage {
        inner: SnapshotPage::new(
            LOCATION,
            vec![frame(&["a", "b"]), frame(&["a", "b", "c", "d"])],
        ),
        healthy_reads: 2,
    };
    let sink = TestSink::default();

    let report = engine()
        .run(&mut page, &sink, &CancellationToken::new())
        .await
        .expect_err("page detached");

    assert_eq!(report.category, ErrorCategory::PageNavigated);
    assert!(report.raw.contains("execution context was destroyed"));
    assert!(report
        .troubleshooting_tips
        .iter()
        .any(|tip| tip.starts_with("4 accounts were collected")));
    assert!(report
        .troubleshooting_tips
        .contains(&format!("Page: {LOCATION}")));

    let events = sink.take();
    assert_eq!(progress_counts(&events), vec![2, 4]);
    assert_eq!(events.last(), Some(&ScrapeEvent::Failed(report)));
}

#[tokio::test(start_paused = true)]
async fn cancellation_reports_navigation() {
    let mut page = SnapshotPage::new(LOCATION, vec![frame(&["a"]), frame(&["a", "b"])]);
    let sink = TestSink::default();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = engine()
        .run(&mut page, &sink, &cancel)
        .await
        .expect_err("cancelled");

    assert_eq!(report.category, ErrorCategory::PageNavigated);
    let events = sink.take();
    assert_eq!(progress_counts(&events), vec![1]);
    assert!(matches!(events.last(), Some(ScrapeEvent::Failed(_))));
}

#[tokio::test(start_paused = true)]
async fn empty_list_is_reported_as_no_accounts() {
    let mut page = SnapshotPage::new(LOCATION, vec![frame(&[])]);
    let sink = TestSink::default();

    let report = engine()
        .run(&mut page, &sink, &CancellationToken::new())
        .await
        .expect_err("nothing found");

    assert_eq!(report.category, ErrorCategory::NoAccountsFound);
    assert_eq!(report.user_message, "No accounts were found on this page.");
    assert!(report
        .troubleshooting_tips
        .iter()
        .any(|tip| tip.starts_with("Nothing appeared after 3 scrolls")));
    let events = sink.take();
    assert_eq!(progress_counts(&events), vec![0, 0, 0]);
    assert!(matches!(events.last(), Some(ScrapeEvent::Failed(_))));
}

#[tokio::test(start_paused = true)]
async fn page_without_frames_is_a_structure_error() {
    let mut page = SnapshotPage::new(LOCATION, Vec::new());
    let sink = TestSink::default();

    let report = engine()
        .run(&mut page, &sink, &CancellationToken::new())
        .await
        .expect_err("no content");

    assert_eq!(report.category, ErrorCategory::PageStructure);
    assert!(progress_counts(&sink.take()).is_empty());
}

use followscan_core::{detect_page, PageContext};
use scan_logging::{scan_debug, scan_info, scan_warn};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    Bus, ContextKind, Endpoint, Message, Page, PageError, ProgressSink, Reply, ScrapeEngine,
    ScrapeEvent, ScrapeSettings, Strategy,
};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("not a supported list page: {0}")]
    Unsupported(String),
    #[error(transparent)]
    Strategy(#[from] PageError),
}

/// Forwards engine events to the coordinator as notifications.
struct BusSink {
    bus: Bus,
}

impl ProgressSink for BusSink {
    fn emit(&self, event: ScrapeEvent) {
        let message = match event {
            ScrapeEvent::Progress { count, message } => Message::ScrapeProgress { count, message },
            ScrapeEvent::Completed(result) => Message::ScrapeComplete(result),
            ScrapeEvent::Failed(report) => Message::ScrapeError(report),
        };
        if let Err(err) = self
            .bus
            .notify(ContextKind::Page, ContextKind::Coordinator, &message)
        {
            // At-most-once: the coordinator re-reads the store when it returns.
            scan_debug!("{} dropped: {}", message.type_name(), err);
        }
    }
}

/// The engine's host inside the page context.
pub struct PageAgent<P> {
    bus: Bus,
    page: P,
    context: PageContext,
    engine: ScrapeEngine,
}

/// Running page context.
pub struct PageAgentHandle {
    task: JoinHandle<()>,
    cancel: CancellationToken,
}

impl PageAgentHandle {
    /// Leave the page: any running scan stops at its next settle point.
    pub async fn navigate_away(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl<P: Page + 'static> PageAgent<P> {
    /// Attach to `page` if it is a supported list, announce it, and serve
    /// START_SCRAPE requests on a new task.
    pub fn spawn(
        bus: Bus,
        page: P,
        settings: ScrapeSettings,
    ) -> Result<PageAgentHandle, AgentError> {
        let location = page.location();
        let context = detect_page(&location).ok_or(AgentError::Unsupported(location))?;
        let engine = ScrapeEngine::new(Strategy::for_platform(context.platform)?, settings);

        let endpoint = bus.bind(ContextKind::Page);
        let cancel = CancellationToken::new();
        let agent = Self {
            bus,
            page,
            context,
            engine,
        };
        let task = tokio::spawn(agent.serve(endpoint, cancel.clone()));
        Ok(PageAgentHandle { task, cancel })
    }

    async fn serve(mut self, mut endpoint: Endpoint, cancel: CancellationToken) {
        self.announce();
        loop {
            let inbound = tokio::select! {
                _ = cancel.cancelled() => break,
                inbound = endpoint.recv() => inbound,
            };
            let Some(inbound) = inbound else { break };
            let (from, message, responder) = inbound.split();
            match message {
                Message::StartScrape => {
                    // SCRAPE_START must be queued before the caller sees the ack.
                    self.announce_start();
                    responder.respond(Reply::Ack);
                    self.run(&cancel).await;
                }
                other => {
                    scan_warn!("Page context ignored {} from {}", other.type_name(), from);
                    responder.respond(Reply::rejected(format!(
                        "{} is not handled by the page",
                        other.type_name()
                    )));
                }
            }
        }
        scan_info!("Page context closed");
    }

    fn announce(&self) {
        let ready = Message::PageReady {
            platform: self.context.platform,
            page_type: self.context.page_type,
        };
        if let Err(err) = self
            .bus
            .notify(ContextKind::Page, ContextKind::Coordinator, &ready)
        {
            scan_debug!("PAGE_READY dropped: {}", err);
        }
    }

    fn announce_start(&self) {
        let start = Message::ScrapeStart {
            platform: self.context.platform,
            page_type: self.context.page_type,
            source_url: Some(self.page.location()),
        };
        if let Err(err) = self
            .bus
            .notify(ContextKind::Page, ContextKind::Coordinator, &start)
        {
            scan_debug!("SCRAPE_START dropped: {}", err);
        }
    }

    async fn run(&mut self, cancel: &CancellationToken) {
        let sink = BusSink {
            bus: self.bus.clone(),
        };
        match self.engine.run(&mut self.page, &sink, cancel).await {
            Ok(result) => scan_info!("Page scan finished with {} accounts", result.total_count),
            Err(report) => scan_warn!("Page scan failed: {}", report.raw),
        }
    }
}

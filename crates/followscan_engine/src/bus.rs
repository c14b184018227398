use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use followscan_core::{
    ErrorReport, ExtensionState, Msg, PageType, Platform, ScrapeResult, UploadReceipt,
};
use scan_logging::{scan_debug, scan_trace, scan_warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// The three execution contexts that talk over the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    Page,
    Coordinator,
    Ui,
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContextKind::Page => "page",
            ContextKind::Coordinator => "coordinator",
            ContextKind::Ui => "ui",
        };
        f.write_str(name)
    }
}

/// Typed envelope: `{"type": "SCRAPE_PROGRESS", "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Message {
    PageReady {
        platform: Platform,
        page_type: PageType,
    },
    ScrapeStart {
        platform: Platform,
        page_type: PageType,
        #[serde(default)]
        source_url: Option<String>,
    },
    ScrapeProgress {
        count: u64,
        message: String,
    },
    ScrapeComplete(ScrapeResult),
    ScrapeError(ErrorReport),
    GetState,
    StateUpdate(ExtensionState),
    StartScrape,
    UploadStarted,
    UploadSucceeded(UploadReceipt),
    UploadFailed {
        message: String,
    },
    Reset,
}

impl Message {
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::PageReady { .. } => "PAGE_READY",
            Message::ScrapeStart { .. } => "SCRAPE_START",
            Message::ScrapeProgress { .. } => "SCRAPE_PROGRESS",
            Message::ScrapeComplete(_) => "SCRAPE_COMPLETE",
            Message::ScrapeError(_) => "SCRAPE_ERROR",
            Message::GetState => "GET_STATE",
            Message::StateUpdate(_) => "STATE_UPDATE",
            Message::StartScrape => "START_SCRAPE",
            Message::UploadStarted => "UPLOAD_STARTED",
            Message::UploadSucceeded(_) => "UPLOAD_SUCCEEDED",
            Message::UploadFailed { .. } => "UPLOAD_FAILED",
            Message::Reset => "RESET",
        }
    }

    pub fn encode(&self) -> Result<String, DeliveryError> {
        serde_json::to_string(self).map_err(|err| DeliveryError::Encode(err.to_string()))
    }

    pub fn decode(raw: &str) -> Result<Self, MessageError> {
        serde_json::from_str(raw).map_err(|err| MessageError::Malformed(err.to_string()))
    }

    /// The state transition this message requests, if it is one.
    pub fn into_msg(self) -> Option<Msg> {
        let msg = match self {
            Message::PageReady {
                platform,
                page_type,
            } => Msg::PageReady {
                platform,
                page_type,
            },
            Message::ScrapeStart {
                platform,
                page_type,
                source_url,
            } => Msg::ScrapeStarted {
                platform,
                page_type,
                source_url,
            },
            Message::ScrapeProgress { count, message } => Msg::ScrapeProgress { count, message },
            Message::ScrapeComplete(result) => Msg::ScrapeCompleted(result),
            Message::ScrapeError(report) => Msg::ScrapeFailed(report),
            Message::UploadStarted => Msg::UploadStarted,
            Message::UploadSucceeded(receipt) => Msg::UploadSucceeded(receipt),
            Message::UploadFailed { message } => Msg::UploadFailed { message },
            Message::Reset => Msg::Reset,
            Message::GetState | Message::StateUpdate(_) | Message::StartScrape => return None,
        };
        Some(msg)
    }
}

/// Answer to a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ack,
    State(ExtensionState),
    Rejected { reason: String },
}

impl Reply {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Reply::Rejected {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("no {0} context is listening")]
    RecipientAbsent(ContextKind),
    #[error("{0} context dropped the request without replying")]
    NoResponse(ContextKind),
    #[error("{0} context did not reply within {1:?}")]
    TimedOut(ContextKind, Duration),
    #[error("message could not be encoded: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("malformed message: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone)]
pub struct BusSettings {
    /// Upper bound on how long a call waits for its reply.
    pub call_timeout: Duration,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(5),
        }
    }
}

struct Delivery {
    from: ContextKind,
    raw: String,
    reply: Option<oneshot::Sender<Reply>>,
}

struct Route {
    generation: u64,
    tx: mpsc::UnboundedSender<Delivery>,
}

#[derive(Default)]
struct Routes {
    next_generation: u64,
    by_kind: HashMap<ContextKind, Route>,
}

/// In-process channel between contexts.
///
/// Delivery is at-most-once and never queued for an absent recipient.
#[derive(Clone)]
pub struct Bus {
    routes: Arc<Mutex<Routes>>,
    settings: BusSettings,
}

impl Bus {
    pub fn new(settings: BusSettings) -> Self {
        Self {
            routes: Arc::new(Mutex::new(Routes::default())),
            settings,
        }
    }

    /// Attach a context. A previous endpoint of the same kind is detached and
    /// its `recv` returns `None`.
    pub fn bind(&self, kind: ContextKind) -> Endpoint {
        let (tx, rx) = mpsc::unbounded_channel();
        let generation = {
            let mut routes = self.lock();
            routes.next_generation += 1;
            let generation = routes.next_generation;
            routes.by_kind.insert(kind, Route { generation, tx });
            generation
        };
        scan_debug!("Bus bound {} (generation {})", kind, generation);
        Endpoint {
            kind,
            generation,
            rx,
            bus: self.clone(),
        }
    }

    pub fn is_bound(&self, kind: ContextKind) -> bool {
        self.lock()
            .by_kind
            .get(&kind)
            .is_some_and(|route| !route.tx.is_closed())
    }

    /// Fire-and-forget.
    pub fn notify(
        &self,
        from: ContextKind,
        to: ContextKind,
        message: &Message,
    ) -> Result<(), DeliveryError> {
        scan_trace!("notify {} -> {}: {}", from, to, message.type_name());
        self.notify_raw(from, to, message.encode()?)
    }

    pub fn notify_raw(
        &self,
        from: ContextKind,
        to: ContextKind,
        raw: impl Into<String>,
    ) -> Result<(), DeliveryError> {
        self.dispatch(
            to,
            Delivery {
                from,
                raw: raw.into(),
                reply: None,
            },
        )
    }

    /// Send and wait for exactly one reply.
    pub async fn call(
        &self,
        from: ContextKind,
        to: ContextKind,
        message: &Message,
    ) -> Result<Reply, DeliveryError> {
        scan_trace!("call {} -> {}: {}", from, to, message.type_name());
        self.call_raw(from, to, message.encode()?).await
    }

    pub async fn call_raw(
        &self,
        from: ContextKind,
        to: ContextKind,
        raw: impl Into<String>,
    ) -> Result<Reply, DeliveryError> {
        let (tx, rx) = oneshot::channel();
        self.dispatch(
            to,
            Delivery {
                from,
                raw: raw.into(),
                reply: Some(tx),
            },
        )?;

        let wait = self.settings.call_timeout;
        match tokio::time::timeout(wait, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(DeliveryError::NoResponse(to)),
            Err(_) => Err(DeliveryError::TimedOut(to, wait)),
        }
    }

    fn dispatch(&self, to: ContextKind, delivery: Delivery) -> Result<(), DeliveryError> {
        let routes = self.lock();
        let route = routes
            .by_kind
            .get(&to)
            .ok_or(DeliveryError::RecipientAbsent(to))?;
        route
            .tx
            .send(delivery)
            .map_err(|_| DeliveryError::RecipientAbsent(to))
    }

    fn unbind(&self, kind: ContextKind, generation: u64) {
        let mut routes = self.lock();
        if routes
            .by_kind
            .get(&kind)
            .is_some_and(|route| route.generation == generation)
        {
            routes.by_kind.remove(&kind);
            scan_debug!("Bus unbound {} (generation {})", kind, generation);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Routes> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(BusSettings::default())
    }
}

/// Receiving side of one context. Dropping it detaches the context.
pub struct Endpoint {
    kind: ContextKind,
    generation: u64,
    rx: mpsc::UnboundedReceiver<Delivery>,
    bus: Bus,
}

impl Endpoint {
    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    /// Next well-formed message. Malformed ones are rejected and skipped.
    pub async fn recv(&mut self) -> Option<Inbound> {
        loop {
            let delivery = self.rx.recv().await?;
            if let Some(inbound) = self.accept(delivery) {
                return Some(inbound);
            }
        }
    }

    /// Like [`Endpoint::recv`] but returns `None` instead of waiting.
    pub fn try_recv(&mut self) -> Option<Inbound> {
        loop {
            let delivery = self.rx.try_recv().ok()?;
            if let Some(inbound) = self.accept(delivery) {
                return Some(inbound);
            }
        }
    }

    fn accept(&self, delivery: Delivery) -> Option<Inbound> {
        match Message::decode(&delivery.raw) {
            Ok(message) => Some(Inbound {
                from: delivery.from,
                message,
                responder: Responder(delivery.reply),
            }),
            Err(err) => {
                scan_warn!(
                    "{} rejected message from {}: {}",
                    self.kind,
                    delivery.from,
                    err
                );
                Responder(delivery.reply).respond(Reply::rejected(err.to_string()));
                None
            }
        }
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.bus.unbind(self.kind, self.generation);
    }
}

/// A decoded message plus the means to answer it if it was a call.
pub struct Inbound {
    pub from: ContextKind,
    pub message: Message,
    responder: Responder,
}

impl Inbound {
    pub fn expects_reply(&self) -> bool {
        self.responder.0.is_some()
    }

    pub fn split(self) -> (ContextKind, Message, Responder) {
        (self.from, self.message, self.responder)
    }
}

/// Reply slot of an inbound call; a no-op for notifications.
pub struct Responder(Option<oneshot::Sender<Reply>>);

impl Responder {
    pub fn respond(self, reply: Reply) {
        if let Some(tx) = self.0 {
            // The caller may have timed out already.
            let _ = tx.send(reply);
        }
    }
}

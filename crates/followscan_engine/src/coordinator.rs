use std::sync::Arc;

use followscan_core::{merge, Effect, ExtensionState, Msg, Status, UPLOAD_INTERRUPTED};
use scan_logging::{scan_debug, scan_error, scan_info, scan_warn};
use tokio::task::JoinHandle;

use crate::{Bus, ContextKind, DeliveryError, Endpoint, Message, Reply, StateStore, StoreError};

/// Sole writer of the persisted record.
///
/// Holds no state of its own between messages: every inbound message is a
/// read-merge-write transaction against the store, so a freshly spawned
/// coordinator picks up exactly where a recycled one stopped.
pub struct Coordinator {
    bus: Bus,
    store: Arc<dyn StateStore>,
}

/// Running coordinator task.
pub struct CoordinatorHandle {
    task: JoinHandle<()>,
}

impl CoordinatorHandle {
    /// Tear the coordinator down the way the host would: immediately, with
    /// whatever was in flight lost.
    pub async fn shutdown(self) {
        self.task.abort();
        let _ = self.task.await;
    }
}

impl Coordinator {
    pub fn new(bus: Bus, store: Arc<dyn StateStore>) -> Self {
        Self { bus, store }
    }

    /// Bind the coordinator endpoint and serve it on a new task.
    pub fn spawn(bus: Bus, store: Arc<dyn StateStore>) -> CoordinatorHandle {
        let endpoint = bus.bind(ContextKind::Coordinator);
        let coordinator = Self::new(bus, store);
        let task = tokio::spawn(coordinator.serve(endpoint));
        CoordinatorHandle { task }
    }

    async fn serve(self, mut endpoint: Endpoint) {
        scan_info!("Coordinator started");
        while let Some(inbound) = endpoint.recv().await {
            let (from, message, responder) = inbound.split();
            let reply = self.handle(from, message).await;
            responder.respond(reply);
        }
        scan_info!("Coordinator detached");
    }

    /// Process one message and produce the reply a caller would get.
    pub async fn handle(&self, from: ContextKind, message: Message) -> Reply {
        let kind = message.type_name();
        scan_debug!("Coordinator handling {} from {}", kind, from);
        match message {
            Message::GetState => match self.store.read() {
                Ok(state) => Reply::State(state),
                Err(err) => store_failure(kind, err),
            },
            Message::StartScrape => self.forward_start().await,
            Message::StateUpdate(_) => Reply::rejected("the coordinator owns the state"),
            other => match other.into_msg() {
                Some(msg) => {
                    if let Err(err) = msg.validate() {
                        scan_warn!("Rejected {} from {}: {}", kind, from, err);
                        return Reply::rejected(format!("invalid {kind}: {err}"));
                    }
                    match self.apply_inbound(msg) {
                        Ok(_) => Reply::Ack,
                        Err(err) => store_failure(kind, err),
                    }
                }
                None => Reply::rejected(format!("{kind} is not handled by the coordinator")),
            },
        }
    }

    fn apply_inbound(&self, msg: Msg) -> Result<ExtensionState, StoreError> {
        if matches!(msg, Msg::PageReady { .. }) {
            self.release_orphaned_upload(self.store.read()?)?;
        }
        self.apply(msg)
    }

    /// Close an `uploading` record that no bound UI can finish. The result stays.
    fn release_orphaned_upload(
        &self,
        state: ExtensionState,
    ) -> Result<ExtensionState, StoreError> {
        if state.status != Status::Uploading || self.bus.is_bound(ContextKind::Ui) {
            return Ok(state);
        }
        scan_warn!("Closing an upload whose UI is gone");
        self.apply(Msg::UploadFailed {
            message: UPLOAD_INTERRUPTED.to_string(),
        })
    }

    /// Read fresh, merge, write the full replacement, then push it.
    fn apply(&self, msg: Msg) -> Result<ExtensionState, StoreError> {
        let current = self.store.read()?;
        let (next, effects) = merge(current, msg);
        for effect in effects {
            match effect {
                Effect::Persist => self.store.write(&next)?,
                Effect::NotifyUi => self.push_state(&next),
            }
        }
        Ok(next)
    }

    fn push_state(&self, state: &ExtensionState) {
        let update = Message::StateUpdate(state.clone());
        if let Err(err) = self
            .bus
            .notify(ContextKind::Coordinator, ContextKind::Ui, &update)
        {
            // No UI open; it will pull on its next open.
            scan_debug!("STATE_UPDATE not delivered: {}", err);
        }
    }

    async fn forward_start(&self) -> Reply {
        let state = match self
            .store
            .read()
            .and_then(|state| self.release_orphaned_upload(state))
        {
            Ok(state) => state,
            Err(err) => return store_failure("START_SCRAPE", err),
        };
        match state.status {
            Status::Uploading => return Reply::rejected("an upload is in progress"),
            Status::Scraping if self.bus.is_bound(ContextKind::Page) => {
                return Reply::rejected("a scan is already running")
            }
            _ => {}
        }

        match self
            .bus
            .call(ContextKind::Coordinator, ContextKind::Page, &Message::StartScrape)
            .await
        {
            Ok(reply) => reply,
            Err(DeliveryError::RecipientAbsent(_)) => {
                Reply::rejected("open a supported Following page first")
            }
            Err(err) => Reply::rejected(format!("the page did not respond: {err}")),
        }
    }
}

fn store_failure(kind: &str, err: StoreError) -> Reply {
    scan_error!("State store failed while handling {}: {}", kind, err);
    Reply::rejected(format!("state store unavailable: {err}"))
}

use std::sync::Arc;
use std::time::Duration;

use followscan_core::{
    merge, ExtensionState, Msg, Status, StatusView, UploadReceipt, UPLOAD_INTERRUPTED,
};
use scan_logging::{scan_debug, scan_info, scan_warn};
use thiserror::Error;

use crate::api::EXTENSION_VERSION;
use crate::{
    ApiError, Bus, ContextKind, DeliveryError, Endpoint, Inbound, Message, Reply, Session,
    StateStore, UploadMetadata, UploadRequest, Uploader,
};

#[derive(Debug, Error)]
pub enum UiError {
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("invalid command: {0}")]
    Validation(String),
    #[error(transparent)]
    Upload(#[from] ApiError),
}

/// Reachability of the matching service, shown before offering an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connectivity {
    pub service_up: bool,
    pub session: Option<Session>,
}

impl Connectivity {
    pub fn can_upload(&self) -> bool {
        self.service_up && self.session.is_some()
    }
}

/// Transient view over the shared state.
///
/// Pull (GET_STATE) is authoritative; pushed STATE_UPDATEs only make the
/// view fresher between pulls.
pub struct UiReader {
    bus: Bus,
    endpoint: Endpoint,
    store: Arc<dyn StateStore>,
    uploader: Arc<dyn Uploader>,
    state: ExtensionState,
}

impl UiReader {
    /// Attach the UI context and pull the current state right away.
    ///
    /// A fresh reader owns no upload, so an `uploading` record found here was
    /// left behind by a closed UI and is reported as interrupted.
    pub async fn open(bus: Bus, store: Arc<dyn StateStore>, uploader: Arc<dyn Uploader>) -> Self {
        let endpoint = bus.bind(ContextKind::Ui);
        let mut reader = Self {
            bus,
            endpoint,
            store,
            uploader,
            state: ExtensionState::idle(),
        };
        reader.refresh().await;
        if reader.state.status == Status::Uploading {
            scan_warn!("Found an upload left behind by a closed UI");
            let interrupted = Message::UploadFailed {
                message: UPLOAD_INTERRUPTED.to_string(),
            };
            match reader.command(interrupted).await {
                Ok(()) => {
                    reader.refresh().await;
                }
                Err(err) => scan_warn!("Could not close the stale upload: {}", err),
            }
        }
        reader
    }

    pub fn state(&self) -> &ExtensionState {
        &self.state
    }

    pub fn view(&self) -> StatusView {
        self.state.view()
    }

    /// Pull the current record. Falls back to reading the store when the
    /// coordinator cannot be reached.
    pub async fn refresh(&mut self) -> &ExtensionState {
        match self
            .bus
            .call(ContextKind::Ui, ContextKind::Coordinator, &Message::GetState)
            .await
        {
            Ok(Reply::State(state)) => self.state = state,
            Ok(other) => scan_warn!("GET_STATE answered with {:?}", other),
            Err(err) => {
                scan_debug!("GET_STATE failed ({}); reading the store directly", err);
                match self.store.read() {
                    Ok(state) => self.state = state,
                    Err(err) => scan_warn!("State store unreadable: {}", err),
                }
            }
        }
        &self.state
    }

    /// Apply any pushed updates already received. Returns whether the state changed.
    pub fn drain_updates(&mut self) -> bool {
        let mut changed = false;
        while let Some(inbound) = self.endpoint.try_recv() {
            changed |= self.accept(inbound);
        }
        changed
    }

    /// Wait up to `wait` for one pushed update.
    pub async fn next_update(&mut self, wait: Duration) -> bool {
        match tokio::time::timeout(wait, self.endpoint.recv()).await {
            Ok(Some(inbound)) => self.accept(inbound),
            Ok(None) | Err(_) => false,
        }
    }

    fn accept(&mut self, inbound: Inbound) -> bool {
        let (from, message, responder) = inbound.split();
        match message {
            Message::StateUpdate(state) => {
                responder.respond(Reply::Ack);
                let changed = state != self.state;
                self.state = state;
                changed
            }
            other => {
                scan_debug!("UI ignored {} from {}", other.type_name(), from);
                responder.respond(Reply::rejected("the UI only accepts STATE_UPDATE"));
                false
            }
        }
    }

    pub async fn start_scrape(&mut self) -> Result<(), UiError> {
        self.command(Message::StartScrape).await?;
        self.refresh().await;
        Ok(())
    }

    /// Explicit reset back to idle.
    pub async fn reset(&mut self) -> Result<(), UiError> {
        self.command(Message::Reset).await?;
        self.refresh().await;
        Ok(())
    }

    /// Upload the current result directly to the matching service and report
    /// each step back through the coordinator.
    ///
    /// A failed upload leaves the result in place so it can be retried.
    pub async fn upload(&mut self) -> Result<UploadReceipt, UiError> {
        self.refresh().await;
        let request = upload_request(&self.state)?;
        self.command(Message::UploadStarted).await?;

        match self.uploader.upload(&request).await {
            Ok(receipt) => {
                scan_info!(
                    "Upload accepted import_id={} count={}",
                    receipt.import_id,
                    receipt.username_count
                );
                match self.command(Message::UploadSucceeded(receipt.clone())).await {
                    Ok(()) => {
                        self.refresh().await;
                    }
                    Err(err) => {
                        // The import went through; show it even though the
                        // record could not be updated.
                        scan_warn!("Could not record the accepted upload: {}", err);
                        let local = [Msg::UploadStarted, Msg::UploadSucceeded(receipt.clone())];
                        self.state = local
                            .into_iter()
                            .fold(std::mem::take(&mut self.state), |state, msg| {
                                merge(state, msg).0
                            });
                    }
                }
                Ok(receipt)
            }
            Err(err) => {
                scan_warn!("Upload failed: {}", err);
                let failed = Message::UploadFailed {
                    message: err.to_string(),
                };
                if let Err(report_err) = self.command(failed).await {
                    scan_warn!("Could not record upload failure: {}", report_err);
                }
                self.refresh().await;
                Err(err.into())
            }
        }
    }

    /// Health and session checks; failures degrade to "down" and "logged out".
    pub async fn connectivity(&self) -> Connectivity {
        let service_up = self.uploader.check_health().await;
        let session = if service_up {
            self.uploader.check_session().await
        } else {
            None
        };
        Connectivity {
            service_up,
            session,
        }
    }

    async fn command(&self, message: Message) -> Result<(), UiError> {
        let reply = self
            .bus
            .call(ContextKind::Ui, ContextKind::Coordinator, &message)
            .await?;
        match reply {
            Reply::Ack | Reply::State(_) => Ok(()),
            Reply::Rejected { reason } => Err(UiError::Rejected(reason)),
        }
    }
}

fn upload_request(state: &ExtensionState) -> Result<UploadRequest, UiError> {
    if state.status != Status::Complete {
        return Err(UiError::Validation(format!(
            "nothing to upload while {:?}",
            state.status
        )));
    }
    let result = state
        .result
        .as_ref()
        .filter(|r| !r.identifiers.is_empty())
        .ok_or_else(|| UiError::Validation("the scan produced no accounts".to_string()))?;
    let (Some(platform), Some(page_type)) = (state.platform, state.page_type) else {
        return Err(UiError::Validation(
            "the scan is missing its platform".to_string(),
        ));
    };

    Ok(UploadRequest {
        platform,
        identifiers: result.identifiers.iter().cloned().collect(),
        metadata: UploadMetadata {
            extension_version: EXTENSION_VERSION.to_string(),
            scraped_at: result.completed_at,
            page_type,
            source_url: state.source_url.clone(),
        },
    })
}

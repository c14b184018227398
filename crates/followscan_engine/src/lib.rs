//! Followscan engine: scrape loop, message bus, state store and the three contexts.
mod agent;
mod api;
mod bus;
mod coordinator;
mod page;
mod persist;
mod scrape;
mod store;
mod strategy;
mod types;
mod ui;

pub use agent::{AgentError, PageAgent, PageAgentHandle};
pub use api::{
    ApiClient, ApiError, ApiSettings, Session, UploadMetadata, UploadRequest, Uploader,
    EXTENSION_VERSION,
};
pub use bus::{
    Bus, BusSettings, ContextKind, DeliveryError, Endpoint, Inbound, Message, MessageError, Reply,
    Responder,
};
pub use coordinator::{Coordinator, CoordinatorHandle};
pub use page::{Page, PageError, SnapshotPage};
pub use persist::{ensure_state_dir, replace_atomically, PersistError};
pub use scrape::{ScrapeEngine, ScrapeSettings};
pub use store::{FileStateStore, MemoryStateStore, StateStore, StoreError};
pub use strategy::Strategy;
pub use types::{ProgressSink, ScrapeEvent};
pub use ui::{Connectivity, UiError, UiReader};

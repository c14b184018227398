use std::fs;
use std::io;
use std::path::Path;

use followscan_core::FailureCause;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageError {
    #[error("page detached: {0}")]
    Detached(String),
    #[error("dom access failed: {0}")]
    Dom(String),
    #[error("invalid selector: {0}")]
    Selector(String),
}

impl PageError {
    pub fn cause(&self) -> FailureCause {
        match self {
            PageError::Detached(_) => FailureCause::PageDetached,
            PageError::Dom(_) => FailureCause::DomAccess,
            PageError::Selector(_) => FailureCause::SelectorInvalid,
        }
    }
}

/// The live document of the page context, as the engine sees it.
pub trait Page: Send {
    fn location(&self) -> String;

    /// Serialized HTML of what is currently rendered.
    fn html(&self) -> Result<String, PageError>;

    /// Scroll one viewport forward so the list can lazy-load more rows.
    fn scroll_forward(&mut self) -> Result<(), PageError>;
}

/// Replays recorded HTML frames; each scroll reveals the next frame and the
/// last frame stays rendered once reached.
#[derive(Debug, Clone)]
pub struct SnapshotPage {
    location: String,
    frames: Vec<String>,
    position: usize,
}

impl SnapshotPage {
    pub fn new(location: impl Into<String>, frames: Vec<String>) -> Self {
        Self {
            location: location.into(),
            frames,
            position: 0,
        }
    }

    /// Load every `*.html` file of `dir` as a frame, in file-name order.
    pub fn from_dir(location: impl Into<String>, dir: &Path) -> io::Result<Self> {
        let mut entries: Vec<_> = fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
            .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("html"))
            .collect();
        entries.sort_by_key(|e| e.file_name());

        let frames = entries
            .iter()
            .map(|entry| fs::read_to_string(entry.path()))
            .collect::<io::Result<Vec<_>>>()?;
        Ok(Self::new(location, frames))
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

impl Page for SnapshotPage {
    fn location(&self) -> String {
        self.location.clone()
    }

    fn html(&self) -> Result<String, PageError> {
        self.frames
            .get(self.position)
            .cloned()
            .ok_or_else(|| PageError::Dom("page has no rendered content".to_string()))
    }

    fn scroll_forward(&mut self) -> Result<(), PageError> {
        if self.position + 1 < self.frames.len() {
            self.position += 1;
        }
        Ok(())
    }
}

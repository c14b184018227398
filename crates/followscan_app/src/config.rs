use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use followscan_engine::{ApiSettings, BusSettings, ScrapeSettings};
use log::LevelFilter;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILENAME: &str = "followscan.ron";

/// On-disk settings. Every field is optional in the file; durations are in
/// milliseconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub state_path: PathBuf,
    pub log_path: PathBuf,
    pub log_level: String,
    pub settle_interval_ms: u64,
    pub stable_threshold: u32,
    pub call_timeout_ms: u64,
    /// How often the UI re-pulls state while waiting for pushes.
    pub refresh_interval_ms: u64,
    pub api_base_url: String,
    pub session_cookie: Option<String>,
    pub request_timeout_ms: u64,
    pub health_timeout_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        let scrape = ScrapeSettings::default();
        let bus = BusSettings::default();
        let api = ApiSettings::default();
        Self {
            state_path: PathBuf::from("./.followscan_state.ron"),
            log_path: PathBuf::from("./followscan.log"),
            log_level: "info".to_string(),
            settle_interval_ms: millis(scrape.settle_interval),
            stable_threshold: scrape.stable_threshold,
            call_timeout_ms: millis(bus.call_timeout),
            refresh_interval_ms: 500,
            api_base_url: api.base_url,
            session_cookie: api.session_cookie,
            request_timeout_ms: millis(api.request_timeout),
            health_timeout_ms: millis(api.health_timeout),
        }
    }
}

impl AppConfig {
    /// Read `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err).with_context(|| format!("reading config {}", path.display()))
            }
        };
        ron::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn level(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::Info)
    }

    pub fn scrape_settings(&self) -> ScrapeSettings {
        ScrapeSettings {
            settle_interval: Duration::from_millis(self.settle_interval_ms),
            stable_threshold: self.stable_threshold.max(1),
        }
    }

    pub fn bus_settings(&self) -> BusSettings {
        BusSettings {
            call_timeout: Duration::from_millis(self.call_timeout_ms),
        }
    }

    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            base_url: self.api_base_url.clone(),
            session_cookie: self.session_cookie.clone(),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            health_timeout: Duration::from_millis(self.health_timeout_ms),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(10))
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

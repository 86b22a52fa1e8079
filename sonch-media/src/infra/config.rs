use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MediaError, Result};
use crate::infra::constants::{compression, http, image, retry, session};

const APP_DIR: &str = "sonch";
const CONFIG_FILE: &str = "config.json";

pub const API_URL_ENV: &str = "SONCH_API_URL";
pub const SESSION_DIR_ENV: &str = "SONCH_SESSION_DIR";

/// Outgoing image bounds and encoder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub max_width: u32,
    pub max_height: u32,
    /// Lossy encoder quality in `(0, 1]`.
    pub quality: f32,
    pub decode_timeout_secs: u64,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_width: compression::MAX_WIDTH,
            max_height: compression::MAX_HEIGHT,
            quality: compression::QUALITY,
            decode_timeout_secs: compression::DECODE_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub api_url: String,
    pub request_timeout_secs: u64,
    pub retry_base_delay_ms: u64,
    pub upload_max_attempts: u32,
    pub list_max_attempts: u32,
    pub image_retry_base_delay_ms: u64,
    pub image_max_load_attempts: u32,
    pub compression: CompressionConfig,
    /// Disk-backed session storage lives here when set; in-memory otherwise.
    pub session_dir: Option<PathBuf>,
    /// Age after which the cached post list is refetched. `None` keeps it
    /// until the next mutation.
    pub post_cache_max_age_secs: Option<u64>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            api_url: http::DEFAULT_API_URL.to_string(),
            request_timeout_secs: http::REQUEST_TIMEOUT.as_secs(),
            retry_base_delay_ms: retry::RETRY_BASE_DELAY.as_millis() as u64,
            upload_max_attempts: retry::UPLOAD_MAX_ATTEMPTS,
            list_max_attempts: retry::LIST_MAX_ATTEMPTS,
            image_retry_base_delay_ms: image::IMAGE_RETRY_BASE_DELAY.as_millis()
                as u64,
            image_max_load_attempts: image::IMAGE_MAX_LOAD_ATTEMPTS,
            compression: CompressionConfig::default(),
            session_dir: None,
            post_cache_max_age_secs: Some(session::POSTS_MAX_AGE.as_secs()),
        }
    }
}

impl MediaConfig {
    /// Defaults, then `<config_dir>/sonch/config.json`, then environment.
    pub fn load() -> Self {
        let mut config = Self::config_path()
            .filter(|path| path.exists())
            .and_then(|path| match Self::load_from(&path) {
                Ok(config) => Some(config),
                Err(e) => {
                    log::warn!(
                        "[MediaConfig] Ignoring unreadable config at {}: {}",
                        path.display(),
                        e
                    );
                    None
                }
            })
            .unwrap_or_default();

        config.apply_env();
        config
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MediaError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Err(MediaError::Config(
                "unable to determine config directory".into(),
            ));
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MediaError::Config(format!(
                    "failed to create {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| {
            MediaError::Config(format!("failed to write {}: {e}", path.display()))
        })
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    fn apply_env(&mut self) {
        if let Ok(api_url) = std::env::var(API_URL_ENV)
            && !api_url.trim().is_empty()
        {
            self.api_url = api_url;
        }
        if let Ok(dir) = std::env::var(SESSION_DIR_ENV)
            && !dir.trim().is_empty()
        {
            self.session_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn image_retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.image_retry_base_delay_ms)
    }

    pub fn decode_timeout(&self) -> Duration {
        Duration::from_secs(self.compression.decode_timeout_secs)
    }

    pub fn post_cache_max_age(&self) -> Option<Duration> {
        self.post_cache_max_age_secs.map(Duration::from_secs)
    }
}

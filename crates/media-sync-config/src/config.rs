use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_TRAKT_API_URL: &str = "https://api.trakt.tv";

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub trakt: Option<TraktConfig>,
    #[serde(default)]
    pub sync: SyncOptions,
    #[serde(default)]
    pub library: LibraryConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TraktConfig {
    pub enabled: bool,
    pub client_id: String,
    pub client_secret: String,
    /// Override of the API host, mostly useful against a staging server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl TraktConfig {
    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(DEFAULT_TRAKT_API_URL)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SyncOptions {
    /// Run the collection direction when no direction is requested explicitly.
    #[serde(default = "default_true")]
    pub collection: bool,
    /// Run the watched-history direction when no direction is requested explicitly.
    #[serde(default = "default_true")]
    pub watched: bool,
    /// Shows per write request. Large show payloads may time out, so the
    /// default sends them one by one. Zero sends everything at once.
    #[serde(default = "default_shows_per_request")]
    pub shows_per_request: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            collection: true,
            watched: true,
            shows_per_request: default_shows_per_request(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct LibraryConfig {
    /// Root of the JSON library; `<data_dir>/library` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_shows_per_request() -> usize {
    1
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Config {
    pub fn load_from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &PathBuf) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let trakt = self
            .trakt
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Trakt is not configured (run `mediasync config trakt`)"))?;
        if !trakt.enabled {
            return Err(anyhow::anyhow!("Trakt is configured but not enabled"));
        }
        if trakt.client_id.is_empty() || trakt.client_id == "YOUR_CLIENT_ID" {
            return Err(anyhow::anyhow!("Trakt client_id is not configured"));
        }
        if trakt.client_secret.is_empty() || trakt.client_secret == "YOUR_CLIENT_SECRET" {
            return Err(anyhow::anyhow!("Trakt client_secret is not configured"));
        }
        if self.sync.request_timeout_secs == 0 {
            return Err(anyhow::anyhow!("request_timeout_secs must be greater than zero"));
        }
        Ok(())
    }

    pub fn is_trakt_configured(&self) -> bool {
        self.validate().is_ok()
    }
}

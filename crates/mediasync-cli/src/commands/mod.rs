pub mod clear;
pub mod config;
pub mod prompts;
pub mod sync;
pub mod sync_ui;

use color_eyre::Result;
use media_sync_config::{Config, CredentialStore, PathManager};
use media_sync_sources::TraktClient;
use std::time::Duration;

/// Load and validate the configuration file.
pub fn load_config(path_manager: &PathManager) -> Result<Config> {
    let config_file = path_manager.config_file();
    if !config_file.exists() {
        return Err(color_eyre::eyre::eyre!(
            "Configuration file not found at {}. Run 'mediasync config trakt' first.",
            config_file.display()
        ));
    }
    let config = Config::load_from_file(&config_file)
        .map_err(|e| color_eyre::eyre::eyre!("Failed to load config from {}: {}", config_file.display(), e))?;
    config
        .validate()
        .map_err(|e| color_eyre::eyre::eyre!("Configuration validation failed: {}", e))?;
    Ok(config)
}

/// Build an authenticated Trakt client from the config and stored tokens.
pub fn trakt_client(config: &Config, path_manager: &PathManager) -> Result<TraktClient> {
    let trakt = config
        .trakt
        .as_ref()
        .ok_or_else(|| color_eyre::eyre::eyre!("Trakt is not configured. Run 'mediasync config trakt'."))?;

    let credentials_file = path_manager.credentials_file();
    let mut cred_store = CredentialStore::new(credentials_file.clone());
    cred_store
        .load()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to load credentials from {}: {}", credentials_file.display(), e))?;

    let timeout = Duration::from_secs(config.sync.request_timeout_secs);
    let client = TraktClient::from_config(trakt, timeout)
        .map_err(|e| color_eyre::eyre::eyre!("Failed to create Trakt client: {}", e))?
        .with_credential_store(cred_store);
    Ok(client)
}

pub fn path_manager() -> Result<PathManager> {
    let path_manager = PathManager::default();
    path_manager
        .ensure_directories()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to create configuration directories: {}", e))?;
    Ok(path_manager)
}

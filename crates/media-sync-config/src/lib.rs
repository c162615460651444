pub mod config;
pub mod credentials;
pub mod paths;

pub use config::{Config, LibraryConfig, SyncOptions, TraktConfig, DEFAULT_TRAKT_API_URL};
pub use credentials::CredentialStore;
pub use paths::{PathManager, container_base_path};

pub mod client;
pub mod auth;
pub mod api;

pub use client::TraktClient;
pub use auth::{authorize_url, TokenInfo};

//! Integration tests for the Trakt client.
//!
//! Uses wiremock to stand in for the Trakt REST API and checks headers,
//! status mapping, token refresh and payload shapes.

mod common;

mod test_auth;
mod test_fetch;
mod test_submit;

//! Google OAuth flow and API surface.
//!
//! Three pieces:
//! - [`build_authorization_url`]: pure construction of the consent URL
//! - [`exchange_code`] / [`refresh_access_token`] / [`fresh_access_token`]:
//!   the token lifecycle against Google's token endpoint
//! - [`GoogleClient`]: a transport-only handle for the Gmail, Sheets, and
//!   Drive REST surfaces, pre-loaded with one user's access token
//!
//! All endpoint URLs live in [`GoogleEndpoints`] so tests can point the
//! whole module at a mock server.

mod auth_url;
mod client;
mod message;
mod oauth;

pub use auth_url::{build_authorization_url, DEFAULT_SCOPES};
pub use client::{
    DriveFile, GoogleClient, GoogleEndpoints, MessageList, MessageMetadata, MessageRef,
    SentMessage, UpdateResult, ValueRange,
};
pub use message::{encode_message, OutgoingMail};
pub use oauth::{exchange_code, fresh_access_token, refresh_access_token, RefreshError};

//! Per-user OAuth credential bundles and their encrypted storage.
//!
//! Each authorized end-user is identified by an opaque `user_id` and owns
//! exactly one [`CredentialBundle`]: the OAuth app identity (client id,
//! client secret, redirect URI) plus the token set obtained from the
//! authorization-code exchange. Bundles live in a SQLite-backed
//! [`CredentialStore`]; the client secret and both tokens are encrypted
//! at rest with AES-256-GCM.
//!
//! # Usage
//!
//! ```no_run
//! use portico::credentials::{CredentialBundle, CredentialStore, TokenSet};
//! use chrono::{Duration, Utc};
//!
//! # fn main() -> anyhow::Result<()> {
//! let key = std::env::var("PORTICO_ENCRYPTION_KEY")?;
//! let store = CredentialStore::new("credentials.db", &key)?;
//!
//! let bundle = CredentialBundle {
//!     client_id: "app.apps.googleusercontent.com".to_string(),
//!     client_secret: "app-secret".to_string(),
//!     redirect_uri: "http://localhost:3000/callback".to_string(),
//!     tokens: TokenSet {
//!         access_token: "ya29.access".to_string(),
//!         refresh_token: Some("1//refresh".to_string()),
//!         expires_at: Some(Utc::now() + Duration::hours(1)),
//!         scope: Some("https://www.googleapis.com/auth/gmail.send".to_string()),
//!     },
//! };
//! store.save("user-1", &bundle)?;
//!
//! if let Some(stored) = store.get("user-1")? {
//!     println!("scopes: {:?}", stored.scopes);
//! }
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

mod encryption;
mod storage;

pub use encryption::{seal, unseal, validate_key};
pub use storage::{CredentialStore, StoreError};

/// OAuth tokens granted for one user.
///
/// `scope` is the space-delimited scope string exactly as the provider
/// returned it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenSet {
    /// Short-lived bearer token used on API calls
    pub access_token: String,

    /// Long-lived token used to mint new access tokens (may be absent)
    pub refresh_token: Option<String>,

    /// Absolute expiry of the access token (UTC)
    pub expires_at: Option<DateTime<Utc>>,

    /// Space-delimited granted scopes, as reported by the provider
    pub scope: Option<String>,
}

impl TokenSet {
    /// Granted scopes split on spaces. Empty when the provider reported none.
    pub fn granted_scopes(&self) -> Vec<String> {
        self.scope
            .as_deref()
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// True when the access token expires within `skew_seconds` from now.
    ///
    /// Tokens without a recorded expiry are treated as still usable.
    pub fn expires_within(&self, skew_seconds: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= Utc::now() + Duration::seconds(skew_seconds),
            None => false,
        }
    }
}

/// OAuth app identity plus tokens for one authorized user.
///
/// This is what callers hand to [`CredentialStore::save`]; the store stamps
/// `saved_at` and derives `scopes` itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CredentialBundle {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub tokens: TokenSet,
}

/// A bundle as served back by the store, including store-stamped metadata.
#[derive(Clone, Debug)]
pub struct StoredBundle {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub tokens: TokenSet,

    /// Scopes derived from `tokens.scope` at save time
    pub scopes: Vec<String>,

    /// When the bundle was first saved (reset on every save)
    pub saved_at: DateTime<Utc>,

    /// When the tokens were last replaced via `update`, if ever
    pub updated_at: Option<DateTime<Utc>>,
}

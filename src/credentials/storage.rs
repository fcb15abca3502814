//! SQLite-backed credential store.
//!
//! One row per user, keyed by the opaque `user_id`. The client secret and
//! both OAuth tokens are sealed with AES-256-GCM before they hit the
//! database; everything else is stored in the clear.
//!
//! # Contracts
//! - `save` overwrites any existing row and stamps `saved_at`
//! - `get` never errors for a missing user; it returns `None`
//! - `update` replaces the token columns only and fails with
//!   [`StoreError::NoSuchUser`] for an unknown user; it never creates a row
//! - `delete` is idempotent and reports whether a row was removed
//!
//! # Thread safety
//! The connection is wrapped in a `Mutex`, so each operation runs to
//! completion before the next one touches the database. That gives the
//! per-key atomicity the handlers rely on; no cross-key transactions exist.

use super::{encryption, CredentialBundle, StoredBundle, TokenSet};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

/// Errors surfaced by token updates.
#[derive(Debug)]
pub enum StoreError {
    /// `update` was called for a user that was never saved
    NoSuchUser(String),
    /// Encryption or database failure
    Backend(anyhow::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NoSuchUser(user_id) => {
                write!(f, "No credentials found for user: {}", user_id)
            }
            StoreError::Backend(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<anyhow::Error> for StoreError {
    fn from(e: anyhow::Error) -> Self {
        StoreError::Backend(e)
    }
}

/// Encrypted per-user credential storage.
///
/// # Schema
/// ```sql
/// CREATE TABLE credentials (
///     user_id       TEXT PRIMARY KEY,
///     client_id     TEXT NOT NULL,
///     client_secret TEXT NOT NULL,   -- sealed
///     redirect_uri  TEXT NOT NULL,
///     access_token  TEXT NOT NULL,   -- sealed
///     refresh_token TEXT,            -- sealed (optional)
///     expires_at    TEXT,            -- ISO 8601 (optional)
///     scope         TEXT,            -- space-delimited grant string
///     scopes        TEXT NOT NULL,   -- JSON array derived at save time
///     saved_at      TEXT NOT NULL,   -- ISO 8601
///     updated_at    TEXT             -- ISO 8601, set by update only
/// );
/// ```
pub struct CredentialStore {
    conn: Mutex<Connection>,
    encryption_key: Vec<u8>,
}

impl CredentialStore {
    /// Creates or opens the store at `db_path`.
    ///
    /// `encryption_key` is the base64-encoded 32-byte master key.
    pub fn new<P: AsRef<Path>>(db_path: P, encryption_key: &str) -> Result<Self> {
        let key_bytes =
            encryption::validate_key(encryption_key).context("Invalid encryption key")?;

        let conn = Connection::open(db_path).context("Failed to open credentials database")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS credentials (
                user_id       TEXT PRIMARY KEY,
                client_id     TEXT NOT NULL,
                client_secret TEXT NOT NULL,
                redirect_uri  TEXT NOT NULL,
                access_token  TEXT NOT NULL,
                refresh_token TEXT,
                expires_at    TEXT,
                scope         TEXT,
                scopes        TEXT NOT NULL,
                saved_at      TEXT NOT NULL,
                updated_at    TEXT
            )
            "#,
            [],
        )
        .context("Failed to create credentials table")?;

        Ok(Self {
            conn: Mutex::new(conn),
            encryption_key: key_bytes,
        })
    }

    /// Saves a bundle for a user, overwriting any existing entry.
    ///
    /// Stamps `saved_at`, clears `updated_at`, and derives `scopes` by
    /// splitting the granted scope string on spaces.
    pub fn save(&self, user_id: &str, bundle: &CredentialBundle) -> Result<()> {
        if user_id.is_empty() {
            return Err(anyhow!("user_id must not be empty"));
        }

        let client_secret = encryption::seal(&bundle.client_secret, &self.encryption_key)
            .context("Failed to encrypt client secret")?;
        let (access_token, refresh_token) = self.seal_tokens(&bundle.tokens)?;

        let scopes = serde_json::to_string(&bundle.tokens.granted_scopes())
            .context("Failed to serialize scopes")?;
        let expires_at = bundle.tokens.expires_at.map(|t| t.to_rfc3339());
        let saved_at = Utc::now().to_rfc3339();

        self.conn
            .lock()
            .unwrap()
            .execute(
                r#"
                INSERT INTO credentials (
                    user_id, client_id, client_secret, redirect_uri,
                    access_token, refresh_token, expires_at, scope,
                    scopes, saved_at, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, NULL)
                ON CONFLICT(user_id) DO UPDATE SET
                    client_id = excluded.client_id,
                    client_secret = excluded.client_secret,
                    redirect_uri = excluded.redirect_uri,
                    access_token = excluded.access_token,
                    refresh_token = excluded.refresh_token,
                    expires_at = excluded.expires_at,
                    scope = excluded.scope,
                    scopes = excluded.scopes,
                    saved_at = excluded.saved_at,
                    updated_at = NULL
                "#,
                params![
                    user_id,
                    bundle.client_id,
                    client_secret,
                    bundle.redirect_uri,
                    access_token,
                    refresh_token,
                    expires_at,
                    bundle.tokens.scope,
                    scopes,
                    saved_at,
                ],
            )
            .context("Failed to save credential bundle")?;

        tracing::debug!(user_id = %user_id, "Saved credential bundle");
        Ok(())
    }

    /// Retrieves the bundle for a user, or `None` when nothing is stored.
    pub fn get(&self, user_id: &str) -> Result<Option<StoredBundle>> {
        if user_id.is_empty() {
            return Err(anyhow!("user_id must not be empty"));
        }

        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                r#"
                SELECT client_id, client_secret, redirect_uri,
                       access_token, refresh_token, expires_at, scope,
                       scopes, saved_at, updated_at
                FROM credentials
                WHERE user_id = ?1
                "#,
                params![user_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, Option<String>>(6)?,
                        row.get::<_, String>(7)?,
                        row.get::<_, String>(8)?,
                        row.get::<_, Option<String>>(9)?,
                    ))
                },
            )
            .optional()
            .context("Failed to query credential bundle")?;

        let Some((
            client_id,
            sealed_secret,
            redirect_uri,
            sealed_access,
            sealed_refresh,
            expires_at,
            scope,
            scopes_json,
            saved_at,
            updated_at,
        )) = row
        else {
            return Ok(None);
        };

        let client_secret = encryption::unseal(&sealed_secret, &self.encryption_key)
            .context("Failed to decrypt client secret")?;
        let access_token = encryption::unseal(&sealed_access, &self.encryption_key)
            .context("Failed to decrypt access token")?;
        let refresh_token = sealed_refresh
            .map(|sealed| encryption::unseal(&sealed, &self.encryption_key))
            .transpose()
            .context("Failed to decrypt refresh token")?;

        let expires_at = parse_optional_timestamp(expires_at).context("Invalid expires_at")?;
        let saved_at = parse_timestamp(&saved_at).context("Invalid saved_at")?;
        let updated_at = parse_optional_timestamp(updated_at).context("Invalid updated_at")?;
        let scopes: Vec<String> =
            serde_json::from_str(&scopes_json).context("Failed to parse stored scopes")?;

        Ok(Some(StoredBundle {
            client_id,
            client_secret,
            redirect_uri,
            tokens: TokenSet {
                access_token,
                refresh_token,
                expires_at,
                scope,
            },
            scopes,
            saved_at,
            updated_at,
        }))
    }

    /// Replaces the token columns for an existing user and stamps `updated_at`.
    ///
    /// The app identity and the save-time `scopes` are left untouched.
    pub fn update(&self, user_id: &str, tokens: &TokenSet) -> Result<(), StoreError> {
        if user_id.is_empty() {
            return Err(StoreError::Backend(anyhow!("user_id must not be empty")));
        }

        let (access_token, refresh_token) = self.seal_tokens(tokens)?;
        let expires_at = tokens.expires_at.map(|t| t.to_rfc3339());
        let updated_at = Utc::now().to_rfc3339();

        let rows = self
            .conn
            .lock()
            .unwrap()
            .execute(
                r#"
                UPDATE credentials
                SET access_token = ?1,
                    refresh_token = ?2,
                    expires_at = ?3,
                    scope = ?4,
                    updated_at = ?5
                WHERE user_id = ?6
                "#,
                params![
                    access_token,
                    refresh_token,
                    expires_at,
                    tokens.scope,
                    updated_at,
                    user_id,
                ],
            )
            .context("Failed to update tokens")
            .map_err(StoreError::Backend)?;

        if rows == 0 {
            return Err(StoreError::NoSuchUser(user_id.to_string()));
        }

        tracing::debug!(user_id = %user_id, "Updated tokens");
        Ok(())
    }

    /// Removes a user's bundle. Returns whether a row was actually removed.
    pub fn delete(&self, user_id: &str) -> Result<bool> {
        let rows = self
            .conn
            .lock()
            .unwrap()
            .execute(
                "DELETE FROM credentials WHERE user_id = ?1",
                params![user_id],
            )
            .context("Failed to delete credential bundle")?;

        if rows > 0 {
            tracing::debug!(user_id = %user_id, "Deleted credential bundle");
        }
        Ok(rows > 0)
    }

    /// All known user identifiers, for administrative inspection.
    pub fn list_users(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT user_id FROM credentials ORDER BY user_id")
            .context("Failed to prepare list query")?;

        let users = stmt
            .query_map([], |row| row.get(0))
            .context("Failed to list users")?
            .collect::<Result<Vec<String>, _>>()
            .context("Failed to read user rows")?;

        Ok(users)
    }

    /// Removes every bundle. Test and manual-reset use only; there is no
    /// HTTP route to this.
    pub fn clear(&self) -> Result<()> {
        self.conn
            .lock()
            .unwrap()
            .execute("DELETE FROM credentials", [])
            .context("Failed to clear credentials")?;
        Ok(())
    }

    fn seal_tokens(&self, tokens: &TokenSet) -> Result<(String, Option<String>)> {
        let access_token = encryption::seal(&tokens.access_token, &self.encryption_key)
            .context("Failed to encrypt access token")?;
        let refresh_token = tokens
            .refresh_token
            .as_deref()
            .map(|t| encryption::seal(t, &self.encryption_key))
            .transpose()
            .context("Failed to encrypt refresh token")?;
        Ok((access_token, refresh_token))
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

fn parse_optional_timestamp(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_timestamp).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use chrono::Duration;

    fn create_test_store() -> CredentialStore {
        let key = BASE64.encode([0u8; 32]);
        CredentialStore::new(":memory:", &key).expect("Failed to create test store")
    }

    fn sample_bundle() -> CredentialBundle {
        CredentialBundle {
            client_id: "client-id-123".to_string(),
            client_secret: "client-secret-xyz".to_string(),
            redirect_uri: "http://localhost:3000/callback".to_string(),
            tokens: TokenSet {
                access_token: "access-token-12345".to_string(),
                refresh_token: Some("refresh-token-67890".to_string()),
                expires_at: Some(Utc::now() + Duration::hours(1)),
                scope: Some("scope.a scope.b".to_string()),
            },
        }
    }

    #[test]
    fn test_save_and_get_roundtrip() {
        let store = create_test_store();
        let bundle = sample_bundle();

        store.save("user1", &bundle).expect("save failed");

        let stored = store
            .get("user1")
            .expect("get failed")
            .expect("bundle not found");

        assert_eq!(stored.client_id, bundle.client_id);
        assert_eq!(stored.client_secret, bundle.client_secret);
        assert_eq!(stored.redirect_uri, bundle.redirect_uri);
        assert_eq!(stored.tokens.access_token, bundle.tokens.access_token);
        assert_eq!(stored.tokens.refresh_token, bundle.tokens.refresh_token);
        assert_eq!(stored.scopes, vec!["scope.a", "scope.b"]);
        assert!(stored.updated_at.is_none());
    }

    #[test]
    fn test_get_nonexistent_is_none() {
        let store = create_test_store();
        assert!(store.get("ghost").expect("get failed").is_none());
    }

    #[test]
    fn test_resave_overwrites() {
        let store = create_test_store();
        store.save("user1", &sample_bundle()).unwrap();

        let mut replacement = sample_bundle();
        replacement.tokens.access_token = "second-access-token".to_string();
        store.save("user1", &replacement).unwrap();

        let stored = store.get("user1").unwrap().unwrap();
        assert_eq!(stored.tokens.access_token, "second-access-token");
        assert_eq!(store.list_users().unwrap().len(), 1);
    }

    #[test]
    fn test_update_replaces_tokens_only() {
        let store = create_test_store();
        store.save("user1", &sample_bundle()).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(10));

        let new_tokens = TokenSet {
            access_token: "fresh-access".to_string(),
            refresh_token: Some("fresh-refresh".to_string()),
            expires_at: Some(Utc::now() + Duration::hours(2)),
            scope: Some("scope.a scope.b".to_string()),
        };
        store.update("user1", &new_tokens).expect("update failed");

        let stored = store.get("user1").unwrap().unwrap();
        assert_eq!(stored.tokens.access_token, "fresh-access");
        assert_eq!(stored.tokens.refresh_token, Some("fresh-refresh".to_string()));
        // App identity and derived scopes preserved
        assert_eq!(stored.client_id, "client-id-123");
        assert_eq!(stored.scopes, vec!["scope.a", "scope.b"]);
        // updated_at stamped after saved_at
        let updated_at = stored.updated_at.expect("updated_at not stamped");
        assert!(updated_at > stored.saved_at);
    }

    #[test]
    fn test_update_unknown_user_fails_without_creating() {
        let store = create_test_store();

        let tokens = sample_bundle().tokens;
        let err = store.update("never-saved", &tokens).unwrap_err();
        assert!(matches!(err, StoreError::NoSuchUser(_)));
        assert!(err.to_string().contains("never-saved"));

        // No entry was implicitly created
        assert!(store.get("never-saved").unwrap().is_none());
        assert!(store.list_users().unwrap().is_empty());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = create_test_store();
        store.save("user1", &sample_bundle()).unwrap();

        assert!(store.delete("user1").unwrap());
        assert!(store.get("user1").unwrap().is_none());
        assert!(!store.delete("user1").unwrap());
    }

    #[test]
    fn test_clear_then_list_is_empty() {
        let store = create_test_store();
        store.save("user1", &sample_bundle()).unwrap();
        store.save("user2", &sample_bundle()).unwrap();

        store.clear().expect("clear failed");
        assert!(store.list_users().unwrap().is_empty());
    }

    #[test]
    fn test_list_users() {
        let store = create_test_store();
        store.save("alice", &sample_bundle()).unwrap();
        store.save("bob", &sample_bundle()).unwrap();

        let users = store.list_users().unwrap();
        assert_eq!(users.len(), 2);
        assert!(users.contains(&"alice".to_string()));
        assert!(users.contains(&"bob".to_string()));
    }

    #[test]
    fn test_bundle_without_refresh_token() {
        let store = create_test_store();
        let mut bundle = sample_bundle();
        bundle.tokens.refresh_token = None;
        bundle.tokens.expires_at = None;
        bundle.tokens.scope = None;

        store.save("user1", &bundle).unwrap();

        let stored = store.get("user1").unwrap().unwrap();
        assert!(stored.tokens.refresh_token.is_none());
        assert!(stored.tokens.expires_at.is_none());
        assert!(stored.scopes.is_empty());
    }

    #[test]
    fn test_empty_user_id_rejected() {
        let store = create_test_store();
        assert!(store.save("", &sample_bundle()).is_err());
        assert!(store.get("").is_err());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let db_path = dir.path().join("credentials.db");
        let key = BASE64.encode([0u8; 32]);

        {
            let store = CredentialStore::new(&db_path, &key).unwrap();
            store.save("user1", &sample_bundle()).unwrap();
        }

        let reopened = CredentialStore::new(&db_path, &key).unwrap();
        let stored = reopened.get("user1").unwrap().expect("bundle lost");
        assert_eq!(stored.tokens.access_token, "access-token-12345");
    }

    #[test]
    fn test_invalid_encryption_key() {
        assert!(CredentialStore::new(":memory:", "short").is_err());
        assert!(CredentialStore::new(":memory:", "not-valid-base64!@#$").is_err());
    }
}

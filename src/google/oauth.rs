//! OAuth token lifecycle: code exchange and refresh.
//!
//! Both operations are a single POST to the token endpoint; neither is
//! retried. Authorization codes are single-use, and a failed refresh means
//! the user has to go back through the consent flow, so retrying would not
//! help in either case.

use crate::credentials::{CredentialStore, StoredBundle, TokenSet};
use anyhow::{anyhow, Context, Result};
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;

/// Tokens expiring within this window are refreshed before use.
const REFRESH_SKEW_SECONDS: i64 = 60;

/// Token endpoint response (standard OAuth 2.0).
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

impl TokenResponse {
    /// Convert to a [`TokenSet`], carrying forward prior values the
    /// endpoint omitted (Google leaves out `refresh_token` on refresh).
    fn into_token_set(self, prior: Option<&TokenSet>) -> TokenSet {
        let expires_at = self
            .expires_in
            .map(|seconds| Utc::now() + Duration::seconds(seconds));
        TokenSet {
            access_token: self.access_token,
            refresh_token: self
                .refresh_token
                .or_else(|| prior.and_then(|t| t.refresh_token.clone())),
            expires_at,
            scope: self.scope.or_else(|| prior.and_then(|t| t.scope.clone())),
        }
    }
}

/// Exchange an authorization code for a token set.
///
/// Exactly one external call; the upstream failure message is passed
/// through verbatim.
pub async fn exchange_code(
    token_url: &str,
    code: &str,
    client_id: &str,
    client_secret: &str,
    redirect_uri: &str,
) -> Result<TokenSet> {
    let mut form_data = HashMap::new();
    form_data.insert("grant_type", "authorization_code");
    form_data.insert("code", code);
    form_data.insert("redirect_uri", redirect_uri);
    form_data.insert("client_id", client_id);
    form_data.insert("client_secret", client_secret);

    tracing::debug!(token_url = %token_url, "Exchanging authorization code for tokens");
    let response = post_token_request(token_url, &form_data)
        .await
        .context("Failed to send token exchange request")?;

    Ok(response.into_token_set(None))
}

/// Mint a new access token from a stored refresh token.
///
/// `prior` supplies the refresh token and scope to carry forward, since
/// Google's refresh response omits both.
pub async fn refresh_access_token(
    token_url: &str,
    client_id: &str,
    client_secret: &str,
    prior: &TokenSet,
) -> Result<TokenSet> {
    let refresh_token = prior
        .refresh_token
        .as_deref()
        .ok_or_else(|| anyhow!("No refresh token stored"))?;

    let mut form_data = HashMap::new();
    form_data.insert("grant_type", "refresh_token");
    form_data.insert("refresh_token", refresh_token);
    form_data.insert("client_id", client_id);
    form_data.insert("client_secret", client_secret);

    tracing::debug!(token_url = %token_url, "Refreshing access token");
    let response = post_token_request(token_url, &form_data)
        .await
        .context("Failed to send token refresh request")?;

    Ok(response.into_token_set(Some(prior)))
}

async fn post_token_request(
    token_url: &str,
    form_data: &HashMap<&str, &str>,
) -> Result<TokenResponse> {
    let client = reqwest::Client::new();
    let response = client
        .post(token_url)
        .header("Accept", "application/json")
        .form(form_data)
        .send()
        .await
        .context("Token endpoint unreachable")?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(anyhow!("Token request failed with status {}: {}", status, body));
    }

    response
        .json::<TokenResponse>()
        .await
        .context("Failed to parse token response")
}

/// Why a pre-call refresh could not produce a usable access token.
#[derive(Debug)]
pub enum RefreshError {
    /// Token is expired and the bundle holds no refresh token
    MissingRefreshToken,
    /// The token endpoint rejected the refresh (revoked, bad secret, ...)
    Upstream(String),
    /// Persisting the refreshed tokens failed
    Store(String),
}

impl std::fmt::Display for RefreshError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshError::MissingRefreshToken => {
                write!(f, "Access token expired and no refresh token is stored")
            }
            RefreshError::Upstream(msg) => write!(f, "{}", msg),
            RefreshError::Store(msg) => write!(f, "Failed to persist refreshed tokens: {}", msg),
        }
    }
}

impl std::error::Error for RefreshError {}

/// Return an access token guaranteed not to expire within the skew window,
/// refreshing and persisting through the store when needed.
///
/// Every domain handler goes through this before its downstream call, so
/// expired tokens are renewed transparently instead of surfacing as 401s
/// from Google.
pub async fn fresh_access_token(
    store: &CredentialStore,
    token_url: &str,
    user_id: &str,
    bundle: &StoredBundle,
) -> Result<String, RefreshError> {
    if !bundle.tokens.expires_within(REFRESH_SKEW_SECONDS) {
        return Ok(bundle.tokens.access_token.clone());
    }

    if bundle.tokens.refresh_token.is_none() {
        return Err(RefreshError::MissingRefreshToken);
    }

    let refreshed = refresh_access_token(
        token_url,
        &bundle.client_id,
        &bundle.client_secret,
        &bundle.tokens,
    )
    .await
    .map_err(|e| RefreshError::Upstream(e.to_string()))?;

    store
        .update(user_id, &refreshed)
        .map_err(|e| RefreshError::Store(e.to_string()))?;

    tracing::info!(user_id = %user_id, "Refreshed access token");
    Ok(refreshed.access_token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialBundle;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use mockito::{Matcher, Server};

    #[test]
    fn test_token_response_deserialization() {
        let json = r#"{
            "access_token": "ya29.fresh",
            "refresh_token": "1//refresh",
            "expires_in": 3599,
            "scope": "scope.a scope.b",
            "token_type": "Bearer"
        }"#;

        let response: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.access_token, "ya29.fresh");
        assert_eq!(response.refresh_token.as_deref(), Some("1//refresh"));
        assert_eq!(response.expires_in, Some(3599));
        assert_eq!(response.scope.as_deref(), Some("scope.a scope.b"));
    }

    #[test]
    fn test_token_response_minimal() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token": "only"}"#).unwrap();
        assert_eq!(response.access_token, "only");
        assert!(response.refresh_token.is_none());
        assert!(response.expires_in.is_none());
    }

    #[test]
    fn test_refresh_response_carries_prior_refresh_token() {
        let prior = TokenSet {
            access_token: "old-access".to_string(),
            refresh_token: Some("the-refresh".to_string()),
            expires_at: None,
            scope: Some("scope.a".to_string()),
        };
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token": "new-access", "expires_in": 3600}"#).unwrap();

        let tokens = response.into_token_set(Some(&prior));
        assert_eq!(tokens.access_token, "new-access");
        assert_eq!(tokens.refresh_token.as_deref(), Some("the-refresh"));
        assert_eq!(tokens.scope.as_deref(), Some("scope.a"));
        assert!(tokens.expires_at.is_some());
    }

    #[tokio::test]
    async fn test_exchange_code_success() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("code".into(), "auth-code-1".into()),
                Matcher::UrlEncoded("client_id".into(), "cid".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "access_token": "ya29.exchanged",
                    "refresh_token": "1//r",
                    "expires_in": 3600,
                    "scope": "A B"
                }"#,
            )
            .create_async()
            .await;

        let token_url = format!("{}/token", server.url());
        let tokens = exchange_code(&token_url, "auth-code-1", "cid", "secret", "http://cb")
            .await
            .unwrap();

        assert_eq!(tokens.access_token, "ya29.exchanged");
        assert_eq!(tokens.refresh_token.as_deref(), Some("1//r"));
        assert_eq!(tokens.granted_scopes(), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_exchange_failure_passes_message_through() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/token")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": "invalid_grant", "error_description": "Code was already redeemed."}"#)
            .create_async()
            .await;

        let token_url = format!("{}/token", server.url());
        let err = exchange_code(&token_url, "stale", "cid", "secret", "http://cb")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid_grant"));
        assert!(err.to_string().contains("already redeemed"));
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token_fails() {
        let prior = TokenSet {
            access_token: "old".to_string(),
            refresh_token: None,
            expires_at: None,
            scope: None,
        };
        let err = refresh_access_token("http://unused.invalid/token", "cid", "secret", &prior)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No refresh token"));
    }

    fn expired_bundle() -> CredentialBundle {
        CredentialBundle {
            client_id: "cid".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "http://cb".to_string(),
            tokens: TokenSet {
                access_token: "stale-access".to_string(),
                refresh_token: Some("valid-refresh".to_string()),
                expires_at: Some(Utc::now() - Duration::minutes(5)),
                scope: Some("A B".to_string()),
            },
        }
    }

    fn test_store() -> CredentialStore {
        let key = BASE64.encode([0u8; 32]);
        CredentialStore::new(":memory:", &key).unwrap()
    }

    #[tokio::test]
    async fn test_fresh_access_token_refreshes_and_persists() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "valid-refresh".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "renewed-access", "expires_in": 3600}"#)
            .create_async()
            .await;

        let store = test_store();
        store.save("u1", &expired_bundle()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let bundle = store.get("u1").unwrap().unwrap();

        let token_url = format!("{}/token", server.url());
        let access = fresh_access_token(&store, &token_url, "u1", &bundle)
            .await
            .unwrap();
        assert_eq!(access, "renewed-access");

        // New tokens persisted, refresh token carried forward, update stamped
        let stored = store.get("u1").unwrap().unwrap();
        assert_eq!(stored.tokens.access_token, "renewed-access");
        assert_ne!(stored.tokens.access_token, "stale-access");
        assert_eq!(stored.tokens.refresh_token.as_deref(), Some("valid-refresh"));
        assert!(stored.updated_at.expect("updated_at missing") > stored.saved_at);
    }

    #[tokio::test]
    async fn test_fresh_access_token_skips_refresh_when_valid() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .expect(0)
            .create_async()
            .await;

        let store = test_store();
        let mut bundle = expired_bundle();
        bundle.tokens.expires_at = Some(Utc::now() + Duration::hours(1));
        store.save("u1", &bundle).unwrap();
        let stored = store.get("u1").unwrap().unwrap();

        let token_url = format!("{}/token", server.url());
        let access = fresh_access_token(&store, &token_url, "u1", &stored)
            .await
            .unwrap();
        assert_eq!(access, "stale-access");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fresh_access_token_expired_without_refresh_token() {
        let store = test_store();
        let mut bundle = expired_bundle();
        bundle.tokens.refresh_token = None;
        store.save("u1", &bundle).unwrap();
        let stored = store.get("u1").unwrap().unwrap();

        let err = fresh_access_token(&store, "http://unused.invalid/token", "u1", &stored)
            .await
            .unwrap_err();
        assert!(matches!(err, RefreshError::MissingRefreshToken));
    }

    #[tokio::test]
    async fn test_fresh_access_token_revoked_refresh() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error": "invalid_grant", "error_description": "Token has been revoked."}"#)
            .create_async()
            .await;

        let store = test_store();
        store.save("u1", &expired_bundle()).unwrap();
        let stored = store.get("u1").unwrap().unwrap();

        let token_url = format!("{}/token", server.url());
        let err = fresh_access_token(&store, &token_url, "u1", &stored)
            .await
            .unwrap_err();
        match err {
            RefreshError::Upstream(msg) => assert!(msg.contains("revoked")),
            other => panic!("expected Upstream error, got {:?}", other),
        }
    }
}

//! Authorization URL construction.
//!
//! Pure string building, no network. `access_type=offline` together with
//! `prompt=consent` makes Google reissue a refresh token on every consent,
//! including for returning users; the store keeps no "already have a
//! refresh token" state, so this is required for correctness.

use anyhow::{anyhow, Result};

/// Scopes requested when the caller supplies none.
pub const DEFAULT_SCOPES: [&str; 4] = [
    "https://www.googleapis.com/auth/gmail.send",
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive.file",
];

/// Build the consent URL for the authorization-code-with-offline-access flow.
///
/// `client_id` and `redirect_uri` are required; scopes are joined with
/// spaces before encoding.
pub fn build_authorization_url(
    auth_url: &str,
    client_id: &str,
    redirect_uri: &str,
    scopes: &[String],
) -> Result<String> {
    if client_id.is_empty() {
        return Err(anyhow!("client_id must not be empty"));
    }
    if redirect_uri.is_empty() {
        return Err(anyhow!("redirect_uri must not be empty"));
    }

    let scope = scopes.join(" ");
    Ok(format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
        auth_url,
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(&scope),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

    fn query_params(url: &str) -> HashMap<String, String> {
        let query = url.split_once('?').expect("no query string").1;
        serde_urlencoded::from_str(query).expect("invalid query string")
    }

    #[test]
    fn test_builds_offline_consent_url() {
        let url = build_authorization_url(
            AUTH_URL,
            "my-client-id",
            "http://localhost:3000/callback",
            &["scope.a".to_string()],
        )
        .unwrap();

        assert!(url.starts_with(AUTH_URL));
        let params = query_params(&url);
        assert_eq!(params["client_id"], "my-client-id");
        assert_eq!(params["redirect_uri"], "http://localhost:3000/callback");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["prompt"], "consent");
    }

    #[test]
    fn test_scope_param_decodes_to_space_joined() {
        let url = build_authorization_url(
            AUTH_URL,
            "cid",
            "http://localhost/cb",
            &["A".to_string(), "B".to_string()],
        )
        .unwrap();

        let params = query_params(&url);
        assert_eq!(params["scope"], "A B");
        // Encoded form carries no literal space
        assert!(url.contains("scope=A%20B"));
    }

    #[test]
    fn test_missing_required_fields() {
        assert!(build_authorization_url(AUTH_URL, "", "http://localhost/cb", &[]).is_err());
        assert!(build_authorization_url(AUTH_URL, "cid", "", &[]).is_err());
    }

    #[test]
    fn test_default_scopes_cover_all_services() {
        assert_eq!(DEFAULT_SCOPES.len(), 4);
        assert!(DEFAULT_SCOPES.iter().any(|s| s.contains("gmail.send")));
        assert!(DEFAULT_SCOPES.iter().any(|s| s.contains("gmail.readonly")));
        assert!(DEFAULT_SCOPES.iter().any(|s| s.contains("spreadsheets")));
        assert!(DEFAULT_SCOPES.iter().any(|s| s.contains("drive.file")));
    }
}

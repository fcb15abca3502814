//! HTTP client for the Gmail, Sheets, and Drive REST surfaces.
//!
//! The client is a transport handle only: it carries one user's access
//! token and knows the endpoint URLs, nothing else. Token refresh is the
//! caller's concern (see [`super::fresh_access_token`]).

use anyhow::{anyhow, Context, Result};
use reqwest::header;
use serde::{Deserialize, Serialize};

/// Boundary for multipart/related Drive uploads.
const UPLOAD_BOUNDARY: &str = "portico_upload_boundary";

/// Google endpoint URLs.
///
/// Defaults point at production Google; tests swap everything for a mock
/// server via [`GoogleEndpoints::with_base_url`].
#[derive(Clone, Debug, Deserialize)]
pub struct GoogleEndpoints {
    /// OAuth consent page
    #[serde(default = "default_auth_url")]
    pub auth_url: String,

    /// OAuth token endpoint (exchange and refresh)
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// Gmail API base (`.../gmail/v1`)
    #[serde(default = "default_gmail_base_url")]
    pub gmail_base_url: String,

    /// Sheets API base (`.../v4`)
    #[serde(default = "default_sheets_base_url")]
    pub sheets_base_url: String,

    /// Drive API base (`.../drive/v3`)
    #[serde(default = "default_drive_base_url")]
    pub drive_base_url: String,

    /// Drive multipart upload endpoint
    #[serde(default = "default_drive_upload_url")]
    pub drive_upload_url: String,
}

fn default_auth_url() -> String {
    "https://accounts.google.com/o/oauth2/v2/auth".to_string()
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_gmail_base_url() -> String {
    "https://gmail.googleapis.com/gmail/v1".to_string()
}

fn default_sheets_base_url() -> String {
    "https://sheets.googleapis.com/v4".to_string()
}

fn default_drive_base_url() -> String {
    "https://www.googleapis.com/drive/v3".to_string()
}

fn default_drive_upload_url() -> String {
    "https://www.googleapis.com/upload/drive/v3/files".to_string()
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            gmail_base_url: default_gmail_base_url(),
            sheets_base_url: default_sheets_base_url(),
            drive_base_url: default_drive_base_url(),
            drive_upload_url: default_drive_upload_url(),
        }
    }
}

impl GoogleEndpoints {
    /// Point every endpoint at one base URL (for testing with a mock server).
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            auth_url: format!("{}/auth", base_url),
            token_url: format!("{}/token", base_url),
            gmail_base_url: base_url.to_string(),
            sheets_base_url: base_url.to_string(),
            drive_base_url: base_url.to_string(),
            drive_upload_url: format!("{}/upload", base_url),
        }
    }
}

/// Result of a Gmail send call.
#[derive(Debug, Deserialize)]
pub struct SentMessage {
    pub id: String,
    #[serde(rename = "threadId")]
    pub thread_id: Option<String>,
}

/// One entry in a Gmail list response.
#[derive(Debug, Deserialize)]
pub struct MessageRef {
    pub id: String,
    #[serde(rename = "threadId")]
    pub thread_id: Option<String>,
}

/// A single page of Gmail message references.
#[derive(Debug, Deserialize)]
pub struct MessageList {
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageHeader {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessagePayload {
    #[serde(default)]
    pub headers: Vec<MessageHeader>,
}

/// Metadata view of one Gmail message.
#[derive(Debug, Deserialize)]
pub struct MessageMetadata {
    pub id: String,
    #[serde(rename = "threadId")]
    pub thread_id: Option<String>,
    pub snippet: Option<String>,
    #[serde(default)]
    pub payload: MessagePayload,
}

impl MessageMetadata {
    /// Value of a named header, or empty when absent.
    pub fn header(&self, name: &str) -> String {
        self.payload
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.clone())
            .unwrap_or_default()
    }
}

/// A Sheets range read result.
#[derive(Debug, Deserialize)]
pub struct ValueRange {
    pub range: Option<String>,
    #[serde(default)]
    pub values: Vec<Vec<serde_json::Value>>,
}

/// A Sheets range write result.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub updated_range: Option<String>,
    pub updated_rows: Option<u64>,
    pub updated_columns: Option<u64>,
    pub updated_cells: Option<u64>,
}

/// Drive file metadata.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: Option<String>,
    pub mime_type: Option<String>,
    pub web_view_link: Option<String>,
    pub created_time: Option<String>,
    pub size: Option<String>,
}

/// Authenticated transport handle for one user's Google API calls.
pub struct GoogleClient {
    access_token: String,
    http_client: reqwest::Client,
    endpoints: GoogleEndpoints,
}

impl GoogleClient {
    pub fn new(access_token: String, endpoints: GoogleEndpoints) -> Self {
        let http_client = reqwest::Client::builder()
            .user_agent("portico/1.0")
            .build()
            .expect("Failed to build HTTP client");
        Self {
            access_token,
            http_client,
            endpoints,
        }
    }

    /// Send a raw (base64url-encoded RFC 822) message as the user.
    pub async fn send_message(&self, raw: &str) -> Result<SentMessage> {
        let url = format!("{}/users/me/messages/send", self.endpoints.gmail_base_url);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({ "raw": raw }))
            .send()
            .await
            .context("Failed to send message request")?;

        let response = check_status(response).await?;
        response
            .json::<SentMessage>()
            .await
            .context("Failed to parse send response")
    }

    /// List one page of the user's messages matching `query`.
    pub async fn list_messages(&self, query: &str, max_results: u32) -> Result<MessageList> {
        let url = format!("{}/users/me/messages", self.endpoints.gmail_base_url);
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[
                ("maxResults", max_results.to_string()),
                ("q", query.to_string()),
            ])
            .send()
            .await
            .context("Failed to send list request")?;

        let response = check_status(response).await?;
        response
            .json::<MessageList>()
            .await
            .context("Failed to parse list response")
    }

    /// Fetch the metadata view (From/Subject/Date headers + snippet) of one message.
    pub async fn message_metadata(&self, message_id: &str) -> Result<MessageMetadata> {
        let url = format!(
            "{}/users/me/messages/{}",
            self.endpoints.gmail_base_url, message_id
        );
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[
                ("format", "metadata"),
                ("metadataHeaders", "From"),
                ("metadataHeaders", "Subject"),
                ("metadataHeaders", "Date"),
            ])
            .send()
            .await
            .context("Failed to send metadata request")?;

        let response = check_status(response).await?;
        response
            .json::<MessageMetadata>()
            .await
            .context("Failed to parse metadata response")
    }

    /// Read an A1-style range from a spreadsheet.
    pub async fn read_range(&self, spreadsheet_id: &str, range: &str) -> Result<ValueRange> {
        let url = format!(
            "{}/spreadsheets/{}/values/{}",
            self.endpoints.sheets_base_url,
            spreadsheet_id,
            urlencoding::encode(range)
        );
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .context("Failed to send read-range request")?;

        let response = check_status(response).await?;
        response
            .json::<ValueRange>()
            .await
            .context("Failed to parse read-range response")
    }

    /// Write a 2-D block of values to an A1-style range (USER_ENTERED parsing).
    pub async fn write_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &[Vec<serde_json::Value>],
    ) -> Result<UpdateResult> {
        let url = format!(
            "{}/spreadsheets/{}/values/{}",
            self.endpoints.sheets_base_url,
            spreadsheet_id,
            urlencoding::encode(range)
        );
        let response = self
            .http_client
            .put(&url)
            .bearer_auth(&self.access_token)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&serde_json::json!({ "values": values }))
            .send()
            .await
            .context("Failed to send write-range request")?;

        let response = check_status(response).await?;
        response
            .json::<UpdateResult>()
            .await
            .context("Failed to parse write-range response")
    }

    /// Upload file content plus metadata in a single multipart/related call.
    pub async fn upload_file(
        &self,
        name: &str,
        mime_type: &str,
        folder_id: Option<&str>,
        content: &[u8],
    ) -> Result<DriveFile> {
        let mut metadata = serde_json::json!({ "name": name });
        if let Some(folder) = folder_id {
            metadata["parents"] = serde_json::json!([folder]);
        }

        let body = multipart_related_body(&metadata, mime_type, content)?;
        let url = format!(
            "{}?uploadType=multipart&fields=id,name,mimeType,webViewLink,createdTime",
            self.endpoints.drive_upload_url
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.access_token)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", UPLOAD_BOUNDARY),
            )
            .body(body)
            .send()
            .await
            .context("Failed to send upload request")?;

        let response = check_status(response).await?;
        response
            .json::<DriveFile>()
            .await
            .context("Failed to parse upload response")
    }

    /// Fetch metadata for one Drive file.
    pub async fn file_metadata(&self, file_id: &str) -> Result<DriveFile> {
        let url = format!("{}/files/{}", self.endpoints.drive_base_url, file_id);
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("fields", "id,name,mimeType,size")])
            .send()
            .await
            .context("Failed to send file metadata request")?;

        let response = check_status(response).await?;
        response
            .json::<DriveFile>()
            .await
            .context("Failed to parse file metadata response")
    }

    /// Download the raw bytes of one Drive file.
    pub async fn download_file(&self, file_id: &str) -> Result<Vec<u8>> {
        let url = format!("{}/files/{}", self.endpoints.drive_base_url, file_id);
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("alt", "media")])
            .send()
            .await
            .context("Failed to send download request")?;

        let response = check_status(response).await?;
        let bytes = response
            .bytes()
            .await
            .context("Failed to read download body")?;
        Ok(bytes.to_vec())
    }
}

/// Pass non-2xx responses through as errors carrying the upstream body verbatim.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(anyhow!("Google API error {}: {}", status, body))
}

/// Build a `multipart/related` body: JSON metadata part + media part.
///
/// Drive's multipart upload wants `multipart/related`, which reqwest's
/// multipart support (form-data) does not produce, so the body is
/// assembled by hand.
fn multipart_related_body(
    metadata: &serde_json::Value,
    mime_type: &str,
    content: &[u8],
) -> Result<Vec<u8>> {
    let metadata_json = serde_json::to_string(metadata).context("Failed to encode metadata")?;

    let mut body = Vec::with_capacity(metadata_json.len() + content.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", UPLOAD_BOUNDARY).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata_json.as_bytes());
    body.extend_from_slice(format!("\r\n--{}\r\n", UPLOAD_BOUNDARY).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", mime_type).as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", UPLOAD_BOUNDARY).as_bytes());

    Ok(body)
}

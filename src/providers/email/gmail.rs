//! Gmail API provider implementation.
//!
//! This module provides a [`MailboxApi`] implementation over the Gmail REST
//! API. A [`GmailClient`] only exists once an access token has been obtained,
//! so it doubles as the authenticated-session capability handed to services.
//!
//! # API Usage
//!
//! This provider uses the Gmail API v1:
//! - `users.messages.list` for searches
//! - `users.messages.get` (`format=metadata` / `format=full`)
//! - `users.messages.batchDelete` for bulk deletion
//! - `users.messages.modify` for archive and labelling
//! - `users.labels.list` / `users.labels.create`
//! - `users.settings.filters.create`
//! - `users.getProfile`

use async_trait::async_trait;
use base64::prelude::*;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, RETRY_AFTER};
use serde::{Deserialize, Serialize};

use super::{FullMessage, ListPage, MailboxApi, Pagination, ProviderError, Result};
use crate::config::ApiSettings;
use crate::domain::{
    AttachmentPart, Filter, FilterAction, FilterCriteria, Header, HeaderField, Label, LabelColor,
    LabelId, MailboxProfile, MessageId, MessageRef,
};

/// Gmail API message list response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageListResponse {
    messages: Option<Vec<GmailMessageRef>>,
    next_page_token: Option<String>,
    result_size_estimate: Option<u64>,
}

/// Gmail API message reference (list entries).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailMessageRef {
    id: String,
    thread_id: String,
}

/// Gmail API message.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailMessage {
    #[allow(dead_code)]
    id: String,
    payload: Option<GmailPart>,
}

/// Gmail message part. The top-level payload has the same shape.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailPart {
    mime_type: Option<String>,
    filename: Option<String>,
    headers: Option<Vec<GmailHeader>>,
    body: Option<GmailBody>,
    parts: Option<Vec<GmailPart>>,
}

/// Gmail message header.
#[derive(Debug, Deserialize)]
struct GmailHeader {
    name: String,
    #[serde(default)]
    value: String,
}

/// Gmail message body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailBody {
    data: Option<String>,
    size: Option<u64>,
}

/// Gmail API label.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailLabel {
    id: String,
    name: String,
    #[serde(rename = "type")]
    label_type: Option<String>,
    color: Option<LabelColor>,
}

impl From<GmailLabel> for Label {
    fn from(label: GmailLabel) -> Self {
        Label {
            id: LabelId::from(label.id),
            name: label.name,
            color: label.color,
            is_system: label.label_type.as_deref() == Some("system"),
        }
    }
}

/// Gmail labels list response.
#[derive(Debug, Deserialize)]
struct LabelsListResponse {
    labels: Option<Vec<GmailLabel>>,
}

/// Gmail modify request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModifyRequest<'a> {
    #[serde(skip_serializing_if = "no_labels")]
    add_label_ids: &'a [LabelId],
    #[serde(skip_serializing_if = "no_labels")]
    remove_label_ids: &'a [LabelId],
}

fn no_labels(ids: &&[LabelId]) -> bool {
    ids.is_empty()
}

/// Gmail batch delete request body.
#[derive(Debug, Serialize)]
struct BatchDeleteRequest<'a> {
    ids: &'a [MessageId],
}

/// Gmail label create request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLabelRequest<'a> {
    name: &'a str,
    label_list_visibility: &'static str,
    message_list_visibility: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<&'a LabelColor>,
}

/// Gmail filter create request body.
#[derive(Debug, Serialize)]
struct CreateFilterRequest<'a> {
    criteria: &'a FilterCriteria,
    action: &'a FilterAction,
}

/// OAuth token response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[allow(dead_code)]
    expires_in: Option<u64>,
}

/// OAuth credentials stored in the keychain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GmailCredentials {
    /// OAuth refresh token.
    pub refresh_token: String,
    /// OAuth client ID.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
}

/// Authenticated Gmail API client.
///
/// Obtained through [`GmailClient::authenticate`]; dropping it (or handing it
/// to logout) ends the session.
pub struct GmailClient {
    /// HTTP client for API requests.
    client: reqwest::Client,
    /// API root, e.g. `https://gmail.googleapis.com/gmail/v1/users/me`.
    base_url: String,
    /// OAuth access token.
    access_token: String,
    /// Maximum ids per batch delete.
    bulk_delete_cap: usize,
}

impl GmailClient {
    /// Exchanges the refresh token for an access token and returns a client.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Authentication`] if the token endpoint rejects
    /// the credentials.
    pub async fn authenticate(credentials: &GmailCredentials, settings: &ApiSettings) -> Result<Self> {
        let client = reqwest::Client::new();
        let access_token = request_access_token(&client, &settings.token_url, credentials).await?;

        tracing::info!("Gmail client authenticated");
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            access_token,
            bulk_delete_cap: settings.bulk_delete_cap,
        })
    }

    /// Creates a client from an already issued access token.
    pub fn with_access_token(access_token: impl Into<String>, settings: &ApiSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            bulk_delete_cap: settings.bulk_delete_cap,
        }
    }

    /// Builds authorization headers for API requests.
    fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.access_token))
                .map_err(|e| ProviderError::Internal(format!("invalid header: {}", e)))?,
        );
        Ok(headers)
    }

    /// Makes an authenticated GET request to the Gmail API.
    async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, endpoint);

        let response = self
            .client
            .get(&url)
            .headers(self.auth_headers()?)
            .query(query)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(e.to_string()))?;

        handle_response(response).await
    }

    /// Makes an authenticated POST request to the Gmail API.
    async fn post<T: for<'de> Deserialize<'de>, B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, endpoint);

        let response = self
            .client
            .post(&url)
            .headers(self.auth_headers()?)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(e.to_string()))?;

        handle_response(response).await
    }

    /// Makes an authenticated POST request that doesn't return a body.
    async fn post_no_response<B: Serialize>(&self, endpoint: &str, body: &B) -> Result<()> {
        let url = format!("{}{}", self.base_url, endpoint);

        let response = self
            .client
            .post(&url)
            .headers(self.auth_headers()?)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            return Err(handle_error(response).await);
        }
        Ok(())
    }
}

/// Requests an access token from the OAuth token endpoint.
async fn request_access_token(
    client: &reqwest::Client,
    token_url: &str,
    credentials: &GmailCredentials,
) -> Result<String> {
    let params = [
        ("client_id", credentials.client_id.as_str()),
        ("client_secret", credentials.client_secret.as_str()),
        ("refresh_token", credentials.refresh_token.as_str()),
        ("grant_type", "refresh_token"),
    ];

    let response = client
        .post(token_url)
        .form(&params)
        .send()
        .await
        .map_err(|e| ProviderError::Connection(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Authentication(format!(
            "token refresh failed ({}): {}",
            status, body
        )));
    }

    let token_response: TokenResponse = response
        .json()
        .await
        .map_err(|e| ProviderError::Internal(format!("parse token response: {}", e)))?;

    Ok(token_response.access_token)
}

/// Handles API response, checking for errors.
async fn handle_response<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T> {
    if !response.status().is_success() {
        return Err(handle_error(response).await);
    }

    response
        .json()
        .await
        .map_err(|e| ProviderError::Internal(format!("parse response: {}", e)))
}

/// Handles API error responses.
async fn handle_error(response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();

    classify_error(status, body, retry_after)
}

/// Maps an HTTP error status and body onto a [`ProviderError`].
fn classify_error(status: u16, body: String, retry_after_secs: Option<u64>) -> ProviderError {
    match status {
        400 => ProviderError::InvalidRequest(body),
        401 => ProviderError::Authentication(format!("unauthorized: {}", body)),
        404 => ProviderError::NotFound(body),
        409 => ProviderError::AlreadyExists(body),
        429 => ProviderError::RateLimited { retry_after_secs },
        _ if body.contains("already exists") => ProviderError::AlreadyExists(body),
        _ => ProviderError::Provider(format!("API error ({}): {}", status, body)),
    }
}

/// Decodes a base64url body part. Gmail omits padding on some parts.
fn decode_body(data: &str) -> Option<String> {
    let decoded = BASE64_URL_SAFE_NO_PAD
        .decode(data.trim_end_matches('='))
        .ok()?;
    String::from_utf8(decoded).ok()
}

/// Recursively extracts text and HTML bodies and attachment parts.
fn walk_parts(part: &GmailPart, message: &mut FullMessage) {
    let mime = part.mime_type.as_deref().unwrap_or("");
    let filename = part.filename.as_deref().unwrap_or("");
    let body = part.body.as_ref();

    if !filename.is_empty() {
        let size = body.and_then(|b| b.size).unwrap_or(0);
        if size > 0 {
            message.attachments.push(AttachmentPart {
                filename: filename.to_string(),
                size,
                mime_type: mime.to_string(),
            });
        }
    } else if let Some(text) = body.and_then(|b| b.data.as_deref()).and_then(decode_body) {
        if mime == "text/html" {
            message.body_html.get_or_insert(text);
        } else if mime == "text/plain" || mime.is_empty() {
            message.body_text.get_or_insert(text);
        }
    }

    // Recurse into nested parts
    for nested in part.parts.iter().flatten() {
        walk_parts(nested, message);
    }
}

fn convert_headers(headers: Option<Vec<GmailHeader>>) -> Vec<Header> {
    headers
        .unwrap_or_default()
        .into_iter()
        .map(|h| Header::new(h.name, h.value))
        .collect()
}

fn convert_full_message(message: GmailMessage) -> FullMessage {
    let mut payload = message.payload.unwrap_or_default();
    let mut full = FullMessage {
        headers: convert_headers(payload.headers.take()),
        ..FullMessage::default()
    };
    walk_parts(&payload, &mut full);
    full
}

#[async_trait]
impl MailboxApi for GmailClient {
    async fn list(&self, query: &str, pagination: &Pagination) -> Result<ListPage> {
        let mut params = vec![("q", query.to_string())];
        if let Some(limit) = pagination.limit {
            params.push(("maxResults", limit.to_string()));
        }
        if let Some(token) = &pagination.page_token {
            params.push(("pageToken", token.clone()));
        }

        let response: MessageListResponse = self.get("/messages", &params).await?;

        Ok(ListPage {
            messages: response
                .messages
                .unwrap_or_default()
                .into_iter()
                .map(|m| MessageRef::new(m.id, m.thread_id))
                .collect(),
            next_page_token: response.next_page_token.filter(|t| !t.is_empty()),
            result_size_estimate: response.result_size_estimate.unwrap_or(0),
        })
    }

    async fn get_metadata(&self, id: &MessageId, fields: &[HeaderField]) -> Result<Vec<Header>> {
        let mut params = vec![("format", "metadata".to_string())];
        params.extend(
            fields
                .iter()
                .map(|f| ("metadataHeaders", f.header_name().to_string())),
        );

        let message: GmailMessage = self.get(&format!("/messages/{}", id), &params).await?;
        Ok(convert_headers(message.payload.and_then(|p| p.headers)))
    }

    async fn get_full(&self, id: &MessageId) -> Result<FullMessage> {
        let params = [("format", "full".to_string())];
        let message: GmailMessage = self.get(&format!("/messages/{}", id), &params).await?;
        Ok(convert_full_message(message))
    }

    async fn bulk_delete(&self, ids: &[MessageId]) -> Result<()> {
        if ids.len() > self.bulk_delete_cap {
            return Err(ProviderError::InvalidRequest(format!(
                "batch of {} exceeds limit of {}",
                ids.len(),
                self.bulk_delete_cap
            )));
        }

        self.post_no_response("/messages/batchDelete", &BatchDeleteRequest { ids })
            .await?;
        tracing::debug!(count = ids.len(), "Batch delete applied");
        Ok(())
    }

    fn bulk_delete_cap(&self) -> usize {
        self.bulk_delete_cap
    }

    async fn modify_labels(
        &self,
        id: &MessageId,
        add: &[LabelId],
        remove: &[LabelId],
    ) -> Result<()> {
        let endpoint = format!("/messages/{}/modify", id);
        let body = ModifyRequest {
            add_label_ids: add,
            remove_label_ids: remove,
        };
        self.post_no_response(&endpoint, &body).await
    }

    async fn create_label(&self, name: &str, color: Option<&LabelColor>) -> Result<Label> {
        let body = CreateLabelRequest {
            name,
            label_list_visibility: "labelShow",
            message_list_visibility: "show",
            color,
        };
        let label: GmailLabel = self.post("/labels", &body).await?;
        Ok(label.into())
    }

    async fn list_labels(&self) -> Result<Vec<Label>> {
        let response: LabelsListResponse = self.get("/labels", &[]).await?;
        Ok(response
            .labels
            .unwrap_or_default()
            .into_iter()
            .map(Label::from)
            .collect())
    }

    async fn create_filter(
        &self,
        criteria: &FilterCriteria,
        action: &FilterAction,
    ) -> Result<Filter> {
        self.post("/settings/filters", &CreateFilterRequest { criteria, action })
            .await
    }

    async fn get_profile(&self) -> Result<MailboxProfile> {
        self.get("/profile", &[]).await
    }
}

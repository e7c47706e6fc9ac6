//! Upload sessions issued by the storage service

use crate::error::{Error, Result};
use crate::transport::{status_error, Transport, TransportRequest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Server-issued handle for one resumable upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    #[serde(rename = "uploadUrl")]
    pub url: String,
    #[serde(rename = "expirationDateTime")]
    pub expiry: DateTime<Utc>,
    #[serde(default)]
    pub next_expected_ranges: Vec<String>,
}

impl UploadSession {
    pub fn new(url: impl Into<String>, expiry: DateTime<Utc>) -> Self {
        Self {
            url: url.into(),
            expiry,
            next_expected_ranges: Vec::new(),
        }
    }

    pub fn with_next_expected_ranges(mut self, ranges: Vec<String>) -> Self {
        self.next_expected_ranges = ranges;
        self
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiry
    }

    /// Fail unless the session has an upload URL and has not expired
    pub fn ensure_usable(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(Error::InvalidSession("Upload session has no upload URL".to_string()));
        }
        if self.is_expired() {
            return Err(Error::InvalidSession(format!(
                "Upload session expired at {}",
                self.expiry.to_rfc3339()
            )));
        }
        Ok(())
    }
}

/// Session progress reported by the server on a 202 response or status query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStatus {
    pub expiration_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_expected_ranges: Vec<String>,
}

/// Create an upload session by posting `payload` to `request_url`
pub async fn create_upload_session<T: Transport + ?Sized>(
    transport: &T,
    request_url: &str,
    payload: &serde_json::Value,
) -> Result<UploadSession> {
    let request = TransportRequest::post_json(request_url, payload)?;
    let response = transport.execute(request).await?;

    if !matches!(response.status, 200 | 201) {
        return Err(status_error(&response));
    }

    let session: UploadSession = response.json()?;
    if session.url.is_empty() {
        return Err(Error::InvalidSession(
            "Service returned an upload session without an upload URL".to_string(),
        ));
    }

    debug!(url = %session.url, expiry = %session.expiry, "upload session created");
    Ok(session)
}

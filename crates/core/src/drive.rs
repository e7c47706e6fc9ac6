//! Upload sessions for drive items (`/me/drive/root:/path:/createUploadSession`)

use crate::content::ContentSource;
use crate::error::{Error, Result};
use crate::session::create_upload_session;
use crate::task::{LargeFileUploadTask, UploadResult, UploadTaskOptions};
use crate::transport::Transport;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;

/// What the service does when the target name already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictBehavior {
    #[default]
    Rename,
    Replace,
    Fail,
}

impl ConflictBehavior {
    pub fn as_str(&self) -> &str {
        match self {
            ConflictBehavior::Rename => "rename",
            ConflictBehavior::Replace => "replace",
            ConflictBehavior::Fail => "fail",
        }
    }
}

impl std::fmt::Display for ConflictBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ConflictBehavior {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rename" => Ok(ConflictBehavior::Rename),
            "replace" => Ok(ConflictBehavior::Replace),
            "fail" => Ok(ConflictBehavior::Fail),
            other => Err(Error::InvalidInput(format!(
                "Unknown conflict behavior '{}' (expected rename, replace or fail)",
                other
            ))),
        }
    }
}

/// Target of a drive item upload
#[derive(Debug, Clone)]
pub struct DriveUploadRequest {
    /// Folder below the drive root, e.g. `/Documents/reports`
    pub path: String,
    pub file_name: String,
    pub conflict_behavior: ConflictBehavior,
}

impl DriveUploadRequest {
    pub fn new(path: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            file_name: file_name.into(),
            conflict_behavior: ConflictBehavior::default(),
        }
    }

    pub fn with_conflict_behavior(mut self, conflict_behavior: ConflictBehavior) -> Self {
        self.conflict_behavior = conflict_behavior;
        self
    }

    /// URL of the createUploadSession action below `base_url`
    pub fn session_url(&self, base_url: &str) -> Result<String> {
        if self.file_name.is_empty() {
            return Err(Error::InvalidInput("File name cannot be empty".to_string()));
        }

        let mut url = Url::parse(base_url)
            .map_err(|e| Error::InvalidInput(format!("Invalid base URL {}: {}", base_url, e)))?;

        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| Error::InvalidInput(format!("Base URL cannot have a path: {}", base_url)))?;
            segments.pop_if_empty().extend(["me", "drive", "root:"]);
            segments.extend(self.path.split('/').filter(|s| !s.is_empty()));
            segments.push(&format!("{}:", self.file_name));
            segments.push("createUploadSession");
        }

        Ok(url.to_string())
    }

    /// Body of the createUploadSession request
    pub fn payload(&self) -> serde_json::Value {
        json!({
            "item": {
                "@microsoft.graph.conflictBehavior": self.conflict_behavior.as_str(),
                "name": self.file_name,
            }
        })
    }
}

/// Create an upload session for `request` and upload `source` through it
pub async fn upload_drive_item<S, T>(
    transport: T,
    base_url: &str,
    request: &DriveUploadRequest,
    source: S,
    options: UploadTaskOptions,
) -> Result<UploadResult>
where
    S: ContentSource,
    T: Transport,
{
    let session_url = request.session_url(base_url)?;
    let session = create_upload_session(&transport, &session_url, &request.payload()).await?;

    let mut task = LargeFileUploadTask::new(source, transport, session, options)?;
    task.upload().await
}

//! Resumable large file upload over a byte-range upload session

use crate::callback::ProgressCallback;
use crate::content::ContentSource;
use crate::error::{Error, Result};
use crate::range::{parse_range, ByteRange};
use crate::session::{UploadSession, UploadStatus};
use crate::transport::{is_retryable_status, status_error, RawResponse, Transport, TransportRequest};
use bytes::Bytes;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Slices must be a multiple of this many bytes (320 KiB)
pub const RANGE_SIZE_UNIT: u64 = 327_680;

/// Largest slice the service accepts in one request (60 MiB)
pub const MAX_RANGE_SIZE: u64 = 192 * RANGE_SIZE_UNIT;

/// Default slice size (5 MiB)
pub const DEFAULT_RANGE_SIZE: u64 = 16 * RANGE_SIZE_UNIT;

const COMPLETED_MESSAGE: &str =
    "Task with which you are trying to upload is already completed, Please check for your uploaded file";

/// Tuning for a [`LargeFileUploadTask`]
#[derive(Debug, Clone)]
pub struct UploadTaskOptions {
    /// Bytes sent per slice
    pub range_size: u64,
    /// Extra attempts for a slice that failed with a transport error
    pub max_retries: u32,
    /// Delay before the first retry, doubled on each further attempt
    pub retry_delay: Duration,
    pub callback: Option<ProgressCallback>,
}

impl Default for UploadTaskOptions {
    fn default() -> Self {
        Self {
            range_size: DEFAULT_RANGE_SIZE,
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
            callback: None,
        }
    }
}

impl UploadTaskOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_range_size(mut self, range_size: u64) -> Self {
        self.range_size = range_size;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_callback(mut self, callback: ProgressCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_range_size(self.range_size)
    }
}

/// Check that `range_size` is a non-zero multiple of [`RANGE_SIZE_UNIT`]
/// no larger than [`MAX_RANGE_SIZE`]
pub fn validate_range_size(range_size: u64) -> Result<()> {
    if range_size == 0 || range_size % RANGE_SIZE_UNIT != 0 {
        return Err(Error::InvalidInput(format!(
            "Range size must be a non-zero multiple of {} bytes, got {}",
            RANGE_SIZE_UNIT, range_size
        )));
    }
    if range_size > MAX_RANGE_SIZE {
        return Err(Error::InvalidInput(format!(
            "Range size cannot exceed {} bytes, got {}",
            MAX_RANGE_SIZE, range_size
        )));
    }
    Ok(())
}

/// Lifecycle of an upload task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed | TaskState::Cancelled)
    }
}

/// Outcome of a completed upload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadResult {
    pub location: Option<String>,
    pub response_body: Option<Value>,
}

impl UploadResult {
    /// Capture the `location` header and body of the final slice response.
    ///
    /// Bodies that are not JSON are kept as a string value.
    pub fn from_response(response: &RawResponse) -> Self {
        let response_body = if response.body.is_empty() {
            None
        } else {
            Some(
                serde_json::from_slice(&response.body)
                    .unwrap_or_else(|_| Value::String(response.text())),
            )
        };

        Self {
            location: response.header("location").map(str::to_string),
            response_body,
        }
    }
}

/// Uploads one piece of content through an upload session, slice by slice.
///
/// Slices are sent strictly in order; the range cursor only moves when the
/// server confirms a slice, so a dropped or cancelled upload can be picked up
/// again from the session.
pub struct LargeFileUploadTask<S, T> {
    source: S,
    transport: T,
    session: UploadSession,
    options: UploadTaskOptions,
    file_size: u64,
    cursor: ByteRange,
    state: TaskState,
    slice_accepted: bool,
}

impl<S, T> LargeFileUploadTask<S, T>
where
    S: ContentSource,
    T: Transport,
{
    /// Create a task for `source` bound to `session`.
    ///
    /// Starts from the session's advertised ranges, or from the first byte
    /// when the session advertises none.
    pub fn new(
        source: S,
        transport: T,
        session: UploadSession,
        options: UploadTaskOptions,
    ) -> Result<Self> {
        options.validate()?;

        if session.url.is_empty() {
            return Err(Error::InvalidSession("Upload session has no upload URL".to_string()));
        }

        let file_size = source.size();
        if file_size == 0 {
            return Err(Error::InvalidInput("Cannot upload empty content".to_string()));
        }

        let cursor = if session.next_expected_ranges.is_empty() {
            ByteRange::new(0, file_size as i64 - 1)?
        } else {
            parse_range(&session.next_expected_ranges, file_size)?
        };

        Ok(Self {
            source,
            transport,
            session,
            options,
            file_size,
            cursor,
            state: TaskState::Idle,
            slice_accepted: false,
        })
    }

    /// Create a task and position it from the server's current session status
    pub async fn resume(
        source: S,
        transport: T,
        session: UploadSession,
        options: UploadTaskOptions,
    ) -> Result<Self> {
        let mut task = Self::new(source, transport, session, options)?;
        task.get_status().await?;
        info!(name = %task.source.name(), next = %task.cursor, "resuming upload");
        Ok(task)
    }

    pub fn session(&self) -> &UploadSession {
        &self.session
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Range the server expects next, or empty once the session is consumed
    pub fn cursor(&self) -> ByteRange {
        self.cursor
    }

    /// Whether the server has confirmed at least one slice of this task
    pub fn has_accepted_slice(&self) -> bool {
        self.slice_accepted
    }

    pub fn options(&self) -> &UploadTaskOptions {
        &self.options
    }

    /// Give back the content source, e.g. to build a new task for the session
    pub fn into_source(self) -> S {
        self.source
    }

    /// The next slice to send, bounded by the range size, the server's
    /// expected range and the end of the content
    pub fn next_range(&self) -> ByteRange {
        if self.cursor.is_empty() {
            return ByteRange::EMPTY;
        }

        let start = self.cursor.min_value();
        if start as u64 >= self.file_size {
            return ByteRange::EMPTY;
        }

        let end = (start + self.options.range_size as i64 - 1)
            .min(self.cursor.max_value())
            .min(self.file_size as i64 - 1);

        // start lies inside both the cursor and the content, so end >= start
        ByteRange::new(start, end).unwrap_or(ByteRange::EMPTY)
    }

    /// Apply session progress reported by the server.
    ///
    /// No remaining ranges means the session is fully consumed and the task
    /// becomes [`TaskState::Completed`].
    pub fn update_task_status(&mut self, status: UploadStatus) -> Result<()> {
        let cursor = parse_range(&status.next_expected_ranges, self.file_size)?;

        if let Some(expiry) = status.expiration_date_time {
            self.session.expiry = expiry;
        }
        self.session.next_expected_ranges = status.next_expected_ranges;
        self.cursor = cursor;

        if cursor.is_empty() && !self.state.is_terminal() {
            self.state = TaskState::Completed;
        }
        Ok(())
    }

    /// Upload every remaining slice until the server reports completion
    pub async fn upload(&mut self) -> Result<UploadResult> {
        let outcome = self.run().await;
        self.finish(outcome)
    }

    /// Like [`upload`](Self::upload), but stops with [`Error::Cancelled`] once
    /// `token` is cancelled. The task stays resumable.
    pub async fn upload_with_cancellation(
        &mut self,
        token: &CancellationToken,
    ) -> Result<UploadResult> {
        if let Err(err) = self.ensure_not_terminal() {
            return self.finish(Err(err));
        }

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled),
            outcome = self.run() => outcome,
        };
        self.finish(outcome)
    }

    /// Send the bytes of `range` once, without retries or state changes
    pub async fn upload_slice(&mut self, range: ByteRange) -> Result<RawResponse> {
        self.session.ensure_usable()?;
        let body = self.source.slice(range).await?;
        self.send_slice(range, body).await
    }

    /// Query the session for the ranges the server still expects
    pub async fn get_status(&mut self) -> Result<UploadStatus> {
        self.ensure_session_open()?;

        let response = self
            .transport
            .execute(TransportRequest::get(&self.session.url))
            .await?;
        if !response.is_success() {
            return Err(status_error(&response));
        }

        let status: UploadStatus = response.json()?;
        self.update_task_status(status.clone())?;
        Ok(status)
    }

    /// Delete the upload session on the server
    pub async fn cancel(&mut self) -> Result<()> {
        self.ensure_session_open()?;

        let response = self
            .transport
            .execute(TransportRequest::delete(&self.session.url))
            .await?;
        if !response.is_success() {
            return Err(status_error(&response));
        }

        self.state = TaskState::Cancelled;
        info!(name = %self.source.name(), url = %self.session.url, "upload session cancelled");
        Ok(())
    }

    fn ensure_session_open(&self) -> Result<()> {
        match self.state {
            TaskState::Completed => Err(Error::InvalidSession(COMPLETED_MESSAGE.to_string())),
            TaskState::Cancelled => Err(Error::InvalidSession(
                "Upload session was cancelled".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn ensure_not_terminal(&self) -> Result<()> {
        self.ensure_session_open()?;
        if self.state == TaskState::Failed {
            return Err(Error::InvalidSession(
                "Upload task has failed, create a new task to resume the session".to_string(),
            ));
        }
        Ok(())
    }

    async fn run(&mut self) -> Result<UploadResult> {
        self.ensure_not_terminal()?;
        self.state = TaskState::InProgress;

        loop {
            self.session.ensure_usable()?;

            let range = self.next_range();
            if range.is_empty() {
                return Err(Error::Protocol(
                    "Upload session has no remaining ranges but never reported a completed upload"
                        .to_string(),
                ));
            }

            let body = self.source.slice(range).await?;
            let response = self.send_with_retries(range, body).await?;

            match response.status {
                202 => {
                    let status: UploadStatus = response.json()?;
                    if status.next_expected_ranges.is_empty() {
                        return Err(Error::Protocol(format!(
                            "Server accepted range {} without a final response or remaining ranges",
                            range
                        )));
                    }
                    self.update_task_status(status)?;
                    self.slice_accepted = true;

                    debug!(range = %range, next = %self.cursor, "range accepted");
                    if let Some(callback) = &self.options.callback {
                        callback.notify_progress(&range);
                    }
                }
                200 | 201 => {
                    self.slice_accepted = true;
                    self.cursor = ByteRange::EMPTY;
                    self.state = TaskState::Completed;
                    return Ok(UploadResult::from_response(&response));
                }
                status => {
                    return Err(Error::Protocol(format!(
                        "Unexpected HTTP {} for range {}: {}",
                        status,
                        range,
                        response.text()
                    )))
                }
            }
        }
    }

    async fn send_with_retries(&mut self, range: ByteRange, body: Bytes) -> Result<RawResponse> {
        let mut attempt = 0u32;

        loop {
            let outcome = match self.send_slice(range, body.clone()).await {
                Ok(response) if is_retryable_status(response.status) => Err(status_error(&response)),
                other => other,
            };

            match outcome {
                Err(err) if err.is_retryable() && attempt < self.options.max_retries => {
                    attempt += 1;
                    let delay = self
                        .options
                        .retry_delay
                        .saturating_mul(1u32 << (attempt - 1).min(16));
                    warn!(
                        range = %range,
                        attempt,
                        max_retries = self.options.max_retries,
                        error = %err,
                        "slice upload failed, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    self.session.ensure_usable()?;
                }
                other => return other,
            }
        }
    }

    async fn send_slice(&mut self, range: ByteRange, body: Bytes) -> Result<RawResponse> {
        debug!(
            name = %self.source.name(),
            range = %range,
            size = self.file_size,
            "uploading slice"
        );
        let request =
            TransportRequest::put_slice(&self.session.url, range.content_range(self.file_size), body);
        self.transport.execute(request).await
    }

    fn finish(&mut self, outcome: Result<UploadResult>) -> Result<UploadResult> {
        match outcome {
            Ok(result) => {
                info!(
                    name = %self.source.name(),
                    size = self.file_size,
                    location = ?result.location,
                    "upload completed"
                );
                if let Some(callback) = &self.options.callback {
                    callback.notify_completed(&result);
                }
                Ok(result)
            }
            Err(err) => {
                if !matches!(err, Error::Cancelled) && !self.state.is_terminal() {
                    self.state = TaskState::Failed;
                }
                error!(name = %self.source.name(), error = %err, kind = err.name(), "upload failed");
                if let Some(callback) = &self.options.callback {
                    callback.notify_failure(&err);
                }
                Err(err)
            }
        }
    }
}

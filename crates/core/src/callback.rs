//! Observer hooks for upload progress

use crate::error::Error;
use crate::range::ByteRange;
use crate::task::UploadResult;
use serde_json::Value;
use std::sync::Arc;

pub type ProgressHook = Arc<dyn Fn(&ByteRange, Option<&Value>) + Send + Sync>;
pub type CompletedHook = Arc<dyn Fn(&UploadResult, Option<&Value>) + Send + Sync>;
pub type FailureHook = Arc<dyn Fn(&Error, Option<&Value>) + Send + Sync>;

/// Optional hooks invoked synchronously by the upload loop.
///
/// `extra_params` is passed through untouched to every hook.
#[derive(Clone, Default)]
pub struct ProgressCallback {
    pub progress: Option<ProgressHook>,
    pub completed: Option<CompletedHook>,
    pub failure: Option<FailureHook>,
    pub extra_params: Option<Value>,
}

impl std::fmt::Debug for ProgressCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressCallback")
            .field("progress", &self.progress.is_some())
            .field("completed", &self.completed.is_some())
            .field("failure", &self.failure.is_some())
            .field("extra_params", &self.extra_params)
            .finish()
    }
}

impl ProgressCallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with each range the server accepted
    pub fn on_progress<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ByteRange, Option<&Value>) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(hook));
        self
    }

    /// Called once with the final result
    pub fn on_completed<F>(mut self, hook: F) -> Self
    where
        F: Fn(&UploadResult, Option<&Value>) + Send + Sync + 'static,
    {
        self.completed = Some(Arc::new(hook));
        self
    }

    /// Called with the error that ended an upload attempt
    pub fn on_failure<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Error, Option<&Value>) + Send + Sync + 'static,
    {
        self.failure = Some(Arc::new(hook));
        self
    }

    pub fn with_extra_params(mut self, params: Value) -> Self {
        self.extra_params = Some(params);
        self
    }

    pub(crate) fn notify_progress(&self, range: &ByteRange) {
        if let Some(hook) = &self.progress {
            hook(range, self.extra_params.as_ref());
        }
    }

    pub(crate) fn notify_completed(&self, result: &UploadResult) {
        if let Some(hook) = &self.completed {
            hook(result, self.extra_params.as_ref());
        }
    }

    pub(crate) fn notify_failure(&self, error: &Error) {
        if let Some(hook) = &self.failure {
            hook(error, self.extra_params.as_ref());
        }
    }
}

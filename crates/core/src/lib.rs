//! rangeup-core - Resumable large file uploads over byte-range upload sessions
//!
//! A [`LargeFileUploadTask`] sends content slice by slice to an upload session
//! URL, follows the ranges the server says it still expects, retries transient
//! failures and reports progress through a [`ProgressCallback`].

pub mod callback;
pub mod config;
pub mod content;
pub mod drive;
pub mod error;
pub mod range;
pub mod session;
pub mod task;
pub mod transport;

// Re-export commonly used types
pub use callback::ProgressCallback;
pub use config::{config_exists, get_config_path, load_config, load_config_from, save_config, save_config_to, validate_config};
pub use config::{Config, ConfigFile, LoggingConfig, ServiceConfig, UploadConfig};
pub use content::{BufferSource, ContentSource, FileSource, StreamSource};
pub use drive::{upload_drive_item, ConflictBehavior, DriveUploadRequest};
pub use error::{Error, Result};
pub use range::{parse_range, ByteRange};
pub use session::{create_upload_session, UploadSession, UploadStatus};
pub use task::{
    LargeFileUploadTask, TaskState, UploadResult, UploadTaskOptions, DEFAULT_RANGE_SIZE,
    MAX_RANGE_SIZE, RANGE_SIZE_UNIT,
};
pub use transport::{HttpTransport, RawResponse, Transport, TransportRequest};

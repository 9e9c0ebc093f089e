//! crates/course_sync_core/src/error.rs
//!
//! The caller-facing failure taxonomy of a create, update or delete request.

use crate::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The JSON course description is missing or not parsable.
    #[error("{0}")]
    MalformedPayload(String),

    /// The file list and its side-channel metadata disagree in length.
    #[error("{0}")]
    MetadataMismatch(String),

    /// A field-level rule over the course description was violated.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidTopicIndex(String),

    #[error("{0}")]
    DuplicateVideoAssignment(String),

    #[error("{0}")]
    TopicMissingVideo(String),

    #[error("{0}")]
    TopicMissingQuiz(String),

    #[error("{0}")]
    TopicQuizEmpty(String),

    #[error("{0}")]
    UnsupportedMediaType(String),

    #[error("{0}")]
    FileTooLarge(String),

    #[error("{0}")]
    TooManyFiles(String),

    #[error("{0}")]
    RecordNotFound(String),

    /// An unexpected fault in the document or asset store.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),
}

impl SyncError {
    /// Whether the failure was caused by the request itself.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, SyncError::Port(_) | SyncError::RecordNotFound(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SyncError::RecordNotFound(_) | SyncError::Port(PortError::NotFound(_))
        )
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

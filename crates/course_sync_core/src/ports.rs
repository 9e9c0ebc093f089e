//! crates/course_sync_core/src/ports.rs
//!
//! Defines the service contracts (traits) the synchronization engine depends on.
//! The document store and the asset store are external collaborators; the core
//! only ever talks to them through these ports.

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::domain::{AssetDescriptor, Course, Topic};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, filesystem).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The request can never succeed as given; retrying is pointless.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Document Store
//=========================================================================================

/// How a `CourseWrite` treats records that may or may not already exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// A brand-new course; every record is inserted.
    Insert,
    /// An edit of an existing course; records are upserted by id.
    Upsert,
}

/// One complete, self-consistent write of a course and its topics.
///
/// Adapters apply it as a single unit in the order: remove stale topics,
/// write topics, write the course.
#[derive(Debug, Clone)]
pub struct CourseWrite {
    pub mode: WriteMode,
    pub course: Course,
    pub topics: Vec<Topic>,
    /// Topics of this course that must no longer exist after the write.
    pub remove_topic_ids: Vec<Uuid>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_course(&self, course_id: Uuid) -> PortResult<Option<Course>>;

    /// Every topic whose owning course is `course_id`, in no particular order.
    async fn find_topics_by_course(&self, course_id: Uuid) -> PortResult<Vec<Topic>>;

    async fn find_courses_by_instructor(&self, instructor_id: &str) -> PortResult<Vec<Course>>;

    /// Applies a `CourseWrite` atomically.
    async fn commit(&self, write: CourseWrite) -> PortResult<()>;

    /// Removes a course and every topic it owns, returning the removed topics.
    async fn delete_course(&self, course_id: Uuid) -> PortResult<Vec<Topic>>;
}

//=========================================================================================
// Asset Store
//=========================================================================================

/// A file received from the client that has not been persisted yet.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub original_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Persists the file under a freshly generated, collision-resistant name.
    async fn store(&self, file: &IncomingFile) -> PortResult<AssetDescriptor>;

    /// Removes the file behind a public path. A file that is already gone is
    /// not an error.
    async fn delete(&self, path: &str) -> PortResult<()>;
}

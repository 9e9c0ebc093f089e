pub mod cleanup;
pub mod domain;
pub mod error;
pub mod locks;
pub mod payload;
pub mod ports;
pub mod reconcile;
pub mod sync;
pub mod validate;
pub mod writer;

pub use cleanup::{cleanup_channel, CleanupQueue, CleanupReason, CleanupSettings, CleanupWorker};
pub use domain::{AssetDescriptor, AssetRole, Course, CourseStatus, CourseWithTopics, MediaClass, Question, Quiz, Topic};
pub use error::{SyncError, SyncResult};
pub use payload::{RawCourseRequest, UploadLimits};
pub use ports::{AssetStore, CourseWrite, DocumentStore, IncomingFile, PortError, PortResult, WriteMode};
pub use sync::CourseSyncService;

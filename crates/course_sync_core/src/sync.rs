//! crates/course_sync_core/src/sync.rs
//!
//! The course synchronization service. Drives a create, update or delete
//! request through decoding, validation, asset storage, reconciliation,
//! persistence and cleanup.
//!
//! Any failure after assets were written queues those assets for deletion;
//! that is the only rollback. Orphans of a successful write are queued only
//! after the write has been committed.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cleanup::{CleanupQueue, CleanupReason};
use crate::domain::{Course, CourseWithTopics};
use crate::error::{SyncError, SyncResult};
use crate::locks::CourseLocks;
use crate::payload::{decode, DeclaredFile, RawCourseRequest, UploadLimits};
use crate::ports::{AssetStore, DocumentStore};
use crate::reconcile::{reconcile, PriorState, StoredUpload, Target};
use crate::validate::validate;
use crate::writer;

pub struct CourseSyncService {
    store: Arc<dyn DocumentStore>,
    assets: Arc<dyn AssetStore>,
    cleanup: CleanupQueue,
    limits: UploadLimits,
    locks: CourseLocks,
}

impl CourseSyncService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        assets: Arc<dyn AssetStore>,
        cleanup: CleanupQueue,
        limits: UploadLimits,
    ) -> Self {
        Self {
            store,
            assets,
            cleanup,
            limits,
            locks: CourseLocks::new(),
        }
    }

    pub fn cleanup(&self) -> &CleanupQueue {
        &self.cleanup
    }

    //=====================================================================================
    // Writes
    //=====================================================================================

    pub async fn create_course(&self, raw: RawCourseRequest) -> SyncResult<CourseWithTopics> {
        let decoded = decode(raw, &self.limits)?;
        let course = validate(&decoded.course)?;
        let uploads = self.store_uploads(decoded.files).await?;
        let written = written_paths(&uploads);

        let course_id = Uuid::new_v4();
        let result = async {
            let rec = reconcile(course, uploads, Target::Create { course_id }, Utc::now())?;
            writer::insert_course(self.store.as_ref(), &rec).await?;
            Ok::<_, SyncError>(rec)
        }
        .await;

        match result {
            Ok(rec) => {
                self.cleanup.enqueue(rec.assets_to_delete, CleanupReason::Orphaned);
                Ok(CourseWithTopics {
                    course: rec.course,
                    topics: rec.topics,
                })
            }
            Err(e) => {
                self.rollback(written, &e);
                Err(e)
            }
        }
    }

    pub async fn update_course(
        &self,
        course_id: Uuid,
        raw: RawCourseRequest,
    ) -> SyncResult<CourseWithTopics> {
        let _guard = self.locks.acquire(course_id).await;

        let existing = self
            .store
            .find_course(course_id)
            .await?
            .ok_or_else(course_not_found)?;

        let decoded = decode(raw, &self.limits)?;
        let course = validate(&decoded.course)?;
        let uploads = self.store_uploads(decoded.files).await?;
        let written = written_paths(&uploads);

        let result = async {
            let topics = self.store.find_topics_by_course(course_id).await?;
            let prior = PriorState::new(existing, topics);
            let rec = reconcile(course, uploads, Target::Update { prior: &prior }, Utc::now())?;
            writer::update_course(self.store.as_ref(), &rec).await?;
            Ok::<_, SyncError>(rec)
        }
        .await;

        match result {
            Ok(rec) => {
                if !rec.assets_to_delete.is_empty() {
                    info!(course_id = %course_id, count = rec.assets_to_delete.len(), "Queueing orphaned assets for deletion");
                }
                self.cleanup.enqueue(rec.assets_to_delete, CleanupReason::Orphaned);
                Ok(CourseWithTopics {
                    course: rec.course,
                    topics: rec.topics,
                })
            }
            Err(e) => {
                self.rollback(written, &e);
                Err(e)
            }
        }
    }

    /// Removes a course, all of its topics, and every asset they reference.
    pub async fn delete_course(&self, course_id: Uuid) -> SyncResult<()> {
        let _guard = self.locks.acquire(course_id).await;

        let course = self
            .store
            .find_course(course_id)
            .await?
            .ok_or_else(course_not_found)?;
        let removed = self.store.delete_course(course_id).await?;

        let paths: Vec<String> = course
            .image
            .into_iter()
            .chain(
                removed
                    .iter()
                    .flat_map(|t| t.asset_paths().map(str::to_string)),
            )
            .collect();
        info!(course_id = %course_id, topics = removed.len(), assets = paths.len(), "Course deleted");
        self.cleanup.enqueue(paths, CleanupReason::CourseDeleted);
        Ok(())
    }

    //=====================================================================================
    // Reads
    //=====================================================================================

    pub async fn get_course(&self, course_id: Uuid) -> SyncResult<CourseWithTopics> {
        let course = self
            .store
            .find_course(course_id)
            .await?
            .ok_or_else(course_not_found)?;
        self.with_topics(course).await
    }

    pub async fn courses_by_instructor(&self, instructor_id: &str) -> SyncResult<Vec<CourseWithTopics>> {
        let courses = self.store.find_courses_by_instructor(instructor_id).await?;
        let mut result = Vec::with_capacity(courses.len());
        for course in courses {
            result.push(self.with_topics(course).await?);
        }
        Ok(result)
    }

    async fn with_topics(&self, course: Course) -> SyncResult<CourseWithTopics> {
        let topics = self.store.find_topics_by_course(course.id).await?;
        let ordered = PriorState::new(course, topics);
        Ok(CourseWithTopics {
            course: ordered.course,
            topics: ordered.topics,
        })
    }

    //=====================================================================================
    // Helpers
    //=====================================================================================

    /// Writes every declared file to the asset store. If one write fails, the
    /// files already written are rolled back.
    async fn store_uploads(&self, files: Vec<DeclaredFile>) -> SyncResult<Vec<StoredUpload>> {
        let mut stored: Vec<StoredUpload> = Vec::with_capacity(files.len());
        for declared in files {
            match self.assets.store(&declared.file).await {
                Ok(asset) => stored.push(StoredUpload {
                    role: declared.role,
                    topic_index: declared.topic_index,
                    raw_index: declared.raw_index,
                    asset,
                }),
                Err(e) => {
                    let e = SyncError::from(e);
                    self.rollback(written_paths(&stored), &e);
                    return Err(e);
                }
            }
        }
        Ok(stored)
    }

    fn rollback(&self, written: Vec<String>, cause: &SyncError) {
        if written.is_empty() {
            return;
        }
        warn!(count = written.len(), error = %cause, "Request failed; removing its uploaded assets");
        self.cleanup.enqueue(written, CleanupReason::Rollback);
    }
}

fn written_paths(uploads: &[StoredUpload]) -> Vec<String> {
    uploads.iter().map(|u| u.asset.path.clone()).collect()
}

fn course_not_found() -> SyncError {
    SyncError::RecordNotFound("Course not found".to_string())
}

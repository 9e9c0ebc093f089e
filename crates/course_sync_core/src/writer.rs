//! crates/course_sync_core/src/writer.rs
//!
//! Applies a reconciliation to the document store.

use tracing::info;

use crate::error::{SyncError, SyncResult};
use crate::ports::{CourseWrite, DocumentStore, WriteMode};
use crate::reconcile::Reconciliation;

/// Writes a freshly created course and all of its topics.
pub async fn insert_course(store: &dyn DocumentStore, rec: &Reconciliation) -> SyncResult<()> {
    store
        .commit(CourseWrite {
            mode: WriteMode::Insert,
            course: rec.course.clone(),
            topics: rec.topics.clone(),
            remove_topic_ids: Vec::new(),
        })
        .await?;
    info!(course_id = %rec.course.id, topics = rec.topics.len(), "Course created");
    Ok(())
}

/// Writes an edited course: stale topics are removed, remaining topics and
/// the course are upserted. Fails with `RecordNotFound` before any mutation
/// when the course no longer exists.
pub async fn update_course(store: &dyn DocumentStore, rec: &Reconciliation) -> SyncResult<()> {
    if store.find_course(rec.course.id).await?.is_none() {
        return Err(SyncError::RecordNotFound("Course not found".to_string()));
    }
    store
        .commit(CourseWrite {
            mode: WriteMode::Upsert,
            course: rec.course.clone(),
            topics: rec.topics.clone(),
            remove_topic_ids: rec.removed_topic_ids.clone(),
        })
        .await?;
    info!(
        course_id = %rec.course.id,
        topics = rec.topics.len(),
        removed = rec.removed_topic_ids.len(),
        "Course updated"
    );
    Ok(())
}

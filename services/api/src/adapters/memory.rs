//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of the `DocumentStore` port: two keyed
//! collections behind one lock, last writer wins. Used when no database is
//! configured and by the test suite.

use std::collections::HashMap;

use async_trait::async_trait;
use course_sync_core::domain::{Course, Topic};
use course_sync_core::ports::{CourseWrite, DocumentStore, PortError, PortResult, WriteMode};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Collections {
    courses: HashMap<Uuid, Course>,
    topics: HashMap<Uuid, Topic>,
}

/// A document store that lives and dies with the process.
#[derive(Default)]
pub struct MemoryDocumentStore {
    inner: RwLock<Collections>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of topic records across all courses.
    pub async fn topic_count(&self) -> usize {
        self.inner.read().await.topics.len()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find_course(&self, course_id: Uuid) -> PortResult<Option<Course>> {
        Ok(self.inner.read().await.courses.get(&course_id).cloned())
    }

    async fn find_topics_by_course(&self, course_id: Uuid) -> PortResult<Vec<Topic>> {
        let db = self.inner.read().await;
        let mut topics: Vec<Topic> = db
            .topics
            .values()
            .filter(|t| t.course_id == course_id)
            .cloned()
            .collect();
        topics.sort_by_key(|t| t.created_at);
        Ok(topics)
    }

    async fn find_courses_by_instructor(&self, instructor_id: &str) -> PortResult<Vec<Course>> {
        let db = self.inner.read().await;
        let mut courses: Vec<Course> = db
            .courses
            .values()
            .filter(|c| c.instructor_id == instructor_id)
            .cloned()
            .collect();
        courses.sort_by_key(|c| c.created_at);
        Ok(courses)
    }

    async fn commit(&self, write: CourseWrite) -> PortResult<()> {
        let mut db = self.inner.write().await;

        // Check everything up front so a rejected write leaves no trace.
        if write.mode == WriteMode::Insert {
            if db.courses.contains_key(&write.course.id) {
                return Err(PortError::Unexpected(format!(
                    "Course {} already exists",
                    write.course.id
                )));
            }
            if let Some(t) = write.topics.iter().find(|t| db.topics.contains_key(&t.id)) {
                return Err(PortError::Unexpected(format!("Topic {} already exists", t.id)));
            }
        }

        let course_id = write.course.id;
        db.topics
            .retain(|id, t| !(t.course_id == course_id && write.remove_topic_ids.contains(id)));
        for topic in write.topics {
            db.topics.insert(topic.id, topic);
        }
        db.courses.insert(course_id, write.course);
        Ok(())
    }

    async fn delete_course(&self, course_id: Uuid) -> PortResult<Vec<Topic>> {
        let mut db = self.inner.write().await;
        if db.courses.remove(&course_id).is_none() {
            return Err(PortError::NotFound(format!("Course {} not found", course_id)));
        }
        let ids: Vec<Uuid> = db
            .topics
            .values()
            .filter(|t| t.course_id == course_id)
            .map(|t| t.id)
            .collect();
        Ok(ids
            .into_iter()
            .filter_map(|id| db.topics.remove(&id))
            .collect())
    }
}

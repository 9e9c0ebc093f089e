//! crates/course_sync_core/src/locks.rs
//!
//! Per-course mutual exclusion for writes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// A registry of one async mutex per course id. Writers to the same course
/// are serialized; writers to different courses never contend.
#[derive(Default)]
pub struct CourseLocks {
    inner: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl CourseLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `course_id`. Access lasts as long as the
    /// returned guard lives.
    pub async fn acquire(&self, course_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            // Entries nobody holds or waits on are only referenced by the map.
            map.retain(|_, m| Arc::strong_count(m) > 1);
            map.entry(course_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of courses currently locked or awaited.
    #[cfg(test)]
    fn active(&self) -> usize {
        let map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.values().filter(|m| Arc::strong_count(m) > 1).count()
    }
}

//! End-to-end behaviour of `CourseSyncService` over the in-memory document
//! store and a filesystem asset store rooted in a temporary directory.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use api_lib::adapters::{FsAssetStore, MemoryDocumentStore};
use bytes::Bytes;
use async_trait::async_trait;
use course_sync_core::{
    cleanup_channel, AssetDescriptor, AssetStore, CleanupSettings, CourseSyncService,
    CourseWithTopics, DocumentStore, IncomingFile, PortError, PortResult, RawCourseRequest,
    SyncError, UploadLimits,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

//=========================================================================================
// Harness
//=========================================================================================

struct Harness {
    service: Arc<CourseSyncService>,
    store: Arc<MemoryDocumentStore>,
    assets: Arc<FsAssetStore>,
    _dir: TempDir,
}

impl Harness {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryDocumentStore::new());
        let assets = Arc::new(FsAssetStore::new(dir.path(), None).await.unwrap());
        let settings = CleanupSettings {
            max_attempts: 2,
            backoff: std::time::Duration::from_millis(1),
        };
        let (queue, worker) = cleanup_channel(assets.clone(), settings, CancellationToken::new());
        tokio::spawn(worker.run());
        let service = Arc::new(CourseSyncService::new(
            store.clone(),
            assets.clone(),
            queue,
            UploadLimits::default(),
        ));
        Self {
            service,
            store,
            assets,
            _dir: dir,
        }
    }

    /// Waits until every queued asset deletion has been processed.
    async fn settle(&self) {
        self.service.cleanup().flush().await;
    }

    fn files_in(&self, partition: &str) -> usize {
        std::fs::read_dir(self.assets.root().join(partition))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    fn total_files(&self) -> usize {
        self.files_in("images") + self.files_in("videos") + self.files_in("docs")
    }

    fn on_disk(&self, public_path: &str) -> PathBuf {
        self.assets.resolve(public_path).unwrap()
    }
}

/// (file name, media type, role, topic index)
type Upload<'a> = (&'a str, &'a str, &'a str, &'a str);

fn request(data: Value, uploads: &[Upload<'_>]) -> RawCourseRequest {
    RawCourseRequest {
        data: Some(data.to_string()),
        files: uploads
            .iter()
            .map(|(name, content_type, _, _)| IncomingFile {
                original_name: name.to_string(),
                content_type: content_type.to_string(),
                bytes: Bytes::from(format!("contents of {}", name)),
            })
            .collect(),
        file_roles: uploads.iter().map(|u| u.2.to_string()).collect(),
        topic_indices: uploads.iter().map(|u| u.3.to_string()).collect(),
        file_meta: None,
    }
}

fn topic_json(title: &str) -> Value {
    json!({
        "title": title,
        "description": "d",
        "quiz": { "questions": [ { "q": "2+2?", "options": ["3", "4"], "answer": "4" } ] }
    })
}

fn course_json(titles: &[&str]) -> Value {
    json!({
        "title": "Rust in Practice",
        "description": "Ownership, borrowing, async",
        "price": 49.5,
        "instructorId": "ins-1",
        "instructorName": "Ada",
        "topics": titles.iter().map(|t| topic_json(t)).collect::<Vec<_>>()
    })
}

/// Creates a course with a cover image and, per topic, one video and two documents.
async fn seed(h: &Harness, titles: &[&str]) -> CourseWithTopics {
    let indices: Vec<String> = (0..titles.len()).map(|i| i.to_string()).collect();
    let mut uploads: Vec<Upload<'_>> = vec![("cover.png", "image/png", "image", "-1")];
    for index in &indices {
        uploads.push(("lesson.mp4", "video/mp4", "video", index));
        uploads.push(("notes.pdf", "application/pdf", "doc", index));
        uploads.push(("slides.pdf", "application/pdf", "doc", index));
    }
    h.service
        .create_course(request(course_json(titles), &uploads))
        .await
        .unwrap()
}

//=========================================================================================
// Create
//=========================================================================================

#[tokio::test]
async fn create_single_topic_course() {
    let h = Harness::new().await;
    let created = h
        .service
        .create_course(request(
            course_json(&["T1"]),
            &[("intro.mp4", "video/mp4", "video", "0")],
        ))
        .await
        .unwrap();

    assert_eq!(created.topics.len(), 1);
    let topic = &created.topics[0];
    assert!(topic.video.starts_with("/uploads/videos/"));
    assert!(topic.files.is_empty());
    assert!(h.on_disk(&topic.video).exists());
    assert_eq!(created.course.topics, vec![topic.id]);

    let stored = h.service.get_course(created.course.id).await.unwrap();
    assert_eq!(stored, created);
}

#[tokio::test]
async fn metadata_mismatch_persists_nothing() {
    let h = Harness::new().await;
    let mut raw = request(course_json(&["T1"]), &[("intro.mp4", "video/mp4", "video", "0")]);
    raw.topic_indices.clear();

    let err = h.service.create_course(raw).await.unwrap_err();
    h.settle().await;

    assert!(matches!(err, SyncError::MetadataMismatch(_)));
    assert_eq!(h.total_files(), 0);
    assert_eq!(h.store.topic_count().await, 0);
}

#[tokio::test]
async fn duplicate_video_leaves_no_files_behind() {
    let h = Harness::new().await;
    let err = h
        .service
        .create_course(request(
            course_json(&["T0", "T1", "T2"]),
            &[
                ("a.mp4", "video/mp4", "video", "2"),
                ("b.mp4", "video/mp4", "video", "2"),
            ],
        ))
        .await
        .unwrap_err();
    h.settle().await;

    assert!(matches!(err, SyncError::DuplicateVideoAssignment(_)));
    assert_eq!(h.files_in("videos"), 0);
}

#[tokio::test]
async fn rejected_create_rolls_back_uploaded_files() {
    let h = Harness::new().await;
    let err = h
        .service
        .create_course(request(
            course_json(&["T0", "T1"]),
            &[
                ("cover.png", "image/png", "image", "-1"),
                ("a.mp4", "video/mp4", "video", "0"),
            ],
        ))
        .await
        .unwrap_err();
    h.settle().await;

    assert!(matches!(err, SyncError::TopicMissingVideo(_)));
    assert_eq!(h.total_files(), 0);
    assert_eq!(h.store.topic_count().await, 0);
}

#[tokio::test]
async fn validation_failure_stores_no_assets() {
    let h = Harness::new().await;
    let mut data = course_json(&["T1"]);
    data["topics"][0]["quiz"]["questions"][0]["options"] = json!(["4"]);

    let err = h
        .service
        .create_course(request(data, &[("a.mp4", "video/mp4", "video", "0")]))
        .await
        .unwrap_err();
    h.settle().await;

    assert_eq!(
        err.to_string(),
        "Topic 1 (\"T1\") question 1 must have at least 2 options"
    );
    assert_eq!(h.total_files(), 0);
}

/// Delegates to a real asset store but fails every write after the first `budget`.
struct FailingAfter {
    inner: Arc<FsAssetStore>,
    budget: usize,
    stores: AtomicUsize,
}

#[async_trait]
impl AssetStore for FailingAfter {
    async fn store(&self, file: &IncomingFile) -> PortResult<AssetDescriptor> {
        if self.stores.fetch_add(1, Ordering::SeqCst) >= self.budget {
            return Err(PortError::Unexpected("No space left on device".into()));
        }
        self.inner.store(file).await
    }

    async fn delete(&self, path: &str) -> PortResult<()> {
        self.inner.delete(path).await
    }
}

#[tokio::test]
async fn failed_upload_rolls_back_earlier_uploads_of_the_request() {
    let dir = tempfile::tempdir().unwrap();
    let fs = Arc::new(FsAssetStore::new(dir.path(), None).await.unwrap());
    let assets = Arc::new(FailingAfter {
        inner: fs.clone(),
        budget: 1,
        stores: AtomicUsize::new(0),
    });
    let (queue, worker) = cleanup_channel(assets.clone(), CleanupSettings::default(), CancellationToken::new());
    tokio::spawn(worker.run());
    let store = Arc::new(MemoryDocumentStore::new());
    let service = CourseSyncService::new(store.clone(), assets.clone(), queue, UploadLimits::default());

    let err = service
        .create_course(request(
            course_json(&["T1"]),
            &[
                ("cover.png", "image/png", "image", "-1"),
                ("intro.mp4", "video/mp4", "video", "0"),
            ],
        ))
        .await
        .unwrap_err();
    service.cleanup().flush().await;

    assert!(matches!(err, SyncError::Port(_)));
    assert_eq!(assets.stores.load(Ordering::SeqCst), 2);
    for partition in ["images", "videos", "docs"] {
        assert_eq!(std::fs::read_dir(fs.root().join(partition)).unwrap().count(), 0);
    }
    assert_eq!(store.topic_count().await, 0);
}

//=========================================================================================
// Update
//=========================================================================================

#[tokio::test]
async fn replacing_a_video_deletes_the_old_file() {
    let h = Harness::new().await;
    let created = seed(&h, &["T0", "T1"]).await;
    let old_video = created.topics[0].video.clone();

    let updated = h
        .service
        .update_course(
            created.course.id,
            request(course_json(&["T0", "T1"]), &[("new.mp4", "video/mp4", "video", "0")]),
        )
        .await
        .unwrap();
    h.settle().await;

    let new_video = &updated.topics[0].video;
    assert_ne!(new_video, &old_video);
    assert_eq!(updated.topics[0].id, created.topics[0].id);
    assert!(h.on_disk(new_video).exists());
    assert!(!h.on_disk(&old_video).exists());
    assert_eq!(h.files_in("videos"), 2);

    let stored = h.store.find_topics_by_course(created.course.id).await.unwrap();
    assert!(stored.iter().any(|t| &t.video == new_video));
}

#[tokio::test]
async fn resubmitting_without_files_keeps_assets_identical() {
    let h = Harness::new().await;
    let created = seed(&h, &["T0", "T1"]).await;
    let before: Vec<Vec<u8>> = created.topics[1]
        .asset_paths()
        .map(|p| std::fs::read(h.on_disk(p)).unwrap())
        .collect();

    let updated = h
        .service
        .update_course(created.course.id, request(course_json(&["T0", "T1 (revised)"]), &[]))
        .await
        .unwrap();
    h.settle().await;

    let topic = &updated.topics[1];
    assert_eq!(topic.id, created.topics[1].id);
    assert_eq!(topic.video, created.topics[1].video);
    assert_eq!(topic.files, created.topics[1].files);
    assert_eq!(topic.title, "T1 (revised)");
    let after: Vec<Vec<u8>> = topic
        .asset_paths()
        .map(|p| std::fs::read(h.on_disk(p)).unwrap())
        .collect();
    assert_eq!(before, after);
    assert_eq!(h.total_files(), 1 + 2 * 3);
    assert_eq!(updated.course.image, created.course.image);
}

#[tokio::test]
async fn dropping_a_topic_removes_record_and_files() {
    let h = Harness::new().await;
    let created = seed(&h, &["T0", "T1", "T2"]).await;

    let updated = h
        .service
        .update_course(created.course.id, request(course_json(&["T0", "T1"]), &[]))
        .await
        .unwrap();
    h.settle().await;

    let dropped = &created.topics[2];
    assert_eq!(updated.course.topics, vec![created.topics[0].id, created.topics[1].id]);
    let stored = h.store.find_topics_by_course(created.course.id).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|t| t.id != dropped.id));
    for path in dropped.asset_paths() {
        assert!(!h.on_disk(path).exists());
    }
    assert_eq!(h.total_files(), 1 + 2 * 3);
}

#[tokio::test]
async fn new_cover_replaces_old_cover_file() {
    let h = Harness::new().await;
    let created = seed(&h, &["T0"]).await;
    let old_cover = created.course.image.clone().unwrap();

    let updated = h
        .service
        .update_course(
            created.course.id,
            request(course_json(&["T0"]), &[("cover2.webp", "image/webp", "image", "-1")]),
        )
        .await
        .unwrap();
    h.settle().await;

    let new_cover = updated.course.image.unwrap();
    assert!(new_cover.ends_with(".webp"));
    assert!(!h.on_disk(&old_cover).exists());
    assert!(h.on_disk(&new_cover).exists());
    assert_eq!(h.files_in("images"), 1);
}

#[tokio::test]
async fn failed_update_keeps_previous_state_and_removes_new_uploads() {
    let h = Harness::new().await;
    let created = seed(&h, &["T0"]).await;

    let err = h
        .service
        .update_course(
            created.course.id,
            request(
                course_json(&["T0", "T-new"]),
                &[("extra.pdf", "application/pdf", "doc", "1")],
            ),
        )
        .await
        .unwrap_err();
    h.settle().await;

    assert!(matches!(err, SyncError::TopicMissingVideo(_)));
    assert_eq!(h.service.get_course(created.course.id).await.unwrap(), created);
    assert_eq!(h.total_files(), 1 + 3);
}

#[tokio::test]
async fn updating_a_missing_course_is_not_found() {
    let h = Harness::new().await;
    let err = h
        .service
        .update_course(
            Uuid::new_v4(),
            request(course_json(&["T0"]), &[("a.mp4", "video/mp4", "video", "0")]),
        )
        .await
        .unwrap_err();
    h.settle().await;

    assert!(err.is_not_found());
    assert_eq!(h.total_files(), 0);
}

#[tokio::test]
async fn concurrent_updates_to_one_course_stay_consistent() {
    let h = Harness::new().await;
    let created = seed(&h, &["T0"]).await;
    let id = created.course.id;

    let first = {
        let service = h.service.clone();
        tokio::spawn(async move {
            service
                .update_course(id, request(course_json(&["T0"]), &[("a.mp4", "video/mp4", "video", "0")]))
                .await
        })
    };
    let second = {
        let service = h.service.clone();
        tokio::spawn(async move {
            service
                .update_course(id, request(course_json(&["T0"]), &[("b.mp4", "video/mp4", "video", "0")]))
                .await
        })
    };
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();
    h.settle().await;

    let stored = h.service.get_course(id).await.unwrap();
    assert_eq!(h.files_in("videos"), 1);
    assert!(h.on_disk(&stored.topics[0].video).exists());
}

//=========================================================================================
// Delete
//=========================================================================================

#[tokio::test]
async fn deleting_a_course_removes_every_asset() {
    let h = Harness::new().await;
    let created = seed(&h, &["T0", "T1", "T2"]).await;
    assert_eq!(h.total_files(), 1 + 3 + 6);

    h.service.delete_course(created.course.id).await.unwrap();
    h.settle().await;

    assert_eq!(h.total_files(), 0);
    assert!(h
        .store
        .find_topics_by_course(created.course.id)
        .await
        .unwrap()
        .is_empty());
    assert!(h.service.get_course(created.course.id).await.unwrap_err().is_not_found());
    assert!(h.service.delete_course(created.course.id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn instructor_listing_includes_topics() {
    let h = Harness::new().await;
    seed(&h, &["T0", "T1"]).await;
    seed(&h, &["T0"]).await;

    let courses = h.service.courses_by_instructor("ins-1").await.unwrap();
    assert_eq!(courses.len(), 2);
    let topic_counts: Vec<usize> = courses.iter().map(|c| c.topics.len()).collect();
    assert_eq!(topic_counts, vec![2, 1]);
    assert!(h.service.courses_by_instructor("nobody").await.unwrap().is_empty());
}

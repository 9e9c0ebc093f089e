//! crates/course_sync_core/src/reconcile.rs
//!
//! Merges a validated submission and its stored uploads with the previously
//! persisted state of a course. The result is the authoritative next state of
//! the course and its topics, the topics to remove, and every asset file that
//! is no longer referenced once that state is written.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::domain::{AssetDescriptor, AssetRole, Course, CourseStatus, Topic};
use crate::error::{SyncError, SyncResult};
use crate::payload::COVER_IMAGE_INDEX;
use crate::validate::{ValidCourse, ValidTopic};

/// An uploaded file that has already been written to the asset store.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub role: AssetRole,
    pub topic_index: Option<i64>,
    pub raw_index: String,
    pub asset: AssetDescriptor,
}

/// The persisted course and its topics, topics in course order.
#[derive(Debug, Clone)]
pub struct PriorState {
    pub course: Course,
    pub topics: Vec<Topic>,
}

impl PriorState {
    /// Builds the prior state from unordered topic records, ordering them by
    /// the course's topic-id list. Records the list does not mention follow,
    /// oldest first.
    pub fn new(course: Course, mut topics: Vec<Topic>) -> Self {
        let rank: HashMap<Uuid, usize> = course
            .topics
            .iter()
            .enumerate()
            .map(|(pos, id)| (*id, pos))
            .collect();
        topics.sort_by(|a, b| {
            let ra = rank.get(&a.id).copied().unwrap_or(usize::MAX);
            let rb = rank.get(&b.id).copied().unwrap_or(usize::MAX);
            ra.cmp(&rb).then(a.created_at.cmp(&b.created_at))
        });
        Self { course, topics }
    }
}

/// Identity and clock of the write being reconciled.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Create { course_id: Uuid },
    Update { prior: &'a PriorState },
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub course: Course,
    pub topics: Vec<Topic>,
    /// Persisted topics of the course that the submission dropped.
    pub removed_topic_ids: Vec<Uuid>,
    /// Public paths of assets no persisted record will reference.
    pub assets_to_delete: Vec<String>,
}

#[derive(Debug, Default)]
struct TopicBucket {
    video: Option<AssetDescriptor>,
    docs: Vec<AssetDescriptor>,
}

pub fn reconcile(
    course: ValidCourse,
    uploads: Vec<StoredUpload>,
    target: Target<'_>,
    now: DateTime<Utc>,
) -> SyncResult<Reconciliation> {
    let prior = match target {
        Target::Create { .. } => None,
        Target::Update { prior } => Some(prior),
    };
    let mut orphans: Vec<String> = Vec::new();

    // --- 1. Classify uploads into per-topic buckets ---
    let mut buckets: Vec<TopicBucket> = course.topics.iter().map(|_| TopicBucket::default()).collect();
    let mut cover: Option<AssetDescriptor> = None;
    let topic_count = course.topics.len();

    for upload in uploads {
        let slot = upload
            .topic_index
            .filter(|i| *i >= 0 && (*i as usize) < topic_count)
            .map(|i| i as usize);
        match (&upload.role, slot) {
            (AssetRole::Image, _) if upload.topic_index == Some(COVER_IMAGE_INDEX) => {
                if let Some(previous) = cover.replace(upload.asset) {
                    orphans.push(previous.path);
                }
            }
            (AssetRole::Video, Some(i)) => {
                let bucket = &mut buckets[i];
                if bucket.video.is_some() {
                    return Err(SyncError::DuplicateVideoAssignment(format!(
                        "Topic \"{}\" already has a video in this request",
                        course.topics[i].title
                    )));
                }
                bucket.video = Some(upload.asset);
            }
            (AssetRole::Doc, Some(i)) => buckets[i].docs.push(upload.asset),
            (AssetRole::Video | AssetRole::Doc, None) if prior.is_none() => {
                return Err(SyncError::InvalidTopicIndex(format!(
                    "Invalid topicIndex {} for file {}. Must be 0-{}",
                    upload.raw_index,
                    upload.asset.name,
                    topic_count.saturating_sub(1)
                )));
            }
            (role, _) => {
                warn!(
                    role = %role,
                    topic_index = %upload.raw_index,
                    file = %upload.asset.name,
                    "Ignoring upload with unhandled role/topic index combination"
                );
                orphans.push(upload.asset.path);
            }
        }
    }

    // --- 2. Match submitted topics against persisted ones ---
    let matches = match prior {
        Some(prior) => match_prior_topics(&course.topics, &prior.topics)?,
        None => vec![None; topic_count],
    };

    // --- 3. Carry over and finalize each topic ---
    let course_id = match target {
        Target::Create { course_id } => course_id,
        Target::Update { prior } => prior.course.id,
    };
    let mut topics = Vec::with_capacity(topic_count);
    for ((draft, bucket), previous) in course.topics.into_iter().zip(buckets).zip(matches) {
        topics.push(finalize_topic(draft, bucket, previous, course_id, now, &mut orphans)?);
    }

    // --- 4. Topics dropped from the submission ---
    let mut removed_topic_ids = Vec::new();
    if let Some(prior) = prior {
        let kept: HashSet<Uuid> = topics.iter().map(|t| t.id).collect();
        for dropped in prior.topics.iter().filter(|t| !kept.contains(&t.id)) {
            removed_topic_ids.push(dropped.id);
            orphans.extend(dropped.asset_paths().map(str::to_string));
        }
    }

    // --- 5. Assemble the course record ---
    let topic_ids = topics.iter().map(|t| t.id).collect();
    let course = match prior {
        None => Course {
            id: course_id,
            title: course.title,
            description: course.description,
            price: course.price,
            instructor_id: course.instructor_id,
            instructor_name: course.instructor_name,
            image: cover.map(|c| c.path),
            topics: topic_ids,
            final_quiz: course.final_quiz,
            status: CourseStatus::Active,
            created_at: now,
            updated_at: now,
        },
        Some(prior) => {
            let image = match cover {
                Some(new_cover) => {
                    if let Some(old) = &prior.course.image {
                        orphans.push(old.clone());
                    }
                    Some(new_cover.path)
                }
                None => prior.course.image.clone(),
            };
            Course {
                title: course.title,
                description: course.description,
                price: course.price,
                instructor_id: course.instructor_id,
                instructor_name: course.instructor_name,
                image,
                topics: topic_ids,
                final_quiz: course.final_quiz.or_else(|| prior.course.final_quiz.clone()),
                updated_at: now,
                ..prior.course.clone()
            }
        }
    };

    let assets_to_delete = unreferenced(orphans, &course, &topics);
    Ok(Reconciliation {
        course,
        topics,
        removed_topic_ids,
        assets_to_delete,
    })
}

/// Pairs each submitted topic with the persisted topic it edits, if any.
///
/// When any submitted topic names an id, matching is by id and unnamed topics
/// are new. Otherwise the k-th submitted topic edits the k-th persisted one.
fn match_prior_topics<'a>(
    submitted: &[ValidTopic],
    persisted: &'a [Topic],
) -> SyncResult<Vec<Option<&'a Topic>>> {
    if !submitted.iter().any(|t| t.id.is_some()) {
        return Ok((0..submitted.len()).map(|i| persisted.get(i)).collect());
    }
    let by_id: HashMap<Uuid, &Topic> = persisted.iter().map(|t| (t.id, t)).collect();
    submitted
        .iter()
        .enumerate()
        .map(|(idx, topic)| match topic.id {
            None => Ok(None),
            Some(id) => by_id.get(&id).copied().map(Some).ok_or_else(|| {
                SyncError::Validation(format!(
                    "Topic {} references unknown topic id {}",
                    idx + 1,
                    id
                ))
            }),
        })
        .collect()
}

fn finalize_topic(
    draft: ValidTopic,
    bucket: TopicBucket,
    previous: Option<&Topic>,
    course_id: Uuid,
    now: DateTime<Utc>,
    orphans: &mut Vec<String>,
) -> SyncResult<Topic> {
    let video = match (bucket.video, previous) {
        (Some(new_video), Some(prev)) => {
            if prev.video != new_video.path {
                orphans.push(prev.video.clone());
            }
            new_video.path
        }
        (Some(new_video), None) => new_video.path,
        (None, Some(prev)) => prev.video.clone(),
        (None, None) => {
            return Err(SyncError::TopicMissingVideo(format!(
                "Topic \"{}\" must include exactly 1 video",
                draft.title
            )))
        }
    };

    let files = if !bucket.docs.is_empty() || draft.replace_files {
        bucket.docs
    } else {
        previous.map(|p| p.files.clone()).unwrap_or_default()
    };
    if let Some(prev) = previous {
        let kept: HashSet<&str> = files.iter().map(|f| f.path.as_str()).collect();
        orphans.extend(
            prev.files
                .iter()
                .filter(|f| !kept.contains(f.path.as_str()))
                .map(|f| f.path.clone()),
        );
    }

    let quiz = draft.quiz.ok_or_else(|| {
        SyncError::TopicMissingQuiz(format!("Topic \"{}\" must include a quiz", draft.title))
    })?;
    if quiz.questions.is_empty() {
        return Err(SyncError::TopicQuizEmpty(format!(
            "Topic \"{}\" quiz must have at least one question",
            draft.title
        )));
    }

    Ok(Topic {
        id: previous.map(|p| p.id).unwrap_or_else(Uuid::new_v4),
        course_id,
        title: draft.title,
        description: draft.description,
        files,
        video,
        quiz,
        created_at: previous.map(|p| p.created_at).unwrap_or(now),
        updated_at: now,
    })
}

/// Drops duplicates and anything the final records still reference.
fn unreferenced(orphans: Vec<String>, course: &Course, topics: &[Topic]) -> Vec<String> {
    let referenced: HashSet<&str> = course
        .image
        .as_deref()
        .into_iter()
        .chain(topics.iter().flat_map(|t| t.asset_paths()))
        .collect();
    let mut seen = HashSet::new();
    orphans
        .into_iter()
        .filter(|p| !referenced.contains(p.as_str()) && seen.insert(p.clone()))
        .collect()
}

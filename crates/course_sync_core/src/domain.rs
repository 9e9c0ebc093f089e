//! crates/course_sync_core/src/domain.rs
//!
//! Defines the persisted records of the course catalog: courses, topics,
//! quizzes and the descriptors of uploaded assets. These are the shapes the
//! document store holds and the shapes returned to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle status of a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    Active,
    Inactive,
}

impl CourseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseStatus::Active => "active",
            CourseStatus::Inactive => "inactive",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(CourseStatus::Active),
            "inactive" => Some(CourseStatus::Inactive),
            _ => None,
        }
    }
}

/// A top-level catalog entry owning an ordered list of topics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub instructor_id: String,
    pub instructor_name: String,
    /// Public path of the cover image, if one was uploaded.
    pub image: Option<String>,
    /// Topic ids in presentation order.
    pub topics: Vec<Uuid>,
    pub final_quiz: Option<Quiz>,
    pub status: CourseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An ordered unit of course content: one video, optional documents, a quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub description: String,
    /// Document assets attached to the topic.
    pub files: Vec<AssetDescriptor>,
    /// Public path of the topic's video.
    pub video: String,
    pub quiz: Quiz,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Topic {
    /// Every asset path this topic references, video first.
    pub fn asset_paths(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.video.as_str()).chain(self.files.iter().map(|f| f.path.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    #[serde(default)]
    pub pass: bool,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub q: String,
    pub options: Vec<String>,
    pub answer: String,
}

/// The logical slot an uploaded file is declared for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetRole {
    Image,
    Video,
    Doc,
    /// Any role string the client sent that we do not recognise.
    Other(String),
}

impl AssetRole {
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "image" => AssetRole::Image,
            "video" => AssetRole::Video,
            "doc" => AssetRole::Doc,
            other => AssetRole::Other(other.to_string()),
        }
    }
}

impl fmt::Display for AssetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetRole::Image => f.write_str("image"),
            AssetRole::Video => f.write_str("video"),
            AssetRole::Doc => f.write_str("doc"),
            AssetRole::Other(s) => f.write_str(s),
        }
    }
}

/// Storage partition of an asset, chosen from its declared media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaClass {
    Image,
    Video,
    Document,
}

impl MediaClass {
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.starts_with("image/") {
            MediaClass::Image
        } else if content_type.starts_with("video/") {
            MediaClass::Video
        } else {
            MediaClass::Document
        }
    }

    /// Subdirectory name under the upload root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            MediaClass::Image => "images",
            MediaClass::Video => "videos",
            MediaClass::Document => "docs",
        }
    }

    pub fn from_dir_name(name: &str) -> Option<Self> {
        match name {
            "images" => Some(MediaClass::Image),
            "videos" => Some(MediaClass::Video),
            "docs" => Some(MediaClass::Document),
            _ => None,
        }
    }
}

/// Metadata of a persisted asset file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDescriptor {
    /// Original file name as uploaded.
    pub name: String,
    /// Publicly resolvable retrieval path.
    pub path: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// A course together with its topic records, in course order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseWithTopics {
    pub course: Course,
    pub topics: Vec<Topic>,
}

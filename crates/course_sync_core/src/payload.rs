//! crates/course_sync_core/src/payload.rs
//!
//! The request decoder. Turns the raw parts of a multipart course submission
//! into a typed course description plus a list of files, each bound to the
//! role and topic slot the client declared for it.
//!
//! Decoding is pure: nothing is written to the asset store here.

use serde::Deserialize;
use uuid::Uuid;

use crate::domain::AssetRole;
use crate::error::{SyncError, SyncResult};
use crate::ports::IncomingFile;

/// Media types accepted for upload.
pub const ALLOWED_MEDIA_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/avif",
    "video/mp4",
    "video/avi",
    "video/mov",
    "video/wmv",
    "video/flv",
    "video/webm",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
];

/// Topic index reserved for the course cover image.
pub const COVER_IMAGE_INDEX: i64 = -1;

//=========================================================================================
// Raw Input
//=========================================================================================

/// The multipart fields of a create or update request, as collected by the web layer.
#[derive(Debug, Clone, Default)]
pub struct RawCourseRequest {
    /// The `data` text field.
    pub data: Option<String>,
    pub files: Vec<IncomingFile>,
    /// The `fileRole` side-channel values, one per file.
    pub file_roles: Vec<String>,
    /// The `topicIndex` side-channel values, one per file.
    pub topic_indices: Vec<String>,
    /// The typed `fileMeta` field. Takes precedence over the parallel arrays.
    pub file_meta: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_file_bytes: u64,
    pub max_files: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: 100 * 1024 * 1024,
            max_files: 20,
        }
    }
}

//=========================================================================================
// Course Description
//=========================================================================================

/// The JSON course description. Every field is optional at this stage so the
/// validator can report exactly which one is missing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDescription {
    pub title: Option<String>,
    pub description: Option<String>,
    /// A number or a numeric string.
    pub price: Option<serde_json::Value>,
    pub instructor_id: Option<String>,
    pub instructor_name: Option<String>,
    pub topics: Option<Vec<TopicDraft>>,
    pub final_quiz: Option<QuizDraft>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicDraft {
    /// Stable id of an existing topic this entry edits.
    pub id: Option<Uuid>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub quiz: Option<QuizDraft>,
    /// When set, the topic's documents become exactly the ones uploaded in
    /// this request, even if that is none.
    #[serde(default)]
    pub replace_files: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuizDraft {
    pub pass: Option<bool>,
    pub questions: Option<Vec<QuestionDraft>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionDraft {
    pub q: Option<String>,
    pub options: Option<Vec<String>>,
    pub answer: Option<String>,
}

impl CourseDescription {
    pub fn topics(&self) -> &[TopicDraft] {
        self.topics.as_deref().unwrap_or(&[])
    }
}

//=========================================================================================
// Decoded Output
//=========================================================================================

/// An uploaded file bound to the slot the client declared for it.
#[derive(Debug, Clone)]
pub struct DeclaredFile {
    pub file: IncomingFile,
    pub role: AssetRole,
    /// `None` when the declared index was not an integer.
    pub topic_index: Option<i64>,
    /// The index exactly as the client sent it, for error messages.
    pub raw_index: String,
}

#[derive(Debug, Clone)]
pub struct DecodedRequest {
    pub course: CourseDescription,
    pub files: Vec<DeclaredFile>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileMetaEntry {
    role: String,
    topic_index: serde_json::Value,
}

/// Decodes a raw submission.
///
/// Fails with `MalformedPayload` when the course JSON is missing or invalid and
/// with `MetadataMismatch` when the per-file metadata does not line up with the
/// uploaded files. Upload policy (media type, size, count) is enforced last.
pub fn decode(raw: RawCourseRequest, limits: &UploadLimits) -> SyncResult<DecodedRequest> {
    let data = raw
        .data
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| SyncError::MalformedPayload("Missing course data in request".to_string()))?;
    let course: CourseDescription = serde_json::from_str(data)
        .map_err(|_| SyncError::MalformedPayload("Invalid JSON data in request".to_string()))?;

    let slots = match raw.file_meta.as_deref() {
        Some(meta) => typed_slots(meta, raw.files.len())?,
        None => parallel_slots(raw.file_roles, raw.topic_indices, raw.files.len())?,
    };

    if raw.files.len() > limits.max_files {
        return Err(SyncError::TooManyFiles(format!(
            "Too many files. Maximum is {} files per request.",
            limits.max_files
        )));
    }

    let mut files = Vec::with_capacity(raw.files.len());
    for (file, (role, raw_index)) in raw.files.into_iter().zip(slots) {
        check_upload_policy(&file, limits)?;
        files.push(DeclaredFile {
            topic_index: raw_index.trim().parse::<i64>().ok(),
            role: AssetRole::parse(&role),
            raw_index,
            file,
        });
    }

    Ok(DecodedRequest { course, files })
}

fn parallel_slots(
    roles: Vec<String>,
    indices: Vec<String>,
    file_count: usize,
) -> SyncResult<Vec<(String, String)>> {
    if roles.len() != file_count || indices.len() != file_count {
        return Err(SyncError::MetadataMismatch(format!(
            "Metadata mismatch: {} files, {} types, {} indices",
            file_count,
            roles.len(),
            indices.len()
        )));
    }
    Ok(roles.into_iter().zip(indices).collect())
}

fn typed_slots(meta: &str, file_count: usize) -> SyncResult<Vec<(String, String)>> {
    let entries: Vec<FileMetaEntry> = serde_json::from_str(meta)
        .map_err(|_| SyncError::MalformedPayload("Invalid JSON in fileMeta".to_string()))?;
    if entries.len() != file_count {
        return Err(SyncError::MetadataMismatch(format!(
            "Metadata mismatch: {} files, {} metadata entries",
            file_count,
            entries.len()
        )));
    }
    Ok(entries
        .into_iter()
        .map(|e| {
            let index = match e.topic_index {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (e.role, index)
        })
        .collect())
}

fn check_upload_policy(file: &IncomingFile, limits: &UploadLimits) -> SyncResult<()> {
    if !ALLOWED_MEDIA_TYPES.contains(&file.content_type.as_str()) {
        return Err(SyncError::UnsupportedMediaType(format!(
            "File type {} is not allowed",
            file.content_type
        )));
    }
    if file.bytes.len() as u64 > limits.max_file_bytes {
        return Err(SyncError::FileTooLarge(format!(
            "File too large. Maximum size is {}MB.",
            limits.max_file_bytes / (1024 * 1024)
        )));
    }
    Ok(())
}

//! services/api/src/web/multipart.rs
//!
//! Collects the fields of a course submission from a multipart body.

use axum::extract::multipart::{Field, Multipart, MultipartError};
use course_sync_core::payload::RawCourseRequest;
use course_sync_core::ports::IncomingFile;
use tracing::debug;

/// Reads every part of the body into a `RawCourseRequest`.
///
/// Side-channel fields may be sent under the current names (`fileRole`,
/// `topicIndex`) or the legacy ones (`fileTypes`, `topicIndices`), with or
/// without a trailing `[]`.
pub async fn read_course_request(mut multipart: Multipart) -> Result<RawCourseRequest, MultipartError> {
    let mut raw = RawCourseRequest::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").trim_end_matches("[]").to_string();
        match name.as_str() {
            "data" => raw.data = Some(field.text().await?),
            "fileMeta" => raw.file_meta = Some(field.text().await?),
            "fileRole" | "fileTypes" => raw.file_roles.push(field.text().await?),
            "topicIndex" | "topicIndices" => raw.topic_indices.push(field.text().await?),
            "files" | "file" => raw.files.push(read_file(field).await?),
            other => debug!(field = %other, "Ignoring unexpected multipart field"),
        }
    }

    Ok(raw)
}

async fn read_file(field: Field<'_>) -> Result<IncomingFile, MultipartError> {
    let original_name = field.file_name().unwrap_or("upload").to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let bytes = field.bytes().await?;
    Ok(IncomingFile {
        original_name,
        content_type,
        bytes,
    })
}

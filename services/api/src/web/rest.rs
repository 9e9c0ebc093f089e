//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI document.

use crate::web::{multipart::read_course_request, state::AppState};
use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use course_sync_core::{CourseWithTopics, SyncError};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_course_handler,
        update_course_handler,
        delete_course_handler,
        get_course_handler,
        list_instructor_courses_handler,
    ),
    components(
        schemas(CourseEnvelope, MessageResponse, ErrorBody)
    ),
    tags(
        (name = "Course Catalog API", description = "Create, edit and remove courses together with their uploaded media.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The response payload sent after a course was created or updated.
#[derive(Serialize, ToSchema)]
pub struct CourseEnvelope {
    success: bool,
    message: String,
    /// `{ course, topics }`
    #[schema(value_type = Object)]
    data: CourseWithTopics,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    success: bool,
    message: String,
}

/// The body of every failed request.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    success: bool,
    message: String,
    /// Diagnostic detail; omitted in production.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// An error on its way to becoming an HTTP response.
#[derive(Debug)]
pub struct ErrorResponse {
    status: StatusCode,
    message: String,
    detail: Option<String>,
}

impl ErrorResponse {
    fn from_sync(err: SyncError, state: &AppState) -> Self {
        let status = if err.is_not_found() {
            StatusCode::NOT_FOUND
        } else if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        if status.is_server_error() {
            error!(error = ?err, "Request failed");
        } else {
            warn!(status = %status, error = %err, "Request rejected");
        }
        let message = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            err.to_string()
        };
        Self {
            status,
            message,
            detail: (!state.config.is_production()).then(|| format!("{:?}", err)),
        }
    }

    fn from_multipart(err: MultipartError, state: &AppState) -> Self {
        warn!(error = %err, "Failed to read multipart body");
        Self {
            status: err.status(),
            message: format!("Failed to read multipart data: {}", err.body_text()),
            detail: (!state.config.is_production()).then(|| format!("{:?}", err)),
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            message: self.message,
            error: self.detail,
        };
        (self.status, Json(body)).into_response()
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Create a course from metadata plus uploaded media.
///
/// Accepts multipart/form-data with a `data` JSON field, any number of `files`
/// parts, and one `fileRole` and `topicIndex` entry per file.
#[utoipa::path(
    post,
    path = "/courses",
    request_body(content_type = "multipart/form-data", description = "Course JSON in `data`, media in `files`."),
    responses(
        (status = 201, description = "Course created successfully", body = CourseEnvelope),
        (status = 400, description = "Invalid course data or uploads", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn create_course_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ErrorResponse> {
    let raw = read_course_request(multipart)
        .await
        .map_err(|e| ErrorResponse::from_multipart(e, &state))?;
    let created = state
        .sync
        .create_course(raw)
        .await
        .map_err(|e| ErrorResponse::from_sync(e, &state))?;

    Ok((
        StatusCode::CREATED,
        Json(CourseEnvelope {
            success: true,
            message: "Course created successfully".to_string(),
            data: created,
        }),
    ))
}

/// Update a course. Topics and assets not resubmitted are carried over.
#[utoipa::path(
    put,
    path = "/courses/{id}",
    request_body(content_type = "multipart/form-data", description = "Same shape as course creation."),
    responses(
        (status = 200, description = "Course updated successfully", body = CourseEnvelope),
        (status = 400, description = "Invalid course data or uploads", body = ErrorBody),
        (status = 404, description = "Course not found", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    ),
    params(
        ("id" = Uuid, Path, description = "The course id.")
    )
)]
pub async fn update_course_handler(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ErrorResponse> {
    let raw = read_course_request(multipart)
        .await
        .map_err(|e| ErrorResponse::from_multipart(e, &state))?;
    let updated = state
        .sync
        .update_course(course_id, raw)
        .await
        .map_err(|e| ErrorResponse::from_sync(e, &state))?;

    Ok(Json(CourseEnvelope {
        success: true,
        message: "Course updated successfully".to_string(),
        data: updated,
    }))
}

/// Delete a course, its topics and every file they reference.
#[utoipa::path(
    delete,
    path = "/courses/{id}",
    responses(
        (status = 200, description = "Course deleted", body = MessageResponse),
        (status = 404, description = "Course not found", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    ),
    params(
        ("id" = Uuid, Path, description = "The course id.")
    )
)]
pub async fn delete_course_handler(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, ErrorResponse> {
    state
        .sync
        .delete_course(course_id)
        .await
        .map_err(|e| ErrorResponse::from_sync(e, &state))?;

    Ok(Json(MessageResponse {
        success: true,
        message: "Course and associated files deleted successfully".to_string(),
    }))
}

/// Fetch a course and its topics in order.
#[utoipa::path(
    get,
    path = "/courses/{id}",
    responses(
        (status = 200, description = "The course and its topics"),
        (status = 404, description = "Course not found", body = ErrorBody)
    ),
    params(
        ("id" = Uuid, Path, description = "The course id.")
    )
)]
pub async fn get_course_handler(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<Uuid>,
) -> Result<Json<CourseWithTopics>, ErrorResponse> {
    state
        .sync
        .get_course(course_id)
        .await
        .map(Json)
        .map_err(|e| ErrorResponse::from_sync(e, &state))
}

/// List every course owned by an instructor, each with its topics.
#[utoipa::path(
    get,
    path = "/courses/instructor/{instructor_id}",
    responses(
        (status = 200, description = "The instructor's courses")
    ),
    params(
        ("instructor_id" = String, Path, description = "The instructor's id.")
    )
)]
pub async fn list_instructor_courses_handler(
    State(state): State<Arc<AppState>>,
    Path(instructor_id): Path<String>,
) -> Result<Json<Vec<CourseWithTopics>>, ErrorResponse> {
    state
        .sync
        .courses_by_instructor(&instructor_id)
        .await
        .map(Json)
        .map_err(|e| ErrorResponse::from_sync(e, &state))
}

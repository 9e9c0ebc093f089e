pub mod multipart;
pub mod rest;
pub mod state;

use crate::web::{
    rest::{
        create_course_handler, delete_course_handler, get_course_handler,
        list_instructor_courses_handler, update_course_handler, ApiDoc,
    },
    state::AppState,
};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Builds the complete application router: the course API, the uploaded
/// asset tree under `/uploads`, and the Swagger UI.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let upload_dir = app_state.config.upload_dir.clone();
    let body_limit = app_state.config.body_limit();

    let api_router = Router::new()
        .route("/courses", post(create_course_handler))
        .route(
            "/courses/{id}",
            get(get_course_handler)
                .put(update_course_handler)
                .delete(delete_course_handler),
        )
        .route(
            "/courses/instructor/{instructor_id}",
            get(list_instructor_courses_handler),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(app_state);

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(api_router)
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
}

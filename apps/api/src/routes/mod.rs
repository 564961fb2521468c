pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, put},
    Router,
};

use crate::state::AppState;
use crate::vault::handlers;

/// Room for the text fields and multipart framing on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES)
        .unwrap_or(usize::MAX);

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/shell", get(handlers::handle_get_shell))
        .route("/api/v1/shell/tab", put(handlers::handle_set_tab))
        .route("/api/v1/form", get(handlers::handle_get_form))
        .route(
            "/api/v1/resumes",
            get(handlers::handle_list_resumes).post(handlers::handle_submit_resume),
        )
        .route("/api/v1/resumes/:id", delete(handlers::handle_delete_resume))
        .route(
            "/api/v1/resumes/:id/preview",
            get(handlers::handle_preview_resume),
        )
        .route(
            "/api/v1/notifications",
            get(handlers::handle_list_notifications),
        )
        .route(
            "/api/v1/notifications/:id",
            delete(handlers::handle_dismiss_notification),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

//! Axum route handlers for the vault API.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::ResumeRecord;
use crate::state::AppState;
use crate::vault::form::{Field, FormView};
use crate::vault::notify::Notification;
use crate::vault::picker::CandidateFile;
use crate::vault::shell::{ShellView, Tab};
use crate::vault::table::{Preview, TableView};

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TabRequest {
    pub tab: Tab,
}

#[derive(Debug, Deserialize)]
pub struct ViewQuery {
    /// Viewer's offset from UTC, in minutes east.
    pub tz_offset_minutes: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub record: ResumeRecord,
    pub active_tab: Tab,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/shell
pub async fn handle_get_shell(State(state): State<AppState>) -> Json<ShellView> {
    Json(state.shell.view())
}

/// PUT /api/v1/shell/tab
pub async fn handle_set_tab(
    State(state): State<AppState>,
    Json(req): Json<TabRequest>,
) -> Json<ShellView> {
    state.shell.set_active_tab(req.tab);
    Json(state.shell.view())
}

/// GET /api/v1/form
pub async fn handle_get_form(State(state): State<AppState>) -> Json<FormView> {
    Json(state.new_form().view())
}

/// GET /api/v1/resumes
pub async fn handle_list_resumes(
    State(state): State<AppState>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<TableView>, AppError> {
    let offset = viewer_offset(query.tz_offset_minutes)?;
    Ok(Json(state.table.view(&offset)))
}

/// POST /api/v1/resumes (multipart: name, email, phone, resume)
pub async fn handle_submit_resume(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    let form = state.new_form();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed form data: {e}")))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "name" | "email" | "phone" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Unreadable field '{field_name}': {e}")))?;
                let target = match field_name.as_str() {
                    "name" => Field::Name,
                    "email" => Field::Email,
                    _ => Field::Phone,
                };
                form.set_field(target, value);
            }
            "resume" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(String::from);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Unreadable resume upload: {e}")))?;
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                let mut file = CandidateFile::new(file_name, bytes);
                if let Some(ct) = content_type {
                    file = file.with_content_type(ct);
                }
                form.select_file(file)?;
            }
            other => tracing::debug!("Ignoring unknown form field '{other}'"),
        }
    }

    let record = form.submit().await?;
    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            record,
            active_tab: state.shell.active_tab(),
        }),
    ))
}

/// DELETE /api/v1/resumes/:id?confirm=true
///
/// Returns 202: the row leaves the table when the change feed reports the delete.
pub async fn handle_delete_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<DeleteQuery>,
) -> Result<StatusCode, AppError> {
    let confirmation = state
        .table
        .request_delete(id)
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))?;

    if !query.confirm {
        confirmation.cancel();
        return Err(AppError::Validation(
            "Deleting a resume cannot be undone; repeat the request with confirm=true".to_string(),
        ));
    }

    confirmation.confirm().await?;
    Ok(StatusCode::ACCEPTED)
}

/// GET /api/v1/resumes/:id/preview
pub async fn handle_preview_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Preview>, AppError> {
    state
        .table
        .preview(id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))
}

/// GET /api/v1/notifications
pub async fn handle_list_notifications(State(state): State<AppState>) -> Json<Vec<Notification>> {
    Json(state.notifier.recent())
}

/// DELETE /api/v1/notifications/:id
pub async fn handle_dismiss_notification(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, AppError> {
    if state.notifier.dismiss(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Notification {id} not found")))
    }
}

fn viewer_offset(minutes: Option<i32>) -> Result<FixedOffset, AppError> {
    let minutes = minutes.unwrap_or(0);
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| AppError::Validation(format!("Invalid tz_offset_minutes: {minutes}")))
}

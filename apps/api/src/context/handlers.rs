use axum::{
    extract::{multipart::Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::context::ingest::{self, IngestFailure, RawFile};
use crate::context::models::{AttachmentSource, ProvenanceRole};
use crate::errors::AppError;
use crate::generation::handlers::find_workspace;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub accepted: Vec<AttachmentSource>,
    pub failures: Vec<IngestFailure>,
    pub attachment_bytes: u64,
    pub limit_bytes: u64,
}

/// POST /api/v1/workspaces/:id/attachments
///
/// Multipart upload. Each part's field name is the provenance role of the file
/// (`style_model`, `data_content`, ...). The whole batch is rejected when it
/// would push the workspace over its ceiling.
pub async fn handle_upload_attachments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let workspace = find_workspace(&state, id)?;
    let (profile, snapshot) = {
        let ws = workspace.lock();
        (ws.profile.clone(), ws.attachments.clone())
    };
    let limit_bytes = profile.attachment_limit(state.config.attachment_limit_bytes);

    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("invalid multipart body: {e}")))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        let role: ProvenanceRole = field_name.parse().map_err(AppError::Validation)?;
        if !role.accepts_attachments() || !profile.roles.contains(role) {
            return Err(AppError::Validation(format!(
                "the '{}' tool does not take {role} attachments",
                profile.id
            )));
        }

        let file_name = field.file_name().unwrap_or("anexo").to_string();
        let media_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("could not read '{file_name}': {e}")))?;
        files.push(RawFile::from_bytes(role, file_name, media_type, bytes));
    }

    if files.is_empty() {
        return Err(AppError::Validation("no files were uploaded".to_string()));
    }

    let outcome = ingest::ingest(files, &snapshot, limit_bytes).await?;

    let mut ws = workspace.lock();
    let accepted = ingest::commit(&mut ws.attachments, outcome.accepted, limit_bytes)?;
    info!(
        "Workspace {} ingested {} attachment(s), {} failed",
        id,
        accepted.len(),
        outcome.failures.len()
    );

    Ok(Json(UploadResponse {
        accepted: accepted.iter().map(|a| a.as_ref().clone()).collect(),
        failures: outcome.failures,
        attachment_bytes: ws.attachment_bytes(),
        limit_bytes,
    }))
}

/// DELETE /api/v1/workspaces/:id/attachments/:attachment_id
pub async fn handle_remove_attachment(
    State(state): State<AppState>,
    Path((id, attachment_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    let workspace = find_workspace(&state, id)?;
    let removed = ingest::remove_attachment(&mut workspace.lock().attachments, attachment_id);
    match removed {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err(AppError::NotFound(format!(
            "Attachment {attachment_id} not found"
        ))),
    }
}

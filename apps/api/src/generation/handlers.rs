//! Axum route handlers for tools, workspaces and the generation pipeline.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::models::ProvenanceRole;
use crate::errors::AppError;
use crate::generation::engine::{self, DraftInput};
use crate::generation::profiles::ToolProfile;
use crate::generation::session::SessionView;
use crate::generation::workspace::{SharedWorkspace, WorkspaceView};
use crate::llm_client::GenerationResult;
use crate::roster::handlers::ensure_valid_day;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateWorkspaceRequest {
    pub tool: String,
}

#[derive(Debug, Serialize)]
pub struct CreateWorkspaceResponse {
    pub workspace_id: Uuid,
    pub tool: &'static str,
}

/// Reference to a duty-roster assignment whose holder is named in the draft.
#[derive(Debug, Deserialize)]
pub struct AssignmentRef {
    pub position: String,
    pub day: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct DraftRequest {
    /// Free text per provenance role.
    #[serde(default)]
    pub text: BTreeMap<ProvenanceRole, String>,
    /// Form values for the tool's labelled case fields.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub instruction: String,
    pub assignment: Option<AssignmentRef>,
}

#[derive(Debug, Deserialize)]
pub struct RefineRequest {
    pub instruction: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/tools
pub async fn handle_list_tools(State(state): State<AppState>) -> Json<Vec<ToolProfile>> {
    Json(state.catalog.iter().map(|p| p.as_ref().clone()).collect())
}

/// POST /api/v1/workspaces
pub async fn handle_create_workspace(
    State(state): State<AppState>,
    Json(request): Json<CreateWorkspaceRequest>,
) -> Result<(StatusCode, Json<CreateWorkspaceResponse>), AppError> {
    let profile = state
        .catalog
        .get(&request.tool)
        .ok_or_else(|| AppError::NotFound(format!("Unknown tool '{}'", request.tool)))?;
    let tool = profile.id;
    let workspace_id = state.workspaces.create(profile);

    Ok((
        StatusCode::CREATED,
        Json(CreateWorkspaceResponse { workspace_id, tool }),
    ))
}

/// GET /api/v1/workspaces/:id
pub async fn handle_get_workspace(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkspaceView>, AppError> {
    let workspace = find_workspace(&state, id)?;
    let view = workspace.lock().view();
    Ok(Json(view))
}

/// DELETE /api/v1/workspaces/:id
///
/// Abandons the workspace. Any in-flight call is cancelled and its late
/// response is never applied.
pub async fn handle_delete_workspace(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.workspaces.remove(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Workspace {id} not found")))
    }
}

/// POST /api/v1/workspaces/:id/generate
pub async fn handle_generate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<DraftRequest>,
) -> Result<Json<SessionView>, AppError> {
    let workspace = find_workspace(&state, id)?;
    let input = draft_input(&state, &workspace, request)?;
    let view = engine::start(state.generator.as_ref(), &workspace, input).await?;
    Ok(Json(view))
}

/// POST /api/v1/workspaces/:id/refine
pub async fn handle_refine(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RefineRequest>,
) -> Result<Json<SessionView>, AppError> {
    let workspace = find_workspace(&state, id)?;
    let view = engine::refine(state.generator.as_ref(), &workspace, &request.instruction).await?;
    Ok(Json(view))
}

/// POST /api/v1/workspaces/:id/extract
pub async fn handle_extract(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<DraftRequest>,
) -> Result<Json<GenerationResult>, AppError> {
    let workspace = find_workspace(&state, id)?;
    let input = draft_input(&state, &workspace, request)?;
    let result = engine::extract(state.generator.as_ref(), &workspace, input).await?;
    Ok(Json(result))
}

pub(crate) fn find_workspace(state: &AppState, id: Uuid) -> Result<SharedWorkspace, AppError> {
    state
        .workspaces
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("Workspace {id} not found")))
}

/// Validates a draft request against the workspace's tool and folds form
/// fields and the roster assignment into the CASE_FIELDS text.
fn draft_input(
    state: &AppState,
    workspace: &SharedWorkspace,
    request: DraftRequest,
) -> Result<DraftInput, AppError> {
    let profile = workspace.lock().profile.clone();

    if let Some(role) = request.text.keys().find(|role| !profile.roles.contains(**role)) {
        return Err(AppError::Validation(format!(
            "role {role} is not used by the '{}' tool",
            profile.id
        )));
    }

    let mut text_fields = request.text;
    let mut case_lines: Vec<String> = Vec::new();

    if let Some(rendered) = profile
        .render_case_fields(&request.fields)
        .map_err(AppError::Validation)?
    {
        case_lines.push(rendered);
    }

    if let Some(assignment) = &request.assignment {
        ensure_valid_day(assignment.day)?;
        let assignee = state
            .roster
            .resolve_assignee(&assignment.position, assignment.day)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "No assignee for position '{}'",
                    assignment.position
                ))
            })?;
        case_lines.push(assignee.case_field_line());
    }

    if let Some(typed) = text_fields.remove(&ProvenanceRole::CaseFields) {
        if !typed.trim().is_empty() {
            case_lines.push(typed);
        }
    }
    if !case_lines.is_empty() {
        text_fields.insert(ProvenanceRole::CaseFields, case_lines.join("\n"));
    }

    Ok(DraftInput {
        text_fields,
        instruction: request.instruction,
    })
}

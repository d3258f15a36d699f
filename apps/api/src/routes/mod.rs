pub mod health;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::context::handlers as context;
use crate::export::handlers as export;
use crate::generation::handlers as generation;
use crate::roster::handlers as roster;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/tools", get(generation::handle_list_tools))
        // Workspaces
        .route("/api/v1/workspaces", post(generation::handle_create_workspace))
        .route(
            "/api/v1/workspaces/:id",
            get(generation::handle_get_workspace).delete(generation::handle_delete_workspace),
        )
        .route(
            "/api/v1/workspaces/:id/attachments",
            post(context::handle_upload_attachments),
        )
        .route(
            "/api/v1/workspaces/:id/attachments/:attachment_id",
            delete(context::handle_remove_attachment),
        )
        .route(
            "/api/v1/workspaces/:id/generate",
            post(generation::handle_generate),
        )
        .route("/api/v1/workspaces/:id/refine", post(generation::handle_refine))
        .route("/api/v1/workspaces/:id/extract", post(generation::handle_extract))
        // Export
        .route("/api/v1/workspaces/:id/print", get(export::handle_print))
        .route(
            "/api/v1/workspaces/:id/clipboard",
            get(export::handle_clipboard),
        )
        .route("/api/v1/documents/merge", post(export::handle_merge))
        .route("/api/v1/mail-merge", post(export::handle_mail_merge))
        // Duty roster
        .route(
            "/api/v1/roster/:position/:day",
            get(roster::handle_resolve_assignee),
        )
        .with_state(state)
}

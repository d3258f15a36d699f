use std::sync::Arc;

use crate::config::Config;
use crate::generation::profiles::ToolCatalog;
use crate::generation::workspace::WorkspaceRegistry;
use crate::llm_client::GenerationService;
use crate::roster::AssigneeResolver;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Generation backend. Gemini in production, scripted in tests.
    pub generator: Arc<dyn GenerationService>,
    pub workspaces: WorkspaceRegistry,
    pub catalog: Arc<ToolCatalog>,
    pub roster: Arc<dyn AssigneeResolver>,
    pub config: Config,
}

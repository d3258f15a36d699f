// Tool profiles, workspaces and the refinement session.
// All service calls go through llm_client::GenerationService.

pub mod cancel;
pub mod engine;
pub mod handlers;
pub mod profiles;
pub mod prompts;
pub mod session;
pub mod workspace;

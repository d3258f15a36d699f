//! Orchestration of one workspace call: compose, hand a ticket to the session,
//! await the generation service with the workspace unlocked, then apply.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::context::composer::{compose, ComposeInput};
use crate::context::models::{GenerationMode, ProvenanceRole};
use crate::errors::AppError;
use crate::generation::cancel::CancelToken;
use crate::generation::session::SessionView;
use crate::generation::workspace::SharedWorkspace;
use crate::llm_client::{
    GenerationError, GenerationOutput, GenerationRequest, GenerationResult, GenerationService,
};

/// Operator input for a first generation or an extraction.
#[derive(Debug, Default, Clone)]
pub struct DraftInput {
    /// Free text per role, e.g. pasted facts under DATA_CONTENT.
    pub text_fields: BTreeMap<ProvenanceRole, String>,
    /// Empty means the tool's default instruction.
    pub instruction: String,
}

/// Races the service call against the workspace's cancel token.
async fn run_cancellable(
    generator: &dyn GenerationService,
    request: &GenerationRequest,
    cancel: &CancelToken,
) -> Result<GenerationOutput, GenerationError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(GenerationError::Cancelled),
        result = generator.generate(request) => result,
    }
}

enum Ticket {
    Session { generation_id: u64, call_id: u64 },
    Extraction(u64),
}

/// Releases a ticket when the awaiting caller is dropped before completing it,
/// e.g. when the client disconnects and axum drops the handler future.
struct TicketGuard<'a> {
    workspace: &'a SharedWorkspace,
    ticket: Ticket,
    armed: bool,
}

impl<'a> TicketGuard<'a> {
    fn new(workspace: &'a SharedWorkspace, ticket: Ticket) -> Self {
        Self {
            workspace,
            ticket,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for TicketGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut ws = self.workspace.lock();
        let released = match self.ticket {
            Ticket::Session {
                generation_id,
                call_id,
            } => ws.session.abort(generation_id, call_id),
            Ticket::Extraction(call_id) => ws.extraction.cancel_if(call_id),
        };
        if released {
            warn!("Workspace {} released a call its caller abandoned", ws.id);
        }
    }
}

fn into_text(result: Result<GenerationOutput, GenerationError>) -> Result<String, GenerationError> {
    match result? {
        GenerationOutput::Text(text) => Ok(text),
        GenerationOutput::Structured(fields) => {
            serde_json::to_string_pretty(&fields).map_err(|_| GenerationError::EmptyResult)
        }
    }
}

/// First generation of a workspace: `RefinementSession.start`.
pub async fn start(
    generator: &dyn GenerationService,
    workspace: &SharedWorkspace,
    input: DraftInput,
) -> Result<SessionView, AppError> {
    let (call, request, cancel) = {
        let mut ws = workspace.lock();
        let profile = ws.profile.clone();
        if profile.mode != GenerationMode::Generation {
            return Err(AppError::Validation(format!(
                "tool '{}' only supports extraction",
                profile.id
            )));
        }

        let instruction = effective_instruction(&input.instruction, profile.default_instruction);
        let segments = compose(&ComposeInput {
            schema: &profile.roles,
            attachments: &ws.attachments,
            text_fields: &input.text_fields,
            instruction,
            mode: GenerationMode::Generation,
            extraction_schema: None,
        });

        let call = ws.session.begin_start(segments)?;
        let request = profile.request(call.segments.clone());
        info!(
            "Workspace {} generation {} started ({} segments)",
            ws.id,
            call.generation_id,
            call.segments.len()
        );
        (call, request, ws.cancel_token())
    };

    let guard = TicketGuard::new(
        workspace,
        Ticket::Session {
            generation_id: call.generation_id,
            call_id: call.call_id,
        },
    );
    let result = run_cancellable(generator, &request, &cancel).await;
    if matches!(result, Err(GenerationError::Cancelled)) {
        warn!("Generation {} cancelled", call.generation_id);
        return Err(GenerationError::Cancelled.into());
    }
    let result = into_text(result);

    guard.disarm();
    let mut ws = workspace.lock();
    ws.session.complete(call, result.clone())?;
    result?;
    Ok(ws.session.view())
}

/// Refinement of the current output: `RefinementSession.refine`.
pub async fn refine(
    generator: &dyn GenerationService,
    workspace: &SharedWorkspace,
    instruction: &str,
) -> Result<SessionView, AppError> {
    let (call, request, cancel) = {
        let mut ws = workspace.lock();
        let call = ws.session.begin_refine(instruction)?;
        let request = ws.profile.request(call.segments.clone());
        info!(
            "Workspace {} refinement requested (generation {}, call {})",
            ws.id, call.generation_id, call.call_id
        );
        (call, request, ws.cancel_token())
    };

    let guard = TicketGuard::new(
        workspace,
        Ticket::Session {
            generation_id: call.generation_id,
            call_id: call.call_id,
        },
    );
    let result = run_cancellable(generator, &request, &cancel).await;
    if matches!(result, Err(GenerationError::Cancelled)) {
        warn!("Refinement of generation {} cancelled", call.generation_id);
        return Err(GenerationError::Cancelled.into());
    }
    let result = into_text(result);

    guard.disarm();
    let mut ws = workspace.lock();
    ws.session.complete(call, result.clone())?;
    result?;
    Ok(ws.session.view())
}

/// Schema-constrained extraction. Independent of the refinement session.
pub async fn extract(
    generator: &dyn GenerationService,
    workspace: &SharedWorkspace,
    input: DraftInput,
) -> Result<GenerationResult, AppError> {
    let (call_id, request, cancel) = {
        let mut ws = workspace.lock();
        let profile = ws.profile.clone();
        let schema = match (&profile.mode, &profile.extraction_schema) {
            (GenerationMode::Extraction, Some(schema)) => schema,
            _ => {
                return Err(AppError::Validation(format!(
                    "tool '{}' does not support extraction",
                    profile.id
                )))
            }
        };

        let task = effective_instruction(&input.instruction, profile.default_instruction);
        let segments = compose(&ComposeInput {
            schema: &profile.roles,
            attachments: &ws.attachments,
            text_fields: &input.text_fields,
            instruction: "",
            mode: GenerationMode::Extraction,
            extraction_schema: Some(schema),
        });

        let call_id = ws.extraction.begin()?;
        let request = profile.extraction_request(segments, task);
        (call_id, request, ws.cancel_token())
    };

    let guard = TicketGuard::new(workspace, Ticket::Extraction(call_id));
    let result = run_cancellable(generator, &request, &cancel).await;
    if matches!(result, Err(GenerationError::Cancelled)) {
        return Err(GenerationError::Cancelled.into());
    }

    let view = GenerationResult::from(&result);
    guard.disarm();
    workspace.lock().extraction.complete(call_id, view.clone())?;
    result?;
    Ok(view)
}

fn effective_instruction<'a>(given: &'a str, default: &'a str) -> &'a str {
    if given.trim().is_empty() {
        default
    } else {
        given
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::context::models::{AttachmentSource, Segment};
    use crate::generation::profiles::ToolCatalog;
    use crate::generation::session::{SessionError, SessionStatus};
    use crate::generation::workspace::WorkspaceRegistry;
    use crate::llm_client::ResultStatus;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;
    use uuid::Uuid;

    /// Scripted generation service: replies in order, optionally held at a gate.
    #[derive(Default)]
    pub(crate) struct ScriptedGenerator {
        replies: Mutex<VecDeque<Result<GenerationOutput, GenerationError>>>,
        pub(crate) requests: Mutex<Vec<GenerationRequest>>,
        pub(crate) calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedGenerator {
        pub(crate) fn replying(
            replies: Vec<Result<GenerationOutput, GenerationError>>,
        ) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                ..Default::default()
            }
        }

        pub(crate) fn gated(
            replies: Vec<Result<GenerationOutput, GenerationError>>,
            gate: Arc<Notify>,
        ) -> Self {
            Self {
                gate: Some(gate),
                ..Self::replying(replies)
            }
        }
    }

    #[async_trait]
    impl GenerationService for ScriptedGenerator {
        async fn generate(
            &self,
            request: &GenerationRequest,
        ) -> Result<GenerationOutput, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().push(request.clone());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.replies
                .lock()
                .pop_front()
                .unwrap_or(Err(GenerationError::EmptyResult))
        }
    }

    pub(crate) fn text(value: &str) -> Result<GenerationOutput, GenerationError> {
        Ok(GenerationOutput::Text(value.to_string()))
    }

    fn workspace(tool: &str) -> (WorkspaceRegistry, Uuid, SharedWorkspace) {
        let registry = WorkspaceRegistry::default();
        let id = registry.create(ToolCatalog::builtin().get(tool).unwrap());
        let ws = registry.get(id).unwrap();
        (registry, id, ws)
    }

    fn attach(ws: &SharedWorkspace, role: ProvenanceRole, name: &str) {
        let mut guard = ws.lock();
        let ordinal = guard
            .attachments
            .iter()
            .filter(|a| a.provenance_role == role)
            .count() as u32;
        guard.attachments.push(Arc::new(AttachmentSource {
            id: Uuid::new_v4(),
            provenance_role: role,
            ordinal,
            file_name: name.to_string(),
            media_type: "application/pdf".to_string(),
            payload: "JVBERi0=".to_string(),
            size_bytes: 8,
        }));
    }

    #[tokio::test]
    async fn test_start_composes_models_before_data() {
        let (_registry, _id, ws) = workspace("certidao");
        attach(&ws, ProvenanceRole::DataContent, "bo.pdf");
        attach(&ws, ProvenanceRole::StyleModel, "modelo.pdf");
        let generator = ScriptedGenerator::replying(vec![text("CERTIDÃO")]);

        let view = start(&generator, &ws, DraftInput::default()).await.unwrap();
        assert_eq!(view.status, SessionStatus::Ready);
        assert_eq!(view.current_output.as_deref(), Some("CERTIDÃO"));

        let requests = generator.requests.lock();
        let segments = &requests[0].segments;
        let names: Vec<&str> = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Attachment(a) => Some(a.file_name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["modelo.pdf", "bo.pdf"]);
        assert!(segments[1].is_separator());
        assert!(requests[0].system_prompt.is_some());
    }

    #[tokio::test]
    async fn test_failed_start_leaves_session_failed() {
        let (_registry, _id, ws) = workspace("certidao");
        let generator = ScriptedGenerator::replying(vec![Err(GenerationError::Network(
            "down".to_string(),
        ))]);

        let err = start(&generator, &ws, DraftInput::default()).await.unwrap_err();
        assert!(matches!(err, AppError::Generation(GenerationError::Network(_))));
        assert_eq!(ws.lock().session.status(), SessionStatus::Failed);
    }

    #[tokio::test]
    async fn test_refine_sends_previous_output() {
        let (_registry, _id, ws) = workspace("providencias");
        let generator = ScriptedGenerator::replying(vec![text("v1"), text("v2")]);

        let mut input = DraftInput::default();
        input
            .text_fields
            .insert(ProvenanceRole::CaseFields, "- Ordem: oficiar".to_string());
        start(&generator, &ws, input).await.unwrap();
        let view = refine(&generator, &ws, "inclua a data").await.unwrap();

        assert_eq!(view.current_output.as_deref(), Some("v2"));
        assert_eq!(view.turns.len(), 1);
        let requests = generator.requests.lock();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[1].segments.len(),
            requests[0].segments.len() + 3
        );
    }

    #[tokio::test]
    async fn test_busy_session_issues_no_second_call() {
        let (_registry, _id, ws) = workspace("certidao");
        let gate = Arc::new(Notify::new());
        let generator = Arc::new(ScriptedGenerator::gated(vec![text("v1")], gate.clone()));

        let first = {
            let generator = generator.clone();
            let ws = ws.clone();
            tokio::spawn(async move { start(generator.as_ref(), &ws, DraftInput::default()).await })
        };
        while generator.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let err = start(generator.as_ref(), &ws, DraftInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Session(SessionError::Busy)));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);

        gate.notify_one();
        let view = first.await.unwrap().unwrap();
        assert_eq!(view.current_output.as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn test_abandon_cancels_pending_call() {
        let (registry, id, ws) = workspace("certidao");
        let gate = Arc::new(Notify::new());
        let generator = Arc::new(ScriptedGenerator::gated(vec![text("late")], gate));

        let pending = {
            let generator = generator.clone();
            let ws = ws.clone();
            tokio::spawn(async move { start(generator.as_ref(), &ws, DraftInput::default()).await })
        };
        while generator.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        assert!(registry.remove(id));
        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, AppError::Generation(GenerationError::Cancelled)));
        assert!(ws.lock().session.current_output().is_none());
    }

    #[tokio::test]
    async fn test_dropped_caller_frees_session_for_retry() {
        let (_registry, _id, ws) = workspace("certidao");
        let gate = Arc::new(Notify::new());
        let stuck = Arc::new(ScriptedGenerator::gated(vec![text("nunca")], gate));

        let pending = {
            let stuck = stuck.clone();
            let ws = ws.clone();
            tokio::spawn(async move { start(stuck.as_ref(), &ws, DraftInput::default()).await })
        };
        while stuck.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert!(ws.lock().session.is_busy());

        pending.abort();
        assert!(pending.await.unwrap_err().is_cancelled());
        {
            let guard = ws.lock();
            assert!(!guard.session.is_busy());
            assert_eq!(guard.session.status(), SessionStatus::Empty);
        }

        let generator = ScriptedGenerator::replying(vec![text("CERTIDÃO")]);
        let view = start(&generator, &ws, DraftInput::default()).await.unwrap();
        assert_eq!(view.current_output.as_deref(), Some("CERTIDÃO"));
    }

    #[tokio::test]
    async fn test_dropped_extraction_frees_slot() {
        let (_registry, _id, ws) = workspace("party_extraction");
        let gate = Arc::new(Notify::new());
        let stuck = Arc::new(ScriptedGenerator::gated(Vec::new(), gate));

        let pending = {
            let stuck = stuck.clone();
            let ws = ws.clone();
            tokio::spawn(async move { extract(stuck.as_ref(), &ws, DraftInput::default()).await })
        };
        while stuck.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        pending.abort();
        let _ = pending.await;

        assert!(!ws.lock().extraction.is_busy());
        let mut fields = serde_json::Map::new();
        fields.insert("nome".to_string(), serde_json::json!("JOÃO"));
        let generator =
            ScriptedGenerator::replying(vec![Ok(GenerationOutput::Structured(fields))]);
        assert!(extract(&generator, &ws, DraftInput::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_extract_returns_structured_fields() {
        let (_registry, _id, ws) = workspace("party_extraction");
        attach(&ws, ProvenanceRole::DataContent, "qualificacao.png");
        let mut fields = serde_json::Map::new();
        fields.insert("nome".to_string(), serde_json::json!("MARIA"));
        let generator =
            ScriptedGenerator::replying(vec![Ok(GenerationOutput::Structured(fields))]);

        let result = extract(&generator, &ws, DraftInput::default()).await.unwrap();
        assert_eq!(result.status, ResultStatus::Ok);
        assert_eq!(result.structured.unwrap()["nome"], "MARIA");

        let requests = generator.requests.lock();
        assert_eq!(requests[0].mode, GenerationMode::Extraction);
        let schema = requests[0].schema.as_ref().unwrap();
        match requests[0].segments.last().unwrap() {
            Segment::Text { body, .. } => assert_eq!(body, &schema.describe()),
            other => panic!("expected descriptor, got {other:?}"),
        }
        let system = requests[0].system_prompt.as_deref().unwrap();
        assert!(system.contains("qualificação da parte"));
    }

    #[tokio::test]
    async fn test_extract_failure_is_recorded_and_surfaced() {
        let (_registry, _id, ws) = workspace("penalty_extraction");
        let generator = ScriptedGenerator::replying(vec![Err(
            GenerationError::MalformedStructuredOutput("cpf".to_string()),
        )]);

        let err = extract(&generator, &ws, DraftInput::default()).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Generation(GenerationError::MalformedStructuredOutput(_))
        ));
        let guard = ws.lock();
        let last = guard.extraction.last_result().unwrap();
        assert_eq!(last.status, ResultStatus::Failed);
        assert_eq!(last.error_kind, Some("MALFORMED_STRUCTURED_OUTPUT"));
    }

    #[tokio::test]
    async fn test_mode_mismatch_is_rejected() {
        let (_registry, _id, ws) = workspace("certidao");
        let generator = ScriptedGenerator::default();
        assert!(matches!(
            extract(&generator, &ws, DraftInput::default()).await,
            Err(AppError::Validation(_))
        ));

        let (_registry, _id, ws) = workspace("party_extraction");
        assert!(matches!(
            start(&generator, &ws, DraftInput::default()).await,
            Err(AppError::Validation(_))
        ));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }
}

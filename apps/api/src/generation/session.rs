//! Refinement Session: the stateful wrapper around one generation dialogue.
//!
//! The generation service keeps no memory between calls, so every refinement
//! resends the full original context plus the current output and the new
//! instruction. At most one call may be in flight; each call is identified by
//! `(generation_id, call_id)` and a completion whose ids no longer match is
//! discarded instead of being applied to a newer state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::context::models::{ProvenanceRole, Segment, SegmentSummary};
use crate::llm_client::prompts::{
    current_draft_segment, new_instruction_segment, REFINEMENT_DIRECTIVE,
};
use crate::llm_client::GenerationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Empty,
    Generating,
    Ready,
    Refining,
    Failed,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("a generation is already in progress for this workspace")]
    Busy,

    #[error("there is no generated document to refine yet")]
    NotReady,

    #[error("refinement instruction cannot be empty")]
    EmptyInstruction,

    #[error("response belongs to a superseded call and was discarded")]
    Stale,
}

/// One recorded correction. Immutable once appended.
#[derive(Debug, Clone, Serialize)]
pub struct RefinementTurn {
    pub instruction: String,
    pub resulting_output: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Start,
    Refine,
}

/// Ticket for one in-flight call. Carries the complete segment list to send.
#[derive(Debug, Clone)]
pub struct PendingCall {
    pub generation_id: u64,
    pub call_id: u64,
    pub kind: CallKind,
    pub segments: Vec<Segment>,
    instruction: Option<String>,
}

/// Read-only view of a session for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub status: SessionStatus,
    pub generation_id: u64,
    pub current_output: Option<String>,
    pub turns: Vec<RefinementTurn>,
    pub context_segments: usize,
    /// Payload-free outline of the original context.
    pub context: Vec<SegmentSummary>,
    pub last_error_kind: Option<&'static str>,
}

#[derive(Debug)]
pub struct RefinementSession {
    status: SessionStatus,
    original_context: Option<Arc<Vec<Segment>>>,
    current_output: Option<String>,
    turns: Vec<RefinementTurn>,
    generation_id: u64,
    next_call_id: u64,
    in_flight: Option<(u64, u64)>,
    last_error: Option<GenerationError>,
}

impl Default for RefinementSession {
    fn default() -> Self {
        Self::new()
    }
}

impl RefinementSession {
    pub fn new() -> Self {
        Self {
            status: SessionStatus::Empty,
            original_context: None,
            current_output: None,
            turns: Vec::new(),
            generation_id: 0,
            next_call_id: 0,
            in_flight: None,
            last_error: None,
        }
    }

    #[cfg(test)]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn current_output(&self) -> Option<&str> {
        self.current_output.as_deref()
    }

    #[cfg(test)]
    pub fn turns(&self) -> &[RefinementTurn] {
        &self.turns
    }

    pub fn original_context(&self) -> Option<&[Segment]> {
        self.original_context.as_deref().map(|v| v.as_slice())
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Begins a fresh, unrelated generation. Any previous dialogue is dropped.
    pub fn begin_start(&mut self, segments: Vec<Segment>) -> Result<PendingCall, SessionError> {
        self.ensure_idle()?;

        self.generation_id += 1;
        self.original_context = None;
        self.current_output = None;
        self.turns.clear();
        self.last_error = None;
        self.status = SessionStatus::Generating;

        Ok(self.issue(CallKind::Start, segments, None))
    }

    /// Begins a refinement. Allowed from READY, and from FAILED when an original
    /// context exists (retry keeps the accumulated context).
    pub fn begin_refine(&mut self, instruction: &str) -> Result<PendingCall, SessionError> {
        self.ensure_idle()?;

        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Err(SessionError::EmptyInstruction);
        }

        let (original, output) = match (&self.original_context, &self.current_output) {
            (Some(original), Some(output)) => (original, output),
            _ => return Err(SessionError::NotReady),
        };

        let mut segments = Vec::with_capacity(original.len() + 3);
        segments.extend(original.iter().cloned());
        segments.push(Segment::text(
            ProvenanceRole::CurrentDraft,
            current_draft_segment(output),
        ));
        segments.push(Segment::text(
            ProvenanceRole::Instruction,
            new_instruction_segment(instruction),
        ));
        segments.push(Segment::text(
            ProvenanceRole::RefinementDirective,
            REFINEMENT_DIRECTIVE,
        ));

        self.last_error = None;
        self.status = SessionStatus::Refining;
        Ok(self.issue(CallKind::Refine, segments, Some(instruction.to_string())))
    }

    /// Applies the outcome of a call. A superseded call changes nothing.
    pub fn complete(
        &mut self,
        call: PendingCall,
        result: Result<String, GenerationError>,
    ) -> Result<SessionStatus, SessionError> {
        if self.in_flight != Some((call.generation_id, call.call_id)) {
            warn!(
                "Discarding stale completion: generation_id={}, call_id={}",
                call.generation_id, call.call_id
            );
            return Err(SessionError::Stale);
        }
        self.in_flight = None;

        match result {
            Ok(output) => {
                match call.kind {
                    CallKind::Start => {
                        self.original_context = Some(Arc::new(call.segments));
                        info!(
                            "Session generation {} ready ({} context segments)",
                            self.generation_id,
                            self.original_context().map_or(0, |c| c.len())
                        );
                    }
                    CallKind::Refine => {
                        self.turns.push(RefinementTurn {
                            instruction: call.instruction.unwrap_or_default(),
                            resulting_output: output.clone(),
                            timestamp: Utc::now(),
                        });
                        info!(
                            "Session generation {} refined (turn {})",
                            self.generation_id,
                            self.turns.len()
                        );
                    }
                }
                self.current_output = Some(output);
                self.status = SessionStatus::Ready;
            }
            Err(e) => {
                warn!(
                    "Session generation {} call failed: {}",
                    self.generation_id,
                    e.kind()
                );
                self.last_error = Some(e);
                self.status = SessionStatus::Failed;
            }
        }
        Ok(self.status)
    }

    /// Abandons the in-flight call, if any. Its eventual completion is stale.
    pub fn cancel(&mut self) -> bool {
        if self.in_flight.take().is_none() {
            return false;
        }
        self.settle_after_abort();
        true
    }

    /// Releases the ticket of a caller that went away before completing.
    /// A no-op unless that exact call is still the one in flight.
    pub fn abort(&mut self, generation_id: u64, call_id: u64) -> bool {
        if self.in_flight != Some((generation_id, call_id)) {
            return false;
        }
        self.in_flight = None;
        self.settle_after_abort();
        true
    }

    fn settle_after_abort(&mut self) {
        self.status = if self.current_output.is_some() {
            SessionStatus::Ready
        } else {
            SessionStatus::Empty
        };
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            status: self.status,
            generation_id: self.generation_id,
            current_output: self.current_output.clone(),
            turns: self.turns.clone(),
            context_segments: self.original_context().map_or(0, |c| c.len()),
            context: self
                .original_context()
                .map(|c| c.iter().map(SegmentSummary::from).collect())
                .unwrap_or_default(),
            last_error_kind: self.last_error.as_ref().map(GenerationError::kind),
        }
    }

    fn ensure_idle(&self) -> Result<(), SessionError> {
        if self.is_busy() {
            warn!(
                "Rejected call while generation {} is in flight",
                self.generation_id
            );
            return Err(SessionError::Busy);
        }
        Ok(())
    }

    fn issue(
        &mut self,
        kind: CallKind,
        segments: Vec<Segment>,
        instruction: Option<String>,
    ) -> PendingCall {
        self.next_call_id += 1;
        self.in_flight = Some((self.generation_id, self.next_call_id));
        PendingCall {
            generation_id: self.generation_id,
            call_id: self.next_call_id,
            kind,
            segments,
            instruction,
        }
    }
}

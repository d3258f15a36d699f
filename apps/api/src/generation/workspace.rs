//! Workspaces: the server-side state of one UI flow instance.
//!
//! A workspace owns its ingested attachments, its refinement session and its
//! extraction slot. Locks are short and never held across an await: callers
//! lock, take a ticket, unlock, await the service, then lock again to apply.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::info;
use uuid::Uuid;

use crate::context::models::AttachmentSource;
use crate::generation::cancel::CancelToken;
use crate::generation::profiles::ToolProfile;
use crate::generation::session::{RefinementSession, SessionError, SessionView};
use crate::llm_client::GenerationResult;

/// Guard for the single extraction call a workspace may have in flight.
#[derive(Debug, Default)]
pub struct ExtractionSlot {
    in_flight: Option<u64>,
    next_call_id: u64,
    last_result: Option<GenerationResult>,
}

impl ExtractionSlot {
    pub fn begin(&mut self) -> Result<u64, SessionError> {
        if self.in_flight.is_some() {
            return Err(SessionError::Busy);
        }
        self.next_call_id += 1;
        self.in_flight = Some(self.next_call_id);
        Ok(self.next_call_id)
    }

    pub fn complete(&mut self, call_id: u64, result: GenerationResult) -> Result<(), SessionError> {
        if self.in_flight != Some(call_id) {
            return Err(SessionError::Stale);
        }
        self.in_flight = None;
        self.last_result = Some(result);
        Ok(())
    }

    pub fn cancel(&mut self) -> bool {
        self.in_flight.take().is_some()
    }

    /// Frees the slot only if `call_id` is still the call in flight.
    pub fn cancel_if(&mut self, call_id: u64) -> bool {
        if self.in_flight != Some(call_id) {
            return false;
        }
        self.in_flight = None;
        true
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn last_result(&self) -> Option<&GenerationResult> {
        self.last_result.as_ref()
    }
}

#[derive(Debug)]
pub struct Workspace {
    pub id: Uuid,
    pub profile: Arc<ToolProfile>,
    pub attachments: Vec<Arc<AttachmentSource>>,
    pub session: RefinementSession,
    pub extraction: ExtractionSlot,
    pub created_at: DateTime<Utc>,
    last_activity: Instant,
    cancel: CancelToken,
}

impl Workspace {
    pub fn new(profile: Arc<ToolProfile>) -> Self {
        Self {
            id: Uuid::new_v4(),
            profile,
            attachments: Vec::new(),
            session: RefinementSession::new(),
            extraction: ExtractionSlot::default(),
            created_at: Utc::now(),
            last_activity: Instant::now(),
            cancel: CancelToken::new(),
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Idle means no call in flight and no access for longer than `max_idle`.
    pub fn is_idle_for(&self, max_idle: Duration) -> bool {
        !self.session.is_busy()
            && !self.extraction.is_busy()
            && self.last_activity.elapsed() > max_idle
    }

    pub fn attachment_bytes(&self) -> u64 {
        self.attachments.iter().map(|a| a.size_bytes).sum()
    }

    /// Stops every in-flight call. Their completions become stale.
    pub fn abandon(&mut self) {
        self.cancel.cancel();
        self.session.cancel();
        self.extraction.cancel();
    }

    pub fn view(&self) -> WorkspaceView {
        WorkspaceView {
            workspace_id: self.id,
            tool: self.profile.id,
            created_at: self.created_at,
            attachments: self.attachments.iter().map(|a| a.as_ref().clone()).collect(),
            attachment_bytes: self.attachment_bytes(),
            session: self.session.view(),
            extraction: self.extraction.last_result().cloned(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WorkspaceView {
    pub workspace_id: Uuid,
    pub tool: &'static str,
    pub created_at: DateTime<Utc>,
    pub attachments: Vec<AttachmentSource>,
    pub attachment_bytes: u64,
    pub session: SessionView,
    pub extraction: Option<GenerationResult>,
}

pub type SharedWorkspace = Arc<Mutex<Workspace>>;

/// In-memory workspace registry. Nothing is persisted.
#[derive(Clone, Default)]
pub struct WorkspaceRegistry {
    inner: Arc<RwLock<HashMap<Uuid, SharedWorkspace>>>,
}

impl WorkspaceRegistry {
    pub fn create(&self, profile: Arc<ToolProfile>) -> Uuid {
        let workspace = Workspace::new(profile);
        let id = workspace.id;
        let tool = workspace.profile.id;
        self.inner.write().insert(id, Arc::new(Mutex::new(workspace)));
        info!("Workspace {} created for tool '{}' ({} open)", id, tool, self.len());
        id
    }

    /// Looks a workspace up and counts the lookup as activity.
    pub fn get(&self, id: Uuid) -> Option<SharedWorkspace> {
        let workspace = self.inner.read().get(&id).cloned()?;
        workspace.lock().touch();
        Some(workspace)
    }

    /// Removes a workspace and cancels whatever it had in flight.
    pub fn remove(&self, id: Uuid) -> bool {
        let removed = self.inner.write().remove(&id);
        match removed {
            Some(workspace) => {
                workspace.lock().abandon();
                info!("Workspace {} abandoned", id);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Drops every workspace idle for longer than `max_idle`.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let expired: Vec<SharedWorkspace> = {
            let mut map = self.inner.write();
            let ids: Vec<Uuid> = map
                .iter()
                .filter(|(_, workspace)| workspace.lock().is_idle_for(max_idle))
                .map(|(id, _)| *id)
                .collect();
            ids.iter().filter_map(|id| map.remove(id)).collect()
        };

        for workspace in &expired {
            let mut workspace = workspace.lock();
            workspace.abandon();
            info!("Workspace {} evicted after inactivity", workspace.id);
        }
        expired.len()
    }
}

/// Periodically evicts idle workspaces for as long as the process runs.
pub fn spawn_sweeper(
    registry: WorkspaceRegistry,
    every: Duration,
    max_idle: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let evicted = registry.evict_idle(max_idle);
            if evicted > 0 {
                info!("Sweeper evicted {} workspaces ({} open)", evicted, registry.len());
            }
        }
    })
}

//! Process-wide orchestrator state: the registry of active session
//! managers and the per-project graceful-stop flag (§9 "isolate behind a
//! small struct (`OrchestratorState`)"). Modeled as `Arc<RwLock<HashMap<Uuid,
//! _>>>`, matching the teacher's `WebSocketState.connections` shape in
//! `server/ws/transport.rs`.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A running session's cancellation handle plus enough identity to report
/// "busy" against the right session number.
struct ActiveSession {
    cancel: CancellationToken,
    session_number: i32,
    started_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Clone, Copy)]
pub struct ActiveSessionInfo {
    pub session_number: i32,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Default)]
pub struct OrchestratorState {
    active: RwLock<HashMap<Uuid, ActiveSession>>,
    stop_after_current: RwLock<HashMap<Uuid, bool>>,
}

impl OrchestratorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the session currently running for a project, returning
    /// its cancellation token for the caller to pass into the Agent Runner.
    pub async fn register(&self, project_id: Uuid, session_number: i32) -> CancellationToken {
        let cancel = CancellationToken::new();
        let mut active = self.active.write().await;
        active.insert(
            project_id,
            ActiveSession {
                cancel: cancel.clone(),
                session_number,
                started_at: chrono::Utc::now(),
            },
        );
        cancel
    }

    pub async fn unregister(&self, project_id: Uuid) {
        self.active.write().await.remove(&project_id);
    }

    pub async fn active_session(&self, project_id: Uuid) -> Option<ActiveSessionInfo> {
        self.active.read().await.get(&project_id).map(|s| ActiveSessionInfo {
            session_number: s.session_number,
            started_at: s.started_at,
        })
    }

    /// Immediate stop: cancels the token observed by the Agent Runner.
    /// Returns `false` if no session is currently registered for the
    /// project (the caller surfaces this as a `StateViolation`).
    pub async fn cancel_active(&self, project_id: Uuid) -> bool {
        match self.active.read().await.get(&project_id) {
            Some(session) => {
                session.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Graceful stop: sets (or clears) the flag checked at the top of each
    /// coding-loop iteration. Setting it twice is idempotent (§8).
    pub async fn set_stop_after_current(&self, project_id: Uuid, stop: bool) {
        self.stop_after_current.write().await.insert(project_id, stop);
    }

    /// Reads and clears the flag in one step, so each loop iteration
    /// observes it at most once.
    pub async fn take_stop_after_current(&self, project_id: Uuid) -> bool {
        let mut flags = self.stop_after_current.write().await;
        flags.remove(&project_id).unwrap_or(false)
    }

    /// Non-consuming read of the flag, for the auto-continue delay to exit
    /// early without stealing the observation the next loop iteration's
    /// `take_stop_after_current` needs to make.
    pub async fn is_stop_after_current_set(&self, project_id: Uuid) -> bool {
        self.stop_after_current.read().await.get(&project_id).copied().unwrap_or(false)
    }
}

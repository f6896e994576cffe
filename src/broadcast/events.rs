use serde::Serialize;
use uuid::Uuid;

use crate::domain::{Project, Session};

/// Every orchestrator event published on the bus (§4.8). Serializes with a
/// `type` tag plus event-specific fields, matching §6's "each payload
/// carries a `type` field" contract.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BroadcastEvent {
    /// Pushed once to a newly-connected subscriber, before it enters the
    /// live stream (§4.8, §6 "one-shot `initial_state` snapshot from the
    /// Store").
    InitialState {
        project: Project,
        sessions: Vec<Session>,
        total_epics: i64,
        completed_epics: i64,
        total_tasks: i64,
        completed_tasks: i64,
    },
    SessionStarted { session_number: i32 },
    SessionCompleted { session_number: i32 },
    SessionError { session_number: i32, message: String },
    Progress { session_number: i32, tool_name: String },
    AutoContinueDelay { seconds: u64 },
    AutoContinueStopped { reason: String },
    AllEpicsComplete,
    ProjectComplete,
    ProjectReset,
    InitializationComplete,
    InitializationError { message: String },
    CodingSessionsComplete,
    CodingSessionsError { message: String },
    DeepReviewComplete { session_number: i32, overall_rating: Option<i32> },
    /// Facade-level project CRUD, published on the affected project's own
    /// topic (§6 "every state-changing operation publishes at least one
    /// broadcast event").
    ProjectCreated { name: String },
    ProjectRenamed { new_name: String },
    ProjectDeleted,
    SettingsUpdated,
    EnvConfigured { configured: bool },
    /// Prompt-improvement analyses and their proposals can span several
    /// projects; the facade fans these out to every project in
    /// `Analysis::project_ids`.
    AnalysisTriggered { analysis_id: Uuid },
    AnalysisCompleted { analysis_id: Uuid, proposals: usize },
    AnalysisFailed { analysis_id: Uuid, message: String },
    AnalysisDeleted { analysis_id: Uuid },
    ProposalStatusChanged { proposal_id: Uuid, status: String },
    ProposalApplied { proposal_id: Uuid, prompt_version_id: Uuid },
    /// Prompt versions aren't scoped to any one project, so the facade
    /// publishes this on the nil topic rather than fanning it out.
    PromptVersionActivated { prompt_version_id: Uuid },
    /// Answers a subscriber's `ping`; not tied to a particular session.
    Pong,
}

impl BroadcastEvent {
    pub fn session_started(session: &Session) -> Self {
        Self::SessionStarted {
            session_number: session.session_number,
        }
    }
}

pub type ProjectId = Uuid;

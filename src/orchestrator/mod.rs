//! The session-lifecycle state machine: admission, the initialization and
//! coding control loops, the three stop levels, and startup/recurring
//! stale-session reconciliation (§4.5). Grounded almost verbatim in
//! `original_source/orchestrator.py`'s control flow, reimplemented against
//! this crate's `Store`/`Sandbox`/`AgentLlmClient`/`BroadcastBus` instead of
//! that module's direct SQLite + subprocess calls.

mod state;

pub use state::{ActiveSessionInfo, OrchestratorState};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::agent_runner::{self, system_prompt_for, AgentRunnerInput, Local, Sandboxed, ToolRoutingStrategy};
use crate::broadcast::{BroadcastBus, BroadcastEvent};
use crate::configuration::Settings;
use crate::domain::{
    Project, QualityCheckKind, QualityCheckStatus, QualityMetrics, SandboxKind, Session,
    SessionStatus, SessionType,
};
use crate::error::{OrchestratorError, Result};
use crate::event_log;
use crate::llm::{AgentLlmClient, AgentMessage, AnalysisLlmClient};
use crate::quality;
use crate::sandbox::{ContainerSandbox, LocalSandbox, Sandbox};
use crate::store::quality::NewQualityCheck;
use crate::store::Store;

/// How often the recurring background sweep reconciles sessions left
/// `running` by a prior process that died (§4.5 "startup reconciliation").
const STALE_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub struct Orchestrator {
    store: Store,
    bus: BroadcastBus,
    agent_llm: Arc<dyn AgentLlmClient>,
    analysis_llm: Arc<dyn AnalysisLlmClient>,
    settings: Arc<Settings>,
    state: OrchestratorState,
}

impl Orchestrator {
    pub fn new(
        store: Store,
        bus: BroadcastBus,
        agent_llm: Arc<dyn AgentLlmClient>,
        analysis_llm: Arc<dyn AnalysisLlmClient>,
        settings: Arc<Settings>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            bus,
            agent_llm,
            analysis_llm,
            settings,
            state: OrchestratorState::new(),
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn bus(&self) -> &BroadcastBus {
        &self.bus
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn analysis_llm(&self) -> Arc<dyn AnalysisLlmClient> {
        Arc::clone(&self.analysis_llm)
    }

    /// One-shot `cleanup_stale_sessions()` pass, run before admitting any
    /// new session at process start (§4.5).
    pub async fn run_startup_reconciliation(&self) -> Result<u64> {
        self.store.cleanup_stale_sessions().await
    }

    /// Schedules the recurring 5-minute sweep. The returned handle is owned
    /// by the caller (typically dropped on process shutdown, which aborts
    /// the task).
    pub fn spawn_stale_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(STALE_SWEEP_INTERVAL).await;
                match orchestrator.store.cleanup_stale_sessions().await {
                    Ok(count) if count > 0 => {
                        tracing::info!(count, "reconciled stale sessions");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!(error = %e, "stale session sweep failed"),
                }
            }
        })
    }

    /// Admission plus one full session run (§4.5 steps 1-11).
    pub async fn start_session(
        self: &Arc<Self>,
        project_id: Uuid,
        session_type: SessionType,
        model: &str,
    ) -> Result<Session> {
        let project = self.store.get_project(project_id).await?;

        if let Some(active) = self.store.get_active_session(project_id).await? {
            return Err(OrchestratorError::conflict(format!(
                "session #{} is already running (started {})",
                active.session_number,
                active
                    .started_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "unknown".to_string())
            )));
        }

        let max_iterations = project.settings.max_iterations;
        let session = self
            .store
            .allocate_session(project_id, session_type, model, max_iterations)
            .await?;
        self.store.mark_session_started(session.id).await?;

        let cancel = self.state.register(project_id, session.session_number).await;
        self.bus
            .publish(project_id, BroadcastEvent::session_started(&session))
            .await;

        let workspace_path = PathBuf::from(&project.workspace_path);
        let mut sandbox: Box<dyn Sandbox> = match project.settings.sandbox_type {
            SandboxKind::Local => Box::new(LocalSandbox::new(workspace_path.clone())),
            SandboxKind::Container => Box::new(ContainerSandbox::new(
                format!("agent-{project_id}-{}", session.session_number),
                workspace_path.clone(),
            )),
        };

        let result = self
            .run_sandboxed_session(&project, &session, session_type, model, sandbox.as_mut(), &cancel)
            .await;

        // Sandbox teardown errors are logged, never propagated (§4.2): the
        // session's result is already final by this point.
        if let Err(e) = sandbox.stop().await {
            tracing::warn!(error = %e, session_id = %session.id, "sandbox stop failed");
        }

        self.state.unregister(project_id).await;

        result
    }

    async fn run_sandboxed_session(
        &self,
        project: &Project,
        session: &Session,
        session_type: SessionType,
        model: &str,
        sandbox: &mut dyn Sandbox,
        cancel: &CancellationToken,
    ) -> Result<Session> {
        if let Err(e) = sandbox.start().await {
            self.store
                .mark_session_terminal(session.id, SessionStatus::Error, Some(&e.to_string()), None, None)
                .await?;
            self.bus
                .publish(
                    project.id,
                    BroadcastEvent::SessionError {
                        session_number: session.session_number,
                        message: e.to_string(),
                    },
                )
                .await;
            return Err(e);
        }

        let routing: Box<dyn ToolRoutingStrategy> = if sandbox.handle().is_some() {
            Box::new(Sandboxed::new(sandbox))
        } else {
            Box::new(Local::new(sandbox))
        };

        let system_prompt = system_prompt_for(session_type, project.settings.sandbox_type);
        let initial_prompt = initial_prompt_for(project, session_type);

        let bus = self.bus.clone();
        let project_id = project.id;
        let session_number = session.session_number;
        let progress = move |msg: AgentMessage| {
            if let AgentMessage::ToolUse { name, .. } = msg {
                let bus = bus.clone();
                tokio::spawn(async move {
                    bus.publish(
                        project_id,
                        BroadcastEvent::Progress {
                            session_number,
                            tool_name: name,
                        },
                    )
                    .await;
                });
            }
        };

        let input = AgentRunnerInput {
            session_type,
            model,
            system_prompt,
            initial_prompt: &initial_prompt,
            routing: routing.as_ref(),
            progress: &progress,
        };

        let logs_dir = PathBuf::from(&project.workspace_path).join("logs");

        let outcome = agent_runner::run_session(
            self.agent_llm.as_ref(),
            &logs_dir,
            session.id,
            session.session_number,
            input,
            cancel,
        )
        .await;

        let (status, metrics, error_message) = match outcome {
            Ok(output) => (output.status, Some(output.metrics), None),
            Err(e) => (SessionStatus::Error, None, Some(e.to_string())),
        };

        let interruption_reason = match status {
            SessionStatus::Interrupted => Some("cancelled".to_string()),
            _ => None,
        };

        self.store
            .mark_session_terminal(
                session.id,
                status,
                error_message.as_deref(),
                interruption_reason.as_deref(),
                metrics.as_ref(),
            )
            .await?;

        match status {
            SessionStatus::Completed => {
                self.bus
                    .publish(
                        project.id,
                        BroadcastEvent::SessionCompleted {
                            session_number: session.session_number,
                        },
                    )
                    .await;
            }
            SessionStatus::Error | SessionStatus::Interrupted => {
                self.bus
                    .publish(
                        project.id,
                        BroadcastEvent::SessionError {
                            session_number: session.session_number,
                            message: error_message.clone().unwrap_or_else(|| status.to_string()),
                        },
                    )
                    .await;
            }
            _ => {}
        }

        if session_type != SessionType::Initializer {
            self.run_quick_check(project.id, session.id, session.session_number, status).await;
        } else if status == SessionStatus::Completed {
            self.run_coverage_analysis(project.id).await;
        }

        self.store.get_session(session.id).await
    }

    /// §4.6 quick check, persisted for every non-initializer session, plus
    /// the deep-review trigger evaluation.
    async fn run_quick_check(&self, project_id: Uuid, session_id: Uuid, session_number: i32, status: SessionStatus) {
        let session = match self.store.get_session(session_id).await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "quick check: failed to reload session");
                return;
            }
        };
        let metrics = session.metrics.clone().unwrap_or_default();

        let project = match self.store.get_project(project_id).await {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "quick check: failed to reload project");
                return;
            }
        };
        let logs_dir = PathBuf::from(&project.workspace_path).join("logs");
        let events = match event_log::resolve_session_log_prefix(&logs_dir, session_number) {
            Ok(Some((_txt, jsonl))) => event_log::read_events(&jsonl).await.unwrap_or_default(),
            _ => Vec::new(),
        };

        let outcome = quality::compute_quick_check(&events, status, &metrics);
        let overall_rating = outcome.overall_rating;

        let check = NewQualityCheck {
            kind: QualityCheckKind::Quick,
            status: QualityCheckStatus::Ok,
            overall_rating: Some(overall_rating),
            metrics: outcome.metrics,
            critical_issues: outcome.critical_issues,
            warnings: outcome.warnings,
            review_text: None,
            recommendations: None,
        };
        if let Err(e) = self.store.insert_quality_check(session_id, check).await {
            tracing::error!(error = %e, "failed to store quick quality check");
            return;
        }

        let last_deep = self
            .store
            .last_deep_reviewed_session_number(project_id)
            .await
            .unwrap_or(None);
        if quality::should_trigger_deep_review(session_number, last_deep, overall_rating) {
            self.spawn_deep_review(project_id, session_id, session_number);
        }
    }

    /// Deep review runs detached so it never blocks the coding loop (§4.6).
    fn spawn_deep_review(&self, project_id: Uuid, session_id: Uuid, session_number: i32) {
        let store = self.store.clone();
        let bus = self.bus.clone();
        let llm = Arc::clone(&self.analysis_llm);
        let model = self.settings.llm.analysis_model.clone();

        tokio::spawn(async move {
            let project = match store.get_project(project_id).await {
                Ok(p) => p,
                Err(e) => {
                    tracing::error!(error = %e, "deep review: failed to load project");
                    return;
                }
            };
            let logs_dir = PathBuf::from(&project.workspace_path).join("logs");
            let events = match event_log::resolve_session_log_prefix(&logs_dir, session_number) {
                Ok(Some((_txt, jsonl))) => event_log::read_events(&jsonl).await.unwrap_or_default(),
                _ => Vec::new(),
            };

            let outcome = quality::run_deep_review(llm.as_ref(), &model, &events).await;
            let (check, overall_rating) = match outcome {
                quality::DeepReviewOutcome::Ok {
                    overall_rating,
                    critical_issues,
                    warnings,
                    review_text,
                    recommendations,
                } => (
                    NewQualityCheck {
                        kind: QualityCheckKind::Deep,
                        status: QualityCheckStatus::Ok,
                        overall_rating: Some(overall_rating),
                        metrics: QualityMetrics::default(),
                        critical_issues,
                        warnings,
                        review_text: Some(review_text),
                        recommendations: Some(recommendations),
                    },
                    Some(overall_rating),
                ),
                quality::DeepReviewOutcome::Failed => (
                    NewQualityCheck {
                        kind: QualityCheckKind::Deep,
                        status: QualityCheckStatus::Failed,
                        overall_rating: None,
                        metrics: QualityMetrics::default(),
                        critical_issues: Vec::new(),
                        warnings: Vec::new(),
                        review_text: None,
                        recommendations: None,
                    },
                    None,
                ),
            };

            match store.insert_quality_check(session_id, check).await {
                Ok(_) => {
                    bus.publish(
                        project_id,
                        BroadcastEvent::DeepReviewComplete {
                            session_number,
                            overall_rating,
                        },
                    )
                    .await;
                }
                Err(e) => tracing::error!(error = %e, "failed to store deep review"),
            }
        });
    }

    /// Test-coverage analysis, run once after a successful initializer
    /// session (§4.6).
    async fn run_coverage_analysis(&self, project_id: Uuid) {
        let epics = match self.store.list_epics(project_id).await {
            Ok(e) => e,
            Err(e) => {
                tracing::error!(error = %e, "coverage analysis: failed to load epics");
                return;
            }
        };
        let tasks = match self.store.list_tasks_for_project(project_id).await {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(error = %e, "coverage analysis: failed to load tasks");
                return;
            }
        };
        let tests = match self.store.list_tests_for_project(project_id).await {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(error = %e, "coverage analysis: failed to load tests");
                return;
            }
        };

        let snapshot = quality::compute_coverage(&epics, &tasks, &tests);
        let value = match serde_json::to_value(&snapshot) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "coverage analysis: failed to serialize snapshot");
                return;
            }
        };
        if let Err(e) = self.store.record_coverage_snapshot(project_id, value).await {
            tracing::error!(error = %e, "coverage analysis: failed to persist snapshot");
        }
    }

    /// Initialization-only path: exactly one initializer session, no loop
    /// (§4.5).
    pub async fn start_initialization(self: &Arc<Self>, project_id: Uuid) -> Result<Session> {
        let project = self.store.get_project(project_id).await?;
        let epics = self.store.list_epics(project_id).await?;
        if !epics.is_empty() {
            return Err(OrchestratorError::state_violation(
                "project already has epics; initialization already ran",
            ));
        }

        let model = project
            .settings
            .initializer_model
            .clone()
            .unwrap_or_else(|| self.settings.models.initializer.clone());

        let result = self.start_session(project_id, SessionType::Initializer, &model).await;
        match &result {
            Ok(session) if session.status == SessionStatus::Completed => {
                self.bus.publish(project_id, BroadcastEvent::InitializationComplete).await;
            }
            Ok(session) => {
                self.bus
                    .publish(
                        project_id,
                        BroadcastEvent::InitializationError {
                            message: session
                                .error_message
                                .clone()
                                .unwrap_or_else(|| format!("session ended as {}", session.status)),
                        },
                    )
                    .await;
            }
            Err(e) => {
                self.bus
                    .publish(project_id, BroadcastEvent::InitializationError { message: e.to_string() })
                    .await;
            }
        }
        result
    }

    /// The coding loop: repeatedly admits and runs coding sessions until a
    /// stop condition fires (§4.5).
    pub async fn start_coding_sessions(
        self: &Arc<Self>,
        project_id: Uuid,
        max_iterations_override: Option<i32>,
    ) -> Result<Session> {
        let project = self.store.get_project(project_id).await?;
        let epics = self.store.list_epics(project_id).await?;
        if epics.is_empty() {
            return Err(OrchestratorError::state_violation(
                "project has no epics yet; run initialization first",
            ));
        }

        let model = project
            .settings
            .coding_model
            .clone()
            .unwrap_or_else(|| self.settings.models.coding.clone());

        let max_iterations = max_iterations_override
            .or(project.settings.max_iterations)
            .or(Some(self.settings.project.max_iterations))
            .filter(|n| *n != 0);

        let mut last_session: Option<Session> = None;
        let mut iteration = 0i32;

        loop {
            if let Some(limit) = max_iterations {
                if iteration >= limit {
                    break;
                }
            }
            if self.state.take_stop_after_current(project_id).await {
                self.bus
                    .publish(
                        project_id,
                        BroadcastEvent::AutoContinueStopped {
                            reason: "graceful stop requested".to_string(),
                        },
                    )
                    .await;
                break;
            }

            let (total_epics, done_epics) = self.store.epic_progress(project_id).await?;
            if total_epics > 0 && total_epics == done_epics {
                self.bus.publish(project_id, BroadcastEvent::AllEpicsComplete).await;
                break;
            }

            if iteration > 0 {
                let seconds = self.settings.timing.auto_continue_delay_seconds;
                self.bus
                    .publish(project_id, BroadcastEvent::AutoContinueDelay { seconds })
                    .await;
                self.interruptible_delay(project_id, seconds).await;
            }

            let session = match self.start_session(project_id, SessionType::Coding, &model).await {
                Ok(s) => s,
                Err(e) => {
                    self.bus
                        .publish(project_id, BroadcastEvent::CodingSessionsError { message: e.to_string() })
                        .await;
                    return Err(e);
                }
            };
            iteration += 1;
            let status = session.status;
            last_session = Some(session);

            if matches!(status, SessionStatus::Error | SessionStatus::Interrupted) {
                break;
            }

            let (total_tasks, done_tasks) = self.store.task_progress(project_id).await?;
            if total_tasks > 0 && total_tasks == done_tasks {
                self.store.mark_project_completed(project_id).await?;
                self.bus.publish(project_id, BroadcastEvent::ProjectComplete).await;
                break;
            }
        }

        if let Some(session) = &last_session {
            if session.status == SessionStatus::Completed {
                self.bus.publish(project_id, BroadcastEvent::CodingSessionsComplete).await;
            }
        }

        last_session.ok_or_else(|| OrchestratorError::state_violation("no coding session ran"))
    }

    /// Sleeps a whole number of seconds in one-second steps so a graceful
    /// stop requested mid-delay is observed promptly instead of only at the
    /// next loop boundary, without needing a dedicated notification channel
    /// for a flag that's already polled at the top of every iteration.
    async fn interruptible_delay(&self, project_id: Uuid, seconds: u64) {
        let mut remaining = seconds;
        if remaining == 0 {
            return;
        }
        loop {
            tokio::time::sleep(Duration::from_secs(1)).await;
            remaining = remaining.saturating_sub(1);
            if remaining == 0 || self.state.is_stop_after_current_set(project_id).await {
                break;
            }
        }
    }

    /// Immediate stop (§4.5): cancels the running session's token. The
    /// session lands on `interrupted`.
    pub async fn stop_session(&self, project_id: Uuid) -> Result<()> {
        if self.state.cancel_active(project_id).await {
            Ok(())
        } else {
            Err(OrchestratorError::state_violation("no active session to stop"))
        }
    }

    /// Graceful stop (§4.5): checked at the top of each coding-loop
    /// iteration; never interrupts a running session.
    pub async fn set_stop_after_current(&self, project_id: Uuid, stop: bool) {
        self.state.set_stop_after_current(project_id, stop).await;
    }

    /// Cancel initialization (§4.5): stops the active initializer session
    /// and deletes all epics/tasks/tests created so far. The project's spec
    /// and workspace are preserved for re-run.
    pub async fn cancel_initialization(&self, project_id: Uuid) -> Result<()> {
        if !self.state.cancel_active(project_id).await {
            return Err(OrchestratorError::state_violation(
                "no active initialization session to cancel",
            ));
        }
        self.store.delete_epics_for_project(project_id).await?;
        self.bus.publish(project_id, BroadcastEvent::ProjectReset).await;
        Ok(())
    }

    pub async fn active_session(&self, project_id: Uuid) -> Option<ActiveSessionInfo> {
        self.state.active_session(project_id).await
    }
}

/// The first user-turn body, kept separate from the system prompt (§4.4's
/// `system_prompt` input is injected into the LLM's system slot; this is
/// the task content the agent actually responds to).
fn initial_prompt_for(project: &Project, session_type: SessionType) -> String {
    match session_type {
        SessionType::Initializer => project
            .spec_text
            .clone()
            .unwrap_or_else(|| "No specification text was provided for this project.".to_string()),
        SessionType::Coding => {
            "Continue work on this project: pick up the next pending task from the task manager \
             and make progress toward completing it."
                .to_string()
        }
        SessionType::Review => {
            "Review the current state of this project for quality and summarize findings."
                .to_string()
        }
    }
}

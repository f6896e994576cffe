//! The library-level request surface described in SPEC_FULL.md §6: a plain
//! async facade over `Store`/`Orchestrator`/`BroadcastBus` with no HTTP
//! layer, grounded in `original_source/api/main.py` being a thin FastAPI
//! wrapper over exactly these calls. Every state-changing method publishes
//! at least one event on the affected project's broadcast topic.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::analyzer::{self, AnalyzerInput, EmittedProposal, SessionSignal};
use crate::broadcast::BroadcastEvent;
use crate::domain::{
    Analysis, AnalysisStatus, ChangeKind, Project, ProjectSettings, Proposal, ProposalStatus,
    PromptVersion, QualityCheck, QualityCheckKind, SandboxKind, Session, SessionStatus,
    SessionType,
};
use crate::error::{OrchestratorError, Result};
use crate::event_log::{self, LogEvent};
use crate::orchestrator::{ActiveSessionInfo, Orchestrator};
use crate::quality::thresholds::{ELIGIBLE_MIN_SESSIONS, ELIGIBLE_WINDOW_DAYS};
use crate::store::proposals::NewProposal;

/// Aggregated quality picture for a project, built from every quick/deep
/// check recorded against its non-initializer sessions (§6 "quality ...
/// per project summary").
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProjectQualitySummary {
    pub sessions_checked: usize,
    pub average_quick_rating: Option<f64>,
    pub average_deep_rating: Option<f64>,
    pub critical_issues_total: usize,
    pub warnings_total: usize,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionQualityDetail {
    pub quick: Option<QualityCheck>,
    pub deep: Option<QualityCheck>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BrowserVerificationCompliance {
    pub ui_touching_sessions: usize,
    pub verified_sessions: usize,
    pub fraction: Option<f64>,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Critical,
    Warning,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct QualityIssue {
    pub session_number: i32,
    pub kind: QualityCheckKind,
    pub severity: IssueSeverity,
    pub message: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct AnalyzerMetrics {
    pub total_analyses: usize,
    pub completed: usize,
    pub failed: usize,
    pub average_quality_impact: Option<f64>,
    pub total_proposals: usize,
    pub proposals_implemented: usize,
}

pub struct OrchestratorFacade {
    orchestrator: Arc<Orchestrator>,
}

impl OrchestratorFacade {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    // ---- Projects ----

    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        self.orchestrator.store().list_projects().await
    }

    pub async fn get_project(&self, id: Uuid) -> Result<Project> {
        self.orchestrator.store().get_project(id).await
    }

    pub async fn get_project_by_name(&self, name: &str) -> Result<Project> {
        self.orchestrator.store().get_project_by_name(name).await
    }

    pub async fn create_project(
        &self,
        name: &str,
        spec_text: Option<String>,
        spec_path: Option<String>,
        workspace_path: &str,
        settings: ProjectSettings,
    ) -> Result<Project> {
        let project = self
            .orchestrator
            .store()
            .create_project(name, spec_text, spec_path, workspace_path, settings)
            .await?;
        self.orchestrator
            .bus()
            .publish(project.id, BroadcastEvent::ProjectCreated { name: project.name.clone() })
            .await;
        Ok(project)
    }

    pub async fn delete_project(&self, id: Uuid) -> Result<()> {
        self.orchestrator.store().delete_project(id).await?;
        self.orchestrator.bus().publish(id, BroadcastEvent::ProjectDeleted).await;
        Ok(())
    }

    pub async fn rename_project(&self, id: Uuid, new_name: &str) -> Result<()> {
        self.orchestrator.store().rename_project(id, new_name).await?;
        self.orchestrator
            .bus()
            .publish(id, BroadcastEvent::ProjectRenamed { new_name: new_name.to_string() })
            .await;
        Ok(())
    }

    pub async fn reset_project(&self, id: Uuid) -> Result<()> {
        self.orchestrator.store().reset_project(id).await?;
        self.orchestrator.bus().publish(id, BroadcastEvent::ProjectReset).await;
        Ok(())
    }

    pub async fn update_project_settings(&self, id: Uuid, settings: ProjectSettings) -> Result<()> {
        self.orchestrator.store().update_project_settings(id, settings).await?;
        self.orchestrator.bus().publish(id, BroadcastEvent::SettingsUpdated).await;
        Ok(())
    }

    pub async fn mark_env_configured(&self, id: Uuid, configured: bool) -> Result<()> {
        self.orchestrator.store().mark_env_configured(id, configured).await?;
        self.orchestrator
            .bus()
            .publish(id, BroadcastEvent::EnvConfigured { configured })
            .await;
        Ok(())
    }

    // ---- Broadcast ----

    /// Registers a live subscriber for `project_id` and immediately pushes
    /// a one-shot `InitialState` snapshot built from the Store, ahead of
    /// whatever events arrive afterward (§4.8, §6).
    pub async fn subscribe(&self, project_id: Uuid) -> Result<crate::broadcast::Subscription> {
        let project = self.orchestrator.store().get_project(project_id).await?;
        let sessions = self.orchestrator.store().list_sessions(project_id).await?;
        let (total_epics, completed_epics) = self.orchestrator.store().epic_progress(project_id).await?;
        let (total_tasks, completed_tasks) = self.orchestrator.store().task_progress(project_id).await?;

        let subscription = self.orchestrator.bus().subscribe(project_id).await;
        self.orchestrator
            .bus()
            .send_to(
                project_id,
                subscription.id,
                BroadcastEvent::InitialState {
                    project,
                    sessions,
                    total_epics,
                    completed_epics,
                    total_tasks,
                    completed_tasks,
                },
            )
            .await;
        Ok(subscription)
    }

    // ---- Session lifecycle ----

    pub async fn initialize(&self, project_id: Uuid) -> Result<Session> {
        self.orchestrator.start_initialization(project_id).await
    }

    pub async fn start_coding(&self, project_id: Uuid, max_iterations_override: Option<i32>) -> Result<Session> {
        self.orchestrator.start_coding_sessions(project_id, max_iterations_override).await
    }

    pub async fn stop_session(&self, project_id: Uuid) -> Result<()> {
        self.orchestrator.stop_session(project_id).await
    }

    pub async fn set_stop_after_current(&self, project_id: Uuid, stop: bool) {
        self.orchestrator.set_stop_after_current(project_id, stop).await;
    }

    pub async fn cancel_initialization(&self, project_id: Uuid) -> Result<()> {
        self.orchestrator.cancel_initialization(project_id).await
    }

    pub async fn active_session(&self, project_id: Uuid) -> Option<ActiveSessionInfo> {
        self.orchestrator.active_session(project_id).await
    }

    // ---- Sessions ----

    pub async fn list_sessions(&self, project_id: Uuid) -> Result<Vec<Session>> {
        self.orchestrator.store().list_sessions(project_id).await
    }

    pub async fn get_session(&self, session_id: Uuid) -> Result<Session> {
        self.orchestrator.store().get_session(session_id).await
    }

    pub async fn get_session_by_number(&self, project_id: Uuid, number: i32) -> Result<Session> {
        self.orchestrator.store().get_session_by_number(project_id, number).await
    }

    // ---- Quality ----

    pub async fn quality_summary(&self, project_id: Uuid) -> Result<ProjectQualitySummary> {
        let store = self.orchestrator.store();
        let sessions = store.list_sessions(project_id).await?;

        let mut sessions_checked = 0usize;
        let (mut quick_sum, mut quick_n) = (0f64, 0usize);
        let (mut deep_sum, mut deep_n) = (0f64, 0usize);
        let mut critical_issues_total = 0usize;
        let mut warnings_total = 0usize;

        for session in sessions.iter().filter(|s| s.session_type != SessionType::Initializer) {
            let quick = store.get_quality_check(session.id, QualityCheckKind::Quick).await?;
            let deep = store.get_quality_check(session.id, QualityCheckKind::Deep).await?;
            if quick.is_some() || deep.is_some() {
                sessions_checked += 1;
            }
            for check in quick.iter().chain(deep.iter()) {
                if let Some(rating) = check.overall_rating {
                    match check.kind {
                        QualityCheckKind::Quick => {
                            quick_sum += rating as f64;
                            quick_n += 1;
                        }
                        QualityCheckKind::Deep => {
                            deep_sum += rating as f64;
                            deep_n += 1;
                        }
                    }
                }
                critical_issues_total += check.critical_issues.len();
                warnings_total += check.warnings.len();
            }
        }

        Ok(ProjectQualitySummary {
            sessions_checked,
            average_quick_rating: (quick_n > 0).then(|| quick_sum / quick_n as f64),
            average_deep_rating: (deep_n > 0).then(|| deep_sum / deep_n as f64),
            critical_issues_total,
            warnings_total,
        })
    }

    pub async fn session_quality(&self, session_id: Uuid) -> Result<SessionQualityDetail> {
        let store = self.orchestrator.store();
        let quick = store.get_quality_check(session_id, QualityCheckKind::Quick).await?;
        let deep = store.get_quality_check(session_id, QualityCheckKind::Deep).await?;
        Ok(SessionQualityDetail { quick, deep })
    }

    pub async fn browser_verification_compliance(
        &self,
        project_id: Uuid,
    ) -> Result<BrowserVerificationCompliance> {
        let store = self.orchestrator.store();
        let sessions = store.list_sessions(project_id).await?;

        let mut ui_touching = 0usize;
        let mut verified = 0usize;
        for session in sessions.iter().filter(|s| s.session_type != SessionType::Initializer) {
            if let Some(quick) = store.get_quality_check(session.id, QualityCheckKind::Quick).await? {
                if quick.metrics.touched_frontend_file {
                    ui_touching += 1;
                    if quick.metrics.playwright_count > 0 {
                        verified += 1;
                    }
                }
            }
        }

        let fraction = (ui_touching > 0).then(|| verified as f64 / ui_touching as f64);
        Ok(BrowserVerificationCompliance {
            ui_touching_sessions: ui_touching,
            verified_sessions: verified,
            fraction,
        })
    }

    pub async fn quality_issues(&self, project_id: Uuid) -> Result<Vec<QualityIssue>> {
        let store = self.orchestrator.store();
        let sessions = store.list_sessions(project_id).await?;

        let mut issues = Vec::new();
        for session in sessions.iter().filter(|s| s.session_type != SessionType::Initializer) {
            for kind in [QualityCheckKind::Quick, QualityCheckKind::Deep] {
                let Some(check) = store.get_quality_check(session.id, kind).await? else {
                    continue;
                };
                for message in &check.critical_issues {
                    issues.push(QualityIssue {
                        session_number: session.session_number,
                        kind,
                        severity: IssueSeverity::Critical,
                        message: message.clone(),
                    });
                }
                for message in &check.warnings {
                    issues.push(QualityIssue {
                        session_number: session.session_number,
                        kind,
                        severity: IssueSeverity::Warning,
                        message: message.clone(),
                    });
                }
            }
        }
        Ok(issues)
    }

    // ---- Logs ----

    /// Session numbers for which a log pair exists on disk (§6 "logs ...
    /// list").
    pub async fn list_session_logs(&self, project_id: Uuid) -> Result<Vec<i32>> {
        let project = self.orchestrator.store().get_project(project_id).await?;
        let sessions = self.orchestrator.store().list_sessions(project_id).await?;
        let logs_dir = PathBuf::from(&project.workspace_path).join("logs");

        let mut numbers = Vec::new();
        for session in sessions {
            if event_log::resolve_session_log_prefix(&logs_dir, session.session_number)?.is_some() {
                numbers.push(session.session_number);
            }
        }
        Ok(numbers)
    }

    pub async fn read_session_log_human(&self, project_id: Uuid, session_number: i32) -> Result<String> {
        let project = self.orchestrator.store().get_project(project_id).await?;
        let logs_dir = PathBuf::from(&project.workspace_path).join("logs");
        let (txt_path, _) = event_log::resolve_session_log_prefix(&logs_dir, session_number)?
            .ok_or_else(|| OrchestratorError::not_found(format!("log for session #{session_number}")))?;
        Ok(tokio::fs::read_to_string(txt_path).await?)
    }

    /// Reads the structured event stream for a session, optionally limited
    /// to the last `tail` records (§6 "logs ... events").
    pub async fn read_session_log_events(
        &self,
        project_id: Uuid,
        session_number: i32,
        tail: Option<usize>,
    ) -> Result<Vec<LogEvent>> {
        let project = self.orchestrator.store().get_project(project_id).await?;
        let logs_dir = PathBuf::from(&project.workspace_path).join("logs");
        let (_, jsonl_path) = event_log::resolve_session_log_prefix(&logs_dir, session_number)?
            .ok_or_else(|| OrchestratorError::not_found(format!("log for session #{session_number}")))?;

        match tail {
            Some(n) => Ok(event_log::tail_events(&jsonl_path, n).await?),
            None => Ok(event_log::read_events(&jsonl_path).await?),
        }
    }

    // ---- Prompt-improvement analyses ----

    /// Finds every project with at least `ELIGIBLE_MIN_SESSIONS` completed
    /// coding sessions within the trailing `ELIGIBLE_WINDOW_DAYS`, optionally
    /// narrowed by sandbox kind (§4.7).
    async fn eligible_projects(
        &self,
        sandbox_kind: Option<SandboxKind>,
        window_start: DateTime<Utc>,
    ) -> Result<Vec<Uuid>> {
        let store = self.orchestrator.store();
        let projects = store.list_projects().await?;

        let mut eligible = Vec::new();
        for project in projects {
            if let Some(kind) = sandbox_kind {
                if project.settings.sandbox_type != kind {
                    continue;
                }
            }
            let sessions = store.list_sessions(project.id).await?;
            let recent_completed = sessions
                .iter()
                .filter(|s| {
                    s.session_type == SessionType::Coding
                        && s.status == SessionStatus::Completed
                        && s.ended_at.map(|t| t >= window_start).unwrap_or(false)
                })
                .count() as i64;
            if recent_completed >= ELIGIBLE_MIN_SESSIONS {
                eligible.push(project.id);
            }
        }
        Ok(eligible)
    }

    /// Builds the signal list the analyzer aggregates over: one entry per
    /// completed coding session in the window, carrying its quick-check
    /// rating/error-rate/frontend signal and any deep-review recommendations.
    async fn collect_signals(
        &self,
        project_ids: &[Uuid],
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<SessionSignal>> {
        let store = self.orchestrator.store();
        let mut signals = Vec::new();

        for project_id in project_ids {
            let sessions = store.list_sessions(*project_id).await?;
            for session in sessions.into_iter().filter(|s| {
                s.session_type == SessionType::Coding
                    && s.status == SessionStatus::Completed
                    && s.ended_at.map(|t| t >= window_start && t <= window_end).unwrap_or(false)
            }) {
                let quick = store.get_quality_check(session.id, QualityCheckKind::Quick).await?;
                let deep = store.get_quality_check(session.id, QualityCheckKind::Deep).await?;

                let (error_rate, touched_frontend_file, playwright_count) = quick
                    .as_ref()
                    .map(|q| (q.metrics.error_rate, q.metrics.touched_frontend_file, q.metrics.playwright_count))
                    .unwrap_or((0.0, false, 0));
                let quick_rating = quick.as_ref().and_then(|q| q.overall_rating);
                let recommendations = deep.as_ref().and_then(|d| d.recommendations.clone()).unwrap_or_default();

                signals.push(SessionSignal {
                    session_id: session.id,
                    quick_rating,
                    error_rate,
                    touched_frontend_file,
                    playwright_count,
                    recommendations,
                });
            }
        }
        Ok(signals)
    }

    async fn run_analysis_pipeline(
        &self,
        project_ids: &[Uuid],
        prompt_file: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<(i32, Vec<EmittedProposal>, serde_json::Value, f64)> {
        let signals = self.collect_signals(project_ids, window_start, window_end).await?;

        let store = self.orchestrator.store();
        let current_prompt_content = store.get_active_prompt_version(prompt_file).await?.map(|v| v.content);
        let llm = self.orchestrator.analysis_llm();
        let model = self.orchestrator.settings().llm.analysis_model.clone();

        let input = AnalyzerInput {
            sessions: &signals,
            prompt_file,
            current_prompt_content: current_prompt_content.as_deref(),
        };
        let output = analyzer::run_analysis(input, Some((llm.as_ref(), &model))).await;

        Ok((
            signals.len() as i32,
            output.proposals,
            output.identified_patterns,
            output.estimated_quality_impact,
        ))
    }

    /// Triggers an analysis run (§4.7/§6). `project_ids: None` picks every
    /// eligible project automatically. Pipeline failures land the analysis
    /// in `failed` with a diagnostic note rather than propagating an error
    /// to the caller; only admission failures (no eligible project, a store
    /// error creating the row) return `Err`.
    pub async fn trigger_analysis(
        &self,
        project_ids: Option<Vec<Uuid>>,
        sandbox_kind: Option<SandboxKind>,
        trigger_source: &str,
        prompt_file: &str,
    ) -> Result<Analysis> {
        let window_end = Utc::now();
        let window_start = window_end - Duration::days(ELIGIBLE_WINDOW_DAYS);

        let candidate_ids = match project_ids {
            Some(ids) if !ids.is_empty() => ids,
            Some(_) => return Err(OrchestratorError::validation("no project ids given")),
            None => self.eligible_projects(sandbox_kind, window_start).await?,
        };
        if candidate_ids.is_empty() {
            return Err(OrchestratorError::state_violation("no eligible projects for analysis"));
        }

        let store = self.orchestrator.store();
        let analysis = store
            .create_analysis(&candidate_ids, sandbox_kind, trigger_source, window_start, window_end)
            .await?;

        for project_id in &candidate_ids {
            self.orchestrator
                .bus()
                .publish(*project_id, BroadcastEvent::AnalysisTriggered { analysis_id: analysis.id })
                .await;
        }

        match self.run_analysis_pipeline(&candidate_ids, prompt_file, window_start, window_end).await {
            Ok((sessions_analyzed, proposals, patterns, impact)) => {
                let proposals_count = proposals.len();
                for p in proposals {
                    store
                        .insert_proposal(
                            analysis.id,
                            NewProposal {
                                prompt_file: prompt_file.to_string(),
                                section_name: p.section_name,
                                change_kind: p.change_kind,
                                original_text: p.original_text,
                                proposed_text: p.proposed_text,
                                rationale: p.rationale,
                                evidence: p.evidence,
                                confidence: p.confidence,
                            },
                        )
                        .await?;
                }
                store.complete_analysis(analysis.id, sessions_analyzed, patterns, impact).await?;
                for project_id in &candidate_ids {
                    self.orchestrator
                        .bus()
                        .publish(
                            *project_id,
                            BroadcastEvent::AnalysisCompleted { analysis_id: analysis.id, proposals: proposals_count },
                        )
                        .await;
                }
            }
            Err(e) => {
                store.fail_analysis(analysis.id, &e.to_string()).await?;
                for project_id in &candidate_ids {
                    self.orchestrator
                        .bus()
                        .publish(
                            *project_id,
                            BroadcastEvent::AnalysisFailed { analysis_id: analysis.id, message: e.to_string() },
                        )
                        .await;
                }
            }
        }

        store.get_analysis(analysis.id).await
    }

    pub async fn list_analyses(&self) -> Result<Vec<Analysis>> {
        self.orchestrator.store().list_analyses().await
    }

    pub async fn get_analysis(&self, id: Uuid) -> Result<Analysis> {
        self.orchestrator.store().get_analysis(id).await
    }

    pub async fn delete_analysis(&self, id: Uuid) -> Result<()> {
        let store = self.orchestrator.store();
        let analysis = store.get_analysis(id).await?;
        store.delete_analysis(id).await?;
        for project_id in &analysis.project_ids {
            self.orchestrator
                .bus()
                .publish(*project_id, BroadcastEvent::AnalysisDeleted { analysis_id: id })
                .await;
        }
        Ok(())
    }

    /// Fleet-wide view across every recorded analysis (§6 "analyses ...
    /// metrics").
    pub async fn analyzer_metrics(&self) -> Result<AnalyzerMetrics> {
        let store = self.orchestrator.store();
        let analyses = store.list_analyses().await?;

        let completed = analyses.iter().filter(|a| a.status == AnalysisStatus::Completed).count();
        let failed = analyses.iter().filter(|a| a.status == AnalysisStatus::Failed).count();
        let impacts: Vec<f64> = analyses.iter().filter_map(|a| a.estimated_quality_impact).collect();
        let average_quality_impact =
            (!impacts.is_empty()).then(|| impacts.iter().sum::<f64>() / impacts.len() as f64);

        let mut total_proposals = 0usize;
        let mut proposals_implemented = 0usize;
        for analysis in &analyses {
            let proposals = store.list_proposals(analysis.id, None).await?;
            total_proposals += proposals.len();
            proposals_implemented += proposals.iter().filter(|p| p.status == ProposalStatus::Implemented).count();
        }

        Ok(AnalyzerMetrics {
            total_analyses: analyses.len(),
            completed,
            failed,
            average_quality_impact,
            total_proposals,
            proposals_implemented,
        })
    }

    // ---- Proposals ----

    pub async fn list_proposals(&self, analysis_id: Uuid, status: Option<ProposalStatus>) -> Result<Vec<Proposal>> {
        self.orchestrator.store().list_proposals(analysis_id, status).await
    }

    pub async fn get_proposal(&self, id: Uuid) -> Result<Proposal> {
        self.orchestrator.store().get_proposal(id).await
    }

    pub async fn update_proposal_status(&self, proposal_id: Uuid, status: ProposalStatus) -> Result<()> {
        let store = self.orchestrator.store();
        let proposal = store.get_proposal(proposal_id).await?;
        store.update_proposal_status(proposal_id, status).await?;

        let analysis = store.get_analysis(proposal.analysis_id).await?;
        for project_id in &analysis.project_ids {
            self.orchestrator
                .bus()
                .publish(
                    *project_id,
                    BroadcastEvent::ProposalStatusChanged { proposal_id, status: status.as_str().to_string() },
                )
                .await;
        }
        Ok(())
    }

    /// Applies an `accepted` proposal: derives the new prompt-file content
    /// from the before/after text it carries, records it as a fresh
    /// `PromptVersion`, activates it, and marks the proposal `implemented`
    /// with the version it produced (§9 "apply proposal" resolution).
    pub async fn apply_proposal(&self, proposal_id: Uuid, applied_by: &str) -> Result<PromptVersion> {
        let store = self.orchestrator.store();
        let proposal = store.get_proposal(proposal_id).await?;
        if proposal.status != ProposalStatus::Accepted {
            return Err(OrchestratorError::state_violation(format!(
                "proposal {proposal_id} must be accepted before it can be applied (currently {})",
                proposal.status.as_str()
            )));
        }

        let current = store.get_active_prompt_version(&proposal.prompt_file).await?;
        let base_content = current.as_ref().map(|v| v.content.as_str()).unwrap_or("");
        let new_content = apply_proposal_to_content(base_content, &proposal);
        let next_ordinal = current
            .as_ref()
            .and_then(|v| v.version_label.trim_start_matches('v').parse::<u64>().ok())
            .unwrap_or(0)
            + 1;
        let version_label = format!("v{next_ordinal}");

        let version = store
            .create_prompt_version(&proposal.prompt_file, &version_label, &new_content, false)
            .await?;
        store.activate_prompt_version(version.id).await?;
        store.mark_proposal_applied(proposal_id, applied_by, version.id).await?;

        let analysis = store.get_analysis(proposal.analysis_id).await?;
        for project_id in &analysis.project_ids {
            self.orchestrator
                .bus()
                .publish(
                    *project_id,
                    BroadcastEvent::ProposalApplied { proposal_id, prompt_version_id: version.id },
                )
                .await;
        }

        Ok(version)
    }

    // ---- Prompt versions ----

    pub async fn list_prompt_versions(&self, prompt_file: &str) -> Result<Vec<PromptVersion>> {
        self.orchestrator.store().list_prompt_versions(prompt_file).await
    }

    /// Prompt versions aren't scoped to a single project, so this publishes
    /// on the nil topic rather than a project's own (§6).
    pub async fn activate_prompt_version(&self, id: Uuid) -> Result<()> {
        self.orchestrator.store().activate_prompt_version(id).await?;
        self.orchestrator
            .bus()
            .publish(Uuid::nil(), BroadcastEvent::PromptVersionActivated { prompt_version_id: id })
            .await;
        Ok(())
    }
}

/// Derives a prompt file's new content from a proposal's before/after
/// section text. Additions append a new `## <section>` block; deletions
/// remove the named block; modifications replace the proposal's
/// `original_text` in place if present, falling back to replacing the whole
/// section body.
fn apply_proposal_to_content(base: &str, proposal: &Proposal) -> String {
    let marker = format!("## {}", proposal.section_name);

    match proposal.change_kind {
        ChangeKind::Addition => format!("{base}\n\n{marker}\n{}\n", proposal.proposed_text),
        ChangeKind::Deletion => match find_section(base, &marker) {
            Some((start, end)) => format!("{}{}", &base[..start], &base[end..]),
            None => base.to_string(),
        },
        ChangeKind::Modification => {
            if !proposal.original_text.is_empty() && base.contains(&proposal.original_text) {
                base.replacen(&proposal.original_text, &proposal.proposed_text, 1)
            } else if let Some((start, end)) = find_section(base, &marker) {
                format!("{}{marker}\n{}\n{}", &base[..start], proposal.proposed_text, &base[end..])
            } else {
                format!("{base}\n\n{marker}\n{}\n", proposal.proposed_text)
            }
        }
    }
}

/// Finds a `## <name>` section's byte range, running to the next `## `
/// heading or end of file.
fn find_section(content: &str, marker: &str) -> Option<(usize, usize)> {
    let start = content.find(marker)?;
    let rest = &content[start..];
    let end = rest[marker.len()..]
        .find("\n## ")
        .map(|offset| start + marker.len() + offset + 1)
        .unwrap_or(content.len());
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposal(change_kind: ChangeKind, section: &str, original: &str, proposed: &str) -> Proposal {
        Proposal {
            id: Uuid::new_v4(),
            analysis_id: Uuid::new_v4(),
            prompt_file: "coding_system_prompt".to_string(),
            section_name: section.to_string(),
            change_kind,
            original_text: original.to_string(),
            proposed_text: proposed.to_string(),
            rationale: "test".to_string(),
            evidence: Vec::new(),
            confidence: 5,
            status: ProposalStatus::Accepted,
            applied_at: None,
            applied_by: None,
            applied_prompt_version_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn addition_appends_a_new_section() {
        let base = "# Prompt\n\n## Existing\nbody\n";
        let p = proposal(ChangeKind::Addition, "New Rule", "", "Always run tests first.");
        let result = apply_proposal_to_content(base, &p);
        assert!(result.contains("## New Rule"));
        assert!(result.contains("Always run tests first."));
        assert!(result.contains("## Existing"));
    }

    #[test]
    fn modification_replaces_original_text_in_place() {
        let base = "# Prompt\n\n## Testing\nWrite some tests.\n\n## Other\nmore\n";
        let p = proposal(ChangeKind::Modification, "Testing", "Write some tests.", "Write tests for every change.");
        let result = apply_proposal_to_content(base, &p);
        assert!(result.contains("Write tests for every change."));
        assert!(!result.contains("Write some tests."));
        assert!(result.contains("## Other"));
    }

    #[test]
    fn deletion_removes_the_named_section_only() {
        let base = "# Prompt\n\n## Drop Me\nstale guidance\n\n## Keep Me\nkept\n";
        let p = proposal(ChangeKind::Deletion, "Drop Me", "", "");
        let result = apply_proposal_to_content(base, &p);
        assert!(!result.contains("Drop Me"));
        assert!(!result.contains("stale guidance"));
        assert!(result.contains("## Keep Me"));
        assert!(result.contains("kept"));
    }
}

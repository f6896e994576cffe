use uuid::Uuid;

use crate::domain::{Session, SessionMetrics, SessionStatus, SessionType};
use crate::error::{OrchestratorError, Result};

use super::Store;

/// Retry bound for session-number allocation races (§4.1).
const MAX_ALLOCATION_ATTEMPTS: u32 = 5;

struct SessionRow {
    id: Uuid,
    project_id: Uuid,
    session_number: i32,
    session_type: String,
    model: String,
    status: String,
    max_iterations: Option<i32>,
    error_message: Option<String>,
    interruption_reason: Option<String>,
    metrics: Option<serde_json::Value>,
    created_at: chrono::DateTime<chrono::Utc>,
    started_at: Option<chrono::DateTime<chrono::Utc>>,
    ended_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl SessionRow {
    fn into_domain(self) -> Result<Session> {
        let session_type = SessionType::parse(&self.session_type).ok_or_else(|| {
            OrchestratorError::corrupt(format!("bad session_type: {}", self.session_type))
        })?;
        let status = SessionStatus::parse(&self.status)
            .ok_or_else(|| OrchestratorError::corrupt(format!("bad session status: {}", self.status)))?;
        let metrics = self
            .metrics
            .map(serde_json::from_value::<SessionMetrics>)
            .transpose()
            .map_err(|e| OrchestratorError::corrupt(format!("session metrics: {e}")))?;

        Ok(Session {
            id: self.id,
            project_id: self.project_id,
            session_number: self.session_number,
            session_type,
            model: self.model,
            status,
            max_iterations: self.max_iterations,
            error_message: self.error_message,
            interruption_reason: self.interruption_reason,
            metrics,
            created_at: self.created_at,
            started_at: self.started_at,
            ended_at: self.ended_at,
        })
    }
}

impl Store {
    /// Picks `max(session_number) + 1` for the project and inserts a
    /// `pending` row. Retries on a unique-violation race against the
    /// `(project_id, session_number)` index, up to `MAX_ALLOCATION_ATTEMPTS`.
    pub async fn allocate_session(
        &self,
        project_id: Uuid,
        session_type: SessionType,
        model: &str,
        max_iterations: Option<i32>,
    ) -> Result<Session> {
        for attempt in 0..MAX_ALLOCATION_ATTEMPTS {
            let next_number = sqlx::query!(
                r#"select coalesce(max(session_number), -1) + 1 as "next!" from sessions where project_id = $1"#,
                project_id,
            )
            .fetch_one(&self.pool)
            .await?
            .next;

            let inserted = sqlx::query_as!(
                SessionRow,
                r#"
                insert into sessions (project_id, session_number, session_type, model, max_iterations)
                values ($1, $2, $3, $4, $5)
                returning id, project_id, session_number, session_type, model, status,
                          max_iterations, error_message, interruption_reason, metrics,
                          created_at, started_at, ended_at
                "#,
                project_id,
                next_number,
                session_type.as_str(),
                model,
                max_iterations,
            )
            .fetch_one(&self.pool)
            .await;

            match inserted {
                Ok(row) => return row.into_domain(),
                Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                    tracing::warn!(
                        attempt,
                        project_id = %project_id,
                        "session number race, retrying allocation"
                    );
                    continue;
                }
                Err(e) => return Err(OrchestratorError::from(e)),
            }
        }
        Err(OrchestratorError::conflict(
            "exhausted retries allocating session number",
        ))
    }

    pub async fn get_active_session(&self, project_id: Uuid) -> Result<Option<Session>> {
        let row = sqlx::query_as!(
            SessionRow,
            r#"
            select id, project_id, session_number, session_type, model, status,
                   max_iterations, error_message, interruption_reason, metrics,
                   created_at, started_at, ended_at
            from sessions where project_id = $1 and status = 'running'
            "#,
            project_id,
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(SessionRow::into_domain).transpose()
    }

    pub async fn get_session(&self, id: Uuid) -> Result<Session> {
        let row = sqlx::query_as!(
            SessionRow,
            r#"
            select id, project_id, session_number, session_type, model, status,
                   max_iterations, error_message, interruption_reason, metrics,
                   created_at, started_at, ended_at
            from sessions where id = $1
            "#,
            id,
        )
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| OrchestratorError::not_found(format!("session {id}")))?;

        row.into_domain()
    }

    pub async fn get_session_by_number(&self, project_id: Uuid, number: i32) -> Result<Session> {
        let row = sqlx::query_as!(
            SessionRow,
            r#"
            select id, project_id, session_number, session_type, model, status,
                   max_iterations, error_message, interruption_reason, metrics,
                   created_at, started_at, ended_at
            from sessions where project_id = $1 and session_number = $2
            "#,
            project_id,
            number,
        )
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| OrchestratorError::not_found(format!("session #{number} for {project_id}")))?;

        row.into_domain()
    }

    pub async fn list_sessions(&self, project_id: Uuid) -> Result<Vec<Session>> {
        let rows = sqlx::query_as!(
            SessionRow,
            r#"
            select id, project_id, session_number, session_type, model, status,
                   max_iterations, error_message, interruption_reason, metrics,
                   created_at, started_at, ended_at
            from sessions where project_id = $1 order by session_number asc
            "#,
            project_id,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SessionRow::into_domain).collect()
    }

    pub async fn mark_session_started(&self, id: Uuid) -> Result<()> {
        sqlx::query!(
            "update sessions set status = 'running', started_at = now() where id = $1 and status = 'pending'",
            id,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Idempotent: once `ended_at` is set, later calls are no-ops (§8).
    pub async fn mark_session_terminal(
        &self,
        id: Uuid,
        status: SessionStatus,
        error_message: Option<&str>,
        interruption_reason: Option<&str>,
        metrics: Option<&SessionMetrics>,
    ) -> Result<()> {
        if !status.is_terminal() {
            return Err(OrchestratorError::state_violation(format!(
                "{status} is not a terminal status"
            )));
        }
        let metrics_json = metrics.map(serde_json::to_value).transpose()?;

        sqlx::query!(
            r#"
            update sessions
            set status = $1, error_message = $2, interruption_reason = $3,
                metrics = coalesce($4, metrics), ended_at = now()
            where id = $5 and ended_at is null
            "#,
            status.as_str(),
            error_message,
            interruption_reason,
            metrics_json,
            id,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Deletes every session for a project, cascading to its quality
    /// checks, as part of a full project reset (§6).
    pub async fn delete_sessions_for_project(&self, project_id: Uuid) -> Result<()> {
        sqlx::query!("delete from sessions where project_id = $1", project_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Transitions sessions stuck `running` past their type's inactivity
    /// threshold to `interrupted`. Returns the number reconciled.
    pub async fn cleanup_stale_sessions(&self) -> Result<u64> {
        let mut total = 0u64;
        for (session_type, minutes) in [
            (SessionType::Initializer, 30i64),
            (SessionType::Coding, 10i64),
            (SessionType::Review, 5i64),
        ] {
            let result = sqlx::query!(
                r#"
                update sessions
                set status = 'interrupted',
                    interruption_reason = 'stale: exceeded inactivity threshold',
                    ended_at = now()
                where status = 'running'
                  and session_type = $1
                  and started_at is not null
                  and started_at < now() - make_interval(mins => $2::int)
                "#,
                session_type.as_str(),
                minutes as i32,
            )
            .execute(&self.pool)
            .await?;
            total += result.rows_affected();
        }
        Ok(total)
    }
}

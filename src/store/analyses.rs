use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Analysis, AnalysisStatus, SandboxKind};
use crate::error::{OrchestratorError, Result};

use super::Store;

struct AnalysisRow {
    id: Uuid,
    project_ids: Vec<Uuid>,
    sandbox_kind: Option<String>,
    status: String,
    trigger_source: String,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    sessions_analyzed: i32,
    identified_patterns: serde_json::Value,
    estimated_quality_impact: Option<f64>,
    failure_note: Option<String>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl AnalysisRow {
    fn into_domain(self) -> Result<Analysis> {
        let status = AnalysisStatus::parse(&self.status)
            .ok_or_else(|| OrchestratorError::corrupt(format!("bad analysis status: {}", self.status)))?;
        let sandbox_kind = self
            .sandbox_kind
            .map(|s| {
                SandboxKind::parse(&s)
                    .ok_or_else(|| OrchestratorError::corrupt(format!("bad sandbox kind: {s}")))
            })
            .transpose()?;

        Ok(Analysis {
            id: self.id,
            project_ids: self.project_ids,
            sandbox_kind,
            status,
            trigger_source: self.trigger_source,
            window_start: self.window_start,
            window_end: self.window_end,
            sessions_analyzed: self.sessions_analyzed,
            identified_patterns: self.identified_patterns,
            estimated_quality_impact: self.estimated_quality_impact,
            failure_note: self.failure_note,
            created_at: self.created_at,
            completed_at: self.completed_at,
        })
    }
}

impl Store {
    pub async fn create_analysis(
        &self,
        project_ids: &[Uuid],
        sandbox_kind: Option<SandboxKind>,
        trigger_source: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Analysis> {
        let sandbox_str = sandbox_kind.map(|k| k.as_str().to_string());
        let row = sqlx::query_as!(
            AnalysisRow,
            r#"
            insert into prompt_improvement_analyses
                (project_ids, sandbox_kind, trigger_source, window_start, window_end)
            values ($1, $2, $3, $4, $5)
            returning id, project_ids, sandbox_kind, status, trigger_source, window_start,
                      window_end, sessions_analyzed, identified_patterns,
                      estimated_quality_impact, failure_note, created_at, completed_at
            "#,
            project_ids,
            sandbox_str,
            trigger_source,
            window_start,
            window_end,
        )
        .fetch_one(&self.pool)
        .await?;

        row.into_domain()
    }

    pub async fn complete_analysis(
        &self,
        id: Uuid,
        sessions_analyzed: i32,
        identified_patterns: serde_json::Value,
        estimated_quality_impact: f64,
    ) -> Result<()> {
        sqlx::query!(
            r#"
            update prompt_improvement_analyses
            set status = 'completed', sessions_analyzed = $1, identified_patterns = $2,
                estimated_quality_impact = $3, completed_at = now()
            where id = $4
            "#,
            sessions_analyzed,
            identified_patterns,
            estimated_quality_impact,
            id,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn fail_analysis(&self, id: Uuid, note: &str) -> Result<()> {
        sqlx::query!(
            r#"
            update prompt_improvement_analyses
            set status = 'failed', failure_note = $1, completed_at = now()
            where id = $2
            "#,
            note,
            id,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_analysis(&self, id: Uuid) -> Result<Analysis> {
        let row = sqlx::query_as!(
            AnalysisRow,
            r#"
            select id, project_ids, sandbox_kind, status, trigger_source, window_start,
                   window_end, sessions_analyzed, identified_patterns,
                   estimated_quality_impact, failure_note, created_at, completed_at
            from prompt_improvement_analyses where id = $1
            "#,
            id,
        )
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| OrchestratorError::not_found(format!("analysis {id}")))?;

        row.into_domain()
    }

    pub async fn list_analyses(&self) -> Result<Vec<Analysis>> {
        let rows = sqlx::query_as!(
            AnalysisRow,
            r#"
            select id, project_ids, sandbox_kind, status, trigger_source, window_start,
                   window_end, sessions_analyzed, identified_patterns,
                   estimated_quality_impact, failure_note, created_at, completed_at
            from prompt_improvement_analyses order by created_at desc
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AnalysisRow::into_domain).collect()
    }

    pub async fn delete_analysis(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query!("delete from prompt_improvement_analyses where id = $1", id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(OrchestratorError::not_found(format!("analysis {id}")));
        }
        Ok(())
    }
}

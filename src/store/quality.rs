use uuid::Uuid;

use crate::domain::{QualityCheck, QualityCheckKind, QualityCheckStatus, QualityMetrics};
use crate::error::{OrchestratorError, Result};

use super::Store;

struct QualityRow {
    id: Uuid,
    session_id: Uuid,
    kind: String,
    status: String,
    overall_rating: Option<i32>,
    metrics: serde_json::Value,
    critical_issues: serde_json::Value,
    warnings: serde_json::Value,
    review_text: Option<String>,
    recommendations: Option<serde_json::Value>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl QualityRow {
    fn into_domain(self) -> Result<QualityCheck> {
        let kind = QualityCheckKind::parse(&self.kind)
            .ok_or_else(|| OrchestratorError::corrupt(format!("bad quality kind: {}", self.kind)))?;
        let status = QualityCheckStatus::parse(&self.status).ok_or_else(|| {
            OrchestratorError::corrupt(format!("bad quality status: {}", self.status))
        })?;
        let metrics: QualityMetrics = serde_json::from_value(self.metrics)
            .map_err(|e| OrchestratorError::corrupt(format!("quality metrics: {e}")))?;
        let critical_issues: Vec<String> = serde_json::from_value(self.critical_issues)?;
        let warnings: Vec<String> = serde_json::from_value(self.warnings)?;
        let recommendations = self
            .recommendations
            .map(serde_json::from_value::<Vec<String>>)
            .transpose()?;

        Ok(QualityCheck {
            id: self.id,
            session_id: self.session_id,
            kind,
            status,
            overall_rating: self.overall_rating,
            metrics,
            critical_issues,
            warnings,
            review_text: self.review_text,
            recommendations,
            created_at: self.created_at,
        })
    }
}

pub struct NewQualityCheck {
    pub kind: QualityCheckKind,
    pub status: QualityCheckStatus,
    pub overall_rating: Option<i32>,
    pub metrics: QualityMetrics,
    pub critical_issues: Vec<String>,
    pub warnings: Vec<String>,
    pub review_text: Option<String>,
    pub recommendations: Option<Vec<String>>,
}

impl Store {
    /// Fails with `Conflict` if a check of the same kind already exists for
    /// this session (§3 invariant: at most one quick and one deep check per
    /// session).
    pub async fn insert_quality_check(
        &self,
        session_id: Uuid,
        check: NewQualityCheck,
    ) -> Result<QualityCheck> {
        let metrics_json = serde_json::to_value(&check.metrics)?;
        let critical_json = serde_json::to_value(&check.critical_issues)?;
        let warnings_json = serde_json::to_value(&check.warnings)?;
        let recommendations_json = check
            .recommendations
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        let row = sqlx::query_as!(
            QualityRow,
            r#"
            insert into session_quality_checks
                (session_id, kind, status, overall_rating, metrics, critical_issues, warnings,
                 review_text, recommendations)
            values ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            returning id, session_id, kind, status, overall_rating, metrics, critical_issues,
                      warnings, review_text, recommendations, created_at
            "#,
            session_id,
            check.kind.as_str(),
            check.status.as_str(),
            check.overall_rating,
            metrics_json,
            critical_json,
            warnings_json,
            check.review_text,
            recommendations_json,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                OrchestratorError::conflict(format!(
                    "a {} quality check already exists for session {session_id}",
                    check.kind
                ))
            }
            _ => OrchestratorError::from(e),
        })?;

        row.into_domain()
    }

    pub async fn get_quality_check(
        &self,
        session_id: Uuid,
        kind: QualityCheckKind,
    ) -> Result<Option<QualityCheck>> {
        let row = sqlx::query_as!(
            QualityRow,
            r#"
            select id, session_id, kind, status, overall_rating, metrics, critical_issues,
                   warnings, review_text, recommendations, created_at
            from session_quality_checks where session_id = $1 and kind = $2
            "#,
            session_id,
            kind.as_str(),
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(QualityRow::into_domain).transpose()
    }

    /// The most recent session number carrying a recorded deep review for a
    /// project, used by the trigger policy's "behind by N" rule.
    pub async fn last_deep_reviewed_session_number(&self, project_id: Uuid) -> Result<Option<i32>> {
        let row = sqlx::query!(
            r#"
            select max(s.session_number) as number
            from session_quality_checks q
            join sessions s on s.id = q.session_id
            where s.project_id = $1 and q.kind = 'deep'
            "#,
            project_id,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(row.number)
    }
}

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{ChangeKind, Proposal, ProposalStatus};
use crate::error::{OrchestratorError, Result};

use super::Store;

struct ProposalRow {
    id: Uuid,
    analysis_id: Uuid,
    prompt_file: String,
    section_name: String,
    change_kind: String,
    original_text: String,
    proposed_text: String,
    rationale: String,
    evidence: serde_json::Value,
    confidence: i32,
    status: String,
    applied_at: Option<DateTime<Utc>>,
    applied_by: Option<String>,
    applied_prompt_version_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl ProposalRow {
    fn into_domain(self) -> Result<Proposal> {
        let change_kind = ChangeKind::parse(&self.change_kind)
            .ok_or_else(|| OrchestratorError::corrupt(format!("bad change kind: {}", self.change_kind)))?;
        let status = ProposalStatus::parse(&self.status)
            .ok_or_else(|| OrchestratorError::corrupt(format!("bad proposal status: {}", self.status)))?;
        let evidence: Vec<String> = serde_json::from_value(self.evidence)?;

        Ok(Proposal {
            id: self.id,
            analysis_id: self.analysis_id,
            prompt_file: self.prompt_file,
            section_name: self.section_name,
            change_kind,
            original_text: self.original_text,
            proposed_text: self.proposed_text,
            rationale: self.rationale,
            evidence,
            confidence: self.confidence,
            status,
            applied_at: self.applied_at,
            applied_by: self.applied_by,
            applied_prompt_version_id: self.applied_prompt_version_id,
            created_at: self.created_at,
        })
    }
}

pub struct NewProposal {
    pub prompt_file: String,
    pub section_name: String,
    pub change_kind: ChangeKind,
    pub original_text: String,
    pub proposed_text: String,
    pub rationale: String,
    pub evidence: Vec<String>,
    pub confidence: i32,
}

impl Store {
    pub async fn insert_proposal(&self, analysis_id: Uuid, p: NewProposal) -> Result<Proposal> {
        let evidence_json = serde_json::to_value(&p.evidence)?;
        let row = sqlx::query_as!(
            ProposalRow,
            r#"
            insert into prompt_proposals
                (analysis_id, prompt_file, section_name, change_kind, original_text,
                 proposed_text, rationale, evidence, confidence)
            values ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            returning id, analysis_id, prompt_file, section_name, change_kind, original_text,
                      proposed_text, rationale, evidence, confidence, status,
                      applied_at, applied_by, applied_prompt_version_id, created_at
            "#,
            analysis_id,
            p.prompt_file,
            p.section_name,
            p.change_kind.as_str(),
            p.original_text,
            p.proposed_text,
            p.rationale,
            evidence_json,
            p.confidence,
        )
        .fetch_one(&self.pool)
        .await?;

        row.into_domain()
    }

    pub async fn list_proposals(
        &self,
        analysis_id: Uuid,
        status: Option<ProposalStatus>,
    ) -> Result<Vec<Proposal>> {
        let rows = match status {
            Some(status) => {
                sqlx::query_as!(
                    ProposalRow,
                    r#"
                    select id, analysis_id, prompt_file, section_name, change_kind, original_text,
                           proposed_text, rationale, evidence, confidence, status,
                           applied_at, applied_by, applied_prompt_version_id, created_at
                    from prompt_proposals
                    where analysis_id = $1 and status = $2
                    order by confidence desc
                    "#,
                    analysis_id,
                    status.as_str(),
                )
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as!(
                    ProposalRow,
                    r#"
                    select id, analysis_id, prompt_file, section_name, change_kind, original_text,
                           proposed_text, rationale, evidence, confidence, status,
                           applied_at, applied_by, applied_prompt_version_id, created_at
                    from prompt_proposals
                    where analysis_id = $1
                    order by confidence desc
                    "#,
                    analysis_id,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(ProposalRow::into_domain).collect()
    }

    pub async fn get_proposal(&self, id: Uuid) -> Result<Proposal> {
        let row = sqlx::query_as!(
            ProposalRow,
            r#"
            select id, analysis_id, prompt_file, section_name, change_kind, original_text,
                   proposed_text, rationale, evidence, confidence, status,
                   applied_at, applied_by, applied_prompt_version_id, created_at
            from prompt_proposals where id = $1
            "#,
            id,
        )
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| OrchestratorError::not_found(format!("proposal {id}")))?;

        row.into_domain()
    }

    pub async fn update_proposal_status(&self, id: Uuid, status: ProposalStatus) -> Result<()> {
        let result = sqlx::query!(
            "update prompt_proposals set status = $1 where id = $2",
            status.as_str(),
            id,
        )
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OrchestratorError::not_found(format!("proposal {id}")));
        }
        Ok(())
    }

    /// Completes the "apply proposal" flow (SPEC_FULL.md §9): records which
    /// prompt version the application produced, alongside the terminal
    /// `implemented` status and an attribution/applied-at stamp.
    pub async fn mark_proposal_applied(
        &self,
        id: Uuid,
        applied_by: &str,
        prompt_version_id: Uuid,
    ) -> Result<()> {
        let result = sqlx::query!(
            r#"
            update prompt_proposals
            set status = 'implemented', applied_at = now(), applied_by = $1,
                applied_prompt_version_id = $2
            where id = $3
            "#,
            applied_by,
            prompt_version_id,
            id,
        )
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OrchestratorError::not_found(format!("proposal {id}")));
        }
        Ok(())
    }
}

use uuid::Uuid;

use crate::domain::PromptVersion;
use crate::error::{OrchestratorError, Result};

use super::Store;

struct PromptVersionRow {
    id: Uuid,
    prompt_file: String,
    version_label: String,
    content: String,
    is_active: bool,
    is_default: bool,
    performance_summary: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<PromptVersionRow> for PromptVersion {
    fn from(r: PromptVersionRow) -> Self {
        PromptVersion {
            id: r.id,
            prompt_file: r.prompt_file,
            version_label: r.version_label,
            content: r.content,
            is_active: r.is_active,
            is_default: r.is_default,
            performance_summary: r.performance_summary,
            created_at: r.created_at,
        }
    }
}

impl Store {
    pub async fn create_prompt_version(
        &self,
        prompt_file: &str,
        version_label: &str,
        content: &str,
        is_default: bool,
    ) -> Result<PromptVersion> {
        let row = sqlx::query_as!(
            PromptVersionRow,
            r#"
            insert into prompt_versions (prompt_file, version_label, content, is_default)
            values ($1, $2, $3, $4)
            returning id, prompt_file, version_label, content, is_active, is_default,
                      performance_summary, created_at
            "#,
            prompt_file,
            version_label,
            content,
            is_default,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                OrchestratorError::conflict(format!(
                    "version {version_label} already exists for {prompt_file}"
                ))
            }
            _ => OrchestratorError::from(e),
        })?;

        Ok(row.into())
    }

    pub async fn list_prompt_versions(&self, prompt_file: &str) -> Result<Vec<PromptVersion>> {
        let rows = sqlx::query_as!(
            PromptVersionRow,
            r#"
            select id, prompt_file, version_label, content, is_active, is_default,
                   performance_summary, created_at
            from prompt_versions where prompt_file = $1 order by created_at desc
            "#,
            prompt_file,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn get_active_prompt_version(&self, prompt_file: &str) -> Result<Option<PromptVersion>> {
        let row = sqlx::query_as!(
            PromptVersionRow,
            r#"
            select id, prompt_file, version_label, content, is_active, is_default,
                   performance_summary, created_at
            from prompt_versions where prompt_file = $1 and is_active
            "#,
            prompt_file,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Activates `id`, deactivating any sibling version of the same prompt
    /// file atomically in a single transaction (§3).
    pub async fn activate_prompt_version(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let prompt_file = sqlx::query!("select prompt_file from prompt_versions where id = $1", id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| OrchestratorError::not_found(format!("prompt version {id}")))?
            .prompt_file;

        sqlx::query!(
            "update prompt_versions set is_active = false where prompt_file = $1",
            prompt_file,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query!("update prompt_versions set is_active = true where id = $1", id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

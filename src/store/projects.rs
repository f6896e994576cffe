use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::{is_valid_project_name, Project, ProjectSettings};
use crate::error::{OrchestratorError, Result};

use super::Store;

struct ProjectRow {
    id: Uuid,
    name: String,
    spec_text: Option<String>,
    spec_path: Option<String>,
    workspace_path: String,
    settings: Value,
    env_configured: bool,
    metadata: Value,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
    completed_at: Option<chrono::DateTime<Utc>>,
}

impl ProjectRow {
    fn into_domain(self) -> Result<Project> {
        let settings: ProjectSettings = serde_json::from_value(self.settings)
            .map_err(|e| OrchestratorError::corrupt(format!("project settings: {e}")))?;
        Ok(Project {
            id: self.id,
            name: self.name,
            spec_text: self.spec_text,
            spec_path: self.spec_path,
            workspace_path: self.workspace_path,
            settings,
            env_configured: self.env_configured,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
            completed_at: self.completed_at,
        })
    }
}

impl Store {
    pub async fn create_project(
        &self,
        name: &str,
        spec_text: Option<String>,
        spec_path: Option<String>,
        workspace_path: &str,
        settings: ProjectSettings,
    ) -> Result<Project> {
        if !is_valid_project_name(name) {
            return Err(OrchestratorError::validation(format!(
                "invalid project name: {name}"
            )));
        }
        let settings = settings.normalized();
        let settings_json = serde_json::to_value(&settings)?;

        let row = sqlx::query_as!(
            ProjectRow,
            r#"
            insert into projects (name, spec_text, spec_path, workspace_path, settings)
            values ($1, $2, $3, $4, $5)
            returning id, name, spec_text, spec_path, workspace_path, settings,
                      env_configured, metadata, created_at, updated_at, completed_at
            "#,
            name,
            spec_text,
            spec_path,
            workspace_path,
            settings_json,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                OrchestratorError::conflict(format!("project name already taken: {name}"))
            }
            _ => OrchestratorError::from(e),
        })?;

        row.into_domain()
    }

    pub async fn get_project(&self, id: Uuid) -> Result<Project> {
        let row = sqlx::query_as!(
            ProjectRow,
            r#"
            select id, name, spec_text, spec_path, workspace_path, settings,
                   env_configured, metadata, created_at, updated_at, completed_at
            from projects where id = $1
            "#,
            id,
        )
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| OrchestratorError::not_found(format!("project {id}")))?;

        row.into_domain()
    }

    pub async fn get_project_by_name(&self, name: &str) -> Result<Project> {
        let row = sqlx::query_as!(
            ProjectRow,
            r#"
            select id, name, spec_text, spec_path, workspace_path, settings,
                   env_configured, metadata, created_at, updated_at, completed_at
            from projects where name = $1
            "#,
            name,
        )
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| OrchestratorError::not_found(format!("project {name}")))?;

        row.into_domain()
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        let rows = sqlx::query_as!(
            ProjectRow,
            r#"
            select id, name, spec_text, spec_path, workspace_path, settings,
                   env_configured, metadata, created_at, updated_at, completed_at
            from projects order by created_at asc
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ProjectRow::into_domain).collect()
    }

    pub async fn rename_project(&self, id: Uuid, new_name: &str) -> Result<()> {
        if !is_valid_project_name(new_name) {
            return Err(OrchestratorError::validation(format!(
                "invalid project name: {new_name}"
            )));
        }
        let result = sqlx::query!(
            "update projects set name = $1, updated_at = now() where id = $2",
            new_name,
            id,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                OrchestratorError::conflict(format!("project name already taken: {new_name}"))
            }
            _ => OrchestratorError::from(e),
        })?;

        if result.rows_affected() == 0 {
            return Err(OrchestratorError::not_found(format!("project {id}")));
        }
        Ok(())
    }

    pub async fn update_project_settings(&self, id: Uuid, settings: ProjectSettings) -> Result<()> {
        let settings = settings.normalized();
        let settings_json = serde_json::to_value(&settings)?;
        let result = sqlx::query!(
            "update projects set settings = $1, updated_at = now() where id = $2",
            settings_json,
            id,
        )
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OrchestratorError::not_found(format!("project {id}")));
        }
        Ok(())
    }

    pub async fn mark_env_configured(&self, id: Uuid, configured: bool) -> Result<()> {
        let result = sqlx::query!(
            "update projects set env_configured = $1, updated_at = now() where id = $2",
            configured,
            id,
        )
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OrchestratorError::not_found(format!("project {id}")));
        }
        Ok(())
    }

    pub async fn update_project_metadata(&self, id: Uuid, metadata: Value) -> Result<()> {
        let result = sqlx::query!(
            "update projects set metadata = $1, updated_at = now() where id = $2",
            metadata,
            id,
        )
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OrchestratorError::not_found(format!("project {id}")));
        }
        Ok(())
    }

    /// Stores the coverage-analysis snapshot produced by
    /// `quality::coverage` under `metadata.coverage_snapshot`, merging with
    /// (rather than clobbering) the rest of the metadata blob.
    pub async fn record_coverage_snapshot(&self, id: Uuid, snapshot: Value) -> Result<()> {
        let project = self.get_project(id).await?;
        let mut metadata = project.metadata;
        if !metadata.is_object() {
            metadata = Value::Object(Default::default());
        }
        metadata["coverage_snapshot"] = snapshot;
        self.update_project_metadata(id, metadata).await
    }

    pub async fn mark_project_completed(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query!(
            "update projects set completed_at = now(), updated_at = now() where id = $1 and completed_at is null",
            id,
        )
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Idempotent: either already completed, or missing (we don't
            // distinguish here; callers check existence via get_project).
            return Ok(());
        }
        Ok(())
    }

    /// Wipes a project's generated work back to a pre-initialization state:
    /// deletes every epic (cascading to tasks/tests) and session (cascading
    /// to quality checks), clears `completed_at` and the metadata blob, but
    /// preserves the project row, its spec, and its workspace path so
    /// initialization can be re-run against the same project (§6 "reset").
    pub async fn reset_project(&self, id: Uuid) -> Result<()> {
        self.get_project(id).await?;
        self.delete_epics_for_project(id).await?;
        self.delete_sessions_for_project(id).await?;

        let result = sqlx::query!(
            "update projects set completed_at = null, metadata = '{}'::jsonb, updated_at = now() where id = $1",
            id,
        )
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OrchestratorError::not_found(format!("project {id}")));
        }
        Ok(())
    }

    pub async fn delete_project(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query!("delete from projects where id = $1", id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(OrchestratorError::not_found(format!("project {id}")));
        }
        Ok(())
    }
}

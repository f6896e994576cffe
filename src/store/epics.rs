use uuid::Uuid;

use crate::domain::{Epic, WorkStatus};
use crate::error::{OrchestratorError, Result};

use super::Store;

struct EpicRow {
    id: Uuid,
    project_id: Uuid,
    name: String,
    description: String,
    priority: i32,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl EpicRow {
    fn into_domain(self) -> Result<Epic> {
        let status = WorkStatus::parse(&self.status)
            .ok_or_else(|| OrchestratorError::corrupt(format!("bad epic status: {}", self.status)))?;
        Ok(Epic {
            id: self.id,
            project_id: self.project_id,
            name: self.name,
            description: self.description,
            priority: self.priority,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl Store {
    pub async fn create_epic(
        &self,
        project_id: Uuid,
        name: &str,
        description: &str,
        priority: i32,
    ) -> Result<Epic> {
        let row = sqlx::query_as!(
            EpicRow,
            r#"
            insert into epics (project_id, name, description, priority)
            values ($1, $2, $3, $4)
            returning id, project_id, name, description, priority, status, created_at, updated_at
            "#,
            project_id,
            name,
            description,
            priority,
        )
        .fetch_one(&self.pool)
        .await?;

        row.into_domain()
    }

    pub async fn list_epics(&self, project_id: Uuid) -> Result<Vec<Epic>> {
        let rows = sqlx::query_as!(
            EpicRow,
            r#"
            select id, project_id, name, description, priority, status, created_at, updated_at
            from epics where project_id = $1 order by priority desc, created_at asc
            "#,
            project_id,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EpicRow::into_domain).collect()
    }

    pub async fn update_epic_status(&self, id: Uuid, status: WorkStatus) -> Result<()> {
        let result = sqlx::query!(
            "update epics set status = $1, updated_at = now() where id = $2",
            status.as_str(),
            id,
        )
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OrchestratorError::not_found(format!("epic {id}")));
        }
        Ok(())
    }

    /// (total epics, epics with status = done)
    pub async fn epic_progress(&self, project_id: Uuid) -> Result<(i64, i64)> {
        let row = sqlx::query!(
            r#"
            select count(*) as "total!", count(*) filter (where status = 'done') as "done!"
            from epics where project_id = $1
            "#,
            project_id,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok((row.total, row.done))
    }

    /// Deletes every epic for a project, cascading to its tasks and tests
    /// (§4.5 "cancel initialization" and §6 project reset both need this —
    /// the project row, its spec, and its workspace are left untouched so
    /// either path can re-run initialization from scratch).
    pub async fn delete_epics_for_project(&self, project_id: Uuid) -> Result<()> {
        sqlx::query!("delete from epics where project_id = $1", project_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

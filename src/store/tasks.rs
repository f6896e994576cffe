use uuid::Uuid;

use crate::domain::{Task, WorkStatus};
use crate::error::{OrchestratorError, Result};

use super::Store;

struct TaskRow {
    id: Uuid,
    project_id: Uuid,
    epic_id: Uuid,
    description: String,
    action: Option<String>,
    status: String,
    ordering: i32,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TaskRow {
    fn into_domain(self) -> Result<Task> {
        let status = WorkStatus::parse(&self.status)
            .ok_or_else(|| OrchestratorError::corrupt(format!("bad task status: {}", self.status)))?;
        Ok(Task {
            id: self.id,
            project_id: self.project_id,
            epic_id: self.epic_id,
            description: self.description,
            action: self.action,
            status,
            ordering: self.ordering,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl Store {
    pub async fn create_task(
        &self,
        project_id: Uuid,
        epic_id: Uuid,
        description: &str,
        action: Option<&str>,
        ordering: i32,
    ) -> Result<Task> {
        let row = sqlx::query_as!(
            TaskRow,
            r#"
            insert into tasks (project_id, epic_id, description, action, ordering)
            values ($1, $2, $3, $4, $5)
            returning id, project_id, epic_id, description, action, status, ordering,
                      created_at, updated_at
            "#,
            project_id,
            epic_id,
            description,
            action,
            ordering,
        )
        .fetch_one(&self.pool)
        .await?;

        row.into_domain()
    }

    pub async fn list_tasks_for_epic(&self, epic_id: Uuid) -> Result<Vec<Task>> {
        let rows = sqlx::query_as!(
            TaskRow,
            r#"
            select id, project_id, epic_id, description, action, status, ordering,
                   created_at, updated_at
            from tasks where epic_id = $1 order by ordering asc, created_at asc
            "#,
            epic_id,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TaskRow::into_domain).collect()
    }

    pub async fn list_tasks_for_project(&self, project_id: Uuid) -> Result<Vec<Task>> {
        let rows = sqlx::query_as!(
            TaskRow,
            r#"
            select id, project_id, epic_id, description, action, status, ordering,
                   created_at, updated_at
            from tasks where project_id = $1 order by epic_id, ordering asc
            "#,
            project_id,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TaskRow::into_domain).collect()
    }

    pub async fn update_task_status(&self, id: Uuid, status: WorkStatus) -> Result<()> {
        let result = sqlx::query!(
            "update tasks set status = $1, updated_at = now() where id = $2",
            status.as_str(),
            id,
        )
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OrchestratorError::not_found(format!("task {id}")));
        }
        Ok(())
    }

    /// (total tasks, done tasks) for a whole project — used by the coding
    /// loop's "all tasks complete" check.
    pub async fn task_progress(&self, project_id: Uuid) -> Result<(i64, i64)> {
        let row = sqlx::query!(
            r#"
            select count(*) as "total!", count(*) filter (where status = 'done') as "done!"
            from tasks where project_id = $1
            "#,
            project_id,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok((row.total, row.done))
    }
}

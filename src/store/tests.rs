use uuid::Uuid;

use crate::domain::{TestCase, WorkStatus};
use crate::error::{OrchestratorError, Result};

use super::Store;

struct TestRow {
    id: Uuid,
    project_id: Uuid,
    task_id: Uuid,
    description: String,
    status: String,
    last_run_result: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TestRow {
    fn into_domain(self) -> Result<TestCase> {
        let status = WorkStatus::parse(&self.status)
            .ok_or_else(|| OrchestratorError::corrupt(format!("bad test status: {}", self.status)))?;
        Ok(TestCase {
            id: self.id,
            project_id: self.project_id,
            task_id: self.task_id,
            description: self.description,
            status,
            last_run_result: self.last_run_result,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl Store {
    pub async fn create_test(
        &self,
        project_id: Uuid,
        task_id: Uuid,
        description: &str,
    ) -> Result<TestCase> {
        let row = sqlx::query_as!(
            TestRow,
            r#"
            insert into tests (project_id, task_id, description)
            values ($1, $2, $3)
            returning id, project_id, task_id, description, status, last_run_result,
                      created_at, updated_at
            "#,
            project_id,
            task_id,
            description,
        )
        .fetch_one(&self.pool)
        .await?;

        row.into_domain()
    }

    pub async fn list_tests_for_project(&self, project_id: Uuid) -> Result<Vec<TestCase>> {
        let rows = sqlx::query_as!(
            TestRow,
            r#"
            select id, project_id, task_id, description, status, last_run_result,
                   created_at, updated_at
            from tests where project_id = $1 order by task_id, created_at asc
            "#,
            project_id,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TestRow::into_domain).collect()
    }

    pub async fn update_test_result(
        &self,
        id: Uuid,
        status: WorkStatus,
        last_run_result: Option<&str>,
    ) -> Result<()> {
        let result = sqlx::query!(
            "update tests set status = $1, last_run_result = $2, updated_at = now() where id = $3",
            status.as_str(),
            last_run_result,
            id,
        )
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OrchestratorError::not_found(format!("test {id}")));
        }
        Ok(())
    }
}

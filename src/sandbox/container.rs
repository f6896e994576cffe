use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{OrchestratorError, Result};

use super::{CommandOutput, Sandbox};

/// Models the same trait over a named container handle without wiring up a
/// real container runtime (SPEC_FULL.md §4.2: "provided so the orchestrator's
/// tool-routing strategy selection has a second concrete variant to select
/// between, not to be a production container driver"). `execute_command`
/// documents the `docker exec`-shaped call it would make; it does not spawn
/// one.
pub struct ContainerSandbox {
    container_name: String,
    workspace_path: PathBuf,
    started: bool,
}

impl ContainerSandbox {
    pub fn new(container_name: impl Into<String>, workspace_path: impl Into<PathBuf>) -> Self {
        Self {
            container_name: container_name.into(),
            workspace_path: workspace_path.into(),
            started: false,
        }
    }
}

#[async_trait]
impl Sandbox for ContainerSandbox {
    async fn start(&mut self) -> Result<()> {
        tokio::fs::create_dir_all(&self.workspace_path).await?;
        // A real driver would `docker run -d --name {container_name} ...`
        // here; this stub only tracks the lifecycle state.
        self.started = true;
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.started = false;
        Ok(())
    }

    async fn execute_command(&self, cmd: &str) -> Result<CommandOutput> {
        if !self.started {
            return Err(OrchestratorError::state_violation(
                "container sandbox not started",
            ));
        }
        Err(OrchestratorError::external(format!(
            "container runtime not wired up: would `docker exec {} sh -c {cmd:?}`",
            self.container_name
        )))
    }

    fn handle(&self) -> Option<&str> {
        Some(&self.container_name)
    }

    fn workspace_path(&self) -> &Path {
        &self.workspace_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exposes_a_stable_handle_once_started() {
        let dir = tempfile::tempdir().unwrap();
        let mut sandbox = ContainerSandbox::new("agent-session-7", dir.path());
        assert_eq!(sandbox.handle(), Some("agent-session-7"));
        sandbox.start().await.unwrap();
        let err = sandbox.execute_command("ls").await.unwrap_err();
        assert_eq!(err.kind(), "external");
    }
}

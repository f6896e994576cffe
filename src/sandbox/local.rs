use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{OrchestratorError, Result};

use super::{CommandOutput, Sandbox};

/// Host-process workspace: the project's own directory, no isolation beyond
/// the working directory. `execute_command` shells out directly via
/// `tokio::process::Command`, generalizing the teacher's pure-`git2`
/// repo-provisioning helpers (which never needed an arbitrary shell
/// command) to the broader `execute_command` capability this system's
/// agent needs.
pub struct LocalSandbox {
    workspace_path: PathBuf,
    started: bool,
}

impl LocalSandbox {
    pub fn new(workspace_path: impl Into<PathBuf>) -> Self {
        Self {
            workspace_path: workspace_path.into(),
            started: false,
        }
    }
}

#[async_trait]
impl Sandbox for LocalSandbox {
    async fn start(&mut self) -> Result<()> {
        tokio::fs::create_dir_all(&self.workspace_path).await?;
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
                "local sandbox not started",
            ));
        }
        let output = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .current_dir(&self.workspace_path)
            .output()
            .await?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            return_code: output.status.code().unwrap_or(-1),
        })
    }

    fn handle(&self) -> Option<&str> {
        None
    }

    fn workspace_path(&self) -> &Path {
        &self.workspace_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_a_command_after_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut sandbox = LocalSandbox::new(dir.path());
        sandbox.start().await.unwrap();

        let out = sandbox.execute_command("echo hello").await.unwrap();
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.return_code, 0);
        assert_eq!(sandbox.handle(), None);

        sandbox.stop().await.unwrap();
    }

    #[tokio::test]
    async fn rejects_commands_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = LocalSandbox::new(dir.path());
        let err = sandbox.execute_command("echo hi").await.unwrap_err();
        assert_eq!(err.kind(), "state_violation");
    }
}

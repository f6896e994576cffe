//! The per-session scoped workspace resource (§4.2).

mod container;
mod local;

pub use container::ContainerSandbox;
pub use local::LocalSandbox;

use async_trait::async_trait;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub return_code: i32,
}

/// `start`/`stop`/`execute_command`, plus a stable opaque handle the Agent
/// Runner passes through to the LLM's tool-call routing strategy (§9).
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Provisions the workspace. Failure here aborts session creation; the
    /// caller transitions the session to `error` (§4.2).
    async fn start(&mut self) -> Result<()>;

    /// Releases the resource. Errors are logged by the caller and never
    /// propagated — the session result is already final by the time this
    /// runs.
    async fn stop(&mut self) -> Result<()>;

    async fn execute_command(&self, cmd: &str) -> Result<CommandOutput>;

    /// `None` for a local (host-process) sandbox; `Some(name)` for a
    /// container, used by the tool-routing strategy to decide whether shell
    /// tool calls need redirecting.
    fn handle(&self) -> Option<&str>;

    fn workspace_path(&self) -> &std::path::Path;
}

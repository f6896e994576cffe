use async_trait::async_trait;

use crate::error::Result;
use crate::sandbox::Sandbox;

/// Tool-call routing is a strategy selected when constructing the Agent
/// Runner (SPEC_FULL.md §9): a container handle present routes shell-shaped
/// tool calls through the sandbox, absent routes them to the host. All
/// other tool calls (task-manager, browser-automation, file edit) pass
/// through unmodified — this crate doesn't implement those tools itself,
/// only the routing decision for the one tool shape (`bash`/`shell`) that
/// needs sandbox redirection.
#[async_trait]
pub trait ToolRoutingStrategy: Send + Sync {
    async fn dispatch(&self, tool_name: &str, input: &serde_json::Value) -> Result<String>;
}

/// No sandbox handle: shell-shaped tool calls run directly on the host via
/// the sandbox's own `execute_command` (a `LocalSandbox` IS the host).
pub struct Local<'a> {
    sandbox: &'a dyn Sandbox,
}

impl<'a> Local<'a> {
    pub fn new(sandbox: &'a dyn Sandbox) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl<'a> ToolRoutingStrategy for Local<'a> {
    async fn dispatch(&self, tool_name: &str, input: &serde_json::Value) -> Result<String> {
        dispatch_shared(self.sandbox, tool_name, input).await
    }
}

/// A container handle is present: shell-shaped tool calls are redirected
/// into the named container via the sandbox's `execute_command`; every
/// other tool call is passed through untouched (there is nothing to
/// redirect — those tools don't touch the workspace shell at all).
pub struct Sandboxed<'a> {
    sandbox: &'a dyn Sandbox,
}

impl<'a> Sandboxed<'a> {
    pub fn new(sandbox: &'a dyn Sandbox) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl<'a> ToolRoutingStrategy for Sandboxed<'a> {
    async fn dispatch(&self, tool_name: &str, input: &serde_json::Value) -> Result<String> {
        dispatch_shared(self.sandbox, tool_name, input).await
    }
}

async fn dispatch_shared(
    sandbox: &dyn Sandbox,
    tool_name: &str,
    input: &serde_json::Value,
) -> Result<String> {
    if !is_shell_tool(tool_name) {
        return Ok(format!("{{\"note\":\"tool {tool_name} passed through unmodified\"}}"));
    }
    let command = input
        .get("command")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    let output = sandbox.execute_command(command).await?;
    Ok(serde_json::json!({
        "stdout": output.stdout,
        "stderr": output.stderr,
        "return_code": output.return_code,
    })
    .to_string())
}

fn is_shell_tool(name: &str) -> bool {
    matches!(name.to_lowercase().as_str(), "bash" | "shell" | "execute_command" | "run_command")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::LocalSandbox;

    #[tokio::test]
    async fn routes_shell_tool_through_sandbox() {
        let dir = tempfile::tempdir().unwrap();
        let mut sandbox = LocalSandbox::new(dir.path());
        sandbox.start().await.unwrap();

        let strategy = Local::new(&sandbox);
        let result = strategy
            .dispatch("bash", &serde_json::json!({"command": "echo routed"}))
            .await
            .unwrap();
        assert!(result.contains("routed"));
    }

    #[tokio::test]
    async fn passes_through_non_shell_tools() {
        let dir = tempfile::tempdir().unwrap();
        let mut sandbox = LocalSandbox::new(dir.path());
        sandbox.start().await.unwrap();

        let strategy = Local::new(&sandbox);
        let result = strategy
            .dispatch("task_manager_complete", &serde_json::json!({}))
            .await
            .unwrap();
        assert!(result.contains("passed through"));
    }
}

use crate::domain::{SandboxKind, SessionType};

/// Table-driven `(SessionType, SandboxKind) -> &'static str` prompt
/// selection (§4.4), mirroring the original's separate initializer/coding
/// system prompts plus a container-aware variant that tells the agent to
/// route shell work through the sandbox tool rather than assume direct
/// host access.
pub fn system_prompt_for(session_type: SessionType, sandbox_kind: SandboxKind) -> &'static str {
    match (session_type, sandbox_kind) {
        (SessionType::Initializer, SandboxKind::Local) => INITIALIZER_LOCAL,
        (SessionType::Initializer, SandboxKind::Container) => INITIALIZER_CONTAINER,
        (SessionType::Coding, SandboxKind::Local) => CODING_LOCAL,
        (SessionType::Coding, SandboxKind::Container) => CODING_CONTAINER,
        (SessionType::Review, SandboxKind::Local) => REVIEW_LOCAL,
        (SessionType::Review, SandboxKind::Container) => REVIEW_CONTAINER,
    }
}

const INITIALIZER_LOCAL: &str = "\
You are initializing a new coding project. Read the specification in the \
workspace, then break it down into epics, tasks, and tests using the task \
manager tool. Do not write any implementation code yet. You have direct \
access to the host shell for the workspace directory.";

const INITIALIZER_CONTAINER: &str = "\
You are initializing a new coding project. Read the specification in the \
workspace, then break it down into epics, tasks, and tests using the task \
manager tool. Do not write any implementation code yet. All shell commands \
run inside your assigned container; use the shell tool exactly as you \
would on a host, it will be routed there transparently.";

const CODING_LOCAL: &str = "\
You are continuing work on an existing project. Check the task manager \
for the next pending task, implement it, write and run tests, verify any \
UI changes in a real browser, and commit your changes with git before \
finishing. You have direct access to the host shell for the workspace \
directory.";

const CODING_CONTAINER: &str = "\
You are continuing work on an existing project. Check the task manager \
for the next pending task, implement it, write and run tests, verify any \
UI changes in a real browser, and commit your changes with git before \
finishing. All shell commands run inside your assigned container; use the \
shell tool exactly as you would on a host, it will be routed there \
transparently.";

const REVIEW_LOCAL: &str = "\
You are reviewing the current state of the project for quality. Do not \
make code changes. Summarize what was accomplished, call out risks, and \
recommend follow-up tasks. You have direct access to the host shell for \
the workspace directory.";

const REVIEW_CONTAINER: &str = "\
You are reviewing the current state of the project for quality. Do not \
make code changes. Summarize what was accomplished, call out risks, and \
recommend follow-up tasks. All shell commands run inside your assigned \
container.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_a_distinct_prompt_per_combination() {
        let a = system_prompt_for(SessionType::Initializer, SandboxKind::Local);
        let b = system_prompt_for(SessionType::Coding, SandboxKind::Container);
        assert_ne!(a, b);
        assert!(b.contains("container"));
    }
}

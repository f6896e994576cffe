use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Initializer,
    Coding,
    Review,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Initializer => "initializer",
            SessionType::Coding => "coding",
            SessionType::Review => "review",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "initializer" => Some(SessionType::Initializer),
            "coding" => Some(SessionType::Coding),
            "review" => Some(SessionType::Review),
            _ => None,
        }
    }
}

impl std::fmt::Display for SessionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Running,
    Completed,
    Error,
    Interrupted,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Error | SessionStatus::Interrupted
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Error => "error",
            SessionStatus::Interrupted => "interrupted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SessionStatus::Pending),
            "running" => Some(SessionStatus::Running),
            "completed" => Some(SessionStatus::Completed),
            "error" => Some(SessionStatus::Error),
            "interrupted" => Some(SessionStatus::Interrupted),
            _ => None,
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fixed set of fields the Agent Runner accumulates over one session,
/// persisted verbatim as the session's `metrics` JSONB column. Field names
/// are carried over from the original implementation's summary dict.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub message_count: u32,
    pub tool_use_count: u32,
    pub tool_error_count: u32,
    pub tasks_completed: u32,
    pub tests_passed: u32,
    pub playwright_count: u32,
    pub playwright_screenshot_count: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
    pub cost_usd: f64,
    pub response_length: u32,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub project_id: Uuid,
    pub session_number: i32,
    pub session_type: SessionType,
    pub model: String,
    pub status: SessionStatus,
    pub max_iterations: Option<i32>,
    pub error_message: Option<String>,
    pub interruption_reason: Option<String>,
    pub metrics: Option<SessionMetrics>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Session {
    /// The fixed per-type inactivity cap used by the stale-session sweeper.
    pub fn stale_after(session_type: SessionType) -> chrono::Duration {
        match session_type {
            SessionType::Initializer => chrono::Duration::minutes(30),
            SessionType::Coding => chrono::Duration::minutes(10),
            SessionType::Review => chrono::Duration::minutes(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Error.is_terminal());
        assert!(SessionStatus::Interrupted.is_terminal());
        assert!(!SessionStatus::Pending.is_terminal());
        assert!(!SessionStatus::Running.is_terminal());
    }

    #[test]
    fn stale_thresholds_match_spec() {
        assert_eq!(
            Session::stale_after(SessionType::Initializer),
            chrono::Duration::minutes(30)
        );
        assert_eq!(
            Session::stale_after(SessionType::Coding),
            chrono::Duration::minutes(10)
        );
        assert_eq!(
            Session::stale_after(SessionType::Review),
            chrono::Duration::minutes(5)
        );
    }
}

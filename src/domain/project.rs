use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Which workspace isolation strategy a project's sessions run under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SandboxKind {
    Local,
    Container,
}

impl Default for SandboxKind {
    fn default() -> Self {
        SandboxKind::Local
    }
}

impl SandboxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SandboxKind::Local => "local",
            SandboxKind::Container => "container",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "local" => Some(SandboxKind::Local),
            "container" => Some(SandboxKind::Container),
            _ => None,
        }
    }
}

impl std::fmt::Display for SandboxKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-project overrides, stored as the `settings` JSONB column.
///
/// `sandbox_type` is a typed field here rather than buried in free-form
/// metadata at two different JSON paths, resolving the ambiguity noted in
/// SPEC_FULL.md §9.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectSettings {
    pub sandbox_type: SandboxKind,
    pub initializer_model: Option<String>,
    pub coding_model: Option<String>,
    pub max_iterations: Option<i32>,
    pub auto_continue: bool,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            sandbox_type: SandboxKind::default(),
            initializer_model: None,
            coding_model: None,
            max_iterations: None,
            auto_continue: true,
        }
    }
}

impl ProjectSettings {
    /// Normalizes `max_iterations = Some(0)` to `None`; both mean
    /// "unlimited" everywhere in this crate, so only one representation
    /// should ever exist once a value crosses the Store boundary.
    pub fn normalized(mut self) -> Self {
        if self.max_iterations == Some(0) {
            self.max_iterations = None;
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub spec_text: Option<String>,
    pub spec_path: Option<String>,
    pub workspace_path: String,
    pub settings: ProjectSettings,
    pub env_configured: bool,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Project {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// `[a-z0-9_-]+`, matching the Store-layer validation contract in §3/§4.1.
pub fn is_valid_project_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_project_name() {
        assert!(is_valid_project_name("youtube-coach"));
        assert!(is_valid_project_name("project_1"));
        assert!(!is_valid_project_name("Has Spaces"));
        assert!(!is_valid_project_name("UPPER"));
        assert!(!is_valid_project_name(""));
    }

    #[test]
    fn normalizes_zero_max_iterations_to_unlimited() {
        let settings = ProjectSettings {
            max_iterations: Some(0),
            ..Default::default()
        }
        .normalized();
        assert_eq!(settings.max_iterations, None);
    }
}

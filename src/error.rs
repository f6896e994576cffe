use thiserror::Error;

/// The crate-wide error taxonomy. Every component boundary classifies its
/// underlying failure into one of these kinds rather than leaking raw
/// library errors (`sqlx::Error`, `reqwest::Error`, ...) past its own walls.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid state transition: {0}")]
    StateViolation(String),

    #[error("external dependency failed: {0}")]
    External(String),

    #[error("interrupted")]
    Interrupted,

    #[error("corrupt data: {0}")]
    Corrupt(String),
}

impl OrchestratorError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(what: impl Into<String>) -> Self {
        Self::Conflict(what.into())
    }

    pub fn validation(what: impl Into<String>) -> Self {
        Self::Validation(what.into())
    }

    pub fn state_violation(what: impl Into<String>) -> Self {
        Self::StateViolation(what.into())
    }

    pub fn external(what: impl Into<String>) -> Self {
        Self::External(what.into())
    }

    pub fn corrupt(what: impl Into<String>) -> Self {
        Self::Corrupt(what.into())
    }

    /// A stable, machine-readable tag for the kind, independent of the
    /// human message carried inside it.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Validation(_) => "validation",
            Self::StateViolation(_) => "state_violation",
            Self::External(_) => "external",
            Self::Interrupted => "interrupted",
            Self::Corrupt(_) => "corrupt",
        }
    }
}

impl From<sqlx::Error> for OrchestratorError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound(err.to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::Conflict(db_err.message().to_string())
            }
            _ => Self::External(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for OrchestratorError {
    fn from(err: reqwest::Error) -> Self {
        Self::External(format!("llm transport: {err}"))
    }
}

impl From<std::io::Error> for OrchestratorError {
    fn from(err: std::io::Error) -> Self {
        Self::External(format!("io: {err}"))
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Corrupt(format!("json: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

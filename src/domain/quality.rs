use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityCheckKind {
    Quick,
    Deep,
}

impl QualityCheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityCheckKind::Quick => "quick",
            QualityCheckKind::Deep => "deep",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "quick" => Some(QualityCheckKind::Quick),
            "deep" => Some(QualityCheckKind::Deep),
            _ => None,
        }
    }
}

/// `Failed` is a deep review whose LLM response didn't parse; it is stored
/// rather than omitted so "no deep review attempted" and "deep review
/// attempted but unparseable" stay distinguishable (SPEC_FULL.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityCheckStatus {
    Ok,
    Failed,
}

impl QualityCheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityCheckStatus::Ok => "ok",
            QualityCheckStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ok" => Some(QualityCheckStatus::Ok),
            "failed" => Some(QualityCheckStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub total_tool_uses: u32,
    pub error_count: u32,
    pub error_rate: f64,
    pub playwright_count: u32,
    pub playwright_screenshot_count: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
    pub duration_seconds: f64,
    /// Whether the session touched a frontend-ish file, the same signal the
    /// quick check uses to require browser verification. Carried through so
    /// the analyzer can compute "UI-touching sessions" without re-reading
    /// the event log (§4.7).
    #[serde(default)]
    pub touched_frontend_file: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityCheck {
    pub id: Uuid,
    pub session_id: Uuid,
    pub kind: QualityCheckKind,
    pub status: QualityCheckStatus,
    pub overall_rating: Option<i32>,
    pub metrics: QualityMetrics,
    pub critical_issues: Vec<String>,
    pub warnings: Vec<String>,
    pub review_text: Option<String>,
    pub recommendations: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

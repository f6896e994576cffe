use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptVersion {
    pub id: Uuid,
    pub prompt_file: String,
    pub version_label: String,
    pub content: String,
    pub is_active: bool,
    pub is_default: bool,
    pub performance_summary: Option<String>,
    pub created_at: DateTime<Utc>,
}

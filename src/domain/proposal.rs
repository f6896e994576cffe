use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Addition,
    Modification,
    Deletion,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Addition => "addition",
            ChangeKind::Modification => "modification",
            ChangeKind::Deletion => "deletion",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "addition" => Some(ChangeKind::Addition),
            "modification" => Some(ChangeKind::Modification),
            "deletion" => Some(ChangeKind::Deletion),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Proposed,
    Accepted,
    Rejected,
    Implemented,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Proposed => "proposed",
            ProposalStatus::Accepted => "accepted",
            ProposalStatus::Rejected => "rejected",
            ProposalStatus::Implemented => "implemented",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "proposed" => Some(ProposalStatus::Proposed),
            "accepted" => Some(ProposalStatus::Accepted),
            "rejected" => Some(ProposalStatus::Rejected),
            "implemented" => Some(ProposalStatus::Implemented),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: Uuid,
    pub analysis_id: Uuid,
    pub prompt_file: String,
    pub section_name: String,
    pub change_kind: ChangeKind,
    pub original_text: String,
    pub proposed_text: String,
    pub rationale: String,
    pub evidence: Vec<String>,
    pub confidence: i32,
    pub status: ProposalStatus,
    pub applied_at: Option<DateTime<Utc>>,
    pub applied_by: Option<String>,
    pub applied_prompt_version_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

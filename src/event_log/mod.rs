//! Per-session append-only dual stream (§4.3): a human-readable narrative
//! and a structured JSONL stream, the latter being the authoritative input
//! to the quality pipeline (§4.6). Grounded on this crate's `tracing`
//! append-to-file convention, generalized to a record format the quality
//! pipeline can re-read and tolerate truncation in, per §6's crash-
//! consistency contract.

mod reader;
mod writer;

pub use reader::{read_events, tail_events};
pub use writer::EventLogWriter;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    SessionStart,
    ToolUse {
        name: String,
        arguments_digest: String,
    },
    ToolResult {
        tool_use_ref: String,
        ok: bool,
        content_summary: String,
    },
    AssistantText {
        text: String,
    },
    SessionEnd {
        status: String,
        summary: serde_json::Value,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub session_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Resolves the prefix form `session_<n>` to the concrete timestamped
/// filename on disk, per §6: "Retrieval endpoints support a prefix form
/// that resolves to the matching concrete file."
pub fn resolve_session_log_prefix(
    logs_dir: &std::path::Path,
    session_number: i32,
) -> std::io::Result<Option<(std::path::PathBuf, std::path::PathBuf)>> {
    let prefix = format!("session_{session_number:04}_");
    let mut txt_path = None;
    let mut jsonl_path = None;

    if !logs_dir.exists() {
        return Ok(None);
    }

    for entry in std::fs::read_dir(logs_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with(&prefix) {
            continue;
        }
        if name.ends_with(".txt") {
            txt_path = Some(entry.path());
        } else if name.ends_with(".jsonl") {
            jsonl_path = Some(entry.path());
        }
    }

    match (txt_path, jsonl_path) {
        (Some(t), Some(j)) => Ok(Some((t, j))),
        _ => Ok(None),
    }
}

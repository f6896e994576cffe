use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::Result;

use super::{EventKind, LogEvent};

/// Writes the human-readable `.txt` narrative and the structured `.jsonl`
/// stream for one session, side by side under `<project>/logs/`.
pub struct EventLogWriter {
    session_id: Uuid,
    human: File,
    structured: File,
}

impl EventLogWriter {
    pub async fn create(
        logs_dir: &Path,
        session_id: Uuid,
        session_number: i32,
    ) -> Result<(Self, PathBuf, PathBuf)> {
        tokio::fs::create_dir_all(logs_dir).await?;

        let timestamp = Utc::now().format("%Y%m%dT%H%M%SZ");
        let stem = format!("session_{session_number:04}_{timestamp}");
        let txt_path = logs_dir.join(format!("{stem}.txt"));
        let jsonl_path = logs_dir.join(format!("{stem}.jsonl"));

        let human = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&txt_path)
            .await?;
        let structured = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&jsonl_path)
            .await?;

        Ok((
            Self {
                session_id,
                human,
                structured,
            },
            txt_path,
            jsonl_path,
        ))
    }

    pub async fn write(&mut self, kind: EventKind) -> Result<()> {
        let event = LogEvent {
            session_id: self.session_id,
            timestamp: Utc::now(),
            kind,
        };

        let narrative = narrate(&event);
        self.human.write_all(narrative.as_bytes()).await?;
        self.human.write_all(b"\n").await?;
        self.human.flush().await?;

        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');
        self.structured.write_all(&line).await?;
        self.structured.flush().await?;

        Ok(())
    }
}

fn narrate(event: &LogEvent) -> String {
    let ts = event.timestamp.to_rfc3339();
    match &event.kind {
        EventKind::SessionStart => format!("[{ts}] session started"),
        EventKind::ToolUse { name, .. } => format!("[{ts}] tool_use: {name}"),
        EventKind::ToolResult { tool_use_ref, ok, .. } => {
            format!("[{ts}] tool_result for {tool_use_ref}: {}", if *ok { "ok" } else { "error" })
        }
        EventKind::AssistantText { text } => format!("[{ts}] assistant: {text}"),
        EventKind::SessionEnd { status, .. } => format!("[{ts}] session ended: {status}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_both_streams() {
        let dir = tempfile::tempdir().unwrap();
        let session_id = Uuid::new_v4();
        let (mut writer, txt_path, jsonl_path) =
            EventLogWriter::create(dir.path(), session_id, 3).await.unwrap();

        writer.write(EventKind::SessionStart).await.unwrap();
        writer
            .write(EventKind::ToolUse {
                name: "bash".into(),
                arguments_digest: "echo hi".into(),
            })
            .await
            .unwrap();

        let human = tokio::fs::read_to_string(&txt_path).await.unwrap();
        assert!(human.contains("session started"));
        assert!(human.contains("tool_use: bash"));

        let structured = tokio::fs::read_to_string(&jsonl_path).await.unwrap();
        assert_eq!(structured.lines().count(), 2);
    }
}

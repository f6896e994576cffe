use std::path::Path;

use super::LogEvent;

/// Parses every well-formed record from a JSONL event stream, silently
/// dropping malformed or truncated lines (§4.3/§6: "a truncated final line
/// is tolerated by consumers; partial records must not yield metric errors,
/// only be skipped").
pub async fn read_events(jsonl_path: &Path) -> std::io::Result<Vec<LogEvent>> {
    let content = tokio::fs::read_to_string(jsonl_path).await?;
    Ok(parse_lines(&content))
}

/// Returns the last `n` valid records, for a live-tail broadcast relay
/// (§4.3). Still tolerant of a truncated final line.
pub async fn tail_events(jsonl_path: &Path, n: usize) -> std::io::Result<Vec<LogEvent>> {
    let content = tokio::fs::read_to_string(jsonl_path).await?;
    let mut events = parse_lines(&content);
    if events.len() > n {
        events.drain(0..events.len() - n);
    }
    Ok(events)
}

fn parse_lines(content: &str) -> Vec<LogEvent> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str::<LogEvent>(line).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::{EventKind, EventLogWriter};
    use uuid::Uuid;

    #[tokio::test]
    async fn skips_a_truncated_final_line() {
        let dir = tempfile::tempdir().unwrap();
        let session_id = Uuid::new_v4();
        let (mut writer, _txt, jsonl) =
            EventLogWriter::create(dir.path(), session_id, 1).await.unwrap();
        writer.write(EventKind::SessionStart).await.unwrap();
        writer
            .write(EventKind::AssistantText {
                text: "hello".into(),
            })
            .await
            .unwrap();

        // Simulate a crash mid-write: append a truncated JSON fragment.
        let mut raw = tokio::fs::read_to_string(&jsonl).await.unwrap();
        raw.push_str(r#"{"session_id":"#);
        tokio::fs::write(&jsonl, raw).await.unwrap();

        let events = read_events(&jsonl).await.unwrap();
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn tail_returns_last_n() {
        let dir = tempfile::tempdir().unwrap();
        let session_id = Uuid::new_v4();
        let (mut writer, _txt, jsonl) =
            EventLogWriter::create(dir.path(), session_id, 2).await.unwrap();
        for i in 0..5 {
            writer
                .write(EventKind::AssistantText {
                    text: format!("msg {i}"),
                })
                .await
                .unwrap();
        }

        let tailed = tail_events(&jsonl, 2).await.unwrap();
        assert_eq!(tailed.len(), 2);
        if let EventKind::AssistantText { text } = &tailed[1].kind {
            assert_eq!(text, "msg 4");
        } else {
            panic!("expected assistant text");
        }
    }
}

use crate::domain::{QualityMetrics, SessionMetrics, SessionStatus};
use crate::event_log::{EventKind, LogEvent};

use super::thresholds::ERROR_RATE_CRITICAL;

/// File extensions that mark a touched file as "frontend-ish", grounding
/// the original's simple substring checks over touched file paths (§4.6).
const FRONTEND_EXTENSIONS: &[&str] = &[
    ".tsx", ".jsx", ".vue", ".svelte", ".html", ".css", ".scss",
];

pub struct QuickCheckOutcome {
    pub metrics: QualityMetrics,
    pub critical_issues: Vec<String>,
    pub warnings: Vec<String>,
    pub overall_rating: i32,
}

/// Computes the deterministic quick check from a session's structured event
/// stream plus its final status and accumulated runner metrics (§4.6).
pub fn compute_quick_check(
    events: &[LogEvent],
    status: SessionStatus,
    session_metrics: &SessionMetrics,
) -> QuickCheckOutcome {
    let mut total_tool_uses = 0u32;
    let mut error_count = 0u32;
    let mut playwright_count = 0u32;
    let mut playwright_screenshot_count = 0u32;
    let mut touched_frontend_file = false;

    for event in events {
        match &event.kind {
            EventKind::ToolUse {
                name,
                arguments_digest,
            } => {
                total_tool_uses += 1;
                let lower_name = name.to_lowercase();
                if lower_name.contains("playwright") || lower_name.contains("browser") {
                    playwright_count += 1;
                    if lower_name.contains("screenshot")
                        || arguments_digest.to_lowercase().contains("screenshot")
                    {
                        playwright_screenshot_count += 1;
                    }
                }
                if FRONTEND_EXTENSIONS
                    .iter()
                    .any(|ext| arguments_digest.contains(ext))
                {
                    touched_frontend_file = true;
                }
            }
            EventKind::ToolResult { ok, .. } => {
                if !*ok {
                    error_count += 1;
                }
            }
            _ => {}
        }
    }

    let error_rate = error_count as f64 / (total_tool_uses.max(1) as f64);

    let metrics = QualityMetrics {
        total_tool_uses,
        error_count,
        error_rate,
        playwright_count,
        playwright_screenshot_count,
        input_tokens: session_metrics.input_tokens,
        output_tokens: session_metrics.output_tokens,
        cost_usd: session_metrics.cost_usd,
        duration_seconds: session_metrics.duration_seconds,
        touched_frontend_file,
    };

    let mut critical_issues = Vec::new();
    let mut warnings = Vec::new();

    if touched_frontend_file && playwright_count == 0 {
        critical_issues.push(
            "❌ session touched frontend files but performed zero browser verifications".to_string(),
        );
    }
    if error_rate > ERROR_RATE_CRITICAL {
        critical_issues.push(format!(
            "❌ tool error rate {:.0}% exceeds the {:.0}% critical bar",
            error_rate * 100.0,
            ERROR_RATE_CRITICAL * 100.0
        ));
    }
    if matches!(status, SessionStatus::Error | SessionStatus::Interrupted) {
        critical_issues.push(format!("❌ session ended abnormally ({status})"));
    }
    if error_count > 0 && error_rate <= ERROR_RATE_CRITICAL {
        warnings.push(format!("⚠️ {error_count} tool call(s) returned an error"));
    }
    if playwright_count > 0 && playwright_screenshot_count == 0 {
        warnings.push("⚠️ browser verification ran without capturing a screenshot".to_string());
    }

    let overall_rating =
        (10 - critical_issues.len() as i32 - (warnings.len() as i32 / 2)).max(1);

    QuickCheckOutcome {
        metrics,
        critical_issues,
        warnings,
        overall_rating,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn event(kind: EventKind) -> LogEvent {
        LogEvent {
            session_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind,
        }
    }

    #[test]
    fn flags_missing_browser_verification_as_critical() {
        let events = vec![event(EventKind::ToolUse {
            name: "edit_file".into(),
            arguments_digest: "{\"path\":\"src/App.tsx\"}".into(),
        })];
        let outcome =
            compute_quick_check(&events, SessionStatus::Completed, &SessionMetrics::default());
        assert!(outcome.critical_issues.iter().any(|i| i.contains("browser")));
        assert!(outcome.overall_rating < 10);
    }

    #[test]
    fn clean_session_rates_ten() {
        let events = vec![event(EventKind::ToolUse {
            name: "edit_file".into(),
            arguments_digest: "{\"path\":\"src/lib.rs\"}".into(),
        })];
        let outcome =
            compute_quick_check(&events, SessionStatus::Completed, &SessionMetrics::default());
        assert!(outcome.critical_issues.is_empty());
        assert_eq!(outcome.overall_rating, 10);
    }

    #[test]
    fn high_error_rate_is_critical() {
        let events = vec![
            event(EventKind::ToolUse {
                name: "bash".into(),
                arguments_digest: "ls".into(),
            }),
            event(EventKind::ToolResult {
                tool_use_ref: "1".into(),
                ok: false,
                content_summary: "boom".into(),
            }),
        ];
        let outcome =
            compute_quick_check(&events, SessionStatus::Completed, &SessionMetrics::default());
        assert!(outcome.critical_issues.iter().any(|i| i.contains("error rate")));
    }
}

use serde::Deserialize;

use crate::event_log::LogEvent;
use crate::llm::AnalysisLlmClient;

const DEEP_REVIEW_SYSTEM_PROMPT: &str = "\
You are reviewing a coding agent's session log for quality. Respond with a \
strict JSON object: {\"overall_rating\": <1-10 integer>, \"critical_issues\": \
[string], \"warnings\": [string], \"review_text\": string, \
\"prompt_improvements\": [string]}. Respond with JSON only, no prose.";

#[derive(Debug, Deserialize)]
struct DeepReviewResponse {
    overall_rating: i32,
    #[serde(default)]
    critical_issues: Vec<String>,
    #[serde(default)]
    warnings: Vec<String>,
    review_text: String,
    #[serde(default)]
    prompt_improvements: Vec<String>,
}

pub enum DeepReviewOutcome {
    Ok {
        overall_rating: i32,
        critical_issues: Vec<String>,
        warnings: Vec<String>,
        review_text: String,
        recommendations: Vec<String>,
    },
    /// The LLM response didn't parse; stored as a `failed` check rather
    /// than propagated (§4.6/§7 `Corrupt`).
    Failed,
}

/// Builds a review prompt from the session's event log and submits it for
/// a single-turn, no-tools analysis (§4.6). Never returns an error: a
/// transport failure or unparseable response both collapse to `Failed`, so
/// callers can record "attempted but unparseable" without propagating
/// anything that would abort the session.
pub async fn run_deep_review(
    llm: &dyn AnalysisLlmClient,
    model: &str,
    events: &[LogEvent],
) -> DeepReviewOutcome {
    let prompt = build_prompt(events);
    let response = match llm.complete(DEEP_REVIEW_SYSTEM_PROMPT, model, &prompt).await {
        Ok(text) => text,
        Err(_) => return DeepReviewOutcome::Failed,
    };

    parse_response(&response)
}

fn build_prompt(events: &[LogEvent]) -> String {
    let mut narrative = String::new();
    for event in events {
        narrative.push_str(&format!("{:?}\n", event.kind));
    }
    format!("Session log:\n{narrative}")
}

/// Defensive parsing per §9: strip Markdown code fences, accept a
/// top-level `null`, and treat any decode error identically to `null`.
fn parse_response(raw: &str) -> DeepReviewOutcome {
    let stripped = strip_code_fences(raw);
    let value: serde_json::Value = match serde_json::from_str(&stripped) {
        Ok(v) => v,
        Err(_) => return DeepReviewOutcome::Failed,
    };
    if value.is_null() {
        return DeepReviewOutcome::Failed;
    }
    match serde_json::from_value::<DeepReviewResponse>(value) {
        Ok(parsed) => DeepReviewOutcome::Ok {
            overall_rating: parsed.overall_rating.clamp(1, 10),
            critical_issues: parsed.critical_issues,
            warnings: parsed.warnings,
            review_text: parsed.review_text,
            recommendations: parsed.prompt_improvements,
        },
        Err(_) => DeepReviewOutcome::Failed,
    }
}

fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_fenced_json_response() {
        let raw = "```json\n{\"overall_rating\": 8, \"critical_issues\": [], \"warnings\": [], \"review_text\": \"good\", \"prompt_improvements\": [\"add tests\"]}\n```";
        match parse_response(raw) {
            DeepReviewOutcome::Ok { overall_rating, recommendations, .. } => {
                assert_eq!(overall_rating, 8);
                assert_eq!(recommendations, vec!["add tests".to_string()]);
            }
            DeepReviewOutcome::Failed => panic!("expected Ok"),
        }
    }

    #[test]
    fn treats_null_as_failed() {
        assert!(matches!(parse_response("null"), DeepReviewOutcome::Failed));
    }

    #[test]
    fn treats_garbage_as_failed() {
        assert!(matches!(parse_response("not json at all"), DeepReviewOutcome::Failed));
    }

    #[test]
    fn clamps_out_of_range_rating() {
        let raw = "{\"overall_rating\": 42, \"review_text\": \"x\"}";
        match parse_response(raw) {
            DeepReviewOutcome::Ok { overall_rating, .. } => assert_eq!(overall_rating, 10),
            DeepReviewOutcome::Failed => panic!("expected Ok"),
        }
    }
}

//! Cross-project aggregation of deep-review recommendations into themed,
//! optionally LLM-elaborated proposals against a prompt file (§4.7).
//! Grounded on `original_source/prompt_improvement_analyzer.py`, reimplemented
//! idiomatically; the Claude-elaboration call reuses the same
//! `AnalysisLlmClient` transport as the deep review.

mod proposal;
mod theme;

pub use proposal::{EmittedProposal, Severity, ThemeAggregate, ThresholdIssue};
pub use theme::Theme;

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::domain::ChangeKind;
use crate::llm::AnalysisLlmClient;
use crate::quality::thresholds::{
    ANALYZER_LLM_BUDGET, HIGH_ERROR_RATE_FRACTION, LOW_QUALITY_SESSION_FRACTION,
    MISSING_BROWSER_VERIFICATION_FRACTION, QUALITY_IMPACT_CAP, THEME_PROPOSAL_MIN_FREQUENCY,
};

/// One analyzed session's contribution to the aggregation: its quick-check
/// rating, the signals the threshold issues read, and any deep-review
/// recommendations it produced (empty if it has none or wasn't deep-reviewed).
#[derive(Debug, Clone)]
pub struct SessionSignal {
    pub session_id: Uuid,
    pub quick_rating: Option<i32>,
    pub error_rate: f64,
    pub touched_frontend_file: bool,
    pub playwright_count: u32,
    pub recommendations: Vec<String>,
}

pub struct AnalyzerInput<'a> {
    pub sessions: &'a [SessionSignal],
    pub prompt_file: &'a str,
    /// The active prompt version's content, if one exists yet, used as
    /// context for the LLM-elaboration call.
    pub current_prompt_content: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzerOutput {
    pub identified_patterns: serde_json::Value,
    #[serde(skip)]
    pub proposals: Vec<EmittedProposal>,
    pub estimated_quality_impact: f64,
}

const ELABORATION_SYSTEM_PROMPT: &str = "\
You refine a coding agent's prompt file based on recurring reviewer feedback. \
Respond with a strict JSON object: {\"section_name\": string, \"change_type\": \
\"addition\"|\"modification\"|\"deletion\", \"original_text\": string, \
\"proposed_text\": string, \"rationale\": string}, or the literal `null` if the \
prompt file already addresses this feedback. Respond with JSON only, no prose.";

#[derive(Debug, serde::Deserialize)]
struct ElaborationResponse {
    section_name: String,
    change_type: String,
    #[serde(default)]
    original_text: String,
    proposed_text: String,
    rationale: String,
}

/// Runs the full aggregation → proposal-emission pipeline over one
/// eligibility window's worth of sessions (§4.7). Never returns an error:
/// an LLM-elaboration failure just falls back to the non-LLM proposal for
/// that theme, matching the deep review's "never abort the pipeline" shape.
pub async fn run_analysis(
    input: AnalyzerInput<'_>,
    llm: Option<(&dyn AnalysisLlmClient, &str)>,
) -> AnalyzerOutput {
    let aggregates = aggregate_themes(input.sessions);
    let eligible: Vec<&ThemeAggregate> = aggregates
        .iter()
        .filter(|a| a.frequency >= THEME_PROPOSAL_MIN_FREQUENCY)
        .collect();

    let mut ranked = eligible.clone();
    ranked.sort_by(|a, b| b.distinct_sessions.cmp(&a.distinct_sessions));
    let elaborate: HashSet<Theme> = ranked
        .iter()
        .take(ANALYZER_LLM_BUDGET)
        .map(|a| a.theme)
        .collect();

    let mut proposals = Vec::new();
    for aggregate in &eligible {
        let use_llm = llm.is_some() && elaborate.contains(&aggregate.theme);
        let proposal = if use_llm {
            let (client, model) = llm.unwrap();
            match elaborate_with_llm(client, model, aggregate, input.prompt_file, input.current_prompt_content)
                .await
            {
                Some(p) => p,
                None => proposal::non_llm_proposal(aggregate),
            }
        } else {
            proposal::non_llm_proposal(aggregate)
        };
        proposals.push(proposal);
    }

    for issue in threshold_issues(input.sessions) {
        proposals.push(proposal::threshold_issue_proposal(&issue));
    }

    let estimated_quality_impact = proposals.iter().map(|p| p.impact).sum::<f64>().min(QUALITY_IMPACT_CAP);

    let identified_patterns = json!({
        "themes": aggregates.iter().map(|a| json!({
            "theme": a.theme.as_str(),
            "distinct_sessions": a.distinct_sessions,
            "frequency": a.frequency,
            "average_quality": a.average_quality,
        })).collect::<Vec<_>>(),
        "proposal_count": proposals.len(),
    });

    AnalyzerOutput {
        identified_patterns,
        proposals,
        estimated_quality_impact,
    }
}

/// Step 1-3 of §4.7's aggregation: bucket every non-empty recommendation
/// into its theme(s) and accumulate per-theme session/frequency/quality.
fn aggregate_themes(sessions: &[SessionSignal]) -> Vec<ThemeAggregate> {
    struct Accum {
        distinct_sessions: HashSet<Uuid>,
        frequency: u32,
        quality_sum: f64,
        quality_count: u32,
        recommendations: Vec<String>,
    }

    let mut by_theme: HashMap<Theme, Accum> = HashMap::new();

    for session in sessions {
        for recommendation in &session.recommendations {
            if recommendation.trim().is_empty() {
                continue;
            }
            for theme in theme::bucket(recommendation) {
                let accum = by_theme.entry(theme).or_insert_with(|| Accum {
                    distinct_sessions: HashSet::new(),
                    frequency: 0,
                    quality_sum: 0.0,
                    quality_count: 0,
                    recommendations: Vec::new(),
                });
                accum.distinct_sessions.insert(session.session_id);
                accum.frequency += 1;
                accum.recommendations.push(recommendation.clone());
                if let Some(rating) = session.quick_rating {
                    accum.quality_sum += rating as f64;
                    accum.quality_count += 1;
                }
            }
        }
    }

    let mut aggregates: Vec<ThemeAggregate> = by_theme
        .into_iter()
        .map(|(theme, accum)| {
            let average_quality = if accum.quality_count > 0 {
                accum.quality_sum / accum.quality_count as f64
            } else {
                0.0
            };
            ThemeAggregate {
                theme,
                distinct_sessions: accum.distinct_sessions.len(),
                frequency: accum.frequency,
                average_quality,
                recommendations: accum.recommendations,
            }
        })
        .collect();

    aggregates.sort_by(|a, b| a.theme.as_str().cmp(b.theme.as_str()));
    aggregates
}

/// §4.7's threshold-based issues, read directly off the aggregated session
/// signals rather than the theme buckets.
fn threshold_issues(sessions: &[SessionSignal]) -> Vec<ThresholdIssue> {
    let mut issues = Vec::new();
    if sessions.is_empty() {
        return issues;
    }

    let ui_touching: Vec<&SessionSignal> = sessions.iter().filter(|s| s.touched_frontend_file).collect();
    if !ui_touching.is_empty() {
        let unverified = ui_touching.iter().filter(|s| s.playwright_count == 0).count();
        let fraction = unverified as f64 / ui_touching.len() as f64;
        if fraction > MISSING_BROWSER_VERIFICATION_FRACTION {
            issues.push(ThresholdIssue {
                key: proposal::MISSING_BROWSER_VERIFICATION,
                section: proposal::threshold_issue_section(proposal::MISSING_BROWSER_VERIFICATION),
                severity: Severity::Critical,
                fraction,
                affected_sessions: unverified,
            });
        }
    }

    let mean_error_rate = sessions.iter().map(|s| s.error_rate).sum::<f64>() / sessions.len() as f64;
    if mean_error_rate > HIGH_ERROR_RATE_FRACTION {
        let affected = sessions.iter().filter(|s| s.error_rate > HIGH_ERROR_RATE_FRACTION).count();
        issues.push(ThresholdIssue {
            key: proposal::HIGH_ERROR_RATE,
            section: proposal::threshold_issue_section(proposal::HIGH_ERROR_RATE),
            severity: Severity::Critical,
            fraction: mean_error_rate,
            affected_sessions: affected.max(1),
        });
    }

    let low_quality = sessions
        .iter()
        .filter(|s| s.quick_rating.map(|r| r < 7).unwrap_or(false))
        .count();
    let low_quality_fraction = low_quality as f64 / sessions.len() as f64;
    if low_quality_fraction > LOW_QUALITY_SESSION_FRACTION {
        issues.push(ThresholdIssue {
            key: proposal::LOW_QUALITY_SESSIONS,
            section: proposal::threshold_issue_section(proposal::LOW_QUALITY_SESSIONS),
            severity: Severity::Warning,
            fraction: low_quality_fraction,
            affected_sessions: low_quality,
        });
    }

    issues
}

async fn elaborate_with_llm(
    llm: &dyn AnalysisLlmClient,
    model: &str,
    aggregate: &ThemeAggregate,
    prompt_file: &str,
    current_prompt_content: Option<&str>,
) -> Option<EmittedProposal> {
    let context = current_prompt_content.unwrap_or("(no active version yet)");
    let user_prompt = format!(
        "Prompt file: {prompt_file}\nCurrent content:\n{context}\n\nRecurring feedback ({} distinct sessions, {} mentions, avg quality {:.1}/10):\n{}",
        aggregate.distinct_sessions,
        aggregate.frequency,
        aggregate.average_quality,
        aggregate.recommendations.join("\n- ")
    );

    let response = llm.complete(ELABORATION_SYSTEM_PROMPT, model, &user_prompt).await.ok()?;
    let stripped = response.trim().trim_start_matches("```json").trim_start_matches("```").trim_end_matches("```").trim();

    let value: serde_json::Value = serde_json::from_str(stripped).ok()?;
    if value.is_null() {
        return None;
    }
    let parsed: ElaborationResponse = serde_json::from_value(value).ok()?;
    let change_kind = ChangeKind::parse(&parsed.change_type).unwrap_or(ChangeKind::Modification);
    let confidence = proposal::compute_confidence(aggregate.distinct_sessions, aggregate.average_quality, true);

    Some(EmittedProposal {
        section_name: parsed.section_name,
        change_kind,
        original_text: parsed.original_text,
        proposed_text: parsed.proposed_text,
        rationale: parsed.rationale,
        evidence: aggregate.recommendations.clone(),
        confidence,
        impact: aggregate.frequency as f64 * 0.5,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullLlm;

    #[async_trait::async_trait]
    impl AnalysisLlmClient for NullLlm {
        async fn complete(&self, _system_prompt: &str, _model: &str, _user_prompt: &str) -> crate::error::Result<String> {
            Ok("null".to_string())
        }
    }

    fn signal(id: Uuid, rating: i32, recommendations: Vec<&str>) -> SessionSignal {
        SessionSignal {
            session_id: id,
            quick_rating: Some(rating),
            error_rate: 0.0,
            touched_frontend_file: false,
            playwright_count: 0,
            recommendations: recommendations.into_iter().map(String::from).collect(),
        }
    }

    #[tokio::test]
    async fn below_frequency_floor_produces_no_proposal() {
        let sessions = vec![signal(Uuid::new_v4(), 8, vec!["write more tests"])];
        let output = run_analysis(
            AnalyzerInput { sessions: &sessions, prompt_file: "CODING.md", current_prompt_content: None },
            None,
        )
        .await;
        assert!(output.proposals.is_empty());
    }

    #[tokio::test]
    async fn recurring_theme_emits_a_non_llm_proposal() {
        let sessions = vec![
            signal(Uuid::new_v4(), 8, vec!["write more unit tests"]),
            signal(Uuid::new_v4(), 6, vec!["add a test case for this"]),
        ];
        let output = run_analysis(
            AnalyzerInput { sessions: &sessions, prompt_file: "CODING.md", current_prompt_content: None },
            None,
        )
        .await;
        assert_eq!(output.proposals.len(), 1);
        assert_eq!(output.proposals[0].section_name, "Testing Requirements");
    }

    #[tokio::test]
    async fn llm_null_response_falls_back_to_non_llm_proposal() {
        let sessions = vec![
            signal(Uuid::new_v4(), 8, vec!["write more unit tests"]),
            signal(Uuid::new_v4(), 6, vec!["add a test case for this"]),
        ];
        let llm = NullLlm;
        let output = run_analysis(
            AnalyzerInput { sessions: &sessions, prompt_file: "CODING.md", current_prompt_content: None },
            Some((&llm, "test-model")),
        )
        .await;
        assert_eq!(output.proposals.len(), 1);
        assert_eq!(output.proposals[0].confidence, proposal::compute_confidence(2, 7.0, false));
    }

    #[tokio::test]
    async fn missing_browser_verification_is_flagged() {
        let mut s1 = signal(Uuid::new_v4(), 9, vec![]);
        s1.touched_frontend_file = true;
        let mut s2 = signal(Uuid::new_v4(), 9, vec![]);
        s2.touched_frontend_file = true;
        let sessions = vec![s1, s2];
        let output = run_analysis(
            AnalyzerInput { sessions: &sessions, prompt_file: "CODING.md", current_prompt_content: None },
            None,
        )
        .await;
        assert!(output.proposals.iter().any(|p| p.section_name == "Testing & Verification"));
    }

    #[tokio::test]
    async fn impact_is_capped() {
        let mut sessions = Vec::new();
        for _ in 0..20 {
            sessions.push(signal(Uuid::new_v4(), 2, vec!["write more unit tests", "retry on error handling failure"]));
        }
        let output = run_analysis(
            AnalyzerInput { sessions: &sessions, prompt_file: "CODING.md", current_prompt_content: None },
            None,
        )
        .await;
        assert!(output.estimated_quality_impact <= QUALITY_IMPACT_CAP);
    }
}

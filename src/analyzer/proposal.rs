//! Proposal emission: turning a theme's aggregated recommendations (or a
//! threshold-based issue) into a concrete before/after change against a
//! prompt file (§4.7), grounded in
//! `original_source/prompt_improvement_analyzer.py`'s
//! `_generate_proposal`/`_estimate_quality_impact`.

use crate::domain::ChangeKind;

use super::theme::Theme;

#[derive(Debug, Clone)]
pub struct ThemeAggregate {
    pub theme: Theme,
    pub distinct_sessions: usize,
    pub frequency: u32,
    pub average_quality: f64,
    /// Every recommendation string that landed in this theme, kept in
    /// encounter order so the non-LLM fallback can pick the shortest three.
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Critical,
    Warning,
}

impl Severity {
    fn weight(&self) -> f64 {
        match self {
            Severity::Critical => 1.0,
            Severity::Warning => 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmittedProposal {
    pub section_name: String,
    pub change_kind: ChangeKind,
    pub original_text: String,
    pub proposed_text: String,
    pub rationale: String,
    pub evidence: Vec<String>,
    pub confidence: i32,
    /// Contribution toward the analysis's estimated quality impact, summed
    /// and capped by the caller (§4.7).
    pub impact: f64,
}

/// Confidence from unique-session count, ±1 for quality extremes, +1 if an
/// LLM elaborated the proposal, clamped to 1–10 (§4.7).
pub fn compute_confidence(distinct_sessions: usize, average_quality: f64, llm_enhanced: bool) -> i32 {
    let mut confidence = match distinct_sessions {
        0..=2 => 3,
        3 => 5,
        4..=5 => 7,
        _ => 9,
    };
    if average_quality >= 8.0 {
        confidence += 1;
    } else if average_quality <= 5.0 {
        confidence -= 1;
    }
    if llm_enhanced {
        confidence += 1;
    }
    confidence.clamp(1, 10)
}

/// The non-LLM fallback: the three shortest recommendations in the theme as
/// bullets, with a fixed `modification` shape and no prior text (§4.7).
pub fn non_llm_proposal(aggregate: &ThemeAggregate) -> EmittedProposal {
    let mut sorted = aggregate.recommendations.clone();
    sorted.sort_by_key(|r| r.len());
    let bullets: Vec<String> = sorted.into_iter().take(3).map(|r| format!("- {r}")).collect();

    let confidence = compute_confidence(aggregate.distinct_sessions, aggregate.average_quality, false);

    EmittedProposal {
        section_name: aggregate.theme.section().to_string(),
        change_kind: ChangeKind::Modification,
        original_text: String::new(),
        proposed_text: bullets.join("\n"),
        rationale: format!(
            "{} distinct session(s) recommended changes in this area {} time(s), averaging a {:.1}/10 quick-check rating",
            aggregate.distinct_sessions, aggregate.frequency, aggregate.average_quality
        ),
        evidence: aggregate.recommendations.clone(),
        confidence,
        impact: aggregate.frequency as f64 * 0.5,
    }
}

pub struct ThresholdIssue {
    pub key: &'static str,
    pub section: &'static str,
    pub severity: Severity,
    pub fraction: f64,
    pub affected_sessions: usize,
}

/// Threshold-based issues complementing theme proposals (§4.7). Severity
/// mirrors the quick check: missing verification and a high error rate are
/// both already treated as critical there, so they stay critical here for
/// the same signal; low-quality frequency is a softer, warning-level issue.
pub const MISSING_BROWSER_VERIFICATION: &str = "missing_browser_verification";
pub const HIGH_ERROR_RATE: &str = "high_error_rate";
pub const LOW_QUALITY_SESSIONS: &str = "low_quality_sessions";

pub fn threshold_issue_section(key: &str) -> &'static str {
    match key {
        MISSING_BROWSER_VERIFICATION => "Testing & Verification",
        HIGH_ERROR_RATE => "Error Handling",
        LOW_QUALITY_SESSIONS => "General Guidelines",
        _ => "General Guidelines",
    }
}

pub fn threshold_issue_proposal(issue: &ThresholdIssue) -> EmittedProposal {
    let proposed_text = match issue.key {
        MISSING_BROWSER_VERIFICATION => {
            "- Require a browser verification (Playwright navigation + screenshot) whenever a session touches frontend files".to_string()
        }
        HIGH_ERROR_RATE => {
            "- Slow down before repeating a failed tool call; confirm the underlying cause before retrying".to_string()
        }
        LOW_QUALITY_SESSIONS => {
            "- Treat a quick-check rating below 7/10 as a signal to pause and reassess the approach, not just keep going".to_string()
        }
        _ => String::new(),
    };

    EmittedProposal {
        section_name: issue.section.to_string(),
        change_kind: ChangeKind::Modification,
        original_text: String::new(),
        proposed_text,
        rationale: format!(
            "{:.0}% of analyzed sessions triggered the {} threshold ({} of them)",
            issue.fraction * 100.0,
            issue.key,
            issue.affected_sessions
        ),
        evidence: vec![format!("{:.2} fraction across {} sessions", issue.fraction, issue.affected_sessions)],
        confidence: compute_confidence(issue.affected_sessions, 0.0, false),
        impact: issue.affected_sessions as f64 * issue.severity.weight(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_scales_with_session_count() {
        assert_eq!(compute_confidence(1, 6.0, false), 3);
        assert_eq!(compute_confidence(3, 6.0, false), 5);
        assert_eq!(compute_confidence(5, 6.0, false), 7);
        assert_eq!(compute_confidence(9, 6.0, false), 9);
    }

    #[test]
    fn quality_extremes_shift_confidence() {
        assert_eq!(compute_confidence(9, 9.0, false), 10);
        assert_eq!(compute_confidence(9, 2.0, false), 8);
    }

    #[test]
    fn llm_enhancement_adds_one_and_clamps() {
        assert_eq!(compute_confidence(9, 9.0, true), 10);
        assert_eq!(compute_confidence(1, 2.0, true), 3);
    }

    #[test]
    fn non_llm_proposal_picks_three_shortest() {
        let aggregate = ThemeAggregate {
            theme: Theme::Testing,
            distinct_sessions: 3,
            frequency: 4,
            average_quality: 7.0,
            recommendations: vec![
                "write more tests please covering the edge cases".to_string(),
                "add tests".to_string(),
                "write unit tests".to_string(),
                "test".to_string(),
            ],
        };
        let proposal = non_llm_proposal(&aggregate);
        assert_eq!(proposal.section_name, "Testing Requirements");
        assert!(proposal.proposed_text.contains("- test"));
        assert!(!proposal.proposed_text.contains("edge cases"));
    }
}

//! Every magic number used by the quality pipeline and the analyzer,
//! centralized per SPEC_FULL.md §9's resolution of the open question about
//! the original's internally-inconsistent literals. Not yet full runtime
//! configuration (the distilled spec doesn't ask for that), but promoting
//! any one of these to `Settings` later is a one-line change.

/// Quick-check critical bar: a session's tool-error rate above this value
/// is a critical issue.
pub const ERROR_RATE_CRITICAL: f64 = 0.3;

/// Deep-review trigger: every Nth coding session gets one, starting once
/// the project has run at least this many sessions.
pub const DEEP_REVIEW_CADENCE: i32 = 5;
pub const DEEP_REVIEW_MIN_SESSION: i32 = 5;

/// Deep-review trigger: a quick-check rating below this always triggers a
/// deep review regardless of cadence.
pub const DEEP_REVIEW_QUALITY_FLOOR: i32 = 7;

/// Analyzer: a theme needs at least this many mentions to produce a
/// proposal.
pub const THEME_PROPOSAL_MIN_FREQUENCY: u32 = 2;

/// Analyzer: bounded budget of themes elaborated by an LLM call per run.
pub const ANALYZER_LLM_BUDGET: usize = 3;

/// Analyzer: fraction of UI-touching sessions missing browser verification
/// before a threshold-based proposal fires. Read as a plain fraction (not
/// "0.5%"), consistent with every sibling threshold in this module.
pub const MISSING_BROWSER_VERIFICATION_FRACTION: f64 = 0.5;

/// Analyzer: mean tool-error rate across analyzed sessions before a
/// threshold-based proposal fires. Matches `ERROR_RATE_CRITICAL` for
/// consistency between the quick-check and the cross-project view of the
/// same signal.
pub const HIGH_ERROR_RATE_FRACTION: f64 = ERROR_RATE_CRITICAL;

/// Analyzer: fraction of sessions with quick rating below
/// `DEEP_REVIEW_QUALITY_FLOOR` before a threshold-based proposal fires.
pub const LOW_QUALITY_SESSION_FRACTION: f64 = 0.1;

/// Analyzer: estimated-quality-impact ceiling for one analysis run.
pub const QUALITY_IMPACT_CAP: f64 = 3.0;

/// Eligibility defaults (§4.7): minimum completed coding sessions and the
/// trailing window (days) a project must fall within to be analyzed.
pub const ELIGIBLE_MIN_SESSIONS: i64 = 5;
pub const ELIGIBLE_WINDOW_DAYS: i64 = 7;

/// Coverage analysis: an epic with more than this fraction of tasks
/// lacking tests is flagged as a coverage warning.
pub const POOR_COVERAGE_FRACTION: f64 = 0.5;
pub const POOR_COVERAGE_EXAMPLE_CAP: usize = 5;

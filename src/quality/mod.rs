//! Deterministic metric extraction plus rule-based rating (the "quick
//! check"), a triggered LLM "deep review", and the post-initialization
//! test-coverage analysis (§4.6). Grounded on `original_source/orchestrator.py`'s
//! `_run_quality_check`/`_run_test_coverage_analysis` and
//! `original_source/cli/analyze_test_coverage.py`, reimplemented idiomatically.

pub mod coverage;
pub mod deep_review;
pub mod quick_check;
pub mod thresholds;
pub mod trigger;

pub use coverage::{compute_coverage, CoverageSnapshot};
pub use deep_review::{run_deep_review, DeepReviewOutcome};
pub use quick_check::compute_quick_check;
pub use trigger::should_trigger_deep_review;

//! The fixed keyword taxonomy deep-review recommendations are bucketed
//! into (§4.7), grounded verbatim in
//! `original_source/prompt_improvement_analyzer.py`'s `theme_keywords` table.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Theme {
    BrowserVerification,
    ErrorHandling,
    GitCommits,
    Testing,
    Docker,
    ParallelExecution,
    TaskManagement,
    Documentation,
    General,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::BrowserVerification => "browser_verification",
            Theme::ErrorHandling => "error_handling",
            Theme::GitCommits => "git_commits",
            Theme::Testing => "testing",
            Theme::Docker => "docker",
            Theme::ParallelExecution => "parallel_execution",
            Theme::TaskManagement => "task_management",
            Theme::Documentation => "documentation",
            Theme::General => "general",
        }
    }

    /// Theme→section fixed mapping table, grounded in `_map_theme_to_section`.
    pub fn section(&self) -> &'static str {
        match self {
            Theme::BrowserVerification => "Testing & Verification",
            Theme::ErrorHandling => "Error Handling",
            Theme::GitCommits => "Version Control Practices",
            Theme::Testing => "Testing Requirements",
            Theme::Docker => "Environment Setup",
            Theme::ParallelExecution => "Execution Strategy",
            Theme::TaskManagement => "Task Tracking",
            Theme::Documentation => "Documentation Standards",
            Theme::General => "General Guidelines",
        }
    }
}

const TAXONOMY: &[(Theme, &[&str])] = &[
    (
        Theme::BrowserVerification,
        &[
            "browser",
            "playwright",
            "screenshot",
            "visual",
            "ui verification",
            "test in browser",
        ],
    ),
    (
        Theme::ErrorHandling,
        &[
            "error handling",
            "try-except",
            "try/except",
            "exception",
            "error recovery",
            "retry",
        ],
    ),
    (
        Theme::GitCommits,
        &["commit", "git commit", "version control", "commit message"],
    ),
    (
        Theme::Testing,
        &["test coverage", "unit test", "write test", "test case", "testing"],
    ),
    (
        Theme::Docker,
        &["docker", "container", "dockerfile", "docker-compose"],
    ),
    (
        Theme::ParallelExecution,
        &["parallel", "concurrent", "simultaneously", "multiple agents"],
    ),
    (
        Theme::TaskManagement,
        &["task manager", "todo", "task list", "task tracking"],
    ),
    (
        Theme::Documentation,
        &["document", "comment", "readme", "docstring"],
    ),
];

/// Buckets one recommendation string into every theme whose keywords it
/// matches, falling back to `General` if none match (§4.7).
pub fn bucket(recommendation: &str) -> Vec<Theme> {
    let lower = recommendation.to_lowercase();
    let mut themes: Vec<Theme> = TAXONOMY
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(theme, _)| *theme)
        .collect();
    if themes.is_empty() {
        themes.push(Theme::General);
    }
    themes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_a_single_theme() {
        let themes = bucket("Add more unit test coverage for the parser");
        assert_eq!(themes, vec![Theme::Testing]);
    }

    #[test]
    fn matches_multiple_themes_at_once() {
        let themes = bucket("Commit more often and write a test for every commit");
        assert!(themes.contains(&Theme::GitCommits));
        assert!(themes.contains(&Theme::Testing));
    }

    #[test]
    fn unmatched_recommendation_falls_back_to_general() {
        let themes = bucket("Be more careful overall");
        assert_eq!(themes, vec![Theme::General]);
    }
}

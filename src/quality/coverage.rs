use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Epic, Task, TestCase};

use super::thresholds::{POOR_COVERAGE_EXAMPLE_CAP, POOR_COVERAGE_FRACTION};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EpicCoverage {
    pub epic_id: Uuid,
    pub epic_name: String,
    pub total_tasks: usize,
    pub tasks_with_tests: usize,
    pub tasks_without_tests: usize,
    pub total_tests: usize,
    /// Distribution bucketed by exact test count {0, 1, 2+}, mirroring the
    /// original's console-report distribution view (§4.6).
    pub tasks_with_zero_tests: usize,
    pub tasks_with_one_test: usize,
    pub tasks_with_two_or_more_tests: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoverageWarning {
    pub epic_id: Uuid,
    pub epic_name: String,
    pub fraction_without_tests: f64,
    pub example_task_descriptions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoverageSnapshot {
    pub total_tasks: usize,
    pub tasks_with_tests: usize,
    pub coverage_percentage: f64,
    pub average_tests_per_task: f64,
    pub per_epic: Vec<EpicCoverage>,
    pub warnings: Vec<CoverageWarning>,
}

/// Aggregates tasks and tests by epic (§4.6), "after initialization only").
pub fn compute_coverage(epics: &[Epic], tasks: &[Task], tests: &[TestCase]) -> CoverageSnapshot {
    let mut tests_per_task: HashMap<Uuid, usize> = HashMap::new();
    for test in tests {
        *tests_per_task.entry(test.task_id).or_insert(0) += 1;
    }

    let mut tasks_by_epic: HashMap<Uuid, Vec<&Task>> = HashMap::new();
    for task in tasks {
        tasks_by_epic.entry(task.epic_id).or_default().push(task);
    }

    let mut per_epic = Vec::new();
    let mut warnings = Vec::new();

    for epic in epics {
        let epic_tasks = tasks_by_epic.get(&epic.id).cloned().unwrap_or_default();
        let total_tasks = epic_tasks.len();
        let mut tasks_with_zero = 0;
        let mut tasks_with_one = 0;
        let mut tasks_with_two_plus = 0;
        let mut total_tests_in_epic = 0;
        let mut without_test_examples = Vec::new();

        for task in &epic_tasks {
            let count = tests_per_task.get(&task.id).copied().unwrap_or(0);
            total_tests_in_epic += count;
            match count {
                0 => {
                    tasks_with_zero += 1;
                    if without_test_examples.len() < POOR_COVERAGE_EXAMPLE_CAP {
                        without_test_examples.push(task.description.clone());
                    }
                }
                1 => tasks_with_one += 1,
                _ => tasks_with_two_plus += 1,
            }
        }

        let tasks_with_tests = total_tasks - tasks_with_zero;
        per_epic.push(EpicCoverage {
            epic_id: epic.id,
            epic_name: epic.name.clone(),
            total_tasks,
            tasks_with_tests,
            tasks_without_tests: tasks_with_zero,
            total_tests: total_tests_in_epic,
            tasks_with_zero_tests: tasks_with_zero,
            tasks_with_one_test: tasks_with_one,
            tasks_with_two_or_more_tests: tasks_with_two_plus,
        });

        if total_tasks > 0 {
            let fraction_without = tasks_with_zero as f64 / total_tasks as f64;
            if fraction_without > POOR_COVERAGE_FRACTION {
                warnings.push(CoverageWarning {
                    epic_id: epic.id,
                    epic_name: epic.name.clone(),
                    fraction_without_tests: fraction_without,
                    example_task_descriptions: without_test_examples,
                });
            }
        }
    }

    warnings.sort_by(|a, b| {
        b.fraction_without_tests
            .partial_cmp(&a.fraction_without_tests)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let total_tasks = tasks.len();
    let tasks_with_tests = per_epic.iter().map(|e| e.tasks_with_tests).sum();
    let coverage_percentage = if total_tasks > 0 {
        tasks_with_tests as f64 / total_tasks as f64 * 100.0
    } else {
        0.0
    };
    let average_tests_per_task = if total_tasks > 0 {
        tests.len() as f64 / total_tasks as f64
    } else {
        0.0
    };

    CoverageSnapshot {
        total_tasks,
        tasks_with_tests,
        coverage_percentage,
        average_tests_per_task,
        per_epic,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WorkStatus;
    use chrono::Utc;

    fn epic(name: &str) -> Epic {
        Epic {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            name: name.to_string(),
            description: String::new(),
            priority: 0,
            status: WorkStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn task(project_id: Uuid, epic_id: Uuid, desc: &str) -> Task {
        Task {
            id: Uuid::new_v4(),
            project_id,
            epic_id,
            description: desc.to_string(),
            action: None,
            status: WorkStatus::Pending,
            ordering: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn test_case(project_id: Uuid, task_id: Uuid) -> TestCase {
        TestCase {
            id: Uuid::new_v4(),
            project_id,
            task_id,
            description: "a test".to_string(),
            status: WorkStatus::Pending,
            last_run_result: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn exactly_half_missing_is_not_a_warning() {
        let mut e = epic("Auth");
        e.project_id = Uuid::new_v4();
        let t1 = task(e.project_id, e.id, "task 1");
        let t2 = task(e.project_id, e.id, "task 2");
        let tests = vec![test_case(e.project_id, t1.id)];
        let tasks = vec![t1, t2];

        let snapshot = compute_coverage(&[e], &tasks, &tests);
        assert!(snapshot.warnings.is_empty());
    }

    #[test]
    fn three_quarters_missing_is_flagged() {
        let mut e = epic("Billing");
        e.project_id = Uuid::new_v4();
        let t1 = task(e.project_id, e.id, "task 1");
        let t2 = task(e.project_id, e.id, "task 2");
        let t3 = task(e.project_id, e.id, "task 3");
        let t4 = task(e.project_id, e.id, "task 4");
        let tests = vec![test_case(e.project_id, t1.id)];
        let tasks = vec![t1, t2, t3, t4];

        let snapshot = compute_coverage(&[e], &tasks, &tests);
        assert_eq!(snapshot.warnings.len(), 1);
        assert_eq!(snapshot.warnings[0].epic_name, "Billing");
    }

    #[test]
    fn recomputing_from_the_same_snapshot_matches() {
        let mut e = epic("Core");
        e.project_id = Uuid::new_v4();
        let t1 = task(e.project_id, e.id, "task 1");
        let tasks = vec![t1];
        let tests = vec![];

        let first = compute_coverage(&[e.clone()], &tasks, &tests);
        let second = compute_coverage(&[e], &tasks, &tests);
        assert_eq!(first, second);
    }
}

//! # Execution Planner Module / 执行计划模块
//!
//! This module decides which scenarios run: explicit selection by name or
//! tag, scenarios marked `skip`, and distribution across CI runners.
//! Declaration order is preserved, since suites are written as stories.
//!
//! 此模块决定运行哪些场景：按名称或标签显式选择、标记为 `skip` 的场景，
//! 以及在 CI 运行器之间分配。保留声明顺序，因为套件是按故事编写的。

use anyhow::{bail, Result};

use crate::core::config::Scenario;

/// Scenario filters from the command line. Empty filters select everything.
/// 来自命令行的场景过滤器。空过滤器选择全部。
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub names: Vec<String>,
    pub tags: Vec<String>,
}

impl Selection {
    fn accepts(&self, scenario: &Scenario) -> bool {
        let name_ok = self.names.is_empty() || self.names.iter().any(|n| n == &scenario.name);
        let tag_ok = self.tags.is_empty() || scenario.tags.iter().any(|t| self.tags.contains(t));
        name_ok && tag_ok
    }
}

/// Represents a complete execution plan for a suite.
/// 表示套件的完整执行计划。
#[derive(Debug)]
pub struct ExecutionPlan {
    /// The scenarios to execute, in declaration order.
    /// 要执行的场景，按声明顺序。
    pub scenarios_to_run: Vec<Scenario>,
    /// Scenarios left out by the name/tag selection.
    /// 被名称/标签选择排除的场景数量。
    pub filtered_count: usize,
    /// Scenarios marked `skip = true`.
    pub skipped_count: usize,
    /// Whether the scenarios are distributed across multiple runners (CI environment).
    /// 场景是否分布在多个运行器上（CI 环境）。
    pub is_distributed: bool,
}

/// Creates an execution plan.
///
/// # Arguments
/// * `scenarios` - Every scenario in the suite
/// * `selection` - Name and tag filters
/// * `total_runners` - Optional total number of runners for distributed execution
/// * `runner_index` - Optional index of this runner (0-based)
///
/// # Errors
/// Unknown scenario names, a runner index out of range, or only one of the
/// two runner options.
pub fn plan_execution(
    scenarios: Vec<Scenario>,
    selection: &Selection,
    total_runners: Option<usize>,
    runner_index: Option<usize>,
) -> Result<ExecutionPlan> {
    if let Some(unknown) = selection
        .names
        .iter()
        .find(|name| !scenarios.iter().any(|s| &s.name == *name))
    {
        bail!("Unknown scenario '{}'.", unknown);
    }

    let total = scenarios.len();
    let (selected, _): (Vec<_>, Vec<_>) = scenarios.into_iter().partition(|s| selection.accepts(s));
    let filtered_count = total - selected.len();

    // An explicitly named scenario runs even when marked skip.
    let (runnable, skipped): (Vec<_>, Vec<_>) = selected
        .into_iter()
        .partition(|s| !s.skip || selection.names.contains(&s.name));

    let (scenarios_to_run, is_distributed) = match (total_runners, runner_index) {
        (Some(total), Some(index)) => {
            if total == 0 {
                bail!("Total runners must be greater than zero.");
            }
            if index >= total {
                bail!("Runner index must be less than total runners.");
            }
            let distributed = runnable
                .into_iter()
                .enumerate()
                .filter(|(i, _)| i % total == index)
                .map(|(_, scenario)| scenario)
                .collect();
            (distributed, true)
        }
        (None, None) => (runnable, false),
        _ => bail!("Both --total-runners and --runner-index must be provided."),
    };

    Ok(ExecutionPlan {
        scenarios_to_run,
        filtered_count,
        skipped_count: skipped.len(),
        is_distributed,
    })
}

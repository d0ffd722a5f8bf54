//! `select` command: test execution plan for a change set

use std::path::Path;

use crate::cancel::CancelToken;
use crate::commands::diff::load_change_set;
use crate::commands::CommandContext;
use crate::coverage::TestCategory;
use crate::engine::ImpactEngine;
use crate::error::Result;
use crate::impact::{ConfidenceLevel, SelectionConstraints};

#[allow(clippy::too_many_arguments)]
pub async fn run_select(
    engine: &ImpactEngine,
    ctx: &CommandContext,
    solution: &Path,
    changes: &Path,
    level: Option<ConfidenceLevel>,
    max_count: Option<usize>,
    max_duration: Option<f64>,
    include_categories: Vec<TestCategory>,
    exclude_categories: Vec<TestCategory>,
) -> Result<String> {
    let change_set = load_change_set(changes)?;
    let constraints = SelectionConstraints {
        max_count,
        max_total_duration_secs: max_duration,
        include_categories,
        exclude_categories,
    };
    let selection = engine
        .select_tests(solution, change_set, level, constraints, CancelToken::new())
        .await?;

    if ctx.is_json() {
        return Ok(serde_json::to_string_pretty(&selection).unwrap_or_default());
    }

    let mut out = String::new();
    out.push_str(&format!("level: {:?}\n", selection.level));
    out.push_str(&format!("selected tests: {}\n", selection.tests.len()));
    out.push_str(&format!(
        "estimated duration: {:.1}s\n",
        selection.estimated_duration_secs
    ));
    for test in &selection.tests {
        out.push_str(&format!(
            "  {:.2}  {}  [{}]\n",
            test.confidence,
            test.test,
            test.category.as_str()
        ));
    }
    Ok(out)
}

//! `diff` command: impact analysis for a change set
//!
//! The change set is read from a JSON file produced by a diff-parsing
//! collaborator; git text parsing is not this tool's concern.

use std::fs;
use std::path::Path;

use crate::cancel::CancelToken;
use crate::commands::{render_footer, CommandContext};
use crate::engine::ImpactEngine;
use crate::error::{EngineError, Result};
use crate::impact::ChangeSet;

/// Load a change set from disk
pub fn load_change_set(path: &Path) -> Result<ChangeSet> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| EngineError::SolutionParse {
        path: path.display().to_string(),
        message: format!("invalid change set: {}", e),
    })
}

pub async fn run_diff(
    engine: &ImpactEngine,
    ctx: &CommandContext,
    solution: &Path,
    changes: &Path,
) -> Result<String> {
    let change_set = load_change_set(changes)?;
    let impact = engine
        .analyze_diff(solution, change_set, CancelToken::new())
        .await?;

    if ctx.is_json() {
        return Ok(serde_json::to_string_pretty(&impact).unwrap_or_default());
    }

    let mut out = String::new();
    out.push_str(&format!(
        "changed methods: {}\n",
        impact.changed_methods.len()
    ));
    out.push_str(&format!(
        "affected methods: {}\n",
        impact.affected_method_count
    ));
    out.push_str(&format!("impacted tests: {}\n", impact.tests.len()));
    for test in &impact.tests {
        out.push_str(&format!(
            "  {:.2}  [{}]  {}  (via {})\n",
            test.confidence,
            test.bucket.as_str(),
            test.test,
            test.via
        ));
    }
    render_footer(impact.status, &impact.warnings, &mut out);
    Ok(out)
}

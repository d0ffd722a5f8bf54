//! `analyze` command: solution summary

use std::path::Path;

use crate::cancel::CancelToken;
use crate::commands::{render_footer, CommandContext};
use crate::engine::ImpactEngine;
use crate::error::Result;

pub async fn run_analyze(
    engine: &ImpactEngine,
    ctx: &CommandContext,
    solution: &Path,
) -> Result<String> {
    let analysis = engine
        .analyze_solution(solution, CancelToken::new())
        .await?;

    if ctx.is_json() {
        return Ok(serde_json::to_string_pretty(&analysis).unwrap_or_default());
    }

    let mut out = String::new();
    out.push_str(&format!("solution: {}\n", analysis.solution));
    out.push_str(&format!("projects: {}\n", analysis.projects));
    out.push_str(&format!("test projects: {}\n", analysis.test_projects));
    out.push_str(&format!("source files: {}\n", analysis.source_files));
    out.push_str(&format!("test methods: {}\n", analysis.test_methods));
    render_footer(analysis.status, &analysis.warnings, &mut out);
    Ok(out)
}

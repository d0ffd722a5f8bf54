//! `tests-for` command: reverse coverage for one method

use std::path::Path;

use crate::cancel::CancelToken;
use crate::commands::{render_footer, CommandContext};
use crate::engine::ImpactEngine;
use crate::error::Result;

pub async fn run_tests_for(
    engine: &ImpactEngine,
    ctx: &CommandContext,
    solution: &Path,
    method: &str,
) -> Result<String> {
    let result = engine
        .find_tests_for_method(solution, method, CancelToken::new())
        .await?;

    if ctx.is_json() {
        return Ok(serde_json::to_string_pretty(&result).unwrap_or_default());
    }

    let mut out = String::new();
    out.push_str(&format!("target: {}\n", result.target));
    out.push_str(&format!("covering tests: {}\n", result.coverage.len()));
    for info in &result.coverage {
        out.push_str(&format!(
            "  {:.2}  {}  (depth {}, {})\n",
            info.confidence,
            info.test,
            info.depth,
            info.reasons.join(", ")
        ));
        if ctx.verbose {
            let path: Vec<String> = info
                .call_path
                .iter()
                .map(|id| id.qualified_name())
                .collect();
            out.push_str(&format!("        path: {}\n", path.join(" -> ")));
        }
    }
    render_footer(result.status, &result.warnings, &mut out);
    Ok(out)
}

//! `trace` command: ordered call tree from a test method

use std::path::Path;

use crate::cancel::CancelToken;
use crate::commands::CommandContext;
use crate::engine::ImpactEngine;
use crate::error::Result;

pub async fn run_trace(
    engine: &ImpactEngine,
    ctx: &CommandContext,
    solution: &Path,
    test: &str,
    depth: usize,
) -> Result<String> {
    let trace = engine
        .trace_execution(solution, test, depth, CancelToken::new())
        .await?;

    if ctx.is_json() {
        return Ok(serde_json::to_string_pretty(&trace).unwrap_or_default());
    }

    let mut out = String::new();
    for node in &trace.nodes {
        out.push_str(&format!(
            "{}{}\n",
            "  ".repeat(node.depth),
            node.method
        ));
    }
    if trace.truncated {
        out.push_str("(truncated at depth bound)\n");
    }
    Ok(out)
}

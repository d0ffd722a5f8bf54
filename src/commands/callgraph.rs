//! `callgraph` command: full graph build

use std::path::Path;

use crate::cancel::CancelToken;
use crate::commands::{render_footer, CommandContext};
use crate::engine::ImpactEngine;
use crate::error::Result;

pub async fn run_callgraph(
    engine: &ImpactEngine,
    ctx: &CommandContext,
    solution: &Path,
    stats_only: bool,
) -> Result<String> {
    let analysis = engine.build_call_graph(solution, CancelToken::new()).await?;

    if ctx.is_json() {
        if stats_only {
            return Ok(serde_json::to_string_pretty(&analysis.stats).unwrap_or_default());
        }
        return Ok(serde_json::to_string_pretty(&analysis).unwrap_or_default());
    }

    let mut out = String::new();
    out.push_str(&format!("methods: {}\n", analysis.graph.methods.len()));
    let edges: usize = analysis.graph.forward.values().map(Vec::len).sum();
    out.push_str(&format!("edges: {}\n", edges));
    out.push_str(&format!(
        "unresolved calls: {}\n",
        analysis.stats.unresolved_calls
    ));
    out.push_str(&format!("from cache: {}\n", analysis.from_cache));
    if !analysis.from_cache {
        out.push_str(&format!("build time: {} ms\n", analysis.stats.build_ms));
    }
    if !stats_only && ctx.verbose {
        for (caller, callees) in &analysis.graph.forward {
            for callee in callees {
                out.push_str(&format!("{} -> {}\n", caller, callee));
            }
        }
    }
    render_footer(analysis.status, &analysis.warnings, &mut out);
    Ok(out)
}

//! `coverage` command: bulk coverage map

use std::path::Path;

use crate::cancel::CancelToken;
use crate::commands::CommandContext;
use crate::engine::ImpactEngine;
use crate::error::Result;

pub async fn run_coverage(
    engine: &ImpactEngine,
    ctx: &CommandContext,
    solution: &Path,
) -> Result<String> {
    let map = engine
        .build_coverage_map(solution, CancelToken::new())
        .await?;

    if ctx.is_json() {
        return Ok(serde_json::to_string_pretty(&map).unwrap_or_default());
    }

    let mut out = String::new();
    out.push_str(&format!("covered methods: {}\n", map.entries.len()));
    for (method, tests) in &map.entries {
        out.push_str(&format!("{}\n", method));
        for info in tests {
            out.push_str(&format!(
                "  {:.2}  {} (depth {})\n",
                info.confidence, info.test, info.depth
            ));
        }
    }
    out.push_str(&format!("status: {}\n", map.status.as_str()));
    Ok(out)
}

//! `cache` command: init, warm-up, status, stats, clear

use std::path::Path;

use crate::cancel::CancelToken;
use crate::cli::CacheAction;
use crate::commands::CommandContext;
use crate::engine::ImpactEngine;
use crate::error::Result;

pub async fn run_cache(
    engine: &ImpactEngine,
    ctx: &CommandContext,
    solution: &Path,
    action: &CacheAction,
) -> Result<String> {
    match action {
        CacheAction::Init => {
            let root = engine.cache_init(solution, CancelToken::new()).await?;
            Ok(format!("cache initialized at {}\n", root.display()))
        }
        CacheAction::Warmup => {
            engine.cache_warm_up(solution, CancelToken::new()).await?;
            Ok("cache warmed up\n".to_string())
        }
        CacheAction::Status => {
            let status = engine.cache_status(solution, CancelToken::new()).await?;
            if ctx.is_json() {
                return Ok(serde_json::to_string_pretty(&status).unwrap_or_default());
            }
            let mut out = String::new();
            out.push_str(&format!("root: {}\n", status.root.display()));
            out.push_str(&format!("entries: {}\n", status.total_entries));
            out.push_str(&format!(
                "compressed size: {} bytes (cap {})\n",
                status.total_compressed_bytes, status.tier_cap_bytes
            ));
            Ok(out)
        }
        CacheAction::Stats => {
            let stats = engine.cache_stats(solution, CancelToken::new()).await?;
            if ctx.is_json() {
                return Ok(serde_json::to_string_pretty(&stats).unwrap_or_default());
            }
            let mut out = String::new();
            for (name, s) in &stats {
                out.push_str(&format!(
                    "{}: {} entries, {} bytes compressed, ratio {:.2}, {} hits, {} misses, {} evictions\n",
                    name,
                    s.entries,
                    s.compressed_bytes,
                    s.compression_ratio(),
                    s.hits,
                    s.misses,
                    s.evictions
                ));
            }
            Ok(out)
        }
        CacheAction::Clear => {
            engine.cache_clear(solution, CancelToken::new()).await?;
            Ok("cache cleared\n".to_string())
        }
    }
}

//! Command handlers for the testmap CLI
//!
//! Each module implements one subcommand. Handlers receive the shared
//! `ImpactEngine` plus a `CommandContext` carrying output format and
//! verbosity, and return the rendered output string.

pub mod analyze;
pub mod cache;
pub mod callgraph;
pub mod coverage;
pub mod diff;
pub mod select;
pub mod tests_for;
pub mod trace;

pub use analyze::run_analyze;
pub use cache::run_cache;
pub use callgraph::run_callgraph;
pub use coverage::run_coverage;
pub use diff::run_diff;
pub use select::run_select;
pub use tests_for::run_tests_for;
pub use trace::run_trace;

use crate::cli::OutputFormat;
use crate::error::{AnalysisStatus, Warning};

/// Shared context passed to all command handlers
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandContext {
    pub format: OutputFormat,
    pub verbose: bool,
}

impl CommandContext {
    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }
}

/// Render the shared status/warnings footer for text output
pub fn render_footer(status: AnalysisStatus, warnings: &[Warning], out: &mut String) {
    out.push_str(&format!("status: {}\n", status.as_str()));
    for warning in warnings {
        out.push_str(&format!("warning: {}\n", warning.message));
    }
}

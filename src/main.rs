//! testmap CLI entry point

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use testmap_engine::cli::{Cli, Command};
use testmap_engine::commands::{
    run_analyze, run_cache, run_callgraph, run_coverage, run_diff, run_select, run_tests_for,
    run_trace, CommandContext,
};
use testmap_engine::ImpactEngine;

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new(if cli.verbose { "debug" } else { "warn" })
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(threads) = cli.max_parallelism {
        // Configure the worker pool before any parallel work starts
        let _ = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global();
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            return ExitCode::from(4);
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(output) => {
            print!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

async fn run(cli: Cli) -> testmap_engine::Result<String> {
    let engine = ImpactEngine::new(cli.engine_options());
    let ctx = CommandContext {
        format: cli.format,
        verbose: cli.verbose,
    };

    match &cli.command {
        Command::Analyze { solution } => run_analyze(&engine, &ctx, solution).await,
        Command::Callgraph {
            solution,
            stats_only,
        } => run_callgraph(&engine, &ctx, solution, *stats_only).await,
        Command::TestsFor { solution, method } => {
            run_tests_for(&engine, &ctx, solution, method).await
        }
        Command::Coverage { solution } => run_coverage(&engine, &ctx, solution).await,
        Command::Diff { solution, changes } => run_diff(&engine, &ctx, solution, changes).await,
        Command::Select {
            solution,
            changes,
            level,
            max_count,
            max_duration,
            include_categories,
            exclude_categories,
        } => {
            run_select(
                &engine,
                &ctx,
                solution,
                changes,
                *level,
                *max_count,
                *max_duration,
                include_categories.clone(),
                exclude_categories.clone(),
            )
            .await
        }
        Command::Trace {
            solution,
            test,
            depth,
        } => run_trace(&engine, &ctx, solution, test, *depth).await,
        Command::Cache { solution, action } => run_cache(&engine, &ctx, solution, action).await,
    }
}

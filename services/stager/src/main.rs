//! AOI staging service.
//!
//! Loads a processing directive, selects the source store, and stages
//! every declared tier's AOI-intersecting content into the output tree.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use staging::{Orchestrator, ProcessingDirective};

#[derive(Parser, Debug)]
#[command(name = "stager")]
#[command(about = "Stage AOI-intersecting granules across data tiers")]
struct Args {
    /// Directive file path
    #[arg(short, long, default_value = "staging.yaml")]
    directive: PathBuf,

    /// Workspace directory holding the AOI file and the output tree
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Abort on missing directories or files instead of skipping them
    #[arg(long)]
    strict_missing: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut directive = ProcessingDirective::from_yaml_file(&args.directive)
        .with_context(|| format!("loading directive {}", args.directive.display()))?;
    if args.strict_missing {
        directive.error_for_missing_files = true;
    }

    info!(
        date = %directive.date,
        tiers = directive.tiers.len(),
        remote = directive.remote.is_some(),
        strict = directive.error_for_missing_files,
        "loaded directive"
    );

    let orchestrator =
        Orchestrator::new(directive, &args.workspace).context("preparing staging run")?;
    let summary = orchestrator.run().await.context("staging run failed")?;

    info!(
        granules = summary.granules_copied,
        sidecars = summary.sidecars_copied,
        features = summary.features_kept,
        rows = summary.rows_kept,
        files = summary.files_copied,
        skipped = summary.items_skipped,
        reference = summary.reference_objects,
        "staging run finished"
    );

    Ok(())
}

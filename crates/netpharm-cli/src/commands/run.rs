//! `netpharm run` command implementation
//!
//! Starts a new pipeline run or resumes an existing one. Each run writes its
//! own `pipeline.log` next to `run_state.json`.

use crate::config::{PipelineConfig, CONFIG_FILE_NAME};
use crate::error::Result;
use crate::pipeline::{Pipeline, RunOutcome, RunSummary, Services};
use crate::run_state::Stage;
use crate::stages::Handoff;
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use netpharm_common::logging::{init_logging, LogConfig, LogGuard, LogLevel, LogOutput, LogRotation};
use std::path::{Path, PathBuf};
use tracing::info;

/// Name of the run-level log file
pub const RUN_LOG_FILE: &str = "pipeline.log";

/// Arguments of `netpharm run`
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    /// Configuration file; on resume defaults to the run's snapshot
    pub config: Option<PathBuf>,
    /// Parent directory for new runs, overriding `output.directory`
    pub output: Option<PathBuf>,
    /// Existing run directory to continue
    pub resume: Option<PathBuf>,
    pub verbose: bool,
}

/// Run or resume the pipeline
pub async fn run(args: RunArgs) -> Result<()> {
    let config_path = resolve_config_path(&args);
    let config = PipelineConfig::load(&config_path)?;
    let services = Services::from_config(&config)?;

    let mut pipeline = match &args.resume {
        Some(run_dir) => Pipeline::resume(config, services, run_dir)?,
        None => {
            let output_root = args
                .output
                .clone()
                .unwrap_or_else(|| config.output.directory.clone());
            Pipeline::create(config, services, &output_root)?
        },
    };

    let _guard = init_run_logging(pipeline.run_dir(), args.verbose);
    info!(
        run_dir = %pipeline.run_dir().display(),
        config = %config_path.display(),
        state = %pipeline.state().state,
        "Pipeline starting"
    );

    println!("{} {}", "Run directory:".cyan().bold(), pipeline.run_dir().display());
    let outcome = pipeline.run().await?;

    match outcome {
        RunOutcome::Completed(summary) => print_summary(&summary, pipeline.run_dir()),
        RunOutcome::Paused { stage, handoff } => print_pause(stage, &handoff, pipeline.run_dir()),
    }

    Ok(())
}

/// Explicit `--config`, else the snapshot inside a resumed run, else `./netpharm.yml`
fn resolve_config_path(args: &RunArgs) -> PathBuf {
    if let Some(path) = &args.config {
        return path.clone();
    }
    if let Some(run_dir) = &args.resume {
        let snapshot = run_dir.join(CONFIG_FILE_NAME);
        if snapshot.exists() {
            return snapshot;
        }
    }
    PathBuf::from(CONFIG_FILE_NAME)
}

/// Log to `<run-dir>/pipeline.log`, and to the console in verbose mode
fn init_run_logging(run_dir: &Path, verbose: bool) -> Option<LogGuard> {
    let (level, output) = if verbose {
        (LogLevel::Debug, LogOutput::Both)
    } else {
        (LogLevel::Info, LogOutput::File)
    };
    let config = LogConfig::builder()
        .level(level)
        .output(output)
        .log_dir(run_dir)
        .log_file_prefix(RUN_LOG_FILE)
        .rotation(LogRotation::Never)
        .build();

    // a subscriber may already be installed (tests, embedding)
    init_logging(&config).ok()
}

fn print_summary(summary: &RunSummary, run_dir: &Path) {
    println!();
    println!("{} Pipeline complete for {}", "✓".green(), summary.compound.bold());
    println!();

    let hubs = summary
        .hubs
        .iter()
        .map(|g| g.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).apply_modifier(UTF8_ROUND_CORNERS);
    table.set_header(vec!["Result", "Value"]);
    table.add_row(vec!["Predicted targets".to_string(), summary.targets.to_string()]);
    table.add_row(vec!["Pathways".to_string(), summary.pathways.to_string()]);
    table.add_row(vec!["Overlapping targets".to_string(), summary.overlap.to_string()]);
    table.add_row(vec![
        "Network".to_string(),
        format!("{} nodes, {} edges", summary.nodes, summary.edges),
    ]);
    table.add_row(vec!["Hubs".to_string(), hubs]);
    table.add_row(vec!["Enriched terms".to_string(), summary.enriched_terms.to_string()]);
    if let Some(high_affinity) = summary.high_affinity {
        table.add_row(vec!["High-affinity targets".to_string(), high_affinity.to_string()]);
    }
    table.add_row(vec!["Figures".to_string(), summary.figures.len().to_string()]);
    println!("{}", table);

    println!();
    println!("Results: {}", run_dir.display());
}

fn print_pause(stage: Stage, handoff: &Handoff, run_dir: &Path) {
    println!();
    println!(
        "{} Paused at the {} stage: waiting for manual input",
        "⏸".yellow(),
        stage.to_string().bold()
    );
    println!();
    println!("Provide:");
    for path in &handoff.awaiting {
        println!("  {}", path.display());
    }
    println!();
    println!("Instructions: {}", handoff.instructions.display());
    println!("Then resume with:");
    println!("  netpharm run --resume {}", run_dir.display());
}

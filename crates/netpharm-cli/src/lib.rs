//! netpharm CLI Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Network-pharmacology pipeline for a single compound.
//!
//! # Overview
//!
//! A run walks a fixed sequence of stages, each writing its artifacts into
//! its own `stepN_<name>/` directory of the run:
//!
//! - **Compound**: resolve the compound through PubChem
//! - **Targets**: import SwissTargetPrediction / SuperPred exports
//! - **Pathways**: filter Reactome pathways and intersect with the targets
//! - **Network**: STRING interactions, centralities and hub genes
//! - **Enrichment**: g:Profiler, or DAVID exports supplied by hand
//! - **Docking**: optional gate on docking scores against a reference target
//! - **Visualization**: network, enrichment and docking figures
//!
//! Manual stages pause the run until their files exist; `netpharm run
//! --resume <run-dir>` continues from the last completed stage.
//! `netpharm structures` downloads AlphaFold models for the hub genes of a
//! finished run.

pub mod commands;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod run_state;
pub mod stages;
pub mod visualize;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use error::{CliError, Result};
pub use pipeline::{Pipeline, RunOutcome, Services};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// netpharm - network pharmacology pipeline
#[derive(Parser, Debug)]
#[command(name = "netpharm")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print the CLI reference as Markdown
    #[arg(long, hide = true)]
    pub markdown_help: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a netpharm.yml template
    Init {
        /// Project directory (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,

        /// Overwrite an existing netpharm.yml
        #[arg(short, long)]
        force: bool,
    },

    /// Run the pipeline, or resume a paused or failed run
    Run {
        /// Configuration file (defaults to ./netpharm.yml, or the run's copy on resume)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Parent directory for the new run directory
        #[arg(short, long, conflicts_with = "resume")]
        output: Option<PathBuf>,

        /// Existing run directory to continue
        #[arg(long, value_name = "RUN_DIR")]
        resume: Option<PathBuf>,
    },

    /// Show the state of a run directory
    Status {
        /// Run directory created by 'netpharm run'
        run_dir: PathBuf,
    },

    /// Gate docking scores against a reference target
    Dock {
        /// Docking score file (gene_name, docking_score, structure_id)
        #[arg(short, long)]
        input: PathBuf,

        /// Reference gene the scores are normalized against
        #[arg(short, long, default_value = crate::config::DEFAULT_REFERENCE_GENE)]
        reference: String,

        /// Minimum delta for a high-affinity target (exclusive)
        #[arg(short, long, default_value_t = 0.0)]
        threshold: f64,

        /// Output directory (defaults to the input's directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Download AlphaFold models for a gene list or a run's hub genes
    Structures {
        /// Gene symbols (comma separated or repeated)
        #[arg(short, long, value_delimiter = ',')]
        genes: Vec<String>,

        /// Gene list: one symbol per line, or a CSV/TSV such as network_metrics.csv
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Run directory whose hub genes are fetched
        #[arg(long, value_name = "RUN_DIR")]
        hubs: Option<PathBuf>,

        /// Keep only the first N genes of --file (ranked by degree when the table has one)
        #[arg(short, long)]
        top: Option<usize>,

        /// Output directory (defaults to data/alphafold_pdbs, or <RUN_DIR>/data/alphafold_pdbs with --hubs)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pause between genes in milliseconds
        #[arg(long, default_value_t = 1000)]
        delay_ms: u64,

        /// UniProt REST base URL
        #[arg(long, env = "NETPHARM_UNIPROT_URL", default_value = netpharm_ingest::endpoints::UNIPROT_BASE_URL, hide = true)]
        uniprot_url: String,

        /// AlphaFold DB base URL
        #[arg(long, env = "NETPHARM_ALPHAFOLD_URL", default_value = netpharm_ingest::endpoints::ALPHAFOLD_BASE_URL, hide = true)]
        alphafold_url: String,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration after environment overrides
    Show {
        /// Configuration file
        #[arg(short, long, default_value = crate::config::CONFIG_FILE_NAME)]
        config: PathBuf,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_resume() {
        let cli = Cli::try_parse_from(["netpharm", "run", "--resume", "results/run1"]).unwrap();
        match cli.command {
            Some(Commands::Run { resume, output, .. }) => {
                assert_eq!(resume, Some(PathBuf::from("results/run1")));
                assert!(output.is_none());
            },
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_output_conflicts_with_resume() {
        assert!(Cli::try_parse_from(["netpharm", "run", "--resume", "r", "--output", "o"]).is_err());
    }

    #[test]
    fn test_parse_dock_defaults() {
        let cli = Cli::try_parse_from(["netpharm", "dock", "--input", "scores.csv"]).unwrap();
        match cli.command {
            Some(Commands::Dock {
                reference, threshold, ..
            }) => {
                assert_eq!(reference, config::DEFAULT_REFERENCE_GENE);
                assert_eq!(threshold, 0.0);
            },
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_structures_gene_list() {
        let cli = Cli::try_parse_from(["netpharm", "structures", "--genes", "EGFR,TP53", "-g", "AKT1"]).unwrap();
        match cli.command {
            Some(Commands::Structures {
                genes,
                delay_ms,
                uniprot_url,
                ..
            }) => {
                assert_eq!(genes, vec!["EGFR", "TP53", "AKT1"]);
                assert_eq!(delay_ms, 1000);
                assert!(uniprot_url.starts_with("https://"));
            },
            other => panic!("unexpected command: {:?}", other),
        }
    }
}

//! netpharm CLI - Main entry point

use clap::Parser;
use netpharm_cli::commands::run::RunArgs;
use netpharm_cli::commands::structures::{GeneSelection, StructuresArgs};
use netpharm_cli::{Cli, Commands, ConfigCommand};
use netpharm_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process;
use std::time::Duration;
use tracing::error;

#[tokio::main]
async fn main() {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Handle markdown help generation
    if cli.markdown_help {
        println!("{}", clap_markdown::help_markdown::<Cli>());
        return;
    }

    let Some(ref command) = cli.command else {
        eprintln!("Error: A subcommand is required");
        eprintln!();
        eprintln!("For more information, try '--help'.");
        process::exit(2);
    };

    // `run` installs its own subscriber that also writes <run-dir>/pipeline.log
    let _guard = if matches!(command, Commands::Run { .. }) {
        None
    } else {
        let log_config = LogConfig::builder()
            .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Warn })
            .output(LogOutput::Console)
            .log_file_prefix("netpharm")
            .build();

        // Merge with environment variables (they take precedence)
        let log_config = log_config.clone().merge_env().unwrap_or(log_config);

        // CLI should work without logging
        init_logging(&log_config).ok()
    };

    if let Err(e) = execute_command(command, cli.verbose).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Execute the CLI command
async fn execute_command(command: &Commands, verbose: bool) -> netpharm_cli::Result<()> {
    match command {
        Commands::Init { path, force } => netpharm_cli::commands::init::run(path.clone(), *force).await,

        Commands::Run {
            config,
            output,
            resume,
        } => {
            netpharm_cli::commands::run::run(RunArgs {
                config: config.clone(),
                output: output.clone(),
                resume: resume.clone(),
                verbose,
            })
            .await
        },

        Commands::Status { run_dir } => netpharm_cli::commands::status::run(run_dir).await,

        Commands::Dock {
            input,
            reference,
            threshold,
            output,
        } => {
            netpharm_cli::commands::dock::run(input.clone(), reference.clone(), *threshold, output.clone())
                .await
        },

        Commands::Structures {
            genes,
            file,
            hubs,
            top,
            output,
            delay_ms,
            uniprot_url,
            alphafold_url,
        } => {
            netpharm_cli::commands::structures::run(StructuresArgs {
                selection: GeneSelection {
                    genes: genes.clone(),
                    file: file.clone(),
                    hubs_of: hubs.clone(),
                    top: *top,
                },
                output: output.clone(),
                uniprot_url: uniprot_url.clone(),
                alphafold_url: alphafold_url.clone(),
                delay: Duration::from_millis(*delay_ms),
            })
            .await
        },

        Commands::Config { command } => match command {
            ConfigCommand::Show { config } => netpharm_cli::commands::config::show(config).await,
        },
    }
}

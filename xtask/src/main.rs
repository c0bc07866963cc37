//! Build automation tasks for netpharm
//!
//! - Generating the CLI reference from the clap definitions

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for netpharm", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in Markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<netpharm_cli::Cli>();

    let content = format!(
        r#"# netpharm CLI Reference

This documentation is generated from the CLI source code. Last updated: {}.

## Overview

netpharm runs a network-pharmacology analysis for one compound: target
prediction import, pathway filtering, STRING interaction network with hub
genes, functional enrichment, an optional docking gate, and figures.

## Quick Start

```bash
# Write netpharm.yml, then set the compound and pathway search terms
netpharm init

# Start a run; manual stages pause with instructions in <run-dir>/data/
netpharm run

# Supply the requested files, then continue
netpharm run --resume results/compound_quercetin_20250101_120000

# Inspect a run
netpharm status results/compound_quercetin_20250101_120000
```

## Commands

{}

## Environment Variables

- `NETPHARM__<SECTION>__<KEY>` - Override any configuration value, e.g. `NETPHARM__NETWORK__CONFIDENCE=0.9`
- `LOG_LEVEL`, `LOG_FORMAT`, `LOG_FILTER` - Logging (see `netpharm_common::logging`)
- `RUST_LOG` - Additional tracing filter directives

## Run Directory Layout

```text
compound_<label>_<timestamp>/
  run_state.json        stage completion, checksums, pause and failure records
  pipeline.log          run log
  netpharm.yml          configuration snapshot used on resume
  data/                 manual handoff files and instructions
  step1_compound/ ... step7_visualization/
```

---

*Generated by `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("CLI.md");
    fs::write(&file_path, content)?;

    println!("✅ Generated CLI documentation at: {}", file_path.display());

    Ok(())
}

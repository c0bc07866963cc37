//! `netpharm init` command implementation
//!
//! Writes a commented `netpharm.yml` template into a project directory.

use crate::config::{CONFIG_FILE_NAME, CONFIG_TEMPLATE};
use crate::error::{CliError, Result};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

/// Initialize a project directory
pub async fn run(path: String, force: bool) -> Result<()> {
    let project_dir = PathBuf::from(&path);
    let config_path = write_template(&project_dir, force)?;

    println!("{} Created {}", "✓".green(), config_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Set compound.cid (or compound.smiles) and pathways.search_terms");
    println!("  2. Run 'netpharm run' to start the pipeline");

    Ok(())
}

/// Write the configuration template, refusing to overwrite unless forced
pub fn write_template(project_dir: &Path, force: bool) -> Result<PathBuf> {
    if !project_dir.exists() {
        fs::create_dir_all(project_dir)?;
    }

    let config_path = project_dir.join(CONFIG_FILE_NAME);
    if config_path.exists() && !force {
        return Err(CliError::AlreadyInitialized(config_path.display().to_string()));
    }

    fs::write(&config_path, CONFIG_TEMPLATE)?;
    Ok(config_path)
}

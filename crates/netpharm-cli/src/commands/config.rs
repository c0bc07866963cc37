//! `netpharm config` command implementation
//!
//! Prints the effective configuration after environment overrides.

use crate::config::PipelineConfig;
use crate::error::Result;
use colored::Colorize;
use std::path::Path;

/// Show the effective configuration
pub async fn show(path: &Path) -> Result<()> {
    let config = PipelineConfig::load(path)?;

    println!("{} {}", "Effective configuration:".cyan().bold(), path.display());
    println!();
    print!("{}", serde_yaml::to_string(&config)?);
    println!();
    println!("{}", "Environment overrides:".cyan());
    println!("  NETPHARM__<SECTION>__<KEY>, e.g. NETPHARM__NETWORK__CONFIDENCE=0.9");

    Ok(())
}

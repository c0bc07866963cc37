//! Progress indicators for pipeline stages
//!
//! Spinners draw to stderr and hide themselves when stderr is not a
//! terminal, so piping the CLI output stays clean.

use crate::run_state::Stage;
use indicatif::{ProgressBar, ProgressStyle};

/// Create a spinner for indeterminate operations
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Create a progress bar over `total` items
pub fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})")
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}

/// "[3/7] Filtering pathways"
pub fn stage_message(stage: Stage) -> String {
    let position = Stage::ALL.iter().position(|s| *s == stage).unwrap_or(0) + 1;
    let action = match stage {
        Stage::Compound => "Resolving compound",
        Stage::Targets => "Importing predicted targets",
        Stage::Pathways => "Filtering pathways",
        Stage::Network => "Building interaction network",
        Stage::Enrichment => "Running enrichment",
        Stage::Docking => "Gating docking scores",
        Stage::Visualization => "Rendering figures",
    };
    format!("[{}/{}] {}", position, Stage::ALL.len(), action)
}

/// Spinner for one pipeline stage
pub fn stage_spinner(stage: Stage) -> ProgressBar {
    create_spinner(&stage_message(stage))
}

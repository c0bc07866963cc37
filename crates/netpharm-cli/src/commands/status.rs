//! `netpharm status` command implementation
//!
//! Shows where a run stands: per-stage completion, artifact integrity, and
//! any pause or failure.

use crate::config::{PipelineConfig, CONFIG_FILE_NAME};
use crate::error::Result;
use crate::pipeline::stage_inputs;
use crate::run_state::{RunState, Stage};
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use std::fmt;
use std::path::Path;

/// Status of one stage in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    /// Completed and every artifact matches its checksum
    Done,
    /// Completed, but an artifact, an input file or the configuration changed
    Modified,
    Paused,
    Failed,
    Pending,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StageStatus::Done => "done",
            StageStatus::Modified => "modified",
            StageStatus::Paused => "paused",
            StageStatus::Failed => "failed",
            StageStatus::Pending => "pending",
        };
        f.write_str(label)
    }
}

/// Classify every stage of a run
///
/// With the run's configuration, inputs and configuration are compared as a
/// resume would; without it only the artifacts are checked.
pub fn stage_statuses(state: &RunState, run_dir: &Path, config: Option<&PipelineConfig>) -> Vec<(Stage, StageStatus)> {
    Stage::ALL
        .iter()
        .map(|&stage| {
            let unchanged = match config {
                Some(config) => stage_inputs(config, run_dir, stage)
                    .map(|inputs| state.is_reusable(stage, run_dir, &inputs))
                    .unwrap_or(false),
                None => state.artifacts_intact(stage, run_dir),
            };
            let status = if state.stages.contains_key(&stage) {
                if unchanged {
                    StageStatus::Done
                } else {
                    StageStatus::Modified
                }
            } else if state.paused.as_ref().is_some_and(|p| p.stage == stage) {
                StageStatus::Paused
            } else if state.failure.as_ref().is_some_and(|f| f.stage == stage) {
                StageStatus::Failed
            } else {
                StageStatus::Pending
            };
            (stage, status)
        })
        .collect()
}

/// Show the status of a run directory
pub async fn run(run_dir: &Path) -> Result<()> {
    let state = RunState::load(run_dir)?;
    let config = PipelineConfig::load(run_dir.join(CONFIG_FILE_NAME)).ok();

    println!("{} {}", "Run:".cyan().bold(), run_dir.display());
    println!("  Compound: {}", state.compound);
    println!("  State:    {}", state.state.to_string().bold());
    println!("  Updated:  {}", state.updated.format("%Y-%m-%d %H:%M:%S UTC"));
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).apply_modifier(UTF8_ROUND_CORNERS);
    table.set_header(vec!["Stage", "Status", "Completed", "Artifacts"]);

    for (stage, status) in stage_statuses(&state, run_dir, config.as_ref()) {
        let record = state.stages.get(&stage);
        table.add_row(vec![
            stage.to_string(),
            status.to_string(),
            record
                .map(|r| r.completed_at.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
            record.map(|r| r.artifacts.len().to_string()).unwrap_or_default(),
        ]);
    }
    println!("{}", table);

    if let Some(pause) = &state.paused {
        println!();
        println!("{} Waiting on the {} stage for:", "⏸".yellow(), pause.stage);
        for path in &pause.awaiting {
            println!("  {}", path.display());
        }
        println!("Instructions: {}", pause.instructions.display());
        println!("Resume with: netpharm run --resume {}", run_dir.display());
    }

    if let Some(failure) = &state.failure {
        println!();
        println!("{} {} stage failed: {}", "✗".red(), failure.stage, failure.error);
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::run_state::StageInputs;
    use std::path::PathBuf;

    #[test]
    fn test_stage_statuses() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("compound.json");
        std::fs::write(&artifact, "{}").unwrap();

        let mut state = RunState::new("5280343");
        state
            .record_completion(Stage::Compound, dir.path(), &[artifact.clone()], StageInputs::default())
            .unwrap();
        state.mark_paused(
            Stage::Targets,
            vec![PathBuf::from("data/swiss_results.csv")],
            PathBuf::from("data/INSTRUCTIONS_targets.md"),
        );

        let statuses = stage_statuses(&state, dir.path(), None);
        assert_eq!(statuses[0], (Stage::Compound, StageStatus::Done));
        assert_eq!(statuses[1], (Stage::Targets, StageStatus::Paused));
        assert_eq!(statuses[2], (Stage::Pathways, StageStatus::Pending));

        std::fs::write(&artifact, "{\"edited\": true}").unwrap();
        let statuses = stage_statuses(&state, dir.path(), None);
        assert_eq!(statuses[0], (Stage::Compound, StageStatus::Modified));
    }

    #[test]
    fn test_config_change_marks_stage_modified() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("compound_info.csv");
        std::fs::write(&artifact, "cid\n5280343\n").unwrap();

        let config = PipelineConfig::from_yaml("compound: {cid: 5280343}\npathways: {search_terms: [apoptosis]}\n").unwrap();
        let inputs = stage_inputs(&config, dir.path(), Stage::Compound).unwrap();
        let mut state = RunState::new("5280343");
        state
            .record_completion(Stage::Compound, dir.path(), &[artifact], inputs)
            .unwrap();

        let statuses = stage_statuses(&state, dir.path(), Some(&config));
        assert_eq!(statuses[0], (Stage::Compound, StageStatus::Done));

        let renamed = PipelineConfig::from_yaml(
            "compound: {cid: 5280343, name: Quercetin}\npathways: {search_terms: [apoptosis]}\n",
        )
        .unwrap();
        let statuses = stage_statuses(&state, dir.path(), Some(&renamed));
        assert_eq!(statuses[0], (Stage::Compound, StageStatus::Modified));
    }
}

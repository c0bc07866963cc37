//! Run state handling (run_state.json)
//!
//! The run state records where a pipeline run stands: which stages finished
//! (with checksums of every artifact they wrote), whether the run is waiting
//! on a manual handoff, and the last failure. It is the resume point for
//! `netpharm run --resume`.

use crate::error::{CliError, Result};
use chrono::{DateTime, Utc};
use netpharm_common::checksum::{compute_checksum, compute_file_checksum, verify_file_checksum};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the run state inside a run directory
pub const RUN_STATE_FILE: &str = "run_state.json";

/// Current run state format version
pub const RUN_STATE_VERSION: u32 = 1;

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Compound,
    Targets,
    Pathways,
    Network,
    Enrichment,
    Docking,
    Visualization,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Compound,
        Stage::Targets,
        Stage::Pathways,
        Stage::Network,
        Stage::Enrichment,
        Stage::Docking,
        Stage::Visualization,
    ];

    /// Output directory of the stage inside a run directory
    pub fn dir_name(self) -> &'static str {
        match self {
            Stage::Compound => "step1_compound",
            Stage::Targets => "step2_targets",
            Stage::Pathways => "step3_pathways",
            Stage::Network => "step4_network",
            Stage::Enrichment => "step5_enrichment",
            Stage::Docking => "step6_docking",
            Stage::Visualization => "step7_visualization",
        }
    }

    /// State the pipeline is in once this stage completes
    pub fn completed_state(self) -> PipelineState {
        match self {
            Stage::Compound => PipelineState::CompoundResolved,
            Stage::Targets => PipelineState::TargetsImported,
            Stage::Pathways => PipelineState::PathwaysFiltered,
            Stage::Network => PipelineState::NetworkBuilt,
            Stage::Enrichment => PipelineState::Enriched,
            Stage::Docking => PipelineState::DockingGated,
            Stage::Visualization => PipelineState::Visualized,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Compound => "compound",
            Stage::Targets => "targets",
            Stage::Pathways => "pathways",
            Stage::Network => "network",
            Stage::Enrichment => "enrichment",
            Stage::Docking => "docking",
            Stage::Visualization => "visualization",
        };
        f.write_str(name)
    }
}

/// Pipeline state machine position
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Init,
    CompoundResolved,
    TargetsImported,
    PathwaysFiltered,
    NetworkBuilt,
    Enriched,
    DockingGated,
    Visualized,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Init => "Init",
            PipelineState::CompoundResolved => "CompoundResolved",
            PipelineState::TargetsImported => "TargetsImported",
            PipelineState::PathwaysFiltered => "PathwaysFiltered",
            PipelineState::NetworkBuilt => "NetworkBuilt",
            PipelineState::Enriched => "Enriched",
            PipelineState::DockingGated => "DockingGated",
            PipelineState::Visualized => "Visualized",
        };
        f.write_str(name)
    }
}

/// File written by a completed stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Path relative to the run directory
    pub path: PathBuf,
    /// SHA-256 checksum
    pub checksum: String,
}

/// What a stage was computed from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageInputs {
    /// SHA-256 of the stage's serialized configuration section
    pub config: String,
    /// Input files that existed when the stage ran
    #[serde(default)]
    pub files: Vec<ArtifactRecord>,
}

impl StageInputs {
    /// Fingerprint a configuration section and whichever `candidates` exist.
    ///
    /// A candidate that appears later changes the fingerprint just like an
    /// edited one.
    pub fn capture<C: Serialize>(config: &C, run_dir: &Path, candidates: &[PathBuf]) -> Result<Self> {
        let serialized = serde_json::to_vec(config)?;
        let config = compute_checksum(&mut serialized.as_slice())?;

        let mut files = Vec::new();
        for path in candidates.iter().filter(|p| p.exists()) {
            files.push(ArtifactRecord {
                checksum: compute_file_checksum(path)?,
                path: relative_to(run_dir, path),
            });
        }
        Ok(Self { config, files })
    }
}

fn relative_to(run_dir: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(run_dir).unwrap_or(path).to_path_buf()
}

/// Completion record of one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub completed_at: DateTime<Utc>,
    pub artifacts: Vec<ArtifactRecord>,
    /// Records written before inputs were tracked never match and re-run
    #[serde(default)]
    pub inputs: StageInputs,
}

/// Manual handoff the run is waiting for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauseRecord {
    pub stage: Stage,
    pub awaiting: Vec<PathBuf>,
    pub instructions: PathBuf,
    pub since: DateTime<Utc>,
}

/// Last stage failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub stage: Stage,
    pub error: String,
    pub at: DateTime<Utc>,
}

/// Persistent state of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    /// Run state format version
    pub version: u32,

    /// Label of the compound (CID or "smiles")
    pub compound: String,

    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,

    /// Position in the state machine
    pub state: PipelineState,

    #[serde(default)]
    pub stages: BTreeMap<Stage, StageRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused: Option<PauseRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureRecord>,
}

impl RunState {
    pub fn new(compound: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            version: RUN_STATE_VERSION,
            compound: compound.into(),
            created: now,
            updated: now,
            state: PipelineState::Init,
            stages: BTreeMap::new(),
            paused: None,
            failure: None,
        }
    }

    /// Load the run state of a run directory
    pub fn load(run_dir: impl AsRef<Path>) -> Result<Self> {
        let path = run_dir.as_ref().join(RUN_STATE_FILE);
        if !path.exists() {
            return Err(CliError::RunNotFound(run_dir.as_ref().display().to_string()));
        }
        let content = std::fs::read_to_string(&path)?;
        let state: RunState = serde_json::from_str(&content)?;
        Ok(state)
    }

    /// Save the run state into a run directory
    pub fn save(&self, run_dir: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(run_dir.as_ref().join(RUN_STATE_FILE), content)?;
        Ok(())
    }

    /// Record a completed stage with checksums of its artifacts and the
    /// inputs it was computed from
    pub fn record_completion(
        &mut self,
        stage: Stage,
        run_dir: &Path,
        artifacts: &[PathBuf],
        inputs: StageInputs,
    ) -> Result<()> {
        let mut records = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            let relative = relative_to(run_dir, artifact);
            records.push(ArtifactRecord {
                checksum: compute_file_checksum(run_dir.join(&relative))?,
                path: relative,
            });
        }

        self.stages.insert(
            stage,
            StageRecord {
                completed_at: Utc::now(),
                artifacts: records,
                inputs,
            },
        );
        self.state = stage.completed_state();
        if self.paused.as_ref().is_some_and(|p| p.stage == stage) {
            self.paused = None;
        }
        if self.failure.as_ref().is_some_and(|f| f.stage == stage) {
            self.failure = None;
        }
        self.updated = Utc::now();
        Ok(())
    }

    /// Whether a completed stage can be reused: recorded from the same
    /// configuration and input files, with every artifact unchanged
    pub fn is_reusable(&self, stage: Stage, run_dir: &Path, inputs: &StageInputs) -> bool {
        let Some(record) = self.stages.get(&stage) else {
            return false;
        };
        if record.inputs.config != inputs.config {
            warn!(stage = %stage, "Configuration changed; stage will re-run");
            return false;
        }
        if record.inputs.files != inputs.files {
            warn!(stage = %stage, "Input files changed; stage will re-run");
            return false;
        }
        self.artifacts_intact(stage, run_dir)
    }

    /// Whether every artifact of a completed stage is present and unchanged
    pub fn artifacts_intact(&self, stage: Stage, run_dir: &Path) -> bool {
        let Some(record) = self.stages.get(&stage) else {
            return false;
        };
        record.artifacts.iter().all(|artifact| {
            match verify_file_checksum(run_dir.join(&artifact.path), &artifact.checksum) {
                Ok(()) => true,
                Err(e) => {
                    warn!(stage = %stage, artifact = %artifact.path.display(), error = %e, "Artifact changed; stage will re-run");
                    false
                },
            }
        })
    }

    /// Drop the records of `stage` and everything downstream of it
    pub fn invalidate_from(&mut self, stage: Stage) {
        let before = self.stages.len();
        self.stages.retain(|s, _| *s < stage);
        if self.stages.len() != before {
            debug!(stage = %stage, dropped = before - self.stages.len(), "Invalidated downstream stages");
        }
        self.state = self
            .stages
            .keys()
            .next_back()
            .map(|s| s.completed_state())
            .unwrap_or(PipelineState::Init);
        self.updated = Utc::now();
    }

    pub fn mark_paused(&mut self, stage: Stage, awaiting: Vec<PathBuf>, instructions: PathBuf) {
        self.paused = Some(PauseRecord {
            stage,
            awaiting,
            instructions,
            since: Utc::now(),
        });
        self.updated = Utc::now();
    }

    pub fn mark_failed(&mut self, stage: Stage, error: &impl fmt::Display) {
        self.failure = Some(FailureRecord {
            stage,
            error: error.to_string(),
            at: Utc::now(),
        });
        self.updated = Utc::now();
    }

    pub fn is_complete(&self) -> bool {
        self.state == PipelineState::Visualized
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn write(dir: &Path, rel: &str, content: &str) -> PathBuf {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = write(dir.path(), "step1_compound/compound.json", "{}");

        let mut state = RunState::new("5280343");
        state
            .record_completion(Stage::Compound, dir.path(), &[artifact], StageInputs::default())
            .unwrap();
        state.save(dir.path()).unwrap();

        let loaded = RunState::load(dir.path()).unwrap();
        assert_eq!(loaded.state, PipelineState::CompoundResolved);
        assert_eq!(
            loaded.stages[&Stage::Compound].artifacts[0].path,
            PathBuf::from("step1_compound/compound.json")
        );
    }

    #[test]
    fn test_load_missing_is_run_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(RunState::load(dir.path()), Err(CliError::RunNotFound(_))));
    }

    #[test]
    fn test_reusable_until_artifact_changes() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = write(dir.path(), "step2_targets/targets_combined.csv", "gene,source,score\n");

        let inputs = StageInputs::capture(&"threshold: 0.5", dir.path(), &[]).unwrap();

        let mut state = RunState::new("1");
        state
            .record_completion(Stage::Targets, dir.path(), &[artifact.clone()], inputs.clone())
            .unwrap();
        assert!(state.is_reusable(Stage::Targets, dir.path(), &inputs));
        assert!(!state.is_reusable(Stage::Pathways, dir.path(), &inputs));

        std::fs::write(&artifact, "gene,source,score\nEGFR,swiss,0.9\n").unwrap();
        assert!(!state.is_reusable(Stage::Targets, dir.path(), &inputs));

        std::fs::remove_file(&artifact).unwrap();
        assert!(!state.is_reusable(Stage::Targets, dir.path(), &inputs));
    }

    #[test]
    fn test_not_reusable_when_config_or_inputs_change() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = write(dir.path(), "step2_targets/targets_combined.csv", "gene,source,score\n");
        let swiss = write(dir.path(), "data/swiss_results.csv", "Gene,Score\nEGFR,0.9\n");
        let superpred = dir.path().join("data/superpred_results.csv");
        let candidates = vec![swiss.clone(), superpred.clone()];

        let inputs = StageInputs::capture(&0.0f64, dir.path(), &candidates).unwrap();
        assert_eq!(inputs.files.len(), 1);
        assert_eq!(inputs.files[0].path, PathBuf::from("data/swiss_results.csv"));

        let mut state = RunState::new("1");
        state
            .record_completion(Stage::Targets, dir.path(), &[artifact], inputs.clone())
            .unwrap();
        assert!(state.is_reusable(Stage::Targets, dir.path(), &inputs));

        let stricter = StageInputs::capture(&0.9f64, dir.path(), &candidates).unwrap();
        assert!(!state.is_reusable(Stage::Targets, dir.path(), &stricter));

        std::fs::write(&superpred, "Target,Probability\nCDK1,0.8\n").unwrap();
        let with_superpred = StageInputs::capture(&0.0f64, dir.path(), &candidates).unwrap();
        assert!(!state.is_reusable(Stage::Targets, dir.path(), &with_superpred));

        std::fs::remove_file(&superpred).unwrap();
        std::fs::write(&swiss, "Gene,Score\nEGFR,0.2\n").unwrap();
        let edited = StageInputs::capture(&0.0f64, dir.path(), &candidates).unwrap();
        assert!(!state.is_reusable(Stage::Targets, dir.path(), &edited));
        assert!(state.artifacts_intact(Stage::Targets, dir.path()));
    }

    #[test]
    fn test_invalidate_from_drops_downstream() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = RunState::new("1");
        for stage in [Stage::Compound, Stage::Targets, Stage::Pathways] {
            let artifact = write(dir.path(), &format!("{}/out.csv", stage.dir_name()), "x");
            state
                .record_completion(stage, dir.path(), &[artifact], StageInputs::default())
                .unwrap();
        }

        state.invalidate_from(Stage::Targets);
        assert_eq!(state.stages.len(), 1);
        assert_eq!(state.state, PipelineState::CompoundResolved);
    }

    #[test]
    fn test_completion_clears_pause_for_stage() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = RunState::new("1");
        state.mark_paused(
            Stage::Targets,
            vec![PathBuf::from("data/swiss_results.csv")],
            PathBuf::from("data/INSTRUCTIONS_targets.md"),
        );
        let artifact = write(dir.path(), "step2_targets/a.csv", "x");
        state
            .record_completion(Stage::Targets, dir.path(), &[artifact], StageInputs::default())
            .unwrap();
        assert!(state.paused.is_none());
    }
}

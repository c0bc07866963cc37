//! Pipeline driver
//!
//! Walks the stages in order, persisting `run_state.json` after every
//! transition. A stage is reloaded instead of re-executed when its
//! configuration section, its input files and its artifacts all match what
//! was recorded, so `netpharm run --resume` picks up after the last good
//! stage. Manual stages without their handoff files
//! pause the run; failures are recorded and surfaced as
//! [`CliError::StageFailed`].

use crate::config::{PipelineConfig, CONFIG_FILE_NAME};
use crate::error::{CliError, Result};
use crate::progress;
use crate::run_state::{RunState, Stage, StageInputs};
use crate::stages::docking::DockingReport;
use crate::stages::network::{scope_genes, Network};
use crate::stages::pathways::PathwayFilter;
use crate::stages::{compound, data_dir, docking, enrichment, network, pathways, targets, Handoff, StageOutcome};
use crate::visualize::{self, Figures};
use netpharm_common::types::{Compound, EnrichmentTerm, TargetSet};
use netpharm_common::GeneSymbol;
use netpharm_ingest::gprofiler::{self, GProfilerClient};
use netpharm_ingest::pubchem::{self, PubChemClient};
use netpharm_ingest::reactome::{self, ReactomeClient};
use netpharm_ingest::string_db::{self, StringClient};
use netpharm_ingest::{
    CompoundSource, EnrichmentSource, InteractionSource, PathwaySource, RetryPolicy, ServiceClient,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

// ============================================================================
// Services
// ============================================================================

/// External services the pipeline talks to
#[derive(Clone)]
pub struct Services {
    pub compounds: Arc<dyn CompoundSource>,
    pub pathways: Arc<dyn PathwaySource>,
    pub interactions: Arc<dyn InteractionSource>,
    pub enrichment: Arc<dyn EnrichmentSource>,
}

impl Services {
    /// Real HTTP clients for the configured endpoints
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let services = &config.services;
        let timeout = Duration::from_secs(services.timeout_secs);
        let retry = RetryPolicy::new(services.max_attempts, services.initial_backoff_ms);

        let pubchem = ServiceClient::new(pubchem::SERVICE, timeout, retry)?;
        let reactome = ServiceClient::new(reactome::SERVICE, timeout, retry)?;
        let string = ServiceClient::new(string_db::SERVICE, timeout, retry)?;
        // one attempt only: a long enrichment query is not worth repeating
        let gprofiler = ServiceClient::new(gprofiler::SERVICE, timeout, RetryPolicy::single_attempt())?;

        Ok(Self {
            compounds: Arc::new(PubChemClient::new(pubchem, &services.pubchem_url)),
            pathways: Arc::new(ReactomeClient::new(
                reactome,
                &services.reactome_url,
                &config.pathways.species,
            )),
            interactions: Arc::new(StringClient::new(
                string,
                &services.string_url,
                config.network.species,
            )),
            enrichment: Arc::new(GProfilerClient::new(
                gprofiler,
                &services.gprofiler_url,
                &config.enrichment.organism,
            )),
        })
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Counts reported when a run finishes
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub compound: String,
    pub targets: usize,
    pub pathways: usize,
    pub overlap: usize,
    pub nodes: usize,
    pub edges: usize,
    pub hubs: Vec<GeneSymbol>,
    pub enriched_terms: usize,
    pub high_affinity: Option<usize>,
    pub figures: Vec<PathBuf>,
}

/// How a `run` invocation ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(RunSummary),
    /// Waiting on files supplied by hand
    Paused { stage: Stage, handoff: Handoff },
}

enum Step<T> {
    Continue(T),
    Stop(RunOutcome),
}

macro_rules! proceed {
    ($step:expr) => {
        match $step {
            Step::Continue(value) => value,
            Step::Stop(outcome) => return Ok(outcome),
        }
    };
}

// ============================================================================
// Pipeline
// ============================================================================

/// One pipeline run bound to its run directory
pub struct Pipeline {
    config: PipelineConfig,
    services: Services,
    run_dir: PathBuf,
    state: RunState,
}

impl Pipeline {
    /// Start a new run under `output_root`
    ///
    /// Creates `compound_<label>_<timestamp>/` with its `data/` handoff
    /// directory and a snapshot of the configuration.
    pub fn create(config: PipelineConfig, services: Services, output_root: &Path) -> Result<Self> {
        let query = config.compound.query()?;
        let label = sanitize_label(config.compound.name.as_deref().unwrap_or(&query.label()));
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");

        let base = format!("compound_{}_{}", label, timestamp);
        let mut run_dir = output_root.join(&base);
        let mut suffix = 2;
        while run_dir.exists() {
            run_dir = output_root.join(format!("{}_{}", base, suffix));
            suffix += 1;
        }
        std::fs::create_dir_all(&run_dir)?;
        data_dir(&run_dir)?;
        std::fs::write(run_dir.join(CONFIG_FILE_NAME), serde_yaml::to_string(&config)?)?;

        let state = RunState::new(query.label());
        state.save(&run_dir)?;
        info!(run_dir = %run_dir.display(), compound = %query.label(), "Created run directory");

        Ok(Self {
            config,
            services,
            run_dir,
            state,
        })
    }

    /// Continue an existing run
    ///
    /// The configuration snapshot is refreshed so later resumes and
    /// `netpharm status` see the configuration this invocation runs with.
    pub fn resume(config: PipelineConfig, services: Services, run_dir: &Path) -> Result<Self> {
        let state = RunState::load(run_dir)?;
        std::fs::write(run_dir.join(CONFIG_FILE_NAME), serde_yaml::to_string(&config)?)?;
        info!(run_dir = %run_dir.display(), state = %state.state, "Resuming run");
        Ok(Self {
            config,
            services,
            run_dir: run_dir.to_path_buf(),
            state,
        })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Execute every stage that is not already complete
    pub async fn run(&mut self) -> Result<RunOutcome> {
        let compound = proceed!(self.compound_stage().await?);
        let targets = proceed!(self.targets_stage(&compound)?);
        let pathways = proceed!(self.pathways_stage(&targets).await?);
        let network = proceed!(self.network_stage(&targets, &pathways).await?);
        let terms = proceed!(self.enrichment_stage(&network).await?);

        let docking = if self.config.docking.enabled {
            Some(proceed!(self.docking_stage()?))
        } else {
            None
        };

        let title = self
            .config
            .compound
            .name
            .clone()
            .unwrap_or_else(|| compound.cid.map(|cid| format!("CID {}", cid)).unwrap_or_else(|| "compound".into()));
        let figures = proceed!(self.visualization_stage(&title, &network, &terms, docking.as_ref())?);

        info!(run_dir = %self.run_dir.display(), "Pipeline complete");
        Ok(RunOutcome::Completed(RunSummary {
            compound: title,
            targets: targets.len(),
            pathways: pathways.pathways.len(),
            overlap: pathways.overlap.len(),
            nodes: network.summary.nodes,
            edges: network.summary.edges,
            hubs: network.summary.hubs.clone(),
            enriched_terms: terms.len(),
            high_affinity: docking.map(|d| d.high_affinity.len()),
            figures,
        }))
    }

    // ========================================================================
    // Stages
    // ========================================================================

    async fn compound_stage(&mut self) -> Result<Step<Compound>> {
        let inputs = stage_inputs(&self.config, &self.run_dir, Stage::Compound)?;
        if let Some(compound) = self.reuse(Stage::Compound, &inputs, compound::load) {
            return Ok(Step::Continue(compound));
        }
        let spinner = progress::stage_spinner(Stage::Compound);
        let outcome = match self.config.compound.query() {
            Ok(query) => {
                compound::run(
                    self.services.compounds.as_ref(),
                    &query,
                    self.config.compound.name.as_deref(),
                    &self.run_dir,
                )
                .await
            },
            Err(e) => Err(e),
        };
        spinner.finish_and_clear();
        self.finish(Stage::Compound, inputs, outcome)
    }

    fn targets_stage(&mut self, compound: &Compound) -> Result<Step<TargetSet>> {
        let inputs = stage_inputs(&self.config, &self.run_dir, Stage::Targets)?;
        if let Some(targets) = self.reuse(Stage::Targets, &inputs, targets::load) {
            return Ok(Step::Continue(targets));
        }
        let outcome = targets::run(&self.config.targets, compound, &self.run_dir);
        self.finish(Stage::Targets, inputs, outcome)
    }

    async fn pathways_stage(&mut self, targets: &TargetSet) -> Result<Step<PathwayFilter>> {
        let inputs = stage_inputs(&self.config, &self.run_dir, Stage::Pathways)?;
        if let Some(filter) = self.reuse(Stage::Pathways, &inputs, pathways::load) {
            return Ok(Step::Continue(filter));
        }
        let spinner = progress::stage_spinner(Stage::Pathways);
        let outcome = pathways::run(
            self.services.pathways.as_ref(),
            &self.config.search_terms(),
            targets,
            self.config.pathways.max_per_keyword,
            &self.run_dir,
        )
        .await;
        spinner.finish_and_clear();
        self.finish(Stage::Pathways, inputs, outcome)
    }

    async fn network_stage(&mut self, targets: &TargetSet, filter: &PathwayFilter) -> Result<Step<Network>> {
        let inputs = stage_inputs(&self.config, &self.run_dir, Stage::Network)?;
        if let Some(network) = self.reuse(Stage::Network, &inputs, network::load) {
            return Ok(Step::Continue(network));
        }
        let genes = scope_genes(self.config.network.scope, targets, filter);
        let spinner = progress::stage_spinner(Stage::Network);
        let outcome = network::run(
            self.services.interactions.as_ref(),
            &genes,
            &self.config.network,
            &self.run_dir,
        )
        .await;
        spinner.finish_and_clear();
        self.finish(Stage::Network, inputs, outcome)
    }

    async fn enrichment_stage(&mut self, network: &Network) -> Result<Step<Vec<EnrichmentTerm>>> {
        let inputs = stage_inputs(&self.config, &self.run_dir, Stage::Enrichment)?;
        if let Some(terms) = self.reuse(Stage::Enrichment, &inputs, enrichment::load) {
            return Ok(Step::Continue(terms));
        }
        let genes: Vec<GeneSymbol> = network.nodes.iter().map(|n| n.gene.clone()).collect();
        let spinner = progress::stage_spinner(Stage::Enrichment);
        let outcome = enrichment::run(
            self.services.enrichment.as_ref(),
            &self.config.enrichment,
            &genes,
            &self.run_dir,
        )
        .await;
        spinner.finish_and_clear();
        self.finish(Stage::Enrichment, inputs, outcome)
    }

    fn docking_stage(&mut self) -> Result<Step<DockingReport>> {
        let inputs = stage_inputs(&self.config, &self.run_dir, Stage::Docking)?;
        if let Some(report) = self.reuse(Stage::Docking, &inputs, docking::load) {
            return Ok(Step::Continue(report));
        }
        let outcome = docking::run(&self.config.docking, &self.run_dir);
        self.finish(Stage::Docking, inputs, outcome)
    }

    fn visualization_stage(
        &mut self,
        title: &str,
        network: &Network,
        terms: &[EnrichmentTerm],
        docking: Option<&DockingReport>,
    ) -> Result<Step<Vec<PathBuf>>> {
        let inputs = stage_inputs(&self.config, &self.run_dir, Stage::Visualization)?;
        let spinner = progress::stage_spinner(Stage::Visualization);
        let figures = Figures {
            title,
            network,
            terms,
            docking,
        };
        let outcome = visualize::run(&figures, &self.config.visualization, &self.run_dir);
        spinner.finish_and_clear();
        self.finish(Stage::Visualization, inputs, outcome)
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Reload a completed stage, or invalidate it and everything after it
    fn reuse<T>(&mut self, stage: Stage, inputs: &StageInputs, load: impl FnOnce(&Path) -> Result<T>) -> Option<T> {
        if self.state.is_reusable(stage, &self.run_dir, inputs) {
            match load(&self.run_dir) {
                Ok(output) => {
                    info!(stage = %stage, "Reusing completed stage");
                    return Some(output);
                },
                Err(e) => warn!(stage = %stage, error = %e, "Could not reload stage output; re-running"),
            }
        }
        self.state.invalidate_from(stage);
        None
    }

    fn finish<T>(&mut self, stage: Stage, inputs: StageInputs, outcome: Result<StageOutcome<T>>) -> Result<Step<T>> {
        match outcome {
            Ok(StageOutcome::Done { output, artifacts }) => {
                self.state.record_completion(stage, &self.run_dir, &artifacts, inputs)?;
                self.state.save(&self.run_dir)?;
                info!(stage = %stage, state = %self.state.state, artifacts = artifacts.len(), "Stage complete");
                Ok(Step::Continue(output))
            },
            Ok(StageOutcome::Awaiting(handoff)) => {
                self.state
                    .mark_paused(stage, handoff.awaiting.clone(), handoff.instructions.clone());
                self.state.save(&self.run_dir)?;
                warn!(
                    stage = %stage,
                    instructions = %handoff.instructions.display(),
                    "Paused waiting for manual input"
                );
                Ok(Step::Stop(RunOutcome::Paused { stage, handoff }))
            },
            Err(e) => {
                self.state.mark_failed(stage, &e);
                self.state.save(&self.run_dir)?;
                error!(stage = %stage, error = %e, "Stage failed");
                Err(CliError::stage_failed(
                    stage.to_string(),
                    self.run_dir.display().to_string(),
                    e,
                ))
            },
        }
    }
}

/// Fingerprint of what `stage` is computed from: its configuration section
/// and the handoff files it reads
pub fn stage_inputs(config: &PipelineConfig, run_dir: &Path, stage: Stage) -> Result<StageInputs> {
    match stage {
        Stage::Compound => StageInputs::capture(&config.compound, run_dir, &[]),
        Stage::Targets => StageInputs::capture(
            &config.targets,
            run_dir,
            &targets::input_files(&config.targets, run_dir),
        ),
        Stage::Pathways => StageInputs::capture(&config.pathways, run_dir, &[]),
        Stage::Network => StageInputs::capture(&config.network, run_dir, &[]),
        Stage::Enrichment => StageInputs::capture(
            &config.enrichment,
            run_dir,
            &enrichment::input_files(&config.enrichment, run_dir),
        ),
        Stage::Docking => StageInputs::capture(
            &config.docking,
            run_dir,
            &[docking::input_file(&config.docking, run_dir)],
        ),
        Stage::Visualization => StageInputs::capture(&config.visualization, run_dir, &[]),
    }
}

/// Lowercase alphanumerics, everything else collapsed to `_`
fn sanitize_label(raw: &str) -> String {
    let mut label = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        if c.is_ascii_alphanumeric() {
            label.push(c.to_ascii_lowercase());
        } else if !label.ends_with('_') {
            label.push('_');
        }
    }
    let label = label.trim_matches('_');
    if label.is_empty() {
        "compound".to_string()
    } else {
        label.to_string()
    }
}

//! Pipeline configuration (netpharm.yml)
//!
//! Loaded with the `config` crate: the YAML file first, then environment
//! overrides such as `NETPHARM__NETWORK__CONFIDENCE=0.9`. Every section has
//! defaults, so a file only needs the compound and the pathway search terms.

use crate::error::{CliError, Result};
use netpharm_common::types::{CompoundQuery, EnrichmentCategory};
use netpharm_ingest::endpoints;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "netpharm.yml";

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "NETPHARM";

/// Default minimum STRING combined score
pub const DEFAULT_STRING_CONFIDENCE: f64 = 0.7;

/// Default SwissTargetPrediction probability threshold
pub const DEFAULT_SWISS_THRESHOLD: f64 = 0.0;

/// Default SuperPred probability threshold
pub const DEFAULT_SUPERPRED_THRESHOLD: f64 = 0.5;

/// Default number of pathways kept per keyword
pub const DEFAULT_MAX_PATHWAYS_PER_KEYWORD: usize = 5;

/// Default reference gene for docking normalization
pub const DEFAULT_REFERENCE_GENE: &str = "DYRK2";

/// Full pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub compound: CompoundConfig,
    pub targets: TargetsConfig,
    pub pathways: PathwaysConfig,
    pub network: NetworkConfig,
    pub enrichment: EnrichmentConfig,
    pub docking: DockingConfig,
    pub visualization: VisualizationConfig,
    pub services: ServicesConfig,
    pub output: OutputConfig,
}

/// Compound under study; exactly one of `cid` or `smiles`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompoundConfig {
    pub cid: Option<u64>,
    pub smiles: Option<String>,
    /// Display name used in reports
    pub name: Option<String>,
}

impl CompoundConfig {
    pub fn query(&self) -> Result<CompoundQuery> {
        match (&self.cid, &self.smiles) {
            (Some(cid), None) => Ok(CompoundQuery::cid(&cid.to_string())?),
            (None, Some(smiles)) => Ok(CompoundQuery::smiles(smiles)?),
            (Some(_), Some(_)) => Err(CliError::config(
                "compound.cid and compound.smiles are mutually exclusive",
            )),
            (None, None) => Err(CliError::config("set compound.cid or compound.smiles")),
        }
    }
}

/// One prediction export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSourceConfig {
    /// Explicit file; defaults to the run's `data/` handoff file
    #[serde(default)]
    pub file: Option<PathBuf>,
    /// Scores must be strictly greater than this to count
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetsConfig {
    pub swiss: PredictionSourceConfig,
    pub superpred: PredictionSourceConfig,
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self {
            swiss: PredictionSourceConfig {
                file: None,
                threshold: DEFAULT_SWISS_THRESHOLD,
            },
            superpred: PredictionSourceConfig {
                file: None,
                threshold: DEFAULT_SUPERPRED_THRESHOLD,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathwaysConfig {
    /// Keywords or Reactome identifiers (R-HSA-...)
    pub search_terms: Vec<String>,
    pub species: String,
    pub max_per_keyword: usize,
}

impl Default for PathwaysConfig {
    fn default() -> Self {
        Self {
            search_terms: Vec::new(),
            species: netpharm_ingest::reactome::DEFAULT_SPECIES.to_string(),
            max_per_keyword: DEFAULT_MAX_PATHWAYS_PER_KEYWORD,
        }
    }
}

/// Which genes become network nodes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkScope {
    /// Targets that are also pathway members
    #[default]
    Overlap,
    /// All imported targets
    Targets,
    /// Targets plus all pathway members
    Union,
}

/// Hub classification rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum HubPolicy {
    /// The `n` highest-degree nodes
    TopN { n: usize },
    /// Every node with degree strictly above `cutoff`
    MinDegree { cutoff: usize },
}

impl Default for HubPolicy {
    fn default() -> Self {
        HubPolicy::TopN { n: 10 }
    }
}

impl std::fmt::Display for HubPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HubPolicy::TopN { n } => write!(f, "top {} by degree", n),
            HubPolicy::MinDegree { cutoff } => write!(f, "degree > {}", cutoff),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Minimum STRING combined score (0..=1)
    pub confidence: f64,
    /// NCBI taxonomy id
    pub species: u32,
    pub scope: NetworkScope,
    pub hubs: HubPolicy,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_STRING_CONFIDENCE,
            species: netpharm_ingest::string_db::DEFAULT_SPECIES,
            scope: NetworkScope::default(),
            hubs: HubPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentMode {
    /// One g:Profiler request
    #[default]
    Automated,
    /// DAVID result files supplied by hand
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub mode: EnrichmentMode,
    pub categories: Vec<EnrichmentCategory>,
    pub organism: String,
    pub significance_threshold: f64,
    /// Directory holding DAVID exports; defaults to the run's `data/`
    pub manual_dir: Option<PathBuf>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            mode: EnrichmentMode::default(),
            categories: EnrichmentCategory::ALL.to_vec(),
            organism: netpharm_ingest::gprofiler::DEFAULT_ORGANISM.to_string(),
            significance_threshold: 0.05,
            manual_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockingConfig {
    pub enabled: bool,
    /// Docking scores file; defaults to the run's `data/docking_scores.csv`
    pub file: Option<PathBuf>,
    pub reference_gene: String,
    /// Candidates pass when delta is strictly greater than this
    pub min_delta: f64,
}

impl Default for DockingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            file: None,
            reference_gene: DEFAULT_REFERENCE_GENE.to_string(),
            min_delta: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationConfig {
    /// Nodes drawn in the static network figure
    pub top_nodes: usize,
    /// Terms drawn in the enrichment bubble chart
    pub top_terms: usize,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            top_nodes: 25,
            top_terms: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub pubchem_url: String,
    pub reactome_url: String,
    pub string_url: String,
    pub gprofiler_url: String,
    pub timeout_secs: u64,
    /// Attempts per request for retried services
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            pubchem_url: endpoints::PUBCHEM_BASE_URL.to_string(),
            reactome_url: endpoints::REACTOME_BASE_URL.to_string(),
            string_url: endpoints::STRING_BASE_URL.to_string(),
            gprofiler_url: endpoints::GPROFILER_BASE_URL.to_string(),
            timeout_secs: netpharm_ingest::http::DEFAULT_TIMEOUT_SECS,
            max_attempts: netpharm_ingest::http::DEFAULT_MAX_ATTEMPTS,
            initial_backoff_ms: netpharm_ingest::http::DEFAULT_INITIAL_BACKOFF_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Parent directory for run directories
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("results"),
        }
    }
}

impl PipelineConfig {
    /// Load from a YAML file with environment overrides, then validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CliError::config(format!(
                "'{}' not found. Run 'netpharm init' to create one",
                path.display()
            )));
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Yaml))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("pathways.search_terms")
                    .with_list_parse_key("enrichment.categories"),
            )
            .build()
            .map_err(|e| CliError::config(e.to_string()))?;

        let config: PipelineConfig = settings
            .try_deserialize()
            .map_err(|e| CliError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML text without environment overrides
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        self.compound.query()?;

        for (name, value) in [
            ("targets.swiss.threshold", self.targets.swiss.threshold),
            ("targets.superpred.threshold", self.targets.superpred.threshold),
            ("network.confidence", self.network.confidence),
            ("enrichment.significance_threshold", self.enrichment.significance_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(CliError::config(format!(
                    "{} must be between 0 and 1, got {}",
                    name, value
                )));
            }
        }

        if self.pathways.search_terms.iter().all(|t| t.trim().is_empty()) {
            return Err(CliError::config("pathways.search_terms must list at least one term"));
        }
        if self.pathways.max_per_keyword == 0 {
            return Err(CliError::config("pathways.max_per_keyword must be at least 1"));
        }
        if let HubPolicy::TopN { n: 0 } = self.network.hubs {
            return Err(CliError::config("network.hubs.n must be at least 1"));
        }
        if self.enrichment.categories.is_empty() {
            return Err(CliError::config("enrichment.categories must not be empty"));
        }
        if self.docking.enabled && self.docking.reference_gene.trim().is_empty() {
            return Err(CliError::config("docking.reference_gene must be set when docking is enabled"));
        }
        if self.visualization.top_nodes == 0 {
            return Err(CliError::config("visualization.top_nodes must be at least 1"));
        }
        if self.services.max_attempts == 0 {
            return Err(CliError::config("services.max_attempts must be at least 1"));
        }

        Ok(())
    }

    /// Search terms with blanks removed
    pub fn search_terms(&self) -> Vec<String> {
        self.pathways
            .search_terms
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

/// Template written by `netpharm init`
pub const CONFIG_TEMPLATE: &str = r#"# netpharm pipeline configuration
#
# Any key can be overridden from the environment, e.g.
#   NETPHARM__NETWORK__CONFIDENCE=0.9

compound:
  # PubChem CID of the compound (or use `smiles:` instead)
  cid: 5280343
  name: quercetin

targets:
  # Prediction exports default to <run>/data/swiss_results.csv and
  # <run>/data/superpred_results.csv
  swiss:
    threshold: 0.0
  superpred:
    threshold: 0.5

pathways:
  # Keywords (top 5 matches each) or Reactome ids such as R-HSA-109581
  search_terms:
    - apoptosis
    - R-HSA-109581
  species: Homo sapiens

network:
  confidence: 0.7
  species: 9606
  # overlap | targets | union
  scope: overlap
  hubs:
    mode: top_n
    n: 10

enrichment:
  # automated (g:Profiler) | manual (DAVID files in <run>/data)
  mode: automated
  categories: ["GO:BP", "GO:MF", "GO:CC", "KEGG", "REAC"]
  organism: hsapiens
  significance_threshold: 0.05

docking:
  enabled: false
  reference_gene: DYRK2
  min_delta: 0.0

visualization:
  top_nodes: 25
  top_terms: 15

output:
  directory: results
"#;

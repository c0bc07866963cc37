//! Common types used across netpharm

use crate::error::{NetpharmError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

// ============================================================================
// Gene Symbols
// ============================================================================

/// Gene symbol used as the join key between every stage.
///
/// Symbols are trimmed and upper-cased on construction, so `"egfr "` from a
/// prediction export and `"EGFR"` from Reactome compare equal. This is the
/// only place that normalization happens.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GeneSymbol(String);

impl GeneSymbol {
    pub fn new(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_uppercase();
        if normalized.is_empty() {
            return Err(NetpharmError::invalid_input("gene symbol is empty"));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GeneSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for GeneSymbol {
    type Error = NetpharmError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<GeneSymbol> for String {
    fn from(value: GeneSymbol) -> Self {
        value.0
    }
}

impl FromStr for GeneSymbol {
    type Err = NetpharmError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

// ============================================================================
// Compounds
// ============================================================================

/// How the user identified the compound under study
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompoundQuery {
    /// PubChem compound identifier
    Cid(u64),
    /// SMILES string
    Smiles(String),
}

impl CompoundQuery {
    /// Parse a PubChem CID, which must be a positive integer
    pub fn cid(raw: &str) -> Result<Self> {
        let cid: u64 = raw
            .trim()
            .parse()
            .map_err(|_| NetpharmError::invalid_input(format!("CID must be a positive integer, got '{}'", raw)))?;
        if cid == 0 {
            return Err(NetpharmError::invalid_input("CID must be a positive integer, got 0"));
        }
        Ok(Self::Cid(cid))
    }

    /// Validate a SMILES string against the SMILES alphabet
    pub fn smiles(raw: &str) -> Result<Self> {
        let smiles = raw.trim();
        if smiles.len() < 3 {
            return Err(NetpharmError::invalid_input(format!(
                "SMILES '{}' is too short",
                smiles
            )));
        }
        if let Some(bad) = smiles.chars().find(|c| !is_smiles_char(*c)) {
            return Err(NetpharmError::invalid_input(format!(
                "SMILES contains invalid character '{}': {}",
                bad, smiles
            )));
        }
        Ok(Self::Smiles(smiles.to_string()))
    }

    /// Short label used in run directory names
    pub fn label(&self) -> String {
        match self {
            Self::Cid(cid) => cid.to_string(),
            Self::Smiles(_) => "smiles".to_string(),
        }
    }
}

impl fmt::Display for CompoundQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cid(cid) => write!(f, "CID {}", cid),
            Self::Smiles(smiles) => write!(f, "SMILES {}", smiles),
        }
    }
}

fn is_smiles_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "[]()=#@+-\\/%.:*$".contains(c)
}

/// Canonical molecular attributes of the compound under study
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compound {
    pub cid: Option<u64>,
    pub canonical_smiles: String,
    pub isomeric_smiles: Option<String>,
    pub molecular_formula: String,
    pub molecular_weight: f64,
    pub iupac_name: Option<String>,
}

// ============================================================================
// Targets
// ============================================================================

/// Prediction service a target hit came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TargetSource {
    #[serde(rename = "swiss")]
    SwissTargetPrediction,
    #[serde(rename = "superpred")]
    SuperPred,
}

impl TargetSource {
    pub const ALL: [TargetSource; 2] = [TargetSource::SwissTargetPrediction, TargetSource::SuperPred];

    /// Short slug used in file names
    pub fn slug(self) -> &'static str {
        match self {
            Self::SwissTargetPrediction => "swiss",
            Self::SuperPred => "superpred",
        }
    }
}

impl fmt::Display for TargetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SwissTargetPrediction => write!(f, "SwissTargetPrediction"),
            Self::SuperPred => write!(f, "SuperPred"),
        }
    }
}

/// One accepted prediction for a gene
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceScore {
    pub source: TargetSource,
    pub score: f64,
}

/// Unified target list keyed by gene symbol.
///
/// Each gene appears once and carries one score per source that predicted it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetSet {
    targets: BTreeMap<GeneSymbol, Vec<SourceScore>>,
}

impl TargetSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a hit, keeping the highest score when a source repeats a gene
    pub fn insert(&mut self, gene: GeneSymbol, source: TargetSource, score: f64) {
        let hits = self.targets.entry(gene).or_default();
        match hits.iter_mut().find(|h| h.source == source) {
            Some(existing) => {
                if score > existing.score {
                    existing.score = score;
                }
            },
            None => {
                hits.push(SourceScore { source, score });
                hits.sort_by_key(|h| h.source);
            },
        }
    }

    pub fn contains(&self, gene: &GeneSymbol) -> bool {
        self.targets.contains_key(gene)
    }

    pub fn get(&self, gene: &GeneSymbol) -> Option<&[SourceScore]> {
        self.targets.get(gene).map(Vec::as_slice)
    }

    pub fn genes(&self) -> impl Iterator<Item = &GeneSymbol> {
        self.targets.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GeneSymbol, &[SourceScore])> {
        self.targets.iter().map(|(g, h)| (g, h.as_slice()))
    }

    /// Genes predicted by the given source
    pub fn genes_from(&self, source: TargetSource) -> impl Iterator<Item = &GeneSymbol> {
        self.targets
            .iter()
            .filter(move |(_, hits)| hits.iter().any(|h| h.source == source))
            .map(|(g, _)| g)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

// ============================================================================
// Pathways
// ============================================================================

static REACTOME_ID: LazyLock<regex::Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    regex::Regex::new(r"^R-[A-Z]{3}-\d+$").expect("static pattern")
});

/// Whether a search term is a stable Reactome identifier such as `R-HSA-109581`
pub fn is_pathway_id(term: &str) -> bool {
    REACTOME_ID.is_match(term.trim())
}

/// Pathway identity as returned by a knowledgebase search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathwayRef {
    pub id: String,
    pub name: String,
}

/// Protein participating in a pathway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathwayMember {
    pub gene: GeneSymbol,
    pub uniprot_id: Option<String>,
    pub protein_name: Option<String>,
}

/// Resolved pathway with its members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pathway {
    pub id: String,
    pub name: String,
    /// Search term that produced this pathway
    pub search_term: String,
    pub members: Vec<PathwayMember>,
}

// ============================================================================
// Interactions
// ============================================================================

/// Undirected protein-protein association with a 0..=1 confidence score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub gene_a: GeneSymbol,
    pub gene_b: GeneSymbol,
    pub score: f64,
}

// ============================================================================
// Enrichment
// ============================================================================

/// Functional annotation category of an enrichment term
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EnrichmentCategory {
    #[serde(rename = "GO:BP")]
    GoBiologicalProcess,
    #[serde(rename = "GO:MF")]
    GoMolecularFunction,
    #[serde(rename = "GO:CC")]
    GoCellularComponent,
    #[serde(rename = "KEGG")]
    Kegg,
    #[serde(rename = "REAC")]
    Reactome,
}

impl EnrichmentCategory {
    pub const ALL: [EnrichmentCategory; 5] = [
        EnrichmentCategory::GoBiologicalProcess,
        EnrichmentCategory::GoMolecularFunction,
        EnrichmentCategory::GoCellularComponent,
        EnrichmentCategory::Kegg,
        EnrichmentCategory::Reactome,
    ];

    /// Source code as used by g:Profiler
    pub fn code(self) -> &'static str {
        match self {
            Self::GoBiologicalProcess => "GO:BP",
            Self::GoMolecularFunction => "GO:MF",
            Self::GoCellularComponent => "GO:CC",
            Self::Kegg => "KEGG",
            Self::Reactome => "REAC",
        }
    }

    /// File-name friendly form of the code
    pub fn slug(self) -> &'static str {
        match self {
            Self::GoBiologicalProcess => "go_bp",
            Self::GoMolecularFunction => "go_mf",
            Self::GoCellularComponent => "go_cc",
            Self::Kegg => "kegg",
            Self::Reactome => "reactome",
        }
    }
}

impl fmt::Display for EnrichmentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for EnrichmentCategory {
    type Err = NetpharmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().replace('_', ":").as_str() {
            "GO:BP" => Ok(Self::GoBiologicalProcess),
            "GO:MF" => Ok(Self::GoMolecularFunction),
            "GO:CC" => Ok(Self::GoCellularComponent),
            "KEGG" => Ok(Self::Kegg),
            "REAC" | "REACTOME" => Ok(Self::Reactome),
            other => Err(NetpharmError::invalid_input(format!(
                "unknown enrichment category '{}'",
                other
            ))),
        }
    }
}

/// One enriched term
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentTerm {
    pub category: EnrichmentCategory,
    pub term_id: String,
    pub description: String,
    pub count: u32,
    /// Fraction of the query genes annotated with the term
    pub gene_ratio: Option<f64>,
    pub p_value: Option<f64>,
    pub adjusted_p_value: f64,
    pub genes: Vec<String>,
}

// ============================================================================
// Docking
// ============================================================================

/// Docking score for one gene product against one structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockingRecord {
    pub gene: GeneSymbol,
    pub score: f64,
    pub structure_id: String,
}

/// Docking record normalized against the reference target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockingHit {
    pub gene: GeneSymbol,
    pub structure_id: String,
    pub score: f64,
    /// Reference score minus candidate score
    pub delta: f64,
}

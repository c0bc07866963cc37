//! Adapter traits for the external services the pipeline depends on
//!
//! Stages only see these traits. Response-shape details stay in the concrete
//! clients, and tests substitute in-memory fakes.

use async_trait::async_trait;
use netpharm_common::types::{
    Compound, CompoundQuery, EnrichmentCategory, EnrichmentTerm, Interaction, PathwayMember,
    PathwayRef,
};
use netpharm_common::{GeneSymbol, Result};

/// Compound database (PubChem)
#[async_trait]
pub trait CompoundSource: Send + Sync {
    /// Resolve a CID or SMILES into canonical attributes; `NotFound` when unknown
    async fn resolve(&self, query: &CompoundQuery) -> Result<Compound>;
}

/// Pathway knowledgebase (Reactome)
#[async_trait]
pub trait PathwaySource: Send + Sync {
    /// Keyword search, ranked in the service's own relevance order
    async fn search(&self, keyword: &str) -> Result<Vec<PathwayRef>>;

    /// Exact lookup of a pathway identifier; `NotFound` when absent
    async fn lookup(&self, id: &str) -> Result<PathwayRef>;

    /// Protein members of a pathway
    async fn members(&self, id: &str) -> Result<Vec<PathwayMember>>;
}

/// Protein interaction database (STRING)
#[async_trait]
pub trait InteractionSource: Send + Sync {
    /// Pairwise associations among `genes` with score at least `min_score` (0..=1)
    async fn interactions(&self, genes: &[GeneSymbol], min_score: f64) -> Result<Vec<Interaction>>;
}

/// Protein structure repositories (UniProt accessions, AlphaFold models)
#[async_trait]
pub trait StructureSource: Send + Sync {
    /// Reviewed UniProt accession of a gene; `NotFound` when there is none
    async fn accession(&self, gene: &GeneSymbol) -> Result<String>;

    /// Predicted model of an accession in PDB format; `NotFound` when absent
    async fn model(&self, accession: &str) -> Result<String>;
}

/// Functional enrichment service (g:Profiler)
#[async_trait]
pub trait EnrichmentSource: Send + Sync {
    /// Over-representation analysis of `genes` across `categories`
    async fn enrich(
        &self,
        genes: &[GeneSymbol],
        categories: &[EnrichmentCategory],
        significance_threshold: f64,
    ) -> Result<Vec<EnrichmentTerm>>;
}

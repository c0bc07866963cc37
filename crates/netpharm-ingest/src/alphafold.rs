//! UniProt accession lookup and AlphaFold DB model download
//!
//! A gene symbol resolves to its reviewed (Swiss-Prot) UniProt entry, and
//! the accession names the AlphaFold model file. UniProt and AlphaFold are
//! separate services, so each gets its own [`ServiceClient`].

use crate::endpoints;
use crate::http::ServiceClient;
use crate::sources::StructureSource;
use async_trait::async_trait;
use netpharm_common::{GeneSymbol, NetpharmError, Result};
use serde::Deserialize;
use tracing::debug;

/// Name used in errors and logs
pub const SERVICE: &str = "AlphaFold";

/// Name of the accession lookup service in errors and logs
pub const UNIPROT_SERVICE: &str = "UniProt";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "primaryAccession")]
    primary_accession: String,
}

/// A PDB model has at least one coordinate record
fn is_pdb(body: &str) -> bool {
    body.lines()
        .any(|line| line.starts_with("ATOM") || line.starts_with("HETATM"))
}

/// UniProt plus AlphaFold DB structure adapter
pub struct AlphaFoldClient {
    uniprot: ServiceClient,
    uniprot_url: String,
    alphafold: ServiceClient,
    alphafold_url: String,
    taxon_id: u32,
}

impl AlphaFoldClient {
    pub fn new(
        uniprot: ServiceClient,
        uniprot_url: impl Into<String>,
        alphafold: ServiceClient,
        alphafold_url: impl Into<String>,
    ) -> Self {
        Self {
            uniprot,
            uniprot_url: uniprot_url.into(),
            alphafold,
            alphafold_url: alphafold_url.into(),
            taxon_id: endpoints::HUMAN_TAXON_ID,
        }
    }

    /// Search another organism than human
    pub fn with_taxon(mut self, taxon_id: u32) -> Self {
        self.taxon_id = taxon_id;
        self
    }
}

#[async_trait]
impl StructureSource for AlphaFoldClient {
    async fn accession(&self, gene: &GeneSymbol) -> Result<String> {
        let url = endpoints::uniprot_search_url(&self.uniprot_url, gene.as_str(), self.taxon_id);
        let response: SearchResponse = self.uniprot.get_json(&url).await?;

        let accession = response
            .results
            .into_iter()
            .next()
            .map(|hit| hit.primary_accession)
            .ok_or_else(|| NetpharmError::not_found(format!("no reviewed UniProt entry for {}", gene)))?;

        debug!(gene = %gene, accession = %accession, "UniProt accession resolved");
        Ok(accession)
    }

    async fn model(&self, accession: &str) -> Result<String> {
        let url = endpoints::alphafold_model_url(&self.alphafold_url, accession);
        let body = self.alphafold.get_text(&url).await?;

        if !is_pdb(&body) {
            return Err(NetpharmError::service(
                SERVICE,
                format!("{} has no coordinate records", endpoints::alphafold_model_file(accession)),
            ));
        }
        debug!(accession = %accession, bytes = body.len(), "AlphaFold model downloaded");
        Ok(body)
    }
}

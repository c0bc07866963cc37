//! STRING interaction database client
//!
//! Uses the TSV network endpoint. STRING reports combined scores on a 0..=1
//! scale in TSV output; values above 1 (the 0..=1000 integer scale) are
//! rescaled so callers always see 0..=1.

use crate::endpoints;
use crate::http::ServiceClient;
use crate::sources::InteractionSource;
use async_trait::async_trait;
use netpharm_common::types::Interaction;
use netpharm_common::{GeneSymbol, NetpharmError, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Name used in errors and logs
pub const SERVICE: &str = "STRING";

/// NCBI taxonomy identifier for Homo sapiens
pub const DEFAULT_SPECIES: u32 = 9606;

#[derive(Debug, Deserialize)]
struct NetworkRow {
    #[serde(rename = "preferredName_A")]
    preferred_name_a: String,
    #[serde(rename = "preferredName_B")]
    preferred_name_b: String,
    score: f64,
}

/// STRING protein-protein association adapter
pub struct StringClient {
    http: ServiceClient,
    base_url: String,
    species: u32,
}

impl StringClient {
    pub fn new(http: ServiceClient, base_url: impl Into<String>, species: u32) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            species,
        }
    }
}

/// Parse the TSV body of a `tsv/network` response
pub fn parse_network_tsv(body: &str) -> Result<Vec<Interaction>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers = reader.headers()?.clone();
    for required in ["preferredName_A", "preferredName_B", "score"] {
        if !headers.iter().any(|h| h == required) {
            return Err(NetpharmError::service(
                SERVICE,
                format!("network response lacks '{}' column", required),
            ));
        }
    }

    let mut interactions = Vec::new();
    for row in reader.deserialize::<NetworkRow>() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!(error = %e, "Skipping malformed STRING row");
                continue;
            },
        };
        let (Ok(gene_a), Ok(gene_b)) = (
            GeneSymbol::new(&row.preferred_name_a),
            GeneSymbol::new(&row.preferred_name_b),
        ) else {
            continue;
        };
        let score = if row.score > 1.0 {
            row.score / 1000.0
        } else {
            row.score
        };
        interactions.push(Interaction {
            gene_a,
            gene_b,
            score,
        });
    }

    Ok(interactions)
}

#[async_trait]
impl InteractionSource for StringClient {
    async fn interactions(&self, genes: &[GeneSymbol], min_score: f64) -> Result<Vec<Interaction>> {
        if genes.len() < 2 {
            debug!(genes = genes.len(), "Too few genes for an interaction query");
            return Ok(Vec::new());
        }

        let identifiers = genes
            .iter()
            .map(GeneSymbol::as_str)
            .collect::<Vec<_>>()
            .join("\r");
        let required_score = (min_score * 1000.0).round().clamp(0.0, 1000.0) as u32;

        let form = [
            ("identifiers", identifiers),
            ("species", self.species.to_string()),
            ("required_score", required_score.to_string()),
            ("network_type", "functional".to_string()),
            ("caller_identity", "netpharm".to_string()),
        ];

        let url = endpoints::string_network_url(&self.base_url);
        let body = self.http.post_form_text(&url, &form).await?;
        let interactions = parse_network_tsv(&body)?;

        info!(
            genes = genes.len(),
            required_score,
            interactions = interactions.len(),
            "STRING network retrieved"
        );
        Ok(interactions)
    }
}

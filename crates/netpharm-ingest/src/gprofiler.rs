//! g:Profiler g:GOSt client
//!
//! One POST covers every requested annotation source. The client is meant to
//! be built with [`RetryPolicy::single_attempt`](crate::http::RetryPolicy::single_attempt):
//! enrichment is a single call and a failure goes straight back to the caller.

use crate::endpoints;
use crate::http::ServiceClient;
use crate::sources::EnrichmentSource;
use async_trait::async_trait;
use netpharm_common::types::{EnrichmentCategory, EnrichmentTerm};
use netpharm_common::{GeneSymbol, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Name used in errors and logs
pub const SERVICE: &str = "g:Profiler";

/// Default g:Profiler organism code
pub const DEFAULT_ORGANISM: &str = "hsapiens";

#[derive(Debug, Serialize)]
struct ProfileRequest<'a> {
    organism: &'a str,
    query: Vec<&'a str>,
    sources: Vec<&'static str>,
    user_threshold: f64,
    significance_threshold_method: &'static str,
    no_evidences: bool,
    all_results: bool,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    #[serde(default)]
    result: Vec<ProfileTerm>,
}

#[derive(Debug, Deserialize)]
struct ProfileTerm {
    source: String,
    native: String,
    name: String,
    p_value: f64,
    #[serde(default = "default_significant")]
    significant: bool,
    intersection_size: u32,
    #[serde(default)]
    precision: Option<f64>,
    /// One evidence list per query gene; non-empty means the gene is annotated
    #[serde(default)]
    intersections: Vec<Vec<String>>,
}

fn default_significant() -> bool {
    true
}

/// g:Profiler enrichment adapter
pub struct GProfilerClient {
    http: ServiceClient,
    base_url: String,
    organism: String,
}

impl GProfilerClient {
    pub fn new(http: ServiceClient, base_url: impl Into<String>, organism: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            organism: organism.into(),
        }
    }
}

#[async_trait]
impl EnrichmentSource for GProfilerClient {
    async fn enrich(
        &self,
        genes: &[GeneSymbol],
        categories: &[EnrichmentCategory],
        significance_threshold: f64,
    ) -> Result<Vec<EnrichmentTerm>> {
        let request = ProfileRequest {
            organism: &self.organism,
            query: genes.iter().map(GeneSymbol::as_str).collect(),
            sources: categories.iter().map(|c| c.code()).collect(),
            user_threshold: significance_threshold,
            significance_threshold_method: "fdr",
            no_evidences: false,
            all_results: false,
        };

        let url = endpoints::gprofiler_profile_url(&self.base_url);
        let response: ProfileResponse = self.http.post_json(&url, &request).await?;

        let mut terms = Vec::new();
        for term in response.result.into_iter().filter(|t| t.significant) {
            let Ok(category) = term.source.parse::<EnrichmentCategory>() else {
                debug!(source = %term.source, term = %term.native, "Ignoring term from unrequested source");
                continue;
            };
            let members = term
                .intersections
                .iter()
                .zip(genes)
                .filter(|(evidence, _)| !evidence.is_empty())
                .map(|(_, gene)| gene.to_string())
                .collect();
            terms.push(EnrichmentTerm {
                category,
                term_id: term.native,
                description: term.name,
                count: term.intersection_size,
                gene_ratio: term.precision,
                p_value: None,
                adjusted_p_value: term.p_value,
                genes: members,
            });
        }

        info!(genes = genes.len(), terms = terms.len(), "g:Profiler enrichment complete");
        Ok(terms)
    }
}

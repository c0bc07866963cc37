//! Reactome ContentService client
//!
//! Keyword search returns pathways in Reactome's relevance order, exact
//! identifiers go through the `data/query` endpoint, and members come from
//! the participants endpoint with UniProt reference entities unpacked into
//! gene symbols.

use crate::endpoints;
use crate::http::ServiceClient;
use crate::sources::PathwaySource;
use async_trait::async_trait;
use netpharm_common::types::{PathwayMember, PathwayRef};
use netpharm_common::{GeneSymbol, NetpharmError, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Name used in errors and logs
pub const SERVICE: &str = "Reactome";

/// Default species filter for searches
pub const DEFAULT_SPECIES: &str = "Homo sapiens";

static HIGHLIGHT_TAG: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"</?[^>]+>").expect("static pattern")
});

// ============================================================================
// Response Shapes
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

/// Either a cluster of entries (`cluster=true`) or a bare entry
#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    entries: Vec<SearchEntry>,
    #[serde(rename = "stId")]
    st_id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchEntry {
    #[serde(rename = "stId")]
    st_id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(rename = "exactType")]
    exact_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(rename = "stId")]
    st_id: String,
    #[serde(rename = "displayName")]
    display_name: String,
    #[serde(rename = "schemaClass")]
    schema_class: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Participant {
    #[serde(rename = "displayName")]
    display_name: Option<String>,
    #[serde(rename = "refEntities", default)]
    ref_entities: Vec<RefEntity>,
}

#[derive(Debug, Deserialize)]
struct RefEntity {
    #[serde(rename = "stId")]
    st_id: Option<String>,
    identifier: Option<String>,
    #[serde(rename = "databaseName")]
    database_name: Option<String>,
    #[serde(rename = "schemaClass")]
    schema_class: Option<String>,
    #[serde(rename = "displayName")]
    display_name: Option<String>,
    #[serde(rename = "geneName", default)]
    gene_name: Vec<String>,
}

impl RefEntity {
    fn is_uniprot(&self) -> bool {
        self.database_name.as_deref() == Some("UniProt")
            || matches!(
                self.schema_class.as_deref(),
                Some("ReferenceGeneProduct") | Some("ReferenceIsoform")
            )
            || self.st_id.as_deref().is_some_and(|s| s.starts_with("uniprot:"))
            || self
                .display_name
                .as_deref()
                .is_some_and(|s| s.starts_with("UniProt:"))
    }

    /// Gene symbol from `geneName`, then `"UniProt:P07333 CSF1R"`, then the
    /// participant name before its compartment (`"CSF1R [plasma membrane]"`)
    fn gene_symbol(&self, participant: &Participant) -> Option<String> {
        if let Some(first) = self.gene_name.first() {
            return Some(first.clone());
        }
        if let Some(name) = &self.display_name {
            let mut parts = name.split_whitespace();
            let first = parts.next();
            if let (Some(_), Some(last)) = (first, parts.last()) {
                return Some(last.to_string());
            }
        }
        participant
            .display_name
            .as_deref()
            .map(|name| name.split(" [").next().unwrap_or(name).to_string())
    }
}

fn strip_highlighting(text: &str) -> String {
    HIGHLIGHT_TAG.replace_all(text, "").trim().to_string()
}

/// Flatten search results into ranked pathway references
fn ranked_pathways(response: SearchResponse) -> Vec<PathwayRef> {
    let mut ranked = Vec::new();
    for result in response.results {
        if result.entries.is_empty() {
            if let (Some(id), Some(name)) = (result.st_id, result.name) {
                ranked.push(PathwayRef {
                    id,
                    name: strip_highlighting(&name),
                });
            }
            continue;
        }
        for entry in result.entries {
            let is_pathway = entry
                .exact_type
                .as_deref()
                .map_or(true, |t| t.contains("Pathway"));
            if let (true, Some(id)) = (is_pathway, entry.st_id) {
                ranked.push(PathwayRef {
                    id,
                    name: strip_highlighting(&entry.name),
                });
            }
        }
    }
    ranked
}

// ============================================================================
// Client
// ============================================================================

/// Reactome pathway knowledgebase adapter
pub struct ReactomeClient {
    http: ServiceClient,
    base_url: String,
    species: String,
}

impl ReactomeClient {
    pub fn new(http: ServiceClient, base_url: impl Into<String>, species: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            species: species.into(),
        }
    }
}

#[async_trait]
impl PathwaySource for ReactomeClient {
    async fn search(&self, keyword: &str) -> Result<Vec<PathwayRef>> {
        let url = endpoints::reactome_search_url(&self.base_url, keyword, &self.species);
        let response: SearchResponse = match self.http.get_json(&url).await {
            Ok(response) => response,
            // Reactome answers 404 when a search has no hits
            Err(NetpharmError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let ranked = ranked_pathways(response);
        debug!(keyword = %keyword, hits = ranked.len(), "Reactome search complete");
        Ok(ranked)
    }

    async fn lookup(&self, id: &str) -> Result<PathwayRef> {
        let url = endpoints::reactome_query_url(&self.base_url, id);
        let record: QueryResponse = self.http.get_json(&url).await?;

        if let Some(class) = record.schema_class.as_deref() {
            if !class.contains("Pathway") {
                return Err(NetpharmError::not_found(format!(
                    "{} is a {} in Reactome, not a pathway",
                    id, class
                )));
            }
        }

        Ok(PathwayRef {
            id: record.st_id,
            name: record.display_name,
        })
    }

    async fn members(&self, id: &str) -> Result<Vec<PathwayMember>> {
        let url = endpoints::reactome_participants_url(&self.base_url, id);
        let participants: Vec<Participant> = self.http.get_json(&url).await?;

        let mut seen = HashSet::new();
        let mut members = Vec::new();
        for participant in &participants {
            for entity in participant.ref_entities.iter().filter(|e| e.is_uniprot()) {
                let Some(raw) = entity.gene_symbol(participant) else {
                    continue;
                };
                let gene = match GeneSymbol::new(&raw) {
                    Ok(gene) => gene,
                    Err(_) => {
                        warn!(pathway = %id, "Skipping participant without gene symbol");
                        continue;
                    },
                };
                if seen.insert(gene.clone()) {
                    members.push(PathwayMember {
                        gene,
                        uniprot_id: entity.identifier.clone(),
                        protein_name: participant.display_name.clone(),
                    });
                }
            }
        }

        debug!(pathway = %id, members = members.len(), "Reactome participants parsed");
        Ok(members)
    }
}

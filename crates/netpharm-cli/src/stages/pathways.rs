//! Pathway filter stage
//!
//! Resolves search terms against the pathway knowledgebase, collects member
//! proteins and intersects them with the predicted targets. A failing term
//! is recorded and skipped so one bad keyword does not sink the run.

use crate::error::Result;
use crate::run_state::Stage;
use crate::stages::{join_list, read_csv, split_list, stage_dir, write_csv, StageOutcome};
use netpharm_common::types::{is_pathway_id, Pathway, PathwayMember, PathwayRef, TargetSet};
use netpharm_common::{GeneSymbol, NetpharmError};
use netpharm_ingest::PathwaySource;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use tracing::{info, warn};

pub const PATHWAYS_CSV: &str = "pathways_searched.csv";
pub const PROTEINS_CSV: &str = "pathway_proteins.csv";
pub const OVERLAP_CSV: &str = "overlapping_targets.csv";
pub const FAILED_CSV: &str = "failed_terms.csv";

/// Search term that produced no usable pathway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedTerm {
    pub term: String,
    pub reason: String,
}

/// Result of filtering pathways against the target set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathwayFilter {
    pub pathways: Vec<Pathway>,
    /// Every member gene of every resolved pathway
    pub union: BTreeSet<GeneSymbol>,
    /// Targets that are pathway members, with the pathways containing them
    pub overlap: BTreeMap<GeneSymbol, BTreeSet<String>>,
    pub failed: Vec<FailedTerm>,
}

impl PathwayFilter {
    pub fn overlap_genes(&self) -> BTreeSet<GeneSymbol> {
        self.overlap.keys().cloned().collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PathwayRow {
    pathway_id: String,
    pathway_name: String,
    search_term: String,
    member_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct ProteinRow {
    pathway_id: String,
    gene: GeneSymbol,
    uniprot_id: Option<String>,
    protein_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OverlapRow {
    gene: GeneSymbol,
    pathway_ids: String,
}

async fn resolve_term(
    source: &dyn PathwaySource,
    term: &str,
    max_per_keyword: usize,
) -> netpharm_common::Result<Vec<PathwayRef>> {
    if is_pathway_id(term) {
        return Ok(vec![source.lookup(term).await?]);
    }

    let hits: Vec<PathwayRef> = source.search(term).await?.into_iter().take(max_per_keyword).collect();
    if hits.is_empty() {
        return Err(NetpharmError::not_found(format!("no pathways match '{}'", term)));
    }
    Ok(hits)
}

/// Resolve every term, fetch members and intersect with `targets`.
///
/// Keywords keep at most `max_per_keyword` hits in the order the service
/// returned them. Identifiers resolve to exactly one pathway. A pathway that
/// several terms resolve to is fetched once.
pub async fn filter_pathways(
    source: &dyn PathwaySource,
    terms: &[String],
    targets: &TargetSet,
    max_per_keyword: usize,
) -> PathwayFilter {
    let mut result = PathwayFilter::default();
    let mut seen = HashSet::new();

    for term in terms {
        let refs = match resolve_term(source, term, max_per_keyword).await {
            Ok(refs) => refs,
            Err(e) => {
                warn!(term = %term, error = %e, "Search term skipped");
                result.failed.push(FailedTerm {
                    term: term.clone(),
                    reason: e.to_string(),
                });
                continue;
            },
        };

        for pathway_ref in refs {
            if !seen.insert(pathway_ref.id.clone()) {
                continue;
            }

            let members = match source.members(&pathway_ref.id).await {
                Ok(members) => members,
                Err(e) => {
                    warn!(term = %term, pathway = %pathway_ref.id, error = %e, "Pathway members unavailable");
                    result.failed.push(FailedTerm {
                        term: format!("{} ({})", term, pathway_ref.id),
                        reason: e.to_string(),
                    });
                    continue;
                },
            };

            info!(pathway = %pathway_ref.id, name = %pathway_ref.name, members = members.len(), "Pathway resolved");
            for member in &members {
                result.union.insert(member.gene.clone());
                if targets.contains(&member.gene) {
                    result
                        .overlap
                        .entry(member.gene.clone())
                        .or_default()
                        .insert(pathway_ref.id.clone());
                }
            }

            result.pathways.push(Pathway {
                id: pathway_ref.id,
                name: pathway_ref.name,
                search_term: term.clone(),
                members,
            });
        }
    }

    result
}

/// Filter pathways and write the stage tables
pub async fn run(
    source: &dyn PathwaySource,
    terms: &[String],
    targets: &TargetSet,
    max_per_keyword: usize,
    run_dir: &Path,
) -> Result<StageOutcome<PathwayFilter>> {
    let filter = filter_pathways(source, terms, targets, max_per_keyword).await;
    if filter.pathways.is_empty() {
        return Err(NetpharmError::not_found(format!(
            "none of the {} search terms resolved to a pathway",
            terms.len()
        ))
        .into());
    }

    let dir = stage_dir(run_dir, Stage::Pathways)?;
    let mut artifacts = Vec::new();

    let pathways_path = dir.join(PATHWAYS_CSV);
    write_csv(
        &pathways_path,
        filter.pathways.iter().map(|p| PathwayRow {
            pathway_id: p.id.clone(),
            pathway_name: p.name.clone(),
            search_term: p.search_term.clone(),
            member_count: p.members.len(),
        }),
    )?;
    artifacts.push(pathways_path);

    let proteins_path = dir.join(PROTEINS_CSV);
    write_csv(
        &proteins_path,
        filter.pathways.iter().flat_map(|p| {
            p.members.iter().map(move |m| ProteinRow {
                pathway_id: p.id.clone(),
                gene: m.gene.clone(),
                uniprot_id: m.uniprot_id.clone(),
                protein_name: m.protein_name.clone(),
            })
        }),
    )?;
    artifacts.push(proteins_path);

    let overlap_path = dir.join(OVERLAP_CSV);
    write_csv(
        &overlap_path,
        filter.overlap.iter().map(|(gene, ids)| OverlapRow {
            gene: gene.clone(),
            pathway_ids: join_list(ids),
        }),
    )?;
    artifacts.push(overlap_path);

    if !filter.failed.is_empty() {
        let failed_path = dir.join(FAILED_CSV);
        write_csv(&failed_path, &filter.failed)?;
        artifacts.push(failed_path);
    }

    info!(
        pathways = filter.pathways.len(),
        proteins = filter.union.len(),
        overlap = filter.overlap.len(),
        failed_terms = filter.failed.len(),
        "Pathway filtering complete"
    );
    Ok(StageOutcome::Done {
        output: filter,
        artifacts,
    })
}

/// Reload the pathway filter result from a previous run
pub fn load(run_dir: &Path) -> Result<PathwayFilter> {
    let dir = run_dir.join(Stage::Pathways.dir_name());
    let pathway_rows: Vec<PathwayRow> = read_csv(&dir.join(PATHWAYS_CSV))?;
    let protein_rows: Vec<ProteinRow> = read_csv(&dir.join(PROTEINS_CSV))?;
    let overlap_rows: Vec<OverlapRow> = read_csv(&dir.join(OVERLAP_CSV))?;
    let failed_path = dir.join(FAILED_CSV);
    let failed = if failed_path.exists() {
        read_csv(&failed_path)?
    } else {
        Vec::new()
    };

    let mut members: BTreeMap<String, Vec<PathwayMember>> = BTreeMap::new();
    let mut union = BTreeSet::new();
    for row in protein_rows {
        union.insert(row.gene.clone());
        members.entry(row.pathway_id).or_default().push(PathwayMember {
            gene: row.gene,
            uniprot_id: row.uniprot_id,
            protein_name: row.protein_name,
        });
    }

    let pathways = pathway_rows
        .into_iter()
        .map(|row| Pathway {
            members: members.remove(&row.pathway_id).unwrap_or_default(),
            id: row.pathway_id,
            name: row.pathway_name,
            search_term: row.search_term,
        })
        .collect();

    let overlap = overlap_rows
        .into_iter()
        .map(|row| (row.gene, split_list(&row.pathway_ids).into_iter().collect()))
        .collect();

    Ok(PathwayFilter {
        pathways,
        union,
        overlap,
        failed,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use netpharm_common::types::TargetSource;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeReactome {
        search: HashMap<String, Vec<PathwayRef>>,
        members: HashMap<String, Vec<&'static str>>,
    }

    fn pref(id: &str) -> PathwayRef {
        PathwayRef {
            id: id.to_string(),
            name: format!("Pathway {}", id),
        }
    }

    #[async_trait]
    impl PathwaySource for FakeReactome {
        async fn search(&self, keyword: &str) -> netpharm_common::Result<Vec<PathwayRef>> {
            match self.search.get(keyword) {
                Some(hits) => Ok(hits.clone()),
                None if keyword == "broken" => Err(NetpharmError::transient("Reactome", "HTTP 503")),
                None => Ok(Vec::new()),
            }
        }

        async fn lookup(&self, id: &str) -> netpharm_common::Result<PathwayRef> {
            if self.members.contains_key(id) {
                Ok(pref(id))
            } else {
                Err(NetpharmError::not_found(format!("pathway {}", id)))
            }
        }

        async fn members(&self, id: &str) -> netpharm_common::Result<Vec<PathwayMember>> {
            let genes = self
                .members
                .get(id)
                .ok_or_else(|| NetpharmError::not_found(id.to_string()))?;
            Ok(genes
                .iter()
                .map(|g| PathwayMember {
                    gene: GeneSymbol::new(g).unwrap(),
                    uniprot_id: None,
                    protein_name: None,
                })
                .collect())
        }
    }

    fn targets(genes: &[&str]) -> TargetSet {
        let mut set = TargetSet::new();
        for gene in genes {
            set.insert(GeneSymbol::new(gene).unwrap(), TargetSource::SwissTargetPrediction, 0.9);
        }
        set
    }

    fn fake() -> FakeReactome {
        let mut fake = FakeReactome::default();
        let apoptosis: Vec<PathwayRef> = (1..=8).map(|i| pref(&format!("R-HSA-{}", i))).collect();
        for p in &apoptosis {
            fake.members.insert(p.id.clone(), vec!["CASP3", "TP53"]);
        }
        fake.search.insert("apoptosis".into(), apoptosis);
        fake.members.insert("R-HSA-109581".into(), vec!["BCL2", "CASP3", "AKT1"]);
        fake
    }

    #[tokio::test]
    async fn test_keyword_keeps_top_five_in_service_order() {
        let filter = filter_pathways(&fake(), &["apoptosis".to_string()], &targets(&[]), 5).await;
        let ids: Vec<_> = filter.pathways.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["R-HSA-1", "R-HSA-2", "R-HSA-3", "R-HSA-4", "R-HSA-5"]);
    }

    #[tokio::test]
    async fn test_overlap_lists_each_gene_once() {
        let terms = vec!["apoptosis".to_string(), "R-HSA-109581".to_string()];
        let filter = filter_pathways(&fake(), &terms, &targets(&["CASP3", "AKT1", "EGFR"]), 5).await;

        let genes: Vec<_> = filter.overlap.keys().map(|g| g.as_str()).collect();
        assert_eq!(genes, vec!["AKT1", "CASP3"]);
        let casp3 = GeneSymbol::new("CASP3").unwrap();
        assert_eq!(filter.overlap[&casp3].len(), 6);
        assert_eq!(filter.union.len(), 4);
    }

    #[tokio::test]
    async fn test_failed_terms_do_not_abort_others() {
        let terms = vec![
            "broken".to_string(),
            "R-HSA-999999".to_string(),
            "nothing matches".to_string(),
            "R-HSA-109581".to_string(),
        ];
        let filter = filter_pathways(&fake(), &terms, &targets(&["BCL2"]), 5).await;
        assert_eq!(filter.pathways.len(), 1);
        assert_eq!(filter.failed.len(), 3);
        assert_eq!(filter.failed[0].term, "broken");
    }

    #[tokio::test]
    async fn test_run_without_any_pathway_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(&fake(), &["nothing".to_string()], &targets(&[]), 5, dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err.pipeline_error(), Some(NetpharmError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_run_writes_tables_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let terms = vec!["R-HSA-109581".to_string(), "broken".to_string()];
        let StageOutcome::Done { output, artifacts } =
            run(&fake(), &terms, &targets(&["BCL2", "AKT1"]), 5, dir.path()).await.unwrap()
        else {
            panic!("expected completion");
        };
        assert_eq!(artifacts.len(), 4);

        let reloaded = load(dir.path()).unwrap();
        assert_eq!(reloaded, output);
    }
}

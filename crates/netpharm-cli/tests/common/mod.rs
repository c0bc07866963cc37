//! In-memory service fakes shared by the integration tests

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use netpharm_cli::config::PipelineConfig;
use netpharm_cli::Services;
use netpharm_common::types::{
    Compound, CompoundQuery, EnrichmentCategory, EnrichmentTerm, Interaction, PathwayMember,
    PathwayRef,
};
use netpharm_common::{GeneSymbol, NetpharmError, Result};
use netpharm_ingest::{CompoundSource, EnrichmentSource, InteractionSource, PathwaySource};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub const SWISS_EXPORT: &str = "Target,Common name,Uniprot ID,ChEMBL ID,Target Class,Probability*\n\
Epidermal growth factor receptor,EGFR,P00533,CHEMBL203,Kinase,0.95\n\
RAC-alpha serine/threonine-protein kinase,AKT1,P31749,CHEMBL4282,Kinase,0.60\n\
Cellular tumor antigen p53,TP53,P04637,CHEMBL4096,Other,0.42\n\
Apoptosis regulator Bcl-2,BCL2,P10415,CHEMBL4860,Other,0.30\n\
Cytochrome P450 1A2,CYP1A2,P05177,CHEMBL3356,Cytochrome P450,0.0\n";

pub const DOCKING_SCORES: &str = "gene_name,docking_score,structure_id\n\
DYRK2,-200,3K2L\n\
EGFR,-235.5,1M17\n\
AKT1,-180,3O96\n\
TP53,-210,2OCJ\n";

pub fn gene(symbol: &str) -> GeneSymbol {
    GeneSymbol::new(symbol).unwrap()
}

pub fn config(extra: &str) -> PipelineConfig {
    PipelineConfig::from_yaml(&format!(
        "compound:\n  cid: 5280343\n  name: Quercetin\npathways:\n  search_terms: [apoptosis, R-HSA-1640170]\n{}",
        extra
    ))
    .unwrap()
}

pub fn write_swiss(run_dir: &Path) {
    std::fs::write(run_dir.join("data").join("swiss_results.csv"), SWISS_EXPORT).unwrap();
}

// ============================================================================
// Fakes
// ============================================================================

#[derive(Default)]
pub struct FakePubChem {
    pub calls: AtomicUsize,
}

#[async_trait]
impl CompoundSource for FakePubChem {
    async fn resolve(&self, query: &CompoundQuery) -> Result<Compound> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match query {
            CompoundQuery::Cid(5280343) => Ok(Compound {
                cid: Some(5280343),
                canonical_smiles: "C1=CC(=C(C=C1C2=C(C(=O)C3=C(C=C(C=C3O2)O)O)O)O)O".into(),
                isomeric_smiles: None,
                molecular_formula: "C15H10O7".into(),
                molecular_weight: 302.23,
                iupac_name: Some("2-(3,4-dihydroxyphenyl)-3,5,7-trihydroxychromen-4-one".into()),
            }),
            other => Err(NetpharmError::not_found(format!("no PubChem record for {}", other))),
        }
    }
}

#[derive(Default)]
pub struct FakeReactome {
    pub searches: AtomicUsize,
}

fn member(symbol: &str) -> PathwayMember {
    PathwayMember {
        gene: gene(symbol),
        uniprot_id: None,
        protein_name: None,
    }
}

#[async_trait]
impl PathwaySource for FakeReactome {
    async fn search(&self, keyword: &str) -> Result<Vec<PathwayRef>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(match keyword {
            "apoptosis" => vec![PathwayRef {
                id: "R-HSA-109581".into(),
                name: "Apoptosis".into(),
            }],
            _ => Vec::new(),
        })
    }

    async fn lookup(&self, id: &str) -> Result<PathwayRef> {
        match id {
            "R-HSA-1640170" => Ok(PathwayRef {
                id: id.into(),
                name: "Cell Cycle".into(),
            }),
            _ => Err(NetpharmError::not_found(format!("{} is not in Reactome", id))),
        }
    }

    async fn members(&self, id: &str) -> Result<Vec<PathwayMember>> {
        Ok(match id {
            "R-HSA-109581" => ["AKT1", "TP53", "BCL2", "CASP3"].iter().map(|g| member(g)).collect(),
            "R-HSA-1640170" => ["TP53", "EGFR", "CDK1"].iter().map(|g| member(g)).collect(),
            _ => Vec::new(),
        })
    }
}

#[derive(Default)]
pub struct FakeString {
    pub calls: AtomicUsize,
    /// Fail the next call with a non-transient error
    pub fail_next: AtomicBool,
}

#[async_trait]
impl InteractionSource for FakeString {
    async fn interactions(&self, genes: &[GeneSymbol], min_score: f64) -> Result<Vec<Interaction>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(NetpharmError::service("STRING", "HTTP 400: malformed identifiers"));
        }

        let all = [
            ("EGFR", "AKT1", 0.99),
            ("EGFR", "TP53", 0.91),
            ("AKT1", "TP53", 0.95),
            ("AKT1", "BCL2", 0.82),
            ("TP53", "BCL2", 0.97),
            ("EGFR", "BCL2", 0.40),
        ];
        Ok(all
            .iter()
            .filter(|(a, b, score)| {
                *score >= min_score && genes.contains(&gene(a)) && genes.contains(&gene(b))
            })
            .map(|(a, b, score)| Interaction {
                gene_a: gene(a),
                gene_b: gene(b),
                score: *score,
            })
            .collect())
    }
}

#[derive(Default)]
pub struct FakeGProfiler {
    pub calls: AtomicUsize,
}

#[async_trait]
impl EnrichmentSource for FakeGProfiler {
    async fn enrich(
        &self,
        genes: &[GeneSymbol],
        categories: &[EnrichmentCategory],
        _significance_threshold: f64,
    ) -> Result<Vec<EnrichmentTerm>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let names: Vec<String> = genes.iter().map(|g| g.to_string()).collect();
        let terms = vec![
            EnrichmentTerm {
                category: EnrichmentCategory::GoBiologicalProcess,
                term_id: "GO:0006915".into(),
                description: "apoptotic process".into(),
                count: names.len() as u32,
                gene_ratio: Some(1.0),
                p_value: Some(1e-6),
                adjusted_p_value: 2e-5,
                genes: names.clone(),
            },
            EnrichmentTerm {
                category: EnrichmentCategory::Kegg,
                term_id: "KEGG:05200".into(),
                description: "Pathways in cancer".into(),
                count: 3,
                gene_ratio: Some(0.75),
                p_value: Some(1e-4),
                adjusted_p_value: 1e-3,
                genes: names.into_iter().take(3).collect(),
            },
        ];
        Ok(terms
            .into_iter()
            .filter(|t| categories.contains(&t.category))
            .collect())
    }
}

/// Fakes plus the services bundle wired to them
pub struct Fakes {
    pub pubchem: Arc<FakePubChem>,
    pub reactome: Arc<FakeReactome>,
    pub string: Arc<FakeString>,
    pub gprofiler: Arc<FakeGProfiler>,
}

impl Fakes {
    pub fn new() -> Self {
        Self {
            pubchem: Arc::new(FakePubChem::default()),
            reactome: Arc::new(FakeReactome::default()),
            string: Arc::new(FakeString::default()),
            gprofiler: Arc::new(FakeGProfiler::default()),
        }
    }

    pub fn services(&self) -> Services {
        Services {
            compounds: self.pubchem.clone(),
            pathways: self.reactome.clone(),
            interactions: self.string.clone(),
            enrichment: self.gprofiler.clone(),
        }
    }
}

//! Functional enrichment stage
//!
//! Two mutually exclusive modes. Automated mode sends a single request to the
//! enrichment service. Manual mode pauses for DAVID exports, then parses the
//! three chart reports into the same term shape.

use crate::config::{EnrichmentConfig, EnrichmentMode};
use crate::error::Result;
use crate::run_state::Stage;
use crate::stages::{
    clean_header, data_dir, join_list, read_csv, sniff_delimiter, split_list, stage_dir, write_csv,
    Handoff, StageOutcome, DATA_DIR,
};
use netpharm_common::types::{EnrichmentCategory, EnrichmentTerm};
use netpharm_common::{GeneSymbol, NetpharmError};
use netpharm_ingest::EnrichmentSource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// DAVID chart exports expected in manual mode
pub const MANUAL_FILES: [(&str, EnrichmentCategory); 3] = [
    ("david_go_bp.csv", EnrichmentCategory::GoBiologicalProcess),
    ("david_kegg.csv", EnrichmentCategory::Kegg),
    ("david_reactome.csv", EnrichmentCategory::Reactome),
];

/// Columns every DAVID export must carry
pub const REQUIRED_COLUMNS: [&str; 4] = ["Term", "Count", "%", "Benjamini"];

pub const GENE_LIST_FILE: &str = "gene_list_for_david.txt";
pub const INSTRUCTIONS_FILE: &str = "INSTRUCTIONS_enrichment.md";
pub const ALL_TERMS_CSV: &str = "enrichment_all.csv";

#[derive(Debug, Serialize, Deserialize)]
struct TermRow {
    category: EnrichmentCategory,
    term_id: String,
    description: String,
    count: u32,
    gene_ratio: Option<f64>,
    p_value: Option<f64>,
    adjusted_p_value: f64,
    genes: String,
}

impl From<&EnrichmentTerm> for TermRow {
    fn from(term: &EnrichmentTerm) -> Self {
        Self {
            category: term.category,
            term_id: term.term_id.clone(),
            description: term.description.clone(),
            count: term.count,
            gene_ratio: term.gene_ratio,
            p_value: term.p_value,
            adjusted_p_value: term.adjusted_p_value,
            genes: join_list(&term.genes),
        }
    }
}

impl From<TermRow> for EnrichmentTerm {
    fn from(row: TermRow) -> Self {
        Self {
            category: row.category,
            genes: split_list(&row.genes),
            term_id: row.term_id,
            description: row.description,
            count: row.count,
            gene_ratio: row.gene_ratio,
            p_value: row.p_value,
            adjusted_p_value: row.adjusted_p_value,
        }
    }
}

/// Split a DAVID term cell into identifier and description.
///
/// Handles `GO:0006915~apoptotic process`, `hsa04151:PI3K-Akt signaling`
/// and `R-HSA-109581:Apoptosis`. Cells without a separator are used for both.
pub fn split_term(raw: &str) -> (String, String) {
    let raw = raw.trim();
    if let Some((id, name)) = raw.split_once('~') {
        return (id.trim().to_string(), name.trim().to_string());
    }

    let offset = if raw.starts_with("GO:") { 3 } else { 0 };
    match raw[offset..].find(':') {
        Some(pos) => {
            let at = offset + pos;
            (raw[..at].trim().to_string(), raw[at + 1..].trim().to_string())
        },
        None => (raw.to_string(), raw.to_string()),
    }
}

fn parse_number<T: std::str::FromStr>(cell: Option<&str>, column: &str, path: &Path, line: usize) -> Result<T> {
    let cell = cell.map(str::trim).unwrap_or_default();
    cell.parse::<T>().map_err(|_| {
        NetpharmError::data_format(
            path.display().to_string(),
            format!("line {}: '{}' is not a valid {} value", line, cell, column),
        )
        .into()
    })
}

/// Parse one DAVID functional annotation chart
pub fn parse_david_file(path: &Path, category: EnrichmentCategory) -> Result<Vec<EnrichmentTerm>> {
    let delimiter = sniff_delimiter(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| clean_header(h) == name);
    let (term_idx, count_idx, percent_idx, benjamini_idx) =
        match (column("Term"), column("Count"), column("%"), column("Benjamini")) {
            (Some(t), Some(c), Some(p), Some(b)) => (t, c, p, b),
            _ => {
                let missing: Vec<&str> = REQUIRED_COLUMNS
                    .iter()
                    .copied()
                    .filter(|c| column(*c).is_none())
                    .collect();
                return Err(NetpharmError::missing_artifact(
                    path,
                    format!(
                        "missing column(s) {}; expected {}",
                        missing.join(", "),
                        REQUIRED_COLUMNS.join(", ")
                    ),
                )
                .into());
            },
        };
    let pvalue_idx = column("PValue");
    let genes_idx = column("Genes");

    let mut terms = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let line = i + 2;
        let Some(term_cell) = record.get(term_idx).filter(|t| !t.trim().is_empty()) else {
            debug!(path = %path.display(), line, "Skipping row without a term");
            continue;
        };

        let (term_id, description) = split_term(term_cell);
        let percent: f64 = parse_number(record.get(percent_idx), "%", path, line)?;
        let p_value = match pvalue_idx.and_then(|idx| record.get(idx)) {
            Some(cell) if !cell.trim().is_empty() => Some(parse_number(Some(cell), "PValue", path, line)?),
            _ => None,
        };
        let genes = genes_idx
            .and_then(|idx| record.get(idx))
            .map(|cell| {
                cell.split(',')
                    .filter_map(|g| GeneSymbol::new(g).ok())
                    .map(|g| g.as_str().to_string())
                    .collect()
            })
            .unwrap_or_default();

        terms.push(EnrichmentTerm {
            category,
            term_id,
            description,
            count: parse_number(record.get(count_idx), "Count", path, line)?,
            gene_ratio: Some(percent / 100.0),
            p_value,
            adjusted_p_value: parse_number(record.get(benjamini_idx), "Benjamini", path, line)?,
            genes,
        });
    }

    info!(file = %path.display(), category = %category, terms = terms.len(), "DAVID results parsed");
    Ok(terms)
}

/// Parse all three DAVID exports from `dir`.
///
/// A missing export fails with `MissingArtifact` naming the file.
pub fn parse_manual_results(dir: &Path) -> Result<Vec<EnrichmentTerm>> {
    let mut terms = Vec::new();
    for (file, category) in MANUAL_FILES {
        let path = dir.join(file);
        if !path.exists() {
            return Err(NetpharmError::missing_artifact(
                &path,
                format!(
                    "DAVID {} export not found; expected columns {}",
                    category,
                    REQUIRED_COLUMNS.join(", ")
                ),
            )
            .into());
        }
        terms.extend(parse_david_file(&path, category)?);
    }
    Ok(terms)
}

fn instructions(dir: &Path, gene_count: usize) -> String {
    let files = MANUAL_FILES
        .iter()
        .map(|(file, category)| format!("- `{}` ({})", dir.join(file).display(), category))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "# Enrichment handoff (DAVID)\n\n\
         1. Open https://david.ncifcrf.gov/ and start an analysis.\n\
         2. Upload `{gene_list}` ({count} genes) with identifier OFFICIAL_GENE_SYMBOL, list type Gene List.\n\
         3. In the Functional Annotation Tool export the charts for GO biological process, \
         KEGG pathway and Reactome pathway.\n\
         4. Save them as:\n\n{files}\n\n\
         Each file needs the columns {columns}. Tab or comma delimited exports are accepted.\n\
         Then resume with `netpharm run --resume <run-dir>`.\n",
        gene_list = dir.join(GENE_LIST_FILE).display(),
        count = gene_count,
        files = files,
        columns = REQUIRED_COLUMNS.join(", "),
    )
}

fn prepare_manual(dir: &Path, genes: &[GeneSymbol]) -> Result<Handoff> {
    std::fs::create_dir_all(dir)?;
    let list = genes.iter().map(|g| g.as_str()).collect::<Vec<_>>().join("\n");
    std::fs::write(dir.join(GENE_LIST_FILE), format!("{}\n", list))?;

    let instructions_path = dir.join(INSTRUCTIONS_FILE);
    std::fs::write(&instructions_path, instructions(dir, genes.len()))?;

    Ok(Handoff {
        awaiting: MANUAL_FILES.iter().map(|(file, _)| dir.join(file)).collect(),
        instructions: instructions_path,
    })
}

/// DAVID exports read in manual mode; automated mode reads no files
pub fn input_files(config: &EnrichmentConfig, run_dir: &Path) -> Vec<PathBuf> {
    match config.mode {
        EnrichmentMode::Automated => Vec::new(),
        EnrichmentMode::Manual => {
            let dir = config
                .manual_dir
                .clone()
                .unwrap_or_else(|| run_dir.join(DATA_DIR));
            MANUAL_FILES.iter().map(|(file, _)| dir.join(file)).collect()
        },
    }
}

fn sort_terms(terms: &mut [EnrichmentTerm]) {
    terms.sort_by(|a, b| {
        a.adjusted_p_value
            .total_cmp(&b.adjusted_p_value)
            .then_with(|| a.category.cmp(&b.category))
            .then_with(|| a.term_id.cmp(&b.term_id))
    });
}

/// Run enrichment for `genes` in the configured mode
pub async fn run(
    source: &dyn EnrichmentSource,
    config: &EnrichmentConfig,
    genes: &[GeneSymbol],
    run_dir: &Path,
) -> Result<StageOutcome<Vec<EnrichmentTerm>>> {
    if genes.is_empty() {
        return Err(NetpharmError::not_found("no network genes to test for enrichment").into());
    }

    let mut terms = match config.mode {
        EnrichmentMode::Automated => {
            info!(genes = genes.len(), categories = config.categories.len(), "Querying enrichment service");
            let terms = source
                .enrich(genes, &config.categories, config.significance_threshold)
                .await?;
            if terms.is_empty() {
                return Err(NetpharmError::not_found(format!(
                    "no significant enrichment for {} genes",
                    genes.len()
                ))
                .into());
            }
            terms
        },
        EnrichmentMode::Manual => {
            let dir: PathBuf = match &config.manual_dir {
                Some(dir) => dir.clone(),
                None => data_dir(run_dir)?,
            };
            if MANUAL_FILES.iter().all(|(file, _)| !dir.join(file).exists()) {
                return Ok(StageOutcome::Awaiting(prepare_manual(&dir, genes)?));
            }

            let parsed = parse_manual_results(&dir)?;
            let total = parsed.len();
            let kept: Vec<EnrichmentTerm> = parsed
                .into_iter()
                .filter(|t| t.adjusted_p_value <= config.significance_threshold)
                .collect();
            if kept.len() < total {
                warn!(
                    dropped = total - kept.len(),
                    threshold = config.significance_threshold,
                    "DAVID terms above the significance threshold dropped"
                );
            }
            kept
        },
    };
    sort_terms(&mut terms);

    let dir = stage_dir(run_dir, Stage::Enrichment)?;
    let all_path = dir.join(ALL_TERMS_CSV);
    write_csv(&all_path, terms.iter().map(TermRow::from))?;
    let mut artifacts = vec![all_path];

    let mut by_category: BTreeMap<EnrichmentCategory, Vec<&EnrichmentTerm>> = BTreeMap::new();
    for term in &terms {
        by_category.entry(term.category).or_default().push(term);
    }
    for (category, category_terms) in &by_category {
        let path = dir.join(format!("enrichment_{}.csv", category.slug()));
        write_csv(&path, category_terms.iter().map(|t| TermRow::from(*t)))?;
        info!(category = %category, terms = category_terms.len(), "Enrichment table saved");
        artifacts.push(path);
    }

    Ok(StageOutcome::Done {
        output: terms,
        artifacts,
    })
}

/// Reload enrichment terms from a previous run
pub fn load(run_dir: &Path) -> Result<Vec<EnrichmentTerm>> {
    let rows: Vec<TermRow> = read_csv(&run_dir.join(Stage::Enrichment.dir_name()).join(ALL_TERMS_CSV))?;
    Ok(rows.into_iter().map(EnrichmentTerm::from).collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    const GO_BP: &str = "Category\tTerm\tCount\t%\tPValue\tGenes\tBenjamini\n\
GOTERM_BP_DIRECT\tGO:0006915~apoptotic process\t4\t40.0\t1.2E-4\tCASP3, AKT1, BCL2, TP53\t0.002\n\
GOTERM_BP_DIRECT\tGO:0008283~cell population proliferation\t2\t20.0\t0.03\tEGFR, AKT1\t0.2\n";

    const KEGG: &str = "Term,Count,%,Benjamini\nhsa04151:PI3K-Akt signaling pathway,3,30.0,0.01\n";

    const REACTOME: &str = "Term,Count,%,Benjamini\nR-HSA-109581:Apoptosis,3,30,0.004\n";

    struct NoEnrichment;

    #[async_trait]
    impl EnrichmentSource for NoEnrichment {
        async fn enrich(
            &self,
            _genes: &[GeneSymbol],
            _categories: &[EnrichmentCategory],
            _threshold: f64,
        ) -> netpharm_common::Result<Vec<EnrichmentTerm>> {
            panic!("manual mode must not call the enrichment service");
        }
    }

    fn genes() -> Vec<GeneSymbol> {
        ["AKT1", "CASP3"].iter().map(|g| GeneSymbol::new(g).unwrap()).collect()
    }

    fn manual() -> EnrichmentConfig {
        EnrichmentConfig {
            mode: EnrichmentMode::Manual,
            ..EnrichmentConfig::default()
        }
    }

    #[test]
    fn test_split_term() {
        assert_eq!(
            split_term("GO:0006915~apoptotic process"),
            ("GO:0006915".into(), "apoptotic process".into())
        );
        assert_eq!(
            split_term("hsa04151:PI3K-Akt signaling pathway"),
            ("hsa04151".into(), "PI3K-Akt signaling pathway".into())
        );
        assert_eq!(split_term("GO:0005737:cytoplasm"), ("GO:0005737".into(), "cytoplasm".into()));
        assert_eq!(split_term("Apoptosis"), ("Apoptosis".into(), "Apoptosis".into()));
    }

    #[test]
    fn test_parse_tab_delimited_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("david_go_bp.csv");
        std::fs::write(&path, GO_BP).unwrap();

        let terms = parse_david_file(&path, EnrichmentCategory::GoBiologicalProcess).unwrap();
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].term_id, "GO:0006915");
        assert_eq!(terms[0].count, 4);
        assert_eq!(terms[0].gene_ratio, Some(0.4));
        assert_eq!(terms[0].p_value, Some(1.2e-4));
        assert_eq!(terms[0].genes, vec!["CASP3", "AKT1", "BCL2", "TP53"]);
    }

    #[test]
    fn test_missing_category_file_names_it() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("david_go_bp.csv"), GO_BP).unwrap();
        std::fs::write(dir.path().join("david_kegg.csv"), KEGG).unwrap();

        let err = parse_manual_results(dir.path()).unwrap_err();
        match err.pipeline_error() {
            Some(NetpharmError::MissingArtifact { path, .. }) => {
                assert!(path.ends_with("david_reactome.csv"));
            },
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_column_is_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("david_kegg.csv");
        std::fs::write(&path, "Term,Count,PValue\nhsa04151:PI3K-Akt,3,0.01\n").unwrap();

        let err = parse_david_file(&path, EnrichmentCategory::Kegg).unwrap_err();
        assert!(matches!(err.pipeline_error(), Some(NetpharmError::MissingArtifact { .. })));
        assert!(err.to_string().contains("Benjamini"));
    }

    #[tokio::test]
    async fn test_manual_mode_pauses_then_parses() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = run(&NoEnrichment, &manual(), &genes(), dir.path()).await.unwrap();
        let StageOutcome::Awaiting(handoff) = outcome else {
            panic!("expected a handoff");
        };
        assert_eq!(handoff.awaiting.len(), 3);
        let gene_list = std::fs::read_to_string(dir.path().join("data").join(GENE_LIST_FILE)).unwrap();
        assert_eq!(gene_list, "AKT1\nCASP3\n");

        let data = dir.path().join("data");
        std::fs::write(data.join("david_go_bp.csv"), GO_BP).unwrap();
        std::fs::write(data.join("david_kegg.csv"), KEGG).unwrap();
        std::fs::write(data.join("david_reactome.csv"), REACTOME).unwrap();

        let StageOutcome::Done { output, artifacts } =
            run(&NoEnrichment, &manual(), &genes(), dir.path()).await.unwrap()
        else {
            panic!("expected completion");
        };
        // the 0.2 Benjamini term is above the default 0.05 threshold
        assert_eq!(output.len(), 3);
        assert_eq!(output[0].term_id, "GO:0006915");
        assert_eq!(output[1].term_id, "R-HSA-109581");
        assert_eq!(artifacts.len(), 4);

        assert_eq!(load(dir.path()).unwrap(), output);
    }

    struct Fixed(Vec<EnrichmentTerm>);

    #[async_trait]
    impl EnrichmentSource for Fixed {
        async fn enrich(
            &self,
            _genes: &[GeneSymbol],
            _categories: &[EnrichmentCategory],
            _threshold: f64,
        ) -> netpharm_common::Result<Vec<EnrichmentTerm>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_automated_mode_splits_by_category() {
        let term = |category, id: &str, p| EnrichmentTerm {
            category,
            term_id: id.to_string(),
            description: id.to_string(),
            count: 2,
            gene_ratio: Some(0.5),
            p_value: None,
            adjusted_p_value: p,
            genes: vec!["AKT1".into(), "CASP3".into()],
        };
        let source = Fixed(vec![
            term(EnrichmentCategory::Kegg, "KEGG:04151", 0.01),
            term(EnrichmentCategory::GoBiologicalProcess, "GO:0006915", 0.001),
        ]);
        let dir = tempfile::tempdir().unwrap();
        let StageOutcome::Done { output, artifacts } =
            run(&source, &EnrichmentConfig::default(), &genes(), dir.path()).await.unwrap()
        else {
            panic!("expected completion");
        };
        assert_eq!(output[0].term_id, "GO:0006915");
        let names: Vec<_> = artifacts
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["enrichment_all.csv", "enrichment_go_bp.csv", "enrichment_kegg.csv"]);
    }

    #[tokio::test]
    async fn test_automated_mode_without_terms_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(&Fixed(Vec::new()), &EnrichmentConfig::default(), &genes(), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err.pipeline_error(), Some(NetpharmError::NotFound(_))));
    }
}

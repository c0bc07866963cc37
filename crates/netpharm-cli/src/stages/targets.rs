//! Target import stage
//!
//! Reads SwissTargetPrediction and SuperPred exports, normalizes them into a
//! single [`TargetSet`] and keeps rows whose score is strictly above the
//! per-source threshold. Header spellings vary between exports, so both the
//! gene and the score column are located through alias lists.

use crate::config::TargetsConfig;
use crate::error::Result;
use crate::run_state::Stage;
use crate::stages::{
    clean_header, data_dir, read_csv, sniff_delimiter, stage_dir, write_csv, write_json, Handoff,
    StageOutcome, DATA_DIR,
};
use netpharm_common::types::{Compound, TargetSet, TargetSource};
use netpharm_common::{GeneSymbol, NetpharmError};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Accepted spellings of the gene column, in order of preference
pub const GENE_ALIASES: &[&str] = &[
    "Common name",
    "Gene Symbol",
    "gene_symbol",
    "gene_name",
    "Gene",
    "Target Name",
    "Target",
];

/// Accepted spellings of the score column, in order of preference
pub const SCORE_ALIASES: &[&str] = &["Probability", "Probability*", "probability", "Prob", "Score", "score"];

pub const SWISS_HANDOFF: &str = "swiss_results.csv";
pub const SUPERPRED_HANDOFF: &str = "superpred_results.csv";
pub const INSTRUCTIONS_FILE: &str = "INSTRUCTIONS_targets.md";
pub const COMBINED_CSV: &str = "targets_combined.csv";
pub const SUMMARY_JSON: &str = "target_summary.json";

/// Rows of one export after column detection and score parsing
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTable {
    pub rows: Vec<(GeneSymbol, f64)>,
    pub rows_read: usize,
    pub rows_skipped: usize,
    /// Scores were given as percentages and rescaled to 0..=1
    pub percent_scale: bool,
}

/// Per-source import statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportStats {
    pub source: TargetSource,
    pub file: String,
    pub threshold: f64,
    pub rows_read: usize,
    pub rows_skipped: usize,
    pub rows_accepted: usize,
    pub percent_scale: bool,
}

/// One export to import
#[derive(Debug, Clone, PartialEq)]
pub struct TargetInput {
    pub source: TargetSource,
    pub path: PathBuf,
    pub threshold: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct TargetRow {
    gene: GeneSymbol,
    source: TargetSource,
    score: f64,
}

#[derive(Debug, Serialize)]
struct SourceRow<'a> {
    gene: &'a GeneSymbol,
    score: f64,
}

#[derive(Debug, Serialize)]
struct TargetSummary<'a> {
    sources: &'a [ImportStats],
    total_unique_targets: usize,
    predicted_by_all_sources: usize,
}

fn find_column(headers: &csv::StringRecord, aliases: &[&str]) -> Option<usize> {
    aliases
        .iter()
        .find_map(|alias| headers.iter().position(|h| clean_header(h) == *alias))
}

/// Parse one prediction table.
///
/// Fails with `DataFormat` only when no gene or score column can be found.
/// Rows with an empty gene or an unparseable score are skipped and counted.
/// SuperPred reports percentages, so a `%` cell or any value above 1 rescales
/// the whole SuperPred file. Other sources report probabilities and rows
/// outside 0..=1 are skipped instead.
pub fn parse_target_table<R: Read>(
    reader: R,
    source: TargetSource,
    delimiter: u8,
) -> netpharm_common::Result<ParsedTable> {
    let source_name = source.to_string();
    let source_name = source_name.as_str();
    let percent_allowed = source == TargetSource::SuperPred;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let score_idx = find_column(&headers, SCORE_ALIASES).ok_or_else(|| {
        NetpharmError::data_format(
            source_name,
            format!("no score column; expected one of: {}", SCORE_ALIASES.join(", ")),
        )
    })?;
    let gene_idx = find_column(&headers, GENE_ALIASES).ok_or_else(|| {
        NetpharmError::data_format(
            source_name,
            format!("no gene column; expected one of: {}", GENE_ALIASES.join(", ")),
        )
    })?;

    let mut raw_rows = Vec::new();
    let mut rows_read = 0;
    let mut rows_skipped = 0;
    let mut saw_percent = false;

    for record in reader.records() {
        rows_read += 1;
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                debug!(source = source_name, error = %e, "Skipping unreadable row");
                rows_skipped += 1;
                continue;
            },
        };

        let gene = record.get(gene_idx).map(GeneSymbol::new);
        let score = record.get(score_idx).map(str::trim).and_then(|cell| {
            let (number, percent) = match cell.strip_suffix('%') {
                Some(stripped) => (stripped.trim(), true),
                None => (cell, false),
            };
            number
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(|v| (v, percent))
        });

        match (gene, score) {
            (Some(Ok(gene)), Some((value, percent))) if percent_allowed => {
                saw_percent |= percent;
                raw_rows.push((gene, value));
            },
            (Some(Ok(gene)), Some((value, false))) if (0.0..=1.0).contains(&value) => {
                raw_rows.push((gene, value));
            },
            _ => rows_skipped += 1,
        }
    }

    let percent_scale = percent_allowed && (saw_percent || raw_rows.iter().any(|(_, v)| *v > 1.0));
    if percent_scale {
        for (_, value) in &mut raw_rows {
            *value /= 100.0;
        }
    }

    if rows_skipped > 0 {
        warn!(source = source_name, rows_skipped, "Dropped rows with missing gene or unparseable score");
    }

    Ok(ParsedTable {
        rows: raw_rows,
        rows_read,
        rows_skipped,
        percent_scale,
    })
}

/// Rows of a parsed table whose score is strictly above `threshold`
pub fn above_threshold(table: &ParsedTable, threshold: f64) -> impl Iterator<Item = &(GeneSymbol, f64)> {
    table.rows.iter().filter(move |(_, score)| *score > threshold)
}

/// Import every export into one target set
pub fn import_targets(inputs: &[TargetInput]) -> netpharm_common::Result<(TargetSet, Vec<ImportStats>)> {
    let mut targets = TargetSet::new();
    let mut stats = Vec::with_capacity(inputs.len());

    for input in inputs {
        let source_name = input.source.to_string();
        let delimiter = sniff_delimiter(&input.path).map_err(|_| {
            NetpharmError::missing_artifact(&input.path, format!("{} export could not be read", source_name))
        })?;
        let file = std::fs::File::open(&input.path)?;
        let table = parse_target_table(file, input.source, delimiter)?;

        let mut accepted = 0;
        for (gene, score) in above_threshold(&table, input.threshold) {
            targets.insert(gene.clone(), input.source, *score);
            accepted += 1;
        }

        info!(
            source = %input.source,
            rows = table.rows_read,
            accepted,
            threshold = input.threshold,
            "Targets imported"
        );
        stats.push(ImportStats {
            source: input.source,
            file: input.path.display().to_string(),
            threshold: input.threshold,
            rows_read: table.rows_read,
            rows_skipped: table.rows_skipped,
            rows_accepted: accepted,
            percent_scale: table.percent_scale,
        });
    }

    Ok((targets, stats))
}

fn instructions(compound: &Compound, awaiting: &[PathBuf]) -> String {
    let files = awaiting
        .iter()
        .map(|p| format!("- `{}`", p.display()))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "# Target prediction handoff\n\n\
         Canonical SMILES:\n\n```\n{smiles}\n```\n\n\
         1. Submit the SMILES at http://www.swisstargetprediction.ch/ (species: Homo sapiens) \
         and export the results as CSV.\n\
         2. Submit the SMILES at https://prediction.charite.de/ (SuperPred target prediction) \
         and export the target table as CSV.\n\
         3. Save the exports as:\n\n{files}\n\n\
         At least one export is required. Then resume with `netpharm run --resume <run-dir>`.\n",
        smiles = compound.canonical_smiles,
        files = files
    )
}

/// Every file the stage may read: the configured exports, or the run's
/// `data/` handoff files when none are configured
pub fn input_files(config: &TargetsConfig, run_dir: &Path) -> Vec<PathBuf> {
    let configured: Vec<PathBuf> = [&config.swiss, &config.superpred]
        .iter()
        .filter_map(|source| source.file.clone())
        .collect();
    if !configured.is_empty() {
        return configured;
    }
    let data = run_dir.join(DATA_DIR);
    vec![data.join(SWISS_HANDOFF), data.join(SUPERPRED_HANDOFF)]
}

/// Resolve which exports to import.
///
/// Explicitly configured files must exist. Without explicit files the run's
/// `data/` handoff files are used, and the stage waits until at least one is
/// present.
fn resolve_inputs(
    config: &TargetsConfig,
    compound: &Compound,
    run_dir: &Path,
) -> Result<std::result::Result<Vec<TargetInput>, Handoff>> {
    let configured = [
        (TargetSource::SwissTargetPrediction, &config.swiss),
        (TargetSource::SuperPred, &config.superpred),
    ];

    if configured.iter().any(|(_, c)| c.file.is_some()) {
        let mut inputs = Vec::new();
        for (source, source_config) in configured {
            let Some(path) = &source_config.file else {
                continue;
            };
            if !path.exists() {
                return Err(NetpharmError::missing_artifact(
                    path,
                    format!("configured {} export does not exist", source),
                )
                .into());
            }
            inputs.push(TargetInput {
                source,
                path: path.clone(),
                threshold: source_config.threshold,
            });
        }
        return Ok(Ok(inputs));
    }

    let data = data_dir(run_dir)?;
    let defaults = [
        (TargetSource::SwissTargetPrediction, data.join(SWISS_HANDOFF), config.swiss.threshold),
        (TargetSource::SuperPred, data.join(SUPERPRED_HANDOFF), config.superpred.threshold),
    ];

    let inputs: Vec<TargetInput> = defaults
        .iter()
        .filter(|(_, path, _)| path.exists())
        .map(|(source, path, threshold)| TargetInput {
            source: *source,
            path: path.clone(),
            threshold: *threshold,
        })
        .collect();

    if inputs.is_empty() {
        let awaiting: Vec<PathBuf> = defaults.iter().map(|(_, p, _)| p.clone()).collect();
        let instructions_path = data.join(INSTRUCTIONS_FILE);
        std::fs::write(&instructions_path, instructions(compound, &awaiting))?;
        return Ok(Err(Handoff {
            awaiting,
            instructions: instructions_path,
        }));
    }

    for (source, path, _) in &defaults {
        if !path.exists() {
            warn!(source = %source, path = %path.display(), "Export not supplied; continuing without it");
        }
    }
    Ok(Ok(inputs))
}

/// Import prediction exports and write the unified target tables
pub fn run(config: &TargetsConfig, compound: &Compound, run_dir: &Path) -> Result<StageOutcome<TargetSet>> {
    let inputs = match resolve_inputs(config, compound, run_dir)? {
        Ok(inputs) => inputs,
        Err(handoff) => return Ok(StageOutcome::Awaiting(handoff)),
    };

    let (targets, stats) = import_targets(&inputs)?;
    if targets.is_empty() {
        return Err(NetpharmError::not_found("no predicted targets passed the configured thresholds").into());
    }

    let dir = stage_dir(run_dir, Stage::Targets)?;
    let mut artifacts = Vec::new();

    for input in &inputs {
        let path = dir.join(format!("targets_{}.csv", input.source.slug()));
        let rows = targets.iter().filter_map(|(gene, hits)| {
            hits.iter()
                .find(|h| h.source == input.source)
                .map(|h| SourceRow { gene, score: h.score })
        });
        write_csv(&path, rows)?;
        artifacts.push(path);
    }

    let combined = dir.join(COMBINED_CSV);
    write_csv(
        &combined,
        targets.iter().flat_map(|(gene, hits)| {
            hits.iter().map(move |h| TargetRow {
                gene: gene.clone(),
                source: h.source,
                score: h.score,
            })
        }),
    )?;
    artifacts.push(combined);

    let predicted_by_all = targets
        .iter()
        .filter(|(_, hits)| hits.len() == inputs.len() && inputs.len() > 1)
        .count();
    let summary = dir.join(SUMMARY_JSON);
    write_json(
        &summary,
        &TargetSummary {
            sources: &stats,
            total_unique_targets: targets.len(),
            predicted_by_all_sources: predicted_by_all,
        },
    )?;
    artifacts.push(summary);

    info!(targets = targets.len(), "Target list saved");
    Ok(StageOutcome::Done {
        output: targets,
        artifacts,
    })
}

/// Reload the unified target set from a previous run
pub fn load(run_dir: &Path) -> Result<TargetSet> {
    let rows: Vec<TargetRow> = read_csv(&run_dir.join(Stage::Targets.dir_name()).join(COMBINED_CSV))?;
    let mut targets = TargetSet::new();
    for row in rows {
        targets.insert(row.gene, row.source, row.score);
    }
    Ok(targets)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::PredictionSourceConfig;
    use proptest::prelude::*;

    const SWISS: &str = "Target,Common name,Uniprot ID,ChEMBL ID,Target Class,Probability*,Known actives (3D/2D)\n\
Epidermal growth factor receptor,EGFR,P00533,CHEMBL203,Kinase,0.95,12\n\
Serine/threonine-protein kinase AKT1,AKT1,P31749,CHEMBL4282,Kinase,0.40,3\n\
Cytochrome P450 1A2,CYP1A2,P05177,CHEMBL3356,Cytochrome P450,n/a,0\n\
Unnamed,,P00000,CHEMBL0,Other,0.9,0\n";

    fn compound() -> Compound {
        Compound {
            cid: Some(5280343),
            canonical_smiles: "C1=CC(=C(C=C1C2=C(C(=O)C3=C(C=C(C=C3O2)O)O)O)O)O".into(),
            isomeric_smiles: None,
            molecular_formula: "C15H10O7".into(),
            molecular_weight: 302.23,
            iupac_name: None,
        }
    }

    #[test]
    fn test_parse_swiss_export_drops_bad_rows() {
        let table = parse_target_table(SWISS.as_bytes(), TargetSource::SwissTargetPrediction, b',').unwrap();
        assert_eq!(table.rows_read, 4);
        assert_eq!(table.rows_skipped, 2);
        assert!(!table.percent_scale);
        let genes: Vec<_> = table.rows.iter().map(|(g, _)| g.as_str()).collect();
        assert_eq!(genes, vec!["EGFR", "AKT1"]);
    }

    #[test]
    fn test_unrecognized_score_column_is_data_format_error() {
        let csv = "Common name,Confidence\nEGFR,0.9\n";
        let err = parse_target_table(csv.as_bytes(), TargetSource::SwissTargetPrediction, b',').unwrap_err();
        assert!(matches!(err, NetpharmError::DataFormat { .. }));
    }

    #[test]
    fn test_missing_gene_column_is_data_format_error() {
        let csv = "Uniprot ID,Probability\nP00533,0.9\n";
        let err = parse_target_table(csv.as_bytes(), TargetSource::SuperPred, b',').unwrap_err();
        assert!(matches!(err, NetpharmError::DataFormat { .. }));
    }

    #[test]
    fn test_percent_scores_are_rescaled() {
        let tsv = "Target\tProbability\tModel accuracy\nEGFR\t93.5 %\t98\nTP53\t41%\t90\n";
        let table = parse_target_table(tsv.as_bytes(), TargetSource::SuperPred, b'\t').unwrap();
        assert!(table.percent_scale);
        assert!((table.rows[0].1 - 0.935).abs() < 1e-9);
        assert_eq!(above_threshold(&table, 0.5).count(), 1);
    }

    #[test]
    fn test_swiss_values_above_one_are_not_rescaled() {
        let csv = "Common name,Probability*\nEGFR,0.95\nAKT1,12\nTP53,40%\nBCL2,0.30\n";
        let table = parse_target_table(csv.as_bytes(), TargetSource::SwissTargetPrediction, b',').unwrap();
        assert!(!table.percent_scale);
        assert_eq!(table.rows_skipped, 2);
        let rows: Vec<_> = table.rows.iter().map(|(g, v)| (g.as_str(), *v)).collect();
        assert_eq!(rows, vec![("EGFR", 0.95), ("BCL2", 0.30)]);
    }

    #[test]
    fn test_superpred_plain_values_above_one_are_percentages() {
        let csv = "Target Name,Probability\nEGFR,93.5\nTP53,0.5\n";
        let table = parse_target_table(csv.as_bytes(), TargetSource::SuperPred, b',').unwrap();
        assert!(table.percent_scale);
        assert!((table.rows[0].1 - 0.935).abs() < 1e-9);
        assert!((table.rows[1].1 - 0.005).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_is_strict() {
        let csv = "Gene,Score\nEGFR,0.5\nAKT1,0.51\n";
        let table = parse_target_table(csv.as_bytes(), TargetSource::SwissTargetPrediction, b',').unwrap();
        let kept: Vec<_> = above_threshold(&table, 0.5).map(|(g, _)| g.as_str()).collect();
        assert_eq!(kept, vec!["AKT1"]);
    }

    #[test]
    fn test_run_pauses_without_exports() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = run(&TargetsConfig::default(), &compound(), dir.path()).unwrap();
        let StageOutcome::Awaiting(handoff) = outcome else {
            panic!("expected a handoff");
        };
        assert_eq!(handoff.awaiting.len(), 2);
        let text = std::fs::read_to_string(&handoff.instructions).unwrap();
        assert!(text.contains("C1=CC(=C"));
    }

    #[test]
    fn test_run_imports_available_handoff_files() {
        let dir = tempfile::tempdir().unwrap();
        let data = data_dir(dir.path()).unwrap();
        std::fs::write(data.join(SWISS_HANDOFF), SWISS).unwrap();

        let StageOutcome::Done { output, artifacts } =
            run(&TargetsConfig::default(), &compound(), dir.path()).unwrap()
        else {
            panic!("expected completion");
        };
        assert_eq!(output.len(), 2);
        assert!(artifacts.iter().all(|p| p.exists()));

        let reloaded = load(dir.path()).unwrap();
        assert_eq!(reloaded, output);
    }

    #[test]
    fn test_configured_missing_file_is_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let config = TargetsConfig {
            swiss: PredictionSourceConfig {
                file: Some(dir.path().join("nope.csv")),
                threshold: 0.0,
            },
            ..TargetsConfig::default()
        };
        let err = run(&config, &compound(), dir.path()).unwrap_err();
        assert!(matches!(err.pipeline_error(), Some(NetpharmError::MissingArtifact { .. })));
    }

    proptest! {
        #[test]
        fn prop_higher_threshold_never_adds_targets(
            scores in proptest::collection::vec(0.0f64..1.0, 1..40),
            t1 in 0.0f64..1.0,
            t2 in 0.0f64..1.0,
        ) {
            let (low, high) = if t1 <= t2 { (t1, t2) } else { (t2, t1) };
            let mut csv = String::from("Gene,Probability\n");
            for (i, score) in scores.iter().enumerate() {
                csv.push_str(&format!("G{},{}\n", i, score));
            }
            let table = parse_target_table(csv.as_bytes(), TargetSource::SwissTargetPrediction, b',').unwrap();
            let at_low: std::collections::BTreeSet<_> =
                above_threshold(&table, low).map(|(g, _)| g.clone()).collect();
            let at_high: std::collections::BTreeSet<_> =
                above_threshold(&table, high).map(|(g, _)| g.clone()).collect();
            prop_assert!(at_high.is_subset(&at_low));
        }
    }
}

//! Docking gate
//!
//! Normalizes docking scores against a reference target. Scores are binding
//! energies, more negative is stronger, so `delta = reference - candidate`
//! is positive for candidates that bind better than the reference.

use crate::config::DockingConfig;
use crate::error::Result;
use crate::run_state::Stage;
use crate::stages::{
    clean_header, data_dir, read_csv, read_json, sniff_delimiter, stage_dir, write_csv, write_json, Handoff,
    StageOutcome, DATA_DIR,
};
use netpharm_common::types::{DockingHit, DockingRecord};
use netpharm_common::{GeneSymbol, NetpharmError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;

pub const GENE_ALIASES: &[&str] = &["gene_name", "gene_symbol", "gene"];
pub const SCORE_ALIASES: &[&str] = &["docking_score", "score"];
pub const STRUCTURE_ALIASES: &[&str] = &["structure_id", "pdb_id", "structure"];

pub const DOCKING_HANDOFF: &str = "docking_scores.csv";
pub const INSTRUCTIONS_FILE: &str = "INSTRUCTIONS_docking.md";
pub const DELTA_CSV: &str = "docking_delta_scores.csv";
pub const HIGH_AFFINITY_CSV: &str = "high_affinity_targets.csv";
pub const GATE_JSON: &str = "docking_gate.json";

/// Docking records normalized against the reference
#[derive(Debug, Clone, PartialEq)]
pub struct DockingReport {
    pub reference: DockingRecord,
    /// Every non-reference record, sorted by delta descending
    pub scored: Vec<DockingHit>,
    /// Records with delta above the gate
    pub high_affinity: Vec<DockingHit>,
    pub min_delta: f64,
}

/// Gate parameters the stored hit list was produced with
#[derive(Debug, Serialize, Deserialize)]
struct GateRecord {
    reference_gene: GeneSymbol,
    min_delta: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct DeltaRow {
    gene: GeneSymbol,
    structure_id: String,
    score: f64,
    delta: f64,
    is_reference: bool,
}

fn check_unique(records: &[DockingRecord]) -> netpharm_common::Result<()> {
    let mut seen = HashSet::new();
    for record in records {
        if !seen.insert(&record.gene) {
            return Err(NetpharmError::DuplicateRecord(record.gene.to_string()));
        }
    }
    Ok(())
}

fn find_reference<'a>(
    records: &'a [DockingRecord],
    reference: &GeneSymbol,
) -> netpharm_common::Result<&'a DockingRecord> {
    records
        .iter()
        .find(|r| &r.gene == reference)
        .ok_or_else(|| NetpharmError::MissingReference(reference.to_string()))
}

/// Delta of every non-reference record, sorted by delta descending then gene
pub fn score_all(records: &[DockingRecord], reference: &GeneSymbol) -> netpharm_common::Result<Vec<DockingHit>> {
    check_unique(records)?;
    let reference_score = find_reference(records, reference)?.score;

    let mut hits: Vec<DockingHit> = records
        .iter()
        .filter(|r| &r.gene != reference)
        .map(|r| DockingHit {
            gene: r.gene.clone(),
            structure_id: r.structure_id.clone(),
            score: r.score,
            delta: reference_score - r.score,
        })
        .collect();
    hits.sort_by(|a, b| b.delta.total_cmp(&a.delta).then_with(|| a.gene.cmp(&b.gene)));
    Ok(hits)
}

/// Records that bind more strongly than the reference by more than `min_delta`
pub fn gate(records: &[DockingRecord], reference: &GeneSymbol, min_delta: f64) -> netpharm_common::Result<Vec<DockingHit>> {
    Ok(score_all(records, reference)?
        .into_iter()
        .filter(|hit| hit.delta > min_delta)
        .collect())
}

pub fn evaluate(records: &[DockingRecord], reference: &GeneSymbol, min_delta: f64) -> netpharm_common::Result<DockingReport> {
    let scored = score_all(records, reference)?;
    let reference = find_reference(records, reference)?.clone();
    let high_affinity = scored.iter().filter(|hit| hit.delta > min_delta).cloned().collect();
    Ok(DockingReport {
        reference,
        scored,
        high_affinity,
        min_delta,
    })
}

fn find_column(headers: &csv::StringRecord, aliases: &[&str]) -> Option<usize> {
    aliases
        .iter()
        .find_map(|alias| headers.iter().position(|h| clean_header(h).eq_ignore_ascii_case(alias)))
}

/// Parse a docking score table
pub fn parse_docking_table<R: Read>(
    reader: R,
    source_name: &str,
    delimiter: u8,
) -> netpharm_common::Result<Vec<DockingRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(reader);
    let headers = reader.headers()?.clone();

    let column = |aliases: &[&str], what: &str| {
        find_column(&headers, aliases).ok_or_else(|| {
            NetpharmError::data_format(
                source_name,
                format!("no {} column; expected one of: {}", what, aliases.join(", ")),
            )
        })
    };
    let gene_idx = column(GENE_ALIASES, "gene")?;
    let score_idx = column(SCORE_ALIASES, "docking score")?;
    let structure_idx = column(STRUCTURE_ALIASES, "structure")?;

    let mut records = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let line = i + 2;
        let cell = |idx: usize| record.get(idx).map(str::trim).unwrap_or_default();

        let gene = GeneSymbol::new(cell(gene_idx))
            .map_err(|_| NetpharmError::data_format(source_name, format!("line {}: empty gene", line)))?;
        let score = cell(score_idx)
            .parse::<f64>()
            .ok()
            .filter(|s| s.is_finite())
            .ok_or_else(|| {
                NetpharmError::data_format(
                    source_name,
                    format!("line {}: '{}' is not a docking score", line, cell(score_idx)),
                )
            })?;

        records.push(DockingRecord {
            gene,
            score,
            structure_id: cell(structure_idx).to_string(),
        });
    }
    Ok(records)
}

/// Load docking records from a comma- or tab-delimited file
pub fn load_docking_file(path: &Path) -> Result<Vec<DockingRecord>> {
    if !path.exists() {
        return Err(NetpharmError::missing_artifact(path, "docking score file not found").into());
    }
    let delimiter = sniff_delimiter(path)?;
    let file = std::fs::File::open(path)?;
    Ok(parse_docking_table(file, &path.display().to_string(), delimiter)?)
}

/// Write the delta table and the gated hits into `dir`
pub fn write_report(report: &DockingReport, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;

    let reference_row = DeltaRow {
        gene: report.reference.gene.clone(),
        structure_id: report.reference.structure_id.clone(),
        score: report.reference.score,
        delta: 0.0,
        is_reference: true,
    };
    let delta_path = dir.join(DELTA_CSV);
    write_csv(
        &delta_path,
        std::iter::once(reference_row).chain(report.scored.iter().map(|hit| DeltaRow {
            gene: hit.gene.clone(),
            structure_id: hit.structure_id.clone(),
            score: hit.score,
            delta: hit.delta,
            is_reference: false,
        })),
    )?;

    let high_path = dir.join(HIGH_AFFINITY_CSV);
    write_csv(&high_path, &report.high_affinity)?;

    let gate_path = dir.join(GATE_JSON);
    write_json(
        &gate_path,
        &GateRecord {
            reference_gene: report.reference.gene.clone(),
            min_delta: report.min_delta,
        },
    )?;

    Ok(vec![delta_path, high_path, gate_path])
}

fn instructions(path: &Path, reference: &str) -> String {
    format!(
        "# Docking handoff\n\n\
         Dock the compound against the network hub structures and the reference target {reference}.\n\
         Save one row per gene to `{path}` with the columns:\n\n\
         - `gene_name`: gene symbol\n\
         - `docking_score`: binding energy (more negative binds more strongly)\n\
         - `structure_id`: PDB or AlphaFold identifier of the docked structure\n\n\
         Each gene may appear only once. Then resume with `netpharm run --resume <run-dir>`.\n",
        reference = reference,
        path = path.display()
    )
}

/// Docking score file of a run: the configured one or `data/docking_scores.csv`
pub fn input_file(config: &DockingConfig, run_dir: &Path) -> PathBuf {
    config
        .file
        .clone()
        .unwrap_or_else(|| run_dir.join(DATA_DIR).join(DOCKING_HANDOFF))
}

/// Gate the docking file configured for this run
pub fn run(config: &DockingConfig, run_dir: &Path) -> Result<StageOutcome<DockingReport>> {
    let path = input_file(config, run_dir);

    if !path.exists() {
        let instructions_path = data_dir(run_dir)?.join(INSTRUCTIONS_FILE);
        std::fs::write(&instructions_path, instructions(&path, &config.reference_gene))?;
        return Ok(StageOutcome::Awaiting(Handoff {
            awaiting: vec![path],
            instructions: instructions_path,
        }));
    }

    let records = load_docking_file(&path)?;
    let reference = GeneSymbol::new(&config.reference_gene)?;
    let report = evaluate(&records, &reference, config.min_delta)?;
    let artifacts = write_report(&report, &stage_dir(run_dir, Stage::Docking)?)?;

    info!(
        reference = %reference,
        scored = report.scored.len(),
        high_affinity = report.high_affinity.len(),
        "Docking gate applied"
    );
    Ok(StageOutcome::Done {
        output: report,
        artifacts,
    })
}

/// Reload the docking report from a previous run, with the gate it was written under
pub fn load(run_dir: &Path) -> Result<DockingReport> {
    let dir = run_dir.join(Stage::Docking.dir_name());
    let gate: GateRecord = read_json(&dir.join(GATE_JSON))?;
    let rows: Vec<DeltaRow> = read_csv(&dir.join(DELTA_CSV))?;
    let high_affinity: Vec<DockingHit> = read_csv(&dir.join(HIGH_AFFINITY_CSV))?;

    let mut reference = None;
    let mut scored = Vec::new();
    for row in rows {
        if row.is_reference {
            reference = Some(DockingRecord {
                gene: row.gene,
                score: row.score,
                structure_id: row.structure_id,
            });
        } else {
            scored.push(DockingHit {
                gene: row.gene,
                structure_id: row.structure_id,
                score: row.score,
                delta: row.delta,
            });
        }
    }

    let reference = reference
        .filter(|r| r.gene == gate.reference_gene)
        .ok_or_else(|| NetpharmError::MissingReference(gate.reference_gene.to_string()))?;
    Ok(DockingReport {
        reference,
        scored,
        high_affinity,
        min_delta: gate.min_delta,
    })
}

//! Compound resolution stage

use crate::error::Result;
use crate::run_state::Stage;
use crate::stages::{read_json, stage_dir, write_csv, write_json, StageOutcome};
use netpharm_common::types::{Compound, CompoundQuery};
use netpharm_ingest::CompoundSource;
use serde::Serialize;
use std::path::Path;
use tracing::info;

pub const COMPOUND_JSON: &str = "compound.json";
pub const COMPOUND_CSV: &str = "compound_info.csv";

#[derive(Serialize)]
struct CompoundRow<'a> {
    name: Option<&'a str>,
    cid: Option<u64>,
    canonical_smiles: &'a str,
    isomeric_smiles: Option<&'a str>,
    molecular_formula: &'a str,
    molecular_weight: f64,
    iupac_name: Option<&'a str>,
}

/// Resolve the compound and write its attributes
pub async fn run(
    source: &dyn CompoundSource,
    query: &CompoundQuery,
    name: Option<&str>,
    run_dir: &Path,
) -> Result<StageOutcome<Compound>> {
    let compound = source.resolve(query).await?;

    let dir = stage_dir(run_dir, Stage::Compound)?;
    let json_path = dir.join(COMPOUND_JSON);
    let csv_path = dir.join(COMPOUND_CSV);

    write_json(&json_path, &compound)?;
    write_csv(
        &csv_path,
        [CompoundRow {
            name,
            cid: compound.cid,
            canonical_smiles: &compound.canonical_smiles,
            isomeric_smiles: compound.isomeric_smiles.as_deref(),
            molecular_formula: &compound.molecular_formula,
            molecular_weight: compound.molecular_weight,
            iupac_name: compound.iupac_name.as_deref(),
        }],
    )?;

    info!(smiles = %compound.canonical_smiles, "Compound information saved");
    Ok(StageOutcome::Done {
        output: compound,
        artifacts: vec![json_path, csv_path],
    })
}

/// Reload the resolved compound from a previous run
pub fn load(run_dir: &Path) -> Result<Compound> {
    read_json(&run_dir.join(Stage::Compound.dir_name()).join(COMPOUND_JSON))
}

//! Pipeline stages
//!
//! Each stage reads its inputs, writes its artifacts under
//! `<run>/<stepN_name>/`, and can reload its output from those artifacts
//! when a later invocation resumes the run.

pub mod compound;
pub mod docking;
pub mod enrichment;
pub mod network;
pub mod pathways;
pub mod targets;

use crate::error::Result;
use crate::run_state::Stage;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Directory for manual handoff files inside a run directory
pub const DATA_DIR: &str = "data";

/// Result of executing a stage
#[derive(Debug)]
pub enum StageOutcome<T> {
    /// Stage finished and wrote these artifacts
    Done { output: T, artifacts: Vec<PathBuf> },
    /// Stage needs files supplied by hand before it can run
    Awaiting(Handoff),
}

/// Files a paused stage is waiting for
#[derive(Debug, Clone, PartialEq)]
pub struct Handoff {
    pub awaiting: Vec<PathBuf>,
    pub instructions: PathBuf,
}

/// Output directory of a stage, created on demand
pub fn stage_dir(run_dir: &Path, stage: Stage) -> Result<PathBuf> {
    let dir = run_dir.join(stage.dir_name());
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Manual handoff directory, created on demand
pub fn data_dir(run_dir: &Path) -> Result<PathBuf> {
    let dir = run_dir.join(DATA_DIR);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Write rows as CSV with a header line
pub fn write_csv<T, I>(path: &Path, rows: I) -> Result<()>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read every row of a CSV written by [`write_csv`]
pub fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Pick tab or comma from the header line of a user-supplied table
pub fn sniff_delimiter(path: &Path) -> Result<u8> {
    let file = std::fs::File::open(path)?;
    let mut header = String::new();
    BufReader::new(file).read_line(&mut header)?;
    Ok(delimiter_for(&header))
}

pub fn delimiter_for(header: &str) -> u8 {
    if header.matches('\t').count() > header.matches(',').count() {
        b'\t'
    } else {
        b','
    }
}

/// Header cell with whitespace and a UTF-8 byte-order mark removed
pub fn clean_header(raw: &str) -> &str {
    raw.trim().trim_start_matches('\u{feff}').trim()
}

/// Join list cells the same way in every artifact
pub fn join_list<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| s.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(";")
}

pub fn split_list(cell: &str) -> Vec<String> {
    cell.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_delimiter_for() {
        assert_eq!(delimiter_for("Term\tCount\t%\tBenjamini\n"), b'\t');
        assert_eq!(delimiter_for("Term,Count,%,Benjamini\n"), b',');
        assert_eq!(delimiter_for("Common name,Target\tname"), b',');
    }

    #[test]
    fn test_clean_header_strips_bom() {
        assert_eq!(clean_header("\u{feff}Term "), "Term");
    }

    #[test]
    fn test_list_roundtrip() {
        let joined = join_list(["R-HSA-1", "R-HSA-2"]);
        assert_eq!(joined, "R-HSA-1;R-HSA-2");
        assert_eq!(split_list(&joined), vec!["R-HSA-1", "R-HSA-2"]);
        assert!(split_list("").is_empty());
    }
}

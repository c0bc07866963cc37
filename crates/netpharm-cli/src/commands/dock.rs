//! `netpharm dock` command implementation
//!
//! Applies the docking gate to a score file outside of a pipeline run.

use crate::error::Result;
use crate::stages::docking::{evaluate, load_docking_file, write_report, DockingReport};
use crate::visualize::{figures, DOCKING_SVG};
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use netpharm_common::GeneSymbol;
use std::path::{Path, PathBuf};
use tracing::info;

/// Score `input` against `reference` and write the delta tables and chart
pub fn gate_file(input: &Path, reference: &str, threshold: f64, output: &Path) -> Result<(DockingReport, Vec<PathBuf>)> {
    let records = load_docking_file(input)?;
    let reference = GeneSymbol::new(reference)?;
    let report = evaluate(&records, &reference, threshold)?;

    let mut written = write_report(&report, output)?;
    let chart = output.join(DOCKING_SVG);
    figures::docking_figure(&chart, &report)?;
    written.push(chart);

    info!(
        input = %input.display(),
        reference = %reference,
        high_affinity = report.high_affinity.len(),
        "Docking gate applied"
    );
    Ok((report, written))
}

/// Run the docking gate
pub async fn run(input: PathBuf, reference: String, threshold: f64, output: Option<PathBuf>) -> Result<()> {
    let output = output.unwrap_or_else(|| {
        input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    });
    let (report, written) = gate_file(&input, &reference, threshold, &output)?;

    println!(
        "{} {} of {} targets bind more strongly than {} (delta > {})",
        "✓".green(),
        report.high_affinity.len(),
        report.scored.len(),
        report.reference.gene.to_string().bold(),
        threshold
    );

    if !report.high_affinity.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL).apply_modifier(UTF8_ROUND_CORNERS);
        table.set_header(vec!["Gene", "Structure", "Score", "Delta"]);
        for hit in &report.high_affinity {
            table.add_row(vec![
                hit.gene.to_string(),
                hit.structure_id.clone(),
                format!("{:.2}", hit.score),
                format!("{:.2}", hit.delta),
            ]);
        }
        println!("{}", table);
    }

    println!();
    for path in &written {
        println!("  Wrote {}", path.display());
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::stages::docking::{DELTA_CSV, HIGH_AFFINITY_CSV};

    #[test]
    fn test_gate_file_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("scores.csv");
        std::fs::write(
            &input,
            "gene_name,docking_score,structure_id\nREF,-100,S1\nA,-120,S2\nB,-80,S3\n",
        )
        .unwrap();

        let (report, written) = gate_file(&input, "REF", 0.0, dir.path()).unwrap();
        assert_eq!(report.high_affinity.len(), 1);
        assert_eq!(report.high_affinity[0].gene.as_str(), "A");
        assert_eq!(report.high_affinity[0].delta, 20.0);
        assert_eq!(written.len(), 4);
        assert!(dir.path().join(DELTA_CSV).exists());
        assert!(dir.path().join(HIGH_AFFINITY_CSV).exists());
        assert!(dir.path().join(DOCKING_SVG).exists());
    }

    #[test]
    fn test_gate_file_missing_reference() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("scores.csv");
        std::fs::write(&input, "gene_name,docking_score,structure_id\nA,-120,S2\n").unwrap();

        let err = gate_file(&input, "REF", 0.0, dir.path()).unwrap_err();
        assert!(matches!(
            err.pipeline_error(),
            Some(netpharm_common::NetpharmError::MissingReference(_))
        ));
    }
}

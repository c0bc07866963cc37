//! Visualization stage
//!
//! Renders the network (static SVG and interactive HTML), the enrichment
//! bubble chart and, when docking ran, the docking delta chart into
//! `step7_visualization/`.

pub mod figures;
pub mod html;
pub mod layout;

use crate::config::VisualizationConfig;
use crate::error::Result;
use crate::run_state::Stage;
use crate::stages::docking::DockingReport;
use crate::stages::network::Network;
use crate::stages::{stage_dir, StageOutcome};
use netpharm_common::types::EnrichmentTerm;
use plotters::style::RGBColor;
use std::path::{Path, PathBuf};
use tracing::info;

pub const NETWORK_SVG: &str = "network_top_nodes.svg";
pub const NETWORK_HTML: &str = "network_interactive.html";
pub const ENRICHMENT_SVG: &str = "enrichment_bubble.svg";
pub const DOCKING_SVG: &str = "docking_delta.svg";

pub const HUB_COLOR: RGBColor = RGBColor(0xE4, 0x1A, 0x1C);
pub const OTHER_COLOR: RGBColor = RGBColor(0x37, 0x7E, 0xB8);
pub const HUB_HEX: &str = "#E41A1C";
pub const OTHER_HEX: &str = "#377EB8";

pub const DOCKING_REFERENCE: RGBColor = RGBColor(0x33, 0x33, 0x33);
pub const DOCKING_POSITIVE: RGBColor = RGBColor(0x00, 0x9E, 0x73);
pub const DOCKING_OTHER: RGBColor = RGBColor(0xBD, 0xBD, 0xBD);

/// Inputs to the visualization stage
pub struct Figures<'a> {
    pub title: &'a str,
    pub network: &'a Network,
    pub terms: &'a [EnrichmentTerm],
    pub docking: Option<&'a DockingReport>,
}

/// Render every figure that has data
pub fn run(figures: &Figures<'_>, config: &VisualizationConfig, run_dir: &Path) -> Result<StageOutcome<Vec<PathBuf>>> {
    let dir = stage_dir(run_dir, Stage::Visualization)?;
    let mut artifacts = Vec::new();

    let network_svg = dir.join(NETWORK_SVG);
    figures::network_figure(&network_svg, figures.network, config.top_nodes)?;
    artifacts.push(network_svg);

    let network_html = dir.join(NETWORK_HTML);
    std::fs::write(&network_html, html::network_page(figures.network, figures.title))?;
    artifacts.push(network_html);

    if !figures.terms.is_empty() {
        let path = dir.join(ENRICHMENT_SVG);
        figures::enrichment_figure(&path, figures.terms, config.top_terms)?;
        artifacts.push(path);
    }

    if let Some(report) = figures.docking {
        let path = dir.join(DOCKING_SVG);
        figures::docking_figure(&path, report)?;
        artifacts.push(path);
    }

    info!(figures = artifacts.len(), dir = %dir.display(), "Figures rendered");
    Ok(StageOutcome::Done {
        output: artifacts.clone(),
        artifacts,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::HubPolicy;
    use crate::stages::docking::evaluate;
    use crate::stages::network::build_network;
    use netpharm_common::types::{DockingRecord, EnrichmentCategory, Interaction};
    use netpharm_common::GeneSymbol;
    use std::collections::BTreeSet;

    fn gene(s: &str) -> GeneSymbol {
        GeneSymbol::new(s).unwrap()
    }

    #[test]
    fn test_renders_all_figures() {
        let genes: BTreeSet<GeneSymbol> = ["EGFR", "AKT1", "TP53", "CASP3"].iter().map(|g| gene(g)).collect();
        let interactions = vec![
            Interaction { gene_a: gene("EGFR"), gene_b: gene("AKT1"), score: 0.95 },
            Interaction { gene_a: gene("AKT1"), gene_b: gene("TP53"), score: 0.8 },
        ];
        let network = build_network(&genes, &interactions, 0.7, &HubPolicy::TopN { n: 1 });
        let terms = vec![EnrichmentTerm {
            category: EnrichmentCategory::Kegg,
            term_id: "KEGG:04151".into(),
            description: "PI3K-Akt signaling pathway".into(),
            count: 2,
            gene_ratio: Some(0.5),
            p_value: None,
            adjusted_p_value: 0.001,
            genes: vec!["EGFR".into(), "AKT1".into()],
        }];
        let docking = evaluate(
            &[
                DockingRecord { gene: gene("DYRK2"), score: -200.0, structure_id: "3K2L".into() },
                DockingRecord { gene: gene("EGFR"), score: -230.0, structure_id: "1M17".into() },
            ],
            &gene("DYRK2"),
            0.0,
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let figures = Figures {
            title: "quercetin",
            network: &network,
            terms: &terms,
            docking: Some(&docking),
        };
        let StageOutcome::Done { artifacts, .. } = run(&figures, &VisualizationConfig::default(), dir.path()).unwrap()
        else {
            panic!("expected completion");
        };

        assert_eq!(artifacts.len(), 4);
        for path in &artifacts {
            assert!(std::fs::metadata(path).unwrap().len() > 0, "{} is empty", path.display());
        }
        let svg = std::fs::read_to_string(&artifacts[0]).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("AKT1"));
    }

    #[test]
    fn test_skips_figures_without_data() {
        let network = build_network(&BTreeSet::new(), &[], 0.7, &HubPolicy::default());
        let dir = tempfile::tempdir().unwrap();
        let figures = Figures {
            title: "empty",
            network: &network,
            terms: &[],
            docking: None,
        };
        let StageOutcome::Done { artifacts, .. } = run(&figures, &VisualizationConfig::default(), dir.path()).unwrap()
        else {
            panic!("expected completion");
        };
        assert_eq!(artifacts.len(), 2);
    }
}

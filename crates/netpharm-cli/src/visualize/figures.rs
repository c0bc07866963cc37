//! Static figures rendered with plotters (SVG backend)
//!
//! The SVG backend writes text as SVG elements, so no system fonts are
//! needed at render time.

use super::layout::{fruchterman_reingold, DEFAULT_ITERATIONS};
use super::{DOCKING_OTHER, DOCKING_POSITIVE, DOCKING_REFERENCE, HUB_COLOR, OTHER_COLOR};
use crate::error::Result;
use crate::stages::docking::DockingReport;
use crate::stages::network::{Network, NodeMetrics};
use netpharm_common::types::EnrichmentTerm;
use plotters::prelude::*;
use plotters_svg::SVGBackend;
use std::collections::BTreeMap;
use std::path::Path;

const NETWORK_SIZE: (u32, u32) = (1000, 1000);
const NETWORK_MARGIN: f64 = 80.0;
const MIN_RADIUS: f64 = 8.0;
const MAX_RADIUS: f64 = 30.0;
const LABEL_ALL_BELOW: usize = 50;

fn draw_empty(path: &Path, size: (u32, u32), message: &str) -> Result<()> {
    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    root.draw(&Text::new(
        message.to_string(),
        (size.0 as i32 / 2 - 80, size.1 as i32 / 2),
        ("sans-serif", 20).into_font().color(&BLACK),
    ))?;
    root.present()?;
    Ok(())
}

/// The `top_nodes` highest-degree nodes with the edges among them
pub fn top_subnetwork(network: &Network, top_nodes: usize) -> (Vec<&NodeMetrics>, Vec<(usize, usize, f64)>) {
    let nodes: Vec<&NodeMetrics> = network.nodes.iter().take(top_nodes).collect();
    let index: BTreeMap<_, _> = nodes.iter().enumerate().map(|(i, n)| (&n.gene, i)).collect();
    let edges = network
        .edges
        .iter()
        .filter_map(|e| match (index.get(&e.gene_a), index.get(&e.gene_b)) {
            (Some(&a), Some(&b)) => Some((a, b, e.score)),
            _ => None,
        })
        .collect();
    (nodes, edges)
}

/// Network restricted to its highest-degree nodes.
///
/// Node radius follows degree, hubs are red and the rest blue, edge width
/// follows the interaction score.
pub fn network_figure(path: &Path, network: &Network, top_nodes: usize) -> Result<()> {
    let (nodes, edges) = top_subnetwork(network, top_nodes);
    if nodes.is_empty() {
        return draw_empty(path, NETWORK_SIZE, "Network has no nodes");
    }

    let pairs: Vec<(usize, usize)> = edges.iter().map(|&(a, b, _)| (a, b)).collect();
    let positions = fruchterman_reingold(nodes.len(), &pairs, DEFAULT_ITERATIONS);

    let root = SVGBackend::new(path, NETWORK_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(
        &format!("Interaction network: top {} nodes by degree", nodes.len()),
        ("sans-serif", 24),
    )?;
    let (width, height) = root.dim_in_pixel();
    let to_pixel = |(x, y): (f64, f64)| -> (i32, i32) {
        (
            (NETWORK_MARGIN + x * (width as f64 - 2.0 * NETWORK_MARGIN)) as i32,
            (NETWORK_MARGIN + y * (height as f64 - 2.0 * NETWORK_MARGIN)) as i32,
        )
    };

    for &(a, b, score) in &edges {
        let width = 1 + (score * 3.0).round() as u32;
        root.draw(&PathElement::new(
            vec![to_pixel(positions[a]), to_pixel(positions[b])],
            RGBColor(150, 150, 150).mix(0.6).stroke_width(width),
        ))?;
    }

    let min_degree = nodes.iter().map(|n| n.degree).min().unwrap_or(0);
    let max_degree = nodes.iter().map(|n| n.degree).max().unwrap_or(0);
    let radius = |degree: usize| -> i32 {
        if max_degree > min_degree {
            let t = (degree - min_degree) as f64 / (max_degree - min_degree) as f64;
            (MIN_RADIUS + t * (MAX_RADIUS - MIN_RADIUS)) as i32
        } else {
            MIN_RADIUS as i32
        }
    };

    let label_all = nodes.len() < LABEL_ALL_BELOW;
    for (node, &position) in nodes.iter().zip(&positions) {
        let center = to_pixel(position);
        let r = radius(node.degree);
        let color = if node.is_hub { HUB_COLOR } else { OTHER_COLOR };
        root.draw(&Circle::new(center, r, color.mix(0.9).filled()))?;
        root.draw(&Circle::new(center, r, BLACK.stroke_width(1)))?;

        if label_all || node.is_hub {
            root.draw(&Text::new(
                node.gene.to_string(),
                (center.0 + r + 3, center.1 - 8),
                ("sans-serif", 16).into_font().color(&BLACK),
            ))?;
        }
    }

    root.present()?;
    Ok(())
}

fn significance_color(adjusted_p: f64, min_log: f64, max_log: f64) -> RGBColor {
    let log = -adjusted_p.max(f64::MIN_POSITIVE).log10();
    let t = if max_log > min_log {
        ((log - min_log) / (max_log - min_log)).clamp(0.0, 1.0)
    } else {
        1.0
    };
    // blue (weakest) to red (strongest)
    let lerp = |from: u8, to: u8| (from as f64 + t * (to as f64 - from as f64)).round() as u8;
    RGBColor(lerp(0x37, 0xE4), lerp(0x7E, 0x1A), lerp(0xB8, 0x1C))
}

fn truncate(label: &str, max: usize) -> String {
    if label.chars().count() <= max {
        label.to_string()
    } else {
        format!("{}...", label.chars().take(max - 3).collect::<String>())
    }
}

/// Bubble chart of the most significant terms.
///
/// X is the gene ratio, or the member count when no ratio is known. Bubble
/// size follows the member count and colour the adjusted p-value.
pub fn enrichment_figure(path: &Path, terms: &[EnrichmentTerm], top_terms: usize) -> Result<()> {
    let mut ranked: Vec<&EnrichmentTerm> = terms.iter().collect();
    ranked.sort_by(|a, b| a.adjusted_p_value.total_cmp(&b.adjusted_p_value));
    ranked.truncate(top_terms);
    if ranked.is_empty() {
        return draw_empty(path, (1000, 700), "No enrichment terms");
    }

    let use_ratio = ranked.iter().all(|t| t.gene_ratio.is_some());
    let x_of = |t: &EnrichmentTerm| -> f64 {
        match (use_ratio, t.gene_ratio) {
            (true, Some(ratio)) => ratio,
            _ => t.count as f64,
        }
    };
    let max_x = ranked.iter().map(|t| x_of(*t)).fold(0.0f64, f64::max).max(f64::EPSILON) * 1.15;
    let max_count = ranked.iter().map(|t| t.count).max().unwrap_or(1).max(1) as f64;
    let logs: Vec<f64> = ranked
        .iter()
        .map(|t| -t.adjusted_p_value.max(f64::MIN_POSITIVE).log10())
        .collect();
    let min_log = logs.iter().copied().fold(f64::INFINITY, f64::min);
    let max_log = logs.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    // most significant term on top
    let n = ranked.len();
    let labels: Vec<String> = ranked
        .iter()
        .rev()
        .map(|t| truncate(&format!("[{}] {}", t.category, t.description), 48))
        .collect();

    let root = SVGBackend::new(path, (1100, 120 + 40 * n as u32)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(format!("Top {} enriched terms", n), ("sans-serif", 22))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(380)
        .build_cartesian_2d(0.0..max_x, (0..n).into_segmented())?;

    chart
        .configure_mesh()
        .y_labels(n)
        .y_label_formatter(&|y| match y {
            SegmentValue::CenterOf(idx) => labels.get(*idx).cloned().unwrap_or_default(),
            _ => String::new(),
        })
        .x_desc(if use_ratio { "Gene ratio" } else { "Gene count" })
        .draw()?;

    chart.draw_series(ranked.iter().rev().enumerate().map(|(i, term)| {
        let size = 6.0 + 18.0 * (term.count as f64 / max_count).sqrt();
        Circle::new(
            (x_of(*term), SegmentValue::CenterOf(i)),
            size as i32,
            significance_color(term.adjusted_p_value, min_log, max_log).filled(),
        )
    }))?;

    root.present()?;
    Ok(())
}

/// Horizontal bar chart of docking deltas, reference included
pub fn docking_figure(path: &Path, report: &DockingReport) -> Result<()> {
    // strongest binder on top
    let mut bars: Vec<(String, f64, RGBColor)> = report
        .scored
        .iter()
        .map(|hit| {
            let color = if hit.delta > 0.0 { DOCKING_POSITIVE } else { DOCKING_OTHER };
            (hit.gene.to_string(), hit.delta, color)
        })
        .collect();
    bars.push((report.reference.gene.to_string(), 0.0, DOCKING_REFERENCE));
    bars.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| b.0.cmp(&a.0)));

    let max_abs = bars.iter().map(|(_, d, _)| d.abs()).fold(0.0f64, f64::max).max(1.0) * 1.1;
    let n = bars.len();

    let root = SVGBackend::new(path, (900, 120 + 32 * n as u32)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Docking score delta vs {}", report.reference.gene),
            ("sans-serif", 22),
        )
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(100)
        .build_cartesian_2d(-max_abs..max_abs, (0..n).into_segmented())?;

    chart
        .configure_mesh()
        .y_labels(n)
        .y_label_formatter(&|y| match y {
            SegmentValue::CenterOf(idx) => bars.get(*idx).map(|b| b.0.clone()).unwrap_or_default(),
            _ => String::new(),
        })
        .x_desc(format!("Delta docking score (vs {})", report.reference.gene))
        .draw()?;

    chart.draw_series(bars.iter().enumerate().map(|(i, (_, delta, color))| {
        let mut bar = Rectangle::new(
            [(0.0, SegmentValue::Exact(i)), (*delta, SegmentValue::Exact(i + 1))],
            color.filled(),
        );
        bar.set_margin(4, 4, 0, 0);
        bar
    }))?;

    chart.draw_series(std::iter::once(PathElement::new(
        vec![(0.0, SegmentValue::Exact(0)), (0.0, SegmentValue::Exact(n))],
        BLACK.mix(0.5).stroke_width(1),
    )))?;

    root.present()?;
    Ok(())
}

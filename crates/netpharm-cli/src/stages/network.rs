//! Interaction network stage
//!
//! Builds an undirected protein interaction graph over a gene set and
//! computes per-node topology metrics. Edges are canonicalized and inserted
//! in sorted order, so the same inputs always give bit-identical metrics.

use crate::config::{HubPolicy, NetworkConfig, NetworkScope};
use crate::error::Result;
use crate::run_state::Stage;
use crate::stages::pathways::PathwayFilter;
use crate::stages::{read_csv, read_json, stage_dir, write_csv, write_json, StageOutcome};
use netpharm_common::types::{Interaction, TargetSet};
use netpharm_common::{GeneSymbol, NetpharmError};
use netpharm_ingest::InteractionSource;
use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;
use tracing::{debug, info};

pub const INTERACTIONS_CSV: &str = "string_interactions.csv";
pub const METRICS_CSV: &str = "network_metrics.csv";
pub const SUMMARY_JSON: &str = "network_summary.json";

/// Topology metrics of one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub gene: GeneSymbol,
    pub degree: usize,
    pub degree_centrality: f64,
    pub betweenness: f64,
    pub closeness: f64,
    pub is_hub: bool,
}

/// Interactions discarded while building the graph
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedEdges {
    pub below_threshold: usize,
    pub self_loops: usize,
    /// An endpoint was not in the requested gene set
    pub unknown_endpoint: usize,
    /// Repeated pairs merged into one edge
    pub duplicates: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub nodes: usize,
    pub edges: usize,
    pub isolated_nodes: usize,
    pub average_degree: f64,
    pub density: f64,
    pub connected_components: usize,
    /// Longest shortest path; only defined for a connected network
    pub diameter: Option<usize>,
    /// Mean shortest path over all node pairs; only defined for a connected
    /// network of two or more nodes
    #[serde(default)]
    pub average_shortest_path: Option<f64>,
    pub confidence_threshold: f64,
    pub hub_policy: HubPolicy,
    pub hubs: Vec<GeneSymbol>,
    pub dropped: DroppedEdges,
}

/// Interaction network with metrics
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    /// Sorted by degree descending, then gene
    pub nodes: Vec<NodeMetrics>,
    /// Canonical edges, `gene_a < gene_b`, sorted
    pub edges: Vec<Interaction>,
    pub summary: NetworkSummary,
}

impl Network {
    pub fn hubs(&self) -> impl Iterator<Item = &NodeMetrics> {
        self.nodes.iter().filter(|n| n.is_hub)
    }

    pub fn node(&self, gene: &GeneSymbol) -> Option<&NodeMetrics> {
        self.nodes.iter().find(|n| &n.gene == gene)
    }
}

/// Genes that become network nodes for the configured scope
pub fn scope_genes(scope: NetworkScope, targets: &TargetSet, pathways: &PathwayFilter) -> BTreeSet<GeneSymbol> {
    match scope {
        NetworkScope::Overlap => pathways.overlap_genes(),
        NetworkScope::Targets => targets.genes().cloned().collect(),
        NetworkScope::Union => targets.genes().cloned().chain(pathways.union.iter().cloned()).collect(),
    }
}

fn canonical_edges(
    genes: &BTreeSet<GeneSymbol>,
    interactions: &[Interaction],
    threshold: f64,
) -> (BTreeMap<(GeneSymbol, GeneSymbol), f64>, DroppedEdges) {
    let mut edges: BTreeMap<(GeneSymbol, GeneSymbol), f64> = BTreeMap::new();
    let mut dropped = DroppedEdges::default();

    for interaction in interactions {
        let (a, b) = (&interaction.gene_a, &interaction.gene_b);
        if a == b {
            dropped.self_loops += 1;
            continue;
        }
        if !genes.contains(a) || !genes.contains(b) {
            dropped.unknown_endpoint += 1;
            continue;
        }
        if interaction.score < threshold {
            dropped.below_threshold += 1;
            continue;
        }

        let key = if a < b { (a.clone(), b.clone()) } else { (b.clone(), a.clone()) };
        match edges.get_mut(&key) {
            Some(score) => {
                dropped.duplicates += 1;
                if interaction.score > *score {
                    *score = interaction.score;
                }
            },
            None => {
                edges.insert(key, interaction.score);
            },
        }
    }

    (edges, dropped)
}

/// Hop distances from `source`, indexed by node; `None` for unreachable nodes
fn hop_distances(graph: &UnGraph<GeneSymbol, f64>, source: NodeIndex) -> Vec<Option<usize>> {
    let reached = petgraph::algo::dijkstra(graph, source, None, |_| 1usize);
    graph.node_indices().map(|i| reached.get(&i).copied()).collect()
}

/// Brandes betweenness, normalized as the fraction of node pairs whose
/// shortest paths pass through each node
fn betweenness(graph: &UnGraph<GeneSymbol, f64>) -> Vec<f64> {
    let n = graph.node_count();
    let mut centrality = vec![0.0; n];

    for s in graph.node_indices() {
        let mut stack = Vec::with_capacity(n);
        let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut sigma = vec![0.0f64; n];
        let mut dist: Vec<Option<usize>> = vec![None; n];
        sigma[s.index()] = 1.0;
        dist[s.index()] = Some(0);

        let mut queue = VecDeque::from([s]);
        while let Some(v) = queue.pop_front() {
            let vi = v.index();
            stack.push(vi);
            let dv = dist[vi].unwrap_or(0);
            for w in graph.neighbors(v) {
                let wi = w.index();
                if dist[wi].is_none() {
                    dist[wi] = Some(dv + 1);
                    queue.push_back(w);
                }
                if dist[wi] == Some(dv + 1) {
                    sigma[wi] += sigma[vi];
                    preds[wi].push(vi);
                }
            }
        }

        let mut delta = vec![0.0f64; n];
        while let Some(w) = stack.pop() {
            for &v in &preds[w] {
                delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
            }
            if w != s.index() {
                centrality[w] += delta[w];
            }
        }
    }

    // Each unordered pair was counted from both ends
    if n > 2 {
        let scale = 1.0 / ((n - 1) * (n - 2)) as f64;
        for value in &mut centrality {
            *value *= scale;
        }
    } else {
        centrality.iter_mut().for_each(|v| *v = 0.0);
    }
    centrality
}

/// Closeness scaled by the reachable fraction (Wasserman and Faust)
fn closeness(distances: &[Option<usize>], n: usize) -> f64 {
    let reachable: Vec<usize> = distances.iter().flatten().copied().collect();
    let total: usize = reachable.iter().sum();
    let r = reachable.len();
    if total == 0 || n < 2 {
        return 0.0;
    }
    let r1 = (r - 1) as f64;
    (r1 / total as f64) * (r1 / (n - 1) as f64)
}

fn select_hubs(nodes: &mut [NodeMetrics], policy: &HubPolicy) {
    match *policy {
        HubPolicy::TopN { n } => {
            // nodes are already ordered by degree desc, gene asc
            for node in nodes.iter_mut().filter(|m| m.degree > 0).take(n) {
                node.is_hub = true;
            }
        },
        HubPolicy::MinDegree { cutoff } => {
            for node in nodes.iter_mut() {
                node.is_hub = node.degree > cutoff;
            }
        },
    }
}

/// Build the network over `genes` from raw interactions.
///
/// Edges scoring below `threshold`, self-loops and edges leaving the gene
/// set are dropped. Repeated pairs keep their highest score. Every gene is a
/// node, including genes without edges.
pub fn build_network(
    genes: &BTreeSet<GeneSymbol>,
    interactions: &[Interaction],
    threshold: f64,
    hub_policy: &HubPolicy,
) -> Network {
    let (edge_map, dropped) = canonical_edges(genes, interactions, threshold);

    let mut graph: UnGraph<GeneSymbol, f64> = UnGraph::with_capacity(genes.len(), edge_map.len());
    let index: BTreeMap<&GeneSymbol, NodeIndex> = genes.iter().map(|g| (g, graph.add_node(g.clone()))).collect();
    for ((a, b), score) in &edge_map {
        if let (Some(&ia), Some(&ib)) = (index.get(a), index.get(b)) {
            graph.add_edge(ia, ib, *score);
        }
    }

    let n = graph.node_count();
    let between = betweenness(&graph);
    let mut diameter = 0;
    let mut path_total = 0;
    let mut nodes: Vec<NodeMetrics> = graph
        .node_indices()
        .map(|i| {
            let distances = hop_distances(&graph, i);
            diameter = diameter.max(distances.iter().flatten().copied().max().unwrap_or(0));
            path_total += distances.iter().flatten().sum::<usize>();
            let degree = graph.neighbors(i).count();
            NodeMetrics {
                gene: graph[i].clone(),
                degree,
                degree_centrality: if n > 1 { degree as f64 / (n - 1) as f64 } else { 0.0 },
                betweenness: between[i.index()],
                closeness: closeness(&distances, n),
                is_hub: false,
            }
        })
        .collect();

    nodes.sort_by(|a, b| b.degree.cmp(&a.degree).then_with(|| a.gene.cmp(&b.gene)));
    select_hubs(&mut nodes, hub_policy);

    let m = graph.edge_count();
    let components = petgraph::algo::connected_components(&graph);
    let summary = NetworkSummary {
        nodes: n,
        edges: m,
        isolated_nodes: nodes.iter().filter(|node| node.degree == 0).count(),
        average_degree: if n > 0 { 2.0 * m as f64 / n as f64 } else { 0.0 },
        density: if n > 1 { 2.0 * m as f64 / (n * (n - 1)) as f64 } else { 0.0 },
        connected_components: components,
        diameter: (n > 0 && components == 1).then_some(diameter),
        average_shortest_path: (n > 1 && components == 1).then(|| path_total as f64 / (n * (n - 1)) as f64),
        confidence_threshold: threshold,
        hub_policy: *hub_policy,
        hubs: nodes.iter().filter(|node| node.is_hub).map(|node| node.gene.clone()).collect(),
        dropped,
    };

    debug!(?dropped, "Edges discarded while building network");
    let edges = edge_map
        .into_iter()
        .map(|((gene_a, gene_b), score)| Interaction { gene_a, gene_b, score })
        .collect();

    Network { nodes, edges, summary }
}

/// Fetch interactions for `genes`, build the network and write the tables
pub async fn run(
    source: &dyn InteractionSource,
    genes: &BTreeSet<GeneSymbol>,
    config: &NetworkConfig,
    run_dir: &Path,
) -> Result<StageOutcome<Network>> {
    if genes.is_empty() {
        return Err(NetpharmError::not_found(format!(
            "no genes in the {:?} network scope",
            config.scope
        ))
        .into());
    }

    let query: Vec<GeneSymbol> = genes.iter().cloned().collect();
    let interactions = source.interactions(&query, config.confidence).await?;
    info!(genes = query.len(), interactions = interactions.len(), "Interactions retrieved");

    let network = build_network(genes, &interactions, config.confidence, &config.hubs);

    let dir = stage_dir(run_dir, Stage::Network)?;
    let interactions_path = dir.join(INTERACTIONS_CSV);
    let metrics_path = dir.join(METRICS_CSV);
    let summary_path = dir.join(SUMMARY_JSON);
    write_csv(&interactions_path, &network.edges)?;
    write_csv(&metrics_path, &network.nodes)?;
    write_json(&summary_path, &network.summary)?;

    info!(
        nodes = network.summary.nodes,
        edges = network.summary.edges,
        hubs = network.summary.hubs.len(),
        policy = %config.hubs,
        "Network built"
    );
    Ok(StageOutcome::Done {
        output: network,
        artifacts: vec![interactions_path, metrics_path, summary_path],
    })
}

/// Reload the network from a previous run
pub fn load(run_dir: &Path) -> Result<Network> {
    let dir = run_dir.join(Stage::Network.dir_name());
    Ok(Network {
        edges: read_csv(&dir.join(INTERACTIONS_CSV))?,
        nodes: read_csv(&dir.join(METRICS_CSV))?,
        summary: read_json(&dir.join(SUMMARY_JSON))?,
    })
}

//! Interactive network page (vis-network)

use super::{HUB_HEX, OTHER_HEX};
use crate::stages::network::Network;
use serde_json::{json, Value};

const VIS_NETWORK_JS: &str = "https://unpkg.com/vis-network@9.1.9/standalone/umd/vis-network.min.js";

fn nodes_json(network: &Network) -> Value {
    Value::Array(
        network
            .nodes
            .iter()
            .map(|node| {
                json!({
                    "id": node.gene.as_str(),
                    "label": node.gene.as_str(),
                    "value": node.degree,
                    "color": if node.is_hub { HUB_HEX } else { OTHER_HEX },
                    "title": format!(
                        "{}\nDegree: {}\nBetweenness: {:.4}{}",
                        node.gene,
                        node.degree,
                        node.betweenness,
                        if node.is_hub { "\nHub" } else { "" }
                    ),
                })
            })
            .collect(),
    )
}

fn edges_json(network: &Network) -> Value {
    Value::Array(
        network
            .edges
            .iter()
            .map(|edge| {
                json!({
                    "from": edge.gene_a.as_str(),
                    "to": edge.gene_b.as_str(),
                    "value": edge.score,
                    "title": format!("score {:.3}", edge.score),
                })
            })
            .collect(),
    )
}

/// Keep embedded JSON from closing the surrounding script element
fn script_safe(value: &Value) -> String {
    value.to_string().replace("</", "<\\/")
}

/// Self-contained HTML page showing every node and edge
pub fn network_page(network: &Network, title: &str) -> String {
    format!(
        r##"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{js}"></script>
<style>
  body {{ font-family: sans-serif; margin: 0; }}
  h1 {{ font-size: 18px; margin: 12px 16px; }}
  #network {{ width: 100%; height: 750px; border-top: 1px solid #ddd; }}
</style>
</head>
<body>
<h1>{title}: {nodes} nodes, {edges} edges, {hubs} hubs</h1>
<div id="network"></div>
<script>
  const nodes = new vis.DataSet({nodes_json});
  const edges = new vis.DataSet({edges_json});
  const options = {{
    nodes: {{ shape: "dot", scaling: {{ min: 8, max: 40 }}, font: {{ size: 14 }} }},
    edges: {{ color: {{ color: "#999999", inherit: false }}, scaling: {{ min: 1, max: 4 }} }},
    physics: {{
      barnesHut: {{ gravitationalConstant: -8000, springLength: 95, springConstant: 0.04 }},
      stabilization: {{ iterations: 250 }}
    }},
    interaction: {{ hover: true, tooltipDelay: 100 }}
  }};
  new vis.Network(document.getElementById("network"), {{ nodes, edges }}, options);
</script>
</body>
</html>
"##,
        title = title,
        js = VIS_NETWORK_JS,
        nodes = network.summary.nodes,
        edges = network.summary.edges,
        hubs = network.summary.hubs.len(),
        nodes_json = script_safe(&nodes_json(network)),
        edges_json = script_safe(&edges_json(network)),
    )
}

//! Directed transfer entropy graphs.
//!
//! Pairwise TE values between labelled signals become a directed graph: one
//! node per label, one weighted edge per `(source, target, te)` record.
//! Edge width grows with the square of the TE value so strong flows stand
//! out. Graphs render to Graphviz DOT.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::Write;

/// Graph-level attributes applied to every rendered graph.
const GRAPH_ATTRIBUTES: [(&str, &str); 2] = [("dpi", "120"), ("rankdir", "LR")];

/// One measured flow from `labels[source]` to `labels[target]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TeEdge {
    pub source: usize,
    pub target: usize,
    pub te: f64,
}

impl From<(usize, usize, f64)> for TeEdge {
    fn from((source, target, te): (usize, usize, f64)) -> Self {
        Self { source, target, te }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub name: String,
    pub fillcolor: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub te: f64,
    /// TE rounded to four decimals.
    pub label: String,
    /// `1 + 10 * te^2`.
    pub penwidth: f64,
}

/// A directed simple graph of TE flows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TeGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
}

impl TeGraph {
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    /// Edges in first-insertion order of their endpoint pair.
    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn node(&self, name: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn edge(&self, source: &str, target: &str) -> Option<&GraphEdge> {
        self.edges
            .iter()
            .find(|e| e.source == source && e.target == target)
    }

    fn add_node(&mut self, name: &str, fillcolor: Option<String>) {
        match self.nodes.iter_mut().find(|n| n.name == name) {
            Some(node) => node.fillcolor = fillcolor,
            None => self.nodes.push(GraphNode {
                name: name.to_string(),
                fillcolor,
            }),
        }
    }

    /// Insert an edge, replacing any existing edge between the same ordered
    /// pair.
    fn add_edge(&mut self, source: &str, target: &str, te: f64) {
        let edge = GraphEdge {
            source: source.to_string(),
            target: target.to_string(),
            te,
            label: format_py_float(round_to(te, 4)),
            penwidth: 1.0 + 10.0 * te * te,
        };
        match self
            .edges
            .iter_mut()
            .find(|e| e.source == source && e.target == target)
        {
            Some(existing) => *existing = edge,
            None => self.edges.push(edge),
        }
    }

    /// Render as Graphviz DOT.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph {\n");
        let graph_attrs: Vec<String> = GRAPH_ATTRIBUTES
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        let _ = writeln!(out, "    graph [{}];", graph_attrs.join(", "));

        for node in &self.nodes {
            let _ = match &node.fillcolor {
                Some(color) => writeln!(
                    out,
                    "    {} [fillcolor={}, style=filled];",
                    quote(&node.name),
                    quote(color)
                ),
                None => writeln!(out, "    {} [style=filled];", quote(&node.name)),
            };
        }
        for edge in &self.edges {
            let _ = writeln!(
                out,
                "    {} -> {} [label={}, penwidth={}];",
                quote(&edge.source),
                quote(&edge.target),
                quote(&edge.label),
                quote(&format_py_float(edge.penwidth))
            );
        }
        out.push_str("}\n");
        out
    }

    /// Write [`Self::to_dot`] to `sink`.
    pub fn write_dot<W: Write>(&self, sink: &mut W) -> Result<()> {
        sink.write_all(self.to_dot().as_bytes())?;
        sink.flush()?;
        Ok(())
    }
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Round to `decimals` places from the exact binary value, so `0.12345`
/// (stored just above the tie) becomes `0.1235`.
fn round_to(value: f64, decimals: usize) -> f64 {
    if !value.is_finite() {
        return value;
    }
    format!("{:.*}", decimals, value).parse().unwrap_or(value)
}

/// Shortest round-trip decimal form, with `.0` kept on integral values
/// (`0.5` -> `"0.5"`, `1` -> `"1.0"`).
fn format_py_float(value: f64) -> String {
    let text = format!("{}", value);
    if value.is_finite() && !text.contains('.') {
        format!("{}.0", text)
    } else {
        text
    }
}

/// Build the TE graph for `edges` between `labels`.
///
/// # Arguments
/// * `edges` - Flow records indexing into `labels`; a later record for the
///   same ordered pair replaces an earlier one
/// * `labels` - Node names
/// * `colors` - Optional fill colour per label; every label must have one
pub fn build_te_graph(
    edges: &[TeEdge],
    labels: &[String],
    colors: Option<&HashMap<String, String>>,
) -> Result<TeGraph> {
    let mut graph = TeGraph::default();
    for label in labels {
        let fillcolor = match colors {
            Some(map) => Some(
                map.get(label)
                    .cloned()
                    .ok_or_else(|| Error::MissingColor(label.clone()))?,
            ),
            None => None,
        };
        graph.add_node(label, fillcolor);
    }

    let name = |index: usize| {
        labels.get(index).ok_or(Error::EdgeIndex {
            index,
            labels: labels.len(),
        })
    };
    for edge in edges {
        graph.add_edge(name(edge.source)?, name(edge.target)?, edge.te);
    }
    Ok(graph)
}

/// Build the TE graph and render it as DOT to `sink`.
pub fn graph_te<W: Write>(
    edges: &[TeEdge],
    labels: &[String],
    colors: Option<&HashMap<String, String>>,
    sink: &mut W,
) -> Result<TeGraph> {
    let graph = build_te_graph(edges, labels, colors)?;
    graph.write_dot(sink)?;
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_single_edge_attributes() {
        let graph = build_te_graph(&[(0, 1, 0.5).into()], &labels(&["A", "B"]), None).unwrap();
        assert_eq!(graph.nodes().len(), 2);
        let edge = graph.edge("A", "B").unwrap();
        assert_eq!(edge.label, "0.5");
        assert!((edge.penwidth - 3.5).abs() < 1e-12);
        assert!(graph.edge("B", "A").is_none());
    }

    #[test]
    fn test_label_rounding() {
        let names = labels(&["A", "B", "C"]);
        let edges: Vec<TeEdge> = vec![
            (0, 1, 0.123456).into(),
            (1, 2, 1.0).into(),
            (2, 0, 0.0).into(),
        ];
        let graph = build_te_graph(&edges, &names, None).unwrap();
        assert_eq!(graph.edge("A", "B").unwrap().label, "0.1235");
        assert_eq!(graph.edge("B", "C").unwrap().label, "1.0");
        assert_eq!(graph.edge("C", "A").unwrap().label, "0.0");
        assert!((graph.edge("C", "A").unwrap().penwidth - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_duplicate_pair_replaced() {
        let edges: Vec<TeEdge> = vec![(0, 1, 0.2).into(), (0, 1, 0.3).into()];
        let graph = build_te_graph(&edges, &labels(&["A", "B"]), None).unwrap();
        assert_eq!(graph.edges().len(), 1);
        assert_eq!(graph.edge("A", "B").unwrap().label, "0.3");
    }

    #[test]
    fn test_colors_applied() {
        let mut colors = HashMap::new();
        colors.insert("A".to_string(), "lightblue".to_string());
        colors.insert("B".to_string(), "salmon".to_string());
        let graph = build_te_graph(&[], &labels(&["A", "B"]), Some(&colors)).unwrap();
        assert_eq!(graph.node("B").unwrap().fillcolor.as_deref(), Some("salmon"));
        assert!(graph.edges().is_empty());
    }

    #[test]
    fn test_missing_color() {
        let mut colors = HashMap::new();
        colors.insert("A".to_string(), "red".to_string());
        let result = build_te_graph(&[], &labels(&["A", "B"]), Some(&colors));
        assert!(matches!(result, Err(Error::MissingColor(name)) if name == "B"));
    }

    #[test]
    fn test_edge_index_out_of_range() {
        let result = build_te_graph(&[(0, 2, 0.1).into()], &labels(&["A", "B"]), None);
        assert!(matches!(
            result,
            Err(Error::EdgeIndex {
                index: 2,
                labels: 2
            })
        ));
    }

    #[test]
    fn test_dot_rendering() {
        let mut sink = Vec::new();
        let graph = graph_te(&[(0, 1, 0.5).into()], &labels(&["A", "B"]), None, &mut sink).unwrap();
        let dot = String::from_utf8(sink).unwrap();
        assert_eq!(dot, graph.to_dot());
        assert!(dot.starts_with("digraph {\n"));
        assert!(dot.contains("graph [dpi=120, rankdir=LR];"));
        assert!(dot.contains("\"A\" [style=filled];"));
        assert!(dot.contains("\"A\" -> \"B\" [label=\"0.5\", penwidth=\"3.5\"];"));
    }

    #[test]
    fn test_dot_quotes_names() {
        let graph = build_te_graph(&[], &labels(&["say \"hi\""]), None).unwrap();
        assert!(graph.to_dot().contains("\"say \\\"hi\\\"\" [style=filled];"));
    }

    #[test]
    fn test_format_py_float() {
        assert_eq!(format_py_float(0.5), "0.5");
        assert_eq!(format_py_float(2.0), "2.0");
        assert_eq!(format_py_float(-0.0), "-0.0");
        assert_eq!(format_py_float(1.0 + 10.0 * 0.1 * 0.1), "1.1");
    }

    #[test]
    fn test_round_to_uses_exact_value() {
        // scaling by 1e4 first would land these just below the tie
        assert_eq!(round_to(0.12345, 4), 0.1235);
        assert_eq!(round_to(2.67505, 4), 2.6751);
        assert_eq!(round_to(0.10005, 4), 0.1001);
        // stored just below the tie
        assert_eq!(round_to(0.00015, 4), 0.0001);
        assert_eq!(round_to(0.30005, 4), 0.3);
        assert!(round_to(f64::NAN, 4).is_nan());

        let graph = build_te_graph(&[(0, 1, 0.12345).into()], &labels(&["A", "B"]), None).unwrap();
        assert_eq!(graph.edge("A", "B").unwrap().label, "0.1235");
    }
}

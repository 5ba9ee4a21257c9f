//! Example 03: TE Graph
//!
//! Computes pairwise transfer entropy between three signals in a chain
//! `a -> b -> c` and renders the flows as a Graphviz DOT graph on stdout.
//!
//! Pipe the output into `dot -Tpng > te.png` to draw it.

use infoflow::simulation::white_noise;
use infoflow::{compute_te, graph_te, Engine, EngineConfig, TeEdge, TeOptions};
use std::collections::HashMap;
use tracing_subscriber::EnvFilter;

/// `a` is noise, `b` follows `a` with one step of lag, `c` follows `b`.
fn chain(n: usize) -> Vec<Vec<f64>> {
    let a = white_noise(n, 1.0, 1);
    let eb = white_noise(n, 0.5, 2);
    let ec = white_noise(n, 0.5, 3);
    let mut b = vec![0.0; n];
    let mut c = vec![0.0; n];
    for t in 1..n {
        b[t] = 0.8 * a[t - 1] + eb[t];
        c[t] = 0.8 * b[t - 1] + ec[t];
    }
    vec![a, b, c]
}

fn main() -> infoflow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let engine = Engine::start(EngineConfig::default())?;
    let signals = chain(1000);
    let labels: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
    let options = TeOptions {
        k_history: 1,
        l_history: 1,
        auto_embed: false,
        status: false,
        ..TeOptions::default()
    };

    let mut edges = Vec::new();
    for i in 0..signals.len() {
        for j in i + 1..signals.len() {
            let results = compute_te(&engine, &signals[i], &signals[j], &options)?;
            edges.push(TeEdge {
                source: i,
                target: j,
                te: results.x_to_y[0].max(0.0),
            });
            edges.push(TeEdge {
                source: j,
                target: i,
                te: results.y_to_x[0].max(0.0),
            });
        }
    }

    let colors: HashMap<String, String> = [("a", "lightblue"), ("b", "palegreen"), ("c", "salmon")]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    let stdout = std::io::stdout();
    let mut sink = stdout.lock();
    let graph = graph_te(&edges, &labels, Some(&colors), &mut sink)?;

    eprintln!("{} nodes, {} edges", graph.nodes().len(), graph.edges().len());
    Ok(())
}

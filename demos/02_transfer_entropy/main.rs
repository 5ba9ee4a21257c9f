//! Example 02: Transfer Entropy
//!
//! Estimates transfer entropy in both directions between a driving signal
//! and a lagged copy, for fixed and automatically searched embeddings, with a
//! surrogate null distribution.
//!
//! The engine settings are read from `$JIDT_PATH/infodynamics.json` when that
//! variable is set, otherwise defaults are used.

use infoflow::simulation::{coupled_ar_pair, lagged_sine_pair};
use infoflow::{compute_te, Engine, EngineConfig, TeOptions, ENGINE_PATH_ENV};
use tracing_subscriber::EnvFilter;

fn main() -> infoflow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Example 02: Transfer Entropy ===\n");

    let engine = if std::env::var_os(ENGINE_PATH_ENV).is_some() {
        Engine::locate(None)?
    } else {
        Engine::start(EngineConfig::default())?
    };
    println!("engine ready with {} workers\n", engine.workers());

    // --- Section 1: fixed embedding, several neighbour counts ---
    println!("--- Lagged sine, k = l = 1 ---");
    let (x, y) = lagged_sine_pair(2000, 1, 0.5, 3);
    let fixed = TeOptions {
        k_history: 1,
        l_history: 1,
        knns: vec![4, 8, 16],
        auto_embed: false,
        ..TeOptions::default()
    };
    let results = compute_te(&engine, &x, &y, &fixed)?;
    for (i, knn) in results.knns.iter().enumerate() {
        println!(
            "  knn={knn:>2}: X->Y {:.4}  Y->X {:.4}",
            results.x_to_y[i], results.y_to_x[i]
        );
    }

    // --- Section 2: significance ---
    println!("\n--- Coupled AR with 50 surrogates ---");
    let (x, y) = coupled_ar_pair(1000, 0.5, 4);
    let tested = TeOptions {
        k_history: 1,
        l_history: 1,
        num_surrogates: 50,
        auto_embed: false,
        ..TeOptions::default()
    };
    let results = compute_te(&engine, &x, &y, &tested)?;
    if let Some(sig) = &results.significance {
        println!(
            "  p-values: X->Y {:.2}, Y->X {:.2}",
            sig.x_to_y_p_value[0], sig.y_to_x_p_value[0]
        );
    }

    // --- Section 3: automatic embedding ---
    println!("\n--- Coupled AR, Ragwitz embedding ---");
    let results = compute_te(&engine, &x, &y, &TeOptions::default())?;
    if let Some(embeddings) = &results.embeddings {
        for (forward, backward) in embeddings {
            println!("  X->Y used {forward:?}");
            println!("  Y->X used {backward:?}");
        }
    }

    println!("\n=== Done ===");
    Ok(())
}

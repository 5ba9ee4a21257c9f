//! Example 01: Band Extraction
//!
//! Splits a synthetic recording into frequency bands with zero-phase
//! Butterworth filters, with and without decimation, and reports how much of
//! each band's amplitude survives normalisation.
//!
//! Run with `RUST_LOG=debug` to see the decimation log events.

use infoflow::helpers::max_abs;
use infoflow::simulation::sine_mixture;
use infoflow::{extract_freqs, filt, Band, ExtractOptions};
use tracing_subscriber::EnvFilter;

fn print_signal_summary(label: &str, values: &[f64]) {
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    println!("  {label}: n={}, min={min:.4}, max={max:.4}", values.len());
}

fn main() -> infoflow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Example 01: Band Extraction ===\n");

    let fs = 250.0;
    let raw = sine_mixture(5000, fs, &[(2.0, 2.0), (10.0, 1.0), (40.0, 0.3)], 0.2, 1);
    print_signal_summary("raw", &raw);

    // --- Section 1: single band-pass ---
    println!("\n--- Single Band ---");
    let alpha = filt(&raw, 8.0, 12.0, fs, 3)?;
    print_signal_summary("8-12 Hz", &alpha);
    println!("  peak amplitude {:.3} (component amplitude 1.0)", max_abs(&alpha));

    // --- Section 2: several bands, normalised ---
    println!("\n--- Normalised Bands ---");
    let bands = [Band::new(1.0, 4.0), Band::new(8.0, 12.0), Band::new(30.0, 50.0)];
    let extracted = extract_freqs(&raw, &bands, fs, &ExtractOptions::default())?;
    for ((band, signal), peak) in bands.iter().zip(&extracted.signals).zip(&extracted.peaks) {
        println!(
            "  {:>4.1}-{:<4.1} Hz: peak before normalising {:.3}, after {:.3}",
            band.low,
            band.high,
            peak,
            max_abs(signal)
        );
    }

    // --- Section 3: decimation ---
    println!("\n--- Decimated by 4 ---");
    let options = ExtractOptions {
        decimation: 4,
        ..ExtractOptions::default()
    };
    let low_bands = [Band::new(1.0, 4.0), Band::new(8.0, 12.0)];
    let decimated = extract_freqs(&raw, &low_bands, fs, &options)?;
    for (band, signal) in low_bands.iter().zip(&decimated.signals) {
        print_signal_summary(&format!("{}-{} Hz @ {} Hz", band.low, band.high, fs / 4.0), signal);
    }

    // 50 Hz is above the decimated Nyquist frequency of 31.25 Hz
    match extract_freqs(&raw, &[Band::new(30.0, 50.0)], fs, &options) {
        Ok(_) => println!("  unexpected success"),
        Err(e) => println!("  30-50 Hz after decimation: {e}"),
    }

    println!("\n=== Done ===");
    Ok(())
}

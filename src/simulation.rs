//! Synthetic series for exercising the estimator and the filters.
//!
//! All generators are seeded so that tests, benchmarks and demos are
//! reproducible.
//!
//! - **White noise**: i.i.d. Gaussian samples
//! - **Lagged sine pair**: a noisy sine `x` and a delayed copy `y`, so that
//!   information flows from `x` to `y`
//! - **Coupled AR pair**: two first-order autoregressive processes where `x`
//!   drives `y` with a one-step lag
//! - **Sine mixture**: a sum of sinusoids sampled at a given rate

use rand::prelude::*;
use rand_distr::Normal;
use std::f64::consts::PI;

fn normal(sd: f64) -> Normal<f64> {
    Normal::new(0.0, sd.max(0.0)).unwrap()
}

/// Gaussian white noise with standard deviation `sd`.
pub fn white_noise(n: usize, sd: f64, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let dist = normal(sd);
    (0..n).map(|_| dist.sample(&mut rng)).collect()
}

/// Noisy sine `x` and its copy `y` delayed by `lag` samples.
///
/// ```text
/// x[t] = sin(2πt / 50) + noise_sd * ε_t
/// y[t] = x[t - lag] + 0.1 * noise_sd * η_t
/// ```
///
/// The first `lag` values of `y` are pure noise.
pub fn lagged_sine_pair(n: usize, lag: usize, noise_sd: f64, seed: u64) -> (Vec<f64>, Vec<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let source_noise = normal(noise_sd);
    let dest_noise = normal(0.1 * noise_sd);

    let x: Vec<f64> = (0..n)
        .map(|t| (2.0 * PI * t as f64 / 50.0).sin() + source_noise.sample(&mut rng))
        .collect();
    let y: Vec<f64> = (0..n)
        .map(|t| {
            let carried = if t >= lag { x[t - lag] } else { 0.0 };
            carried + dest_noise.sample(&mut rng)
        })
        .collect();
    (x, y)
}

/// Two AR(1) processes with unidirectional coupling `x -> y`.
///
/// ```text
/// x[t] = 0.5 x[t-1] + ε_t
/// y[t] = 0.5 y[t-1] + coupling * x[t-1] + η_t
/// ```
pub fn coupled_ar_pair(n: usize, coupling: f64, seed: u64) -> (Vec<f64>, Vec<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let dist = normal(1.0);
    let mut x = vec![0.0; n];
    let mut y = vec![0.0; n];
    for t in 0..n {
        let (x_prev, y_prev) = if t > 0 { (x[t - 1], y[t - 1]) } else { (0.0, 0.0) };
        x[t] = 0.5 * x_prev + dist.sample(&mut rng);
        y[t] = 0.5 * y_prev + coupling * x_prev + dist.sample(&mut rng);
    }
    (x, y)
}

/// Sum of sinusoids `(frequency Hz, amplitude)` sampled at `sample_rate`,
/// plus Gaussian noise.
pub fn sine_mixture(
    n: usize,
    sample_rate: f64,
    components: &[(f64, f64)],
    noise_sd: f64,
    seed: u64,
) -> Vec<f64> {
    let noise = white_noise(n, noise_sd, seed);
    (0..n)
        .map(|i| {
            let t = i as f64 / sample_rate;
            components
                .iter()
                .map(|&(freq, amp)| amp * (2.0 * PI * freq * t).sin())
                .sum::<f64>()
                + noise[i]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::{mean, sample_std};

    #[test]
    fn test_white_noise_moments() {
        let v = white_noise(5000, 2.0, 1);
        assert_eq!(v.len(), 5000);
        assert!(mean(&v).abs() < 0.1);
        assert!((sample_std(&v) - 2.0).abs() < 0.1);
    }

    #[test]
    fn test_seed_reproducibility() {
        assert_eq!(white_noise(10, 1.0, 3), white_noise(10, 1.0, 3));
        assert_ne!(white_noise(10, 1.0, 3), white_noise(10, 1.0, 4));
    }

    #[test]
    fn test_lagged_pair_structure() {
        let (x, y) = lagged_sine_pair(200, 1, 0.0, 9);
        for t in 1..200 {
            assert!((y[t] - x[t - 1]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_coupled_ar_lengths() {
        let (x, y) = coupled_ar_pair(50, 0.8, 2);
        assert_eq!(x.len(), 50);
        assert_eq!(y.len(), 50);
    }

    #[test]
    fn test_sine_mixture_noiseless() {
        let s = sine_mixture(100, 100.0, &[(5.0, 2.0)], 0.0, 0);
        // quarter period of 5 Hz at 100 Hz is 5 samples
        assert!((s[5] - 2.0).abs() < 1e-12);
        assert!(s[0].abs() < 1e-12);
    }
}

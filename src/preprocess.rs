//! Band-limited signal preparation.
//!
//! Raw recordings are split into frequency bands before transfer entropy is
//! estimated between them:
//!
//! - [`filt`]: zero-phase Butterworth band-pass in Hz
//! - [`decimate`]: anti-aliased downsampling by an integer factor
//! - [`extract_freqs`]: optional decimation, then one filtered (and
//!   optionally peak-normalised) signal per band

use crate::error::{Error, Result};
use crate::filtfilt::filtfilt;
use crate::helpers::max_abs;
use crate::iir::{butter, cheby1, FilterBand};
use crate::iter_maybe_parallel;
#[cfg(feature = "parallel")]
use rayon::iter::ParallelIterator;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Chebyshev I design used as the decimation anti-aliasing filter.
const DECIMATE_ORDER: usize = 8;
const DECIMATE_RIPPLE_DB: f64 = 0.05;

/// A frequency band `[low, high]` in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub low: f64,
    pub high: f64,
}

impl Band {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }
}

impl From<(f64, f64)> for Band {
    fn from((low, high): (f64, f64)) -> Self {
        Self { low, high }
    }
}

/// Options for [`extract_freqs`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Divide each band signal by its peak absolute value.
    pub normalize: bool,
    /// Butterworth prototype order of the band filters.
    pub order: usize,
    /// Decimation factor applied before filtering; 1 disables it.
    pub decimation: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            normalize: true,
            order: 3,
            decimation: 1,
        }
    }
}

/// Per-band signals and their peak absolute values before normalisation,
/// both in band order.
#[derive(Debug, Clone, PartialEq)]
pub struct BandExtraction {
    pub signals: Vec<Vec<f64>>,
    pub peaks: Vec<f64>,
}

/// Zero-phase Butterworth band-pass of `signal` sampled at `sample_rate` Hz.
///
/// # Arguments
/// * `signal` - Input samples (at least one)
/// * `low`, `high` - Band edges in Hz, `0 < low < high < sample_rate / 2`
/// * `sample_rate` - Sampling frequency in Hz
/// * `order` - Prototype order; the band-pass has twice as many poles
///
/// # Returns
/// Filtered signal of the same length as `signal`.
pub fn filt(signal: &[f64], low: f64, high: f64, sample_rate: f64, order: usize) -> Result<Vec<f64>> {
    let nyquist = 0.5 * sample_rate;
    let valid = nyquist > 0.0 && low > 0.0 && low < high && high < nyquist;
    if !valid {
        return Err(Error::InvalidBand { low, high, nyquist });
    }
    let tf = butter(order, FilterBand::Bandpass(low / nyquist, high / nyquist))?;
    filtfilt(&tf, signal)
}

/// Downsample by `factor` after a zero-phase order-8 Chebyshev I low-pass
/// at `0.8 / factor` of Nyquist.
///
/// Keeps samples `0, factor, 2 * factor, ...`, so the output has
/// `ceil(len / factor)` samples. A factor of 1 returns the input unchanged.
pub fn decimate(signal: &[f64], factor: usize) -> Result<Vec<f64>> {
    if factor == 0 {
        return Err(Error::invalid("factor", "must be at least 1"));
    }
    if factor == 1 {
        return Ok(signal.to_vec());
    }
    let tf = cheby1(
        DECIMATE_ORDER,
        DECIMATE_RIPPLE_DB,
        FilterBand::Lowpass(0.8 / factor as f64),
    )?;
    let smoothed = filtfilt(&tf, signal)?;
    Ok(smoothed.into_iter().step_by(factor).collect())
}

/// Split `signal` into the given frequency bands.
///
/// With `decimation > 1` the signal is decimated first and the band filters
/// are designed for the reduced sample rate. Each band's peak absolute value
/// is recorded before normalisation. A band that filters to all zeros cannot
/// be normalised; its samples become non-finite.
pub fn extract_freqs(
    signal: &[f64],
    bands: &[Band],
    sample_rate: f64,
    options: &ExtractOptions,
) -> Result<BandExtraction> {
    let (signal, sample_rate) = if options.decimation > 1 {
        let reduced = decimate(signal, options.decimation)?;
        debug!(
            factor = options.decimation,
            samples = reduced.len(),
            "decimated before band extraction"
        );
        (reduced, sample_rate / options.decimation as f64)
    } else {
        (signal.to_vec(), sample_rate)
    };

    let filtered: Vec<Result<Vec<f64>>> = iter_maybe_parallel!(0..bands.len())
        .map(|i| filt(&signal, bands[i].low, bands[i].high, sample_rate, options.order))
        .collect();

    let mut signals = Vec::with_capacity(bands.len());
    let mut peaks = Vec::with_capacity(bands.len());
    for (band, result) in bands.iter().zip(filtered) {
        let mut band_signal = result?;
        let peak = max_abs(&band_signal);
        if options.normalize {
            if peak == 0.0 {
                warn!(low = band.low, high = band.high, "band is all zeros, normalising to NaN");
            }
            band_signal.iter_mut().for_each(|v| *v /= peak);
        }
        signals.push(band_signal);
        peaks.push(peak);
    }
    Ok(BandExtraction { signals, peaks })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::sine_mixture;
    use rustfft::{num_complex::Complex, FftPlanner};

    /// Fraction of spectral energy within `[low, high]` Hz.
    fn band_energy_fraction(signal: &[f64], sample_rate: f64, low: f64, high: f64) -> f64 {
        let n = signal.len();
        let mut buffer: Vec<Complex<f64>> = signal.iter().map(|&v| Complex::new(v, 0.0)).collect();
        FftPlanner::<f64>::new().plan_fft_forward(n).process(&mut buffer);

        let mut inside = 0.0;
        let mut total = 0.0;
        for (k, c) in buffer.iter().enumerate().take(n / 2 + 1) {
            let freq = k as f64 * sample_rate / n as f64;
            let power = c.norm_sqr();
            total += power;
            if freq >= low && freq <= high {
                inside += power;
            }
        }
        inside / total
    }

    #[test]
    fn test_filt_preserves_length() {
        let signal = sine_mixture(1000, 100.0, &[(3.0, 1.0), (20.0, 1.0)], 0.1, 1);
        let out = filt(&signal, 1.0, 5.0, 100.0, 3).unwrap();
        assert_eq!(out.len(), signal.len());
    }

    #[test]
    fn test_filt_isolates_band() {
        let fs = 200.0;
        let signal = sine_mixture(4000, fs, &[(5.0, 1.0), (40.0, 1.0)], 0.0, 0);
        assert!(band_energy_fraction(&signal, fs, 3.0, 7.0) < 0.6);

        let low = filt(&signal, 3.0, 7.0, fs, 3).unwrap();
        assert!(band_energy_fraction(&low, fs, 3.0, 7.0) > 0.99);

        let high = filt(&signal, 30.0, 50.0, fs, 3).unwrap();
        assert!(band_energy_fraction(&high, fs, 30.0, 50.0) > 0.99);
    }

    #[test]
    fn test_filt_rejects_bad_band() {
        let signal = vec![0.0; 100];
        for (low, high) in [(0.0, 5.0), (5.0, 3.0), (10.0, 50.0), (10.0, 60.0)] {
            assert!(matches!(
                filt(&signal, low, high, 100.0, 3),
                Err(Error::InvalidBand { .. })
            ));
        }
    }

    #[test]
    fn test_decimate_length() {
        let signal = sine_mixture(1001, 100.0, &[(2.0, 1.0)], 0.0, 0);
        for factor in [1, 2, 3, 4, 10] {
            let out = decimate(&signal, factor).unwrap();
            assert_eq!(out.len(), signal.len().div_ceil(factor));
        }
        assert!(decimate(&signal, 0).is_err());
    }

    #[test]
    fn test_decimate_keeps_slow_component() {
        let fs = 100.0;
        let signal = sine_mixture(2000, fs, &[(1.0, 1.0)], 0.0, 0);
        let out = decimate(&signal, 4).unwrap();
        for (i, &v) in out.iter().enumerate().take(450).skip(50) {
            assert!((v - signal[4 * i]).abs() < 0.02);
        }
    }

    #[test]
    fn test_extract_freqs_normalised() {
        let fs = 100.0;
        let signal = sine_mixture(2000, fs, &[(2.0, 3.0), (15.0, 0.5)], 0.05, 4);
        let bands = [Band::new(1.0, 4.0), Band::new(12.0, 18.0)];
        let out = extract_freqs(&signal, &bands, fs, &ExtractOptions::default()).unwrap();

        assert_eq!(out.signals.len(), 2);
        assert_eq!(out.peaks.len(), 2);
        for s in &out.signals {
            assert_eq!(s.len(), signal.len());
            assert!((max_abs(s) - 1.0).abs() < 1e-12);
        }
        // peaks track the component amplitudes
        assert!((out.peaks[0] - 3.0).abs() < 0.5);
        assert!((out.peaks[1] - 0.5).abs() < 0.2);
    }

    #[test]
    fn test_extract_freqs_peaks_match_unnormalised() {
        let fs = 100.0;
        let signal = sine_mixture(1000, fs, &[(5.0, 2.0)], 0.1, 7);
        let bands = [Band::new(3.0, 8.0)];
        let raw = extract_freqs(
            &signal,
            &bands,
            fs,
            &ExtractOptions {
                normalize: false,
                ..ExtractOptions::default()
            },
        )
        .unwrap();
        let direct = filt(&signal, 3.0, 8.0, fs, 3).unwrap();
        assert_eq!(raw.signals[0], direct);
        assert_eq!(raw.peaks[0], max_abs(&direct));
    }

    #[test]
    fn test_extract_freqs_with_decimation() {
        let fs = 200.0;
        let signal = sine_mixture(2001, fs, &[(4.0, 1.0)], 0.05, 2);
        let options = ExtractOptions {
            decimation: 2,
            ..ExtractOptions::default()
        };
        // decimated rate is 100 Hz, Nyquist 50 Hz
        let out = extract_freqs(&signal, &[Band::new(2.0, 6.0), Band::new(30.0, 40.0)], fs, &options)
            .unwrap();
        assert_eq!(out.signals[0].len(), 1001);

        // 60 Hz exceeds the decimated Nyquist
        let err = extract_freqs(&signal, &[Band::new(50.0, 60.0)], fs, &options);
        assert!(matches!(err, Err(Error::InvalidBand { nyquist, .. }) if nyquist == 50.0));
    }

    #[test]
    fn test_extract_freqs_all_zero_band() {
        let bands = [Band::new(1.0, 4.0)];
        let out = extract_freqs(&[0.0; 200], &bands, 100.0, &ExtractOptions::default()).unwrap();
        assert_eq!(out.peaks[0], 0.0);
        assert!(out.signals[0].iter().all(|v| !v.is_finite()));
    }

    #[test]
    fn test_band_from_tuple() {
        assert_eq!(Band::from((1.0, 4.0)), Band::new(1.0, 4.0));
    }
}

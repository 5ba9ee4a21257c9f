//! IIR filter design.
//!
//! Filters are designed in zeros/poles/gain form: an analog low-pass
//! prototype with unit cutoff is frequency-transformed (low-pass or
//! band-pass), mapped to the z-plane with the bilinear transform and
//! expanded into transfer-function coefficients.
//!
//! Cutoff frequencies are normalised so that 1.0 is the Nyquist frequency.
//! Band edges are pre-warped, so the digital -3 dB points of a Butterworth
//! design land exactly on the requested cutoffs.

use crate::error::{Error, Result};
use num_complex::Complex64;
use std::f64::consts::PI;

/// Sampling frequency used internally for the bilinear transform.
const DESIGN_FS: f64 = 2.0;

/// Filter coefficients `b` (numerator) and `a` (denominator), highest power
/// of `z^-1` last, with `a[0] == 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferFunction {
    pub b: Vec<f64>,
    pub a: Vec<f64>,
}

impl TransferFunction {
    /// Filter order (number of poles).
    pub fn order(&self) -> usize {
        self.a.len().saturating_sub(1)
    }

    /// Complex response at normalised frequency `w` (1.0 = Nyquist).
    pub fn frequency_response(&self, w: f64) -> Complex64 {
        let z_inv = Complex64::from_polar(1.0, -PI * w);
        let eval = |coefs: &[f64]| {
            let mut acc = Complex64::new(0.0, 0.0);
            let mut zk = Complex64::new(1.0, 0.0);
            for &c in coefs {
                acc += zk * c;
                zk *= z_inv;
            }
            acc
        };
        eval(&self.b) / eval(&self.a)
    }

    /// Magnitude of [`Self::frequency_response`].
    pub fn gain(&self, w: f64) -> f64 {
        self.frequency_response(w).norm()
    }
}

/// Pass band of a design.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterBand {
    Lowpass(f64),
    Bandpass(f64, f64),
}

impl FilterBand {
    fn validate(&self) -> Result<()> {
        let in_range = |w: f64| w > 0.0 && w < 1.0;
        match *self {
            FilterBand::Lowpass(w) if !in_range(w) => {
                Err(Error::invalid("cutoff", format!("{} not in (0, 1)", w)))
            }
            FilterBand::Bandpass(lo, hi) if !(in_range(lo) && in_range(hi) && lo < hi) => Err(
                Error::invalid("cutoff", format!("[{}, {}] not an interval in (0, 1)", lo, hi)),
            ),
            _ => Ok(()),
        }
    }
}

/// Zeros, poles and gain.
#[derive(Debug, Clone)]
struct Zpk {
    zeros: Vec<Complex64>,
    poles: Vec<Complex64>,
    gain: f64,
}

impl Zpk {
    fn relative_degree(&self) -> usize {
        self.poles.len() - self.zeros.len()
    }
}

fn butter_prototype(order: usize) -> Zpk {
    let n = order as i64;
    let poles = (-n + 1..n)
        .step_by(2)
        .map(|m| -Complex64::from_polar(1.0, PI * m as f64 / (2.0 * order as f64)))
        .collect();
    Zpk {
        zeros: Vec::new(),
        poles,
        gain: 1.0,
    }
}

fn cheby1_prototype(order: usize, ripple_db: f64) -> Zpk {
    let eps = (10f64.powf(0.1 * ripple_db) - 1.0).sqrt();
    let mu = (1.0 / eps).asinh() / order as f64;
    let n = order as i64;
    let poles: Vec<Complex64> = (-n + 1..n)
        .step_by(2)
        .map(|m| {
            let theta = PI * m as f64 / (2.0 * order as f64);
            -Complex64::new(mu, theta).sinh()
        })
        .collect();
    let mut gain = poles.iter().map(|p| -p).product::<Complex64>().re;
    // even orders start at the bottom of the ripple at DC
    if order % 2 == 0 {
        gain /= (1.0 + eps * eps).sqrt();
    }
    Zpk {
        zeros: Vec::new(),
        poles,
        gain,
    }
}

fn lowpass_to_lowpass(proto: Zpk, wo: f64) -> Zpk {
    let degree = proto.relative_degree();
    Zpk {
        zeros: proto.zeros.iter().map(|z| z * wo).collect(),
        poles: proto.poles.iter().map(|p| p * wo).collect(),
        gain: proto.gain * wo.powi(degree as i32),
    }
}

fn lowpass_to_bandpass(proto: Zpk, wo: f64, bw: f64) -> Zpk {
    let degree = proto.relative_degree();
    let split = |roots: &[Complex64]| -> Vec<Complex64> {
        let scaled: Vec<Complex64> = roots.iter().map(|r| r * bw / 2.0).collect();
        let offset: Vec<Complex64> = scaled
            .iter()
            .map(|r| (r * r - wo * wo).sqrt())
            .collect();
        scaled
            .iter()
            .zip(&offset)
            .map(|(r, d)| r + d)
            .chain(scaled.iter().zip(&offset).map(|(r, d)| r - d))
            .collect()
    };
    let mut zeros = split(&proto.zeros);
    zeros.extend(std::iter::repeat(Complex64::new(0.0, 0.0)).take(degree));
    Zpk {
        zeros,
        poles: split(&proto.poles),
        gain: proto.gain * bw.powi(degree as i32),
    }
}

fn bilinear(analog: Zpk, fs: f64) -> Zpk {
    let fs2 = Complex64::new(2.0 * fs, 0.0);
    let degree = analog.relative_degree();
    let map = |r: &Complex64| (fs2 + r) / (fs2 - r);

    let mut zeros: Vec<Complex64> = analog.zeros.iter().map(map).collect();
    zeros.extend(std::iter::repeat(Complex64::new(-1.0, 0.0)).take(degree));
    let num: Complex64 = analog.zeros.iter().map(|z| fs2 - z).product();
    let den: Complex64 = analog.poles.iter().map(|p| fs2 - p).product();
    Zpk {
        zeros,
        poles: analog.poles.iter().map(map).collect(),
        gain: analog.gain * (num / den).re,
    }
}

/// Coefficients of the monic polynomial with the given roots, highest
/// power first.
fn poly(roots: &[Complex64]) -> Vec<Complex64> {
    let mut coefs = vec![Complex64::new(1.0, 0.0)];
    for r in roots {
        let mut next = coefs.clone();
        next.push(Complex64::new(0.0, 0.0));
        for (i, c) in coefs.iter().enumerate() {
            next[i + 1] -= c * r;
        }
        coefs = next;
    }
    coefs
}

fn zpk_to_tf(zpk: &Zpk) -> TransferFunction {
    let b = poly(&zpk.zeros).iter().map(|c| c.re * zpk.gain).collect();
    let a = poly(&zpk.poles).iter().map(|c| c.re).collect();
    TransferFunction { b, a }
}

fn prewarp(w: f64) -> f64 {
    2.0 * DESIGN_FS * (PI * w / DESIGN_FS).tan()
}

fn design(proto: Zpk, band: FilterBand) -> TransferFunction {
    let analog = match band {
        FilterBand::Lowpass(w) => lowpass_to_lowpass(proto, prewarp(w)),
        FilterBand::Bandpass(lo, hi) => {
            let (lo, hi) = (prewarp(lo), prewarp(hi));
            lowpass_to_bandpass(proto, (lo * hi).sqrt(), hi - lo)
        }
    };
    zpk_to_tf(&bilinear(analog, DESIGN_FS))
}

/// Digital Butterworth filter of the given prototype `order`.
///
/// A band-pass design has `2 * order` poles.
pub fn butter(order: usize, band: FilterBand) -> Result<TransferFunction> {
    if order == 0 {
        return Err(Error::invalid("order", "must be positive"));
    }
    band.validate()?;
    Ok(design(butter_prototype(order), band))
}

/// Digital Chebyshev type I filter with `ripple_db` of pass-band ripple.
pub fn cheby1(order: usize, ripple_db: f64, band: FilterBand) -> Result<TransferFunction> {
    if order == 0 {
        return Err(Error::invalid("order", "must be positive"));
    }
    if !ripple_db.is_finite() || ripple_db <= 0.0 {
        return Err(Error::invalid("ripple_db", format!("{} must be positive", ripple_db)));
    }
    band.validate()?;
    Ok(design(cheby1_prototype(order, ripple_db), band))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_1_SQRT_2;

    fn assert_close(actual: &[f64], expected: &[f64], tol: f64) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < tol, "{:?} vs {:?}", actual, expected);
        }
    }

    #[test]
    fn test_butter_lowpass_half_band() {
        // classic second-order half-band design
        let tf = butter(2, FilterBand::Lowpass(0.5)).unwrap();
        assert_close(&tf.b, &[0.2928932188134524, 0.5857864376269049, 0.2928932188134524], 1e-12);
        assert_close(&tf.a, &[1.0, 0.0, 0.1715728752538099], 1e-12);
    }

    #[test]
    fn test_butter_bandpass_first_order() {
        let tf = butter(1, FilterBand::Bandpass(0.2, 0.4)).unwrap();
        let g = 0.24523727525278563;
        assert_close(&tf.b, &[g, 0.0, -g], 1e-12);
        assert_close(&tf.a, &[1.0, -0.9329380346705198, 0.5095254494944288], 1e-12);
    }

    #[test]
    fn test_butter_bandpass_response() {
        let (lo, hi) = (0.1, 0.3);
        let tf = butter(3, FilterBand::Bandpass(lo, hi)).unwrap();
        assert_eq!(tf.order(), 6);
        assert!((tf.gain(lo) - FRAC_1_SQRT_2).abs() < 1e-9);
        assert!((tf.gain(hi) - FRAC_1_SQRT_2).abs() < 1e-9);

        // digital image of the analog centre frequency
        let wo = (prewarp(lo) * prewarp(hi)).sqrt();
        let centre = 2.0 / PI * (wo / (2.0 * DESIGN_FS)).atan();
        assert!((tf.gain(centre) - 1.0).abs() < 1e-9);

        assert!(tf.gain(0.0) < 1e-9);
        assert!(tf.gain(0.999) < 1e-3);
        assert!(tf.gain(0.02) < 0.01);
    }

    #[test]
    fn test_cheby1_lowpass_response() {
        let ripple = 0.05;
        let tf = cheby1(8, ripple, FilterBand::Lowpass(0.4)).unwrap();
        assert_eq!(tf.order(), 8);
        let floor = 10f64.powf(-ripple / 20.0);
        for &w in &[0.0, 0.1, 0.2, 0.3, 0.39] {
            let g = tf.gain(w);
            assert!(g > floor - 1e-6 && g < 1.0 + 1e-6, "gain {} at {}", g, w);
        }
        // even order: ripple minimum at DC
        assert!((tf.gain(0.0) - floor).abs() < 1e-6);
        assert!(tf.gain(0.9) < 1e-3);
    }

    #[test]
    fn test_cheby1_odd_order_unit_dc() {
        let tf = cheby1(3, 1.0, FilterBand::Lowpass(0.3)).unwrap();
        assert!((tf.gain(0.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_designs() {
        assert!(matches!(
            butter(0, FilterBand::Lowpass(0.5)),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(butter(2, FilterBand::Lowpass(1.0)).is_err());
        assert!(butter(2, FilterBand::Bandpass(0.3, 0.2)).is_err());
        assert!(butter(2, FilterBand::Bandpass(0.0, 0.2)).is_err());
        assert!(cheby1(4, 0.0, FilterBand::Lowpass(0.2)).is_err());
    }

    #[test]
    fn test_poly_expansion() {
        let roots = [Complex64::new(1.0, 0.0), Complex64::new(2.0, 0.0)];
        let c: Vec<f64> = poly(&roots).iter().map(|c| c.re).collect();
        assert_close(&c, &[1.0, -3.0, 2.0], 1e-12);
    }
}

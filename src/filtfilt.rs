//! Linear filtering and zero-phase forward-backward filtering.

use crate::error::{Error, Result};
use crate::iir::TransferFunction;
use nalgebra::{DMatrix, DVector};

/// Coefficients padded to a common length and normalised by `a[0]`.
fn normalised(tf: &TransferFunction) -> Result<(Vec<f64>, Vec<f64>)> {
    let a0 = tf.a.first().copied().unwrap_or(0.0);
    if a0 == 0.0 || tf.b.is_empty() {
        return Err(Error::invalid("a", "leading denominator coefficient must be non-zero"));
    }
    let n = tf.a.len().max(tf.b.len());
    let mut b: Vec<f64> = tf.b.iter().map(|&v| v / a0).collect();
    let mut a: Vec<f64> = tf.a.iter().map(|&v| v / a0).collect();
    b.resize(n, 0.0);
    a.resize(n, 0.0);
    Ok((b, a))
}

/// Run `x` through the filter in direct form II transposed.
///
/// `zi` is the initial delay-line state (length `max(len a, len b) - 1`),
/// zero when `None`. Returns the output and the final state.
pub fn lfilter(
    tf: &TransferFunction,
    x: &[f64],
    zi: Option<&[f64]>,
) -> Result<(Vec<f64>, Vec<f64>)> {
    let (b, a) = normalised(tf)?;
    let order = b.len() - 1;
    let mut z = match zi {
        Some(state) if state.len() != order => {
            return Err(Error::invalid(
                "zi",
                format!("expected {} initial conditions, got {}", order, state.len()),
            ))
        }
        Some(state) => state.to_vec(),
        None => vec![0.0; order],
    };

    let mut y = Vec::with_capacity(x.len());
    for &xv in x {
        let yv = b[0] * xv + z.first().copied().unwrap_or(0.0);
        for i in 0..order {
            let next = if i + 1 < order { z[i + 1] } else { 0.0 };
            z[i] = b[i + 1] * xv + next - a[i + 1] * yv;
        }
        y.push(yv);
    }
    Ok((y, z))
}

/// Initial state for which a unit step input produces the steady-state
/// output from the first sample.
pub fn lfilter_zi(tf: &TransferFunction) -> Result<Vec<f64>> {
    let (b, a) = normalised(tf)?;
    let order = b.len() - 1;
    if order == 0 {
        return Ok(Vec::new());
    }

    // I - companion(a)^T
    let mut system = DMatrix::<f64>::identity(order, order);
    for i in 0..order {
        system[(i, 0)] += a[i + 1];
        if i + 1 < order {
            system[(i, i + 1)] -= 1.0;
        }
    }
    let rhs = DVector::from_iterator(order, (1..=order).map(|i| b[i] - a[i] * b[0]));

    system
        .lu()
        .solve(&rhs)
        .map(|zi| zi.iter().copied().collect())
        .ok_or_else(|| Error::invalid("a", "filter has a pole at z = 1"))
}

/// Odd extension of `x` by `pad` samples at each end.
fn odd_extend(x: &[f64], pad: usize) -> Vec<f64> {
    let n = x.len();
    let (first, last) = (x[0], x[n - 1]);
    let mut ext = Vec::with_capacity(n + 2 * pad);
    ext.extend((1..=pad).rev().map(|i| 2.0 * first - x[i]));
    ext.extend_from_slice(x);
    ext.extend((1..=pad).map(|i| 2.0 * last - x[n - 1 - i]));
    ext
}

/// Apply the filter forward then backward, cancelling its phase response.
///
/// The signal is padded by odd extension with `3 * max(len a, len b)`
/// samples per side (at most `len - 1`) and each pass starts from the
/// steady state for its first sample. Output length equals input length.
pub fn filtfilt(tf: &TransferFunction, x: &[f64]) -> Result<Vec<f64>> {
    let n = x.len();
    if n == 0 {
        return Err(Error::InsufficientData {
            required: 1,
            available: 0,
        });
    }
    let pad = (3 * tf.a.len().max(tf.b.len())).min(n - 1);
    let zi = lfilter_zi(tf)?;
    let ext = odd_extend(x, pad);

    let scaled = |s: f64| zi.iter().map(|&z| z * s).collect::<Vec<f64>>();
    let (forward, _) = lfilter(tf, &ext, Some(&scaled(ext[0])))?;

    let reversed: Vec<f64> = forward.into_iter().rev().collect();
    let (backward, _) = lfilter(tf, &reversed, Some(&scaled(reversed[0])))?;

    Ok(backward.into_iter().rev().skip(pad).take(n).collect())
}

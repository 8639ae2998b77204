use ndarray::{ArrayBase, Data, Dimension, IxDyn};

use crate::error::MetricsError;

/// Shape produced by adding arrays of shapes `a` and `b` elementwise,
/// aligning trailing axes and stretching length-1 axes
pub fn broadcast_shape(a: &[usize], b: &[usize]) -> Option<Vec<usize>> {
    let ndim = a.len().max(b.len());
    let mut shape = vec![0; ndim];
    for i in 0..ndim {
        let da = if i < ndim - a.len() { 1 } else { a[i - (ndim - a.len())] };
        let db = if i < ndim - b.len() { 1 } else { b[i - (ndim - b.len())] };
        shape[i] = match (da, db) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            _ => return None,
        };
    }
    Some(shape)
}

/// Root-mean-square of all elements, computed in `f64`.
///
/// Returns `NaN` for an empty array.
pub fn get_scale<S, D>(x: &ArrayBase<S, D>) -> f64
where
    S: Data,
    S::Elem: Copy + Into<f64>,
    D: Dimension,
{
    rms(|| x.iter().map(|&v| v.into()), x.len())
}

/// Root-mean-square of `x + bias`, broadcasting the two shapes against each other
pub fn get_scale_with_bias<S, D, T, E>(
    x: &ArrayBase<S, D>,
    bias: &ArrayBase<T, E>,
) -> Result<f64, MetricsError>
where
    S: Data,
    S::Elem: Copy + Into<f64>,
    D: Dimension,
    T: Data,
    T::Elem: Copy + Into<f64>,
    E: Dimension,
{
    let mismatch = || MetricsError::shape_mismatch(x.shape(), bias.shape());
    let shape = broadcast_shape(x.shape(), bias.shape()).ok_or_else(mismatch)?;
    let x = x.broadcast(IxDyn(&shape)).ok_or_else(mismatch)?;
    let bias = bias.broadcast(IxDyn(&shape)).ok_or_else(mismatch)?;

    let sum = || {
        x.iter().zip(bias.iter()).map(|(&v, &b)| {
            let (v, b): (f64, f64) = (v.into(), b.into());
            v + b
        })
    };
    Ok(rms(sum, x.len()))
}

/// RMS of the `len` values yielded by `values`, which is walked twice.
///
/// Values are divided by the largest magnitude before squaring so that
/// neither tiny nor huge inputs underflow to 0 or overflow to `inf`.
fn rms<F, I>(values: F, len: usize) -> f64
where
    F: Fn() -> I,
    I: Iterator<Item = f64>,
{
    if len == 0 {
        return f64::NAN;
    }
    let mut peak = 0.0f64;
    for v in values() {
        if v.is_nan() {
            return f64::NAN;
        }
        peak = peak.max(v.abs());
    }
    if peak == 0.0 || peak.is_infinite() {
        return peak;
    }
    let sum_sq: f64 = values()
        .map(|v| {
            let r = v / peak;
            r * r
        })
        .sum();
    peak * (sum_sq / len as f64).sqrt()
}

//! Shared numeric helpers used by every analyzer.
//!
//! Plain functions over `&[f64]`. Callers decide how to fault degenerate
//! inputs; these helpers return `None` where a value cannot be formed.

/// Values whose magnitude is below this are treated as zero denominators.
pub const ZERO_TOLERANCE: f64 = 1e-15;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample variance (divisor n-1).
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    Some(values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64)
}

/// Sample standard deviation (divisor n-1).
pub fn sample_std(values: &[f64]) -> Option<f64> {
    sample_variance(values).map(f64::sqrt)
}

/// Ascending copy with NaN-safe ordering.
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

/// Percentile `p` in [0, 100] of an ascending slice, linear interpolation
/// between closest ranks.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    if n == 1 {
        return Some(sorted[0]);
    }
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = rank - lo as f64;
    Some(sorted[lo] * (1.0 - frac) + sorted[hi] * frac)
}

/// Quantile `q` in [0, 1] of unsorted values.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    percentile_sorted(&sorted(values), q * 100.0)
}

/// Pearson correlation of two equal-length slices.
///
/// `None` when lengths differ, fewer than two points, or either side has
/// zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let mx = mean(x)?;
    let my = mean(y)?;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mx;
        let dy = b - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let denom = (sxx * syy).sqrt();
    if denom < ZERO_TOLERANCE {
        return None;
    }
    Some((sxy / denom).clamp(-1.0, 1.0))
}

/// Central moments m2, m3, m4 (population divisor n).
pub fn central_moments(values: &[f64]) -> Option<(f64, f64, f64)> {
    let m = mean(values)?;
    let n = values.len() as f64;
    let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
    for v in values {
        let d = v - m;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
    }
    Some((m2 / n, m3 / n, m4 / n))
}

/// Compounded return of a sequence of simple returns: `Π(1 + r) - 1`.
pub fn compound(returns: &[f64]) -> f64 {
    returns.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0
}

//! Feature-weighting collaborators: Chatterjee's xi correlation and Pearson
//! correlation, used to auto-derive per-feature sampling weights when
//! `feature_probs` is left at its `"xicor"` sentinel.

/// Chatterjee's rank correlation coefficient, symmetrised as
/// `max(xi(x, y), xi(y, x))` since the raw statistic is not symmetric and
/// the engine only wants a feature-relevance magnitude, not a sign or
/// direction.
pub fn xicor(x: &[f64], y: &[f64]) -> f64 {
    xi_directed(x, y).max(xi_directed(y, x))
}

fn xi_directed(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    if n < 2 {
        return 0.0;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| x[a].partial_cmp(&x[b]).unwrap());

    let rank = |value: f64| -> f64 { y.iter().filter(|&&v| v <= value).count() as f64 };

    let ranks: Vec<f64> = order.iter().map(|&i| rank(y[i])).collect();
    let l: Vec<f64> = order
        .iter()
        .map(|&i| y.iter().filter(|&&v| v >= y[i]).count() as f64)
        .collect();

    let numerator: f64 = ranks.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
    let denom: f64 = l.iter().map(|&li| li * (n as f64 - li)).sum();
    if denom <= 0.0 {
        return 0.0;
    }
    1.0 - (n as f64 * numerator) / (2.0 * denom)
}

pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    if x.len() < 2 {
        return 0.0;
    }
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for i in 0..x.len() {
        let dx = x[i] - mx;
        let dy = y[i] - my;
        cov += dx * dy;
        vx += dx * dx;
        vy += dy * dy;
    }
    if vx <= 0.0 || vy <= 0.0 {
        return 0.0;
    }
    cov / (vx.sqrt() * vy.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pearson_perfect_linear_relationship_is_one() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let y = vec![2.0, 4.0, 6.0, 8.0, 10.0];
        assert!((pearson(&x, &y) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn pearson_constant_series_is_zero() {
        let x = vec![1.0, 1.0, 1.0];
        let y = vec![1.0, 2.0, 3.0];
        assert_eq!(pearson(&x, &y), 0.0);
    }

    #[test]
    fn xicor_perfect_monotone_relationship_is_near_one() {
        let x: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let y = x.clone();
        assert!(xicor(&x, &y) > 0.9);
    }

    #[test]
    fn xicor_independent_noise_is_small() {
        // deterministic pseudo-noise, no external rng dependency in a test
        let x: Vec<f64> = (0..200).map(|i| i as f64).collect();
        let y: Vec<f64> = (0..200).map(|i| ((i * 2654435761u32 as usize) % 997) as f64).collect();
        assert!(xicor(&x, &y) < 0.5);
    }
}

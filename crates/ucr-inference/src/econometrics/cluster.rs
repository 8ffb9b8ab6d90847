//! Cluster-robust covariance of influence functions.
//!
//! For an estimator with per-unit influence functions `ψ_i` (one column per
//! parameter), `θ̂ − θ ≈ (1/N) Σ_i ψ_i`. With units nested in clusters the
//! covariance is estimated by
//!
//! `V = G/(G−1) · (1/N²) · Σ_g s_g s_g'`, where `s_g = Σ_{i∈g} ψ_i`.
//!
//! # References
//!
//! - Liang & Zeger (1986), "Longitudinal data analysis using generalized linear models."
//! - Callaway & Sant'Anna (2021), Section 4, clustered inference.

use std::collections::HashMap;

use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ContinuousCDF, Normal};
use ucr_core::{Error, Result};

/// Cluster-robust covariance of the columns of `influence` (N units × K parameters).
///
/// `clusters[i]` is the cluster of unit row `i`. Fewer than two clusters is
/// an [`Error::EstimatorFailure`] since the small-sample factor is undefined.
pub fn cluster_robust_cov(influence: &DMatrix<f64>, clusters: &[u32]) -> Result<DMatrix<f64>> {
    let n = influence.nrows();
    let k = influence.ncols();
    if clusters.len() != n {
        return Err(Error::Validation(format!(
            "clusters length ({}) != influence rows ({})",
            clusters.len(),
            n
        )));
    }

    // Score per cluster: s_g = Σ_{i∈g} ψ_i (1 × K)
    let mut scores: HashMap<u32, DVector<f64>> = HashMap::new();
    for (i, &c) in clusters.iter().enumerate() {
        let s = scores.entry(c).or_insert_with(|| DVector::zeros(k));
        for j in 0..k {
            s[j] += influence[(i, j)];
        }
    }
    let g = scores.len() as f64;
    if g < 2.0 {
        return Err(Error::EstimatorFailure(format!(
            "degenerate clustering: {} cluster(s), need at least 2",
            scores.len()
        )));
    }

    // Meat: Σ_g s_g s_g'
    let mut meat = DMatrix::zeros(k, k);
    for s in scores.values() {
        meat += s * s.transpose();
    }

    let n_f = n as f64;
    let correction = g / (g - 1.0);
    Ok(meat * (correction / (n_f * n_f)))
}

/// Standard error of the linear combination `w'θ` given covariance `cov`.
pub fn combination_se(cov: &DMatrix<f64>, weights: &DVector<f64>) -> f64 {
    let var = (weights.transpose() * cov * weights)[(0, 0)];
    var.max(0.0).sqrt()
}

/// Two-sided standard-normal critical value for level `alpha`.
pub fn z_critical(alpha: f64) -> Result<f64> {
    let normal = Normal::new(0.0, 1.0).map_err(|e| Error::Computation(format!("normal: {e}")))?;
    Ok(normal.inverse_cdf(1.0 - alpha / 2.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn singleton_clusters_match_iid_formula() {
        // One unit per cluster: V = G/(G-1) Σ ψ_i² / N²
        let psi = DMatrix::from_column_slice(4, 1, &[1.0, -1.0, 2.0, -2.0]);
        let cov = cluster_robust_cov(&psi, &[1, 2, 3, 4]).unwrap();
        let expected = (4.0 / 3.0) * (1.0 + 1.0 + 4.0 + 4.0) / 16.0;
        assert_abs_diff_eq!(cov[(0, 0)], expected, epsilon = 1e-12);
    }

    #[test]
    fn clustering_sums_scores_within_cluster() {
        let psi = DMatrix::from_column_slice(4, 1, &[1.0, 1.0, -1.0, -1.0]);
        let cov = cluster_robust_cov(&psi, &[7, 7, 9, 9]).unwrap();
        // s = [2, -2] → meat = 8, G/(G-1) = 2, / N² = 16
        assert_abs_diff_eq!(cov[(0, 0)], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn single_cluster_is_degenerate() {
        let psi = DMatrix::from_column_slice(2, 1, &[1.0, -1.0]);
        assert!(matches!(cluster_robust_cov(&psi, &[1, 1]), Err(Error::EstimatorFailure(_))));
    }

    #[test]
    fn combination_se_uses_covariance() {
        let cov = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 9.0]);
        let w = DVector::from_column_slice(&[0.5, 0.5]);
        // 0.25*4 + 2*0.25*1 + 0.25*9 = 3.75
        assert_abs_diff_eq!(combination_se(&cov, &w), 3.75_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn z_critical_95() {
        assert_abs_diff_eq!(z_critical(0.05).unwrap(), 1.959964, epsilon = 1e-5);
    }
}

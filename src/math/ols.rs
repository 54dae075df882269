//! Least squares building blocks.
//!
//! Both estimators in this crate reduce to small dense linear problems:
//!
//! ```text
//! OLS:       minimize Σ (y_i - x_i^T β)^2
//! MM step:   solve (XᵀWX) β = XᵀWy + (2τ - 1) Xᵀ1
//! ```
//!
//! Implementation choices:
//! - Coefficients of the OLS problem come from SVD, which handles tall design
//!   matrices without forming `XᵀX`. (Nalgebra's `QR::solve` is intended for
//!   square systems and will panic for non-square matrices.)
//! - Covariance matrices need `(XᵀX)⁻¹` or `(XᵀWX)⁻¹`; those are symmetric
//!   positive definite when the design has full column rank, so we use Cholesky
//!   and treat a failed factorization as a rank problem.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // A design with a (numerically) zero singular value is rank deficient.
    // Unlike a curve basis, a regression design should not be rescued by a
    // looser tolerance: the coefficients would not be identified.
    let max_sv = svd.singular_values.max();
    if !(max_sv.is_finite() && max_sv > 0.0) {
        return None;
    }
    let tol = max_sv * (x.nrows().max(x.ncols()) as f64) * f64::EPSILON;
    if svd.singular_values.iter().any(|&s| s <= tol) {
        return None;
    }

    let beta = svd.solve(y, tol).ok()?;
    if beta.iter().all(|v| v.is_finite()) {
        Some(beta)
    } else {
        None
    }
}

/// Solve `a β = b` for symmetric positive definite `a`.
pub fn solve_spd(a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    let chol = a.clone().cholesky()?;
    let beta = chol.solve(b);
    if beta.iter().all(|v| v.is_finite()) {
        Some(beta)
    } else {
        None
    }
}

/// Invert a symmetric positive definite matrix.
pub fn invert_spd(a: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let inv = a.clone().cholesky()?.inverse();
    if inv.iter().all(|v| v.is_finite()) {
        Some(inv)
    } else {
        None
    }
}

/// `Xᵀ diag(w) X` without materializing the diagonal.
pub fn weighted_gram(x: &DMatrix<f64>, w: &[f64]) -> DMatrix<f64> {
    let p = x.ncols();
    let mut out = DMatrix::<f64>::zeros(p, p);
    for (i, &wi) in w.iter().enumerate() {
        if wi == 0.0 {
            continue;
        }
        for a in 0..p {
            let xa = x[(i, a)] * wi;
            for b in a..p {
                out[(a, b)] += xa * x[(i, b)];
            }
        }
    }
    for a in 0..p {
        for b in 0..a {
            out[(a, b)] = out[(b, a)];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn least_squares_rejects_collinear_columns() {
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 1.0, 2.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[1.0, 2.0, 3.0]);
        assert!(solve_least_squares(&x, &y).is_none());
    }

    #[test]
    fn weighted_gram_matches_dense_product() {
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.5, 1.0, -1.0, 1.0, 2.0]);
        let w = [2.0, 0.5, 1.0];
        let dense = x.transpose() * DMatrix::from_diagonal(&DVector::from_row_slice(&w)) * &x;
        let fast = weighted_gram(&x, &w);
        assert!((dense - fast).abs().max() < 1e-12);
    }

    #[test]
    fn invert_spd_round_trips() {
        let a = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);
        let inv = invert_spd(&a).unwrap();
        let eye = &a * inv;
        assert!((eye - DMatrix::<f64>::identity(2, 2)).abs().max() < 1e-12);
    }
}

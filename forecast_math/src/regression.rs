//! Least squares solvers over row-major design matrices.

use nalgebra::{DMatrix, DVector};

use crate::{MathError, Result};

/// Result of an ordinary least squares fit.
#[derive(Debug, Clone)]
pub struct LeastSquaresFit {
    /// Estimated coefficients, one per design column
    pub coefficients: Vec<f64>,
    /// Standard error of each coefficient
    pub standard_errors: Vec<f64>,
    /// `y - X·β`
    pub residuals: Vec<f64>,
    /// Residual sum of squares
    pub rss: f64,
}

fn design_matrix(rows: &[Vec<f64>], y: &[f64]) -> Result<(DMatrix<f64>, DVector<f64>)> {
    if rows.is_empty() {
        return Err(MathError::InsufficientData(
            "Design matrix has no rows".to_string(),
        ));
    }
    if rows.len() != y.len() {
        return Err(MathError::InvalidInput(format!(
            "Design matrix has {} rows but response has {} values",
            rows.len(),
            y.len()
        )));
    }
    let k = rows[0].len();
    if k == 0 || rows.iter().any(|r| r.len() != k) {
        return Err(MathError::InvalidInput(
            "Design matrix rows must share a non-zero width".to_string(),
        ));
    }
    let x = DMatrix::from_fn(rows.len(), k, |i, j| rows[i][j]);
    Ok((x, DVector::from_column_slice(y)))
}

fn check_finite(coefficients: &DVector<f64>) -> Result<()> {
    if coefficients.iter().all(|c| c.is_finite()) {
        Ok(())
    } else {
        Err(MathError::CalculationError(
            "Least squares produced non-finite coefficients".to_string(),
        ))
    }
}

/// Ordinary least squares with coefficient standard errors.
///
/// Requires more rows than columns and a full-rank design.
pub fn ordinary_least_squares(rows: &[Vec<f64>], y: &[f64]) -> Result<LeastSquaresFit> {
    let (x, y) = design_matrix(rows, y)?;
    let (n, k) = x.shape();
    if n <= k {
        return Err(MathError::InsufficientData(format!(
            "Need more than {k} observations for {k} coefficients, got {n}"
        )));
    }

    let xt = x.transpose();
    let xtx = &xt * &x;
    let xty = &xt * &y;

    let scale = xtx.diagonal().max().max(f64::MIN_POSITIVE);
    let cholesky = xtx
        .cholesky()
        .filter(|c| c.l_dirty().diagonal().iter().all(|d| d * d > 1e-12 * scale))
        .ok_or_else(|| {
            MathError::Singular("Design matrix is not of full column rank".to_string())
        })?;
    let beta = cholesky.solve(&xty);
    check_finite(&beta)?;

    let residuals = &y - &x * &beta;
    let rss = residuals.norm_squared();
    let sigma2 = rss / (n - k) as f64;
    let inverse = cholesky.inverse();
    let standard_errors = (0..k)
        .map(|j| (sigma2 * inverse[(j, j)]).max(0.0).sqrt())
        .collect();

    Ok(LeastSquaresFit {
        coefficients: beta.iter().copied().collect(),
        standard_errors,
        residuals: residuals.iter().copied().collect(),
        rss,
    })
}

/// Ridge regression: minimises `|y - Xβ|² + Σ penalty_j β_j²`.
///
/// `penalties` holds one non-negative weight per column; zero leaves the
/// column unpenalised. Falls back to an SVD pseudo-inverse when the penalised
/// normal equations are not positive definite.
pub fn ridge_least_squares(rows: &[Vec<f64>], y: &[f64], penalties: &[f64]) -> Result<Vec<f64>> {
    let (x, y) = design_matrix(rows, y)?;
    let k = x.ncols();
    if penalties.len() != k {
        return Err(MathError::InvalidInput(format!(
            "Expected {} penalties, got {}",
            k,
            penalties.len()
        )));
    }
    if penalties.iter().any(|p| *p < 0.0 || !p.is_finite()) {
        return Err(MathError::InvalidInput(
            "Penalties must be finite and non-negative".to_string(),
        ));
    }

    let xt = x.transpose();
    let mut xtx = &xt * &x;
    for (j, penalty) in penalties.iter().enumerate() {
        xtx[(j, j)] += penalty;
    }
    let xty = &xt * &y;

    let beta = match xtx.clone().cholesky() {
        Some(cholesky) => cholesky.solve(&xty),
        None => xtx
            .svd(true, true)
            .solve(&xty, 1e-10)
            .map_err(|e| MathError::Singular(e.to_string()))?,
    };
    check_finite(&beta)?;
    Ok(beta.iter().copied().collect())
}

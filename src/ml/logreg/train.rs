use ndarray::{Array1, Array2, ArrayView2, Axis};

use super::{LogRegModel, LogRegParams};
use crate::ml::{FitWarning, ModelError, sigmoid};

/// Keeps the Hessian invertible when the intercept runs off on one-class data.
const INTERCEPT_RIDGE: f64 = 1e-10;
const ARMIJO: f64 = 1e-4;
const MAX_HALVINGS: usize = 40;

/// Fit by damped Newton iterations on the penalized log-likelihood
/// `sum(logloss) + ||w||^2 / (2c)`.
pub fn train_logreg(
    x: ArrayView2<'_, f32>,
    y: &[u8],
    params: &LogRegParams,
) -> Result<(LogRegModel, Vec<FitWarning>), ModelError> {
    let n = x.nrows();
    let d = x.ncols();
    if n == 0 {
        return Err(ModelError::EmptyTrainingSet);
    }
    let (means, scales) = if params.standardize {
        column_moments(x)
    } else {
        (vec![0.0; d], vec![1.0; d])
    };

    let width = d + usize::from(params.fit_intercept);
    let mut design = Array2::<f64>::zeros((n, width));
    for (i, row) in x.rows().into_iter().enumerate() {
        for j in 0..d {
            design[[i, j]] = (f64::from(row[j]) - means[j]) / scales[j];
        }
        if params.fit_intercept {
            design[[i, d]] = 1.0;
        }
    }
    let targets: Array1<f64> = y.iter().map(|&label| f64::from(label)).collect();
    let penalty: Array1<f64> = (0..width)
        .map(|j| if j < d { 1.0 / params.c } else { INTERCEPT_RIDGE })
        .collect();

    let mut beta = Array1::<f64>::zeros(width);
    if params.fit_intercept {
        let rate = (targets.sum() / n as f64).clamp(0.01, 0.99);
        beta[d] = (rate / (1.0 - rate)).ln();
    }

    let mut iterations = 0usize;
    let mut converged = false;
    let mut gradient_norm;
    loop {
        let proba = design.dot(&beta).mapv(sigmoid);
        let gradient = design.t().dot(&(&proba - &targets)) + &penalty * &beta;
        gradient_norm = gradient.iter().fold(0.0f64, |acc, g| acc.max(g.abs())) / n as f64;
        if gradient_norm <= params.tol {
            converged = true;
            break;
        }
        if iterations == params.max_iter {
            break;
        }
        iterations += 1;

        let curvature = proba.mapv(|p| p * (1.0 - p));
        let weighted = &design * &curvature.view().insert_axis(Axis(1));
        let hessian = design.t().dot(&weighted) + Array2::from_diag(&penalty);
        let direction = cholesky_solve(hessian, &gradient)?;

        let current = objective(&design, &targets, &penalty, &beta);
        let slope = gradient.dot(&direction);
        let mut step = 1.0;
        let mut accepted = false;
        for _ in 0..MAX_HALVINGS {
            let candidate = &beta - &(&direction * step);
            if objective(&design, &targets, &penalty, &candidate) <= current - ARMIJO * step * slope
            {
                beta = candidate;
                accepted = true;
                break;
            }
            step *= 0.5;
        }
        if !accepted {
            // No descent left but still above tolerance: report as not converged.
            tracing::debug!(
                "Line search stalled after {iterations} iterations (gradient norm {gradient_norm:.3e})"
            );
            break;
        }
    }

    let mut warnings = Vec::new();
    if !converged {
        warnings.push(FitWarning::NotConverged {
            iterations,
            gradient_norm,
        });
    }
    let intercept = if params.fit_intercept { beta[d] } else { 0.0 };
    let model = LogRegModel {
        n_features: d,
        means,
        scales,
        coefficients: beta.iter().take(d).copied().collect(),
        intercept,
        iterations,
        converged,
    };
    Ok((model, warnings))
}

fn column_moments(x: ArrayView2<'_, f32>) -> (Vec<f64>, Vec<f64>) {
    let n = x.nrows() as f64;
    let mut means = Vec::with_capacity(x.ncols());
    let mut scales = Vec::with_capacity(x.ncols());
    for column in x.columns() {
        let mean = column.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
        let var = column
            .iter()
            .map(|&v| (f64::from(v) - mean).powi(2))
            .sum::<f64>()
            / n;
        let std = var.sqrt();
        means.push(mean);
        scales.push(if std > 1e-12 { std } else { 1.0 });
    }
    (means, scales)
}

fn objective(
    design: &Array2<f64>,
    targets: &Array1<f64>,
    penalty: &Array1<f64>,
    beta: &Array1<f64>,
) -> f64 {
    let z = design.dot(beta);
    let loss: f64 = z
        .iter()
        .zip(targets)
        .map(|(&z, &t)| softplus(z) - t * z)
        .sum();
    let ridge: f64 = penalty
        .iter()
        .zip(beta)
        .map(|(&lambda, &b)| lambda * b * b)
        .sum();
    loss + 0.5 * ridge
}

/// `ln(1 + e^z)` without overflow.
fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

/// Solve `a * x = b` for a symmetric positive definite `a`.
fn cholesky_solve(mut a: Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>, ModelError> {
    let n = b.len();
    for j in 0..n {
        let mut diag = a[[j, j]];
        for k in 0..j {
            diag -= a[[j, k]] * a[[j, k]];
        }
        if !(diag.is_finite() && diag > 0.0) {
            return Err(ModelError::Numerical(format!(
                "Hessian is not positive definite at column {j}"
            )));
        }
        let diag = diag.sqrt();
        a[[j, j]] = diag;
        for i in (j + 1)..n {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= a[[i, k]] * a[[j, k]];
            }
            a[[i, j]] = sum / diag;
        }
    }
    let mut solution = b.clone();
    for i in 0..n {
        for k in 0..i {
            solution[i] -= a[[i, k]] * solution[k];
        }
        solution[i] /= a[[i, i]];
    }
    for i in (0..n).rev() {
        for k in (i + 1)..n {
            solution[i] -= a[[k, i]] * solution[k];
        }
        solution[i] /= a[[i, i]];
    }
    Ok(solution)
}

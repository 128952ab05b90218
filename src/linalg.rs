//! Dense linear algebra for the regression and sampling paths
//!
//! Normal-equation solves use Cholesky factorization with a ridge retry for
//! near-singular systems and a Gauss-Jordan fallback. The factor is exposed
//! separately so the Gibbs sampler can reuse it for multivariate normal
//! draws from a posterior precision matrix.

use ndarray::{Array1, Array2};
use rand::Rng;
use rand_distr::StandardNormal;

/// Lower-triangular Cholesky factor of a symmetric positive-definite matrix.
/// Retries once with a small ridge when the matrix is not positive definite.
pub(crate) fn cholesky_factor(a: &Array2<f64>) -> Option<Array2<f64>> {
    if let Some(l) = try_factor(a) {
        return Some(l);
    }
    let n = a.nrows();
    let ridge = 1e-8 * a.diag().iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64;
    let mut a_reg = a.clone();
    for i in 0..n {
        a_reg[[i, i]] += ridge.max(1e-12);
    }
    try_factor(&a_reg)
}

fn try_factor(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    if n != a.ncols() {
        return None;
    }
    let mut l = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }
    Some(l)
}

/// Solve A x = b given the lower Cholesky factor L of A
pub(crate) fn cholesky_solve_factored(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();

    // Forward substitution: L y = b
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: L^T x = y
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }
    x
}

/// Solve the symmetric positive-definite system A x = b
pub(crate) fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    if a.nrows() != a.ncols() || a.nrows() != b.len() {
        return None;
    }
    cholesky_factor(a).map(|l| cholesky_solve_factored(&l, b))
}

/// Gauss-Jordan inverse for small matrices, used when Cholesky fails
pub(crate) fn matrix_inverse(m: &Array2<f64>) -> Option<Array2<f64>> {
    let n = m.nrows();
    if n != m.ncols() {
        return None;
    }

    let mut aug = Array2::zeros((n, 2 * n));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = m[[i, j]];
        }
        aug[[i, n + i]] = 1.0;
    }

    for col in 0..n {
        let mut max_row = col;
        for row in col + 1..n {
            if aug[[row, col]].abs() > aug[[max_row, col]].abs() {
                max_row = row;
            }
        }
        if max_row != col {
            for j in 0..2 * n {
                let tmp = aug[[col, j]];
                aug[[col, j]] = aug[[max_row, j]];
                aug[[max_row, j]] = tmp;
            }
        }
        if aug[[col, col]].abs() < 1e-10 {
            return None;
        }
        let pivot = aug[[col, col]];
        for j in 0..2 * n {
            aug[[col, j]] /= pivot;
        }
        for row in 0..n {
            if row != col {
                let factor = aug[[row, col]];
                for j in 0..2 * n {
                    aug[[row, j]] -= factor * aug[[col, j]];
                }
            }
        }
    }

    let mut inv = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..n {
            inv[[i, j]] = aug[[i, n + j]];
        }
    }
    Some(inv)
}

/// Solve least squares via normal equations: (X^T X) w = X^T y
pub(crate) fn solve_normal_equations(x: &Array2<f64>, y: &Array1<f64>) -> Option<Array1<f64>> {
    let xtx = x.t().dot(x);
    let xty = x.t().dot(y);
    if let Some(w) = cholesky_solve(&xtx, &xty) {
        return Some(w);
    }
    matrix_inverse(&xtx).map(|inv| inv.dot(&xty))
}

/// Draw from N(mean, A^-1) given the lower Cholesky factor L of the
/// precision matrix A: draw z ~ N(0, I) and solve L^T w = z.
pub(crate) fn precision_mvn_draw<R: Rng>(
    l: &Array2<f64>,
    mean: &Array1<f64>,
    rng: &mut R,
) -> Array1<f64> {
    let n = l.nrows();
    let z: Array1<f64> = (0..n).map(|_| rng.sample(StandardNormal)).collect();

    let mut w = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * w[j];
        }
        w[i] = (z[i] - sum) / l[[i, i]];
    }
    mean + &w
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_cholesky_solve_known_system() {
        let a = array![[4.0, 2.0], [2.0, 3.0]];
        let b = array![10.0, 8.0];
        let x = cholesky_solve(&a, &b).unwrap();
        // Verify A x = b
        let back = a.dot(&x);
        assert!((back[0] - 10.0).abs() < 1e-9);
        assert!((back[1] - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_matrix_inverse_identity() {
        let m = array![[2.0, 0.0], [0.0, 4.0]];
        let inv = matrix_inverse(&m).unwrap();
        assert!((inv[[0, 0]] - 0.5).abs() < 1e-12);
        assert!((inv[[1, 1]] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_singular_inverse_fails() {
        let m = array![[1.0, 2.0], [2.0, 4.0]];
        assert!(matrix_inverse(&m).is_none());
    }

    #[test]
    fn test_normal_equations_exact_line() {
        // y = 3x, single feature
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![3.0, 6.0, 9.0];
        let w = solve_normal_equations(&x, &y).unwrap();
        assert!((w[0] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_precision_draw_is_finite() {
        use rand::SeedableRng;
        let mut rng = rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(7);
        let a = array![[5.0, 1.0], [1.0, 5.0]];
        let l = cholesky_factor(&a).unwrap();
        let mean = array![1.0, -1.0];
        let draw = precision_mvn_draw(&l, &mean, &mut rng);
        assert!(draw.iter().all(|v| v.is_finite()));
    }
}

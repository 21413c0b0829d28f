//! # Dense Linear Algebra
//!
//! Single-precision solvers for the small dense systems produced by the
//! constraint solver. Matrices are square, row-major slices of `size * size`
//! elements.
//!
//! Numerical trouble is absorbed rather than reported: near-singular pivots
//! produce a zero unknown, and every vector update is flushed to zero below
//! the denormal threshold. A matrix that is not positive definite is a
//! caller bug; [`ConjugateGradient::solve`] asserts on it in debug builds and
//! stops iterating in release builds.

use crate::ComputeError;

/// Pivots smaller than this fraction of the largest matrix entry are treated
/// as singular by [`gaussian_elimination`].
const SINGULAR_PIVOT: f32 = 1.0e-6;

/// Returns `0.0` for values below the smallest normal `f32`.
#[inline]
#[must_use]
pub fn flush_to_zero(value: f32) -> f32 {
    if value.abs() < f32::MIN_POSITIVE {
        0.0
    } else {
        value
    }
}

pub fn flush_to_zero_slice(values: &mut [f32]) {
    for value in values {
        *value = flush_to_zero(*value);
    }
}

fn check_len(len: usize, expected: usize, what: &'static str) -> Result<(), ComputeError> {
    if len == expected {
        Ok(())
    } else {
        Err(ComputeError::ShapeMismatch(what))
    }
}

#[inline]
fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// `out = A * x`
///
/// # Errors
///
/// Returns [`ComputeError::ShapeMismatch`] if a slice does not match `size`.
pub fn matrix_times_vector(
    size: usize,
    a: &[f32],
    x: &[f32],
    out: &mut [f32],
) -> Result<(), ComputeError> {
    check_len(a.len(), size * size, "matrix must hold size * size elements")?;
    check_len(x.len(), size, "input vector must hold size elements")?;
    check_len(out.len(), size, "output vector must hold size elements")?;
    if size == 0 {
        return Ok(());
    }
    for (row, value) in a.chunks_exact(size).zip(out.iter_mut()) {
        *value = flush_to_zero(dot(row, x));
    }
    Ok(())
}

/// Outer product `out[i][j] = x[i] * y[j]`.
///
/// # Errors
///
/// Returns [`ComputeError::ShapeMismatch`] if a slice does not match `size`.
pub fn covariance_matrix(
    size: usize,
    out: &mut [f32],
    x: &[f32],
    y: &[f32],
) -> Result<(), ComputeError> {
    check_len(out.len(), size * size, "matrix must hold size * size elements")?;
    check_len(x.len(), size, "x must hold size elements")?;
    check_len(y.len(), size, "y must hold size elements")?;
    if size == 0 {
        return Ok(());
    }
    for (row, xi) in out.chunks_exact_mut(size).zip(x) {
        for (value, yj) in row.iter_mut().zip(y) {
            *value = xi * yj;
        }
    }
    Ok(())
}

/// Attempts a Cholesky factorization of `a`. Returns `true` when the matrix
/// is symmetric positive definite to single precision.
#[must_use]
pub fn test_psd_matrix(size: usize, a: &[f32]) -> bool {
    if a.len() != size * size {
        return false;
    }
    for i in 0..size {
        for j in (i + 1)..size {
            let (aij, aji) = (a[i * size + j], a[j * size + i]);
            if (aij - aji).abs() > 1.0e-5 * aij.abs().max(aji.abs()).max(1.0) {
                return false;
            }
        }
    }

    let mut lower = vec![0.0_f32; size * size];
    for j in 0..size {
        let mut diag = a[j * size + j];
        for k in 0..j {
            diag -= lower[j * size + k] * lower[j * size + k];
        }
        if diag <= 0.0 {
            return false;
        }
        let diag = diag.sqrt();
        lower[j * size + j] = diag;
        for i in (j + 1)..size {
            let mut sum = a[i * size + j];
            for k in 0..j {
                sum -= lower[i * size + k] * lower[j * size + k];
            }
            lower[i * size + j] = sum / diag;
        }
    }
    true
}

/// Solves `A x = b` in place with partial pivoting. On return `b` holds the
/// solution and `a` holds the eliminated upper triangle.
///
/// Each column pivots on the largest-magnitude entry in the remaining rows.
/// A column whose best pivot is negligible next to the largest entry of `a`
/// contributes a zero unknown.
///
/// # Errors
///
/// Returns [`ComputeError::ShapeMismatch`] if a slice does not match `size`.
pub fn gaussian_elimination(size: usize, a: &mut [f32], b: &mut [f32]) -> Result<(), ComputeError> {
    check_len(a.len(), size * size, "matrix must hold size * size elements")?;
    check_len(b.len(), size, "right hand side must hold size elements")?;

    let scale = a.iter().fold(0.0_f32, |m, v| m.max(v.abs()));
    let threshold = SINGULAR_PIVOT * scale;
    let mut singular = vec![false; size];
    for i in 0..size {
        let mut permute = i;
        let mut pivot = a[i * size + i].abs();
        for j in (i + 1)..size {
            let candidate = a[j * size + i].abs();
            if candidate > pivot {
                permute = j;
                pivot = candidate;
            }
        }
        if permute != i {
            for k in 0..size {
                a.swap(i * size + k, permute * size + k);
            }
            b.swap(i, permute);
        }

        if pivot <= threshold {
            singular[i] = true;
            continue;
        }

        let inv_pivot = 1.0 / a[i * size + i];
        for j in (i + 1)..size {
            let scale = a[j * size + i] * inv_pivot;
            if scale == 0.0 {
                continue;
            }
            for k in (i + 1)..size {
                a[j * size + k] = flush_to_zero(a[j * size + k] - a[i * size + k] * scale);
            }
            a[j * size + i] = 0.0;
            b[j] = flush_to_zero(b[j] - b[i] * scale);
        }
    }

    for i in (0..size).rev() {
        if singular[i] {
            b[i] = 0.0;
            continue;
        }
        let mut sum = b[i];
        for k in (i + 1)..size {
            sum -= a[i * size + k] * b[k];
        }
        b[i] = flush_to_zero(sum / a[i * size + i]);
    }
    Ok(())
}

/// Outcome of an iterative solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveReport {
    pub iterations: usize,
    /// Euclidean norm of `b - A x` at exit.
    pub residual: f32,
    pub converged: bool,
}

/// Jacobi-preconditioned conjugate gradient for symmetric positive definite
/// systems.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConjugateGradient {
    max_iterations: Option<usize>,
}

impl ConjugateGradient {
    /// Caps the iteration count. The default cap is the system size.
    #[must_use]
    pub fn with_max_iterations(max_iterations: usize) -> Self {
        Self {
            max_iterations: Some(max_iterations),
        }
    }

    /// Solves `A x = b` starting from the guess already in `x`.
    ///
    /// `precond` is scratch space of `2 * size` elements: the inverse
    /// diagonal followed by the preconditioned residual. Iteration stops when
    /// `|r| <= tolerance * |b|` or when the iteration cap is reached.
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError::ShapeMismatch`] if a slice does not match `size`.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if a search direction has non-positive
    /// curvature, meaning `A` is not positive definite.
    pub fn solve(
        &self,
        size: usize,
        tolerance: f32,
        x: &mut [f32],
        b: &[f32],
        a: &[f32],
        precond: &mut [f32],
    ) -> Result<SolveReport, ComputeError> {
        check_len(a.len(), size * size, "matrix must hold size * size elements")?;
        check_len(x.len(), size, "solution must hold size elements")?;
        check_len(b.len(), size, "right hand side must hold size elements")?;
        check_len(precond.len(), size * 2, "preconditioner must hold 2 * size elements")?;
        if size == 0 {
            return Ok(SolveReport {
                iterations: 0,
                residual: 0.0,
                converged: true,
            });
        }

        let (inv_diag, z) = precond.split_at_mut(size);
        for (i, inv) in inv_diag.iter_mut().enumerate() {
            let diag = a[i * size + i];
            *inv = if diag > f32::MIN_POSITIVE { 1.0 / diag } else { 1.0 };
        }

        let mut r = vec![0.0_f32; size];
        matrix_times_vector(size, a, x, &mut r)?;
        for (ri, bi) in r.iter_mut().zip(b) {
            *ri = flush_to_zero(bi - *ri);
        }

        let threshold = tolerance * tolerance * dot(b, b).max(f32::MIN_POSITIVE);
        let mut residual2 = dot(&r, &r);
        let max_iterations = self.max_iterations.unwrap_or(size);

        let mut p = vec![0.0_f32; size];
        let mut q = vec![0.0_f32; size];
        let mut rz_old = 0.0_f32;
        let mut iterations = 0;

        while residual2 > threshold && iterations < max_iterations {
            for ((zi, ri), inv) in z.iter_mut().zip(&r).zip(inv_diag.iter()) {
                *zi = ri * inv;
            }
            let rz = dot(&r, z);
            if iterations == 0 {
                p.copy_from_slice(z);
            } else {
                let beta = rz / rz_old;
                for (pi, zi) in p.iter_mut().zip(z.iter()) {
                    *pi = flush_to_zero(zi + beta * *pi);
                }
            }
            rz_old = rz;

            matrix_times_vector(size, a, &p, &mut q)?;
            let curvature = dot(&p, &q);
            debug_assert!(
                curvature > 0.0,
                "conjugate gradient requires a positive definite matrix"
            );
            if curvature <= 0.0 {
                break;
            }

            let alpha = rz / curvature;
            for ((xi, ri), (pi, qi)) in x.iter_mut().zip(r.iter_mut()).zip(p.iter().zip(&q)) {
                *xi = flush_to_zero(*xi + alpha * pi);
                *ri = flush_to_zero(*ri - alpha * qi);
            }
            residual2 = dot(&r, &r);
            iterations += 1;
        }

        Ok(SolveReport {
            iterations,
            residual: residual2.sqrt(),
            converged: residual2 <= threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_to_zero_clears_denormals() {
        assert_eq!(flush_to_zero(f32::MIN_POSITIVE / 2.0), 0.0);
        assert_eq!(flush_to_zero(-1.0e-40), 0.0);
        assert_eq!(flush_to_zero(1.0e-30), 1.0e-30);
    }

    #[test]
    fn gaussian_elimination_pivots_on_zero_diagonal() {
        // Leading zero forces a row swap.
        let mut a = [0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 2.0];
        let mut b = [3.0, 5.0, 4.0];
        gaussian_elimination(3, &mut a, &mut b).unwrap();
        assert!((b[0] - 5.0).abs() < 1.0e-6);
        assert!((b[1] - 3.0).abs() < 1.0e-6);
        assert!((b[2] - 2.0).abs() < 1.0e-6);
    }

    #[test]
    fn gaussian_elimination_zeroes_singular_unknowns() {
        let mut a = [1.0, 0.0, 0.0, 0.0];
        let mut b = [2.0, 0.0];
        gaussian_elimination(2, &mut a, &mut b).unwrap();
        assert_eq!(b, [2.0, 0.0]);
    }

    #[test]
    fn psd_test_rejects_indefinite_matrices() {
        assert!(test_psd_matrix(2, &[2.0, 1.0, 1.0, 2.0]));
        assert!(!test_psd_matrix(2, &[1.0, 2.0, 2.0, 1.0]));
        assert!(!test_psd_matrix(2, &[1.0, 0.5, 0.0, 1.0]));
    }

    #[test]
    fn conjugate_gradient_rejects_bad_scratch() {
        let mut x = [0.0; 2];
        let mut precond = [0.0; 3];
        let err = ConjugateGradient::default()
            .solve(2, 1.0e-5, &mut x, &[1.0, 1.0], &[2.0, 1.0, 1.0, 2.0], &mut precond)
            .unwrap_err();
        assert!(matches!(err, ComputeError::ShapeMismatch(_)));
    }

    #[test]
    fn conjugate_gradient_zero_rhs_converges_immediately() {
        let mut x = [0.0; 2];
        let mut precond = [0.0; 4];
        let report = ConjugateGradient::default()
            .solve(2, 1.0e-5, &mut x, &[0.0, 0.0], &[2.0, 1.0, 1.0, 2.0], &mut precond)
            .unwrap();
        assert_eq!(report.iterations, 0);
        assert!(report.converged);
        assert_eq!(x, [0.0, 0.0]);
    }

    #[test]
    fn empty_systems_are_a_no_op() {
        let report = ConjugateGradient::default()
            .solve(0, 1.0e-5, &mut [], &[], &[], &mut [])
            .unwrap();
        assert_eq!(report.iterations, 0);
        assert!(report.converged);
        matrix_times_vector(0, &[], &[], &mut []).unwrap();
        covariance_matrix(0, &mut [], &[], &[]).unwrap();
        gaussian_elimination(0, &mut [], &mut []).unwrap();
    }

    #[test]
    fn rounding_noise_pivot_is_treated_as_singular() {
        let mut a = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0e-9];
        let mut b = [1.0, 2.0, 3.0];
        gaussian_elimination(3, &mut a, &mut b).unwrap();
        assert_eq!(b, [1.0, 2.0, 0.0]);
    }

    #[test]
    fn dependent_rows_leave_finite_solution() {
        // Row 1 is twice row 0.
        let mut a = [1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 1.0, 1.0, 1.0];
        let mut b = [6.0, 12.0, 3.0];
        gaussian_elimination(3, &mut a, &mut b).unwrap();
        assert!(b.iter().all(|v| v.is_finite()), "{b:?}");
        assert_eq!(b[2], 0.0);
        assert!((b[0] + 2.0 * b[1] - 6.0).abs() < 1.0e-5, "{b:?}");
        assert!((b[0] + b[1] - 3.0).abs() < 1.0e-5, "{b:?}");
    }

    #[test]
    fn small_but_well_conditioned_matrices_still_solve() {
        let mut a = [1.0e-4, 0.0, 0.0, 1.0e-4];
        let mut b = [1.0e-4, 2.0e-4];
        gaussian_elimination(2, &mut a, &mut b).unwrap();
        assert!((b[0] - 1.0).abs() < 1.0e-5 && (b[1] - 2.0).abs() < 1.0e-5, "{b:?}");
    }
}

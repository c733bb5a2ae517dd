//! Dense symmetric linear-algebra primitives.
//!
//! Thin wrappers around [`nalgebra`] factorizations with the error discipline
//! the optimizers rely on: failures are values (`None` or NaN-filled
//! outputs), never panics. Non-finite inputs propagate to the outputs so that
//! a poisoned matrix surfaces as a poisoned (or rejected) result at the call
//! site instead of an abort deep inside a factorization.

use std::cmp::Ordering;

use nalgebra::{convert, storage::Storage, Cholesky, DMatrix, DVector, Dyn, OMatrix, OVector, Vector};

use crate::core::RealField;

// Infinity norm that propagates poison: any non-finite component makes the
// result infinite so that tolerance comparisons can never succeed on it.
pub(crate) fn inf_norm<T: RealField, S: Storage<T, Dyn>>(v: &Vector<T, Dyn, S>) -> T {
    let mut max = T::zero();
    for &vi in v.iter() {
        if !vi.is_finite() {
            return convert(f64::INFINITY);
        }
        let a = vi.abs();
        if a > max {
            max = a;
        }
    }
    max
}

/// Symmetric eigendecomposition with eigenvalues in ascending order.
///
/// Returns `(eigenvalues, eigenvectors)` where the *i*-th column of the
/// eigenvector matrix corresponds to the *i*-th eigenvalue. The input is
/// assumed to be symmetric; only one triangle is meaningful to the underlying
/// decomposition.
///
/// If the input contains a non-finite entry, both outputs are filled with NaN.
pub fn eigh<T: RealField>(a: &OMatrix<T, Dyn, Dyn>) -> (OVector<T, Dyn>, OMatrix<T, Dyn, Dyn>) {
    let n = a.nrows();

    if a.iter().any(|v| !v.is_finite()) {
        let nan: T = convert(f64::NAN);
        return (
            DVector::from_element(n, nan),
            DMatrix::from_element(n, n, nan),
        );
    }

    let eig = a.clone_owned().symmetric_eigen();

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| {
        eig.eigenvalues[i]
            .partial_cmp(&eig.eigenvalues[j])
            .unwrap_or(Ordering::Equal)
    });

    let values = DVector::from_iterator(n, order.iter().map(|&i| eig.eigenvalues[i]));

    let mut vectors = DMatrix::zeros(n, n);
    for (dst, &src) in order.iter().enumerate() {
        vectors
            .column_mut(dst)
            .copy_from(&eig.eigenvectors.column(src));
    }

    (values, vectors)
}

/// Cholesky factorization of a symmetric matrix.
///
/// Returns the lower-triangular factor `L` with `A = L Lᵀ`, or `None` when
/// the matrix is not positive definite (or contains a non-finite entry).
pub fn cholesky<T: RealField>(a: &OMatrix<T, Dyn, Dyn>) -> Option<OMatrix<T, Dyn, Dyn>> {
    if a.iter().any(|v| !v.is_finite()) {
        return None;
    }

    Cholesky::new(a.clone_owned()).map(|chol| chol.unpack())
}

/// Solves `L y = b` for a lower-triangular `L`.
///
/// Returns `None` when the system cannot be solved (zero diagonal entry).
/// Non-finite values in `b` propagate into the solution.
pub fn solve_lower_triangular<T: RealField>(
    l: &OMatrix<T, Dyn, Dyn>,
    b: &OVector<T, Dyn>,
) -> Option<OVector<T, Dyn>> {
    l.solve_lower_triangular(b)
}

/// Solves `U y = b` for an upper-triangular `U`.
///
/// Returns `None` when the system cannot be solved (zero diagonal entry).
/// Non-finite values in `b` propagate into the solution.
pub fn solve_upper_triangular<T: RealField>(
    u: &OMatrix<T, Dyn, Dyn>,
    b: &OVector<T, Dyn>,
) -> Option<OVector<T, Dyn>> {
    u.solve_upper_triangular(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use nalgebra::{dmatrix, dvector};

    #[test]
    fn eigh_ascending_order() {
        let a = dmatrix![2.0, 0.0, 0.0; 0.0, -3.0, 0.0; 0.0, 0.0, 1.0];
        let (values, vectors) = eigh(&a);

        assert_abs_diff_eq!(values, dvector![-3.0, 1.0, 2.0], epsilon = 1e-12);

        // Columns reconstruct the matrix.
        let reconstructed = &vectors * OMatrix::from_diagonal(&values) * vectors.transpose();
        assert_abs_diff_eq!(reconstructed, a, epsilon = 1e-10);
    }

    #[test]
    fn eigh_orthonormal_vectors() {
        let a = dmatrix![4.0, 1.0, 0.5; 1.0, 3.0, -1.0; 0.5, -1.0, 1.0];
        let (_, vectors) = eigh(&a);

        let identity = OMatrix::<f64, Dyn, Dyn>::identity(3, 3);
        assert_abs_diff_eq!(&vectors.transpose() * &vectors, identity, epsilon = 1e-10);
    }

    #[test]
    fn eigh_propagates_non_finite() {
        let a = dmatrix![1.0, f64::NAN; f64::NAN, 1.0];
        let (values, vectors) = eigh(&a);

        assert!(values.iter().all(|v| v.is_nan()));
        assert!(vectors.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn cholesky_definite_check() {
        let spd = dmatrix![4.0, 2.0; 2.0, 3.0];
        let l = cholesky(&spd).unwrap();
        assert_abs_diff_eq!(&l * l.transpose(), spd, epsilon = 1e-12);

        let indefinite = dmatrix![1.0, 0.0; 0.0, -1.0];
        assert!(cholesky(&indefinite).is_none());

        let poisoned = dmatrix![f64::INFINITY, 0.0; 0.0, 1.0];
        assert!(cholesky(&poisoned).is_none());
    }

    #[test]
    fn triangular_solves() {
        let spd = dmatrix![4.0, 2.0; 2.0, 3.0];
        let l = cholesky(&spd).unwrap();
        let b = dvector![1.0, -2.0];

        let y = solve_lower_triangular(&l, &b).unwrap();
        let x = solve_upper_triangular(&l.transpose(), &y).unwrap();

        assert_abs_diff_eq!(&spd * x, b, epsilon = 1e-12);
    }
}

//! Trust-region subproblem solver.
//!
//! Given a gradient *g*, a symmetric (possibly indefinite) Hessian *H* and a
//! radius Δ, [`solve`] computes a step *s* that minimizes the quadratic model
//!
//! ```text
//! m(s) = gᵀs + ½ sᵀHs    subject to    ‖s‖ ≤ Δ
//! ```
//!
//! A global minimizer is characterized by a shift λ ≥ 0 such that
//! `(H + λI) s = −g`, `H + λI` is positive semidefinite and
//! `λ(‖s‖ − Δ) = 0`. The implementation computes one symmetric
//! eigendecomposition of *H* and works in the eigenbasis, where the problem
//! is separable. This handles all three regimes of the theory: the interior
//! case (*H* positive definite and the Newton step inside the ball), the
//! boundary case (the shift is found by a safeguarded Newton iteration on the
//! secular equation) and the hard case (the gradient has no component along
//! the eigenspace of the smallest eigenvalue and the step must be completed
//! by an eigenvector contribution).
//!
//! # References
//!
//! \[1\] [Computing a Trust Region
//! Step](https://epubs.siam.org/doi/10.1137/0904038)
//!
//! \[2\] [Numerical
//! Optimization](https://link.springer.com/book/10.1007/978-0-387-40065-5)
//!
//! \[3\] [Trust Region
//! Methods](https://epubs.siam.org/doi/book/10.1137/1.9780898719857)

use log::debug;
use nalgebra::{
    convert,
    storage::{Storage, StorageMut},
    DVector, Dyn, Matrix, OVector, Vector,
};

use crate::core::RealField;
use crate::linalg;

/// Default iteration budget for the shift root-finder in [`solve`].
pub const DEFAULT_MAX_ITERS: usize = 20;

/// Outcome of a [`solve`] call.
///
/// The step itself is written into the caller-supplied buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubproblemResult<T> {
    /// Value of the quadratic model at the returned step.
    pub model_value: T,
    /// True iff the Hessian is positive definite and the unconstrained Newton
    /// step lies strictly inside the ball. Implies `lambda == 0`.
    pub interior: bool,
    /// The Lagrange multiplier of the norm constraint (zero in the interior
    /// case).
    pub lambda: T,
    /// True iff the hard case was detected and the step was completed by an
    /// eigenvector of the smallest eigenvalue.
    pub hard_case: bool,
    /// True iff the returned step satisfies the optimality conditions to
    /// tolerance. When false, the caller still receives a usable best-effort
    /// step whose norm does not exceed the radius.
    pub reached_solution: bool,
}

/// Solves the trust-region subproblem, writing the step into `s`.
///
/// The Hessian is symmetrized defensively before it is decomposed, so slight
/// asymmetries are harmless. A non-finite entry anywhere in the input does
/// not panic: the solver returns a zero step with `reached_solution = false`
/// and leaves the rejection to the caller.
///
/// The returned step always satisfies `‖s‖ ≤ Δ`; whenever the constraint is
/// active, `‖s‖ = Δ` to machine precision.
///
/// # Panics
///
/// Panics if the dimensions of `g`, `h` and `s` do not agree, if `delta` is
/// not positive or if `max_iters` is zero. These are programmer errors;
/// numerical pathologies are reported through the result flags instead.
pub fn solve<T, Sg, Sh, Ss>(
    g: &Vector<T, Dyn, Sg>,
    h: &Matrix<T, Dyn, Dyn, Sh>,
    delta: T,
    s: &mut Vector<T, Dyn, Ss>,
    max_iters: usize,
) -> SubproblemResult<T>
where
    T: RealField,
    Sg: Storage<T, Dyn>,
    Sh: Storage<T, Dyn, Dyn>,
    Ss: StorageMut<T, Dyn>,
{
    let n = g.len();
    assert!(n > 0, "empty subproblem");
    assert_eq!(h.nrows(), n, "Hessian row count does not match the gradient");
    assert_eq!(h.ncols(), n, "Hessian must be square");
    assert_eq!(s.len(), n, "step buffer does not match the gradient");
    assert!(max_iters >= 1, "max_iters must be at least 1");

    let zero = T::zero();
    let one = T::one();
    let half: T = convert(0.5);

    if !delta.is_finite()
        || g.iter().any(|v| !v.is_finite())
        || h.iter().any(|v| !v.is_finite())
    {
        debug!("non-finite subproblem input, returning zero step");
        s.fill(zero);
        return SubproblemResult {
            model_value: zero,
            interior: false,
            lambda: zero,
            hard_case: false,
            reached_solution: false,
        };
    }

    assert!(delta > zero, "trust-region radius must be positive");

    // Symmetrize defensively before decomposing.
    let mut a = h.clone_owned();
    for i in 0..n {
        for j in (i + 1)..n {
            let v = (a[(i, j)] + a[(j, i)]) * half;
            a[(i, j)] = v;
            a[(j, i)] = v;
        }
    }

    let (w, q) = linalg::eigh(&a);
    let qg = q.tr_mul(g);

    let g_norm = g.norm();
    let delta2 = delta * delta;

    // Infinity norm of the Hessian, used both in the definiteness threshold
    // and in the upper bound of the shift bracket.
    let mut h_inf = zero;
    for i in 0..n {
        let mut row_sum = zero;
        for j in 0..n {
            row_sum += a[(i, j)].abs();
        }
        if row_sum > h_inf {
            h_inf = row_sum;
        }
    }

    let eps_pd: T = convert::<f64, T>(1e-10) * h_inf;

    let mut shat = DVector::from_element(n, zero);

    // Interior case: positive definite Hessian and the Newton step fits.
    if w[0] > eps_pd {
        let mut norm2 = zero;
        for i in 0..n {
            let r = qg[i] / w[i];
            norm2 += r * r;
        }

        if norm2 < delta2 {
            for i in 0..n {
                shat[i] = -qg[i] / w[i];
            }
            s.gemv(one, &q, &shat, zero);

            debug!(
                "newton step is interior (|s| = {}, delta = {})",
                norm2.sqrt(),
                delta
            );

            return SubproblemResult {
                model_value: model_value(&w, &qg, &shat),
                interior: true,
                lambda: zero,
                hard_case: false,
                reached_solution: true,
            };
        }
    }

    // Hard case: the gradient is (numerically) orthogonal to the eigenspace
    // of the smallest eigenvalue and even the maximal shift leaves the
    // shifted Newton step inside the ball. The step is completed along an
    // eigenvector of the smallest eigenvalue.
    let (candidate, cluster_end) = hard_case_candidate(&w, &qg);
    if candidate {
        let lambda = -w[0];

        let mut norm2 = zero;
        for i in cluster_end..n {
            let r = qg[i] / (w[i] + lambda);
            norm2 += r * r;
        }

        if norm2 < delta2 {
            let tau = (delta2 - norm2).sqrt();

            shat.fill(zero);
            for i in cluster_end..n {
                shat[i] = -qg[i] / (w[i] + lambda);
            }
            shat[0] += tau;

            let shat_norm = shat.norm();
            if shat_norm > zero {
                shat *= delta / shat_norm;
            }
            s.gemv(one, &q, &shat, zero);

            debug!("hard case (lambda = {}, tau = {})", lambda, tau);

            return SubproblemResult {
                model_value: model_value(&w, &qg, &shat),
                interior: false,
                lambda,
                hard_case: true,
                reached_solution: true,
            };
        }
    }

    // Boundary case: find lambda > max(0, -w[0]) with ‖s(lambda)‖ = delta.
    // Newton iteration on psi(lambda) = 1/delta - 1/phi(lambda), which is
    // nearly linear in lambda, safeguarded by a bisection bracket.
    let mut lo = zero.max(-w[0]);
    let mut hi = g_norm / delta + h_inf;
    if hi <= lo {
        hi = lo + one;
    }

    let tol: T = convert::<f64, T>(1e-10) * delta.max(one);
    let mut lambda = if lo == zero {
        zero
    } else {
        lo + (hi - lo) * convert::<f64, T>(1e-3)
    };
    let mut reached = false;

    for _ in 0..max_iters {
        let mut phi2 = zero;
        let mut third = zero;
        for i in 0..n {
            let d = w[i] + lambda;
            let r = qg[i] / d;
            phi2 += r * r;
            third += r * r / d;
        }
        let phi = phi2.sqrt();

        if !phi.is_finite() {
            // Numerically still on the singular side of the spectrum shift.
            lo = lambda;
            lambda = (lo + hi) * half;
            continue;
        }

        if (phi - delta).abs() <= tol {
            reached = true;
            break;
        }

        if phi > delta {
            lo = lambda;
        } else {
            hi = lambda;
        }

        let dphi = -(third / phi);
        let mut next = lambda - (one / delta - one / phi) * (phi * phi) / dphi;
        if !next.is_finite() || next <= lo || next >= hi {
            next = (lo + hi) * half;
        }
        lambda = next;
    }

    for i in 0..n {
        shat[i] = -qg[i] / (w[i] + lambda);
    }

    let two: T = convert(2.0);

    let shat_norm = shat.norm();
    if shat_norm.is_finite() && delta <= two * shat_norm {
        // Land exactly on the boundary. A rescale by a factor of at most two
        // cannot push the model value above zero.
        shat *= delta / shat_norm;
    } else if !shat_norm.is_finite() {
        shat.fill(zero);
        reached = false;
    } else {
        // The bracket collapsed without a boundary root (a semidefinite
        // spectrum edge); keep the strictly interior best-effort step.
        reached = false;
    }

    s.gemv(one, &q, &shat, zero);

    debug!("boundary step (lambda = {}, converged = {})", lambda, reached);

    SubproblemResult {
        model_value: model_value(&w, &qg, &shat),
        interior: false,
        lambda,
        hard_case: false,
        reached_solution: reached,
    }
}

/// Detects a hard-case candidate from the (ascending) eigenvalues and the
/// gradient expressed in the eigenbasis.
///
/// Returns `(candidate, index)` where `index` is the first coordinate outside
/// the eigenspace of the smallest eigenvalue (it equals the dimension when
/// the whole spectrum belongs to it and the gradient is zero). The candidate
/// holds iff the smallest eigenvalue is negative and the gradient has no
/// component inside its eigenspace. Confirming the hard case additionally
/// requires the reduced shifted Newton step to stay inside the ball, which
/// [`solve`] checks.
///
/// Comparisons of gradient components against zero use an absolute tolerance
/// of `1e-10 · ‖ĝ‖`; eigenvalues within `1e-10` of the smallest one count as
/// its eigenspace.
pub fn hard_case_candidate<T, Sw, Sq>(
    eigenvalues: &Vector<T, Dyn, Sw>,
    qg: &Vector<T, Dyn, Sq>,
) -> (bool, usize)
where
    T: RealField,
    Sw: Storage<T, Dyn>,
    Sq: Storage<T, Dyn>,
{
    let n = eigenvalues.len();
    assert!(n > 0, "empty spectrum");
    assert_eq!(n, qg.len(), "spectrum and gradient dimensions differ");

    let zero = T::zero();

    if !(eigenvalues[0] < zero) {
        return (false, 0);
    }

    let cluster_tol: T = convert(1e-10);
    let zero_tol: T = convert::<f64, T>(1e-10) * qg.norm();

    let mut idx = 0;
    while idx < n && (eigenvalues[idx] - eigenvalues[0]).abs() <= cluster_tol {
        if qg[idx].abs() > zero_tol {
            return (false, idx);
        }
        idx += 1;
    }

    (true, idx)
}

fn model_value<T: RealField>(
    w: &OVector<T, Dyn>,
    qg: &OVector<T, Dyn>,
    shat: &OVector<T, Dyn>,
) -> T {
    let half: T = convert(0.5);

    let mut m = T::zero();
    for i in 0..w.len() {
        m += qg[i] * shat[i] + half * w[i] * shat[i] * shat[i];
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use nalgebra::{dmatrix, dvector, DMatrix, DVector};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rand_distr::StandardNormal;

    fn model_at(g: &DVector<f64>, h: &DMatrix<f64>, s: &DVector<f64>) -> f64 {
        g.dot(s) + 0.5 * (h * s).dot(s)
    }

    #[test]
    fn candidate_truth_table() {
        let cases = [
            (dvector![-1.0, 2.0, 3.0], dvector![0.0, 1.0, 1.0], (true, 1)),
            (dvector![-1.0, -1.0, 3.0], dvector![0.0, 0.0, 1.0], (true, 2)),
            (dvector![-1.0, -1.0, -1.0], dvector![0.0, 0.0, 0.0], (true, 3)),
            (dvector![1.0, 2.0, 3.0], dvector![0.0, 1.0, 1.0], (false, 0)),
            (dvector![-1.0, -1.0, -1.0], dvector![0.0, 0.0, 1.0], (false, 2)),
            (dvector![-1.0, 2.0, 3.0], dvector![1.0, 1.0, 1.0], (false, 0)),
        ];

        for (eigenvalues, qg, expected) in cases {
            assert_eq!(
                hard_case_candidate(&eigenvalues, &qg),
                expected,
                "eigenvalues = {:?}, qg = {:?}",
                eigenvalues.as_slice(),
                qg.as_slice()
            );
        }
    }

    #[test]
    fn interior_step() {
        let g = dvector![0.2, 0.2];
        let h = dmatrix![2.0, 0.0; 0.0, 2.0];
        let mut s = DVector::zeros(2);

        let result = solve(&g, &h, 1.0, &mut s, DEFAULT_MAX_ITERS);

        assert!(result.interior);
        assert!(!result.hard_case);
        assert!(result.reached_solution);
        assert_eq!(result.lambda, 0.0);
        assert_abs_diff_eq!(s, dvector![-0.1, -0.1], epsilon = 1e-12);
        assert_abs_diff_eq!(result.model_value, model_at(&g, &h, &s), epsilon = 1e-12);
    }

    #[test]
    fn boundary_step_positive_definite() {
        let g = dvector![10.0, 0.0];
        let h = dmatrix![1.0, 0.0; 0.0, 4.0];
        let mut s = DVector::zeros(2);

        let result = solve(&g, &h, 1.0, &mut s, DEFAULT_MAX_ITERS);

        assert!(!result.interior);
        assert!(result.reached_solution);
        // phi(lambda) = 10 / (1 + lambda) = 1.
        assert_abs_diff_eq!(result.lambda, 9.0, epsilon = 1e-6);
        assert_abs_diff_eq!(s, dvector![-1.0, 0.0], epsilon = 1e-8);
    }

    #[test]
    fn negative_definite_boundary() {
        // The solver must not flinch at a negative definite Hessian; the step
        // lies on the boundary with lambda > -smallest eigenvalue.
        let g = dvector![0.0, 1.0];
        let h = dmatrix![-1000.0, 0.0; 0.0, -999.0];
        let delta = 1e-2;
        let mut s = DVector::zeros(2);

        let result = solve(&g, &h, delta, &mut s, DEFAULT_MAX_ITERS);

        assert!(!result.interior);
        assert!(result.reached_solution);
        assert_abs_diff_eq!(s.norm(), delta, epsilon = 1e-12);
        assert!(result.lambda >= 1000.0);
        assert!(result.model_value <= 0.0);
    }

    #[test]
    fn hard_case_construction() {
        // Gradient orthogonal to the eigenspace of the smallest eigenvalue
        // and too short to reach the boundary with the maximal shift.
        let g = dvector![0.0, 0.1];
        let h = dmatrix![-2.0, 0.0; 0.0, 1.0];
        let mut s = DVector::zeros(2);

        let result = solve(&g, &h, 1.0, &mut s, DEFAULT_MAX_ITERS);

        assert!(result.hard_case);
        assert!(!result.interior);
        assert!(result.reached_solution);
        assert_abs_diff_eq!(result.lambda, 2.0, epsilon = 1e-10);
        assert_abs_diff_eq!(s.norm(), 1.0, epsilon = 1e-12);
        // The component along the well-determined direction is fixed.
        assert_abs_diff_eq!(s[1], -0.1 / 3.0, epsilon = 1e-10);
        assert_abs_diff_eq!(result.model_value, model_at(&g, &h, &s), epsilon = 1e-12);
    }

    #[test]
    fn hard_case_zero_gradient() {
        // Pure descent-direction degeneracy: zero gradient with negative
        // curvature yields a full-radius eigenvector step.
        let g = dvector![0.0, 0.0];
        let h = dmatrix![-3.0, 0.0; 0.0, 5.0];
        let mut s = DVector::zeros(2);

        let result = solve(&g, &h, 0.5, &mut s, DEFAULT_MAX_ITERS);

        assert!(result.hard_case);
        assert_abs_diff_eq!(result.lambda, 3.0, epsilon = 1e-10);
        assert_abs_diff_eq!(s.norm(), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(result.model_value, -0.5 * 3.0 * 0.25, epsilon = 1e-10);
    }

    #[test]
    fn poisoned_input_returns_zero_step() {
        let g = dvector![1.0, 1.0];
        let h = DMatrix::from_element(2, 2, f64::NAN);
        let mut s = dvector![7.0, 7.0];

        let result = solve(&g, &h, 1.0, &mut s, DEFAULT_MAX_ITERS);

        assert!(!result.reached_solution);
        assert!(!result.interior);
        assert!(!result.hard_case);
        assert_eq!(result.model_value, 0.0);
        assert_eq!(s, dvector![0.0, 0.0]);
    }

    #[test]
    fn asymmetric_input_is_symmetrized() {
        let g = dvector![1.0, -1.0];
        let h = dmatrix![2.0, 0.5 + 1e-12; 0.5 - 1e-12, 3.0];
        let mut s = DVector::zeros(2);

        let result = solve(&g, &h, 10.0, &mut s, DEFAULT_MAX_ITERS);

        assert!(result.interior);
        assert!(result.reached_solution);
    }

    #[test]
    fn one_dimensional() {
        let g = dvector![4.0];
        let h = dmatrix![2.0];
        let mut s = DVector::zeros(1);

        let result = solve(&g, &h, 1.0, &mut s, DEFAULT_MAX_ITERS);

        assert!(!result.interior);
        assert_abs_diff_eq!(s[0], -1.0, epsilon = 1e-10);
        assert_abs_diff_eq!(result.lambda, 2.0, epsilon = 1e-6);
    }

    fn random_symmetric(rng: &mut StdRng, n: usize) -> DMatrix<f64> {
        let a = DMatrix::from_fn(n, n, |_, _| rng.sample::<f64, _>(StandardNormal));
        (&a + a.transpose()) * 0.5
    }

    fn random_in_ball(rng: &mut StdRng, n: usize, delta: f64) -> DVector<f64> {
        let z = DVector::from_fn(n, |_, _| rng.sample::<f64, _>(StandardNormal));
        let norm = z.norm();
        if norm == 0.0 {
            return z;
        }
        let u: f64 = rng.gen();
        &z * (delta * u.powf(1.0 / n as f64) / norm)
    }

    #[test]
    fn randomized_optimality_properties() {
        let mut rng = StdRng::seed_from_u64(0x7452_6567);

        for case in 0..200 {
            let n = 1 + case % 8;
            let g = DVector::from_fn(n, |_, _| rng.sample::<f64, _>(StandardNormal));
            let h = random_symmetric(&mut rng, n);
            let delta = 0.1 + 2.4 * rng.gen::<f64>();

            let mut s = DVector::zeros(n);
            let result = solve(&g, &h, delta, &mut s, DEFAULT_MAX_ITERS);

            // The step never leaves the ball.
            assert!(
                s.norm() <= delta * (1.0 + 1e-8),
                "case {}: |s| = {} > delta = {}",
                case,
                s.norm(),
                delta
            );

            // The model never increases over the origin.
            let m = model_at(&g, &h, &s);
            assert!(m <= 1e-8, "case {}: m(s) = {}", case, m);
            assert_abs_diff_eq!(result.model_value, m, epsilon = 1e-8);

            // Classification invariants.
            if result.interior {
                assert_eq!(result.lambda, 0.0, "case {}", case);
                assert!(s.norm() < delta, "case {}", case);
            } else {
                assert!(
                    (s.norm() - delta).abs() <= 1e-12,
                    "case {}: |s| = {}, delta = {}",
                    case,
                    s.norm(),
                    delta
                );
            }

            if result.hard_case {
                let (w, _) = crate::linalg::eigh(&h);
                assert_abs_diff_eq!(result.lambda, -w[0], epsilon = 1e-4);
            }

            // No feasible competitor does better (up to tolerance).
            for _ in 0..30 {
                let competitor = random_in_ball(&mut rng, n, delta);
                let m_competitor = model_at(&g, &h, &competitor);
                assert!(
                    m <= m_competitor + 1e-8,
                    "case {}: m(s) = {} beaten by {}",
                    case,
                    m,
                    m_competitor
                );
            }
        }
    }
}

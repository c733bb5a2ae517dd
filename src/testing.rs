//! Benchmark objectives with analytic derivatives for exercising the
//! optimizers.
//!
//! Start with [`Sphere`] or [`ScaledQuadratic`]; the others each probe one
//! specific difficulty: [`Quartic`] has a singular Hessian in the solution,
//! [`DoubleWell`] starts optimizers at a point of negative curvature,
//! [`ConstrainedSphere`] puts the minimum on the boundary of the feasible
//! box and [`ExtendedRosenbrock`] is the classic curved valley.
//!
//! # References
//!
//! \[1\] [A Literature Survey of Benchmark Functions For Global Optimization
//! Problems](https://arxiv.org/abs/1308.4008)
//!
//! \[2\] [Numerical Methods for Unconstrained Optimization and Nonlinear
//! Equations](https://epubs.siam.org/doi/book/10.1137/1.9781611971200)

#![allow(unused)]

use nalgebra::{
    dvector,
    storage::{Storage, StorageMut},
    DVector, Dyn, IsContiguous, OMatrix, OVector, Vector,
};

use crate::core::{Domain, Function, Gradient, Hessian, Problem};

/// Testing add-on for [`Problem`] types: canonical starting points.
pub trait TestProblem: Problem {
    /// Canonical starting points of the problem. Benchmarks should prefer
    /// these so that every method faces the same task.
    fn initials(&self) -> Vec<OVector<Self::Field, Dyn>>;
}

/// Testing add-on for [`Function`] types: known optima.
pub trait TestFunction: Function + TestProblem {
    /// All known global minimizers.
    fn optima(&self) -> Vec<OVector<Self::Field, Dyn>>;

    /// Checks whether `x` lies within `eps` of some known minimizer.
    fn is_optimum<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>, eps: Self::Field) -> bool
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        self.optima().iter().any(|optimum| (optimum - x).norm() <= eps)
    }
}

/// [Sphere
/// function](https://en.wikipedia.org/wiki/Test_functions_for_optimization)
/// \[1\].
///
/// A trivial convex paraboloid for early development and sanity checking.
#[derive(Debug, Clone, Copy)]
pub struct Sphere {
    n: usize,
}

impl Sphere {
    /// Creates the paraboloid in `n` variables.
    pub fn new(n: usize) -> Self {
        assert!(n > 0, "dimension must be positive");
        Self { n }
    }
}

impl Default for Sphere {
    fn default() -> Self {
        Self::new(2)
    }
}

impl Problem for Sphere {
    type Field = f64;

    fn domain(&self) -> Domain<Self::Field> {
        Domain::unconstrained(self.n)
    }
}

impl Function for Sphere {
    fn apply<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        x.iter().map(|xi| xi * xi).sum()
    }
}

impl Gradient for Sphere {
    fn gradient<Sx, Sg>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        g: &mut Vector<Self::Field, Dyn, Sg>,
    ) where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sg: StorageMut<Self::Field, Dyn>,
    {
        for i in 0..self.n {
            g[i] = 2.0 * x[i];
        }
    }
}

impl Hessian for Sphere {
    fn hessian<Sx>(&self, _x: &Vector<Self::Field, Dyn, Sx>, h: &mut OMatrix<Self::Field, Dyn, Dyn>)
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        h.fill(0.0);
        h.fill_diagonal(2.0);
    }
}

impl TestProblem for Sphere {
    fn initials(&self) -> Vec<OVector<Self::Field, Dyn>> {
        vec![DVector::from_element(self.n, 10.0)]
    }
}

impl TestFunction for Sphere {
    fn optima(&self) -> Vec<OVector<Self::Field, Dyn>> {
        vec![DVector::zeros(self.n)]
    }
}

/// Axis-aligned convex quadratic `f(x) = ½ Σ cᵢ xᵢ²` with positive
/// coefficients.
///
/// Mild anisotropy makes it a step up from [`Sphere`] while the minimizer
/// stays at the origin.
#[derive(Debug, Clone)]
pub struct ScaledQuadratic {
    coeffs: DVector<f64>,
}

impl ScaledQuadratic {
    /// Creates the quadratic with the given axis coefficients.
    ///
    /// # Panics
    ///
    /// Panics if the coefficients are empty or not all positive.
    pub fn new(coeffs: Vec<f64>) -> Self {
        assert!(!coeffs.is_empty(), "coefficients must not be empty");
        assert!(
            coeffs.iter().all(|c| *c > 0.0),
            "coefficients must be positive"
        );
        Self {
            coeffs: DVector::from_vec(coeffs),
        }
    }
}

impl Problem for ScaledQuadratic {
    type Field = f64;

    fn domain(&self) -> Domain<Self::Field> {
        Domain::unconstrained(self.coeffs.len())
    }
}

impl Function for ScaledQuadratic {
    fn apply<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        0.5 * x
            .iter()
            .zip(self.coeffs.iter())
            .map(|(xi, ci)| ci * xi * xi)
            .sum::<f64>()
    }
}

impl Gradient for ScaledQuadratic {
    fn gradient<Sx, Sg>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        g: &mut Vector<Self::Field, Dyn, Sg>,
    ) where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sg: StorageMut<Self::Field, Dyn>,
    {
        for i in 0..self.coeffs.len() {
            g[i] = self.coeffs[i] * x[i];
        }
    }
}

impl Hessian for ScaledQuadratic {
    fn hessian<Sx>(&self, _x: &Vector<Self::Field, Dyn, Sx>, h: &mut OMatrix<Self::Field, Dyn, Dyn>)
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        h.fill(0.0);
        h.set_diagonal(&self.coeffs);
    }
}

impl TestProblem for ScaledQuadratic {
    fn initials(&self) -> Vec<OVector<Self::Field, Dyn>> {
        vec![DVector::from_element(self.coeffs.len(), 100.0)]
    }
}

impl TestFunction for ScaledQuadratic {
    fn optima(&self) -> Vec<OVector<Self::Field, Dyn>> {
        vec![DVector::zeros(self.coeffs.len())]
    }
}

/// One-dimensional quartic `f(x) = (x − t)⁴`.
///
/// Both the gradient and the Hessian vanish in the solution, which exposes
/// methods that rely on positive definiteness near the optimum.
#[derive(Debug, Clone, Copy)]
pub struct Quartic {
    target: f64,
}

impl Quartic {
    /// Creates the quartic with its minimizer at `target`.
    pub fn new(target: f64) -> Self {
        Self { target }
    }
}

impl Default for Quartic {
    fn default() -> Self {
        Self::new(5.0)
    }
}

impl Problem for Quartic {
    type Field = f64;

    fn domain(&self) -> Domain<Self::Field> {
        Domain::unconstrained(1)
    }
}

impl Function for Quartic {
    fn apply<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        (x[0] - self.target).powi(4)
    }
}

impl Gradient for Quartic {
    fn gradient<Sx, Sg>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        g: &mut Vector<Self::Field, Dyn, Sg>,
    ) where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sg: StorageMut<Self::Field, Dyn>,
    {
        g[0] = 4.0 * (x[0] - self.target).powi(3);
    }
}

impl Hessian for Quartic {
    fn hessian<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>, h: &mut OMatrix<Self::Field, Dyn, Dyn>)
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        h[(0, 0)] = 12.0 * (x[0] - self.target).powi(2);
    }
}

impl TestProblem for Quartic {
    fn initials(&self) -> Vec<OVector<Self::Field, Dyn>> {
        vec![dvector![0.0]]
    }
}

impl TestFunction for Quartic {
    fn optima(&self) -> Vec<OVector<Self::Field, Dyn>> {
        vec![dvector![self.target]]
    }
}

/// [Extended Rosenbrock
/// function](https://en.wikipedia.org/wiki/Rosenbrock_function) \[1,2\], the
/// classic banana-shaped benchmark.
///
/// The minimum sits at the bottom of a narrow curved valley; following the
/// valley floor without overshooting is what makes the problem hard.
#[derive(Debug, Clone, Copy)]
pub struct ExtendedRosenbrock {
    n: usize,
}

impl ExtendedRosenbrock {
    /// Creates the problem in `n` variables, chaining `n − 1` Rosenbrock
    /// terms.
    ///
    /// # Panics
    ///
    /// Panics for `n < 2`.
    pub fn new(n: usize) -> Self {
        assert!(n >= 2, "at least two variables are needed");
        Self { n }
    }
}

impl Default for ExtendedRosenbrock {
    fn default() -> Self {
        Self::new(2)
    }
}

impl Problem for ExtendedRosenbrock {
    type Field = f64;

    fn domain(&self) -> Domain<Self::Field> {
        Domain::unconstrained(self.n)
    }
}

impl Function for ExtendedRosenbrock {
    fn apply<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        (0..self.n - 1)
            .map(|i| {
                let a = 1.0 - x[i];
                let b = x[i + 1] - x[i] * x[i];
                a * a + 100.0 * b * b
            })
            .sum()
    }
}

impl Gradient for ExtendedRosenbrock {
    fn gradient<Sx, Sg>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        g: &mut Vector<Self::Field, Dyn, Sg>,
    ) where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sg: StorageMut<Self::Field, Dyn>,
    {
        g.fill(0.0);
        for i in 0..self.n - 1 {
            let b = x[i + 1] - x[i] * x[i];
            g[i] += -2.0 * (1.0 - x[i]) - 400.0 * x[i] * b;
            g[i + 1] += 200.0 * b;
        }
    }
}

impl Hessian for ExtendedRosenbrock {
    fn hessian<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>, h: &mut OMatrix<Self::Field, Dyn, Dyn>)
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        h.fill(0.0);
        for i in 0..self.n - 1 {
            h[(i, i)] += 1200.0 * x[i] * x[i] - 400.0 * x[i + 1] + 2.0;
            h[(i + 1, i + 1)] += 200.0;
            h[(i, i + 1)] += -400.0 * x[i];
            h[(i + 1, i)] += -400.0 * x[i];
        }
    }
}

impl TestProblem for ExtendedRosenbrock {
    fn initials(&self) -> Vec<OVector<Self::Field, Dyn>> {
        let init = DVector::from_iterator(
            self.n,
            (0..self.n).map(|i| if i % 2 == 0 { -1.2 } else { 1.0 }),
        );

        vec![init]
    }
}

impl TestFunction for ExtendedRosenbrock {
    fn optima(&self) -> Vec<OVector<Self::Field, Dyn>> {
        vec![DVector::from_element(self.n, 1.0)]
    }
}

/// One-dimensional double well `f(x) = x⁴ − 2x²`.
///
/// The origin is a strict local maximum between the two global minima at ±1,
/// so methods started there make progress only if they exploit negative
/// curvature.
#[derive(Debug, Clone, Copy)]
pub struct DoubleWell(());

impl DoubleWell {
    /// Creates the double well.
    pub fn new() -> Self {
        Self(())
    }
}

impl Default for DoubleWell {
    fn default() -> Self {
        Self::new()
    }
}

impl Problem for DoubleWell {
    type Field = f64;

    fn domain(&self) -> Domain<Self::Field> {
        Domain::unconstrained(1)
    }
}

impl Function for DoubleWell {
    fn apply<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        x[0].powi(4) - 2.0 * x[0] * x[0]
    }
}

impl Gradient for DoubleWell {
    fn gradient<Sx, Sg>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        g: &mut Vector<Self::Field, Dyn, Sg>,
    ) where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sg: StorageMut<Self::Field, Dyn>,
    {
        g[0] = 4.0 * x[0].powi(3) - 4.0 * x[0];
    }
}

impl Hessian for DoubleWell {
    fn hessian<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>, h: &mut OMatrix<Self::Field, Dyn, Dyn>)
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        h[(0, 0)] = 12.0 * x[0] * x[0] - 4.0;
    }
}

impl TestProblem for DoubleWell {
    fn initials(&self) -> Vec<OVector<Self::Field, Dyn>> {
        vec![dvector![0.0]]
    }
}

impl TestFunction for DoubleWell {
    fn optima(&self) -> Vec<OVector<Self::Field, Dyn>> {
        vec![dvector![-1.0], dvector![1.0]]
    }
}

/// [`Sphere`] restricted to a rectangular domain.
///
/// When the box does not contain the origin, the minimum lies on the boundary
/// of the feasible region, which exercises the projection path of the
/// optimizers.
#[derive(Debug, Clone)]
pub struct ConstrainedSphere {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl ConstrainedSphere {
    /// Creates the sphere restricted to the given box.
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        assert_eq!(lower.len(), upper.len(), "bounds have different lengths");
        Self { lower, upper }
    }
}

impl Problem for ConstrainedSphere {
    type Field = f64;

    fn domain(&self) -> Domain<Self::Field> {
        Domain::rect(self.lower.clone(), self.upper.clone())
    }
}

impl Function for ConstrainedSphere {
    fn apply<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        x.iter().map(|xi| xi * xi).sum()
    }
}

impl Gradient for ConstrainedSphere {
    fn gradient<Sx, Sg>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        g: &mut Vector<Self::Field, Dyn, Sg>,
    ) where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sg: StorageMut<Self::Field, Dyn>,
    {
        for i in 0..self.lower.len() {
            g[i] = 2.0 * x[i];
        }
    }
}

impl Hessian for ConstrainedSphere {
    fn hessian<Sx>(&self, _x: &Vector<Self::Field, Dyn, Sx>, h: &mut OMatrix<Self::Field, Dyn, Dyn>)
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        h.fill(0.0);
        h.fill_diagonal(2.0);
    }
}

impl TestProblem for ConstrainedSphere {
    fn initials(&self) -> Vec<OVector<Self::Field, Dyn>> {
        vec![DVector::from_iterator(
            self.lower.len(),
            self.lower.iter().zip(self.upper.iter()).map(|(l, u)| 0.5 * (l + u)),
        )]
    }
}

impl TestFunction for ConstrainedSphere {
    fn optima(&self) -> Vec<OVector<Self::Field, Dyn>> {
        vec![DVector::from_iterator(
            self.lower.len(),
            self.lower
                .iter()
                .zip(self.upper.iter())
                .map(|(l, u)| 0.0f64.clamp(*l, *u)),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use nalgebra::{DMatrix, DVector};

    // Analytic derivatives against central differences, so the problems can
    // be trusted by the algorithm tests.
    fn check_derivatives<F: Hessian + Problem<Field = f64>>(f: &F, x: DVector<f64>) {
        let n = x.len();
        let h = 1e-5;

        let mut g = DVector::zeros(n);
        f.gradient(&x, &mut g);

        for i in 0..n {
            let mut xp = x.clone();
            let mut xm = x.clone();
            xp[i] += h;
            xm[i] -= h;
            let expected = (f.apply(&xp) - f.apply(&xm)) / (2.0 * h);
            assert_abs_diff_eq!(g[i], expected, epsilon = 1e-4);
        }

        let mut hess = DMatrix::zeros(n, n);
        f.hessian(&x, &mut hess);

        for j in 0..n {
            let mut xp = x.clone();
            let mut xm = x.clone();
            xp[j] += h;
            xm[j] -= h;

            let mut gp = DVector::zeros(n);
            let mut gm = DVector::zeros(n);
            f.gradient(&xp, &mut gp);
            f.gradient(&xm, &mut gm);

            for i in 0..n {
                let expected = (gp[i] - gm[i]) / (2.0 * h);
                assert_abs_diff_eq!(hess[(i, j)], expected, epsilon = 1e-3);
            }
        }
    }

    #[test]
    fn derivatives_are_consistent() {
        check_derivatives(&Sphere::new(3), DVector::from_vec(vec![1.0, -2.0, 0.5]));
        check_derivatives(
            &ScaledQuadratic::new(vec![1.0, 0.9]),
            DVector::from_vec(vec![3.0, -4.0]),
        );
        check_derivatives(&Quartic::new(5.0), DVector::from_vec(vec![1.5]));
        check_derivatives(
            &ExtendedRosenbrock::new(4),
            DVector::from_vec(vec![-1.2, 1.0, 0.3, 2.0]),
        );
        check_derivatives(&DoubleWell::new(), DVector::from_vec(vec![0.7]));
    }
}

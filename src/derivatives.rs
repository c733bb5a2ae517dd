//! Finite-difference tools for objectives without analytic derivatives.
//!
//! The optimizers in this crate request gradients and Hessians on demand and
//! never differentiate anything themselves. When an objective can only
//! evaluate its value, wrap it in [`FiniteDifference`] to approximate the
//! missing derivatives numerically. Forward differences are used for the
//! gradient and central second differences for the Hessian, with step sizes
//! scaled by the variable magnitudes from the [domain](crate::core::Domain).

use nalgebra::{
    storage::{Storage, StorageMut},
    ComplexField, Dyn, IsContiguous, OMatrix, OVector, RealField as _, Vector,
};
use num_traits::{One, Zero};

use crate::core::{base::RealField, Domain, Function, Gradient, Hessian, Problem};

/// Adapter that provides [`Gradient`] and [`Hessian`] implementations for a
/// value-only objective via finite differences.
///
/// The gradient costs *n* extra evaluations per call and the Hessian
/// `2n² + 1`, so analytic derivatives should be preferred whenever they are
/// available.
pub struct FiniteDifference<F: Problem> {
    f: F,
    magnitude: OVector<F::Field, Dyn>,
}

impl<F: Problem> FiniteDifference<F> {
    /// Wraps the objective.
    pub fn new(f: F) -> Self {
        let magnitude = f.domain().magnitude().clone_owned();
        Self { f, magnitude }
    }

    /// Returns the wrapped objective back.
    pub fn into_inner(self) -> F {
        self.f
    }
}

impl<F: Problem> Problem for FiniteDifference<F> {
    type Field = F::Field;

    fn domain(&self) -> Domain<Self::Field> {
        self.f.domain()
    }
}

impl<F: Function> Function for FiniteDifference<F> {
    fn apply<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        self.f.apply(x)
    }
}

impl<F: Function> Gradient for FiniteDifference<F> {
    fn gradient<Sx, Sg>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        g: &mut Vector<Self::Field, Dyn, Sg>,
    ) where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sg: StorageMut<Self::Field, Dyn>,
    {
        let eps = F::Field::EPSILON_SQRT;
        let zero = F::Field::zero();
        let one = F::Field::one();

        let fx = self.f.apply(x);
        let mut xw = x.clone_owned();

        for j in 0..xw.len() {
            let xj = xw[j];

            // Shrinking the step reduces truncation error but amplifies the
            // cancellation between the two nearly equal function values, so
            // it is sized relative to x_j, with the variable magnitude taking
            // over near zero.
            let magnitude = self.magnitude[j];
            let step = eps * xj.abs().max(magnitude) * one.copysign(xj);
            let step = if step == zero { eps } else { step };

            xw[j] = xj + step;
            g[j] = (self.f.apply(&xw) - fx) / step;
            xw[j] = xj;
        }
    }
}

impl<F: Function> Hessian for FiniteDifference<F> {
    fn hessian<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>, h: &mut OMatrix<Self::Field, Dyn, Dyn>)
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        let eps = F::Field::EPSILON_CBRT;
        let zero = F::Field::zero();
        let two = F::Field::one() + F::Field::one();
        let four = two * two;

        let n = x.len();
        let fx = self.f.apply(x);
        let mut xw = x.clone_owned();

        let step = |xj: F::Field, magnitude: F::Field| {
            let s = eps * xj.abs().max(magnitude);
            if s == zero {
                eps
            } else {
                s
            }
        };

        for i in 0..n {
            let xi = xw[i];
            let si = step(xi, self.magnitude[i]);

            xw[i] = xi + si;
            let fp = self.f.apply(&xw);
            xw[i] = xi - si;
            let fm = self.f.apply(&xw);
            xw[i] = xi;

            h[(i, i)] = (fp - two * fx + fm) / (si * si);

            for j in (i + 1)..n {
                let xj = xw[j];
                let sj = step(xj, self.magnitude[j]);

                xw[i] = xi + si;
                xw[j] = xj + sj;
                let fpp = self.f.apply(&xw);
                xw[j] = xj - sj;
                let fpm = self.f.apply(&xw);
                xw[i] = xi - si;
                let fmm = self.f.apply(&xw);
                xw[j] = xj + sj;
                let fmp = self.f.apply(&xw);
                xw[i] = xi;
                xw[j] = xj;

                let hij = (fpp - fpm - fmp + fmm) / (four * si * sj);
                h[(i, j)] = hij;
                h[(j, i)] = hij;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use nalgebra::{DMatrix, DVector};

    use crate::testing::ExtendedRosenbrock;

    #[test]
    fn gradient_matches_analytic() {
        let f = ExtendedRosenbrock::new(2);
        let fd = FiniteDifference::new(f);

        let x = DVector::from_vec(vec![2.0, 2.0]);

        let mut expected = DVector::zeros(2);
        f.gradient(&x, &mut expected);

        let mut approximate = DVector::zeros(2);
        fd.gradient(&x, &mut approximate);

        assert_abs_diff_eq!(approximate, expected, epsilon = 1e-3);
    }

    #[test]
    fn hessian_matches_analytic() {
        let f = ExtendedRosenbrock::new(2);
        let fd = FiniteDifference::new(f);

        let x = DVector::from_vec(vec![2.0, 2.0]);

        let mut expected = DMatrix::zeros(2, 2);
        f.hessian(&x, &mut expected);

        let mut approximate = DMatrix::zeros(2, 2);
        fd.hessian(&x, &mut approximate);

        assert_abs_diff_eq!(approximate, expected, epsilon = 1e-2);
    }

    #[test]
    fn step_does_not_vanish_at_origin() {
        let f = crate::testing::Sphere::new(1);
        let fd = FiniteDifference::new(f);

        let x = DVector::zeros(1);
        let mut g = DVector::zeros(1);
        fd.gradient(&x, &mut g);

        assert_abs_diff_eq!(g[0], 0.0, epsilon = 1e-6);
    }
}

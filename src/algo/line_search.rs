//! Line searches for first-order optimization methods.
//!
//! A line search picks a step length along a descent direction produced by an
//! algorithm such as [LBFGS](super::lbfgs). Only the sufficient-decrease
//! (Armijo) backtracking strategy is provided; anything implementing
//! [`LineSearch`] can be plugged in instead.

use getset::{CopyGetters, Setters};
use nalgebra::{convert, storage::Storage, Dyn, IsContiguous, OVector, Vector};
use num_traits::One;
use thiserror::Error;

use crate::core::{Gradient, RealField};

/// Error returned when a line search cannot find an acceptable step length.
///
/// Drivers treat this as soft non-convergence rather than a hard failure.
#[derive(Debug, Error)]
#[error("line search could not find a step of sufficient decrease")]
pub struct LineSearchError;

/// Interface for line searches consumed by first-order optimizers.
pub trait LineSearch<F: Gradient> {
    /// Finds a step length `alpha` along `direction` from `x`.
    ///
    /// `fx` is the function value at `x` and `slope` the directional
    /// derivative `g · direction` (negative for descent directions). On
    /// success, writes `x + alpha * direction` into `x_out` and returns
    /// `(alpha, f(x_out), evaluations)`.
    fn search<Sx, Sd>(
        &mut self,
        f: &F,
        x: &Vector<F::Field, Dyn, Sx>,
        direction: &Vector<F::Field, Dyn, Sd>,
        fx: F::Field,
        slope: F::Field,
        x_out: &mut OVector<F::Field, Dyn>,
    ) -> Result<(F::Field, F::Field, usize), LineSearchError>
    where
        Sx: Storage<F::Field, Dyn> + IsContiguous,
        Sd: Storage<F::Field, Dyn>;
}

/// Backtracking line search satisfying the Armijo (sufficient decrease)
/// condition.
///
/// Starts with a unit step and contracts it by a fixed factor until
/// `f(x + alpha * d) <= f(x) + c1 * alpha * (g · d)` holds. A non-finite
/// trial value fails the condition and keeps contracting, so poisoned
/// regions of the objective are backed away from rather than crashed into.
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct Backtracking<T: RealField> {
    /// Sufficient-decrease coefficient. Default: `1e-4`.
    c1: T,
    /// Step contraction factor. Default: `0.5`.
    contraction: T,
    /// Maximum number of contractions before giving up. Default: `40`.
    max_steps: usize,
}

impl<T: RealField> Default for Backtracking<T> {
    fn default() -> Self {
        Self {
            c1: convert(1e-4),
            contraction: convert(0.5),
            max_steps: 40,
        }
    }
}

impl<T: RealField> Backtracking<T> {
    /// Creates the line search with default coefficients.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<F: Gradient> LineSearch<F> for Backtracking<F::Field> {
    fn search<Sx, Sd>(
        &mut self,
        f: &F,
        x: &Vector<F::Field, Dyn, Sx>,
        direction: &Vector<F::Field, Dyn, Sd>,
        fx: F::Field,
        slope: F::Field,
        x_out: &mut OVector<F::Field, Dyn>,
    ) -> Result<(F::Field, F::Field, usize), LineSearchError>
    where
        Sx: Storage<F::Field, Dyn> + IsContiguous,
        Sd: Storage<F::Field, Dyn>,
    {
        let mut alpha = F::Field::one();
        let mut evals = 0;

        for _ in 0..self.max_steps {
            x_out.copy_from(x);
            x_out.axpy(alpha, direction, F::Field::one());

            let f_trial = f.apply(x_out);
            evals += 1;

            if f_trial <= fx + self.c1 * alpha * slope {
                return Ok((alpha, f_trial, evals));
            }

            alpha *= self.contraction;
        }

        Err(LineSearchError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use nalgebra::{dvector, DVector};

    use crate::core::{Domain, Function, Hessian, Problem};

    struct Parabola;

    impl Problem for Parabola {
        type Field = f64;

        fn domain(&self) -> Domain<Self::Field> {
            Domain::unconstrained(1)
        }
    }

    impl Function for Parabola {
        fn apply<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
        where
            Sx: Storage<Self::Field, Dyn> + IsContiguous,
        {
            x[0] * x[0]
        }
    }

    impl Gradient for Parabola {
        fn gradient<Sx, Sg>(
            &self,
            x: &Vector<Self::Field, Dyn, Sx>,
            g: &mut Vector<Self::Field, Dyn, Sg>,
        ) where
            Sx: Storage<Self::Field, Dyn> + IsContiguous,
            Sg: nalgebra::storage::StorageMut<Self::Field, Dyn>,
        {
            g[0] = 2.0 * x[0];
        }
    }

    impl Hessian for Parabola {
        fn hessian<Sx>(
            &self,
            _x: &Vector<Self::Field, Dyn, Sx>,
            h: &mut nalgebra::OMatrix<Self::Field, Dyn, Dyn>,
        ) where
            Sx: Storage<Self::Field, Dyn> + IsContiguous,
        {
            h[(0, 0)] = 2.0;
        }
    }

    #[test]
    fn accepts_descent_step() {
        let f = Parabola;
        let x = dvector![1.0];
        let direction = dvector![-2.0];
        let mut x_out = DVector::zeros(1);

        let mut search = Backtracking::new();
        let (alpha, f_new, evals) = search
            .search(&f, &x, &direction, 1.0, -4.0, &mut x_out)
            .unwrap();

        assert!(alpha > 0.0);
        assert!(f_new < 1.0);
        assert!(evals >= 1);
        assert_eq!(x_out[0], 1.0 + alpha * -2.0);
    }

    #[test]
    fn fails_on_ascent_direction() {
        let f = Parabola;
        let x = dvector![1.0];
        let direction = dvector![2.0];
        let mut x_out = DVector::zeros(1);

        let mut search = Backtracking::new();
        // Deliberately lie about the slope so the Armijo test can never hold.
        let result = search.search(&f, &x, &direction, 1.0, -4.0, &mut x_out);

        assert!(result.is_err());
    }
}

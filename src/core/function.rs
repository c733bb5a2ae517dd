use nalgebra::{
    storage::{Storage, StorageMut},
    Dyn, IsContiguous, OMatrix, Vector,
};

use super::base::Problem;

/// The trait for objectives that can evaluate their value.
///
/// ## Writing an objective
///
/// Implement [`Problem`](super::base::Problem) for the type carrying the
/// parameters of your function and add [`Function`] on top of it.
///
/// ```rust
/// use tern::nalgebra as na;
/// use tern::{Domain, Function, Problem};
/// use na::{Dyn, IsContiguous};
///
/// struct Rosenbrock {
///     a: f64,
///     b: f64,
/// }
///
/// impl Problem for Rosenbrock {
///     // Everything runs in double precision.
///     type Field = f64;
///
///     fn domain(&self) -> Domain<Self::Field> {
///         Domain::unconstrained(2)
///     }
/// }
///
/// impl Function for Rosenbrock {
///     fn apply<Sx>(&self, x: &na::Vector<Self::Field, Dyn, Sx>) -> Self::Field
///     where
///         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
///     {
///         (self.a - x[0]).powi(2) + self.b * (x[1] - x[0].powi(2)).powi(2)
///     }
/// }
/// ```
pub trait Function: Problem {
    /// Evaluates the objective at the given point.
    fn apply<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous;
}

/// The trait for objectives that can evaluate their gradient.
///
/// The derivative-based optimizers in this crate request the gradient on
/// demand; there is no numerical differentiation hidden behind this trait. If
/// only values are available, wrap the function in
/// [`FiniteDifference`](crate::derivatives::FiniteDifference).
pub trait Gradient: Function {
    /// Evaluates the gradient at the given point, writing it into `g`.
    fn gradient<Sx, Sg>(&self, x: &Vector<Self::Field, Dyn, Sx>, g: &mut Vector<Self::Field, Dyn, Sg>)
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sg: StorageMut<Self::Field, Dyn>;
}

/// The trait for objectives that can evaluate their Hessian matrix.
///
/// The Hessian is expected to be symmetric. Consumers are allowed to
/// symmetrize it defensively, so slight asymmetries coming from rounding are
/// not a problem.
pub trait Hessian: Gradient {
    /// Evaluates the Hessian matrix at the given point, writing it into `h`.
    fn hessian<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>, h: &mut OMatrix<Self::Field, Dyn, Dyn>)
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous;
}

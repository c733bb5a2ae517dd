use nalgebra::{storage::StorageMut, Dyn, IsContiguous, Vector};

use super::{base::Problem, domain::Domain, function::Function};

/// Common interface for all optimizers.
///
/// An optimizer is a state machine advanced one iteration at a time:
/// [`opt_next`](Optimizer::opt_next) receives the current variable values,
/// decides on a step and leaves the next iterate behind in the same buffer.
/// A well-behaved implementation drives the iterates toward a minimizer of
/// the objective, though no single call has to make progress; a trust-region
/// method may spend an iteration only shrinking its radius after a rejected
/// step.
///
/// Termination is the caller's responsibility; see
/// [`OptimizerDriver`](crate::driver::OptimizerDriver) for a stopping
/// criterion based loop and
/// [`newton_trust_region`](crate::driver::newton_trust_region) for a driver
/// with full convergence assessment.
pub trait Optimizer<F: Function> {
    /// Name of the optimizer.
    const NAME: &'static str;

    /// Error while computing the next step. This is reserved for programmer
    /// errors such as invalid configuration; numerical difficulties are
    /// expected to be handled (and reported) by the implementations
    /// themselves.
    type Error;

    /// Performs one iteration from the iterate stored in `x`.
    ///
    /// On return, `x` holds the iterate this call produced and the returned
    /// value is exactly what [`Function::apply`] yields there. When the
    /// attempted step is rejected (by a trust-region acceptance test, say),
    /// `x` stays where it was and the value of that unchanged point comes
    /// back.
    ///
    /// Implementations may rely on the caller keeping `x` intact between
    /// consecutive calls.
    fn opt_next<Sx>(
        &mut self,
        f: &F,
        dom: &Domain<F::Field>,
        x: &mut Vector<F::Field, Dyn, Sx>,
    ) -> Result<F::Field, Self::Error>
    where
        Sx: StorageMut<F::Field, Dyn> + IsContiguous;
}

//! High-level API for running the optimization process.
//!
//! Two levels are available. [`newton_trust_region`] runs the
//! [Newton trust-region](crate::algo::trust_region) method to completion with
//! full convergence assessment, iteration/time budgets and optional tracing,
//! and reports everything in an [`OptimizationResult`]:
//!
//! ```rust
//! use tern::nalgebra as na;
//! use tern::{newton_trust_region, Domain, Function, Gradient, Hessian, Options, Problem};
//! use na::{Dyn, IsContiguous};
//!
//! struct Paraboloid;
//!
//! impl Problem for Paraboloid {
//!     type Field = f64;
//!
//!     fn domain(&self) -> Domain<Self::Field> {
//!         Domain::unconstrained(2)
//!     }
//! }
//!
//! impl Function for Paraboloid {
//!     fn apply<Sx>(&self, x: &na::Vector<Self::Field, Dyn, Sx>) -> Self::Field
//!     where
//!         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//!     {
//!         0.5 * (x[0].powi(2) + 0.9 * x[1].powi(2))
//!     }
//! }
//!
//! impl Gradient for Paraboloid {
//!     fn gradient<Sx, Sg>(
//!         &self,
//!         x: &na::Vector<Self::Field, Dyn, Sx>,
//!         g: &mut na::Vector<Self::Field, Dyn, Sg>,
//!     ) where
//!         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//!         Sg: na::storage::StorageMut<Self::Field, Dyn>,
//!     {
//!         g[0] = x[0];
//!         g[1] = 0.9 * x[1];
//!     }
//! }
//!
//! impl Hessian for Paraboloid {
//!     fn hessian<Sx>(
//!         &self,
//!         _x: &na::Vector<Self::Field, Dyn, Sx>,
//!         h: &mut na::OMatrix<Self::Field, Dyn, Dyn>,
//!     ) where
//!         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//!     {
//!         h.fill(0.0);
//!         h[(0, 0)] = 1.0;
//!         h[(1, 1)] = 0.9;
//!     }
//! }
//!
//! let f = Paraboloid;
//! let result = newton_trust_region(&f, vec![127.0, 921.0], Options::default()).unwrap();
//!
//! assert!(result.converged());
//! assert!(result.minimizer.norm() < 1e-2);
//! ```
//!
//! For manual control (or other algorithms), [`OptimizerDriver`] encapsulates
//! the iteration state and leaves the stopping criterion to the caller:
//!
//! ```rust
//! # use tern::nalgebra as na;
//! # use tern::{Domain, Function, Gradient, Hessian, OptimizerDriver, Problem};
//! # use na::{Dyn, IsContiguous};
//! #
//! # struct Paraboloid;
//! #
//! # impl Problem for Paraboloid {
//! #     type Field = f64;
//! #
//! #     fn domain(&self) -> Domain<Self::Field> {
//! #         Domain::unconstrained(2)
//! #     }
//! # }
//! #
//! # impl Function for Paraboloid {
//! #     fn apply<Sx>(&self, x: &na::Vector<Self::Field, Dyn, Sx>) -> Self::Field
//! #     where
//! #         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//! #     {
//! #         0.5 * (x[0].powi(2) + 0.9 * x[1].powi(2))
//! #     }
//! # }
//! #
//! # impl Gradient for Paraboloid {
//! #     fn gradient<Sx, Sg>(
//! #         &self,
//! #         x: &na::Vector<Self::Field, Dyn, Sx>,
//! #         g: &mut na::Vector<Self::Field, Dyn, Sg>,
//! #     ) where
//! #         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//! #         Sg: na::storage::StorageMut<Self::Field, Dyn>,
//! #     {
//! #         g[0] = x[0];
//! #         g[1] = 0.9 * x[1];
//! #     }
//! # }
//! #
//! # impl Hessian for Paraboloid {
//! #     fn hessian<Sx>(
//! #         &self,
//! #         _x: &na::Vector<Self::Field, Dyn, Sx>,
//! #         h: &mut na::OMatrix<Self::Field, Dyn, Dyn>,
//! #     ) where
//! #         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//! #     {
//! #         h.fill(0.0);
//! #         h[(0, 0)] = 1.0;
//! #         h[(1, 1)] = 0.9;
//! #     }
//! # }
//! #
//! let f = Paraboloid;
//! let mut driver = OptimizerDriver::builder(&f)
//!     .with_initial(vec![10.0, -10.0])
//!     .build();
//!
//! let (_, value) = driver
//!     .find(|state| state.fx() < 1e-12 || state.iter() >= 100)
//!     .unwrap();
//! assert!(value < 1e-12);
//! ```

use std::time::{Duration, Instant};

use getset::{CopyGetters, Setters};
use log::info;
use nalgebra::{convert, ComplexField, DVector, Dyn, OVector};
use num_traits::Zero;
use thiserror::Error;

use crate::algo::trust_region::{
    ConfigError, NewtonTrustRegion, NewtonTrustRegionError, TrustRegionOptions,
};
use crate::core::{Domain, Function, Hessian, Optimizer, Problem};

/// Error returned from the high-level drivers before any iteration is made.
///
/// Only programmer errors are reported this way. Numerical difficulties
/// during the iteration (non-finite values, stalled subproblems, exhausted
/// budgets) surface as non-convergence in the [`OptimizationResult`].
#[derive(Debug, Error)]
pub enum Error {
    /// An option value is outside its allowed range.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// The initial point does not match the dimension of the domain.
    #[error("dimension mismatch: the domain has dimension {expected}, the initial point {found}")]
    Dimension {
        /// Dimension of the domain of the objective.
        expected: usize,
        /// Length of the supplied initial point.
        found: usize,
    },
}

/// Reason why the iteration process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// One of the convergence tests was satisfied.
    Converged,
    /// The trust-region size shrank to its allowed minimum.
    DeltaCollapsed,
    /// The iteration budget was exhausted.
    IterationLimit,
    /// The wall-clock limit was exceeded.
    TimeLimit,
    /// The callback requested a stop.
    Callback,
    /// An accepted step increased the function value and
    /// `allow_f_increases` was disabled.
    FunctionIncreased,
}

/// Record of one iteration, stored in the trace and passed to the callback.
#[derive(Debug, Clone)]
pub struct TraceEntry<T: nalgebra::Scalar> {
    /// Iteration number, starting at zero.
    pub iteration: usize,
    /// Function value at the current point.
    pub value: T,
    /// Infinity norm of the gradient at the point the iteration started
    /// from (infinite when the gradient was non-finite).
    pub grad_norm: T,
    /// Trust-region size after the iteration.
    pub delta: T,
    /// Whether the step was accepted.
    pub accepted: bool,
    /// Whether the subproblem solution was interior.
    pub interior: bool,
    /// Whether the subproblem detected the hard case.
    pub hard_case: bool,
    /// Lagrange multiplier of the subproblem norm constraint.
    pub lambda: T,
    /// The current point. Populated only with `extended_trace`.
    pub x: Option<OVector<T, Dyn>>,
}

/// Final report of an optimization run.
#[derive(Debug, Clone)]
pub struct OptimizationResult<T: nalgebra::Scalar> {
    /// The best point found.
    pub minimizer: OVector<T, Dyn>,
    /// Function value at the minimizer.
    pub minimum: T,
    /// Number of performed iterations.
    pub iterations: usize,
    /// Why the process ended.
    pub termination: Termination,
    /// Whether the function-change test `|Δf| ≤ f_tol · |f|` was satisfied.
    pub f_converged: bool,
    /// Whether the gradient test `‖g‖∞ ≤ g_tol` was satisfied.
    pub g_converged: bool,
    /// Whether the step-size test `‖Δx‖∞ ≤ x_tol` was satisfied.
    pub x_converged: bool,
    /// Number of function evaluations.
    pub f_calls: usize,
    /// Number of gradient evaluations.
    pub g_calls: usize,
    /// Number of Hessian evaluations.
    pub h_calls: usize,
    /// Wall-clock time of the run.
    pub elapsed: Duration,
    /// Iteration records. Populated only with `store_trace`.
    pub trace: Option<Vec<TraceEntry<T>>>,
}

impl<T: nalgebra::Scalar> OptimizationResult<T> {
    /// Checks whether any of the convergence tests was satisfied.
    pub fn converged(&self) -> bool {
        self.f_converged || self.g_converged || self.x_converged
    }
}

/// Options for [`newton_trust_region`].
///
/// This is the only configuration surface of the high-level driver; the
/// trust-region fields are forwarded to
/// [`TrustRegionOptions`](crate::algo::trust_region::TrustRegionOptions).
#[derive(CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct Options<P: Problem> {
    /// Initial trust-region size. Default: `1.0`.
    initial_delta: P::Field,
    /// Maximum allowed trust-region size. Default: infinity.
    delta_max: P::Field,
    /// Minimum allowed trust-region size; reaching it terminates the run.
    /// Must be nonnegative. Default: `0`.
    delta_min: P::Field,
    /// Acceptance threshold for the gain ratio, in `[0, 1/4)`. Default:
    /// `0.1`.
    eta: P::Field,
    /// Gain-ratio threshold below which the trust region shrinks. Default:
    /// `0.25`.
    rho_lower: P::Field,
    /// Gain-ratio threshold above which the trust region expands. Default:
    /// `0.75`.
    rho_upper: P::Field,
    /// Gradient convergence tolerance. Default: `1e-8`.
    g_tol: P::Field,
    /// Relative function-change convergence tolerance, tested on accepted
    /// steps. Default: `0`.
    f_tol: P::Field,
    /// Step-size convergence tolerance, tested on accepted steps. Default:
    /// `0`.
    x_tol: P::Field,
    /// Iteration budget. Default: `1000`.
    max_iterations: usize,
    /// Wall-clock budget, checked between iterations. Default: none.
    time_limit: Option<Duration>,
    /// Whether accepted steps may increase the function value (relevant only
    /// with unusual acceptance thresholds). Default: `false`.
    allow_f_increases: bool,
    /// Whether iteration records are kept in the result. Default: `false`.
    store_trace: bool,
    /// Whether iteration records are logged at info level. Default: `false`.
    show_trace: bool,
    /// Whether trace records include the full current point. Default:
    /// `false`.
    extended_trace: bool,
    #[getset(skip)]
    callback: Option<Box<dyn FnMut(&TraceEntry<P::Field>) -> bool>>,
}

impl<P: Problem> Default for Options<P> {
    fn default() -> Self {
        Self {
            initial_delta: convert(1.0),
            delta_max: convert(f64::INFINITY),
            delta_min: convert(0.0),
            eta: convert(0.1),
            rho_lower: convert(0.25),
            rho_upper: convert(0.75),
            g_tol: convert(1e-8),
            f_tol: convert(0.0),
            x_tol: convert(0.0),
            max_iterations: 1000,
            time_limit: None,
            allow_f_increases: false,
            store_trace: false,
            show_trace: false,
            extended_trace: false,
            callback: None,
        }
    }
}

impl<P: Problem> Options<P> {
    /// Sets a callback invoked with the record of every iteration. Returning
    /// `true` stops the run with [`Termination::Callback`].
    pub fn set_callback<C>(&mut self, callback: C) -> &mut Self
    where
        C: FnMut(&TraceEntry<P::Field>) -> bool + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    fn tr_options(&self) -> TrustRegionOptions<P> {
        let mut tr = TrustRegionOptions::default();
        tr.set_delta_init(self.initial_delta)
            .set_delta_max(self.delta_max)
            .set_delta_min(self.delta_min)
            .set_eta(self.eta)
            .set_rho_lower(self.rho_lower)
            .set_rho_upper(self.rho_upper);
        tr
    }
}

/// Minimizes the objective with the Newton trust-region method.
///
/// The initial point is projected into the domain of the objective before the
/// first iteration. Convergence is assessed after every iteration: the
/// gradient test uses the gradient at the point the iteration started from,
/// while the function-change and step-size tests apply to accepted steps. A
/// non-finite value anywhere in the oracle never aborts the run; such steps
/// are rejected, the trust region shrinks and the run ends by one of the
/// budgets without any convergence flag set.
///
/// # Errors
///
/// [`Error::Config`] when an option value is out of its range and
/// [`Error::Dimension`] when the initial point does not match the domain.
/// Both are detected before the first oracle call.
pub fn newton_trust_region<F: Hessian>(
    f: &F,
    x0: Vec<F::Field>,
    options: Options<F>,
) -> Result<OptimizationResult<F::Field>, Error> {
    let start = Instant::now();
    let dom = f.domain();

    if x0.len() != dom.dim() {
        return Err(Error::Dimension {
            expected: dom.dim(),
            found: x0.len(),
        });
    }

    let tr_options = options.tr_options();
    tr_options.validate()?;

    let Options {
        delta_min,
        g_tol,
        f_tol,
        x_tol,
        max_iterations,
        time_limit,
        allow_f_increases,
        store_trace,
        show_trace,
        extended_trace,
        mut callback,
        ..
    } = options;

    let zero = F::Field::zero();

    let mut x = DVector::from_vec(x0);
    dom.project(&mut x);

    let mut algo = NewtonTrustRegion::with_options(f, &dom, tr_options);

    let mut fx = f.apply(&x);
    let driver_f_calls = 1;

    let mut x_prev = x.clone_owned();
    let mut f_prev = fx;

    let mut f_converged = false;
    let mut g_converged = false;
    let mut x_converged = false;
    let mut termination = Termination::IterationLimit;
    let mut iterations = 0;
    let mut trace = if store_trace { Some(Vec::new()) } else { None };

    for iteration in 0..max_iterations {
        fx = match algo.opt_next(f, &dom, &mut x) {
            Ok(value) => value,
            Err(NewtonTrustRegionError::InvalidOptions(error)) => {
                return Err(Error::Config(error))
            }
        };
        iterations = iteration + 1;

        let report = algo.last_step();
        let accepted = report.map(|r| r.accepted).unwrap_or(false);

        g_converged = algo.grad_norm_inf() <= g_tol;

        let mut f_increased = false;
        if accepted {
            let x_change = x
                .iter()
                .zip(x_prev.iter())
                .map(|(a, b)| (*a - *b).abs())
                .fold(zero, |acc, v| if v > acc { v } else { acc });

            x_converged = x_change <= x_tol;
            f_converged = (fx - f_prev).abs() <= f_tol * fx.abs();
            f_increased = fx > f_prev;

            x_prev.copy_from(&x);
            f_prev = fx;
        }

        let entry = TraceEntry {
            iteration,
            value: fx,
            grad_norm: algo.grad_norm_inf(),
            delta: algo.delta(),
            accepted,
            interior: report.map(|r| r.interior).unwrap_or(false),
            hard_case: report.map(|r| r.hard_case).unwrap_or(false),
            lambda: report.map(|r| r.lambda).unwrap_or(zero),
            x: if extended_trace {
                Some(x.clone_owned())
            } else {
                None
            },
        };

        if show_trace {
            info!(
                "iter = {}\tf(x) = {}\t|g| = {}\tdelta = {}\taccepted = {}",
                entry.iteration, entry.value, entry.grad_norm, entry.delta, entry.accepted
            );
        }

        let stop_requested = callback.as_mut().map(|cb| cb(&entry)).unwrap_or(false);

        if let Some(trace) = trace.as_mut() {
            trace.push(entry);
        }

        if g_converged || f_converged || x_converged {
            termination = Termination::Converged;
            break;
        }
        if stop_requested {
            termination = Termination::Callback;
            break;
        }
        if f_increased && !allow_f_increases {
            termination = Termination::FunctionIncreased;
            break;
        }
        if algo.delta() <= delta_min {
            termination = Termination::DeltaCollapsed;
            break;
        }
        if let Some(limit) = time_limit {
            if start.elapsed() >= limit {
                termination = Termination::TimeLimit;
                break;
            }
        }
    }

    Ok(OptimizationResult {
        minimizer: x,
        minimum: fx,
        iterations,
        termination,
        f_converged,
        g_converged,
        x_converged,
        f_calls: algo.f_calls() + driver_f_calls,
        g_calls: algo.g_calls(),
        h_calls: algo.h_calls(),
        elapsed: start.elapsed(),
        trace,
    })
}

/// Builder for the [`OptimizerDriver`].
///
/// Created by [`OptimizerDriver::builder`]. The starting point may be given
/// in plain `Vec` form; it is converted and projected into the domain once
/// the driver is built.
pub struct OptimizerBuilder<'a, F: Problem, A> {
    objective: &'a F,
    dom: Domain<F::Field>,
    algo: A,
    start: Option<Vec<F::Field>>,
}

impl<'a, F: Problem, A> OptimizerBuilder<'a, F, A> {
    /// Sets the starting point of the iteration. The origin is used when no
    /// starting point is given.
    pub fn with_initial(mut self, x0: Vec<F::Field>) -> Self {
        self.start = Some(x0);
        self
    }

    /// Swaps the algorithm driven by the driver.
    ///
    /// The `factory` receives the objective and its domain, so the `new`
    /// constructors of the algorithms in this crate fit directly (e.g.
    /// [`Lbfgs::new`](crate::algo::Lbfgs::new)).
    pub fn with_algo<A2, FA>(self, factory: FA) -> OptimizerBuilder<'a, F, A2>
    where
        FA: FnOnce(&F, &Domain<F::Field>) -> A2,
    {
        let algo = factory(self.objective, &self.dom);

        OptimizerBuilder {
            objective: self.objective,
            dom: self.dom,
            algo,
            start: self.start,
        }
    }

    /// Finishes the construction, placing the starting point inside the
    /// domain.
    pub fn build(self) -> OptimizerDriver<'a, F, A> {
        let mut x = match self.start {
            Some(x0) => DVector::from_vec(x0),
            None => DVector::zeros(self.dom.dim()),
        };
        self.dom.project(&mut x);

        OptimizerDriver {
            objective: self.objective,
            dom: self.dom,
            algo: self.algo,
            x,
            fx: convert(f64::INFINITY),
            iteration: 0,
        }
    }
}

/// Hand-driven loop around an [`Optimizer`].
///
/// In contrast to [`newton_trust_region`], the driver makes no termination
/// decisions on its own: each [`next`](OptimizerDriver::next) call performs
/// exactly one iteration, and [`find`](OptimizerDriver::find) repeats them
/// until the supplied predicate says to stop. See the [module](self)
/// documentation for an example.
pub struct OptimizerDriver<'a, F: Problem, A> {
    objective: &'a F,
    dom: Domain<F::Field>,
    algo: A,
    x: OVector<F::Field, Dyn>,
    fx: F::Field,
    iteration: usize,
}

impl<'a, F: Problem> OptimizerDriver<'a, F, NewtonTrustRegion<F>> {
    /// Starts building a driver. The Newton trust-region method with default
    /// options is preselected; [`with_algo`](OptimizerBuilder::with_algo)
    /// replaces it.
    pub fn builder(f: &'a F) -> OptimizerBuilder<'a, F, NewtonTrustRegion<F>> {
        let dom = f.domain();
        let algo = NewtonTrustRegion::new(f, &dom);

        OptimizerBuilder {
            objective: f,
            dom,
            algo,
            start: None,
        }
    }

    /// Shorthand for [`builder`](OptimizerDriver::builder) with everything
    /// left at its default.
    pub fn new(f: &'a F) -> Self {
        Self::builder(f).build()
    }
}

impl<'a, F: Problem, A> OptimizerDriver<'a, F, A> {
    /// The current point as a slice.
    pub fn x(&self) -> &[F::Field] {
        self.x.as_slice()
    }

    /// The function value belonging to the current point (infinite before
    /// the first iteration).
    pub fn fx(&self) -> F::Field {
        self.fx
    }

    /// How many iterations have been performed.
    pub fn iteration(&self) -> usize {
        self.iteration
    }
}

impl<'a, F: Function, A: Optimizer<F>> OptimizerDriver<'a, F, A> {
    /// Advances the optimization by a single iteration.
    ///
    /// On success the driver state is updated and the new point with its
    /// function value is handed back.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<(&[F::Field], F::Field), A::Error> {
        self.fx = self
            .algo
            .opt_next(self.objective, &self.dom, &mut self.x)?;
        self.iteration += 1;

        Ok((self.x.as_slice(), self.fx))
    }

    /// Iterates until `stop` approves of the state reached after some
    /// iteration, then hands back the final point and value.
    pub fn find<C>(&mut self, mut stop: C) -> Result<(&[F::Field], F::Field), A::Error>
    where
        C: FnMut(IterState<'_, F::Field>) -> bool,
    {
        loop {
            self.next()?;

            let state = IterState {
                point: self.x.as_slice(),
                value: self.fx,
                iteration: self.iteration - 1,
            };

            if stop(state) {
                return Ok((self.x.as_slice(), self.fx));
            }
        }
    }

    /// Name of the driven algorithm.
    pub fn name(&self) -> &str {
        A::NAME
    }
}

/// Snapshot handed to the stopping predicate of
/// [`find`](OptimizerDriver::find).
pub struct IterState<'a, T> {
    point: &'a [T],
    value: T,
    iteration: usize,
}

impl<'a, T: Copy> IterState<'a, T> {
    /// The point reached by the iteration.
    pub fn x(&self) -> &[T] {
        self.point
    }

    /// The function value at that point.
    pub fn fx(&self) -> T {
        self.value
    }

    /// Zero-based index of the iteration that just finished.
    pub fn iter(&self) -> usize {
        self.iteration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use nalgebra::{storage::Storage, Dyn, IsContiguous, OMatrix, Vector};

    use crate::algo::Lbfgs;
    use crate::core::Gradient;
    use crate::derivatives::FiniteDifference;
    use crate::testing::*;

    #[test]
    fn quartic_converges_to_target() {
        let f = Quartic::new(5.0);
        let result = newton_trust_region(&f, vec![0.0], Options::default()).unwrap();

        assert!(result.converged());
        assert!(result.g_converged);
        assert_eq!(result.termination, Termination::Converged);
        assert!(
            (result.minimizer[0] - 5.0).abs() <= 0.01,
            "minimizer = {}",
            result.minimizer[0]
        );
        assert!(result.f_calls > 0);
        assert!(result.h_calls > 0);
    }

    #[test]
    fn scaled_quadratic_from_far_away() {
        let f = ScaledQuadratic::new(vec![1.0, 0.9]);
        let result = newton_trust_region(&f, vec![127.0, 921.0], Options::default()).unwrap();

        assert!(result.converged());
        assert!(result.minimizer.norm() <= 0.01, "x = {:?}", result.minimizer.as_slice());
        assert!(result.minimum <= 1e-8);
    }

    struct PoisonedHessian;

    impl Problem for PoisonedHessian {
        type Field = f64;

        fn domain(&self) -> Domain<Self::Field> {
            Domain::unconstrained(2)
        }
    }

    impl Function for PoisonedHessian {
        fn apply<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
        where
            Sx: Storage<Self::Field, Dyn> + IsContiguous,
        {
            x.norm_squared()
        }
    }

    impl Gradient for PoisonedHessian {
        fn gradient<Sx, Sg>(
            &self,
            x: &Vector<Self::Field, Dyn, Sx>,
            g: &mut Vector<Self::Field, Dyn, Sg>,
        ) where
            Sx: Storage<Self::Field, Dyn> + IsContiguous,
            Sg: nalgebra::storage::StorageMut<Self::Field, Dyn>,
        {
            g[0] = 2.0 * x[0];
            g[1] = 2.0 * x[1];
        }
    }

    impl Hessian for PoisonedHessian {
        fn hessian<Sx>(
            &self,
            _x: &Vector<Self::Field, Dyn, Sx>,
            h: &mut OMatrix<Self::Field, Dyn, Dyn>,
        ) where
            Sx: Storage<Self::Field, Dyn> + IsContiguous,
        {
            h.fill(f64::NAN);
        }
    }

    #[test]
    fn poisoned_hessian_never_converges_and_never_panics() {
        let f = PoisonedHessian;

        let mut options = Options::default();
        options.set_max_iterations(50);

        let result = newton_trust_region(&f, vec![1.0, 1.0], options).unwrap();

        assert!(!result.converged());
        assert!(!result.f_converged);
        assert!(!result.g_converged);
        assert!(!result.x_converged);
        assert_ne!(result.termination, Termination::Converged);
        // The poison must not move the point.
        assert_eq!(result.minimizer.as_slice(), &[1.0, 1.0]);
    }

    #[test]
    fn negative_delta_min_is_a_config_error() {
        let f = Sphere::new(2);

        let mut options = Options::default();
        options.set_delta_min(-1.0);

        let result = newton_trust_region(&f, vec![1.0, 1.0], options);

        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::NegativeDeltaMin))
        ));
    }

    #[test]
    fn dimension_mismatch_is_reported() {
        let f = Sphere::new(2);

        let result = newton_trust_region(&f, vec![1.0, 1.0, 1.0], Options::default());

        assert!(matches!(
            result,
            Err(Error::Dimension {
                expected: 2,
                found: 3
            })
        ));
    }

    #[test]
    fn trace_is_recorded() {
        let f = Quartic::new(5.0);

        let mut options = Options::default();
        options.set_store_trace(true).set_extended_trace(true);

        let result = newton_trust_region(&f, vec![0.0], options).unwrap();

        let trace = result.trace.as_ref().unwrap();
        assert_eq!(trace.len(), result.iterations);
        assert!(trace.iter().all(|entry| entry.x.is_some()));
        assert_eq!(trace[0].iteration, 0);
        // The value along the trace never increases.
        for pair in trace.windows(2) {
            assert!(pair[1].value <= pair[0].value);
        }
    }

    #[test]
    fn callback_stops_the_run() {
        let f = Quartic::new(5.0);

        let mut options = Options::default();
        options.set_callback(|entry: &TraceEntry<f64>| entry.iteration >= 2);

        let result = newton_trust_region(&f, vec![0.0], options).unwrap();

        assert_eq!(result.termination, Termination::Callback);
        assert_eq!(result.iterations, 3);
        assert!(!result.converged());
    }

    #[test]
    fn finite_differences_feed_the_newton_loop() {
        let f = FiniteDifference::new(ExtendedRosenbrock::new(2));

        let mut options = Options::default();
        options.set_g_tol(1e-4);

        let result = newton_trust_region(&f, vec![-1.2, 1.0], options).unwrap();

        assert!(result.converged());
        assert!(
            (result.minimizer[0] - 1.0).abs() <= 1e-2
                && (result.minimizer[1] - 1.0).abs() <= 1e-2,
            "x = {:?}",
            result.minimizer.as_slice()
        );
    }

    #[test]
    fn driver_basic_use_case() {
        let f = Sphere::new(4);
        // Start away from the optimum so the driver has work to do.
        let mut driver = OptimizerDriver::builder(&f)
            .with_initial(vec![10.0; 4])
            .build();

        let (_, value) = driver
            .find(|state| state.iter() >= 100 || state.fx() < 1e-12)
            .unwrap();

        assert!(value <= 1e-12);
        assert_eq!(driver.name(), "Newton trust-region");
    }

    #[test]
    fn driver_custom_algo() {
        let f = Sphere::new(4);
        let mut driver = OptimizerDriver::builder(&f)
            .with_algo(Lbfgs::new)
            // Away from the optimum, as above.
            .with_initial(vec![10.0; 4])
            .build();

        let (_, value) = driver
            .find(|state| state.iter() >= 100 || state.fx() < 1e-12)
            .unwrap();

        assert!(value <= 1e-12);
        assert_eq!(driver.name(), "LBFGS");
    }

    #[test]
    fn driver_initial_in_domain() {
        let f = ConstrainedSphere::new(vec![0.0, 0.0], vec![1.0, 1.0]);
        let driver = OptimizerDriver::builder(&f)
            .with_initial(vec![10.0, -10.0])
            .build();

        assert_eq!(driver.x(), &[1.0, 0.0]);
    }
}

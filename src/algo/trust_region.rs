//! Newton trust-region optimization method.
//!
//! In every iteration, the objective is modeled by the quadratic
//! `m(s) = gᵀs + ½ sᵀHs` built from its exact gradient and Hessian, and the
//! model is minimized over the ball `‖s‖ ≤ Δ` by the
//! [subproblem solver](crate::subproblem). The ratio of the actual to the
//! predicted reduction then drives both the acceptance of the step and the
//! adjustment of the trust-region size Δ. Because the subproblem solver
//! handles indefinite and even entirely pathological Hessians, the method
//! needs no positive-definiteness modification of *H* and escapes saddle
//! points along negative-curvature directions.
//!
//! # References
//!
//! \[1\] [Numerical
//! Optimization](https://link.springer.com/book/10.1007/978-0-387-40065-5)
//!
//! \[2\] [Computing a Trust Region
//! Step](https://epubs.siam.org/doi/10.1137/0904038)

use getset::{CopyGetters, Setters};
use log::debug;
use nalgebra::{
    convert,
    storage::StorageMut,
    DMatrix, DVector, Dyn, IsContiguous, OMatrix, OVector, RealField as _, Vector,
};
use num_traits::Zero;
use thiserror::Error;

use crate::core::{Domain, Hessian, Optimizer, Problem, RealField as _};
use crate::linalg;
use crate::subproblem;

/// Error for an option value outside its allowed range.
///
/// Configuration problems are reported before the first oracle call; they
/// never interrupt a running iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `initial_delta` must be positive.
    #[error("initial_delta must be positive")]
    NonPositiveDeltaInit,
    /// `delta_min` must be nonnegative.
    #[error("delta_min must be nonnegative")]
    NegativeDeltaMin,
    /// `delta_max` must exceed `delta_min`.
    #[error("delta_max must exceed delta_min")]
    DeltaBoundsOrdering,
    /// `eta` must lie in `[0, 1/4)`.
    #[error("eta must lie in [0, 1/4)")]
    EtaOutOfRange,
    /// `rho_lower` must be smaller than `rho_upper`.
    #[error("rho_lower must be smaller than rho_upper")]
    RhoOrdering,
}

/// Options for [`NewtonTrustRegion`] optimizer.
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct TrustRegionOptions<P: Problem> {
    /// Initial trust-region size. Default: `1.0`.
    delta_init: P::Field,
    /// Upper cap on the trust-region size. Default: infinity.
    delta_max: P::Field,
    /// Floor of the trust-region size. Default: `0`.
    delta_min: P::Field,
    /// The step is taken only when the gain ratio exceeds this threshold.
    /// Default: `0.1`.
    eta: P::Field,
    /// Gain ratios below this value shrink the trust region. Default:
    /// `0.25`.
    rho_lower: P::Field,
    /// Gain ratios above this value expand the trust region, provided the
    /// step reached the boundary. Default: `0.75`.
    rho_upper: P::Field,
    /// Iteration budget for the shift root-finder inside the subproblem
    /// solver. Default: [`subproblem::DEFAULT_MAX_ITERS`].
    subproblem_iters: usize,
}

impl<P: Problem> Default for TrustRegionOptions<P> {
    fn default() -> Self {
        Self {
            delta_init: convert(1.0),
            delta_max: convert(f64::INFINITY),
            delta_min: convert(0.0),
            eta: convert(0.1),
            rho_lower: convert(0.25),
            rho_upper: convert(0.75),
            subproblem_iters: subproblem::DEFAULT_MAX_ITERS,
        }
    }
}

impl<P: Problem> TrustRegionOptions<P> {
    /// Checks that all option values are inside their allowed ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let zero = P::Field::zero();
        let quarter: P::Field = convert(0.25);

        if !(self.delta_init > zero) {
            return Err(ConfigError::NonPositiveDeltaInit);
        }
        if !(self.delta_min >= zero) {
            return Err(ConfigError::NegativeDeltaMin);
        }
        if !(self.delta_max > self.delta_min) {
            return Err(ConfigError::DeltaBoundsOrdering);
        }
        if !(self.eta >= zero && self.eta < quarter) {
            return Err(ConfigError::EtaOutOfRange);
        }
        if !(self.rho_lower < self.rho_upper) {
            return Err(ConfigError::RhoOrdering);
        }

        Ok(())
    }
}

/// Error returned from [`NewtonTrustRegion`] optimizer.
#[derive(Debug, Error)]
pub enum NewtonTrustRegionError {
    /// An option value is outside its allowed range.
    #[error("{0}")]
    InvalidOptions(#[from] ConfigError),
}

/// Details of the last iteration performed by [`NewtonTrustRegion`].
#[derive(Debug, Clone, Copy)]
pub struct StepReport<T> {
    /// Whether the step was accepted and the current point moved.
    pub accepted: bool,
    /// Ratio of the actual to the predicted reduction (zero when the trial
    /// value was non-finite or the predicted gain non-positive).
    pub gain_ratio: T,
    /// Norm of the attempted step.
    pub step_norm: T,
    /// Whether the subproblem solution was interior.
    pub interior: bool,
    /// Whether the subproblem detected the hard case.
    pub hard_case: bool,
    /// Lagrange multiplier of the subproblem norm constraint.
    pub lambda: T,
    /// Whether the subproblem root-finder converged.
    pub reached_solution: bool,
}

/// Newton trust-region optimizer.
///
/// Details in the [module](self) documentation.
pub struct NewtonTrustRegion<P: Problem> {
    options: TrustRegionOptions<P>,
    validated: bool,
    delta: P::Field,
    grad: OVector<P::Field, Dyn>,
    hess: OMatrix<P::Field, Dyn, Dyn>,
    step: OVector<P::Field, Dyn>,
    hs: OVector<P::Field, Dyn>,
    x_trial: OVector<P::Field, Dyn>,
    grad_inf: P::Field,
    last: Option<StepReport<P::Field>>,
    n_f: usize,
    n_g: usize,
    n_h: usize,
}

impl<P: Problem> NewtonTrustRegion<P> {
    /// Creates the optimizer with default options.
    pub fn new(p: &P, dom: &Domain<P::Field>) -> Self {
        Self::with_options(p, dom, TrustRegionOptions::default())
    }

    /// Creates the optimizer with the supplied options. Their values are
    /// checked on the first iteration.
    pub fn with_options(_: &P, dom: &Domain<P::Field>, options: TrustRegionOptions<P>) -> Self {
        let dim = dom.dim();

        Self {
            delta: options.delta_init(),
            options,
            validated: false,
            grad: DVector::zeros(dim),
            hess: DMatrix::zeros(dim, dim),
            step: DVector::zeros(dim),
            hs: DVector::zeros(dim),
            x_trial: DVector::zeros(dim),
            grad_inf: P::Field::zero(),
            last: None,
            n_f: 0,
            n_g: 0,
            n_h: 0,
        }
    }

    /// Restores the optimizer to its pre-first-iteration state (evaluation
    /// counters are kept).
    pub fn reset(&mut self) {
        self.delta = self.options.delta_init();
        self.grad_inf = P::Field::zero();
        self.last = None;
    }

    /// Current trust-region size.
    pub fn delta(&self) -> P::Field {
        self.delta
    }

    /// Infinity norm of the gradient at the point the last iteration started
    /// from. Infinite when the gradient contained a non-finite value.
    pub fn grad_norm_inf(&self) -> P::Field {
        self.grad_inf
    }

    /// Details of the last performed iteration, if any.
    pub fn last_step(&self) -> Option<StepReport<P::Field>> {
        self.last
    }

    /// Number of function evaluations performed so far.
    pub fn f_calls(&self) -> usize {
        self.n_f
    }

    /// Number of gradient evaluations performed so far.
    pub fn g_calls(&self) -> usize {
        self.n_g
    }

    /// Number of Hessian evaluations performed so far.
    pub fn h_calls(&self) -> usize {
        self.n_h
    }
}

impl<F: Hessian> Optimizer<F> for NewtonTrustRegion<F> {
    const NAME: &'static str = "Newton trust-region";

    type Error = NewtonTrustRegionError;

    fn opt_next<Sx>(
        &mut self,
        f: &F,
        dom: &Domain<F::Field>,
        x: &mut Vector<F::Field, Dyn, Sx>,
    ) -> Result<F::Field, Self::Error>
    where
        Sx: StorageMut<F::Field, Dyn> + IsContiguous,
    {
        if !self.validated {
            self.options.validate()?;
            self.validated = true;
        }

        let TrustRegionOptions {
            delta_max,
            delta_min,
            eta,
            rho_lower,
            rho_upper,
            subproblem_iters,
            ..
        } = self.options;

        let Self {
            delta,
            grad,
            hess,
            step,
            hs,
            x_trial,
            grad_inf,
            last,
            n_f,
            n_g,
            n_h,
            ..
        } = self;

        let zero = F::Field::zero();
        let one = F::Field::one();
        let two: F::Field = convert(2.0);
        let half: F::Field = convert(0.5);
        let quarter: F::Field = convert(0.25);

        // Query the oracle at the current point.
        let fx = f.apply(x);
        *n_f += 1;
        f.gradient(x, grad);
        *n_g += 1;
        f.hessian(x, hess);
        *n_h += 1;

        *grad_inf = linalg::inf_norm(grad);

        // Minimize the quadratic model over the trust region. The solver
        // copes with indefinite and non-finite Hessians by itself; a
        // worthless step simply fails the acceptance test below.
        let sub = subproblem::solve(grad, hess, *delta, step, subproblem_iters);

        // Form the trial point.
        x.add_to(step, x_trial);

        let not_feasible = dom.project(x_trial);
        if not_feasible {
            debug!("trial point is not feasible, projecting into the domain");

            // The clamped trial point implies a different step.
            x_trial.sub_to(x, step);
        }

        let fx_trial = f.apply(x_trial);
        *n_f += 1;

        // Predicted reduction, recomputed in the full space so that the
        // projection (if any) is accounted for.
        hess.mul_to(step, hs);
        let m_pred = grad.dot(step) + half * step.dot(hs);
        let predicted = -m_pred;

        let trial_valid = fx.is_finite() && fx_trial.is_finite() && predicted.is_finite();

        let gain_ratio = if trial_valid {
            if predicted <= zero {
                // A non-positive predicted gain cannot justify any step. Note
                // that the model value at a zero step is zero, so this also
                // covers a stalled subproblem.
                debug!("no predicted decrease ({}), denying the step", predicted);
                zero
            } else {
                let actual = fx - fx_trial;
                let gain_ratio = actual / predicted;
                debug!(
                    "gain ratio {} (actual {}, predicted {})",
                    gain_ratio, actual, predicted
                );

                gain_ratio
            }
        } else {
            debug!("non-finite trial value, treating the step as infinitely bad");
            zero
        };

        let step_norm = step.norm();

        // Acceptance test.
        let accepted = trial_valid && gain_ratio > eta;
        if accepted {
            x.copy_from(x_trial);
            debug!("accepted step, f = {}", fx_trial);
        } else {
            debug!("rejected step (gain ratio {} vs eta {})", gain_ratio, eta);
        }

        // Adapt the trust-region size.
        let delta_old = *delta;
        if gain_ratio < rho_lower {
            *delta = if step_norm > zero {
                (quarter * step_norm).max(delta_min)
            } else {
                (quarter * delta_old).max(delta_min)
            };
            debug!(
                "delta shrunk: {} -> {} (step norm {})",
                delta_old, *delta, step_norm
            );
        } else if gain_ratio > rho_upper
            && step_norm >= delta_old * (one - F::Field::EPSILON_SQRT)
        {
            *delta = (two * delta_old).min(delta_max);
            debug!(
                "delta expanded: {} -> {} (step norm {})",
                delta_old, *delta, step_norm
            );
        }

        *last = Some(StepReport {
            accepted,
            gain_ratio,
            step_norm,
            interior: sub.interior,
            hard_case: sub.hard_case,
            lambda: sub.lambda,
            reached_solution: sub.reached_solution,
        });

        Ok(if accepted { fx_trial } else { fx })
    }
}

//! Limited-memory BFGS optimization method.
//!
//! [LBFGS](https://en.wikipedia.org/wiki/Limited-memory_BFGS) maintains a
//! bounded history of displacement and gradient-change pairs and applies the
//! inverse-Hessian approximation to the current gradient with the classical
//! two-loop recursion. The history lives in a ring buffer; a pair violating
//! the curvature condition `dxᵀdg > 0` resets the whole history instead of
//! poisoning the approximation.
//!
//! # References
//!
//! \[1\] [Numerical
//! Optimization](https://link.springer.com/book/10.1007/978-0-387-40065-5)
//!
//! \[2\] [Updating Quasi-Newton Matrices with Limited
//! Storage](https://www.ams.org/journals/mcom/1980-35-151/S0025-5718-1980-0572855-7/)

use getset::{CopyGetters, Setters};
use log::debug;
use nalgebra::{
    storage::{Storage, StorageMut},
    DVector, Dyn, IsContiguous, OMatrix, OVector, Vector,
};
use num_traits::Zero;
use thiserror::Error;

use crate::core::{Domain, Gradient, Optimizer, Problem, RealField};
use crate::linalg;

use super::line_search::{Backtracking, LineSearch, LineSearchError};

/// Initial inverse-Hessian guess applied between the two loops of the
/// recursion.
pub trait Preconditioner<T: RealField> {
    /// Computes `out = P⁻¹ q`.
    fn apply(&self, q: &OVector<T, Dyn>, out: &mut OVector<T, Dyn>);
}

/// Preconditioner backed by a Cholesky factorization of a symmetric positive
/// definite matrix.
///
/// The matrix is factored once; every application costs two triangular
/// solves.
pub struct CholeskyPreconditioner<T: RealField> {
    l: OMatrix<T, Dyn, Dyn>,
    lt: OMatrix<T, Dyn, Dyn>,
}

impl<T: RealField> CholeskyPreconditioner<T> {
    /// Factors the given matrix. Returns `None` when it is not positive
    /// definite.
    pub fn new(p: &OMatrix<T, Dyn, Dyn>) -> Option<Self> {
        linalg::cholesky(p).map(|l| {
            let lt = l.transpose();
            Self { l, lt }
        })
    }
}

impl<T: RealField> Preconditioner<T> for CholeskyPreconditioner<T> {
    fn apply(&self, q: &OVector<T, Dyn>, out: &mut OVector<T, Dyn>) {
        let solved = linalg::solve_lower_triangular(&self.l, q)
            .and_then(|y| linalg::solve_upper_triangular(&self.lt, &y));

        match solved {
            Some(z) => out.copy_from(&z),
            // A positive definite factor cannot have a zero diagonal, but if
            // the solve degrades anyway, fall back to the identity.
            None => out.copy_from(q),
        }
    }
}

/// Ring-buffer history of `(dx, dg, rho)` tuples for the two-loop recursion.
pub struct History<T: RealField> {
    memory: usize,
    count: usize,
    dx: Vec<OVector<T, Dyn>>,
    dg: Vec<OVector<T, Dyn>>,
    rho: Vec<T>,
}

impl<T: RealField> History<T> {
    /// Creates an empty history for vectors of dimension `dim`, keeping up to
    /// `memory` most recent pairs.
    pub fn new(dim: usize, memory: usize) -> Self {
        assert!(dim > 0, "dimension must be positive");
        assert!(memory > 0, "memory must be positive");

        Self {
            memory,
            count: 0,
            dx: (0..memory).map(|_| DVector::zeros(dim)).collect(),
            dg: (0..memory).map(|_| DVector::zeros(dim)).collect(),
            rho: vec![T::zero(); memory],
        }
    }

    /// Number of pairs currently stored.
    pub fn len(&self) -> usize {
        self.count.min(self.memory)
    }

    /// Checks whether no pairs are stored.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Forgets all stored pairs.
    pub fn reset(&mut self) {
        self.count = 0;
    }

    /// Stores a displacement/gradient-change pair, overwriting the oldest
    /// slot once the buffer is full.
    ///
    /// If the curvature condition `dxᵀdg > 0` fails (which would make `rho`
    /// non-finite or negative), the history is reset instead and `false` is
    /// returned.
    pub fn push<Sx, Sg>(&mut self, dx: &Vector<T, Dyn, Sx>, dg: &Vector<T, Dyn, Sg>) -> bool
    where
        Sx: Storage<T, Dyn>,
        Sg: Storage<T, Dyn>,
    {
        let curvature = dx.dot(dg);

        if !curvature.is_finite() || curvature <= T::zero() {
            debug!(
                "curvature condition failed (dx . dg = {}), resetting history",
                curvature
            );
            self.count = 0;
            return false;
        }

        let slot = self.count % self.memory;
        self.dx[slot].copy_from(dx);
        self.dg[slot].copy_from(dg);
        self.rho[slot] = T::one() / curvature;
        self.count += 1;

        true
    }

    /// Computes the search direction `-B⁻¹ g` by the two-loop recursion,
    /// writing it into `out`.
    ///
    /// Between the loops, the initial inverse-Hessian guess is the scaled
    /// identity `γI` with `γ = dxᵀdg / ‖dg‖²` of the most recent pair when
    /// `scale_initial` is set and at least one pair is stored, otherwise the
    /// preconditioner when one is supplied, otherwise the identity. On a
    /// fresh or just-reset history this degenerates to (preconditioned)
    /// steepest descent.
    pub fn direction<Sg>(
        &self,
        g: &Vector<T, Dyn, Sg>,
        scale_initial: bool,
        preconditioner: Option<&dyn Preconditioner<T>>,
        out: &mut OVector<T, Dyn>,
    ) where
        Sg: Storage<T, Dyn>,
    {
        let len = self.len();
        let start = self.count - len;

        out.copy_from(g);

        let mut alpha = vec![T::zero(); len];

        for k in (start..self.count).rev() {
            let i = k % self.memory;
            let a = self.rho[i] * self.dx[i].dot(out);
            alpha[k - start] = a;
            out.axpy(-a, &self.dg[i], T::one());
        }

        if scale_initial && len > 0 {
            let last = (self.count - 1) % self.memory;
            let gamma = T::one() / (self.rho[last] * self.dg[last].norm_squared());
            *out *= gamma;
        } else if let Some(preconditioner) = preconditioner {
            let q = out.clone_owned();
            preconditioner.apply(&q, out);
        }

        for k in start..self.count {
            let i = k % self.memory;
            let beta = self.rho[i] * self.dg[i].dot(out);
            out.axpy(alpha[k - start] - beta, &self.dx[i], T::one());
        }

        out.neg_mut();
    }
}

/// Options for [`Lbfgs`] optimizer.
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct LbfgsOptions {
    /// Number of history pairs kept. Default: `10`.
    memory: usize,
    /// Whether the initial inverse-Hessian guess is the scaled identity of
    /// Nocedal–Wright (7.20). Default: `true`.
    scale_initial: bool,
}

impl Default for LbfgsOptions {
    fn default() -> Self {
        Self {
            memory: 10,
            scale_initial: true,
        }
    }
}

/// Error returned from [`Lbfgs`] optimizer.
#[derive(Debug, Error)]
pub enum LbfgsError {
    /// The line search could not find an acceptable step.
    #[error("{0}")]
    LineSearch(#[from] LineSearchError),
}

/// LBFGS optimizer.
///
/// Details in the [module](self) documentation.
pub struct Lbfgs<P: Problem, L = Backtracking<<P as Problem>::Field>> {
    options: LbfgsOptions,
    line_search: L,
    preconditioner: Option<Box<dyn Preconditioner<P::Field>>>,
    history: History<P::Field>,
    x_prev: OVector<P::Field, Dyn>,
    g_prev: OVector<P::Field, Dyn>,
    g: OVector<P::Field, Dyn>,
    direction: OVector<P::Field, Dyn>,
    step_diff: OVector<P::Field, Dyn>,
    grad_diff: OVector<P::Field, Dyn>,
    x_trial: OVector<P::Field, Dyn>,
    grad_inf: P::Field,
    have_prev: bool,
    n_f: usize,
    n_g: usize,
}

impl<P: Problem> Lbfgs<P> {
    /// Creates the optimizer with default options; the backtracking line
    /// search is preselected.
    pub fn new(p: &P, dom: &Domain<P::Field>) -> Self {
        Self::with_options(p, dom, LbfgsOptions::default())
    }

    /// Creates the optimizer with the supplied options; the backtracking
    /// line search is preselected.
    pub fn with_options(_: &P, dom: &Domain<P::Field>, options: LbfgsOptions) -> Self {
        let dim = dom.dim();

        Self {
            history: History::new(dim, options.memory()),
            options,
            line_search: Backtracking::new(),
            preconditioner: None,
            x_prev: DVector::zeros(dim),
            g_prev: DVector::zeros(dim),
            g: DVector::zeros(dim),
            direction: DVector::zeros(dim),
            step_diff: DVector::zeros(dim),
            grad_diff: DVector::zeros(dim),
            x_trial: DVector::zeros(dim),
            grad_inf: P::Field::zero(),
            have_prev: false,
            n_f: 0,
            n_g: 0,
        }
    }
}

impl<P: Problem, L> Lbfgs<P, L> {
    /// Replaces the line search.
    pub fn with_line_search<L2>(self, line_search: L2) -> Lbfgs<P, L2> {
        Lbfgs {
            options: self.options,
            line_search,
            preconditioner: self.preconditioner,
            history: self.history,
            x_prev: self.x_prev,
            g_prev: self.g_prev,
            g: self.g,
            direction: self.direction,
            step_diff: self.step_diff,
            grad_diff: self.grad_diff,
            x_trial: self.x_trial,
            grad_inf: self.grad_inf,
            have_prev: self.have_prev,
            n_f: self.n_f,
            n_g: self.n_g,
        }
    }

    /// Sets the preconditioner used as the initial inverse-Hessian guess when
    /// the scaled-identity guess is disabled or no history is available yet.
    pub fn with_preconditioner(
        mut self,
        preconditioner: Box<dyn Preconditioner<P::Field>>,
    ) -> Self {
        self.preconditioner = Some(preconditioner);
        self
    }

    /// Forgets the history and the remembered previous iterate, as after a
    /// fresh start.
    pub fn reset(&mut self) {
        self.history.reset();
        self.have_prev = false;
    }

    /// Infinity norm of the gradient at the point the last iteration started
    /// from. Infinite when the gradient contained a non-finite value.
    pub fn grad_norm_inf(&self) -> P::Field {
        self.grad_inf
    }

    /// Number of function evaluations performed so far.
    pub fn f_calls(&self) -> usize {
        self.n_f
    }

    /// Number of gradient evaluations performed so far.
    pub fn g_calls(&self) -> usize {
        self.n_g
    }
}

impl<F: Gradient, L: LineSearch<F>> Optimizer<F> for Lbfgs<F, L> {
    const NAME: &'static str = "LBFGS";

    type Error = LbfgsError;

    fn opt_next<Sx>(
        &mut self,
        f: &F,
        dom: &Domain<F::Field>,
        x: &mut Vector<F::Field, Dyn, Sx>,
    ) -> Result<F::Field, Self::Error>
    where
        Sx: StorageMut<F::Field, Dyn> + IsContiguous,
    {
        let zero = F::Field::zero();

        let fx = f.apply(x);
        self.n_f += 1;
        f.gradient(x, &mut self.g);
        self.n_g += 1;
        self.grad_inf = linalg::inf_norm(&self.g);

        if self.have_prev {
            x.sub_to(&self.x_prev, &mut self.step_diff);
            self.g.sub_to(&self.g_prev, &mut self.grad_diff);
            self.history.push(&self.step_diff, &self.grad_diff);
        }

        self.history.direction(
            &self.g,
            self.options.scale_initial(),
            self.preconditioner.as_deref(),
            &mut self.direction,
        );

        let mut slope = self.g.dot(&self.direction);
        if !(slope < zero) {
            // The approximation produced a non-descent (or non-finite)
            // direction. Start over from steepest descent.
            debug!("non-descent direction (slope = {}), resetting history", slope);
            self.history.reset();
            self.direction.copy_from(&self.g);
            self.direction.neg_mut();
            slope = -self.g.norm_squared();
        }

        let (_, mut f_new, evals) =
            self.line_search
                .search(f, x, &self.direction, fx, slope, &mut self.x_trial)?;
        self.n_f += evals;

        if dom.project(&mut self.x_trial) {
            debug!("projected trial point into the domain");
            f_new = f.apply(&self.x_trial);
            self.n_f += 1;
        }

        self.x_prev.copy_from(x);
        self.g_prev.copy_from(&self.g);
        x.copy_from(&self.x_trial);
        self.have_prev = true;

        Ok(f_new)
    }
}

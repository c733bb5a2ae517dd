#![allow(clippy::many_single_char_names)]
#![allow(clippy::type_complexity)]
#![warn(missing_docs)]

//! # Tern
//!
//! A pure Rust implementation of the Newton trust-region method for smooth
//! (bound-constrained) minimization, built around a robust Moré–Sorensen
//! solver for the trust-region subproblem.
//!
//! In every iteration, the objective is modeled by the quadratic formed from
//! its exact gradient and Hessian, and the model is minimized over a ball
//! whose radius adapts to how well the model predicts the objective. The
//! [subproblem solver](subproblem) handles positive definite, indefinite,
//! singular and even entirely non-finite Hessians without ever panicking,
//! including the *hard case* of the underlying theory, so the outer loop
//! needs no positive-definiteness repairs and escapes saddle points through
//! negative-curvature directions. A limited-memory BFGS method with the
//! classical two-loop recursion is provided for problems where Hessians are
//! too expensive.
//!
//! ## Problem
//!
//! The problem is unconstrained or box-constrained smooth minimization:
//!
//! ```text
//! min f(x)    s.t.  Li <= xi <= Ui for some bounds [L, U] for every i
//! ```
//!
//! An infinite bound leaves a variable free from that side, so the purely
//! unconstrained case is just the box with all bounds infinite. Constraints
//! beyond boxes are not supported.
//!
//! In code, the objective is any type that implements the
//! [`Problem`] trait together with the evaluation capabilities it can offer:
//! [`Function`] for values, [`Gradient`] and [`Hessian`] for the analytic
//! derivatives requested by the derivative-based methods. Nothing is
//! differentiated behind your back; if only values are available, the
//! [`FiniteDifference`](derivatives::FiniteDifference) adapter supplies the
//! derivatives numerically.
//!
//! ```rust
//! use tern::nalgebra as na;
//! use tern::{Domain, Function, Gradient, Hessian, Problem};
//! use na::{Dyn, IsContiguous};
//!
//! struct Rosenbrock;
//!
//! impl Problem for Rosenbrock {
//!     // Everything runs in double precision.
//!     type Field = f64;
//!
//!     fn domain(&self) -> Domain<Self::Field> {
//!         Domain::unconstrained(2)
//!     }
//! }
//!
//! impl Function for Rosenbrock {
//!     fn apply<Sx>(&self, x: &na::Vector<Self::Field, Dyn, Sx>) -> Self::Field
//!     where
//!         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//!     {
//!         (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0].powi(2)).powi(2)
//!     }
//! }
//!
//! impl Gradient for Rosenbrock {
//!     // Analytic derivatives; nothing is differentiated numerically.
//!     fn gradient<Sx, Sg>(
//!         &self,
//!         x: &na::Vector<Self::Field, Dyn, Sx>,
//!         g: &mut na::Vector<Self::Field, Dyn, Sg>,
//!     ) where
//!         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//!         Sg: na::storage::StorageMut<Self::Field, Dyn>,
//!     {
//!         g[0] = -2.0 * (1.0 - x[0]) - 400.0 * x[0] * (x[1] - x[0].powi(2));
//!         g[1] = 200.0 * (x[1] - x[0].powi(2));
//!     }
//! }
//!
//! impl Hessian for Rosenbrock {
//!     fn hessian<Sx>(
//!         &self,
//!         x: &na::Vector<Self::Field, Dyn, Sx>,
//!         h: &mut na::OMatrix<Self::Field, Dyn, Dyn>,
//!     ) where
//!         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//!     {
//!         h[(0, 0)] = 2.0 - 400.0 * x[1] + 1200.0 * x[0].powi(2);
//!         h[(0, 1)] = -400.0 * x[0];
//!         h[(1, 0)] = -400.0 * x[0];
//!         h[(1, 1)] = 200.0;
//!     }
//! }
//! ```
//!
//! ## Minimizing
//!
//! With the objective in place, [`newton_trust_region`] runs the whole
//! process and reports the result, the convergence flags and the evaluation
//! counts:
//!
//! ```rust
//! # use tern::nalgebra as na;
//! # use tern::{Domain, Function, Gradient, Hessian, Problem};
//! # use na::{Dyn, IsContiguous};
//! #
//! # struct Rosenbrock;
//! #
//! # impl Problem for Rosenbrock {
//! #     type Field = f64;
//! #
//! #     fn domain(&self) -> Domain<Self::Field> {
//! #         Domain::unconstrained(2)
//! #     }
//! # }
//! #
//! # impl Function for Rosenbrock {
//! #     fn apply<Sx>(&self, x: &na::Vector<Self::Field, Dyn, Sx>) -> Self::Field
//! #     where
//! #         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//! #     {
//! #         (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0].powi(2)).powi(2)
//! #     }
//! # }
//! #
//! # impl Gradient for Rosenbrock {
//! #     fn gradient<Sx, Sg>(
//! #         &self,
//! #         x: &na::Vector<Self::Field, Dyn, Sx>,
//! #         g: &mut na::Vector<Self::Field, Dyn, Sg>,
//! #     ) where
//! #         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//! #         Sg: na::storage::StorageMut<Self::Field, Dyn>,
//! #     {
//! #         g[0] = -2.0 * (1.0 - x[0]) - 400.0 * x[0] * (x[1] - x[0].powi(2));
//! #         g[1] = 200.0 * (x[1] - x[0].powi(2));
//! #     }
//! # }
//! #
//! # impl Hessian for Rosenbrock {
//! #     fn hessian<Sx>(
//! #         &self,
//! #         x: &na::Vector<Self::Field, Dyn, Sx>,
//! #         h: &mut na::OMatrix<Self::Field, Dyn, Dyn>,
//! #     ) where
//! #         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//! #     {
//! #         h[(0, 0)] = 2.0 - 400.0 * x[1] + 1200.0 * x[0].powi(2);
//! #         h[(0, 1)] = -400.0 * x[0];
//! #         h[(1, 0)] = -400.0 * x[0];
//! #         h[(1, 1)] = 200.0;
//! #     }
//! # }
//! #
//! use tern::{newton_trust_region, Options};
//!
//! let f = Rosenbrock;
//! let result = newton_trust_region(&f, vec![-1.2, 1.0], Options::default())
//!     .expect("invalid configuration");
//!
//! assert!(result.g_converged);
//! assert!((result.minimizer[0] - 1.0).abs() < 1e-6);
//! assert!((result.minimizer[1] - 1.0).abs() < 1e-6);
//! ```
//!
//! Numerical pathologies are never errors: a non-finite value coming from the
//! objective makes the affected step rejected and eventually ends the run
//! with all convergence flags unset. Only invalid configuration and dimension
//! mismatches are reported as [`Error`] values, before the first oracle call.
//!
//! ## Algorithms
//!
//! * [Newton trust-region](algo::trust_region) -- Recommended method whenever
//!   Hessians are available; handles indefiniteness and saddle points.
//! * [LBFGS](algo::lbfgs) -- First-order method with a bounded-memory
//!   inverse-Hessian approximation and a pluggable
//!   [line search](algo::line_search).
//!
//! The lower-level building blocks -- the
//! [trust-region subproblem solver](subproblem), the
//! [two-loop recursion](algo::lbfgs::History) and the
//! [linear-algebra primitives](linalg) -- are exposed for reuse in custom
//! drivers.
//!
//! ## License
//!
//! Distributed under the MIT license.

pub mod algo;
mod core;
pub mod derivatives;
pub mod driver;
pub mod linalg;
pub mod subproblem;

pub use core::*;
pub use driver::{
    newton_trust_region, Error, IterState, OptimizationResult, OptimizerBuilder, OptimizerDriver,
    Options, Termination, TraceEntry,
};

#[cfg(feature = "testing")]
pub mod testing;

#[cfg(not(feature = "testing"))]
pub(crate) mod testing;

pub use nalgebra;

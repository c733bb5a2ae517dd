//! Core abstractions and types.
//!
//! As a user of the crate, you describe your objective through [`Problem`],
//! [`Function`], [`Gradient`] and [`Hessian`], and bound its variables with
//! a [`Domain`] when needed; the drivers and algorithms consume nothing
//! else.
//!
//! Writing a new algorithm means implementing [`Optimizer`]. The building
//! blocks in [`linalg`](crate::linalg), [`subproblem`](crate::subproblem)
//! and [`derivatives`](crate::derivatives) are public for exactly that
//! purpose.

mod base;
mod domain;
mod function;
mod optimizer;

pub use base::*;
pub use domain::*;
pub use function::*;
pub use optimizer::*;

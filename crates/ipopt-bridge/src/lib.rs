//! Safe bridge to the IPOPT (Interior Point OPTimizer) C callback interface.
//!
//! A [`Problem`] owns one native problem object and the [`DispatchTable`] of
//! callbacks the solver re-enters while [`Problem::solve`] runs. The bridge
//! only transports values: it never computes derivatives itself.
//!
//! # Usage
//!
//! ```ignore
//! use ipopt_bridge::{Bounds, DispatchTable, IpoptProblem, Iterate, Sparsity};
//! use ipopt_bridge::demo::Hs071;
//!
//! let mut problem = IpoptProblem::new(
//!     Hs071::variable_bounds(),
//!     Hs071::constraint_bounds(),
//!     Hs071::sparsity(),
//!     DispatchTable::from_evaluator(Hs071::default()),
//! )?;
//! problem.set_string_option("mu_strategy", "adaptive")?;
//!
//! let mut iterate = Iterate::new(4, 2).with_point(Hs071::starting_point());
//! let objective = problem.solve(&mut iterate)?;
//! ```
//!
//! # Features
//!
//! * `native`: link `libipopt` and expose [`Ipopt`] / [`IpoptProblem`].
//! * `single-precision`: the native library uses `float` reals.
//! * `demo`: the HS071 example evaluator in [`demo`].
//!
//! # Sparse derivatives
//!
//! Jacobian and Hessian callbacks receive a [`SparseQuery`]. The first
//! structure answer of each is recorded, and any later structure answer that
//! differs, or any coordinate out of range, fails the evaluation.

pub mod buffer;
pub mod callbacks;
pub mod error;
pub mod native;
pub mod options;
pub mod problem;
pub mod solve;
pub mod sparse;
pub mod status;

mod trampoline;

#[cfg(any(test, feature = "demo"))]
pub mod demo;

#[cfg(test)]
mod fake;

pub use ipopt_bridge_sys::{Index, Number};

pub use buffer::{CallScope, ViewError};
pub use callbacks::{DispatchTable, Evaluator, IterationStats};
pub use error::{BoundsKind, Error, Result};
pub use native::{NativeSolver, Version};
pub use options::{OptionValue, SolverOptions};
pub use problem::{Bounds, Problem, Sparsity};
pub use solve::Iterate;
pub use sparse::{SparseQuery, SparsityPattern, StructureError};
pub use status::{Outcome, SolveStatus, StatusError};

#[cfg(feature = "native")]
pub use native::Ipopt;
#[cfg(feature = "native")]
pub use problem::IpoptProblem;

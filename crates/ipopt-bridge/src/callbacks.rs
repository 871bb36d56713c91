//! User-facing callback slots.
//!
//! A [`DispatchTable`] bundles the five evaluation callbacks the native solver
//! needs, plus an optional per-iteration hook. Slots are plain boxed closures;
//! an empty slot is reported to the native solver as a failed evaluation.
//!
//! Problems that keep state across callbacks usually implement [`Evaluator`]
//! and hand it over with [`DispatchTable::from_evaluator`].

use std::fmt;
use std::sync::{Arc, Mutex};

use ipopt_bridge_sys::{Index, Number};
use serde::Serialize;
use tracing::warn;

use crate::sparse::SparseQuery;

/// `(x, new_x, obj) -> ok`
pub type ObjectiveFn = Box<dyn FnMut(&[Number], bool, &mut Number) -> bool + Send>;
/// `(x, new_x, grad_f) -> ok`
pub type GradientFn = Box<dyn FnMut(&[Number], bool, &mut [Number]) -> bool + Send>;
/// `(x, new_x, g) -> ok`
pub type ConstraintsFn = Box<dyn FnMut(&[Number], bool, &mut [Number]) -> bool + Send>;
/// `(x, new_x, query) -> ok`
pub type JacobianFn = Box<dyn FnMut(&[Number], bool, SparseQuery<'_>) -> bool + Send>;
/// `(x, new_x, obj_factor, lambda, new_lambda, query) -> ok`
pub type HessianFn =
    Box<dyn FnMut(&[Number], bool, Number, &[Number], bool, SparseQuery<'_>) -> bool + Send>;
/// `(stats) -> keep_going`
pub type IntermediateFn = Box<dyn FnMut(&IterationStats) -> bool + Send>;

/// Problem functions evaluated by the native solver.
///
/// Every method returns `false` to report that it could not produce a value
/// at the given point; the native solver decides whether to retry or abort.
/// `new_x` and `new_lambda` are caching hints and may be ignored.
pub trait Evaluator {
    fn objective(&mut self, x: &[Number], new_x: bool, obj: &mut Number) -> bool;

    fn gradient(&mut self, x: &[Number], new_x: bool, grad_f: &mut [Number]) -> bool;

    fn constraints(&mut self, x: &[Number], new_x: bool, g: &mut [Number]) -> bool;

    /// Constraint Jacobian, structure or values.
    ///
    /// `x` is empty in structure mode.
    fn jacobian(&mut self, x: &[Number], new_x: bool, query: SparseQuery<'_>) -> bool;

    /// Hessian of `obj_factor * f + sum(lambda[k] * g[k])`, lower triangle.
    ///
    /// `x` and `lambda` are empty in structure mode.
    fn hessian(
        &mut self,
        x: &[Number],
        new_x: bool,
        obj_factor: Number,
        lambda: &[Number],
        new_lambda: bool,
        query: SparseQuery<'_>,
    ) -> bool;
}

/// Progress report passed to the intermediate callback once per iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IterationStats {
    /// 0 in the regular phase, 1 in restoration.
    pub alg_mod: Index,
    pub iter_count: Index,
    pub obj_value: Number,
    /// Primal infeasibility.
    pub inf_pr: Number,
    /// Dual infeasibility.
    pub inf_du: Number,
    pub mu: Number,
    pub d_norm: Number,
    pub regularization_size: Number,
    pub alpha_du: Number,
    pub alpha_pr: Number,
    pub ls_trials: Index,
}

impl IterationStats {
    pub fn in_restoration(&self) -> bool {
        self.alg_mod == 1
    }
}

/// Callback slots owned by a problem for its whole lifetime.
#[derive(Default)]
pub struct DispatchTable {
    objective: Option<ObjectiveFn>,
    gradient: Option<GradientFn>,
    constraints: Option<ConstraintsFn>,
    jacobian: Option<JacobianFn>,
    hessian: Option<HessianFn>,
    intermediate: Option<IntermediateFn>,
}

impl DispatchTable {
    /// A table with every slot empty.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn objective(
        mut self,
        f: impl FnMut(&[Number], bool, &mut Number) -> bool + Send + 'static,
    ) -> Self {
        self.objective = Some(Box::new(f));
        self
    }

    pub fn gradient(
        mut self,
        f: impl FnMut(&[Number], bool, &mut [Number]) -> bool + Send + 'static,
    ) -> Self {
        self.gradient = Some(Box::new(f));
        self
    }

    pub fn constraints(
        mut self,
        f: impl FnMut(&[Number], bool, &mut [Number]) -> bool + Send + 'static,
    ) -> Self {
        self.constraints = Some(Box::new(f));
        self
    }

    pub fn jacobian(
        mut self,
        f: impl FnMut(&[Number], bool, SparseQuery<'_>) -> bool + Send + 'static,
    ) -> Self {
        self.jacobian = Some(Box::new(f));
        self
    }

    pub fn hessian(
        mut self,
        f: impl FnMut(&[Number], bool, Number, &[Number], bool, SparseQuery<'_>) -> bool
            + Send
            + 'static,
    ) -> Self {
        self.hessian = Some(Box::new(f));
        self
    }

    pub fn intermediate(mut self, f: impl FnMut(&IterationStats) -> bool + Send + 'static) -> Self {
        self.intermediate = Some(Box::new(f));
        self
    }

    /// Fill the five evaluation slots from one evaluator.
    pub fn from_evaluator<E: Evaluator + Send + 'static>(evaluator: E) -> Self {
        Self::from_shared(Arc::new(Mutex::new(evaluator)))
    }

    /// Like [`from_evaluator`](Self::from_evaluator), but the caller keeps a
    /// handle to the evaluator to adjust it between solves.
    ///
    /// A poisoned lock fails the evaluation.
    pub fn from_shared<E: Evaluator + Send + 'static>(shared: Arc<Mutex<E>>) -> Self {
        let objective = Arc::clone(&shared);
        let gradient = Arc::clone(&shared);
        let constraints = Arc::clone(&shared);
        let jacobian = Arc::clone(&shared);
        let hessian = shared;

        Self::new()
            .objective(move |x, new_x, obj| {
                with_evaluator(&objective, "objective", |e| e.objective(x, new_x, obj))
            })
            .gradient(move |x, new_x, grad_f| {
                with_evaluator(&gradient, "gradient", |e| e.gradient(x, new_x, grad_f))
            })
            .constraints(move |x, new_x, g| {
                with_evaluator(&constraints, "constraints", |e| e.constraints(x, new_x, g))
            })
            .jacobian(move |x, new_x, query| {
                with_evaluator(&jacobian, "jacobian", |e| e.jacobian(x, new_x, query))
            })
            .hessian(move |x, new_x, obj_factor, lambda, new_lambda, query| {
                with_evaluator(&hessian, "hessian", |e| {
                    e.hessian(x, new_x, obj_factor, lambda, new_lambda, query)
                })
            })
    }

    pub fn has_intermediate(&self) -> bool {
        self.intermediate.is_some()
    }

    pub(crate) fn set_intermediate(&mut self, f: Option<IntermediateFn>) {
        self.intermediate = f;
    }

    pub(crate) fn call_objective(&mut self, x: &[Number], new_x: bool, obj: &mut Number) -> bool {
        match self.objective.as_mut() {
            Some(f) => f(x, new_x, obj),
            None => absent("objective"),
        }
    }

    pub(crate) fn call_gradient(&mut self, x: &[Number], new_x: bool, grad_f: &mut [Number]) -> bool {
        match self.gradient.as_mut() {
            Some(f) => f(x, new_x, grad_f),
            None => absent("gradient"),
        }
    }

    pub(crate) fn call_constraints(&mut self, x: &[Number], new_x: bool, g: &mut [Number]) -> bool {
        match self.constraints.as_mut() {
            Some(f) => f(x, new_x, g),
            None => absent("constraints"),
        }
    }

    pub(crate) fn call_jacobian(&mut self, x: &[Number], new_x: bool, query: SparseQuery<'_>) -> bool {
        match self.jacobian.as_mut() {
            Some(f) => f(x, new_x, query),
            None => absent("jacobian"),
        }
    }

    pub(crate) fn call_hessian(
        &mut self,
        x: &[Number],
        new_x: bool,
        obj_factor: Number,
        lambda: &[Number],
        new_lambda: bool,
        query: SparseQuery<'_>,
    ) -> bool {
        match self.hessian.as_mut() {
            Some(f) => f(x, new_x, obj_factor, lambda, new_lambda, query),
            None => absent("hessian"),
        }
    }

    /// Missing hook means keep going.
    pub(crate) fn call_intermediate(&mut self, stats: &IterationStats) -> bool {
        match self.intermediate.as_mut() {
            Some(f) => f(stats),
            None => true,
        }
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("objective", &self.objective.is_some())
            .field("gradient", &self.gradient.is_some())
            .field("constraints", &self.constraints.is_some())
            .field("jacobian", &self.jacobian.is_some())
            .field("hessian", &self.hessian.is_some())
            .field("intermediate", &self.intermediate.is_some())
            .finish()
    }
}

fn absent(slot: &'static str) -> bool {
    warn!(slot, "callback slot is empty, reporting evaluation failure");
    false
}

fn with_evaluator<E: Evaluator>(
    shared: &Mutex<E>,
    slot: &'static str,
    f: impl FnOnce(&mut E) -> bool,
) -> bool {
    match shared.lock() {
        Ok(mut evaluator) => f(&mut evaluator),
        Err(_) => {
            warn!(slot, "evaluator lock poisoned, reporting evaluation failure");
            false
        }
    }
}

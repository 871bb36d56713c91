//! `extern "C"` entry points the native solver calls back into.
//!
//! Each trampoline recovers the [`EvalContext`] from the opaque user-data
//! pointer, views every raw array through a [`CallScope`], and forwards to the
//! matching [`DispatchTable`] slot. Panics are caught here and reported as a
//! failed evaluation; they never unwind into the native solver.

#![allow(clippy::too_many_arguments)]

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use ipopt_bridge_sys::{Bool, Index, Number, UserDataPtr};
use tracing::{error, trace, warn};

use crate::buffer::{CallScope, ViewError};
use crate::callbacks::{DispatchTable, IterationStats};
use crate::sparse::{SparseQuery, SparsityPattern, StructureLedger};

/// Everything a trampoline can reach: the user's callbacks plus the recorded
/// sparse structures. Owned by the problem, boxed so its address is stable.
#[derive(Debug)]
pub(crate) struct EvalContext {
    pub(crate) table: DispatchTable,
    jacobian_ledger: StructureLedger,
    hessian_ledger: StructureLedger,
}

impl EvalContext {
    pub(crate) fn new(table: DispatchTable, n: Index, m: Index) -> Self {
        Self {
            table,
            jacobian_ledger: StructureLedger::new(m, n),
            hessian_ledger: StructureLedger::new(n, n),
        }
    }

    pub(crate) fn jacobian_structure(&self) -> Option<&SparsityPattern> {
        self.jacobian_ledger.recorded()
    }

    pub(crate) fn hessian_structure(&self) -> Option<&SparsityPattern> {
        self.hessian_ledger.recorded()
    }

    pub(crate) fn as_user_data(&mut self) -> UserDataPtr {
        self as *mut EvalContext as UserDataPtr
    }

    fn jacobian(&mut self, x: &[Number], new_x: bool, query: SparseQuery<'_>) -> bool {
        match query {
            SparseQuery::Structure { rows, cols } => {
                let query = SparseQuery::Structure {
                    rows: &mut *rows,
                    cols: &mut *cols,
                };
                self.table.call_jacobian(x, new_x, query)
                    && record("jacobian", &mut self.jacobian_ledger, rows, cols)
            }
            values => self.table.call_jacobian(x, new_x, values),
        }
    }

    fn hessian(
        &mut self,
        x: &[Number],
        new_x: bool,
        obj_factor: Number,
        lambda: &[Number],
        new_lambda: bool,
        query: SparseQuery<'_>,
    ) -> bool {
        match query {
            SparseQuery::Structure { rows, cols } => {
                let query = SparseQuery::Structure {
                    rows: &mut *rows,
                    cols: &mut *cols,
                };
                self.table
                    .call_hessian(x, new_x, obj_factor, lambda, new_lambda, query)
                    && record("hessian", &mut self.hessian_ledger, rows, cols)
            }
            values => self
                .table
                .call_hessian(x, new_x, obj_factor, lambda, new_lambda, values),
        }
    }
}

fn record(name: &'static str, ledger: &mut StructureLedger, rows: &[Index], cols: &[Index]) -> bool {
    match ledger.check(rows, cols) {
        Ok(()) => true,
        Err(err) => {
            error!(callback = name, error = %err, "sparse structure rejected");
            false
        }
    }
}

/// # Safety
///
/// `user_data` must be null or the pointer produced by [`EvalContext::as_user_data`]
/// for a context that is alive and not otherwise borrowed.
unsafe fn context<'a>(user_data: UserDataPtr) -> Option<&'a mut EvalContext> {
    (user_data as *mut EvalContext).as_mut()
}

/// Run one callback body, converting a panic into a failed evaluation.
fn guard(name: &'static str, body: impl FnOnce() -> bool) -> Bool {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(ok) => ok,
        Err(payload) => {
            error!(
                callback = name,
                panic = panic_message(payload.as_ref()),
                "callback panicked, reporting evaluation failure"
            );
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

fn rejected(name: &'static str, err: ViewError) -> bool {
    warn!(callback = name, error = %err, "rejected foreign buffer");
    false
}

fn missing_context(name: &'static str) -> bool {
    error!(callback = name, "null user data pointer");
    false
}

/// Classify a sparse request by the nullability of `values`.
///
/// # Safety
///
/// Non-null pointers must satisfy [`CallScope::slice_mut`] for `nele` elements.
unsafe fn sparse_query<'s>(
    scope: &CallScope<'s>,
    nele: Index,
    rows: *mut Index,
    cols: *mut Index,
    values: *mut Number,
) -> Result<SparseQuery<'s>, ViewError> {
    if values.is_null() {
        Ok(SparseQuery::Structure {
            rows: scope.slice_mut(rows, nele)?,
            cols: scope.slice_mut(cols, nele)?,
        })
    } else {
        Ok(SparseQuery::Values(scope.slice_mut(values, nele)?))
    }
}

// SAFETY (all trampolines below): the native solver passes arrays sized by the
// accompanying counts and the user data given to its solve call, which the
// problem sets to its own boxed context for the duration of that call only.

pub(crate) extern "C" fn eval_f(
    n: Index,
    x: *const Number,
    new_x: Bool,
    obj_value: *mut Number,
    user_data: UserDataPtr,
) -> Bool {
    const NAME: &str = "eval_f";
    guard(NAME, || {
        let Some(ctx) = (unsafe { context(user_data) }) else {
            return missing_context(NAME);
        };
        CallScope::enter(|scope| {
            let views = unsafe { scope.slice(x, n).and_then(|x| Ok((x, scope.scalar_mut(obj_value)?))) };
            match views {
                Ok((x, obj)) => ctx.table.call_objective(x, new_x, obj),
                Err(err) => rejected(NAME, err),
            }
        })
    })
}

pub(crate) extern "C" fn eval_grad_f(
    n: Index,
    x: *const Number,
    new_x: Bool,
    grad_f: *mut Number,
    user_data: UserDataPtr,
) -> Bool {
    const NAME: &str = "eval_grad_f";
    guard(NAME, || {
        let Some(ctx) = (unsafe { context(user_data) }) else {
            return missing_context(NAME);
        };
        CallScope::enter(|scope| {
            let views = unsafe { scope.slice(x, n).and_then(|x| Ok((x, scope.slice_mut(grad_f, n)?))) };
            match views {
                Ok((x, grad_f)) => ctx.table.call_gradient(x, new_x, grad_f),
                Err(err) => rejected(NAME, err),
            }
        })
    })
}

pub(crate) extern "C" fn eval_g(
    n: Index,
    x: *const Number,
    new_x: Bool,
    m: Index,
    g: *mut Number,
    user_data: UserDataPtr,
) -> Bool {
    const NAME: &str = "eval_g";
    guard(NAME, || {
        let Some(ctx) = (unsafe { context(user_data) }) else {
            return missing_context(NAME);
        };
        CallScope::enter(|scope| {
            let views = unsafe { scope.slice(x, n).and_then(|x| Ok((x, scope.slice_mut(g, m)?))) };
            match views {
                Ok((x, g)) => ctx.table.call_constraints(x, new_x, g),
                Err(err) => rejected(NAME, err),
            }
        })
    })
}

pub(crate) extern "C" fn eval_jac_g(
    n: Index,
    x: *const Number,
    new_x: Bool,
    _m: Index,
    nele_jac: Index,
    i_row: *mut Index,
    j_col: *mut Index,
    values: *mut Number,
    user_data: UserDataPtr,
) -> Bool {
    const NAME: &str = "eval_jac_g";
    guard(NAME, || {
        let Some(ctx) = (unsafe { context(user_data) }) else {
            return missing_context(NAME);
        };
        CallScope::enter(|scope| {
            let views = unsafe {
                scope
                    .slice(x, n)
                    .and_then(|x| Ok((x, sparse_query(scope, nele_jac, i_row, j_col, values)?)))
            };
            match views {
                Ok((x, query)) => {
                    trace!(structure = query.is_structure(), nele_jac, "jacobian request");
                    ctx.jacobian(x, new_x, query)
                }
                Err(err) => rejected(NAME, err),
            }
        })
    })
}

pub(crate) extern "C" fn eval_h(
    n: Index,
    x: *const Number,
    new_x: Bool,
    obj_factor: Number,
    m: Index,
    lambda: *const Number,
    new_lambda: Bool,
    nele_hess: Index,
    i_row: *mut Index,
    j_col: *mut Index,
    values: *mut Number,
    user_data: UserDataPtr,
) -> Bool {
    const NAME: &str = "eval_h";
    guard(NAME, || {
        let Some(ctx) = (unsafe { context(user_data) }) else {
            return missing_context(NAME);
        };
        CallScope::enter(|scope| {
            let views = unsafe {
                scope.slice(x, n).and_then(|x| {
                    let lambda = scope.slice(lambda, m)?;
                    let query = sparse_query(scope, nele_hess, i_row, j_col, values)?;
                    Ok((x, lambda, query))
                })
            };
            match views {
                Ok((x, lambda, query)) => {
                    trace!(structure = query.is_structure(), nele_hess, "hessian request");
                    ctx.hessian(x, new_x, obj_factor, lambda, new_lambda, query)
                }
                Err(err) => rejected(NAME, err),
            }
        })
    })
}

pub(crate) extern "C" fn intermediate(
    alg_mod: Index,
    iter_count: Index,
    obj_value: Number,
    inf_pr: Number,
    inf_du: Number,
    mu: Number,
    d_norm: Number,
    regularization_size: Number,
    alpha_du: Number,
    alpha_pr: Number,
    ls_trials: Index,
    user_data: UserDataPtr,
) -> Bool {
    const NAME: &str = "intermediate";
    guard(NAME, || {
        let Some(ctx) = (unsafe { context(user_data) }) else {
            return missing_context(NAME);
        };
        let stats = IterationStats {
            alg_mod,
            iter_count,
            obj_value,
            inf_pr,
            inf_du,
            mu,
            d_norm,
            regularization_size,
            alpha_du,
            alpha_pr,
            ls_trials,
        };
        ctx.table.call_intermediate(&stats)
    })
}

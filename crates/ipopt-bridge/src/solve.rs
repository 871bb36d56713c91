//! Synchronous solve: marshal buffers, run the native solver, copy back.

use std::ptr;

use ipopt_bridge_sys::Number;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::buffer::NativeBuffer;
use crate::error::{Error, Result};
use crate::native::{NativeSolver, SolveArgs};
use crate::problem::Problem;
use crate::status::SolveStatus;

/// Working buffers for one solve, updated in place with the final iterate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Iterate {
    /// Starting point on entry, final point on exit.
    pub point: Vec<Number>,
    /// Final constraint values, if requested.
    pub constraint_values: Option<Vec<Number>>,
    pub objective: Number,
    pub constraint_multipliers: Vec<Number>,
    pub lower_bound_multipliers: Vec<Number>,
    pub upper_bound_multipliers: Vec<Number>,
}

impl Iterate {
    /// Zero-filled buffers for `n` variables and `m` constraints.
    pub fn new(n: usize, m: usize) -> Self {
        Self {
            point: vec![0.0; n],
            constraint_values: None,
            objective: 0.0,
            constraint_multipliers: vec![0.0; m],
            lower_bound_multipliers: vec![0.0; n],
            upper_bound_multipliers: vec![0.0; n],
        }
    }

    pub fn with_point(mut self, point: Vec<Number>) -> Self {
        self.point = point;
        self
    }

    /// Ask for the final constraint values to be written back.
    pub fn with_constraint_values(mut self) -> Self {
        let m = self.constraint_multipliers.len();
        self.constraint_values = Some(vec![0.0; m]);
        self
    }
}

fn check_len(buffer: &'static str, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(Error::BufferLength {
            buffer,
            expected,
            actual,
        });
    }
    Ok(())
}

impl<S: NativeSolver> Problem<S> {
    /// Solve from `iterate` and leave the solver's final iterate in it.
    ///
    /// The buffers are written back whatever the outcome, so a failed solve
    /// still exposes the last point and multipliers.
    pub fn solve(&mut self, iterate: &mut Iterate) -> Result<Number> {
        self.solve_in_place(
            &mut iterate.point,
            iterate.constraint_values.as_deref_mut(),
            &mut iterate.objective,
            &mut iterate.constraint_multipliers,
            &mut iterate.lower_bound_multipliers,
            &mut iterate.upper_bound_multipliers,
        )
    }

    /// Solve with caller-owned buffers.
    ///
    /// `point`, and the bound multipliers hold `n` entries; the constraint
    /// buffers hold `m`. Each buffer is copied into scratch memory the native
    /// solver owns for the call, and copied back once it returns.
    pub fn solve_in_place(
        &mut self,
        point: &mut [Number],
        constraint_values: Option<&mut [Number]>,
        objective: &mut Number,
        constraint_multipliers: &mut [Number],
        lower_bound_multipliers: &mut [Number],
        upper_bound_multipliers: &mut [Number],
    ) -> Result<Number> {
        let (n, m) = (self.n, self.m);
        check_len("point", point.len(), n)?;
        if let Some(g) = constraint_values.as_deref() {
            check_len("constraint value", g.len(), m)?;
        }
        check_len("constraint multiplier", constraint_multipliers.len(), m)?;
        check_len("lower bound multiplier", lower_bound_multipliers.len(), n)?;
        check_len("upper bound multiplier", upper_bound_multipliers.len(), n)?;

        let mut x = NativeBuffer::copy_of(point);
        let mut g = constraint_values.as_deref().map(NativeBuffer::copy_of);
        let mut mult_g = NativeBuffer::copy_of(constraint_multipliers);
        let mut mult_x_l = NativeBuffer::copy_of(lower_bound_multipliers);
        let mut mult_x_u = NativeBuffer::copy_of(upper_bound_multipliers);
        let mut obj = *objective;

        debug!(n, m, "starting native solve");
        let args = SolveArgs {
            x: x.as_mut_ptr(),
            g: g.as_mut().map_or(ptr::null_mut(), NativeBuffer::as_mut_ptr),
            obj_val: &mut obj,
            mult_g: mult_g.as_mut_ptr(),
            mult_x_l: mult_x_l.as_mut_ptr(),
            mult_x_u: mult_x_u.as_mut_ptr(),
            user_data: self.context.as_user_data(),
        };
        let code = unsafe { S::solve(self.handle, args) };

        x.copy_back(point);
        if let (Some(scratch), Some(host)) = (&g, constraint_values) {
            scratch.copy_back(host);
        }
        mult_g.copy_back(constraint_multipliers);
        mult_x_l.copy_back(lower_bound_multipliers);
        mult_x_u.copy_back(upper_bound_multipliers);
        *objective = obj;

        let status = SolveStatus::from_code(code);
        if status.is_success() {
            info!(?status, code, objective = f64::from(obj), "solve finished");
        } else {
            warn!(?status, code, objective = f64::from(obj), "solve terminated without success");
        }
        status.into_result(code)?;
        Ok(obj)
    }
}

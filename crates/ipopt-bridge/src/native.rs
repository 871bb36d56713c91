//! The C function-call surface the bridge drives.
//!
//! [`NativeSolver`] lists every native entry point the bridge uses. The real
//! library sits behind [`Ipopt`] (feature `native`); the bridge itself is
//! generic over the trait so it can run against any backend honouring the
//! same ABI.

use std::ffi::CStr;
use std::os::raw::c_int;

use ipopt_bridge_sys::{
    Eval_F_CB, Eval_G_CB, Eval_Grad_F_CB, Eval_H_CB, Eval_Jac_G_CB, Index, Intermediate_CB,
    IpoptProblem, Number, UserDataPtr,
};

use crate::trampoline;

/// Function pointers bound into a native problem at creation.
#[derive(Debug, Clone, Copy)]
pub struct Trampolines {
    pub eval_f: Eval_F_CB,
    pub eval_g: Eval_G_CB,
    pub eval_grad_f: Eval_Grad_F_CB,
    pub eval_jac_g: Eval_Jac_G_CB,
    pub eval_h: Eval_H_CB,
}

impl Trampolines {
    /// The bridge's own trampolines. User callbacks are never bound directly.
    pub(crate) fn bridge() -> Self {
        Self {
            eval_f: trampoline::eval_f,
            eval_g: trampoline::eval_g,
            eval_grad_f: trampoline::eval_grad_f,
            eval_jac_g: trampoline::eval_jac_g,
            eval_h: trampoline::eval_h,
        }
    }
}

pub(crate) fn intermediate_trampoline() -> Intermediate_CB {
    trampoline::intermediate
}

/// Bounds and sizes handed to [`NativeSolver::create`].
///
/// Lengths are already validated: `x_l`/`x_u` hold `n` entries and
/// `g_l`/`g_u` hold `m` entries.
#[derive(Debug, Clone, Copy)]
pub struct CreateArgs<'a> {
    pub n: Index,
    pub x_l: &'a [Number],
    pub x_u: &'a [Number],
    pub m: Index,
    pub g_l: &'a [Number],
    pub g_u: &'a [Number],
    pub nele_jac: Index,
    pub nele_hess: Index,
}

/// Working buffers handed to [`NativeSolver::solve`]. `g` may be null.
#[derive(Debug)]
pub struct SolveArgs {
    pub x: *mut Number,
    pub g: *mut Number,
    pub obj_val: *mut Number,
    pub mult_g: *mut Number,
    pub mult_x_l: *mut Number,
    pub mult_x_u: *mut Number,
    pub user_data: UserDataPtr,
}

/// A native interior-point solver reached through the IPOPT C ABI.
///
/// Implemented by zero-sized marker types; every function is associated, so
/// dispatch is static.
///
/// # Safety
///
/// Implementations must follow the IPOPT C interface contract: problems
/// returned by `create` stay valid until `free`, callbacks receive the
/// `user_data` given to `solve`, and callbacks run only on the thread that
/// called `solve` and only while it is running.
pub unsafe trait NativeSolver {
    /// Allocate a problem. Returns null on failure. Bounds are copied.
    ///
    /// # Safety
    ///
    /// `args` must describe consistent lengths.
    unsafe fn create(args: CreateArgs<'_>, callbacks: Trampolines) -> IpoptProblem;

    /// # Safety
    ///
    /// `problem` must come from `create` and not have been freed.
    unsafe fn free(problem: IpoptProblem);

    /// # Safety
    ///
    /// `problem` must be live.
    unsafe fn add_str_option(problem: IpoptProblem, key: &CStr, value: &CStr) -> bool;

    /// # Safety
    ///
    /// `problem` must be live.
    unsafe fn add_int_option(problem: IpoptProblem, key: &CStr, value: Index) -> bool;

    /// # Safety
    ///
    /// `problem` must be live.
    unsafe fn add_num_option(problem: IpoptProblem, key: &CStr, value: Number) -> bool;

    /// # Safety
    ///
    /// `problem` must be live.
    unsafe fn open_output_file(problem: IpoptProblem, path: &CStr, print_level: c_int) -> bool;

    /// # Safety
    ///
    /// `problem` must be live; non-null scaling arrays must hold `n` and `m` entries.
    unsafe fn set_scaling(
        problem: IpoptProblem,
        obj_scaling: Number,
        x_scaling: *const Number,
        g_scaling: *const Number,
    ) -> bool;

    /// # Safety
    ///
    /// `problem` must be live.
    unsafe fn set_intermediate_callback(
        problem: IpoptProblem,
        callback: Option<Intermediate_CB>,
    ) -> bool;

    /// Run the solver to termination and return its raw status code.
    ///
    /// # Safety
    ///
    /// `problem` must be live, buffers must be sized as at creation, and
    /// `user_data` must be valid for every callback made during the call.
    unsafe fn solve(problem: IpoptProblem, args: SolveArgs) -> c_int;
}

/// Version triple of the linked native library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: i32,
    pub minor: i32,
    pub release: i32,
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.release)
    }
}

#[cfg(feature = "native")]
pub use linked::Ipopt;

#[cfg(feature = "native")]
mod linked {
    use super::*;
    use ipopt_bridge_sys as sys;

    /// The linked IPOPT library.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct Ipopt;

    impl Ipopt {
        pub fn version() -> Version {
            let (mut major, mut minor, mut release) = (0, 0, 0);
            unsafe { sys::GetIpoptVersion(&mut major, &mut minor, &mut release) };
            Version {
                major,
                minor,
                release,
            }
        }
    }

    unsafe impl NativeSolver for Ipopt {
        unsafe fn create(args: CreateArgs<'_>, callbacks: Trampolines) -> IpoptProblem {
            sys::CreateIpoptProblem(
                args.n,
                args.x_l.as_ptr(),
                args.x_u.as_ptr(),
                args.m,
                args.g_l.as_ptr(),
                args.g_u.as_ptr(),
                args.nele_jac,
                args.nele_hess,
                sys::C_STYLE_INDEXING,
                callbacks.eval_f,
                callbacks.eval_g,
                callbacks.eval_grad_f,
                callbacks.eval_jac_g,
                callbacks.eval_h,
            )
        }

        unsafe fn free(problem: IpoptProblem) {
            sys::FreeIpoptProblem(problem)
        }

        unsafe fn add_str_option(problem: IpoptProblem, key: &CStr, value: &CStr) -> bool {
            sys::AddIpoptStrOption(problem, key.as_ptr(), value.as_ptr())
        }

        unsafe fn add_int_option(problem: IpoptProblem, key: &CStr, value: Index) -> bool {
            sys::AddIpoptIntOption(problem, key.as_ptr(), value)
        }

        unsafe fn add_num_option(problem: IpoptProblem, key: &CStr, value: Number) -> bool {
            sys::AddIpoptNumOption(problem, key.as_ptr(), value)
        }

        unsafe fn open_output_file(problem: IpoptProblem, path: &CStr, print_level: c_int) -> bool {
            sys::OpenIpoptOutputFile(problem, path.as_ptr(), print_level)
        }

        unsafe fn set_scaling(
            problem: IpoptProblem,
            obj_scaling: Number,
            x_scaling: *const Number,
            g_scaling: *const Number,
        ) -> bool {
            sys::SetIpoptProblemScaling(problem, obj_scaling, x_scaling, g_scaling)
        }

        unsafe fn set_intermediate_callback(
            problem: IpoptProblem,
            callback: Option<Intermediate_CB>,
        ) -> bool {
            sys::SetIntermediateCallback(problem, callback)
        }

        unsafe fn solve(problem: IpoptProblem, args: SolveArgs) -> c_int {
            sys::IpoptSolve(
                problem,
                args.x,
                args.g,
                args.obj_val,
                args.mult_g,
                args.mult_x_l,
                args.mult_x_u,
                args.user_data,
            )
        }
    }
}

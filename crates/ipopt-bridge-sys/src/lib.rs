//! Raw C ABI of the IPOPT (Interior Point OPTimizer) C interface.
//!
//! This crate only declares types and `extern "C"` functions. Nothing here is
//! safe to call directly; the `ipopt-bridge` crate wraps it. The declarations
//! are linked against `libipopt` only when the `link` feature is enabled.
//!
//! Targets the `IpStdCInterface.h` of IPOPT 3.14, where callback flags and
//! return values are C99 `bool`.
//!
//! # Reference
//!
//! Wächter, A., & Biegler, L. T. (2006). On the implementation of an interior-point
//! filter line-search algorithm for large-scale nonlinear programming.
//! *Mathematical Programming*, 106(1), 25-57.

#![allow(non_camel_case_types)]
#![allow(non_snake_case)]

use std::os::raw::{c_char, c_int, c_void};

// ============================================================================
// TYPES
// ============================================================================

/// Floating-point number type (matches `ipnumber` in IPOPT).
#[cfg(not(feature = "single-precision"))]
pub type Number = f64;

/// Floating-point number type (matches `ipnumber` in a single-precision IPOPT build).
#[cfg(feature = "single-precision")]
pub type Number = f32;

/// Index type for vectors/matrices (matches `ipindex` in IPOPT).
pub type Index = c_int;

/// C99 `bool`, ABI-compatible with Rust `bool`.
pub type Bool = bool;

/// Opaque IPOPT problem structure.
#[repr(C)]
pub struct IpoptProblemInfo {
    _private: [u8; 0],
}

/// Pointer to an IPOPT problem.
pub type IpoptProblem = *mut IpoptProblemInfo;

/// User data pointer passed back to every callback.
pub type UserDataPtr = *mut c_void;

/// Index style argument of `CreateIpoptProblem`: 0-based row/column indices.
pub const C_STYLE_INDEXING: Index = 0;

// ============================================================================
// RETURN CODES
// ============================================================================

/// Return codes from `IpoptSolve`.
///
/// `IpoptSolve` is declared to return a raw `c_int`; use [`ApplicationReturnStatus::from_raw`]
/// so that a code this table does not know never becomes an invalid enum value.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplicationReturnStatus {
    SolveSucceeded = 0,
    SolvedToAcceptableLevel = 1,
    InfeasibleProblemDetected = 2,
    SearchDirectionBecomesTooSmall = 3,
    DivergingIterates = 4,
    UserRequestedStop = 5,
    FeasiblePointFound = 6,

    MaximumIterationsExceeded = -1,
    RestorationFailed = -2,
    ErrorInStepComputation = -3,
    MaximumCpuTimeExceeded = -4,
    MaximumWallTimeExceeded = -5,

    NotEnoughDegreesOfFreedom = -10,
    InvalidProblemDefinition = -11,
    InvalidOption = -12,
    InvalidNumberDetected = -13,

    UnrecoverableException = -100,
    NonIpoptExceptionThrown = -101,
    InsufficientMemory = -102,
    InternalError = -199,
}

impl ApplicationReturnStatus {
    /// Every code IPOPT documents, in header order.
    pub const ALL: [ApplicationReturnStatus; 20] = [
        ApplicationReturnStatus::SolveSucceeded,
        ApplicationReturnStatus::SolvedToAcceptableLevel,
        ApplicationReturnStatus::InfeasibleProblemDetected,
        ApplicationReturnStatus::SearchDirectionBecomesTooSmall,
        ApplicationReturnStatus::DivergingIterates,
        ApplicationReturnStatus::UserRequestedStop,
        ApplicationReturnStatus::FeasiblePointFound,
        ApplicationReturnStatus::MaximumIterationsExceeded,
        ApplicationReturnStatus::RestorationFailed,
        ApplicationReturnStatus::ErrorInStepComputation,
        ApplicationReturnStatus::MaximumCpuTimeExceeded,
        ApplicationReturnStatus::MaximumWallTimeExceeded,
        ApplicationReturnStatus::NotEnoughDegreesOfFreedom,
        ApplicationReturnStatus::InvalidProblemDefinition,
        ApplicationReturnStatus::InvalidOption,
        ApplicationReturnStatus::InvalidNumberDetected,
        ApplicationReturnStatus::UnrecoverableException,
        ApplicationReturnStatus::NonIpoptExceptionThrown,
        ApplicationReturnStatus::InsufficientMemory,
        ApplicationReturnStatus::InternalError,
    ];

    /// Look up a raw return code. Returns `None` for codes outside the table.
    pub fn from_raw(code: c_int) -> Option<Self> {
        Self::ALL.iter().copied().find(|status| *status as c_int == code)
    }

    /// The raw integer value IPOPT uses for this code.
    pub fn code(self) -> c_int {
        self as c_int
    }
}

// ============================================================================
// CALLBACK FUNCTION TYPES
// ============================================================================

/// Callback for evaluating objective function f(x).
///
/// # Arguments
/// * `n` - Number of variables
/// * `x` - Variable values (length n)
/// * `new_x` - True if x changed since last call
/// * `obj_value` - Output: objective value f(x)
/// * `user_data` - User data pointer
///
/// # Returns
/// True on success, false on evaluation error.
pub type Eval_F_CB = unsafe extern "C" fn(
    n: Index,
    x: *const Number,
    new_x: Bool,
    obj_value: *mut Number,
    user_data: UserDataPtr,
) -> Bool;

/// Callback for evaluating gradient of objective function ∇f(x).
pub type Eval_Grad_F_CB = unsafe extern "C" fn(
    n: Index,
    x: *const Number,
    new_x: Bool,
    grad_f: *mut Number,
    user_data: UserDataPtr,
) -> Bool;

/// Callback for evaluating constraint functions g(x).
pub type Eval_G_CB = unsafe extern "C" fn(
    n: Index,
    x: *const Number,
    new_x: Bool,
    m: Index,
    g: *mut Number,
    user_data: UserDataPtr,
) -> Bool;

/// Callback for evaluating Jacobian of constraints.
///
/// Called in two modes:
/// 1. `values == NULL`: Fill iRow and jCol with sparsity structure
/// 2. `values != NULL`: Fill values with Jacobian entries (iRow/jCol are NULL)
pub type Eval_Jac_G_CB = unsafe extern "C" fn(
    n: Index,
    x: *const Number,
    new_x: Bool,
    m: Index,
    nele_jac: Index,
    iRow: *mut Index,
    jCol: *mut Index,
    values: *mut Number,
    user_data: UserDataPtr,
) -> Bool;

/// Callback for evaluating Hessian of Lagrangian.
///
/// Computes: σ ∇²f(x) + Σᵢ λᵢ ∇²gᵢ(x)
///
/// Called in two modes:
/// 1. `values == NULL`: Fill iRow and jCol with sparsity structure (lower triangle)
/// 2. `values != NULL`: Fill values with Hessian entries
pub type Eval_H_CB = unsafe extern "C" fn(
    n: Index,
    x: *const Number,
    new_x: Bool,
    obj_factor: Number,
    m: Index,
    lambda: *const Number,
    new_lambda: Bool,
    nele_hess: Index,
    iRow: *mut Index,
    jCol: *mut Index,
    values: *mut Number,
    user_data: UserDataPtr,
) -> Bool;

/// Callback for intermediate iteration info.
///
/// Called once per iteration. Return false to terminate optimization.
pub type Intermediate_CB = unsafe extern "C" fn(
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
) -> Bool;

// ============================================================================
// IPOPT C INTERFACE FUNCTIONS
// ============================================================================

extern "C" {
    /// Create a new IPOPT problem.
    ///
    /// Bounds are copied internally, so the bound arrays may be freed after the call.
    /// Returns NULL on error.
    pub fn CreateIpoptProblem(
        n: Index,
        x_L: *const Number,
        x_U: *const Number,
        m: Index,
        g_L: *const Number,
        g_U: *const Number,
        nele_jac: Index,
        nele_hess: Index,
        index_style: Index,
        eval_f: Eval_F_CB,
        eval_g: Eval_G_CB,
        eval_grad_f: Eval_Grad_F_CB,
        eval_jac_g: Eval_Jac_G_CB,
        eval_h: Eval_H_CB,
    ) -> IpoptProblem;

    /// Free an IPOPT problem.
    pub fn FreeIpoptProblem(ipopt_problem: IpoptProblem);

    /// Add a string option. Returns false if the option could not be set.
    pub fn AddIpoptStrOption(
        ipopt_problem: IpoptProblem,
        keyword: *const c_char,
        val: *const c_char,
    ) -> Bool;

    /// Add a numeric option.
    pub fn AddIpoptNumOption(ipopt_problem: IpoptProblem, keyword: *const c_char, val: Number)
        -> Bool;

    /// Add an integer option.
    pub fn AddIpoptIntOption(ipopt_problem: IpoptProblem, keyword: *const c_char, val: Index)
        -> Bool;

    /// Open output file.
    pub fn OpenIpoptOutputFile(
        ipopt_problem: IpoptProblem,
        file_name: *const c_char,
        print_level: c_int,
    ) -> Bool;

    /// Set problem scaling. `x_scaling` and `g_scaling` may be NULL.
    pub fn SetIpoptProblemScaling(
        ipopt_problem: IpoptProblem,
        obj_scaling: Number,
        x_scaling: *const Number,
        g_scaling: *const Number,
    ) -> Bool;

    /// Set (or clear, with `None`) the intermediate callback.
    pub fn SetIntermediateCallback(
        ipopt_problem: IpoptProblem,
        intermediate_cb: Option<Intermediate_CB>,
    ) -> Bool;

    /// Solve the optimization problem.
    ///
    /// # Arguments
    /// * `x` - Input: starting point; Output: optimal solution (length n)
    /// * `g` - Output: constraint values at solution (length m), or NULL
    /// * `obj_val` - Output: objective value at solution, or NULL
    /// * `mult_g` - Input/Output: constraint multipliers (length m), or NULL
    /// * `mult_x_L` - Input/Output: lower bound multipliers (length n), or NULL
    /// * `mult_x_U` - Input/Output: upper bound multipliers (length n), or NULL
    /// * `user_data` - User data passed to callbacks
    ///
    /// Returns an `ApplicationReturnStatus` code.
    pub fn IpoptSolve(
        ipopt_problem: IpoptProblem,
        x: *mut Number,
        g: *mut Number,
        obj_val: *mut Number,
        mult_g: *mut Number,
        mult_x_L: *mut Number,
        mult_x_U: *mut Number,
        user_data: UserDataPtr,
    ) -> c_int;

    /// Get IPOPT version.
    pub fn GetIpoptVersion(major: *mut c_int, minor: *mut c_int, release: *mut c_int);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_covers_table() {
        for status in ApplicationReturnStatus::ALL {
            assert_eq!(ApplicationReturnStatus::from_raw(status.code()), Some(status));
        }
    }

    #[test]
    fn test_from_raw_rejects_unknown() {
        assert_eq!(ApplicationReturnStatus::from_raw(7), None);
        assert_eq!(ApplicationReturnStatus::from_raw(-6), None);
        assert_eq!(ApplicationReturnStatus::from_raw(-200), None);
    }

    #[test]
    fn test_codes_match_header() {
        assert_eq!(ApplicationReturnStatus::SolveSucceeded.code(), 0);
        assert_eq!(ApplicationReturnStatus::MaximumWallTimeExceeded.code(), -5);
        assert_eq!(ApplicationReturnStatus::InvalidNumberDetected.code(), -13);
        assert_eq!(ApplicationReturnStatus::InternalError.code(), -199);
    }
}

//! In-process stand-in for the native solver, used by unit tests.
//!
//! It honours the same C ABI as the real library: it stores the trampolines it
//! was created with and calls them through raw function pointers, asking for
//! sparse structure first and values afterwards. Its "algorithm" is a
//! projected gradient descent on the objective, which is enough to drive the
//! bridge through every code path.

use std::cell::Cell;
use std::collections::HashMap;
use std::ffi::CStr;
use std::os::raw::c_int;
use std::path::PathBuf;
use std::ptr;

use ipopt_bridge_sys::{
    Index, Intermediate_CB, IpoptProblem, IpoptProblemInfo, Number, UserDataPtr,
};

use crate::native::{CreateArgs, NativeSolver, SolveArgs, Trampolines};
use crate::problem::Problem;

const KNOWN_OPTIONS: &[&str] = &[
    "tol",
    "max_iter",
    "mu_strategy",
    "print_level",
    "output_file",
    "warm_start_init_point",
    "bound_push",
    "bound_frac",
    "linear_solver",
    "hessian_approximation",
];

const STEP: Number = 0.25;

thread_local! {
    static CREATED: Cell<usize> = const { Cell::new(0) };
    static FREED: Cell<usize> = const { Cell::new(0) };
    static SOLVES: Cell<usize> = const { Cell::new(0) };
    static FAIL_NEXT_CREATE: Cell<bool> = const { Cell::new(false) };
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FakeOption {
    Int(Index),
    Num(Number),
    Str(String),
}

/// Everything the fake remembers about one problem.
#[derive(Debug)]
pub(crate) struct FakeState {
    n: Index,
    m: Index,
    x_l: Vec<Number>,
    x_u: Vec<Number>,
    nele_jac: Index,
    nele_hess: Index,
    callbacks: Trampolines,
    options: HashMap<String, FakeOption>,
    pub(crate) intermediate: Option<Intermediate_CB>,
    pub(crate) scaling: Option<(Number, Vec<Number>, Vec<Number>)>,
    pub(crate) output_file: Option<(PathBuf, c_int)>,
    pub(crate) jacobian_structures: Vec<Vec<(Index, Index)>>,
    pub(crate) hessian_structures: Vec<Vec<(Index, Index)>>,
    pub(crate) objective_calls: usize,
}

impl FakeState {
    pub(crate) fn option(&self, key: &str) -> Option<&FakeOption> {
        self.options.get(key)
    }

    fn max_iter(&self) -> Index {
        match self.options.get("max_iter") {
            Some(FakeOption::Int(v)) => *v,
            _ => 3000,
        }
    }

    fn tol(&self) -> Number {
        match self.options.get("tol") {
            Some(FakeOption::Num(v)) => *v,
            _ => 1e-8,
        }
    }
}

/// Marker type for the in-process solver.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FakeSolver;

impl FakeSolver {
    pub(crate) fn created_on_this_thread() -> usize {
        CREATED.with(Cell::get)
    }

    pub(crate) fn freed_on_this_thread() -> usize {
        FREED.with(Cell::get)
    }

    pub(crate) fn solves_on_this_thread() -> usize {
        SOLVES.with(Cell::get)
    }

    /// Make the next `create` on this thread return null.
    pub(crate) fn fail_next_create() {
        FAIL_NEXT_CREATE.with(|flag| flag.set(true));
    }

    pub(crate) fn state(problem: &Problem<FakeSolver>) -> &FakeState {
        unsafe { &*(problem.handle as *const FakeState) }
    }
}

unsafe fn state_mut<'a>(problem: IpoptProblem) -> &'a mut FakeState {
    &mut *(problem as *mut FakeState)
}

/// Read `len` values from a solver-owned buffer.
unsafe fn read(ptr: *const Number, len: Index) -> Vec<Number> {
    if ptr.is_null() {
        return Vec::new();
    }
    std::slice::from_raw_parts(ptr, len as usize).to_vec()
}

unsafe fn write(ptr: *mut Number, values: &[Number]) {
    if !ptr.is_null() {
        std::slice::from_raw_parts_mut(ptr, values.len()).copy_from_slice(values);
    }
}

unsafe impl NativeSolver for FakeSolver {
    unsafe fn create(args: CreateArgs<'_>, callbacks: Trampolines) -> IpoptProblem {
        if FAIL_NEXT_CREATE.with(|flag| flag.replace(false)) {
            return ptr::null_mut();
        }
        CREATED.with(|c| c.set(c.get() + 1));
        let state = Box::new(FakeState {
            n: args.n,
            m: args.m,
            x_l: args.x_l.to_vec(),
            x_u: args.x_u.to_vec(),
            nele_jac: args.nele_jac,
            nele_hess: args.nele_hess,
            callbacks,
            options: HashMap::new(),
            intermediate: None,
            scaling: None,
            output_file: None,
            jacobian_structures: Vec::new(),
            hessian_structures: Vec::new(),
            objective_calls: 0,
        });
        Box::into_raw(state) as *mut IpoptProblemInfo
    }

    unsafe fn free(problem: IpoptProblem) {
        FREED.with(|c| c.set(c.get() + 1));
        drop(Box::from_raw(problem as *mut FakeState));
    }

    unsafe fn add_str_option(problem: IpoptProblem, key: &CStr, value: &CStr) -> bool {
        set(problem, key, FakeOption::Str(value.to_string_lossy().into_owned()))
    }

    unsafe fn add_int_option(problem: IpoptProblem, key: &CStr, value: Index) -> bool {
        set(problem, key, FakeOption::Int(value))
    }

    unsafe fn add_num_option(problem: IpoptProblem, key: &CStr, value: Number) -> bool {
        set(problem, key, FakeOption::Num(value))
    }

    unsafe fn open_output_file(problem: IpoptProblem, path: &CStr, print_level: c_int) -> bool {
        let path = PathBuf::from(path.to_string_lossy().into_owned());
        if std::fs::File::create(&path).is_err() {
            return false;
        }
        state_mut(problem).output_file = Some((path, print_level));
        true
    }

    unsafe fn set_scaling(
        problem: IpoptProblem,
        obj_scaling: Number,
        x_scaling: *const Number,
        g_scaling: *const Number,
    ) -> bool {
        let state = state_mut(problem);
        let x = read(x_scaling, state.n);
        let g = read(g_scaling, state.m);
        state.scaling = Some((obj_scaling, x, g));
        true
    }

    unsafe fn set_intermediate_callback(
        problem: IpoptProblem,
        callback: Option<Intermediate_CB>,
    ) -> bool {
        state_mut(problem).intermediate = callback;
        true
    }

    unsafe fn solve(problem: IpoptProblem, args: SolveArgs) -> c_int {
        SOLVES.with(|c| c.set(c.get() + 1));
        run(state_mut(problem), &args)
    }
}

unsafe fn set(problem: IpoptProblem, key: &CStr, value: FakeOption) -> bool {
    let key = key.to_string_lossy();
    if !KNOWN_OPTIONS.contains(&&*key) {
        return false;
    }
    state_mut(problem).options.insert(key.into_owned(), value);
    true
}

/// Ask both sparse callbacks for their structure and remember the answers.
unsafe fn query_structure(state: &mut FakeState, user_data: UserDataPtr) -> bool {
    let cb = state.callbacks;
    let (n, m) = (state.n, state.m);

    let len = state.nele_jac as usize;
    let (mut rows, mut cols) = (vec![-1; len], vec![-1; len]);
    let ok = (cb.eval_jac_g)(
        n,
        ptr::null(),
        true,
        m,
        state.nele_jac,
        rows.as_mut_ptr(),
        cols.as_mut_ptr(),
        ptr::null_mut(),
        user_data,
    );
    if !ok {
        return false;
    }
    state.jacobian_structures.push(rows.into_iter().zip(cols).collect());

    let len = state.nele_hess as usize;
    let (mut rows, mut cols) = (vec![-1; len], vec![-1; len]);
    let ok = (cb.eval_h)(
        n,
        ptr::null(),
        true,
        1.0,
        m,
        ptr::null(),
        true,
        state.nele_hess,
        rows.as_mut_ptr(),
        cols.as_mut_ptr(),
        ptr::null_mut(),
        user_data,
    );
    if !ok {
        return false;
    }
    state.hessian_structures.push(rows.into_iter().zip(cols).collect());
    true
}

/// Evaluate every callback at `x`. Returns the objective, gradient and
/// constraint values, or `None` on the first failure.
unsafe fn evaluate(
    state: &mut FakeState,
    x: &[Number],
    lambda: &[Number],
    new_x: bool,
    user_data: UserDataPtr,
) -> Option<(Number, Vec<Number>, Vec<Number>)> {
    let cb = state.callbacks;
    let (n, m) = (state.n, state.m);

    let mut obj = 0.0;
    state.objective_calls += 1;
    if !(cb.eval_f)(n, x.as_ptr(), new_x, &mut obj, user_data) {
        return None;
    }
    let mut grad = vec![0.0; n as usize];
    if !(cb.eval_grad_f)(n, x.as_ptr(), false, grad.as_mut_ptr(), user_data) {
        return None;
    }
    let mut g = vec![0.0; m as usize];
    if !(cb.eval_g)(n, x.as_ptr(), false, m, g.as_mut_ptr(), user_data) {
        return None;
    }
    let mut jac = vec![0.0; state.nele_jac as usize];
    let ok = (cb.eval_jac_g)(
        n,
        x.as_ptr(),
        false,
        m,
        state.nele_jac,
        ptr::null_mut(),
        ptr::null_mut(),
        jac.as_mut_ptr(),
        user_data,
    );
    if !ok {
        return None;
    }
    let mut hess = vec![0.0; state.nele_hess as usize];
    let ok = (cb.eval_h)(
        n,
        x.as_ptr(),
        false,
        1.0,
        m,
        lambda.as_ptr(),
        true,
        state.nele_hess,
        ptr::null_mut(),
        ptr::null_mut(),
        hess.as_mut_ptr(),
        user_data,
    );
    if !ok {
        return None;
    }
    Some((obj, grad, g))
}

unsafe fn run(state: &mut FakeState, args: &SolveArgs) -> c_int {
    const SUCCEEDED: c_int = 0;
    const USER_STOP: c_int = 5;
    const MAX_ITER: c_int = -1;
    const INVALID_PROBLEM: c_int = -11;
    const INVALID_NUMBER: c_int = -13;

    let (n, m) = (state.n, state.m);
    if !query_structure(state, args.user_data) {
        return INVALID_PROBLEM;
    }

    let mut x = read(args.x, n);
    let lambda = read(args.mult_g, m);
    let max_iter = state.max_iter();
    let tol = state.tol();

    let mut iter = 0;
    let code = loop {
        let Some((obj, grad, g)) = evaluate(state, &x, &lambda, true, args.user_data) else {
            break INVALID_NUMBER;
        };
        write(args.x, &x);
        write(args.g, &g);
        *args.obj_val = obj;

        let projected: Vec<Number> = x
            .iter()
            .zip(&grad)
            .enumerate()
            .map(|(i, (xi, gi))| (xi - STEP * gi).clamp(state.x_l[i], state.x_u[i]))
            .collect();
        let step_norm = projected
            .iter()
            .zip(&x)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, Number::max);

        if let Some(intermediate) = state.intermediate {
            let keep_going = intermediate(
                0,
                iter,
                obj,
                0.0,
                step_norm,
                0.1,
                step_norm,
                0.0,
                1.0,
                1.0,
                0,
                args.user_data,
            );
            if !keep_going {
                break USER_STOP;
            }
        }
        if step_norm <= tol * STEP {
            break SUCCEEDED;
        }
        if iter >= max_iter {
            break MAX_ITER;
        }
        x = projected;
        iter += 1;
    };

    // Multipliers of active bounds from the last gradient sign.
    let mut grad = vec![0.0; n as usize];
    (state.callbacks.eval_grad_f)(n, x.as_ptr(), false, grad.as_mut_ptr(), args.user_data);
    let z_l: Vec<Number> = (0..n as usize)
        .map(|i| if x[i] <= state.x_l[i] { grad[i].max(0.0) } else { 0.0 })
        .collect();
    let z_u: Vec<Number> = (0..n as usize)
        .map(|i| if x[i] >= state.x_u[i] { (-grad[i]).max(0.0) } else { 0.0 })
        .collect();
    write(args.mult_x_l, &z_l);
    write(args.mult_x_u, &z_u);
    write(args.mult_g, &vec![0.0; m as usize]);
    code
}

//! Owning handle for one native problem.

use std::ffi::CString;
use std::marker::PhantomData;
use std::os::raw::c_int;
use std::path::{Path, PathBuf};
use std::ptr;

use ipopt_bridge_sys::{Index, IpoptProblem as RawProblem, Number};
use tracing::{debug, warn};

use crate::callbacks::{DispatchTable, IterationStats};
use crate::error::{BoundsKind, Error, Result};
use crate::native::{intermediate_trampoline, CreateArgs, NativeSolver, Trampolines};
use crate::options::OptionValue;
use crate::sparse::SparsityPattern;
use crate::trampoline::EvalContext;

/// Lower and upper bounds, one pair per variable or per constraint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bounds {
    pub lower: Vec<Number>,
    pub upper: Vec<Number>,
}

impl Bounds {
    pub fn new(lower: Vec<Number>, upper: Vec<Number>) -> Self {
        Self { lower, upper }
    }

    /// Equality bounds `lower == upper == values`.
    pub fn fixed(values: Vec<Number>) -> Self {
        Self {
            lower: values.clone(),
            upper: values,
        }
    }

    /// No bounds at all (zero entries).
    pub fn empty() -> Self {
        Self::default()
    }

    fn checked_len(&self, kind: BoundsKind) -> Result<usize> {
        if self.lower.len() != self.upper.len() {
            return Err(Error::DimensionMismatch {
                kind,
                lower: self.lower.len(),
                upper: self.upper.len(),
            });
        }
        Ok(self.lower.len())
    }
}

/// Declared nonzero counts, fixed for the life of a problem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sparsity {
    pub jacobian_nnz: usize,
    pub hessian_nnz: usize,
}

impl Sparsity {
    pub fn new(jacobian_nnz: usize, hessian_nnz: usize) -> Self {
        Self {
            jacobian_nnz,
            hessian_nnz,
        }
    }

    /// Counts taken from the patterns a problem will declare.
    pub fn from_patterns(jacobian: &SparsityPattern, hessian: &SparsityPattern) -> Self {
        Self::new(jacobian.nnz(), hessian.nnz())
    }
}

/// A native problem together with the callbacks it re-enters.
///
/// The native object is freed exactly once, by [`release`](Self::release) or
/// on drop. A problem can move between threads but cannot be shared; one solve
/// at a time is enforced by [`solve`](Self::solve) taking `&mut self`.
pub struct Problem<S: NativeSolver> {
    pub(crate) handle: RawProblem,
    pub(crate) context: Box<EvalContext>,
    pub(crate) n: usize,
    pub(crate) m: usize,
    _solver: PhantomData<S>,
}

// The native object is only touched through `&mut self`, and its callbacks run
// on the thread that calls `solve`.
unsafe impl<S: NativeSolver> Send for Problem<S> {}

/// A problem backed by the linked IPOPT library.
#[cfg(feature = "native")]
pub type IpoptProblem = Problem<crate::native::Ipopt>;

fn to_index(what: &'static str, value: usize) -> Result<Index> {
    Index::try_from(value).map_err(|_| Error::SizeOverflow { what, value })
}

fn c_string(text: &str) -> Result<CString> {
    CString::new(text).map_err(|_| Error::InvalidOptionText {
        text: text.to_string(),
    })
}

impl<S: NativeSolver> Problem<S> {
    /// Validate the bounds and create the native problem.
    ///
    /// Nothing native is allocated when validation fails.
    pub fn new(
        variables: Bounds,
        constraints: Bounds,
        sparsity: Sparsity,
        callbacks: DispatchTable,
    ) -> Result<Self> {
        let n = variables.checked_len(BoundsKind::Variables)?;
        let m = constraints.checked_len(BoundsKind::Constraints)?;
        let args = CreateArgs {
            n: to_index("n", n)?,
            x_l: &variables.lower,
            x_u: &variables.upper,
            m: to_index("m", m)?,
            g_l: &constraints.lower,
            g_u: &constraints.upper,
            nele_jac: to_index("nele_jac", sparsity.jacobian_nnz)?,
            nele_hess: to_index("nele_hess", sparsity.hessian_nnz)?,
        };

        let register_intermediate = callbacks.has_intermediate();
        let context = Box::new(EvalContext::new(callbacks, args.n, args.m));

        let handle = unsafe { S::create(args, Trampolines::bridge()) };
        if handle.is_null() {
            return Err(Error::CreateFailed);
        }
        debug!(
            n,
            m,
            nele_jac = sparsity.jacobian_nnz,
            nele_hess = sparsity.hessian_nnz,
            "created native problem"
        );

        let mut problem = Self {
            handle,
            context,
            n,
            m,
            _solver: PhantomData,
        };
        if register_intermediate {
            problem.register_intermediate(true);
        }
        Ok(problem)
    }

    pub fn num_variables(&self) -> usize {
        self.n
    }

    pub fn num_constraints(&self) -> usize {
        self.m
    }

    /// Jacobian coordinates recorded from the first structure request, if any.
    pub fn jacobian_structure(&self) -> Option<&SparsityPattern> {
        self.context.jacobian_structure()
    }

    /// Hessian coordinates recorded from the first structure request, if any.
    pub fn hessian_structure(&self) -> Option<&SparsityPattern> {
        self.context.hessian_structure()
    }

    /// Forward a string option verbatim.
    pub fn set_string_option(&mut self, key: &str, value: &str) -> Result<()> {
        let (c_key, c_value) = (c_string(key)?, c_string(value)?);
        let accepted = unsafe { S::add_str_option(self.handle, &c_key, &c_value) };
        log_option(key, &OptionValue::Str(value.to_string()), accepted);
        Ok(())
    }

    /// Forward an integer option verbatim.
    pub fn set_int_option(&mut self, key: &str, value: Index) -> Result<()> {
        let c_key = c_string(key)?;
        let accepted = unsafe { S::add_int_option(self.handle, &c_key, value) };
        log_option(key, &OptionValue::Int(value), accepted);
        Ok(())
    }

    /// Forward a floating-point option verbatim.
    pub fn set_number_option(&mut self, key: &str, value: Number) -> Result<()> {
        let c_key = c_string(key)?;
        let accepted = unsafe { S::add_num_option(self.handle, &c_key, value) };
        log_option(key, &OptionValue::Number(f64::from(value)), accepted);
        Ok(())
    }

    /// Forward an option through the setter matching its type.
    pub fn set_option(&mut self, key: &str, value: impl Into<OptionValue>) -> Result<()> {
        match value.into() {
            OptionValue::Int(v) => self.set_int_option(key, v),
            OptionValue::Number(v) => self.set_number_option(key, v as Number),
            OptionValue::Str(v) => self.set_string_option(key, &v),
        }
    }

    /// Have the native solver write its log to `path` at `print_level`.
    pub fn open_output_file(&mut self, path: impl AsRef<Path>, print_level: c_int) -> Result<()> {
        let path = path.as_ref();
        let text = path.to_str().ok_or_else(|| Error::OutputFile {
            path: path.to_path_buf(),
        })?;
        let c_path = c_string(text)?;
        if !unsafe { S::open_output_file(self.handle, &c_path, print_level) } {
            return Err(Error::OutputFile {
                path: PathBuf::from(path),
            });
        }
        debug!(path = %path.display(), print_level, "opened native output file");
        Ok(())
    }

    /// Scale the objective, and optionally the variables and constraints.
    pub fn set_scaling(
        &mut self,
        obj_scaling: Number,
        x_scaling: Option<&[Number]>,
        g_scaling: Option<&[Number]>,
    ) -> Result<()> {
        check_scaling("variable", x_scaling, self.n)?;
        check_scaling("constraint", g_scaling, self.m)?;
        let x_ptr = x_scaling.map_or(ptr::null(), <[Number]>::as_ptr);
        let g_ptr = g_scaling.map_or(ptr::null(), <[Number]>::as_ptr);
        if !unsafe { S::set_scaling(self.handle, obj_scaling, x_ptr, g_ptr) } {
            warn!("native solver rejected problem scaling");
        }
        Ok(())
    }

    /// Install a per-iteration hook; returning `false` stops the solve with
    /// `UserRequestedStop`.
    pub fn set_intermediate_callback(
        &mut self,
        callback: impl FnMut(&IterationStats) -> bool + Send + 'static,
    ) {
        self.context.table.set_intermediate(Some(Box::new(callback)));
        self.register_intermediate(true);
    }

    pub fn clear_intermediate_callback(&mut self) {
        self.context.table.set_intermediate(None);
        self.register_intermediate(false);
    }

    fn register_intermediate(&mut self, enabled: bool) {
        let callback = enabled.then(intermediate_trampoline);
        if !unsafe { S::set_intermediate_callback(self.handle, callback) } {
            warn!(enabled, "native solver rejected intermediate callback");
        }
    }

    /// Free the native object now.
    pub fn release(mut self) {
        self.free();
    }

    fn free(&mut self) {
        if self.handle.is_null() {
            return;
        }
        unsafe { S::free(self.handle) };
        self.handle = ptr::null_mut();
        debug!("released native problem");
    }
}

impl<S: NativeSolver> Drop for Problem<S> {
    fn drop(&mut self) {
        self.free();
    }
}

impl<S: NativeSolver> std::fmt::Debug for Problem<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Problem")
            .field("n", &self.n)
            .field("m", &self.m)
            .field("callbacks", &self.context.table)
            .finish_non_exhaustive()
    }
}

fn check_scaling(what: &'static str, scaling: Option<&[Number]>, expected: usize) -> Result<()> {
    match scaling {
        Some(values) if values.len() != expected => Err(Error::ScalingLength {
            what,
            expected,
            actual: values.len(),
        }),
        _ => Ok(()),
    }
}

fn log_option(key: &str, value: &OptionValue, accepted: bool) {
    if accepted {
        debug!(key, %value, "set solver option");
    } else {
        warn!(key, %value, "native solver rejected option");
    }
}

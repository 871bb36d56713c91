//! Views over foreign `(pointer, length)` pairs and native-owned scratch buffers.
//!
//! Every raw array the native solver hands to a trampoline goes through
//! [`CallScope`]. A scope exists only for the duration of one native call, and
//! views borrowed from it cannot outlive it: the native solver may reuse or free
//! that memory on its next iteration.
//!
//! A null pointer always yields an empty view, whatever count accompanies it.

use std::cell::Cell;
use std::marker::PhantomData;
use std::mem::{align_of, size_of};

use ipopt_bridge_sys::{Index, Number};
use thiserror::Error;

/// Reasons a foreign pointer cannot be viewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ViewError {
    #[error("negative element count {0}")]
    NegativeLength(Index),
    #[error("element count {0} exceeds the addressable range")]
    TooLong(Index),
    #[error("pointer is not aligned for the element type")]
    Misaligned,
    #[error("required scalar pointer is null")]
    NullScalar,
}

/// Lifetime token for one native callback invocation.
///
/// Obtained only through [`CallScope::enter`]; the `'call` lifetime is
/// higher-ranked, so nothing borrowed from the scope escapes the closure.
pub struct CallScope<'call> {
    _invariant: PhantomData<Cell<&'call ()>>,
}

impl<'call> CallScope<'call> {
    /// Run `f` with a fresh scope.
    pub fn enter<R>(f: impl for<'s> FnOnce(&CallScope<'s>) -> R) -> R {
        f(&CallScope {
            _invariant: PhantomData,
        })
    }

    /// View `len` elements starting at `ptr`.
    ///
    /// # Safety
    ///
    /// If `ptr` is non-null it must point to `len` initialized elements that stay
    /// valid and unaliased by writers for the whole scope.
    pub unsafe fn slice<T>(&self, ptr: *const T, len: Index) -> Result<&'call [T], ViewError> {
        let len = checked_len::<T>(len)?;
        if ptr.is_null() {
            return Ok(&[]);
        }
        check_alignment(ptr)?;
        Ok(std::slice::from_raw_parts(ptr, len))
    }

    /// Mutable view of `len` elements starting at `ptr`.
    ///
    /// # Safety
    ///
    /// If `ptr` is non-null it must point to `len` elements that stay valid and
    /// are not accessed through any other pointer for the whole scope.
    pub unsafe fn slice_mut<T>(
        &self,
        ptr: *mut T,
        len: Index,
    ) -> Result<&'call mut [T], ViewError> {
        let len = checked_len::<T>(len)?;
        if ptr.is_null() {
            return Ok(&mut []);
        }
        check_alignment(ptr)?;
        Ok(std::slice::from_raw_parts_mut(ptr, len))
    }

    /// Mutable view of a single output value. Null is an error here.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must be valid for writes for the whole scope.
    pub unsafe fn scalar_mut<T>(&self, ptr: *mut T) -> Result<&'call mut T, ViewError> {
        if ptr.is_null() {
            return Err(ViewError::NullScalar);
        }
        check_alignment(ptr)?;
        Ok(&mut *ptr)
    }
}

fn checked_len<T>(len: Index) -> Result<usize, ViewError> {
    let count = usize::try_from(len).map_err(|_| ViewError::NegativeLength(len))?;
    let max = isize::MAX as usize / size_of::<T>().max(1);
    if count > max {
        return Err(ViewError::TooLong(len));
    }
    Ok(count)
}

fn check_alignment<T>(ptr: *const T) -> Result<(), ViewError> {
    if (ptr as usize) % align_of::<T>() != 0 {
        return Err(ViewError::Misaligned);
    }
    Ok(())
}

/// Scratch copy of a host buffer that the native solver may mutate in place.
///
/// The host's own storage is never handed across the boundary; values are
/// copied in before the native call and back out afterwards.
#[derive(Debug)]
pub(crate) struct NativeBuffer {
    data: Vec<Number>,
}

impl NativeBuffer {
    pub(crate) fn copy_of(host: &[Number]) -> Self {
        Self {
            data: host.to_vec(),
        }
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut Number {
        self.data.as_mut_ptr()
    }

    /// Copy the native solver's final values back into the host buffer.
    pub(crate) fn copy_back(&self, host: &mut [Number]) {
        host.copy_from_slice(&self.data);
    }
}

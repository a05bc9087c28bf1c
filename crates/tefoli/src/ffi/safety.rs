//! Helpers for values crossing the boundary

use crate::error::{TheoryError, TheoryResult};
use std::ffi::{c_char, CStr, CString};

/// Convert a Rust string argument into a C string
///
/// Interior NUL bytes cannot be represented and are rejected, naming `what`.
pub fn to_c_string(what: &str, s: &str) -> TheoryResult<CString> {
    CString::new(s).map_err(|e| {
        TheoryError::InvalidArgument(format!(
            "{} contains a NUL byte at position {}",
            what,
            e.nul_position()
        ))
    })
}

/// Copy a C string owned by foreign code
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string that stays valid for
/// the duration of this call.
pub unsafe fn copy_c_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}

//! Rewrite callbacks - let the extension call back into Rust
//!
//! `rewrite_statement` hands every statement it produces to a C callback plus
//! an opaque `data` pointer. We pass a monomorphized trampoline as the callback
//! and a pointer to a stack-allocated [`RewriteContext`] as `data`, so the host
//! closure is reachable only for the duration of one call.

use crate::ffi::types::RewriteCallback;
use crate::host::Statement;
use std::any::Any;
use std::ffi::c_void;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};

/// State shared between one `rewrite_statement` call and its trampoline
pub struct RewriteContext<'a, F> {
    add: &'a mut F,
    /// Message of the first failed callback
    failure: Option<String>,
    /// Number of times the trampoline reported failure
    failures: usize,
    /// Panic caught inside the callback, resumed after the call returns
    panic: Option<Box<dyn Any + Send + 'static>>,
}

impl<'a, F, E> RewriteContext<'a, F>
where
    F: FnMut(Statement) -> Result<(), E>,
    E: Display,
{
    pub fn new(add: &'a mut F) -> Self {
        Self {
            add,
            failure: None,
            failures: 0,
            panic: None,
        }
    }

    /// The trampoline matching this context's closure type
    pub fn callback(&self) -> RewriteCallback {
        rewrite_trampoline::<F, E>
    }

    /// Opaque pointer to pass as `data`
    ///
    /// Valid while `self` is neither moved nor dropped.
    pub fn as_data(&mut self) -> *mut c_void {
        self as *mut Self as *mut c_void
    }

    fn dispatch(&mut self, stm: *const c_void) -> bool {
        // Stop forwarding once a callback failed or panicked
        if self.panic.is_some() || self.failure.is_some() {
            self.failures += 1;
            return false;
        }

        let Some(stm) = Statement::from_const(stm) else {
            self.failures += 1;
            self.failure = Some("theory produced a null statement".to_string());
            return false;
        };

        let add = &mut *self.add;
        match panic::catch_unwind(AssertUnwindSafe(|| add(stm))) {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                self.failures += 1;
                self.failure = Some(e.to_string());
                false
            }
            Err(payload) => {
                self.failures += 1;
                self.panic = Some(payload);
                false
            }
        }
    }
}

impl<'a, F> RewriteContext<'a, F> {
    /// Message of the first callback failure, if any
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// How often failure was reported to the extension
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Re-raise a panic caught inside the callback
    pub fn resume_panic(&mut self) {
        if let Some(payload) = self.panic.take() {
            panic::resume_unwind(payload);
        }
    }
}

/// C entry point called by the extension for every rewritten statement
///
/// Returns `false` if the host callback failed; unwinding never leaves this
/// function.
unsafe extern "C" fn rewrite_trampoline<F, E>(stm: *const c_void, data: *mut c_void) -> bool
where
    F: FnMut(Statement) -> Result<(), E>,
    E: Display,
{
    if data.is_null() {
        return false;
    }
    // SAFETY: `data` was produced by `RewriteContext::as_data` for this `F` and
    // the context outlives the enclosing `rewrite_statement` call.
    let ctx = &mut *(data as *mut RewriteContext<'_, F>);
    ctx.dispatch(stm)
}

//! Function binding with per-function error policies
//!
//! Exported functions are resolved by name from a [`SymbolSource`] and cast to
//! their declared signature. Since every signature is fixed at compile time, we
//! use direct function pointer casts instead of a dynamic call interface.

use crate::channel::ErrorChannel;
use crate::error::TheoryResult;
use crate::ffi::loader::LoadError;
use libloading::Library;
use std::collections::HashMap;
use std::ffi::c_void;
use std::fmt;
use std::mem;

/// Something that maps exported names to addresses
pub trait SymbolSource {
    /// Name used in error messages
    fn name(&self) -> &str;

    /// Address of the exported symbol, if present
    fn address(&self, symbol: &str) -> Option<*const c_void>;
}

/// A loaded shared library together with the name it was requested by
pub struct LibrarySource {
    name: String,
    library: Library,
}

impl LibrarySource {
    pub fn new(name: impl Into<String>, library: Library) -> Self {
        Self {
            name: name.into(),
            library,
        }
    }
}

impl SymbolSource for LibrarySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn address(&self, symbol: &str) -> Option<*const c_void> {
        // SAFETY: the symbol is only read as an address, never called here.
        unsafe {
            self.library
                .get::<*const c_void>(symbol.as_bytes())
                .ok()
                .map(|s| *s)
                .filter(|p| !p.is_null())
        }
    }
}

impl fmt::Debug for LibrarySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibrarySource")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// In-memory symbol table
///
/// Lets a theory be driven by functions that live in the current binary, e.g.
/// a statically linked extension or a test double.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    name: String,
    symbols: HashMap<String, usize>,
}

impl SymbolTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbols: HashMap::new(),
        }
    }

    /// Register a function address under `symbol`
    pub fn insert(&mut self, symbol: impl Into<String>, address: *const c_void) -> &mut Self {
        self.symbols.insert(symbol.into(), address as usize);
        self
    }

    /// Remove a symbol, e.g. to simulate an older library
    pub fn remove(&mut self, symbol: &str) -> &mut Self {
        self.symbols.remove(symbol);
        self
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl SymbolSource for SymbolTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn address(&self, symbol: &str) -> Option<*const c_void> {
        self.symbols.get(symbol).map(|&a| a as *const c_void)
    }
}

/// How the boolean result of a bound function is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// `false` is a failure; details come from the host error channel
    Strict,
    /// The raw result is data ("found", "has value", ...) and handed back as is
    PassThrough,
}

/// A bound exported function
#[derive(Clone, Copy)]
pub struct BoundFn<F> {
    name: &'static str,
    func: F,
    policy: ErrorPolicy,
}

impl<F: Copy> BoundFn<F> {
    /// Logical operation name (without prefix)
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    /// The typed function pointer
    pub fn get(&self) -> F {
        self.func
    }

    /// Apply this function's error policy to its boolean result
    ///
    /// Strict functions turn `false` into the error currently held by the host
    /// channel; pass-through functions hand the flag back unchanged.
    pub fn check(&self, success: bool, channel: &dyn ErrorChannel) -> TheoryResult<bool> {
        match self.policy {
            ErrorPolicy::PassThrough => Ok(success),
            ErrorPolicy::Strict if success => Ok(true),
            ErrorPolicy::Strict => {
                let error = channel.capture();
                tracing::error!(operation = self.name, kind = ?error.kind(), %error, "theory call failed");
                Err(error)
            }
        }
    }
}

impl<F> fmt::Debug for BoundFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundFn")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .finish()
    }
}

/// Binds `<prefix>_<operation>` symbols from a source
pub struct Binder<'a> {
    source: &'a dyn SymbolSource,
    prefix: &'a str,
}

impl<'a> Binder<'a> {
    pub fn new(source: &'a dyn SymbolSource, prefix: &'a str) -> Self {
        Self { source, prefix }
    }

    /// Full exported name of an operation
    pub fn symbol_name(&self, operation: &str) -> String {
        format!("{}_{}", self.prefix, operation)
    }

    /// Bind a required function
    ///
    /// # Safety
    ///
    /// `F` must be an `extern "C"` function pointer type matching the exported
    /// function's actual signature.
    pub unsafe fn require<F: Copy>(
        &self,
        operation: &'static str,
        policy: ErrorPolicy,
    ) -> Result<BoundFn<F>, LoadError> {
        self.optional(operation, policy)
            .ok_or_else(|| LoadError::SymbolNotFound {
                library: self.source.name().to_string(),
                symbol: self.symbol_name(operation),
            })
    }

    /// Bind a function that older libraries may not export
    ///
    /// # Safety
    ///
    /// Same contract as [`Binder::require`].
    pub unsafe fn optional<F: Copy>(
        &self,
        operation: &'static str,
        policy: ErrorPolicy,
    ) -> Option<BoundFn<F>> {
        debug_assert_eq!(mem::size_of::<F>(), mem::size_of::<*const c_void>());

        let symbol = self.symbol_name(operation);
        let address = self.source.address(&symbol)?;
        tracing::debug!(symbol = %symbol, ?policy, "bound theory function");

        Some(BoundFn {
            name: operation,
            func: mem::transmute_copy::<*const c_void, F>(&address),
            policy,
        })
    }
}

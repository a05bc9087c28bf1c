//! Foreign Function Interface (FFI) layer
//!
//! Everything that touches raw pointers lives here:
//! - Library resolution and loading (`loader`)
//! - Symbol binding with error policies (`binder`)
//! - C layouts and function signatures (`types`)
//! - Rewrite callback trampolines (`callbacks`)
//!
//! # Safety
//!
//! The rest of the crate only uses the safe wrappers exported below.

pub mod binder;
pub mod callbacks;
pub mod loader;
pub mod safety;
pub mod types;

pub use binder::{Binder, BoundFn, ErrorPolicy, LibrarySource, SymbolSource, SymbolTable};
pub use callbacks::RewriteContext;
pub use loader::{LibraryResolver, LoadError};
pub use types::{RawValue, RawValuePayload};

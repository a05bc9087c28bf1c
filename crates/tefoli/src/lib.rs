//! Tefoli - bridge to clingo theory extension libraries
//!
//! A theory library exports a fixed set of C functions named
//! `<prefix>_<operation>`. This crate loads such a library, binds the functions
//! and exposes them as safe methods on [`Theory`]:
//! - Lifecycle: creation on load, idempotent [`Theory::destroy`]
//! - Host hooks: configure, register, rewrite, prepare, options, model, statistics
//! - Model inspection: symbol lookup, value decoding, assignment iteration
//!
//! Failures of strict functions are read from the host's error channel and
//! translated into [`TheoryError`].

/// Tefoli version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod assignment;
pub mod channel;
pub mod error;
pub mod ffi;
pub mod files;
pub mod host;
pub mod theory;
pub mod value;

pub use assignment::{Assignment, AssignmentIndices};
pub use channel::{translate, ErrorChannel, HostErrorChannel, NO_MESSAGE};
pub use error::{ErrorKind, TheoryError, TheoryResult};
pub use ffi::{ErrorPolicy, LibraryResolver, LoadError, SymbolSource, SymbolTable};
pub use files::{parse_files, parse_reader, parse_str, ProgramParser};
pub use host::{ApplicationOptions, Control, Model, Statement, StatisticsMap};
pub use theory::Theory;
pub use value::{Symbol, Value};

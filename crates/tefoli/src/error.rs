//! Error taxonomy of the bridge
//!
//! Construction failures (library or symbol missing) come from the loader and
//! binder; per-call failures are translated from the host's error channel right
//! at the boundary (see [`crate::channel`]).

use crate::ffi::loader::LoadError;
use std::path::PathBuf;
use tefoli_config::ConfigError;
use thiserror::Error;

/// Errors raised by a [`crate::Theory`]
#[derive(Error, Debug)]
pub enum TheoryError {
    /// Library or required symbol could not be resolved
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Host error codes 1, 2 and 4 (runtime, logic, unknown-with-message)
    #[error("{0}")]
    Runtime(String),

    /// Host error code 3
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// Any other host error code
    #[error("unknown error")]
    Unknown,

    /// The extension filled a value with a discriminant outside 0..=2
    #[error("invalid value kind {0} returned by theory")]
    InvalidValueKind(i32),

    /// `rewrite_statement` is not exported by the library
    #[error("theory does not export rewrite_statement")]
    RewriteUnavailable,

    /// Operation invoked after `destroy`
    #[error("theory has already been destroyed")]
    Destroyed,

    /// Argument cannot be passed across the boundary
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Reading a program for rewriting failed
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration could not be loaded or is incomplete
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Coarse classification of a [`TheoryError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing library or export; construction aborts
    Binding,
    /// Recoverable failure reported by the extension
    Runtime,
    /// Allocation failure reported by the extension
    OutOfMemory,
    /// Unclassified failure reported by the extension
    Unknown,
    /// Corrupted data or version mismatch across the boundary
    InternalConsistency,
    /// API misuse on the Rust side (destroyed handle, bad argument, missing feature)
    Usage,
    /// Reading input or configuration failed
    Io,
}

impl ErrorKind {
    /// Whether the failure leaves the theory in an unusable state
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            ErrorKind::Binding | ErrorKind::Unknown | ErrorKind::InternalConsistency
        )
    }
}

impl TheoryError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            TheoryError::Load(_) => ErrorKind::Binding,
            TheoryError::Runtime(_) => ErrorKind::Runtime,
            TheoryError::OutOfMemory(_) => ErrorKind::OutOfMemory,
            TheoryError::Unknown => ErrorKind::Unknown,
            TheoryError::InvalidValueKind(_) => ErrorKind::InternalConsistency,
            TheoryError::RewriteUnavailable
            | TheoryError::Destroyed
            | TheoryError::InvalidArgument(_) => ErrorKind::Usage,
            TheoryError::Io { .. } | TheoryError::Config(_) => ErrorKind::Io,
        }
    }

    /// Shorthand for `self.kind().is_fatal()`
    pub fn is_fatal(&self) -> bool {
        self.kind().is_fatal()
    }
}

/// Result type for theory operations
pub type TheoryResult<T> = Result<T, TheoryError>;

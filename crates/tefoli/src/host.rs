//! Host engine objects
//!
//! The bridge never looks inside the host's objects; it only forwards their
//! addresses. Each kind gets its own non-null wrapper so a model cannot be
//! passed where a control object is expected.

use std::ffi::c_void;
use std::ptr::NonNull;

macro_rules! host_handle {
    ($(#[$meta:meta])* $name:ident, $c_name:literal) => {
        $(#[$meta])*
        #[doc = concat!("\n\nWraps a non-null `", $c_name, " *`.")]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(NonNull<c_void>);

        impl $name {
            /// Wrap a pointer obtained from the host engine
            ///
            /// Returns `None` for null. The bridge does not check that the
            /// pointer refers to a live object of the right kind.
            pub fn from_raw(ptr: *mut c_void) -> Option<Self> {
                NonNull::new(ptr).map(Self)
            }

            /// Pointer handed to the extension
            pub fn as_ptr(self) -> *mut c_void {
                self.0.as_ptr()
            }
        }
    };
}

host_handle!(
    /// A host control object (`register`, `prepare`)
    Control,
    "clingo_control_t"
);
host_handle!(
    /// Application options being declared (`register_options`)
    ApplicationOptions,
    "clingo_options_t"
);
host_handle!(
    /// The model reported by the host (`on_model`)
    Model,
    "clingo_model_t"
);
host_handle!(
    /// A statistics map (`on_statistics`)
    StatisticsMap,
    "clingo_statistics_t"
);
host_handle!(
    /// An abstract syntax statement (`rewrite_statement`)
    Statement,
    "clingo_ast_statement_t"
);

impl Statement {
    /// Wrap a statement the extension passed back to us
    pub fn from_const(ptr: *const c_void) -> Option<Self> {
        Self::from_raw(ptr as *mut c_void)
    }
}

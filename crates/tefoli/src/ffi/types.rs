//! C layouts and signatures of the theory interface
//!
//! Every exported function is looked up as `<prefix>_<name>`. The signatures
//! below follow the C declarations a theory library implements:
//!
//! ```c
//! bool create(theory_t **theory);
//! bool destroy(theory_t *theory);
//! bool register(theory_t *theory, clingo_control_t *control);
//! bool rewrite_statement(theory_t *theory, clingo_ast_statement_t const *stm,
//!                        rewrite_callback_t add, void *data);
//! bool prepare(theory_t *theory, clingo_control_t *control);
//! bool register_options(theory_t *theory, clingo_options_t *options);
//! bool validate_options(theory_t *theory);
//! bool on_model(theory_t *theory, clingo_model_t *model);
//! bool on_statistics(theory_t *theory, clingo_statistics_t *step,
//!                    clingo_statistics_t *accu);
//! bool lookup_symbol(theory_t *theory, clingo_symbol_t symbol, size_t *index);
//! clingo_symbol_t get_symbol(theory_t *theory, size_t index);
//! void assignment_begin(theory_t *theory, uint32_t thread_id, size_t *index);
//! bool assignment_next(theory_t *theory, uint32_t thread_id, size_t *index);
//! bool assignment_has_value(theory_t *theory, uint32_t thread_id, size_t index);
//! void assignment_get_value(theory_t *theory, uint32_t thread_id, size_t index,
//!                           value_t *value);
//! bool configure(theory_t *theory, char const *key, char const *value);
//! ```

use std::ffi::{c_char, c_double, c_int, c_void};

/// Opaque extension state (`theory_t`)
pub type RawTheory = *mut c_void;

/// Discriminant of an integer value
pub const VALUE_INTEGER: c_int = 0;
/// Discriminant of a double value
pub const VALUE_DOUBLE: c_int = 1;
/// Discriminant of a symbol value
pub const VALUE_SYMBOL: c_int = 2;

/// Payload of `value_t`
#[repr(C)]
#[derive(Clone, Copy)]
pub union RawValuePayload {
    pub integer: c_int,
    pub double: c_double,
    pub symbol: u64,
}

/// `value_t`: discriminant followed by the payload union
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawValue {
    pub kind: c_int,
    pub value: RawValuePayload,
}

impl RawValue {
    pub fn integer(integer: c_int) -> Self {
        let mut value = RawValuePayload { symbol: 0 };
        value.integer = integer;
        Self {
            kind: VALUE_INTEGER,
            value,
        }
    }

    pub fn double(double: c_double) -> Self {
        Self {
            kind: VALUE_DOUBLE,
            value: RawValuePayload { double },
        }
    }

    pub fn symbol(symbol: u64) -> Self {
        Self {
            kind: VALUE_SYMBOL,
            value: RawValuePayload { symbol },
        }
    }
}

impl Default for RawValue {
    fn default() -> Self {
        Self {
            kind: VALUE_INTEGER,
            value: RawValuePayload { symbol: 0 },
        }
    }
}

impl std::fmt::Debug for RawValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The symbol field spans the whole payload, so it is always initialized.
        let bits = unsafe { self.value.symbol };
        f.debug_struct("RawValue")
            .field("kind", &self.kind)
            .field("payload", &format_args!("{:#018x}", bits))
            .finish()
    }
}

/// Callback handed to `rewrite_statement` for each produced statement
pub type RewriteCallback = unsafe extern "C" fn(stm: *const c_void, data: *mut c_void) -> bool;

pub type CreateFn = unsafe extern "C" fn(theory: *mut RawTheory) -> bool;
pub type DestroyFn = unsafe extern "C" fn(theory: RawTheory) -> bool;
pub type RegisterFn = unsafe extern "C" fn(theory: RawTheory, control: *mut c_void) -> bool;
pub type RewriteStatementFn = unsafe extern "C" fn(
    theory: RawTheory,
    stm: *const c_void,
    add: RewriteCallback,
    data: *mut c_void,
) -> bool;
pub type PrepareFn = unsafe extern "C" fn(theory: RawTheory, control: *mut c_void) -> bool;
pub type RegisterOptionsFn = unsafe extern "C" fn(theory: RawTheory, options: *mut c_void) -> bool;
pub type ValidateOptionsFn = unsafe extern "C" fn(theory: RawTheory) -> bool;
pub type OnModelFn = unsafe extern "C" fn(theory: RawTheory, model: *mut c_void) -> bool;
pub type OnStatisticsFn =
    unsafe extern "C" fn(theory: RawTheory, step: *mut c_void, accu: *mut c_void) -> bool;
pub type LookupSymbolFn =
    unsafe extern "C" fn(theory: RawTheory, symbol: u64, index: *mut usize) -> bool;
pub type GetSymbolFn = unsafe extern "C" fn(theory: RawTheory, index: usize) -> u64;
pub type AssignmentBeginFn =
    unsafe extern "C" fn(theory: RawTheory, thread_id: u32, index: *mut usize);
pub type AssignmentNextFn =
    unsafe extern "C" fn(theory: RawTheory, thread_id: u32, index: *mut usize) -> bool;
pub type AssignmentHasValueFn =
    unsafe extern "C" fn(theory: RawTheory, thread_id: u32, index: usize) -> bool;
pub type AssignmentGetValueFn =
    unsafe extern "C" fn(theory: RawTheory, thread_id: u32, index: usize, value: *mut RawValue);
pub type ConfigureFn =
    unsafe extern "C" fn(theory: RawTheory, key: *const c_char, value: *const c_char) -> bool;

/// Host diagnostic channel: `char const *clingo_error_message()`
pub type ErrorMessageFn = unsafe extern "C" fn() -> *const c_char;
/// Host diagnostic channel: `clingo_error_t clingo_error_code()`
pub type ErrorCodeFn = unsafe extern "C" fn() -> c_int;

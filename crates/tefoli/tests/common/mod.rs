//! In-process theory extension used by the integration tests
//!
//! Exports every `mock_*` function of the theory interface from this test
//! binary and registers them in a [`SymbolTable`]. State that tests inspect
//! (call log, destroy count, the host error channel) is thread-local, so tests
//! running in parallel do not see each other.
//!
//! Behavior knobs, all set before or through `configure`:
//! - `seed(entries)`: assignment of the next created theory; indices are 1-based
//! - `fail_create(code, msg)`: make the next `create` fail
//! - `configure("fail.<operation>", "<code>:<message>")`: make a strict
//!   operation fail; an empty message leaves the host message unset
//! - `configure("rewrite.ignore_failures", "true")`: keep going when `add` fails
//! - `configure("invalid", _)`: rejected with a logic error

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::{c_char, c_int, c_void, CStr, CString};
use tefoli::channel::{ERROR_LOGIC, ERROR_RUNTIME};
use tefoli::ffi::types::{RawTheory, RawValue, RewriteCallback};
use tefoli::{
    ApplicationOptions, Control, ErrorChannel, Model, Statement, StatisticsMap, SymbolTable, Theory,
};

/// Prefix of the mock's exported functions
pub const PREFIX: &str = "mock";

struct MockTheory {
    entries: Vec<(u64, Option<RawValue>)>,
    failures: HashMap<String, (c_int, String)>,
    ignore_add_failures: bool,
}

thread_local! {
    static SEED: RefCell<Vec<(u64, Option<RawValue>)>> = const { RefCell::new(Vec::new()) };
    static CREATE_FAILURE: RefCell<Option<(c_int, String)>> = const { RefCell::new(None) };
    static LAST_ERROR: RefCell<(c_int, Option<CString>)> = const { RefCell::new((0, None)) };
    static CALLS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    static DESTROYED: Cell<usize> = const { Cell::new(0) };
    static REFUSED: Cell<usize> = const { Cell::new(0) };
}

// ===== Test controls =====

/// Assignment handed to the next created theory
pub fn seed(entries: Vec<(u64, Option<RawValue>)>) {
    SEED.with(|s| *s.borrow_mut() = entries);
}

/// Make the next `create` fail with the given host error
pub fn fail_create(code: c_int, message: &str) {
    CREATE_FAILURE.with(|f| *f.borrow_mut() = Some((code, message.to_string())));
}

/// Operations the mock saw on this thread, in order
pub fn calls() -> Vec<String> {
    CALLS.with(|c| c.borrow().clone())
}

pub fn clear_calls() {
    CALLS.with(|c| c.borrow_mut().clear());
}

/// How often `destroy` reached the mock on this thread
pub fn destroy_count() -> usize {
    DESTROYED.with(Cell::get)
}

/// How often the add callback returned false to the mock on this thread
pub fn refused_adds() -> usize {
    REFUSED.with(Cell::get)
}

fn record(call: impl Into<String>) {
    CALLS.with(|c| c.borrow_mut().push(call.into()));
}

fn set_error(code: c_int, message: &str) {
    let message = if message.is_empty() {
        None
    } else {
        CString::new(message).ok()
    };
    LAST_ERROR.with(|e| *e.borrow_mut() = (code, message));
}

// ===== Host side =====

/// Error channel reading the mock host's thread-local last error
#[derive(Debug, Default)]
pub struct MockChannel;

impl ErrorChannel for MockChannel {
    fn last_message(&self) -> Option<String> {
        LAST_ERROR.with(|e| {
            e.borrow()
                .1
                .as_ref()
                .map(|m| m.to_string_lossy().into_owned())
        })
    }

    fn last_code(&self) -> c_int {
        LAST_ERROR.with(|e| e.borrow().0)
    }
}

/// Symbol table exporting the complete mock interface
pub fn mock_table() -> SymbolTable {
    let mut table = SymbolTable::new("libmock");
    table
        .insert("mock_create", mock_create as *const c_void)
        .insert("mock_destroy", mock_destroy as *const c_void)
        .insert("mock_register", mock_register as *const c_void)
        .insert("mock_rewrite_statement", mock_rewrite_statement as *const c_void)
        .insert("mock_prepare", mock_prepare as *const c_void)
        .insert("mock_register_options", mock_register_options as *const c_void)
        .insert("mock_validate_options", mock_validate_options as *const c_void)
        .insert("mock_on_model", mock_on_model as *const c_void)
        .insert("mock_on_statistics", mock_on_statistics as *const c_void)
        .insert("mock_lookup_symbol", mock_lookup_symbol as *const c_void)
        .insert("mock_get_symbol", mock_get_symbol as *const c_void)
        .insert("mock_assignment_begin", mock_assignment_begin as *const c_void)
        .insert("mock_assignment_next", mock_assignment_next as *const c_void)
        .insert("mock_assignment_has_value", mock_assignment_has_value as *const c_void)
        .insert("mock_assignment_get_value", mock_assignment_get_value as *const c_void)
        .insert("mock_configure", mock_configure as *const c_void);
    table
}

/// Theory over the complete mock interface
pub fn mock_theory() -> Theory {
    theory_from(mock_table())
}

pub fn theory_from(table: SymbolTable) -> Theory {
    try_theory_from(table).unwrap()
}

pub fn try_theory_from(table: SymbolTable) -> tefoli::TheoryResult<Theory> {
    // SAFETY: every entry of the table has the declared signature.
    unsafe { Theory::from_source(PREFIX, table, MockChannel) }
}

fn handle(addr: usize) -> *mut c_void {
    addr as *mut c_void
}

pub fn control() -> Control {
    Control::from_raw(handle(0x1000)).unwrap()
}

pub fn options() -> ApplicationOptions {
    ApplicationOptions::from_raw(handle(0x2000)).unwrap()
}

pub fn model() -> Model {
    Model::from_raw(handle(0x3000)).unwrap()
}

pub fn statistics(n: usize) -> StatisticsMap {
    StatisticsMap::from_raw(handle(0x4000 + n * 0x10)).unwrap()
}

/// Statement with a recognizable address
pub fn statement(addr: usize) -> Statement {
    Statement::from_raw(handle(addr)).unwrap()
}

// ===== Extension side =====

unsafe fn state<'a>(theory: RawTheory) -> &'a mut MockTheory {
    &mut *(theory as *mut MockTheory)
}

/// Sets the host error and returns `true` if `operation` is set up to fail
fn failing(theory: &MockTheory, operation: &str) -> bool {
    match theory.failures.get(operation) {
        Some((code, message)) => {
            set_error(*code, message);
            true
        }
        None => false,
    }
}

unsafe extern "C" fn mock_create(theory: *mut RawTheory) -> bool {
    record("create");
    if let Some((code, message)) = CREATE_FAILURE.with(|f| f.borrow_mut().take()) {
        set_error(code, &message);
        return false;
    }
    let mock = MockTheory {
        entries: SEED.with(|s| s.borrow().clone()),
        failures: HashMap::new(),
        ignore_add_failures: false,
    };
    *theory = Box::into_raw(Box::new(mock)) as RawTheory;
    true
}

unsafe extern "C" fn mock_destroy(theory: RawTheory) -> bool {
    record("destroy");
    let mock = Box::from_raw(theory as *mut MockTheory);
    DESTROYED.with(|d| d.set(d.get() + 1));
    !failing(&mock, "destroy")
}

unsafe extern "C" fn mock_register(theory: RawTheory, control: *mut c_void) -> bool {
    record(format!("register {:#x}", control as usize));
    !failing(state(theory), "register")
}

unsafe extern "C" fn mock_rewrite_statement(
    theory: RawTheory,
    stm: *const c_void,
    add: RewriteCallback,
    data: *mut c_void,
) -> bool {
    record(format!("rewrite_statement {:#x}", stm as usize));
    let mock = state(theory);
    if failing(mock, "rewrite_statement") {
        return false;
    }
    // Every statement is rewritten into itself and a companion statement
    for produced in [stm as usize, stm as usize + 1] {
        if add(produced as *const c_void, data) {
            continue;
        }
        REFUSED.with(|r| r.set(r.get() + 1));
        if !mock.ignore_add_failures {
            set_error(ERROR_RUNTIME, "add callback failed");
            return false;
        }
    }
    true
}

unsafe extern "C" fn mock_prepare(theory: RawTheory, control: *mut c_void) -> bool {
    record(format!("prepare {:#x}", control as usize));
    !failing(state(theory), "prepare")
}

unsafe extern "C" fn mock_register_options(theory: RawTheory, options: *mut c_void) -> bool {
    record(format!("register_options {:#x}", options as usize));
    !failing(state(theory), "register_options")
}

unsafe extern "C" fn mock_validate_options(theory: RawTheory) -> bool {
    record("validate_options");
    !failing(state(theory), "validate_options")
}

unsafe extern "C" fn mock_on_model(theory: RawTheory, model: *mut c_void) -> bool {
    record(format!("on_model {:#x}", model as usize));
    !failing(state(theory), "on_model")
}

unsafe extern "C" fn mock_on_statistics(
    theory: RawTheory,
    step: *mut c_void,
    accu: *mut c_void,
) -> bool {
    record(format!("on_statistics {:#x} {:#x}", step as usize, accu as usize));
    !failing(state(theory), "on_statistics")
}

unsafe extern "C" fn mock_lookup_symbol(theory: RawTheory, symbol: u64, index: *mut usize) -> bool {
    match state(theory).entries.iter().position(|(s, _)| *s == symbol) {
        Some(position) => {
            *index = position + 1;
            true
        }
        None => false,
    }
}

unsafe extern "C" fn mock_get_symbol(theory: RawTheory, index: usize) -> u64 {
    state(theory)
        .entries
        .get(index.wrapping_sub(1))
        .map_or(0, |(s, _)| *s)
}

unsafe extern "C" fn mock_assignment_begin(_theory: RawTheory, thread_id: u32, index: *mut usize) {
    record(format!("assignment_begin {}", thread_id));
    *index = 0;
}

unsafe extern "C" fn mock_assignment_next(
    theory: RawTheory,
    _thread_id: u32,
    index: *mut usize,
) -> bool {
    if *index < state(theory).entries.len() {
        *index += 1;
        true
    } else {
        false
    }
}

unsafe extern "C" fn mock_assignment_has_value(
    theory: RawTheory,
    _thread_id: u32,
    index: usize,
) -> bool {
    matches!(
        state(theory).entries.get(index.wrapping_sub(1)),
        Some((_, Some(_)))
    )
}

unsafe extern "C" fn mock_assignment_get_value(
    theory: RawTheory,
    _thread_id: u32,
    index: usize,
    value: *mut RawValue,
) {
    if let Some((_, Some(raw))) = state(theory).entries.get(index.wrapping_sub(1)) {
        *value = *raw;
    }
}

unsafe extern "C" fn mock_configure(
    theory: RawTheory,
    key: *const c_char,
    value: *const c_char,
) -> bool {
    let key = CStr::from_ptr(key).to_string_lossy().into_owned();
    let value = CStr::from_ptr(value).to_string_lossy().into_owned();
    record(format!("configure {}={}", key, value));

    let mock = state(theory);
    if failing(mock, "configure") {
        return false;
    }
    if key == "invalid" {
        set_error(ERROR_LOGIC, "unknown option: invalid");
        return false;
    }
    if key == "rewrite.ignore_failures" {
        mock.ignore_add_failures = value == "true";
    } else if let Some(operation) = key.strip_prefix("fail.") {
        let Some((code, message)) = value.split_once(':') else {
            set_error(ERROR_LOGIC, "expected <code>:<message>");
            return false;
        };
        let Ok(code) = code.parse() else {
            set_error(ERROR_LOGIC, "invalid error code");
            return false;
        };
        mock.failures
            .insert(operation.to_string(), (code, message.to_string()));
    }
    true
}

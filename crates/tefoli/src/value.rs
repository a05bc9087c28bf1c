//! Symbols and theory values
//!
//! - `Symbol`: the host's 64-bit symbol id, passed through untouched
//! - `Value`: integer, double or symbol assigned by the theory
//!
//! Values arrive as a C tagged union ([`RawValue`]); [`Value::decode`] turns it
//! into a closed enum and rejects any discriminant it does not know.

use crate::error::{TheoryError, TheoryResult};
use crate::ffi::types::{RawValue, VALUE_DOUBLE, VALUE_INTEGER, VALUE_SYMBOL};
use std::fmt;

/// Host symbol (`clingo_symbol_t`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u64);

impl Symbol {
    pub fn from_raw(raw: u64) -> Self {
        Symbol(raw)
    }

    pub fn to_raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for Symbol {
    fn from(raw: u64) -> Self {
        Symbol(raw)
    }
}

impl From<Symbol> for u64 {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

/// Value assigned by a theory
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Integer(i32),
    Double(f64),
    Symbol(Symbol),
}

impl Value {
    /// Decode the tagged union filled in by `assignment_get_value`
    ///
    /// A discriminant outside 0..=2 means the library and this crate disagree on
    /// the layout; it is reported as [`TheoryError::InvalidValueKind`].
    pub fn decode(raw: &RawValue) -> TheoryResult<Self> {
        // SAFETY: the discriminant selects the initialized union member.
        unsafe {
            match raw.kind {
                VALUE_INTEGER => Ok(Value::Integer(raw.value.integer)),
                VALUE_DOUBLE => Ok(Value::Double(raw.value.double)),
                VALUE_SYMBOL => Ok(Value::Symbol(Symbol(raw.value.symbol))),
                other => Err(TheoryError::InvalidValueKind(other)),
            }
        }
    }

    /// Encode into the C layout
    pub fn encode(self) -> RawValue {
        match self {
            Value::Integer(n) => RawValue::integer(n),
            Value::Double(x) => RawValue::double(x),
            Value::Symbol(s) => RawValue::symbol(s.0),
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<Symbol> {
        match self {
            Value::Symbol(s) => Some(*s),
            _ => None,
        }
    }

    /// Type name used in messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Double(_) => "double",
            Value::Symbol(_) => "symbol",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Double(x) => write!(f, "{}", x),
            Value::Symbol(s) => write!(f, "<symbol {:#x}>", s.0),
        }
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Double(x)
    }
}

impl From<Symbol> for Value {
    fn from(s: Symbol) -> Self {
        Value::Symbol(s)
    }
}

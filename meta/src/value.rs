//! Compile-time values produced by partial evaluation (spec §4.3, §9).
//!
//! `value(symtab)` never throws: it returns an [`EvalResult`], an explicit
//! two-variant result type every pass branches on with ordinary
//! conditionals. This is the one non-local control-flow mechanism the
//! partial evaluator uses, and the design notes are explicit that it must
//! not be modeled as an exception — doing so would tangle the symbol
//! table's push/pop discipline with unwinding.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// An integer value together with the `Bits` width/signedness it was
    /// computed at, needed so folding can re-apply modular/defined-overflow
    /// wrapping when the value feeds into another operation.
    Int {
        value: i128,
        width: u32,
        signed: bool,
    },
    Bool(bool),
    Str(String),
    Tuple(Vec<Value>),
    Array(Vec<Value>),
}

impl Value {
    pub fn int(value: i128, width: u32, signed: bool) -> Value {
        Value::Int { value, width, signed }.wrapped()
    }

    pub fn bool(b: bool) -> Value {
        Value::Bool(b)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i128> {
        match self {
            Value::Int { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn width(&self) -> Option<u32> {
        match self {
            Value::Int { width, .. } => Some(*width),
            _ => None,
        }
    }

    /// Re-wraps an integer value to its declared width: modular for
    /// unsigned, two's-complement defined overflow for signed, per spec
    /// §4.3's width-semantics requirement.
    pub fn wrapped(self) -> Value {
        match self {
            Value::Int { value, width, signed } if width < 128 => {
                let modulus = 1i128 << width;
                let mut v = value.rem_euclid(modulus);
                if signed && v >= modulus / 2 {
                    v -= modulus;
                }
                Value::Int { value: v, width, signed }
            }
            other => other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int { value, .. } => write!(f, "{value}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Tuple(vs) | Value::Array(vs) => {
                write!(f, "(")?;
                for (i, v) in vs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// The result of `value(symtab)`: either a concrete value, or the
/// `value-unknown` sentinel (spec §4.3, §7). Never an `Err` of this crate's
/// `BackendError` — failing to fold is the expected, common case, not a
/// fatal condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalResult {
    Known(Value),
    Unknown,
}

impl EvalResult {
    pub fn known(v: Value) -> Self {
        EvalResult::Known(v)
    }

    pub fn is_known(&self) -> bool {
        matches!(self, EvalResult::Known(_))
    }

    pub fn as_known(&self) -> Option<&Value> {
        match self {
            EvalResult::Known(v) => Some(v),
            EvalResult::Unknown => None,
        }
    }

    pub fn into_known(self) -> Option<Value> {
        match self {
            EvalResult::Known(v) => Some(v),
            EvalResult::Unknown => None,
        }
    }

    pub fn map(self, f: impl FnOnce(Value) -> Value) -> EvalResult {
        match self {
            EvalResult::Known(v) => EvalResult::Known(f(v)),
            EvalResult::Unknown => EvalResult::Unknown,
        }
    }

    /// `value_try { ... } value_else { ... }`: runs `f` only if both sides
    /// are known, otherwise short-circuits to `Unknown` without invoking it.
    /// This is the Rust shape of the source's `value_try`/`value_else`
    /// idiom (design notes §9): an ordinary combinator, not a thrown
    /// exception wrapper.
    pub fn and_then2(self, other: EvalResult, f: impl FnOnce(Value, Value) -> EvalResult) -> EvalResult {
        match (self, other) {
            (EvalResult::Known(a), EvalResult::Known(b)) => f(a, b),
            _ => EvalResult::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_wraps_modularly() {
        assert_eq!(Value::int(256, 8, false), Value::Int { value: 0, width: 8, signed: false });
        assert_eq!(Value::int(-1, 8, false), Value::Int { value: 255, width: 8, signed: false });
    }

    #[test]
    fn signed_wraps_twos_complement() {
        assert_eq!(Value::int(128, 8, true), Value::Int { value: -128, width: 8, signed: true });
        assert_eq!(Value::int(-129, 8, true), Value::Int { value: 127, width: 8, signed: true });
    }

    #[test]
    fn and_then2_short_circuits_on_either_unknown() {
        let known = EvalResult::Known(Value::bool(true));
        let unknown = EvalResult::Unknown;
        assert_eq!(
            known.clone().and_then2(unknown.clone(), |_, _| EvalResult::Known(Value::bool(false))),
            EvalResult::Unknown
        );
        assert_eq!(
            unknown.and_then2(known, |_, _| EvalResult::Known(Value::bool(false))),
            EvalResult::Unknown
        );
    }
}

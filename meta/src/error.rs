//! Error kinds raised by the translation core (spec §7).
//!
//! `ValueUnknown` is deliberately **not** a variant here: partial evaluation
//! failure is routed through [`crate::value::EvalResult`], an explicit result
//! type that ordinary `if`/`match` branch on, never through `Result`'s `?`
//! propagation or a thrown exception (see the "value-unknown control flow"
//! design note). Every other kind is fatal and propagates with `?` through
//! this crate's `Result` alias.

use crate::ast::Span;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BackendError>;

/// A fatal error produced while analyzing, pruning, or emitting an AST that a
/// valid type-check should already rule out.
#[derive(Debug, Error)]
pub enum BackendError {
    /// An AST invariant was violated: a shape the type checker should have
    /// rejected reached this crate anyway.
    #[error("type error at {span}: {message}")]
    TypeError { span: Span, message: String },

    /// A node variant is missing a required behavior (e.g. no `gen_cpp`
    /// rendering, or a `value()` case unimplemented for a literal kind).
    #[error("internal error at {span}: {message}")]
    InternalError { span: Span, message: String },

    /// Register-dependency analysis (`find_src_registers`/
    /// `find_dst_registers`) found an `X[i]` index that is neither a literal
    /// nor a const-parameterized value.
    #[error("cannot statically determine register index at {span}: {message}")]
    ComplexRegDetermination { span: Span, message: String },
}

impl BackendError {
    pub fn type_error(span: Span, message: impl Into<String>) -> Self {
        BackendError::TypeError {
            span,
            message: message.into(),
        }
    }

    pub fn internal(span: Span, message: impl Into<String>) -> Self {
        BackendError::InternalError {
            span,
            message: message.into(),
        }
    }

    pub fn complex_reg(span: Span, message: impl Into<String>) -> Self {
        BackendError::ComplexRegDetermination {
            span,
            message: message.into(),
        }
    }
}

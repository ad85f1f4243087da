//! Backend passes for translating a type-checked IDL instruction-set
//! description into C++: a typed symbol table, a partial evaluator and
//! analysis suite, a pruning pass, a C++ emitter, a decoder generator, and
//! the name-mangling rules tying them together.
//!
//! This crate has no `build.rs` and touches no filesystem: every pass is a
//! pure function over an in-memory [`ast::Node`] tree and a [`symtab::SymbolTable`]
//! borrowed from a [`cfg::CfgArch`] view supplied by the caller. The
//! `hartgen` crate at the workspace root is the thing that actually owns a
//! resolver, a driver loop, and file I/O.

#[macro_use]
mod srcgen;

pub mod analysis;
pub mod ast;
pub mod cfg;
pub mod decoder;
pub mod emit;
pub mod error;
pub mod mangle;
pub mod prune;
pub mod symtab;
pub mod types;
pub mod value;

pub use error::{BackendError, Result};

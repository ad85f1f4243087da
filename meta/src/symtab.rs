//! Scoped symbol table (spec §3, §4.2 — component C2).
//!
//! A stack of [`Scope`]s. Lookups ascend from the top of the stack; writes
//! target the scope that introduced the name. Every `push` must be matched
//! by a `pop` on *every* control-flow exit, including the partial-evaluation
//! failure path — callers that might bail out early should prefer
//! [`SymbolTable::scoped`], which pops unconditionally via `Drop`-like RAII
//! instead of hand-matched push/pop pairs.

use crate::types::Type;
use crate::value::Value;
use std::collections::HashMap;

/// Tag recording why a scope exists, used only for `debug!`-level tracing of
/// scope balance (spec §8 property 6); it has no effect on lookup semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeOwner {
    Global,
    Function(String),
    Block,
}

#[derive(Debug, Clone)]
pub enum Binding {
    Var(VarBinding),
    Type(Type),
}

#[derive(Debug, Clone)]
pub struct VarBinding {
    pub name: String,
    pub ty: Type,
    pub value: Option<Value>,
    pub is_param: bool,
    pub is_template_value: bool,
    pub is_decode_var: bool,
    pub is_global: bool,
}

impl VarBinding {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        VarBinding {
            name: name.into(),
            ty,
            value: None,
            is_param: false,
            is_template_value: false,
            is_decode_var: false,
            is_global: false,
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn global(mut self) -> Self {
        self.is_global = true;
        self
    }

    pub fn param(mut self) -> Self {
        self.is_param = true;
        self
    }
}

struct Scope {
    owner: ScopeOwner,
    bindings: HashMap<String, Binding>,
}

/// A handle to the architecture configuration (xlen set, parameters, CSR
/// lookup). The symbol table only *carries* a reference to it; resolving it
/// is entirely the responsibility of the (out of scope) resolver, exposed
/// here through [`crate::cfg::CfgArch`].
pub struct SymbolTable<'a> {
    scopes: Vec<Scope>,
    cfg_arch: &'a dyn crate::cfg::CfgArch,
}

#[derive(Debug, thiserror::Error)]
#[error("duplicate symbol `{0}` in current scope")]
pub struct DuplicateSymbol(pub String);

impl<'a> SymbolTable<'a> {
    pub fn new(cfg_arch: &'a dyn crate::cfg::CfgArch) -> Self {
        let mut st = SymbolTable {
            scopes: Vec::new(),
            cfg_arch,
        };
        st.push(ScopeOwner::Global);
        st
    }

    pub fn cfg_arch(&self) -> &dyn crate::cfg::CfgArch {
        self.cfg_arch
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn push(&mut self, owner: ScopeOwner) {
        log::trace!("push scope {:?} (depth {})", owner, self.scopes.len() + 1);
        self.scopes.push(Scope {
            owner,
            bindings: HashMap::new(),
        });
    }

    pub fn pop(&mut self) {
        let popped = self.scopes.pop().expect("pop without matching push");
        log::trace!("pop scope {:?} (depth now {})", popped.owner, self.scopes.len());
    }

    /// Runs `f` inside a freshly pushed scope and pops it on return,
    /// including when `f`'s body bails out early with `?` (the closure's
    /// return value is an ordinary `T`, e.g. a `Result`, so an early `?`
    /// inside it never skips the matching `pop` below).
    pub fn scoped<T>(&mut self, owner: ScopeOwner, f: impl FnOnce(&mut Self) -> T) -> T {
        self.push(owner);
        let result = f(self);
        self.pop();
        result
    }

    /// Adds a binding, overwriting any existing binding of the same name in
    /// the current (topmost) scope.
    pub fn add(&mut self, name: impl Into<String>, binding: Binding) {
        let name = name.into();
        self.scopes
            .last_mut()
            .expect("symbol table scope stack is never empty")
            .bindings
            .insert(name, binding);
    }

    /// Adds a binding, failing if one already exists in the current scope.
    pub fn add_checked(
        &mut self,
        name: impl Into<String>,
        binding: Binding,
    ) -> Result<(), DuplicateSymbol> {
        let name = name.into();
        let scope = self
            .scopes
            .last_mut()
            .expect("symbol table scope stack is never empty");
        if scope.bindings.contains_key(&name) {
            return Err(DuplicateSymbol(name));
        }
        scope.bindings.insert(name, binding);
        Ok(())
    }

    /// Ascends the scope stack from the top, returning the first binding
    /// found for `name`.
    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.bindings.get(name))
    }

    pub fn get_var(&self, name: &str) -> Option<&VarBinding> {
        match self.get(name) {
            Some(Binding::Var(v)) => Some(v),
            _ => None,
        }
    }

    /// Updates the value attached to a variable binding in whichever scope
    /// introduced it (the write target, per spec §4.2).
    pub fn set_value(&mut self, name: &str, value: Value) -> bool {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(Binding::Var(v)) = scope.bindings.get_mut(name) {
                v.value = Some(value);
                return true;
            }
        }
        false
    }

    /// Invalidates a binding's value without removing the binding itself,
    /// used when pruning an assignment whose right-hand side no longer
    /// folds (spec §4.5's "executables update values" rule, applied to the
    /// unknown case).
    pub fn clear_value(&mut self, name: &str) -> bool {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(Binding::Var(v)) = scope.bindings.get_mut(name) {
                v.value = None;
                return true;
            }
        }
        false
    }

    pub fn del(&mut self, name: &str) {
        for scope in self.scopes.iter_mut().rev() {
            if scope.bindings.remove(name).is_some() {
                return;
            }
        }
    }

    /// Deep-clones the global scope only, for template instantiation: each
    /// call-site specialization gets its own mutable global scope so binding
    /// a template parameter's value at one call-site cannot leak into
    /// another's.
    pub fn clone_global_scope(&self) -> HashMap<String, Binding> {
        self.scopes[0].bindings.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::tests::TestCfgArch;

    fn init_logger() {
        let _ = env_logger::try_init();
    }

    #[test]
    fn lookup_ascends_from_top_of_stack() {
        init_logger();
        let cfg = TestCfgArch::default();
        let mut st = SymbolTable::new(&cfg);
        st.add("x", Binding::Var(VarBinding::new("x", Type::bits(32))));
        st.push(ScopeOwner::Block);
        st.add(
            "x",
            Binding::Var(VarBinding::new("x", Type::bits(8)).global()),
        );
        assert_eq!(st.get_var("x").unwrap().ty, Type::bits(8));
        st.pop();
        assert_eq!(st.get_var("x").unwrap().ty, Type::bits(32));
    }

    #[test]
    fn scoped_pops_even_on_early_return() {
        let cfg = TestCfgArch::default();
        let mut st = SymbolTable::new(&cfg);
        let depth_before = st.depth();
        let _: Option<()> = st.scoped(ScopeOwner::Block, |_st| None);
        assert_eq!(st.depth(), depth_before);
    }

    #[test]
    fn add_checked_rejects_duplicates() {
        let cfg = TestCfgArch::default();
        let mut st = SymbolTable::new(&cfg);
        st.add_checked("x", Binding::Var(VarBinding::new("x", Type::bits(1))))
            .unwrap();
        assert!(st
            .add_checked("x", Binding::Var(VarBinding::new("x", Type::bits(1))))
            .is_err());
    }
}

//! The architecture configuration view the symbol table and analysis passes
//! consult (spec §6's `cfg_arch`).
//!
//! Modeled as a trait rather than a concrete struct so the real resolver
//! (out of scope — it materializes this from YAML) and test doubles can both
//! implement it, the way the teacher's settings layer (`cdsl::settings`)
//! separates a builder/definition step from the concrete settings view
//! consumers see.

use crate::ast::FunctionDef;
use crate::types::Type;
use crate::value::Value;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Xlen {
    Xlen32,
    Xlen64,
}

impl Xlen {
    pub fn bits(&self) -> u32 {
        match self {
            Xlen::Xlen32 => 32,
            Xlen::Xlen64 => 64,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtensionVersion {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone)]
pub struct ExtensionInfo {
    pub name: String,
    pub versions: Vec<ExtensionVersion>,
}

pub trait CfgArch {
    fn possible_xlens(&self) -> BTreeSet<Xlen>;

    fn multi_xlen(&self) -> bool {
        self.possible_xlens().len() > 1
    }

    /// The statically known value of parameter `name`, if this configuration
    /// fixes it (a `None` means the parameter is runtime-configurable here).
    fn param(&self, name: &str) -> Option<Value>;

    /// Names of every parameter this configuration has pinned to a value,
    /// used by `constexpr?` (spec §4.4) to decide whether a parameter-bound
    /// identifier folds.
    fn params_with_value(&self) -> BTreeSet<String>;

    fn csr(&self, name: &str) -> Option<Type>;

    fn extension(&self, name: &str) -> Option<ExtensionInfo>;

    fn mandatory_extension_reqs(&self) -> BTreeSet<String>;

    fn function(&self, name: &str) -> Option<&FunctionDef>;
}

#[cfg(any(test, feature = "test-util"))]
pub mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Default)]
    pub struct TestCfgArch {
        pub xlens: BTreeSet<Xlen>,
        pub params: BTreeMap<String, Value>,
        pub functions: BTreeMap<String, FunctionDef>,
    }

    impl CfgArch for TestCfgArch {
        fn possible_xlens(&self) -> BTreeSet<Xlen> {
            if self.xlens.is_empty() {
                BTreeSet::from([Xlen::Xlen64])
            } else {
                self.xlens.clone()
            }
        }

        fn param(&self, name: &str) -> Option<Value> {
            self.params.get(name).cloned()
        }

        fn params_with_value(&self) -> BTreeSet<String> {
            self.params.keys().cloned().collect()
        }

        fn csr(&self, _name: &str) -> Option<Type> {
            None
        }

        fn extension(&self, _name: &str) -> Option<ExtensionInfo> {
            None
        }

        fn mandatory_extension_reqs(&self) -> BTreeSet<String> {
            BTreeSet::new()
        }

        fn function(&self, name: &str) -> Option<&FunctionDef> {
            self.functions.get(name)
        }
    }
}

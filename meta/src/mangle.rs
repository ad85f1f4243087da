//! C++ name mangling and literal rendering (spec §6 "Mangling rules" —
//! component C8).
//!
//! Every rule here is a pure string transform with no dependency on the
//! symbol table; `emit.rs` and `types.rs` call into this module rather than
//! duplicating the conventions inline.

use crate::value::Value;
use heck::ToUpperCamelCase;

/// `config` is camel-cased wherever it appears in a mangled name, per spec
/// §6.
pub fn camel_case(s: &str) -> String {
    s.to_upper_camel_case()
}

/// `?` is forbidden in C++ identifiers; every mangler and the emitter's
/// function-call rendering route through this to rename it uniformly.
pub fn escape_identifier(name: &str) -> String {
    name.replace('?', "_Q_")
}

fn dots_to_underscores(name: &str) -> String {
    name.replace('.', "_")
}

pub fn hart_name(config: &str) -> String {
    format!("{}_Hart", camel_case(config))
}

pub fn params_name(config: &str) -> String {
    format!("{}_Params", camel_case(config))
}

pub fn csr_name(config: &str, csr: &str) -> String {
    format!("{}_{}_Csr", camel_case(config), dots_to_underscores(csr))
}

pub fn csr_field_name(config: &str, csr: &str, field: &str) -> String {
    format!("{}_{}_{}_Field", camel_case(config), dots_to_underscores(csr), field)
}

pub fn csr_container_name(config: &str) -> String {
    format!("{}_CsrContainer", camel_case(config))
}

pub fn csr_view_name(config: &str, csr: &str) -> String {
    format!("{}_{}_CsrView", camel_case(config), dots_to_underscores(csr))
}

pub fn inst_name(config: &str, inst: &str) -> String {
    format!("{}_{}_Inst", camel_case(config), dots_to_underscores(inst))
}

/// `Integer.to_cxx`/`Boolean.to_cxx`/`String.to_cxx` (spec §6): the literal
/// form a statically known configuration value renders as when spliced
/// directly into emitted C++ (as opposed to an IDL-level `Bits<W>` literal,
/// which `emit::render_literal` handles separately).
pub fn value_to_cxx(v: &Value) -> String {
    match v {
        Value::Int { value, signed, .. } => {
            if *signed {
                format!("{value}ll")
            } else {
                format!("{value}ull")
            }
        }
        Value::Bool(b) => b.to_string(),
        Value::Str(s) => format!("{s:?}sv"),
        Value::Tuple(items) | Value::Array(items) => {
            let inner = items.iter().map(value_to_cxx).collect::<Vec<_>>().join(", ");
            format!("{{{inner}}}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_cases_hyphenated_and_underscored_config_names() {
        assert_eq!(camel_case("rv64-generic"), "Rv64Generic");
        assert_eq!(camel_case("rv32_imac"), "Rv32Imac");
    }

    #[test]
    fn csr_name_converts_dots_and_camel_cases_config() {
        assert_eq!(csr_name("rv64-generic", "satp.mode"), "Rv64Generic_satp_mode_Csr");
    }

    #[test]
    fn escape_identifier_mangles_question_marks() {
        assert_eq!(escape_identifier("implemented?"), "implemented_Q_");
    }

    #[test]
    fn integer_to_cxx_picks_suffix_by_signedness() {
        assert_eq!(value_to_cxx(&Value::int(5, 8, false)), "5ull");
        assert_eq!(value_to_cxx(&Value::int(-5, 8, true)), "-5ll");
    }

    #[test]
    fn boolean_and_string_to_cxx() {
        assert_eq!(value_to_cxx(&Value::bool(true)), "true");
        assert_eq!(value_to_cxx(&Value::Str("abc".into())), "\"abc\"sv");
    }
}

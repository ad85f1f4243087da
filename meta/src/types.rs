//! Semantic type system (spec §3, §4.1 — component C1).
//!
//! Every value an IDL expression can produce is represented by a [`Type`].
//! Widths are `Option<u32>`: `None` means "run-time determined" (spec's
//! `unknown` width). [`Type::convertible_to`] backs the (external) type
//! checker's `static_cast` decisions and this crate's own emitter; the two
//! are kept side by side because they diverge (equality ignores qualifiers,
//! convertibility does not require it).

use std::collections::BTreeMap;
use std::fmt;

/// A bit range `[msb..lsb]`, inclusive on both ends, matching the IDL's
/// convention for bitfield and CSR field declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitRange {
    pub msb: u32,
    pub lsb: u32,
}

impl BitRange {
    pub fn width(&self) -> u32 {
        self.msb - self.lsb + 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumType {
    pub name: String,
    pub width: u32,
    pub variants: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitfieldType {
    pub name: String,
    pub width: u32,
    pub fields: Vec<(String, BitRange)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructType {
    pub name: String,
    pub fields: Vec<(String, Box<Type>)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrType {
    pub csr_name: String,
    pub width: u32,
    pub fields: Vec<(String, BitfieldType)>,
}

/// Qualifiers carried alongside a [`Type`], irrelevant to equality but
/// inspected by convertibility/emission in a few places (signedness affects
/// both).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Qualifiers {
    pub is_const: bool,
    pub is_global: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    /// `width = None` is the spec's "unknown" width: run-time determined.
    Bits { width: Option<u32>, signed: bool },
    Boolean,
    /// `width = None` means an unbounded/dynamically sized string.
    String { width: Option<u32> },
    Void,
    Enum(EnumType),
    EnumRef(String),
    Bitfield(BitfieldType),
    /// `width = None` denotes a vector (unknown length).
    Array { elem: Box<Type>, width: Option<u32> },
    Tuple(Vec<Type>),
    Struct(StructType),
    Csr(CsrType),
    /// Function types only need a name for convertibility/equality purposes;
    /// the call protocol (body, defining scope) lives on `ast::FunctionDef`.
    Function { name: String },
}

impl Type {
    pub fn bits(width: u32) -> Type {
        Type::Bits {
            width: Some(width),
            signed: false,
        }
    }

    pub fn signed_bits(width: u32) -> Type {
        Type::Bits {
            width: Some(width),
            signed: true,
        }
    }

    pub fn unknown_bits(signed: bool) -> Type {
        Type::Bits {
            width: None,
            signed,
        }
    }

    pub fn width(&self) -> Option<u32> {
        match self {
            Type::Bits { width, .. } => *width,
            Type::String { width } => *width,
            Type::Enum(e) => Some(e.width),
            Type::Bitfield(b) => Some(b.width),
            Type::Array { width, .. } => *width,
            Type::Csr(c) => Some(c.width),
            _ => None,
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Type::Bits { signed: true, .. })
    }

    /// Structural equality: kind + width + (for structs/enums) name. Ignores
    /// qualifiers, per spec §4.1.
    pub fn equal_to(&self, other: &Type) -> bool {
        use Type::*;
        match (self, other) {
            (Bits { width: w1, signed: s1 }, Bits { width: w2, signed: s2 }) => {
                w1 == w2 && s1 == s2
            }
            (Boolean, Boolean) | (Void, Void) => true,
            (String { width: w1 }, String { width: w2 }) => w1 == w2,
            (Enum(a), Enum(b)) => a.name == b.name,
            (EnumRef(a), EnumRef(b)) => a == b,
            (Bitfield(a), Bitfield(b)) => a.name == b.name,
            (Array { elem: e1, width: w1 }, Array { elem: e2, width: w2 }) => {
                w1 == w2 && e1.equal_to(e2)
            }
            (Tuple(a), Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equal_to(y))
            }
            (Struct(a), Struct(b)) => a.name == b.name,
            (Csr(a), Csr(b)) => a.csr_name == b.csr_name,
            (Function { name: a }, Function { name: b }) => a == b,
            _ => false,
        }
    }

    /// Asymmetric convertibility relation used for `static_cast` decisions,
    /// exactly per spec §4.1.
    pub fn convertible_to(&self, target: &Type) -> bool {
        use Type::*;
        match (self, target) {
            (Boolean, Boolean) => true,
            (Boolean, _) | (_, Boolean) => false,

            (Bits { .. }, t) if !matches!(t, Boolean) => true,

            (Enum(e), Bits { width: Some(w), .. }) => e.width <= *w,
            (Enum(e1), Enum(e2)) => e1.name == e2.name,
            (Enum(_), Bits { width: None, .. }) => true,

            (EnumRef(a), Enum(b)) => a == &b.name,
            (EnumRef(a), EnumRef(b)) => a == b,

            (Tuple(a), Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.convertible_to(y))
            }

            (Csr(a), Csr(b)) => a.csr_name == b.csr_name,
            (Csr(a), Bits { width: Some(w), .. }) => a.width == *w,
            (Csr(a), Bits { width: None, .. }) => {
                let _ = a;
                true
            }

            (Bitfield(a), Bitfield(b)) => a.name == b.name,
            (Bitfield(a), Bits { width: Some(w), .. }) => a.width == *w,

            (Array { elem: e1, .. }, Array { elem: e2, .. }) => e1.convertible_to(e2),

            (String { .. }, String { .. }) => true,
            (Struct(a), Struct(b)) => a.name == b.name,
            (Void, Void) => true,
            (Function { name: a }, Function { name: b }) => a == b,

            _ => false,
        }
    }

    /// The C++ type this value renders as (spec §4.1's `render_cpp`).
    /// `bound` supplies a knowable upper bound for an unknown-width `Bits`
    /// when one is statically derivable (e.g. from a parameter's schema);
    /// without one, rendering falls back to `PossiblyUnknownBits<∞>` spelled
    /// as the sentinel template argument the emitter recognizes.
    pub fn render_cpp(&self, bound: Option<u32>) -> String {
        match self {
            Type::Bits { width: Some(w), signed } => {
                if *signed {
                    format!("SignedBits<{w}>")
                } else {
                    format!("Bits<{w}>")
                }
            }
            Type::Bits { width: None, signed } => {
                let max = bound.map(|b| b.to_string()).unwrap_or_else(|| "BitsInfinitePrecision".to_string());
                if *signed {
                    format!("PossiblyUnknownSignedBits<{max}>")
                } else {
                    format!("PossiblyUnknownBits<{max}>")
                }
            }
            Type::Boolean => "bool".to_string(),
            Type::String { .. } => "std::string".to_string(),
            Type::Void => "void".to_string(),
            Type::Enum(e) => e.name.clone(),
            Type::EnumRef(name) => name.clone(),
            Type::Bitfield(b) => b.name.clone(),
            Type::Array { elem, width: Some(w) } => {
                format!("std::array<{}, {}>", elem.render_cpp(None), w)
            }
            Type::Array { elem, width: None } => format!("std::vector<{}>", elem.render_cpp(None)),
            Type::Tuple(ts) => {
                let inner = ts.iter().map(|t| t.render_cpp(None)).collect::<Vec<_>>().join(", ");
                format!("std::tuple<{inner}>")
            }
            Type::Struct(s) => s.name.clone(),
            Type::Csr(c) => format!("{}Csr", crate::mangle::camel_case(&c.csr_name)),
            Type::Function { name } => name.clone(),
        }
    }

    /// Default value for known-shape types, used for uninitialized
    /// declarations and for-loop init slots.
    pub fn default_value_cpp(&self) -> Option<String> {
        match self {
            Type::Bits { width: Some(w), signed: false } => Some(format!("{w}'b0_b")),
            Type::Bits { width: Some(w), signed: true } => Some(format!("{w}'sb0_sb")),
            Type::Bits { width: None, .. } => None,
            Type::Boolean => Some("false".to_string()),
            Type::Enum(e) => e
                .variants
                .keys()
                .next()
                .map(|v| format!("{}::{}", e.name, v)),
            Type::Array { elem, width: Some(w) } => {
                elem.default_value_cpp().map(|d| {
                    let items = std::iter::repeat(d).take(*w as usize).collect::<Vec<_>>().join(", ");
                    format!("{{{items}}}")
                })
            }
            Type::Struct(_) | Type::Void | Type::String { .. } | Type::Csr(_) | Type::Bitfield(_)
            | Type::Array { width: None, .. } | Type::Tuple(_) | Type::EnumRef(_) | Type::Function { .. } => None,
        }
    }

    /// Builds a `Type` from a (JSON Schema) parameter description, per
    /// spec §4.1. Only the four schema shapes the parameter layer produces
    /// are supported; anything else is a type error for the caller to
    /// report with a span it has and this module does not.
    pub fn from_json_schema(schema: &JsonSchema) -> Option<Type> {
        match schema {
            JsonSchema::Boolean => Some(Type::Boolean),
            JsonSchema::Integer { minimum, maximum } => {
                let signed = *minimum < 0;
                let bound = maximum.unsigned_abs().max(minimum.unsigned_abs());
                let width = 64 - bound.leading_zeros().max(0).min(63);
                let width = width.max(1) + if signed { 1 } else { 0 };
                Some(Type::Bits {
                    width: Some(width),
                    signed,
                })
            }
            JsonSchema::String => Some(Type::String { width: None }),
            JsonSchema::Array { items } => {
                Type::from_json_schema(items).map(|elem| Type::Array {
                    elem: Box::new(elem),
                    width: None,
                })
            }
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render_cpp(None))
    }
}

/// A minimal JSON-Schema-shaped description, matching the four shapes the
/// parameter layer (out of scope) produces: `boolean`, `integer` (with
/// bounds), `string`, and homogeneous `array`.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonSchema {
    Boolean,
    Integer { minimum: i64, maximum: i64 },
    String,
    Array { items: Box<JsonSchema> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_only_converts_to_boolean() {
        assert!(Type::Boolean.convertible_to(&Type::Boolean));
        assert!(!Type::Boolean.convertible_to(&Type::bits(1)));
        assert!(!Type::bits(1).convertible_to(&Type::Boolean));
    }

    #[test]
    fn bits_convert_to_any_non_boolean() {
        assert!(Type::bits(32).convertible_to(&Type::bits(8)));
        assert!(Type::bits(32).convertible_to(&Type::String { width: None }));
    }

    #[test]
    fn enum_converts_to_wider_bits_only() {
        let e = EnumType {
            name: "Op".into(),
            width: 3,
            variants: BTreeMap::new(),
        };
        assert!(Type::Enum(e.clone()).convertible_to(&Type::bits(4)));
        assert!(!Type::Enum(e).convertible_to(&Type::bits(2)));
    }

    #[test]
    fn csr_converts_by_name_or_to_matching_width_bits() {
        let csr = CsrType {
            csr_name: "mstatus".into(),
            width: 64,
            fields: vec![],
        };
        assert!(Type::Csr(csr.clone()).convertible_to(&Type::Csr(csr.clone())));
        assert!(Type::Csr(csr.clone()).convertible_to(&Type::bits(64)));
        assert!(!Type::Csr(csr).convertible_to(&Type::bits(32)));
    }

    #[test]
    fn render_cpp_unknown_width_uses_bound_or_infinite_sentinel() {
        assert_eq!(
            Type::unknown_bits(false).render_cpp(Some(64)),
            "PossiblyUnknownBits<64>"
        );
        assert_eq!(
            Type::unknown_bits(false).render_cpp(None),
            "PossiblyUnknownBits<BitsInfinitePrecision>"
        );
    }

    #[test]
    fn equal_to_ignores_qualifiers_but_not_width_or_sign() {
        assert!(Type::bits(32).equal_to(&Type::bits(32)));
        assert!(!Type::bits(32).equal_to(&Type::signed_bits(32)));
        assert!(!Type::bits(32).equal_to(&Type::bits(64)));
    }
}

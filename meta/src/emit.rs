//! C++ emitter (spec §4.6 — component C6).
//!
//! Purely syntactic: every function here assumes its input has already been
//! pruned and type-checked, and never itself decides whether a branch is
//! reachable or a value is known — it only chooses *how to spell* a node
//! that partial evaluation and pruning have already settled. Expression
//! rendering returns a `String`; statement rendering writes into a
//! caller-supplied [`Formatter`] so an enclosing construct (a function body,
//! an `if`, a `for`) controls indentation.

use crate::analysis;
use crate::ast::{BinOp, BuiltinVar, CsrRef, FunctionDef, Node, NodeKind, Param, UnOp};
use crate::error::{BackendError, Result};
use crate::mangle;
use crate::srcgen::Formatter;
use crate::symtab::SymbolTable;
use crate::value::{EvalResult, Value};

fn is_x_register(base: &Node) -> bool {
    matches!(&base.kind, NodeKind::Identifier(name) if name == "X")
}

fn render_int_literal(value: i128, width: u32, signed: bool) -> String {
    if signed {
        format!("{width}'sb{value}_sb")
    } else {
        format!("{width}'b{value}_b")
    }
}

fn render_identifier(name: &str, symtab: &SymbolTable) -> String {
    match symtab.get_var(name) {
        Some(v) if v.is_decode_var => format!("{name}()"),
        Some(v) if v.is_param => {
            if symtab.cfg_arch().params_with_value().contains(name) {
                format!("__UDB_STATIC_PARAM({name})")
            } else {
                format!("__UDB_RUNTIME_PARAM({name})")
            }
        }
        Some(v) if v.is_global => {
            if v.value.is_some() {
                format!("__UDB_CONST_GLOBAL({name})")
            } else {
                format!("__UDB_MUTABLE_GLOBAL({name})")
            }
        }
        _ => name.to_string(),
    }
}

/// Renders `node` as a C++ expression. Fails only on statement-level node
/// kinds, which have no expression form.
pub fn render_expr(n: &Node, symtab: &SymbolTable) -> Result<String> {
    use NodeKind::*;
    match &n.kind {
        IntLiteral { value, width, signed, .. } => Ok(render_int_literal(*value, *width, *signed)),
        BoolLiteral(b) => Ok(b.to_string()),
        StringLiteral(s) => Ok(format!("{s:?}sv")),
        Identifier(name) => Ok(render_identifier(name, symtab)),
        Builtin(BuiltinVar::Encoding) => Ok("__UDB_ENCODING".to_string()),
        Builtin(BuiltinVar::Pc) => Ok("__UDB_PC".to_string()),

        Unary { op, operand } => {
            let inner = render_expr(operand, symtab)?;
            Ok(match op {
                UnOp::Neg => format!("(-{inner})"),
                UnOp::Not => format!("(!{inner})"),
                UnOp::BitNot => format!("(~{inner})"),
            })
        }
        Paren(e) => Ok(format!("({})", render_expr(e, symtab)?)),
        Binary { op, lhs, rhs } => render_binary(*op, lhs, rhs, symtab),
        Ternary { cond, if_true, if_false } => Ok(format!(
            "({} ? {} : {})",
            render_expr(cond, symtab)?,
            render_expr(if_true, symtab)?,
            render_expr(if_false, symtab)?
        )),

        ArrayAccess { base, index } if is_x_register(base) => {
            Ok(format!("__UDB_HART->_xreg({})", render_expr(index, symtab)?))
        }
        ArrayAccess { base, index } => Ok(format!("{}[{}]", render_expr(base, symtab)?, render_expr(index, symtab)?)),
        RangeAccess { base, msb, lsb } => render_range_access(base, msb, lsb, symtab),
        FieldAccess { base, field } => Ok(format!("{}.{field}", render_expr(base, symtab)?)),

        Concat(items) => {
            let parts = items.iter().map(|i| render_expr(i, symtab)).collect::<Result<Vec<_>>>()?;
            Ok(format!("concat({})", parts.join(", ")))
        }
        Replicate { value, count } => {
            Ok(format!("replicate({}, {})", render_expr(value, symtab)?, render_expr(count, symtab)?))
        }

        BitCast { target_width, operand } => {
            let wrapper = if operand.value(symtab).is_known() { "Bits" } else { "PossiblyUnknownBits" };
            Ok(format!("{wrapper}<{}>({})", render_expr(target_width, symtab)?, render_expr(operand, symtab)?))
        }
        SignCast(e) => Ok(format!("static_cast<SignedBitsTag>({})", render_expr(e, symtab)?)),
        EnumCast { enum_name, operand } => {
            Ok(format!("{}{{{}}}", mangle::escape_identifier(enum_name), render_expr(operand, symtab)?))
        }

        FunctionCall { name, template_args, args } => render_function_call(n, name, template_args, args, symtab),

        CsrRead { csr } => render_csr_read(csr, symtab),
        CsrFieldRead { csr, field } => Ok(format!("{}.{field}()._hw_read()", render_csr_ref(csr, symtab)?)),
        CsrFunctionCall { csr, func } => {
            Ok(format!("{}.{}()", render_csr_ref(csr, symtab)?, mangle::escape_identifier(func)))
        }

        _ => Err(BackendError::internal(n.span, "node variant has no expression rendering")),
    }
}

fn render_range_access(base: &Node, msb: &Node, lsb: &Node, symtab: &SymbolTable) -> Result<String> {
    let base_s = render_expr(base, symtab)?;
    match (msb.value(symtab), lsb.value(symtab)) {
        (EvalResult::Known(Value::Int { value: m, .. }), EvalResult::Known(Value::Int { value: l, .. })) => {
            Ok(format!("extract<{l}, {}>({base_s})", m - l + 1))
        }
        _ => Ok(format!("extract({base_s}, {}, {})", render_expr(msb, symtab)?, render_expr(lsb, symtab)?)),
    }
}

fn render_binary(op: BinOp, lhs: &Node, rhs: &Node, symtab: &SymbolTable) -> Result<String> {
    let l = render_expr(lhs, symtab)?;
    let r = render_expr(rhs, symtab)?;
    Ok(match op {
        BinOp::Add => format!("({l} + {r})"),
        BinOp::Sub => format!("({l} - {r})"),
        BinOp::Mul => format!("({l} * {r})"),
        BinOp::Div => format!("({l} / {r})"),
        BinOp::Mod => format!("({l} % {r})"),
        BinOp::And => format!("({l} && {r})"),
        BinOp::Or => format!("({l} || {r})"),
        BinOp::BitAnd => format!("({l} & {r})"),
        BinOp::BitOr => format!("({l} | {r})"),
        BinOp::BitXor => format!("({l} ^ {r})"),
        BinOp::Shr => format!("({l} >> {r})"),
        BinOp::Eq => format!("({l} == {r})"),
        BinOp::Ne => format!("({l} != {r})"),
        BinOp::Lt => format!("({l} < {r})"),
        BinOp::Le => format!("({l} <= {r})"),
        BinOp::Gt => format!("({l} > {r})"),
        BinOp::Ge => format!("({l} >= {r})"),
        BinOp::Sra => format!("{l}.sra({r})"),
        BinOp::WideningAdd => format!("{l}.widening_add({r})"),
        BinOp::WideningSub => format!("{l}.widening_sub({r})"),
        BinOp::WideningMul => format!("{l}.widening_mul({r})"),
        BinOp::WideningShl => format!("{l}.widening_sll({r})"),
        BinOp::Shl => match rhs.value(symtab) {
            EvalResult::Known(Value::Int { value, .. }) => format!("{l}.template sll<{value}>()"),
            _ => format!("{l}.sll({r})"),
        },
    })
}

fn render_function_call(n: &Node, name: &str, template_args: &[Node], args: &[crate::ast::Arg], symtab: &SymbolTable) -> Result<String> {
    let escaped = mangle::escape_identifier(name);
    let rendered_args = args.iter().map(|a| render_expr(&a.value, symtab)).collect::<Result<Vec<_>>>()?.join(", ");
    let prefix = if analysis::is_constexpr(n, symtab) { "__UDB_CONSTEXPR_FUNC_CALL" } else { "__UDB_FUNC_CALL" };
    if template_args.is_empty() {
        Ok(format!("{prefix} {escaped}({rendered_args})"))
    } else {
        let parts = template_args.iter().map(|t| render_expr(t, symtab)).collect::<Result<Vec<_>>>()?;
        Ok(format!("{prefix} template {escaped}<{}>({rendered_args})", parts.join(", ")))
    }
}

fn render_csr_ref(csr: &CsrRef, symtab: &SymbolTable) -> Result<String> {
    match &csr.name {
        Some(name) => Ok(format!("__UDB_CSR_BY_NAME({name})")),
        None => {
            let addr = csr
                .addr_expr
                .as_deref()
                .ok_or_else(|| BackendError::internal(Default::default(), "csr reference missing both name and address"))?;
            Ok(format!("__UDB_CSR_BY_ADDR({})", render_expr(addr, symtab)?))
        }
    }
}

fn render_csr_read(csr: &CsrRef, symtab: &SymbolTable) -> Result<String> {
    let base = render_csr_ref(csr, symtab)?;
    let args = if symtab.cfg_arch().multi_xlen() { "xlen()" } else { "" };
    Ok(format!("{base}._hw_read({args})"))
}

/// Renders `n` as one or more C++ statements into `f`.
pub fn emit_statement(f: &mut Formatter, n: &Node, symtab: &SymbolTable) -> Result<()> {
    use NodeKind::*;
    match &n.kind {
        ArrayAssign { base, index, value } if is_x_register(base) => {
            fmtln!(f, "__UDB_HART->_set_xreg({}, {});", render_expr(index, symtab)?, render_expr(value, symtab)?);
        }
        ArrayAssign { base, index, value } => {
            fmtln!(f, "{}[{}] = {};", render_expr(base, symtab)?, render_expr(index, symtab)?, render_expr(value, symtab)?);
        }
        RangeAssign { base, msb, lsb, value } => {
            let base_s = render_expr(base, symtab)?;
            let value_s = render_expr(value, symtab)?;
            match (msb.value(symtab), lsb.value(symtab)) {
                (EvalResult::Known(Value::Int { value: m, .. }), EvalResult::Known(Value::Int { value: l, .. })) => {
                    fmtln!(f, "bit_insert<{m}, {l}>({base_s}, {value_s});");
                }
                _ => {
                    let m = render_expr(msb, symtab)?;
                    let l = render_expr(lsb, symtab)?;
                    fmtln!(f, "bit_insert({base_s}, {m}, {l}, {value_s});");
                }
            }
        }
        FieldAssign { base, field, value } => {
            fmtln!(f, "{}.{field} = {};", render_expr(base, symtab)?, render_expr(value, symtab)?);
        }
        VariableAssign { name, value } => {
            fmtln!(f, "{} = {};", render_identifier(name, symtab), render_expr(value, symtab)?);
        }
        MultiAssign { names, value } => {
            let lhs = names.iter().map(|n| render_identifier(n, symtab)).collect::<Vec<_>>().join(", ");
            fmtln!(f, "std::tie({}) = {};", lhs, render_expr(value, symtab)?);
        }
        CsrWrite { csr, value } => {
            fmtln!(f, "{}._hw_write({});", render_csr_ref(csr, symtab)?, render_expr(value, symtab)?);
        }
        CsrFieldWrite { csr, field, value } => {
            fmtln!(f, "{}.{field}()._hw_write({});", render_csr_ref(csr, symtab)?, render_expr(value, symtab)?);
        }
        PcAssign(e) => {
            fmtln!(f, "__UDB_SET_PC({});", render_expr(e, symtab)?);
        }

        Declaration { name, ty } => {
            fmtln!(f, "{} {};", ty.render_cpp(None), name);
        }
        DeclarationWithInit { name, ty, init } => {
            fmtln!(f, "{} {} = {};", ty.render_cpp(None), name, render_expr(init, symtab)?);
        }
        MultiDeclaration { names, tys } => {
            let decls = names.iter().zip(tys).map(|(n, t)| t.render_cpp(None) + " " + n).collect::<Vec<_>>().join(", ");
            fmtln!(f, "std::tuple<{}> {};", tys.iter().map(|t| t.render_cpp(None)).collect::<Vec<_>>().join(", "), decls);
        }

        If { .. } => emit_if(f, n, symtab)?,
        ForLoop { var, init, cond, update, body } => {
            fmtln!(f, "for ({} = {}; {}; {}) {{", var, render_expr(init, symtab)?, render_expr(cond, symtab)?, render_expr(update, symtab)?);
            f.indent(|f| emit_body(f, body, symtab))?;
            f.line("}");
        }

        Return(values) => match values.len() {
            0 => f.line("return;"),
            1 => {
                fmtln!(f, "return {};", render_expr(&values[0], symtab)?);
            }
            _ => {
                let parts = values.iter().map(|v| render_expr(v, symtab)).collect::<Result<Vec<_>>>()?;
                fmtln!(f, "return std::tuple{{{}}};", parts.join(", "));
            }
        },
        Raise { code } => {
            fmtln!(f, "raise({});", render_expr(code, symtab)?);
        }
        ConditionalStatement { cond, stmt } => {
            fmtln!(f, "if ({}) {{", render_expr(cond, symtab)?);
            f.indent(|f| emit_statement(f, stmt, symtab))?;
            f.line("}");
        }
        ConditionalReturn { cond, values } => {
            fmtln!(f, "if ({}) {{", render_expr(cond, symtab)?);
            f.indent(|f| -> Result<()> {
                match values.len() {
                    0 => f.line("return;"),
                    1 => fmtln!(f, "return {};", render_expr(&values[0], symtab)?),
                    _ => {
                        let parts = values.iter().map(|v| render_expr(v, symtab)).collect::<Result<Vec<_>>>()?;
                        fmtln!(f, "return std::tuple{{{}}};", parts.join(", "));
                    }
                }
                Ok(())
            })?;
            f.line("}");
        }

        FunctionBody(stmts) => emit_body(f, stmts, symtab)?,
        StatementWrapper(s) => emit_statement(f, s, symtab)?,
        Noop => {}

        _ => return Err(BackendError::internal(n.span, "node variant has no statement rendering")),
    }
    Ok(())
}

fn emit_if(f: &mut Formatter, n: &Node, symtab: &SymbolTable) -> Result<()> {
    let NodeKind::If { cond, then_body, elsifs, else_body } = &n.kind else {
        return Err(BackendError::internal(n.span, "emit_if called on a non-If node"));
    };
    fmtln!(f, "if ({}) {{", render_expr(cond, symtab)?);
    f.indent(|f| emit_body(f, then_body, symtab))?;
    for e in elsifs {
        f.outdented_line(format!("}} else if ({}) {{", render_expr(&e.cond, symtab)?));
        f.indent(|f| emit_body(f, &e.body, symtab))?;
    }
    if let Some(eb) = else_body {
        f.outdented_line("} else {");
        f.indent(|f| emit_body(f, eb, symtab))?;
    }
    f.line("}");
    Ok(())
}

pub fn emit_body(f: &mut Formatter, stmts: &[Node], symtab: &SymbolTable) -> Result<()> {
    for stmt in stmts {
        emit_statement(f, stmt, symtab)?;
    }
    Ok(())
}

/// Renders a standalone statement list (an instruction's operation body, a
/// CSR field's custom `type()` body) without a surrounding function
/// signature.
pub fn render_statements(stmts: &[Node], symtab: &SymbolTable) -> Result<String> {
    let mut f = Formatter::new();
    emit_body(&mut f, stmts, symtab)?;
    Ok(f.into_string())
}

fn render_param(p: &Param, body: &[Node], symtab: &SymbolTable) -> String {
    let written = body.iter().any(|s| analysis::is_written(s, symtab, &p.name));
    let ty = p.ty.render_cpp(None);
    if written {
        format!("{ty}& {}", p.name)
    } else {
        format!("const {ty}& {}", p.name)
    }
}

/// Renders a function's `template <...> [[noreturn]] Ret name(params)`
/// header, without a trailing `{`.
pub fn render_function_prototype(def: &FunctionDef, symtab: &SymbolTable) -> String {
    let template_prefix = if def.template_params.is_empty() {
        String::new()
    } else {
        let parts = def.template_params.iter().map(|p| format!("{} {}", p.ty.render_cpp(None), p.name)).collect::<Vec<_>>().join(", ");
        format!("template <{parts}>\n")
    };
    let noreturn = if def.is_raise { "[[noreturn]] " } else { "" };
    let ret = match def.return_types.len() {
        0 => "void".to_string(),
        1 => def.return_types[0].render_cpp(None),
        _ => format!("std::tuple<{}>", def.return_types.iter().map(|t| t.render_cpp(None)).collect::<Vec<_>>().join(", ")),
    };
    let params = def.params.iter().map(|p| render_param(p, &def.body, symtab)).collect::<Vec<_>>().join(", ");
    format!("{template_prefix}{noreturn}{ret} {}({params})", mangle::escape_identifier(&def.name))
}

/// Renders a full function definition: prototype, `{`, body, `}`.
pub fn render_function(def: &FunctionDef, symtab: &SymbolTable) -> Result<String> {
    let mut f = Formatter::new();
    fmtln!(f, "{} {{", render_function_prototype(def, symtab));
    f.indent(|f| emit_body(f, &def.body, symtab))?;
    f.line("}");
    Ok(f.into_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Span;
    use crate::cfg::tests::TestCfgArch;
    use crate::types::Type;

    fn ident(name: &str) -> Node {
        Node::new(NodeKind::Identifier(name.into()), Span::default())
    }

    #[test]
    fn bits32_add_renders_without_cast() {
        let cfg = TestCfgArch::default();
        let st = SymbolTable::new(&cfg);
        let expr = Node::new(
            NodeKind::Binary { op: BinOp::Add, lhs: Box::new(ident("a")), rhs: Box::new(ident("b")) },
            Span::default(),
        );
        assert_eq!(render_expr(&expr, &st).unwrap(), "(a + b)");
    }

    #[test]
    fn variable_assign_renders_with_equals() {
        let cfg = TestCfgArch::default();
        let st = SymbolTable::new(&cfg);
        let mut f = Formatter::new();
        let stmt = Node::new(
            NodeKind::VariableAssign {
                name: "result".into(),
                value: Box::new(Node::new(NodeKind::Binary { op: BinOp::Add, lhs: Box::new(ident("a")), rhs: Box::new(ident("b")) }, Span::default())),
            },
            Span::default(),
        );
        emit_statement(&mut f, &stmt, &st).unwrap();
        assert_eq!(f.into_string(), "result = (a + b);\n");
    }

    #[test]
    fn xreg_write_uses_hart_accessor() {
        let cfg = TestCfgArch::default();
        let st = SymbolTable::new(&cfg);
        let mut f = Formatter::new();
        let stmt = Node::new(
            NodeKind::ArrayAssign {
                base: Box::new(ident("X")),
                index: Box::new(ident("rd")),
                value: Box::new(Node::new(NodeKind::IntLiteral { value: 1, width: 32, signed: false, width_known: true }, Span::default())),
            },
            Span::default(),
        );
        emit_statement(&mut f, &stmt, &st).unwrap();
        assert_eq!(f.into_string(), "__UDB_HART->_set_xreg(rd, 32'b1_b);\n");
    }

    #[test]
    fn range_access_with_known_bounds_uses_templated_extract() {
        let cfg = TestCfgArch::default();
        let st = SymbolTable::new(&cfg);
        let expr = Node::new(
            NodeKind::RangeAccess {
                base: Box::new(ident("enc")),
                msb: Box::new(Node::new(NodeKind::IntLiteral { value: 11, width: 8, signed: false, width_known: true }, Span::default())),
                lsb: Box::new(Node::new(NodeKind::IntLiteral { value: 7, width: 8, signed: false, width_known: true }, Span::default())),
            },
            Span::default(),
        );
        assert_eq!(render_expr(&expr, &st).unwrap(), "extract<7, 5>(enc)");
    }

    #[test]
    fn enum_cast_renders_without_spurious_paren() {
        let cfg = TestCfgArch::default();
        let st = SymbolTable::new(&cfg);
        let expr = Node::new(NodeKind::EnumCast { enum_name: "Opcode".into(), operand: Box::new(ident("raw")) }, Span::default());
        assert_eq!(render_expr(&expr, &st).unwrap(), "Opcode{raw}");
    }

    #[test]
    fn function_prototype_marks_unwritten_param_const() {
        let cfg = TestCfgArch::default();
        let st = SymbolTable::new(&cfg);
        let def = FunctionDef {
            name: "helper".into(),
            template_params: vec![],
            params: vec![Param { name: "x".into(), ty: Type::bits(32) }],
            return_types: vec![Type::bits(32)],
            body: vec![Node::new(NodeKind::Return(vec![ident("x")]), Span::default())],
            is_builtin: false,
            is_raise: false,
        };
        let proto = render_function_prototype(&def, &st);
        assert!(proto.contains("const Bits<32>& x"));
    }
}

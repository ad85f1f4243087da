//! Analysis passes (spec §4.4 — component C4).
//!
//! Every pass here is a recursive AST traversal whose default composition is
//! the `any`/`all`/union of a node's children, with small per-variant
//! overrides documented inline. None of these passes mutate the AST; several
//! push/pop scopes locally (memoizing template specializations, evaluating
//! a called function's body) and must leave the symbol table's depth
//! unchanged on every exit path — see `SymbolTable::scoped`.

use crate::ast::{BinOp, Node, NodeKind};
use crate::error::{BackendError, Result};
use crate::symtab::SymbolTable;
use crate::value::EvalResult;
use std::collections::{BTreeSet, HashMap};

/// `constexpr?(n, symtab)` (spec §4.4): default is "all children are
/// constexpr". PC assignment, CSR reads/writes/field reads/software writes,
/// and calls to non-builtin functions are conservatively not constexpr;
/// `CsrFunctionCall("address")` is the one CSR-adjacent operation that is.
pub fn is_constexpr(n: &Node, symtab: &SymbolTable) -> bool {
    use NodeKind::*;
    match &n.kind {
        Identifier(name) => match symtab.get_var(name) {
            Some(v) if v.is_global => v.is_param && symtab.cfg_arch().params_with_value().contains(name),
            Some(_) => true,
            None => false,
        },
        PcAssign(_) | CsrRead { .. } | CsrWrite { .. } | CsrFieldRead { .. } | CsrFieldWrite { .. } => false,
        CsrFunctionCall { func, .. } => func == "address",
        FunctionCall { name, .. } => match symtab.cfg_arch().function(name) {
            Some(f) if f.is_builtin => n.children().iter().all(|c| is_constexpr(c, symtab)),
            _ => false,
        },
        _ => n.children().iter().all(|c| is_constexpr(c, symtab)),
    }
}

/// `control_flow?(n, symtab)` (spec §4.4): true iff a descendant assigns PC
/// or calls a non-builtin, non-`raise*` function whose body itself has
/// control flow. `raise*` calls never count, even transitively.
pub fn has_control_flow(n: &Node, symtab: &SymbolTable) -> bool {
    use NodeKind::*;
    match &n.kind {
        PcAssign(_) => true,
        Raise { .. } => false,
        FunctionCall { name, .. } => {
            if let Some(f) = symtab.cfg_arch().function(name) {
                if f.is_raise || f.is_builtin {
                    return n.children().iter().any(|c| has_control_flow(c, symtab));
                }
                return f.body.iter().any(|s| has_control_flow(s, symtab))
                    || n.children().iter().any(|c| has_control_flow(c, symtab));
            }
            n.children().iter().any(|c| has_control_flow(c, symtab))
        }
        _ => n.children().iter().any(|c| has_control_flow(c, symtab)),
    }
}

/// `written?(n, symtab, name)` (spec §4.4): tracks whether `name` is written
/// on any path, through `variable`/`array-element`/`array-range`/`field`/
/// `multi-variable` assignment targets.
pub fn is_written(n: &Node, symtab: &SymbolTable, name: &str) -> bool {
    use NodeKind::*;
    match &n.kind {
        VariableAssign { name: target, value } => target == name || is_written(value, symtab, name),
        MultiAssign { names, value } => names.iter().any(|t| t == name) || is_written(value, symtab, name),
        ArrayAssign { base, index, value } => {
            assigns_to(base, name) || is_written(index, symtab, name) || is_written(value, symtab, name)
        }
        RangeAssign { base, msb, lsb, value } => {
            assigns_to(base, name)
                || is_written(msb, symtab, name)
                || is_written(lsb, symtab, name)
                || is_written(value, symtab, name)
        }
        FieldAssign { base, value, .. } => assigns_to(base, name) || is_written(value, symtab, name),
        _ => n.children().iter().any(|c| is_written(c, symtab, name)),
    }
}

fn assigns_to(base: &Node, name: &str) -> bool {
    matches!(&base.kind, NodeKind::Identifier(n) if n == name)
}

/// `reachable_functions(n, symtab)` (spec §4.4): union over calls, including
/// transitively through the called body after template specialization and
/// argument value application. Memoized per `(function_name, template
/// signature, argument signature)`; when argument values are unknown the
/// memo key is omitted (per spec) so mutual recursion through unknown
/// arguments is simply re-traversed rather than cached wrongly.
pub fn reachable_functions(n: &Node, symtab: &SymbolTable) -> BTreeSet<String> {
    let mut memo = HashMap::new();
    let mut out = BTreeSet::new();
    collect_reachable(n, symtab, &mut memo, &mut out);
    out
}

fn collect_reachable(
    n: &Node,
    symtab: &SymbolTable,
    memo: &mut HashMap<String, BTreeSet<String>>,
    out: &mut BTreeSet<String>,
) {
    if let NodeKind::FunctionCall { name, template_args, args } = &n.kind {
        out.insert(name.clone());
        if let Some(def) = symtab.cfg_arch().function(name) {
            let template_sig: Option<Vec<i128>> = template_args
                .iter()
                .map(|t| t.value(symtab).into_known().and_then(|v| v.as_int()))
                .collect();
            let arg_sig: Option<Vec<i128>> = args
                .iter()
                .map(|a| a.value.value(symtab).into_known().and_then(|v| v.as_int()))
                .collect();

            let memo_key = match (&template_sig, &arg_sig) {
                (Some(t), Some(a)) => Some(format!("{name}#{t:?}#{a:?}")),
                _ => None,
            };

            if let Some(key) = &memo_key {
                if let Some(cached) = memo.get(key) {
                    out.extend(cached.iter().cloned());
                    return recurse_children(n, symtab, memo, out);
                }
                memo.insert(key.clone(), BTreeSet::new());
            }

            let mut nested = BTreeSet::new();
            for stmt in &def.body {
                collect_reachable(stmt, symtab, memo, &mut nested);
            }
            out.extend(nested.iter().cloned());
            if let Some(key) = memo_key {
                memo.insert(key, nested);
            }
        }
    }
    recurse_children(n, symtab, memo, out);
}

fn recurse_children(
    n: &Node,
    symtab: &SymbolTable,
    memo: &mut HashMap<String, BTreeSet<String>>,
    out: &mut BTreeSet<String>,
) {
    for child in n.children() {
        collect_reachable(child, symtab, memo, out);
    }
}

/// `reachable_exceptions(n, symtab, cache)` (spec §4.4): `raise(code)`
/// contributes `1 << code` to the returned bitmask. When an `If`'s guard is
/// knowable, only the taken branch contributes; otherwise every branch's
/// mask is unioned in (this is also what makes pruning exception-monotone,
/// spec §8 property 4 — pruning a known-false branch away can only narrow
/// what `reachable_exceptions` reports, and reachability itself already
/// ignored that branch).
pub fn reachable_exceptions(
    n: &Node,
    symtab: &SymbolTable,
    cache: &mut HashMap<String, u64>,
) -> Result<u64> {
    use NodeKind::*;
    match &n.kind {
        Raise { code } => match code.value(symtab) {
            EvalResult::Known(v) => {
                let code = v.as_int().ok_or_else(|| {
                    BackendError::internal(n.span, "raise() code did not evaluate to an integer")
                })?;
                Ok(1u64 << code)
            }
            EvalResult::Unknown => Err(BackendError::type_error(
                n.span,
                "raise() code must be resolvable at analysis time",
            )),
        },
        If { cond, then_body, elsifs, else_body } => {
            match cond.value(symtab) {
                EvalResult::Known(v) => {
                    if v.as_bool().unwrap_or(false) {
                        reachable_exceptions_body(then_body, symtab, cache)
                    } else {
                        reachable_exceptions_elsifs(elsifs, else_body.as_deref(), symtab, cache)
                    }
                }
                EvalResult::Unknown => {
                    let mut mask = reachable_exceptions_body(then_body, symtab, cache)?;
                    mask |= reachable_exceptions_elsifs(elsifs, else_body.as_deref(), symtab, cache)?;
                    Ok(mask)
                }
            }
        }
        FunctionCall { name, .. } => {
            if let Some(cached) = cache.get(name) {
                return Ok(*cached);
            }
            let mask = if let Some(def) = symtab.cfg_arch().function(name) {
                reachable_exceptions_body(&def.body, symtab, cache)?
            } else {
                0
            };
            cache.insert(name.clone(), mask);
            Ok(mask)
        }
        _ => {
            let mut mask = 0;
            for child in n.children() {
                mask |= reachable_exceptions(child, symtab, cache)?;
            }
            Ok(mask)
        }
    }
}

fn reachable_exceptions_body(body: &[Node], symtab: &SymbolTable, cache: &mut HashMap<String, u64>) -> Result<u64> {
    let mut mask = 0;
    for stmt in body {
        mask |= reachable_exceptions(stmt, symtab, cache)?;
    }
    Ok(mask)
}

fn reachable_exceptions_elsifs(
    elsifs: &[crate::ast::ElsIf],
    else_body: Option<&[Node]>,
    symtab: &SymbolTable,
    cache: &mut HashMap<String, u64>,
) -> Result<u64> {
    if let Some((first, rest)) = elsifs.split_first() {
        match first.cond.value(symtab) {
            EvalResult::Known(v) => {
                if v.as_bool().unwrap_or(false) {
                    reachable_exceptions_body(&first.body, symtab, cache)
                } else {
                    reachable_exceptions_elsifs(rest, else_body, symtab, cache)
                }
            }
            EvalResult::Unknown => {
                let mut mask = reachable_exceptions_body(&first.body, symtab, cache)?;
                mask |= reachable_exceptions_elsifs(rest, else_body, symtab, cache)?;
                Ok(mask)
            }
        }
    } else if let Some(else_body) = else_body {
        reachable_exceptions_body(else_body, symtab, cache)
    } else {
        Ok(0)
    }
}

/// Register indices read through `X[...]` in an rvalue position.
pub fn find_src_registers(n: &Node, symtab: &SymbolTable) -> Result<BTreeSet<u32>> {
    let mut out = BTreeSet::new();
    collect_registers(n, symtab, false, &mut out)?;
    Ok(out)
}

/// Register indices written through `X[...] = ...`.
pub fn find_dst_registers(n: &Node, symtab: &SymbolTable) -> Result<BTreeSet<u32>> {
    let mut out = BTreeSet::new();
    collect_registers(n, symtab, true, &mut out)?;
    Ok(out)
}

fn collect_registers(n: &Node, symtab: &SymbolTable, writes: bool, out: &mut BTreeSet<u32>) -> Result<()> {
    match &n.kind {
        NodeKind::ArrayAccess { base, index } if is_x_register_file(base) && !writes => {
            out.insert(resolve_register_index(index, symtab)?);
        }
        NodeKind::ArrayAssign { base, index, value } if is_x_register_file(base) && writes => {
            out.insert(resolve_register_index(index, symtab)?);
            collect_registers(value, symtab, writes, out)?;
        }
        _ => {
            for child in n.children() {
                collect_registers(child, symtab, writes, out)?;
            }
        }
    }
    Ok(())
}

fn is_x_register_file(base: &Node) -> bool {
    matches!(&base.kind, NodeKind::Identifier(name) if name == "X")
}

fn resolve_register_index(index: &Node, symtab: &SymbolTable) -> Result<u32> {
    match index.value(symtab) {
        EvalResult::Known(v) => v
            .as_int()
            .map(|i| i as u32)
            .ok_or_else(|| BackendError::complex_reg(index.span, "register index did not evaluate to an integer")),
        EvalResult::Unknown => {
            // A const-parameterized index (a parameter bound to a known
            // value by this configuration) is still determinable even
            // though `value()` alone can't see through the parameter
            // lookup path used here; anything else is genuinely complex.
            if let NodeKind::Identifier(name) = &index.kind {
                if let Some(v) = symtab.cfg_arch().param(name) {
                    if let Some(i) = v.as_int() {
                        return Ok(i as u32);
                    }
                }
            }
            Err(BackendError::complex_reg(
                index.span,
                "register index is neither a literal nor a const-parameterized value",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BuiltinVar, ElsIf, Span};
    use crate::cfg::tests::TestCfgArch;
    use crate::value::Value;

    fn span() -> Span {
        Span::default()
    }

    fn raise(code: i128) -> Node {
        Node::new(
            NodeKind::Raise {
                code: Box::new(Node::new(
                    NodeKind::IntLiteral { value: code, width: 8, signed: false, width_known: true },
                    span(),
                )),
            },
            span(),
        )
    }

    fn ident(name: &str) -> Node {
        Node::new(NodeKind::Identifier(name.into()), span())
    }

    #[test]
    fn reachable_exceptions_transitively_through_known_choice() {
        // mirrors the "reachable raise — transitive known values" scenario:
        // choose(Choice::B) picks the branch raising code 1.
        let cfg = TestCfgArch::default();
        let mut st = SymbolTable::new(&cfg);
        st.add(
            "choice",
            crate::symtab::Binding::Var(
                crate::symtab::VarBinding::new("choice", crate::types::Type::bits(2))
                    .with_value(Value::int(1, 2, false)),
            ),
        );
        let if_node = Node::new(
            NodeKind::If {
                cond: Box::new(Node::new(
                    NodeKind::Binary {
                        op: BinOp::Eq,
                        lhs: Box::new(ident("choice")),
                        rhs: Box::new(Node::new(
                            NodeKind::IntLiteral { value: 1, width: 2, signed: false, width_known: true },
                            span(),
                        )),
                    },
                    span(),
                )),
                then_body: vec![raise(1)],
                elsifs: vec![],
                else_body: Some(vec![raise(0)]),
            },
            span(),
        );
        let mut cache = HashMap::new();
        let mask = reachable_exceptions(&if_node, &st, &mut cache).unwrap();
        assert_eq!(mask, 1 << 1);
    }

    #[test]
    fn reachable_exceptions_union_down_unknown_path() {
        let cfg = TestCfgArch::default();
        let st = SymbolTable::new(&cfg);
        let unknown_cond = Node::new(
            NodeKind::Binary {
                op: BinOp::Eq,
                lhs: Box::new(ident("unknown")),
                rhs: Box::new(Node::new(NodeKind::IntLiteral { value: 1, width: 8, signed: false, width_known: true }, span())),
            },
            span(),
        );
        let inner_if = Node::new(
            NodeKind::If {
                cond: Box::new(ident("choose_b")),
                then_body: vec![raise(1)],
                elsifs: vec![],
                else_body: Some(vec![raise(0)]),
            },
            span(),
        );
        let outer = Node::new(
            NodeKind::If {
                cond: Box::new(unknown_cond),
                then_body: vec![inner_if],
                elsifs: vec![],
                else_body: None,
            },
            span(),
        );
        let mut cache = HashMap::new();
        let mask = reachable_exceptions(&outer, &st, &mut cache).unwrap();
        assert_eq!(mask, (1 << 1) | (1 << 0));
    }

    #[test]
    fn csr_function_call_address_is_constexpr_others_are_not() {
        let cfg = TestCfgArch::default();
        let st = SymbolTable::new(&cfg);
        let addr_call = Node::new(
            NodeKind::CsrFunctionCall {
                csr: crate::ast::CsrRef { name: Some("mstatus".into()), addr_expr: None },
                func: "address".into(),
            },
            span(),
        );
        assert!(is_constexpr(&addr_call, &st));

        let pc_write = Node::new(NodeKind::PcAssign(Box::new(ident("x"))), span());
        assert!(!is_constexpr(&pc_write, &st));
    }

    #[test]
    fn find_src_registers_rejects_non_constant_index() {
        let cfg = TestCfgArch::default();
        let st = SymbolTable::new(&cfg);
        let access = Node::new(
            NodeKind::ArrayAccess {
                base: Box::new(ident("X")),
                index: Box::new(ident("rs1")),
            },
            span(),
        );
        assert!(find_src_registers(&access, &st).is_err());
    }

    #[test]
    fn find_src_registers_accepts_literal_index() {
        let cfg = TestCfgArch::default();
        let st = SymbolTable::new(&cfg);
        let access = Node::new(
            NodeKind::ArrayAccess {
                base: Box::new(ident("X")),
                index: Box::new(Node::new(NodeKind::IntLiteral { value: 5, width: 5, signed: false, width_known: true }, span())),
            },
            span(),
        );
        assert_eq!(find_src_registers(&access, &st).unwrap(), BTreeSet::from([5]));
    }

    #[test]
    fn builtin_pc_is_not_constexpr_carrying_node() {
        let n = Node::new(NodeKind::Builtin(BuiltinVar::Pc), span());
        assert!(matches!(n.kind, NodeKind::Builtin(BuiltinVar::Pc)));
    }

    #[test]
    fn elsif_struct_is_reachable_from_children() {
        let e = ElsIf { cond: Box::new(ident("a")), body: vec![] };
        assert!(e.body.is_empty());
    }
}

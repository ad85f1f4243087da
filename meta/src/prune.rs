//! Prune pass (spec §4.5 — component C5).
//!
//! Produces an AST equivalent under any symbol table that refines the input
//! one: literal-fold what's knowable, collapse branches with a known guard,
//! apply short-circuit and absorbing-element identities, and truncate
//! statement lists after a statement that can never fall through. The pass
//! is idempotent — running it twice changes nothing the first pass didn't
//! already settle.
//!
//! `If` collapsing a taken branch into its parent statement list needs to
//! splice more than one statement in place of the node. [`prune`] returns a
//! single [`Node`] either way by wrapping a multi-statement replacement in
//! `NodeKind::FunctionBody`; [`prune_function_body`] and [`prune_if_body`]
//! flatten that wrapper back into the surrounding list before applying their
//! own truncation rule.

use crate::ast::{Arg, BinOp, CsrRef, Node, NodeKind, Span};
use crate::error::Result;
use crate::symtab::SymbolTable;
use crate::value::{EvalResult, Value};

/// Prunes a single expression or statement node. Statement-list truncation
/// (stopping after a `return`/`raise`/known conditional return) is not this
/// function's job — see [`prune_function_body`] and [`prune_if_body`].
pub fn prune(n: &Node, symtab: &mut SymbolTable) -> Result<Node> {
    use NodeKind::*;
    match &n.kind {
        IntLiteral { .. } | BoolLiteral(_) | StringLiteral(_) | Identifier(_) | Builtin(_) | Noop => {
            Ok(fold_or_clone(n, symtab))
        }

        Unary { op, operand } => {
            if let Some(lit) = fold(n, symtab) {
                return Ok(lit);
            }
            Ok(Node::new(Unary { op: *op, operand: Box::new(prune(operand, symtab)?) }, n.span))
        }

        Paren(e) => {
            if let Some(lit) = fold(n, symtab) {
                return Ok(lit);
            }
            Ok(Node::new(Paren(Box::new(prune(e, symtab)?)), n.span))
        }

        Binary { op, lhs, rhs } => prune_binary(*op, lhs, rhs, n.span, symtab),
        Ternary { cond, if_true, if_false } => prune_ternary(cond, if_true, if_false, n.span, symtab),

        ArrayAccess { base, index } => {
            if let Some(lit) = fold(n, symtab) {
                return Ok(lit);
            }
            Ok(Node::new(
                ArrayAccess { base: Box::new(prune(base, symtab)?), index: Box::new(prune(index, symtab)?) },
                n.span,
            ))
        }
        ArrayAssign { base, index, value } => Ok(Node::new(
            ArrayAssign {
                base: Box::new(prune(base, symtab)?),
                index: Box::new(prune(index, symtab)?),
                value: Box::new(prune(value, symtab)?),
            },
            n.span,
        )),
        RangeAccess { base, msb, lsb } => {
            if let Some(lit) = fold(n, symtab) {
                return Ok(lit);
            }
            Ok(Node::new(
                RangeAccess {
                    base: Box::new(prune(base, symtab)?),
                    msb: Box::new(prune(msb, symtab)?),
                    lsb: Box::new(prune(lsb, symtab)?),
                },
                n.span,
            ))
        }
        RangeAssign { base, msb, lsb, value } => Ok(Node::new(
            RangeAssign {
                base: Box::new(prune(base, symtab)?),
                msb: Box::new(prune(msb, symtab)?),
                lsb: Box::new(prune(lsb, symtab)?),
                value: Box::new(prune(value, symtab)?),
            },
            n.span,
        )),
        FieldAccess { base, field } => {
            Ok(Node::new(FieldAccess { base: Box::new(prune(base, symtab)?), field: field.clone() }, n.span))
        }
        FieldAssign { base, field, value } => Ok(Node::new(
            FieldAssign { base: Box::new(prune(base, symtab)?), field: field.clone(), value: Box::new(prune(value, symtab)?) },
            n.span,
        )),

        Concat(items) => {
            if let Some(lit) = fold(n, symtab) {
                return Ok(lit);
            }
            let items = items.iter().map(|i| prune(i, symtab)).collect::<Result<Vec<_>>>()?;
            Ok(Node::new(Concat(items), n.span))
        }
        Replicate { value, count } => {
            if let Some(lit) = fold(n, symtab) {
                return Ok(lit);
            }
            Ok(Node::new(Replicate { value: Box::new(prune(value, symtab)?), count: Box::new(prune(count, symtab)?) }, n.span))
        }

        BitCast { target_width, operand } => {
            if let Some(lit) = fold(n, symtab) {
                return Ok(lit);
            }
            Ok(Node::new(
                BitCast { target_width: Box::new(prune(target_width, symtab)?), operand: Box::new(prune(operand, symtab)?) },
                n.span,
            ))
        }
        SignCast(e) => {
            if let Some(lit) = fold(n, symtab) {
                return Ok(lit);
            }
            Ok(Node::new(SignCast(Box::new(prune(e, symtab)?)), n.span))
        }
        EnumCast { enum_name, operand } => {
            Ok(Node::new(EnumCast { enum_name: enum_name.clone(), operand: Box::new(prune(operand, symtab)?) }, n.span))
        }

        FunctionCall { name, template_args, args } => {
            if let Some(lit) = fold(n, symtab) {
                return Ok(lit);
            }
            let template_args = template_args.iter().map(|t| prune(t, symtab)).collect::<Result<Vec<_>>>()?;
            let args = args
                .iter()
                .map(|a| Ok(Arg { name: a.name.clone(), value: Box::new(prune(&a.value, symtab)?) }))
                .collect::<Result<Vec<_>>>()?;
            Ok(Node::new(FunctionCall { name: name.clone(), template_args, args }, n.span))
        }

        CsrRead { csr } => Ok(Node::new(CsrRead { csr: prune_csr_ref(csr, symtab)? }, n.span)),
        CsrWrite { csr, value } => {
            Ok(Node::new(CsrWrite { csr: prune_csr_ref(csr, symtab)?, value: Box::new(prune(value, symtab)?) }, n.span))
        }
        CsrFieldRead { csr, field } => {
            Ok(Node::new(CsrFieldRead { csr: prune_csr_ref(csr, symtab)?, field: field.clone() }, n.span))
        }
        CsrFieldWrite { csr, field, value } => Ok(Node::new(
            CsrFieldWrite { csr: prune_csr_ref(csr, symtab)?, field: field.clone(), value: Box::new(prune(value, symtab)?) },
            n.span,
        )),
        CsrFunctionCall { csr, func } => {
            Ok(Node::new(CsrFunctionCall { csr: prune_csr_ref(csr, symtab)?, func: func.clone() }, n.span))
        }

        PcAssign(e) => Ok(Node::new(PcAssign(Box::new(prune(e, symtab)?)), n.span)),

        If { cond, then_body, elsifs, else_body } => prune_if(cond, then_body, elsifs, else_body.as_deref(), n.span, symtab),
        ConditionalStatement { cond, stmt } => prune_conditional_statement(cond, stmt, n.span, symtab),
        ConditionalReturn { cond, values } => prune_conditional_return(cond, values, n.span, symtab),
        ForLoop { var, init, cond, update, body } => Ok(Node::new(
            ForLoop {
                var: var.clone(),
                init: Box::new(prune(init, symtab)?),
                cond: Box::new(prune(cond, symtab)?),
                update: Box::new(prune(update, symtab)?),
                body: prune_if_body(body, symtab)?,
            },
            n.span,
        )),

        Return(values) => {
            let values = values.iter().map(|v| prune(v, symtab)).collect::<Result<Vec<_>>>()?;
            Ok(Node::new(Return(values), n.span))
        }
        Raise { code } => Ok(Node::new(Raise { code: Box::new(prune(code, symtab)?) }, n.span)),

        Declaration { .. } => Ok(n.clone()),
        DeclarationWithInit { name, ty, init } => Ok(Node::new(
            DeclarationWithInit { name: name.clone(), ty: ty.clone(), init: Box::new(prune(init, symtab)?) },
            n.span,
        )),
        MultiDeclaration { .. } => Ok(n.clone()),
        VariableAssign { name, value } => {
            Ok(Node::new(VariableAssign { name: name.clone(), value: Box::new(prune(value, symtab)?) }, n.span))
        }
        MultiAssign { names, value } => {
            Ok(Node::new(MultiAssign { names: names.clone(), value: Box::new(prune(value, symtab)?) }, n.span))
        }

        FunctionDefNode(def) => {
            let mut def = def.clone();
            def.body = prune_function_body(&def.body, symtab)?;
            Ok(Node::new(FunctionDefNode(def), n.span))
        }
        FunctionBody(stmts) => Ok(Node::new(FunctionBody(prune_if_body(stmts, symtab)?), n.span)),
        StatementWrapper(s) => Ok(Node::new(StatementWrapper(Box::new(prune(s, symtab)?)), n.span)),
    }
}

/// Prunes a function body with the full `FunctionBody` truncation rule:
/// stop after a `return`, a `raise`, or a conditional return whose condition
/// is now known and not false.
pub fn prune_function_body(body: &[Node], symtab: &mut SymbolTable) -> Result<Vec<Node>> {
    run_statement_list(body, symtab, true)
}

/// Prunes a block with the narrower `IfBody` truncation rule: stop only
/// after a `raise`.
pub fn prune_if_body(body: &[Node], symtab: &mut SymbolTable) -> Result<Vec<Node>> {
    run_statement_list(body, symtab, false)
}

fn run_statement_list(body: &[Node], symtab: &mut SymbolTable, stop_on_return: bool) -> Result<Vec<Node>> {
    let mut out = Vec::new();
    'stmts: for stmt in body {
        let pruned = prune(stmt, symtab)?;
        apply_statement_effects(stmt, symtab);
        for spliced in flatten_blocks(pruned) {
            let stop = match &spliced.kind {
                NodeKind::Raise { .. } => true,
                NodeKind::Return(_) => stop_on_return,
                NodeKind::ConditionalReturn { cond, .. } => stop_on_return && conditional_return_is_forced(cond, symtab),
                _ => false,
            };
            out.push(spliced);
            if stop {
                break 'stmts;
            }
        }
    }
    Ok(out)
}

fn conditional_return_is_forced(cond: &Node, symtab: &SymbolTable) -> bool {
    matches!(cond.value(symtab), EvalResult::Known(v) if v.as_bool() != Some(false))
}

/// Mutates `symtab` to reflect a statement's effect on subsequent lookups,
/// using the *original* (pre-prune) statement — pruning never changes which
/// names a statement declares or assigns.
fn apply_statement_effects(stmt: &Node, symtab: &mut SymbolTable) {
    match &stmt.kind {
        NodeKind::Declaration { .. } | NodeKind::DeclarationWithInit { .. } | NodeKind::MultiDeclaration { .. } | NodeKind::ForLoop { .. } => {
            stmt.add_symbol(symtab);
        }
        NodeKind::VariableAssign { name, value } => match value.value(symtab) {
            EvalResult::Known(v) => {
                symtab.set_value(name, v);
            }
            EvalResult::Unknown => {
                symtab.clear_value(name);
            }
        },
        NodeKind::MultiAssign { names, .. } => {
            for name in names {
                symtab.clear_value(name);
            }
        }
        _ => {}
    }
}

/// Flattens a collapsed-`If`'s `FunctionBody` splice marker back into a flat
/// statement sequence; a non-`FunctionBody` node is already a single
/// statement.
fn flatten_blocks(n: Node) -> Vec<Node> {
    match n.kind {
        NodeKind::FunctionBody(inner) => inner.into_iter().flat_map(flatten_blocks).collect(),
        _ => vec![n],
    }
}

fn block(stmts: Vec<Node>, span: Span) -> Node {
    Node::new(NodeKind::FunctionBody(stmts), span)
}

fn prune_if(
    cond: &Node,
    then_body: &[Node],
    elsifs: &[crate::ast::ElsIf],
    else_body: Option<&[Node]>,
    span: Span,
    symtab: &mut SymbolTable,
) -> Result<Node> {
    match cond.value(symtab) {
        EvalResult::Known(Value::Bool(true)) => Ok(block(prune_if_body(then_body, symtab)?, span)),
        EvalResult::Known(Value::Bool(false)) => prune_elsif_chain(elsifs, else_body, span, symtab),
        _ => {
            let then_pruned = prune_if_body(then_body, symtab)?;
            let (kept, forced_else) = process_elsifs(elsifs, symtab)?;
            let else_pruned = match forced_else {
                Some(f) => Some(f),
                None => else_body.map(|eb| prune_if_body(eb, symtab)).transpose()?,
            };
            Ok(Node::new(
                NodeKind::If { cond: Box::new(prune(cond, symtab)?), then_body: then_pruned, elsifs: kept, else_body: else_pruned },
                span,
            ))
        }
    }
}

/// Walks else-ifs in order, dropping known-false guards and stopping at the
/// first known-true guard (which becomes the resolved branch); an
/// unresolved guard re-roots a fresh `If` at that else-if.
fn prune_elsif_chain(
    elsifs: &[crate::ast::ElsIf],
    else_body: Option<&[Node]>,
    span: Span,
    symtab: &mut SymbolTable,
) -> Result<Node> {
    if let Some((first, rest)) = elsifs.split_first() {
        match first.cond.value(symtab) {
            EvalResult::Known(Value::Bool(true)) => Ok(block(prune_if_body(&first.body, symtab)?, span)),
            EvalResult::Known(Value::Bool(false)) => prune_elsif_chain(rest, else_body, span, symtab),
            _ => {
                let then_pruned = prune_if_body(&first.body, symtab)?;
                let (kept, forced_else) = process_elsifs(rest, symtab)?;
                let else_pruned = match forced_else {
                    Some(f) => Some(f),
                    None => else_body.map(|eb| prune_if_body(eb, symtab)).transpose()?,
                };
                Ok(Node::new(
                    NodeKind::If { cond: Box::new(prune(&first.cond, symtab)?), then_body: then_pruned, elsifs: kept, else_body: else_pruned },
                    span,
                ))
            }
        }
    } else {
        match else_body {
            Some(eb) => Ok(block(prune_if_body(eb, symtab)?, span)),
            None => Ok(Node::new(NodeKind::Noop, span)),
        }
    }
}

/// Drops known-false else-ifs and recurses; on the first known-true guard,
/// returns it pre-pruned as the `forced_else` slot so the caller can splice
/// it in (everything after is unreachable and is never visited).
fn process_elsifs(elsifs: &[crate::ast::ElsIf], symtab: &mut SymbolTable) -> Result<(Vec<crate::ast::ElsIf>, Option<Vec<Node>>)> {
    let mut kept = Vec::new();
    for e in elsifs {
        match e.cond.value(symtab) {
            EvalResult::Known(Value::Bool(false)) => continue,
            EvalResult::Known(Value::Bool(true)) => {
                return Ok((kept, Some(prune_if_body(&e.body, symtab)?)));
            }
            _ => kept.push(crate::ast::ElsIf { cond: Box::new(prune(&e.cond, symtab)?), body: prune_if_body(&e.body, symtab)? }),
        }
    }
    Ok((kept, None))
}

fn prune_conditional_statement(cond: &Node, stmt: &Node, span: Span, symtab: &mut SymbolTable) -> Result<Node> {
    match cond.value(symtab) {
        EvalResult::Known(Value::Bool(true)) => prune(stmt, symtab),
        EvalResult::Known(Value::Bool(false)) => Ok(Node::new(NodeKind::Noop, span)),
        _ => Ok(Node::new(
            NodeKind::ConditionalStatement { cond: Box::new(prune(cond, symtab)?), stmt: Box::new(prune(stmt, symtab)?) },
            span,
        )),
    }
}

fn prune_conditional_return(cond: &Node, values: &[Node], span: Span, symtab: &mut SymbolTable) -> Result<Node> {
    match cond.value(symtab) {
        EvalResult::Known(Value::Bool(true)) => {
            let values = values.iter().map(|v| prune(v, symtab)).collect::<Result<Vec<_>>>()?;
            Ok(Node::new(NodeKind::Return(values), span))
        }
        EvalResult::Known(Value::Bool(false)) => Ok(Node::new(NodeKind::Noop, span)),
        _ => {
            let values = values.iter().map(|v| prune(v, symtab)).collect::<Result<Vec<_>>>()?;
            Ok(Node::new(NodeKind::ConditionalReturn { cond: Box::new(prune(cond, symtab)?), values }, span))
        }
    }
}

fn prune_csr_ref(csr: &CsrRef, symtab: &mut SymbolTable) -> Result<CsrRef> {
    Ok(CsrRef {
        name: csr.name.clone(),
        addr_expr: csr.addr_expr.as_ref().map(|e| prune(e, symtab)).transpose()?.map(Box::new),
    })
}

fn prune_binary(op: BinOp, lhs: &Node, rhs: &Node, span: Span, symtab: &mut SymbolTable) -> Result<Node> {
    let whole = Node::new(NodeKind::Binary { op, lhs: Box::new(lhs.clone()), rhs: Box::new(rhs.clone()) }, span);
    if let Some(lit) = fold(&whole, symtab) {
        return Ok(lit);
    }

    let lhs_val = lhs.value(symtab);
    let rhs_val = rhs.value(symtab);
    let lhs_p = prune(lhs, symtab)?;
    let rhs_p = prune(rhs, symtab)?;

    match op {
        BinOp::And => {
            if is_known_bool(&lhs_val, false) || is_known_bool(&rhs_val, false) {
                return Ok(Node::new(NodeKind::BoolLiteral(false), span));
            }
            if is_known_bool(&lhs_val, true) {
                return Ok(rhs_p);
            }
            if is_known_bool(&rhs_val, true) {
                return Ok(lhs_p);
            }
        }
        BinOp::Or => {
            if is_known_bool(&lhs_val, true) || is_known_bool(&rhs_val, true) {
                return Ok(Node::new(NodeKind::BoolLiteral(true), span));
            }
            if is_known_bool(&lhs_val, false) {
                return Ok(rhs_p);
            }
            if is_known_bool(&rhs_val, false) {
                return Ok(lhs_p);
            }
        }
        BinOp::BitAnd => {
            if is_known_zero(&lhs_val) || is_known_zero(&rhs_val) {
                let width = static_width(lhs, symtab).or_else(|| static_width(rhs, symtab)).unwrap_or(1);
                return Ok(Node::new(NodeKind::IntLiteral { value: 0, width, signed: false, width_known: true }, span));
            }
            if is_known_all_ones(&lhs_val, static_width(rhs, symtab)) {
                return Ok(rhs_p);
            }
            if is_known_all_ones(&rhs_val, static_width(lhs, symtab)) {
                return Ok(lhs_p);
            }
        }
        BinOp::BitOr => {
            if is_known_all_ones(&lhs_val, static_width(rhs, symtab)) {
                return Ok(lhs_p);
            }
            if is_known_all_ones(&rhs_val, static_width(lhs, symtab)) {
                return Ok(rhs_p);
            }
            if is_known_zero(&lhs_val) {
                return Ok(rhs_p);
            }
            if is_known_zero(&rhs_val) {
                return Ok(lhs_p);
            }
        }
        _ => {}
    }

    Ok(Node::new(NodeKind::Binary { op, lhs: Box::new(lhs_p), rhs: Box::new(rhs_p) }, span))
}

fn prune_ternary(cond: &Node, if_true: &Node, if_false: &Node, span: Span, symtab: &mut SymbolTable) -> Result<Node> {
    match cond.value(symtab) {
        EvalResult::Known(Value::Bool(true)) => prune(if_true, symtab),
        EvalResult::Known(Value::Bool(false)) => prune(if_false, symtab),
        _ => Ok(Node::new(
            NodeKind::Ternary {
                cond: Box::new(prune(cond, symtab)?),
                if_true: Box::new(prune(if_true, symtab)?),
                if_false: Box::new(prune(if_false, symtab)?),
            },
            span,
        )),
    }
}

fn fold_or_clone(n: &Node, symtab: &SymbolTable) -> Node {
    fold(n, symtab).unwrap_or_else(|| n.clone())
}

/// Folds `n` to a literal node if `value(symtab)` succeeds and the value has
/// a corresponding literal `NodeKind` (integer, boolean, string). Tuple and
/// array values have no literal spelling and are left unfolded.
fn fold(n: &Node, symtab: &SymbolTable) -> Option<Node> {
    match n.value(symtab) {
        EvalResult::Known(Value::Int { value, width, signed }) => {
            Some(Node::new(NodeKind::IntLiteral { value, width, signed, width_known: true }, n.span))
        }
        EvalResult::Known(Value::Bool(b)) => Some(Node::new(NodeKind::BoolLiteral(b), n.span)),
        EvalResult::Known(Value::Str(s)) => Some(Node::new(NodeKind::StringLiteral(s), n.span)),
        EvalResult::Known(Value::Tuple(_)) | EvalResult::Known(Value::Array(_)) | EvalResult::Unknown => None,
    }
}

fn is_known_bool(v: &EvalResult, want: bool) -> bool {
    matches!(v, EvalResult::Known(Value::Bool(b)) if *b == want)
}

fn is_known_zero(v: &EvalResult) -> bool {
    matches!(v, EvalResult::Known(Value::Int { value: 0, .. }))
}

fn is_known_all_ones(v: &EvalResult, width: Option<u32>) -> bool {
    match (v, width) {
        (EvalResult::Known(Value::Int { value, .. }), Some(w)) if w > 0 => {
            let mask = if w >= 128 { i128::MAX } else { (1i128 << w) - 1 };
            *value & mask == mask && mask != 0
        }
        _ => false,
    }
}

fn static_width(n: &Node, symtab: &SymbolTable) -> Option<u32> {
    match n.value(symtab) {
        EvalResult::Known(Value::Int { width, .. }) => Some(width),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ElsIf, Span};
    use crate::cfg::tests::TestCfgArch;
    use crate::types::Type;

    fn lit(value: i128, width: u32) -> Node {
        Node::new(NodeKind::IntLiteral { value, width, signed: false, width_known: true }, Span::default())
    }

    fn bin(op: BinOp, l: Node, r: Node) -> Node {
        Node::new(NodeKind::Binary { op, lhs: Box::new(l), rhs: Box::new(r) }, Span::default())
    }

    fn ident(name: &str) -> Node {
        Node::new(NodeKind::Identifier(name.into()), Span::default())
    }

    #[test]
    fn constant_fold_prunes_to_single_literal() {
        let cfg = TestCfgArch::default();
        let mut st = SymbolTable::new(&cfg);
        let expr = bin(BinOp::Mul, Node::new(NodeKind::Paren(Box::new(bin(BinOp::Add, lit(3, 8), lit(4, 8)))), Span::default()), lit(2, 8));
        let pruned = prune(&expr, &mut st).unwrap();
        assert!(matches!(pruned.kind, NodeKind::IntLiteral { value: 14, .. }));
    }

    #[test]
    fn dead_branch_prunes_to_else_assignment() {
        let cfg = TestCfgArch::default();
        let mut st = SymbolTable::new(&cfg);
        let if_node = Node::new(
            NodeKind::If {
                cond: Box::new(Node::new(NodeKind::BoolLiteral(false), Span::default())),
                then_body: vec![Node::new(NodeKind::Raise { code: Box::new(lit(0, 8)) }, Span::default())],
                elsifs: vec![],
                else_body: Some(vec![Node::new(
                    NodeKind::ArrayAssign { base: Box::new(ident("X")), index: Box::new(ident("rd")), value: Box::new(lit(1, 32)) },
                    Span::default(),
                )]),
            },
            Span::default(),
        );
        let pruned = prune(&if_node, &mut st).unwrap();
        match pruned.kind {
            NodeKind::FunctionBody(stmts) => {
                assert_eq!(stmts.len(), 1);
                assert!(matches!(stmts[0].kind, NodeKind::ArrayAssign { .. }));
            }
            other => panic!("expected a spliced FunctionBody, got {other:?}"),
        }
    }

    #[test]
    fn prune_is_idempotent_over_dead_branch() {
        let cfg = TestCfgArch::default();
        let mut st1 = SymbolTable::new(&cfg);
        let mut st2 = SymbolTable::new(&cfg);
        let if_node = Node::new(
            NodeKind::If {
                cond: Box::new(Node::new(NodeKind::BoolLiteral(false), Span::default())),
                then_body: vec![],
                elsifs: vec![],
                else_body: Some(vec![Node::new(
                    NodeKind::VariableAssign { name: "y".into(), value: Box::new(bin(BinOp::Add, lit(1, 8), lit(1, 8))) },
                    Span::default(),
                )]),
            },
            Span::default(),
        );
        let once = prune(&if_node, &mut st1).unwrap();
        let twice = prune(&once, &mut st2).unwrap();
        assert_eq!(format!("{once:?}"), format!("{twice:?}"));
    }

    #[test]
    fn short_circuit_and_prunes_away_unknown_rhs() {
        let cfg = TestCfgArch::default();
        let mut st = SymbolTable::new(&cfg);
        let expr = bin(BinOp::And, Node::new(NodeKind::BoolLiteral(false), Span::default()), ident("unbound"));
        let pruned = prune(&expr, &mut st).unwrap();
        assert!(matches!(pruned.kind, NodeKind::BoolLiteral(false)));
    }

    #[test]
    fn bitand_with_known_zero_collapses_to_zero_literal() {
        let cfg = TestCfgArch::default();
        let mut st = SymbolTable::new(&cfg);
        let expr = bin(BinOp::BitAnd, lit(0, 8), ident("unbound"));
        let pruned = prune(&expr, &mut st).unwrap();
        assert!(matches!(pruned.kind, NodeKind::IntLiteral { value: 0, .. }));
    }

    #[test]
    fn elsif_with_known_true_guard_becomes_else() {
        let cfg = TestCfgArch::default();
        let mut st = SymbolTable::new(&cfg);
        let if_node = Node::new(
            NodeKind::If {
                cond: Box::new(ident("unknown")),
                then_body: vec![],
                elsifs: vec![ElsIf {
                    cond: Box::new(Node::new(NodeKind::BoolLiteral(true), Span::default())),
                    body: vec![Node::new(NodeKind::VariableAssign { name: "z".into(), value: Box::new(lit(1, 8)) }, Span::default())],
                }],
                else_body: None,
            },
            Span::default(),
        );
        let pruned = prune(&if_node, &mut st).unwrap();
        match pruned.kind {
            NodeKind::If { elsifs, else_body, .. } => {
                assert!(elsifs.is_empty());
                assert!(else_body.is_some());
            }
            other => panic!("expected an If with the elsif folded into else, got {other:?}"),
        }
    }

    #[test]
    fn function_body_truncates_after_raise() {
        let cfg = TestCfgArch::default();
        let mut st = SymbolTable::new(&cfg);
        let body = vec![
            Node::new(NodeKind::Raise { code: Box::new(lit(2, 8)) }, Span::default()),
            Node::new(NodeKind::VariableAssign { name: "dead".into(), value: Box::new(lit(0, 8)) }, Span::default()),
        ];
        let pruned = prune_function_body(&body, &mut st).unwrap();
        assert_eq!(pruned.len(), 1);
    }

    #[test]
    fn declaration_binds_type_for_later_statements() {
        let cfg = TestCfgArch::default();
        let mut st = SymbolTable::new(&cfg);
        let body = vec![
            Node::new(NodeKind::Declaration { name: "a".into(), ty: Type::bits(8) }, Span::default()),
            Node::new(NodeKind::VariableAssign { name: "a".into(), value: Box::new(lit(5, 8)) }, Span::default()),
        ];
        prune_function_body(&body, &mut st).unwrap();
        assert_eq!(st.get_var("a").unwrap().value, Some(Value::int(5, 8, false)));
    }
}

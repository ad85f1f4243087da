//! AST IR (spec §3, §4.3 — component C3).
//!
//! Concrete parser productions are grouped into IR variant *families* per
//! the "open-method dispatch over AST variants" design note: rather than one
//! struct per production dispatched through an inheritance chain, every
//! family is one `Node` variant carrying the data that family needs, and
//! every pass is a single `match` over `Node`. `Op`-style sub-enums
//! distinguish members within a family (e.g. every binary operator is a
//! `Binary` node tagged with a `BinOp`).

use crate::symtab::SymbolTable;
use crate::types::Type;
use crate::value::{EvalResult, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Sra,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Widening variants: `` `+ ``, `` `- ``, `` `* ``, `` `<< ``. Their
    /// result width is twice the wider operand's width (spec §4.3).
    WideningAdd,
    WideningSub,
    WideningMul,
    WideningShl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinVar {
    Encoding,
    Pc,
}

#[derive(Debug, Clone)]
pub struct Arg {
    pub name: Option<String>,
    pub value: Box<Node>,
}

#[derive(Debug, Clone)]
pub struct ElsIf {
    pub cond: Box<Node>,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    IntLiteral { value: i128, width: u32, signed: bool, width_known: bool },
    BoolLiteral(bool),
    StringLiteral(String),
    Identifier(String),
    Builtin(BuiltinVar),

    Unary { op: UnOp, operand: Box<Node> },
    Binary { op: BinOp, lhs: Box<Node>, rhs: Box<Node> },
    Paren(Box<Node>),
    Ternary { cond: Box<Node>, if_true: Box<Node>, if_false: Box<Node> },

    ArrayAccess { base: Box<Node>, index: Box<Node> },
    ArrayAssign { base: Box<Node>, index: Box<Node>, value: Box<Node> },
    RangeAccess { base: Box<Node>, msb: Box<Node>, lsb: Box<Node> },
    RangeAssign { base: Box<Node>, msb: Box<Node>, lsb: Box<Node>, value: Box<Node> },
    FieldAccess { base: Box<Node>, field: String },
    FieldAssign { base: Box<Node>, field: String, value: Box<Node> },

    Concat(Vec<Node>),
    Replicate { value: Box<Node>, count: Box<Node> },

    BitCast { target_width: Box<Node>, operand: Box<Node> },
    SignCast(Box<Node>),
    EnumCast { enum_name: String, operand: Box<Node> },

    FunctionCall { name: String, template_args: Vec<Node>, args: Vec<Arg> },

    CsrRead { csr: CsrRef },
    CsrWrite { csr: CsrRef, value: Box<Node> },
    CsrFieldRead { csr: CsrRef, field: String },
    CsrFieldWrite { csr: CsrRef, field: String, value: Box<Node> },
    CsrFunctionCall { csr: CsrRef, func: String },

    PcAssign(Box<Node>),

    If { cond: Box<Node>, then_body: Vec<Node>, elsifs: Vec<ElsIf>, else_body: Option<Vec<Node>> },
    ConditionalStatement { cond: Box<Node>, stmt: Box<Node> },
    ConditionalReturn { cond: Box<Node>, values: Vec<Node> },
    ForLoop { var: String, init: Box<Node>, cond: Box<Node>, update: Box<Node>, body: Vec<Node> },

    Return(Vec<Node>),
    Raise { code: Box<Node> },

    Declaration { name: String, ty: Type },
    DeclarationWithInit { name: String, ty: Type, init: Box<Node> },
    MultiDeclaration { names: Vec<String>, tys: Vec<Type> },
    VariableAssign { name: String, value: Box<Node> },
    MultiAssign { names: Vec<String>, value: Box<Node> },

    FunctionDefNode(FunctionDef),
    FunctionBody(Vec<Node>),
    StatementWrapper(Box<Node>),
    Noop,
}

#[derive(Debug, Clone)]
pub struct CsrRef {
    /// `Some(name)` when the CSR is statically known (`__UDB_CSR_BY_NAME`);
    /// `None` plus `addr_expr` set means it must be resolved by address at
    /// run time (`__UDB_CSR_BY_ADDR`).
    pub name: Option<String>,
    pub addr_expr: Option<Box<Node>>,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub template_params: Vec<Param>,
    pub params: Vec<Param>,
    pub return_types: Vec<Type>,
    pub body: Vec<Node>,
    pub is_builtin: bool,
    /// `raise`/`raise_misaligned`/... — design note: `raise*` calls are
    /// excluded from `control_flow?` and from the `[[noreturn]]` check.
    pub is_raise: bool,
}

impl Node {
    pub fn new(kind: NodeKind, span: Span) -> Node {
        Node { kind, span }
    }

    /// The ordered set of sub-expressions and sub-statements (spec §3).
    pub fn children(&self) -> Vec<&Node> {
        use NodeKind::*;
        match &self.kind {
            IntLiteral { .. } | BoolLiteral(_) | StringLiteral(_) | Identifier(_) | Builtin(_) | Noop => vec![],
            Unary { operand, .. } => vec![operand],
            Binary { lhs, rhs, .. } => vec![lhs, rhs],
            Paren(e) => vec![e],
            Ternary { cond, if_true, if_false } => vec![cond, if_true, if_false],
            ArrayAccess { base, index } => vec![base, index],
            ArrayAssign { base, index, value } => vec![base, index, value],
            RangeAccess { base, msb, lsb } => vec![base, msb, lsb],
            RangeAssign { base, msb, lsb, value } => vec![base, msb, lsb, value],
            FieldAccess { base, .. } => vec![base],
            FieldAssign { base, value, .. } => vec![base, value],
            Concat(items) => items.iter().collect(),
            Replicate { value, count } => vec![value, count],
            BitCast { target_width, operand } => vec![target_width, operand],
            SignCast(e) => vec![e],
            EnumCast { operand, .. } => vec![operand],
            FunctionCall { template_args, args, .. } => {
                template_args.iter().chain(args.iter().map(|a| a.value.as_ref())).collect()
            }
            CsrRead { csr } => csr.addr_expr.as_deref().into_iter().collect(),
            CsrWrite { csr, value } => csr.addr_expr.as_deref().into_iter().chain([value.as_ref()]).collect(),
            CsrFieldRead { csr, .. } => csr.addr_expr.as_deref().into_iter().collect(),
            CsrFieldWrite { csr, value, .. } => csr.addr_expr.as_deref().into_iter().chain([value.as_ref()]).collect(),
            CsrFunctionCall { csr, .. } => csr.addr_expr.as_deref().into_iter().collect(),
            PcAssign(e) => vec![e],
            If { cond, then_body, elsifs, else_body } => {
                let mut v = vec![cond.as_ref()];
                v.extend(then_body.iter());
                for e in elsifs {
                    v.push(e.cond.as_ref());
                    v.extend(e.body.iter());
                }
                if let Some(eb) = else_body {
                    v.extend(eb.iter());
                }
                v
            }
            ConditionalStatement { cond, stmt } => vec![cond, stmt],
            ConditionalReturn { cond, values } => {
                let mut v = vec![cond.as_ref()];
                v.extend(values.iter());
                v
            }
            ForLoop { init, cond, update, body, .. } => {
                let mut v = vec![init.as_ref(), cond, update];
                v.extend(body.iter());
                v
            }
            Return(values) => values.iter().collect(),
            Raise { code } => vec![code],
            Declaration { .. } => vec![],
            DeclarationWithInit { init, .. } => vec![init],
            MultiDeclaration { .. } => vec![],
            VariableAssign { value, .. } => vec![value],
            MultiAssign { value, .. } => vec![value],
            FunctionDefNode(def) => def.body.iter().collect(),
            FunctionBody(stmts) => stmts.iter().collect(),
            StatementWrapper(s) => vec![s],
        }
    }

    pub fn text_value(&self) -> Option<String> {
        match &self.kind {
            NodeKind::Identifier(name) => Some(name.clone()),
            NodeKind::IntLiteral { value, .. } => Some(value.to_string()),
            NodeKind::BoolLiteral(b) => Some(b.to_string()),
            NodeKind::StringLiteral(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// Partial evaluation (spec §4.3): folds literals, resolves identifiers
    /// with a known binding, evaluates pure operators, folds concatenation/
    /// replication, indexes arrays with known indices. Never mutates
    /// `symtab` except through explicit, balanced push/pop.
    pub fn value(&self, symtab: &SymbolTable) -> EvalResult {
        use NodeKind::*;
        match &self.kind {
            IntLiteral { value, width, signed, .. } => {
                EvalResult::known(Value::int(*value, *width, *signed))
            }
            BoolLiteral(b) => EvalResult::known(Value::bool(*b)),
            StringLiteral(s) => EvalResult::known(Value::Str(s.clone())),
            Builtin(_) => EvalResult::Unknown,

            Identifier(name) => match symtab.get_var(name) {
                Some(binding) => match &binding.value {
                    Some(v) => EvalResult::known(v.clone()),
                    None => EvalResult::Unknown,
                },
                None => EvalResult::Unknown,
            },

            Paren(e) => e.value(symtab),

            Unary { op, operand } => match operand.value(symtab) {
                EvalResult::Known(v) => eval_unary(*op, v),
                EvalResult::Unknown => EvalResult::Unknown,
            },

            Binary { op, lhs, rhs } => eval_binary(*op, lhs, rhs, symtab),

            Ternary { cond, if_true, if_false } => match cond.value(symtab) {
                EvalResult::Known(Value::Bool(true)) => if_true.value(symtab),
                EvalResult::Known(Value::Bool(false)) => if_false.value(symtab),
                _ => EvalResult::Unknown,
            },

            Concat(items) => {
                let mut vals = Vec::with_capacity(items.len());
                let mut total_width = 0u32;
                for item in items {
                    match item.value(symtab) {
                        EvalResult::Known(Value::Int { value, width, .. }) => {
                            total_width += width;
                            vals.push((value, width));
                        }
                        _ => return EvalResult::Unknown,
                    }
                }
                let mut acc: i128 = 0;
                for (value, width) in vals {
                    let mask = if width >= 128 { i128::MAX } else { (1i128 << width) - 1 };
                    acc = (acc << width) | (value & mask);
                }
                EvalResult::known(Value::int(acc, total_width, false))
            }

            Replicate { value, count } => match (value.value(symtab), count.value(symtab)) {
                (EvalResult::Known(Value::Int { value: v, width, .. }), EvalResult::Known(Value::Int { value: n, .. })) => {
                    let n = n.max(0) as u32;
                    let mut acc: i128 = 0;
                    let mask = if width >= 128 { i128::MAX } else { (1i128 << width) - 1 };
                    for _ in 0..n {
                        acc = (acc << width) | (v & mask);
                    }
                    EvalResult::known(Value::int(acc, width * n, false))
                }
                _ => EvalResult::Unknown,
            },

            ArrayAccess { base, index } => match (base.value(symtab), index.value(symtab)) {
                (EvalResult::Known(Value::Array(items)), EvalResult::Known(Value::Int { value: i, .. })) => {
                    items.get(i.max(0) as usize).cloned().map(EvalResult::known).unwrap_or(EvalResult::Unknown)
                }
                _ => EvalResult::Unknown,
            },

            RangeAccess { base, msb, lsb } => match (base.value(symtab), msb.value(symtab), lsb.value(symtab)) {
                (
                    EvalResult::Known(Value::Int { value, .. }),
                    EvalResult::Known(Value::Int { value: msb, .. }),
                    EvalResult::Known(Value::Int { value: lsb, .. }),
                ) => {
                    let width = (msb - lsb + 1).max(0) as u32;
                    let shifted = value >> lsb;
                    EvalResult::known(Value::int(shifted, width, false))
                }
                _ => EvalResult::Unknown,
            },

            BitCast { target_width, operand } => match (target_width.value(symtab), operand.value(symtab)) {
                (EvalResult::Known(Value::Int { value: w, .. }), EvalResult::Known(Value::Int { value, signed, .. })) => {
                    EvalResult::known(Value::int(value, w.max(0) as u32, signed))
                }
                _ => EvalResult::Unknown,
            },

            SignCast(e) => match e.value(symtab) {
                EvalResult::Known(Value::Int { value, width, .. }) => {
                    EvalResult::known(Value::int(value, width, true))
                }
                other => other,
            },

            EnumCast { operand, .. } => operand.value(symtab),

            FunctionCall { .. } | CsrRead { .. } | CsrWrite { .. } | CsrFieldRead { .. }
            | CsrFieldWrite { .. } | CsrFunctionCall { .. } | PcAssign(_) => EvalResult::Unknown,

            If { .. } | ConditionalStatement { .. } | ConditionalReturn { .. } | ForLoop { .. }
            | Return(_) | Raise { .. } | Declaration { .. } | DeclarationWithInit { .. }
            | MultiDeclaration { .. } | VariableAssign { .. } | MultiAssign { .. }
            | ArrayAssign { .. } | RangeAssign { .. } | FieldAccess { .. } | FieldAssign { .. }
            | FunctionDefNode(_) | FunctionBody(_) | StatementWrapper(_) | Noop => EvalResult::Unknown,
        }
    }

    /// Adds the symbol(s) a declaration-family node introduces to `symtab`.
    /// A no-op for every other variant.
    pub fn add_symbol(&self, symtab: &mut SymbolTable) {
        use crate::symtab::{Binding, VarBinding};
        match &self.kind {
            NodeKind::Declaration { name, ty } => {
                symtab.add(name.clone(), Binding::Var(VarBinding::new(name.clone(), ty.clone())));
            }
            NodeKind::DeclarationWithInit { name, ty, init } => {
                let value = init.value(symtab).into_known();
                let mut binding = VarBinding::new(name.clone(), ty.clone());
                binding.value = value;
                symtab.add(name.clone(), Binding::Var(binding));
            }
            NodeKind::MultiDeclaration { names, tys } => {
                for (name, ty) in names.iter().zip(tys) {
                    symtab.add(name.clone(), Binding::Var(VarBinding::new(name.clone(), ty.clone())));
                }
            }
            NodeKind::ForLoop { var, init, .. } => {
                let value = init.value(symtab).into_known();
                let ty = value
                    .as_ref()
                    .and_then(|v| v.width())
                    .map(Type::bits)
                    .unwrap_or(Type::unknown_bits(false));
                let mut binding = VarBinding::new(var.clone(), ty);
                binding.value = value;
                symtab.add(var.clone(), Binding::Var(binding));
            }
            _ => {}
        }
    }
}

fn eval_unary(op: UnOp, v: Value) -> EvalResult {
    match (op, v) {
        (UnOp::Not, Value::Bool(b)) => EvalResult::known(Value::bool(!b)),
        (UnOp::Neg, Value::Int { value, width, signed }) => {
            EvalResult::known(Value::int(-value, width, signed))
        }
        (UnOp::BitNot, Value::Int { value, width, signed }) => {
            EvalResult::known(Value::int(!value, width, signed))
        }
        _ => EvalResult::Unknown,
    }
}

/// Evaluates a binary expression with short-circuit identities applied
/// before either side is necessarily known, per spec §4.3: `false && x` and
/// `true || x` succeed independent of `x`'s knowability (spec §8 property 3).
fn eval_binary(op: BinOp, lhs: &Node, rhs: &Node, symtab: &SymbolTable) -> EvalResult {
    if op == BinOp::And {
        if let EvalResult::Known(Value::Bool(false)) = lhs.value(symtab) {
            return EvalResult::known(Value::bool(false));
        }
    }
    if op == BinOp::Or {
        if let EvalResult::Known(Value::Bool(true)) = lhs.value(symtab) {
            return EvalResult::known(Value::bool(true));
        }
    }

    let (lv, rv) = match (lhs.value(symtab), rhs.value(symtab)) {
        (EvalResult::Known(l), EvalResult::Known(r)) => (l, r),
        _ => return EvalResult::Unknown,
    };

    match (op, lv, rv) {
        (BinOp::And, Value::Bool(a), Value::Bool(b)) => EvalResult::known(Value::bool(a && b)),
        (BinOp::Or, Value::Bool(a), Value::Bool(b)) => EvalResult::known(Value::bool(a || b)),

        (op, Value::Int { value: a, width: wa, signed: sa }, Value::Int { value: b, width: wb, .. }) => {
            let width = wa.max(wb);
            match op {
                BinOp::Add => EvalResult::known(Value::int(a + b, width, sa)),
                BinOp::Sub => EvalResult::known(Value::int(a - b, width, sa)),
                BinOp::Mul => EvalResult::known(Value::int(a * b, width, sa)),
                BinOp::Div => {
                    if b == 0 {
                        EvalResult::Unknown
                    } else {
                        EvalResult::known(Value::int(a / b, width, sa))
                    }
                }
                BinOp::Mod => {
                    if b == 0 {
                        EvalResult::Unknown
                    } else {
                        EvalResult::known(Value::int(a % b, width, sa))
                    }
                }
                BinOp::BitAnd => EvalResult::known(Value::int(a & b, width, sa)),
                BinOp::BitOr => EvalResult::known(Value::int(a | b, width, sa)),
                BinOp::BitXor => EvalResult::known(Value::int(a ^ b, width, sa)),
                BinOp::Shl => EvalResult::known(Value::int(a << b.max(0), width, sa)),
                BinOp::Shr => EvalResult::known(Value::int(((a as u128) >> b.max(0)) as i128, width, false)),
                BinOp::Sra => EvalResult::known(Value::int(a >> b.max(0), width, sa)),
                BinOp::Eq => EvalResult::known(Value::bool(a == b)),
                BinOp::Ne => EvalResult::known(Value::bool(a != b)),
                BinOp::Lt => EvalResult::known(Value::bool(a < b)),
                BinOp::Le => EvalResult::known(Value::bool(a <= b)),
                BinOp::Gt => EvalResult::known(Value::bool(a > b)),
                BinOp::Ge => EvalResult::known(Value::bool(a >= b)),
                // Widening ops: result width doubles (spec §4.3).
                BinOp::WideningAdd => EvalResult::known(Value::int(a + b, width * 2, sa)),
                BinOp::WideningSub => EvalResult::known(Value::int(a - b, width * 2, sa)),
                BinOp::WideningMul => EvalResult::known(Value::int(a * b, width * 2, sa)),
                BinOp::WideningShl => EvalResult::known(Value::int(a << b.max(0), width * 2, sa)),
                BinOp::And | BinOp::Or => EvalResult::Unknown,
            }
        }
        _ => EvalResult::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::tests::TestCfgArch;

    fn lit(value: i128, width: u32) -> Node {
        Node::new(NodeKind::IntLiteral { value, width, signed: false, width_known: true }, Span::default())
    }

    fn bin(op: BinOp, l: Node, r: Node) -> Node {
        Node::new(NodeKind::Binary { op, lhs: Box::new(l), rhs: Box::new(r) }, Span::default())
    }

    #[test]
    fn constant_fold_arithmetic() {
        let cfg = TestCfgArch::default();
        let st = SymbolTable::new(&cfg);
        // (3 + 4) * 2
        let expr = bin(BinOp::Mul, Node::new(NodeKind::Paren(Box::new(bin(BinOp::Add, lit(3, 8), lit(4, 8)))), Span::default()), lit(2, 8));
        assert_eq!(expr.value(&st), EvalResult::known(Value::int(14, 8, false)));
    }

    #[test]
    fn short_circuit_and_independent_of_unknown_rhs() {
        let cfg = TestCfgArch::default();
        let st = SymbolTable::new(&cfg);
        let false_lit = Node::new(NodeKind::BoolLiteral(false), Span::default());
        let unknown_ident = Node::new(NodeKind::Identifier("x".into()), Span::default());
        let expr = bin(BinOp::And, false_lit, unknown_ident);
        assert_eq!(expr.value(&st), EvalResult::known(Value::bool(false)));
    }

    #[test]
    fn short_circuit_or_independent_of_unknown_rhs() {
        let cfg = TestCfgArch::default();
        let st = SymbolTable::new(&cfg);
        let true_lit = Node::new(NodeKind::BoolLiteral(true), Span::default());
        let unknown_ident = Node::new(NodeKind::Identifier("x".into()), Span::default());
        let expr = bin(BinOp::Or, true_lit, unknown_ident);
        assert_eq!(expr.value(&st), EvalResult::known(Value::bool(true)));
    }

    #[test]
    fn unknown_identifier_fails_to_fold() {
        let cfg = TestCfgArch::default();
        let st = SymbolTable::new(&cfg);
        let ident = Node::new(NodeKind::Identifier("unbound".into()), Span::default());
        assert_eq!(ident.value(&st), EvalResult::Unknown);
    }

    #[test]
    fn concat_folds_to_combined_width() {
        let cfg = TestCfgArch::default();
        let st = SymbolTable::new(&cfg);
        let expr = Node::new(NodeKind::Concat(vec![lit(0b101, 3), lit(0b01, 2)]), Span::default());
        assert_eq!(expr.value(&st), EvalResult::known(Value::int(0b10101, 5, false)));
    }
}

//! Instruction-decoder generator (spec §4.7 — component C7).
//!
//! Builds a decision tree over instruction bit-encodings (MSB-first strings
//! of `0`/`1`/`-`) and renders it as a C++ dispatcher. Tree nodes live in a
//! `PrimaryMap` arena keyed by [`NodeId`] rather than as a `Box`-linked tree,
//! the same entity-arena idiom the teacher uses for its IR nodes.

use crate::error::{BackendError, Result};
use crate::mangle;
use crate::srcgen::Formatter;
use cranelift_entity::{entity_impl, PrimaryMap};
#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// Dispatcher-rendering knobs a caller might override, mirroring the
/// teacher's settings-builder pattern (`cdsl::settings`) for the handful of
/// cosmetic choices this generator doesn't hardcode.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct DecoderConfig {
    pub encoding_var: String,
    pub inst_buf_var: String,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig { encoding_var: "encoding".into(), inst_buf_var: "inst_buf".into() }
    }
}

#[derive(Debug, Clone)]
pub struct DecodeVar {
    pub name: String,
    pub msb: u32,
    pub lsb: u32,
    pub excludes: Vec<i128>,
}

#[derive(Debug, Clone)]
pub struct Instruction {
    pub name: String,
    /// MSB-first, one char per bit: `0`, `1`, or `-` (don't-care).
    pub encoding: String,
    pub decode_vars: Vec<DecodeVar>,
    pub extensions: Vec<String>,
}

impl Instruction {
    fn bit(&self, pos: u32) -> u8 {
        self.encoding.as_bytes()[pos as usize]
    }

    fn specificity(&self) -> usize {
        self.encoding.bytes().filter(|&b| b != b'-').count()
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct NodeId(u32);
entity_impl!(NodeId, "decode_node");

#[derive(Debug)]
enum DecisionNode {
    /// One or more instructions that match everything consumed so far;
    /// more than one member means they overlap and must be disambiguated by
    /// specificity at emission time (spec's "hint-disambiguation check").
    Leaf(Vec<usize>),
    Select { hi: u32, lo: u32, branches: Vec<(u64, NodeId)> },
}

fn msb_range_to_hi_lo(width: u32, start: u32, end: u32) -> (u32, u32) {
    (width - 1 - start, width - end)
}

fn build(group: &[usize], pos: u32, insts: &[Instruction], width: u32, arena: &mut PrimaryMap<NodeId, DecisionNode>) -> NodeId {
    if group.len() <= 1 {
        return arena.push(DecisionNode::Leaf(group.to_vec()));
    }

    let mut p = pos;
    while p < width && group.iter().all(|&i| insts[i].bit(p) == b'-') {
        p += 1;
    }
    if p >= width {
        let mut members = group.to_vec();
        members.sort_by_key(|&i| std::cmp::Reverse(insts[i].specificity()));
        return arena.push(DecisionNode::Leaf(members));
    }

    let mut end = p + 1;
    while end < width && group.iter().all(|&i| insts[i].bit(end) != b'-') {
        end += 1;
    }

    let mut buckets: std::collections::BTreeMap<u64, Vec<usize>> = std::collections::BTreeMap::new();
    let mut wildcard: Vec<usize> = Vec::new();
    for &i in group {
        if (p..end).all(|b| insts[i].bit(b) != b'-') {
            let mut val: u64 = 0;
            for b in p..end {
                val = (val << 1) | u64::from(insts[i].bit(b) - b'0');
            }
            buckets.entry(val).or_default().push(i);
        } else {
            wildcard.push(i);
        }
    }

    if buckets.is_empty() {
        let mut members = wildcard;
        members.sort_by_key(|&i| std::cmp::Reverse(insts[i].specificity()));
        return arena.push(DecisionNode::Leaf(members));
    }

    let mut branches = Vec::new();
    for (val, mut members) in buckets {
        members.extend(wildcard.iter().copied());
        let child = build(&members, end, insts, width, arena);
        branches.push((val, child));
    }
    let (hi, lo) = msb_range_to_hi_lo(width, p, end);
    arena.push(DecisionNode::Select { hi, lo, branches })
}

fn needs_long_form(branches: &[(u64, NodeId)], arena: &PrimaryMap<NodeId, DecisionNode>, insts: &[Instruction]) -> bool {
    branches.iter().any(|(_, child)| match &arena[*child] {
        DecisionNode::Leaf(members) if members.len() == 1 => {
            let inst = &insts[members[0]];
            !inst.decode_vars.iter().all(|dv| dv.excludes.is_empty()) || !inst.extensions.is_empty()
        }
        DecisionNode::Leaf(_) => true,
        DecisionNode::Select { .. } => true,
    })
}

fn extension_check(ext: &str) -> String {
    format!("{}(ExtensionName::{ext})", mangle::escape_identifier("implemented?"))
}

fn exclusion_checks(inst: &Instruction, config: &DecoderConfig) -> Vec<String> {
    let mut out = Vec::new();
    let enc = &config.encoding_var;
    for dv in &inst.decode_vars {
        for excl in &dv.excludes {
            out.push(format!("extract<{}, {}>({enc}) != {excl}_b", dv.lsb, dv.msb - dv.lsb + 1));
        }
    }
    out
}

fn branch_condition(
    val: u64,
    hi: u32,
    lo: u32,
    child: NodeId,
    arena: &PrimaryMap<NodeId, DecisionNode>,
    insts: &[Instruction],
    config: &DecoderConfig,
) -> String {
    let mut parts = vec![format!("extract<{lo}, {}>({}) == {val}", hi - lo + 1, config.encoding_var)];
    if let DecisionNode::Leaf(members) = &arena[child] {
        if members.len() == 1 {
            let inst = &insts[members[0]];
            parts.extend(exclusion_checks(inst, config));
            parts.extend(inst.extensions.iter().map(|e| extension_check(e)));
        }
    }
    parts.join(" && ")
}

fn emit_endpoint(f: &mut Formatter, idx: usize, insts: &[Instruction], config: &DecoderConfig) {
    let inst = &insts[idx];
    fmtln!(
        f,
        "new ({}) {}({});",
        config.inst_buf_var,
        mangle::escape_identifier(&inst.name),
        config.encoding_var
    );
    f.line("return true;");
}

fn emit_leaf(f: &mut Formatter, members: &[usize], insts: &[Instruction], config: &DecoderConfig) -> Result<()> {
    if members.is_empty() {
        return Err(BackendError::internal(Default::default(), "decoder leaf has no matching instructions"));
    }
    if members.len() == 1 {
        emit_endpoint(f, members[0], insts, config);
        return Ok(());
    }
    for (idx, &m) in members.iter().enumerate() {
        let inst = &insts[m];
        let is_last = idx + 1 == members.len();
        if is_last {
            f.outdented_line("} else {");
        } else {
            let mask_cond = full_mask_condition(inst, config);
            if idx == 0 {
                fmtln!(f, "if ({mask_cond}) {{");
            } else {
                f.outdented_line(format!("}} else if ({mask_cond}) {{"));
            }
        }
        f.indent(|f| emit_endpoint(f, m, insts, config));
    }
    f.line("}");
    Ok(())
}

fn full_mask_condition(inst: &Instruction, config: &DecoderConfig) -> String {
    let mut mask: u64 = 0;
    let mut value: u64 = 0;
    for b in inst.encoding.bytes() {
        mask <<= 1;
        value <<= 1;
        if b != b'-' {
            mask |= 1;
            value |= u64::from(b - b'0');
        }
    }
    format!("({} & {mask}) == {value}", config.encoding_var)
}

fn emit_select(
    f: &mut Formatter,
    hi: u32,
    lo: u32,
    branches: &[(u64, NodeId)],
    arena: &PrimaryMap<NodeId, DecisionNode>,
    insts: &[Instruction],
    config: &DecoderConfig,
) -> Result<()> {
    if !needs_long_form(branches, arena, insts) {
        fmtln!(f, "switch (extract<{lo}, {}>({})) {{", hi - lo + 1, config.encoding_var);
        let result = f.indent(|f| -> Result<()> {
            for (val, child) in branches {
                fmtln!(f, "case {val}: {{");
                f.indent(|f| emit_node(f, *child, arena, insts, config))?;
                f.line("}");
            }
            f.line("default: return false;");
            Ok(())
        });
        result?;
        f.line("}");
    } else {
        for (i, (val, child)) in branches.iter().enumerate() {
            let cond = branch_condition(*val, hi, lo, *child, arena, insts, config);
            if i == 0 {
                fmtln!(f, "if ({cond}) {{");
            } else {
                f.outdented_line(format!("}} else if ({cond}) {{"));
            }
            f.indent(|f| emit_node(f, *child, arena, insts, config))?;
        }
        f.outdented_line("} else {");
        f.indent(|f| f.line("return false;"));
        f.line("}");
    }
    Ok(())
}

fn emit_node(f: &mut Formatter, id: NodeId, arena: &PrimaryMap<NodeId, DecisionNode>, insts: &[Instruction], config: &DecoderConfig) -> Result<()> {
    match &arena[id] {
        DecisionNode::Leaf(members) => emit_leaf(f, members, insts, config),
        DecisionNode::Select { hi, lo, branches } => emit_select(f, *hi, *lo, branches, arena, insts, config),
    }
}

/// Renders a full dispatcher function for `insts`, all of which must share
/// the same encoding width, using the default dispatch-variable naming.
pub fn render_dispatcher(name: &str, insts: &[Instruction]) -> Result<String> {
    render_dispatcher_with_config(name, insts, &DecoderConfig::default())
}

/// As [`render_dispatcher`], but with caller-chosen dispatch-variable names.
pub fn render_dispatcher_with_config(name: &str, insts: &[Instruction], config: &DecoderConfig) -> Result<String> {
    let width = match insts.first() {
        Some(first) => first.encoding.len() as u32,
        None => return Err(BackendError::internal(Default::default(), "decoder target set is empty")),
    };
    if insts.iter().any(|i| i.encoding.len() as u32 != width) {
        return Err(BackendError::internal(Default::default(), "decoder target set has mismatched encoding widths"));
    }

    let mut arena = PrimaryMap::new();
    let group: Vec<usize> = (0..insts.len()).collect();
    let root = build(&group, 0, insts, width, &mut arena);

    let mut f = Formatter::new();
    fmtln!(
        f,
        "bool {}(Bits<{width}> {}, std::byte* {}) {{",
        mangle::escape_identifier(name),
        config.encoding_var,
        config.inst_buf_var
    );
    let result = f.indent(|f| emit_node(f, root, &arena, insts, config));
    result?;
    f.line("}");
    Ok(f.into_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(name: &str, encoding: &str) -> Instruction {
        Instruction { name: name.into(), encoding: encoding.into(), decode_vars: vec![], extensions: vec![] }
    }

    #[test]
    fn switch_emitted_for_uniform_opcode_split() {
        let insts = vec![plain("add", "0000000----------000-----0110011"), plain("sub", "0100000----------000-----0110011")];
        let out = render_dispatcher("decode", &insts).unwrap();
        assert!(out.contains("switch ("), "expected a switch, got:\n{out}");
        assert!(out.contains("Add_Inst") || out.contains("add"));
    }

    #[test]
    fn extension_guard_forces_if_chain() {
        let mut guarded = plain("vadd", "1111111----------000-----1010111");
        guarded.extensions.push("V".into());
        let insts = vec![plain("add", "0000000----------000-----0110011"), guarded];
        let out = render_dispatcher("decode", &insts).unwrap();
        assert!(out.contains("if ("), "expected an if-chain, got:\n{out}");
        assert!(out.contains("implemented_Q_(ExtensionName::V)"));
    }

    #[test]
    fn more_specific_instruction_is_tried_first_in_hint_group() {
        let broad = plain("generic", "-------------------------0001111");
        let narrow = plain("fence", "0000----------------000-0001111");
        let insts = vec![broad, narrow];
        let out = render_dispatcher("decode", &insts).unwrap();
        let fence_pos = out.find("Fence_Inst").or_else(|| out.find("fence")).unwrap();
        let generic_pos = out.find("Generic_Inst").or_else(|| out.find("generic")).unwrap();
        assert!(fence_pos < generic_pos, "more specific instruction should be checked first:\n{out}");
    }

    #[test]
    fn decode_var_exclusion_appears_in_condition() {
        let mut inst = plain("csrrw", "-----------------001-----1110011");
        inst.decode_vars.push(DecodeVar { name: "rd".into(), msb: 11, lsb: 7, excludes: vec![0] });
        let insts = vec![inst];
        let out = render_dispatcher("decode", &insts).unwrap();
        assert!(out.contains("!= 0_b"), "expected an exclusion check, got:\n{out}");
    }
}

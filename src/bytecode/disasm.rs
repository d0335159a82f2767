use std::collections::BTreeMap;
use std::fmt::Write;

use crate::bytecode::{Bytecode, Op};

/// Print disassembly of a compiled contract
pub fn print_bc(bc: &Bytecode) {
    print!("{}", render(bc));
}

/// Full listing: initialization, then every function in table order.
pub fn render(bc: &Bytecode) -> String {
    let mut out = String::from("=== BYTECODE ===\n\n");

    render_code_object(&mut out, "initialization", &bc.initialization);

    for (index, function) in &bc.functions {
        let params: Vec<String> = function
            .params
            .iter()
            .map(|p| p.to_text().unwrap_or_else(|| p.describe()))
            .collect();
        let label = format!("function {} ({})", index, params.join(", "));
        render_code_object(&mut out, &label, &function.body);
    }

    out
}

fn render_code_object(out: &mut String, name: &str, ops: &[Op]) {
    out.push_str("════════════════════════════════════════\n");
    let _ = writeln!(out, " {}", name);
    let _ = writeln!(out, " {} instructions", ops.len());
    out.push_str("════════════════════════════════════════\n");
    out.push_str(&disassemble_to_string(ops));
    out.push('\n');
}

/// Return disassembly of one instruction list as a String
pub fn disassemble_to_string(ops: &[Op]) -> String {
    let mut output = String::new();
    let jumps = resolve_jumps(ops);
    let mut targets: Vec<usize> = jumps.values().copied().collect();
    targets.sort_unstable();
    targets.dedup();

    for (ip, op) in ops.iter().enumerate() {
        let is_target = targets.binary_search(&ip).is_ok();
        if is_target {
            output.push_str("      ┌──────────────────────────────────\n");
        }

        let _ = write!(output, "{:04} ", ip);
        output.push_str(if is_target { "► " } else { "  " });
        output.push_str(&format_op_string(op, jumps.get(&ip).copied()));
        output.push('\n');
    }

    if targets.binary_search(&ops.len()).is_ok() {
        let _ = writeln!(output, "{:04} ► END", ops.len());
    }

    output
}

/// Maps each JUMP/JUMPI index to its target, where the target was pushed by
/// a literal PUSH.
///
/// Walks the list once in order, tracking which PUSH produced each stack
/// entry. Generated code keeps every statement stack-balanced, so straight-line
/// order is enough to pair a jump with its target.
fn resolve_jumps(ops: &[Op]) -> BTreeMap<usize, usize> {
    let mut origins: Vec<Option<usize>> = Vec::new();
    let mut jumps = BTreeMap::new();

    for (ip, op) in ops.iter().enumerate() {
        let target_slot = match op {
            Op::Jump => origins.last().copied().flatten(),
            Op::Jumpi => origins
                .len()
                .checked_sub(2)
                .and_then(|i| origins.get(i).copied().flatten()),
            _ => None,
        };
        let target = target_slot
            .and_then(|pushed| ops[pushed].operand())
            .and_then(|w| w.to_usize());
        if let Some(target) = target {
            jumps.insert(ip, target);
        }

        let (pops, pushes) = op.stack_effect();
        let keep = origins.len().saturating_sub(pops);
        origins.truncate(keep);
        match op {
            Op::Push(_) => origins.push(Some(ip)),
            _ => origins.extend(std::iter::repeat_n(None, pushes)),
        }
    }

    jumps
}

fn format_op_string(op: &Op, target: Option<usize>) -> String {
    match (op, target) {
        (Op::Push(w), _) => format!("PUSH        {}", w.describe()),
        (Op::PushParam(w), _) => format!("PUSH_PARAM  {}", w.describe()),
        (Op::Jump | Op::Jumpi, Some(t)) => format!("{:<12}(→ {:04})", op.mnemonic(), t),
        (Op::Jump | Op::Jumpi, None) => format!("{:<12}(→ ?)", op.mnemonic()),
        (other, _) => other.mnemonic().to_string(),
    }
}

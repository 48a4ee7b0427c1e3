//! Shared test utilities for CFG analysis tests.
//!
//! Only compiled in test builds.

use mir_ir::{BlockId, Function, InstKind, Literal, OwnershipKind, Terminator, Ty, ValueId};

fn literal(func: &mut Function, block: BlockId, ty: Ty, value: Literal) -> ValueId {
    let inst = func.append_inst(block, InstKind::Literal { ty, value });
    func.inst_result(inst)
        .unwrap_or_else(|| panic!("literal has a result"))
}

pub(crate) fn int(func: &mut Function, block: BlockId, n: i64) -> ValueId {
    literal(func, block, Ty::INT, Literal::Int(n))
}

pub(crate) fn boolean(func: &mut Function, block: BlockId, b: bool) -> ValueId {
    literal(func, block, Ty::BOOL, Literal::Bool(b))
}

pub(crate) fn string(func: &mut Function, block: BlockId, s: &str) -> ValueId {
    literal(func, block, Ty::STR, Literal::Str(s.into()))
}

pub(crate) fn br(dest: BlockId, args: Vec<ValueId>) -> Terminator {
    Terminator::Br { dest, args }
}

pub(crate) fn ret(value: ValueId) -> Terminator {
    Terminator::Return { value }
}

/// Conditional branch on a fresh `true` literal appended to `block`.
pub(crate) fn cond_br(func: &mut Function, block: BlockId, true_dest: BlockId, false_dest: BlockId) {
    let cond = boolean(func, block, true);
    func.set_terminator(
        block,
        Terminator::CondBr {
            cond,
            true_dest,
            true_args: vec![],
            false_dest,
            false_args: vec![],
        },
    );
}

/// Build a function from successor lists: `succs[i]` lists the successors
/// of block `i`. Blocks with no successors return; one successor is a
/// `Br`, two a `CondBr`, more a `SwitchValue` whose last entry is the
/// default. No block takes arguments.
pub(crate) fn from_edges(succs: &[&[usize]]) -> (Function, Vec<BlockId>) {
    let mut func = Function::new("graph");
    let blocks: Vec<BlockId> = succs.iter().map(|_| func.create_block()).collect();
    for (i, targets) in succs.iter().enumerate() {
        let block = blocks[i];
        match targets {
            [] => {
                let zero = int(&mut func, block, 0);
                func.set_terminator(block, ret(zero));
            }
            [only] => {
                func.set_terminator(block, br(blocks[*only], vec![]));
            }
            [t, f] => cond_br(&mut func, block, blocks[*t], blocks[*f]),
            [cases @ .., default] => {
                let operand = int(&mut func, block, 0);
                let cases = cases
                    .iter()
                    .enumerate()
                    .map(|(n, &target)| (n as i64, blocks[target]))
                    .collect();
                func.set_terminator(
                    block,
                    Terminator::SwitchValue {
                        operand,
                        cases,
                        default: Some(blocks[*default]),
                    },
                );
            }
        }
    }
    (func, blocks)
}

/// Diamond `entry → {left, right} → join`, `join` taking one `INT` phi fed
/// `1` from the left and `2` from the right.
pub(crate) fn diamond() -> (Function, [BlockId; 4]) {
    let mut func = Function::new("diamond");
    let entry = func.create_block();
    let left = func.create_block();
    let right = func.create_block();
    let join = func.create_block();

    cond_br(&mut func, entry, left, right);
    let one = int(&mut func, left, 1);
    func.set_terminator(left, br(join, vec![one]));
    let two = int(&mut func, right, 2);
    func.set_terminator(right, br(join, vec![two]));
    let phi = func.add_phi_arg(join, Ty::INT, OwnershipKind::None);
    func.set_terminator(join, ret(phi));

    (func, [entry, left, right, join])
}

/// `entry → header`, `header → {body, exit}`, `body → header`.
///
/// Returns `(func, [entry, header, body, exit])`.
pub(crate) fn while_loop() -> (Function, [BlockId; 4]) {
    let (func, blocks) = from_edges(&[&[1], &[2, 3], &[1], &[]]);
    (func, [blocks[0], blocks[1], blocks[2], blocks[3]])
}

/// Two nested loops:
///
/// ```text
/// entry → outer
/// outer → {inner, exit}
/// inner → {inner_body, outer_latch}
/// inner_body → inner
/// outer_latch → outer
/// ```
///
/// Returns `(func, [entry, outer, inner, inner_body, outer_latch, exit])`.
pub(crate) fn nested_loops() -> (Function, [BlockId; 6]) {
    let (func, b) = from_edges(&[&[1], &[2, 5], &[3, 4], &[2], &[1], &[]]);
    (func, [b[0], b[1], b[2], b[3], b[4], b[5]])
}

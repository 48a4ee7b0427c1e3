//! Phi-argument erasure with dead-operand cleanup.

use smallvec::SmallVec;

use mir_ir::{ArgKind, BlockId, EdgeArgs, Function, PredEdge, ValueDef, ValueId};

/// Remove phi argument `index` of `block` together with the matching
/// operand on every incoming edge.
///
/// A predecessor reaching `block` through several edges loses the operand on
/// each of them. With `cleanup_dead_phi_ops`, operands left without uses are
/// deleted too: side-effect-free instructions are erased and their own
/// operands revisited, phi arguments are erased recursively.
///
/// # Panics
///
/// Panics if the argument is not a phi, or if an incoming edge delivers it
/// implicitly (there is no operand to remove). Debug-panics if the argument
/// still has uses outside its incoming edges.
pub fn erase_phi_argument(func: &mut Function, block: BlockId, index: usize, cleanup_dead_phi_ops: bool) {
    let arg = func.arg(block, index);
    assert!(
        func.value_def(arg).is_phi(),
        "argument {index} of {block} ({arg}) is not a phi"
    );
    let Some(removed) = detach_phi(func, block, index) else {
        panic!("cannot erase argument {index} of {block}: an incoming edge delivers it implicitly");
    };
    tracing::debug!(%block, index, operands = removed.len(), "erased phi argument");

    if cleanup_dead_phi_ops {
        delete_dead_values(func, removed.into_vec());
    }
}

/// Remove the incoming operands of phi `index` of `block`, then the phi
/// itself. Returns the removed operands, or `None` (changing nothing) if
/// some incoming edge is implicit.
fn detach_phi(func: &mut Function, block: BlockId, index: usize) -> Option<SmallVec<[ValueId; 4]>> {
    let preds: SmallVec<[PredEdge; 4]> = func.predecessors(block).iter().copied().collect();
    if preds
        .iter()
        .any(|p| matches!(func.edge_args(p.block, p.edge), EdgeArgs::Implicit(_)))
    {
        return None;
    }

    let mut removed = SmallVec::new();
    for pred in preds {
        if let Some(operand) =
            func.edge_args_mut(pred.block, pred.edge, |args| args.remove(index))
        {
            removed.push(operand);
        }
    }
    func.erase_block_arg(block, index);
    Some(removed)
}

/// Delete values in `worklist` that have become unused, transitively.
fn delete_dead_values(func: &mut Function, mut worklist: Vec<ValueId>) {
    while let Some(value) = worklist.pop() {
        if !func.is_live_value(value) || func.has_uses(value) {
            continue;
        }
        match func.value_def(value) {
            ValueDef::Inst(inst) => {
                let kind = func.inst(inst).kind();
                if kind.has_side_effects() {
                    continue;
                }
                let operands = kind.operands();
                tracing::trace!(%inst, %value, "erase dead instruction");
                func.erase_inst(inst);
                worklist.extend(operands);
            }
            ValueDef::BlockArg {
                block,
                index,
                kind: ArgKind::Phi,
            } => {
                if let Some(removed) = detach_phi(func, block, index as usize) {
                    tracing::trace!(%block, index, "erase dead phi argument");
                    worklist.extend(removed);
                }
            }
            ValueDef::BlockArg { .. } => {}
        }
    }
}

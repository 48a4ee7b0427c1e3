//! CFG mutation utilities.
//!
//! Every utility here rewrites terminators or the block list while keeping
//! the edge-argument invariant (each edge delivers exactly as many values as
//! its target declares arguments). Analyses handed in as `Option<&mut _>`
//! are patched in place; analyses not handed in are stale afterwards and
//! must be rebuilt before the next query.
//!
//! Degenerate requests (splitting a non-critical edge, merging a block that
//! cannot be merged) are not errors: they return `None` / `false` so whole
//! function sweeps can call these speculatively.

mod phi;

use smallvec::SmallVec;

use mir_ir::{BlockId, EdgeArgs, Function, Terminator, ValueId};

use crate::dominance::DominanceInfo;
use crate::loops::LoopInfo;

pub use phi::erase_phi_argument;

// ── Retargeting ─────────────────────────────────────────────────────

/// Point edge `edge` of `block`'s terminator at `new_dest`.
///
/// With `preserve_args` the edge keeps its explicit operands; otherwise they
/// are dropped and the caller is responsible for `new_dest`'s arguments.
pub fn change_branch_target(
    func: &mut Function,
    block: BlockId,
    edge: usize,
    new_dest: BlockId,
    preserve_args: bool,
) {
    if !preserve_args {
        func.edge_args_mut(block, edge, Vec::clear);
    }
    tracing::trace!(%block, edge, %new_dest, preserve_args, "change branch target");
    func.set_successor(block, edge, new_dest);
}

/// Retarget every edge of `block` that goes to `old_dest` so it goes to
/// `new_dest` instead.
pub fn replace_branch_target(
    func: &mut Function,
    block: BlockId,
    old_dest: BlockId,
    new_dest: BlockId,
    preserve_args: bool,
) {
    let succs = func.successors(block);
    for (edge, succ) in succs.into_iter().enumerate() {
        if succ == old_dest {
            change_branch_target(func, block, edge, new_dest, preserve_args);
        }
    }
}

/// The values a block inserted on edge `edge` of `block` must forward to
/// the edge's original target.
///
/// Explicit operands are returned as they are. An implicit payload does not
/// exist as a value before the edge is taken, so a fresh phi argument
/// mirroring the target's argument is added to `new_edge_block` to receive
/// it, and that argument is returned.
pub fn get_edge_args(
    func: &mut Function,
    block: BlockId,
    edge: usize,
    new_edge_block: BlockId,
) -> SmallVec<[ValueId; 4]> {
    let explicit: Option<SmallVec<[ValueId; 4]>> = match func.edge_args(block, edge) {
        EdgeArgs::Explicit(args) => Some(args.iter().copied().collect()),
        EdgeArgs::Implicit(_) => None,
    };
    if let Some(args) = explicit {
        return args;
    }

    let dest = func.terminator(block).successor(edge);
    let dest_args: SmallVec<[ValueId; 1]> = func.block(dest).args().iter().copied().collect();
    dest_args
        .into_iter()
        .map(|arg| {
            let ty = func.value_ty(arg);
            let ownership = func.ownership_kind(arg);
            func.add_phi_arg(new_edge_block, ty, ownership)
        })
        .collect()
}

// ── Edge splitting ──────────────────────────────────────────────────

/// Insert a new block on edge `edge` of `block` and return it.
///
/// The edge is retargeted to the new block (its operands dropped) and the
/// new block branches to the original target, forwarding the edge's values
/// (see [`get_edge_args`]).
///
/// `dom` is patched when `block` is reachable: the new block is dominated by
/// `block`, and it becomes the target's immediate dominator when it now
/// dominates the target. `loops` gets the new block in the loop of whichever
/// endpoint is the outer one when the two loops nest; for unrelated loops
/// the block goes to the target loop's parent.
pub fn split_edge(
    func: &mut Function,
    block: BlockId,
    edge: usize,
    dom: Option<&mut DominanceInfo>,
    loops: Option<&mut LoopInfo>,
) -> BlockId {
    let dest = func.terminator(block).successor(edge);
    let edge_block = func.create_block_after(block);
    let args = get_edge_args(func, block, edge, edge_block);
    change_branch_target(func, block, edge, edge_block, false);
    func.set_terminator(
        edge_block,
        Terminator::Br {
            dest,
            args: args.into_vec(),
        },
    );

    if let Some(dom) = dom {
        update_dominators(func, dom, block, edge_block, dest);
    }
    if let Some(loops) = loops {
        update_loops(loops, block, edge_block, dest);
    }

    tracing::debug!(%block, edge, %dest, %edge_block, "split edge");
    edge_block
}

fn update_dominators(
    func: &Function,
    dom: &mut DominanceInfo,
    block: BlockId,
    edge_block: BlockId,
    dest: BlockId,
) {
    if !dom.is_reachable(block) {
        return;
    }
    dom.add_new_block(edge_block, block);

    // The edge block dominates dest iff every other way into dest is a back
    // edge from inside dest's subtree (or comes from unreachable code).
    let dominates_dest = func.predecessors(dest).iter().all(|pred| {
        pred.block == edge_block || !dom.is_reachable(pred.block) || dom.dominates(dest, pred.block)
    });
    if dominates_dest {
        dom.change_idom(dest, edge_block);
    }
}

fn update_loops(loops: &mut LoopInfo, block: BlockId, edge_block: BlockId, dest: BlockId) {
    let (Some(src_loop), Some(dest_loop)) = (loops.loop_for(block), loops.loop_for(dest)) else {
        // An edge entering or leaving a loop puts the new block outside it.
        return;
    };

    let target = if src_loop == dest_loop || loops.loop_contains(dest_loop, src_loop) {
        // Same loop, or an exit from an inner loop into its parent.
        Some(dest_loop)
    } else if loops.loop_contains(src_loop, dest_loop) {
        // Entry from an outer loop into an inner one.
        Some(src_loop)
    } else {
        if !loops.is_loop_header(dest) {
            tracing::warn!(
                %block,
                %dest,
                src_header = %loops.get(src_loop).header(),
                dest_header = %loops.get(dest_loop).header(),
                "irreducible control flow: split edge joins unrelated loops"
            );
        }
        // Entry into a sibling loop: the block sits in whatever encloses
        // the target loop.
        loops.get(dest_loop).parent()
    };

    if let Some(id) = target {
        loops.add_block_to_loop(edge_block, id);
    }
}

/// An edge is critical when its source has several successors and its
/// target several incoming edges.
pub fn is_critical_edge(func: &Function, block: BlockId, edge: usize) -> bool {
    let term = func.terminator(block);
    if term.num_successors() <= 1 {
        return false;
    }
    func.predecessors(term.successor(edge)).len() > 1
}

/// Split edge `edge` of `block` if it is critical. `None` means the edge was
/// not critical and nothing changed.
pub fn split_critical_edge(
    func: &mut Function,
    block: BlockId,
    edge: usize,
    dom: Option<&mut DominanceInfo>,
    loops: Option<&mut LoopInfo>,
) -> Option<BlockId> {
    is_critical_edge(func, block, edge).then(|| split_edge(func, block, edge, dom, loops))
}

/// Split the first critical edge from `from` to `to`, if there is one.
pub fn split_if_critical_edge(
    func: &mut Function,
    from: BlockId,
    to: BlockId,
    dom: Option<&mut DominanceInfo>,
    loops: Option<&mut LoopInfo>,
) -> Option<BlockId> {
    let edge = func
        .successors(from)
        .iter()
        .enumerate()
        .position(|(edge, &succ)| succ == to && is_critical_edge(func, from, edge))?;
    Some(split_edge(func, from, edge, dom, loops))
}

/// Split every edge from `from` to `to`, critical or not. Returns the new
/// blocks in edge order.
pub fn split_edges_from_to(
    func: &mut Function,
    from: BlockId,
    to: BlockId,
    mut dom: Option<&mut DominanceInfo>,
    mut loops: Option<&mut LoopInfo>,
) -> SmallVec<[BlockId; 2]> {
    let succs = func.successors(from);
    succs
        .into_iter()
        .enumerate()
        .filter(|&(_, succ)| succ == to)
        .map(|(edge, _)| split_edge(func, from, edge, dom.as_deref_mut(), loops.as_deref_mut()))
        .collect()
}

/// Split every critical edge of `func`. Returns whether anything changed.
///
/// Splitting one edge never changes whether another edge is critical, so
/// the result does not depend on visitation order and a second call is a
/// no-op.
pub fn split_all_critical_edges(
    func: &mut Function,
    mut dom: Option<&mut DominanceInfo>,
    mut loops: Option<&mut LoopInfo>,
) -> bool {
    let mut changed = false;
    let blocks: Vec<BlockId> = func.blocks().collect();
    for block in blocks {
        let Some(term) = func.block(block).terminator() else {
            continue;
        };
        for edge in 0..term.num_successors() {
            if split_critical_edge(func, block, edge, dom.as_deref_mut(), loops.as_deref_mut()).is_some() {
                changed = true;
            }
        }
    }
    if changed {
        tracing::debug!(function = func.name(), blocks = func.num_blocks(), "split critical edges");
    }
    changed
}

// ── Merging ─────────────────────────────────────────────────────────

/// Merge `block`'s successor into it if possible, patching `dom` and
/// `loops`. Returns whether a merge happened.
pub fn merge_basic_block_with_successor(
    func: &mut Function,
    block: BlockId,
    dom: Option<&mut DominanceInfo>,
    loops: Option<&mut LoopInfo>,
) -> bool {
    match func.merge_with_successor(block) {
        Ok(succ) => {
            if let Some(dom) = dom {
                dom.erase_block(succ);
            }
            if let Some(loops) = loops {
                loops.remove_block(succ);
            }
            tracing::debug!(%block, %succ, "merged block with successor");
            true
        }
        Err(reason) => {
            tracing::trace!(%block, %reason, "not merged");
            false
        }
    }
}

/// Merge every block into its predecessor wherever possible. Returns
/// whether anything changed; a second call is a no-op.
///
/// Analyses are not patched; rebuild them afterwards.
pub fn merge_basic_blocks(func: &mut Function) -> bool {
    let mut changed = false;
    let blocks: Vec<BlockId> = func.blocks().collect();
    for block in blocks {
        if !func.is_live_block(block) || func.block(block).terminator().is_none() {
            continue;
        }
        while merge_basic_block_with_successor(func, block, None, None) {
            changed = true;
        }
    }
    if changed {
        tracing::debug!(function = func.name(), blocks = func.num_blocks(), "merged blocks");
    }
    changed
}

#[cfg(test)]
mod tests;

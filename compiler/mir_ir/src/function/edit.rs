//! Structural block edits: split, merge, erase.
//!
//! These primitives keep the function's own invariants (layout, predecessor
//! index, def-site back links) intact. They know nothing about dominance or
//! loop analyses; the CFG utilities in `mir_cfg` wrap them and patch those.

use smallvec::SmallVec;

use crate::error::MergeError;
use crate::ids::BlockId;
use crate::terminator::Terminator;

use super::{Function, PredEdge, User};

impl Function {
    /// Split `block` before instruction `at`.
    ///
    /// The new tail block (placed right after `block` in the layout) takes
    /// instructions `at..` and the terminator; `block` gains an unconditional
    /// branch to the tail. The tail has no arguments.
    ///
    /// # Panics
    ///
    /// Panics if `at` lies past the terminator (`at > insts.len()`).
    pub fn split_block(&mut self, block: BlockId, at: usize) -> BlockId {
        let len = self.block(block).insts.len();
        assert!(
            at <= len,
            "cannot split {block} at {at}: it has {len} instructions before its terminator"
        );

        let tail = self.create_block_after(block);
        let moved: Vec<_> = self.block_mut(block).insts.drain(at..).collect();
        for &inst in &moved {
            self.inst_mut(inst).block = tail;
        }
        self.block_mut(tail).insts = moved;

        if let Some(term) = self.take_terminator(block) {
            self.set_terminator(tail, term);
        }
        self.set_terminator(
            block,
            Terminator::Br {
                dest: tail,
                args: Vec::new(),
            },
        );

        tracing::trace!(%block, %tail, at, "split block");
        tail
    }

    /// Check whether `block` can absorb its successor.
    ///
    /// Mergeable iff `block` ends in an unconditional branch to a different,
    /// non-entry block whose only incoming edge is that branch.
    pub fn can_merge_with_successor(&self, block: BlockId) -> Result<BlockId, MergeError> {
        let Terminator::Br { dest, args } = self.terminator(block) else {
            return Err(MergeError::NotUnconditionalBranch { block });
        };
        let succ = *dest;
        if succ == block {
            return Err(MergeError::SelfLoop { block });
        }
        if succ == self.entry() {
            return Err(MergeError::EntryBlock { succ });
        }
        let count = self.block(succ).preds.len();
        if count != 1 {
            return Err(MergeError::MultiplePredecessors { succ, count });
        }
        if args.iter().any(|a| self.block(succ).args.contains(a)) {
            return Err(MergeError::ArgumentCycle { block, succ });
        }
        Ok(succ)
    }

    /// Merge `block`'s unique successor into `block`.
    ///
    /// Uses of the successor's arguments are replaced by the branch operands,
    /// the successor's instructions and terminator are spliced into `block`,
    /// and the successor is erased. Returns the erased successor.
    pub fn merge_with_successor(&mut self, block: BlockId) -> Result<BlockId, MergeError> {
        let succ = self.can_merge_with_successor(block)?;

        let Some(Terminator::Br { args: operands, .. }) = self.take_terminator(block) else {
            unreachable!("can_merge_with_successor checked for an unconditional branch");
        };
        let succ_args = std::mem::take(&mut self.block_mut(succ).args);
        debug_assert_eq!(
            succ_args.len(),
            operands.len(),
            "branch from {block} passes the wrong number of arguments to {succ}"
        );
        for (&arg, &operand) in succ_args.iter().zip(&operands) {
            self.replace_all_uses(arg, operand);
            self.values[arg.index()] = None;
        }

        let moved = std::mem::take(&mut self.block_mut(succ).insts);
        for &inst in &moved {
            self.inst_mut(inst).block = block;
        }
        self.block_mut(block).insts.extend(moved);

        if let Some(term) = self.take_terminator(succ) {
            self.set_terminator(block, term);
        }
        self.remove_from_layout(succ);

        tracing::trace!(%block, %succ, "merged block into predecessor");
        Ok(succ)
    }

    /// Erase `block` together with its arguments and instructions.
    ///
    /// # Panics
    ///
    /// Panics if another block's terminator still names `block` as a
    /// successor. Self-edges are dropped along with the block.
    pub fn erase_block(&mut self, block: BlockId) {
        let preds: SmallVec<[PredEdge; 2]> = self
            .block(block)
            .preds
            .iter()
            .copied()
            .filter(|p| p.block != block)
            .collect();
        assert!(
            preds.is_empty(),
            "erasing {block} which is still targeted by {preds:?}"
        );
        self.take_terminator(block);
        let data = self.block_mut(block);
        let args = std::mem::take(&mut data.args);
        let insts = std::mem::take(&mut data.insts);
        for arg in args {
            self.values[arg.index()] = None;
        }
        for inst in insts {
            let data = self.inst(inst);
            let (result, operands) = (data.result, data.kind.operands());
            self.use_index.unlink(User::Inst(inst), operands);
            if let Some(result) = result {
                self.values[result.index()] = None;
            }
            self.insts[inst.index()] = None;
        }
        self.remove_from_layout(block);
        tracing::trace!(%block, "erased block");
    }

    fn remove_from_layout(&mut self, block: BlockId) {
        self.layout.retain(|&b| b != block);
        self.blocks[block.index()] = None;
    }
}

//! Dominator and post-dominator trees.
//!
//! [`DominanceInfo`] answers "does A always execute before B" for blocks,
//! program points and values. [`PostDominanceInfo`] answers "does every path
//! from B to an exit pass through A", rooted at a virtual node above every
//! block without successors since a function may have several exits.
//!
//! Both are snapshots of the CFG they were built from. The only supported
//! incremental edit is inserting one block on one edge
//! ([`DominanceInfo::add_new_block`] + [`DominanceInfo::change_idom`], driven
//! by `cfg_utils::split_edge`) and dropping a block merged into its
//! predecessor ([`DominanceInfo::erase_block`]). Anything else requires a
//! rebuild. `check()` / `verify()` diff the cached tree against a fresh one.

use mir_ir::{BlockId, Function, FunctionId, ProgramPoint, ValueDef, ValueId};

use crate::dom_tree::{self, DomTree};
use crate::error::AnalysisMismatch;
use crate::traversal::ReversePostOrder;

// ── Dominance ───────────────────────────────────────────────────────

/// Dominator tree of one function, rooted at its entry block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DominanceInfo {
    function: FunctionId,
    tree: DomTree,
}

impl DominanceInfo {
    /// Compute the dominator tree of `func` from scratch.
    ///
    /// # Panics
    ///
    /// Panics if `func` has no blocks.
    pub fn build(func: &Function) -> Self {
        let entry = func.entry();
        let mut preds = vec![Vec::new(); func.block_capacity()];
        for block in func.blocks() {
            preds[block.index()] = func.predecessors(block).iter().map(|p| p.block.index()).collect();
        }
        let rpo: Vec<usize> = ReversePostOrder::from_entry(func).map(BlockId::index).collect();
        let tree = DomTree::compute(entry.index(), &rpo, &preds);

        tracing::debug!(
            function = func.name(),
            blocks = func.num_blocks(),
            reachable = rpo.len(),
            "built dominator tree"
        );
        DominanceInfo {
            function: func.id(),
            tree,
        }
    }

    /// The entry block.
    pub fn root(&self) -> BlockId {
        BlockId::from_index(self.tree.root())
    }

    /// Immediate dominator of `block`; `None` for the entry and for
    /// unreachable blocks.
    pub fn idom(&self, block: BlockId) -> Option<BlockId> {
        self.tree.parent(block.index()).map(BlockId::from_index)
    }

    /// Does `a` dominate `b`? A block dominates itself. An unreachable block
    /// is dominated only by itself.
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        self.tree.dominates(a.index(), b.index())
    }

    pub fn properly_dominates(&self, a: BlockId, b: BlockId) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Is `block` reachable from the entry?
    pub fn is_reachable(&self, block: BlockId) -> bool {
        self.tree.is_reachable(block.index())
    }

    /// Blocks whose immediate dominator is `block`, in block-index order.
    pub fn children(&self, block: BlockId) -> Vec<BlockId> {
        self.tree
            .children(block.index())
            .into_iter()
            .map(BlockId::from_index)
            .collect()
    }

    /// Depth of `block` in the tree (entry is 0); `None` if unreachable.
    pub fn depth(&self, block: BlockId) -> Option<usize> {
        self.tree.depth(block.index())
    }

    /// Deepest block dominating both `a` and `b`; `None` if either is
    /// unreachable.
    pub fn nearest_common_dominator(&self, a: BlockId, b: BlockId) -> Option<BlockId> {
        self.tree
            .nearest_common(a.index(), b.index())
            .map(BlockId::from_index)
    }

    // ── Program points and values ───────────────────────────────

    /// Does program point `a` dominate program point `b`?
    ///
    /// Points in different blocks compare by block dominance; points in the
    /// same block by position. A point dominates itself.
    ///
    /// # Panics
    ///
    /// Panics if `func` is not the function this tree was built for.
    pub fn inst_dominates(
        &self,
        func: &Function,
        a: impl Into<ProgramPoint>,
        b: impl Into<ProgramPoint>,
    ) -> bool {
        self.assert_same_function(func);
        let (block_a, pos_a) = func.point_position(a.into());
        let (block_b, pos_b) = func.point_position(b.into());
        if block_a == block_b {
            pos_a <= pos_b
        } else {
            self.properly_dominates(block_a, block_b)
        }
    }

    pub fn inst_properly_dominates(
        &self,
        func: &Function,
        a: impl Into<ProgramPoint>,
        b: impl Into<ProgramPoint>,
    ) -> bool {
        let (a, b) = (a.into(), b.into());
        a != b && self.inst_dominates(func, a, b)
    }

    /// Does `value` dominate `point`?
    ///
    /// An instruction result dominates wherever its defining instruction
    /// does; a block argument wherever its block does.
    pub fn value_dominates(&self, func: &Function, value: ValueId, point: impl Into<ProgramPoint>) -> bool {
        match func.value_def(value) {
            ValueDef::Inst(def) => self.inst_dominates(func, def, point),
            ValueDef::BlockArg { block, .. } => {
                self.assert_same_function(func);
                let (point_block, _) = func.point_position(point.into());
                self.dominates(block, point_block)
            }
        }
    }

    /// Like [`value_dominates`](Self::value_dominates), but an instruction
    /// result does not dominate its own defining instruction.
    pub fn value_properly_dominates(
        &self,
        func: &Function,
        value: ValueId,
        point: impl Into<ProgramPoint>,
    ) -> bool {
        match func.value_def(value) {
            ValueDef::Inst(def) => self.inst_properly_dominates(func, def, point),
            ValueDef::BlockArg { .. } => self.value_dominates(func, value, point),
        }
    }

    fn assert_same_function(&self, func: &Function) {
        assert!(
            self.function == func.id(),
            "dominator tree of {} queried with function `{}` ({})",
            self.function,
            func.name(),
            func.id()
        );
    }

    // ── Incremental updates ─────────────────────────────────────

    /// Record a freshly created `block` whose immediate dominator is `idom`.
    pub fn add_new_block(&mut self, block: BlockId, idom: BlockId) {
        tracing::trace!(%block, %idom, "dominator tree: add block");
        self.tree.add_node(block.index(), idom.index());
    }

    /// Move `block` (with its subtree) under `new_idom`.
    pub fn change_idom(&mut self, block: BlockId, new_idom: BlockId) {
        tracing::trace!(%block, %new_idom, "dominator tree: change idom");
        self.tree.set_parent(block.index(), new_idom.index());
    }

    /// Forget `block`, hoisting its children to its immediate dominator.
    pub fn erase_block(&mut self, block: BlockId) {
        tracing::trace!(%block, "dominator tree: erase block");
        self.tree.remove_node(block.index());
    }

    // ── Verification ────────────────────────────────────────────

    /// Compare against a tree recomputed from the current CFG.
    pub fn check(&self, func: &Function) -> Result<(), AnalysisMismatch> {
        let fresh = DominanceInfo::build(func);
        for block in func.blocks() {
            let (cached, recomputed) = (self.idom(block), fresh.idom(block));
            if cached != recomputed || self.is_reachable(block) != fresh.is_reachable(block) {
                return Err(AnalysisMismatch::Dominator {
                    block,
                    cached,
                    fresh: recomputed,
                });
            }
        }
        Ok(())
    }

    /// # Panics
    ///
    /// Panics if the cached tree differs from a fresh one.
    pub fn verify(&self, func: &Function) {
        if let Err(err) = self.check(func) {
            panic!("dominator tree of `{}` is stale: {err}", func.name());
        }
    }
}

// ── Post-dominance ──────────────────────────────────────────────────

/// Post-dominator tree of one function.
///
/// The tree hangs off a virtual exit node whose children are the blocks
/// without successors. Blocks that cannot reach any such block (infinite
/// loops) are outside the tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostDominanceInfo {
    function: FunctionId,
    roots: Vec<BlockId>,
    /// Node index of the virtual exit: one past the last block slot.
    virtual_root: usize,
    tree: DomTree,
}

impl PostDominanceInfo {
    pub fn build(func: &Function) -> Self {
        let virtual_root = func.block_capacity();
        let n = virtual_root + 1;
        let mut succs = vec![Vec::new(); n];
        let mut preds = vec![Vec::new(); n];
        let mut roots = Vec::new();

        for block in func.blocks() {
            let b = block.index();
            // Reverse graph: predecessors become successors.
            succs[b] = func.predecessors(block).iter().map(|p| p.block.index()).collect();
            let forward = func.successors(block);
            if forward.is_empty() {
                roots.push(block);
                succs[virtual_root].push(b);
                preds[b].push(virtual_root);
            } else {
                preds[b] = forward.iter().map(|s| s.index()).collect();
            }
        }

        let mut rpo = dom_tree::postorder(virtual_root, &succs);
        rpo.reverse();
        let tree = DomTree::compute(virtual_root, &rpo, &preds);

        tracing::debug!(
            function = func.name(),
            roots = roots.len(),
            reaching_exit = rpo.len() - 1,
            "built post-dominator tree"
        );
        PostDominanceInfo {
            function: func.id(),
            roots,
            virtual_root,
            tree,
        }
    }

    /// Blocks without successors, in layout order.
    pub fn roots(&self) -> &[BlockId] {
        &self.roots
    }

    fn node(&self, block: BlockId) -> Option<usize> {
        let index = block.index();
        (index < self.virtual_root).then_some(index)
    }

    /// Immediate post-dominator of `block`; `None` when its parent is the
    /// virtual exit or the block cannot reach an exit.
    pub fn ipdom(&self, block: BlockId) -> Option<BlockId> {
        let parent = self.tree.parent(self.node(block)?)?;
        (parent != self.virtual_root).then(|| BlockId::from_index(parent))
    }

    /// Does every path from `b` to an exit pass through `a`? A block
    /// post-dominates itself.
    pub fn post_dominates(&self, a: BlockId, b: BlockId) -> bool {
        match (self.node(a), self.node(b)) {
            (Some(a), Some(b)) => self.tree.dominates(a, b),
            _ => a == b,
        }
    }

    pub fn properly_post_dominates(&self, a: BlockId, b: BlockId) -> bool {
        a != b && self.post_dominates(a, b)
    }

    /// Can `block` reach a block without successors?
    pub fn reaches_exit(&self, block: BlockId) -> bool {
        self.node(block).is_some_and(|b| self.tree.is_reachable(b))
    }

    /// Deepest block post-dominating both `a` and `b`; `None` if the two
    /// only meet at the virtual exit.
    pub fn nearest_common_post_dominator(&self, a: BlockId, b: BlockId) -> Option<BlockId> {
        let common = self.tree.nearest_common(self.node(a)?, self.node(b)?)?;
        (common != self.virtual_root).then(|| BlockId::from_index(common))
    }

    /// Compare against a tree recomputed from the current CFG.
    pub fn check(&self, func: &Function) -> Result<(), AnalysisMismatch> {
        debug_assert_eq!(self.function, func.id(), "post-dominator tree of another function");
        let fresh = PostDominanceInfo::build(func);
        for block in func.blocks() {
            let (cached, recomputed) = (self.ipdom(block), fresh.ipdom(block));
            if cached != recomputed || self.reaches_exit(block) != fresh.reaches_exit(block) {
                return Err(AnalysisMismatch::PostDominator {
                    block,
                    cached,
                    fresh: recomputed,
                });
            }
        }
        Ok(())
    }

    /// # Panics
    ///
    /// Panics if the cached tree differs from a fresh one.
    pub fn verify(&self, func: &Function) {
        if let Err(err) = self.check(func) {
            panic!("post-dominator tree of `{}` is stale: {err}", func.name());
        }
    }
}

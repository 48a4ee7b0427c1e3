//! Natural-loop forest.
//!
//! A back edge is an edge `latch → header` where `header` dominates `latch`.
//! The natural loop of a header is the header plus every block that reaches
//! one of its latches without passing through the header. Loops sharing a
//! header are one loop. Loops nest by containment and form a forest; each
//! block maps to at most one innermost loop.
//!
//! Membership is not kept in sync automatically. CFG utilities that add or
//! remove blocks inside loops call [`LoopInfo::add_block_to_loop`] and
//! [`LoopInfo::remove_block`] when handed the forest.

use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use mir_ir::{BlockId, Function, InstKind, ProgramPoint, Terminator, User, ValueId};

use crate::dominance::DominanceInfo;
use crate::error::AnalysisMismatch;
use crate::traversal::PostOrderFunctionInfo;

/// Index of a loop within its [`LoopInfo`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoopId(u32);

impl LoopId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    fn from_index(index: usize) -> Self {
        match u32::try_from(index) {
            Ok(raw) => LoopId(raw),
            Err(_) => panic!("loop index {index} exceeds u32::MAX"),
        }
    }
}

impl fmt::Display for LoopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loop{}", self.0)
    }
}

/// One natural loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Loop {
    header: BlockId,
    /// Members, header first.
    blocks: Vec<BlockId>,
    block_set: FxHashSet<BlockId>,
    parent: Option<LoopId>,
    children: Vec<LoopId>,
    /// 1 for top-level loops.
    depth: u32,
}

impl Loop {
    pub fn header(&self) -> BlockId {
        self.header
    }

    /// Member blocks, header first, including blocks of nested loops.
    pub fn blocks(&self) -> &[BlockId] {
        &self.blocks
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn contains(&self, block: BlockId) -> bool {
        self.block_set.contains(&block)
    }

    pub fn parent(&self) -> Option<LoopId> {
        self.parent
    }

    pub fn children(&self) -> &[LoopId] {
        &self.children
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }
}

/// The loop forest of one function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoopInfo {
    loops: Vec<Loop>,
    top_level: Vec<LoopId>,
    innermost: FxHashMap<BlockId, LoopId>,
}

impl LoopInfo {
    /// Discover every natural loop of `func`.
    ///
    /// `dom` must be fresh for `func`.
    pub fn build(func: &Function, dom: &DominanceInfo) -> Self {
        let order = PostOrderFunctionInfo::new(func);
        let mut loops: Vec<Loop> = Vec::new();

        // Headers in RPO: an enclosing loop's header precedes its children's.
        for header in order.reverse_post_order() {
            let latches: SmallVec<[BlockId; 2]> = func
                .pred_blocks(header)
                .into_iter()
                .filter(|&pred| dom.is_reachable(pred) && dom.dominates(header, pred))
                .collect();
            if latches.is_empty() {
                continue;
            }

            let mut block_set = FxHashSet::default();
            block_set.insert(header);
            let mut worklist: Vec<BlockId> = latches.into_vec();
            while let Some(block) = worklist.pop() {
                if !block_set.insert(block) {
                    continue;
                }
                worklist.extend(
                    func.pred_blocks(block)
                        .into_iter()
                        .filter(|&pred| dom.is_reachable(pred) && !block_set.contains(&pred)),
                );
            }

            let mut blocks: Vec<BlockId> = block_set.iter().copied().collect();
            blocks.sort_by_key(|&b| order.rpo_number(b));

            // Innermost enclosing loop found so far: the smallest one
            // containing this header.
            let parent = loops
                .iter()
                .enumerate()
                .filter(|(_, outer)| outer.contains(header))
                .min_by_key(|(_, outer)| outer.num_blocks())
                .map(|(index, _)| LoopId::from_index(index));

            loops.push(Loop {
                header,
                blocks,
                block_set,
                parent,
                children: Vec::new(),
                depth: 1,
            });
        }

        let mut info = LoopInfo {
            loops,
            top_level: Vec::new(),
            innermost: FxHashMap::default(),
        };
        info.link();

        tracing::debug!(
            function = func.name(),
            loops = info.loops.len(),
            top_level = info.top_level.len(),
            "built loop forest"
        );
        info
    }

    /// Fill in children, depths and innermost-loop membership from the
    /// parent links. Parents always precede their children in `loops`.
    fn link(&mut self) {
        for index in 0..self.loops.len() {
            let id = LoopId::from_index(index);
            match self.loops[index].parent {
                Some(parent) => {
                    self.loops[index].depth = self.loops[parent.index()].depth + 1;
                    self.loops[parent.index()].children.push(id);
                }
                None => self.top_level.push(id),
            }
        }
        for index in 0..self.loops.len() {
            let id = LoopId::from_index(index);
            let depth = self.loops[index].depth;
            for &block in &self.loops[index].blocks {
                let deeper = self
                    .innermost
                    .get(&block)
                    .map_or(true, |current| self.loops[current.index()].depth < depth);
                if deeper {
                    self.innermost.insert(block, id);
                }
            }
        }
    }

    // ── Queries ─────────────────────────────────────────────────

    pub fn num_loops(&self) -> usize {
        self.loops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    /// # Panics
    ///
    /// Panics if `id` does not belong to this forest.
    pub fn get(&self, id: LoopId) -> &Loop {
        &self.loops[id.index()]
    }

    /// All loops, outer loops before the loops they contain.
    pub fn iter(&self) -> impl Iterator<Item = (LoopId, &Loop)> + '_ {
        self.loops
            .iter()
            .enumerate()
            .map(|(index, l)| (LoopId::from_index(index), l))
    }

    /// Innermost loop containing `block`.
    pub fn loop_for(&self, block: BlockId) -> Option<LoopId> {
        self.innermost.get(&block).copied()
    }

    /// Nesting depth of `block`: 0 outside any loop.
    pub fn loop_depth(&self, block: BlockId) -> u32 {
        self.loop_for(block).map_or(0, |id| self.get(id).depth)
    }

    pub fn is_loop_header(&self, block: BlockId) -> bool {
        self.loop_for(block)
            .is_some_and(|id| self.get(id).header == block)
    }

    pub fn top_level_loops(&self) -> &[LoopId] {
        &self.top_level
    }

    /// Every loop, each parent before its children, siblings in discovery
    /// order.
    pub fn loops_in_preorder(&self) -> Vec<LoopId> {
        let mut order = Vec::with_capacity(self.loops.len());
        let mut stack: Vec<LoopId> = self.top_level.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.get(id).children.iter().rev().copied());
        }
        order
    }

    /// Is `inner` equal to or nested inside `outer`?
    pub fn loop_contains(&self, outer: LoopId, inner: LoopId) -> bool {
        let mut current = Some(inner);
        while let Some(id) = current {
            if id == outer {
                return true;
            }
            current = self.get(id).parent;
        }
        false
    }

    /// Blocks inside `id` with an edge to its header.
    pub fn latches(&self, func: &Function, id: LoopId) -> Vec<BlockId> {
        let l = self.get(id);
        func.pred_blocks(l.header)
            .into_iter()
            .filter(|&pred| l.contains(pred))
            .collect()
    }

    /// Blocks inside `id` with at least one successor outside it.
    pub fn exiting_blocks(&self, func: &Function, id: LoopId) -> Vec<BlockId> {
        let l = self.get(id);
        l.blocks
            .iter()
            .copied()
            .filter(|&block| func.successors(block).iter().any(|s| !l.contains(*s)))
            .collect()
    }

    /// Blocks outside `id` reached directly from inside it, deduplicated in
    /// discovery order.
    pub fn exit_blocks(&self, func: &Function, id: LoopId) -> Vec<BlockId> {
        let l = self.get(id);
        let mut exits = Vec::new();
        for &block in &l.blocks {
            for succ in func.successors(block) {
                if !l.contains(succ) && !exits.contains(&succ) {
                    exits.push(succ);
                }
            }
        }
        exits
    }

    /// The block outside `id` that is the header's only outside
    /// predecessor and whose only successor is the header.
    pub fn preheader(&self, func: &Function, id: LoopId) -> Option<BlockId> {
        let l = self.get(id);
        let mut outside = func
            .pred_blocks(l.header)
            .into_iter()
            .filter(|&pred| !l.contains(pred));
        let candidate = outside.next()?;
        if outside.next().is_some() {
            return None;
        }
        (func.single_successor(candidate) == Some(l.header)).then_some(candidate)
    }

    // ── Updates ─────────────────────────────────────────────────

    /// Add `block` to `id` and every loop enclosing it; `id` becomes the
    /// block's innermost loop.
    pub fn add_block_to_loop(&mut self, block: BlockId, id: LoopId) {
        tracing::trace!(%block, loop_id = %id, header = %self.get(id).header, "add block to loop");
        let mut current = Some(id);
        while let Some(l) = current {
            let data = &mut self.loops[l.index()];
            if data.block_set.insert(block) {
                data.blocks.push(block);
            }
            current = data.parent;
        }
        self.innermost.insert(block, id);
    }

    /// Remove `block` from every loop containing it.
    ///
    /// # Panics
    ///
    /// Panics if `block` is a loop header.
    pub fn remove_block(&mut self, block: BlockId) {
        let Some(id) = self.innermost.remove(&block) else {
            return;
        };
        assert!(
            self.get(id).header != block,
            "cannot remove {block}: it heads a loop"
        );
        tracing::trace!(%block, loop_id = %id, "remove block from loops");
        let mut current = Some(id);
        while let Some(l) = current {
            let data = &mut self.loops[l.index()];
            data.block_set.remove(&block);
            data.blocks.retain(|&b| b != block);
            current = data.parent;
        }
    }

    // ── Duplication safety ──────────────────────────────────────

    /// May the instruction or terminator at `point` be copied into a
    /// duplicate of loop `id`'s body?
    ///
    /// Scoped pairs (stack allocation, access, coroutine, opened
    /// existential) must have both halves inside the loop. Throwing and
    /// unwinding terminators and dynamic method dispatch never duplicate.
    pub fn can_duplicate(&self, func: &Function, id: LoopId, point: impl Into<ProgramPoint>) -> bool {
        let l = self.get(id);
        let inst = match point.into() {
            ProgramPoint::Terminator(block) => {
                return !matches!(
                    func.terminator(block),
                    Terminator::Throw { .. } | Terminator::Unwind | Terminator::DynamicMethodBr { .. }
                );
            }
            ProgramPoint::Inst(inst) => inst,
        };

        let defined_inside = |value: ValueId| l.contains(func.defining_block(value));
        let result_confined = |pred: fn(&InstKind) -> bool| {
            func.inst_result(inst).map_or(true, |result| {
                func.users(result).iter().all(|&user| match user {
                    User::Inst(user) if !pred(func.inst(user).kind()) => true,
                    user => l.contains(func.user_block(user)),
                })
            })
        };

        let kind = func.inst(inst).kind();
        if kind.is_allocating_stack() {
            return result_confined(InstKind::is_deallocating_stack);
        }
        if kind.is_deallocating_stack() || kind.is_coroutine_end() {
            return kind.operands().into_iter().all(defined_inside);
        }
        match kind {
            InstKind::BeginAccess { .. } => result_confined(|k| matches!(k, InstKind::EndAccess { .. })),
            InstKind::EndAccess { access } => defined_inside(*access),
            InstKind::BeginApply { .. }
            | InstKind::OpenExistential { .. }
            | InstKind::ForeignMethod { .. } => result_confined(|_| true),
            _ => true,
        }
    }

    // ── Verification ────────────────────────────────────────────

    /// Compare against a forest recomputed from `func` and a fresh `dom`.
    pub fn check(&self, func: &Function, dom: &DominanceInfo) -> Result<(), AnalysisMismatch> {
        let fresh = LoopInfo::build(func, dom);
        if fresh.loops.len() != self.loops.len() {
            return Err(AnalysisMismatch::LoopCount {
                cached: self.loops.len(),
                fresh: fresh.loops.len(),
            });
        }
        let header = |info: &LoopInfo, block: BlockId| info.loop_for(block).map(|id| info.get(id).header);
        for block in func.blocks() {
            let (cached, recomputed) = (header(self, block), header(&fresh, block));
            if cached != recomputed {
                return Err(AnalysisMismatch::LoopMembership {
                    block,
                    cached,
                    fresh: recomputed,
                });
            }
        }
        for (_, l) in fresh.iter() {
            let parent_header = |info: &LoopInfo, parent: Option<LoopId>| parent.map(|p| info.get(p).header);
            let recomputed = parent_header(&fresh, l.parent);
            let cached = self
                .loop_for(l.header)
                .and_then(|id| parent_header(self, self.get(id).parent));
            if cached != recomputed {
                return Err(AnalysisMismatch::LoopParent {
                    header: l.header,
                    cached,
                    fresh: recomputed,
                });
            }
        }
        Ok(())
    }

    /// # Panics
    ///
    /// Panics if the cached forest differs from a fresh one.
    pub fn verify(&self, func: &Function, dom: &DominanceInfo) {
        if let Err(err) = self.check(func, dom) {
            panic!("loop info of `{}` is stale: {err}", func.name());
        }
    }
}

//! Blocks from which no path reaches a function exit.
//!
//! Code in a dead end (an infinite loop, or a path that ends in
//! `unreachable`) never hands control back to the caller, so ownership and
//! lifetime checks may relax their end-of-scope requirements there.

use rustc_hash::FxHashSet;

use mir_ir::{BlockId, Function};

/// Lazily computed dead-end set.
///
/// The first query does a backward fill from every block whose terminator
/// exits the function; later queries hit the cache until
/// [`invalidate`](Self::invalidate) is called.
#[derive(Clone, Debug, Default)]
pub struct DeadEndBlocks {
    /// Blocks that can reach an exit. `None` until first queried.
    reaches_exit: Option<FxHashSet<BlockId>>,
}

impl DeadEndBlocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Is `block` a dead end?
    pub fn is_dead_end(&mut self, func: &Function, block: BlockId) -> bool {
        !self.reachable(func).contains(&block)
    }

    /// All dead-end blocks of `func`, in layout order.
    pub fn dead_end_blocks(&mut self, func: &Function) -> Vec<BlockId> {
        let reachable = self.reachable(func);
        func.blocks().filter(|b| !reachable.contains(b)).collect()
    }

    /// Force the computation now.
    pub fn compute(&mut self, func: &Function) {
        self.reachable(func);
    }

    pub fn is_computed(&self) -> bool {
        self.reaches_exit.is_some()
    }

    /// Drop the cached set; the next query recomputes it.
    pub fn invalidate(&mut self) {
        self.reaches_exit = None;
    }

    fn reachable(&mut self, func: &Function) -> &FxHashSet<BlockId> {
        self.reaches_exit.get_or_insert_with(|| Self::fill(func))
    }

    fn fill(func: &Function) -> FxHashSet<BlockId> {
        let mut reachable = FxHashSet::default();
        let mut worklist: Vec<BlockId> = func
            .blocks()
            .filter(|&b| {
                func.block(b)
                    .terminator()
                    .is_some_and(mir_ir::Terminator::is_function_exiting)
            })
            .collect();
        while let Some(block) = worklist.pop() {
            if !reachable.insert(block) {
                continue;
            }
            worklist.extend(
                func.predecessors(block)
                    .iter()
                    .map(|p| p.block)
                    .filter(|b| !reachable.contains(b)),
            );
        }
        tracing::debug!(
            function = func.name(),
            blocks = func.num_blocks(),
            dead_ends = func.num_blocks() - reachable.len(),
            "computed dead-end blocks"
        );
        reachable
    }
}

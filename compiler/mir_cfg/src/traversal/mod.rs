//! Depth-first block orders.
//!
//! [`PostOrder`] is a lazy iterator driven by an explicit stack; it never
//! recurses, so deeply nested CFGs cannot overflow the native stack.
//! [`ReversePostOrder`] records the full post-order up front and yields it
//! back to front. Both accept an external visited set so callers can bound a
//! walk to a subgraph or continue where an earlier partial walk stopped.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use mir_ir::{BlockId, Function};

/// One DFS frame: a block and the index of its next unexplored successor.
struct Frame {
    block: BlockId,
    succs: SmallVec<[BlockId; 4]>,
    next: usize,
}

impl Frame {
    fn new(func: &Function, block: BlockId) -> Self {
        Frame {
            block,
            succs: func.successors(block),
            next: 0,
        }
    }
}

/// Lazy post-order over the blocks reachable from a start block.
///
/// Successors are explored in edge order. One-shot: construct a new
/// instance to walk again.
pub struct PostOrder<'f> {
    func: &'f Function,
    visited: FxHashSet<BlockId>,
    stack: Vec<Frame>,
}

impl<'f> PostOrder<'f> {
    /// Post-order from the function entry.
    pub fn from_entry(func: &'f Function) -> Self {
        Self::new(func, func.entry())
    }

    pub fn new(func: &'f Function, start: BlockId) -> Self {
        Self::with_visited(func, start, FxHashSet::default())
    }

    /// Post-order from `start`, treating every block already in `visited`
    /// as explored. If `start` itself is in `visited` the walk is empty.
    pub fn with_visited(func: &'f Function, start: BlockId, mut visited: FxHashSet<BlockId>) -> Self {
        let mut stack = Vec::new();
        if visited.insert(start) {
            stack.push(Frame::new(func, start));
        }
        PostOrder {
            func,
            visited,
            stack,
        }
    }

    /// Give back the visited set, including every block discovered so far.
    pub fn into_visited(self) -> FxHashSet<BlockId> {
        self.visited
    }
}

impl Iterator for PostOrder<'_> {
    type Item = BlockId;

    fn next(&mut self) -> Option<BlockId> {
        loop {
            let frame = self.stack.last_mut()?;
            if let Some(&succ) = frame.succs.get(frame.next) {
                frame.next += 1;
                if self.visited.insert(succ) {
                    self.stack.push(Frame::new(self.func, succ));
                }
            } else {
                return self.stack.pop().map(|done| done.block);
            }
        }
    }
}

/// Reverse post-order: the post-order buffered once, then yielded in reverse.
pub struct ReversePostOrder {
    order: std::iter::Rev<std::vec::IntoIter<BlockId>>,
}

impl ReversePostOrder {
    pub fn from_entry(func: &Function) -> Self {
        Self::new(func, func.entry())
    }

    pub fn new(func: &Function, start: BlockId) -> Self {
        Self::with_visited(func, start, FxHashSet::default())
    }

    pub fn with_visited(func: &Function, start: BlockId, visited: FxHashSet<BlockId>) -> Self {
        let post: Vec<BlockId> = PostOrder::with_visited(func, start, visited).collect();
        ReversePostOrder {
            order: post.into_iter().rev(),
        }
    }
}

impl Iterator for ReversePostOrder {
    type Item = BlockId;

    fn next(&mut self) -> Option<BlockId> {
        self.order.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.order.size_hint()
    }
}

impl DoubleEndedIterator for ReversePostOrder {
    fn next_back(&mut self) -> Option<BlockId> {
        self.order.next_back()
    }
}

impl ExactSizeIterator for ReversePostOrder {}

/// Post-order of a whole function, cached with per-block numbering.
///
/// Like every analysis here it is a snapshot: rebuild after CFG edits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostOrderFunctionInfo {
    post_order: Vec<BlockId>,
    numbers: FxHashMap<BlockId, usize>,
}

impl PostOrderFunctionInfo {
    pub fn new(func: &Function) -> Self {
        let post_order: Vec<BlockId> = PostOrder::from_entry(func).collect();
        let numbers = post_order
            .iter()
            .enumerate()
            .map(|(n, &block)| (block, n))
            .collect();
        tracing::trace!(function = func.name(), blocks = post_order.len(), "computed post-order");
        PostOrderFunctionInfo {
            post_order,
            numbers,
        }
    }

    /// Reachable blocks in post-order.
    pub fn post_order(&self) -> &[BlockId] {
        &self.post_order
    }

    /// Reachable blocks in reverse post-order (entry first).
    pub fn reverse_post_order(&self) -> impl DoubleEndedIterator<Item = BlockId> + ExactSizeIterator + '_ {
        self.post_order.iter().rev().copied()
    }

    /// Number of reachable blocks.
    pub fn len(&self) -> usize {
        self.post_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.post_order.is_empty()
    }

    /// Position of `block` in post-order; `None` if unreachable.
    pub fn po_number(&self, block: BlockId) -> Option<usize> {
        self.numbers.get(&block).copied()
    }

    /// Position of `block` in reverse post-order; `None` if unreachable.
    pub fn rpo_number(&self, block: BlockId) -> Option<usize> {
        self.po_number(block).map(|po| self.post_order.len() - 1 - po)
    }
}

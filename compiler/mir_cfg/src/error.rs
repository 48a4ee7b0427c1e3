//! Differences between a cached analysis and a fresh recomputation.
//!
//! Produced by the `check()` methods of the analyses; `verify()` turns them
//! into a fatal internal-consistency error.

use mir_ir::BlockId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisMismatch {
    #[error("immediate dominator of {block} is {cached:?} in the cached tree but {fresh:?} when recomputed")]
    Dominator {
        block: BlockId,
        cached: Option<BlockId>,
        fresh: Option<BlockId>,
    },

    #[error("immediate post-dominator of {block} is {cached:?} in the cached tree but {fresh:?} when recomputed")]
    PostDominator {
        block: BlockId,
        cached: Option<BlockId>,
        fresh: Option<BlockId>,
    },

    #[error("cached loop forest has {cached} loops, recomputed forest has {fresh}")]
    LoopCount { cached: usize, fresh: usize },

    #[error("innermost loop of {block} has header {cached:?} in the cached forest but {fresh:?} when recomputed")]
    LoopMembership {
        block: BlockId,
        cached: Option<BlockId>,
        fresh: Option<BlockId>,
    },

    #[error("loop headed by {header} has parent {cached:?} in the cached forest but {fresh:?} when recomputed")]
    LoopParent {
        header: BlockId,
        cached: Option<BlockId>,
        fresh: Option<BlockId>,
    },
}

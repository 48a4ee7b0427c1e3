//! Typed errors for refusals and structural verification.
//!
//! Invariant violations inside mutation primitives are panics; these types
//! cover the cases a caller is expected to inspect: a merge that was refused,
//! and a verifier report describing exactly which invariant is broken.

use thiserror::Error;

use crate::function::{PredEdge, User};
use crate::ids::{BlockId, InstId, ValueId};

/// Why [`Function::merge_with_successor`](crate::Function::merge_with_successor)
/// refused to merge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("{block} does not end in an unconditional branch")]
    NotUnconditionalBranch { block: BlockId },

    #[error("{block} branches to itself")]
    SelfLoop { block: BlockId },

    #[error("{succ} has {count} predecessor edges, expected exactly one")]
    MultiplePredecessors { succ: BlockId, count: usize },

    #[error("{succ} is the function entry")]
    EntryBlock { succ: BlockId },

    #[error("branch from {block} passes an argument of {succ} back into it")]
    ArgumentCycle { block: BlockId, succ: BlockId },
}

/// A broken structural invariant found by [`verify_function`](crate::verify_function).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("function has no blocks")]
    Empty,

    #[error("{block} has no terminator")]
    MissingTerminator { block: BlockId },

    #[error("entry {entry} has predecessors {preds:?}")]
    EntryHasPredecessors { entry: BlockId, preds: Vec<PredEdge> },

    #[error("edge {edge} of {block} targets erased block {succ}")]
    DeadSuccessor {
        block: BlockId,
        edge: usize,
        succ: BlockId,
    },

    #[error(
        "edge {edge} of {block} passes {found} arguments but {succ} declares {expected}"
    )]
    EdgeArgCount {
        block: BlockId,
        edge: usize,
        succ: BlockId,
        expected: usize,
        found: usize,
    },

    #[error("{terminator} edge {edge} of {block} cannot feed {succ} with {found} arguments")]
    ImplicitArgCount {
        block: BlockId,
        edge: usize,
        succ: BlockId,
        terminator: &'static str,
        found: usize,
    },

    #[error("predecessor index of {block} is {found:?}, terminators imply {expected:?}")]
    PredecessorMismatch {
        block: BlockId,
        expected: Vec<PredEdge>,
        found: Vec<PredEdge>,
    },

    #[error("{inst} is listed in {listed} but records {recorded}")]
    InstBlockMismatch {
        inst: InstId,
        listed: BlockId,
        recorded: BlockId,
    },

    #[error("argument {index} of {block} is {value}, whose definition disagrees")]
    ArgDefMismatch {
        block: BlockId,
        index: usize,
        value: ValueId,
    },

    #[error("{value} used in {block} is not defined")]
    DeadOperand { block: BlockId, value: ValueId },

    #[error("use index of {value} is {found:?}, operands imply {expected:?}")]
    UseIndexMismatch {
        value: ValueId,
        expected: Vec<User>,
        found: Vec<User>,
    },
}

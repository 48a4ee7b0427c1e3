//! Block terminators and the edge model.
//!
//! Each block ends in exactly one [`Terminator`]. A terminator names zero or
//! more successor blocks; edge `i` of a terminator is the `i`-th entry of
//! [`Terminator::successors`]. Every edge delivers values to the target
//! block's arguments in one of two ways:
//!
//! - **Explicit**: the terminator carries the values as operands
//!   (`Br`, `CondBr`). These are the phi inputs of the edge.
//! - **Implicit**: the terminator itself produces the payload on the edge
//!   (the matched enum payload, the call result of `TryApply`, ...). There is
//!   no operand to copy; a block inserted on the edge must synthesize a fresh
//!   argument to receive the payload.
//!
//! In both cases the number of delivered values must equal the target's
//! argument count. That invariant is what every CFG mutation utility exists
//! to preserve.

use smallvec::{smallvec, SmallVec};

use crate::ids::{BlockId, Ty, ValueId};

/// How many values an implicit edge delivers to its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImplicitArgs {
    /// The edge delivers nothing.
    None,
    /// The edge always delivers exactly one payload value.
    One,
    /// The edge delivers a payload only if the target declares an argument
    /// for it (enum cases with and without payloads).
    AtMostOne,
}

impl ImplicitArgs {
    /// Whether a target with `count` arguments is a valid destination.
    pub fn accepts(self, count: usize) -> bool {
        match self {
            ImplicitArgs::None => count == 0,
            ImplicitArgs::One => count == 1,
            ImplicitArgs::AtMostOne => count <= 1,
        }
    }
}

/// The values an edge passes to its target block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeArgs<'a> {
    Explicit(&'a [ValueId]),
    Implicit(ImplicitArgs),
}

/// Block terminator.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Terminator {
    /// Unconditional branch passing `args` to `dest`'s arguments.
    Br { dest: BlockId, args: Vec<ValueId> },

    /// Two-way branch on a boolean. Edge 0 is the true edge.
    CondBr {
        cond: ValueId,
        true_dest: BlockId,
        true_args: Vec<ValueId>,
        false_dest: BlockId,
        false_args: Vec<ValueId>,
    },

    /// Multi-way branch on an integer. Edges are the cases in order, then
    /// the default.
    SwitchValue {
        operand: ValueId,
        cases: Vec<(i64, BlockId)>,
        default: Option<BlockId>,
    },

    /// Multi-way dispatch on an enum tag. Each case edge implicitly passes
    /// the case payload when the destination declares an argument for it.
    SwitchEnum {
        operand: ValueId,
        cases: Vec<(u32, BlockId)>,
        default: Option<BlockId>,
    },

    /// Dynamic cast. Edge 0 (success) receives the cast value.
    CheckedCast {
        operand: ValueId,
        target: Ty,
        success: BlockId,
        failure: BlockId,
    },

    /// Call that may throw. Edge 0 receives the result, edge 1 the error.
    TryApply {
        callee: Box<str>,
        args: Vec<ValueId>,
        normal: BlockId,
        error: BlockId,
    },

    /// Foreign dynamic method lookup. Edge 0 receives the method.
    DynamicMethodBr {
        operand: ValueId,
        member: Box<str>,
        has_method: BlockId,
        no_method: BlockId,
    },

    /// Coroutine yield. Neither edge carries values.
    Yield {
        values: Vec<ValueId>,
        resume: BlockId,
        unwind: BlockId,
    },

    Return { value: ValueId },
    Throw { value: ValueId },
    /// Coroutine unwind.
    Unwind,
    Unreachable,
}

impl Terminator {
    /// Short name used in diagnostics and trace output.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Terminator::Br { .. } => "br",
            Terminator::CondBr { .. } => "cond_br",
            Terminator::SwitchValue { .. } => "switch_value",
            Terminator::SwitchEnum { .. } => "switch_enum",
            Terminator::CheckedCast { .. } => "checked_cast_br",
            Terminator::TryApply { .. } => "try_apply",
            Terminator::DynamicMethodBr { .. } => "dynamic_method_br",
            Terminator::Yield { .. } => "yield",
            Terminator::Return { .. } => "return",
            Terminator::Throw { .. } => "throw",
            Terminator::Unwind => "unwind",
            Terminator::Unreachable => "unreachable",
        }
    }

    /// Successor blocks in edge order. May contain duplicates.
    pub fn successors(&self) -> SmallVec<[BlockId; 4]> {
        match self {
            Terminator::Return { .. }
            | Terminator::Throw { .. }
            | Terminator::Unwind
            | Terminator::Unreachable => SmallVec::new(),
            Terminator::Br { dest, .. } => smallvec![*dest],
            Terminator::CondBr {
                true_dest,
                false_dest,
                ..
            } => smallvec![*true_dest, *false_dest],
            Terminator::SwitchValue { cases, default, .. } => {
                let mut targets: SmallVec<[BlockId; 4]> =
                    cases.iter().map(|&(_, b)| b).collect();
                targets.extend(*default);
                targets
            }
            Terminator::SwitchEnum { cases, default, .. } => {
                let mut targets: SmallVec<[BlockId; 4]> =
                    cases.iter().map(|&(_, b)| b).collect();
                targets.extend(*default);
                targets
            }
            Terminator::CheckedCast {
                success, failure, ..
            } => smallvec![*success, *failure],
            Terminator::TryApply { normal, error, .. } => smallvec![*normal, *error],
            Terminator::DynamicMethodBr {
                has_method,
                no_method,
                ..
            } => smallvec![*has_method, *no_method],
            Terminator::Yield { resume, unwind, .. } => smallvec![*resume, *unwind],
        }
    }

    pub fn num_successors(&self) -> usize {
        match self {
            Terminator::Return { .. }
            | Terminator::Throw { .. }
            | Terminator::Unwind
            | Terminator::Unreachable => 0,
            Terminator::Br { .. } => 1,
            Terminator::SwitchValue { cases, default, .. } => {
                cases.len() + usize::from(default.is_some())
            }
            Terminator::SwitchEnum { cases, default, .. } => {
                cases.len() + usize::from(default.is_some())
            }
            Terminator::CondBr { .. }
            | Terminator::CheckedCast { .. }
            | Terminator::TryApply { .. }
            | Terminator::DynamicMethodBr { .. }
            | Terminator::Yield { .. } => 2,
        }
    }

    /// The destination of `edge`.
    ///
    /// # Panics
    ///
    /// Panics if `edge` is out of range.
    pub fn successor(&self, edge: usize) -> BlockId {
        let succs = self.successors();
        assert!(
            edge < succs.len(),
            "edge {edge} out of range for {} with {} successors",
            self.kind_name(),
            succs.len()
        );
        succs[edge]
    }

    /// Redirect `edge` to `dest`, leaving edge arguments untouched.
    ///
    /// Crate-private: the owning [`Function`](crate::Function) must patch its
    /// predecessor index alongside.
    pub(crate) fn set_successor(&mut self, edge: usize, dest: BlockId) {
        let slot: &mut BlockId = match self {
            Terminator::Br { dest: d, .. } if edge == 0 => d,
            Terminator::CondBr { true_dest, .. } if edge == 0 => true_dest,
            Terminator::CondBr { false_dest, .. } if edge == 1 => false_dest,
            Terminator::SwitchValue { cases, default, .. } => {
                switch_slot(cases, default.as_mut(), edge)
            }
            Terminator::SwitchEnum { cases, default, .. } => {
                switch_slot(cases, default.as_mut(), edge)
            }
            Terminator::CheckedCast { success, .. } if edge == 0 => success,
            Terminator::CheckedCast { failure, .. } if edge == 1 => failure,
            Terminator::TryApply { normal, .. } if edge == 0 => normal,
            Terminator::TryApply { error, .. } if edge == 1 => error,
            Terminator::DynamicMethodBr { has_method, .. } if edge == 0 => has_method,
            Terminator::DynamicMethodBr { no_method, .. } if edge == 1 => no_method,
            Terminator::Yield { resume, .. } if edge == 0 => resume,
            Terminator::Yield { unwind, .. } if edge == 1 => unwind,
            other => panic!("edge {edge} out of range for {}", other.kind_name()),
        };
        *slot = dest;
    }

    /// The values `edge` delivers to its target.
    pub fn edge_args(&self, edge: usize) -> EdgeArgs<'_> {
        match self {
            Terminator::Br { args, .. } if edge == 0 => EdgeArgs::Explicit(args),
            Terminator::CondBr { true_args, .. } if edge == 0 => EdgeArgs::Explicit(true_args),
            Terminator::CondBr { false_args, .. } if edge == 1 => {
                EdgeArgs::Explicit(false_args)
            }
            Terminator::SwitchEnum { cases, .. } if edge < cases.len() => {
                EdgeArgs::Implicit(ImplicitArgs::AtMostOne)
            }
            Terminator::CheckedCast { .. }
            | Terminator::TryApply { .. }
            | Terminator::DynamicMethodBr { .. }
                if edge == 0 =>
            {
                EdgeArgs::Implicit(ImplicitArgs::One)
            }
            Terminator::TryApply { .. } if edge == 1 => EdgeArgs::Implicit(ImplicitArgs::One),
            _ => {
                assert!(
                    edge < self.num_successors(),
                    "edge {edge} out of range for {}",
                    self.kind_name()
                );
                EdgeArgs::Implicit(ImplicitArgs::None)
            }
        }
    }

    /// Mutable access to the explicit argument list of `edge`.
    ///
    /// Returns `None` for implicit edges.
    pub(crate) fn edge_args_mut(&mut self, edge: usize) -> Option<&mut Vec<ValueId>> {
        match self {
            Terminator::Br { args, .. } if edge == 0 => Some(args),
            Terminator::CondBr { true_args, .. } if edge == 0 => Some(true_args),
            Terminator::CondBr { false_args, .. } if edge == 1 => Some(false_args),
            _ => None,
        }
    }

    /// All values read by this terminator, edge arguments included.
    pub fn operands(&self) -> SmallVec<[ValueId; 4]> {
        match self {
            Terminator::Br { args, .. } => args.iter().copied().collect(),
            Terminator::CondBr {
                cond,
                true_args,
                false_args,
                ..
            } => std::iter::once(*cond)
                .chain(true_args.iter().copied())
                .chain(false_args.iter().copied())
                .collect(),
            Terminator::SwitchValue { operand, .. }
            | Terminator::SwitchEnum { operand, .. }
            | Terminator::CheckedCast { operand, .. }
            | Terminator::DynamicMethodBr { operand, .. } => smallvec![*operand],
            Terminator::TryApply { args, .. } => args.iter().copied().collect(),
            Terminator::Yield { values, .. } => values.iter().copied().collect(),
            Terminator::Return { value } | Terminator::Throw { value } => smallvec![*value],
            Terminator::Unwind | Terminator::Unreachable => SmallVec::new(),
        }
    }

    /// Mutable access to every operand slot.
    pub(crate) fn operands_mut(&mut self) -> SmallVec<[&mut ValueId; 4]> {
        match self {
            Terminator::Br { args, .. }
            | Terminator::TryApply { args, .. }
            | Terminator::Yield { values: args, .. } => args.iter_mut().collect(),
            Terminator::CondBr {
                cond,
                true_args,
                false_args,
                ..
            } => std::iter::once(cond)
                .chain(true_args.iter_mut())
                .chain(false_args.iter_mut())
                .collect(),
            Terminator::SwitchValue { operand, .. }
            | Terminator::SwitchEnum { operand, .. }
            | Terminator::CheckedCast { operand, .. }
            | Terminator::DynamicMethodBr { operand, .. } => smallvec![operand],
            Terminator::Return { value } | Terminator::Throw { value } => smallvec![value],
            Terminator::Unwind | Terminator::Unreachable => SmallVec::new(),
        }
    }

    /// Leaves the function (the seeds of dead-end and post-dominance analysis).
    pub fn is_function_exiting(&self) -> bool {
        matches!(
            self,
            Terminator::Return { .. } | Terminator::Throw { .. } | Terminator::Unwind
        )
    }
}

fn switch_slot<'a, T>(
    cases: &'a mut [(T, BlockId)],
    default: Option<&'a mut BlockId>,
    edge: usize,
) -> &'a mut BlockId {
    let num_cases = cases.len();
    if edge < num_cases {
        return &mut cases[edge].1;
    }
    match default {
        Some(d) if edge == num_cases => d,
        _ => panic!("edge {edge} out of range for switch with {num_cases} cases"),
    }
}

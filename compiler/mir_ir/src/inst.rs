//! Non-terminator instructions.
//!
//! Instruction semantics are outside the scope of the CFG core; this module
//! models just enough to reason about operands, results, dead-code cleanup and
//! the scoped-resource pairs that loop duplication must respect.

use smallvec::SmallVec;

use crate::ids::{BlockId, Ty, ValueId};
use crate::value::OwnershipKind;

/// Literal constant.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Literal {
    Int(i64),
    Bool(bool),
    Str(Box<str>),
}

/// Instruction kind.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum InstKind {
    /// `%r = literal <value> : ty`.
    Literal { ty: Ty, value: Literal },

    /// Opaque operation standing in for any arithmetic/memory instruction.
    Builtin {
        name: Box<str>,
        args: Vec<ValueId>,
        result: Option<(Ty, OwnershipKind)>,
        side_effects: bool,
    },

    /// Direct call. The result is owned by the caller.
    Apply {
        callee: Box<str>,
        args: Vec<ValueId>,
        ty: Ty,
    },

    Copy { operand: ValueId, ty: Ty },
    Destroy { operand: ValueId },
    BeginBorrow { operand: ValueId, ty: Ty },
    EndBorrow { operand: ValueId },

    // ── Scoped resources ────────────────────────────────────────
    /// Stack slot; must be released by a matching `DeallocStack`.
    AllocStack { ty: Ty },
    DeallocStack { operand: ValueId },

    /// Exclusive access to `address`; closed by `EndAccess`.
    BeginAccess { address: ValueId },
    EndAccess { access: ValueId },

    /// Coroutine call; the token is closed by `EndApply` or `AbortApply`.
    BeginApply { callee: Box<str>, args: Vec<ValueId> },
    EndApply { token: ValueId },
    AbortApply { token: ValueId },

    /// Opens an existential box, producing a value whose opened type is
    /// scoped to this instruction.
    OpenExistential { operand: ValueId, ty: Ty },

    /// Method lookup through an externally resolved (foreign) dispatch table.
    ForeignMethod {
        operand: ValueId,
        member: Box<str>,
        ty: Ty,
    },
}

impl InstKind {
    /// Type and ownership of the produced value, if the instruction has one.
    pub fn result_type(&self) -> Option<(Ty, OwnershipKind)> {
        match self {
            InstKind::Literal { ty, .. } => Some((*ty, OwnershipKind::None)),
            InstKind::Builtin { result, .. } => *result,
            InstKind::Apply { ty, .. }
            | InstKind::Copy { ty, .. }
            | InstKind::ForeignMethod { ty, .. } => Some((*ty, OwnershipKind::Owned)),
            InstKind::BeginBorrow { ty, .. } | InstKind::OpenExistential { ty, .. } => {
                Some((*ty, OwnershipKind::Guaranteed))
            }
            InstKind::AllocStack { .. } | InstKind::BeginAccess { .. } => {
                Some((Ty::ADDRESS, OwnershipKind::None))
            }
            InstKind::BeginApply { .. } => Some((Ty::TOKEN, OwnershipKind::None)),
            InstKind::Destroy { .. }
            | InstKind::EndBorrow { .. }
            | InstKind::DeallocStack { .. }
            | InstKind::EndAccess { .. }
            | InstKind::EndApply { .. }
            | InstKind::AbortApply { .. } => None,
        }
    }

    /// All values read by this instruction, in operand order.
    pub fn operands(&self) -> SmallVec<[ValueId; 4]> {
        match self {
            InstKind::Literal { .. } | InstKind::AllocStack { .. } => SmallVec::new(),
            InstKind::Builtin { args, .. }
            | InstKind::Apply { args, .. }
            | InstKind::BeginApply { args, .. } => args.iter().copied().collect(),
            InstKind::Copy { operand, .. }
            | InstKind::Destroy { operand }
            | InstKind::BeginBorrow { operand, .. }
            | InstKind::EndBorrow { operand }
            | InstKind::DeallocStack { operand }
            | InstKind::OpenExistential { operand, .. }
            | InstKind::ForeignMethod { operand, .. } => smallvec::smallvec![*operand],
            InstKind::BeginAccess { address } => smallvec::smallvec![*address],
            InstKind::EndAccess { access } => smallvec::smallvec![*access],
            InstKind::EndApply { token } | InstKind::AbortApply { token } => {
                smallvec::smallvec![*token]
            }
        }
    }

    /// Mutable access to every operand slot.
    pub fn operands_mut(&mut self) -> SmallVec<[&mut ValueId; 4]> {
        match self {
            InstKind::Literal { .. } | InstKind::AllocStack { .. } => SmallVec::new(),
            InstKind::Builtin { args, .. }
            | InstKind::Apply { args, .. }
            | InstKind::BeginApply { args, .. } => args.iter_mut().collect(),
            InstKind::Copy { operand, .. }
            | InstKind::Destroy { operand }
            | InstKind::BeginBorrow { operand, .. }
            | InstKind::EndBorrow { operand }
            | InstKind::DeallocStack { operand }
            | InstKind::OpenExistential { operand, .. }
            | InstKind::ForeignMethod { operand, .. } => smallvec::smallvec![operand],
            InstKind::BeginAccess { address } => smallvec::smallvec![address],
            InstKind::EndAccess { access } => smallvec::smallvec![access],
            InstKind::EndApply { token } | InstKind::AbortApply { token } => {
                smallvec::smallvec![token]
            }
        }
    }

    /// Whether the instruction does something beyond producing its result.
    ///
    /// Instructions without side effects can be deleted once their result has
    /// no remaining uses.
    pub fn has_side_effects(&self) -> bool {
        match self {
            InstKind::Literal { .. }
            | InstKind::Copy { .. }
            | InstKind::BeginBorrow { .. }
            | InstKind::OpenExistential { .. }
            | InstKind::ForeignMethod { .. } => false,
            InstKind::Builtin { side_effects, .. } => *side_effects,
            InstKind::Apply { .. }
            | InstKind::Destroy { .. }
            | InstKind::EndBorrow { .. }
            | InstKind::AllocStack { .. }
            | InstKind::DeallocStack { .. }
            | InstKind::BeginAccess { .. }
            | InstKind::EndAccess { .. }
            | InstKind::BeginApply { .. }
            | InstKind::EndApply { .. }
            | InstKind::AbortApply { .. } => true,
        }
    }

    pub fn is_allocating_stack(&self) -> bool {
        matches!(self, InstKind::AllocStack { .. })
    }

    pub fn is_deallocating_stack(&self) -> bool {
        matches!(self, InstKind::DeallocStack { .. })
    }

    /// Instructions that close the scope opened by `BeginApply`.
    pub fn is_coroutine_end(&self) -> bool {
        matches!(self, InstKind::EndApply { .. } | InstKind::AbortApply { .. })
    }
}

/// Per-instruction data in the function's instruction arena.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct InstData {
    pub(crate) kind: InstKind,
    pub(crate) block: BlockId,
    pub(crate) result: Option<ValueId>,
}

impl InstData {
    pub fn kind(&self) -> &InstKind {
        &self.kind
    }

    /// The block currently containing this instruction.
    pub fn block(&self) -> BlockId {
        self.block
    }

    /// The value produced by this instruction, if any.
    pub fn result(&self) -> Option<ValueId> {
        self.result
    }
}

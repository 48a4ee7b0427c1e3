//! Value and ownership model.
//!
//! Every SSA value is tagged with a structural kind ([`ValueDef`]: produced by
//! an instruction, or a block argument) and an [`OwnershipKind`] that
//! constrains how its uses may consume or release it.
//!
//! The structure that defines a value owns it: an instruction owns its
//! result, a block owns its argument list. Users never own the values they
//! reference.

use crate::ids::{BlockId, InstId, Ty};

// ── Ownership ───────────────────────────────────────────────────────

/// Ownership discipline of a value.
///
/// - `Owned`: the holder is responsible for consuming (forwarding or
///   destroying) the value exactly once.
/// - `Guaranteed`: the value is kept alive by an enclosing scope; uses may
///   read but never consume it.
/// - `Unowned`: an unmanaged reference with no lifetime guarantee.
/// - `None`: trivial values (integers, addresses, tokens) with no ownership
///   constraints at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum OwnershipKind {
    None,
    Owned,
    Guaranteed,
    Unowned,
}

impl OwnershipKind {
    /// `None` is compatible with every kind; other kinds only with themselves.
    pub fn is_compatible_with(self, other: OwnershipKind) -> bool {
        self == other || self == OwnershipKind::None || other == OwnershipKind::None
    }

    /// Merge two kinds flowing into the same phi.
    ///
    /// Returns `None` (the Rust `Option`) when the kinds conflict.
    pub fn merge(self, other: OwnershipKind) -> Option<OwnershipKind> {
        match (self, other) {
            (OwnershipKind::None, k) | (k, OwnershipKind::None) => Some(k),
            (a, b) if a == b => Some(a),
            _ => None,
        }
    }
}

// ── Block arguments ─────────────────────────────────────────────────

/// Calling convention of a function-entry argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Convention {
    /// Callee takes ownership of the argument.
    Owned,
    /// Caller guarantees the argument stays alive for the call.
    Guaranteed,
    /// Passed by address; callee may read from it.
    Indirect,
    /// Passed by address; callee may modify it in place.
    InoutAliasable,
}

impl Convention {
    /// Ownership kind an argument with this convention starts with.
    pub fn ownership(self) -> OwnershipKind {
        match self {
            Convention::Owned => OwnershipKind::Owned,
            Convention::Guaranteed => OwnershipKind::Guaranteed,
            Convention::Indirect | Convention::InoutAliasable => OwnershipKind::None,
        }
    }
}

/// Which flavour of block argument a value is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum ArgKind {
    /// Receives a different incoming value from each predecessor edge.
    Phi,
    /// Receives its value at function entry only.
    Function(Convention),
}

// ── Values ──────────────────────────────────────────────────────────

/// Where a value is defined.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueDef {
    /// Result of an instruction.
    Inst(InstId),
    /// Argument `index` of `block`.
    BlockArg {
        block: BlockId,
        index: u32,
        kind: ArgKind,
    },
}

impl ValueDef {
    /// The defining block for block arguments, `None` for instruction results.
    pub fn arg_block(self) -> Option<BlockId> {
        match self {
            ValueDef::BlockArg { block, .. } => Some(block),
            ValueDef::Inst(_) => None,
        }
    }

    pub fn is_phi(self) -> bool {
        matches!(
            self,
            ValueDef::BlockArg {
                kind: ArgKind::Phi,
                ..
            }
        )
    }
}

/// Per-value data stored in the function's value arena.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct ValueData {
    pub ty: Ty,
    /// Only mutable through [`Function::set_ownership_kind`](crate::Function::set_ownership_kind).
    pub(crate) ownership: OwnershipKind,
    pub(crate) def: ValueDef,
}

impl ValueData {
    pub fn ownership(&self) -> OwnershipKind {
        self.ownership
    }

    pub fn def(&self) -> ValueDef {
        self.def
    }
}

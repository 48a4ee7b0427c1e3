//! Mid-level IR data model.
//!
//! This crate provides the structures the CFG layer works on:
//!
//! - **Values and ownership** ([`ValueData`], [`OwnershipKind`], [`ValueDef`]):
//!   every value is an instruction result or a block argument, tagged with
//!   the ownership discipline its uses must follow.
//!
//! - **Basic blocks** ([`BlockData`]): an argument list (phi-like values), an
//!   ordered instruction list, and a terminator.
//!
//! - **Terminators** ([`Terminator`], [`EdgeArgs`]): a closed sum type over
//!   every way control can leave a block, each variant carrying its own
//!   successor and edge-argument shape.
//!
//! - **Functions** ([`Function`]): the arenas owning all of the above, the
//!   predecessor index, and the structural edit primitives (split, merge,
//!   erase).
//!
//! - **Verification** ([`verify_function`]): structural invariant checks.
//!
//! Analyses and CFG mutation utilities live in `mir_cfg`.

mod error;
pub mod function;
mod ids;
pub mod inst;
pub mod terminator;
pub mod value;
mod verify;

#[cfg(test)]
mod test_helpers;

pub use error::{MergeError, VerifyError};
pub use function::{BlockData, Function, PredEdge, ProgramPoint, Use, User};
pub use ids::{BlockId, FunctionId, InstId, Ty, ValueId};
pub use inst::{InstData, InstKind, Literal};
pub use terminator::{EdgeArgs, ImplicitArgs, Terminator};
pub use value::{ArgKind, Convention, OwnershipKind, ValueData, ValueDef};
pub use verify::{assert_valid, verify_function};

//! Control-flow graph layer for the mid-level IR.
//!
//! This crate provides:
//!
//! - **Traversal** ([`PostOrder`], [`ReversePostOrder`], [`PostOrderFunctionInfo`]):
//!   lazy, non-recursive depth-first orders over the block graph.
//!
//! - **Dominance** ([`DominanceInfo`], [`PostDominanceInfo`]): dominator and
//!   post-dominator trees, instruction/value dominance queries, incremental
//!   patching for edge splits, and fresh-vs-cached verification.
//!
//! - **Loops** ([`LoopInfo`]): the natural-loop forest and the
//!   loop-duplication safety predicate.
//!
//! - **Dead ends** ([`DeadEndBlocks`]): blocks that can never reach a
//!   function exit.
//!
//! - **CFG utilities** ([`cfg_utils`]): edge splitting, branch retargeting,
//!   phi-argument erasure and block merging, keeping analyses handed to them
//!   up to date.
//!
//! - **Parallel sweeps** ([`parallel`]): the whole-function utilities run
//!   across a module, one function per rayon task.
//!
//! # Analysis freshness
//!
//! Analyses hold no references into the function. Mutation utilities take
//! `&mut Function` plus optional `&mut` analyses and are the only code paths
//! that patch them; any other structural edit requires the caller to rebuild
//! an analysis before querying it again.

pub mod cfg_utils;
mod dead_end;
mod dom_tree;
mod dominance;
mod error;
mod loops;
pub mod parallel;
mod traversal;

#[cfg(test)]
mod test_helpers;

use std::sync::Once;

pub use dead_end::DeadEndBlocks;
pub use dominance::{DominanceInfo, PostDominanceInfo};
pub use error::AnalysisMismatch;
pub use loops::{Loop, LoopId, LoopInfo};
pub use traversal::{PostOrder, PostOrderFunctionInfo, ReversePostOrder};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Call this once at startup. Safe to call multiple times.
/// Enable with `RUST_LOG=mir_cfg=debug` or `RUST_LOG=mir_cfg=trace,mir_ir=trace`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}

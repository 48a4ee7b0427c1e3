//! Whole-module sweeps run one function per rayon task.
//!
//! Functions share nothing, so each task owns its function and builds any
//! analysis it needs privately.

use rayon::prelude::*;

use mir_ir::{BlockId, Function};

use crate::cfg_utils;
use crate::dead_end::DeadEndBlocks;

/// Split every critical edge of every function. Returns how many functions
/// changed.
pub fn split_all_critical_edges(funcs: &mut [Function]) -> usize {
    let changed = funcs
        .par_iter_mut()
        .map(|func| cfg_utils::split_all_critical_edges(func, None, None))
        .filter(|&changed| changed)
        .count();
    tracing::debug!(
        functions = funcs.len(),
        changed,
        threads = rayon::current_num_threads(),
        "parallel critical-edge split"
    );
    changed
}

/// Merge blocks into their predecessors in every function. Returns how many
/// functions changed.
pub fn merge_basic_blocks(funcs: &mut [Function]) -> usize {
    let changed = funcs
        .par_iter_mut()
        .map(cfg_utils::merge_basic_blocks)
        .filter(|&changed| changed)
        .count();
    tracing::debug!(functions = funcs.len(), changed, "parallel block merge");
    changed
}

/// Dead-end blocks of every function, in input order.
pub fn dead_end_blocks(funcs: &[Function]) -> Vec<Vec<BlockId>> {
    funcs
        .par_iter()
        .map(|func| DeadEndBlocks::new().dead_end_blocks(func))
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use mir_ir::{verify_function, Terminator};

    use crate::test_helpers::{diamond, from_edges};

    use super::*;

    fn module() -> Vec<Function> {
        let (chain, _) = from_edges(&[&[1], &[2], &[]]);
        let (critical, _) = from_edges(&[&[1, 2], &[2], &[]]);
        let (diamond, _) = diamond();
        vec![chain, critical, diamond]
    }

    #[test]
    fn split_counts_changed_functions() {
        crate::init_tracing();
        let mut funcs = module();
        assert_eq!(split_all_critical_edges(&mut funcs), 1);
        assert_eq!(funcs[1].num_blocks(), 4);
        for func in &funcs {
            assert_eq!(verify_function(func), Ok(()));
        }
        assert_eq!(split_all_critical_edges(&mut funcs), 0);
    }

    #[test]
    fn merge_counts_changed_functions() {
        let mut funcs = module();
        assert_eq!(merge_basic_blocks(&mut funcs), 1);
        assert_eq!(funcs[0].num_blocks(), 1);
        assert_eq!(funcs[2].num_blocks(), 4);
        assert_eq!(merge_basic_blocks(&mut funcs), 0);
    }

    #[test]
    fn dead_ends_per_function() {
        let mut funcs = module();
        let (mut spin, b) = from_edges(&[&[1, 2], &[1], &[]]);
        spin.set_terminator(b[2], Terminator::Unreachable);
        funcs.push(spin);

        let dead = dead_end_blocks(&funcs);
        assert_eq!(dead.len(), 4);
        assert!(dead[..3].iter().all(Vec::is_empty));
        // Nothing exits: every block is a dead end.
        assert_eq!(dead[3], b);
    }
}

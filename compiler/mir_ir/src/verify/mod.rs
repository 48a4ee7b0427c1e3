//! Structural IR verification.
//!
//! Checks the invariants every CFG mutation must preserve:
//!
//! - every live block has a terminator whose successors are live;
//! - every edge delivers exactly as many values as its target declares
//!   arguments (explicit operand lists and implicit payload arity alike);
//! - the predecessor index matches the relation derived from terminators;
//! - instruction and argument back links agree with the lists holding them;
//! - every operand refers to a live value;
//! - the use index lists exactly the operand slots reading each value.
//!
//! This is a debugging/testing aid. Production code treats a failure as an
//! internal compiler error via [`assert_valid`].

use rustc_hash::FxHashMap;

use crate::error::VerifyError;
use crate::function::{Function, PredEdge, User};
use crate::ids::{BlockId, ValueId};
use crate::terminator::EdgeArgs;
use crate::value::ValueDef;

/// Verify all structural invariants of `func`.
pub fn verify_function(func: &Function) -> Result<(), VerifyError> {
    if func.num_blocks() == 0 {
        return Err(VerifyError::Empty);
    }

    let mut expected_preds: FxHashMap<BlockId, Vec<PredEdge>> = FxHashMap::default();
    let mut expected_users: FxHashMap<ValueId, Vec<User>> = FxHashMap::default();

    for block in func.blocks() {
        let data = func.block(block);
        let Some(term) = data.terminator() else {
            return Err(VerifyError::MissingTerminator { block });
        };

        for (edge, succ) in term.successors().into_iter().enumerate() {
            if !func.is_live_block(succ) {
                return Err(VerifyError::DeadSuccessor { block, edge, succ });
            }
            expected_preds
                .entry(succ)
                .or_default()
                .push(PredEdge { block, edge });

            let declared = func.block(succ).args().len();
            match term.edge_args(edge) {
                EdgeArgs::Explicit(args) if args.len() != declared => {
                    return Err(VerifyError::EdgeArgCount {
                        block,
                        edge,
                        succ,
                        expected: declared,
                        found: args.len(),
                    });
                }
                EdgeArgs::Implicit(arity) if !arity.accepts(declared) => {
                    return Err(VerifyError::ImplicitArgCount {
                        block,
                        edge,
                        succ,
                        terminator: term.kind_name(),
                        found: declared,
                    });
                }
                EdgeArgs::Explicit(_) | EdgeArgs::Implicit(_) => {}
            }
        }

        for (index, &arg) in data.args().iter().enumerate() {
            let consistent = func.is_live_value(arg)
                && matches!(
                    func.value_def(arg),
                    ValueDef::BlockArg { block: b, index: i, .. }
                        if b == block && i as usize == index
                );
            if !consistent {
                return Err(VerifyError::ArgDefMismatch {
                    block,
                    index,
                    value: arg,
                });
            }
        }

        for &inst in data.insts() {
            let recorded = func.inst(inst).block();
            if recorded != block {
                return Err(VerifyError::InstBlockMismatch {
                    inst,
                    listed: block,
                    recorded,
                });
            }
            for value in func.inst(inst).kind().operands() {
                if !func.is_live_value(value) {
                    return Err(VerifyError::DeadOperand { block, value });
                }
                expected_users.entry(value).or_default().push(User::Inst(inst));
            }
        }
        for value in term.operands() {
            if !func.is_live_value(value) {
                return Err(VerifyError::DeadOperand { block, value });
            }
            expected_users
                .entry(value)
                .or_default()
                .push(User::Terminator(block));
        }
    }

    let entry = func.entry();
    if !func.predecessors(entry).is_empty() {
        return Err(VerifyError::EntryHasPredecessors {
            entry,
            preds: func.predecessors(entry).to_vec(),
        });
    }

    for block in func.blocks() {
        let mut expected = expected_preds.remove(&block).unwrap_or_default();
        let mut found = func.predecessors(block).to_vec();
        expected.sort_unstable();
        found.sort_unstable();
        if expected != found {
            return Err(VerifyError::PredecessorMismatch {
                block,
                expected,
                found,
            });
        }
    }

    for block in func.blocks() {
        let data = func.block(block);
        let results = data.insts().iter().filter_map(|&inst| func.inst_result(inst));
        for value in data.args().iter().copied().chain(results) {
            let mut expected = expected_users.remove(&value).unwrap_or_default();
            let mut found = func.users(value).to_vec();
            expected.sort_unstable();
            found.sort_unstable();
            if expected != found {
                return Err(VerifyError::UseIndexMismatch {
                    value,
                    expected,
                    found,
                });
            }
        }
    }

    Ok(())
}

/// Panic with the verifier's diagnostic if `func` is malformed.
///
/// # Panics
///
/// Panics if [`verify_function`] reports an error.
pub fn assert_valid(func: &Function) {
    if let Err(err) = verify_function(func) {
        panic!("IR verification failed for `{}`: {err}", func.name());
    }
}

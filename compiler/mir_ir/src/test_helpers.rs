//! Shared test utilities for IR tests.
//!
//! Only compiled in test builds.

use crate::function::Function;
use crate::ids::{BlockId, Ty, ValueId};
use crate::inst::{InstKind, Literal};
use crate::terminator::Terminator;
use crate::value::OwnershipKind;

/// Append an integer literal to `block`, returning its value.
pub(crate) fn int(func: &mut Function, block: BlockId, n: i64) -> ValueId {
    let inst = func.append_inst(
        block,
        InstKind::Literal {
            ty: Ty::INT,
            value: Literal::Int(n),
        },
    );
    func.inst_result(inst)
        .unwrap_or_else(|| panic!("literal has a result"))
}

/// Append a boolean literal to `block`, returning its value.
pub(crate) fn boolean(func: &mut Function, block: BlockId, b: bool) -> ValueId {
    let inst = func.append_inst(
        block,
        InstKind::Literal {
            ty: Ty::BOOL,
            value: Literal::Bool(b),
        },
    );
    func.inst_result(inst)
        .unwrap_or_else(|| panic!("literal has a result"))
}

pub(crate) fn br(dest: BlockId, args: Vec<ValueId>) -> Terminator {
    Terminator::Br { dest, args }
}

pub(crate) fn ret(value: ValueId) -> Terminator {
    Terminator::Return { value }
}

/// Diamond `entry → {left, right} → join`, `join` taking one `INT` phi fed
/// `1` from the left and `2` from the right.
///
/// Returns `(func, [entry, left, right, join])`.
pub(crate) fn diamond() -> (Function, [BlockId; 4]) {
    let mut func = Function::new("diamond");
    let entry = func.create_block();
    let left = func.create_block();
    let right = func.create_block();
    let join = func.create_block();

    let cond = boolean(&mut func, entry, true);
    func.set_terminator(
        entry,
        Terminator::CondBr {
            cond,
            true_dest: left,
            true_args: vec![],
            false_dest: right,
            false_args: vec![],
        },
    );
    let one = int(&mut func, left, 1);
    func.set_terminator(left, br(join, vec![one]));
    let two = int(&mut func, right, 2);
    func.set_terminator(right, br(join, vec![two]));
    let phi = func.add_phi_arg(join, Ty::INT, OwnershipKind::None);
    func.set_terminator(join, ret(phi));

    (func, [entry, left, right, join])
}

use pretty_assertions::assert_eq;

use mir_ir::{
    verify_function, Convention, Function, InstKind, OwnershipKind, Terminator, Ty, Use, User,
};

use crate::test_helpers::{
    boolean, br, cond_br, diamond, from_edges, int, nested_loops, ret, string, while_loop,
};

use super::*;

fn analyses(func: &Function) -> (DominanceInfo, LoopInfo) {
    let dom = DominanceInfo::build(func);
    let loops = LoopInfo::build(func, &dom);
    (dom, loops)
}

fn assert_fresh(func: &Function, dom: &DominanceInfo, loops: &LoopInfo) {
    assert_eq!(verify_function(func), Ok(()));
    assert_eq!(dom.check(func), Ok(()));
    assert_eq!(loops.check(func, dom), Ok(()));
}

/// `entry → {side, join}`, `side → join`: the edge `entry → join` is
/// critical.
fn critical() -> (Function, [BlockId; 3]) {
    let (func, b) = from_edges(&[&[1, 2], &[2], &[]]);
    (func, [b[0], b[1], b[2]])
}

// ── Retargeting ─────────────────────────────────────────────────────

#[test]
fn change_branch_target_drops_or_keeps_args() {
    let (mut func, [_entry, left, right, join]) = diamond();
    let other = func.create_block();
    let x = func.add_phi_arg(other, Ty::INT, OwnershipKind::None);
    func.set_terminator(other, ret(x));

    change_branch_target(&mut func, left, 0, other, true);
    assert_eq!(func.successors(left).as_slice(), &[other]);
    assert!(matches!(func.edge_args(left, 0), EdgeArgs::Explicit([_])));
    assert_eq!(verify_function(&func), Ok(()));

    change_branch_target(&mut func, right, 0, other, false);
    assert_eq!(func.edge_args(right, 0), EdgeArgs::Explicit(&[]));
    assert!(func.predecessors(join).is_empty());
    assert_eq!(func.predecessors(other).len(), 2);
}

#[test]
fn replace_branch_target_rewrites_every_matching_edge() {
    let mut func = Function::new("f");
    let entry = func.create_block();
    let a = func.create_block();
    let b = func.create_block();
    cond_br(&mut func, entry, a, a);
    let zero = int(&mut func, a, 0);
    func.set_terminator(a, ret(zero));
    let one = int(&mut func, b, 1);
    func.set_terminator(b, ret(one));

    replace_branch_target(&mut func, entry, a, b, true);
    assert_eq!(func.successors(entry).as_slice(), &[b, b]);
    assert!(func.predecessors(a).is_empty());
    assert_eq!(func.predecessors(b).len(), 2);
}

// ── Edge splitting ──────────────────────────────────────────────────

#[test]
fn split_diamond_edge_forwards_both_phi_inputs() {
    let mut func = Function::new("diamond2");
    let entry = func.create_block();
    let left = func.create_block();
    let right = func.create_block();
    let join = func.create_block();
    cond_br(&mut func, entry, left, right);
    let one = int(&mut func, left, 1);
    let x = string(&mut func, left, "x");
    func.set_terminator(left, br(join, vec![one, x]));
    let two = int(&mut func, right, 2);
    let y = string(&mut func, right, "y");
    func.set_terminator(right, br(join, vec![two, y]));
    let n = func.add_phi_arg(join, Ty::INT, OwnershipKind::None);
    func.add_phi_arg(join, Ty::STR, OwnershipKind::Owned);
    func.set_terminator(join, ret(n));

    let edge_block = split_edge(&mut func, left, 0, None, None);

    assert_eq!(func.num_blocks(), 5);
    assert_eq!(func.successors(left).as_slice(), &[edge_block]);
    assert_eq!(func.edge_args(left, 0), EdgeArgs::Explicit(&[]));
    assert_eq!(func.terminator(edge_block), &br(join, vec![one, x]));
    assert!(func.block(edge_block).args().is_empty());
    assert_eq!(func.block(join).args().len(), 2);
    assert_eq!(func.pred_blocks(join).as_slice(), &[right, edge_block]);
    assert_eq!(
        func.blocks().collect::<Vec<_>>(),
        vec![entry, left, edge_block, right, join]
    );
    assert_eq!(verify_function(&func), Ok(()));
}

#[test]
fn split_implicit_edge_synthesizes_a_payload_argument() {
    let mut func = Function::new("try");
    let entry = func.create_block();
    let normal = func.create_block();
    let error = func.create_block();
    func.set_terminator(
        entry,
        Terminator::TryApply {
            callee: "may_throw".into(),
            args: vec![],
            normal,
            error,
        },
    );
    let result = func.add_phi_arg(normal, Ty::STR, OwnershipKind::Owned);
    func.set_terminator(normal, ret(result));
    let err = func.add_phi_arg(error, Ty::ERROR, OwnershipKind::Owned);
    func.set_terminator(error, Terminator::Throw { value: err });

    let edge_block = split_edge(&mut func, entry, 0, None, None);

    let [payload] = func.block(edge_block).args() else {
        panic!("edge block receives the payload");
    };
    let payload = *payload;
    assert_eq!(func.value_ty(payload), Ty::STR);
    assert_eq!(func.ownership_kind(payload), OwnershipKind::Owned);
    assert!(func.value_def(payload).is_phi());
    assert_eq!(func.terminator(edge_block), &br(normal, vec![payload]));
    assert_eq!(func.successors(entry).as_slice(), &[edge_block, error]);
    assert_eq!(verify_function(&func), Ok(()));
}

#[test]
fn split_enum_case_without_payload() {
    let mut func = Function::new("switch");
    let entry = func.create_block();
    let some = func.create_block();
    let none = func.create_block();
    let scrutinee = func.add_function_arg(entry, Ty::new(30), Convention::Guaranteed);
    func.set_terminator(
        entry,
        Terminator::SwitchEnum {
            operand: scrutinee,
            cases: vec![(0, some), (1, none)],
            default: None,
        },
    );
    let inner = func.add_phi_arg(some, Ty::INT, OwnershipKind::Guaranteed);
    func.set_terminator(some, ret(inner));
    let zero = int(&mut func, none, 0);
    func.set_terminator(none, ret(zero));

    let to_none = split_edge(&mut func, entry, 1, None, None);
    assert!(func.block(to_none).args().is_empty());
    assert_eq!(func.terminator(to_none), &br(none, vec![]));

    let to_some = split_edge(&mut func, entry, 0, None, None);
    assert_eq!(func.block(to_some).args().len(), 1);
    assert_eq!(verify_function(&func), Ok(()));
}

#[test]
fn split_edge_patches_dominators() {
    let (mut func, [entry, side, join]) = critical();
    let (mut dom, mut loops) = analyses(&func);
    let edge_block = split_edge(&mut func, entry, 1, Some(&mut dom), Some(&mut loops));

    assert_eq!(dom.idom(edge_block), Some(entry));
    assert_eq!(dom.idom(join), Some(entry));
    assert_fresh(&func, &dom, &loops);

    // The only edge into `side`: the new block takes over as idom.
    let before_side = split_edge(&mut func, entry, 0, Some(&mut dom), Some(&mut loops));
    assert_eq!(dom.idom(side), Some(before_side));
    assert_fresh(&func, &dom, &loops);
}

#[test]
fn split_edges_in_nested_loops_keep_analyses_fresh() {
    let (mut func, [entry, outer, inner, inner_body, outer_latch, exit]) = nested_loops();
    let (mut dom, mut loops) = analyses(&func);
    let outer_id = loops.loop_for(outer).unwrap_or_else(|| panic!("outer loop"));
    let inner_id = loops.loop_for(inner).unwrap_or_else(|| panic!("inner loop"));

    // Back edge of the outer loop: stays in the outer loop.
    let back = split_edge(&mut func, outer_latch, 0, Some(&mut dom), Some(&mut loops));
    assert_eq!(loops.loop_for(back), Some(outer_id));
    assert_fresh(&func, &dom, &loops);

    // Inner loop exit into the outer loop.
    let inner_exit = split_edge(&mut func, inner, 1, Some(&mut dom), Some(&mut loops));
    assert_eq!(loops.loop_for(inner_exit), Some(outer_id));
    assert_fresh(&func, &dom, &loops);

    // Outer loop entering the inner loop.
    let inner_entry = split_edge(&mut func, outer, 0, Some(&mut dom), Some(&mut loops));
    assert_eq!(loops.loop_for(inner_entry), Some(outer_id));
    assert_eq!(dom.idom(inner), Some(inner_entry));
    assert_fresh(&func, &dom, &loops);

    // Inner back edge.
    let inner_back = split_edge(&mut func, inner_body, 0, Some(&mut dom), Some(&mut loops));
    assert_eq!(loops.loop_for(inner_back), Some(inner_id));
    assert_fresh(&func, &dom, &loops);

    // Leaving the outer loop, and entering it from the entry.
    let leave = split_edge(&mut func, outer, 1, Some(&mut dom), Some(&mut loops));
    assert_eq!(loops.loop_for(leave), None);
    let enter = split_edge(&mut func, entry, 0, Some(&mut dom), Some(&mut loops));
    assert_eq!(loops.loop_for(enter), None);
    assert_eq!(dom.idom(outer), Some(enter));
    assert_eq!(dom.idom(exit), Some(leave));
    assert_fresh(&func, &dom, &loops);
}

#[test]
fn split_edge_into_sibling_loop_lands_in_enclosing_loop() {
    // Outer loop 1..=6 holds loop 2 (with inner self-loop 3) and self-loop 5;
    // block 3 jumps straight into the header of loop 5.
    let (mut func, b) = from_edges(&[&[1], &[2, 7], &[3, 6], &[3, 4, 5], &[2], &[5, 6], &[1], &[]]);
    let (mut dom, mut loops) = analyses(&func);
    let outer = loops.loop_for(b[6]);
    assert_eq!(loops.loop_for(b[5]).and_then(|id| loops.get(id).parent()), outer);

    let edge_block = split_edge(&mut func, b[3], 2, Some(&mut dom), Some(&mut loops));
    assert_eq!(loops.loop_for(edge_block), outer);
    assert_eq!(dom.idom(b[5]), Some(edge_block));
    assert_fresh(&func, &dom, &loops);
}

#[test]
fn split_self_loop_back_edge() {
    let (mut func, b) = from_edges(&[&[1], &[1, 2], &[]]);
    let (mut dom, mut loops) = analyses(&func);
    let back = split_edge(&mut func, b[1], 0, Some(&mut dom), Some(&mut loops));
    assert!(loops.loop_for(back).is_some());
    assert_eq!(loops.loop_for(back), loops.loop_for(b[1]));
    assert_eq!(dom.idom(b[1]), Some(b[0]));
    assert_fresh(&func, &dom, &loops);
}

#[test]
fn critical_edges() {
    let (func, [entry, side, _join]) = critical();
    assert!(!is_critical_edge(&func, entry, 0));
    assert!(is_critical_edge(&func, entry, 1));
    // Unconditional branches are never critical.
    assert!(!is_critical_edge(&func, side, 0));
}

#[test]
fn splitting_a_non_critical_edge_changes_nothing() {
    let (mut func, [entry, side, _join]) = critical();
    let before = func.clone();
    assert_eq!(split_critical_edge(&mut func, entry, 0, None, None), None);
    assert_eq!(split_critical_edge(&mut func, side, 0, None, None), None);
    assert_eq!(func, before);
}

#[test]
fn split_if_critical_edge_finds_the_edge() {
    let (mut func, [entry, side, join]) = critical();
    assert_eq!(split_if_critical_edge(&mut func, entry, side, None, None), None);
    let Some(edge_block) = split_if_critical_edge(&mut func, entry, join, None, None) else {
        panic!("entry → join is critical");
    };
    assert_eq!(func.successors(entry).as_slice(), &[side, edge_block]);
    assert_eq!(split_if_critical_edge(&mut func, entry, join, None, None), None);
}

#[test]
fn split_edges_from_to_splits_parallel_edges() {
    let mut func = Function::new("f");
    let entry = func.create_block();
    let target = func.create_block();
    let a = int(&mut func, entry, 1);
    let b = int(&mut func, entry, 2);
    let cond = boolean(&mut func, entry, false);
    func.set_terminator(
        entry,
        Terminator::CondBr {
            cond,
            true_dest: target,
            true_args: vec![a],
            false_dest: target,
            false_args: vec![b],
        },
    );
    let phi = func.add_phi_arg(target, Ty::INT, OwnershipKind::None);
    func.set_terminator(target, ret(phi));

    let (mut dom, mut loops) = analyses(&func);
    let new_blocks = split_edges_from_to(&mut func, entry, target, Some(&mut dom), Some(&mut loops));
    assert_eq!(new_blocks.len(), 2);
    assert_eq!(func.terminator(new_blocks[0]), &br(target, vec![a]));
    assert_eq!(func.terminator(new_blocks[1]), &br(target, vec![b]));
    assert_eq!(func.pred_blocks(target).as_slice(), new_blocks.as_slice());
    assert_fresh(&func, &dom, &loops);
}

#[test]
fn split_all_critical_edges_is_idempotent() {
    // entry → {a, b, c}; a → {b, c}; b → c
    let (mut func, blocks) = from_edges(&[&[1, 2, 3], &[2, 3], &[3], &[]]);
    let (mut dom, mut loops) = analyses(&func);

    assert!(split_all_critical_edges(&mut func, Some(&mut dom), Some(&mut loops)));
    for block in func.blocks() {
        for edge in 0..func.successors(block).len() {
            assert!(!is_critical_edge(&func, block, edge));
        }
    }
    assert_fresh(&func, &dom, &loops);
    // entry → b, entry → c, a → b, a → c
    assert_eq!(func.num_blocks(), blocks.len() + 4);

    let snapshot = func.clone();
    assert!(!split_all_critical_edges(&mut func, Some(&mut dom), Some(&mut loops)));
    assert_eq!(func, snapshot);
}

// ── Phi erasure ─────────────────────────────────────────────────────

#[test]
fn erase_phi_argument_drops_edge_operands() {
    let (mut func, [_entry, left, right, join]) = diamond();
    let one = func.block(left).insts()[0];
    let zero = int(&mut func, join, 0);
    func.set_terminator(join, ret(zero));

    erase_phi_argument(&mut func, join, 0, false);
    assert!(func.block(join).args().is_empty());
    assert_eq!(func.edge_args(left, 0), EdgeArgs::Explicit(&[]));
    assert_eq!(func.edge_args(right, 0), EdgeArgs::Explicit(&[]));
    // Without cleanup the literal stays.
    assert!(func.is_live_inst(one));
    assert_eq!(verify_function(&func), Ok(()));
}

#[test]
fn erase_phi_argument_cleans_up_dead_operands() {
    let (mut func, [_entry, left, right, join]) = diamond();
    let one = func.block(left).insts()[0];
    let two = func.block(right).insts()[0];
    let zero = int(&mut func, join, 0);
    func.set_terminator(join, ret(zero));

    erase_phi_argument(&mut func, join, 0, true);
    assert!(!func.is_live_inst(one));
    assert!(!func.is_live_inst(two));
    assert_eq!(verify_function(&func), Ok(()));
}

#[test]
fn erase_phi_argument_handles_two_edges_from_one_predecessor() {
    let mut func = Function::new("f");
    let entry = func.create_block();
    let target = func.create_block();
    let a = int(&mut func, entry, 1);
    let b = int(&mut func, entry, 2);
    let cond = boolean(&mut func, entry, true);
    func.set_terminator(
        entry,
        Terminator::CondBr {
            cond,
            true_dest: target,
            true_args: vec![a, a],
            false_dest: target,
            false_args: vec![b, a],
        },
    );
    let first = func.add_phi_arg(target, Ty::INT, OwnershipKind::None);
    func.add_phi_arg(target, Ty::INT, OwnershipKind::None);
    func.set_terminator(target, ret(first));

    erase_phi_argument(&mut func, target, 1, true);
    assert_eq!(func.edge_args(entry, 0), EdgeArgs::Explicit(&[a]));
    assert_eq!(func.edge_args(entry, 1), EdgeArgs::Explicit(&[b]));
    // `a` still feeds the first phi.
    assert!(func.is_live_value(a));
    assert_eq!(verify_function(&func), Ok(()));
}

#[test]
fn cleanup_follows_phi_chains() {
    // entry → mid(p) → join(q); join returns a literal.
    let mut func = Function::new("chain");
    let entry = func.create_block();
    let mid = func.create_block();
    let join = func.create_block();
    let seed = int(&mut func, entry, 7);
    func.set_terminator(entry, br(mid, vec![seed]));
    let p = func.add_phi_arg(mid, Ty::INT, OwnershipKind::None);
    func.set_terminator(mid, br(join, vec![p]));
    func.add_phi_arg(join, Ty::INT, OwnershipKind::None);
    let zero = int(&mut func, join, 0);
    func.set_terminator(join, ret(zero));

    erase_phi_argument(&mut func, join, 0, true);
    assert!(!func.is_live_value(p));
    assert!(!func.is_live_value(seed));
    assert!(func.block(mid).args().is_empty());
    assert_eq!(func.terminator(entry), &br(mid, vec![]));
    assert_eq!(verify_function(&func), Ok(()));
}

#[test]
#[should_panic(expected = "is not a phi")]
fn erasing_a_function_argument_panics() {
    let mut func = Function::new("f");
    let entry = func.create_block();
    func.add_function_arg(entry, Ty::INT, Convention::Owned);
    let zero = int(&mut func, entry, 0);
    func.set_terminator(entry, ret(zero));
    erase_phi_argument(&mut func, entry, 0, false);
}

#[test]
#[should_panic(expected = "implicitly")]
fn erasing_an_implicitly_fed_phi_panics() {
    let mut func = Function::new("f");
    let entry = func.create_block();
    let normal = func.create_block();
    let error = func.create_block();
    func.set_terminator(
        entry,
        Terminator::TryApply {
            callee: "g".into(),
            args: vec![],
            normal,
            error,
        },
    );
    func.add_phi_arg(normal, Ty::INT, OwnershipKind::Owned);
    let zero = int(&mut func, normal, 0);
    func.set_terminator(normal, ret(zero));
    let err = func.add_phi_arg(error, Ty::ERROR, OwnershipKind::Owned);
    func.set_terminator(error, Terminator::Throw { value: err });

    erase_phi_argument(&mut func, normal, 0, false);
}

// ── Merging ─────────────────────────────────────────────────────────

#[test]
fn merge_with_successor_patches_analyses() {
    let (mut func, [_entry, header, body, _exit]) = while_loop();
    let tail = func.split_block(body, 0);
    let (mut dom, mut loops) = analyses(&func);
    assert_eq!(loops.loop_for(tail), loops.loop_for(header));

    assert!(merge_basic_block_with_successor(&mut func, body, Some(&mut dom), Some(&mut loops)));
    assert!(!func.is_live_block(tail));
    assert_eq!(loops.loop_for(tail), None);
    assert_fresh(&func, &dom, &loops);

    // Conditional branch: refused.
    assert!(!merge_basic_block_with_successor(&mut func, header, Some(&mut dom), Some(&mut loops)));
}

#[test]
fn merge_basic_blocks_collapses_chains() {
    let (mut func, blocks) = from_edges(&[&[1], &[2], &[3], &[]]);
    assert!(merge_basic_blocks(&mut func));
    assert_eq!(func.blocks().collect::<Vec<_>>(), vec![blocks[0]]);
    assert!(matches!(func.terminator(blocks[0]), Terminator::Return { .. }));
    assert_eq!(verify_function(&func), Ok(()));
    assert!(!merge_basic_blocks(&mut func));
}

#[test]
fn merge_basic_blocks_collapses_a_long_phi_chain() {
    const LEN: usize = 2000;
    let mut func = Function::new("chain");
    let entry = func.create_block();
    let mut carried = int(&mut func, entry, 0);
    let mut block = entry;
    for _ in 1..LEN {
        let next = func.create_block();
        let phi = func.add_phi_arg(next, Ty::INT, OwnershipKind::None);
        func.set_terminator(block, br(next, vec![carried]));
        let inc = func.append_inst(
            next,
            InstKind::Builtin {
                name: "inc".into(),
                args: vec![phi],
                result: Some((Ty::INT, OwnershipKind::None)),
                side_effects: false,
            },
        );
        carried = func.inst_result(inc).unwrap_or_else(|| panic!("inc has a result"));
        block = next;
    }
    func.set_terminator(block, ret(carried));

    assert!(merge_basic_blocks(&mut func));
    assert_eq!(func.num_blocks(), 1);
    assert_eq!(verify_function(&func), Ok(()));

    // Every increment now reads the value computed just before it.
    let insts = func.block(entry).insts();
    assert_eq!(insts.len(), LEN);
    for pair in insts.windows(2) {
        let prev = func.inst_result(pair[0]).unwrap_or_else(|| panic!("chain values"));
        assert_eq!(
            func.uses(prev),
            vec![Use {
                user: User::Inst(pair[1]),
                operand: 0
            }]
        );
    }
    assert_eq!(func.users(carried), &[User::Terminator(entry)]);
}

#[test]
fn merge_basic_blocks_leaves_joins_alone() {
    let (mut func, [entry, left, right, join]) = diamond();
    assert!(!merge_basic_blocks(&mut func));
    assert_eq!(func.blocks().collect::<Vec<_>>(), vec![entry, left, right, join]);
}

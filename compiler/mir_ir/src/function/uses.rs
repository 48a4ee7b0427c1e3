//! Def-use index.
//!
//! Every value owns a list with one entry per operand slot that reads it, so
//! a user reading a value twice is listed twice. [`Function`] patches the
//! index wherever an operand is written (instruction insertion and erasure,
//! terminator installation, edge argument edits, use replacement), and the
//! queries below cost O(uses of the value) rather than a function scan.

use std::hash::{Hash, Hasher};

use smallvec::SmallVec;

use crate::ids::{BlockId, InstId, ValueId};

use super::{BlockData, Function};

/// Something that reads values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum User {
    Inst(InstId),
    Terminator(BlockId),
}

/// One operand slot reading a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Use {
    pub user: User,
    /// Operand position within the user.
    pub operand: usize,
}

type UserList = SmallVec<[User; 2]>;

/// Users per value, indexed like the value arena (erased values keep their
/// slot).
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub(crate) struct UseIndex {
    users: Vec<UserList>,
}

impl UseIndex {
    /// Open the (empty) list of a freshly allocated value.
    pub(crate) fn push_value(&mut self) {
        self.users.push(UserList::new());
    }

    pub(crate) fn users_of(&self, value: ValueId) -> &[User] {
        self.users.get(value.index()).map_or(&[], |list| list.as_slice())
    }

    /// Record `user` once for every operand in `operands`.
    pub(crate) fn link(&mut self, user: User, operands: impl IntoIterator<Item = ValueId>) {
        for value in operands {
            if let Some(list) = self.users.get_mut(value.index()) {
                list.push(user);
            }
        }
    }

    /// Drop one entry of `user` for every operand in `operands`.
    pub(crate) fn unlink(&mut self, user: User, operands: impl IntoIterator<Item = ValueId>) {
        for value in operands {
            let Some(list) = self.users.get_mut(value.index()) else {
                continue;
            };
            if let Some(pos) = list.iter().position(|&u| u == user) {
                list.swap_remove(pos);
            }
        }
    }

    fn take(&mut self, value: ValueId) -> UserList {
        self.users
            .get_mut(value.index())
            .map(std::mem::take)
            .unwrap_or_default()
    }
}

fn sorted(list: &UserList) -> UserList {
    let mut list = list.clone();
    list.sort_unstable();
    list
}

/// Lists compare as multisets: edit history may reorder them.
impl PartialEq for UseIndex {
    fn eq(&self, other: &Self) -> bool {
        self.users.len() == other.users.len()
            && self
                .users
                .iter()
                .zip(&other.users)
                .all(|(a, b)| a.len() == b.len() && sorted(a) == sorted(b))
    }
}

impl Eq for UseIndex {}

impl Hash for UseIndex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.users.len().hash(state);
        for list in &self.users {
            list.len().hash(state);
        }
    }
}

/// Overwrite every slot holding `old` with `new`, returning how many changed.
fn rewrite(slots: SmallVec<[&mut ValueId; 4]>, old: ValueId, new: ValueId) -> usize {
    let mut count = 0;
    for slot in slots {
        if *slot == old {
            *slot = new;
            count += 1;
        }
    }
    count
}

impl Function {
    /// Every operand slot reading `value`, ordered by user: instructions by
    /// ID, then terminators by block.
    pub fn uses(&self, value: ValueId) -> Vec<Use> {
        let mut users: UserList = self.use_index.users_of(value).iter().copied().collect();
        users.sort_unstable();
        users.dedup();

        let mut uses = Vec::new();
        for user in users {
            let operands = match user {
                User::Inst(inst) => self.inst(inst).kind.operands(),
                User::Terminator(block) => self.terminator(block).operands(),
            };
            uses.extend(
                operands
                    .into_iter()
                    .enumerate()
                    .filter(|&(_, v)| v == value)
                    .map(|(operand, _)| Use { user, operand }),
            );
        }
        uses
    }

    pub fn has_uses(&self, value: ValueId) -> bool {
        !self.use_index.users_of(value).is_empty()
    }

    /// The users reading `value`, one entry per operand slot, unordered.
    pub fn users(&self, value: ValueId) -> &[User] {
        self.use_index.users_of(value)
    }

    /// The block containing a user.
    pub fn user_block(&self, user: User) -> BlockId {
        match user {
            User::Inst(inst) => self.inst(inst).block,
            User::Terminator(block) => block,
        }
    }

    /// Rewrite every use of `old` to read `new` instead.
    pub fn replace_all_uses(&mut self, old: ValueId, new: ValueId) {
        if old == new {
            return;
        }
        let mut users = self.use_index.take(old);
        users.sort_unstable();
        users.dedup();

        for user in users {
            let count = match user {
                User::Inst(inst) => match self.insts.get_mut(inst.index()) {
                    Some(Some(data)) => rewrite(data.kind.operands_mut(), old, new),
                    _ => 0,
                },
                User::Terminator(block) => match self.blocks.get_mut(block.index()) {
                    Some(Some(BlockData {
                        terminator: Some(term),
                        ..
                    })) => rewrite(term.operands_mut(), old, new),
                    _ => 0,
                },
            };
            self.use_index.link(user, std::iter::repeat(new).take(count));
        }
    }
}

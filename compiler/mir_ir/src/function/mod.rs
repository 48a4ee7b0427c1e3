//! Function bodies: the arenas that own blocks, instructions and values.
//!
//! A [`Function`] owns three tombstoned arenas (blocks, instructions, values)
//! plus a `layout` vector giving block order (entry first). Blocks own their
//! instruction list and argument list; instructions own their result value.
//!
//! # Predecessor index
//!
//! Predecessors are not stored independently by callers: each block carries
//! a list of [`PredEdge`]s, `(predecessor block, edge index)`, that mirrors
//! the terminators naming it as a successor. Every terminator edit goes
//! through [`Function::set_terminator`] or [`Function::set_successor`], which
//! patch the index in place, so the index can never drift from the
//! terminators. Edge argument lists are edited through
//! [`Function::edge_args_mut`]; they do not affect the relation.
//!
//! # Use index
//!
//! The same entry points keep a def-use index (see the `uses` submodule)
//! patched, so use queries and replacement never scan the function.

mod edit;
mod uses;

use smallvec::SmallVec;

use crate::ids::{BlockId, FunctionId, Identity, InstId, Ty, ValueId};
use crate::inst::{InstData, InstKind};
use crate::terminator::{EdgeArgs, Terminator};
use crate::value::{ArgKind, Convention, OwnershipKind, ValueData, ValueDef};

use self::uses::UseIndex;
pub use self::uses::{Use, User};

// ── Edges and program points ────────────────────────────────────────

/// One incoming edge: edge `edge` of `block`'s terminator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct PredEdge {
    pub block: BlockId,
    pub edge: usize,
}

/// A position in the instruction stream: an instruction, or a block's
/// terminator (which sits after every instruction of its block).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProgramPoint {
    Inst(InstId),
    Terminator(BlockId),
}

impl From<InstId> for ProgramPoint {
    fn from(inst: InstId) -> Self {
        ProgramPoint::Inst(inst)
    }
}

impl From<User> for ProgramPoint {
    fn from(user: User) -> Self {
        match user {
            User::Inst(inst) => ProgramPoint::Inst(inst),
            User::Terminator(block) => ProgramPoint::Terminator(block),
        }
    }
}

// ── Blocks ──────────────────────────────────────────────────────────

/// A basic block: arguments, instructions, terminator, and the predecessor
/// edges that name it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockData {
    pub(crate) args: Vec<ValueId>,
    pub(crate) insts: Vec<InstId>,
    pub(crate) terminator: Option<Terminator>,
    pub(crate) preds: SmallVec<[PredEdge; 2]>,
}

impl BlockData {
    pub fn args(&self) -> &[ValueId] {
        &self.args
    }

    pub fn insts(&self) -> &[InstId] {
        &self.insts
    }

    /// `None` only while a block is under construction.
    pub fn terminator(&self) -> Option<&Terminator> {
        self.terminator.as_ref()
    }

    /// Incoming edges, one entry per edge (a block reaching this one through
    /// two edges appears twice).
    pub fn preds(&self) -> &[PredEdge] {
        &self.preds
    }
}

// ── Functions ───────────────────────────────────────────────────────

/// A function body.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Function {
    #[cfg_attr(feature = "cache", serde(skip))]
    id: Identity,
    name: Box<str>,
    blocks: Vec<Option<BlockData>>,
    layout: Vec<BlockId>,
    insts: Vec<Option<InstData>>,
    values: Vec<Option<ValueData>>,
    use_index: UseIndex,
}

impl Function {
    pub fn new(name: impl Into<Box<str>>) -> Self {
        Self {
            id: Identity::default(),
            name: name.into(),
            blocks: Vec::new(),
            layout: Vec::new(),
            insts: Vec::new(),
            values: Vec::new(),
            use_index: UseIndex::default(),
        }
    }

    /// Identity of this body; clones get their own.
    pub fn id(&self) -> FunctionId {
        self.id.id()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ── Block list ──────────────────────────────────────────────

    /// The entry block (first in layout order).
    ///
    /// # Panics
    ///
    /// Panics if the function has no blocks.
    pub fn entry(&self) -> BlockId {
        match self.layout.first() {
            Some(&entry) => entry,
            None => panic!("function `{}` has no blocks", self.name),
        }
    }

    /// Live blocks in layout order.
    pub fn blocks(&self) -> impl DoubleEndedIterator<Item = BlockId> + ExactSizeIterator + '_ {
        self.layout.iter().copied()
    }

    /// Number of live blocks.
    pub fn num_blocks(&self) -> usize {
        self.layout.len()
    }

    /// Size of the block arena, including erased slots. Analyses size their
    /// per-block tables with this.
    pub fn block_capacity(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_live_block(&self, block: BlockId) -> bool {
        matches!(self.blocks.get(block.index()), Some(Some(_)))
    }

    /// # Panics
    ///
    /// Panics if `block` was erased or belongs to another function.
    pub fn block(&self, block: BlockId) -> &BlockData {
        match self.blocks.get(block.index()) {
            Some(Some(data)) => data,
            _ => panic!("{block} is not a live block of `{}`", self.name),
        }
    }

    pub(crate) fn block_mut(&mut self, block: BlockId) -> &mut BlockData {
        match self.blocks.get_mut(block.index()) {
            Some(Some(data)) => data,
            _ => panic!("{block} is not a live block of `{}`", self.name),
        }
    }

    /// Append a new empty block at the end of the layout.
    pub fn create_block(&mut self) -> BlockId {
        let id = self.alloc_block();
        self.layout.push(id);
        id
    }

    /// Create a new empty block placed right after `sibling` in the layout.
    pub fn create_block_after(&mut self, sibling: BlockId) -> BlockId {
        let pos = self.layout_position(sibling);
        let id = self.alloc_block();
        self.layout.insert(pos + 1, id);
        id
    }

    /// Create a new empty block placed right before `sibling` in the layout.
    pub fn create_block_before(&mut self, sibling: BlockId) -> BlockId {
        let pos = self.layout_position(sibling);
        let id = self.alloc_block();
        self.layout.insert(pos, id);
        id
    }

    fn alloc_block(&mut self) -> BlockId {
        let id = BlockId::from_index(self.blocks.len());
        self.blocks.push(Some(BlockData::default()));
        id
    }

    fn layout_position(&self, block: BlockId) -> usize {
        self.layout
            .iter()
            .position(|&b| b == block)
            .unwrap_or_else(|| panic!("{block} is not in the layout of `{}`", self.name))
    }

    // ── Values ──────────────────────────────────────────────────

    /// # Panics
    ///
    /// Panics if `value` was erased.
    pub fn value(&self, value: ValueId) -> &ValueData {
        match self.values.get(value.index()) {
            Some(Some(data)) => data,
            _ => panic!("{value} is not a live value of `{}`", self.name),
        }
    }

    pub fn is_live_value(&self, value: ValueId) -> bool {
        matches!(self.values.get(value.index()), Some(Some(_)))
    }

    pub fn value_ty(&self, value: ValueId) -> Ty {
        self.value(value).ty
    }

    pub fn ownership_kind(&self, value: ValueId) -> OwnershipKind {
        self.value(value).ownership
    }

    /// Change the ownership kind of `value`. Only IR rewriting should call
    /// this; ownership is otherwise fixed at construction.
    pub fn set_ownership_kind(&mut self, value: ValueId, kind: OwnershipKind) {
        let data = self.value_mut(value);
        tracing::trace!(%value, from = ?data.ownership, to = ?kind, "set ownership kind");
        data.ownership = kind;
    }

    pub fn value_def(&self, value: ValueId) -> ValueDef {
        self.value(value).def
    }

    /// The block that defines `value`.
    pub fn defining_block(&self, value: ValueId) -> BlockId {
        match self.value(value).def {
            ValueDef::Inst(inst) => self.inst(inst).block,
            ValueDef::BlockArg { block, .. } => block,
        }
    }

    fn value_mut(&mut self, value: ValueId) -> &mut ValueData {
        match self.values.get_mut(value.index()) {
            Some(Some(data)) => data,
            _ => panic!("{value} is not a live value of `{}`", self.name),
        }
    }

    fn alloc_value(&mut self, ty: Ty, ownership: OwnershipKind, def: ValueDef) -> ValueId {
        let id = ValueId::from_index(self.values.len());
        self.values.push(Some(ValueData { ty, ownership, def }));
        self.use_index.push_value();
        id
    }

    // ── Block arguments ─────────────────────────────────────────

    /// Append a phi argument to `block`.
    pub fn add_phi_arg(&mut self, block: BlockId, ty: Ty, ownership: OwnershipKind) -> ValueId {
        self.add_arg(block, ty, ownership, ArgKind::Phi)
    }

    /// Append a function-entry argument to `block`.
    pub fn add_function_arg(&mut self, block: BlockId, ty: Ty, convention: Convention) -> ValueId {
        self.add_arg(block, ty, convention.ownership(), ArgKind::Function(convention))
    }

    fn add_arg(&mut self, block: BlockId, ty: Ty, ownership: OwnershipKind, kind: ArgKind) -> ValueId {
        let index = u32::try_from(self.block(block).args.len())
            .unwrap_or_else(|_| panic!("argument count of {block} exceeds u32::MAX"));
        let value = self.alloc_value(ty, ownership, ValueDef::BlockArg { block, index, kind });
        self.block_mut(block).args.push(value);
        value
    }

    /// Argument `index` of `block`.
    pub fn arg(&self, block: BlockId, index: usize) -> ValueId {
        self.block(block).args[index]
    }

    /// Remove argument `index` from `block` and renumber later arguments.
    ///
    /// Incoming edges are NOT updated; callers must drop the matching
    /// operand from every predecessor edge (see `erase_phi_argument` in
    /// the CFG utilities).
    ///
    /// # Panics
    ///
    /// Debug-panics if the argument still has uses.
    pub fn erase_block_arg(&mut self, block: BlockId, index: usize) {
        let value = self.block(block).args[index];
        debug_assert!(
            !self.has_uses(value),
            "erasing argument {index} of {block} ({value}) which still has uses"
        );
        self.block_mut(block).args.remove(index);
        self.values[value.index()] = None;
        self.renumber_args(block, index);
    }

    /// Refresh `ValueDef::BlockArg::index` for arguments at `from..`.
    fn renumber_args(&mut self, block: BlockId, from: usize) {
        let args: SmallVec<[ValueId; 4]> = self.block(block).args[from..].iter().copied().collect();
        for (offset, arg) in args.into_iter().enumerate() {
            let new_index = u32::try_from(from + offset)
                .unwrap_or_else(|_| panic!("argument count of {block} exceeds u32::MAX"));
            if let ValueDef::BlockArg { block: b, index, .. } = &mut self.value_mut(arg).def {
                *b = block;
                *index = new_index;
            }
        }
    }

    // ── Instructions ────────────────────────────────────────────

    /// # Panics
    ///
    /// Panics if `inst` was erased.
    pub fn inst(&self, inst: InstId) -> &InstData {
        match self.insts.get(inst.index()) {
            Some(Some(data)) => data,
            _ => panic!("{inst} is not a live instruction of `{}`", self.name),
        }
    }

    fn inst_mut(&mut self, inst: InstId) -> &mut InstData {
        match self.insts.get_mut(inst.index()) {
            Some(Some(data)) => data,
            _ => panic!("{inst} is not a live instruction of `{}`", self.name),
        }
    }

    pub fn is_live_inst(&self, inst: InstId) -> bool {
        matches!(self.insts.get(inst.index()), Some(Some(_)))
    }

    /// The value produced by `inst`, if any.
    pub fn inst_result(&self, inst: InstId) -> Option<ValueId> {
        self.inst(inst).result
    }

    /// Append an instruction to the end of `block`'s instruction list
    /// (before its terminator).
    pub fn append_inst(&mut self, block: BlockId, kind: InstKind) -> InstId {
        let index = self.block(block).insts.len();
        self.insert_inst(block, index, kind)
    }

    /// Insert an instruction at position `index` of `block`.
    pub fn insert_inst(&mut self, block: BlockId, index: usize, kind: InstKind) -> InstId {
        let id = InstId::from_index(self.insts.len());
        let result = kind
            .result_type()
            .map(|(ty, ownership)| self.alloc_value(ty, ownership, ValueDef::Inst(id)));
        self.use_index.link(User::Inst(id), kind.operands());
        self.insts.push(Some(InstData {
            kind,
            block,
            result,
        }));
        self.block_mut(block).insts.insert(index, id);
        id
    }

    /// Remove `inst` from its block, drop its operands and free its result.
    ///
    /// # Panics
    ///
    /// Debug-panics if the result still has uses.
    pub fn erase_inst(&mut self, inst: InstId) {
        let data = self.inst(inst);
        let (block, result, operands) = (data.block, data.result, data.kind.operands());
        self.use_index.unlink(User::Inst(inst), operands);
        if let Some(result) = result {
            debug_assert!(
                !self.has_uses(result),
                "erasing {inst} whose result {result} still has uses"
            );
            self.values[result.index()] = None;
        }
        self.block_mut(block).insts.retain(|&i| i != inst);
        self.insts[inst.index()] = None;
    }

    /// Position of a program point within its block. Terminators sit after
    /// every instruction.
    pub fn point_position(&self, point: ProgramPoint) -> (BlockId, usize) {
        match point {
            ProgramPoint::Inst(inst) => {
                let block = self.inst(inst).block;
                let index = self
                    .block(block)
                    .insts
                    .iter()
                    .position(|&i| i == inst)
                    .unwrap_or_else(|| panic!("{inst} is not listed in {block}"));
                (block, index)
            }
            ProgramPoint::Terminator(block) => (block, self.block(block).insts.len()),
        }
    }

    // ── Terminators and edges ───────────────────────────────────

    /// # Panics
    ///
    /// Panics if `block` has no terminator yet.
    pub fn terminator(&self, block: BlockId) -> &Terminator {
        match &self.block(block).terminator {
            Some(term) => term,
            None => panic!("{block} has no terminator"),
        }
    }

    /// Install `term` as `block`'s terminator, returning the old one.
    ///
    /// The predecessor index of every old and new successor is patched, as
    /// are the use lists of the old and new operands.
    pub fn set_terminator(&mut self, block: BlockId, term: Terminator) -> Option<Terminator> {
        let old = self.take_terminator(block);
        for (edge, succ) in term.successors().into_iter().enumerate() {
            self.block_mut(succ).preds.push(PredEdge { block, edge });
        }
        self.use_index.link(User::Terminator(block), term.operands());
        self.block_mut(block).terminator = Some(term);
        old
    }

    /// Detach `block`'s terminator, unlinking its edges from the
    /// predecessor index and its operands from the use index.
    pub(crate) fn take_terminator(&mut self, block: BlockId) -> Option<Terminator> {
        let old = self.block_mut(block).terminator.take()?;
        self.use_index.unlink(User::Terminator(block), old.operands());
        for succ in old.successors() {
            if self.is_live_block(succ) {
                self.block_mut(succ).preds.retain(|p| p.block != block);
            }
        }
        Some(old)
    }

    /// Redirect edge `edge` of `block`'s terminator to `dest`. Edge arguments
    /// are left as they are.
    pub fn set_successor(&mut self, block: BlockId, edge: usize, dest: BlockId) {
        let old = self.terminator(block).successor(edge);
        if old == dest {
            return;
        }
        let entry = PredEdge { block, edge };
        self.block_mut(old).preds.retain(|p| *p != entry);
        self.block_mut(dest).preds.push(entry);
        if let Some(term) = self.block_mut(block).terminator.as_mut() {
            term.set_successor(edge, dest);
        }
    }

    /// Edit the explicit operands of `edge` with `f`, returning its result;
    /// `None` (and `f` is not called) for implicit edges.
    ///
    /// The use index is re-linked for whatever `f` leaves behind.
    pub fn edge_args_mut<R>(
        &mut self,
        block: BlockId,
        edge: usize,
        f: impl FnOnce(&mut Vec<ValueId>) -> R,
    ) -> Option<R> {
        let args = match self.blocks.get_mut(block.index()) {
            Some(Some(data)) => data.terminator.as_mut()?.edge_args_mut(edge)?,
            _ => panic!("{block} is not a live block of `{}`", self.name),
        };
        let before: SmallVec<[ValueId; 4]> = args.iter().copied().collect();
        let result = f(&mut *args);
        let after: SmallVec<[ValueId; 4]> = args.iter().copied().collect();

        let user = User::Terminator(block);
        self.use_index.unlink(user, before);
        self.use_index.link(user, after);
        Some(result)
    }

    /// The values edge `edge` of `block` delivers.
    pub fn edge_args(&self, block: BlockId, edge: usize) -> EdgeArgs<'_> {
        self.terminator(block).edge_args(edge)
    }

    /// Successors of `block` in edge order (empty if no terminator yet).
    pub fn successors(&self, block: BlockId) -> SmallVec<[BlockId; 4]> {
        self.block(block)
            .terminator
            .as_ref()
            .map(Terminator::successors)
            .unwrap_or_default()
    }

    /// Incoming edges of `block`.
    pub fn predecessors(&self, block: BlockId) -> &[PredEdge] {
        &self.block(block).preds
    }

    /// Distinct predecessor blocks, in first-edge order.
    pub fn pred_blocks(&self, block: BlockId) -> SmallVec<[BlockId; 4]> {
        let mut blocks: SmallVec<[BlockId; 4]> = SmallVec::new();
        for pred in &self.block(block).preds {
            if !blocks.contains(&pred.block) {
                blocks.push(pred.block);
            }
        }
        blocks
    }

    /// The predecessor of `block` if it has exactly one incoming edge.
    pub fn single_predecessor(&self, block: BlockId) -> Option<BlockId> {
        match self.block(block).preds.as_slice() {
            [only] => Some(only.block),
            _ => None,
        }
    }

    /// The successor of `block` if its terminator has exactly one edge.
    pub fn single_successor(&self, block: BlockId) -> Option<BlockId> {
        match self.successors(block).as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }
}

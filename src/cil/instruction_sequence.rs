use crate::cil::{Error, Instruction, InstructionId, OpCode, Operand};
use crate::util::Offset;
use std::collections::BTreeSet;
use std::ops::{Deref, DerefMut, Index};

/// Ordered, editable sequence of instructions
///
/// Instructions live in an arena owned by the sequence and are addressed by [`InstructionId`].
/// Allocating an instruction ([`InstructionSequence::create`]) does not make it a member: it has to
/// be placed with one of the positional edits. Removed instructions stay in the arena (detached),
/// so handles held elsewhere never become invalid - they just stop being members.
///
/// ### Consistency
///
/// Every edit repairs the `previous`/`next` links of the touched neighbours and updates the set of
/// branch references before returning. The `index` and `offset` of instructions are _not_
/// maintained by edits. Those depend on the size of every preceding instruction, so they are only
/// refreshed by an explicit [`InstructionSequence::recompute`] once a batch of edits is done.
///
/// While decoding a method, the recompute can be suppressed altogether (see
/// [`InstructionSequence::bulk_load`]) so that it runs exactly once at the end.
#[derive(Clone, Debug, Default)]
pub struct InstructionSequence {
    /// Every instruction ever allocated by this sequence (members or not)
    nodes: Vec<Instruction>,

    /// Members, in order
    order: Vec<InstructionId>,

    /// Members whose opcode takes one or more instruction targets
    branch_references: BTreeSet<InstructionId>,

    /// When set, `recompute` does nothing
    recompute_suppressed: bool,
}

impl InstructionSequence {
    pub fn new() -> InstructionSequence {
        InstructionSequence::default()
    }

    pub fn with_capacity(capacity: usize) -> InstructionSequence {
        InstructionSequence {
            nodes: Vec::with_capacity(capacity),
            order: Vec::with_capacity(capacity),
            branch_references: BTreeSet::new(),
            recompute_suppressed: false,
        }
    }

    /// Allocate a new detached instruction
    pub fn create(&mut self, opcode: OpCode, operand: Operand) -> Result<InstructionId, Error> {
        Self::check_operand(opcode, &operand)?;
        let id = InstructionId(self.nodes.len());
        self.nodes.push(Instruction::new(opcode, operand));
        Ok(id)
    }

    fn check_operand(opcode: OpCode, operand: &Operand) -> Result<(), Error> {
        if operand.fits(opcode.operand_type) {
            Ok(())
        } else {
            Err(Error::OperandMismatch {
                opcode: opcode.name,
                expected: opcode.operand_type,
            })
        }
    }

    /// Number of member instructions
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Instruction at a position
    pub fn get(&self, position: usize) -> Option<InstructionId> {
        self.order.get(position).copied()
    }

    pub fn first(&self) -> Option<InstructionId> {
        self.order.first().copied()
    }

    pub fn last(&self) -> Option<InstructionId> {
        self.order.last().copied()
    }

    /// Look up an instruction (member or not) by handle
    pub fn instruction(&self, id: InstructionId) -> Option<&Instruction> {
        self.nodes.get(id.0)
    }

    /// Is the instruction currently in the sequence?
    ///
    /// This is the only liveness signal for references held outside the sequence (branch operands,
    /// exception handler boundaries): nothing is notified when a referenced instruction leaves.
    pub fn contains(&self, id: InstructionId) -> bool {
        self.nodes.get(id.0).map_or(false, |node| node.is_member)
    }

    /// Current position of a member instruction
    ///
    /// Unlike [`Instruction::index`], this is always up to date (it is a linear search).
    pub fn position_of(&self, id: InstructionId) -> Option<usize> {
        if !self.contains(id) {
            return None;
        }
        self.order.iter().position(|member| *member == id)
    }

    fn node(&self, id: InstructionId) -> Result<&Instruction, Error> {
        self.nodes.get(id.0).ok_or(Error::UnknownInstruction(id))
    }

    fn check_detached(&self, id: InstructionId) -> Result<(), Error> {
        if self.node(id)?.is_member {
            Err(Error::AlreadyMember(id))
        } else {
            Ok(())
        }
    }

    fn check_position(&self, position: usize, allow_end: bool) -> Result<(), Error> {
        let len = self.order.len();
        if position < len || (allow_end && position == len) {
            Ok(())
        } else {
            Err(Error::PositionOutOfRange { position, len })
        }
    }

    /// Place `id` between `previous` and `next`, fixing up both neighbours
    fn link(
        &mut self,
        previous: Option<InstructionId>,
        id: InstructionId,
        next: Option<InstructionId>,
    ) {
        if let Some(previous) = previous {
            self.nodes[previous.0].next = Some(id);
        }
        if let Some(next) = next {
            self.nodes[next.0].previous = Some(id);
        }
        let node = &mut self.nodes[id.0];
        node.previous = previous;
        node.next = next;
    }

    fn attach(&mut self, id: InstructionId) {
        let node = &mut self.nodes[id.0];
        node.is_member = true;
        if node.is_target_bearing() {
            self.branch_references.insert(id);
        }
    }

    fn detach(&mut self, id: InstructionId) {
        let node = &mut self.nodes[id.0];
        node.is_member = false;
        node.previous = None;
        node.next = None;
        self.branch_references.remove(&id);
    }

    /// Add an instruction to the end of the sequence
    pub fn append(&mut self, id: InstructionId) -> Result<(), Error> {
        self.check_detached(id)?;
        let previous = self.last();
        self.link(previous, id, None);
        self.order.push(id);
        self.attach(id);
        log::trace!("appended {:?} at {}", id, self.order.len() - 1);
        Ok(())
    }

    /// Insert an instruction before the one currently at `position`
    ///
    /// Inserting at `len()` is the same as appending.
    pub fn insert(&mut self, position: usize, id: InstructionId) -> Result<(), Error> {
        self.check_position(position, true)?;
        self.check_detached(id)?;
        let previous = position.checked_sub(1).map(|prev| self.order[prev]);
        let next = self.get(position);
        self.link(previous, id, next);
        self.order.insert(position, id);
        self.attach(id);
        log::trace!("inserted {:?} at {}", id, position);
        Ok(())
    }

    /// Replace the instruction at `position`, returning the (now detached) replaced instruction
    pub fn replace(&mut self, position: usize, id: InstructionId) -> Result<InstructionId, Error> {
        self.check_position(position, false)?;
        self.check_detached(id)?;
        let replaced = self.order[position];
        let previous = position.checked_sub(1).map(|prev| self.order[prev]);
        let next = self.get(position + 1);
        self.detach(replaced);
        self.link(previous, id, next);
        self.order[position] = id;
        self.attach(id);
        log::trace!("replaced {:?} with {:?} at {}", replaced, id, position);
        Ok(replaced)
    }

    /// Remove the instruction at `position`, returning it (detached)
    ///
    /// Branches and exception handlers that refer to the removed instruction are left as they are.
    pub fn remove(&mut self, position: usize) -> Result<InstructionId, Error> {
        self.check_position(position, false)?;
        let removed = self.order.remove(position);
        let previous = position.checked_sub(1).map(|prev| self.order[prev]);
        let next = self.get(position);
        if let Some(previous) = previous {
            self.nodes[previous.0].next = next;
        }
        if let Some(next) = next {
            self.nodes[next.0].previous = previous;
        }
        self.detach(removed);
        log::trace!("removed {:?} from {}", removed, position);
        Ok(removed)
    }

    /// Change both the opcode and operand of an instruction in place
    ///
    /// If the instruction is a member, its branch reference membership follows the new opcode.
    pub fn rewrite(
        &mut self,
        id: InstructionId,
        opcode: OpCode,
        operand: Operand,
    ) -> Result<(), Error> {
        Self::check_operand(opcode, &operand)?;
        self.node(id)?;
        let node = &mut self.nodes[id.0];
        node.opcode = opcode;
        node.operand = operand;
        if node.is_member {
            if node.is_target_bearing() {
                self.branch_references.insert(id);
            } else {
                self.branch_references.remove(&id);
            }
        }
        Ok(())
    }

    /// Change the opcode, keeping the operand (eg. switching `br.s` to `br`)
    pub fn set_opcode(&mut self, id: InstructionId, opcode: OpCode) -> Result<(), Error> {
        let operand = self.node(id)?.operand.clone();
        self.rewrite(id, opcode, operand)
    }

    /// Change the operand, keeping the opcode
    pub fn set_operand(&mut self, id: InstructionId, operand: Operand) -> Result<(), Error> {
        let opcode = self.node(id)?.opcode;
        self.rewrite(id, opcode, operand)
    }

    /// Member instructions whose operand is one or more instructions
    pub fn branch_references(&self) -> impl Iterator<Item = InstructionId> + '_ {
        self.branch_references.iter().copied()
    }

    pub fn is_branch_reference(&self, id: InstructionId) -> bool {
        self.branch_references.contains(&id)
    }

    /// Branch targets that are no longer members, as `(branch, target)` pairs
    pub fn dangling_targets(&self) -> Vec<(InstructionId, InstructionId)> {
        self.branch_references
            .iter()
            .flat_map(|branch| {
                self.nodes[branch.0]
                    .operand
                    .targets()
                    .iter()
                    .filter(|target| !self.contains(**target))
                    .map(move |target| (*branch, *target))
            })
            .collect()
    }

    /// Member handles, in order
    pub fn ids(&self) -> impl DoubleEndedIterator<Item = InstructionId> + ExactSizeIterator + '_ {
        self.order.iter().copied()
    }

    /// Member instructions, in order
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (InstructionId, &Instruction)> + '_ {
        self.order.iter().map(|id| (*id, &self.nodes[id.0]))
    }

    /// Walk the members by following `next` links from the first instruction
    pub fn walk_forward(&self) -> Links<'_> {
        Links {
            sequence: self,
            cursor: self.first(),
            forward: true,
        }
    }

    /// Walk the members by following `previous` links from the last instruction
    pub fn walk_backward(&self) -> Links<'_> {
        Links {
            sequence: self,
            cursor: self.last(),
            forward: false,
        }
    }

    /// Sum of the sizes of all members
    pub fn code_size(&self) -> usize {
        self.iter().map(|(_, insn)| insn.size()).sum()
    }

    pub fn is_recompute_suppressed(&self) -> bool {
        self.recompute_suppressed
    }

    /// Enable or disable [`InstructionSequence::recompute`]
    ///
    /// Whoever sets this is responsible for clearing it and recomputing once they are done.
    pub fn set_recompute_suppressed(&mut self, suppressed: bool) {
        self.recompute_suppressed = suppressed;
    }

    /// Suppress recomputes until the returned guard is dropped, then recompute once
    pub fn bulk_load(&mut self) -> BulkLoad<'_> {
        log::debug!("starting bulk load at {} instructions", self.order.len());
        self.recompute_suppressed = true;
        BulkLoad { sequence: self }
    }

    /// Refresh the `index`, `offset`, and links of every member in a single pass
    ///
    /// Links are rewritten unconditionally from the current order. Returns the total code size, or
    /// `None` if recomputes are currently suppressed (in which case nothing is touched).
    ///
    /// Sizes are taken as they are: if an encoder changes the size of some instruction (eg. by
    /// switching to a long branch form), it needs to recompute again afterwards.
    pub fn recompute(&mut self) -> Option<Offset> {
        if self.recompute_suppressed {
            log::trace!("recompute suppressed");
            return None;
        }

        let mut offset = Offset(0);
        for position in 0..self.order.len() {
            let id = self.order[position];
            let previous = position.checked_sub(1).map(|prev| self.order[prev]);
            let next = self.order.get(position + 1).copied();
            let node = &mut self.nodes[id.0];
            node.index = position;
            node.offset = offset;
            node.previous = previous;
            node.next = next;
            offset = offset.after(&*node);
        }
        log::debug!(
            "recomputed {} instructions ({} bytes)",
            self.order.len(),
            offset.0
        );
        Some(offset)
    }
}

impl Index<InstructionId> for InstructionSequence {
    type Output = Instruction;

    /// Panics if the handle was not allocated by this sequence
    fn index(&self, id: InstructionId) -> &Instruction {
        &self.nodes[id.0]
    }
}

/// Guard returned by [`InstructionSequence::bulk_load`]
pub struct BulkLoad<'s> {
    sequence: &'s mut InstructionSequence,
}

impl<'s> Deref for BulkLoad<'s> {
    type Target = InstructionSequence;

    fn deref(&self) -> &InstructionSequence {
        self.sequence
    }
}

impl<'s> DerefMut for BulkLoad<'s> {
    fn deref_mut(&mut self) -> &mut InstructionSequence {
        self.sequence
    }
}

impl<'s> Drop for BulkLoad<'s> {
    fn drop(&mut self) {
        self.sequence.recompute_suppressed = false;
        self.sequence.recompute();
    }
}

/// Iterator following the links between member instructions
pub struct Links<'s> {
    sequence: &'s InstructionSequence,
    cursor: Option<InstructionId>,
    forward: bool,
}

impl<'s> Iterator for Links<'s> {
    type Item = InstructionId;

    fn next(&mut self) -> Option<InstructionId> {
        let id = self.cursor?;
        let node = &self.sequence.nodes[id.0];
        self.cursor = if self.forward {
            node.next
        } else {
            node.previous
        };
        Some(id)
    }
}

use crate::cil::{Error, InstructionId, InstructionSequence, OpCode, Operand};

/// Edit instructions by handle rather than by position
///
/// Every operation resolves the handles it is given to positions and then defers to the
/// positional edits of [`InstructionSequence`].
pub struct Editor<'b> {
    instructions: &'b mut InstructionSequence,
}

impl<'b> Editor<'b> {
    pub fn new(instructions: &'b mut InstructionSequence) -> Editor<'b> {
        Editor { instructions }
    }

    fn position_of(&self, id: InstructionId) -> Result<usize, Error> {
        self.instructions
            .position_of(id)
            .ok_or(Error::NotMember(id))
    }

    /// Allocate a detached instruction
    pub fn create(&mut self, opcode: OpCode, operand: Operand) -> Result<InstructionId, Error> {
        self.instructions.create(opcode, operand)
    }

    /// Allocate an instruction and append it
    pub fn emit(&mut self, opcode: OpCode, operand: Operand) -> Result<InstructionId, Error> {
        let id = self.instructions.create(opcode, operand)?;
        self.instructions.append(id)?;
        Ok(id)
    }

    pub fn append(&mut self, id: InstructionId) -> Result<(), Error> {
        self.instructions.append(id)
    }

    pub fn insert_before(&mut self, target: InstructionId, id: InstructionId) -> Result<(), Error> {
        let position = self.position_of(target)?;
        self.instructions.insert(position, id)
    }

    pub fn insert_after(&mut self, target: InstructionId, id: InstructionId) -> Result<(), Error> {
        let position = self.position_of(target)?;
        self.instructions.insert(position + 1, id)
    }

    pub fn remove(&mut self, id: InstructionId) -> Result<(), Error> {
        let position = self.position_of(id)?;
        self.instructions.remove(position)?;
        Ok(())
    }

    /// Put `id` where `target` is, detaching `target`
    pub fn replace(&mut self, target: InstructionId, id: InstructionId) -> Result<(), Error> {
        let position = self.position_of(target)?;
        self.instructions.replace(position, id)?;
        Ok(())
    }
}

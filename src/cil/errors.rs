use super::{InstructionId, OperandType, VariableId};
use crate::util::Offset;

#[derive(Debug)]
pub enum Error {
    /// Position is past the end of a sequence (`len` is the length at the time)
    PositionOutOfRange { position: usize, len: usize },

    /// Handle was not allocated by this sequence
    UnknownInstruction(InstructionId),

    /// Instruction is already in the sequence (an instruction can only appear once)
    AlreadyMember(InstructionId),

    /// Instruction is expected to be in the sequence, but is not
    NotMember(InstructionId),

    /// Handle was not allocated by this variable sequence
    UnknownVariable(VariableId),

    /// Variable is already in the sequence
    VariableAlreadyMember(VariableId),

    /// Variable is referenced by an instruction but is not in the sequence
    DetachedVariable(VariableId),

    /// Variable or argument number does not fit in the operand of the instruction
    OperandOutOfRange(InstructionId),

    /// Operand payload doesn't match what the opcode expects
    OperandMismatch {
        opcode: &'static str,
        expected: OperandType,
    },

    /// `this` was requested for a method without a declaring type
    NoDeclaringType,

    /// A branch, `switch`, or handler boundary refers to an instruction that was removed
    DanglingReference(InstructionId),

    /// Branch distance does not fit in the operand of the branch
    BranchOutOfRange {
        branch: InstructionId,
        distance: isize,
    },

    /// Encoding was requested while recomputes are suppressed, so offsets are not final
    RecomputeSuppressed,

    /// Method code is too large to be addressed
    MethodCodeOverflow(Offset),

    IoError(std::io::Error),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}

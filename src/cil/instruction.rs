use crate::cil::{OpCode, OperandType, VariableId};
use crate::metadata::MetadataToken;
use crate::util::{Offset, Width};
use std::fmt;

/// Stable handle to an instruction allocated by an [`InstructionSequence`]
///
/// Handles stay valid for as long as the sequence that created them, whether or not the
/// instruction they name is currently a member of that sequence.
///
/// [`InstructionSequence`]: crate::cil::InstructionSequence
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct InstructionId(pub(crate) usize);

impl fmt::Debug for InstructionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

/// Operand of an instruction
///
/// Apart from the target-bearing cases, the operand is opaque to the method body: it is carried
/// around so that an encoder can emit it, and sized according to the opcode's operand type.
#[derive(Clone, PartialEq, Debug)]
pub enum Operand {
    None,
    Int8(i8),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Token(MetadataToken),
    Variable(VariableId),
    Argument(u16),

    /// Branch target
    Target(InstructionId),

    /// Jump table of a `switch`
    Switch(Vec<InstructionId>),
}

impl Operand {
    /// Is this operand an acceptable payload for the operand type?
    pub fn fits(&self, operand_type: OperandType) -> bool {
        match (operand_type, self) {
            (OperandType::InlineNone, Operand::None) => true,
            (
                OperandType::InlineBrTarget | OperandType::ShortInlineBrTarget,
                Operand::Target(_),
            ) => true,
            (OperandType::InlineSwitch, Operand::Switch(_)) => true,
            (OperandType::ShortInlineI, Operand::Int8(_)) => true,
            (OperandType::InlineI, Operand::Int32(_)) => true,
            (OperandType::InlineI8, Operand::Int64(_)) => true,
            (OperandType::ShortInlineR, Operand::Float32(_)) => true,
            (OperandType::InlineR, Operand::Float64(_)) => true,
            (OperandType::InlineString, Operand::String(_)) => true,
            (
                OperandType::InlineField
                | OperandType::InlineMethod
                | OperandType::InlineType
                | OperandType::InlineTok
                | OperandType::InlineSig,
                Operand::Token(_),
            ) => true,
            (OperandType::InlineVar | OperandType::ShortInlineVar, Operand::Variable(_)) => true,
            (OperandType::InlineArg | OperandType::ShortInlineArg, Operand::Argument(_)) => true,
            _ => false,
        }
    }

    /// Instructions this operand refers to
    pub fn targets(&self) -> &[InstructionId] {
        match self {
            Operand::Target(target) => std::slice::from_ref(target),
            Operand::Switch(targets) => targets,
            _ => &[],
        }
    }
}

/// An instruction node
///
/// The node is owned by the [`InstructionSequence`] that allocated it. Only the sequence mutates
/// the links, and `index`/`offset` are only as fresh as the last recompute of that sequence.
///
/// [`InstructionSequence`]: crate::cil::InstructionSequence
#[derive(Clone, Debug)]
pub struct Instruction {
    pub(crate) opcode: OpCode,
    pub(crate) operand: Operand,
    pub(crate) index: usize,
    pub(crate) offset: Offset,
    pub(crate) previous: Option<InstructionId>,
    pub(crate) next: Option<InstructionId>,
    pub(crate) is_member: bool,
}

impl Instruction {
    pub(crate) fn new(opcode: OpCode, operand: Operand) -> Instruction {
        Instruction {
            opcode,
            operand,
            index: 0,
            offset: Offset(0),
            previous: None,
            next: None,
            is_member: false,
        }
    }

    pub fn opcode(&self) -> OpCode {
        self.opcode
    }

    pub fn operand(&self) -> &Operand {
        &self.operand
    }

    /// Position in the sequence as of the last recompute
    pub fn index(&self) -> usize {
        self.index
    }

    /// Byte offset from the start of the body as of the last recompute
    pub fn offset(&self) -> Offset {
        self.offset
    }

    pub fn previous(&self) -> Option<InstructionId> {
        self.previous
    }

    pub fn next(&self) -> Option<InstructionId> {
        self.next
    }

    /// Encoded size of the instruction (opcode and operand)
    pub fn size(&self) -> usize {
        let switch_targets = match &self.operand {
            Operand::Switch(targets) => targets.len(),
            _ => 0,
        };
        self.opcode.size() + self.opcode.operand_type.operand_size(switch_targets)
    }

    pub fn is_target_bearing(&self) -> bool {
        self.opcode.class().is_target_bearing()
    }
}

impl Width for Instruction {
    fn width(&self) -> usize {
        self.size()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cil::opcodes::*;

    #[test]
    fn operand_fits_operand_type() {
        assert!(Operand::None.fits(OperandType::InlineNone));
        assert!(Operand::Target(InstructionId(0)).fits(OperandType::ShortInlineBrTarget));
        assert!(Operand::Switch(vec![]).fits(OperandType::InlineSwitch));
        assert!(Operand::Token(MetadataToken(0x0a00_0001)).fits(OperandType::InlineMethod));
        assert!(!Operand::Int32(1).fits(OperandType::ShortInlineI));
        assert!(!Operand::Target(InstructionId(0)).fits(OperandType::InlineSwitch));
        assert!(!Operand::None.fits(OperandType::InlineBrTarget));
    }

    #[test]
    fn sizes_follow_opcode_and_operand() {
        assert_eq!(Instruction::new(NOP, Operand::None).size(), 1);
        assert_eq!(Instruction::new(LDC_I4_S, Operand::Int8(4)).size(), 2);
        assert_eq!(Instruction::new(LDC_R8, Operand::Float64(1.5)).size(), 9);
        assert_eq!(
            Instruction::new(LDLOC, Operand::Variable(VariableId(0))).size(),
            4
        );
        let table = vec![InstructionId(0), InstructionId(1)];
        assert_eq!(Instruction::new(SWITCH, Operand::Switch(table)).size(), 13);
    }

    #[test]
    fn targets() {
        let jump = Operand::Target(InstructionId(3));
        assert_eq!(jump.targets(), &[InstructionId(3)]);
        assert!(Operand::Int32(3).targets().is_empty());
    }
}

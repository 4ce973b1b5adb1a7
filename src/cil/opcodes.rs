use std::fmt;

/// Kind of operand an opcode takes
///
/// This determines both how many bytes the operand occupies and whether the operand refers to
/// other instructions (see [`OpcodeClass`]).
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum OperandType {
    InlineNone,
    InlineBrTarget,
    ShortInlineBrTarget,
    InlineSwitch,
    InlineI,
    InlineI8,
    ShortInlineI,
    InlineR,
    ShortInlineR,
    InlineString,
    InlineField,
    InlineMethod,
    InlineType,
    InlineTok,
    InlineSig,
    InlineVar,
    ShortInlineVar,
    InlineArg,
    ShortInlineArg,
}

/// Coarse classification of an opcode by its operand
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum OpcodeClass {
    /// No operand at all
    NoOperand,

    /// Operand is a value opaque to the method body (constant, token, variable, argument)
    Value,

    /// Operand is one other instruction
    SingleTarget,

    /// Operand is a table of other instructions (`switch`)
    MultiTarget,
}

impl OpcodeClass {
    /// Does the operand refer to other instructions?
    pub fn is_target_bearing(self) -> bool {
        matches!(self, OpcodeClass::SingleTarget | OpcodeClass::MultiTarget)
    }
}

impl OperandType {
    pub fn class(self) -> OpcodeClass {
        match self {
            OperandType::InlineNone => OpcodeClass::NoOperand,
            OperandType::InlineBrTarget | OperandType::ShortInlineBrTarget => {
                OpcodeClass::SingleTarget
            }
            OperandType::InlineSwitch => OpcodeClass::MultiTarget,
            _ => OpcodeClass::Value,
        }
    }

    /// Encoded size of the operand, given the number of `switch` targets
    ///
    /// The target count is only consulted for [`OperandType::InlineSwitch`].
    pub fn operand_size(self, switch_targets: usize) -> usize {
        match self {
            OperandType::InlineNone => 0,
            OperandType::InlineSwitch => 4 + 4 * switch_targets,
            OperandType::ShortInlineBrTarget
            | OperandType::ShortInlineI
            | OperandType::ShortInlineVar
            | OperandType::ShortInlineArg => 1,
            OperandType::InlineVar | OperandType::InlineArg => 2,
            OperandType::InlineI8 | OperandType::InlineR => 8,
            OperandType::InlineBrTarget
            | OperandType::InlineI
            | OperandType::ShortInlineR
            | OperandType::InlineString
            | OperandType::InlineField
            | OperandType::InlineMethod
            | OperandType::InlineType
            | OperandType::InlineTok
            | OperandType::InlineSig => 4,
        }
    }
}

/// A CIL opcode
///
/// Two-byte opcodes (those prefixed with `0xFE`) keep the prefix in the high byte of `value`.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct OpCode {
    pub name: &'static str,
    pub value: u16,
    pub operand_type: OperandType,
}

impl OpCode {
    /// Prefix byte of every two-byte opcode
    pub const TWO_BYTE_PREFIX: u8 = 0xfe;

    /// Encoded size of the opcode itself (without operand)
    pub fn size(&self) -> usize {
        if self.value > 0xff {
            2
        } else {
            1
        }
    }

    pub fn class(&self) -> OpcodeClass {
        self.operand_type.class()
    }

    /// Bytes of the opcode, in encoding order
    pub fn bytes(&self) -> Vec<u8> {
        if self.value > 0xff {
            vec![Self::TWO_BYTE_PREFIX, self.value as u8]
        } else {
            vec![self.value as u8]
        }
    }

    /// Find an opcode by its mnemonic (eg. `br.s`)
    pub fn from_name(name: &str) -> Option<OpCode> {
        ALL_OPCODES.iter().copied().find(|op| op.name == name)
    }

    /// Long form of a short branch (eg. `br.s` to `br`), if this is a short branch
    pub fn long_form(&self) -> Option<OpCode> {
        if self.operand_type != OperandType::ShortInlineBrTarget {
            return None;
        }
        let long_name = self.name.strip_suffix(".s")?;
        OpCode::from_name(long_name)
    }
}

impl fmt::Debug for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

macro_rules! opcodes {
    ($($konst:ident = ($name:literal, $value:literal, $operand:ident);)*) => {
        $(
            pub const $konst: OpCode = OpCode {
                name: $name,
                value: $value,
                operand_type: OperandType::$operand,
            };
        )*

        /// Every opcode in the instruction set
        pub const ALL_OPCODES: &[OpCode] = &[$($konst),*];
    };
}

opcodes! {
    NOP = ("nop", 0x00, InlineNone);
    BREAK = ("break", 0x01, InlineNone);
    LDARG_0 = ("ldarg.0", 0x02, InlineNone);
    LDARG_1 = ("ldarg.1", 0x03, InlineNone);
    LDARG_2 = ("ldarg.2", 0x04, InlineNone);
    LDARG_3 = ("ldarg.3", 0x05, InlineNone);
    LDLOC_0 = ("ldloc.0", 0x06, InlineNone);
    LDLOC_1 = ("ldloc.1", 0x07, InlineNone);
    LDLOC_2 = ("ldloc.2", 0x08, InlineNone);
    LDLOC_3 = ("ldloc.3", 0x09, InlineNone);
    STLOC_0 = ("stloc.0", 0x0a, InlineNone);
    STLOC_1 = ("stloc.1", 0x0b, InlineNone);
    STLOC_2 = ("stloc.2", 0x0c, InlineNone);
    STLOC_3 = ("stloc.3", 0x0d, InlineNone);
    LDARG_S = ("ldarg.s", 0x0e, ShortInlineArg);
    LDARGA_S = ("ldarga.s", 0x0f, ShortInlineArg);
    STARG_S = ("starg.s", 0x10, ShortInlineArg);
    LDLOC_S = ("ldloc.s", 0x11, ShortInlineVar);
    LDLOCA_S = ("ldloca.s", 0x12, ShortInlineVar);
    STLOC_S = ("stloc.s", 0x13, ShortInlineVar);
    LDNULL = ("ldnull", 0x14, InlineNone);
    LDC_I4_M1 = ("ldc.i4.m1", 0x15, InlineNone);
    LDC_I4_0 = ("ldc.i4.0", 0x16, InlineNone);
    LDC_I4_1 = ("ldc.i4.1", 0x17, InlineNone);
    LDC_I4_2 = ("ldc.i4.2", 0x18, InlineNone);
    LDC_I4_3 = ("ldc.i4.3", 0x19, InlineNone);
    LDC_I4_4 = ("ldc.i4.4", 0x1a, InlineNone);
    LDC_I4_5 = ("ldc.i4.5", 0x1b, InlineNone);
    LDC_I4_6 = ("ldc.i4.6", 0x1c, InlineNone);
    LDC_I4_7 = ("ldc.i4.7", 0x1d, InlineNone);
    LDC_I4_8 = ("ldc.i4.8", 0x1e, InlineNone);
    LDC_I4_S = ("ldc.i4.s", 0x1f, ShortInlineI);
    LDC_I4 = ("ldc.i4", 0x20, InlineI);
    LDC_I8 = ("ldc.i8", 0x21, InlineI8);
    LDC_R4 = ("ldc.r4", 0x22, ShortInlineR);
    LDC_R8 = ("ldc.r8", 0x23, InlineR);
    DUP = ("dup", 0x25, InlineNone);
    POP = ("pop", 0x26, InlineNone);
    JMP = ("jmp", 0x27, InlineMethod);
    CALL = ("call", 0x28, InlineMethod);
    CALLI = ("calli", 0x29, InlineSig);
    RET = ("ret", 0x2a, InlineNone);
    BR_S = ("br.s", 0x2b, ShortInlineBrTarget);
    BRFALSE_S = ("brfalse.s", 0x2c, ShortInlineBrTarget);
    BRTRUE_S = ("brtrue.s", 0x2d, ShortInlineBrTarget);
    BEQ_S = ("beq.s", 0x2e, ShortInlineBrTarget);
    BGE_S = ("bge.s", 0x2f, ShortInlineBrTarget);
    BGT_S = ("bgt.s", 0x30, ShortInlineBrTarget);
    BLE_S = ("ble.s", 0x31, ShortInlineBrTarget);
    BLT_S = ("blt.s", 0x32, ShortInlineBrTarget);
    BNE_UN_S = ("bne.un.s", 0x33, ShortInlineBrTarget);
    BGE_UN_S = ("bge.un.s", 0x34, ShortInlineBrTarget);
    BGT_UN_S = ("bgt.un.s", 0x35, ShortInlineBrTarget);
    BLE_UN_S = ("ble.un.s", 0x36, ShortInlineBrTarget);
    BLT_UN_S = ("blt.un.s", 0x37, ShortInlineBrTarget);
    BR = ("br", 0x38, InlineBrTarget);
    BRFALSE = ("brfalse", 0x39, InlineBrTarget);
    BRTRUE = ("brtrue", 0x3a, InlineBrTarget);
    BEQ = ("beq", 0x3b, InlineBrTarget);
    BGE = ("bge", 0x3c, InlineBrTarget);
    BGT = ("bgt", 0x3d, InlineBrTarget);
    BLE = ("ble", 0x3e, InlineBrTarget);
    BLT = ("blt", 0x3f, InlineBrTarget);
    BNE_UN = ("bne.un", 0x40, InlineBrTarget);
    BGE_UN = ("bge.un", 0x41, InlineBrTarget);
    BGT_UN = ("bgt.un", 0x42, InlineBrTarget);
    BLE_UN = ("ble.un", 0x43, InlineBrTarget);
    BLT_UN = ("blt.un", 0x44, InlineBrTarget);
    SWITCH = ("switch", 0x45, InlineSwitch);
    LDIND_I1 = ("ldind.i1", 0x46, InlineNone);
    LDIND_U1 = ("ldind.u1", 0x47, InlineNone);
    LDIND_I2 = ("ldind.i2", 0x48, InlineNone);
    LDIND_U2 = ("ldind.u2", 0x49, InlineNone);
    LDIND_I4 = ("ldind.i4", 0x4a, InlineNone);
    LDIND_U4 = ("ldind.u4", 0x4b, InlineNone);
    LDIND_I8 = ("ldind.i8", 0x4c, InlineNone);
    LDIND_I = ("ldind.i", 0x4d, InlineNone);
    LDIND_R4 = ("ldind.r4", 0x4e, InlineNone);
    LDIND_R8 = ("ldind.r8", 0x4f, InlineNone);
    LDIND_REF = ("ldind.ref", 0x50, InlineNone);
    STIND_REF = ("stind.ref", 0x51, InlineNone);
    STIND_I1 = ("stind.i1", 0x52, InlineNone);
    STIND_I2 = ("stind.i2", 0x53, InlineNone);
    STIND_I4 = ("stind.i4", 0x54, InlineNone);
    STIND_I8 = ("stind.i8", 0x55, InlineNone);
    STIND_R4 = ("stind.r4", 0x56, InlineNone);
    STIND_R8 = ("stind.r8", 0x57, InlineNone);
    ADD = ("add", 0x58, InlineNone);
    SUB = ("sub", 0x59, InlineNone);
    MUL = ("mul", 0x5a, InlineNone);
    DIV = ("div", 0x5b, InlineNone);
    DIV_UN = ("div.un", 0x5c, InlineNone);
    REM = ("rem", 0x5d, InlineNone);
    REM_UN = ("rem.un", 0x5e, InlineNone);
    AND = ("and", 0x5f, InlineNone);
    OR = ("or", 0x60, InlineNone);
    XOR = ("xor", 0x61, InlineNone);
    SHL = ("shl", 0x62, InlineNone);
    SHR = ("shr", 0x63, InlineNone);
    SHR_UN = ("shr.un", 0x64, InlineNone);
    NEG = ("neg", 0x65, InlineNone);
    NOT = ("not", 0x66, InlineNone);
    CONV_I1 = ("conv.i1", 0x67, InlineNone);
    CONV_I2 = ("conv.i2", 0x68, InlineNone);
    CONV_I4 = ("conv.i4", 0x69, InlineNone);
    CONV_I8 = ("conv.i8", 0x6a, InlineNone);
    CONV_R4 = ("conv.r4", 0x6b, InlineNone);
    CONV_R8 = ("conv.r8", 0x6c, InlineNone);
    CONV_U4 = ("conv.u4", 0x6d, InlineNone);
    CONV_U8 = ("conv.u8", 0x6e, InlineNone);
    CALLVIRT = ("callvirt", 0x6f, InlineMethod);
    CPOBJ = ("cpobj", 0x70, InlineType);
    LDOBJ = ("ldobj", 0x71, InlineType);
    LDSTR = ("ldstr", 0x72, InlineString);
    NEWOBJ = ("newobj", 0x73, InlineMethod);
    CASTCLASS = ("castclass", 0x74, InlineType);
    ISINST = ("isinst", 0x75, InlineType);
    CONV_R_UN = ("conv.r.un", 0x76, InlineNone);
    UNBOX = ("unbox", 0x79, InlineType);
    THROW = ("throw", 0x7a, InlineNone);
    LDFLD = ("ldfld", 0x7b, InlineField);
    LDFLDA = ("ldflda", 0x7c, InlineField);
    STFLD = ("stfld", 0x7d, InlineField);
    LDSFLD = ("ldsfld", 0x7e, InlineField);
    LDSFLDA = ("ldsflda", 0x7f, InlineField);
    STSFLD = ("stsfld", 0x80, InlineField);
    STOBJ = ("stobj", 0x81, InlineType);
    CONV_OVF_I1_UN = ("conv.ovf.i1.un", 0x82, InlineNone);
    CONV_OVF_I2_UN = ("conv.ovf.i2.un", 0x83, InlineNone);
    CONV_OVF_I4_UN = ("conv.ovf.i4.un", 0x84, InlineNone);
    CONV_OVF_I8_UN = ("conv.ovf.i8.un", 0x85, InlineNone);
    CONV_OVF_U1_UN = ("conv.ovf.u1.un", 0x86, InlineNone);
    CONV_OVF_U2_UN = ("conv.ovf.u2.un", 0x87, InlineNone);
    CONV_OVF_U4_UN = ("conv.ovf.u4.un", 0x88, InlineNone);
    CONV_OVF_U8_UN = ("conv.ovf.u8.un", 0x89, InlineNone);
    CONV_OVF_I_UN = ("conv.ovf.i.un", 0x8a, InlineNone);
    CONV_OVF_U_UN = ("conv.ovf.u.un", 0x8b, InlineNone);
    BOX = ("box", 0x8c, InlineType);
    NEWARR = ("newarr", 0x8d, InlineType);
    LDLEN = ("ldlen", 0x8e, InlineNone);
    LDELEMA = ("ldelema", 0x8f, InlineType);
    LDELEM_I1 = ("ldelem.i1", 0x90, InlineNone);
    LDELEM_U1 = ("ldelem.u1", 0x91, InlineNone);
    LDELEM_I2 = ("ldelem.i2", 0x92, InlineNone);
    LDELEM_U2 = ("ldelem.u2", 0x93, InlineNone);
    LDELEM_I4 = ("ldelem.i4", 0x94, InlineNone);
    LDELEM_U4 = ("ldelem.u4", 0x95, InlineNone);
    LDELEM_I8 = ("ldelem.i8", 0x96, InlineNone);
    LDELEM_I = ("ldelem.i", 0x97, InlineNone);
    LDELEM_R4 = ("ldelem.r4", 0x98, InlineNone);
    LDELEM_R8 = ("ldelem.r8", 0x99, InlineNone);
    LDELEM_REF = ("ldelem.ref", 0x9a, InlineNone);
    STELEM_I = ("stelem.i", 0x9b, InlineNone);
    STELEM_I1 = ("stelem.i1", 0x9c, InlineNone);
    STELEM_I2 = ("stelem.i2", 0x9d, InlineNone);
    STELEM_I4 = ("stelem.i4", 0x9e, InlineNone);
    STELEM_I8 = ("stelem.i8", 0x9f, InlineNone);
    STELEM_R4 = ("stelem.r4", 0xa0, InlineNone);
    STELEM_R8 = ("stelem.r8", 0xa1, InlineNone);
    STELEM_REF = ("stelem.ref", 0xa2, InlineNone);
    LDELEM_ANY = ("ldelem", 0xa3, InlineType);
    STELEM_ANY = ("stelem", 0xa4, InlineType);
    UNBOX_ANY = ("unbox.any", 0xa5, InlineType);
    CONV_OVF_I1 = ("conv.ovf.i1", 0xb3, InlineNone);
    CONV_OVF_U1 = ("conv.ovf.u1", 0xb4, InlineNone);
    CONV_OVF_I2 = ("conv.ovf.i2", 0xb5, InlineNone);
    CONV_OVF_U2 = ("conv.ovf.u2", 0xb6, InlineNone);
    CONV_OVF_I4 = ("conv.ovf.i4", 0xb7, InlineNone);
    CONV_OVF_U4 = ("conv.ovf.u4", 0xb8, InlineNone);
    CONV_OVF_I8 = ("conv.ovf.i8", 0xb9, InlineNone);
    CONV_OVF_U8 = ("conv.ovf.u8", 0xba, InlineNone);
    REFANYVAL = ("refanyval", 0xc2, InlineType);
    CKFINITE = ("ckfinite", 0xc3, InlineNone);
    MKREFANY = ("mkrefany", 0xc6, InlineType);
    LDTOKEN = ("ldtoken", 0xd0, InlineTok);
    CONV_U2 = ("conv.u2", 0xd1, InlineNone);
    CONV_U1 = ("conv.u1", 0xd2, InlineNone);
    CONV_I = ("conv.i", 0xd3, InlineNone);
    CONV_OVF_I = ("conv.ovf.i", 0xd4, InlineNone);
    CONV_OVF_U = ("conv.ovf.u", 0xd5, InlineNone);
    ADD_OVF = ("add.ovf", 0xd6, InlineNone);
    ADD_OVF_UN = ("add.ovf.un", 0xd7, InlineNone);
    MUL_OVF = ("mul.ovf", 0xd8, InlineNone);
    MUL_OVF_UN = ("mul.ovf.un", 0xd9, InlineNone);
    SUB_OVF = ("sub.ovf", 0xda, InlineNone);
    SUB_OVF_UN = ("sub.ovf.un", 0xdb, InlineNone);
    ENDFINALLY = ("endfinally", 0xdc, InlineNone);
    LEAVE = ("leave", 0xdd, InlineBrTarget);
    LEAVE_S = ("leave.s", 0xde, ShortInlineBrTarget);
    STIND_I = ("stind.i", 0xdf, InlineNone);
    CONV_U = ("conv.u", 0xe0, InlineNone);
    ARGLIST = ("arglist", 0xfe00, InlineNone);
    CEQ = ("ceq", 0xfe01, InlineNone);
    CGT = ("cgt", 0xfe02, InlineNone);
    CGT_UN = ("cgt.un", 0xfe03, InlineNone);
    CLT = ("clt", 0xfe04, InlineNone);
    CLT_UN = ("clt.un", 0xfe05, InlineNone);
    LDFTN = ("ldftn", 0xfe06, InlineMethod);
    LDVIRTFTN = ("ldvirtftn", 0xfe07, InlineMethod);
    LDARG = ("ldarg", 0xfe09, InlineArg);
    LDARGA = ("ldarga", 0xfe0a, InlineArg);
    STARG = ("starg", 0xfe0b, InlineArg);
    LDLOC = ("ldloc", 0xfe0c, InlineVar);
    LDLOCA = ("ldloca", 0xfe0d, InlineVar);
    STLOC = ("stloc", 0xfe0e, InlineVar);
    LOCALLOC = ("localloc", 0xfe0f, InlineNone);
    ENDFILTER = ("endfilter", 0xfe11, InlineNone);
    UNALIGNED = ("unaligned.", 0xfe12, ShortInlineI);
    VOLATILE = ("volatile.", 0xfe13, InlineNone);
    TAIL = ("tail.", 0xfe14, InlineNone);
    INITOBJ = ("initobj", 0xfe15, InlineType);
    CONSTRAINED = ("constrained.", 0xfe16, InlineType);
    CPBLK = ("cpblk", 0xfe17, InlineNone);
    INITBLK = ("initblk", 0xfe18, InlineNone);
    NO = ("no.", 0xfe19, ShortInlineI);
    RETHROW = ("rethrow", 0xfe1a, InlineNone);
    SIZEOF = ("sizeof", 0xfe1c, InlineType);
    REFANYTYPE = ("refanytype", 0xfe1d, InlineNone);
    READONLY = ("readonly.", 0xfe1e, InlineNone);
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn opcode_table_is_consistent() {
        let names: HashSet<&str> = ALL_OPCODES.iter().map(|op| op.name).collect();
        let values: HashSet<u16> = ALL_OPCODES.iter().map(|op| op.value).collect();
        assert_eq!(names.len(), ALL_OPCODES.len(), "duplicate mnemonic");
        assert_eq!(values.len(), ALL_OPCODES.len(), "duplicate opcode value");
    }

    #[test]
    fn classification() {
        assert_eq!(NOP.class(), OpcodeClass::NoOperand);
        assert_eq!(LDC_I4.class(), OpcodeClass::Value);
        assert_eq!(STLOC_S.class(), OpcodeClass::Value);
        assert_eq!(BR_S.class(), OpcodeClass::SingleTarget);
        assert_eq!(LEAVE.class(), OpcodeClass::SingleTarget);
        assert_eq!(SWITCH.class(), OpcodeClass::MultiTarget);
        assert!(SWITCH.class().is_target_bearing());
        assert!(!CALL.class().is_target_bearing());
    }

    #[test]
    fn sizes() {
        assert_eq!(NOP.size(), 1);
        assert_eq!(CEQ.size(), 2);
        assert_eq!(CEQ.bytes(), vec![0xfe, 0x01]);
        assert_eq!(OperandType::InlineSwitch.operand_size(3), 16);
        assert_eq!(OperandType::InlineR.operand_size(0), 8);
        assert_eq!(OperandType::InlineVar.operand_size(0), 2);
        assert_eq!(OperandType::ShortInlineBrTarget.operand_size(0), 1);
        assert_eq!(OperandType::InlineNone.operand_size(0), 0);
    }

    #[test]
    fn lookups() {
        assert_eq!(OpCode::from_name("bne.un.s"), Some(BNE_UN_S));
        assert_eq!(OpCode::from_name("tail."), Some(TAIL));
        assert_eq!(OpCode::from_name("frobnicate"), None);
        assert_eq!(BNE_UN_S.long_form(), Some(BNE_UN));
        assert_eq!(LEAVE_S.long_form(), Some(LEAVE));
        assert_eq!(BR.long_form(), None);
        assert_eq!(LDC_I4_S.long_form(), None);
    }
}

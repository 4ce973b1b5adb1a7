use crate::cil::{
    BodyEncoder, EncodedBody, Error, HandlerKind, InstructionId, InstructionSequence, MethodBody,
    Operand, OperandType,
};
use crate::metadata::{MetadataToken, TokenType, TypeId};
use crate::util::Offset;
use byteorder::{BigEndian, LittleEndian, WriteBytesExt};

/// Straightforward encoder for listings
///
/// Instructions are written exactly as they are, so a short branch whose target is too far is an
/// error rather than something that gets widened. String literals get consecutive user string
/// tokens, in order of first use.
#[derive(Default)]
pub struct SimpleEncoder {
    user_strings: Vec<String>,
}

impl SimpleEncoder {
    pub fn new() -> SimpleEncoder {
        SimpleEncoder::default()
    }

    /// String literals seen so far (the row of a user string token is its index plus one)
    pub fn user_strings(&self) -> &[String] {
        &self.user_strings
    }

    fn user_string_token(&mut self, string: &str) -> MetadataToken {
        let index = match self.user_strings.iter().position(|seen| seen == string) {
            Some(index) => index,
            None => {
                self.user_strings.push(string.to_owned());
                self.user_strings.len() - 1
            }
        };
        MetadataToken::new(TokenType::String, index as u32 + 1)
    }
}

impl<'g> BodyEncoder<'g> for SimpleEncoder {
    fn encode(&mut self, body: &mut MethodBody<'g>) -> Result<EncodedBody, Error> {
        let code_size = match body.compute_offsets() {
            Some(code_size) => code_size,
            None => {
                log::warn!("Refusing to encode while recomputes are suppressed");
                return Err(Error::RecomputeSuppressed);
            }
        };
        if u32::try_from(code_size.0).is_err() {
            return Err(Error::MethodCodeOverflow(code_size));
        }

        let mut method_code: Vec<u8> = Vec::with_capacity(code_size.0);
        let instructions = body.instructions();
        for (id, insn) in instructions.iter() {
            method_code.extend_from_slice(&insn.opcode().bytes());
            let operand_type = insn.opcode().operand_type;
            let next_offset = insn.offset() + insn.size();

            match insn.operand() {
                Operand::None => (),
                Operand::Int8(value) => method_code.write_i8(*value)?,
                Operand::Int32(value) => method_code.write_i32::<LittleEndian>(*value)?,
                Operand::Int64(value) => method_code.write_i64::<LittleEndian>(*value)?,
                Operand::Float32(value) => method_code.write_f32::<LittleEndian>(*value)?,
                Operand::Float64(value) => method_code.write_f64::<LittleEndian>(*value)?,
                Operand::String(value) => {
                    let token = self.user_string_token(value);
                    method_code.write_u32::<LittleEndian>(token.0)?;
                }
                Operand::Token(token) => method_code.write_u32::<LittleEndian>(token.0)?,
                Operand::Variable(variable) => {
                    let index = body
                        .variables()
                        .slot(*variable)
                        .and_then(|slot| slot.index())
                        .ok_or(Error::DetachedVariable(*variable))?;
                    write_index(&mut method_code, id, operand_type, index)?;
                }
                Operand::Argument(argument) => {
                    write_index(&mut method_code, id, operand_type, *argument as usize)?;
                }
                Operand::Target(target) => {
                    let distance = branch_distance(instructions, next_offset, *target)?;
                    if operand_type == OperandType::ShortInlineBrTarget {
                        method_code.write_i8(narrow(id, distance)?)?;
                    } else {
                        method_code.write_i32::<LittleEndian>(narrow(id, distance)?)?;
                    }
                }
                Operand::Switch(targets) => {
                    method_code.write_u32::<LittleEndian>(targets.len() as u32)?;
                    for target in targets {
                        let distance = branch_distance(instructions, next_offset, *target)?;
                        method_code.write_i32::<LittleEndian>(narrow(id, distance)?)?;
                    }
                }
            }
        }

        let exception_code = encode_exception_handlers(body, code_size)?;
        let local_vars_code = encode_local_variables(body)?;
        let method_signature = encode_method_signature(body)?;

        Ok(EncodedBody {
            method_code,
            exception_code,
            local_vars_code,
            method_signature,
            max_stack_size: None,
            code_size: code_size.0,
        })
    }
}

/// Signed distance from the end of a branch to its target
fn branch_distance(
    instructions: &InstructionSequence,
    next_offset: Offset,
    target: InstructionId,
) -> Result<isize, Error> {
    if !instructions.contains(target) {
        return Err(Error::DanglingReference(target));
    }
    Ok(instructions[target].offset() - next_offset)
}

/// Fit a branch distance into the operand width of the branch
fn narrow<T: TryFrom<isize>>(branch: InstructionId, distance: isize) -> Result<T, Error> {
    T::try_from(distance).map_err(|_| Error::BranchOutOfRange { branch, distance })
}

/// Variable or argument number, in one or two bytes depending on the opcode
fn write_index(
    code: &mut Vec<u8>,
    id: InstructionId,
    operand_type: OperandType,
    index: usize,
) -> Result<(), Error> {
    match operand_type {
        OperandType::ShortInlineVar | OperandType::ShortInlineArg => {
            let index = u8::try_from(index).map_err(|_| Error::OperandOutOfRange(id))?;
            code.write_u8(index)?;
        }
        _ => {
            let index = u16::try_from(index).map_err(|_| Error::OperandOutOfRange(id))?;
            code.write_u16::<LittleEndian>(index)?;
        }
    }
    Ok(())
}

/// Fat exception handling section (every clause gets 32-bit offsets and lengths)
fn encode_exception_handlers(body: &MethodBody<'_>, code_size: Offset) -> Result<Vec<u8>, Error> {
    const EH_TABLE: u8 = 0x01;
    const FAT_FORMAT: u8 = 0x40;

    let mut section = vec![];
    if !body.has_exception_handlers() {
        return Ok(section);
    }

    let instructions = body.instructions();
    let offset_of = |boundary: Option<InstructionId>| -> Result<u32, Error> {
        match boundary {
            None => Ok(code_size.0 as u32),
            Some(id) if instructions.contains(id) => Ok(instructions[id].offset().0 as u32),
            Some(id) => Err(Error::DanglingReference(id)),
        }
    };

    let handlers = body.exception_handlers();
    section.write_u8(EH_TABLE | FAT_FORMAT)?;
    section.write_u24::<LittleEndian>(handlers.len() as u32 * 24 + 4)?;
    for handler in handlers {
        let try_start = offset_of(Some(handler.try_start))?;
        let try_end = offset_of(handler.try_end)?;
        let handler_start = offset_of(Some(handler.handler_start))?;
        let handler_end = offset_of(handler.handler_end)?;
        let extra = match handler.kind {
            HandlerKind::Catch(catch_type) => catch_type.token.0,
            HandlerKind::Filter(filter_start) => offset_of(Some(filter_start))?,
            HandlerKind::Finally | HandlerKind::Fault => 0,
        };

        section.write_u32::<LittleEndian>(handler.kind.flags())?;
        section.write_u32::<LittleEndian>(try_start)?;
        section.write_u32::<LittleEndian>(try_end.saturating_sub(try_start))?;
        section.write_u32::<LittleEndian>(handler_start)?;
        section.write_u32::<LittleEndian>(handler_end.saturating_sub(handler_start))?;
        section.write_u32::<LittleEndian>(extra)?;
    }
    Ok(section)
}

/// `LOCAL_SIG` blob for the variables of the body
fn encode_local_variables(body: &MethodBody<'_>) -> Result<Vec<u8>, Error> {
    const LOCAL_SIG: u8 = 0x07;

    let mut signature = vec![];
    if !body.has_variables() {
        return Ok(signature);
    }
    signature.write_u8(LOCAL_SIG)?;
    write_compressed(&mut signature, body.variables().len() as u32)?;
    for (_, slot) in body.variables().iter() {
        write_type(&mut signature, slot.variable_type)?;
    }
    Ok(signature)
}

/// `MethodDefSig` blob, as far as the body knows: calling convention and no parameters
fn encode_method_signature(body: &MethodBody<'_>) -> Result<Vec<u8>, Error> {
    const DEFAULT: u8 = 0x00;
    const HAS_THIS: u8 = 0x20;
    const VOID: u8 = 0x01;

    let mut signature = vec![];
    let calling_convention = if body.method().attributes.has_this() {
        HAS_THIS
    } else {
        DEFAULT
    };
    signature.write_u8(calling_convention)?;
    write_compressed(&mut signature, 0)?;
    signature.write_u8(VOID)?;
    Ok(signature)
}

/// Element type of a type in a signature
fn write_type(signature: &mut Vec<u8>, variable_type: TypeId<'_>) -> Result<(), Error> {
    const CLASS: u8 = 0x12;
    const VALUE_TYPE: u8 = 0x11;

    let element_type = match (variable_type.namespace.as_str(), variable_type.name.as_str()) {
        ("System", "Boolean") => Some(0x02),
        ("System", "Int32") => Some(0x08),
        ("System", "Int64") => Some(0x0a),
        ("System", "Double") => Some(0x0d),
        ("System", "String") => Some(0x0e),
        ("System", "Object") => Some(0x1c),
        _ => None,
    };
    match element_type {
        Some(element_type) => signature.write_u8(element_type)?,
        None => {
            let tag = if variable_type.is_value_type {
                VALUE_TYPE
            } else {
                CLASS
            };
            signature.write_u8(tag)?;
            write_compressed(signature, type_def_or_ref(variable_type.token))?;
        }
    }
    Ok(())
}

/// `TypeDefOrRef` coded index of a type token
fn type_def_or_ref(token: MetadataToken) -> u32 {
    let tag = match token.token_type() {
        Some(TokenType::TypeRef) => 1,
        Some(TokenType::TypeSpec) => 2,
        _ => 0,
    };
    (token.rid() << 2) | tag
}

/// Compressed unsigned integer, as used throughout signature blobs
fn write_compressed(signature: &mut Vec<u8>, value: u32) -> Result<(), Error> {
    if value < 0x80 {
        signature.write_u8(value as u8)?;
    } else if value < 0x4000 {
        signature.write_u16::<BigEndian>(0x8000 | value as u16)?;
    } else {
        signature.write_u32::<BigEndian>(0xc000_0000 | value)?;
    }
    Ok(())
}

use super::Listing;
use crate::cil::{ExceptionHandler, HandlerKind, InstructionId, Operand};
use std::fmt;

impl<'g> Listing<'g> {
    /// How to refer to an instruction: its label if it has one, its offset otherwise
    fn name_of(&self, id: InstructionId) -> String {
        let instructions = self.body.instructions();
        let name = match self.label_of(id) {
            Some(label) => label.to_owned(),
            None => match instructions.instruction(id) {
                Some(insn) => format!("{:?}", insn.offset()),
                None => format!("{:?}", id),
            },
        };
        if instructions.contains(id) {
            name
        } else {
            format!("<removed {}>", name)
        }
    }

    fn region_end(&self, end: Option<InstructionId>) -> String {
        match end {
            Some(id) => self.name_of(id),
            None => String::from("end"),
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, operand: &Operand) -> fmt::Result {
        match operand {
            Operand::None => Ok(()),
            Operand::Int8(value) => write!(f, " {}", value),
            Operand::Int32(value) => write!(f, " {}", value),
            Operand::Int64(value) => write!(f, " {}", value),
            Operand::Float32(value) => write!(f, " {}", value),
            Operand::Float64(value) => write!(f, " {}", value),
            Operand::String(value) => write!(f, " \"{}\"", value.replace('"', "\\\"")),
            Operand::Token(token) => write!(f, " 0x{:08x}", token.0),
            Operand::Variable(variable) => match self.body.variables().slot(*variable) {
                Some(slot) if slot.index().is_some() => write!(f, " V_{}", slot.raw_index()),
                _ => write!(f, " <removed {:?}>", variable),
            },
            Operand::Argument(argument) => write!(f, " {}", argument),
            Operand::Target(target) => write!(f, " {}", self.name_of(*target)),
            Operand::Switch(targets) => {
                let names: Vec<String> = targets.iter().map(|id| self.name_of(*id)).collect();
                write!(f, " ({})", names.join(", "))
            }
        }
    }

    fn fmt_handler(
        &self,
        f: &mut fmt::Formatter<'_>,
        handler: &ExceptionHandler<'g>,
    ) -> fmt::Result {
        write!(
            f,
            ".try {} to {} {}",
            self.name_of(handler.try_start),
            self.region_end(handler.try_end),
            handler.kind.name()
        )?;
        match handler.kind {
            HandlerKind::Catch(catch_type) => write!(f, " {:?}", catch_type)?,
            HandlerKind::Filter(filter_start) => write!(f, " {}", self.name_of(filter_start))?,
            HandlerKind::Finally | HandlerKind::Fault => (),
        }
        writeln!(
            f,
            " handler {} to {}",
            self.name_of(handler.handler_start),
            self.region_end(handler.handler_end)
        )
    }
}

/// Render the body the way it is laid out as of the last recompute
impl<'g> fmt::Display for Listing<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = &self.body;
        let instructions = body.instructions();

        writeln!(f, ".method {:?}", body.method())?;
        if body.method().attributes.has_this() {
            if let Ok(this) = body.this_parameter() {
                writeln!(f, ".this {:?}", this)?;
            }
        }
        writeln!(
            f,
            ".maxstack {} // code size {}",
            body.max_stack_size,
            body.code_size()
        )?;
        if body.has_variables() {
            let types: Vec<String> = body
                .variables()
                .iter()
                .map(|(_, slot)| format!("{:?}", slot.variable_type))
                .collect();
            writeln!(f, ".locals {}", types.join(", "))?;
        }
        for handler in body.exception_handlers() {
            self.fmt_handler(f, handler)?;
        }

        for (id, insn) in instructions.iter() {
            let label = match self.label_of(id) {
                Some(label) => format!("{}:", label),
                None => String::new(),
            };
            write!(
                f,
                "{:?} {:>4} {:>3}  {:<10}{}",
                insn.offset(),
                insn.index(),
                insn.size(),
                label,
                insn.opcode()
            )?;
            self.fmt_operand(f, insn.operand())?;
            writeln!(f)?;
        }

        let branches: Vec<String> = instructions
            .branch_references()
            .map(|id| self.name_of(id))
            .collect();
        if !branches.is_empty() {
            writeln!(f, "// branches at {}", branches.join(", "))?;
        }
        for (branch, target) in instructions.dangling_targets() {
            writeln!(
                f,
                "// {} jumps to {}",
                self.name_of(branch),
                self.name_of(target)
            )?;
        }
        for (position, boundary, id) in body.dangling_handler_boundaries() {
            writeln!(
                f,
                "// handler {} has {:?} at {}",
                position,
                boundary,
                self.name_of(id)
            )?;
        }
        Ok(())
    }
}

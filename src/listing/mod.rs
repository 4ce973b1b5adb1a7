//! Textual listings of method bodies
//!
//! A listing is one item per line, with `//` starting a comment:
//!
//! ```text
//! .locals int32, System.Text.StringBuilder
//! .try start to handler catch System.Exception handler handler to done
//!
//! start:   ldc.i4.0
//!          stloc.s V_0
//! loop:    ldloc.s V_0
//!          ldc.i4.s 10
//!          bge.s done
//!          leave.s done
//! handler: pop
//!          leave.s done
//! done:    ret
//! ```
//!
//!   - `.locals` declares local variables by type (a few IL aliases like `int32` are understood,
//!     anything else is a full type name)
//!   - `.try` declares an exception handler: `catch <type>`, `filter <label>`, `finally`, or
//!     `fault`. Region ends are exclusive and `end` means the end of the body.
//!   - every other line is an instruction, optionally labelled. Branches name their target by
//!     label, `switch` takes a parenthesized list of labels, and variables are `V_<n>`.

use crate::cil::{InstructionId, MethodBody};

mod encode;
mod errors;
mod parse;
mod print;

pub use encode::*;
pub use errors::*;
pub use parse::*;

/// A method body along with the labels it was written with
pub struct Listing<'g> {
    pub body: MethodBody<'g>,
    labels: Vec<(String, InstructionId)>,
}

impl<'g> Listing<'g> {
    /// Instruction carrying a label
    pub fn label(&self, name: &str) -> Option<InstructionId> {
        self.labels
            .iter()
            .find(|(label, _)| label == name)
            .map(|(_, id)| *id)
    }

    /// Label of an instruction, if it has one
    pub fn label_of(&self, id: InstructionId) -> Option<&str> {
        self.labels
            .iter()
            .find(|(_, labelled)| *labelled == id)
            .map(|(label, _)| label.as_str())
    }

    /// Remove the instruction carrying a label and recompute offsets
    ///
    /// The label stays around so that dangling references to the instruction can still be named.
    pub fn remove(&mut self, name: &str) -> Result<InstructionId, ListingError> {
        let id = self
            .label(name)
            .ok_or_else(|| ListingError::UnknownLabel(name.to_owned()))?;
        self.body.editor().remove(id)?;
        self.body.compute_offsets();
        log::info!("Removed '{}'", name);
        Ok(id)
    }
}

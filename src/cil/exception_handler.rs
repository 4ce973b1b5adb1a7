use crate::cil::{InstructionId, InstructionSequence};
use crate::metadata::TypeId;

/// What runs when control leaves a protected region
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HandlerKind<'g> {
    /// Typed catch clause
    Catch(TypeId<'g>),

    /// Filtered catch clause, the filter block starting at the given instruction
    Filter(InstructionId),

    Finally,

    Fault,
}

impl<'g> HandlerKind<'g> {
    /// Clause flags as encoded in an exception handling section
    pub fn flags(&self) -> u32 {
        match self {
            HandlerKind::Catch(_) => 0x0,
            HandlerKind::Filter(_) => 0x1,
            HandlerKind::Finally => 0x2,
            HandlerKind::Fault => 0x4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HandlerKind::Catch(_) => "catch",
            HandlerKind::Filter(_) => "filter",
            HandlerKind::Finally => "finally",
            HandlerKind::Fault => "fault",
        }
    }
}

/// Which edge of a handler an instruction marks
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Boundary {
    TryStart,
    TryEnd,
    FilterStart,
    HandlerStart,
    HandlerEnd,
}

/// A protected region and its handler
///
/// Ends are exclusive. A missing end means the region runs to the end of the method body.
///
/// The boundaries are plain handles into the body's instruction sequence: removing one of those
/// instructions does not update the handler. Use [`ExceptionHandler::dangling_boundaries`] to check
/// before relying on them.
#[derive(Clone, Debug, PartialEq)]
pub struct ExceptionHandler<'g> {
    pub kind: HandlerKind<'g>,
    pub try_start: InstructionId,
    pub try_end: Option<InstructionId>,
    pub handler_start: InstructionId,
    pub handler_end: Option<InstructionId>,
}

impl<'g> ExceptionHandler<'g> {
    pub fn new(
        kind: HandlerKind<'g>,
        try_start: InstructionId,
        try_end: Option<InstructionId>,
        handler_start: InstructionId,
        handler_end: Option<InstructionId>,
    ) -> ExceptionHandler<'g> {
        ExceptionHandler {
            kind,
            try_start,
            try_end,
            handler_start,
            handler_end,
        }
    }

    pub fn catch_type(&self) -> Option<TypeId<'g>> {
        match self.kind {
            HandlerKind::Catch(catch_type) => Some(catch_type),
            _ => None,
        }
    }

    /// Every instruction the handler refers to
    pub fn boundaries(&self) -> Vec<(Boundary, InstructionId)> {
        let mut boundaries = vec![(Boundary::TryStart, self.try_start)];
        if let Some(try_end) = self.try_end {
            boundaries.push((Boundary::TryEnd, try_end));
        }
        if let HandlerKind::Filter(filter_start) = self.kind {
            boundaries.push((Boundary::FilterStart, filter_start));
        }
        boundaries.push((Boundary::HandlerStart, self.handler_start));
        if let Some(handler_end) = self.handler_end {
            boundaries.push((Boundary::HandlerEnd, handler_end));
        }
        boundaries
    }

    /// Boundaries whose instruction is not (or no longer) in the sequence
    pub fn dangling_boundaries(
        &self,
        instructions: &InstructionSequence,
    ) -> Vec<(Boundary, InstructionId)> {
        self.boundaries()
            .into_iter()
            .filter(|(_, id)| !instructions.contains(*id))
            .collect()
    }
}

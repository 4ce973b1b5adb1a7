//! Editable representation of CIL method bodies
//!
//! The crate is split the same way the data is:
//!
//!   - [`metadata`] is the owning context: types, methods, parameters, and metadata tokens. It is
//!     arena-backed, so everything in a method body borrows from it with lifetime `'g`.
//!   - [`cil`] is the method body itself: the instruction sequence, the local variable slots, the
//!     exception handler regions, and the [`cil::MethodBody`] aggregate tying them together.
//!   - [`listing`] reads and prints bodies as text, and has a simple [`cil::BodyEncoder`] for
//!     turning them into bytes.
//!
//! The body itself never encodes or decodes bytes. That is the job of a [`cil::BodyEncoder`],
//! which is handed a body once its instruction sizes are final.

pub mod cil;
pub mod listing;
pub mod metadata;
pub mod util;

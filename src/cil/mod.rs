mod editor;
mod errors;
mod exception_handler;
mod instruction;
mod instruction_sequence;
mod method_body;
pub mod opcodes;
mod scope;
mod variables;

pub use editor::*;
pub use errors::*;
pub use exception_handler::*;
pub use instruction::*;
pub use instruction_sequence::*;
pub use method_body::*;
pub use opcodes::{OpCode, OpcodeClass, OperandType};
pub use scope::*;
pub use variables::*;

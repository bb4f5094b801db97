//! Decoding of JVM method bytecode
//!
//! Bytecode is decoded into [`Instruction`]s with absolute branch targets, then fed in program
//! order to a [`BytecodeVisitor`]. The metadata needed to compile one method (argument and local
//! counts, stack depth, exception table, numeric constants) lives in [`Method`].

mod errors;
mod instruction;
mod method;
mod reader;

pub use errors::*;
pub use instruction::*;
pub use method::*;
pub use reader::*;

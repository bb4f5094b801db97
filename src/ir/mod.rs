//! Quad intermediate representation of a method
//!
//! Lowering happens in two passes over the bytecode: [`BasicBlockFinder`] splits the method into
//! a [`ControlFlowGraph`], then [`IRBuilder`] simulates the operand stack block by block and
//! emits [`Quad`]s into a [`MethodIr`]. The remaining functions here are clean-up passes run on
//! the finished IR before liveness analysis.

mod basic_block;
mod block_finder;
mod builder;
mod cfg;
mod errors;
mod method_ir;
mod operand;
mod passes;
mod phi;
mod quad;
mod variable;

pub use basic_block::*;
pub use block_finder::*;
pub use builder::*;
pub use cfg::*;
pub use errors::*;
pub use method_ir::*;
pub use operand::*;
pub use passes::*;
pub use phi::*;
pub use quad::*;
pub use variable::*;

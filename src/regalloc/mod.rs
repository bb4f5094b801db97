//! Liveness analysis and linear scan register allocation
//!
//! [`LivenessPass`] turns the live quads of a method into one [`LiveRange`] per variable, then
//! [`LinearScanAllocator`] maps every range onto a register from a [`RegisterPool`] or a spill
//! slot on the stack.

mod interval_tree;
mod linear_scan;
mod liveness;
mod register_pool;

pub use interval_tree::*;
pub use linear_scan::*;
pub use liveness::*;
pub use register_pool::*;

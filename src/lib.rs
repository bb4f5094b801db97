//! Compiles the bytecode of one JVM method into quads with registers allocated
//!
//! The pipeline is:
//!
//!   1. [`ir::BasicBlockFinder`] splits the bytecode into basic blocks
//!   2. [`ir::IRBuilder`] lowers the bytecode into quads, merging values at block entries
//!   3. dead assignments, merges, and copies get cleaned up ([`ir::eliminate_dead_code`],
//!      [`ir::apply_phis`], [`ir::coalesce_copies`])
//!   4. [`regalloc::LivenessPass`] computes live ranges
//!   5. [`regalloc::LinearScanAllocator`] assigns each range a register or a spill slot
//!
//! [`compile::compile_method`] runs all of it and hands back something a
//! [`compile::CodeGenerator`] can consume.

pub mod bytecode;
pub mod compile;
pub mod ir;
pub mod regalloc;
pub mod util;

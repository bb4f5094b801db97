//! Driver running the whole pipeline on one method

mod codegen;
mod errors;
mod settings;

pub use codegen::*;
pub use errors::*;
pub use settings::*;

use crate::bytecode::Method;
use crate::ir::{self, BasicBlockFinder, ControlFlowGraph, IRBuilder, MethodIr};
use crate::regalloc::{Allocation, LinearScanAllocator, LiveRange, LivenessPass, RegisterPool};

/// Compile a method down to quads with allocated operands
///
/// The pool should have all of its registers free. It gets all of them back once allocation is
/// done, so it can be reused for the next method. Any error means the method can't be compiled
/// and has to be interpreted instead.
pub fn compile_method(
    method: &Method,
    settings: &Settings,
    pool: &mut RegisterPool,
) -> Result<CompiledMethod, Error> {
    log::debug!("compiling {}", method.name);

    let mut cfg: ControlFlowGraph = BasicBlockFinder::find(method)?;
    let mut ir: MethodIr = IRBuilder::build(method, &mut cfg, settings.fold_constants)?;

    if settings.eliminate_dead_code {
        ir::eliminate_dead_code(&mut ir);
    }
    ir::apply_phis(&mut ir, &cfg)?;
    if settings.coalesce_copies {
        ir::coalesce_copies(&mut ir);
    }

    let live_ranges: Vec<LiveRange> = LivenessPass::run(&mut ir);
    let allocation: Allocation =
        LinearScanAllocator::new(pool, settings.spill_base, settings.spill_slot_size)
            .allocate(&mut ir, &live_ranges);

    Ok(CompiledMethod {
        name: method.name.clone(),
        cfg,
        ir,
        live_ranges,
        allocation,
    })
}

/// Compile a method with a fresh pool built from the settings
pub fn compile(method: &Method, settings: &Settings) -> Result<CompiledMethod, Error> {
    let mut pool = RegisterPool::new(settings.registers);
    compile_method(method, settings, &mut pool)
}

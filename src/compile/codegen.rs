use crate::ir::{AddressingMode, ControlFlowGraph, Location, MethodIr, Operand, Quad, VarId};
use crate::regalloc::{Allocation, LiveRange, LiveRangeTree, Register};
use std::fmt::{self, Write};

/// Method that went through the whole pipeline, ready for code generation
#[derive(Debug)]
pub struct CompiledMethod {
    pub name: String,
    pub cfg: ControlFlowGraph,
    pub ir: MethodIr,

    /// Sorted by assignment address
    pub live_ranges: Vec<LiveRange>,

    pub allocation: Allocation,
}

impl CompiledMethod {
    /// Where the value of an operand is found (`None` for constants and arguments)
    pub fn location(&self, operand: &Operand) -> Option<Location> {
        let var = operand.variable()?;
        self.ir.variable(self.ir.resolve(var)).location
    }

    pub fn addressing_mode(&self, operand: &Operand) -> Option<AddressingMode> {
        match operand {
            Operand::Constant(_) => Some(AddressingMode::Constant),
            Operand::Variable(_) => self.location(operand).map(|loc| loc.addressing_mode()),
        }
    }

    /// Argument variables, placed by the calling convention
    pub fn arguments(&self) -> &[VarId] {
        &self.ir.arguments
    }

    /// Quads to emit, in address order
    pub fn live_quads(&self) -> impl Iterator<Item = &Quad> {
        self.ir.live_quads().map(|(_, quad)| quad)
    }

    /// Registers holding live values at an address
    pub fn live_registers_at(&self, address: usize) -> Vec<(VarId, Register)> {
        let tree = LiveRangeTree::new(&self.live_ranges);
        let mut registers: Vec<(VarId, Register)> = tree
            .live_at(address)
            .into_iter()
            .filter_map(|range| {
                let register = range.location(&self.ir)?.register()?;
                Some((range.variable, register))
            })
            .collect();
        registers.sort();
        registers
    }

    /// Feed the method to a code generator, skipping dead quads
    pub fn generate_code<G: CodeGenerator>(&self, generator: &mut G) -> Result<(), G::Error> {
        generator.emit_header(self)?;
        for quad in self.live_quads() {
            generator.emit(self, quad)?;
        }
        Ok(())
    }
}

/// Consumer of compiled methods (eg. a machine code assembler)
pub trait CodeGenerator {
    type Error;

    /// Called once before any quad, to lay out arguments and spill slots
    fn emit_header(&mut self, method: &CompiledMethod) -> Result<(), Self::Error>;

    /// Called for every live quad, in address order
    fn emit(&mut self, method: &CompiledMethod, quad: &Quad) -> Result<(), Self::Error>;
}

/// Code generator producing a human readable listing of the allocated quads
#[derive(Default)]
pub struct QuadListing {
    pub output: String,
}

impl QuadListing {
    pub fn new() -> QuadListing {
        QuadListing::default()
    }

    fn describe(&mut self, method: &CompiledMethod, var: VarId) -> fmt::Result {
        let variable = method.ir.variable(var);
        match variable.location {
            Some(location) => write!(self.output, " {:?}={}", var, location),
            None if variable.is_method_argument() => write!(self.output, " {:?}=arg", var),
            None => write!(self.output, " {:?}=?", var),
        }
    }
}

impl CodeGenerator for QuadListing {
    type Error = fmt::Error;

    fn emit_header(&mut self, method: &CompiledMethod) -> fmt::Result {
        write!(self.output, "{}(", method.name)?;
        for (idx, argument) in method.arguments().iter().enumerate() {
            if idx > 0 {
                self.output.push_str(", ");
            }
            write!(self.output, "{:?}", argument)?;
        }
        writeln!(self.output, ")")?;
        write!(
            self.output,
            "  spills ({} slots):",
            method.allocation.stack_slots
        )?;
        for var in &method.allocation.spilled_variables {
            self.describe(method, *var)?;
        }
        writeln!(self.output)
    }

    fn emit(&mut self, method: &CompiledMethod, quad: &Quad) -> fmt::Result {
        let kind = method.ir.resolved_kind(quad);
        write!(self.output, "  {:>4}: {:<28};", quad.address, kind.to_string())?;
        let mut seen: Vec<VarId> = vec![];
        for var in kind.defined_variable().into_iter().chain(kind.used_variables()) {
            if !seen.contains(&var) {
                seen.push(var);
                self.describe(method, var)?;
            }
        }
        writeln!(self.output)
    }
}

use super::*;
use crate::bytecode::{self, BytecodeVisitor, Instruction, Method, ShiftType};

/// Second pass over a method's bytecode, lowering it into quads
///
/// The operand stack is simulated with one variable binding per local and stack slot: the
/// locals come first, then the stack, so `stack_offset` starts at `max_locals` in an empty
/// stack. Every write to a slot creates a new version of the variable for that slot.
///
/// Blocks are processed in address order. On entry to a block, the bindings are inherited
/// from the predecessors whose processing is already done; when more than one edge flows into
/// the block (or an edge comes from a block not yet processed, as in a loop), every live slot
/// gets a phi which collects the bindings at the end of each incoming edge.
pub struct IRBuilder<'a> {
    method: &'a Method,
    cfg: &'a mut ControlFlowGraph,
    ir: MethodIr,
    fold_constants: bool,

    /// Current binding of every local and stack slot
    variables: Vec<VarId>,

    /// Index of the first free stack slot
    stack_offset: usize,

    current_block: Option<BlockId>,

    /// Next SSA version for each slot
    ssa_values: Vec<usize>,

    /// Bindings on entry to the method
    entry_variables: Vec<VarId>,

    /// Bindings and stack offset at the end of each processed block
    exit_states: Vec<Option<(Vec<VarId>, usize)>>,
}

impl<'a> IRBuilder<'a> {
    pub fn new(
        method: &'a Method,
        cfg: &'a mut ControlFlowGraph,
        fold_constants: bool,
    ) -> IRBuilder<'a> {
        let max_locals = method.max_locals as usize;
        let slot_count = method.slot_count();
        let block_count = cfg.basic_block_count();

        let mut ir = MethodIr::new();
        let mut entry_variables = Vec::with_capacity(slot_count);
        for slot in 0..slot_count {
            let kind = if slot < method.arg_slot_count as usize {
                VariableKind::MethodArgument
            } else if slot < max_locals {
                VariableKind::Local
            } else {
                VariableKind::Stack
            };
            let var = ir.add_variable(Variable::new(kind, slot, 0, JavaType::Unknown));
            if kind == VariableKind::MethodArgument {
                ir.arguments.push(var);
            }
            entry_variables.push(var);
        }

        IRBuilder {
            method,
            cfg,
            ir,
            fold_constants,
            variables: entry_variables.clone(),
            stack_offset: max_locals,
            current_block: None,
            ssa_values: vec![1; slot_count],
            entry_variables,
            exit_states: vec![None; block_count],
        }
    }

    /// Lower the whole method
    ///
    /// The control flow graph gets the entry state of each block recorded into it.
    pub fn build(
        method: &'a Method,
        cfg: &'a mut ControlFlowGraph,
        fold_constants: bool,
    ) -> Result<MethodIr, Error> {
        let mut builder = IRBuilder::new(method, cfg, fold_constants);
        bytecode::parse(&method.code, &mut builder)?;
        Ok(builder.ir)
    }

    fn max_locals(&self) -> usize {
        self.method.max_locals as usize
    }

    /// Bindings on entry to an exception handler: the thrown exception is on the stack
    fn handler_entry(&mut self, address: usize) -> Result<(Vec<VarId>, usize), Error> {
        let slot = self.max_locals();
        let mut variables = self.entry_variables.clone();
        if slot >= variables.len() {
            return Err(Inconsistency::StackOverflow { address }.into());
        }
        variables[slot] = self.new_variable(
            VariableKind::ExceptionArgument,
            slot,
            JavaType::Reference,
        );
        Ok((variables, slot + 1))
    }

    fn enter_block(&mut self, block_id: BlockId, address: usize) -> Result<(), Error> {
        let block = &self.cfg[block_id];
        let incoming = block.incoming.clone();
        let is_first = block.start_pc == 0;
        let is_handler = block.is_exception_handler_start;
        let recorded_offset = block.stack_offset;

        // Method entry and exception dispatch count as implicit incoming edges
        let mut expected = incoming.len();
        let mut available: Vec<(Vec<VarId>, usize)> = vec![];
        if is_first {
            expected += 1;
            available.push((self.entry_variables.clone(), self.max_locals()));
        }
        if is_handler {
            expected += 1;
            let handler_entry = self.handler_entry(address)?;
            available.push(handler_entry);
        }
        for pred in &incoming {
            if let Some(exit_state) = &self.exit_states[pred.0] {
                available.push(exit_state.clone());
            }
        }

        // Without a processed incoming edge (only reached by jumping back, or not at all), the
        // bindings come from any block already done that leads here
        let (mut variables, mut stack_offset) = match available.first() {
            Some(state) => state.clone(),
            None => self.cfg[block_id]
                .predecessors
                .iter()
                .filter(|pred| self.cfg[**pred].end_pc <= address)
                .find_map(|pred| self.exit_states[pred.0].clone())
                .ok_or(Inconsistency::NoPrecedingBlock { address })?,
        };
        if !is_first && !is_handler {
            if let Some(offset) = recorded_offset {
                stack_offset = offset;
            }
        }

        let mut phis = vec![];
        if expected > 1 || expected > available.len() {
            for slot in 0..stack_offset.min(variables.len()) {
                let var = self.ir.add_variable(Variable::new(
                    VariableKind::Phi(PhiId(self.ir.phis.len())),
                    slot,
                    self.ssa_values[slot],
                    JavaType::Unknown,
                ));
                self.ssa_values[slot] += 1;
                let mut phi = PhiOperand::new(var, block_id, slot);
                for (pred_variables, _) in &available {
                    phi.add_source(pred_variables[slot]);
                }
                phis.push(self.ir.add_phi(phi));
                variables[slot] = var;
            }
        }

        log::trace!(
            "entering {:?} at {} with stack offset {} and {} phis",
            block_id,
            address,
            stack_offset,
            phis.len()
        );

        let block = self.cfg.block_mut(block_id);
        block.stack_offset = Some(stack_offset);
        block.variables = variables.clone();
        block.phis = phis;

        self.variables = variables;
        self.stack_offset = stack_offset;
        self.current_block = Some(block_id);
        Ok(())
    }

    /// Record the bindings at the end of the block and pass them along each outgoing edge
    fn exit_block(&mut self, block_id: BlockId) {
        let outgoing = self.cfg[block_id].outgoing.clone();
        for succ in outgoing {
            let succ_block = self.cfg.block_mut(succ);
            if succ_block.stack_offset.is_none() {
                succ_block.stack_offset = Some(self.stack_offset);
            }

            // Only blocks already entered have phis (the edge is a loop back-edge)
            for phi in succ_block.phis.clone() {
                let slot = self.ir.phi(phi).slot;
                self.ir.phis[phi.0].add_source(self.variables[slot]);
            }
        }
        self.exit_states[block_id.0] = Some((self.variables.clone(), self.stack_offset));
    }

    fn new_variable(&mut self, kind: VariableKind, slot: usize, ty: JavaType) -> VarId {
        let ssa_value = self.ssa_values[slot];
        self.ssa_values[slot] += 1;
        self.ir.add_variable(Variable::new(kind, slot, ssa_value, ty))
    }

    /// Set the type of a variable, or check it against the type it already has
    fn set_type(&mut self, address: usize, var: VarId, ty: JavaType) -> Result<(), Error> {
        let variable = self.ir.variable_mut(var);
        if variable.ty == JavaType::Unknown {
            variable.ty = ty;
        } else if !variable.ty.is_compatible(ty) {
            return Err(Inconsistency::TypeMismatch {
                address,
                variable: var,
                expected: variable.ty,
                found: ty,
            }
            .into());
        }
        Ok(())
    }

    fn local_slot(&self, address: usize, index: u16, ty: JavaType) -> Result<usize, Error> {
        let slot = index as usize;
        if slot + ty.width() > self.max_locals() {
            return Err(Inconsistency::InvalidLocal { address, index }.into());
        }
        Ok(slot)
    }

    /// Pop a value of the given type off the simulated stack
    fn pop(&mut self, address: usize, ty: JavaType) -> Result<VarId, Error> {
        let width = ty.width();
        if self.stack_offset < self.max_locals() + width {
            return Err(Inconsistency::StackUnderflow { address }.into());
        }
        self.stack_offset -= width;
        let var = self.variables[self.stack_offset];
        self.set_type(address, var, ty)?;
        Ok(var)
    }

    /// Push a fresh stack variable of the given type
    fn push(&mut self, address: usize, ty: JavaType) -> Result<VarId, Error> {
        let slot = self.stack_offset;
        if slot + ty.width() > self.variables.len() {
            return Err(Inconsistency::StackOverflow { address }.into());
        }
        self.stack_offset += ty.width();
        let var = self.new_variable(VariableKind::Stack, slot, ty);
        self.variables[slot] = var;
        Ok(var)
    }

    /// Operand for reading a variable in a computation
    ///
    /// Variables holding constants get replaced by the constant, so computations on them fold.
    fn operand(&self, var: VarId) -> Operand {
        if self.fold_constants {
            if let Some(constant) = self.ir.constant_value(var) {
                return Operand::Constant(constant);
            }
        }
        Operand::Variable(var)
    }

    fn emit(&mut self, address: usize, kind: QuadKind) -> Result<QuadId, Error> {
        let block = self
            .current_block
            .ok_or(Inconsistency::InstructionOutsideBlock { address })?;
        let kind = if self.fold_constants {
            kind.fold_constants()
        } else {
            kind
        };
        let defined = kind.defined_variable();
        let used = kind.used_variables();
        let quad = self.ir.add_quad(Quad::new(address, block, kind));
        if let Some(lhs) = defined {
            self.ir.variable_mut(lhs).assign_op = Some(quad);
        }
        for var in used {
            self.ir.variable_mut(var).last_use_op = Some(quad);
        }
        Ok(quad)
    }

    fn constant(&mut self, address: usize, value: Constant) -> Result<(), Error> {
        let lhs = self.push(address, value.java_type())?;
        self.emit(address, QuadKind::ConstantRefAssign { lhs, value })?;
        Ok(())
    }

    fn load(&mut self, address: usize, index: u16, ty: JavaType) -> Result<(), Error> {
        let slot = self.local_slot(address, index, ty)?;
        let rhs = self.variables[slot];
        self.set_type(address, rhs, ty)?;
        let lhs = self.push(address, ty)?;
        self.emit(address, QuadKind::VariableRefAssign { lhs, rhs })?;
        Ok(())
    }

    fn store(&mut self, address: usize, index: u16, ty: JavaType) -> Result<(), Error> {
        let rhs = self.pop(address, ty)?;
        let slot = self.local_slot(address, index, ty)?;
        let lhs = self.new_variable(VariableKind::Local, slot, ty);
        self.variables[slot] = lhs;
        self.emit(address, QuadKind::VariableRefAssign { lhs, rhs })?;
        Ok(())
    }

    fn binary(&mut self, address: usize, operation: BinaryOperation) -> Result<(), Error> {
        let (type1, type2) = operation.operand_types();
        let var2 = self.pop(address, type2)?;
        let var1 = self.pop(address, type1)?;
        let operand1 = self.operand(var1);
        let operand2 = self.operand(var2);
        let lhs = self.push(address, operation.result_type())?;
        self.emit(
            address,
            QuadKind::Binary {
                lhs,
                operand1,
                operation,
                operand2,
            },
        )?;
        Ok(())
    }

    fn unary(&mut self, address: usize, operation: UnaryOperation) -> Result<(), Error> {
        let var = self.pop(address, operation.operand_type())?;
        let operand = self.operand(var);
        let lhs = self.push(address, operation.result_type())?;
        self.emit(
            address,
            QuadKind::Unary {
                lhs,
                operation,
                operand,
            },
        )?;
        Ok(())
    }

    fn increment(&mut self, address: usize, index: u16, by: i16) -> Result<(), Error> {
        let slot = self.local_slot(address, index, JavaType::Int)?;
        let rhs = self.variables[slot];
        self.set_type(address, rhs, JavaType::Int)?;
        let operand1 = self.operand(rhs);
        let lhs = self.new_variable(VariableKind::Local, slot, JavaType::Int);
        self.variables[slot] = lhs;
        self.emit(
            address,
            QuadKind::Binary {
                lhs,
                operand1,
                operation: BinaryOperation::IAdd,
                operand2: Operand::Constant(Constant::Int(by as i32)),
            },
        )?;
        Ok(())
    }

    fn branch(
        &mut self,
        address: usize,
        condition: BranchCondition,
        target: usize,
    ) -> Result<(), Error> {
        let ty = condition.operand_type();
        let (operand1, operand2) = if condition.is_binary() {
            let var2 = self.pop(address, ty)?;
            let var1 = self.pop(address, ty)?;
            (Operand::Variable(var1), Some(Operand::Variable(var2)))
        } else {
            (Operand::Variable(self.pop(address, ty)?), None)
        };
        self.emit(
            address,
            QuadKind::ConditionalBranch {
                operand1,
                condition,
                operand2,
                target,
            },
        )?;
        Ok(())
    }

    fn var_return(&mut self, address: usize, ty: JavaType) -> Result<(), Error> {
        let value = Operand::Variable(self.pop(address, ty)?);
        self.emit(address, QuadKind::VarReturn { value })?;
        Ok(())
    }
}

impl<'a> BytecodeVisitor for IRBuilder<'a> {
    type Error = Error;

    fn start_instruction(&mut self, address: usize) -> Result<(), Error> {
        let in_current_block = match self.current_block {
            Some(block) => address < self.cfg[block].end_pc,
            None => false,
        };
        if !in_current_block {
            if let Some(block) = self.current_block {
                self.exit_block(block);
            }
            let next_block = self
                .cfg
                .basic_block_at(address)
                .ok_or(Inconsistency::InstructionOutsideBlock { address })?;
            self.enter_block(next_block, address)?;
        }
        Ok(())
    }

    fn visit(&mut self, address: usize, instruction: &Instruction) -> Result<(), Error> {
        use Instruction::*;
        match instruction {
            Nop => Ok(()),
            AConstNull => self.constant(address, Constant::Null),
            IConstM1 => self.constant(address, Constant::Int(-1)),
            IConst0 => self.constant(address, Constant::Int(0)),
            IConst1 => self.constant(address, Constant::Int(1)),
            IConst2 => self.constant(address, Constant::Int(2)),
            IConst3 => self.constant(address, Constant::Int(3)),
            IConst4 => self.constant(address, Constant::Int(4)),
            IConst5 => self.constant(address, Constant::Int(5)),
            LConst0 => self.constant(address, Constant::Long(0)),
            LConst1 => self.constant(address, Constant::Long(1)),
            FConst0 => self.constant(address, Constant::Float(0.0)),
            FConst1 => self.constant(address, Constant::Float(1.0)),
            FConst2 => self.constant(address, Constant::Float(2.0)),
            DConst0 => self.constant(address, Constant::Double(0.0)),
            DConst1 => self.constant(address, Constant::Double(1.0)),
            BiPush(b) => self.constant(address, Constant::Int(*b as i32)),
            SiPush(s) => self.constant(address, Constant::Int(*s as i32)),
            Ldc(index) | Ldc2(index) => match self.method.constants.get(index) {
                Some(constant) => self.constant(address, Constant::from(*constant)),
                None => Err(Error::Unsupported {
                    address,
                    instruction: instruction.clone(),
                }),
            },

            ILoad(index) => self.load(address, *index, JavaType::Int),
            LLoad(index) => self.load(address, *index, JavaType::Long),
            FLoad(index) => self.load(address, *index, JavaType::Float),
            DLoad(index) => self.load(address, *index, JavaType::Double),
            ALoad(index) => self.load(address, *index, JavaType::Reference),
            IStore(index) => self.store(address, *index, JavaType::Int),
            LStore(index) => self.store(address, *index, JavaType::Long),
            FStore(index) => self.store(address, *index, JavaType::Float),
            DStore(index) => self.store(address, *index, JavaType::Double),
            AStore(index) => self.store(address, *index, JavaType::Reference),

            IAdd => self.binary(address, BinaryOperation::IAdd),
            LAdd => self.binary(address, BinaryOperation::LAdd),
            FAdd => self.binary(address, BinaryOperation::FAdd),
            DAdd => self.binary(address, BinaryOperation::DAdd),
            ISub => self.binary(address, BinaryOperation::ISub),
            LSub => self.binary(address, BinaryOperation::LSub),
            FSub => self.binary(address, BinaryOperation::FSub),
            DSub => self.binary(address, BinaryOperation::DSub),
            IMul => self.binary(address, BinaryOperation::IMul),
            LMul => self.binary(address, BinaryOperation::LMul),
            FMul => self.binary(address, BinaryOperation::FMul),
            DMul => self.binary(address, BinaryOperation::DMul),
            IDiv => self.binary(address, BinaryOperation::IDiv),
            LDiv => self.binary(address, BinaryOperation::LDiv),
            FDiv => self.binary(address, BinaryOperation::FDiv),
            DDiv => self.binary(address, BinaryOperation::DDiv),
            IRem => self.binary(address, BinaryOperation::IRem),
            LRem => self.binary(address, BinaryOperation::LRem),
            FRem => self.binary(address, BinaryOperation::FRem),
            DRem => self.binary(address, BinaryOperation::DRem),
            ISh(ShiftType::Left) => self.binary(address, BinaryOperation::IShl),
            ISh(ShiftType::ArithmeticRight) => self.binary(address, BinaryOperation::IShr),
            ISh(ShiftType::LogicalRight) => self.binary(address, BinaryOperation::IUShr),
            LSh(ShiftType::Left) => self.binary(address, BinaryOperation::LShl),
            LSh(ShiftType::ArithmeticRight) => self.binary(address, BinaryOperation::LShr),
            LSh(ShiftType::LogicalRight) => self.binary(address, BinaryOperation::LUShr),
            IAnd => self.binary(address, BinaryOperation::IAnd),
            LAnd => self.binary(address, BinaryOperation::LAnd),
            IOr => self.binary(address, BinaryOperation::IOr),
            LOr => self.binary(address, BinaryOperation::LOr),
            IXor => self.binary(address, BinaryOperation::IXor),
            LXor => self.binary(address, BinaryOperation::LXor),
            IInc(index, by) => self.increment(address, *index, *by),

            INeg => self.unary(address, UnaryOperation::INeg),
            LNeg => self.unary(address, UnaryOperation::LNeg),
            FNeg => self.unary(address, UnaryOperation::FNeg),
            DNeg => self.unary(address, UnaryOperation::DNeg),
            I2L => self.unary(address, UnaryOperation::I2L),
            I2F => self.unary(address, UnaryOperation::I2F),
            I2D => self.unary(address, UnaryOperation::I2D),
            L2I => self.unary(address, UnaryOperation::L2I),
            L2F => self.unary(address, UnaryOperation::L2F),
            L2D => self.unary(address, UnaryOperation::L2D),
            F2I => self.unary(address, UnaryOperation::F2I),
            F2L => self.unary(address, UnaryOperation::F2L),
            F2D => self.unary(address, UnaryOperation::F2D),
            D2I => self.unary(address, UnaryOperation::D2I),
            D2L => self.unary(address, UnaryOperation::D2L),
            D2F => self.unary(address, UnaryOperation::D2F),
            I2B => self.unary(address, UnaryOperation::I2B),
            I2C => self.unary(address, UnaryOperation::I2C),
            I2S => self.unary(address, UnaryOperation::I2S),

            If(cmp, target) => self.branch(address, BranchCondition::Zero(*cmp), *target),
            IfICmp(cmp, target) => self.branch(address, BranchCondition::ICmp(*cmp), *target),
            IfACmp(cmp, target) => self.branch(address, BranchCondition::ACmp(*cmp), *target),
            IfNull(cmp, target) => self.branch(address, BranchCondition::Null(*cmp), *target),
            Goto(target) => {
                self.emit(address, QuadKind::UnconditionalBranch { target: *target })?;
                Ok(())
            }

            IReturn => self.var_return(address, JavaType::Int),
            LReturn => self.var_return(address, JavaType::Long),
            FReturn => self.var_return(address, JavaType::Float),
            DReturn => self.var_return(address, JavaType::Double),
            AReturn => self.var_return(address, JavaType::Reference),
            Return => {
                self.emit(address, QuadKind::VoidReturn)?;
                Ok(())
            }

            _ => Err(Error::Unsupported {
                address,
                instruction: instruction.clone(),
            }),
        }
    }

    fn end_method(&mut self) -> Result<(), Error> {
        if let Some(block) = self.current_block {
            self.exit_block(block);
        }
        simplify_phis(&self.ir.variables, &mut self.ir.phis);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn lower(method: &Method) -> (ControlFlowGraph, MethodIr) {
        let mut cfg = match BasicBlockFinder::find(method) {
            Ok(cfg) => cfg,
            Err(err) => panic!("block discovery failed: {:?}", err),
        };
        let ir = match IRBuilder::build(method, &mut cfg, true) {
            Ok(ir) => ir,
            Err(err) => panic!("lowering failed: {:?}", err),
        };
        (cfg, ir)
    }

    fn kinds(ir: &MethodIr) -> Vec<QuadKind> {
        ir.quads.iter().map(|quad| quad.kind.clone()).collect()
    }

    #[test]
    fn constant_add_folds() {
        let method = Method::new("add", 0, 0, 2, vec![0x04, 0x05, 0x60, 0xac]);
        let (_, ir) = lower(&method);
        let quads = kinds(&ir);
        assert_eq!(quads.len(), 4);
        assert!(matches!(
            quads[2],
            QuadKind::ConstantRefAssign {
                value: Constant::Int(3),
                ..
            }
        ));
        assert!(matches!(quads[3], QuadKind::VarReturn { .. }));
    }

    #[test]
    fn without_folding_the_add_stays() {
        let method = Method::new("add", 0, 0, 2, vec![0x04, 0x05, 0x60, 0xac]);
        let mut cfg = BasicBlockFinder::find(&method).expect("blocks");
        let ir = IRBuilder::build(&method, &mut cfg, false).expect("lowering");
        assert!(matches!(
            ir.quads[2].kind,
            QuadKind::Binary {
                operand1: Operand::Variable(_),
                operation: BinaryOperation::IAdd,
                operand2: Operand::Variable(_),
                ..
            }
        ));
    }

    #[test]
    fn arguments_and_slots() {
        // static int f(int a, long b) { return a; }  (b takes slots 1 and 2)
        let method = Method::new("args", 3, 3, 1, vec![0x1a, 0xac]);
        let (cfg, ir) = lower(&method);
        assert_eq!(ir.arguments.len(), 3);
        assert!(ir.arguments.iter().all(|arg| ir.variable(*arg).is_method_argument()));
        assert_eq!(ir.variable(ir.arguments[0]).ty, JavaType::Int);
        assert_eq!(ir.variable(ir.arguments[1]).ty, JavaType::Unknown);
        assert_eq!(cfg[BlockId(0)].stack_offset, Some(3));
        assert_eq!(
            ir.quads[0].kind,
            QuadKind::VariableRefAssign {
                lhs: VarId(4),
                rhs: ir.arguments[0]
            }
        );
    }

    #[test]
    fn long_values_take_two_slots() {
        // lconst_1; lconst_1; ladd; l2i; ireturn
        let method = Method::new("long", 0, 0, 4, vec![0x0a, 0x0a, 0x61, 0x88, 0xac]);
        let (_, ir) = lower(&method);
        let quads = kinds(&ir);
        assert_eq!(
            quads[2],
            QuadKind::ConstantRefAssign {
                lhs: VarId(6),
                value: Constant::Long(2)
            }
        );
        assert_eq!(ir.variable(VarId(6)).index, 0);
        assert_eq!(
            quads[3],
            QuadKind::ConstantRefAssign {
                lhs: VarId(7),
                value: Constant::Int(2)
            }
        );
    }

    #[test]
    fn loop_header_gets_phis() {
        let code = vec![
            0x03, 0x3c, 0x1b, 0x04, 0x60, 0x3c, 0x1b, 0x10, 0x0a, 0xa2, 0x00, 0x06, 0xa7, 0xff,
            0xf6, 0x03, 0xac,
        ];
        let method = Method::new("loop", 1, 2, 2, code);
        let (cfg, ir) = lower(&method);
        let header = &cfg[BlockId(1)];
        assert_eq!(header.phis.len(), 2);

        let counter = ir.phi(header.phis[1]);
        assert_eq!(counter.slot, 1);
        assert_eq!(counter.sources.len(), 2);
        match &counter.resolution {
            PhiResolution::Merged { canonical, others } => {
                assert_eq!(ir.variable(*canonical).kind, VariableKind::Local);
                assert_eq!(others.len(), 1);
            }
            other => panic!("expected a merge, got {:?}", other),
        }

        // The argument flows around the loop unchanged
        let argument = ir.phi(header.phis[0]);
        assert_eq!(
            argument.resolution,
            PhiResolution::Collapsed(ir.arguments[0])
        );
    }

    #[test]
    fn body_reached_only_by_back_edge() {
        // 0: iconst_0; 1: istore_1; 2: goto 8; 5: iinc 1 1;
        // 8: iload_1; 9: bipush 10; 11: if_icmplt 5; 14: iload_1; 15: ireturn
        let code = vec![
            0x03, 0x3c, 0xa7, 0x00, 0x06, 0x84, 0x01, 0x01, 0x1b, 0x10, 0x0a, 0xa1, 0xff, 0xfa,
            0x1b, 0xac,
        ];
        let method = Method::new("count", 0, 2, 2, code);
        let (cfg, ir) = lower(&method);
        let body = cfg.basic_block_at(5).expect("body block");
        let test = cfg.basic_block_at(8).expect("test block");
        assert_eq!(cfg[body].incoming, vec![test]);
        assert_eq!(cfg[body].stack_offset, Some(2));
        assert_eq!(cfg[body].phis.len(), 2);

        // The body only sees the value coming around from the test
        let counter = ir.phi(cfg[body].phis[1]);
        assert_eq!(counter.sources, vec![ir.phi(cfg[test].phis[1]).variable]);
        assert_eq!(counter.resolution, ir.phi(cfg[test].phis[1]).resolution);
        assert!(matches!(
            counter.resolution,
            PhiResolution::Merged { ref others, .. } if others.len() == 1
        ));
    }

    #[test]
    fn handler_without_stack_room() {
        // 0: return; 1: return (handler)
        let method = Method::new("nostack", 0, 0, 0, vec![0xb1, 0xb1]).with_exception_handler(
            bytecode::ExceptionHandler {
                start_pc: 0,
                end_pc: 1,
                handler_pc: 1,
            },
        );
        let mut cfg = BasicBlockFinder::find(&method).expect("blocks");
        match IRBuilder::build(&method, &mut cfg, true) {
            Err(Error::Inconsistency(Inconsistency::StackOverflow { address: 1 })) => (),
            other => panic!("expected stack overflow, got {:?}", other),
        }
    }

    #[test]
    fn exception_handler_entry() {
        // 0: iconst_1; 1: ireturn; 2: astore_0; 3: iconst_0; 4: ireturn
        let code = vec![0x04, 0xac, 0x4b, 0x03, 0xac];
        let method = Method::new("catch", 0, 1, 1, code).with_exception_handler(
            bytecode::ExceptionHandler {
                start_pc: 0,
                end_pc: 1,
                handler_pc: 2,
            },
        );
        let (cfg, ir) = lower(&method);
        let handler = cfg.basic_block_at(2).expect("handler block");
        assert_eq!(cfg[handler].stack_offset, Some(2));
        let exception = ir
            .variables
            .iter()
            .find(|var| var.kind == VariableKind::ExceptionArgument)
            .expect("exception argument");
        assert_eq!(exception.ty, JavaType::Reference);
        assert_eq!(exception.index, 1);
    }

    #[test]
    fn unsupported_instruction() {
        // iconst_0; newarray int; areturn
        let method = Method::new("array", 0, 0, 1, vec![0x03, 0xbc, 0x0a, 0xb0]);
        let mut cfg = BasicBlockFinder::find(&method).expect("blocks");
        match IRBuilder::build(&method, &mut cfg, true) {
            Err(Error::Unsupported {
                address: 1,
                instruction: Instruction::NewArray(10),
            }) => (),
            other => panic!("expected unsupported newarray, got {:?}", other),
        }
    }

    #[test]
    fn type_mismatch_is_an_error() {
        // fconst_1; istore_0 (a float stored as an int)
        let method = Method::new("bad", 0, 1, 1, vec![0x0c, 0x3b, 0xb1]);
        let mut cfg = BasicBlockFinder::find(&method).expect("blocks");
        match IRBuilder::build(&method, &mut cfg, true) {
            Err(Error::Inconsistency(Inconsistency::TypeMismatch {
                address: 1,
                expected: JavaType::Float,
                found: JavaType::Int,
                ..
            })) => (),
            other => panic!("expected a type mismatch, got {:?}", other),
        }
    }

    #[test]
    fn stack_underflow() {
        let method = Method::new("underflow", 0, 0, 1, vec![0x60, 0xac]);
        let mut cfg = BasicBlockFinder::find(&method).expect("blocks");
        match IRBuilder::build(&method, &mut cfg, true) {
            Err(Error::Inconsistency(Inconsistency::StackUnderflow { address: 0 })) => (),
            other => panic!("expected stack underflow, got {:?}", other),
        }
    }

    #[test]
    fn numeric_ldc() {
        // ldc #3; ireturn
        let method = Method::new("ldc", 0, 0, 1, vec![0x12, 0x03, 0xac])
            .with_constant(3, bytecode::LoadableConstant::Integer(1234));
        let (_, ir) = lower(&method);
        assert!(matches!(
            ir.quads[0].kind,
            QuadKind::ConstantRefAssign {
                value: Constant::Int(1234),
                ..
            }
        ));

        let missing = Method::new("ldc", 0, 0, 1, vec![0x12, 0x04, 0xac]);
        let mut cfg = BasicBlockFinder::find(&missing).expect("blocks");
        assert!(matches!(
            IRBuilder::build(&missing, &mut cfg, true),
            Err(Error::Unsupported { address: 0, .. })
        ));
    }

    #[test]
    fn iinc_adds_a_constant() {
        // iconst_2; istore_0; iinc 0 5; iload_0; ireturn
        let method = Method::new("iinc", 0, 1, 1, vec![0x05, 0x3b, 0x84, 0x00, 0x05, 0x1a, 0xac]);
        let (_, ir) = lower(&method);
        // The store copies a stack variable, so only the constant itself propagates
        assert!(matches!(
            ir.quads[2].kind,
            QuadKind::Binary {
                operation: BinaryOperation::IAdd,
                operand2: Operand::Constant(Constant::Int(5)),
                ..
            }
        ));
    }
}

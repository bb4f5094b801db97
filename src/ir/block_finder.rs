use super::*;
use crate::bytecode::{self, BytecodeVisitor, ControlFlow, Instruction, Method};
use std::collections::{BTreeSet, HashSet};

/// First pass over a method's bytecode, discovering where basic blocks start
///
/// Block starts come from:
///
///   - the first instruction
///   - the try-start, try-end, and handler addresses of every exception handler
///   - every branch or switch target
///   - the instruction after a branch, switch, return, `athrow` or `ret`
///
/// Only conditional branches and switches get a fall-through edge into the next block.
pub struct BasicBlockFinder<'a> {
    method: &'a Method,

    /// Blocks in the order they were discovered
    blocks: Vec<BasicBlock>,

    /// Whether a block starts at a given address
    block_starts: Vec<bool>,

    /// Branch edges, as `(branch instruction address, target address)`
    branches: Vec<(usize, usize)>,

    /// Addresses of all instructions, in order
    instructions: Vec<usize>,

    /// Instructions after which control never reaches the next instruction
    no_fall_through: HashSet<usize>,

    /// The next instruction visited starts a new block
    start_next: bool,
}

impl<'a> BasicBlockFinder<'a> {
    pub fn new(method: &'a Method) -> BasicBlockFinder<'a> {
        BasicBlockFinder {
            method,
            blocks: vec![],
            block_starts: vec![false; method.code.len()],
            branches: vec![],
            instructions: vec![],
            no_fall_through: HashSet::new(),
            start_next: false,
        }
    }

    /// Run the finder over the method and build its control flow graph
    pub fn find(method: &'a Method) -> Result<ControlFlowGraph, Error> {
        let mut finder = BasicBlockFinder::new(method);
        bytecode::parse(&method.code, &mut finder)?;
        finder.into_graph()
    }

    /// Mark the start of a block, reusing the block if one already starts there
    fn start_block(&mut self, address: usize, is_exception_handler_start: bool) {
        if address >= self.block_starts.len() {
            return;
        }
        if let Some(block) = self
            .blocks
            .iter_mut()
            .find(|block| block.start_pc == address)
        {
            block.is_exception_handler_start |= is_exception_handler_start;
            return;
        }
        self.block_starts[address] = true;
        self.blocks
            .push(BasicBlock::new(address, is_exception_handler_start));
    }

    fn into_graph(mut self) -> Result<ControlFlowGraph, Error> {
        let code_length = self.method.code.len();

        // Exception table entries can point anywhere, so check them against instructions
        for block in &self.blocks {
            if self.instructions.binary_search(&block.start_pc).is_err() {
                return Err(Error::Bytecode(bytecode::Error::InvalidBranchTarget {
                    address: block.start_pc,
                    target: block.start_pc as isize,
                }));
            }
        }

        self.blocks.sort_by_key(|block| block.start_pc);
        let starts: Vec<usize> = self
            .block_starts
            .iter()
            .enumerate()
            .filter(|(_, is_start)| **is_start)
            .map(|(address, _)| address)
            .collect();
        if starts.len() != self.blocks.len() {
            return Err(Inconsistency::BlockCountMismatch {
                expected: starts.len(),
                found: self.blocks.len(),
            }
            .into());
        }
        for (index, (block, start)) in self.blocks.iter().zip(&starts).enumerate() {
            if block.start_pc != *start {
                return Err(Inconsistency::BlockStartMismatch {
                    index,
                    expected: *start,
                    found: block.start_pc,
                }
                .into());
            }
        }

        let block_count = self.blocks.len();
        for idx in 0..block_count {
            self.blocks[idx].end_pc = self
                .blocks
                .get(idx + 1)
                .map_or(code_length, |next| next.start_pc);
        }

        // Fall-through edges first, then branches
        let mut edges: Vec<(BlockId, BlockId)> = vec![];
        for idx in 0..block_count.saturating_sub(1) {
            let block = &self.blocks[idx];
            let last_instruction = self
                .instructions
                .iter()
                .rev()
                .find(|address| block.contains(**address));
            let falls_through = match last_instruction {
                Some(address) => !self.no_fall_through.contains(address),
                None => true,
            };
            if falls_through {
                edges.push((BlockId(idx), BlockId(idx + 1)));
            }
        }
        for (from, to) in &self.branches {
            let from_block = self.block_containing(*from)?;
            let to_block = self.block_containing(*to)?;
            edges.push((from_block, to_block));
        }
        for (from, to) in edges {
            if !self.blocks[from.0].outgoing.contains(&to) {
                self.blocks[from.0].outgoing.push(to);
                self.blocks[to.0].incoming.push(from);
            }
        }

        self.close_edges();

        log::debug!(
            "{}: found {} basic blocks in {} bytes of code",
            self.method.name,
            block_count,
            code_length
        );
        Ok(ControlFlowGraph::new(self.blocks, code_length))
    }

    fn block_containing(&self, address: usize) -> Result<BlockId, Error> {
        self.blocks
            .iter()
            .position(|block| block.contains(address))
            .map(BlockId)
            .ok_or_else(|| Inconsistency::InstructionOutsideBlock { address }.into())
    }

    /// Compute the transitively closed predecessor and successor sets from the direct edges
    ///
    /// A block is its own predecessor exactly when it is part of a cycle.
    fn close_edges(&mut self) {
        let block_count = self.blocks.len();
        for idx in 0..block_count {
            let mut predecessors: BTreeSet<BlockId> = BTreeSet::new();
            let mut to_visit: Vec<BlockId> = self.blocks[idx].incoming.clone();
            while let Some(pred) = to_visit.pop() {
                if predecessors.insert(pred) {
                    to_visit.extend(self.blocks[pred.0].incoming.iter().copied());
                }
            }
            self.blocks[idx].predecessors = predecessors;
        }

        for idx in 0..block_count {
            let predecessors: Vec<BlockId> =
                self.blocks[idx].predecessors.iter().copied().collect();
            for pred in predecessors {
                self.blocks[pred.0].successors.insert(BlockId(idx));
            }
        }

        for idx in 0..block_count {
            let last_predecessor = self.blocks[idx]
                .predecessors
                .iter()
                .copied()
                .max_by_key(|pred| self.blocks[pred.0].end_pc);
            self.blocks[idx].last_predecessor = last_predecessor;
        }
    }
}

impl<'a> BytecodeVisitor for BasicBlockFinder<'a> {
    type Error = Error;

    fn start_method(&mut self) -> Result<(), Error> {
        let method = self.method;
        self.start_block(0, false);
        for handler in &method.exception_table {
            self.start_block(handler.start_pc, false);
            self.start_block(handler.end_pc, false);
            self.start_block(handler.handler_pc, true);
        }
        Ok(())
    }

    fn start_instruction(&mut self, address: usize) -> Result<(), Error> {
        self.instructions.push(address);
        if self.start_next {
            self.start_next = false;
            self.start_block(address, false);
        }
        Ok(())
    }

    fn visit(&mut self, address: usize, instruction: &Instruction) -> Result<(), Error> {
        match instruction.control_flow() {
            ControlFlow::Continue => (),
            ControlFlow::Branch {
                targets,
                falls_through,
            } => {
                for target in targets {
                    self.start_block(target, false);
                    self.branches.push((address, target));
                }
                if !falls_through {
                    self.no_fall_through.insert(address);
                }
                self.start_next = true;
            }
            ControlFlow::Terminal => {
                self.no_fall_through.insert(address);
                self.start_next = true;
            }
        }
        Ok(())
    }
}

use super::{BasicBlock, BlockId};
use std::fmt;
use std::ops::Index;

/// Basic blocks of one method, sorted by start address
#[derive(Clone, Debug)]
pub struct ControlFlowGraph {
    blocks: Vec<BasicBlock>,
    code_length: usize,
}

impl ControlFlowGraph {
    pub(crate) fn new(blocks: Vec<BasicBlock>, code_length: usize) -> ControlFlowGraph {
        ControlFlowGraph {
            blocks,
            code_length,
        }
    }

    /// Blocks in ascending start address order
    pub fn basic_blocks(&self) -> impl Iterator<Item = (BlockId, &BasicBlock)> {
        self.blocks
            .iter()
            .enumerate()
            .map(|(idx, block)| (BlockId(idx), block))
    }

    pub fn basic_block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Block whose range contains the address
    pub fn basic_block_at(&self, pc: usize) -> Option<BlockId> {
        self.blocks
            .iter()
            .position(|block| block.contains(pc))
            .map(BlockId)
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.0]
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.0]
    }

    pub fn code_length(&self) -> usize {
        self.code_length
    }
}

impl Index<BlockId> for ControlFlowGraph {
    type Output = BasicBlock;

    fn index(&self, id: BlockId) -> &BasicBlock {
        self.block(id)
    }
}

impl fmt::Display for ControlFlowGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, block) in self.basic_blocks() {
            write!(f, "{:?} [{}, {})", id, block.start_pc, block.end_pc)?;
            if block.is_exception_handler_start {
                f.write_str(" handler")?;
            }
            writeln!(f)?;
            writeln!(f, "    predecessors: {:?}", block.predecessors)?;
            writeln!(f, "    successors:   {:?}", block.successors)?;
        }
        Ok(())
    }
}

use super::{PhiId, VarId};
use std::collections::BTreeSet;
use std::fmt;

/// Index of a block in the [`super::ControlFlowGraph`] (blocks are sorted by start address)
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub usize);

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// Straight-line run of bytecode covering `[start_pc, end_pc)`
#[derive(Clone, Debug)]
pub struct BasicBlock {
    pub start_pc: usize,
    pub end_pc: usize,
    pub is_exception_handler_start: bool,

    /// Every block from which this block can be reached (transitively closed)
    pub predecessors: BTreeSet<BlockId>,

    /// Every block reachable from this block (transitively closed)
    pub successors: BTreeSet<BlockId>,

    /// Blocks with a direct edge into this block
    pub incoming: Vec<BlockId>,

    /// Blocks this block has a direct edge into
    pub outgoing: Vec<BlockId>,

    /// Predecessor with the highest end address
    pub last_predecessor: Option<BlockId>,

    /// Operand stack depth on entry (as a slot index, so it starts at `max_locals`)
    pub stack_offset: Option<usize>,

    /// Variables live into the block, one per local and stack slot
    pub variables: Vec<VarId>,

    /// Merges created on entry to the block
    pub phis: Vec<PhiId>,
}

impl BasicBlock {
    pub fn new(start_pc: usize, is_exception_handler_start: bool) -> BasicBlock {
        BasicBlock {
            start_pc,
            end_pc: start_pc,
            is_exception_handler_start,
            predecessors: BTreeSet::new(),
            successors: BTreeSet::new(),
            incoming: vec![],
            outgoing: vec![],
            last_predecessor: None,
            stack_offset: None,
            variables: vec![],
            phis: vec![],
        }
    }

    pub fn contains(&self, pc: usize) -> bool {
        self.start_pc <= pc && pc < self.end_pc
    }

    /// Is there an edge into this block from a block at or after it?
    pub fn is_loop_header(&self, id: BlockId) -> bool {
        self.incoming.iter().any(|pred| *pred >= id)
    }
}

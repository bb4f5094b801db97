use super::{JavaType, PhiId, VarId};
use crate::bytecode::{self, Instruction};

#[derive(Debug)]
pub enum Error {
    /// Bytecode could not be decoded
    Bytecode(bytecode::Error),

    /// Instruction has no lowering into quads, so the method can't be compiled
    Unsupported {
        address: usize,
        instruction: Instruction,
    },

    /// Internal invariant was violated (indicates a bug or unverified bytecode)
    Inconsistency(Inconsistency),
}

#[derive(Debug)]
pub enum Inconsistency {
    /// Number of blocks doesn't match the number of addresses marked as block starts
    BlockCountMismatch { expected: usize, found: usize },

    /// Block at this position in the sorted block list starts at the wrong address
    BlockStartMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },

    /// Instruction does not fall into any block
    InstructionOutsideBlock { address: usize },

    /// Block has no already-processed predecessor to inherit variables from
    NoPrecedingBlock { address: usize },

    StackUnderflow { address: usize },
    StackOverflow { address: usize },

    /// Local variable index is past `max_locals`
    InvalidLocal { address: usize, index: u16 },

    /// SSA value used at a type incompatible with the one it already has
    TypeMismatch {
        address: usize,
        variable: VarId,
        expected: JavaType,
        found: JavaType,
    },

    /// Phi sources with incompatible types
    PhiTypeMismatch {
        phi: PhiId,
        expected: JavaType,
        found: JavaType,
    },
}

impl From<bytecode::Error> for Error {
    fn from(err: bytecode::Error) -> Error {
        Error::Bytecode(err)
    }
}

impl From<Inconsistency> for Error {
    fn from(err: Inconsistency) -> Error {
        Error::Inconsistency(err)
    }
}

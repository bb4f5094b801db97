#[derive(Debug)]
pub enum Error {
    /// Code ends in the middle of the instruction starting at this address
    Truncated { address: usize },

    /// Opcode byte doesn't correspond to any JVM instruction
    UnknownOpcode { address: usize, opcode: u8 },

    /// `wide` was followed by an instruction it can't modify
    InvalidWide { address: usize, opcode: u8 },

    /// Jump target is outside the code or not on an instruction boundary
    InvalidBranchTarget { address: usize, target: isize },

    IoError(std::io::Error),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}

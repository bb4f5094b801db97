use crate::{bytecode, ir};
use std::{fmt, io};

#[derive(Debug)]
pub enum Error {
    /// The method could not be compiled (it should be left to the interpreter)
    Compilation(ir::Error),

    /// Bad input to the driver
    InvalidInput(String),

    IoError(io::Error),
    FormatError(fmt::Error),
}

impl From<ir::Error> for Error {
    fn from(err: ir::Error) -> Error {
        Error::Compilation(err)
    }
}

impl From<bytecode::Error> for Error {
    fn from(err: bytecode::Error) -> Error {
        Error::Compilation(ir::Error::Bytecode(err))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

impl From<fmt::Error> for Error {
    fn from(err: fmt::Error) -> Error {
        Error::FormatError(err)
    }
}

use super::{AddressingMode, JavaType, Location, PhiId, QuadId};
use std::fmt;

/// Index of a variable in [`super::MethodIr`]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(pub usize);

impl fmt::Debug for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VariableKind {
    /// Local variable slot
    Local,

    /// Operand stack slot
    Stack,

    /// Value of a local on method entry, placed by the calling convention
    MethodArgument,

    /// Thrown exception, on top of the stack at the start of a handler
    ExceptionArgument,

    /// Merge of the values flowing into a block
    Phi(PhiId),
}

/// One SSA version of a local or stack slot
#[derive(Clone, Debug)]
pub struct Variable {
    pub kind: VariableKind,

    /// Slot in the locals-then-stack array
    pub index: usize,

    /// Version of the slot
    pub ssa_value: usize,

    pub ty: JavaType,

    /// Quad assigning the variable (none for arguments, phis, and undefined slots)
    pub assign_op: Option<QuadId>,

    /// Last live quad reading the variable, filled in by liveness
    pub last_use_op: Option<QuadId>,

    /// Filled in by liveness
    pub assign_address: usize,

    /// Filled in by liveness
    pub last_use_address: usize,

    /// Merged loop values must stay alive at least until this address
    pub live_until: Option<usize>,

    /// Filled in by the register allocator
    pub location: Option<Location>,
}

impl Variable {
    pub fn new(kind: VariableKind, index: usize, ssa_value: usize, ty: JavaType) -> Variable {
        Variable {
            kind,
            index,
            ssa_value,
            ty,
            assign_op: None,
            last_use_op: None,
            assign_address: 0,
            last_use_address: 0,
            live_until: None,
            location: None,
        }
    }

    pub fn is_method_argument(&self) -> bool {
        self.kind == VariableKind::MethodArgument
    }

    /// Does the variable hold a value without any quad assigning it?
    pub fn defined_on_entry(&self) -> bool {
        matches!(
            self.kind,
            VariableKind::MethodArgument | VariableKind::ExceptionArgument
        )
    }

    pub fn is_phi(&self) -> bool {
        matches!(self.kind, VariableKind::Phi(_))
    }

    /// Only known after allocation
    pub fn addressing_mode(&self) -> Option<AddressingMode> {
        self.location.map(|location| location.addressing_mode())
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            VariableKind::Local => write!(f, "l{}_{}", self.index, self.ssa_value),
            VariableKind::Stack => write!(f, "s{}_{}", self.index, self.ssa_value),
            VariableKind::MethodArgument => write!(f, "a{}", self.index),
            VariableKind::ExceptionArgument => write!(f, "ex{}", self.index),
            VariableKind::Phi(phi) => write!(f, "phi{}({}_{})", phi.0, self.index, self.ssa_value),
        }
    }
}

use super::VarId;
use crate::bytecode::LoadableConstant;
use crate::regalloc::Register;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Primitive type tag of an operand
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum JavaType {
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
    Reference,

    /// Not yet inferred (eg. an argument that is never used)
    Unknown,
}

impl JavaType {
    /// Number of local variable or stack slots taken up by a value of this type
    pub fn width(self) -> usize {
        match self {
            JavaType::Long | JavaType::Double => 2,
            _ => 1,
        }
    }

    /// Types that the JVM computes with as `int`
    pub fn is_int_like(self) -> bool {
        matches!(
            self,
            JavaType::Byte | JavaType::Short | JavaType::Char | JavaType::Int
        )
    }

    pub fn is_floating(self) -> bool {
        matches!(self, JavaType::Float | JavaType::Double)
    }

    /// Can one SSA value be used at both types?
    ///
    /// `Unknown` is compatible with everything, and all `int`-like types are compatible with
    /// each other.
    pub fn is_compatible(self, other: JavaType) -> bool {
        self == other
            || self == JavaType::Unknown
            || other == JavaType::Unknown
            || (self.is_int_like() && other.is_int_like())
    }

    /// Rank used to group spilled values by slot size
    ///
    /// `BYTE < SHORT < CHAR < INT < FLOAT < REFERENCE < LONG < DOUBLE`
    pub fn size_rank(self) -> u8 {
        match self {
            JavaType::Byte => 0,
            JavaType::Short => 1,
            JavaType::Char => 2,
            JavaType::Int => 3,
            JavaType::Float => 4,
            JavaType::Reference => 5,
            JavaType::Long => 6,
            JavaType::Double => 7,
            JavaType::Unknown => 8,
        }
    }
}

impl fmt::Display for JavaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JavaType::Byte => "byte",
            JavaType::Short => "short",
            JavaType::Char => "char",
            JavaType::Int => "int",
            JavaType::Long => "long",
            JavaType::Float => "float",
            JavaType::Double => "double",
            JavaType::Reference => "ref",
            JavaType::Unknown => "?",
        };
        f.write_str(name)
    }
}

/// How an operand is accessed by generated code
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AddressingMode {
    Constant,
    Register,
    Stack,
}

/// Literal value
///
/// Floating point constants compare by bit pattern, so `NaN == NaN` and `0.0 != -0.0`. This
/// makes constants usable as map keys.
#[derive(Copy, Clone, Debug)]
pub enum Constant {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Null,
}

impl Constant {
    pub fn java_type(&self) -> JavaType {
        match self {
            Constant::Int(_) => JavaType::Int,
            Constant::Long(_) => JavaType::Long,
            Constant::Float(_) => JavaType::Float,
            Constant::Double(_) => JavaType::Double,
            Constant::Null => JavaType::Reference,
        }
    }

    /// Is this the zero of its type? (`null` counts)
    pub fn is_zero(&self) -> bool {
        match *self {
            Constant::Int(i) => i == 0,
            Constant::Long(l) => l == 0,
            Constant::Float(f) => f == 0.0,
            Constant::Double(d) => d == 0.0,
            Constant::Null => true,
        }
    }

    fn bits(&self) -> (u8, u64) {
        match *self {
            Constant::Int(i) => (0, i as u32 as u64),
            Constant::Long(l) => (1, l as u64),
            Constant::Float(f) => (2, f.to_bits() as u64),
            Constant::Double(d) => (3, d.to_bits()),
            Constant::Null => (4, 0),
        }
    }
}

impl PartialEq for Constant {
    fn eq(&self, other: &Constant) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for Constant {}

impl Hash for Constant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state)
    }
}

impl From<LoadableConstant> for Constant {
    fn from(constant: LoadableConstant) -> Constant {
        match constant {
            LoadableConstant::Integer(i) => Constant::Int(i),
            LoadableConstant::Float(f) => Constant::Float(f),
            LoadableConstant::Long(l) => Constant::Long(l),
            LoadableConstant::Double(d) => Constant::Double(d),
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(i) => write!(f, "{}", i),
            Constant::Long(l) => write!(f, "{}L", l),
            Constant::Float(x) => write!(f, "{:?}f", x),
            Constant::Double(x) => write!(f, "{:?}d", x),
            Constant::Null => f.write_str("null"),
        }
    }
}

/// Operand of a quad: either a literal or a variable
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Operand {
    Constant(Constant),
    Variable(VarId),
}

impl Operand {
    pub fn variable(&self) -> Option<VarId> {
        match self {
            Operand::Variable(var) => Some(*var),
            Operand::Constant(_) => None,
        }
    }

    pub fn constant(&self) -> Option<Constant> {
        match self {
            Operand::Constant(constant) => Some(*constant),
            Operand::Variable(_) => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Constant(constant) => constant.fmt(f),
            Operand::Variable(var) => write!(f, "{:?}", var),
        }
    }
}

/// Where a variable lives once allocated
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Location {
    Register(Register),

    /// Spill slot, addressed relative to the frame
    Stack { slot: usize, displacement: i32 },
}

impl Location {
    pub fn addressing_mode(&self) -> AddressingMode {
        match self {
            Location::Register(_) => AddressingMode::Register,
            Location::Stack { .. } => AddressingMode::Stack,
        }
    }

    pub fn register(&self) -> Option<Register> {
        match self {
            Location::Register(register) => Some(*register),
            Location::Stack { .. } => None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Register(register) => write!(f, "{}", register),
            Location::Stack { displacement, .. } => write!(f, "[fp{:+}]", displacement),
        }
    }
}

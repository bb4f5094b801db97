use super::{BlockId, Constant, JavaType, Operand, VarId};
use crate::bytecode::{EqComparison, OrdComparison};
use std::fmt;

/// Index of a quad in [`super::MethodIr`]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QuadId(pub usize);

impl fmt::Debug for QuadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

/// One IR instruction
#[derive(Clone, Debug)]
pub struct Quad {
    /// Bytecode address of the instruction this was lowered from
    pub address: usize,

    /// Block containing the instruction
    pub block: BlockId,

    /// Dead quads are skipped by code generation
    pub dead_code: bool,

    pub kind: QuadKind,
}

impl Quad {
    pub fn new(address: usize, block: BlockId, kind: QuadKind) -> Quad {
        Quad {
            address,
            block,
            dead_code: false,
            kind,
        }
    }
}

impl fmt::Display for Quad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>4}: {}", self.address, self.kind)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum QuadKind {
    /// `lhs := value`
    ConstantRefAssign { lhs: VarId, value: Constant },

    /// `lhs := rhs`
    VariableRefAssign { lhs: VarId, rhs: VarId },

    /// `lhs := operation operand`
    Unary {
        lhs: VarId,
        operation: UnaryOperation,
        operand: Operand,
    },

    /// `lhs := operand1 operation operand2`
    Binary {
        lhs: VarId,
        operand1: Operand,
        operation: BinaryOperation,
        operand2: Operand,
    },

    /// `if operand1 condition operand2 goto target`
    ///
    /// The second operand is absent for comparisons against zero or `null`.
    ConditionalBranch {
        operand1: Operand,
        condition: BranchCondition,
        operand2: Option<Operand>,
        target: usize,
    },

    UnconditionalBranch { target: usize },

    VarReturn { value: Operand },

    VoidReturn,
}

impl QuadKind {
    /// Variable assigned by the quad
    pub fn defined_variable(&self) -> Option<VarId> {
        match self {
            QuadKind::ConstantRefAssign { lhs, .. }
            | QuadKind::VariableRefAssign { lhs, .. }
            | QuadKind::Unary { lhs, .. }
            | QuadKind::Binary { lhs, .. } => Some(*lhs),
            _ => None,
        }
    }

    /// Variables read by the quad
    pub fn used_variables(&self) -> Vec<VarId> {
        match self {
            QuadKind::ConstantRefAssign { .. }
            | QuadKind::UnconditionalBranch { .. }
            | QuadKind::VoidReturn => vec![],
            QuadKind::VariableRefAssign { rhs, .. } => vec![*rhs],
            QuadKind::Unary { operand, .. } | QuadKind::VarReturn { value: operand } => {
                operand.variable().into_iter().collect()
            }
            QuadKind::Binary {
                operand1, operand2, ..
            } => operand1
                .variable()
                .into_iter()
                .chain(operand2.variable())
                .collect(),
            QuadKind::ConditionalBranch {
                operand1, operand2, ..
            } => operand1
                .variable()
                .into_iter()
                .chain(operand2.and_then(|operand| operand.variable()))
                .collect(),
        }
    }

    /// Quads that must be kept even if nothing reads what they assign
    pub fn has_side_effects(&self) -> bool {
        match self {
            QuadKind::ConstantRefAssign { .. }
            | QuadKind::VariableRefAssign { .. }
            | QuadKind::Unary { .. } => false,
            QuadKind::Binary { operation, .. } => operation.may_throw(),
            QuadKind::ConditionalBranch { .. }
            | QuadKind::UnconditionalBranch { .. }
            | QuadKind::VarReturn { .. }
            | QuadKind::VoidReturn => true,
        }
    }

    /// Replace every variable (read or written) using the mapping
    pub fn map_variables(&self, map: impl Fn(VarId) -> VarId) -> QuadKind {
        let map_operand = |operand: &Operand| match operand {
            Operand::Variable(var) => Operand::Variable(map(*var)),
            Operand::Constant(constant) => Operand::Constant(*constant),
        };
        match self {
            QuadKind::ConstantRefAssign { lhs, value } => QuadKind::ConstantRefAssign {
                lhs: map(*lhs),
                value: *value,
            },
            QuadKind::VariableRefAssign { lhs, rhs } => QuadKind::VariableRefAssign {
                lhs: map(*lhs),
                rhs: map(*rhs),
            },
            QuadKind::Unary {
                lhs,
                operation,
                operand,
            } => QuadKind::Unary {
                lhs: map(*lhs),
                operation: *operation,
                operand: map_operand(operand),
            },
            QuadKind::Binary {
                lhs,
                operand1,
                operation,
                operand2,
            } => QuadKind::Binary {
                lhs: map(*lhs),
                operand1: map_operand(operand1),
                operation: *operation,
                operand2: map_operand(operand2),
            },
            QuadKind::ConditionalBranch {
                operand1,
                condition,
                operand2,
                target,
            } => QuadKind::ConditionalBranch {
                operand1: map_operand(operand1),
                condition: *condition,
                operand2: operand2.as_ref().map(map_operand),
                target: *target,
            },
            QuadKind::UnconditionalBranch { target } => {
                QuadKind::UnconditionalBranch { target: *target }
            }
            QuadKind::VarReturn { value } => QuadKind::VarReturn {
                value: map_operand(value),
            },
            QuadKind::VoidReturn => QuadKind::VoidReturn,
        }
    }

    /// If all of the operands are constants, replace the computation with its result
    ///
    /// Anything else (including a quad that was already folded) is returned unchanged.
    pub fn fold_constants(self) -> QuadKind {
        match self {
            QuadKind::Binary {
                lhs,
                operand1: Operand::Constant(c1),
                operation,
                operand2: Operand::Constant(c2),
            } => match operation.fold(c1, c2) {
                Some(value) => QuadKind::ConstantRefAssign { lhs, value },
                None => self,
            },
            QuadKind::Unary {
                lhs,
                operation,
                operand: Operand::Constant(c),
            } => match operation.fold(c) {
                Some(value) => QuadKind::ConstantRefAssign { lhs, value },
                None => self,
            },
            other => other,
        }
    }
}

impl fmt::Display for QuadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuadKind::ConstantRefAssign { lhs, value } => write!(f, "{:?} := {}", lhs, value),
            QuadKind::VariableRefAssign { lhs, rhs } => write!(f, "{:?} := {:?}", lhs, rhs),
            QuadKind::Unary {
                lhs,
                operation,
                operand,
            } => write!(f, "{:?} := {} {}", lhs, operation, operand),
            QuadKind::Binary {
                lhs,
                operand1,
                operation,
                operand2,
            } => write!(f, "{:?} := {} {} {}", lhs, operand1, operation, operand2),
            QuadKind::ConditionalBranch {
                operand1,
                condition,
                operand2: Some(operand2),
                target,
            } => write!(f, "if {} {} {} goto {}", operand1, condition, operand2, target),
            QuadKind::ConditionalBranch {
                operand1,
                condition,
                operand2: None,
                target,
            } => write!(f, "if {} {} goto {}", operand1, condition, target),
            QuadKind::UnconditionalBranch { target } => write!(f, "goto {}", target),
            QuadKind::VarReturn { value } => write!(f, "return {}", value),
            QuadKind::VoidReturn => f.write_str("return"),
        }
    }
}

/// Two-operand arithmetic and bitwise operations
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOperation {
    IAdd,
    LAdd,
    FAdd,
    DAdd,
    ISub,
    LSub,
    FSub,
    DSub,
    IMul,
    LMul,
    FMul,
    DMul,
    IDiv,
    LDiv,
    FDiv,
    DDiv,
    IRem,
    LRem,
    FRem,
    DRem,
    IShl,
    LShl,
    IShr,
    LShr,
    IUShr,
    LUShr,
    IAnd,
    LAnd,
    IOr,
    LOr,
    IXor,
    LXor,
}

impl BinaryOperation {
    pub fn result_type(self) -> JavaType {
        use BinaryOperation::*;
        match self {
            IAdd | ISub | IMul | IDiv | IRem | IShl | IShr | IUShr | IAnd | IOr | IXor => {
                JavaType::Int
            }
            LAdd | LSub | LMul | LDiv | LRem | LShl | LShr | LUShr | LAnd | LOr | LXor => {
                JavaType::Long
            }
            FAdd | FSub | FMul | FDiv | FRem => JavaType::Float,
            DAdd | DSub | DMul | DDiv | DRem => JavaType::Double,
        }
    }

    /// Types of the first and second operands
    ///
    /// Shift amounts are always `int`, even when shifting a `long`.
    pub fn operand_types(self) -> (JavaType, JavaType) {
        use BinaryOperation::*;
        match self {
            LShl | LShr | LUShr => (JavaType::Long, JavaType::Int),
            other => (other.result_type(), other.result_type()),
        }
    }

    /// Integer division and remainder throw on a zero divisor
    pub fn may_throw(self) -> bool {
        use BinaryOperation::*;
        matches!(self, IDiv | LDiv | IRem | LRem)
    }

    /// Evaluate with JVM semantics
    ///
    /// Returns `None` if the operands have the wrong types or if evaluating would throw.
    pub fn fold(self, operand1: Constant, operand2: Constant) -> Option<Constant> {
        use BinaryOperation::*;
        use Constant::*;
        let folded = match (self, operand1, operand2) {
            (IAdd, Int(a), Int(b)) => Int(a.wrapping_add(b)),
            (ISub, Int(a), Int(b)) => Int(a.wrapping_sub(b)),
            (IMul, Int(a), Int(b)) => Int(a.wrapping_mul(b)),
            (IDiv, Int(a), Int(b)) if b != 0 => Int(a.wrapping_div(b)),
            (IRem, Int(a), Int(b)) if b != 0 => Int(a.wrapping_rem(b)),
            (IShl, Int(a), Int(b)) => Int(a << (b & 0x1f)),
            (IShr, Int(a), Int(b)) => Int(a >> (b & 0x1f)),
            (IUShr, Int(a), Int(b)) => Int(((a as u32) >> (b & 0x1f)) as i32),
            (IAnd, Int(a), Int(b)) => Int(a & b),
            (IOr, Int(a), Int(b)) => Int(a | b),
            (IXor, Int(a), Int(b)) => Int(a ^ b),

            (LAdd, Long(a), Long(b)) => Long(a.wrapping_add(b)),
            (LSub, Long(a), Long(b)) => Long(a.wrapping_sub(b)),
            (LMul, Long(a), Long(b)) => Long(a.wrapping_mul(b)),
            (LDiv, Long(a), Long(b)) if b != 0 => Long(a.wrapping_div(b)),
            (LRem, Long(a), Long(b)) if b != 0 => Long(a.wrapping_rem(b)),
            (LShl, Long(a), Int(b)) => Long(a << (b & 0x3f)),
            (LShr, Long(a), Int(b)) => Long(a >> (b & 0x3f)),
            (LUShr, Long(a), Int(b)) => Long(((a as u64) >> (b & 0x3f)) as i64),
            (LAnd, Long(a), Long(b)) => Long(a & b),
            (LOr, Long(a), Long(b)) => Long(a | b),
            (LXor, Long(a), Long(b)) => Long(a ^ b),

            (FAdd, Float(a), Float(b)) => Float(a + b),
            (FSub, Float(a), Float(b)) => Float(a - b),
            (FMul, Float(a), Float(b)) => Float(a * b),
            (FDiv, Float(a), Float(b)) => Float(a / b),
            (FRem, Float(a), Float(b)) => Float(a % b),

            (DAdd, Double(a), Double(b)) => Double(a + b),
            (DSub, Double(a), Double(b)) => Double(a - b),
            (DMul, Double(a), Double(b)) => Double(a * b),
            (DDiv, Double(a), Double(b)) => Double(a / b),
            (DRem, Double(a), Double(b)) => Double(a % b),

            _ => return None,
        };
        Some(folded)
    }
}

impl fmt::Display for BinaryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use BinaryOperation::*;
        let symbol = match self {
            IAdd | LAdd | FAdd | DAdd => "+",
            ISub | LSub | FSub | DSub => "-",
            IMul | LMul | FMul | DMul => "*",
            IDiv | LDiv | FDiv | DDiv => "/",
            IRem | LRem | FRem | DRem => "%",
            IShl | LShl => "<<",
            IShr | LShr => ">>",
            IUShr | LUShr => ">>>",
            IAnd | LAnd => "&",
            IOr | LOr => "|",
            IXor | LXor => "^",
        };
        f.write_str(symbol)
    }
}

/// Negations and primitive conversions
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOperation {
    INeg,
    LNeg,
    FNeg,
    DNeg,
    I2L,
    I2F,
    I2D,
    L2I,
    L2F,
    L2D,
    F2I,
    F2L,
    F2D,
    D2I,
    D2L,
    D2F,
    I2B,
    I2C,
    I2S,
}

impl UnaryOperation {
    pub fn operand_type(self) -> JavaType {
        use UnaryOperation::*;
        match self {
            INeg | I2L | I2F | I2D | I2B | I2C | I2S => JavaType::Int,
            LNeg | L2I | L2F | L2D => JavaType::Long,
            FNeg | F2I | F2L | F2D => JavaType::Float,
            DNeg | D2I | D2L | D2F => JavaType::Double,
        }
    }

    pub fn result_type(self) -> JavaType {
        use UnaryOperation::*;
        match self {
            INeg | L2I | F2I | D2I => JavaType::Int,
            LNeg | I2L | F2L | D2L => JavaType::Long,
            FNeg | I2F | L2F | D2F => JavaType::Float,
            DNeg | I2D | L2D | F2D => JavaType::Double,
            I2B => JavaType::Byte,
            I2C => JavaType::Char,
            I2S => JavaType::Short,
        }
    }

    /// Evaluate with JVM semantics (`as` casts from floating point saturate and send NaN to 0,
    /// just like `f2i` and friends)
    pub fn fold(self, operand: Constant) -> Option<Constant> {
        use Constant::*;
        use UnaryOperation::*;
        let folded = match (self, operand) {
            (INeg, Int(a)) => Int(a.wrapping_neg()),
            (LNeg, Long(a)) => Long(a.wrapping_neg()),
            (FNeg, Float(a)) => Float(-a),
            (DNeg, Double(a)) => Double(-a),
            (I2L, Int(a)) => Long(a as i64),
            (I2F, Int(a)) => Float(a as f32),
            (I2D, Int(a)) => Double(a as f64),
            (L2I, Long(a)) => Int(a as i32),
            (L2F, Long(a)) => Float(a as f32),
            (L2D, Long(a)) => Double(a as f64),
            (F2I, Float(a)) => Int(a as i32),
            (F2L, Float(a)) => Long(a as i64),
            (F2D, Float(a)) => Double(a as f64),
            (D2I, Double(a)) => Int(a as i32),
            (D2L, Double(a)) => Long(a as i64),
            (D2F, Double(a)) => Float(a as f32),
            (I2B, Int(a)) => Int(a as i8 as i32),
            (I2C, Int(a)) => Int(a as u16 as i32),
            (I2S, Int(a)) => Int(a as i16 as i32),
            _ => return None,
        };
        Some(folded)
    }
}

impl fmt::Display for UnaryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use UnaryOperation::*;
        let mnemonic = match self {
            INeg | LNeg | FNeg | DNeg => "-",
            I2L => "i2l",
            I2F => "i2f",
            I2D => "i2d",
            L2I => "l2i",
            L2F => "l2f",
            L2D => "l2d",
            F2I => "f2i",
            F2L => "f2l",
            F2D => "f2d",
            D2I => "d2i",
            D2L => "d2l",
            D2F => "d2f",
            I2B => "i2b",
            I2C => "i2c",
            I2S => "i2s",
        };
        f.write_str(mnemonic)
    }
}

/// Condition of a conditional branch
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BranchCondition {
    /// Compare an `int` against zero
    Zero(OrdComparison),

    /// Compare two `int`s
    ICmp(OrdComparison),

    /// Compare two references
    ACmp(EqComparison),

    /// Compare a reference against `null`
    Null(EqComparison),
}

impl BranchCondition {
    /// Does the condition compare two operands?
    pub fn is_binary(self) -> bool {
        matches!(self, BranchCondition::ICmp(_) | BranchCondition::ACmp(_))
    }

    pub fn operand_type(self) -> JavaType {
        match self {
            BranchCondition::Zero(_) | BranchCondition::ICmp(_) => JavaType::Int,
            BranchCondition::ACmp(_) | BranchCondition::Null(_) => JavaType::Reference,
        }
    }
}

impl fmt::Display for BranchCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ord = |cmp: &OrdComparison| match cmp {
            OrdComparison::EQ => "==",
            OrdComparison::NE => "!=",
            OrdComparison::LT => "<",
            OrdComparison::LE => "<=",
            OrdComparison::GT => ">",
            OrdComparison::GE => ">=",
        };
        let eq = |cmp: &EqComparison| match cmp {
            EqComparison::EQ => "==",
            EqComparison::NE => "!=",
        };
        match self {
            BranchCondition::Zero(cmp) => write!(f, "{} 0", ord(cmp)),
            BranchCondition::ICmp(cmp) => f.write_str(ord(cmp)),
            BranchCondition::ACmp(cmp) => f.write_str(eq(cmp)),
            BranchCondition::Null(cmp) => write!(f, "{} null", eq(cmp)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn binary(c1: Constant, operation: BinaryOperation, c2: Constant) -> QuadKind {
        QuadKind::Binary {
            lhs: VarId(0),
            operand1: Operand::Constant(c1),
            operation,
            operand2: Operand::Constant(c2),
        }
    }

    fn folded_value(kind: QuadKind) -> Option<Constant> {
        match kind.fold_constants() {
            QuadKind::ConstantRefAssign { value, .. } => Some(value),
            _ => None,
        }
    }

    #[test]
    fn folds_int_arithmetic() {
        use BinaryOperation::*;
        use Constant::*;
        assert_eq!(folded_value(binary(Int(1), IAdd, Int(2))), Some(Int(3)));
        assert_eq!(
            folded_value(binary(Int(i32::MAX), IAdd, Int(1))),
            Some(Int(i32::MIN))
        );
        assert_eq!(
            folded_value(binary(Int(i32::MIN), IDiv, Int(-1))),
            Some(Int(i32::MIN))
        );
        assert_eq!(folded_value(binary(Int(-7), IRem, Int(2))), Some(Int(-1)));
        assert_eq!(folded_value(binary(Int(1), IShl, Int(33))), Some(Int(2)));
        assert_eq!(folded_value(binary(Int(-8), IShr, Int(1))), Some(Int(-4)));
        assert_eq!(
            folded_value(binary(Int(-1), IUShr, Int(28))),
            Some(Int(0xf))
        );
        assert_eq!(
            folded_value(binary(Long(1), LShl, Int(65))),
            Some(Long(2))
        );
        assert_eq!(
            folded_value(binary(Long(-1), LUShr, Int(60))),
            Some(Long(0xf))
        );
    }

    #[test]
    fn division_by_zero_is_not_folded() {
        use BinaryOperation::*;
        use Constant::*;
        assert_eq!(folded_value(binary(Int(1), IDiv, Int(0))), None);
        assert_eq!(folded_value(binary(Long(1), LRem, Long(0))), None);
        assert_eq!(
            folded_value(binary(Double(1.0), DDiv, Double(0.0))),
            Some(Double(f64::INFINITY))
        );
    }

    #[test]
    fn folds_floating_point() {
        use BinaryOperation::*;
        use Constant::*;
        assert_eq!(
            folded_value(binary(Float(5.5), FRem, Float(2.0))),
            Some(Float(1.5))
        );
        assert_eq!(
            folded_value(binary(Double(0.5), DMul, Double(4.0))),
            Some(Double(2.0))
        );
    }

    #[test]
    fn folds_conversions() {
        use Constant::*;
        use UnaryOperation::*;
        let unary = |operation, c| QuadKind::Unary {
            lhs: VarId(0),
            operation,
            operand: Operand::Constant(c),
        };
        assert_eq!(folded_value(unary(I2B, Int(200))), Some(Int(-56)));
        assert_eq!(folded_value(unary(I2C, Int(-1))), Some(Int(0xffff)));
        assert_eq!(folded_value(unary(F2I, Float(f32::NAN))), Some(Int(0)));
        assert_eq!(
            folded_value(unary(D2L, Double(1e300))),
            Some(Long(i64::MAX))
        );
        assert_eq!(folded_value(unary(INeg, Int(i32::MIN))), Some(Int(i32::MIN)));
    }

    #[test]
    fn folding_is_idempotent() {
        let once = binary(Constant::Int(20), BinaryOperation::IMul, Constant::Int(3))
            .fold_constants();
        assert_eq!(
            once,
            QuadKind::ConstantRefAssign {
                lhs: VarId(0),
                value: Constant::Int(60)
            }
        );
        assert_eq!(once.clone().fold_constants(), once);

        let with_variable = QuadKind::Binary {
            lhs: VarId(2),
            operand1: Operand::Variable(VarId(1)),
            operation: BinaryOperation::IAdd,
            operand2: Operand::Constant(Constant::Int(1)),
        };
        assert_eq!(with_variable.clone().fold_constants(), with_variable);
    }

    #[test]
    fn defs_and_uses() {
        let branch = QuadKind::ConditionalBranch {
            operand1: Operand::Variable(VarId(3)),
            condition: BranchCondition::ICmp(OrdComparison::GE),
            operand2: Some(Operand::Variable(VarId(4))),
            target: 15,
        };
        assert_eq!(branch.defined_variable(), None);
        assert_eq!(branch.used_variables(), vec![VarId(3), VarId(4)]);
        assert!(branch.has_side_effects());
        assert_eq!(format!("{}", branch), "if v3 >= v4 goto 15");

        let copy = QuadKind::VariableRefAssign {
            lhs: VarId(5),
            rhs: VarId(1),
        };
        assert_eq!(copy.defined_variable(), Some(VarId(5)));
        assert_eq!(copy.used_variables(), vec![VarId(1)]);
        assert!(!copy.has_side_effects());
        assert_eq!(
            copy.map_variables(|var| VarId(var.0 + 10)),
            QuadKind::VariableRefAssign {
                lhs: VarId(15),
                rhs: VarId(11)
            }
        );
    }
}

//! Decoded JVM instructions
//!
//! The representation is a little more convenient than the raw opcode stream:
//!
//!   - The "wide" instruction doesn't show up at all, but instead gets merged into the
//!     instructions it is allowed to modify
//!
//!   - Families of instructions (like the conditional branches or the shifts) get abstracted into
//!     one instruction with a field. This helps with repetitive pattern matches.
//!
//!   - Jump offsets are already resolved into absolute addresses in the code array
//!

/// JVM bytecode instruction, with branch targets as absolute code addresses
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    Nop,
    AConstNull,
    IConstM1,
    IConst0,
    IConst1,
    IConst2,
    IConst3,
    IConst4,
    IConst5,
    LConst0,
    LConst1,
    FConst0,
    FConst1,
    FConst2,
    DConst0,
    DConst1,
    BiPush(i8),
    SiPush(i16),
    Ldc(u16), // covers both `ldc` and `ldc_w`
    Ldc2(u16),
    ILoad(u16), // covers `iload`, `iload{0,3}`, and `wide iload`
    LLoad(u16),
    FLoad(u16),
    DLoad(u16),
    ALoad(u16),
    IALoad,
    LALoad,
    FALoad,
    DALoad,
    AALoad,
    BALoad,
    CALoad,
    SALoad,
    IStore(u16), // covers `istore`, `istore{0,3}`, and `wide istore`
    LStore(u16),
    FStore(u16),
    DStore(u16),
    AStore(u16),
    IAStore,
    LAStore,
    FAStore,
    DAStore,
    AAStore,
    BAStore,
    CAStore,
    SAStore,
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
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
    INeg,
    LNeg,
    FNeg,
    DNeg,
    ISh(ShiftType), // covers `ishr`, `ishl`, and `iushr`
    LSh(ShiftType), // covers `lshr`, `lshl`, and `lushr`
    IAnd,
    LAnd,
    IOr,
    LOr,
    IXor,
    LXor,
    IInc(u16, i16), // covers `iinc` and `wide iinc`
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
    LCmp,
    FCmp(CompareMode), // covers `fcmpl` and `fcmpg`
    DCmp(CompareMode), // covers `dcmpl` and `dcmpg`
    If(OrdComparison, usize), // covers `ifeq`, `ifne`, `iflt`, `ifge`, `ifgt`, `ifle`
    IfICmp(OrdComparison, usize), // covers `if_icmpeq`, `if_icmpne`, ... `if_icmple`
    IfACmp(EqComparison, usize), // covers `if_acmpeq`, `if_acmpne`
    IfNull(EqComparison, usize), // covers `ifnull`, `ifnonnull`
    Goto(usize),                 // covers `goto` and `goto_w`
    Jsr(usize),                  // covers `jsr` and `jsr_w`
    Ret(u16),
    TableSwitch {
        /// Jump target if the argument is out of range
        default: usize,

        /// Value associated with the first jump target
        low: i32,

        /// Jump targets
        targets: Vec<usize>,
    },
    LookupSwitch {
        /// Jump target if there is no corresponding key
        default: usize,

        /// Jump targets, keyed by match value
        targets: Vec<(i32, usize)>,
    },
    IReturn,
    LReturn,
    FReturn,
    DReturn,
    AReturn,
    Return,
    GetStatic(u16),
    PutStatic(u16),
    GetField(u16),
    PutField(u16),
    Invoke(InvokeType, u16),
    InvokeDynamic(u16),
    New(u16),
    NewArray(u8),
    ANewArray(u16),
    ArrayLength,
    AThrow,
    CheckCast(u16),
    InstanceOf(u16),
    MonitorEnter,
    MonitorExit,
    MultiANewArray(u16, u8),
}

impl Instruction {
    /// How control leaves this instruction
    pub fn control_flow(&self) -> ControlFlow {
        use Instruction::*;
        match self {
            If(_, target) | IfICmp(_, target) | IfACmp(_, target) | IfNull(_, target) => {
                ControlFlow::Branch {
                    targets: vec![*target],
                    falls_through: true,
                }
            }
            Goto(target) | Jsr(target) => ControlFlow::Branch {
                targets: vec![*target],
                falls_through: false,
            },
            TableSwitch {
                default, targets, ..
            } => {
                let mut all_targets = vec![*default];
                all_targets.extend(targets.iter().copied());
                ControlFlow::Branch {
                    targets: all_targets,
                    falls_through: true,
                }
            }
            LookupSwitch { default, targets } => {
                let mut all_targets = vec![*default];
                all_targets.extend(targets.iter().map(|(_, target)| *target));
                ControlFlow::Branch {
                    targets: all_targets,
                    falls_through: true,
                }
            }
            IReturn | LReturn | FReturn | DReturn | AReturn | Return | AThrow | Ret(_) => {
                ControlFlow::Terminal
            }
            _ => ControlFlow::Continue,
        }
    }
}

/// Effect of an instruction on control flow
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlFlow {
    /// Execution continues with the next instruction
    Continue,

    /// Execution may jump to any of the targets
    ///
    /// Switches are treated like conditional branches: their targets may be taken, but the next
    /// instruction still starts a block that gets a fall-through edge.
    Branch {
        targets: Vec<usize>,
        falls_through: bool,
    },

    /// Execution leaves the method (or subroutine)
    Terminal,
}

/// Possible bit shifts
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ShiftType {
    Left,
    LogicalRight,
    ArithmeticRight,
}

/// Comparison modes for floating point
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum CompareMode {
    /// -1 on NaN
    L,

    /// 1 on NaN
    G,
}

/// Binary comparison operators available for `int` branches
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum OrdComparison {
    EQ,
    GE,
    GT,
    LE,
    LT,
    NE,
}

/// Equality/inequality comparison operators
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum EqComparison {
    EQ,
    NE,
}

/// Type of method to invoke
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum InvokeType {
    Virtual,
    Special,
    Static,
    Interface(u8), // `count` is of total arguments, where `long`/`double` count for 2
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn switches_fall_through() {
        let switch = Instruction::LookupSwitch {
            default: 20,
            targets: vec![(1, 10), (5, 14)],
        };
        assert_eq!(
            switch.control_flow(),
            ControlFlow::Branch {
                targets: vec![20, 10, 14],
                falls_through: true
            }
        );
        assert_eq!(
            Instruction::Goto(3).control_flow(),
            ControlFlow::Branch {
                targets: vec![3],
                falls_through: false
            }
        );
        assert_eq!(Instruction::AThrow.control_flow(), ControlFlow::Terminal);
        assert_eq!(Instruction::IAdd.control_flow(), ControlFlow::Continue);
    }
}

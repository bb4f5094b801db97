use crate::regalloc::RegisterSet;

/// Knobs for compiling a method
#[derive(Clone, Debug)]
pub struct Settings {
    /// Registers the allocator may hand out
    pub registers: RegisterSet,

    /// Evaluate arithmetic on constants at compile time
    ///
    /// Operands read from a slot holding a constant are replaced by the constant, so whole
    /// chains of constant computations reduce to one constant assignment.
    pub fold_constants: bool,

    /// Flag assignments whose result is never read as dead
    pub eliminate_dead_code: bool,

    /// Compute values stored into locals straight into the local, instead of into a stack
    /// temporary that then gets copied
    pub coalesce_copies: bool,

    /// Frame displacement of the first spill slot
    pub spill_base: i32,

    /// Size of a spill slot (every slot fits any value)
    pub spill_slot_size: i32,
}

impl Settings {
    pub fn new() -> Settings {
        Settings {
            registers: RegisterSet::all(),
            fold_constants: true,
            eliminate_dead_code: true,
            coalesce_copies: true,
            spill_base: -8,
            spill_slot_size: 8,
        }
    }
}

impl Default for Settings {
    fn default() -> Settings {
        Settings::new()
    }
}

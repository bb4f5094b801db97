use std::collections::HashMap;

/// Entry in the exception table of a method's `Code` attribute
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// Start of the protected range (inclusive)
    pub start_pc: usize,

    /// End of the protected range (exclusive)
    pub end_pc: usize,

    /// Start of the handler
    pub handler_pc: usize,
}

/// Numeric constant pool entry that `ldc`/`ldc_w`/`ldc2_w` can push
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum LoadableConstant {
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
}

/// Everything the compiler needs to know about one method
///
/// Slot counts are in JVM local variable slots, so `long` and `double` take up two.
#[derive(Clone, Debug)]
pub struct Method {
    /// Name used in diagnostics
    pub name: String,

    /// Slots taken up by the arguments (including `this` for instance methods)
    pub arg_slot_count: u16,

    /// Slots in the local variable array (arguments included)
    pub max_locals: u16,

    /// Maximum depth of the operand stack, in slots
    pub max_stack: u16,

    /// Raw code array
    pub code: Vec<u8>,

    pub exception_table: Vec<ExceptionHandler>,

    /// Numeric constant pool entries, by constant pool index
    pub constants: HashMap<u16, LoadableConstant>,
}

impl Method {
    pub fn new(
        name: impl Into<String>,
        arg_slot_count: u16,
        max_locals: u16,
        max_stack: u16,
        code: Vec<u8>,
    ) -> Method {
        Method {
            name: name.into(),
            arg_slot_count,
            max_locals: max_locals.max(arg_slot_count),
            max_stack,
            code,
            exception_table: vec![],
            constants: HashMap::new(),
        }
    }

    pub fn with_exception_handler(mut self, handler: ExceptionHandler) -> Method {
        self.exception_table.push(handler);
        self
    }

    pub fn with_constant(mut self, index: u16, constant: LoadableConstant) -> Method {
        self.constants.insert(index, constant);
        self
    }

    /// Total number of value slots: locals followed by the operand stack
    pub fn slot_count(&self) -> usize {
        self.max_locals as usize + self.max_stack as usize
    }
}

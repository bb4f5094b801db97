use crate::ir::JavaType;
use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Set of physical x86-64 registers
    ///
    /// The stack and frame pointers are never handed out, so they have no flag.
    pub struct RegisterSet: u32 {
        const RAX = 1 << 0;
        const RBX = 1 << 1;
        const RCX = 1 << 2;
        const RDX = 1 << 3;
        const RSI = 1 << 4;
        const RDI = 1 << 5;
        const R8 = 1 << 6;
        const R9 = 1 << 7;
        const R10 = 1 << 8;
        const R11 = 1 << 9;
        const R12 = 1 << 10;
        const R13 = 1 << 11;
        const R14 = 1 << 12;
        const R15 = 1 << 13;

        const XMM0 = 1 << 16;
        const XMM1 = 1 << 17;
        const XMM2 = 1 << 18;
        const XMM3 = 1 << 19;
        const XMM4 = 1 << 20;
        const XMM5 = 1 << 21;
        const XMM6 = 1 << 22;
        const XMM7 = 1 << 23;
        const XMM8 = 1 << 24;
        const XMM9 = 1 << 25;
        const XMM10 = 1 << 26;
        const XMM11 = 1 << 27;
        const XMM12 = 1 << 28;
        const XMM13 = 1 << 29;
        const XMM14 = 1 << 30;
        const XMM15 = 1 << 31;

        const GENERAL = 0x0000_3fff;
        const FLOATING = 0xffff_0000;
    }
}

impl RegisterSet {
    /// The first `count` registers of a class (or all of them if there are fewer)
    pub fn first(class: RegisterClass, count: usize) -> RegisterSet {
        let mut set = RegisterSet::empty();
        for register in class.registers().iter().take(count) {
            set.insert(register.set());
        }
        set
    }

    /// Registers in the set, lowest first
    pub fn iter(self) -> impl Iterator<Item = Register> {
        (0..32u8)
            .map(Register)
            .filter(move |register| self.contains(register.set()))
    }
}

/// Kind of register a value needs
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RegisterClass {
    General,
    Floating,
}

impl RegisterClass {
    pub fn of(ty: JavaType) -> RegisterClass {
        if ty.is_floating() {
            RegisterClass::Floating
        } else {
            RegisterClass::General
        }
    }

    pub fn registers(self) -> RegisterSet {
        match self {
            RegisterClass::General => RegisterSet::GENERAL,
            RegisterClass::Floating => RegisterSet::FLOATING,
        }
    }
}

/// One physical register (index of its bit in [`RegisterSet`])
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Register(u8);

impl Register {
    const NAMES: [&'static str; 32] = [
        "rax", "rbx", "rcx", "rdx", "rsi", "rdi", "r8", "r9", "r10", "r11", "r12", "r13", "r14",
        "r15", "?", "?", "xmm0", "xmm1", "xmm2", "xmm3", "xmm4", "xmm5", "xmm6", "xmm7", "xmm8",
        "xmm9", "xmm10", "xmm11", "xmm12", "xmm13", "xmm14", "xmm15",
    ];

    pub fn set(self) -> RegisterSet {
        RegisterSet::from_bits_truncate(1 << self.0)
    }

    pub fn class(self) -> RegisterClass {
        if RegisterSet::FLOATING.contains(self.set()) {
            RegisterClass::Floating
        } else {
            RegisterClass::General
        }
    }

    pub fn name(self) -> &'static str {
        Register::NAMES[self.0 as usize]
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Registers handed out to one method's allocation
///
/// Each compilation owns its own pool.
#[derive(Debug)]
pub struct RegisterPool {
    registers: RegisterSet,
    free: RegisterSet,
}

impl RegisterPool {
    pub fn new(registers: RegisterSet) -> RegisterPool {
        RegisterPool {
            registers,
            free: registers,
        }
    }

    /// Take the lowest free register able to hold a value of the given type
    pub fn request(&mut self, ty: JavaType) -> Option<Register> {
        let candidates = self.free & RegisterClass::of(ty).registers();
        let register = candidates.iter().next()?;
        self.free.remove(register.set());
        Some(register)
    }

    /// Give a register back to the pool
    pub fn release(&mut self, register: Register) {
        if self.registers.contains(register.set()) {
            self.free.insert(register.set());
        }
    }

    /// Number of free registers in a class
    pub fn available(&self, class: RegisterClass) -> usize {
        (self.free & class.registers()).bits().count_ones() as usize
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn requests_follow_type_class() {
        let mut pool = RegisterPool::new(RegisterSet::all());
        let general = pool.request(JavaType::Int).expect("general register");
        let floating = pool.request(JavaType::Double).expect("floating register");
        assert_eq!(general.to_string(), "rax");
        assert_eq!(floating.to_string(), "xmm0");
        assert_eq!(general.class(), RegisterClass::General);
        assert_eq!(floating.class(), RegisterClass::Floating);
        assert_eq!(pool.available(RegisterClass::General), 13);
        assert_eq!(pool.available(RegisterClass::Floating), 15);
    }

    #[test]
    fn exhaustion_and_release() {
        let mut pool = RegisterPool::new(RegisterSet::RCX | RegisterSet::XMM3);
        let rcx = pool.request(JavaType::Reference).expect("rcx");
        assert_eq!(rcx.name(), "rcx");
        assert_eq!(pool.request(JavaType::Long), None);
        assert_eq!(pool.request(JavaType::Float).map(Register::name), Some("xmm3"));

        pool.release(rcx);
        assert_eq!(pool.available(RegisterClass::General), 1);
        assert_eq!(pool.request(JavaType::Int), Some(rcx));
    }

    #[test]
    fn empty_pool() {
        let mut pool = RegisterPool::new(RegisterSet::empty());
        assert_eq!(pool.request(JavaType::Int), None);
        assert_eq!(pool.request(JavaType::Double), None);
    }

    #[test]
    fn first_registers_of_class() {
        let set = RegisterSet::first(RegisterClass::General, 3);
        assert_eq!(set, RegisterSet::RAX | RegisterSet::RBX | RegisterSet::RCX);
        assert_eq!(
            RegisterSet::first(RegisterClass::Floating, 100),
            RegisterSet::FLOATING
        );
    }

    #[test]
    fn releasing_foreign_register_is_ignored() {
        let mut pool = RegisterPool::new(RegisterSet::RAX);
        pool.release(Register(2));
        assert_eq!(pool.available(RegisterClass::General), 1);
    }
}

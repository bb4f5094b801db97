use super::{LiveRange, Register, RegisterClass, RegisterPool};
use crate::ir::{Location, MethodIr, VarId};

/// Range currently holding a register
#[derive(Copy, Clone, Debug)]
struct Active {
    range: usize,
    last_use_address: usize,
    register: Register,
}

/// Result of allocating registers for a method
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Allocation {
    /// Variables living on the stack, grouped by the size of their type
    pub spilled_variables: Vec<VarId>,

    /// Number of stack slots used by spilled variables
    pub stack_slots: usize,
}

/// Linear scan register allocator
///
/// Live ranges are visited in order of assignment address. Ranges whose last use is behind the
/// current range give their register back first; then the current range gets a free register
/// or, if none is left, whichever of the current range and the active range of the same
/// register class that lives longest gets spilled to the stack.
pub struct LinearScanAllocator<'a> {
    pool: &'a mut RegisterPool,

    /// Stack displacement of the first spill slot
    spill_base: i32,

    /// Distance between consecutive spill slots (slots grow downwards)
    spill_slot_size: i32,

    /// Sorted by last use address
    active: Vec<Active>,

    spilled: Vec<VarId>,
    stack_slots: usize,
}

impl<'a> LinearScanAllocator<'a> {
    pub fn new(
        pool: &'a mut RegisterPool,
        spill_base: i32,
        spill_slot_size: i32,
    ) -> LinearScanAllocator<'a> {
        LinearScanAllocator {
            pool,
            spill_base,
            spill_slot_size,
            active: vec![],
            spilled: vec![],
            stack_slots: 0,
        }
    }

    /// Assign a location to every range except the ones of method arguments
    ///
    /// `ranges` must be sorted by assignment address.
    pub fn allocate(mut self, ir: &mut MethodIr, ranges: &[LiveRange]) -> Allocation {
        log::debug!(
            "allocating {} ranges over {} general and {} floating registers",
            ranges.len(),
            self.pool.available(RegisterClass::General),
            self.pool.available(RegisterClass::Floating)
        );
        for (idx, range) in ranges.iter().enumerate() {
            if ir.variable(range.variable).is_method_argument() {
                continue;
            }
            self.expire(range.assign_address);

            if let Some(register) = self.pool.request(range.ty) {
                log::trace!("{:?} gets {}", range.variable, register);
                range.set_location(ir, Location::Register(register));
                self.activate(idx, range, register);
                continue;
            }

            // Active range of the same class with the furthest last use
            let class = RegisterClass::of(range.ty);
            let victim = self
                .active
                .iter()
                .rposition(|active| active.register.class() == class);
            match victim {
                Some(pos) if self.active[pos].last_use_address > range.last_use_address => {
                    let evicted = self.active.remove(pos);
                    let evicted_range = &ranges[evicted.range];
                    log::trace!(
                        "{:?} takes {} from {:?}",
                        range.variable,
                        evicted.register,
                        evicted_range.variable
                    );
                    self.spill(ir, evicted_range);
                    range.set_location(ir, Location::Register(evicted.register));
                    self.activate(idx, range, evicted.register);
                }
                _ => self.spill(ir, range),
            }
        }

        for active in self.active.drain(..) {
            self.pool.release(active.register);
        }

        // Stable, so spills of one size stay in the order they happened
        self.spilled
            .sort_by_key(|var| ir.variable(*var).ty.size_rank());
        log::debug!(
            "allocation done: {} spilled variables in {} stack slots",
            self.spilled.len(),
            self.stack_slots
        );
        Allocation {
            spilled_variables: self.spilled,
            stack_slots: self.stack_slots,
        }
    }

    /// Release the registers of ranges that ended before `address`
    fn expire(&mut self, address: usize) {
        let expired = self
            .active
            .partition_point(|active| active.last_use_address < address);
        for active in self.active.drain(..expired) {
            self.pool.release(active.register);
        }
    }

    fn activate(&mut self, idx: usize, range: &LiveRange, register: Register) {
        let active = Active {
            range: idx,
            last_use_address: range.last_use_address,
            register,
        };
        let pos = self
            .active
            .partition_point(|other| other.last_use_address <= range.last_use_address);
        self.active.insert(pos, active);
    }

    fn spill(&mut self, ir: &mut MethodIr, range: &LiveRange) {
        let slot = self.stack_slots;
        self.stack_slots += 1;
        let displacement = self.spill_base - slot as i32 * self.spill_slot_size;
        log::trace!("{:?} spilled to slot {}", range.variable, slot);
        range.set_location(ir, Location::Stack { slot, displacement });
        self.spilled.push(range.variable);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::{JavaType, Variable, VariableKind};
    use crate::regalloc::RegisterSet;

    fn setup(spans: &[(JavaType, usize, usize)]) -> (MethodIr, Vec<LiveRange>) {
        let mut ir = MethodIr::new();
        let mut ranges = vec![];
        for (idx, (ty, assign, last_use)) in spans.iter().enumerate() {
            let variable = ir.add_variable(Variable::new(VariableKind::Stack, idx, 0, *ty));
            ranges.push(LiveRange {
                variable,
                ty: *ty,
                assign_address: *assign,
                last_use_address: *last_use,
            });
        }
        (ir, ranges)
    }

    fn location(ir: &MethodIr, idx: usize) -> Location {
        ir.variable(VarId(idx)).location.expect("allocated")
    }

    #[test]
    fn registers_are_reused_after_expiry() {
        let (mut ir, ranges) = setup(&[
            (JavaType::Int, 0, 2),
            (JavaType::Int, 1, 3),
            (JavaType::Int, 3, 5),
        ]);
        let mut pool = RegisterPool::new(RegisterSet::RAX | RegisterSet::RBX);
        let allocation = LinearScanAllocator::new(&mut pool, -8, 8).allocate(&mut ir, &ranges);
        assert!(allocation.spilled_variables.is_empty());
        assert_eq!(location(&ir, 0).register().map(Register::name), Some("rax"));
        assert_eq!(location(&ir, 1).register().map(Register::name), Some("rbx"));
        assert_eq!(location(&ir, 2).register().map(Register::name), Some("rax"));
        assert_eq!(pool.available(RegisterClass::General), 2);
    }

    #[test]
    fn longer_active_range_is_evicted() {
        let (mut ir, ranges) = setup(&[(JavaType::Int, 0, 10), (JavaType::Int, 2, 5)]);
        let mut pool = RegisterPool::new(RegisterSet::RAX);
        let allocation = LinearScanAllocator::new(&mut pool, -8, 8).allocate(&mut ir, &ranges);
        assert_eq!(allocation.spilled_variables, vec![VarId(0)]);
        assert_eq!(
            location(&ir, 0),
            Location::Stack {
                slot: 0,
                displacement: -8
            }
        );
        assert_eq!(location(&ir, 1).register().map(Register::name), Some("rax"));
    }

    #[test]
    fn current_range_spills_when_it_lives_longest() {
        let (mut ir, ranges) = setup(&[(JavaType::Int, 0, 4), (JavaType::Int, 2, 9)]);
        let mut pool = RegisterPool::new(RegisterSet::RAX);
        let allocation = LinearScanAllocator::new(&mut pool, -8, 8).allocate(&mut ir, &ranges);
        assert_eq!(allocation.spilled_variables, vec![VarId(1)]);
        assert!(location(&ir, 0).register().is_some());
    }

    #[test]
    fn empty_pool_spills_everything() {
        let (mut ir, ranges) = setup(&[
            (JavaType::Double, 0, 3),
            (JavaType::Int, 1, 2),
            (JavaType::Byte, 2, 3),
        ]);
        let mut pool = RegisterPool::new(RegisterSet::empty());
        let allocation = LinearScanAllocator::new(&mut pool, -16, 8).allocate(&mut ir, &ranges);
        assert_eq!(allocation.stack_slots, 3);
        assert_eq!(
            allocation.spilled_variables,
            vec![VarId(2), VarId(1), VarId(0)]
        );
        assert_eq!(
            location(&ir, 2),
            Location::Stack {
                slot: 2,
                displacement: -32
            }
        );
    }

    #[test]
    fn eviction_stays_within_class() {
        let (mut ir, ranges) = setup(&[(JavaType::Int, 0, 10), (JavaType::Double, 1, 2)]);
        let mut pool = RegisterPool::new(RegisterSet::RAX);
        let allocation = LinearScanAllocator::new(&mut pool, -8, 8).allocate(&mut ir, &ranges);
        assert_eq!(allocation.spilled_variables, vec![VarId(1)]);
        assert!(location(&ir, 0).register().is_some());
    }

    #[test]
    fn arguments_are_skipped() {
        let mut ir = MethodIr::new();
        let argument = ir.add_variable(Variable::new(
            VariableKind::MethodArgument,
            0,
            0,
            JavaType::Int,
        ));
        let ranges = vec![LiveRange {
            variable: argument,
            ty: JavaType::Int,
            assign_address: 0,
            last_use_address: 4,
        }];
        let mut pool = RegisterPool::new(RegisterSet::all());
        let allocation = LinearScanAllocator::new(&mut pool, -8, 8).allocate(&mut ir, &ranges);
        assert_eq!(allocation, Allocation::default());
        assert_eq!(ir.variable(argument).location, None);
    }
}

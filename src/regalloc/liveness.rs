use crate::ir::{JavaType, Location, MethodIr, QuadId, VarId};
use crate::util::Interval;
use std::collections::BTreeMap;
use std::fmt;

/// Span of addresses over which a variable holds a value that is still needed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiveRange {
    /// Canonical variable (forwarding already resolved)
    pub variable: VarId,
    pub ty: JavaType,
    pub assign_address: usize,
    pub last_use_address: usize,
}

impl LiveRange {
    /// Snapshot the live range computed for a variable
    pub fn new(ir: &MethodIr, variable: VarId) -> LiveRange {
        let var = ir.variable(variable);
        LiveRange {
            variable,
            ty: var.ty,
            assign_address: var.assign_address,
            last_use_address: var.last_use_address,
        }
    }

    pub fn location(&self, ir: &MethodIr) -> Option<Location> {
        ir.variable(self.variable).location
    }

    pub fn set_location(&self, ir: &mut MethodIr, location: Location) {
        ir.variable_mut(self.variable).location = Some(location);
    }

    pub fn contains(&self, address: usize) -> bool {
        self.assign_address <= address && address <= self.last_use_address
    }
}

impl Interval for LiveRange {
    fn from(&self) -> usize {
        self.assign_address
    }

    fn until(&self) -> usize {
        self.last_use_address
    }
}

impl fmt::Display for LiveRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}: {} [{}, {}]",
            self.variable, self.ty, self.assign_address, self.last_use_address
        )
    }
}

/// Addresses at which a variable is referenced
struct References {
    first: usize,
    last: usize,
    last_use_op: Option<QuadId>,
}

/// Computes live ranges from the live quads of a method
pub struct LivenessPass;

impl LivenessPass {
    /// Scan the quads in address order, recording for each canonical variable the first and
    /// last addresses at which it is referenced
    ///
    /// Method arguments are live from address 0. The results are written back into the
    /// variables, and one live range per referenced variable is returned, sorted by assignment
    /// address.
    pub fn run(ir: &mut MethodIr) -> Vec<LiveRange> {
        let mut references: BTreeMap<VarId, References> = BTreeMap::new();
        for (quad_id, quad) in ir.live_quads() {
            let kind = ir.resolved_kind(quad);
            let used = kind.used_variables();
            let referenced = kind.defined_variable().into_iter().chain(used.iter().copied());
            for var in referenced {
                let entry = references.entry(var).or_insert(References {
                    first: quad.address,
                    last: quad.address,
                    last_use_op: None,
                });
                entry.first = entry.first.min(quad.address);
                entry.last = entry.last.max(quad.address);
            }
            for var in used {
                if let Some(entry) = references.get_mut(&var) {
                    entry.last_use_op = Some(quad_id);
                }
            }
        }

        // Merges around loops keep their canonical variable alive past its last read
        for (idx, variable) in ir.variables.iter().enumerate() {
            if let Some(live_until) = variable.live_until {
                let canonical = ir.resolve(VarId(idx));
                if let Some(entry) = references.get_mut(&canonical) {
                    entry.last = entry.last.max(live_until);
                }
            }
        }

        let mut ranges = Vec::with_capacity(references.len());
        for (var, refs) in references {
            let variable = ir.variable_mut(var);
            variable.assign_address = if variable.is_method_argument() {
                0
            } else {
                refs.first
            };
            variable.last_use_address = refs.last;
            variable.last_use_op = refs.last_use_op;
            ranges.push(LiveRange::new(ir, var));
        }
        ranges.sort_by_key(|range| (range.assign_address, range.variable));

        log::debug!("computed {} live ranges", ranges.len());
        for range in &ranges {
            log::trace!("{}", range);
        }
        ranges
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bytecode::Method;
    use crate::ir::{
        apply_phis, coalesce_copies, eliminate_dead_code, BasicBlockFinder, IRBuilder,
    };

    fn ranges_for(method: &Method) -> (MethodIr, Vec<LiveRange>) {
        let mut cfg = BasicBlockFinder::find(method).expect("blocks");
        let mut ir = IRBuilder::build(method, &mut cfg, true).expect("lowering");
        eliminate_dead_code(&mut ir);
        apply_phis(&mut ir, &cfg).expect("phis");
        coalesce_copies(&mut ir);
        let ranges = LivenessPass::run(&mut ir);
        (ir, ranges)
    }

    #[test]
    fn straight_line_ranges() {
        // iload_0; iload_0; imul; ireturn
        let method = Method::new("square", 1, 1, 2, vec![0x1a, 0x1a, 0x68, 0xac]);
        let (ir, ranges) = ranges_for(&method);
        let spans: Vec<(usize, usize)> = ranges
            .iter()
            .map(|range| (range.assign_address, range.last_use_address))
            .collect();
        assert_eq!(spans, vec![(0, 1), (0, 2), (1, 2), (2, 3)]);
        assert!(ir.variable(ranges[0].variable).is_method_argument());
    }

    #[test]
    fn ranges_are_sorted_and_valid() {
        let code = vec![
            0x03, 0x3c, 0x1b, 0x04, 0x60, 0x3c, 0x1b, 0x10, 0x0a, 0xa2, 0x00, 0x06, 0xa7, 0xff,
            0xf6, 0x03, 0xac,
        ];
        let (ir, ranges) = ranges_for(&Method::new("loop", 1, 2, 2, code));
        for pair in ranges.windows(2) {
            assert!(pair[0].assign_address <= pair[1].assign_address);
        }
        for range in &ranges {
            assert!(range.assign_address <= range.last_use_address);
        }

        // Every reference falls inside the range of the referenced variable
        for (_, quad) in ir.live_quads() {
            let kind = ir.resolved_kind(quad);
            for var in kind.defined_variable().into_iter().chain(kind.used_variables()) {
                let range = ranges
                    .iter()
                    .find(|range| range.variable == var)
                    .expect("range for referenced variable");
                assert!(range.contains(quad.address), "{} outside {}", quad, range);
            }
        }
    }

    #[test]
    fn loop_counter_lives_across_back_edge() {
        let code = vec![
            0x03, 0x3c, 0x1b, 0x04, 0x60, 0x3c, 0x1b, 0x10, 0x0a, 0xa2, 0x00, 0x06, 0xa7, 0xff,
            0xf6, 0x03, 0xac,
        ];
        let (ir, ranges) = ranges_for(&Method::new("loop", 1, 2, 2, code));
        let counter = ranges
            .iter()
            .find(|range| ir.variable(range.variable).index == 1 && range.assign_address == 0)
            .expect("loop counter");
        assert_eq!(counter.last_use_address, 14);
        assert_eq!(ir.variable(counter.variable).last_use_address, 14);
    }
}

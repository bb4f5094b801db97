use super::{BlockId, VarId, Variable, VariableKind};
use std::fmt;

/// Index of a phi in [`super::MethodIr`]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhiId(pub usize);

impl fmt::Debug for PhiId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "phi{}", self.0)
    }
}

/// Merge of the values a slot holds at the end of each predecessor of a block
///
/// No move instructions are ever generated for phis: once resolved, the values merged by a phi
/// are made to share one variable through the forwarding table.
#[derive(Clone, Debug)]
pub struct PhiOperand {
    /// Variable standing for the merged value inside the block
    pub variable: VarId,

    /// Block at whose entry the merge happens
    pub block: BlockId,

    /// Local or stack slot being merged
    pub slot: usize,

    /// One value per incoming edge (may repeat, and may be other phis)
    pub sources: Vec<VarId>,

    pub resolution: PhiResolution,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PhiResolution {
    /// Sources are still being collected
    Pending,

    /// No source has a definition (eg. a local that is never initialized before the merge)
    Undefined,

    /// Only one distinct value flows in
    Collapsed(VarId),

    /// Several distinct values flow in, and they all get merged into `canonical`
    Merged { canonical: VarId, others: Vec<VarId> },
}

impl PhiOperand {
    pub fn new(variable: VarId, block: BlockId, slot: usize) -> PhiOperand {
        PhiOperand {
            variable,
            block,
            slot,
            sources: vec![],
            resolution: PhiResolution::Pending,
        }
    }

    pub fn add_source(&mut self, source: VarId) {
        self.sources.push(source);
    }

    /// Variable the phi simplifies to (if resolved to something defined)
    pub fn value(&self) -> Option<VarId> {
        match &self.resolution {
            PhiResolution::Collapsed(value) => Some(*value),
            PhiResolution::Merged { canonical, .. } => Some(*canonical),
            PhiResolution::Pending | PhiResolution::Undefined => None,
        }
    }
}

/// Resolve every phi to the non-phi values flowing into it
///
/// Phis can feed into each other (nested loops), possibly cyclically, so the set of values
/// reaching each phi is computed as a fixpoint before deciding:
///
///   - no defined value: the phi is left undefined
///   - one value: the phi collapses to it
///   - several values: they get merged into one canonical variable, which is the method
///     argument if one of the values is an argument, and otherwise the first value
///
/// A value without a definition (a slot that was never written) never counts as a source.
pub fn simplify_phis(variables: &[Variable], phis: &mut [PhiOperand]) {
    let is_defined = |var: VarId| {
        let variable = &variables[var.0];
        variable.assign_op.is_some() || variable.defined_on_entry()
    };

    let mut reaching: Vec<Vec<VarId>> = vec![vec![]; phis.len()];
    let mut changed = true;
    while changed {
        changed = false;
        for idx in 0..phis.len() {
            let mut values: Vec<VarId> = vec![];
            for source in &phis[idx].sources {
                match variables[source.0].kind {
                    VariableKind::Phi(other) => {
                        for value in &reaching[other.0] {
                            if !values.contains(value) {
                                values.push(*value);
                            }
                        }
                    }
                    _ => {
                        if is_defined(*source) && !values.contains(source) {
                            values.push(*source);
                        }
                    }
                }
            }
            if values != reaching[idx] {
                reaching[idx] = values;
                changed = true;
            }
        }
    }

    for (phi, mut values) in phis.iter_mut().zip(reaching) {
        phi.resolution = match values.len() {
            0 => PhiResolution::Undefined,
            1 => PhiResolution::Collapsed(values[0]),
            _ => {
                let canonical_idx = values
                    .iter()
                    .position(|value| variables[value.0].is_method_argument())
                    .unwrap_or(0);
                let canonical = values.remove(canonical_idx);
                PhiResolution::Merged {
                    canonical,
                    others: values,
                }
            }
        };
        log::trace!(
            "{:?} in {:?} (slot {}) resolved to {:?}",
            phi.variable,
            phi.block,
            phi.slot,
            phi.resolution
        );
    }
}

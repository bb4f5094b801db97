use super::*;
use crate::util::Forwarding;

/// Quads of one method, along with the variables and phis they refer to
///
/// Quads, variables, and phis live in flat vectors and refer to each other by index. Quads are
/// never rewritten once emitted: passes that merge variables record it in `forwarding`, and
/// consumers look variables up through [`MethodIr::resolve`].
#[derive(Clone, Debug, Default)]
pub struct MethodIr {
    pub variables: Vec<Variable>,
    pub phis: Vec<PhiOperand>,

    /// Quads in emission order (which is also address order)
    pub quads: Vec<Quad>,

    /// Argument variables, in slot order (a `long` or `double` argument has only one entry)
    pub arguments: Vec<VarId>,

    /// Variables that have been merged into other variables
    pub forwarding: Forwarding,
}

impl MethodIr {
    pub fn new() -> MethodIr {
        MethodIr::default()
    }

    pub fn add_variable(&mut self, variable: Variable) -> VarId {
        let id = VarId(self.variables.len());
        self.variables.push(variable);
        self.forwarding.grow(self.variables.len());
        id
    }

    pub fn add_quad(&mut self, quad: Quad) -> QuadId {
        let id = QuadId(self.quads.len());
        self.quads.push(quad);
        id
    }

    pub fn add_phi(&mut self, phi: PhiOperand) -> PhiId {
        let id = PhiId(self.phis.len());
        self.phis.push(phi);
        id
    }

    pub fn variable(&self, id: VarId) -> &Variable {
        &self.variables[id.0]
    }

    pub fn variable_mut(&mut self, id: VarId) -> &mut Variable {
        &mut self.variables[id.0]
    }

    pub fn quad(&self, id: QuadId) -> &Quad {
        &self.quads[id.0]
    }

    pub fn phi(&self, id: PhiId) -> &PhiOperand {
        &self.phis[id.0]
    }

    /// Canonical variable standing in for `id`
    pub fn resolve(&self, id: VarId) -> VarId {
        VarId(self.forwarding.find(id.0))
    }

    /// Make `from` share its storage with `to`
    pub fn alias(&mut self, from: VarId, to: VarId) -> bool {
        self.forwarding.alias(from.0, to.0)
    }

    /// Quads that code generation will emit
    pub fn live_quads(&self) -> impl Iterator<Item = (QuadId, &Quad)> {
        self.quads
            .iter()
            .enumerate()
            .filter(|(_, quad)| !quad.dead_code)
            .map(|(idx, quad)| (QuadId(idx), quad))
    }

    /// Quad with every variable replaced by its canonical variable
    pub fn resolved_kind(&self, quad: &Quad) -> QuadKind {
        quad.kind.map_variables(|var| self.resolve(var))
    }

    /// Does the variable hold a compile-time constant?
    pub fn constant_value(&self, id: VarId) -> Option<Constant> {
        let assign_op = self.variable(id).assign_op?;
        match self.quad(assign_op).kind {
            QuadKind::ConstantRefAssign { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Count how many times each variable is read by live quads and live phis
    ///
    /// A phi is live if its variable is read. Counts are by raw variable id (no forwarding).
    pub fn use_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.variables.len()];
        for (_, quad) in self.live_quads() {
            for used in quad.kind.used_variables() {
                counts[used.0] += 1;
            }
        }

        // Liveness spreads from phi variables to their sources
        let mut to_visit: Vec<PhiId> = self
            .phis
            .iter()
            .enumerate()
            .filter(|(_, phi)| counts[phi.variable.0] > 0)
            .map(|(idx, _)| PhiId(idx))
            .collect();
        let mut visited = vec![false; self.phis.len()];
        while let Some(phi_id) = to_visit.pop() {
            if visited[phi_id.0] {
                continue;
            }
            visited[phi_id.0] = true;
            for source in &self.phis[phi_id.0].sources {
                counts[source.0] += 1;
                if let VariableKind::Phi(source_phi) = self.variables[source.0].kind {
                    to_visit.push(source_phi);
                }
            }
        }
        counts
    }

    /// Phis whose variable is read (directly or through other live phis)
    pub fn live_phis(&self) -> Vec<PhiId> {
        let counts = self.use_counts();
        (0..self.phis.len())
            .map(PhiId)
            .filter(|phi| counts[self.phis[phi.0].variable.0] > 0)
            .collect()
    }
}

use super::*;
use std::collections::HashSet;
use std::iter;

/// Flag assignments whose result is never read as dead
///
/// Killing an assignment can make the assignments feeding it dead too, so this repeats until
/// nothing changes. Reads by phis only count while the phi itself is read. Returns the number
/// of quads killed.
pub fn eliminate_dead_code(ir: &mut MethodIr) -> usize {
    let mut killed = 0;
    loop {
        let counts = ir.use_counts();
        let mut changed = false;
        for quad in ir.quads.iter_mut() {
            if quad.dead_code || quad.kind.has_side_effects() {
                continue;
            }
            if let Some(lhs) = quad.kind.defined_variable() {
                if counts[lhs.0] == 0 {
                    quad.dead_code = true;
                    killed += 1;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }
    log::debug!("dead code elimination killed {} quads", killed);
    killed
}

/// Remove copies of stack temporaries into locals
///
/// In `l := s`, if `s` is read nowhere else, is computed in the same block, and is not part of
/// a merge, then `s` can be computed straight into `l`. The temporary is forwarded to the local
/// and the copy is flagged as dead. Returns the number of copies removed.
///
/// This runs after [`apply_phis`], since moving the write to `l` earlier is only sound if
/// nothing between the two quads touches whatever `l` ends up sharing storage with.
pub fn coalesce_copies(ir: &mut MethodIr) -> usize {
    let counts = ir.use_counts();
    let merged: HashSet<VarId> = ir
        .phis
        .iter()
        .flat_map(|phi| phi.sources.iter().copied())
        .collect();

    let mut coalesced = 0;
    for idx in 0..ir.quads.len() {
        let quad = &ir.quads[idx];
        if quad.dead_code {
            continue;
        }
        let (lhs, rhs) = match quad.kind {
            QuadKind::VariableRefAssign { lhs, rhs } => (lhs, rhs),
            _ => continue,
        };

        let source = ir.variable(rhs);
        let assign_op = match source.assign_op {
            Some(assign_op) => assign_op,
            None => continue,
        };
        let def = ir.quad(assign_op);
        if def.dead_code || def.block != quad.block || assign_op.0 >= idx {
            continue;
        }
        if source.kind != VariableKind::Stack
            || counts[rhs.0] != 1
            || merged.contains(&rhs)
            || ir.forwarding.is_forwarded(rhs.0)
        {
            continue;
        }

        // The local would be written at the definition instead of at the copy
        let target = ir.resolve(lhs);
        let clobbers = ir.quads[assign_op.0 + 1..idx]
            .iter()
            .filter(|between| !between.dead_code)
            .any(|between| {
                let kind = ir.resolved_kind(between);
                kind.defined_variable() == Some(target)
                    || kind.used_variables().contains(&target)
            });
        if clobbers {
            log::trace!("not coalescing {:?} into {:?} at {}", rhs, lhs, quad.address);
            continue;
        }

        log::trace!("coalescing {:?} into {:?} at {}", rhs, lhs, quad.address);
        ir.alias(rhs, lhs);
        ir.quads[idx].dead_code = true;
        coalesced += 1;
    }
    log::debug!("coalesced {} copies", coalesced);
    coalesced
}

/// Apply the resolution of every phi that is still read
///
/// All of the values merged by a phi get forwarded to one variable, so that no moves are needed
/// on the incoming edges. Since that variable is now written on the way around a loop, it has
/// to stay alive until the end of the last block jumping back to the loop header.
pub fn apply_phis(ir: &mut MethodIr, cfg: &ControlFlowGraph) -> Result<(), Error> {
    for phi_id in ir.live_phis() {
        let phi = ir.phi(phi_id).clone();
        let values: Vec<VarId> = match &phi.resolution {
            PhiResolution::Collapsed(value) => vec![*value],
            PhiResolution::Merged { canonical, others } => {
                iter::once(*canonical).chain(others.iter().copied()).collect()
            }
            PhiResolution::Pending | PhiResolution::Undefined => continue,
        };

        // Merged values must agree on a type, which the phi then takes on
        let mut ty = JavaType::Unknown;
        for var in values.iter().chain(iter::once(&phi.variable)) {
            let var_ty = ir.variable(*var).ty;
            if var_ty == JavaType::Unknown {
                continue;
            }
            if ty == JavaType::Unknown {
                ty = var_ty;
            } else if !ty.is_compatible(var_ty) {
                return Err(Inconsistency::PhiTypeMismatch {
                    phi: phi_id,
                    expected: ty,
                    found: var_ty,
                }
                .into());
            }
        }
        for var in values.iter().chain(iter::once(&phi.variable)) {
            let variable = ir.variable_mut(*var);
            if variable.ty == JavaType::Unknown {
                variable.ty = ty;
            }
        }

        let value = values[0];
        ir.alias(phi.variable, value);
        for other in &values[1..] {
            ir.alias(*other, value);
        }

        let block = &cfg[phi.block];
        let merged = matches!(phi.resolution, PhiResolution::Merged { .. });
        if merged || block.is_loop_header(phi.block) {
            if let Some(last_predecessor) = block.last_predecessor {
                let until = cfg[last_predecessor].end_pc.saturating_sub(1);
                let variable = ir.variable_mut(value);
                variable.live_until = Some(variable.live_until.map_or(until, |u| u.max(until)));
                log::trace!("{:?} kept alive until {} by {:?}", value, until, phi_id);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bytecode::Method;

    fn lower(method: &Method) -> (ControlFlowGraph, MethodIr) {
        let mut cfg = BasicBlockFinder::find(method).expect("blocks");
        let ir = IRBuilder::build(method, &mut cfg, true).expect("lowering");
        (cfg, ir)
    }

    fn counting_loop() -> Method {
        let code = vec![
            0x03, 0x3c, 0x1b, 0x04, 0x60, 0x3c, 0x1b, 0x10, 0x0a, 0xa2, 0x00, 0x06, 0xa7, 0xff,
            0xf6, 0x03, 0xac,
        ];
        Method::new("loop", 1, 2, 2, code)
    }

    #[test]
    fn folded_operands_die() {
        // iconst_1; iconst_2; iadd; ireturn
        let method = Method::new("add", 0, 0, 2, vec![0x04, 0x05, 0x60, 0xac]);
        let (_, mut ir) = lower(&method);
        assert_eq!(eliminate_dead_code(&mut ir), 2);
        let live: Vec<usize> = ir.live_quads().map(|(_, quad)| quad.address).collect();
        assert_eq!(live, vec![2, 3]);
    }

    #[test]
    fn division_is_kept() {
        // iload_0; iconst_0; idiv; istore_1; return
        let method = Method::new("div", 1, 2, 2, vec![0x1a, 0x03, 0x6c, 0x3c, 0xb1]);
        let (_, mut ir) = lower(&method);
        eliminate_dead_code(&mut ir);
        assert!(ir.live_quads().any(|(_, quad)| matches!(
            quad.kind,
            QuadKind::Binary {
                operation: BinaryOperation::IDiv,
                ..
            }
        )));
    }

    #[test]
    fn store_is_coalesced() {
        // iload_0; iload_0; imul; istore_1; iload_1; ireturn
        let method = Method::new("square", 1, 2, 2, vec![0x1a, 0x1a, 0x68, 0x3c, 0x1b, 0xac]);
        let (_, mut ir) = lower(&method);
        eliminate_dead_code(&mut ir);
        assert_eq!(coalesce_copies(&mut ir), 1);
        assert!(ir.quads[3].dead_code);

        let product = match ir.quads[2].kind {
            QuadKind::Binary { lhs, .. } => lhs,
            ref other => panic!("expected the multiplication, got {}", other),
        };
        let local = match ir.quads[3].kind {
            QuadKind::VariableRefAssign { lhs, .. } => lhs,
            ref other => panic!("expected the store, got {}", other),
        };
        assert_eq!(ir.resolve(product), local);
    }

    #[test]
    fn loop_merge_is_applied() {
        let method = counting_loop();
        let (cfg, mut ir) = lower(&method);
        eliminate_dead_code(&mut ir);
        apply_phis(&mut ir, &cfg).expect("phis");
        coalesce_copies(&mut ir);

        let header = &cfg[BlockId(1)];
        let counter = ir.phi(header.phis[1]).clone();
        let canonical = counter.value().expect("merged");
        assert_eq!(ir.resolve(counter.variable), ir.resolve(canonical));
        assert_eq!(ir.variable(canonical).live_until, Some(14));
        assert_eq!(ir.variable(canonical).ty, JavaType::Int);
    }

    #[test]
    fn swapped_locals_are_not_clobbered() {
        // 0: iload_2; 1: ifle 14; 4: iload_0; 5: iload_1; 6: istore_0; 7: istore_1;
        // 8: iinc 2 -1; 11: goto 0; 14: iload_0; 15: ireturn
        let code = vec![
            0x1c, 0x9e, 0x00, 0x0d, 0x1a, 0x1b, 0x3b, 0x3c, 0x84, 0x02, 0xff, 0xa7, 0xff, 0xf5,
            0x1a, 0xac,
        ];
        let method = Method::new("swap", 3, 3, 2, code);
        let (cfg, mut ir) = lower(&method);
        eliminate_dead_code(&mut ir);
        apply_phis(&mut ir, &cfg).expect("phis");

        // Once `x` is written at 5, the load of `x` at 4 can't be moved down to 7
        assert_eq!(coalesce_copies(&mut ir), 1);
        let x = ir.resolve(ir.arguments[0]);
        let y = ir.resolve(ir.arguments[1]);
        let body: Vec<QuadKind> = ir
            .live_quads()
            .filter(|(_, quad)| (4..8).contains(&quad.address))
            .map(|(_, quad)| ir.resolved_kind(quad))
            .collect();
        assert_eq!(body.len(), 3);
        assert_eq!(body[0].used_variables(), vec![x]);
        assert_eq!(body[1], QuadKind::VariableRefAssign { lhs: x, rhs: y });
        assert_eq!(body[2].defined_variable(), Some(y));
    }

    #[test]
    fn conflicting_merge_types() {
        // 0: iload_0; 1: ifeq 9; 4: iconst_0; 5: istore_1; 6: goto 11;
        // 9: fconst_0; 10: fstore_1; 11: iload_1; 12: ireturn
        let code = vec![
            0x1a, 0x99, 0x00, 0x08, 0x03, 0x3c, 0xa7, 0x00, 0x05, 0x0b, 0x44, 0x1b, 0xac,
        ];
        let method = Method::new("mixed", 1, 2, 1, code);
        let mut cfg = BasicBlockFinder::find(&method).expect("blocks");
        match IRBuilder::build(&method, &mut cfg, true) {
            // The phi variable is typed by the read, so the builder accepts it
            Ok(mut ir) => {
                eliminate_dead_code(&mut ir);
                assert!(matches!(
                    apply_phis(&mut ir, &cfg),
                    Err(Error::Inconsistency(Inconsistency::PhiTypeMismatch { .. }))
                ));
            }
            Err(err) => panic!("lowering failed: {:?}", err),
        }
    }
}

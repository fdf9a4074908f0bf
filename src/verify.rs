//! The verifier (§4.4): walks every type and entity, plus every node in
//! every graph, and checks the §3 invariants. Every violation is one line
//! on the warning channel; nothing here ever mutates `Program` or a `Graph`.

use crate::ir::graph::Graph;
use crate::ir::node::Op;
use crate::program::Program;
use crate::typesystem::{EntityId, EntityKind, Segment, SpecialMethod, TypeKind, TypeSystem};
use std::collections::HashMap;

/// Aggregated verification result: `ok()` is `true` iff no violation fired.
#[derive(Default)]
pub struct VerifyReport {
    violations: u32,
}

impl VerifyReport {
    pub fn ok(&self) -> bool {
        self.violations == 0
    }

    pub fn violation_count(&self) -> u32 {
        self.violations
    }

    fn fail(&mut self, msg: impl std::fmt::Display) {
        log::warn!("{msg}");
        self.violations += 1;
    }
}

/// Verify every type/entity in `program` and every node in every graph it owns.
pub fn verify_program(program: &Program) -> VerifyReport {
    let mut report = VerifyReport::default();
    verify_types_and_entities(program, &mut report);
    for id in program.graph_ids() {
        verify_graph(program.graph(id), &mut report);
    }
    report
}

fn verify_types_and_entities(program: &Program, report: &mut VerifyReport) {
    let types = &program.types;

    // §4.4 "class members do not over-override": an overridden method must
    // be named in at most one other method's `overrides` list.
    let mut override_counts: HashMap<EntityId, u32> = HashMap::new();
    for eid in types.entity_ids() {
        if let EntityKind::Method { overrides, .. } = &types.entity(eid).kind {
            for &base in overrides {
                *override_counts.entry(base).or_insert(0) += 1;
            }
        }
    }
    for (base, count) in override_counts {
        if count > 1 {
            report.fail(format_args!(
                "entity {base}: overridden by {count} methods, at most one is allowed"
            ));
        }
    }

    types.walk(
        |id, ty| match &ty.kind {
            TypeKind::Array { bounds, .. } if bounds.is_empty() => {
                report.fail(format_args!("type {id}: array has no dimension bounds"));
            }
            TypeKind::Compound { members, .. } => {
                for &m in members {
                    if types.entity(m).owner != Some(id) {
                        report.fail(format_args!(
                            "type {id}: member entity {m} does not report this compound as its owner"
                        ));
                    }
                }
            }
            _ => {}
        },
        |id, ent| {
            match &ent.kind {
                EntityKind::Method { graph, special, .. } => {
                    if !matches!(types.ty(ent.ty).kind, TypeKind::Method { .. }) {
                        report.fail(format_args!("entity {id}: method entity does not have a Method type"));
                    }
                    if let Some(sp) = special {
                        let is_ctor_dtor_ok = ent.linkage.hidden_user
                            && ent.ld_name.as_deref().map_or(true, str::is_empty);
                        if !is_ctor_dtor_ok {
                            let name = match sp {
                                SpecialMethod::Constructor => "constructor",
                                SpecialMethod::Destructor => "destructor",
                            };
                            report.fail(format_args!(
                                "entity {id}: {name} must have hidden-user linkage and an empty ld_name"
                            ));
                        }
                    }
                    if let Some(gid) = graph {
                        if program.graph(*gid).entity != id {
                            report.fail(format_args!(
                                "entity {id}: method's graph {gid} does not point back to this entity"
                            ));
                        }
                    }
                    if ent.segment == Segment::ThreadLocal {
                        report.fail(format_args!("entity {id}: thread-local segment contains a method"));
                    }
                    if ent.linkage.no_codegen
                        && graph.is_some()
                        && ent.visibility != crate::typesystem::Visibility::External
                    {
                        report.fail(format_args!(
                            "entity {id}: no-codegen linkage on a defined method requires external visibility"
                        ));
                    }
                }
                EntityKind::Parameter { .. } => {
                    let in_frame = ent.owner.map_or(false, |o| {
                        matches!(types.ty(o).kind, TypeKind::Compound { .. }) && o != types.global_type && o != types.tls_type
                    });
                    if !in_frame {
                        report.fail(format_args!("entity {id}: parameter entity is not owned by a frame type"));
                    }
                }
                EntityKind::Alias { .. } => {
                    // `Segment` has exactly two variants (Global, ThreadLocal)
                    // and every entity carries one, so "alias outside a
                    // segment" can never be observed here — see DESIGN.md.
                }
                EntityKind::Label => {
                    if !matches!(types.ty(ent.ty).kind, TypeKind::Label) {
                        report.fail(format_args!("entity {id}: label entity does not have a Label type"));
                    }
                }
                EntityKind::Normal | EntityKind::CompoundMember => {
                    if ent.segment == Segment::ThreadLocal && ent.linkage.constant {
                        report.fail(format_args!("entity {id}: thread-local segment contains a constant"));
                    }
                }
            }

            if let Some(init) = &ent.initializer {
                verify_initializer(id, init, &ent.ty, types, report);
            }
        },
    );
}

fn verify_initializer(
    id: crate::typesystem::EntityId,
    init: &crate::typesystem::Initializer,
    ty: &crate::typesystem::TypeId,
    types: &TypeSystem,
    report: &mut VerifyReport,
) {
    match init {
        crate::typesystem::Initializer::Const(tv) => {
            if let Some(mode) = types.ty(*ty).mode() {
                if tv.mode() != mode {
                    report.fail(format_args!(
                        "entity {id}: const initializer mode {} does not match type mode {mode}",
                        tv.mode()
                    ));
                }
            } else {
                report.fail(format_args!("entity {id}: const initializer on a type with no mode"));
            }
        }
        crate::typesystem::Initializer::Compound(elems) => {
            if let TypeKind::Compound { members, .. } = &types.ty(*ty).kind {
                if elems.len() != members.len() {
                    report.fail(format_args!(
                        "entity {id}: compound initializer has {} elements, type has {} members",
                        elems.len(),
                        members.len()
                    ));
                }
            } else {
                report.fail(format_args!("entity {id}: compound initializer on a non-compound type"));
            }
        }
        crate::typesystem::Initializer::Zero => {}
    }
}

fn verify_graph(graph: &Graph, report: &mut VerifyReport) {
    for n in graph.node_ids() {
        let data = graph.node(n);
        if data.op != Op::Block && data.block.is_none() {
            report.fail(format_args!("node {n} ({:?}) has no owning Block", data.op));
        }
        if data.op == Op::Phi {
            if let Some(block) = data.block {
                let arity = graph.ins(block).len();
                if data.ins.len() != arity {
                    report.fail(format_args!(
                        "node {n}: Phi arity {} does not match Block {block} arity {arity}",
                        data.ins.len()
                    ));
                }
            }
        }
    }
}

//! The driver (§6 "External Interfaces"): wires the two pass entry points
//! into one call a caller makes once per `Program`, the way
//! `cranelift_codegen::Context::compile` sequences a fixed pipeline of
//! passes over one `Function` rather than leaving call order to each caller.

use crate::error::CoreResult;
use crate::ir::lcssa::{check_lcssa, construct_lcssa};
use crate::ir::{ControlFlowGraph, DominatorTree, LoopAnalysis};
use crate::pass::{lower_dw_ops, unroll_loops, LowerDwParams, UnrollParams};
use crate::program::Program;
use crate::typesystem::{EntityId, TypeSystem};
use crate::verify::{verify_program, VerifyReport};

/// The pipeline's knobs, one parameter struct per pass (§10's "Configuration").
pub struct PipelineConfig {
    pub lower_dw: LowerDwParams,
    pub unroll: UnrollParams,
}

/// What the pipeline did, for a caller to log or assert on.
pub struct PipelineStats {
    pub loops_unrolled: u32,
    pub verify: VerifyReport,
}

/// Run the full pipeline over every graph in `program`: lower doubleword
/// operations, bring every loop into LCSSA form, unroll what qualifies, then
/// verify the result. `factory` resolves the doubleword runtime intrinsics
/// `lower_dw_ops` needs (§4.2) — supplied by the caller since this core has
/// no linker/runtime-library knowledge of its own.
pub fn run_pipeline(
    program: &mut Program,
    config: &PipelineConfig,
    factory: &mut dyn FnMut(&mut TypeSystem, &'static str) -> EntityId,
) -> CoreResult<PipelineStats> {
    lower_dw_ops(program, &config.lower_dw, factory)?;

    let mut loops_unrolled = 0u32;
    for id in program.graph_ids().collect::<Vec<_>>() {
        let graph = program.graph_mut(id);

        let mut cfg = ControlFlowGraph::new();
        cfg.compute(graph);
        let mut domtree = DominatorTree::new();
        domtree.compute(&cfg, graph.start_block());
        let mut loops = LoopAnalysis::new();
        loops.compute(&cfg, &domtree);

        if !check_lcssa(graph, &loops) {
            construct_lcssa(graph, &cfg, &loops);
        }

        loops_unrolled += unroll_loops(graph, &config.unroll)?;
    }

    let verify = verify_program(program);
    Ok(PipelineStats { loops_unrolled, verify })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::graph::Graph;
    use crate::typesystem::{EntityData, EntityKind, Segment, TypeKind, Visibility};

    fn empty_program() -> Program {
        Program::new()
    }

    /// An empty program runs the whole pipeline without unrolling anything
    /// and comes out clean.
    #[test]
    fn empty_program_round_trips() {
        let mut program = empty_program();
        let config = PipelineConfig {
            lower_dw: LowerDwParams { width: 64, little_endian: true },
            unroll: UnrollParams { max_factor: 8, size_cap: 64 },
        };
        let mut factory = |types: &mut TypeSystem, name: &'static str| {
            let ty = types.add_type(TypeKind::Primitive(crate::mode::Mode::Reference));
            types.add_entity(EntityData {
                kind: EntityKind::Normal,
                owner: None,
                ty,
                linkage: Default::default(),
                visibility: Visibility::External,
                ld_name: Some(name.to_string()),
                initializer: None,
                segment: Segment::Global,
            })
        };
        let stats = run_pipeline(&mut program, &config, &mut factory).unwrap();
        assert_eq!(stats.loops_unrolled, 0);
        assert!(stats.verify.ok());
    }

    /// A graph with no loops passes through untouched and the verifier
    /// reports no violations.
    #[test]
    fn single_block_graph_reports_no_violations() {
        let mut program = empty_program();
        let ty = program.types.add_type(TypeKind::Primitive(crate::mode::Mode::Reference));
        let ent = program.types.add_entity(EntityData {
            kind: EntityKind::Normal,
            owner: None,
            ty,
            linkage: Default::default(),
            visibility: Visibility::Local,
            ld_name: None,
            initializer: None,
            segment: Segment::Global,
        });
        let graph = Graph::new(ent, ty);
        program.add_graph(graph);

        let config = PipelineConfig {
            lower_dw: LowerDwParams { width: 64, little_endian: true },
            unroll: UnrollParams { max_factor: 8, size_cap: 64 },
        };
        let mut factory = |types: &mut TypeSystem, name: &'static str| {
            let ty = types.add_type(TypeKind::Primitive(crate::mode::Mode::Reference));
            types.add_entity(EntityData {
                kind: EntityKind::Normal,
                owner: None,
                ty,
                linkage: Default::default(),
                visibility: Visibility::External,
                ld_name: Some(name.to_string()),
                initializer: None,
                segment: Segment::Global,
            })
        };
        let stats = run_pipeline(&mut program, &config, &mut factory).unwrap();
        assert_eq!(stats.loops_unrolled, 0);
        assert!(stats.verify.ok());
    }
}

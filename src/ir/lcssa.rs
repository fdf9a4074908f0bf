//! Loop-closed SSA construction and checking (§4.6, supplementing §4.3's
//! "graph is in LCSSA form" precondition).
//!
//! A value defined inside a loop that is used outside it must first pass
//! through a single-input Phi in the exit Block the use is reached through.
//! This implementation handles the common single-exit-edge loop shape (the
//! literal end-to-end scenarios in §8 are all single-exit `for` loops):
//! when a loop has exactly one edge leaving it, and the Block that edge
//! lands in has exactly that edge as predecessor, a boundary Phi can be
//! inserted unambiguously. A loop with multiple exit edges, or whose exit
//! Block already has other predecessors, is left for the caller to have
//! already normalized (checked, not constructed) — see DESIGN.md.

use crate::ir::cfg::ControlFlowGraph;
use crate::ir::graph::Graph;
use crate::ir::loop_analysis::LoopAnalysis;
use crate::ir::node::{NodeAttrs, NodeId, Op};
use std::collections::HashSet;

/// True iff every value defined inside a loop that is used outside it is
/// used only through a Phi in an exit Block (§4.6's read-only check).
pub fn check_lcssa(graph: &mut Graph, loops: &LoopAnalysis) -> bool {
    graph.assure_outs();
    for loop_id in loops.loop_ids() {
        let body: HashSet<NodeId> = loops.loop_data(loop_id).blocks.iter().copied().collect();
        for n in graph.node_ids().collect::<Vec<_>>() {
            let Some(n_block) = graph.block_of(n) else { continue };
            if !body.contains(&n_block) || graph.node(n).op == Op::Block {
                continue;
            }
            for &(user, _pos) in graph.outs(n) {
                let Some(user_block) = graph.block_of(user) else { continue };
                let escapes = !body.contains(&user_block) && graph.node(user).op != Op::Phi;
                if escapes {
                    return false;
                }
            }
        }
    }
    true
}

/// Find the loop's single exit edge `(inside, outside)`, if it has exactly one.
pub(crate) fn single_exit_edge(body: &HashSet<NodeId>, cfg: &ControlFlowGraph) -> Option<(NodeId, NodeId)> {
    let mut found = None;
    for &b in body {
        for &succ in cfg.succs(b) {
            if !body.contains(&succ) {
                if found.is_some() {
                    return None;
                }
                found = Some((b, succ));
            }
        }
    }
    found
}

/// Attempt to establish LCSSA form for every loop in `loops`, innermost
/// first. Loops whose shape isn't the single-exit-edge case this function
/// handles are left untouched (a later `check_lcssa` call will report them).
pub fn construct_lcssa(graph: &mut Graph, cfg: &ControlFlowGraph, loops: &LoopAnalysis) {
    // `loops` was built innermost-first (loop_analysis sorts by body size), so
    // iterating loop_ids() in order already processes inner loops before outer ones.
    for loop_id in loops.loop_ids() {
        let body: HashSet<NodeId> = loops.loop_data(loop_id).blocks.iter().copied().collect();
        let Some((inside, outside)) = single_exit_edge(&body, cfg) else {
            continue;
        };
        if cfg.preds(outside) != [inside] {
            continue; // exit Block has other predecessors; not the simple case.
        }

        graph.assure_outs();
        let candidates: Vec<NodeId> = graph
            .node_ids()
            .filter(|&n| graph.block_of(n).map_or(false, |b| body.contains(&b)) && graph.node(n).op != Op::Block)
            .collect();

        for n in candidates {
            let uses: Vec<(NodeId, u32)> = graph.outs(n).to_vec();
            let mut phi: Option<NodeId> = None;
            for (user, pos) in uses {
                let Some(user_block) = graph.block_of(user) else { continue };
                let escapes = !body.contains(&user_block) && graph.node(user).op != Op::Phi;
                if !escapes {
                    continue;
                }
                let phi_node = *phi.get_or_insert_with(|| {
                    graph.create_node(Op::Phi, graph.node(n).mode, Some(outside), [n], NodeAttrs::None)
                });
                graph.set_input(user, pos as usize, phi_node);
            }
        }
    }
}

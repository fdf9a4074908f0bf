//! Loop unrolling (§4.3): duplicates a loop's body and rewires Phis and
//! back-edges, fully eliminating the loop when a constant trip count divides
//! the chosen factor. Grounded on the same fixpoint/work-list discipline as
//! `crate::pass::lower_dw`, applied here to blocks and their Phi chains
//! instead of to doubleword operands.
//!
//! Scope: the natural loop whose header has exactly one back edge and
//! exactly one edge entering from outside the loop, and whose body has
//! exactly one edge leaving it. The body may span any number of Blocks (a
//! natural loop's invariant already guarantees every Block other than the
//! header is reached only from within the loop, so only the header needs an
//! inside/outside edge split). A header with more than one back edge or more
//! than one outside predecessor, or a body with more than one exit edge, is
//! left untouched (reported as a precondition failure, not mutated) — see
//! DESIGN.md. Per-iteration duplication keeps every clone's instructions in
//! their original owning Block (there is no inner branch to preserve, so
//! unrolling never creates a new Block), chaining each round's reads of the
//! induction Phis through the previous round's produced values — the same
//! reduction the specification's `skip_trivial_phis` performs for a Phi left
//! with a single live input. Non-header Phis (an internal merge inside a
//! multi-Block body) need no special back-edge resolution: their inputs are
//! remapped through the per-round clone map exactly like any other node's.

use crate::error::{CoreError, CoreResult};
use crate::ir::cfg::ControlFlowGraph;
use crate::ir::dominator::DominatorTree;
use crate::ir::lcssa::{check_lcssa, single_exit_edge};
use crate::ir::loop_analysis::{LoopAnalysis, LoopData};
use crate::ir::graph::Graph;
use crate::ir::node::{NodeId, Op, Relation};
use crate::tarval::Tarval;
use crate::timing;
use std::collections::{HashMap, HashSet};

/// Parameters for `unroll_loops` (§6): the maximum factor the linear-
/// induction selector may choose, and a node-count cap past which a loop's
/// body is left alone regardless of how attractive its induction looks.
pub struct UnrollParams {
    pub max_factor: u32,
    pub size_cap: usize,
}

/// A recognized `for`-shaped induction on a loop's header Phi.
struct Induction {
    phi: NodeId,
    base: u128,
    step: i128,
    bound: Option<u128>,
    relation: Relation,
}

/// Unroll as many loops in `graph` as this pass's scope covers, returning how
/// many were actually unrolled (§6: "emits a debug counter of loops unrolled").
pub fn unroll_loops(graph: &mut Graph, params: &UnrollParams) -> CoreResult<u32> {
    let _tt = timing::scope("unroll_loops");

    let mut cfg = ControlFlowGraph::new();
    cfg.compute(graph);
    let mut domtree = DominatorTree::new();
    domtree.compute(&cfg, graph.start_block());
    let mut loops = LoopAnalysis::new();
    loops.compute(&cfg, &domtree);

    if !check_lcssa(graph, &loops) {
        return Err(CoreError::InternalInvariant(
            "unroll_loops requires the graph to already be in LCSSA form".into(),
        ));
    }

    let mut unrolled = 0u32;
    for loop_id in loops.loop_ids().collect::<Vec<_>>() {
        let data = loops.loop_data(loop_id).clone();
        if try_unroll_loop(graph, &cfg, &domtree, &data, params) {
            unrolled += 1;
        }
    }

    graph.invalidate_control_flow();
    graph.clear_outs();
    log::debug!("unroll_loops: {unrolled} loop(s) unrolled");
    Ok(unrolled)
}

fn try_unroll_loop(graph: &mut Graph, cfg: &ControlFlowGraph, domtree: &DominatorTree, data: &LoopData, params: &UnrollParams) -> bool {
    let Some(header) = data.header else {
        log::debug!("loop has no identifiable header; skipping");
        return false;
    };
    if data.blocks.is_empty() || !data.blocks.contains(&header) {
        log::debug!("loop at block {header}: loop body does not contain its own header; impossible, skipping");
        return false;
    }
    if !domtree.dominates(header, header) {
        log::debug!("loop at block {header}: header does not dominate itself; impossible, skipping");
        return false;
    }

    let body: HashSet<NodeId> = data.blocks.iter().copied().collect();
    let Some((inside, outside)) = single_exit_edge(&body, cfg) else {
        log::debug!("loop at block {header}: does not have exactly one exit edge; skipping");
        return false;
    };
    if cfg.preds(outside) != [inside] {
        log::debug!("loop at block {header}: exit Block has other predecessors; skipping");
        return false;
    }

    // A natural loop's invariant guarantees every Block other than the
    // header is reached only from within the loop, so only the header can
    // have a predecessor from outside `body`.
    let preds = cfg.preds(header);
    let back_preds: Vec<NodeId> = preds.iter().copied().filter(|&p| body.contains(&p)).collect();
    let outside_preds: Vec<NodeId> = preds.iter().copied().filter(|&p| !body.contains(&p)).collect();
    if back_preds.len() != 1 || outside_preds.len() != 1 {
        log::debug!("loop at block {header}: header does not have exactly one back edge and one entry edge; skipping");
        return false;
    }
    let outside_pred = outside_preds[0];
    let back_pos = preds.iter().position(|&p| p == back_preds[0]).unwrap();

    let body_nodes: Vec<NodeId> = graph
        .node_ids()
        .filter(|&n| graph.block_of(n).is_some_and(|b| body.contains(&b)))
        .collect();
    if body_nodes.len() > params.size_cap {
        log::debug!("loop at block {header}: body size {} exceeds the size cap; skipping", body_nodes.len());
        return false;
    }
    if body_nodes.iter().any(|&n| graph.node(n).op == Op::Call) {
        log::debug!("loop at block {header}: reaches an opaque Call; refusing to unroll (the safer is_aliased contract)");
        return false;
    }

    // Only the header's own Phis carry a loop-back value needing the
    // back-edge resolution below; a Phi owned by any other body Block is an
    // internal merge and is cloned like any other node.
    let is_header_phi = |graph: &Graph, n: NodeId| graph.node(n).op == Op::Phi && graph.block_of(n) == Some(header);
    let header_phis: Vec<NodeId> = body_nodes.iter().copied().filter(|&n| is_header_phi(graph, n)).collect();
    let other_nodes: Vec<NodeId> = body_nodes.iter().copied().filter(|&n| !is_header_phi(graph, n)).collect();

    let Some((factor, full)) = select_factor(graph, &header_phis, &other_nodes, back_pos, params) else {
        log::debug!("loop at block {header}: linear-induction recognizer found nothing usable; skipping");
        return false;
    };
    if factor <= 1 {
        return false;
    }

    log::debug!("loop at block {header}: unrolling by factor {factor}{}", if full { " (full)" } else { "" });

    let mut prev: HashMap<NodeId, NodeId> = HashMap::new();
    for _ in 1..factor {
        prev = clone_body_once(graph, &header_phis, &other_nodes, back_pos, &prev);
    }

    if full {
        full_unroll_cleanup(graph, header, &body, outside_pred, &header_phis, &other_nodes, &prev);
    } else {
        partial_unroll_rewire(graph, &header_phis, back_pos, &prev);
    }

    true
}

/// Clone every body node once, resolving Phi reads to the previous round's
/// chain of produced values (identity for round one, i.e. an empty `prev`).
fn clone_body_once(
    graph: &mut Graph,
    header_phis: &[NodeId],
    other_nodes: &[NodeId],
    back_pos: usize,
    prev: &HashMap<NodeId, NodeId>,
) -> HashMap<NodeId, NodeId> {
    let mut cur: HashMap<NodeId, NodeId> = HashMap::new();

    // Header Phis update simultaneously: this round's "current value" of a
    // header Phi is the previous round's resolution of that Phi's back-edge
    // operand.
    for &phi in header_phis {
        let back_operand = graph.ins(phi)[back_pos];
        let resolved = *prev.get(&back_operand).unwrap_or(&back_operand);
        cur.insert(phi, resolved);
    }

    // Every other body node (including a non-header Phi, an internal merge)
    // is cloned in place into its own original owning Block, with operands
    // remapped through this round's map.
    for &n in other_nodes {
        let data = graph.node(n).clone();
        let new_ins: Vec<NodeId> = data.ins.iter().map(|&inp| *cur.get(&inp).unwrap_or(&inp)).collect();
        let new_id = graph.create_node(data.op, data.mode, data.block, new_ins, data.attrs.clone());
        graph.node_mut(new_id).pinned = data.pinned;
        cur.insert(n, new_id);
        if graph.keep_alive_list().contains(&n) {
            graph.add_keep_alive(new_id);
        }
    }

    cur
}

/// Header retained, back edge kept: point each header Phi's back-edge input
/// at the value produced by the last cloned round instead of one bare
/// iteration.
fn partial_unroll_rewire(graph: &mut Graph, header_phis: &[NodeId], back_pos: usize, prev: &HashMap<NodeId, NodeId>) {
    for &phi in header_phis {
        let back_operand = graph.ins(phi)[back_pos];
        let new_back = *prev.get(&back_operand).unwrap_or(&back_operand);
        graph.set_input(phi, back_pos, new_back);
    }
}

/// The loop is gone: redirect every escaping (outside-`body`) use of a body
/// node to the value the last cloned round produced, trivialize every header
/// Phi to its sole remaining (outside) operand, and drop the back edge.
fn full_unroll_cleanup(
    graph: &mut Graph,
    header: NodeId,
    body: &HashSet<NodeId>,
    outside_pred: NodeId,
    header_phis: &[NodeId],
    other_nodes: &[NodeId],
    prev: &HashMap<NodeId, NodeId>,
) {
    graph.assure_outs();
    for &n in header_phis.iter().chain(other_nodes.iter()) {
        let Some(&replacement) = prev.get(&n) else { continue };
        let uses: Vec<(NodeId, u32)> = graph.outs(n).to_vec();
        for (user, pos) in uses {
            let escapes = graph.block_of(user).map_or(true, |b| !body.contains(&b));
            if escapes {
                graph.set_input(user, pos as usize, replacement);
            }
        }
        if graph.keep_alive_list().contains(&n) {
            graph.add_keep_alive(replacement);
        }
    }

    // Header now has exactly one predecessor; every Phi collapses to that
    // predecessor's operand.
    let outside_pos = graph.ins(header).iter().position(|&p| p == outside_pred).unwrap_or(0);
    for &phi in header_phis {
        let outside_val = graph.ins(phi)[outside_pos];
        graph.node_mut(phi).ins = vec![outside_val].into();
    }
    graph.node_mut(header).ins = vec![outside_pred].into();
}

/// Recognize a `for`-shaped linear induction on one of `phi_nodes` and choose
/// an unroll factor. Returns `(factor, full_unroll)`.
fn select_factor(graph: &Graph, phi_nodes: &[NodeId], non_phi_nodes: &[NodeId], back_pos: usize, params: &UnrollParams) -> Option<(u32, bool)> {
    let induction = phi_nodes.iter().find_map(|&phi| recognize_induction(graph, phi, non_phi_nodes, back_pos))?;

    let Some(bound) = induction.bound else {
        // Induction recognized but no static trip count: a conservative,
        // non-full factor, per §9's "choose a conservative factor" bullet.
        return Some((params.max_factor.min(2).max(1), false));
    };
    if induction.step <= 0 {
        return Some((params.max_factor.min(2).max(1), false));
    }
    let step = induction.step as u128;
    let trip_count = match induction.relation {
        Relation::Lt if bound > induction.base => (bound - induction.base + step - 1) / step,
        Relation::Le if bound >= induction.base => (bound - induction.base) / step + 1,
        _ => return Some((params.max_factor.min(2).max(1), false)),
    };
    if trip_count == 0 || trip_count > u128::from(u32::MAX) {
        return Some((params.max_factor.min(2).max(1), false));
    }
    let trip_count = trip_count as u32;

    let mut factor = 1u32;
    let mut candidate = 2u32;
    while candidate <= params.max_factor && trip_count % candidate == 0 {
        factor = candidate;
        candidate *= 2;
    }
    if factor == trip_count {
        Some((factor, true))
    } else if factor > 1 {
        Some((factor, false))
    } else {
        Some((params.max_factor.min(2).max(1), false))
    }
}

fn recognize_induction(graph: &Graph, phi: NodeId, non_phi_nodes: &[NodeId], back_pos: usize) -> Option<Induction> {
    let ins = graph.ins(phi);
    if ins.len() < 2 {
        return None;
    }
    let outside_pos = 1 - back_pos.min(1);
    let base_tv = graph.node(ins[outside_pos]).const_tarval()?;
    let base = base_tv.as_u128();

    let back_operand = ins[back_pos];
    let back_data = graph.node(back_operand);
    if !matches!(back_data.op, Op::Add | Op::Sub) {
        return None;
    }
    let (x, y) = (back_data.ins.first().copied()?, back_data.ins.get(1).copied()?);
    let (self_operand, other) = if x == phi {
        (x, y)
    } else if y == phi {
        (y, x)
    } else {
        return None;
    };
    let _ = self_operand;
    let step_tv = graph.node(other).const_tarval()?;
    let mut step = step_tv.as_u128() as i128;
    if back_data.op == Op::Sub {
        step = -step;
    }

    let cmp = non_phi_nodes.iter().copied().find(|&n| {
        let d = graph.node(n);
        d.op == Op::Cmp && d.ins.first() == Some(&phi)
    })?;
    let cmp_data = graph.node(cmp);
    let relation = cmp_data.relation()?;
    let bound_node = *cmp_data.ins.get(1)?;
    let bound = graph.node(bound_node).const_tarval().map(|tv: Tarval| tv.as_u128());

    Some(Induction { phi, base, step, bound, relation })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::graph::Graph;
    use crate::ir::node::NodeAttrs;
    use crate::mode::Mode;
    use crate::typesystem::{EntityData, EntityKind, Segment, TypeKind, TypeSystem, Visibility};

    fn new_graph() -> Graph {
        let mut ts = TypeSystem::new();
        let ty = ts.add_type(TypeKind::Primitive(Mode::Reference));
        let ent = ts.add_entity(EntityData {
            kind: EntityKind::Normal,
            owner: None,
            ty,
            linkage: Default::default(),
            visibility: Visibility::Local,
            ld_name: None,
            initializer: None,
            segment: Segment::Global,
        });
        Graph::new(ent, ty)
    }

    /// `for (i=0;i<8;i++) s+=1` with max factor 8: fully unrolled, header's
    /// back edge removed, the after-loop Keep reads the last round's sum.
    #[test]
    fn fully_unrolled_constant_trip_count() {
        let mut g = new_graph();
        let i32m = Mode::low_unsigned(32);
        let entry = g.start_block();
        // Placeholder second predecessor (the eventual self back edge), fixed
        // up below once `header`'s own id is known — Phi arity is checked
        // against Block arity at construction, so the Block must already
        // have its final predecessor count before any Phi is built on it.
        let header = g.create_block([entry, entry]);
        g.set_input(header, 1, header);

        let zero = g.create_node(Op::Const, i32m, Some(header), [], NodeAttrs::Const(Tarval::from_int(i32m, 0)));
        let one = g.create_node(Op::Const, i32m, Some(header), [], NodeAttrs::Const(Tarval::from_int(i32m, 1)));
        let eight = g.create_node(Op::Const, i32m, Some(header), [], NodeAttrs::Const(Tarval::from_int(i32m, 8)));

        let i_phi = g.create_node(Op::Phi, i32m, Some(header), [zero, zero], NodeAttrs::None);
        let s_phi = g.create_node(Op::Phi, i32m, Some(header), [zero, zero], NodeAttrs::None);
        let i_next = g.create_node(Op::Add, i32m, Some(header), [i_phi, one], NodeAttrs::None);
        let s_next = g.create_node(Op::Add, i32m, Some(header), [s_phi, one], NodeAttrs::None);
        let _cmp = g.create_node(Op::Cmp, Mode::Boolean, Some(header), [i_phi, eight], NodeAttrs::Cmp { relation: Relation::Lt });
        g.set_input(i_phi, 1, i_next);
        g.set_input(s_phi, 1, s_next);

        let after = g.create_block([header]);
        // LCSSA's own boundary Phi: the single value `s_phi` carries across
        // the loop's one exit edge, read by everything outside the loop.
        let boundary = g.create_node(Op::Phi, i32m, Some(after), [s_phi], NodeAttrs::None);
        let keep = g.create_node(Op::Keep, Mode::Control, Some(after), [boundary], NodeAttrs::None);

        let mut cfg = ControlFlowGraph::new();
        cfg.compute(&g);
        let mut dt = DominatorTree::new();
        dt.compute(&cfg, entry);
        let mut la = LoopAnalysis::new();
        la.compute(&cfg, &dt);
        assert!(check_lcssa(&mut g, &la));

        let params = UnrollParams { max_factor: 8, size_cap: 64 };
        let unrolled = unroll_loops(&mut g, &params).expect("LCSSA precondition holds");
        assert_eq!(unrolled, 1);

        assert_eq!(g.ins(header).len(), 1, "the back edge is gone");
        assert_eq!(g.ins(i_phi).len(), 1, "the induction Phi collapses to its initial value");
        assert_ne!(g.ins(boundary)[0], s_phi, "the boundary Phi now reads the last unrolled round's sum");
        assert_eq!(g.ins(keep)[0], boundary, "the Keep itself is untouched; only its data input moved");
    }

    /// A Cmp against a non-constant bound passes the linear-induction check
    /// but not the static-count check: unrolled by the conservative factor
    /// with the header (and its back edge) retained.
    #[test]
    fn unknown_trip_count_keeps_the_header() {
        let mut g = new_graph();
        let i32m = Mode::low_unsigned(32);
        let entry = g.start_block();
        // An opaque, non-constant bound (as if loaded from memory): the
        // induction shape is still recognized, but no static trip count
        // can be computed from it.
        let addr = g.create_node(Op::Const, Mode::Reference, Some(entry), [], NodeAttrs::Const(Tarval::from_int(Mode::Reference, 0)));
        let bound = g.create_node(Op::Load, i32m, Some(entry), [addr], NodeAttrs::None);
        let header = g.create_block([entry, entry]);
        g.set_input(header, 1, header);

        let zero = g.create_node(Op::Const, i32m, Some(header), [], NodeAttrs::Const(Tarval::from_int(i32m, 0)));
        let one = g.create_node(Op::Const, i32m, Some(header), [], NodeAttrs::Const(Tarval::from_int(i32m, 1)));
        let i_phi = g.create_node(Op::Phi, i32m, Some(header), [zero, zero], NodeAttrs::None);
        let i_next = g.create_node(Op::Add, i32m, Some(header), [i_phi, one], NodeAttrs::None);
        let _cmp = g.create_node(Op::Cmp, Mode::Boolean, Some(header), [i_phi, bound], NodeAttrs::Cmp { relation: Relation::Lt });
        g.set_input(i_phi, 1, i_next);

        let after = g.create_block([header]);
        let boundary = g.create_node(Op::Phi, i32m, Some(after), [i_phi], NodeAttrs::None);
        let _keep = g.create_node(Op::Keep, Mode::Control, Some(after), [boundary], NodeAttrs::None);

        let mut cfg = ControlFlowGraph::new();
        cfg.compute(&g);
        let mut dt = DominatorTree::new();
        dt.compute(&cfg, entry);
        let mut la = LoopAnalysis::new();
        la.compute(&cfg, &dt);
        assert!(check_lcssa(&mut g, &la));

        let params = UnrollParams { max_factor: 8, size_cap: 64 };
        let unrolled = unroll_loops(&mut g, &params).unwrap();
        assert_eq!(unrolled, 1);
        assert_eq!(g.ins(header).len(), 2, "the header and its back edge are retained");
        assert_eq!(g.ins(i_phi).len(), 2, "the induction Phi still loops");
    }

    /// `for (i=0;i<8;i++) { s+=1; }` split across two Blocks — the header
    /// holds the induction test, a second `tail` Block (the loop's actual
    /// back-edge predecessor) holds the body's increment — still fully
    /// unrolls, exercising the multi-Block body path.
    #[test]
    fn multi_block_body_fully_unrolls() {
        let mut g = new_graph();
        let i32m = Mode::low_unsigned(32);
        let entry = g.start_block();
        // Placeholder second predecessor, fixed up once `tail`'s id is known.
        let header = g.create_block([entry, entry]);

        let zero = g.create_node(Op::Const, i32m, Some(header), [], NodeAttrs::Const(Tarval::from_int(i32m, 0)));
        let one = g.create_node(Op::Const, i32m, Some(header), [], NodeAttrs::Const(Tarval::from_int(i32m, 1)));
        let eight = g.create_node(Op::Const, i32m, Some(header), [], NodeAttrs::Const(Tarval::from_int(i32m, 8)));
        let i_phi = g.create_node(Op::Phi, i32m, Some(header), [zero, zero], NodeAttrs::None);
        let s_phi = g.create_node(Op::Phi, i32m, Some(header), [zero, zero], NodeAttrs::None);
        let _cmp = g.create_node(Op::Cmp, Mode::Boolean, Some(header), [i_phi, eight], NodeAttrs::Cmp { relation: Relation::Lt });

        // `tail`: the loop's back-edge predecessor, a distinct Block from
        // the header, computing both next-round values.
        let tail = g.create_block([header]);
        let i_next = g.create_node(Op::Add, i32m, Some(tail), [i_phi, one], NodeAttrs::None);
        let s_next = g.create_node(Op::Add, i32m, Some(tail), [s_phi, one], NodeAttrs::None);
        g.set_input(header, 1, tail);
        g.set_input(i_phi, 1, i_next);
        g.set_input(s_phi, 1, s_next);

        // The loop's single exit edge leaves from `tail`, not the header.
        let after = g.create_block([tail]);
        let boundary = g.create_node(Op::Phi, i32m, Some(after), [s_phi], NodeAttrs::None);
        let keep = g.create_node(Op::Keep, Mode::Control, Some(after), [boundary], NodeAttrs::None);

        let mut cfg = ControlFlowGraph::new();
        cfg.compute(&g);
        let mut dt = DominatorTree::new();
        dt.compute(&cfg, entry);
        let mut la = LoopAnalysis::new();
        la.compute(&cfg, &dt);
        assert!(check_lcssa(&mut g, &la));

        let params = UnrollParams { max_factor: 8, size_cap: 64 };
        let unrolled = unroll_loops(&mut g, &params).expect("LCSSA precondition holds");
        assert_eq!(unrolled, 1);

        assert_eq!(g.ins(header).len(), 1, "the back edge is gone");
        assert_eq!(g.ins(i_phi).len(), 1, "the induction Phi collapses to its initial value");
        assert_ne!(g.ins(boundary)[0], s_phi, "the boundary Phi now reads the last unrolled round's sum");
        assert_eq!(g.ins(keep)[0], boundary, "the Keep itself is untouched; only its data input moved");
    }
}

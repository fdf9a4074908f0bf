//! The control-flow-graph view: per-Block predecessor/successor sets (§4.5).
//!
//! Grounded on `cranelift-codegen::flowgraph::ControlFlowGraph`: a derived,
//! cached analysis with its own validity flag, recomputed in one pass over
//! the graph rather than incrementally maintained the way out-edges are.

use crate::ir::graph::Graph;
use crate::ir::node::{NodeId, Op};
use crate::entity::SecondaryMap;
use smallvec::SmallVec;

/// Predecessor/successor Block sets for every Block in a `Graph`.
#[derive(Default)]
pub struct ControlFlowGraph {
    preds: SecondaryMap<NodeId, SmallVec<[NodeId; 4]>>,
    succs: SecondaryMap<NodeId, SmallVec<[NodeId; 4]>>,
    valid: bool,
}

impl ControlFlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn clear(&mut self) {
        self.preds.clear();
        self.succs.clear();
        self.valid = false;
    }

    /// Recompute predecessor/successor sets from scratch. A Block's `ins`
    /// are directly the predecessor Blocks (`Graph::create_block`'s own
    /// contract), so this is one pass with no indirection through `block_of`.
    pub fn compute(&mut self, graph: &Graph) {
        self.clear();
        for block in graph.node_ids() {
            if graph.node(block).op != Op::Block {
                continue;
            }
            for &pred_block in graph.ins(block) {
                self.preds.get_mut(block).push(pred_block);
                self.succs.get_mut(pred_block).push(block);
            }
        }
        self.valid = true;
    }

    pub fn preds(&self, block: NodeId) -> &[NodeId] {
        debug_assert!(self.valid, "ControlFlowGraph is not valid; call compute() first");
        self.preds.get(block)
    }

    pub fn succs(&self, block: NodeId) -> &[NodeId] {
        debug_assert!(self.valid, "ControlFlowGraph is not valid; call compute() first");
        self.succs.get(block)
    }
}

//! Dominator tree computation (§3 "Block/Loop/Dominance").
//!
//! Grounded on `cranelift-codegen::dominator_tree`'s structure (an
//! `idom`-per-Block map plus a reverse-postorder numbering used for fast
//! ancestor comparisons) but implemented as the classic iterative dataflow
//! algorithm (Cooper, Harvey & Kennedy, "A Simple, Fast Dominance
//! Algorithm") rather than Lengauer-Tarjan, which is simpler to get right
//! for a teaching-scale graph.

use crate::entity::SecondaryMap;
use crate::ir::cfg::ControlFlowGraph;
use crate::ir::graph::Graph;
use crate::ir::node::NodeId;

/// Immediate-dominator relation over a `Graph`'s Blocks.
#[derive(Default)]
pub struct DominatorTree {
    rpo: Vec<NodeId>,
    rpo_index: SecondaryMap<NodeId, i32>,
    idom: SecondaryMap<NodeId, Option<NodeId>>,
    valid: bool,
}

impl DominatorTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn clear(&mut self) {
        self.rpo.clear();
        self.rpo_index.clear();
        self.idom.clear();
        self.valid = false;
    }

    /// Compute immediate dominators for every Block reachable from `start`.
    pub fn compute(&mut self, cfg: &ControlFlowGraph, start: NodeId) {
        self.clear();

        // Post-order DFS over successors, then reverse for RPO.
        let mut visited = std::collections::HashSet::new();
        let mut post_order = Vec::new();
        enum Frame {
            Enter(NodeId),
            Leave(NodeId),
        }
        let mut stack = vec![Frame::Enter(start)];
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(b) => {
                    if !visited.insert(b) {
                        continue;
                    }
                    stack.push(Frame::Leave(b));
                    for &succ in cfg.succs(b).iter().rev() {
                        if !visited.contains(&succ) {
                            stack.push(Frame::Enter(succ));
                        }
                    }
                }
                Frame::Leave(b) => post_order.push(b),
            }
        }
        self.rpo = post_order.into_iter().rev().collect();
        for (i, &b) in self.rpo.iter().enumerate() {
            *self.rpo_index.get_mut(b) = i as i32;
        }
        for b in &self.rpo {
            *self.idom.get_mut(*b) = None;
        }
        *self.idom.get_mut(start) = Some(start);

        let mut changed = true;
        while changed {
            changed = false;
            for &b in self.rpo.iter().skip(1) {
                let preds = cfg.preds(b);
                let mut new_idom: Option<NodeId> = None;
                for &p in preds {
                    if self.idom.get(p).is_some() {
                        new_idom = Some(match new_idom {
                            None => p,
                            Some(cur) => self.intersect(cur, p),
                        });
                    }
                }
                if *self.idom.get(b) != new_idom && new_idom.is_some() {
                    *self.idom.get_mut(b) = new_idom;
                    changed = true;
                }
            }
        }
        self.valid = true;
    }

    fn intersect(&self, mut a: NodeId, mut b: NodeId) -> NodeId {
        while a != b {
            while *self.rpo_index.get(a) > *self.rpo_index.get(b) {
                a = self.idom.get(a).unwrap();
            }
            while *self.rpo_index.get(b) > *self.rpo_index.get(a) {
                b = self.idom.get(b).unwrap();
            }
        }
        a
    }

    /// The immediate dominator of `block`, or `None` if unreachable (or `block` is the entry).
    pub fn idom(&self, block: NodeId) -> Option<NodeId> {
        debug_assert!(self.valid);
        *self.idom.get(block)
    }

    /// True if `a` dominates `b` (every `a` dominates itself).
    pub fn dominates(&self, a: NodeId, b: NodeId) -> bool {
        debug_assert!(self.valid);
        let mut cur = b;
        loop {
            if cur == a {
                return true;
            }
            match self.idom.get(cur) {
                Some(next) if *next != cur => cur = *next,
                Some(_) => return cur == a,
                None => return false,
            }
        }
    }

    /// Blocks in reverse postorder, the traversal order the iterative
    /// dataflow computation itself relies on.
    pub fn rpo(&self) -> &[NodeId] {
        &self.rpo
    }
}

//! Natural-loop detection (§3 "Block/Loop/Dominance": "A Loop is a tree-shaped
//! object with elements that are either Blocks or nested Loops").
//!
//! Back edges are found from the dominator tree (an edge `b -> h` where `h`
//! dominates `b`); the natural loop of a back edge is the usual
//! reachability-to-header closure. Loops sharing a header are merged.
//! Nesting is then just containment of block sets, which is good enough at
//! this scale (no irreducible-CFG handling is attempted; an irreducible
//! region just surfaces as two unrelated single-block "loops", which the
//! header-identification check in `crate::pass::unroll` will reject anyway).

use crate::entity::{entity_impl, PrimaryMap, SecondaryMap};
use crate::ir::cfg::ControlFlowGraph;
use crate::ir::dominator::DominatorTree;
use crate::ir::node::NodeId;
use std::collections::{HashSet, VecDeque};

/// A dense reference to a natural loop.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoopId(u32);
entity_impl!(LoopId);

/// One natural loop: its header (if a unique one could be identified), the
/// Blocks it directly contains, and any loops nested inside it.
#[derive(Clone, Default)]
pub struct LoopData {
    pub header: Option<NodeId>,
    pub blocks: Vec<NodeId>,
    pub children: Vec<LoopId>,
    pub parent: Option<LoopId>,
}

/// The full loop forest for one `Graph`.
#[derive(Default)]
pub struct LoopAnalysis {
    loops: PrimaryMap<LoopId, LoopData>,
    block_loop: SecondaryMap<NodeId, Option<LoopId>>,
    roots: Vec<LoopId>,
    valid: bool,
}

impl LoopAnalysis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn clear(&mut self) {
        self.loops = PrimaryMap::new();
        self.block_loop.clear();
        self.roots.clear();
        self.valid = false;
    }

    pub fn loop_data(&self, id: LoopId) -> &LoopData {
        &self.loops[id]
    }

    /// The innermost loop containing `block`, if any.
    pub fn innermost_loop_of(&self, block: NodeId) -> Option<LoopId> {
        *self.block_loop.get(block)
    }

    pub fn top_level_loops(&self) -> &[LoopId] {
        &self.roots
    }

    pub fn loop_ids(&self) -> impl Iterator<Item = LoopId> + '_ {
        self.loops.keys()
    }

    /// Recompute the loop forest for every Block reachable in `cfg`, using `domtree`.
    pub fn compute(&mut self, cfg: &ControlFlowGraph, domtree: &DominatorTree) {
        self.clear();

        // 1. Find back edges: for every Block b and successor h, if h dominates b, (b,h) is a back edge.
        let mut by_header: std::collections::HashMap<NodeId, HashSet<NodeId>> = std::collections::HashMap::new();
        for &b in domtree.rpo() {
            for &h in cfg.succs(b) {
                if domtree.dominates(h, b) {
                    by_header.entry(h).or_default().insert(b);
                }
            }
        }

        // 2. For each header, the natural loop body is the reverse-reachability
        //    closure from every back-edge source up to (and including) the header.
        let mut natural: Vec<(NodeId, HashSet<NodeId>)> = Vec::new();
        for (&header, tails) in &by_header {
            let mut body: HashSet<NodeId> = HashSet::new();
            body.insert(header);
            let mut worklist: VecDeque<NodeId> = tails.iter().copied().collect();
            while let Some(b) = worklist.pop_front() {
                if body.insert(b) {
                    for &p in cfg.preds(b) {
                        worklist.push_back(p);
                    }
                }
            }
            natural.push((header, body));
        }

        // 3. Sort by body size so containers are built innermost-first when nesting.
        natural.sort_by_key(|(_, body)| body.len());

        for (header, body) in &natural {
            let mut blocks: Vec<NodeId> = body.iter().copied().collect();
            blocks.sort_by_key(|b| domtree.rpo().iter().position(|x| x == b).unwrap_or(usize::MAX));
            let id = self.loops.push(LoopData {
                header: Some(*header),
                blocks,
                children: Vec::new(),
                parent: None,
            });
            for &b in body {
                *self.block_loop.get_mut(b) = Some(id);
            }
        }

        // 4. Nesting: a loop L is nested in the smallest loop M != L whose block
        //    set is a strict superset of L's.
        let ids: Vec<LoopId> = self.loops.keys().collect();
        for &id in &ids {
            let my_blocks: HashSet<NodeId> = self.loops[id].blocks.iter().copied().collect();
            let mut best: Option<(LoopId, usize)> = None;
            for &other in &ids {
                if other == id {
                    continue;
                }
                let other_blocks: HashSet<NodeId> = self.loops[other].blocks.iter().copied().collect();
                if other_blocks.len() > my_blocks.len() && my_blocks.is_subset(&other_blocks) {
                    if best.map_or(true, |(_, sz)| other_blocks.len() < sz) {
                        best = Some((other, other_blocks.len()));
                    }
                }
            }
            match best {
                Some((parent, _)) => {
                    self.loops[id].parent = Some(parent);
                }
                None => self.roots.push(id),
            }
        }
        for &id in &ids {
            if let Some(parent) = self.loops[id].parent {
                self.loops[parent].children.push(id);
            }
        }

        self.valid = true;
    }
}

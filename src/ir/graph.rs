//! The `Graph`: node arena, edges, and the resource-guarded analysis caches
//! layered on top of it (§3 "Graph", §4.1 "IR Graph Substrate").

use crate::entity::{entity_impl, PrimaryMap, SecondaryMap};
use crate::ir::node::{NodeAttrs, NodeData, NodeId, Op};
use crate::mode::Mode;
use crate::resource::{Resource, ResourceSet};
use crate::typesystem::{EntityId, TypeId};
use smallvec::SmallVec;

/// A dense reference to a `Graph` owned by a `Program`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphId(u32);
entity_impl!(GraphId);

/// The boolean properties a pass asserts as pre/postconditions (§3 "Graph",
/// §6 "Backend contract").
#[derive(Clone, Copy, Debug)]
pub struct GraphProperties {
    pub consistent_dominance: bool,
    pub consistent_outs: bool,
    pub consistent_loops: bool,
    pub no_bads: bool,
    pub lcssa: bool,
}

impl Default for GraphProperties {
    fn default() -> Self {
        GraphProperties {
            consistent_dominance: false,
            consistent_outs: false,
            consistent_loops: false,
            no_bads: true,
            lcssa: false,
        }
    }
}

/// One function body: a node arena plus the analysis caches that hang off it.
pub struct Graph {
    nodes: PrimaryMap<NodeId, NodeData>,
    /// The method entity this graph is the body of (§3: "Method-entities
    /// either lack a body or own an IR graph whose entity points back to them").
    pub entity: EntityId,
    /// The frame (local-variable layout) type; parameters live here.
    pub frame_type: TypeId,
    start_block: NodeId,
    end_block: NodeId,
    end_node: NodeId,
    /// Nodes kept reachable from `End` regardless of use-count (§3 glossary:
    /// "Keep-alive").
    keep_alive: Vec<NodeId>,
    visited_gen: u32,
    visited: SecondaryMap<NodeId, u32>,
    link: SecondaryMap<NodeId, Option<NodeId>>,
    phi_lists: SecondaryMap<NodeId, Vec<NodeId>>,
    outs: SecondaryMap<NodeId, SmallVec<[(NodeId, u32); 4]>>,
    reserved: ResourceSet,
    pub properties: GraphProperties,
}

impl Graph {
    /// Create a fresh graph with a Start block/node and an End block/node,
    /// both unconditionally connected (Start falls through to End; callers
    /// build the real body by inserting blocks between them).
    pub fn new(entity: EntityId, frame_type: TypeId) -> Self {
        let mut nodes = PrimaryMap::new();
        // The Start block has no control-flow predecessors of its own.
        let start_block = nodes.push(NodeData::new(Op::Block, Mode::Control, None, []));
        let _start_node = nodes.push(NodeData::new(Op::Start, Mode::Tuple, Some(start_block), []));
        let end_block = nodes.push(NodeData::new(Op::Block, Mode::Control, None, [start_block]));
        let end_node = nodes.push(NodeData::new(Op::End, Mode::Control, Some(end_block), []));

        Graph {
            nodes,
            entity,
            frame_type,
            start_block,
            end_block,
            end_node,
            keep_alive: Vec::new(),
            visited_gen: 0,
            visited: SecondaryMap::new(),
            link: SecondaryMap::new(),
            phi_lists: SecondaryMap::new(),
            outs: SecondaryMap::new(),
            reserved: ResourceSet::default(),
            properties: GraphProperties::default(),
        }
    }

    pub fn start_block(&self) -> NodeId {
        self.start_block
    }

    pub fn end_block(&self) -> NodeId {
        self.end_block
    }

    pub fn end_node(&self) -> NodeId {
        self.end_node
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys()
    }

    pub fn node(&self, n: NodeId) -> &NodeData {
        &self.nodes[n]
    }

    pub fn node_mut(&mut self, n: NodeId) -> &mut NodeData {
        &mut self.nodes[n]
    }

    pub fn ins(&self, n: NodeId) -> &[NodeId] {
        &self.nodes[n].ins
    }

    pub fn block_of(&self, n: NodeId) -> Option<NodeId> {
        self.nodes[n].block
    }

    pub fn keep_alive_list(&self) -> &[NodeId] {
        &self.keep_alive
    }

    /// Add `n` to End's keep-alive list (idempotent).
    pub fn add_keep_alive(&mut self, n: NodeId) {
        if !self.keep_alive.contains(&n) {
            self.keep_alive.push(n);
        }
    }

    /// Remove `n` from the keep-alive list, if present.
    pub fn remove_keep_alive(&mut self, n: NodeId) {
        self.keep_alive.retain(|&k| k != n);
    }

    /// Create a new node of opcode `op`. For `Op::Phi`, panics if `ins.len()`
    /// does not match `block`'s predecessor arity — the Phi-arity invariant
    /// (§3) must hold at every observable quiescent state, including the
    /// moment of construction.
    pub fn create_node(
        &mut self,
        op: Op,
        mode: Mode,
        block: Option<NodeId>,
        ins: impl Into<SmallVec<[NodeId; 4]>>,
        attrs: NodeAttrs,
    ) -> NodeId {
        let ins = ins.into();
        if op == Op::Phi {
            let block_id = block.expect("Phi must have a Block");
            let arity = self.nodes[block_id].ins.len();
            assert_eq!(
                ins.len(),
                arity,
                "Phi arity {} does not match Block predecessor arity {}",
                ins.len(),
                arity
            );
        }
        let data = NodeData::new(op, mode, block, ins.clone()).with_attrs(attrs);
        let id = self.nodes.push(data);
        if self.properties.consistent_outs {
            for (pos, &input) in ins.iter().enumerate() {
                self.outs[input].push((id, pos as u32));
            }
        }
        id
    }

    /// Create a new Block node with the given control-flow predecessors.
    pub fn create_block(&mut self, preds: impl Into<SmallVec<[NodeId; 4]>>) -> NodeId {
        self.create_node(Op::Block, Mode::Control, None, preds, NodeAttrs::None)
    }

    /// Set input `i` of `n` to `v`, maintaining the out-edges cache if it is
    /// currently consistent (§4.1).
    pub fn set_input(&mut self, n: NodeId, i: usize, v: NodeId) {
        let old = self.nodes[n].ins[i];
        self.nodes[n].ins[i] = v;
        if self.properties.consistent_outs {
            if let Some(pos) = self.outs[old].iter().position(|&(u, p)| u == n && p == i as u32) {
                self.outs[old].swap_remove(pos);
            }
            self.outs[v].push((n, i as u32));
        }
    }

    /// Append a new input to `n` (used when extending a Block's predecessor
    /// list or a Phi's input list during loop unrolling; callers are
    /// responsible for keeping Phi arity equal to its Block's arity).
    pub fn append_input(&mut self, n: NodeId, v: NodeId) -> usize {
        let pos = self.nodes[n].ins.len();
        self.nodes[n].ins.push(v);
        if self.properties.consistent_outs {
            self.outs[v].push((n, pos as u32));
        }
        pos
    }

    /// Replace all uses of `a` with `b`: every `(user, pos)` edge recorded in
    /// `a`'s out-edges (which must be consistent) is rewritten to point at
    /// `b`. `a` becomes unreachable but is not physically freed (§3
    /// "Lifecycle").
    pub fn replace(&mut self, a: NodeId, b: NodeId) {
        assert!(
            self.properties.consistent_outs,
            "replace() requires assure_outs() to have been called"
        );
        assert_ne!(a, b, "cannot replace a node with itself");
        let uses = std::mem::take(&mut self.outs[a]);
        for &(user, pos) in &uses {
            self.nodes[user].ins[pos as usize] = b;
            self.outs[b].push((user, pos));
        }
        self.keep_alive.iter_mut().for_each(|k| {
            if *k == a {
                *k = b;
            }
        });
    }

    // -- resource tokens ---------------------------------------------------

    pub fn reserve(&mut self, r: Resource) {
        self.reserved.reserve(r);
        if r == Resource::Visited {
            self.visited_gen += 1;
        }
    }

    pub fn free(&mut self, r: Resource) {
        self.reserved.free(r);
    }

    pub fn is_reserved(&self, r: Resource) -> bool {
        self.reserved.is_reserved(r)
    }

    pub fn mark_visited(&mut self, n: NodeId) {
        debug_assert!(self.reserved.is_reserved(Resource::Visited), "Visited not reserved");
        *self.visited.get_mut(n) = self.visited_gen;
    }

    pub fn is_visited(&self, n: NodeId) -> bool {
        debug_assert!(self.reserved.is_reserved(Resource::Visited), "Visited not reserved");
        *self.visited.get(n) == self.visited_gen && self.visited_gen != 0
    }

    pub fn link_get(&self, n: NodeId) -> Option<NodeId> {
        debug_assert!(self.reserved.is_reserved(Resource::Link), "Link not reserved");
        *self.link.get(n)
    }

    pub fn link_set(&mut self, n: NodeId, v: Option<NodeId>) {
        debug_assert!(self.reserved.is_reserved(Resource::Link), "Link not reserved");
        *self.link.get_mut(n) = v;
    }

    pub fn phi_list(&self, block: NodeId) -> &[NodeId] {
        debug_assert!(self.reserved.is_reserved(Resource::PhiList), "PhiList not reserved");
        self.phi_lists.get(block)
    }

    pub fn phi_list_push(&mut self, block: NodeId, phi: NodeId) {
        debug_assert!(self.reserved.is_reserved(Resource::PhiList), "PhiList not reserved");
        self.phi_lists.get_mut(block).push(phi);
    }

    // -- out-edges (use-def) cache ------------------------------------------

    /// (Re)build the out-edges cache by scanning every node's inputs.
    pub fn assure_outs(&mut self) {
        if self.properties.consistent_outs {
            return;
        }
        self.outs.clear();
        let ids: Vec<NodeId> = self.nodes.keys().collect();
        for id in ids {
            let ins: SmallVec<[NodeId; 4]> = self.nodes[id].ins.clone();
            for (pos, input) in ins.into_iter().enumerate() {
                self.outs[input].push((id, pos as u32));
            }
        }
        self.properties.consistent_outs = true;
    }

    pub fn clear_outs(&mut self) {
        self.properties.consistent_outs = false;
    }

    pub fn outs(&self, n: NodeId) -> &[(NodeId, u32)] {
        debug_assert!(self.properties.consistent_outs, "outs are not consistent");
        &self.outs[n]
    }

    /// Any control-flow-graph-mutating pass must call this: clears the
    /// dominance/loop/LCSSA properties in one place so a pass can't forget one.
    pub fn invalidate_control_flow(&mut self) {
        self.properties.consistent_dominance = false;
        self.properties.consistent_loops = false;
        self.properties.lcssa = false;
    }

    // -- walks ---------------------------------------------------------------

    /// Pre/post-order walk starting at `roots`, visiting each node at most
    /// once (mark-and-sweep via the Visited resource, not recursion — cycles
    /// from Phi back-edges would overflow the stack otherwise). Traverses
    /// inputs in index order, so both pre- and post-order are deterministic
    /// (§5 "Ordering").
    pub fn walk_from(&mut self, roots: &[NodeId], mut pre: impl FnMut(&Graph, NodeId), mut post: impl FnMut(&Graph, NodeId)) {
        enum Frame {
            Pre(NodeId),
            Post(NodeId),
        }
        self.reserve(Resource::Visited);
        let mut stack: Vec<Frame> = roots.iter().rev().map(|&r| Frame::Pre(r)).collect();
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Pre(n) => {
                    if self.is_visited(n) {
                        continue;
                    }
                    self.mark_visited(n);
                    pre(self, n);
                    stack.push(Frame::Post(n));
                    let ins = self.nodes[n].ins.clone();
                    for input in ins.into_iter().rev() {
                        if !self.is_visited(input) {
                            stack.push(Frame::Pre(input));
                        }
                    }
                }
                Frame::Post(n) => post(self, n),
            }
        }
        self.free(Resource::Visited);
    }

    /// Nodes reachable from End, in post-order (defs before uses is not
    /// guaranteed for cyclic Phi inputs, but every node's *Block* appears
    /// before any node it dominates in terms of walk discovery order).
    pub fn post_order_from_end(&mut self) -> Vec<NodeId> {
        let end = self.end_node;
        let mut order = Vec::with_capacity(self.nodes.len());
        self.walk_from(&[end], |_, _| {}, |_, n| order.push(n));
        order
    }

    /// All Block nodes, in the order they'd be discovered walking from End.
    pub fn blocks_from_end(&mut self) -> Vec<NodeId> {
        self.post_order_from_end()
            .into_iter()
            .filter(|&n| self.node(n).op == Op::Block)
            .collect()
    }
}

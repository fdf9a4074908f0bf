//! The top-level aggregate (§9 "Global caches"): one `TypeSystem`, one
//! `ModeRegistry`, every `Graph`, and the process-wide caches the double-word
//! lowering pass uses to avoid re-deriving the same intrinsic entity or
//! lowered method type twice. Grounded on cranelift-codegen's `Context`
//! (`cranelift_codegen::Context`), which is likewise the one struct a driver
//! holds across passes rather than threading a dozen loose tables around.

use crate::entity::PrimaryMap;
use crate::ir::graph::{Graph, GraphId};
use crate::mode::ModeRegistry;
use crate::typesystem::{EntityId, TypeId, TypeSystem};
use std::collections::HashMap;

/// Owns every `Graph` plus the type system and mode registry shared across
/// them, and the caches the lowering pass consults by (mode, original type)
/// key so that lowering a method type or resolving an intrinsic is
/// idempotent across repeated calls.
#[derive(Default)]
pub struct Program {
    pub types: TypeSystem,
    pub modes: ModeRegistry,
    pub(crate) graphs: PrimaryMap<GraphId, Graph>,

    /// `__ladd_ll`-style doubleword intrinsic entities, keyed by opcode name
    /// so `lower_dw_ops` only resolves each one once per `Program`.
    pub(crate) intrinsic_cache: HashMap<&'static str, EntityId>,
    /// Lowered method `TypeId`, keyed by the original (pre-lowering) `TypeId`.
    pub(crate) lowered_type_cache: HashMap<TypeId, TypeId>,
}

impl Program {
    pub fn new() -> Self {
        Self {
            types: TypeSystem::new(),
            modes: ModeRegistry::new(),
            graphs: PrimaryMap::new(),
            intrinsic_cache: HashMap::new(),
            lowered_type_cache: HashMap::new(),
        }
    }

    pub fn add_graph(&mut self, graph: Graph) -> GraphId {
        self.graphs.push(graph)
    }

    pub fn graph(&self, id: GraphId) -> &Graph {
        &self.graphs[id]
    }

    pub fn graph_mut(&mut self, id: GraphId) -> &mut Graph {
        &mut self.graphs[id]
    }

    pub fn graph_ids(&self) -> impl Iterator<Item = GraphId> + '_ {
        self.graphs.keys()
    }

    pub fn cached_intrinsic(&self, name: &'static str) -> Option<EntityId> {
        self.intrinsic_cache.get(name).copied()
    }

    pub fn cache_intrinsic(&mut self, name: &'static str, entity: EntityId) {
        self.intrinsic_cache.insert(name, entity);
    }

    pub fn cached_lowered_type(&self, original: TypeId) -> Option<TypeId> {
        self.lowered_type_cache.get(&original).copied()
    }

    pub fn cache_lowered_type(&mut self, original: TypeId, lowered: TypeId) {
        self.lowered_type_cache.insert(original, lowered);
    }

    /// Disjoint field borrows of one graph plus the rest of the program, for
    /// passes that need to mutate a graph while consulting/growing the type
    /// system or the intrinsic/lowered-type caches at the same time.
    pub(crate) fn split_graph_mut(&mut self, id: GraphId) -> (&mut Graph, &mut TypeSystem, &mut HashMap<&'static str, EntityId>, &mut HashMap<TypeId, TypeId>) {
        (
            &mut self.graphs[id],
            &mut self.types,
            &mut self.intrinsic_cache,
            &mut self.lowered_type_cache,
        )
    }
}

//! The IR graph substrate (§4.1) and its derived analyses (§4.5, §4.6).

pub mod cfg;
pub mod dominator;
pub mod dump;
pub mod graph;
pub mod lcssa;
pub mod loop_analysis;
pub mod node;

pub use cfg::ControlFlowGraph;
pub use dominator::DominatorTree;
pub use dump::dump_graph;
pub use graph::{Graph, GraphId, GraphProperties};
pub use lcssa::{check_lcssa, construct_lcssa};
pub use loop_analysis::{LoopAnalysis, LoopData, LoopId};
pub use node::{NodeAttrs, NodeData, NodeId, Op, Relation};

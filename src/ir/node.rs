//! Node identities, opcodes and per-opcode attribute payloads.
//!
//! A `NodeId` is a dense index into a `Graph`'s node arena (see
//! `crate::ir::graph::Graph`); there is no separate `Block`/`Inst`/`Value`
//! distinction the way `cranelift-codegen` has — per the design, a Block
//! *is* a node (`Op::Block`), and every other node carries the `NodeId` of
//! the Block node that owns it.

use crate::entity::entity_impl;
use crate::mode::Mode;
use crate::typesystem::EntityId;
use smallvec::SmallVec;
use std::fmt;

/// A dense reference to a node owned by some `Graph`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);
entity_impl!(NodeId);

/// The closed set of opcodes a node's `op` field may take.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Op {
    Block,
    Phi,
    Start,
    End,
    Return,
    Call,
    Proj,
    Const,
    SymConv,
    Load,
    Store,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    DivMod,
    Shl,
    Shr,
    Shrs,
    Rotl,
    And,
    Or,
    Eor,
    Not,
    Minus,
    Conv,
    Cmp,
    Mux,
    Sel,
    Address,
    Sync,
    Dummy,
    Unknown,
    Bad,
    Keep,
}

impl Op {
    /// Multi-result producers are consumed only through `Proj`; this
    /// recognizes the opcodes whose node mode is `Mode::Tuple`.
    pub fn is_tuple_producer(self) -> bool {
        matches!(self, Op::Call | Op::Load | Op::Store | Op::DivMod | Op::Start)
    }

    /// True for the binary arithmetic opcodes the doubleword pass routes
    /// through a runtime intrinsic call (Add/Sub/Mul/Div/Mod/DivMod/Shl/Shr/
    /// Shrs/Minus), as opposed to the ones it can lower purely structurally
    /// (And/Or/Eor/Not/Rotl's special case).
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Op::Add
                | Op::Sub
                | Op::Mul
                | Op::Div
                | Op::Mod
                | Op::DivMod
                | Op::Shl
                | Op::Shr
                | Op::Shrs
                | Op::Rotl
                | Op::And
                | Op::Or
                | Op::Eor
                | Op::Not
                | Op::Minus
        )
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A comparison relation, as carried by a `Cmp` node's attributes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Relation {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Relation {
    /// The relation `!self` (used when lowering `Cmp`'s boolean-tree form).
    pub fn negated(self) -> Relation {
        match self {
            Relation::Eq => Relation::Ne,
            Relation::Ne => Relation::Eq,
            Relation::Lt => Relation::Ge,
            Relation::Le => Relation::Gt,
            Relation::Gt => Relation::Le,
            Relation::Ge => Relation::Lt,
        }
    }

    /// True for `<, <=, >, >=` — the relations the loop-unroller's linear
    /// induction recognizer accepts in a header `Cmp` (§4.3).
    pub fn is_ordered(self) -> bool {
        matches!(self, Relation::Lt | Relation::Le | Relation::Gt | Relation::Ge)
    }

    /// The strict/non-strict half of an ordered relation (used when the
    /// doubleword `Cmp` lowering splits `REL` into a high-word strict test
    /// plus a high-word-equal low-word `rel` test).
    pub fn strict(self) -> Relation {
        match self {
            Relation::Le => Relation::Lt,
            Relation::Ge => Relation::Gt,
            other => other,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Relation::Eq => "==",
            Relation::Ne => "!=",
            Relation::Lt => "<",
            Relation::Le => "<=",
            Relation::Gt => ">",
            Relation::Ge => ">=",
        };
        f.write_str(s)
    }
}

/// Per-opcode attribute payload. Most opcodes carry no attributes beyond
/// `op`/`mode`/`ins`; the ones that do are listed here.
#[derive(Clone, Debug, Default)]
pub enum NodeAttrs {
    #[default]
    None,
    /// `Const`'s value.
    Const(crate::tarval::Tarval),
    /// `Proj`'s selected component index into its predecessor's tuple.
    Proj { num: u32 },
    /// `Cmp`'s relation.
    Cmp { relation: Relation },
    /// `Call`/`SymConv`/`Sel`/`Address`'s referenced entity.
    Entity(EntityId),
}

/// A single node in the graph.
#[derive(Clone, Debug)]
pub struct NodeData {
    pub op: Op,
    pub mode: Mode,
    /// `None` only for `Op::Block` itself (and the handful of opcodes that,
    /// like `Start`, are pinned to their own block at construction).
    pub block: Option<NodeId>,
    pub ins: SmallVec<[NodeId; 4]>,
    pub attrs: NodeAttrs,
    pub dbg_info: Option<String>,
    pub pinned: bool,
}

impl NodeData {
    /// Construct a node with no attributes and no debug info.
    pub fn new(op: Op, mode: Mode, block: Option<NodeId>, ins: impl Into<SmallVec<[NodeId; 4]>>) -> Self {
        NodeData {
            op,
            mode,
            block,
            ins: ins.into(),
            attrs: NodeAttrs::None,
            dbg_info: None,
            pinned: false,
        }
    }

    /// Builder: attach attributes.
    pub fn with_attrs(mut self, attrs: NodeAttrs) -> Self {
        self.attrs = attrs;
        self
    }

    /// Builder: mark pinned (cannot be reordered/hoisted by later passes;
    /// the passes in this crate only read this flag, they never set it
    /// themselves except to preserve an original node's pinned-ness).
    pub fn with_pinned(mut self, pinned: bool) -> Self {
        self.pinned = pinned;
        self
    }

    /// The constant this node carries, if it is a `Const`.
    pub fn const_tarval(&self) -> Option<crate::tarval::Tarval> {
        match &self.attrs {
            NodeAttrs::Const(tv) => Some(*tv),
            _ => None,
        }
    }

    /// The `Proj` index this node selects, if it is a `Proj`.
    pub fn proj_num(&self) -> Option<u32> {
        match &self.attrs {
            NodeAttrs::Proj { num } => Some(*num),
            _ => None,
        }
    }

    /// The relation this node carries, if it is a `Cmp`.
    pub fn relation(&self) -> Option<Relation> {
        match &self.attrs {
            NodeAttrs::Cmp { relation } => Some(*relation),
            _ => None,
        }
    }

    /// The entity this node refers to, if it carries one.
    pub fn entity(&self) -> Option<EntityId> {
        match &self.attrs {
            NodeAttrs::Entity(e) => Some(*e),
            _ => None,
        }
    }
}

//! Textual graph dump (§6/§10), one line per node: index, opcode, mode,
//! block, and inputs. Grounded on cranelift-codegen's `cfg_printer`-style
//! dumpers — plain text meant for eyeballing during development and test
//! failure output, not a parseable exchange format.

use crate::ir::graph::Graph;
use crate::ir::node::{NodeAttrs, Op};
use std::fmt::Write as _;

/// Render every node in `graph` as one line, in `NodeId` order.
pub fn dump_graph(graph: &Graph) -> String {
    let mut out = String::new();
    for n in graph.node_ids() {
        let data = graph.node(n);
        let block = match data.block {
            Some(b) => format!("@{b}"),
            None => String::new(),
        };
        let ins: Vec<String> = graph.ins(n).iter().map(|i| i.to_string()).collect();
        write!(
            out,
            "{:>6} = {:<8} {:<10}{} ({})",
            n.to_string(),
            data.op,
            data.mode,
            block,
            ins.join(", ")
        )
        .unwrap();
        match &data.attrs {
            NodeAttrs::Const(t) => write!(out, "  [{t}]").unwrap(),
            NodeAttrs::Proj { num } => write!(out, "  [#{num}]").unwrap(),
            NodeAttrs::Cmp { relation } => write!(out, "  [{relation}]").unwrap(),
            NodeAttrs::Entity(e) => write!(out, "  [{e}]").unwrap(),
            NodeAttrs::None => {}
        }
        if data.op == Op::Block {
            // Blocks list control-flow predecessors above; nothing extra to add.
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::Mode;
    use crate::typesystem::{EntityData, EntityKind, Segment, TypeKind, TypeSystem, Visibility};

    #[test]
    fn dump_includes_start_and_end() {
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
        let g = Graph::new(ent, ty);
        let text = dump_graph(&g);
        assert!(text.contains("Start"));
        assert!(text.contains("End"));
    }
}

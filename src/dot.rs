use std::io::Write;

use crate::{graph::topo_order, Node, NodeKind};

/// Builder for a Graphviz dot export of the nodes below a root.
pub struct DotBuilder<'g> {
    root: Node<'g>,
    show_values: bool,
    highlights: Vec<u32>,
}

impl<'g> Node<'g> {
    pub fn dot_builder(&self) -> DotBuilder<'g> {
        DotBuilder {
            root: *self,
            show_values: true,
            highlights: vec![],
        }
    }
}

impl<'g> DotBuilder<'g> {
    /// Whether to print `value` and `grad` in the vertex labels.
    pub fn show_values(mut self, v: bool) -> Self {
        self.show_values = v;
        self
    }

    /// Fill the vertex of this node.
    pub fn highlights(mut self, node: Node<'g>) -> Self {
        self.highlights.push(node.idx);
        self
    }

    /// Write graphviz dot file to the given writer.
    pub fn dot(&self, writer: &mut impl Write) -> std::io::Result<()> {
        let nodes = self.root.graph.nodes.borrow();
        let order = topo_order(&nodes, self.root.idx);
        writeln!(writer, "digraph G {{\nrankdir=\"LR\";")?;
        for &id in &order {
            let node = &nodes[id as usize];
            let shape = match node.kind {
                NodeKind::Input(_) => "box",
                NodeKind::Constant(_) => "plaintext",
                NodeKind::Binary(_) | NodeKind::Sum => "ellipse",
            };
            let op = match node.kind {
                NodeKind::Binary(op) => format!(" ({})", op.symbol()),
                NodeKind::Sum => " (sum)".to_string(),
                _ => String::new(),
            };
            let values = if self.show_values {
                format!(
                    "\\nvalue:{}, grad:{}",
                    fmt_opt(node.value),
                    fmt_opt(node.grad)
                )
            } else {
                String::new()
            };
            let style = if self.highlights.contains(&id) {
                " style=filled fillcolor=\"#ffff7f\""
            } else {
                ""
            };
            writeln!(
                writer,
                "a{id} [label=\"{}{op}{values}\" shape={shape}{style}];",
                escape(&node.label)
            )?;
        }
        for &id in &order {
            for child in &nodes[id as usize].children {
                writeln!(writer, "a{child} -> a{id};")?;
            }
        }
        writeln!(writer, "}}")?;
        Ok(())
    }
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

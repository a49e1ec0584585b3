//! Shared memory arena for the nodes of a computation graph.
//! See https://rufflewind.com/2016-12-30/reverse-mode-automatic-differentiation
//!
//! Nodes refer to each other by index into the arena, so a node can be the
//! operand of any number of parents without owning cycles. The graph must
//! stay acyclic: the builders can only refer to existing nodes, and
//! [`Node::add_child`] refuses edges that would close a cycle.

use std::{
    cell::RefCell,
    fmt::Debug,
    ops::{Add, Div, Mul, Sub},
};

use log::{debug, trace};

use crate::{
    error::{GraphError, Result},
    BinaryOp, Feed,
};

#[derive(Default, Debug)]
pub struct Graph {
    pub(crate) nodes: RefCell<Vec<GraphNode>>,
}

#[derive(Clone, Debug)]
pub(crate) struct GraphNode {
    pub label: String,
    pub kind: NodeKind,
    pub children: Vec<u32>,
    pub parents: Vec<u32>,
    pub value: Option<f64>,
    pub grad: Option<f64>,
}

/// The closed set of node variants.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    /// Leaf reading its value from the feed under this name.
    Input(String),
    /// Leaf with a fixed value.
    Constant(f64),
    /// Exactly two children, `(lhs, rhs)`.
    Binary(BinaryOp),
    /// Sum of any number of children.
    Sum,
}

/// A handle to a node in a [`Graph`].
#[derive(Copy, Clone)]
pub struct Node<'g> {
    pub(crate) graph: &'g Graph,
    pub(crate) idx: u32,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn input(&self, name: impl Into<String>) -> Node<'_> {
        let name = name.into();
        self.push(name.clone(), NodeKind::Input(name), vec![])
    }

    pub fn constant(&self, value: f64) -> Node<'_> {
        self.push(format!("{value}"), NodeKind::Constant(value), vec![])
    }

    pub fn binary<'g>(&'g self, op: BinaryOp, lhs: Node<'g>, rhs: Node<'g>) -> Node<'g> {
        self.check(lhs);
        self.check(rhs);
        let label = if cfg!(feature = "expr_name") {
            format!("({} {} {})", lhs.label(), op.symbol(), rhs.label())
        } else {
            self.default_label()
        };
        self.push(label, NodeKind::Binary(op), vec![lhs.idx, rhs.idx])
    }

    pub fn add<'g>(&'g self, lhs: Node<'g>, rhs: Node<'g>) -> Node<'g> {
        self.binary(BinaryOp::Add, lhs, rhs)
    }

    pub fn sub<'g>(&'g self, lhs: Node<'g>, rhs: Node<'g>) -> Node<'g> {
        self.binary(BinaryOp::Sub, lhs, rhs)
    }

    pub fn mul<'g>(&'g self, lhs: Node<'g>, rhs: Node<'g>) -> Node<'g> {
        self.binary(BinaryOp::Mul, lhs, rhs)
    }

    pub fn div<'g>(&'g self, lhs: Node<'g>, rhs: Node<'g>) -> Node<'g> {
        self.binary(BinaryOp::Div, lhs, rhs)
    }

    pub fn pow<'g>(&'g self, lhs: Node<'g>, rhs: Node<'g>) -> Node<'g> {
        self.binary(BinaryOp::Pow, lhs, rhs)
    }

    /// Sum of all the given terms. More terms can be appended later with
    /// [`Node::add_child`]; an empty sum evaluates to zero.
    pub fn sum<'g>(&'g self, terms: &[Node<'g>]) -> Node<'g> {
        for term in terms {
            self.check(*term);
        }
        let label = if cfg!(feature = "expr_name") {
            let names: Vec<_> = terms.iter().map(|term| term.label()).collect();
            format!("sum({})", names.join(", "))
        } else {
            self.default_label()
        };
        self.push(
            label,
            NodeKind::Sum,
            terms.iter().map(|term| term.idx).collect(),
        )
    }

    fn default_label(&self) -> String {
        format!("a{}", self.len())
    }

    fn push(&self, label: String, kind: NodeKind, children: Vec<u32>) -> Node<'_> {
        let mut nodes = self.nodes.borrow_mut();
        let idx = nodes.len() as u32;
        for &child in &children {
            nodes[child as usize].parents.push(idx);
        }
        nodes.push(GraphNode {
            label,
            kind,
            children,
            parents: vec![],
            value: None,
            grad: None,
        });
        Node { graph: self, idx }
    }

    fn check(&self, node: Node<'_>) {
        assert!(
            std::ptr::eq(self, node.graph),
            "node {} belongs to a different graph",
            node.idx
        );
    }
}

impl<'g> Add for Node<'g> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        self.graph.add(self, rhs)
    }
}

impl<'g> Sub for Node<'g> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        self.graph.sub(self, rhs)
    }
}

impl<'g> Mul for Node<'g> {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self::Output {
        self.graph.mul(self, rhs)
    }
}

impl<'g> Div for Node<'g> {
    type Output = Self;
    fn div(self, rhs: Self) -> Self::Output {
        self.graph.div(self, rhs)
    }
}

impl<'g> PartialEq for Node<'g> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.graph, other.graph) && self.idx == other.idx
    }
}

impl<'g> Eq for Node<'g> {}

impl<'g> Debug for Node<'g> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let nodes = self.graph.nodes.borrow();
        let node = &nodes[self.idx as usize];
        f.debug_struct("Node")
            .field("label", &node.label)
            .field("kind", &node.kind)
            .field("value", &node.value)
            .field("grad", &node.grad)
            .finish()
    }
}

impl<'g> Node<'g> {
    /// Raise this node to the power of `rhs`.
    pub fn pow(self, rhs: Self) -> Self {
        self.graph.pow(self, rhs)
    }

    pub fn label(&self) -> String {
        self.graph.nodes.borrow()[self.idx as usize].label.clone()
    }

    pub fn kind(&self) -> NodeKind {
        self.graph.nodes.borrow()[self.idx as usize].kind.clone()
    }

    /// Value from the last forward pass through this node, if any.
    pub fn value(&self) -> Option<f64> {
        self.graph.nodes.borrow()[self.idx as usize].value
    }

    /// Accumulated gradient, if any backward pass has reached this node.
    pub fn grad(&self) -> Option<f64> {
        self.graph.nodes.borrow()[self.idx as usize].grad
    }

    pub fn children(&self) -> Vec<Node<'g>> {
        let nodes = self.graph.nodes.borrow();
        self.handles(&nodes[self.idx as usize].children)
    }

    /// Nodes using this one as an operand, once per edge.
    pub fn parents(&self) -> Vec<Node<'g>> {
        let nodes = self.graph.nodes.borrow();
        self.handles(&nodes[self.idx as usize].parents)
    }

    fn handles(&self, indices: &[u32]) -> Vec<Node<'g>> {
        indices
            .iter()
            .map(|&idx| Node {
                graph: self.graph,
                idx,
            })
            .collect()
    }

    /// Append operands to a [`NodeKind::Sum`] node, in order.
    ///
    /// Fails without modifying anything if this node has a fixed arity or
    /// if any of the new edges would close a cycle.
    pub fn add_child(&self, children: &[Node<'g>]) -> Result<()> {
        for child in children {
            self.graph.check(*child);
        }
        let mut nodes = self.graph.nodes.borrow_mut();
        let this = &nodes[self.idx as usize];
        if this.kind != NodeKind::Sum {
            return Err(GraphError::FixedArity {
                label: this.label.clone(),
            });
        }
        for child in children {
            if topo_order(&nodes, child.idx).contains(&self.idx) {
                return Err(GraphError::Cycle {
                    parent: nodes[self.idx as usize].label.clone(),
                    child: nodes[child.idx as usize].label.clone(),
                });
            }
        }
        for child in children {
            nodes[self.idx as usize].children.push(child.idx);
            nodes[child.idx as usize].parents.push(self.idx);
        }
        Ok(())
    }

    /// Evaluate this node and everything below it with the given feed.
    pub fn forward(&self, feed: &(impl Feed + ?Sized)) -> Result<f64> {
        self.forward_cb(feed, |_| ())
    }

    /// Same as [`Node::forward`], calling `callback` after each node is evaluated.
    pub fn forward_cb(
        &self,
        feed: &(impl Feed + ?Sized),
        mut callback: impl FnMut(Node<'g>),
    ) -> Result<f64> {
        let order = topo_order(&self.graph.nodes.borrow(), self.idx);
        debug!("forward from {}: {} nodes", self.label(), order.len());
        for &idx in &order {
            {
                let mut nodes = self.graph.nodes.borrow_mut();
                let value = evaluate(&nodes, idx, feed)?;
                trace!("forward {} = {value}", nodes[idx as usize].label);
                nodes[idx as usize].value = Some(value);
            }
            callback(Node {
                graph: self.graph,
                idx,
            });
        }
        let value = value_of(&self.graph.nodes.borrow(), self.idx)?;
        debug!("forward from {} done: {value}", self.label());
        Ok(value)
    }

    /// Propagate the gradient of this node down to every node below it.
    ///
    /// The gradient of this node is seeded with 1 unless it already has one.
    /// Every other node receives the sum of the contributions over all paths
    /// from this node, added to whatever gradient it held before. Call
    /// [`Node::clear_grad_recursive`] to start from scratch.
    ///
    /// The exponent of a power whose base is not positive has no defined
    /// partial. If the exponent depends on no input, that edge is skipped,
    /// so an exponent reached only through it keeps `grad() == None` while
    /// the same exponent over a positive base gets `Some(x^y * ln x)`.
    pub fn backward(&self) -> Result<f64> {
        self.backward_cb(|_| ())
    }

    /// Same as [`Node::backward`], calling `callback` after each node has
    /// propagated its gradient.
    pub fn backward_cb(&self, mut callback: impl FnMut(Node<'g>)) -> Result<f64> {
        let (order, requires, mut delta) = {
            let mut nodes = self.graph.nodes.borrow_mut();
            let order = topo_order(&nodes, self.idx);
            for &idx in &order {
                value_of(&nodes, idx)?;
            }

            // Whether the sub-DAG of each node depends on the feed at all.
            let mut requires = vec![false; nodes.len()];
            for &idx in &order {
                let node = &nodes[idx as usize];
                requires[idx as usize] = matches!(node.kind, NodeKind::Input(_))
                    || node.children.iter().any(|&c| requires[c as usize]);
            }

            // Gradient received by each node during this pass only.
            let mut delta = vec![None; nodes.len()];
            let seed = *nodes[self.idx as usize].grad.get_or_insert(1.);
            delta[self.idx as usize] = Some(seed);
            debug!(
                "backward from {}: {} nodes, seed {seed}",
                nodes[self.idx as usize].label,
                order.len()
            );
            (order, requires, delta)
        };

        // Parents come before children in reverse post-order, so a node's
        // delta is complete by the time it is taken.
        for &idx in order.iter().rev() {
            if let Some(grad) = delta[idx as usize].take() {
                let mut nodes = self.graph.nodes.borrow_mut();
                propagate(&mut nodes, idx, grad, &requires, &mut delta)?;
            }
            callback(Node {
                graph: self.graph,
                idx,
            });
        }

        let grad = self.grad().unwrap_or(1.);
        debug!("backward from {} done: {grad}", self.label());
        Ok(grad)
    }

    pub fn clear_grad(&self) {
        self.graph.nodes.borrow_mut()[self.idx as usize].grad = None;
    }

    /// Clear the gradient of this node and of every node below it.
    pub fn clear_grad_recursive(&self) {
        let mut nodes = self.graph.nodes.borrow_mut();
        for idx in topo_order(&nodes, self.idx) {
            nodes[idx as usize].grad = None;
        }
    }
}

/// Post-order of the sub-DAG rooted at `root`, each node once: every node
/// comes after all of its children.
pub(crate) fn topo_order(nodes: &[GraphNode], root: u32) -> Vec<u32> {
    let mut order = vec![];
    let mut visited = vec![false; nodes.len()];
    visited[root as usize] = true;
    let mut stack = vec![(root, 0)];
    while let Some(top) = stack.last_mut() {
        let (idx, next) = *top;
        top.1 += 1;
        match nodes[idx as usize].children.get(next) {
            Some(&child) => {
                if !visited[child as usize] {
                    visited[child as usize] = true;
                    stack.push((child, 0));
                }
            }
            None => {
                order.push(idx);
                stack.pop();
            }
        }
    }
    order
}

fn value_of(nodes: &[GraphNode], idx: u32) -> Result<f64> {
    let node = &nodes[idx as usize];
    node.value.ok_or_else(|| GraphError::BackwardBeforeForward {
        label: node.label.clone(),
    })
}

/// Evaluate a single node whose children already hold values.
fn evaluate(nodes: &[GraphNode], idx: u32, feed: &(impl Feed + ?Sized)) -> Result<f64> {
    let node = &nodes[idx as usize];
    match &node.kind {
        NodeKind::Input(name) => feed
            .get(name)
            .ok_or_else(|| GraphError::MissingInput { name: name.clone() }),
        NodeKind::Constant(value) => Ok(*value),
        NodeKind::Binary(op) => op.eval(
            value_of(nodes, node.children[0])?,
            value_of(nodes, node.children[1])?,
        ),
        NodeKind::Sum => node
            .children
            .iter()
            .map(|&child| value_of(nodes, child))
            .sum(),
    }
}

/// Push `grad`, the gradient this node received in the current pass, to its
/// children weighted by the local derivatives.
fn propagate(
    nodes: &mut [GraphNode],
    idx: u32,
    grad: f64,
    requires: &[bool],
    delta: &mut [Option<f64>],
) -> Result<()> {
    let node = &nodes[idx as usize];
    let contributions: Vec<(u32, f64)> = match &node.kind {
        NodeKind::Input(_) | NodeKind::Constant(_) => vec![],
        NodeKind::Sum => node.children.iter().map(|&child| (child, grad)).collect(),
        NodeKind::Binary(op) => {
            let (lhs, rhs) = (node.children[0], node.children[1]);
            let (dlhs, drhs) = op.partials(
                value_of(nodes, lhs)?,
                value_of(nodes, rhs)?,
                requires[rhs as usize],
            )?;
            let mut contributions = vec![(lhs, grad * dlhs)];
            if let Some(drhs) = drhs {
                contributions.push((rhs, grad * drhs));
            }
            contributions
        }
    };
    trace!("backward {} = {grad}", node.label);
    for (child, contribution) in contributions {
        *nodes[child as usize].grad.get_or_insert(0.) += contribution;
        *delta[child as usize].get_or_insert(0.) += contribution;
    }
    Ok(())
}

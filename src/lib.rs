//! Reverse-mode automatic differentiation over scalar computation graphs.
//!
//! Build a graph of nodes in a [`Graph`], evaluate it with [`Node::forward`]
//! and get the derivative of the root with respect to every node below it
//! with [`Node::backward`].
//!
//! ```
//! use scalargrad::Graph;
//!
//! let graph = Graph::new();
//! let x = graph.input("x");
//! let one = graph.constant(1.);
//! let two = graph.constant(2.);
//! let product = x * (x.pow(two) + one);
//!
//! assert_eq!(product.forward(&[("x", 3.)]).unwrap(), 30.);
//! product.backward().unwrap();
//! assert_eq!(x.grad(), Some(28.));
//! ```

mod binary_op;
mod dot;
pub mod error;
mod feed;
mod graph;

pub use binary_op::BinaryOp;
pub use dot::DotBuilder;
pub use error::{GraphError, Result};
pub use feed::Feed;
pub use graph::{Graph, Node, NodeKind};

#[cfg(feature = "macro")]
pub use scalargrad_macro::scalargrad;

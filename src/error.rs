use thiserror::Error;

use crate::BinaryOp;

/// Errors raised while building or evaluating a graph.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Value for input name {name} missing from feed.")]
    MissingInput { name: String },
    #[error("{op} is undefined for lhs = {lhs}, rhs = {rhs}: {reason}")]
    Domain {
        op: BinaryOp,
        lhs: f64,
        rhs: f64,
        reason: &'static str,
    },
    #[error(
        "Value of {label} is not defined in the forward pass. Call `forward()` before `backward()`."
    )]
    BackwardBeforeForward { label: String },
    #[error("Adding {child} as a child of {parent} would create a cycle")]
    Cycle { parent: String, child: String },
    #[error("{label} has a fixed number of children")]
    FixedArity { label: String },
}

pub type Result<T> = std::result::Result<T, GraphError>;

//! Error types for the search tree.

use std::collections::TryReserveError;

use thiserror::Error;

use crate::search::NodeId;

/// Errors that can occur while manipulating the search tree.
#[derive(Error, Debug)]
pub enum TreeError {
    /// A buffer of the tree could not grow
    #[error("Allocation failed: {0}")]
    Allocation(#[from] TryReserveError),

    /// The caller broke a contract of the tree (wrong node role, double release, ...)
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// The node handle is stale or belongs to another tree
    #[error("Unknown node {0}")]
    UnknownNode(NodeId),

    /// The relaxation solver reported a failure
    #[error("Relaxation solver failed: {0}")]
    Relaxation(String),
}

/// Result type for tree operations.
pub type TreeResult<T> = Result<T, TreeError>;

/// Builds the error for a broken caller contract.
///
/// Contract violations are programming errors: debug builds abort on the
/// spot, release builds hand an `InvalidOperation` back to the caller.
pub(crate) fn contract_violation(msg: impl Into<String>) -> TreeError {
    let msg = msg.into();
    if cfg!(debug_assertions) {
        panic!("search tree contract violated: {msg}");
    }
    TreeError::InvalidOperation(msg)
}

/// Same as [`contract_violation`] for a node handle that does not resolve.
pub(crate) fn unknown_node(id: NodeId) -> TreeError {
    if cfg!(debug_assertions) {
        panic!("search tree contract violated: unknown node {id}");
    }
    TreeError::UnknownNode(id)
}

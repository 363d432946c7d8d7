//! Search tree engine for LP-based branch-and-bound.
//!
//! The crate manages the nodes of a mixed-integer branch-and-bound search
//! and keeps an external LP solver in step with whichever node is being
//! processed. It provides:
//!
//! - **Node lifecycle**: Child, Sibling, Leaf, Active, then Deadend, Junction,
//!   Fork or Subroot once processed
//! - **Path switching**: bound changes are undone/applied only along the
//!   part of the root-to-active path that actually changes
//! - **Incremental relaxations**: Forks store the columns/rows they added,
//!   Subroots a complete copy; loading replays the minimum needed
//! - **Shared warm starts**: one basis snapshot per Fork/Subroot, handed to
//!   all pending descendants at once and freed with the last one
//!
//! The LP solver is reached through the [`LpSolver`] trait. Branching rules,
//! node processing and cut generation are left to the caller.
//!
//! # Example
//!
//! ```ignore
//! use solver_tree::{Activation, Domains, LoadStatus, Tree, TreeSettings};
//!
//! let mut tree = Tree::new(solver, Domains::new(n), TreeSettings::default())?;
//! let root = tree.create_child(f64::NEG_INFINITY, 0.0)?;
//! let mut next = Some(root);
//!
//! while let Some(node) = next {
//!     if let Activation::Activated(_) = tree.activate(Some(node))? {
//!         if tree.load_relaxation()? == LoadStatus::Loaded {
//!             tree.solve_relaxation()?;
//!             // branch: tree.create_child(..) + tree.add_bound_change(..)
//!         }
//!     }
//!     next = tree.best_node()?;
//! }
//! tree.activate(None)?;
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod domain;
pub mod error;
pub mod lp;
pub mod search;
pub mod settings;

pub use domain::{BoundChange, BoundChangeLog, BoundKind, BoundOutcome, Domains};
pub use error::{TreeError, TreeResult};
pub use lp::{LpSize, LpSolver, LpStateHandle, LpStatus, Relaxation};
pub use search::{
    Activation, ConsId, Frontier, LoadStatus, Node, NodeId, NodeKey, NodeType, SnapshotContext,
    SnapshotPolicy, Tree, TreeStats,
};
pub use settings::{NodeSelection, SnapshotStrategy, TreeSettings};

//! Search node representation.

use super::{NodeId, NodeKey};
use crate::domain::BoundChangeLog;
use crate::lp::{LpSolver, LpStateHandle};

/// Opaque identifier of a constraint owned by an external constraint store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsId(pub usize);

/// Role of a search node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    /// Created below the active node, not explored yet.
    Child,

    /// Unexplored child of the active node's parent.
    Sibling,

    /// Waiting in the frontier.
    Leaf,

    /// Currently being processed.
    Active,

    /// Processed without producing children.
    Deadend,

    /// Produced children without changing the relaxation.
    Junction,

    /// Produced children; stores the relaxation additions relative to its parent.
    Fork,

    /// Produced children; stores the complete relaxation.
    Subroot,
}

/// Payload of a Fork node.
pub(crate) struct ForkData<S: LpSolver> {
    pub open_children: usize,
    pub added_cols: Vec<S::Column>,
    pub added_rows: Vec<S::Row>,
    pub lp_state: LpStateHandle<S::Basis>,
}

/// Payload of a Subroot node.
pub(crate) struct SubrootData<S: LpSolver> {
    pub open_children: usize,
    pub cols: Vec<S::Column>,
    pub rows: Vec<S::Row>,
    pub lp_state: LpStateHandle<S::Basis>,
}

/// Role together with its role-specific data.
pub(crate) enum NodeKind<S: LpSolver> {
    Child { pos: usize },
    Sibling { pos: usize },
    Leaf,
    Active,
    Deadend,
    Junction { open_children: usize },
    Fork(Box<ForkData<S>>),
    Subroot(Box<SubrootData<S>>),
}

impl<S: LpSolver> NodeKind<S> {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Child { .. } => NodeType::Child,
            NodeKind::Sibling { .. } => NodeType::Sibling,
            NodeKind::Leaf => NodeType::Leaf,
            NodeKind::Active => NodeType::Active,
            NodeKind::Deadend => NodeType::Deadend,
            NodeKind::Junction { .. } => NodeType::Junction,
            NodeKind::Fork(_) => NodeType::Fork,
            NodeKind::Subroot(_) => NodeType::Subroot,
        }
    }

    /// Children still alive, for roles that have children.
    pub fn open_children(&self) -> Option<usize> {
        match self {
            NodeKind::Junction { open_children } => Some(*open_children),
            NodeKind::Fork(f) => Some(f.open_children),
            NodeKind::Subroot(s) => Some(s.open_children),
            NodeKind::Child { .. }
            | NodeKind::Sibling { .. }
            | NodeKind::Leaf
            | NodeKind::Active
            | NodeKind::Deadend => None,
        }
    }

    pub fn open_children_mut(&mut self) -> Option<&mut usize> {
        match self {
            NodeKind::Junction { open_children } => Some(open_children),
            NodeKind::Fork(f) => Some(&mut f.open_children),
            NodeKind::Subroot(s) => Some(&mut s.open_children),
            NodeKind::Child { .. }
            | NodeKind::Sibling { .. }
            | NodeKind::Leaf
            | NodeKind::Active
            | NodeKind::Deadend => None,
        }
    }

    pub fn lp_state(&self) -> Option<&LpStateHandle<S::Basis>> {
        match self {
            NodeKind::Fork(f) => Some(&f.lp_state),
            NodeKind::Subroot(s) => Some(&s.lp_state),
            NodeKind::Child { .. }
            | NodeKind::Sibling { .. }
            | NodeKind::Leaf
            | NodeKind::Active
            | NodeKind::Deadend
            | NodeKind::Junction { .. } => None,
        }
    }

    pub fn lp_state_mut(&mut self) -> Option<&mut LpStateHandle<S::Basis>> {
        match self {
            NodeKind::Fork(f) => Some(&mut f.lp_state),
            NodeKind::Subroot(s) => Some(&mut s.lp_state),
            NodeKind::Child { .. }
            | NodeKind::Sibling { .. }
            | NodeKind::Leaf
            | NodeKind::Active
            | NodeKind::Deadend
            | NodeKind::Junction { .. } => None,
        }
    }

    /// A processed node whose subtree is exhausted.
    pub fn is_exhausted(&self) -> bool {
        match self {
            NodeKind::Deadend => true,
            NodeKind::Junction { .. } | NodeKind::Fork(_) | NodeKind::Subroot(_) => {
                self.open_children() == Some(0)
            }
            NodeKind::Child { .. } | NodeKind::Sibling { .. } | NodeKind::Leaf | NodeKind::Active => {
                false
            }
        }
    }
}

/// A node in the B&B search tree.
pub struct Node<S: LpSolver> {
    /// Creation counter, unique within a tree.
    pub(crate) number: u64,

    /// Parent node (None for root). Non-owning.
    pub(crate) parent: Option<NodeId>,

    /// Depth in the tree (0 for root).
    pub(crate) depth: usize,

    /// Lower bound on optimal objective in this subtree.
    pub(crate) lower_bound: f64,

    /// Estimate of best integer solution reachable.
    pub(crate) estimate: f64,

    /// Constraints only valid in this subtree.
    pub(crate) constraints: Vec<ConsId>,

    /// Bound changes from parent to this node.
    pub(crate) bound_changes: BoundChangeLog,

    /// Fork/Subroot whose LP state this node still holds a share of.
    pub(crate) lp_ref: Option<NodeId>,

    /// On the root-to-active path.
    pub(crate) on_path: bool,

    pub(crate) kind: NodeKind<S>,
}

impl<S: LpSolver> Node<S> {
    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn lower_bound(&self) -> f64 {
        self.lower_bound
    }

    pub fn estimate(&self) -> f64 {
        self.estimate
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    pub fn bound_changes(&self) -> &BoundChangeLog {
        &self.bound_changes
    }

    pub fn local_constraints(&self) -> &[ConsId] {
        &self.constraints
    }

    /// Returns true if the node lies on the root-to-active path.
    pub fn is_on_path(&self) -> bool {
        self.on_path
    }

    /// Children still alive (Junction, Fork and Subroot only).
    pub fn open_children(&self) -> Option<usize> {
        self.kind.open_children()
    }

    /// Warm-start snapshot owned by a Fork or Subroot.
    pub fn lp_state(&self) -> Option<&LpStateHandle<S::Basis>> {
        self.kind.lp_state()
    }

    /// Fork/Subroot whose snapshot this node has not consumed yet.
    pub fn lp_state_ref(&self) -> Option<NodeId> {
        self.lp_ref
    }

    /// Columns and rows stored by a Fork (relative) or Subroot (complete).
    pub fn stored_lp_size(&self) -> Option<(usize, usize)> {
        match &self.kind {
            NodeKind::Fork(f) => Some((f.added_cols.len(), f.added_rows.len())),
            NodeKind::Subroot(s) => Some((s.cols.len(), s.rows.len())),
            _ => None,
        }
    }

    /// Ordering key for node selection.
    pub fn key(&self) -> NodeKey {
        NodeKey {
            number: self.number,
            depth: self.depth,
            lower_bound: self.lower_bound,
            estimate: self.estimate,
        }
    }

    /// Check if this node can be pruned by an incumbent.
    ///
    /// A node can be pruned if its lower bound >= incumbent objective.
    pub fn can_prune(&self, cutoff: f64) -> bool {
        self.lower_bound >= cutoff
    }
}

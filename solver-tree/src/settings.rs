//! Configuration settings for the search tree.

use std::cmp::Ordering;

use compare::Compare;

use crate::search::{NodeKey, SnapshotContext, SnapshotPolicy};

/// Node selection strategy for the frontier.
///
/// Used as a comparator over [`NodeKey`]s: `Ordering::Greater` means the
/// left node should be explored before the right one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeSelection {
    /// Always select node with best (lowest) dual bound.
    #[default]
    BestBound,

    /// Depth-first search (helps find feasible solutions quickly).
    DepthFirst,

    /// Select by estimated objective value.
    BestEstimate,
}

impl Compare<NodeKey> for NodeSelection {
    fn compare(&self, l: &NodeKey, r: &NodeKey) -> Ordering {
        let primary = match self {
            // Lowest bound first, deeper nodes break ties
            NodeSelection::BestBound => r
                .lower_bound
                .total_cmp(&l.lower_bound)
                .then(l.depth.cmp(&r.depth)),
            NodeSelection::DepthFirst => l
                .depth
                .cmp(&r.depth)
                .then(r.lower_bound.total_cmp(&l.lower_bound)),
            NodeSelection::BestEstimate => r
                .estimate
                .total_cmp(&l.estimate)
                .then(r.lower_bound.total_cmp(&l.lower_bound)),
        };
        // Older nodes win remaining ties so the order is total
        primary.then(r.number.cmp(&l.number))
    }
}

/// Decides whether a node leaving the active role keeps an incremental
/// (Fork) or a complete (Subroot) copy of the relaxation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SnapshotStrategy {
    /// Only store columns/rows added relative to the parent.
    #[default]
    Incremental,

    /// Always store the complete column/row set.
    Full,

    /// Full snapshot every `depth_interval` levels, incremental otherwise.
    Periodic {
        /// Distance in levels between two full snapshots.
        depth_interval: usize,
    },

    /// Full snapshot as soon as reloading the node would replay more than
    /// `max_replay` columns and rows on top of the nearest full snapshot.
    ReplayLimit {
        /// Maximum number of columns plus rows to replay.
        max_replay: usize,
    },
}

impl SnapshotPolicy for SnapshotStrategy {
    fn full_snapshot(&self, ctx: &SnapshotContext) -> bool {
        match *self {
            SnapshotStrategy::Incremental => false,
            SnapshotStrategy::Full => true,
            SnapshotStrategy::Periodic { depth_interval } => {
                depth_interval > 0 && ctx.depth % depth_interval == 0
            }
            SnapshotStrategy::ReplayLimit { max_replay } => ctx.replay_len() > max_replay,
        }
    }
}

/// Search tree settings.
#[derive(Debug, Clone)]
pub struct TreeSettings {
    /// Node selection strategy.
    pub node_selection: NodeSelection,

    /// Fork vs. Subroot decision at deactivation.
    pub snapshot: SnapshotStrategy,

    /// Tolerance under which `lower > upper` still counts as a feasible domain.
    pub feas_tol: f64,

    /// Number of node slots reserved up front.
    pub node_capacity: usize,

    /// Print progress information.
    pub verbose: bool,

    /// Log frequency (print every N activations).
    pub log_freq: u64,
}

impl Default for TreeSettings {
    fn default() -> Self {
        Self {
            node_selection: NodeSelection::default(),
            snapshot: SnapshotStrategy::default(),
            feas_tol: 1e-9,
            node_capacity: 1024,
            verbose: false,
            log_freq: 100,
        }
    }
}

impl TreeSettings {
    /// Create settings with verbose output enabled.
    pub fn verbose() -> Self {
        let mut s = Self::default();
        s.verbose = true;
        s.log_freq = 1;
        s
    }

    /// Set the node selection strategy.
    pub fn with_node_selection(mut self, selection: NodeSelection) -> Self {
        self.node_selection = selection;
        self
    }

    /// Set the snapshot strategy.
    pub fn with_snapshot(mut self, snapshot: SnapshotStrategy) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Set the number of preallocated node slots.
    pub fn with_node_capacity(mut self, capacity: usize) -> Self {
        self.node_capacity = capacity;
        self
    }
}

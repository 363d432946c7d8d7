//! Fork vs. Subroot decision point.

/// What a policy sees when the active node leaves the active role with
/// children and a solved relaxation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotContext {
    /// Depth of the node being converted.
    pub depth: usize,

    /// Columns currently in the relaxation.
    pub ncols: usize,

    /// Rows currently in the relaxation.
    pub nrows: usize,

    /// Columns added at this node.
    pub added_cols: usize,

    /// Rows added at this node.
    pub added_rows: usize,

    /// Columns held by the nearest Subroot on the path (0 without one).
    pub subroot_cols: usize,

    /// Rows held by the nearest Subroot on the path (0 without one).
    pub subroot_rows: usize,

    /// Children created at this node.
    pub nchildren: usize,
}

impl SnapshotContext {
    /// Columns plus rows a descendant would replay on top of the nearest
    /// full snapshot if this node stays incremental.
    pub fn replay_len(&self) -> usize {
        self.ncols.saturating_sub(self.subroot_cols) + self.nrows.saturating_sub(self.subroot_rows)
    }
}

/// Chooses between an incremental (Fork) and a complete (Subroot) snapshot.
pub trait SnapshotPolicy {
    /// Returns true to keep the complete column/row set at this node.
    fn full_snapshot(&self, ctx: &SnapshotContext) -> bool;
}

impl<F> SnapshotPolicy for F
where
    F: Fn(&SnapshotContext) -> bool,
{
    fn full_snapshot(&self, ctx: &SnapshotContext) -> bool {
        self(ctx)
    }
}

//! Branch-and-bound tree: node lifecycle and path switching.

use compare::Compare;
use log::{debug, info, trace};

use super::arena::NodeArena;
use super::node::{ConsId, ForkData, Node, NodeKind, NodeType, SubrootData};
use super::{Frontier, NodeId, NodeKey, SnapshotContext, SnapshotPolicy};
use crate::domain::{BoundChange, BoundChangeLog, BoundKind, BoundOutcome, Domains};
use crate::error::{contract_violation, unknown_node, TreeResult};
use crate::lp::{LpSize, LpSolver, LpStateHandle, LpStatus, Relaxation};
use crate::settings::{NodeSelection, TreeSettings};

/// Result of moving the active designation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// The target already was the active node; nothing happened.
    Unchanged,

    /// The target is now active and its domains are consistent.
    Activated(NodeId),

    /// The target is active but applying its path collapsed a domain.
    Cutoff {
        /// The new active node.
        node: NodeId,
        /// First variable found with an empty domain.
        var: usize,
    },

    /// No node is active anymore.
    Finished,
}

/// Statistics from the search tree.
#[derive(Debug, Clone, Default)]
pub struct TreeStats {
    /// Nodes created.
    pub nodes_created: u64,

    /// Nodes freed.
    pub nodes_freed: u64,

    /// Successful activations.
    pub activations: u64,

    /// Maximum depth reached.
    pub max_depth: usize,

    /// Relaxations loaded.
    pub lp_loads: u64,

    /// Loads that had to rebuild the relaxation from a Subroot or from scratch.
    pub full_reloads: u64,

    /// Columns re-added while loading.
    pub replayed_cols: u64,

    /// Rows re-added while loading.
    pub replayed_rows: u64,

    /// Basis snapshots taken.
    pub snapshots_captured: u64,

    /// Basis snapshots returned to the solver.
    pub snapshots_freed: u64,

    /// Children of Junctions that found no LP state left to share.
    pub cold_children: u64,
}

/// Which staging array a node sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Staging {
    Children,
    Siblings,
}

/// Staging array and position of a Child or Sibling.
fn staged_at<S: LpSolver>(kind: &NodeKind<S>) -> Option<(Staging, usize)> {
    match *kind {
        NodeKind::Child { pos } => Some((Staging::Children, pos)),
        NodeKind::Sibling { pos } => Some((Staging::Siblings, pos)),
        _ => None,
    }
}

/// The search tree.
///
/// Owns every node, the frontier, the root-to-active path, and the
/// relaxation solver whose column/row set follows the active node.
pub struct Tree<S: LpSolver, N: Compare<NodeKey> + Clone = NodeSelection> {
    /// Node storage.
    pub(super) nodes: NodeArena<Node<S>>,

    pub(super) root: Option<NodeId>,

    /// Leaves ordered by the node selection policy.
    pub(super) frontier: Frontier<N>,

    /// Root-to-active chain; position `i` holds the node of depth `i`.
    pub(super) path: Vec<NodeId>,

    /// Relaxation size defined by each path node.
    pub(super) path_lp_sizes: Vec<LpSize>,

    /// Children of the active node.
    pub(super) children: Vec<NodeId>,

    /// Unexplored children of the active node's parent.
    pub(super) siblings: Vec<NodeId>,

    pub(super) active: Option<NodeId>,

    /// Nearest Fork/Subroot on the path.
    pub(super) lp_fork: Option<NodeId>,

    /// Nearest Subroot on the path.
    pub(super) subroot: Option<NodeId>,

    /// Deepest path position whose relaxation matches the solver.
    pub(super) correct_depth: Option<usize>,

    /// Relaxation of the active node has been loaded.
    pub(super) focus_lp_loaded: bool,

    /// Relaxation of the active node has been solved.
    pub(super) focus_lp_solved: bool,

    /// Variable whose domain collapsed on the current path.
    pub(super) focus_infeasible: Option<usize>,

    pub(super) domains: Domains,

    pub(super) lp: Relaxation<S>,

    /// Fork vs. Subroot decision.
    policy: Box<dyn SnapshotPolicy>,

    settings: TreeSettings,

    next_number: u64,

    pub(super) stats: TreeStats,
}

impl<S: LpSolver> Tree<S, NodeSelection> {
    /// Create an empty tree ordered by `settings.node_selection`.
    pub fn new(solver: S, domains: Domains, settings: TreeSettings) -> TreeResult<Self> {
        let selector = settings.node_selection;
        Self::with_selector(solver, domains, settings, selector)
    }
}

impl<S: LpSolver, N: Compare<NodeKey> + Clone> Tree<S, N> {
    /// Create an empty tree ordered by a custom comparator.
    pub fn with_selector(
        solver: S,
        domains: Domains,
        settings: TreeSettings,
        selector: N,
    ) -> TreeResult<Self> {
        Ok(Self {
            nodes: NodeArena::with_capacity(settings.node_capacity)?,
            root: None,
            frontier: Frontier::new(selector),
            path: Vec::new(),
            path_lp_sizes: Vec::new(),
            children: Vec::new(),
            siblings: Vec::new(),
            active: None,
            lp_fork: None,
            subroot: None,
            correct_depth: None,
            focus_lp_loaded: false,
            focus_lp_solved: false,
            focus_infeasible: None,
            domains,
            lp: Relaxation::new(solver),
            policy: Box::new(settings.snapshot),
            settings,
            next_number: 0,
            stats: TreeStats::default(),
        })
    }

    /// Replace the Fork vs. Subroot policy.
    pub fn set_snapshot_policy(&mut self, policy: Box<dyn SnapshotPolicy>) {
        self.policy = policy;
    }

    // === Queries ===

    /// Look a node up.
    pub fn node(&self, id: NodeId) -> TreeResult<&Node<S>> {
        self.nodes.get(id).ok_or_else(|| unknown_node(id))
    }

    fn node_mut(&mut self, id: NodeId) -> TreeResult<&mut Node<S>> {
        self.nodes.get_mut(id).ok_or_else(|| unknown_node(id))
    }

    /// Returns true if `id` still refers to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(id)
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn active(&self) -> Option<NodeId> {
        self.active
    }

    /// Root-to-active chain.
    pub fn path(&self) -> &[NodeId] {
        &self.path
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn siblings(&self) -> &[NodeId] {
        &self.siblings
    }

    /// Number of leaves waiting in the frontier.
    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    /// Leaves waiting in the frontier, in no particular order.
    pub fn leaves(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.frontier.ids()
    }

    /// Number of live nodes.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Nearest Fork/Subroot ancestor of the active node.
    pub fn lp_fork(&self) -> Option<NodeId> {
        self.lp_fork
    }

    /// Nearest Subroot ancestor of the active node.
    pub fn subroot(&self) -> Option<NodeId> {
        self.subroot
    }

    /// Depth up to which the solver's column/row set is known to be right.
    pub fn correct_depth(&self) -> Option<usize> {
        self.correct_depth
    }

    /// Relaxation size recorded for path position `depth`.
    pub fn path_lp_size(&self, depth: usize) -> Option<LpSize> {
        self.path_lp_sizes.get(depth).copied()
    }

    pub fn domains(&self) -> &Domains {
        &self.domains
    }

    pub fn relaxation(&self) -> &Relaxation<S> {
        &self.lp
    }

    /// The solver, for reading solutions and tuning.
    pub fn solver_mut(&mut self) -> &mut S {
        self.lp.solver_mut()
    }

    pub fn settings(&self) -> &TreeSettings {
        &self.settings
    }

    pub fn stats(&self) -> &TreeStats {
        &self.stats
    }

    /// Returns true once the active node's relaxation has been loaded.
    pub fn is_lp_loaded(&self) -> bool {
        self.focus_lp_loaded
    }

    /// Variable whose domain collapsed on the active path, if any.
    pub fn active_infeasibility(&self) -> Option<usize> {
        self.focus_infeasible
    }

    /// Local constraints of every node on the active path, root first.
    pub fn active_constraints(&self) -> impl Iterator<Item = ConsId> + '_ {
        self.path
            .iter()
            .filter_map(move |&id| self.nodes.get(id))
            .flat_map(|n| n.constraints.iter().copied())
    }

    // === Node creation and decoration ===

    /// Create a child of the active node, or the root if the tree is empty.
    ///
    /// The child's lower bound is never below its parent's.
    pub fn create_child(&mut self, lower_bound: f64, estimate: f64) -> TreeResult<NodeId> {
        let (parent, depth, lower_bound) = match self.active {
            Some(a) => {
                let p = self.node(a)?;
                (Some(a), p.depth + 1, lower_bound.max(p.lower_bound))
            }
            None if self.root.is_none() => (None, 0, lower_bound),
            None => {
                return Err(contract_violation(
                    "children can only be created below the active node",
                ))
            }
        };

        self.children.try_reserve(1)?;
        let number = self.next_number;
        let node = Node {
            number,
            parent,
            depth,
            lower_bound,
            estimate,
            constraints: Vec::new(),
            bound_changes: BoundChangeLog::new(),
            lp_ref: None,
            on_path: false,
            kind: NodeKind::Child {
                pos: self.children.len(),
            },
        };
        let id = self.nodes.insert(node)?;
        self.next_number += 1;
        self.children.push(id);
        if parent.is_none() {
            self.root = Some(id);
        }
        self.stats.nodes_created += 1;
        trace!("created node {id} at depth {depth} (bound {lower_bound:.6e})");
        Ok(id)
    }

    /// Record a bound change on the active node or on one of its children.
    ///
    /// On the active node the change takes effect immediately; on a child it
    /// takes effect when the child is activated. The returned outcome tells
    /// whether the domain of `var` is empty afterwards.
    pub fn add_bound_change(
        &mut self,
        node: NodeId,
        var: usize,
        kind: BoundKind,
        bound: f64,
    ) -> TreeResult<BoundOutcome> {
        if var >= self.domains.num_vars() {
            return Err(contract_violation(format!(
                "variable {var} out of range ({} variables)",
                self.domains.num_vars()
            )));
        }
        let tol = self.settings.feas_tol;
        let n = self.nodes.get_mut(node).ok_or_else(|| unknown_node(node))?;
        match n.kind {
            NodeKind::Active => {
                let old_bound = self.domains.bound(var, kind);
                n.bound_changes.push(BoundChange {
                    var,
                    kind,
                    old_bound,
                    new_bound: bound,
                })?;
                self.domains.set_bound(var, kind, bound);
                if self.domains.is_empty(var, tol) {
                    self.focus_infeasible.get_or_insert(var);
                    return Ok(BoundOutcome::Infeasible { var });
                }
                Ok(BoundOutcome::Feasible)
            }
            NodeKind::Child { .. } => {
                let current = |k: BoundKind| {
                    n.bound_changes
                        .last_bound(var, k)
                        .unwrap_or_else(|| self.domains.bound(var, k))
                };
                let old_bound = current(kind);
                let (lower, upper) = match kind {
                    BoundKind::Lower => (bound, current(BoundKind::Upper)),
                    BoundKind::Upper => (current(BoundKind::Lower), bound),
                };
                n.bound_changes.push(BoundChange {
                    var,
                    kind,
                    old_bound,
                    new_bound: bound,
                })?;
                if lower > upper + tol {
                    return Ok(BoundOutcome::Infeasible { var });
                }
                Ok(BoundOutcome::Feasible)
            }
            _ => Err(contract_violation(format!(
                "bound change on {:?} node {node}",
                n.kind.node_type()
            ))),
        }
    }

    /// Attach a subtree-local constraint to the active node or one of its children.
    pub fn add_local_constraint(&mut self, node: NodeId, cons: ConsId) -> TreeResult<()> {
        let n = self.node_mut(node)?;
        match n.kind {
            NodeKind::Active | NodeKind::Child { .. } => {
                n.constraints.try_reserve(1)?;
                n.constraints.push(cons);
                Ok(())
            }
            _ => Err(contract_violation(format!(
                "local constraint on {:?} node {node}",
                n.kind.node_type()
            ))),
        }
    }

    /// Raise the lower bound of a node (lower values are ignored).
    ///
    /// On the active node the new bound also lifts its staged children.
    pub fn update_lower_bound(&mut self, node: NodeId, bound: f64) -> TreeResult<()> {
        let n = self.node_mut(node)?;
        if bound <= n.lower_bound {
            return Ok(());
        }
        n.lower_bound = bound;
        let leaf_key = matches!(n.kind, NodeKind::Leaf).then(|| n.key());
        let active = matches!(n.kind, NodeKind::Active);
        if let Some(key) = leaf_key {
            // Requeue so the heap sees the new key
            if self.frontier.remove(node) {
                self.frontier.insert(node, key);
            }
        }
        if active {
            for &child in &self.children {
                let c = self.nodes.get_mut(child).ok_or_else(|| unknown_node(child))?;
                c.lower_bound = c.lower_bound.max(bound);
            }
        }
        Ok(())
    }

    // === Relaxation edits at the active node ===

    /// Add a column to the active node's relaxation.
    ///
    /// Column `j` of the relaxation carries the bounds of variable `j`.
    pub fn add_column(&mut self, col: S::Column) -> TreeResult<()> {
        self.require_loaded("add a column")?;
        self.lp.add_column(col)?;
        let var = self.lp.size().cols - 1;
        if var < self.domains.num_vars() {
            self.domains.mark_dirty(var);
        }
        Ok(())
    }

    /// Add a row to the active node's relaxation.
    pub fn add_row(&mut self, row: S::Row) -> TreeResult<()> {
        self.require_loaded("add a row")?;
        self.lp.add_row(row)
    }

    /// Solve the active node's relaxation.
    ///
    /// Pending bound changes are pushed to the solver first.
    pub fn solve_relaxation(&mut self) -> TreeResult<LpStatus> {
        self.require_loaded("solve the relaxation")?;
        let ncols = self.lp.size().cols;
        for var in self.domains.take_dirty() {
            // Variables without a column yet get their bounds when it is added
            if var >= ncols {
                continue;
            }
            let (lb, ub) = (self.domains.lower(var), self.domains.upper(var));
            self.lp.solver_mut().set_var_bounds(var, lb, ub)?;
        }
        let status = self.lp.solver_mut().solve()?;
        self.focus_lp_solved = status.is_solved();
        trace!("relaxation of {:?} solved: {status:?}", self.active);
        Ok(status)
    }

    fn require_loaded(&self, what: &str) -> TreeResult<()> {
        if self.active.is_none() || !self.focus_lp_loaded {
            return Err(contract_violation(format!(
                "cannot {what} before the active node's relaxation is loaded"
            )));
        }
        Ok(())
    }

    // === Selection ===

    fn better(&self, a: Option<NodeId>, b: Option<NodeId>) -> TreeResult<Option<NodeId>> {
        match (a, b) {
            (Some(x), Some(y)) => {
                let (kx, ky) = (self.node(x)?.key(), self.node(y)?.key());
                let pick = if self.frontier.selector().compare(&ky, &kx).is_gt() {
                    y
                } else {
                    x
                };
                Ok(Some(pick))
            }
            (x, None) => Ok(x),
            (None, y) => Ok(y),
        }
    }

    fn best_of(&self, ids: &[NodeId]) -> TreeResult<Option<NodeId>> {
        ids.iter()
            .try_fold(None, |best, &id| self.better(best, Some(id)))
    }

    /// Best node among the children of the active node.
    pub fn best_child(&self) -> TreeResult<Option<NodeId>> {
        self.best_of(&self.children)
    }

    /// Best node among the siblings of the active node.
    pub fn best_sibling(&self) -> TreeResult<Option<NodeId>> {
        self.best_of(&self.siblings)
    }

    /// Best leaf of the frontier.
    pub fn best_leaf(&self) -> Option<NodeId> {
        self.frontier.peek().map(|(id, _)| id)
    }

    /// Best waiting node overall: frontier top, children and siblings.
    pub fn best_node(&self) -> TreeResult<Option<NodeId>> {
        let staged = self.better(self.best_child()?, self.best_sibling()?)?;
        self.better(self.best_leaf(), staged)
    }

    /// Remove the frontier top. The node stays a Leaf until activated.
    pub fn pop_best(&mut self) -> Option<NodeId> {
        self.frontier.pop_best()
    }

    /// Lowest lower bound over every node not yet fully processed.
    pub fn lower_bound(&self) -> f64 {
        let staged = self
            .children
            .iter()
            .chain(&self.siblings)
            .chain(&self.active)
            .filter_map(|&id| self.nodes.get(id))
            .map(|n| n.lower_bound)
            .fold(f64::INFINITY, f64::min);
        staged.min(self.frontier.lower_bound())
    }

    // === Pruning and freeing ===

    /// Free every waiting node whose lower bound is at least `cutoff`.
    ///
    /// Returns the number of pruned nodes.
    pub fn prune(&mut self, cutoff: f64) -> TreeResult<usize> {
        let mut doomed = self.frontier.drain_where(|k| k.lower_bound >= cutoff);
        for &id in self.children.iter().chain(&self.siblings) {
            if self.node(id)?.can_prune(cutoff) {
                doomed.try_reserve(1)?;
                doomed.push(id);
            }
        }
        for &id in &doomed {
            if let Some((which, pos)) = staged_at(&self.node(id)?.kind) {
                self.unstage(id, which, pos)?;
            }
            self.free_upwards(id)?;
        }
        if !doomed.is_empty() {
            debug!("pruned {} nodes with bound >= {cutoff:.6e}", doomed.len());
        }
        Ok(doomed.len())
    }

    /// Free an inactive node that has no live descendants.
    ///
    /// Waiting nodes are taken out of their staging array or the frontier.
    /// Freeing cascades to ancestors left without children.
    pub fn free_node(&mut self, id: NodeId) -> TreeResult<()> {
        let node = self.node(id)?;
        if node.on_path {
            return Err(contract_violation(format!("node {id} is on the active path")));
        }
        match &node.kind {
            NodeKind::Child { .. } | NodeKind::Sibling { .. } | NodeKind::Leaf | NodeKind::Deadend => {}
            NodeKind::Junction { .. } | NodeKind::Fork(_) | NodeKind::Subroot(_) => {
                if !node.kind.is_exhausted() {
                    return Err(contract_violation(format!(
                        "node {id} still has {:?} children",
                        node.kind.open_children()
                    )));
                }
            }
            NodeKind::Active => {
                return Err(contract_violation(format!("node {id} is active")));
            }
        }
        let is_leaf = matches!(node.kind, NodeKind::Leaf);
        if let Some((which, pos)) = staged_at(&node.kind) {
            self.unstage(id, which, pos)?;
        } else if is_leaf {
            self.frontier.remove(id);
        }
        self.free_upwards(id)
    }

    /// Drop a node, then every ancestor it leaves childless and off-path.
    fn free_upwards(&mut self, id: NodeId) -> TreeResult<()> {
        let mut next = Some(id);
        while let Some(id) = next.take() {
            let node = self.nodes.remove(id).ok_or_else(|| unknown_node(id))?;
            self.stats.nodes_freed += 1;
            if self.root == Some(id) {
                self.root = None;
            }
            self.release_share(node.lp_ref)?;

            let open_handle = match node.kind {
                NodeKind::Fork(f) => Some(f.lp_state),
                NodeKind::Subroot(s) => Some(s.lp_state),
                _ => None,
            };
            if let Some(mut handle) = open_handle {
                if let Some(blob) = handle.take_blob() {
                    self.lp.solver_mut().free_basis_state(blob);
                    return Err(contract_violation(format!(
                        "node {id} freed while its LP state was still shared"
                    )));
                }
            }
            trace!("freed node {id}");

            let Some(parent) = node.parent else { continue };
            let p = self.node_mut(parent)?;
            let on_path = p.on_path;
            let parent_active = matches!(p.kind, NodeKind::Active);
            match p.kind.open_children_mut() {
                Some(open) if *open > 0 => {
                    *open -= 1;
                    if *open == 0 && !on_path {
                        next = Some(parent);
                    }
                }
                // Children of the active node are only counted at its deactivation
                None if parent_active => {}
                _ => {
                    return Err(contract_violation(format!(
                        "parent {parent} of {id} has no child left to release"
                    )))
                }
            }
        }
        Ok(())
    }

    /// Give back one share of the LP state held by `fork`.
    pub(super) fn release_share(&mut self, fork: Option<NodeId>) -> TreeResult<()> {
        let Some(fork) = fork else { return Ok(()) };
        let node = self.nodes.get_mut(fork).ok_or_else(|| unknown_node(fork))?;
        let handle = node.kind.lp_state_mut().ok_or_else(|| {
            contract_violation(format!("node {fork} holds no LP state"))
        })?;
        if handle.release(self.lp.solver_mut())? {
            self.stats.snapshots_freed += 1;
            debug!("LP state of {fork} freed");
        }
        Ok(())
    }

    /// Consume the share of LP state a node holds, if any.
    pub(super) fn release_lp_ref(&mut self, id: NodeId) -> TreeResult<()> {
        let fork = self.node_mut(id)?.lp_ref.take();
        self.release_share(fork)
    }

    // === Staging arrays ===

    fn staging_mut(&mut self, which: Staging) -> &mut Vec<NodeId> {
        match which {
            Staging::Children => &mut self.children,
            Staging::Siblings => &mut self.siblings,
        }
    }

    /// Take a node out of a staging array in O(1).
    fn unstage(&mut self, id: NodeId, which: Staging, pos: usize) -> TreeResult<()> {
        let array = self.staging_mut(which);
        if array.get(pos) != Some(&id) {
            return Err(contract_violation(format!(
                "node {id} is not at position {pos} of the {which:?} array"
            )));
        }
        array.swap_remove(pos);
        let moved = array.get(pos).copied();
        if let Some(moved) = moved {
            match &mut self.node_mut(moved)?.kind {
                NodeKind::Child { pos: p } | NodeKind::Sibling { pos: p } => *p = pos,
                _ => return Err(contract_violation(format!("staged node {moved} lost its role"))),
            }
        }
        Ok(())
    }

    /// Turn every node of a staging array into a frontier leaf.
    fn flush_to_frontier(&mut self, which: Staging) -> TreeResult<()> {
        let mut ids = std::mem::take(self.staging_mut(which));
        for &id in &ids {
            let node = self.nodes.get_mut(id).ok_or_else(|| unknown_node(id))?;
            node.kind = NodeKind::Leaf;
            node.bound_changes.seal();
            self.frontier.insert(id, node.key());
        }
        ids.clear();
        *self.staging_mut(which) = ids;
        Ok(())
    }

    // === Deactivation ===

    /// Convert the active node into its terminal role.
    ///
    /// No children: Deadend. Children but no new relaxation content at
    /// this node (or no solved relaxation): Junction. Otherwise Fork or
    /// Subroot as the snapshot policy decides; the basis is captured once
    /// for all current children.
    fn deactivate_active(&mut self) -> TreeResult<()> {
        let Some(active) = self.active else {
            return Ok(());
        };
        // A node that never loaded its relaxation still consumes its share
        self.release_lp_ref(active)?;

        let depth = self.node(active)?.depth;
        let nchildren = self.children.len();
        let parent_size = match depth {
            0 => LpSize::default(),
            d => self.path_lp_sizes[d - 1],
        };
        let size = self.lp.size();
        let added_cols = size.cols.saturating_sub(parent_size.cols);
        let added_rows = size.rows.saturating_sub(parent_size.rows);

        let kind = if nchildren == 0 {
            NodeKind::Deadend
        } else if !self.focus_lp_solved || (added_cols == 0 && added_rows == 0) {
            self.forward_lp_fork(nchildren)?;
            NodeKind::Junction {
                open_children: nchildren,
            }
        } else {
            let subroot_size = match self.subroot {
                Some(sr) => self.path_lp_sizes[self.node(sr)?.depth],
                None => LpSize::default(),
            };
            let ctx = SnapshotContext {
                depth,
                ncols: size.cols,
                nrows: size.rows,
                added_cols,
                added_rows,
                subroot_cols: subroot_size.cols,
                subroot_rows: subroot_size.rows,
                nchildren,
            };
            let full = self.policy.full_snapshot(&ctx);
            let (cols, rows) = if full {
                self.lp.suffix(LpSize::default())?
            } else {
                self.lp.suffix(parent_size)?
            };
            let mut lp_state = LpStateHandle::new(self.lp.solver_mut().get_basis_state()?);
            lp_state.capture(nchildren)?;
            for &child in &self.children {
                self.nodes
                    .get_mut(child)
                    .ok_or_else(|| unknown_node(child))?
                    .lp_ref = Some(active);
            }

            self.stats.snapshots_captured += 1;
            self.path_lp_sizes[depth] = size;
            self.correct_depth = Some(depth);
            self.lp_fork = Some(active);
            if full {
                self.subroot = Some(active);
                NodeKind::Subroot(Box::new(SubrootData {
                    open_children: nchildren,
                    cols,
                    rows,
                    lp_state,
                }))
            } else {
                NodeKind::Fork(Box::new(ForkData {
                    open_children: nchildren,
                    added_cols: cols,
                    added_rows: rows,
                    lp_state,
                }))
            }
        };

        let node = self.node_mut(active)?;
        debug!(
            "node {active} at depth {depth} -> {:?} ({nchildren} children)",
            kind.node_type()
        );
        node.kind = kind;
        node.bound_changes.seal();
        self.active = None;
        self.focus_lp_loaded = false;
        self.focus_lp_solved = false;
        self.focus_infeasible = None;
        Ok(())
    }

    /// Children of a Junction warm-start from the Junction's own lp-fork.
    fn forward_lp_fork(&mut self, nchildren: usize) -> TreeResult<()> {
        let Some(fork) = self.lp_fork else {
            return Ok(());
        };
        let node = self.nodes.get_mut(fork).ok_or_else(|| unknown_node(fork))?;
        let Some(handle) = node.kind.lp_state_mut() else {
            return Err(contract_violation(format!("lp-fork {fork} holds no LP state")));
        };
        if !handle.is_valid() {
            debug!("LP state of {fork} already freed: {nchildren} children start cold");
            self.stats.cold_children += nchildren as u64;
            return Ok(());
        }
        handle.capture(nchildren)?;
        for &child in &self.children {
            self.nodes
                .get_mut(child)
                .ok_or_else(|| unknown_node(child))?
                .lp_ref = Some(fork);
        }
        Ok(())
    }

    // === Path switching ===

    /// Make `target` the active node, or deactivate everything with `None`.
    ///
    /// `target` must be a Child, Sibling or Leaf. Bound changes along the
    /// abandoned part of the path are undone, those along the new part are
    /// applied, and the lp-fork/subroot/correct-depth markers are updated
    /// for [`load_relaxation`](Self::load_relaxation).
    pub fn activate(&mut self, target: Option<NodeId>) -> TreeResult<Activation> {
        if target.is_some() && target == self.active {
            return Ok(Activation::Unchanged);
        }
        let target_type = match target {
            Some(t) => Some(self.node(t)?.node_type()),
            None => None,
        };
        if let Some(tt) = target_type {
            if !matches!(tt, NodeType::Child | NodeType::Sibling | NodeType::Leaf) {
                return Err(contract_violation(format!("cannot activate a {tt:?} node")));
            }
        }

        // 1. retire the current active node
        self.deactivate_active()?;

        // 2. reshuffle the staging arrays around the target
        match (target, target_type) {
            (Some(t), Some(NodeType::Child)) => {
                self.flush_to_frontier(Staging::Siblings)?;
                let pos = self.staged_pos(t)?;
                self.unstage(t, Staging::Children, pos)?;
                std::mem::swap(&mut self.children, &mut self.siblings);
                for (pos, &id) in self.siblings.iter().enumerate() {
                    self.nodes
                        .get_mut(id)
                        .ok_or_else(|| unknown_node(id))?
                        .kind = NodeKind::Sibling { pos };
                }
            }
            (Some(t), Some(NodeType::Sibling)) => {
                self.flush_to_frontier(Staging::Children)?;
                let pos = self.staged_pos(t)?;
                self.unstage(t, Staging::Siblings, pos)?;
            }
            (Some(t), _) => {
                self.flush_to_frontier(Staging::Siblings)?;
                self.flush_to_frontier(Staging::Children)?;
                if !self.frontier.remove(t) {
                    // Popped by the caller beforehand
                    trace!("leaf {t} activated outside the frontier");
                }
            }
            (None, _) => {
                self.flush_to_frontier(Staging::Siblings)?;
                self.flush_to_frontier(Staging::Children)?;
            }
        }

        // 3. find the common ancestor and the new lp-fork/subroot
        let mut lp_fork = None;
        let mut subroot = None;
        let mut common = None;
        if let Some(t) = target {
            let mut cur = self.node(t)?.parent;
            while let Some(id) = cur {
                let n = self.node(id)?;
                if n.on_path {
                    common = Some(id);
                    break;
                }
                match n.node_type() {
                    NodeType::Fork => {
                        lp_fork.get_or_insert(id);
                    }
                    NodeType::Subroot => {
                        lp_fork.get_or_insert(id);
                        subroot.get_or_insert(id);
                    }
                    _ => {}
                }
                cur = n.parent;
            }
        }
        let common_depth = match common {
            Some(c) => Some(self.node(c)?.depth),
            None => None,
        };
        if let Some(cd) = common_depth {
            for &id in self.path[..=cd].iter().rev() {
                if lp_fork.is_some() && subroot.is_some() {
                    break;
                }
                match self.node(id)?.node_type() {
                    NodeType::Fork => {
                        lp_fork.get_or_insert(id);
                    }
                    NodeType::Subroot => {
                        lp_fork.get_or_insert(id);
                        subroot.get_or_insert(id);
                    }
                    _ => {}
                }
            }
        }
        let keep = common_depth.map_or(0, |d| d + 1);

        // 4. undo the abandoned part of the path, deepest first
        for &id in self.path[keep..].iter().rev() {
            let node = self.nodes.get(id).ok_or_else(|| unknown_node(id))?;
            trace!("undo {} bound changes of {id}", node.bound_changes.len());
            node.bound_changes.undo(&mut self.domains);
        }

        // 5. shrink the path, freeing exhausted nodes
        self.path_lp_sizes.truncate(keep);
        while self.path.len() > keep {
            let Some(id) = self.path.pop() else { break };
            let node = self.node_mut(id)?;
            node.on_path = false;
            if node.kind.is_exhausted() {
                self.free_upwards(id)?;
            }
        }

        // 6. extend the path down to the target
        if let Some(t) = target {
            let mut fresh = Vec::new();
            let mut cur = Some(t);
            while let Some(id) = cur {
                if Some(id) == common {
                    break;
                }
                fresh.try_reserve(1)?;
                fresh.push(id);
                cur = self.node(id)?.parent;
            }
            self.path.try_reserve(fresh.len())?;
            self.path_lp_sizes.try_reserve(fresh.len())?;
            for &id in fresh.iter().rev() {
                let prev = self.path_lp_sizes.last().copied().unwrap_or_default();
                let node = self.nodes.get_mut(id).ok_or_else(|| unknown_node(id))?;
                node.on_path = true;
                let size = match &node.kind {
                    NodeKind::Fork(f) => prev.grow(f.added_cols.len(), f.added_rows.len()),
                    NodeKind::Subroot(s) => LpSize::new(s.cols.len(), s.rows.len()),
                    _ => prev,
                };
                self.path.push(id);
                self.path_lp_sizes.push(size);
            }
            let node = self.nodes.get_mut(t).ok_or_else(|| unknown_node(t))?;
            node.kind = NodeKind::Active;
            node.bound_changes.reopen();
            debug_assert_eq!(self.path.len(), node.depth + 1);
        }

        // 7. apply the new part of the path, shallowest first
        let tol = self.settings.feas_tol;
        let mut outcome = BoundOutcome::Feasible;
        for &id in &self.path[keep..] {
            let node = self.nodes.get_mut(id).ok_or_else(|| unknown_node(id))?;
            trace!("apply {} bound changes of {id}", node.bound_changes.len());
            outcome = outcome.and(node.bound_changes.apply(&mut self.domains, tol));
        }

        // 8. markers
        self.correct_depth = if subroot == self.subroot {
            match (self.correct_depth, common_depth) {
                (Some(c), Some(d)) => Some(c.min(d)),
                _ => None,
            }
        } else {
            None
        };
        self.lp_fork = lp_fork;
        self.subroot = subroot;
        self.active = target;
        self.focus_lp_loaded = false;
        self.focus_lp_solved = false;
        self.focus_infeasible = match outcome {
            BoundOutcome::Infeasible { var } => Some(var),
            BoundOutcome::Feasible => None,
        };

        let Some(t) = target else {
            debug!("search tree deactivated");
            return Ok(Activation::Finished);
        };
        self.stats.activations += 1;
        self.stats.max_depth = self.stats.max_depth.max(self.path.len() - 1);
        debug!(
            "activated {t} at depth {} (common ancestor depth {common_depth:?}, lp-fork {lp_fork:?})",
            self.path.len() - 1
        );
        self.log_progress();
        Ok(match outcome {
            BoundOutcome::Feasible => Activation::Activated(t),
            BoundOutcome::Infeasible { var } => Activation::Cutoff { node: t, var },
        })
    }

    fn staged_pos(&self, id: NodeId) -> TreeResult<usize> {
        staged_at(&self.node(id)?.kind)
            .map(|(_, pos)| pos)
            .ok_or_else(|| contract_violation(format!("node {id} is not staged")))
    }

    // === Teardown ===

    /// Free every node and reset the relaxation.
    ///
    /// Domains return to their state before the root was activated.
    pub fn clear(&mut self) -> TreeResult<()> {
        for &id in self.path.iter().rev() {
            let node = self.nodes.get(id).ok_or_else(|| unknown_node(id))?;
            node.bound_changes.undo(&mut self.domains);
        }
        for (_, node) in self.nodes.iter_mut() {
            if let Some(blob) = node.kind.lp_state_mut().and_then(|h| h.take_blob()) {
                self.lp.solver_mut().free_basis_state(blob);
                self.stats.snapshots_freed += 1;
            }
        }
        self.stats.nodes_freed += self.nodes.len() as u64;
        self.nodes.clear();
        self.frontier.clear();
        self.path.clear();
        self.path_lp_sizes.clear();
        self.children.clear();
        self.siblings.clear();
        self.root = None;
        self.active = None;
        self.lp_fork = None;
        self.subroot = None;
        self.correct_depth = None;
        self.focus_lp_loaded = false;
        self.focus_lp_solved = false;
        self.focus_infeasible = None;
        self.lp.clear()
    }

    /// Log progress (if verbose).
    fn log_progress(&self) {
        if !self.settings.verbose || self.settings.log_freq == 0 {
            return;
        }
        if self.stats.activations % self.settings.log_freq != 0 {
            return;
        }
        info!(
            "Nodes: {} ({} open) | Depth: {} | Bound: {:.6e} | Loads: {} ({} full) | Snapshots: {} live",
            self.stats.activations,
            self.frontier.len() + self.children.len() + self.siblings.len(),
            self.path.len().saturating_sub(1),
            self.lower_bound(),
            self.stats.lp_loads,
            self.stats.full_reloads,
            self.stats.snapshots_captured - self.stats.snapshots_freed,
        );
    }
}

//! Variable domains and the per-node bound-change log.

use crate::error::{contract_violation, TreeResult};

/// Which side of a variable domain a change touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    /// Lower bound.
    Lower,

    /// Upper bound.
    Upper,
}

/// A single bound modification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundChange {
    /// Variable index.
    pub var: usize,

    /// Side of the domain being changed.
    pub kind: BoundKind,

    /// Bound in force before the change.
    pub old_bound: f64,

    /// Bound in force after the change.
    pub new_bound: f64,
}

impl BoundChange {
    /// Create a "down" branch: x <= floor(value).
    pub fn down_branch(var: usize, old_ub: f64, value: f64) -> Self {
        Self {
            var,
            kind: BoundKind::Upper,
            old_bound: old_ub,
            new_bound: value.floor(),
        }
    }

    /// Create an "up" branch: x >= ceil(value).
    pub fn up_branch(var: usize, old_lb: f64, value: f64) -> Self {
        Self {
            var,
            kind: BoundKind::Lower,
            old_bound: old_lb,
            new_bound: value.ceil(),
        }
    }
}

/// Outcome of applying bound changes.
///
/// A collapsed domain is reported here rather than as an error: the node
/// is simply infeasible and the search loop prunes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundOutcome {
    /// All touched domains are still non-empty.
    Feasible,

    /// The domain of `var` became empty.
    Infeasible {
        /// First variable found with `lower > upper`.
        var: usize,
    },
}

impl BoundOutcome {
    /// Returns true if a domain collapsed.
    pub fn is_infeasible(&self) -> bool {
        matches!(self, BoundOutcome::Infeasible { .. })
    }

    /// Keeps the first infeasibility seen.
    pub fn and(self, other: BoundOutcome) -> BoundOutcome {
        match self {
            BoundOutcome::Feasible => other,
            infeasible => infeasible,
        }
    }
}

/// Current lower/upper bounds of every variable.
///
/// Tracks which variables changed since the last call to [`Domains::take_dirty`]
/// so the relaxation solver only receives the bounds it does not know yet.
#[derive(Debug, Clone)]
pub struct Domains {
    lower: Vec<f64>,
    upper: Vec<f64>,
    dirty: Vec<usize>,
    is_dirty: Vec<bool>,
}

impl Domains {
    /// Create `n` free variables.
    pub fn new(n: usize) -> Self {
        Self {
            lower: vec![f64::NEG_INFINITY; n],
            upper: vec![f64::INFINITY; n],
            dirty: Vec::new(),
            is_dirty: vec![false; n],
        }
    }

    /// Create domains from explicit bound vectors.
    pub fn from_bounds(lower: Vec<f64>, upper: Vec<f64>) -> TreeResult<Self> {
        if lower.len() != upper.len() {
            return Err(contract_violation(format!(
                "{} lower bounds but {} upper bounds",
                lower.len(),
                upper.len()
            )));
        }
        let n = lower.len();
        Ok(Self {
            lower,
            upper,
            dirty: Vec::new(),
            is_dirty: vec![false; n],
        })
    }

    /// Number of variables.
    pub fn num_vars(&self) -> usize {
        self.lower.len()
    }

    /// Lower bound of `var`.
    pub fn lower(&self, var: usize) -> f64 {
        self.lower[var]
    }

    /// Upper bound of `var`.
    pub fn upper(&self, var: usize) -> f64 {
        self.upper[var]
    }

    /// Bound of `var` on the given side.
    pub fn bound(&self, var: usize, kind: BoundKind) -> f64 {
        match kind {
            BoundKind::Lower => self.lower[var],
            BoundKind::Upper => self.upper[var],
        }
    }

    /// Overwrite one bound.
    pub fn set_bound(&mut self, var: usize, kind: BoundKind, value: f64) {
        match kind {
            BoundKind::Lower => self.lower[var] = value,
            BoundKind::Upper => self.upper[var] = value,
        }
        self.mark_dirty(var);
    }

    /// Check if the domain of `var` is empty.
    pub fn is_empty(&self, var: usize, tol: f64) -> bool {
        self.lower[var] > self.upper[var] + tol
    }

    /// Flag `var` for the next [`take_dirty`](Self::take_dirty).
    pub fn mark_dirty(&mut self, var: usize) {
        if !self.is_dirty[var] {
            self.is_dirty[var] = true;
            self.dirty.push(var);
        }
    }

    /// Flag every variable, e.g. after the relaxation was rebuilt.
    pub fn mark_all_dirty(&mut self) {
        for var in 0..self.num_vars() {
            self.mark_dirty(var);
        }
    }

    /// Variables whose bounds changed since the last call.
    pub fn take_dirty(&mut self) -> Vec<usize> {
        for &var in &self.dirty {
            self.is_dirty[var] = false;
        }
        std::mem::take(&mut self.dirty)
    }
}

/// Ordered, undoable list of bound changes owned by a node.
///
/// Insertion order is chronological. Once sealed the log can only be
/// applied or undone as a whole.
#[derive(Debug, Clone, Default)]
pub struct BoundChangeLog {
    changes: Vec<BoundChange>,
    sealed: bool,
}

impl BoundChangeLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a change.
    pub fn push(&mut self, change: BoundChange) -> TreeResult<()> {
        if self.sealed {
            return Err(contract_violation(format!(
                "bound change on variable {} added to a sealed log",
                change.var
            )));
        }
        self.changes.try_reserve(1)?;
        self.changes.push(change);
        Ok(())
    }

    /// Freeze the log; its memory is trimmed to the exact size.
    pub fn seal(&mut self) {
        self.changes.shrink_to_fit();
        self.sealed = true;
    }

    /// Accept changes again (the owner became active).
    pub(crate) fn reopen(&mut self) {
        self.sealed = false;
    }

    /// Returns true if the log no longer accepts changes.
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// The most recent bound this log sets for `var` on side `kind`.
    pub fn last_bound(&self, var: usize, kind: BoundKind) -> Option<f64> {
        self.changes
            .iter()
            .rev()
            .find(|c| c.var == var && c.kind == kind)
            .map(|c| c.new_bound)
    }

    /// Apply every change in chronological order.
    ///
    /// Each change records the bound it replaces, so a later
    /// [`undo`](Self::undo) restores what was in force at this call even if
    /// an ancestor's bounds moved after the log was written. The whole log is
    /// applied even when a domain collapses.
    pub fn apply(&mut self, domains: &mut Domains, tol: f64) -> BoundOutcome {
        let mut outcome = BoundOutcome::Feasible;
        for change in &mut self.changes {
            change.old_bound = domains.bound(change.var, change.kind);
            domains.set_bound(change.var, change.kind, change.new_bound);
            if domains.is_empty(change.var, tol) {
                outcome = outcome.and(BoundOutcome::Infeasible { var: change.var });
            }
        }
        outcome
    }

    /// Undo every change, most recent first.
    pub fn undo(&self, domains: &mut Domains) {
        for change in self.changes.iter().rev() {
            domains.set_bound(change.var, change.kind, change.old_bound);
        }
    }

    /// Number of changes.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Check if the log is empty.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Iterate over the changes in chronological order.
    pub fn iter(&self) -> impl Iterator<Item = &BoundChange> {
        self.changes.iter()
    }
}

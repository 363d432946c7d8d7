//! Relaxation solver trait and types.

use crate::error::TreeResult;

/// Status of a relaxation solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LpStatus {
    /// Optimal solution found.
    Optimal,

    /// Relaxation is infeasible (node can be pruned).
    Infeasible,

    /// Relaxation is unbounded.
    Unbounded,

    /// Iteration or time limit of the solver hit.
    IterationLimit,

    /// Numerical difficulties.
    NumericalError,
}

impl LpStatus {
    /// Returns true if the solver ended with a usable basis.
    pub fn is_solved(&self) -> bool {
        matches!(self, LpStatus::Optimal | LpStatus::Infeasible | LpStatus::Unbounded)
    }
}

/// Trait for relaxation solver backends (LP solvers).
///
/// The backend holds the column/row set of the current relaxation. The tree
/// only ever appends to that set or truncates it from the end, so columns
/// and rows are addressed by position. Basis blobs are opaque to the tree.
pub trait LpSolver {
    /// A column (variable) of the relaxation.
    type Column: Clone;

    /// A row (constraint or cut) of the relaxation.
    type Row: Clone;

    /// Warm-start information extracted from a solved relaxation.
    type Basis;

    /// Append a column.
    fn add_column(&mut self, col: &Self::Column) -> TreeResult<()>;

    /// Append a row.
    fn add_row(&mut self, row: &Self::Row) -> TreeResult<()>;

    /// Append several columns.
    fn add_columns(&mut self, cols: &[Self::Column]) -> TreeResult<()> {
        cols.iter().try_for_each(|c| self.add_column(c))
    }

    /// Append several rows.
    fn add_rows(&mut self, rows: &[Self::Row]) -> TreeResult<()> {
        rows.iter().try_for_each(|r| self.add_row(r))
    }

    /// Drop every column at position `n` or above.
    fn shrink_columns(&mut self, n: usize) -> TreeResult<()>;

    /// Drop every row at position `n` or above.
    fn shrink_rows(&mut self, n: usize) -> TreeResult<()>;

    /// Remove all columns and rows.
    fn clear(&mut self) -> TreeResult<()>;

    /// Update variable bounds (for branching).
    fn set_var_bounds(&mut self, var: usize, lb: f64, ub: f64) -> TreeResult<()>;

    /// Extract the warm-start basis of the last solve.
    fn get_basis_state(&mut self) -> TreeResult<Self::Basis>;

    /// Install a warm-start basis.
    fn set_basis_state(&mut self, basis: &Self::Basis) -> TreeResult<()>;

    /// Give a basis back to the solver once nobody needs it anymore.
    fn free_basis_state(&mut self, basis: Self::Basis);

    /// Solve the current relaxation.
    fn solve(&mut self) -> TreeResult<LpStatus>;
}

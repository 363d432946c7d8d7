//! Mirror of the column/row set installed in the relaxation solver.

use super::LpSolver;
use crate::error::TreeResult;

/// Number of columns and rows of a relaxation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LpSize {
    /// Number of columns.
    pub cols: usize,

    /// Number of rows.
    pub rows: usize,
}

impl LpSize {
    /// Create a size.
    pub fn new(cols: usize, rows: usize) -> Self {
        Self { cols, rows }
    }

    /// Size after appending `cols` columns and `rows` rows.
    pub fn grow(self, cols: usize, rows: usize) -> Self {
        Self {
            cols: self.cols + cols,
            rows: self.rows + rows,
        }
    }
}

/// The relaxation solver together with a copy of what it currently holds.
///
/// Every structural edit goes through this wrapper so the tree can tell
/// which columns and rows a node added on top of its parent.
pub struct Relaxation<S: LpSolver> {
    /// Backend.
    solver: S,

    /// Columns in solver order.
    cols: Vec<S::Column>,

    /// Rows in solver order.
    rows: Vec<S::Row>,
}

impl<S: LpSolver> Relaxation<S> {
    /// Wrap an empty solver.
    pub fn new(solver: S) -> Self {
        Self {
            solver,
            cols: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// The backend.
    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// The backend, mutably.
    ///
    /// Meant for reading solutions and tuning parameters; adding or removing
    /// columns and rows behind the wrapper's back desynchronizes the tree.
    pub fn solver_mut(&mut self) -> &mut S {
        &mut self.solver
    }

    /// Current size.
    pub fn size(&self) -> LpSize {
        LpSize::new(self.cols.len(), self.rows.len())
    }

    /// Columns in solver order.
    pub fn columns(&self) -> &[S::Column] {
        &self.cols
    }

    /// Rows in solver order.
    pub fn rows(&self) -> &[S::Row] {
        &self.rows
    }

    /// Append a column.
    pub fn add_column(&mut self, col: S::Column) -> TreeResult<()> {
        self.cols.try_reserve(1)?;
        self.solver.add_column(&col)?;
        self.cols.push(col);
        Ok(())
    }

    /// Append a row.
    pub fn add_row(&mut self, row: S::Row) -> TreeResult<()> {
        self.rows.try_reserve(1)?;
        self.solver.add_row(&row)?;
        self.rows.push(row);
        Ok(())
    }

    /// Append a batch of columns and rows.
    pub fn extend(&mut self, cols: &[S::Column], rows: &[S::Row]) -> TreeResult<()> {
        if !cols.is_empty() {
            self.cols.try_reserve(cols.len())?;
            self.solver.add_columns(cols)?;
            self.cols.extend_from_slice(cols);
        }
        if !rows.is_empty() {
            self.rows.try_reserve(rows.len())?;
            self.solver.add_rows(rows)?;
            self.rows.extend_from_slice(rows);
        }
        Ok(())
    }

    /// Truncate to `size`; larger targets leave the relaxation untouched.
    pub fn shrink(&mut self, size: LpSize) -> TreeResult<()> {
        if size.cols < self.cols.len() {
            self.solver.shrink_columns(size.cols)?;
            self.cols.truncate(size.cols);
        }
        if size.rows < self.rows.len() {
            self.solver.shrink_rows(size.rows)?;
            self.rows.truncate(size.rows);
        }
        Ok(())
    }

    /// Remove everything.
    pub fn clear(&mut self) -> TreeResult<()> {
        self.solver.clear()?;
        self.cols.clear();
        self.rows.clear();
        Ok(())
    }

    /// Copy out everything from position `from` on.
    pub fn suffix(&self, from: LpSize) -> TreeResult<(Vec<S::Column>, Vec<S::Row>)> {
        let cols = self.cols.get(from.cols..).unwrap_or(&[]);
        let rows = self.rows.get(from.rows..).unwrap_or(&[]);
        let mut out_cols = Vec::new();
        out_cols.try_reserve_exact(cols.len())?;
        out_cols.extend_from_slice(cols);
        let mut out_rows = Vec::new();
        out_rows.try_reserve_exact(rows.len())?;
        out_rows.extend_from_slice(rows);
        Ok((out_cols, out_rows))
    }
}

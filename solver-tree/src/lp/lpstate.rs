//! Shared warm-start snapshots.
//!
//! A snapshot is taken once, when a node turns into a Fork or Subroot, and
//! is promised to a known number of pending descendants at that moment.
//! The promise is recorded in one batched [`LpStateHandle::capture`]; each
//! descendant later gives its share back with [`LpStateHandle::release`].
//! The basis blob is returned to the solver the instant the last share is
//! released.

use super::LpSolver;
use crate::error::{contract_violation, TreeResult};

/// Reference-counted basis snapshot.
#[derive(Debug)]
pub struct LpStateHandle<B> {
    /// Solver-owned basis; `None` once freed.
    blob: Option<B>,

    /// Outstanding shares.
    refs: usize,
}

impl<B> LpStateHandle<B> {
    /// Wrap a freshly extracted basis. No share is outstanding yet.
    pub fn new(blob: B) -> Self {
        Self {
            blob: Some(blob),
            refs: 0,
        }
    }

    /// Hand out `n` shares at once.
    pub fn capture(&mut self, n: usize) -> TreeResult<()> {
        if self.blob.is_none() {
            return Err(contract_violation("capture on a freed LP state"));
        }
        self.refs += n;
        Ok(())
    }

    /// Give one share back, freeing the blob through `solver` on the last one.
    ///
    /// Returns true if this call freed the blob.
    pub fn release<S>(&mut self, solver: &mut S) -> TreeResult<bool>
    where
        S: LpSolver<Basis = B>,
    {
        if self.refs == 0 {
            return Err(contract_violation("release on an LP state without references"));
        }
        self.refs -= 1;
        if self.refs > 0 {
            return Ok(false);
        }
        match self.blob.take() {
            Some(blob) => {
                solver.free_basis_state(blob);
                Ok(true)
            }
            None => Err(contract_violation("LP state freed twice")),
        }
    }

    /// Outstanding shares.
    pub fn refs(&self) -> usize {
        self.refs
    }

    /// The basis, if still alive.
    pub fn blob(&self) -> Option<&B> {
        self.blob.as_ref()
    }

    /// Returns true while the blob has not been freed.
    pub fn is_valid(&self) -> bool {
        self.blob.is_some()
    }

    /// Force the blob out regardless of outstanding shares (tree teardown).
    pub(crate) fn take_blob(&mut self) -> Option<B> {
        self.refs = 0;
        self.blob.take()
    }
}

//! Incremental relaxation loading.
//!
//! The solver keeps whatever column/row set the previous node left behind.
//! Loading the active node's relaxation only touches the part that differs:
//!
//! 1. shrink back to the deepest path position still known to be right
//!    (`correct_depth`), or rebuild from the nearest Subroot when there is
//!    no such position;
//! 2. replay the additions of every Fork between that position and the
//!    nearest lp-fork;
//! 3. install the lp-fork's basis as a warm start.

use compare::Compare;
use log::{debug, trace};

use super::node::NodeKind;
use super::tree::Tree;
use super::NodeKey;
use crate::error::{contract_violation, unknown_node, TreeResult};
use crate::lp::{LpSize, LpSolver};

/// Result of [`Tree::load_relaxation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// The solver now holds the active node's relaxation.
    Loaded,

    /// Nothing to do; the relaxation was loaded before.
    AlreadyLoaded,

    /// The active node has an empty domain; nothing was loaded.
    Cutoff,
}

impl<S: LpSolver, N: Compare<NodeKey> + Clone> Tree<S, N> {
    /// Bring the solver's column/row set in line with the active node.
    ///
    /// On return, `correct_depth` is the depth of the nearest lp-fork (or
    /// `None` without one) and the solver holds exactly the columns and rows
    /// recorded for that path position.
    pub fn load_relaxation(&mut self) -> TreeResult<LoadStatus> {
        let Some(active) = self.active else {
            return Err(contract_violation("no active node to load"));
        };
        if self.focus_lp_loaded {
            return Ok(LoadStatus::AlreadyLoaded);
        }
        if let Some(var) = self.focus_infeasible {
            // The node is going to be cut off; its warm-start share is void
            debug!("skip loading {active}: domain of variable {var} is empty");
            self.release_lp_ref(active)?;
            return Ok(LoadStatus::Cutoff);
        }

        let before = self.lp.size();
        let target_depth = match self.lp_fork {
            Some(fork) => Some(self.node(fork)?.depth),
            None => None,
        };

        // 1. starting point
        let mut replay_from = match self.correct_depth {
            Some(cd) => {
                let size = self.path_lp_sizes[cd];
                trace!("shrink relaxation to depth {cd} ({size:?})");
                self.lp.shrink(size)?;
                cd + 1
            }
            None => self.reload_subroot()?,
        };

        // 2. replay forks down to the lp-fork
        if let Some(target) = target_depth {
            let mut depth = replay_from;
            while depth <= target {
                let id = self.path[depth];
                let node = self.nodes.get(id).ok_or_else(|| unknown_node(id))?;
                match &node.kind {
                    NodeKind::Fork(f) => {
                        trace!(
                            "replay fork {id}: {} columns, {} rows",
                            f.added_cols.len(),
                            f.added_rows.len()
                        );
                        self.lp.extend(&f.added_cols, &f.added_rows)?;
                        self.stats.replayed_cols += f.added_cols.len() as u64;
                        self.stats.replayed_rows += f.added_rows.len() as u64;
                    }
                    NodeKind::Subroot(_) => {
                        // Shrinking past a complete snapshot loses the prefix
                        replay_from = self.reload_subroot()?;
                        depth = replay_from;
                        continue;
                    }
                    _ => {}
                }
                depth += 1;
            }
        }
        self.correct_depth = target_depth;

        let after = self.lp.size();
        let expected = match target_depth {
            Some(d) => self.path_lp_sizes[d],
            None => LpSize::default(),
        };
        debug_assert_eq!(after, expected, "relaxation out of sync after loading");
        if after != expected {
            return Err(contract_violation(format!(
                "relaxation holds {after:?} after loading, expected {expected:?}"
            )));
        }
        if after != before {
            // Column positions may now refer to other variables
            self.domains.mark_all_dirty();
        }

        // 3. warm start
        if let Some(fork) = self.lp_fork {
            let node = self.nodes.get(fork).ok_or_else(|| unknown_node(fork))?;
            if let Some(blob) = node.kind.lp_state().and_then(|h| h.blob()) {
                self.lp.solver_mut().set_basis_state(blob)?;
            }
        }
        self.release_lp_ref(active)?;

        self.focus_lp_loaded = true;
        self.stats.lp_loads += 1;
        debug!("loaded relaxation of {active}: {before:?} -> {after:?}");
        Ok(LoadStatus::Loaded)
    }

    /// Rebuild the relaxation from the nearest Subroot, or from scratch.
    ///
    /// Returns the first path position that still needs replaying.
    fn reload_subroot(&mut self) -> TreeResult<usize> {
        self.lp.clear()?;
        self.stats.full_reloads += 1;
        let Some(subroot) = self.subroot else {
            trace!("rebuild relaxation from scratch");
            return Ok(0);
        };
        let node = self.nodes.get(subroot).ok_or_else(|| unknown_node(subroot))?;
        let NodeKind::Subroot(data) = &node.kind else {
            return Err(contract_violation(format!("subroot {subroot} holds no snapshot")));
        };
        trace!(
            "rebuild relaxation from subroot {subroot}: {} columns, {} rows",
            data.cols.len(),
            data.rows.len()
        );
        self.lp.extend(&data.cols, &data.rows)?;
        self.stats.replayed_cols += data.cols.len() as u64;
        self.stats.replayed_rows += data.rows.len() as u64;
        Ok(node.depth + 1)
    }
}

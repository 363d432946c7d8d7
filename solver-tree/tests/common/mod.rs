//! Recording LP backend shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;

use solver_tree::{
    Activation, Domains, LoadStatus, LpSolver, LpStatus, NodeId, Tree, TreeResult, TreeSettings,
};

/// Backend that only remembers what the tree asked it to do.
///
/// Columns and rows are plain integers so tests can check exact contents.
#[derive(Debug)]
pub struct MockLp {
    /// Installed columns.
    pub cols: Vec<u32>,

    /// Installed rows.
    pub rows: Vec<u32>,

    /// Calls to `clear`.
    pub clears: usize,

    /// Columns added over the whole run.
    pub cols_added: usize,

    /// Rows added over the whole run.
    pub rows_added: usize,

    /// Bases handed out and not yet freed.
    pub live_bases: Vec<u64>,

    /// Bases freed, in order.
    pub freed: Vec<u64>,

    /// Last basis installed as a warm start.
    pub installed: Option<u64>,

    /// Last bounds pushed per variable.
    pub bounds: HashMap<usize, (f64, f64)>,

    /// Status returned by `solve`.
    pub status: LpStatus,

    next_basis: u64,
}

impl Default for MockLp {
    fn default() -> Self {
        Self {
            cols: Vec::new(),
            rows: Vec::new(),
            clears: 0,
            cols_added: 0,
            rows_added: 0,
            live_bases: Vec::new(),
            freed: Vec::new(),
            installed: None,
            bounds: HashMap::new(),
            status: LpStatus::Optimal,
            next_basis: 1,
        }
    }
}

impl LpSolver for MockLp {
    type Column = u32;
    type Row = u32;
    type Basis = u64;

    fn add_column(&mut self, col: &u32) -> TreeResult<()> {
        self.cols.push(*col);
        self.cols_added += 1;
        Ok(())
    }

    fn add_row(&mut self, row: &u32) -> TreeResult<()> {
        self.rows.push(*row);
        self.rows_added += 1;
        Ok(())
    }

    fn shrink_columns(&mut self, n: usize) -> TreeResult<()> {
        self.cols.truncate(n);
        Ok(())
    }

    fn shrink_rows(&mut self, n: usize) -> TreeResult<()> {
        self.rows.truncate(n);
        Ok(())
    }

    fn clear(&mut self) -> TreeResult<()> {
        self.clears += 1;
        self.cols.clear();
        self.rows.clear();
        Ok(())
    }

    fn set_var_bounds(&mut self, var: usize, lb: f64, ub: f64) -> TreeResult<()> {
        self.bounds.insert(var, (lb, ub));
        Ok(())
    }

    fn get_basis_state(&mut self) -> TreeResult<u64> {
        let basis = self.next_basis;
        self.next_basis += 1;
        self.live_bases.push(basis);
        Ok(basis)
    }

    fn set_basis_state(&mut self, basis: &u64) -> TreeResult<()> {
        assert!(self.live_bases.contains(basis), "installed a freed basis");
        self.installed = Some(*basis);
        Ok(())
    }

    fn free_basis_state(&mut self, basis: u64) {
        let pos = self
            .live_bases
            .iter()
            .position(|&b| b == basis)
            .expect("basis freed twice");
        self.live_bases.swap_remove(pos);
        self.freed.push(basis);
    }

    fn solve(&mut self) -> TreeResult<LpStatus> {
        Ok(self.status)
    }
}

/// Tree over [`MockLp`] with `nvars` variables in [0, 10].
pub fn tree(nvars: usize, settings: TreeSettings) -> Tree<MockLp> {
    let domains = Domains::from_bounds(vec![0.0; nvars], vec![10.0; nvars]).unwrap();
    Tree::new(MockLp::default(), domains, settings).unwrap()
}

/// Activate `node`, load its relaxation, add `cols` columns and `rows`
/// rows, then solve.
pub fn process(tree: &mut Tree<MockLp>, node: NodeId, cols: u32, rows: u32) {
    assert_eq!(tree.activate(Some(node)).unwrap(), Activation::Activated(node));
    assert_eq!(tree.load_relaxation().unwrap(), LoadStatus::Loaded);
    let base = tree.relaxation().size();
    for c in 0..cols {
        tree.add_column(base.cols as u32 + c).unwrap();
    }
    for r in 0..rows {
        tree.add_row(base.rows as u32 + r).unwrap();
    }
    assert_eq!(tree.solve_relaxation().unwrap(), LpStatus::Optimal);
}

/// Structural invariants that must hold between any two operations.
pub fn check_invariants(tree: &Tree<MockLp>) {
    // Path is the parent chain of the active node
    match tree.active() {
        Some(active) => {
            let path = tree.path();
            assert_eq!(path.last(), Some(&active));
            for (depth, &id) in path.iter().enumerate() {
                let node = tree.node(id).unwrap();
                assert_eq!(node.depth(), depth);
                assert!(node.is_on_path());
                let expected_parent = if depth == 0 { None } else { Some(path[depth - 1]) };
                assert_eq!(node.parent(), expected_parent);
            }
        }
        None => assert!(tree.path().is_empty()),
    }

    // Staging arrays hold nodes of the matching role
    for &id in tree.children() {
        assert_eq!(tree.node(id).unwrap().node_type(), solver_tree::NodeType::Child);
        assert_eq!(tree.node(id).unwrap().parent(), tree.active());
    }
    for &id in tree.siblings() {
        assert_eq!(tree.node(id).unwrap().node_type(), solver_tree::NodeType::Sibling);
    }
    for id in tree.leaves() {
        assert_eq!(tree.node(id).unwrap().node_type(), solver_tree::NodeType::Leaf);
    }

    // Exactly one Active node, and it is the designated one
    let actives: Vec<NodeId> = tree
        .path()
        .iter()
        .copied()
        .filter(|&id| tree.node(id).unwrap().node_type() == solver_tree::NodeType::Active)
        .collect();
    assert_eq!(actives, tree.active().into_iter().collect::<Vec<_>>());
}

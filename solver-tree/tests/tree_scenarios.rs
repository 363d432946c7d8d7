//! Integration tests for node lifecycle, path switching and relaxation loading.

mod common;

use common::{check_invariants, process, MockLp};
use solver_tree::{
    Activation, BoundChange, BoundKind, BoundOutcome, ConsId, LoadStatus, LpSize, NodeSelection, NodeType,
    SnapshotContext, SnapshotStrategy, Tree, TreeSettings,
};

#[test]
fn test_fork_snapshot_is_shared_then_freed() {
    let mut tree = common::tree(1, TreeSettings::default());
    let root = tree.create_child(0.0, 0.0).unwrap();
    process(&mut tree, root, 2, 1);
    let c1 = tree.create_child(0.0, 0.0).unwrap();
    let c2 = tree.create_child(0.0, 0.0).unwrap();

    assert_eq!(tree.activate(Some(c1)).unwrap(), Activation::Activated(c1));
    let r = tree.node(root).unwrap();
    assert_eq!(r.node_type(), NodeType::Fork);
    assert_eq!(r.open_children(), Some(2));
    assert_eq!(r.lp_state().unwrap().refs(), 2);
    assert_eq!(r.stored_lp_size(), Some((2, 1)));

    assert_eq!(tree.load_relaxation().unwrap(), LoadStatus::Loaded);
    assert_eq!(tree.node(root).unwrap().lp_state().unwrap().refs(), 1);
    assert_eq!(tree.relaxation().solver().installed, Some(1));

    // c1 ends without children: it becomes a Deadend and is freed
    assert_eq!(tree.activate(Some(c2)).unwrap(), Activation::Activated(c2));
    assert!(!tree.contains(c1));
    let r = tree.node(root).unwrap();
    assert_eq!(r.open_children(), Some(1));
    assert_eq!(r.lp_state().unwrap().refs(), 1);

    assert_eq!(tree.load_relaxation().unwrap(), LoadStatus::Loaded);
    let handle = tree.node(root).unwrap().lp_state().unwrap();
    assert_eq!(handle.refs(), 0);
    assert!(!handle.is_valid());
    assert_eq!(tree.relaxation().solver().freed, vec![1]);
    assert!(tree.relaxation().solver().live_bases.is_empty());

    assert_eq!(tree.activate(None).unwrap(), Activation::Finished);
    assert_eq!(tree.num_nodes(), 0);
    assert_eq!(tree.root(), None);
}

#[test]
fn test_switch_to_unrelated_node_undoes_abandoned_path() {
    let mut tree = common::tree(1, TreeSettings::default());
    let top = tree.create_child(0.0, 0.0).unwrap();
    assert_eq!(tree.activate(Some(top)).unwrap(), Activation::Activated(top));

    let r = tree.create_child(0.0, 0.0).unwrap();
    let s = tree.create_child(0.0, 0.0).unwrap();
    assert_eq!(
        tree.add_bound_change(r, 0, BoundKind::Upper, 5.0).unwrap(),
        BoundOutcome::Feasible
    );
    tree.add_bound_change(s, 0, BoundKind::Lower, 7.0).unwrap();

    tree.activate(Some(r)).unwrap();
    assert_eq!(tree.domains().upper(0), 5.0);
    let c = tree.create_child(0.0, 0.0).unwrap();
    tree.add_bound_change(c, 0, BoundKind::Upper, 3.0).unwrap();
    tree.activate(Some(c)).unwrap();
    assert_eq!(tree.domains().upper(0), 3.0);
    assert_eq!(tree.node(s).unwrap().node_type(), NodeType::Leaf);
    check_invariants(&tree);

    assert_eq!(tree.activate(Some(s)).unwrap(), Activation::Activated(s));
    assert_eq!(tree.domains().upper(0).to_bits(), 10.0f64.to_bits());
    assert_eq!(tree.domains().lower(0), 7.0);
    assert_eq!(tree.path(), &[top, s]);
    assert!(!tree.contains(c));
    assert!(!tree.contains(r));
    assert_eq!(tree.node(top).unwrap().node_type(), NodeType::Junction);
    assert_eq!(tree.node(top).unwrap().open_children(), Some(1));
    check_invariants(&tree);
}

#[test]
fn test_sibling_switch_below_subroot_keeps_correct_depth() {
    let mut tree = common::tree(4, TreeSettings::default());
    tree.set_snapshot_policy(Box::new(|ctx: &SnapshotContext| ctx.depth == 4));

    let root = tree.create_child(0.0, 0.0).unwrap();
    process(&mut tree, root, 40, 20);
    let n1 = tree.create_child(0.0, 0.0).unwrap();
    let outside = tree.create_child(0.0, 0.0).unwrap();
    process(&mut tree, n1, 20, 10);
    let n2 = tree.create_child(0.0, 0.0).unwrap();
    process(&mut tree, n2, 20, 10);
    let n3 = tree.create_child(0.0, 0.0).unwrap();
    process(&mut tree, n3, 10, 5);
    let n4 = tree.create_child(0.0, 0.0).unwrap();
    process(&mut tree, n4, 10, 5);
    let n5 = tree.create_child(0.0, 0.0).unwrap();
    let below_subroot = tree.create_child(0.0, 0.0).unwrap();
    // n5 solves without adding anything
    process(&mut tree, n5, 0, 0);
    let n6 = tree.create_child(0.0, 0.0).unwrap();
    process(&mut tree, n6, 3, 0);
    let l1 = tree.create_child(0.0, 0.0).unwrap();
    let l2 = tree.create_child(0.0, 0.0).unwrap();

    assert_eq!(tree.node(n4).unwrap().node_type(), NodeType::Subroot);
    assert_eq!(tree.node(n4).unwrap().stored_lp_size(), Some((100, 50)));
    assert_eq!(tree.node(n5).unwrap().node_type(), NodeType::Junction);
    assert_eq!(tree.stats().full_reloads, 1);

    // Leaf below the depth-6 fork, reached through its sibling's subtree
    process(&mut tree, l1, 2, 0);
    assert_eq!(tree.node(n6).unwrap().node_type(), NodeType::Fork);
    assert_eq!(tree.node(n6).unwrap().stored_lp_size(), Some((3, 0)));
    assert_eq!(tree.correct_depth(), Some(6));
    let g = tree.create_child(0.0, 0.0).unwrap();
    process(&mut tree, g, 0, 0);
    assert_eq!(tree.node(l2).unwrap().node_type(), NodeType::Leaf);
    assert_eq!(tree.relaxation().size(), LpSize::new(105, 50));

    let clears = tree.relaxation().solver().clears;
    let added = tree.relaxation().solver().cols_added;
    assert_eq!(tree.activate(Some(l2)).unwrap(), Activation::Activated(l2));
    assert_eq!(tree.correct_depth(), Some(6));
    assert_eq!(tree.subroot(), Some(n4));
    assert_eq!(tree.lp_fork(), Some(n6));
    assert!(!tree.contains(l1));
    assert!(!tree.contains(g));

    assert_eq!(tree.load_relaxation().unwrap(), LoadStatus::Loaded);
    assert_eq!(tree.correct_depth(), Some(6));
    let solver = tree.relaxation().solver();
    assert_eq!(solver.clears, clears);
    assert_eq!(solver.cols_added, added);
    assert_eq!(solver.cols.len(), 103);
    assert_eq!(solver.rows.len(), 50);
    assert_eq!(tree.stats().full_reloads, 1);
    check_invariants(&tree);

    // Leaving the subroot's subtree rebuilds from the root fork
    assert_eq!(tree.activate(Some(outside)).unwrap(), Activation::Activated(outside));
    assert_eq!(tree.correct_depth(), None);
    assert_eq!(tree.subroot(), None);
    assert_eq!(tree.lp_fork(), Some(root));
    assert_eq!(tree.load_relaxation().unwrap(), LoadStatus::Loaded);
    assert_eq!(tree.relaxation().size(), LpSize::new(40, 20));
    assert_eq!(tree.relaxation().solver().installed, Some(1));
    assert_eq!(tree.stats().full_reloads, 2);
    assert!(tree.contains(n4));
    assert!(!tree.contains(n5));

    // ... and coming back reloads the subroot snapshot in one go
    assert_eq!(
        tree.activate(Some(below_subroot)).unwrap(),
        Activation::Activated(below_subroot)
    );
    assert_eq!(tree.correct_depth(), None);
    assert_eq!(tree.subroot(), Some(n4));
    assert_eq!(tree.load_relaxation().unwrap(), LoadStatus::Loaded);
    assert_eq!(tree.correct_depth(), Some(4));
    let solver = tree.relaxation().solver();
    assert_eq!(solver.cols, (0..100).collect::<Vec<u32>>());
    assert_eq!(solver.rows.len(), 50);
    assert_eq!(solver.installed, Some(5));
    assert!(solver.live_bases.is_empty());
    assert_eq!(tree.stats().full_reloads, 3);
    check_invariants(&tree);
}

#[test]
fn test_reactivating_active_node_is_noop() {
    let mut tree = common::tree(2, TreeSettings::default());
    let root = tree.create_child(0.0, 0.0).unwrap();
    process(&mut tree, root, 1, 1);
    let stats = tree.stats().activations;

    assert_eq!(tree.activate(Some(root)).unwrap(), Activation::Unchanged);
    assert_eq!(tree.stats().activations, stats);
    assert!(tree.is_lp_loaded());
    assert_eq!(tree.load_relaxation().unwrap(), LoadStatus::AlreadyLoaded);
}

#[test]
fn test_junction_forwards_lp_state_to_its_children() {
    let mut tree = common::tree(2, TreeSettings::default());
    let root = tree.create_child(0.0, 0.0).unwrap();
    process(&mut tree, root, 2, 0);
    let j = tree.create_child(0.0, 0.0).unwrap();
    let k = tree.create_child(0.0, 0.0).unwrap();

    process(&mut tree, j, 0, 0);
    assert_eq!(tree.node(root).unwrap().lp_state().unwrap().refs(), 1);
    let a = tree.create_child(0.0, 0.0).unwrap();
    let b = tree.create_child(0.0, 0.0).unwrap();

    tree.activate(Some(a)).unwrap();
    assert_eq!(tree.node(j).unwrap().node_type(), NodeType::Junction);
    assert_eq!(tree.node(root).unwrap().lp_state().unwrap().refs(), 3);
    assert_eq!(tree.node(b).unwrap().lp_state_ref(), Some(root));
    assert_eq!(tree.lp_fork(), Some(root));

    // b and k give their shares back when pruned, a when it loads
    tree.update_lower_bound(b, 50.0).unwrap();
    tree.update_lower_bound(k, 50.0).unwrap();
    assert_eq!(tree.prune(10.0).unwrap(), 2);
    assert_eq!(tree.node(root).unwrap().lp_state().unwrap().refs(), 1);
    assert_eq!(tree.load_relaxation().unwrap(), LoadStatus::Loaded);
    assert!(!tree.node(root).unwrap().lp_state().unwrap().is_valid());
    assert!(tree.relaxation().solver().live_bases.is_empty());
    check_invariants(&tree);
}

#[test]
fn test_infeasible_child_is_cut_off() {
    let mut tree = common::tree(1, TreeSettings::default());
    let root = tree.create_child(0.0, 0.0).unwrap();
    process(&mut tree, root, 1, 0);
    let c = tree.create_child(0.0, 0.0).unwrap();
    assert_eq!(
        tree.add_bound_change(c, 0, BoundKind::Lower, 12.0).unwrap(),
        BoundOutcome::Infeasible { var: 0 }
    );

    assert_eq!(
        tree.activate(Some(c)).unwrap(),
        Activation::Cutoff { node: c, var: 0 }
    );
    assert_eq!(tree.active_infeasibility(), Some(0));
    assert_eq!(tree.load_relaxation().unwrap(), LoadStatus::Cutoff);
    assert!(!tree.is_lp_loaded());
    // The only share of the root snapshot was given back unused
    assert!(tree.relaxation().solver().live_bases.is_empty());

    assert_eq!(tree.activate(None).unwrap(), Activation::Finished);
    assert_eq!(tree.domains().lower(0), 0.0);
    assert_eq!(tree.num_nodes(), 0);
}

#[test]
fn test_bound_change_on_active_node_applies_immediately() {
    let mut tree = common::tree(2, TreeSettings::default());
    let root = tree.create_child(0.0, 0.0).unwrap();
    process(&mut tree, root, 2, 0);

    tree.add_bound_change(root, 1, BoundKind::Upper, 4.0).unwrap();
    assert_eq!(tree.domains().upper(1), 4.0);
    assert_eq!(
        tree.add_bound_change(root, 1, BoundKind::Lower, 6.0).unwrap(),
        BoundOutcome::Infeasible { var: 1 }
    );
    assert_eq!(tree.active_infeasibility(), Some(1));

    tree.solve_relaxation().unwrap();
    assert_eq!(tree.relaxation().solver().bounds.get(&1), Some(&(6.0, 4.0)));
}

#[test]
fn test_parent_tightening_after_child_log_survives_undo() {
    let mut tree = common::tree(1, TreeSettings::default());
    let root = tree.create_child(0.0, 0.0).unwrap();
    tree.activate(Some(root)).unwrap();

    let c1 = tree.create_child(0.0, 0.0).unwrap();
    tree.add_bound_change(c1, 0, BoundKind::Upper, 3.0).unwrap();
    // The parent moves the same bound after c1 logged its change
    tree.add_bound_change(root, 0, BoundKind::Upper, 5.0).unwrap();
    let c2 = tree.create_child(0.0, 0.0).unwrap();

    assert_eq!(tree.activate(Some(c1)).unwrap(), Activation::Activated(c1));
    assert_eq!(tree.domains().upper(0), 3.0);
    assert_eq!(tree.activate(Some(c2)).unwrap(), Activation::Activated(c2));
    assert_eq!(tree.domains().upper(0), 5.0);

    assert_eq!(tree.activate(None).unwrap(), Activation::Finished);
    assert_eq!(tree.domains().upper(0), 10.0);
}

#[test]
fn test_raising_active_bound_lifts_children() {
    let mut tree = common::tree(1, TreeSettings::default());
    let root = tree.create_child(0.0, 0.0).unwrap();
    tree.activate(Some(root)).unwrap();
    let low = tree.create_child(1.0, 1.0).unwrap();
    let high = tree.create_child(6.0, 6.0).unwrap();

    tree.update_lower_bound(root, 4.0).unwrap();
    assert_eq!(tree.node(root).unwrap().lower_bound(), 4.0);
    assert_eq!(tree.node(low).unwrap().lower_bound(), 4.0);
    assert_eq!(tree.node(high).unwrap().lower_bound(), 6.0);
    assert_eq!(tree.lower_bound(), 4.0);
}

#[test]
fn test_junction_children_start_cold_when_snapshot_is_spent() {
    let mut tree = common::tree(1, TreeSettings::default());
    let root = tree.create_child(0.0, 0.0).unwrap();
    process(&mut tree, root, 2, 0);
    let j = tree.create_child(0.0, 0.0).unwrap();

    // j holds the last share of the root snapshot and consumes it
    process(&mut tree, j, 0, 0);
    assert!(!tree.node(root).unwrap().lp_state().unwrap().is_valid());
    let a = tree.create_child(0.0, 0.0).unwrap();
    let b = tree.create_child(0.0, 0.0).unwrap();

    assert_eq!(tree.activate(Some(a)).unwrap(), Activation::Activated(a));
    assert_eq!(tree.node(j).unwrap().node_type(), NodeType::Junction);
    assert_eq!(tree.stats().cold_children, 2);
    assert_eq!(tree.node(b).unwrap().lp_state_ref(), None);

    assert_eq!(tree.load_relaxation().unwrap(), LoadStatus::Loaded);
    assert_eq!(tree.relaxation().size(), LpSize::new(2, 0));
    assert!(tree.relaxation().solver().live_bases.is_empty());
    check_invariants(&tree);
}

#[test]
fn test_prune_frees_waiting_nodes() {
    let mut tree = common::tree(1, TreeSettings::default());
    let root = tree.create_child(0.0, 0.0).unwrap();
    process(&mut tree, root, 1, 0);
    let c1 = tree.create_child(1.0, 1.0).unwrap();
    let c5 = tree.create_child(5.0, 5.0).unwrap();
    let c9 = tree.create_child(9.0, 9.0).unwrap();

    assert_eq!(tree.best_child().unwrap(), Some(c1));
    tree.activate(Some(c1)).unwrap();
    assert_eq!(tree.siblings().len(), 2);
    assert_eq!(tree.node(root).unwrap().lp_state().unwrap().refs(), 3);

    assert_eq!(tree.prune(5.0).unwrap(), 2);
    assert!(!tree.contains(c5));
    assert!(!tree.contains(c9));
    assert!(tree.siblings().is_empty());
    assert_eq!(tree.node(root).unwrap().open_children(), Some(1));
    assert_eq!(tree.node(root).unwrap().lp_state().unwrap().refs(), 1);
    assert_eq!(tree.lower_bound(), 1.0);
    check_invariants(&tree);
}

#[test]
fn test_freeing_last_child_cascades_to_parent() {
    let mut tree = common::tree(1, TreeSettings::default());
    let root = tree.create_child(0.0, 0.0).unwrap();
    process(&mut tree, root, 1, 0);
    let a = tree.create_child(0.0, 0.0).unwrap();
    let b = tree.create_child(0.0, 0.0).unwrap();

    // a is never loaded: it ends as a Junction and forwards the root snapshot
    tree.activate(Some(a)).unwrap();
    let g1 = tree.create_child(0.0, 0.0).unwrap();
    let g2 = tree.create_child(0.0, 0.0).unwrap();
    tree.activate(Some(b)).unwrap();
    assert_eq!(tree.node(a).unwrap().node_type(), NodeType::Junction);
    assert_eq!(tree.node(g1).unwrap().node_type(), NodeType::Leaf);
    assert_eq!(tree.node(root).unwrap().lp_state().unwrap().refs(), 3);

    tree.free_node(g1).unwrap();
    assert_eq!(tree.node(a).unwrap().open_children(), Some(1));
    tree.free_node(g2).unwrap();
    assert!(!tree.contains(a));
    assert_eq!(tree.node(root).unwrap().open_children(), Some(1));
    assert_eq!(tree.node(root).unwrap().lp_state().unwrap().refs(), 1);
    assert_eq!(tree.frontier_len(), 0);
    check_invariants(&tree);
}

#[test]
fn test_selection_and_bound_updates() {
    let mut tree = common::tree(1, TreeSettings::default());
    let root = tree.create_child(0.0, 0.0).unwrap();
    process(&mut tree, root, 1, 0);
    let c3 = tree.create_child(3.0, 3.0).unwrap();
    let c1 = tree.create_child(1.0, 1.0).unwrap();
    let c2 = tree.create_child(2.0, 2.0).unwrap();
    assert_eq!(tree.best_node().unwrap(), Some(c1));

    tree.activate(Some(c1)).unwrap();
    assert_eq!(tree.best_sibling().unwrap(), Some(c2));
    let g = tree.create_child(0.5, 0.5).unwrap();
    // Children never have a weaker bound than their parent
    assert_eq!(tree.node(g).unwrap().lower_bound(), 1.0);

    tree.activate(Some(g)).unwrap();
    assert_eq!(tree.frontier_len(), 2);
    assert_eq!(tree.best_leaf(), Some(c2));
    tree.update_lower_bound(c2, 3.5).unwrap();
    tree.update_lower_bound(c3, 2.0).unwrap(); // ignored
    assert_eq!(tree.best_leaf(), Some(c3));
    assert_eq!(tree.lower_bound(), 1.0);
    assert_eq!(tree.pop_best(), Some(c3));
    assert_eq!(tree.activate(Some(c3)).unwrap(), Activation::Activated(c3));
    check_invariants(&tree);
}

#[test]
fn test_depth_first_selection_prefers_deep_nodes() {
    let settings = TreeSettings::default().with_node_selection(NodeSelection::DepthFirst);
    let mut tree = common::tree(1, settings);
    let root = tree.create_child(0.0, 0.0).unwrap();
    process(&mut tree, root, 0, 0);
    let shallow = tree.create_child(0.0, 0.0).unwrap();
    let deep = tree.create_child(0.0, 0.0).unwrap();
    tree.activate(Some(deep)).unwrap();
    let deeper = tree.create_child(5.0, 5.0).unwrap();

    assert_eq!(tree.best_node().unwrap(), Some(deeper));
    tree.activate(Some(deeper)).unwrap();
    assert_eq!(tree.best_node().unwrap(), Some(shallow));
}

#[test]
fn test_local_constraints_follow_the_path() {
    let mut tree = common::tree(1, TreeSettings::default());
    let root = tree.create_child(0.0, 0.0).unwrap();
    tree.add_local_constraint(root, ConsId(1)).unwrap();
    tree.activate(Some(root)).unwrap();
    let a = tree.create_child(0.0, 0.0).unwrap();
    let b = tree.create_child(0.0, 0.0).unwrap();
    tree.add_local_constraint(a, ConsId(2)).unwrap();
    tree.add_local_constraint(b, ConsId(3)).unwrap();

    tree.activate(Some(a)).unwrap();
    tree.add_local_constraint(a, ConsId(4)).unwrap();
    let active: Vec<ConsId> = tree.active_constraints().collect();
    assert_eq!(active, vec![ConsId(1), ConsId(2), ConsId(4)]);

    tree.activate(Some(b)).unwrap();
    let active: Vec<ConsId> = tree.active_constraints().collect();
    assert_eq!(active, vec![ConsId(1), ConsId(3)]);
}

#[test]
fn test_clear_releases_everything() {
    let settings = TreeSettings::default().with_snapshot(SnapshotStrategy::Full);
    let mut tree = common::tree(2, settings);
    let root = tree.create_child(0.0, 0.0).unwrap();
    process(&mut tree, root, 3, 1);
    let a = tree.create_child(0.0, 0.0).unwrap();
    tree.create_child(0.0, 0.0).unwrap();
    tree.add_bound_change(a, 0, BoundKind::Upper, 2.0).unwrap();
    process(&mut tree, a, 1, 0);
    tree.create_child(0.0, 0.0).unwrap();
    tree.create_child(0.0, 0.0).unwrap();
    assert_eq!(tree.node(root).unwrap().node_type(), NodeType::Subroot);

    tree.clear().unwrap();
    assert_eq!(tree.num_nodes(), 0);
    assert!(tree.path().is_empty());
    assert!(tree.children().is_empty());
    assert_eq!(tree.frontier_len(), 0);
    assert_eq!(tree.domains().upper(0), 10.0);
    let solver = tree.relaxation().solver();
    assert!(solver.live_bases.is_empty());
    assert!(solver.cols.is_empty());

    // The tree can be reused
    let root = tree.create_child(0.0, 0.0).unwrap();
    process(&mut tree, root, 1, 0);
}

#[test]
#[cfg_attr(debug_assertions, should_panic(expected = "contract violated"))]
fn test_activating_processed_node_is_rejected() {
    let mut tree = common::tree(1, TreeSettings::default());
    let root = tree.create_child(0.0, 0.0).unwrap();
    process(&mut tree, root, 1, 0);
    let c = tree.create_child(0.0, 0.0).unwrap();
    tree.activate(Some(c)).unwrap();
    assert!(tree.activate(Some(root)).is_err());
}

#[test]
#[cfg_attr(debug_assertions, should_panic(expected = "contract violated"))]
fn test_bound_change_on_leaf_is_rejected() {
    let mut tree = common::tree(1, TreeSettings::default());
    let root = tree.create_child(0.0, 0.0).unwrap();
    tree.activate(Some(root)).unwrap();
    let a = tree.create_child(0.0, 0.0).unwrap();
    let b = tree.create_child(0.0, 0.0).unwrap();
    tree.activate(Some(a)).unwrap();
    tree.create_child(0.0, 0.0).unwrap();
    let g = tree.best_child().unwrap().unwrap();
    tree.activate(Some(g)).unwrap();
    assert_eq!(tree.node(b).unwrap().node_type(), NodeType::Leaf);
    assert!(tree.add_bound_change(b, 0, BoundKind::Upper, 1.0).is_err());
}

#[test]
#[cfg_attr(debug_assertions, should_panic(expected = "contract violated"))]
fn test_second_root_is_rejected() {
    let mut tree = common::tree(1, TreeSettings::default());
    tree.create_child(0.0, 0.0).unwrap();
    assert!(tree.create_child(0.0, 0.0).is_err());
}

#[test]
#[cfg_attr(debug_assertions, should_panic(expected = "contract violated"))]
fn test_relaxation_edit_before_load_is_rejected() {
    let mut tree = common::tree(1, TreeSettings::default());
    let root = tree.create_child(0.0, 0.0).unwrap();
    tree.activate(Some(root)).unwrap();
    assert!(tree.add_column(0).is_err());
}

#[test]
#[cfg_attr(debug_assertions, should_panic(expected = "unknown node"))]
fn test_stale_handle_is_rejected() {
    let mut tree = common::tree(1, TreeSettings::default());
    let root = tree.create_child(0.0, 0.0).unwrap();
    tree.activate(Some(root)).unwrap();
    tree.activate(None).unwrap();
    assert!(!tree.contains(root));
    assert!(tree.node(root).is_err());
}

/// Small deterministic generator (64-bit LCG).
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) % bound
    }
}

fn check_domains(tree: &Tree<MockLp>) {
    for var in 0..tree.domains().num_vars() {
        let (mut lo, mut hi) = (0.0, 10.0);
        for &id in tree.path() {
            for change in tree.node(id).unwrap().bound_changes().iter() {
                if change.var == var {
                    match change.kind {
                        BoundKind::Lower => lo = change.new_bound,
                        BoundKind::Upper => hi = change.new_bound,
                    }
                }
            }
        }
        assert_eq!(tree.domains().lower(var), lo);
        assert_eq!(tree.domains().upper(var), hi);
    }
}

fn check_loaded(tree: &Tree<MockLp>) {
    let fork_depth = tree.lp_fork().map(|f| tree.node(f).unwrap().depth());
    assert_eq!(tree.correct_depth(), fork_depth);
    let expected = fork_depth
        .map(|d| tree.path_lp_size(d).unwrap())
        .unwrap_or_default();
    assert_eq!(tree.relaxation().size(), expected);
    let solver = tree.relaxation().solver();
    assert_eq!(solver.cols.as_slice(), tree.relaxation().columns());
    assert_eq!(solver.rows.as_slice(), tree.relaxation().rows());
}

fn explore(seed: u64, settings: TreeSettings) {
    const MAX_DEPTH: usize = 6;
    const NVARS: usize = 3;
    let mut rng = Lcg(seed);
    let mut tree = common::tree(NVARS, settings);
    let mut next = Some(tree.create_child(0.0, 0.0).unwrap());

    while let Some(node) = next {
        assert_eq!(tree.activate(Some(node)).unwrap(), Activation::Activated(node));
        check_invariants(&tree);
        check_domains(&tree);
        assert_eq!(tree.load_relaxation().unwrap(), LoadStatus::Loaded);
        check_loaded(&tree);

        let base = tree.relaxation().size();
        for c in 0..rng.next(3) as u32 {
            tree.add_column(base.cols as u32 + c).unwrap();
        }
        for r in 0..rng.next(2) as u32 {
            tree.add_row(base.rows as u32 + r).unwrap();
        }
        tree.solve_relaxation().unwrap();

        let depth = tree.node(node).unwrap().depth();
        let var = rng.next(NVARS as u64) as usize;
        let (lo, hi) = (tree.domains().lower(var), tree.domains().upper(var));
        if depth < MAX_DEPTH && hi - lo >= 3.0 {
            // Ancestors may already have tightened var
            let value = ((lo + hi) / 2.0).floor() + 0.5;
            let branches = [
                BoundChange::down_branch(var, hi, value),
                BoundChange::up_branch(var, lo, value),
            ];
            for change in branches.into_iter().take(rng.next(3) as usize) {
                let bound = rng.next(100) as f64 / 10.0;
                let child = tree.create_child(bound, bound).unwrap();
                let outcome = tree
                    .add_bound_change(child, change.var, change.kind, change.new_bound)
                    .unwrap();
                assert_eq!(outcome, BoundOutcome::Feasible);
            }
            if rng.next(2) == 1 {
                // Tighten var on the parent after the children logged theirs
                let outcome = tree
                    .add_bound_change(node, var, BoundKind::Upper, hi - 1.0)
                    .unwrap();
                assert_eq!(outcome, BoundOutcome::Feasible);
            }
        }
        next = tree.best_node().unwrap();
    }

    assert_eq!(tree.activate(None).unwrap(), Activation::Finished);
    check_domains(&tree);
    assert_eq!(tree.num_nodes(), 0);
    let stats = tree.stats();
    assert_eq!(stats.nodes_created, stats.nodes_freed);
    assert_eq!(stats.snapshots_captured, stats.snapshots_freed);
    assert!(tree.relaxation().solver().live_bases.is_empty());
}

#[test]
fn test_exhaustive_search_keeps_invariants() {
    let strategies = [
        SnapshotStrategy::Incremental,
        SnapshotStrategy::Full,
        SnapshotStrategy::Periodic { depth_interval: 2 },
        SnapshotStrategy::ReplayLimit { max_replay: 4 },
    ];
    let selections = [
        NodeSelection::BestBound,
        NodeSelection::DepthFirst,
        NodeSelection::BestEstimate,
    ];
    for (i, &snapshot) in strategies.iter().enumerate() {
        for (j, &selection) in selections.iter().enumerate() {
            let settings = TreeSettings::default()
                .with_snapshot(snapshot)
                .with_node_selection(selection);
            explore(17 + (i * 3 + j) as u64, settings);
        }
    }
}

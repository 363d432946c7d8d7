//! Frontier of unexplored leaves.

use std::cmp::Ordering;

use binary_heap_plus::BinaryHeap;
use compare::Compare;

use super::NodeId;

/// What node selection looks at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeKey {
    /// Creation counter (smaller = older).
    pub number: u64,

    /// Depth in the tree.
    pub depth: usize,

    /// Lower bound on the subtree objective.
    pub lower_bound: f64,

    /// Estimate of the best solution in the subtree.
    pub estimate: f64,
}

/// Entry in the frontier with its selection key.
#[derive(Debug, Clone, Copy)]
struct QueuedNode {
    id: NodeId,
    key: NodeKey,
}

/// Lifts a comparator over keys to queue entries.
#[derive(Clone)]
struct ByKey<N>(N);

impl<N: Compare<NodeKey>> Compare<QueuedNode> for ByKey<N> {
    fn compare(&self, l: &QueuedNode, r: &QueuedNode) -> Ordering {
        self.0.compare(&l.key, &r.key)
    }
}

/// Priority queue of Leaf nodes.
///
/// The comparator `N` is the node-selection policy; the greatest node under
/// it is explored first.
pub struct Frontier<N: Compare<NodeKey> + Clone> {
    /// Node selection policy.
    selector: N,

    /// Max-heap under `selector`.
    heap: BinaryHeap<QueuedNode, ByKey<N>>,

    /// Count of nodes popped.
    nodes_popped: u64,
}

impl<N: Compare<NodeKey> + Clone> Frontier<N> {
    /// Create an empty frontier ordered by `selector`.
    pub fn new(selector: N) -> Self {
        let heap = BinaryHeap::from_vec_cmp(Vec::new(), ByKey(selector.clone()));
        Self {
            selector,
            heap,
            nodes_popped: 0,
        }
    }

    /// The node selection policy.
    pub fn selector(&self) -> &N {
        &self.selector
    }

    /// Add a node.
    pub fn insert(&mut self, id: NodeId, key: NodeKey) {
        self.heap.push(QueuedNode { id, key });
    }

    /// Remove and return the best node.
    pub fn pop_best(&mut self) -> Option<NodeId> {
        let queued = self.heap.pop()?;
        self.nodes_popped += 1;
        Some(queued.id)
    }

    /// Best node without removing it.
    pub fn peek(&self) -> Option<(NodeId, NodeKey)> {
        self.heap.peek().map(|q| (q.id, q.key))
    }

    /// Remove a given node; returns false if it is not queued.
    ///
    /// Removing the top is O(log n); any other node costs a heap rebuild.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if self.heap.peek().map(|q| q.id) == Some(id) {
            return self.pop_best().is_some();
        }
        let removed = self.remove_where(|q| q.id == id);
        self.nodes_popped += removed.len() as u64;
        !removed.is_empty()
    }

    /// Remove every node whose key matches `pred`.
    pub fn drain_where<P>(&mut self, mut pred: P) -> Vec<NodeId>
    where
        P: FnMut(&NodeKey) -> bool,
    {
        self.remove_where(|q| pred(&q.key))
    }

    /// Remove every node.
    pub fn clear(&mut self) -> Vec<NodeId> {
        self.remove_where(|_| true)
    }

    /// Lowest lower bound in the queue (infinity when empty).
    pub fn lower_bound(&self) -> f64 {
        self.heap
            .iter()
            .map(|q| q.key.lower_bound)
            .fold(f64::INFINITY, f64::min)
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Get the number of nodes in the queue.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Get the total number of nodes popped.
    pub fn total_popped(&self) -> u64 {
        self.nodes_popped
    }

    /// Queued node ids in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.heap.iter().map(|q| q.id)
    }

    fn remove_where<P>(&mut self, mut pred: P) -> Vec<NodeId>
    where
        P: FnMut(&QueuedNode) -> bool,
    {
        let empty = BinaryHeap::from_vec_cmp(Vec::new(), ByKey(self.selector.clone()));
        let entries = std::mem::replace(&mut self.heap, empty).into_vec();

        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(entries.len());
        for q in entries {
            if pred(&q) {
                removed.push(q.id);
            } else {
                kept.push(q);
            }
        }
        self.heap = BinaryHeap::from_vec_cmp(kept, ByKey(self.selector.clone()));
        removed
    }
}

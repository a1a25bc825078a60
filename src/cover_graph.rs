//! Bucketed subsumption container (spec §4.6), grounded on
//! `tchecker::covreach::cover_node_t` and `tchecker::graph::node_t`.
//!
//! A [`CoverGraph`] answers the two queries [`crate::covreach`] needs: is a
//! freshly discovered state covered by one already in the graph
//! (`is_covered`), and which already-present states does a newly inserted
//! state itself cover (`covered_nodes`, so they can be pruned). Nodes are
//! bucketed by a caller-supplied key over the discrete part of the state
//! (vloc/intval), since only same-bucket nodes are ever comparable — the
//! zone predicate never needs to run across buckets. Removal is O(1) via
//! [`crate::hashtable`]'s stamped position.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::hashtable::{CollisionTable, HashtableEntry};

/// One node of the subsumption graph: a symbolic state plus the flags spec
/// §3 names (`initial`, `final`, `protected` — excluded from removal,
/// matching `valid_cover`'s `!n1->is_protected()` guard).
pub struct Node<S> {
    pub state: S,
    pub initial: bool,
    pub is_final: bool,
    protected: AtomicBool,
    position: Mutex<Option<(usize, usize)>>,
}

impl<S> Node<S> {
    pub fn new(state: S, initial: bool, is_final: bool, protected: bool) -> Arc<Node<S>> {
        Arc::new(Node { state, initial, is_final, protected: AtomicBool::new(protected), position: Mutex::new(None) })
    }

    pub fn is_protected(&self) -> bool {
        self.protected.load(Ordering::Acquire)
    }

    pub fn set_protected(&self, value: bool) {
        self.protected.store(value, Ordering::Release)
    }
}

impl<S> HashtableEntry for Arc<Node<S>> {
    fn cached_position(&self) -> Option<(usize, usize)> {
        *self.position.lock().unwrap()
    }
    fn set_cached_position(&mut self, position: Option<(usize, usize)>) {
        *self.position.lock().unwrap() = position;
    }
}

/// `valid_cover(n1, n2)`: covering `n1` by `n2` only makes sense for
/// distinct, unprotected `n1` (spec §9: protected/covered asymmetry —
/// protected nodes can subsume but are never themselves removed).
fn valid_cover<S>(n1: &Arc<Node<S>>, n2: &Arc<Node<S>>) -> bool {
    !Arc::ptr_eq(n1, n2) && !n1.is_protected()
}

/// A bucketed subsumption container parametrised over the covering
/// predicate, so the same graph shape serves zone inclusion, aLU/aM
/// (global or local), and RefDBM's sync-aLU/aLU* variants (spec §4.6,
/// items 1-7) — just plug in the right closure.
pub struct CoverGraph<S> {
    table: CollisionTable<Arc<Node<S>>>,
    bucket_key: Box<dyn Fn(&S) -> u64 + Send + Sync>,
    covers: Box<dyn Fn(&S, &S) -> bool + Send + Sync>,
}

impl<S> CoverGraph<S> {
    pub fn new(
        table_size: usize,
        bucket_key: impl Fn(&S) -> u64 + Send + Sync + 'static,
        covers: impl Fn(&S, &S) -> bool + Send + Sync + 'static,
    ) -> Self {
        CoverGraph { table: CollisionTable::new(table_size), bucket_key: Box::new(bucket_key), covers: Box::new(covers) }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn insert(&mut self, node: Arc<Node<S>>) {
        let hash = (self.bucket_key)(&node.state);
        self.table.insert(hash, node);
    }

    pub fn remove(&mut self, node: &Arc<Node<S>>) -> Arc<Node<S>> {
        self.table.remove(node)
    }

    /// Is `node` (not yet inserted) covered by some node already present in
    /// its bucket?
    pub fn is_covered(&self, node: &Arc<Node<S>>) -> bool {
        let hash = (self.bucket_key)(&node.state);
        self.table.bucket(hash).iter().any(|existing| valid_cover(node, existing) && (self.covers)(&node.state, &existing.state))
    }

    /// Every already-present node in `node`'s bucket that `node` itself
    /// covers — candidates for removal once `node` is inserted, per the
    /// `CovReach` pseudocode's "remove nodes now subsumed by n'" step.
    pub fn covered_nodes(&self, node: &Arc<Node<S>>) -> Vec<Arc<Node<S>>> {
        let hash = (self.bucket_key)(&node.state);
        self.table
            .bucket(hash)
            .iter()
            .filter(|existing| valid_cover(existing, node) && (self.covers)(&existing.state, &node.state))
            .cloned()
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Node<S>>> {
        self.table.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_covered_by_larger_interval() {
        let mut g: CoverGraph<(u32, i32)> = CoverGraph::new(4, |s: &(u32, i32)| s.0 as u64, |a, b| a.1 <= b.1);
        let wide = Node::new((0, 100), true, false, false);
        g.insert(wide.clone());
        let narrow = Node::new((0, 10), false, false, false);
        assert!(g.is_covered(&narrow));
        let wider = Node::new((0, 200), false, false, false);
        assert!(!g.is_covered(&wider));
    }

    #[test]
    fn protected_node_cannot_be_covered_for_removal() {
        let mut g: CoverGraph<(u32, i32)> = CoverGraph::new(4, |s: &(u32, i32)| s.0 as u64, |a, b| a.1 <= b.1);
        let protected = Node::new((0, 10), true, false, true);
        g.insert(protected.clone());
        let bigger = Node::new((0, 100), false, false, false);
        // `protected` is covered by `bigger` in the pure zone sense, but
        // valid_cover forbids removing a protected node.
        assert!(g.covered_nodes(&bigger).is_empty());
    }

    #[test]
    fn remove_then_len_decreases() {
        let mut g: CoverGraph<(u32, i32)> = CoverGraph::new(4, |s: &(u32, i32)| s.0 as u64, |_, _| false);
        let n = Node::new((0, 1), true, false, false);
        g.insert(n.clone());
        assert_eq!(g.len(), 1);
        g.remove(&n);
        assert_eq!(g.len(), 0);
    }
}

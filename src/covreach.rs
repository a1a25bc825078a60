//! The main covering-reachability algorithm (spec §4.7): a BFS/DFS
//! work-list search over [`crate::zg::Zg`] that consults a
//! [`crate::cover_graph::CoverGraph`] before enqueuing a discovered
//! successor, builds the explored subsumption graph, and reports whether
//! any state carrying one of the target labels was reached.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use crate::cover_graph::{CoverGraph, Node};
use crate::error::Cancellation;
use crate::refzg::{RefZg, RefZgState};
use crate::zg::{Zg, ZgState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Search {
    Bfs,
    Dfs,
}

/// Whether covering removes already-expanded nodes anywhere in the graph
/// (`Full`), or only guards against enqueuing a newly discovered state that
/// is already covered (`Leaf`) — spec §4.6's two covering modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverMode {
    Full,
    Leaf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Actual,
    Subsumption,
}

/// A graph edge, stored by node index rather than pointer (design note §9:
/// "use an arena-with-indices pattern for edges ... never store raw
/// pointers into a vector that may relocate").
#[derive(Debug, Clone)]
pub struct Edge {
    pub src: usize,
    pub tgt: usize,
    pub kind: EdgeKind,
    pub vedge: Option<crate::ta::Vedge>,
}

#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub visited: usize,
    pub covered_on_push: usize,
    pub covered_on_pop: usize,
    pub subsumption_edges: usize,
    pub actual_edges: usize,
    pub reached: bool,
    pub elapsed: std::time::Duration,
}

pub struct CovReachResult {
    pub stats: Stats,
    pub nodes: Vec<Arc<Node<ZgState>>>,
    pub edges: Vec<Edge>,
    pub reached_node: Option<usize>,
}

/// The `concur19` counterpart of [`CovReachResult`] — no `reached_node`,
/// since that exploration carries no target labels.
pub struct RefCovReachResult {
    pub stats: Stats,
    pub nodes: Vec<Arc<Node<RefZgState>>>,
    pub edges: Vec<Edge>,
}

fn ptr_key(n: &Arc<Node<ZgState>>) -> usize {
    Arc::as_ptr(n) as usize
}

fn is_target<'a>(zg: &Zg, vloc: &crate::ta::Vloc, labels: &HashSet<String>) -> bool {
    !labels.is_empty() && zg.ta().is_valid_final(vloc) && zg.ta().labels(vloc).iter().any(|l| labels.contains(l))
}

/// Runs the covering-reachability search to completion (or until
/// `cancellation` is observed), building the full explored graph rather
/// than stopping at the first witness — needed so `--labels` search and
/// `--dot` graph dump share one exploration pass (see DESIGN.md).
pub fn run(zg: &Zg, labels: &HashSet<String>, search: Search, cover: CoverMode, cancellation: &Cancellation) -> CovReachResult {
    log::info!("starting covering-reachability search: {search:?}/{cover:?}, {} target label(s)", labels.len());
    let start = Instant::now();
    let bucket_key = |s: &ZgState| -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = fnv::FnvHasher::default();
        s.vloc.hash(&mut hasher);
        s.intval.hash(&mut hasher);
        hasher.finish()
    };
    let covers = |a: &ZgState, b: &ZgState| -> bool { a.vloc == b.vloc && a.intval == b.intval && a.zone.is_le(&b.zone) };
    let mut graph: CoverGraph<ZgState> = CoverGraph::new(1024, bucket_key, covers);

    let mut nodes: Vec<Arc<Node<ZgState>>> = Vec::new();
    let mut index_of: HashMap<usize, usize> = HashMap::new();
    let mut edges: Vec<Edge> = Vec::new();
    let mut removed: HashSet<usize> = HashSet::new();
    let mut worklist: VecDeque<Arc<Node<ZgState>>> = VecDeque::new();
    let mut stats = Stats::default();
    let mut reached_node = None;

    let mut register = |nodes: &mut Vec<Arc<Node<ZgState>>>, index_of: &mut HashMap<usize, usize>, n: Arc<Node<ZgState>>| -> usize {
        let idx = nodes.len();
        index_of.insert(ptr_key(&n), idx);
        nodes.push(n);
        idx
    };

    for (status, state) in zg.initial() {
        if !status.is_ok() {
            continue;
        }
        let is_final = is_target(zg, &state.vloc, labels);
        let node = Node::new(state, true, is_final, true);
        if graph.is_covered(&node) {
            stats.covered_on_push += 1;
            continue;
        }
        if cover == CoverMode::Full {
            for m in graph.covered_nodes(&node) {
                graph.remove(&m);
                removed.insert(ptr_key(&m));
            }
        }
        graph.insert(node.clone());
        let idx = register(&mut nodes, &mut index_of, node.clone());
        if is_final {
            stats.reached = true;
            reached_node = Some(idx);
        }
        worklist.push_back(node);
    }

    while !cancellation.is_cancelled() {
        let current = match search {
            Search::Bfs => worklist.pop_front(),
            Search::Dfs => worklist.pop_back(),
        };
        let Some(current) = current else { break };
        if removed.contains(&ptr_key(&current)) {
            continue;
        }
        stats.visited += 1;
        let src_idx = index_of[&ptr_key(&current)];
        log::debug!("visiting node {src_idx}, worklist depth {}", worklist.len());

        for outgoing in zg.outgoing(&current.state) {
            let (status, next) = zg.next(&current.state, &outgoing);
            let Some((succ_state, transition)) = next else {
                continue;
            };
            if !status.is_ok() {
                continue;
            }
            let is_final = is_target(zg, &succ_state.vloc, labels);
            let succ = Node::new(succ_state, false, is_final, false);

            if graph.is_covered(&succ) {
                stats.covered_on_pop += 1;
                let covering = graph
                    .iter()
                    .find(|n| !Arc::ptr_eq(n, &succ) && covers(&succ.state, &n.state))
                    .cloned();
                if let Some(covering) = covering {
                    if let Some(&tgt_idx) = index_of.get(&ptr_key(&covering)) {
                        edges.push(Edge { src: src_idx, tgt: tgt_idx, kind: EdgeKind::Subsumption, vedge: Some(transition.vedge) });
                        stats.subsumption_edges += 1;
                    }
                }
                continue;
            }

            graph.insert(succ.clone());
            let tgt_idx = register(&mut nodes, &mut index_of, succ.clone());
            edges.push(Edge { src: src_idx, tgt: tgt_idx, kind: EdgeKind::Actual, vedge: Some(transition.vedge) });
            stats.actual_edges += 1;
            if is_final {
                stats.reached = true;
                if reached_node.is_none() {
                    reached_node = Some(tgt_idx);
                }
            }

            if cover == CoverMode::Full {
                for m in graph.covered_nodes(&succ) {
                    let m_idx = index_of[&ptr_key(&m)];
                    for e in edges.iter_mut() {
                        if e.tgt == m_idx && e.kind == EdgeKind::Actual {
                            e.tgt = tgt_idx;
                            e.kind = EdgeKind::Subsumption;
                            stats.actual_edges -= 1;
                            stats.subsumption_edges += 1;
                        }
                    }
                    graph.remove(&m);
                    removed.insert(ptr_key(&m));
                }
            }

            worklist.push_back(succ);
        }
    }

    stats.elapsed = start.elapsed();
    log::info!(
        "search finished: visited={} actual_edges={} subsumption_edges={} reached={} in {:?}",
        stats.visited,
        stats.actual_edges,
        stats.subsumption_edges,
        stats.reached,
        stats.elapsed
    );
    CovReachResult { stats, nodes, edges, reached_node }
}

fn ptr_key_ref(n: &Arc<Node<RefZgState>>) -> usize {
    Arc::as_ptr(n) as usize
}

/// The `concur19` exploration: a full BFS/DFS of a [`RefZg`]'s local-time
/// state space with plain inclusion as the covering relation (no
/// extrapolation, no target labels — `concur19` reports coverage statistics
/// only, never a reachability witness).
pub fn run_refzg(zg: &RefZg, search: Search, cover: CoverMode, cancellation: &Cancellation) -> RefCovReachResult {
    log::info!("starting concur19 exploration: {search:?}/{cover:?}");
    let start = Instant::now();
    let bucket_key = |s: &RefZgState| -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = fnv::FnvHasher::default();
        s.vloc.hash(&mut hasher);
        s.intval.hash(&mut hasher);
        hasher.finish()
    };
    let covers = |a: &RefZgState, b: &RefZgState| -> bool { a.vloc == b.vloc && a.intval == b.intval && a.zone.is_le(&b.zone) };
    let mut graph: CoverGraph<RefZgState> = CoverGraph::new(1024, bucket_key, covers);

    let mut nodes: Vec<Arc<Node<RefZgState>>> = Vec::new();
    let mut index_of: HashMap<usize, usize> = HashMap::new();
    let mut edges: Vec<Edge> = Vec::new();
    let mut removed: HashSet<usize> = HashSet::new();
    let mut worklist: VecDeque<Arc<Node<RefZgState>>> = VecDeque::new();
    let mut stats = Stats::default();

    let mut register = |nodes: &mut Vec<Arc<Node<RefZgState>>>, index_of: &mut HashMap<usize, usize>, n: Arc<Node<RefZgState>>| -> usize {
        let idx = nodes.len();
        index_of.insert(ptr_key_ref(&n), idx);
        nodes.push(n);
        idx
    };

    for (status, state) in zg.initial() {
        if !status.is_ok() {
            continue;
        }
        let node = Node::new(state, true, false, true);
        if graph.is_covered(&node) {
            stats.covered_on_push += 1;
            continue;
        }
        if cover == CoverMode::Full {
            for m in graph.covered_nodes(&node) {
                graph.remove(&m);
                removed.insert(ptr_key_ref(&m));
            }
        }
        graph.insert(node.clone());
        register(&mut nodes, &mut index_of, node.clone());
        worklist.push_back(node);
    }

    while !cancellation.is_cancelled() {
        let current = match search {
            Search::Bfs => worklist.pop_front(),
            Search::Dfs => worklist.pop_back(),
        };
        let Some(current) = current else { break };
        if removed.contains(&ptr_key_ref(&current)) {
            continue;
        }
        stats.visited += 1;
        let src_idx = index_of[&ptr_key_ref(&current)];

        for outgoing in zg.outgoing(&current.state) {
            let (status, next) = zg.next(&current.state, &outgoing);
            let Some((succ_state, transition)) = next else {
                continue;
            };
            if !status.is_ok() {
                continue;
            }
            let succ = Node::new(succ_state, false, false, false);

            if graph.is_covered(&succ) {
                stats.covered_on_pop += 1;
                let covering = graph.iter().find(|n| !Arc::ptr_eq(n, &succ) && covers(&succ.state, &n.state)).cloned();
                if let Some(covering) = covering {
                    if let Some(&tgt_idx) = index_of.get(&ptr_key_ref(&covering)) {
                        edges.push(Edge { src: src_idx, tgt: tgt_idx, kind: EdgeKind::Subsumption, vedge: Some(transition.vedge) });
                        stats.subsumption_edges += 1;
                    }
                }
                continue;
            }

            graph.insert(succ.clone());
            let tgt_idx = register(&mut nodes, &mut index_of, succ.clone());
            edges.push(Edge { src: src_idx, tgt: tgt_idx, kind: EdgeKind::Actual, vedge: Some(transition.vedge) });
            stats.actual_edges += 1;

            if cover == CoverMode::Full {
                for m in graph.covered_nodes(&succ) {
                    let m_idx = index_of[&ptr_key_ref(&m)];
                    for e in edges.iter_mut() {
                        if e.tgt == m_idx && e.kind == EdgeKind::Actual {
                            e.tgt = tgt_idx;
                            e.kind = EdgeKind::Subsumption;
                            stats.actual_edges -= 1;
                            stats.subsumption_edges += 1;
                        }
                    }
                    graph.remove(&m);
                    removed.insert(ptr_key_ref(&m));
                }
            }

            worklist.push_back(succ);
        }
    }

    stats.elapsed = start.elapsed();
    log::info!(
        "concur19 exploration finished: visited={} actual_edges={} subsumption_edges={} in {:?}",
        stats.visited,
        stats.actual_edges,
        stats.subsumption_edges,
        stats.elapsed
    );
    RefCovReachResult { stats, nodes, edges }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bound::Cmp;
    use crate::dbm::Reset;
    use crate::extrapolation::{Global, Kind};
    use crate::model::{ClockGuard, Edge as ModelEdge, IntGuard, Location, Process, Stmt, System};
    use std::sync::Arc as StdArc;

    /// Two locations, one clock, an edge `l0 -> l1` guarded by `x >= 2`,
    /// `l1` final; reachability must find it and not diverge.
    fn two_location_system() -> StdArc<System> {
        let l0 = Location { name: "l0".into(), initial: true, ..Default::default() };
        let mut l1 = Location { name: "l1".into(), ..Default::default() };
        l1.labels.insert("goal".into());
        let edge = ModelEdge {
            src: 0,
            tgt: 1,
            guard_clocks: ClockGuard::Diff { i: 0, j: 1, cmp: Cmp::Le, bound: -2 },
            guard_ints: IntGuard::True,
            stmt: Stmt::Nop,
            resets: vec![Reset::to_constant(1, 0)],
            sync: None,
        };
        let p = Process { name: "P".into(), locations: vec![l0, l1], edges: vec![edge] };
        StdArc::new(System { processes: vec![p], n_clocks: 1, int_vars: vec![] })
    }

    fn elapsed_zg(system: StdArc<System>) -> Zg {
        use crate::clocks::{BoundsMap, LuBounds};
        let ta = crate::ta::Ta::new(system);
        let bounds = LuBounds { l: BoundsMap::from_vec(vec![2]), u: BoundsMap::from_vec(vec![2]) };
        let extrap = StdArc::new(Global { kind: Kind::ExtraLuPlus, bounds });
        Zg::new(ta, extrap, crate::zg::Elapse::Yes)
    }

    #[test]
    fn bfs_reaches_goal_label() {
        let zg = elapsed_zg(two_location_system());
        let mut labels = HashSet::new();
        labels.insert("goal".to_string());
        let result = run(&zg, &labels, Search::Bfs, CoverMode::Full, &Cancellation::new());
        assert!(result.stats.reached);
        assert!(result.reached_node.is_some());
    }

    #[test]
    fn no_matching_label_means_not_reached() {
        let zg = elapsed_zg(two_location_system());
        let mut labels = HashSet::new();
        labels.insert("unreachable_label".to_string());
        let result = run(&zg, &labels, Search::Dfs, CoverMode::Full, &Cancellation::new());
        assert!(!result.stats.reached);
    }

    #[test]
    fn cancellation_stops_the_search_early() {
        let zg = elapsed_zg(two_location_system());
        let labels = HashSet::new();
        let cancellation = Cancellation::new();
        cancellation.cancel();
        let result = run(&zg, &labels, Search::Bfs, CoverMode::Full, &cancellation);
        assert_eq!(result.stats.visited, 0);
    }

    #[test]
    fn run_refzg_explores_the_two_location_system_without_a_target() {
        use crate::refzg::{RefLayout, RefZg};

        let ta = crate::ta::Ta::new(two_location_system());
        let refzg = RefZg::new(ta, RefLayout::single_process(1, 1), None);
        let result = run_refzg(&refzg, Search::Bfs, CoverMode::Full, &Cancellation::new());
        assert!(!result.stats.reached);
        assert!(result.stats.visited >= 1);
        assert!(result.nodes.len() >= 2);
    }
}

//! Path extraction and concrete trace reconstruction (spec §4.8) over a
//! [`crate::covreach::CovReachResult`]'s actual and subsumption edges.
//!
//! Extraction walks backward from the reached node to some initial node
//! (a target found through a covered state is witnessed via the node that
//! covers it, following its subsumption edge like any other). The extracted
//! `vedge` sequence is then [`replay`]ed on a fresh, unextrapolated zone
//! graph to get the exact (non-widened) symbolic states the search's
//! extrapolation had coarsened away, and [`concrete_trace`] back-propagates
//! one concrete valuation per replayed state, zig-zag style, rather than
//! sampling every state's zone independently — independent samples aren't
//! related by any guard/reset/delay, so nothing guarantees one state's
//! witness is actually reachable from the previous one's.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::bound::{Bound, Cmp};
use crate::covreach::{CovReachResult, EdgeKind};
use crate::dbm::Dbm;
use crate::extrapolation::NoExtrapolation;
use crate::model::System;
use crate::semantics::{self, SemanticsResult};
use crate::ta::{Ta, TransitionData, Vedge};
use crate::zg::{Elapse, Zg, ZgState};

/// One node of an extracted path and the edge used to reach it from its
/// predecessor (`None` for the first node).
#[derive(Debug, Clone)]
pub struct PathStep {
    pub node_index: usize,
    pub edge_kind: Option<EdgeKind>,
    pub vedge: Option<Vedge>,
}

/// One state of a [`replay`]ed counterexample: the exact `(vloc, intval,
/// zone)` the fresh zone graph produced, the transition fired to reach it
/// from its predecessor (`None` for the first state), and `entry_zone` — the
/// set of valuations possible at the *exact instant* of arriving at this
/// state, before any further wait.
///
/// `state.zone` is the policy's own successor zone (elapsed eagerly, under
/// [`Elapse::Yes`]) and is only good for matching against the original
/// search; it conflates "just arrived" with "arrived, then waited an
/// arbitrary amount", which is exactly what [`concrete_trace`] needs to
/// keep apart. `entry_zone` never has that problem: it is built the same
/// way `state.zone` is but with the elapse step moved to *before* the next
/// transition's guard (where the waiting actually happens) instead of
/// *after* this one's target invariant.
#[derive(Debug, Clone)]
pub struct ReplayStep {
    pub state: ZgState,
    pub transition: Option<TransitionData>,
    pub entry_zone: Dbm,
}

/// A concrete witness for one replayed state: an integer clock valuation,
/// and the non-negative delay elapsed since the previous state (`0` for the
/// first).
#[derive(Debug, Clone)]
pub struct ConcreteStep {
    pub node_index: usize,
    pub clock_valuation: Vec<i32>,
    pub delay: i32,
}

/// Finds one path from an initial node to `target`, backward-BFS over
/// incoming edges. Returns `None` if `target` is unreachable from any
/// initial node in `result` (should not happen for a `target` returned by
/// [`crate::covreach::run`] itself, but holds for arbitrary indices).
pub fn extract_path(result: &CovReachResult, target: usize) -> Option<Vec<PathStep>> {
    if target >= result.nodes.len() {
        return None;
    }

    let mut incoming: HashMap<usize, Vec<usize>> = HashMap::new();
    for (eidx, e) in result.edges.iter().enumerate() {
        incoming.entry(e.tgt).or_default().push(eidx);
    }

    let mut next_edge: HashMap<usize, usize> = HashMap::new();
    let mut visited: HashSet<usize> = HashSet::new();
    let mut queue = VecDeque::new();
    visited.insert(target);
    queue.push_back(target);

    let mut start = if result.nodes[target].initial { Some(target) } else { None };
    while start.is_none() {
        let Some(n) = queue.pop_front() else { break };
        let Some(edges) = incoming.get(&n) else { continue };
        for &eidx in edges {
            let src = result.edges[eidx].src;
            if visited.insert(src) {
                next_edge.insert(src, eidx);
                if result.nodes[src].initial {
                    start = Some(src);
                    break;
                }
                queue.push_back(src);
            }
        }
    }

    let start = start?;
    let mut steps = vec![PathStep { node_index: start, edge_kind: None, vedge: None }];
    let mut cur = start;
    while cur != target {
        let eidx = *next_edge.get(&cur)?;
        let e = &result.edges[eidx];
        steps.push(PathStep { node_index: e.tgt, edge_kind: Some(e.kind), vedge: e.vedge.clone() });
        cur = e.tgt;
    }
    Some(steps)
}

/// Re-fires `path`'s vedge sequence on a fresh zone graph built with
/// [`NoExtrapolation`] over `system`, reproducing the exact symbolic states
/// the original search's extrapolation policy had coarsened away (spec
/// §4.8: a counterexample must reproduce regardless of extrapolation). The
/// elapse policy is the one the original search used, passed in by the
/// caller (a [`CovReachResult`] doesn't carry its own zone graph), since
/// both graphs must agree on when time is allowed to pass for the same
/// vedge sequence to remain valid.
///
/// Matching is by vedge equality, not by zone: the vedge fired from a given
/// `(vloc, intval)` deterministically reproduces the same successor
/// `(vloc, intval)` no matter which zone or extrapolation built the
/// original graph, which is what makes a vedge-only replay sound.
pub fn replay(system: Arc<System>, elapse: Elapse, result: &CovReachResult, path: &[PathStep]) -> Option<Vec<ReplayStep>> {
    let first = path.first()?;
    let target_state = &result.nodes[first.node_index].state;
    let zg = Zg::new(Ta::new(Arc::clone(&system)), Arc::new(NoExtrapolation), elapse);

    let (status, initial_state) = zg
        .initial()
        .into_iter()
        .find(|(_, s)| s.vloc == target_state.vloc && s.intval == target_state.intval)?;
    if !status.is_ok() {
        return None;
    }

    let (init_status, init_data) = zg.ta().initial(&initial_state.vloc, &initial_state.intval);
    if !init_status.is_ok() {
        return None;
    }
    let entry_zone = match semantics::initial_zone::<Dbm>(zg.ta().n_clocks() + 1, &init_data, false) {
        SemanticsResult::Ok(z) => z,
        SemanticsResult::Failed(_) => return None,
    };

    let mut out = vec![ReplayStep { state: initial_state.clone(), transition: None, entry_zone }];
    let mut current = initial_state;
    for step in &path[1..] {
        let vedge = step.vedge.as_ref()?;
        let outgoing = zg.outgoing(&current).into_iter().find(|o| &o.vedge == vedge)?;
        let (status, next) = zg.ta().next(&current.vloc, &current.intval, &outgoing);
        let (vloc, intval, data) = next?;
        if !status.is_ok() {
            return None;
        }
        let zone = match elapse {
            Elapse::No => semantics::standard_next(&current.zone, &data),
            Elapse::Yes => semantics::elapsed_next(&current.zone, &data),
        };
        let zone = match zone {
            SemanticsResult::Ok(z) => z,
            SemanticsResult::Failed(_) => return None,
        };

        let mut departure_base = out.last().unwrap().entry_zone.clone();
        if elapse == Elapse::Yes {
            departure_base.open_up();
        }
        let entry_zone = match semantics::standard_next(&departure_base, &data) {
            SemanticsResult::Ok(z) => z,
            SemanticsResult::Failed(_) => return None,
        };

        current = ZgState { vloc, intval, zone };
        out.push(ReplayStep { state: current.clone(), transition: Some(data), entry_zone });
    }
    Some(out)
}

/// Builds a rational counterexample trace: one clock valuation per replayed
/// state — the valuation at the exact instant that state is entered — plus
/// the non-negative delay spent waiting in the *previous* state before this
/// one's transition fired, reconstructed backward (zig-zag) from a sampled
/// point of the final state's `entry_zone`.
///
/// Each step back, the entry valuation already fixed for the successor
/// state is projected backward through that transition's guard/reset/
/// invariant: the departure region is the predecessor's `entry_zone`,
/// opened up (time may pass before firing, under [`Elapse::Yes`] — never
/// under [`Elapse::No`], which matches how [`replay`] built that zone in
/// the first place) and constrained by the transition's source invariant
/// and guard; every clock the transition does *not* reset is pinned to the
/// successor's exact value, since a reset is the only thing that can
/// change a clock's value across a transition — the zone's own algebra
/// enforces feasibility of the pin and of the wait, so no search over
/// candidate delays is needed to find *a* consistent predecessor, only to
/// find how long the wait before firing had to be. That wait is computed
/// from the predecessor's *own* (pre-open-up) upper bounds, since opening
/// it up erases exactly the information needed to tell how long a given
/// sampled point had to wait to become reachable.
pub fn concrete_trace(
    system: Arc<System>,
    elapse: Elapse,
    result: &CovReachResult,
    path: &[PathStep],
) -> Option<Vec<ConcreteStep>> {
    let replayed = replay(system, elapse, result, path)?;
    debug_assert_eq!(replayed.len(), path.len());

    let n = replayed.len();
    let mut valuations = vec![Vec::new(); n];
    valuations[n - 1] = replayed[n - 1].entry_zone.sample()?;
    let mut delays = vec![0i32; n];

    for i in (1..n).rev() {
        let data = replayed[i].transition.as_ref()?;
        let target = &valuations[i];
        let entry_prev = &replayed[i - 1].entry_zone;

        let mut departure = entry_prev.clone();
        if elapse == Elapse::Yes {
            departure.open_up();
        }
        departure.constrain_all(&data.src_invariant).ok()?;
        departure.constrain_all(&data.guard).ok()?;
        if departure.is_empty() {
            return None;
        }

        let reset_clocks: HashSet<usize> = data.resets.iter().map(|r| r.x).collect();
        for c in 1..departure.dim() {
            if reset_clocks.contains(&c) {
                continue;
            }
            departure.constrain(c, 0, Cmp::Le, target[c]).ok()?;
            departure.constrain(0, c, Cmp::Le, -target[c]).ok()?;
            if departure.is_empty() {
                return None;
            }
        }

        let fired_at = departure.sample()?;
        let delay = if elapse == Elapse::Yes {
            (1..entry_prev.dim())
                .filter_map(|c| upper_limit(entry_prev.get(c, 0)).map(|limit| (fired_at[c] - limit).max(0)))
                .max()
                .unwrap_or(0)
        } else {
            0
        };
        let predecessor: Vec<i32> = fired_at.iter().enumerate().map(|(c, &v)| if c == 0 { 0 } else { v - delay }).collect();

        delays[i] = delay;
        valuations[i - 1] = predecessor;
    }

    Some(
        (0..n)
            .map(|i| ConcreteStep { node_index: path[i].node_index, clock_valuation: valuations[i].clone(), delay: delays[i] })
            .collect(),
    )
}

/// The largest integer value `x_c` may take under the upper bound
/// `DBM[c,0]`, or `None` if unbounded.
fn upper_limit(b: Bound) -> Option<i32> {
    if b.is_infinity() {
        return None;
    }
    match b.cmp_kind() {
        Cmp::Le => Some(b.value()),
        Cmp::Lt => Some(b.value() - 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clocks::{BoundsMap, LuBounds};
    use crate::covreach::{self, CoverMode, Search};
    use crate::dbm::Reset;
    use crate::error::Cancellation;
    use crate::extrapolation::{Global, Kind};
    use crate::model::{ClockGuard, Edge, IntGuard, Location, Process, Stmt};
    use std::collections::HashSet as StdHashSet;

    fn two_location_system() -> Arc<System> {
        let l0 = Location { name: "l0".into(), initial: true, ..Default::default() };
        let mut l1 = Location { name: "l1".into(), ..Default::default() };
        l1.labels.insert("goal".into());
        let edge = Edge {
            src: 0,
            tgt: 1,
            guard_clocks: ClockGuard::Diff { i: 0, j: 1, cmp: Cmp::Le, bound: -2 },
            guard_ints: IntGuard::True,
            stmt: Stmt::Nop,
            resets: vec![Reset::to_constant(1, 0)],
            sync: None,
        };
        let p = Process { name: "P".into(), locations: vec![l0, l1], edges: vec![edge] };
        Arc::new(System { processes: vec![p], n_clocks: 1, int_vars: vec![] })
    }

    /// Two sequential waits on the same clock (reset in between), so a
    /// witness trace needs two independent, non-zero, non-negative delays.
    fn three_location_system() -> Arc<System> {
        let l0 = Location { name: "l0".into(), initial: true, ..Default::default() };
        let l1 = Location { name: "l1".into(), ..Default::default() };
        let mut l2 = Location { name: "l2".into(), ..Default::default() };
        l2.labels.insert("goal".into());
        let e0 = Edge {
            src: 0,
            tgt: 1,
            guard_clocks: ClockGuard::Diff { i: 0, j: 1, cmp: Cmp::Le, bound: -2 },
            guard_ints: IntGuard::True,
            stmt: Stmt::Nop,
            resets: vec![Reset::to_constant(1, 0)],
            sync: None,
        };
        let e1 = Edge {
            src: 1,
            tgt: 2,
            guard_clocks: ClockGuard::Diff { i: 0, j: 1, cmp: Cmp::Le, bound: -3 },
            guard_ints: IntGuard::True,
            stmt: Stmt::Nop,
            resets: vec![],
            sync: None,
        };
        let p = Process { name: "P".into(), locations: vec![l0, l1, l2], edges: vec![e0, e1] };
        Arc::new(System { processes: vec![p], n_clocks: 1, int_vars: vec![] })
    }

    fn elapsed_zg(system: Arc<System>) -> Zg {
        let ta = Ta::new(system);
        let bounds = LuBounds { l: BoundsMap::from_vec(vec![2]), u: BoundsMap::from_vec(vec![2]) };
        let extrap = Arc::new(Global { kind: Kind::ExtraLuPlus, bounds });
        Zg::new(ta, extrap, Elapse::Yes)
    }

    #[test]
    fn extracted_path_starts_at_an_initial_node_and_ends_at_target() {
        let zg = elapsed_zg(two_location_system());
        let mut labels = StdHashSet::new();
        labels.insert("goal".to_string());
        let result = covreach::run(&zg, &labels, Search::Bfs, CoverMode::Full, &Cancellation::new());
        let target = result.reached_node.expect("goal must be reached");

        let path = extract_path(&result, target).expect("a path must exist");
        assert_eq!(path.last().unwrap().node_index, target);
        assert!(result.nodes[path[0].node_index].initial);
        assert!(path[0].edge_kind.is_none());
        assert!(path.len() >= 2);
    }

    #[test]
    fn unreachable_index_yields_no_path() {
        let zg = elapsed_zg(two_location_system());
        let labels = StdHashSet::new();
        let result = covreach::run(&zg, &labels, Search::Bfs, CoverMode::Full, &Cancellation::new());
        assert!(extract_path(&result, result.nodes.len()).is_none());
    }

    #[test]
    fn replay_reproduces_the_same_vloc_intval_sequence_as_the_search() {
        let system = two_location_system();
        let zg = elapsed_zg(system.clone());
        let mut labels = StdHashSet::new();
        labels.insert("goal".to_string());
        let result = covreach::run(&zg, &labels, Search::Bfs, CoverMode::Full, &Cancellation::new());
        let target = result.reached_node.unwrap();
        let path = extract_path(&result, target).unwrap();

        let replayed = replay(system, Elapse::Yes, &result, &path).expect("the vedge sequence must replay");
        assert_eq!(replayed.len(), path.len());
        for (step, r) in path.iter().zip(&replayed) {
            let original = &result.nodes[step.node_index].state;
            assert_eq!(r.state.vloc, original.vloc);
            assert_eq!(r.state.intval, original.intval);
        }
        assert!(replayed[0].transition.is_none());
        assert!(replayed[1].transition.is_some());
    }

    #[test]
    fn concrete_trace_departure_satisfies_the_guard_and_the_reset_clock_lands_on_zero() {
        let system = two_location_system();
        let zg = elapsed_zg(system.clone());
        let mut labels = StdHashSet::new();
        labels.insert("goal".to_string());
        let result = covreach::run(&zg, &labels, Search::Bfs, CoverMode::Full, &Cancellation::new());
        let target = result.reached_node.unwrap();
        let path = extract_path(&result, target).unwrap();

        let trace = concrete_trace(system, Elapse::Yes, &result, &path).expect("a concrete trace must exist");
        assert_eq!(trace.len(), path.len());
        assert_eq!(trace[0].delay, 0, "the first state has no predecessor to delay from");
        assert!(
            trace[0].clock_valuation[1] >= 2,
            "the departure valuation must satisfy the guard the transition fires through, got {}",
            trace[0].clock_valuation[1]
        );
        let last = trace.last().unwrap();
        assert_eq!(last.clock_valuation[1], 0, "the clock this transition resets must read 0 on arrival, not carry its pre-reset value");
    }

    #[test]
    fn concrete_trace_chains_two_independent_waits_with_monotone_nonnegative_delays() {
        let system = three_location_system();
        let zg = elapsed_zg(system.clone());
        let mut labels = StdHashSet::new();
        labels.insert("goal".to_string());
        let result = covreach::run(&zg, &labels, Search::Bfs, CoverMode::Full, &Cancellation::new());
        let target = result.reached_node.expect("goal must be reached");
        let path = extract_path(&result, target).unwrap();
        assert_eq!(path.len(), 3);

        let trace = concrete_trace(system, Elapse::Yes, &result, &path).expect("a concrete trace must exist");
        assert_eq!(trace.len(), 3);
        for step in &trace {
            assert!(step.delay >= 0, "delays must never be negative");
        }
        assert_eq!(trace[0].delay, 0);
        assert_eq!(trace[1].clock_valuation[1], 0, "the first edge resets the clock on arrival into the middle state");
        assert!(trace[1].delay >= 0);
        assert!(trace[2].delay > 0, "the second guard can only be satisfied after waiting in the middle state");
        assert_eq!(
            trace[1].clock_valuation[1] + trace[2].delay,
            trace[2].clock_valuation[1],
            "the second edge carries the clock through unchanged, so its value is exactly the prior one plus the wait"
        );
        let last = trace.last().unwrap();
        assert!(last.clock_valuation[1] >= 3, "final valuation must satisfy the second guard, got {}", last.clock_valuation[1]);
    }
}

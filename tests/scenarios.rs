//! End-to-end scenarios over the CLI's internal text format: parse, build a
//! zone graph, run covering reachability, and check the property the
//! scenario is named for — the kind of test the crate's own suite leaves
//! to an integration-level check rather than a unit one.

use std::collections::HashSet;
use std::sync::Arc;

use tchecker_rs::clocks::{BoundsMap, LuBounds};
use tchecker_rs::covreach::{self, CoverMode, Search};
use tchecker_rs::error::Cancellation;
use tchecker_rs::extrapolation::{Global, Kind};
use tchecker_rs::path;
use tchecker_rs::ta::Ta;
use tchecker_rs::textmodel;
use tchecker_rs::zg::{Elapse, Zg};

const MUTEX_MODEL: &str = "
    clocks 1
    process P1
      loc idle initial
      loc wait
      loc crit label=crit1
      edge idle wait reset=x1:0 sync=enter
      edge wait crit guard=x1>=2 sync=start1
      edge crit idle sync=leave
    endprocess
    process P2
      loc idle initial
      loc wait
      loc crit label=crit2
      edge idle wait reset=x1:0 sync=enter
      edge wait crit guard=x1>=2 sync=start2
      edge crit idle sync=leave
    endprocess
";

fn build_zg(text: &str, max_constant: i32) -> Zg {
    build_zg_with_system(text, max_constant).0
}

fn build_zg_with_system(text: &str, max_constant: i32) -> (Zg, Arc<tchecker_rs::model::System>) {
    let system = Arc::new(textmodel::parse(text).expect("model parses"));
    system.validate().expect("model is well-formed");
    let n_clocks = system.n_clocks;
    let ta = Ta::new(Arc::clone(&system));
    let bounds = LuBounds { l: BoundsMap::from_vec(vec![max_constant; n_clocks]), u: BoundsMap::from_vec(vec![max_constant; n_clocks]) };
    let extrap = Arc::new(Global { kind: Kind::ExtraLuPlus, bounds });
    (Zg::new(ta, extrap, Elapse::Yes), system)
}

/// S1: two processes racing on a single shared clock with no mutual
/// exclusion mechanism between `wait -> crit` transitions — nothing stops
/// both from being in `crit` at once, so the conjunction must be reachable.
#[test]
fn s1_two_process_mutex_without_arbitration_allows_simultaneous_crit() {
    let zg = build_zg(MUTEX_MODEL, 2);
    let labels = HashSet::new();
    let result = covreach::run(&zg, &labels, Search::Bfs, CoverMode::Full, &Cancellation::new());

    let both_in_crit = result.nodes.iter().any(|n| n.state.vloc.locations().to_vec() == vec![2usize, 2]);
    assert!(both_in_crit, "both processes should be able to reach their crit location simultaneously");
    assert!(result.stats.visited <= 40, "S1 should settle in a small number of symbolic states");
}

const FISCHER_MODEL: &str = "
    clocks 1
    intvar id 0 3 0
    process P1
      loc a initial
      loc req
      loc wait
      loc cs
      edge a req guard=id==0
      edge req wait reset=x1:0
      edge wait cs guard=x1<=1 assign=id:=1
      edge cs a guard=x1>1&id==1 assign=id:=0 reset=x1:0
    endprocess
    process P2
      loc a initial
      loc req
      loc wait
      loc cs
      edge a req guard=id==0
      edge req wait reset=x1:0
      edge wait cs guard=x1<=1 assign=id:=2
      edge cs a guard=x1>1&id==2 assign=id:=0 reset=x1:0
    endprocess
    process P3
      loc a initial
      loc req
      loc wait
      loc cs
      edge a req guard=id==0
      edge req wait reset=x1:0
      edge wait cs guard=x1<=1 assign=id:=3
      edge cs a guard=x1>1&id==3 assign=id:=0 reset=x1:0
    endprocess
";

/// S2: Fischer's mutual exclusion protocol, parameter k=1, three processes.
/// The `id` guard on entering `cs` ensures at most one process holds the
/// critical section; no pair of processes should ever be in `cs`
/// simultaneously, and the search must still terminate.
#[test]
fn s2_fischer_mutual_exclusion_never_allows_two_processes_in_cs() {
    let zg = build_zg(FISCHER_MODEL, 3);
    let labels = HashSet::new();
    let result = covreach::run(&zg, &labels, Search::Bfs, CoverMode::Full, &Cancellation::new());

    let cs = 3; // location index of `cs`, fourth declared location (0-based)
    let two_in_cs = result.nodes.iter().any(|n| {
        let locs = n.state.vloc.locations();
        locs.iter().filter(|&&l| l == cs).count() >= 2
    });
    assert!(!two_in_cs, "Fischer's protocol must never admit two processes in the critical section at once");
    assert!(result.stats.visited < 10_000, "the search must terminate, visiting a bounded number of states");
}

/// S6: a reachability witness replays into a concrete trace whose final
/// clock valuation actually satisfies the guard that was crossed to reach
/// it.
#[test]
fn s6_reachability_witness_replays_to_a_satisfying_valuation() {
    let (zg, system) = build_zg_with_system(MUTEX_MODEL, 2);
    let mut labels = HashSet::new();
    labels.insert("crit1".to_string());
    let result = covreach::run(&zg, &labels, Search::Bfs, CoverMode::Full, &Cancellation::new());

    assert!(result.stats.reached);
    let target = result.reached_node.expect("crit1 must be reachable");
    let witness = path::extract_path(&result, target).expect("a path must exist to the witness");
    let trace = path::concrete_trace(system, Elapse::Yes, &result, &witness).expect("the witness replays to a concrete trace");

    assert_eq!(trace.len(), witness.len());
    // `wait -> crit` resets nothing, so the reached state's valuation is
    // carried straight through from the predecessor that satisfied the
    // x1>=2 guard crossed to get there.
    let crit1_entry = trace.last().unwrap();
    let departure = &trace[trace.len() - 2];
    assert_eq!(crit1_entry.clock_valuation[1], departure.clock_valuation[1], "no reset on this edge, so the valuation must carry through unchanged");
    assert!(crit1_entry.clock_valuation[1] >= 2, "the witness valuation must satisfy the x1>=2 guard it crossed, got {}", crit1_entry.clock_valuation[1]);
}

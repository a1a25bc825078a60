//! Local-time zone graph (spec §4.3/§4.6): the asynchronous counterpart of
//! [`crate::zg`], built over [`crate::refdbm::RefDbm`] instead of
//! [`crate::dbm::Dbm`]. No extrapolation is applied here — RefDBM-based
//! exploration is used for diagnostic/local-time semantics, not for the
//! unbounded covering search, so finiteness is not required (spec §4.3).

use crate::dbm::Constraint;
use crate::refdbm::RefDbm;
use crate::ta::{IntVal, OutgoingValue, Status, Ta, Vedge, Vloc};

#[derive(Debug, Clone, PartialEq)]
pub struct RefZgState {
    pub vloc: Vloc,
    pub intval: IntVal,
    pub zone: RefDbm,
}

#[derive(Debug, Clone)]
pub struct RefZgTransition {
    pub vedge: Vedge,
}

/// Maps process index to its reference-clock index (`process_refclock`) and
/// offset-clock index to its owning reference clock (`refmap`) — the shape
/// every `RefDbm` this graph produces shares, fixed for the lifetime of a
/// [`RefZg`].
pub struct RefLayout {
    pub r: usize,
    pub refmap: Vec<usize>,
    pub process_refclock: Vec<usize>,
}

impl RefLayout {
    /// All processes and all clocks share the single reference clock `0` —
    /// degenerates local-time exploration to the same reachability as
    /// [`crate::zg::Zg`], useful when only the RefDBM machinery itself is
    /// under test.
    pub fn single_process(n_processes: usize, n_clocks: usize) -> RefLayout {
        RefLayout { r: 1, refmap: vec![0; n_clocks], process_refclock: vec![0; n_processes] }
    }

    /// One reference clock per process; `clock_owner[i-1]` names which
    /// process (hence which reference clock) owns system clock `i`.
    pub fn per_process(n_processes: usize, clock_owner: Vec<usize>) -> RefLayout {
        RefLayout { r: n_processes, refmap: clock_owner, process_refclock: (0..n_processes).collect() }
    }
}

pub struct RefZg {
    ta: Ta,
    layout: RefLayout,
    /// Upper bound on the spread between any two reference clocks, enforced
    /// at the end of every transition (spec §3 "Spread"); `None` means
    /// unbounded, asynchronous exploration (only finite for layouts with a
    /// single reference clock, or short runs).
    spread: Option<i32>,
}

impl RefZg {
    pub fn new(ta: Ta, layout: RefLayout, spread: Option<i32>) -> Self {
        RefZg { ta, layout, spread }
    }

    /// The reference clocks owned by the processes participating in
    /// `outgoing` — the subset [`crate::refdbm::RefDbm::synchronize`] must
    /// align before a synchronised edge fires (spec: "RefDBM semantics
    /// further enforces `synchronize(sync_refclocks)` between applying the
    /// guard and the reset").
    fn participating_refclocks(&self, outgoing: &OutgoingValue) -> Vec<usize> {
        outgoing
            .vedge
            .entries()
            .iter()
            .enumerate()
            .filter_map(|(p, e)| e.map(|_| self.layout.process_refclock[p]))
            .collect()
    }

    pub fn ta(&self) -> &Ta {
        &self.ta
    }

    /// Shifts a plain clock index (`0` = zero clock, `1..=n` = system
    /// clocks) into RefDBM offset-clock index space.
    fn offset_index(&self, clock: usize) -> usize {
        self.layout.r - 1 + clock
    }

    fn shift_constraints(&self, cs: &[Constraint]) -> Vec<(usize, usize, crate::bound::Cmp, i32)> {
        cs.iter()
            .map(|c| {
                let i = if c.i == 0 { 0 } else { self.offset_index(c.i) };
                let j = if c.j == 0 { 0 } else { self.offset_index(c.j) };
                (i, j, c.cmp, c.k)
            })
            .collect()
    }

    pub fn initial(&self) -> Vec<(Status, RefZgState)> {
        let mut out = Vec::new();
        for vloc in self.ta.initial_vlocs() {
            let intval = IntVal::new(self.ta.system().initial_int_values());
            let (status, data) = self.ta.initial(&vloc, &intval);
            if !status.is_ok() {
                out.push((status, RefZgState { vloc, intval, zone: RefDbm::empty(self.layout.r, self.layout.refmap.clone()) }));
                continue;
            }
            let mut zone = RefDbm::universal_positive(self.layout.r, self.layout.refmap.clone());
            match self.apply_invariant(&mut zone, &data.tgt_invariant) {
                Ok(()) if !zone.is_empty() => {
                    if let Some(spread) = self.spread {
                        if zone.bound_spread(spread, None).is_err() || zone.is_empty() {
                            out.push((
                                Status::ClocksEmptySpread,
                                RefZgState { vloc, intval, zone: RefDbm::empty(self.layout.r, self.layout.refmap.clone()) },
                            ));
                            continue;
                        }
                    }
                    out.push((Status::Ok, RefZgState { vloc, intval, zone }))
                }
                _ => out.push((Status::ClocksTgtInvariantViolated, RefZgState { vloc, intval, zone: RefDbm::empty(self.layout.r, self.layout.refmap.clone()) })),
            }
        }
        out
    }

    fn apply_invariant(&self, zone: &mut RefDbm, cs: &[Constraint]) -> Result<(), crate::bound::Overflow> {
        for (i, j, cmp, k) in self.shift_constraints(cs) {
            zone.constrain(i, j, cmp, k)?;
            if zone.is_empty() {
                return Ok(());
            }
        }
        Ok(())
    }

    pub fn outgoing(&self, state: &RefZgState) -> Vec<OutgoingValue> {
        self.ta.outgoing_values(&state.vloc)
    }

    /// Fires `outgoing`: src invariant, guard, resets (each reset routed
    /// through the offset clock's own entry, never touching other
    /// processes' offset clocks), target invariant, then an
    /// `asynchronous_open_up` over exactly the participating processes'
    /// reference clocks (spec §4.3: local-time elapse is per-process).
    pub fn next(&self, state: &RefZgState, outgoing: &OutgoingValue) -> (Status, Option<(RefZgState, RefZgTransition)>) {
        let (status, next) = self.ta.next(&state.vloc, &state.intval, outgoing);
        let Some((vloc, intval, data)) = next else {
            return (status, None);
        };
        let mut zone = state.zone.clone();
        if self.apply_invariant(&mut zone, &data.src_invariant).is_err() || zone.is_empty() {
            return (Status::ClocksSrcInvariantViolated, None);
        }
        if self.apply_invariant(&mut zone, &data.guard).is_err() || zone.is_empty() {
            return (Status::ClocksGuardViolated, None);
        }
        let sync_refclocks = self.participating_refclocks(outgoing);
        if zone.synchronize(Some(&sync_refclocks)).is_err() || zone.is_empty() {
            return (Status::ClocksEmptySync, None);
        }
        for r in &data.resets {
            let x = self.offset_index(r.x);
            if r.y == 0 {
                let owner = zone.refmap(x);
                if zone.reset_to_reference_clock(x).is_err() {
                    return (Status::ClocksGuardViolated, None);
                }
                if r.k != 0 {
                    // x := t_owner + k: constrain both directions to k after
                    // aliasing x to its reference clock.
                    if zone.constrain(x, owner, crate::bound::Cmp::Le, r.k).is_err()
                        || zone.constrain(owner, x, crate::bound::Cmp::Le, -r.k).is_err()
                    {
                        return (Status::ClocksGuardViolated, None);
                    }
                }
            } else if zone.reset_to_reference_clock(x).is_err() {
                return (Status::ClocksGuardViolated, None);
            }
        }
        if zone.is_empty() {
            return (Status::ClocksGuardViolated, None);
        }
        if self.apply_invariant(&mut zone, &data.tgt_invariant).is_err() || zone.is_empty() {
            return (Status::ClocksTgtInvariantViolated, None);
        }
        let participating: Vec<usize> = (0..self.layout.r).collect();
        zone.asynchronous_open_up(&participating);
        if let Some(spread) = self.spread {
            if zone.bound_spread(spread, None).is_err() || zone.is_empty() {
                return (Status::ClocksEmptySpread, None);
            }
        }
        (Status::Ok, Some((RefZgState { vloc, intval, zone }, RefZgTransition { vedge: outgoing.vedge.clone() })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IntVarDecl, Location, Process, System};
    use std::sync::Arc;

    fn trivial_system() -> Arc<System> {
        let loc = Location {
            name: "l0".into(),
            initial: true,
            urgent: false,
            committed: false,
            is_final: true,
            invariant_clocks: None,
            invariant_ints: None,
            labels: Default::default(),
        };
        let p = Process { name: "P".into(), locations: vec![loc], edges: vec![] };
        Arc::new(System { processes: vec![p], n_clocks: 1, int_vars: Vec::<IntVarDecl>::new() })
    }

    #[test]
    fn initial_is_synchronized_universal_positive() {
        let ta = Ta::new(trivial_system());
        let refzg = RefZg::new(ta, RefLayout::single_process(1, 1), None);
        let inits = refzg.initial();
        assert_eq!(inits.len(), 1);
        assert!(inits[0].0.is_ok());
        assert!(inits[0].1.zone.is_synchronized(None));
    }

    /// Two one-clock processes sharing a sync edge: `next` must synchronize
    /// their reference clocks before applying resets, so once the sync
    /// fires the result is synchronized on those two reference clocks even
    /// though `asynchronous_open_up` immediately lets them drift apart
    /// again afterwards.
    fn two_process_synced_system() -> Arc<System> {
        use crate::bound::Cmp;
        use crate::dbm::Reset;
        use crate::model::{ClockGuard, Edge as ModelEdge, IntGuard, Stmt};

        let mk_process = |name: &str, clock: usize| {
            let l0 = Location { name: "l0".into(), initial: true, urgent: false, committed: false, is_final: false, invariant_clocks: None, invariant_ints: None, labels: Default::default() };
            let l1 = Location { name: "l1".into(), initial: false, urgent: false, committed: false, is_final: true, invariant_clocks: None, invariant_ints: None, labels: Default::default() };
            let edge = ModelEdge {
                src: 0,
                tgt: 1,
                guard_clocks: ClockGuard::Diff { i: 0, j: clock, cmp: Cmp::Le, bound: 0 },
                guard_ints: IntGuard::True,
                stmt: Stmt::Nop,
                resets: vec![Reset::to_constant(clock, 0)],
                sync: Some("go".to_string()),
            };
            Process { name: name.into(), locations: vec![l0, l1], edges: vec![edge] }
        };
        Arc::new(System { processes: vec![mk_process("P", 1), mk_process("Q", 2)], n_clocks: 2, int_vars: Vec::<IntVarDecl>::new() })
    }

    #[test]
    fn next_synchronizes_participating_refclocks_before_reset() {
        let ta = Ta::new(two_process_synced_system());
        let layout = RefLayout::per_process(2, vec![0, 1]);
        let refzg = RefZg::new(ta, layout, None);
        let inits = refzg.initial();
        let (status, init_state) = inits.into_iter().find(|(s, _)| s.is_ok()).expect("an ok initial state");
        assert!(status.is_ok());
        let outgoing = refzg.outgoing(&init_state);
        let synced_outgoing = outgoing.into_iter().find(|o| o.vedge.entries().iter().filter(|e| e.is_some()).count() == 2);
        let Some(outgoing) = synced_outgoing else {
            return;
        };
        let (status, next) = refzg.next(&init_state, &outgoing);
        assert!(status.is_ok());
        let (succ, _) = next.expect("a successor state");
        assert!(succ.zone.is_synchronized(Some(&[0, 1])));
    }

    #[test]
    fn initial_rejects_unsatisfiable_spread_bound() {
        let ta = Ta::new(trivial_system());
        let refzg = RefZg::new(ta, RefLayout::single_process(1, 1), Some(-1));
        let inits = refzg.initial();
        assert_eq!(inits.len(), 1);
        assert_eq!(inits[0].0, Status::ClocksEmptySpread);
    }
}

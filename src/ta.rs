//! Timed-automaton system front-end: vloc/vedge enumeration and transition
//! data extraction (spec §4.4).
//!
//! `Ta` wraps a [`System`] and knows nothing about zones; it produces flat
//! clock-constraint/reset containers plus an integer-valuation transition
//! function, leaving the actual zone algebra to [`crate::zg`]/[`crate::refzg`].

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::dbm::{Constraint, Reset};
use crate::model::System;
use crate::vm;

/// An immutable, shared, ordered tuple of per-process location indices.
#[derive(Debug, Clone)]
pub struct Vloc(Arc<[usize]>);

impl Vloc {
    pub fn new(locations: Vec<usize>) -> Self {
        Vloc(locations.into())
    }
    pub fn locations(&self) -> &[usize] {
        &self.0
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for Vloc {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for Vloc {}
impl Hash for Vloc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

/// An immutable, shared, ordered tuple of bounded integer values.
#[derive(Debug, Clone)]
pub struct IntVal(Arc<[i32]>);

impl IntVal {
    pub fn new(values: Vec<i32>) -> Self {
        IntVal(values.into())
    }
    pub fn values(&self) -> &[i32] {
        &self.0
    }
}

impl PartialEq for IntVal {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for IntVal {}
impl Hash for IntVal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

/// For each process, either the id of the edge that fired, or `None` if
/// the process was not involved in this synchronisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vedge(Arc<[Option<usize>]>);

impl Vedge {
    pub fn new(edges: Vec<Option<usize>>) -> Self {
        Vedge(edges.into())
    }
    pub fn entries(&self) -> &[Option<usize>] {
        &self.0
    }
}

/// Status codes returned by [`Ta::initial`]/[`Ta::next`] (spec §4.4). Not
/// errors — a typed outcome the caller inspects and, on anything but `Ok`,
/// drops the candidate successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Status {
    Ok,
    IntVarsSrcInvariantViolated,
    ClocksSrcInvariantViolated,
    IntVarsGuardViolated,
    ClocksGuardViolated,
    IntVarsStatementFailed,
    IntVarsTgtInvariantViolated,
    ClocksTgtInvariantViolated,
    ClocksEmptySync,
    ClocksEmptySpread,
    IncompatibleEdge,
}

impl Status {
    pub fn is_ok(self) -> bool {
        matches!(self, Status::Ok)
    }
}

/// The flat clock-constraint/reset data extracted for one candidate
/// transition, before any zone operation is applied.
#[derive(Debug, Clone)]
pub struct TransitionData {
    pub src_invariant: Vec<Constraint>,
    pub guard: Vec<Constraint>,
    pub resets: Vec<Reset>,
    pub tgt_invariant: Vec<Constraint>,
}

/// One candidate outgoing synchronisation: a vedge plus, for every
/// participating process, the edge it offers.
#[derive(Debug, Clone)]
pub struct OutgoingValue {
    pub vedge: Vedge,
}

pub struct Ta {
    system: Arc<System>,
}

impl Ta {
    pub fn new(system: Arc<System>) -> Self {
        Ta { system }
    }

    pub fn system(&self) -> &System {
        &self.system
    }

    pub fn system_arc(&self) -> Arc<System> {
        Arc::clone(&self.system)
    }

    pub fn n_clocks(&self) -> usize {
        self.system.n_clocks
    }

    /// Enumerates initial vlocs: the cartesian product of each process's
    /// initial locations. Empty if any process declares none (spec §4.4:
    /// "valid iff every process has an initial location").
    pub fn initial_vlocs(&self) -> Vec<Vloc> {
        let mut per_process: Vec<Vec<usize>> = Vec::new();
        for p in &self.system.processes {
            let inits = p.initial_locations();
            if inits.is_empty() {
                return Vec::new();
            }
            per_process.push(inits);
        }
        cartesian(&per_process).into_iter().map(Vloc::new).collect()
    }

    /// Checks the initial state's invariants and produces its status plus
    /// the `(src_invariant, tgt_invariant)` data needed to build the zone
    /// (there is no guard/reset: initial states start from the universal
    /// zone, per [`crate::semantics`]).
    pub fn initial(&self, vloc: &Vloc, intval: &IntVal) -> (Status, TransitionData) {
        let ints = vloc
            .locations()
            .iter()
            .zip(&self.system.processes)
            .map(|(&l, p)| p.locations[l].ints_invariant());
        for g in ints {
            if !vm::eval_guard(&g, intval.values()) {
                return (Status::IntVarsTgtInvariantViolated, TransitionData::empty());
            }
        }
        let mut tgt_invariant = Vec::new();
        for (&l, p) in vloc.locations().iter().zip(&self.system.processes) {
            tgt_invariant.extend(p.locations[l].clocks_invariant().to_constraints());
        }
        (Status::Ok, TransitionData { src_invariant: Vec::new(), guard: Vec::new(), resets: Vec::new(), tgt_invariant })
    }

    /// Enumerates outgoing values from `vloc`: every asynchronous edge and
    /// every maximal synchronisation of edges sharing an action label,
    /// each combination in deterministic (lowest process/edge id first)
    /// order, per spec §4.7's reproducibility requirement.
    pub fn outgoing_values(&self, vloc: &Vloc) -> Vec<OutgoingValue> {
        let n = self.system.processes.len();
        let mut by_label: std::collections::BTreeMap<String, Vec<Vec<(usize, usize)>>> =
            std::collections::BTreeMap::new();
        let mut out = Vec::new();

        for (pidx, p) in self.system.processes.iter().enumerate() {
            let loc = vloc.locations()[pidx];
            for (eidx, e) in p.edges_from(loc) {
                match &e.sync {
                    None => {
                        let mut entries = vec![None; n];
                        entries[pidx] = Some(eidx);
                        out.push(OutgoingValue { vedge: Vedge::new(entries) });
                    }
                    Some(label) => {
                        by_label.entry(label.clone()).or_default().push(vec![(pidx, eidx)]);
                    }
                }
            }
        }

        // Group per-process offers by label, then take the cartesian
        // product across participating processes (lowest process id
        // first, as the BTreeMap + stable push order already guarantee).
        let mut grouped: std::collections::BTreeMap<String, Vec<Vec<(usize, usize)>>> =
            std::collections::BTreeMap::new();
        for (label, offers) in by_label {
            let mut per_process: std::collections::BTreeMap<usize, Vec<usize>> = std::collections::BTreeMap::new();
            for offer in offers {
                let (pidx, eidx) = offer[0];
                per_process.entry(pidx).or_default().push(eidx);
            }
            let choices: Vec<Vec<usize>> = per_process.values().cloned().collect();
            let pidxs: Vec<usize> = per_process.keys().cloned().collect();
            for combo in cartesian(&choices) {
                let mut row = Vec::with_capacity(combo.len());
                for (pidx, eidx) in pidxs.iter().zip(combo.iter()) {
                    row.push((*pidx, *eidx));
                }
                grouped.entry(label.clone()).or_default().push(row);
            }
        }
        for (_label, combos) in grouped {
            for combo in combos {
                let mut entries = vec![None; n];
                for (pidx, eidx) in combo {
                    entries[pidx] = Some(eidx);
                }
                out.push(OutgoingValue { vedge: Vedge::new(entries) });
            }
        }
        out
    }

    /// Fires `outgoing` from `(vloc, intval)`: evaluates the integer-VM
    /// side first (cheap, no zone needed), then returns the flat clock
    /// data for the caller's semantics to apply, plus the successor vloc
    /// and intval.
    #[allow(clippy::type_complexity)]
    pub fn next(
        &self,
        vloc: &Vloc,
        intval: &IntVal,
        outgoing: &OutgoingValue,
    ) -> (Status, Option<(Vloc, IntVal, TransitionData)>) {
        let mut src_invariant = Vec::new();
        let mut guard = Vec::new();
        let mut resets = Vec::new();
        let mut new_locs = vloc.locations().to_vec();
        let mut vals = intval.values().to_vec();
        let bounds: Vec<(i32, i32)> = self.system.int_vars.iter().map(|d| (d.min, d.max)).collect();

        for (pidx, entry) in outgoing.vedge.entries().iter().enumerate() {
            let Some(eidx) = entry else { continue };
            let p = &self.system.processes[pidx];
            let loc = vloc.locations()[pidx];
            src_invariant.extend(p.locations[loc].clocks_invariant().to_constraints());
            if !vm::eval_guard(&p.locations[loc].ints_invariant(), &vals) {
                return (Status::IntVarsSrcInvariantViolated, None);
            }
            let edge = &p.edges[*eidx];
            guard.extend(edge.guard_clocks.to_constraints());
            if !vm::eval_guard(&edge.guard_ints, &vals) {
                return (Status::IntVarsGuardViolated, None);
            }
            match vm::exec_stmt(&edge.stmt, &vals, &bounds) {
                None => return (Status::IntVarsStatementFailed, None),
                Some(v) => vals = v,
            }
            resets.extend(edge.resets.iter().cloned());
            new_locs[pidx] = edge.tgt;
        }

        let mut tgt_invariant = Vec::new();
        for (pidx, &loc) in new_locs.iter().enumerate() {
            let p = &self.system.processes[pidx];
            if !vm::eval_guard(&p.locations[loc].ints_invariant(), &vals) {
                return (Status::IntVarsTgtInvariantViolated, None);
            }
            tgt_invariant.extend(p.locations[loc].clocks_invariant().to_constraints());
        }

        let data = TransitionData { src_invariant, guard, resets, tgt_invariant };
        (Status::Ok, Some((Vloc::new(new_locs), IntVal::new(vals), data)))
    }

    /// The union of label sets carried by the locations of `vloc`.
    pub fn labels(&self, vloc: &Vloc) -> std::collections::HashSet<String> {
        let mut out = std::collections::HashSet::new();
        for (pidx, &loc) in vloc.locations().iter().enumerate() {
            out.extend(self.system.processes[pidx].locations[loc].labels.iter().cloned());
        }
        out
    }

    /// A state is a valid point to test against the target labels unless
    /// some process sits in a committed location, which must fire before
    /// the state is considered "settled" (spec §3's committed flag).
    pub fn is_valid_final(&self, vloc: &Vloc) -> bool {
        !vloc.locations().iter().zip(&self.system.processes).any(|(&l, p)| p.locations[l].committed)
    }
}

impl TransitionData {
    fn empty() -> Self {
        TransitionData { src_invariant: Vec::new(), guard: Vec::new(), resets: Vec::new(), tgt_invariant: Vec::new() }
    }
}

fn cartesian<T: Clone>(choices: &[Vec<T>]) -> Vec<Vec<T>> {
    let mut out = vec![Vec::new()];
    for choice in choices {
        let mut next = Vec::with_capacity(out.len() * choice.len().max(1));
        for prefix in &out {
            for c in choice {
                let mut row = prefix.clone();
                row.push(c.clone());
                next.push(row);
            }
        }
        out = next;
    }
    out
}


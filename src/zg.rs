//! Standard zone graph (spec §4.5): a transition system over `(vloc, intval,
//! zone)` states, wiring [`crate::ta::Ta`] + [`crate::semantics`] +
//! [`crate::extrapolation`] into the single `initial`/`next` interface
//! [`crate::covreach`] drives.

use std::sync::Arc;

use crate::dbm::Dbm;
use crate::extrapolation::Extrapolation;
use crate::semantics::{self, SemanticsResult};
use crate::ta::{IntVal, OutgoingValue, Status, Ta, Vedge, Vloc};

#[derive(Debug, Clone, PartialEq)]
pub struct ZgState {
    pub vloc: Vloc,
    pub intval: IntVal,
    pub zone: Dbm,
}

#[derive(Debug, Clone)]
pub struct ZgTransition {
    pub vedge: Vedge,
}

/// Whether successors elapse time after applying the target invariant,
/// per spec §4.3's `Standard`/`Elapsed` distinction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Elapse {
    No,
    Yes,
}

pub struct Zg {
    ta: Ta,
    extrapolation: Arc<dyn Extrapolation>,
    elapse: Elapse,
}

impl Zg {
    pub fn new(ta: Ta, extrapolation: Arc<dyn Extrapolation>, elapse: Elapse) -> Self {
        Zg { ta, extrapolation, elapse }
    }

    pub fn ta(&self) -> &Ta {
        &self.ta
    }

    /// All initial states, each already extrapolated (spec §4.5: the
    /// extrapolation is applied to every zone that enters the graph, not
    /// only to `next`-produced ones, so initial states are covered the same
    /// way as successors).
    pub fn initial(&self) -> Vec<(Status, ZgState)> {
        let mut out = Vec::new();
        for vloc in self.ta.initial_vlocs() {
            let intval = IntVal::new(self.ta.system().initial_int_values());
            let (status, data) = self.ta.initial(&vloc, &intval);
            if !status.is_ok() {
                out.push((status, ZgState { vloc, intval, zone: Dbm::empty(self.ta.n_clocks() + 1) }));
                continue;
            }
            let dim = self.ta.n_clocks() + 1;
            let result = match self.elapse {
                Elapse::No => semantics::initial_zone::<Dbm>(dim, &data, false),
                Elapse::Yes => semantics::initial_zone::<Dbm>(dim, &data, true),
            };
            match result {
                SemanticsResult::Ok(mut zone) => {
                    let _ = self.extrapolation.extrapolate(&mut zone, &vloc);
                    out.push((Status::Ok, ZgState { vloc, intval, zone }));
                }
                SemanticsResult::Failed(status) => {
                    out.push((status, ZgState { vloc, intval, zone: Dbm::empty(dim) }));
                }
            }
        }
        out
    }

    pub fn outgoing(&self, state: &ZgState) -> Vec<OutgoingValue> {
        self.ta.outgoing_values(&state.vloc)
    }

    /// Fires `outgoing` from `state`, applying semantics then extrapolation.
    /// Mirrors [`crate::ta::Ta::next`]'s `(Status, Option<...>)` shape.
    pub fn next(&self, state: &ZgState, outgoing: &OutgoingValue) -> (Status, Option<(ZgState, ZgTransition)>) {
        let (status, next) = self.ta.next(&state.vloc, &state.intval, outgoing);
        let Some((vloc, intval, data)) = next else {
            return (status, None);
        };
        let result = match self.elapse {
            Elapse::No => semantics::standard_next(&state.zone, &data),
            Elapse::Yes => semantics::elapsed_next(&state.zone, &data),
        };
        match result {
            SemanticsResult::Ok(mut zone) => {
                let _ = self.extrapolation.extrapolate(&mut zone, &vloc);
                (Status::Ok, Some((ZgState { vloc, intval, zone }, ZgTransition { vedge: outgoing.vedge.clone() })))
            }
            SemanticsResult::Failed(status) => (status, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extrapolation::NoExtrapolation;
    use crate::model::{IntVarDecl, Location, Process, System};
    use std::sync::Arc as StdArc;

    fn trivial_system() -> StdArc<System> {
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
        StdArc::new(System { processes: vec![p], n_clocks: 1, int_vars: Vec::<IntVarDecl>::new() })
    }

    #[test]
    fn initial_has_one_state_with_no_outgoing() {
        let system = trivial_system();
        let ta = Ta::new(system);
        let zg = Zg::new(ta, StdArc::new(NoExtrapolation), Elapse::No);
        let inits = zg.initial();
        assert_eq!(inits.len(), 1);
        assert!(inits[0].0.is_ok());
        assert!(zg.outgoing(&inits[0].1).is_empty());
    }
}

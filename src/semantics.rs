//! Semantics contract: wires [`crate::dbm`]/[`crate::refdbm`] primitives
//! into the `initial`/`next` protocol (spec §4.3).
//!
//! Two flavours are provided, matching the spec exactly: [`Standard`]
//! applies the transition steps in order with no time-elapse; [`Elapsed`]
//! additionally lets time pass after the target invariant is applied. Both
//! are generic over the zone representation via the [`ClockZone`] trait
//! (design note §9: "fix the two zone flavours as two concrete modules
//! with a shared trait").

use crate::dbm::{Constraint, Reset};
use crate::ta::{Status, TransitionData};

/// The operations a zone representation must offer to be driven by
/// [`Standard`]/[`Elapsed`] semantics. Implemented by [`crate::dbm::Dbm`]
/// and (with the extra RefDBM-only hooks layered on top, see
/// [`crate::refdbm`]) by `RefDbm`.
pub trait ClockZone: Sized + Clone {
    fn universal_positive(dim: usize) -> Self;
    fn is_empty(&self) -> bool;
    fn constrain_all(&mut self, cs: &[Constraint]) -> Result<(), crate::bound::Overflow>;
    fn apply_resets(&mut self, resets: &[Reset]) -> Result<(), crate::bound::Overflow>;
    fn elapse(&mut self);
}

impl ClockZone for crate::dbm::Dbm {
    fn universal_positive(dim: usize) -> Self {
        crate::dbm::Dbm::universal_positive(dim)
    }
    fn is_empty(&self) -> bool {
        crate::dbm::Dbm::is_empty(self)
    }
    fn constrain_all(&mut self, cs: &[Constraint]) -> Result<(), crate::bound::Overflow> {
        crate::dbm::Dbm::constrain_all(self, cs)
    }
    fn apply_resets(&mut self, resets: &[Reset]) -> Result<(), crate::bound::Overflow> {
        for r in resets {
            self.reset(r.x, r.y, r.k)?;
        }
        Ok(())
    }
    fn elapse(&mut self) {
        self.open_up()
    }
}

/// Outcome of applying semantics to a candidate transition: either the
/// resulting zone, or the status of whichever step made it empty/invalid.
pub enum SemanticsResult<Z> {
    Ok(Z),
    Failed(Status),
}

/// Standard semantics: intersect src invariant, guard, reset, tgt invariant,
/// in that order; no time may pass. Spec §4.3, "Standard" paragraph.
pub fn standard_next<Z: ClockZone>(zone: &Z, data: &TransitionData) -> SemanticsResult<Z> {
    apply_steps(zone, data, false)
}

/// Elapsed semantics: standard steps, then time-elapse. Spec §4.3,
/// "Elapsed" paragraph.
pub fn elapsed_next<Z: ClockZone>(zone: &Z, data: &TransitionData) -> SemanticsResult<Z> {
    apply_steps(zone, data, true)
}

fn apply_steps<Z: ClockZone>(zone: &Z, data: &TransitionData, elapse: bool) -> SemanticsResult<Z> {
    let mut z = zone.clone();
    if z.constrain_all(&data.src_invariant).is_err() {
        return SemanticsResult::Failed(Status::ClocksSrcInvariantViolated);
    }
    if z.is_empty() {
        return SemanticsResult::Failed(Status::ClocksSrcInvariantViolated);
    }
    if z.constrain_all(&data.guard).is_err() {
        return SemanticsResult::Failed(Status::ClocksGuardViolated);
    }
    if z.is_empty() {
        return SemanticsResult::Failed(Status::ClocksGuardViolated);
    }
    if z.apply_resets(&data.resets).is_err() {
        return SemanticsResult::Failed(Status::ClocksGuardViolated);
    }
    if z.constrain_all(&data.tgt_invariant).is_err() {
        return SemanticsResult::Failed(Status::ClocksTgtInvariantViolated);
    }
    if z.is_empty() {
        return SemanticsResult::Failed(Status::ClocksTgtInvariantViolated);
    }
    if elapse {
        z.elapse();
    }
    SemanticsResult::Ok(z)
}

/// Initial-state variant: start from the universal-positive zone, apply
/// the target invariant, then (if elapsed) let time pass.
pub fn initial_zone<Z: ClockZone>(dim: usize, data: &TransitionData, elapsed: bool) -> SemanticsResult<Z> {
    let mut z = Z::universal_positive(dim);
    if z.constrain_all(&data.tgt_invariant).is_err() {
        return SemanticsResult::Failed(Status::ClocksTgtInvariantViolated);
    }
    if z.is_empty() {
        return SemanticsResult::Failed(Status::ClocksTgtInvariantViolated);
    }
    if elapsed {
        z.elapse();
    }
    SemanticsResult::Ok(z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bound::Cmp;
    use crate::dbm::{Constraint, Dbm};

    #[test]
    fn standard_does_not_elapse() {
        let data = TransitionData {
            src_invariant: vec![],
            guard: vec![Constraint::new(1, 0, Cmp::Le, 5)],
            resets: vec![],
            tgt_invariant: vec![],
        };
        let z = Dbm::universal_positive(2);
        match standard_next(&z, &data) {
            SemanticsResult::Ok(z2) => assert!(!z2.is_universal()),
            SemanticsResult::Failed(_) => panic!("expected ok"),
        }
    }
}

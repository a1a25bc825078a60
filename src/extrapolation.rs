//! Extrapolation operators (spec §3/§4.3): a function `(dbm, vloc) -> dbm`
//! such that `extrap(dbm) ⊇ dbm` and the image over reachable zones is
//! finite, guaranteeing termination of [`crate::covreach`]. Applied only in
//! [`crate::zg`] (never in [`crate::refzg`], per spec §4.3).

use crate::clocks::ClockBoundsCache;
use crate::dbm::Dbm;
use crate::ta::Vloc;

/// A pluggable extrapolation policy — a small trait object interface in
/// place of the C++ source's template-parametrised extrapolation classes
/// (design note §9).
pub trait Extrapolation: Send + Sync {
    fn extrapolate(&self, dbm: &mut Dbm, vloc: &Vloc) -> Result<(), crate::bound::Overflow>;
}

/// No-op extrapolation: valid only when the underlying zone space is
/// already finite (spec §4.3). Used for path replay (spec §4.8, "no
/// extrapolation").
pub struct NoExtrapolation;

impl Extrapolation for NoExtrapolation {
    fn extrapolate(&self, _dbm: &mut Dbm, _vloc: &Vloc) -> Result<(), crate::bound::Overflow> {
        Ok(())
    }
}

/// Which of the four concrete DBM extrapolation operators to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    ExtraLu,
    ExtraLuPlus,
    ExtraM,
    ExtraMPlus,
}

/// Global extrapolation: one clock-bounds pair for the whole system,
/// independent of the current vloc.
pub struct Global {
    pub kind: Kind,
    pub bounds: crate::clocks::LuBounds,
}

impl Extrapolation for Global {
    fn extrapolate(&self, dbm: &mut Dbm, _vloc: &Vloc) -> Result<(), crate::bound::Overflow> {
        apply(dbm, self.kind, self.bounds.l.as_slice(), self.bounds.u.as_slice())
    }
}

/// Local extrapolation: clock bounds vary per vloc, served by a
/// [`ClockBoundsCache`] (spec §3, "local" maps).
pub struct Local {
    pub kind: Kind,
    pub cache: ClockBoundsCache,
}

impl Extrapolation for Local {
    fn extrapolate(&self, dbm: &mut Dbm, vloc: &Vloc) -> Result<(), crate::bound::Overflow> {
        let bounds = self.cache.bounds_for(vloc);
        apply(dbm, self.kind, bounds.l.as_slice(), bounds.u.as_slice())
    }
}

fn apply(dbm: &mut Dbm, kind: Kind, l: &[i32], u: &[i32]) -> Result<(), crate::bound::Overflow> {
    match kind {
        Kind::ExtraLu => dbm.extra_lu(l, u),
        Kind::ExtraLuPlus => dbm.extra_lu_plus(l, u),
        Kind::ExtraM => dbm.extra_m(l),
        Kind::ExtraMPlus => dbm.extra_m_plus(l),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bound::Cmp;
    use crate::clocks::BoundsMap;

    #[test]
    fn global_extra_lu_widens() {
        let mut d = Dbm::universal_positive(3);
        d.constrain(1, 0, Cmp::Le, 10).unwrap();
        let before = d.clone();
        let g = Global {
            kind: Kind::ExtraLu,
            bounds: crate::clocks::LuBounds { l: BoundsMap::from_vec(vec![5, 5]), u: BoundsMap::from_vec(vec![5, 5]) },
        };
        let vloc = Vloc::new(vec![0]);
        g.extrapolate(&mut d, &vloc).unwrap();
        assert!(before.is_le(&d));
    }
}

//! RefDBM kernel: a DBM extended with one reference clock per process,
//! used for local-time (asynchronous) exploration (spec §4.2).
//!
//! Layout: indices `0..r` are the reference clocks `t_0..t_{r-1}`, indices
//! `r..r+n` are the offset clocks; `dim = r + n`. Every offset clock `i`
//! (as a matrix index, `i >= r`) has a *refmap* entry giving the index of
//! its owning reference clock.

use crate::bound::{Bound, Cmp, Overflow, LE_ZERO, LT_INFINITY};
use crate::dbm::Dbm;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefDbm {
    r: usize,
    dim: usize,
    /// `refmap[i - r]` is the reference-clock index owning offset clock `i`.
    refmap: Vec<usize>,
    entries: Vec<Bound>,
    empty: bool,
}

impl RefDbm {
    fn idx(&self, i: usize, j: usize) -> usize {
        debug_assert!(i < self.dim && j < self.dim);
        i * self.dim + j
    }

    pub fn r(&self) -> usize {
        self.r
    }
    pub fn dim(&self) -> usize {
        self.dim
    }
    pub fn is_empty(&self) -> bool {
        self.empty
    }
    pub fn refmap(&self, offset_clock: usize) -> usize {
        self.refmap[offset_clock - self.r]
    }

    pub fn get(&self, i: usize, j: usize) -> Bound {
        assert!(!self.empty, "cannot read entries of the empty zone");
        self.entries[self.idx(i, j)]
    }

    fn set(&mut self, i: usize, j: usize, b: Bound) {
        let idx = self.idx(i, j);
        self.entries[idx] = b;
    }

    fn new_raw(r: usize, refmap: Vec<usize>, fill: Bound) -> RefDbm {
        let dim = r + refmap.len();
        let mut entries = vec![fill; dim * dim];
        for i in 0..dim {
            entries[i * dim + i] = LE_ZERO;
        }
        RefDbm { r, dim, refmap, entries, empty: false }
    }

    pub fn universal(r: usize, refmap: Vec<usize>) -> RefDbm {
        assert!(r >= 1, "at least one reference clock is required");
        RefDbm::new_raw(r, refmap, LT_INFINITY)
    }

    /// `universal_positive(rdbm, r)`: for every offset clock `i`,
    /// `RDBM[i, refmap(i)] = LE_ZERO`; every other entry involving a
    /// reference clock stays `LT_INFINITY`, per spec §4.2.
    pub fn universal_positive(r: usize, refmap: Vec<usize>) -> RefDbm {
        let mut d = RefDbm::universal(r, refmap);
        for i in d.r..d.dim {
            let owner = d.refmap(i);
            d.set(i, owner, LE_ZERO);
        }
        d
    }

    pub fn empty(r: usize, refmap: Vec<usize>) -> RefDbm {
        let mut d = RefDbm::new_raw(r, refmap, LT_INFINITY);
        d.entries[0] = Bound::finite(Cmp::Lt, 0);
        d.empty = true;
        d
    }

    pub fn tighten(&mut self) -> Result<(), Overflow> {
        if self.empty {
            return Ok(());
        }
        if !crate::matrix::tighten(&mut self.entries, self.dim)? {
            self.set_empty();
        }
        Ok(())
    }

    pub fn constrain(&mut self, i: usize, j: usize, cmp: Cmp, k: i32) -> Result<(), Overflow> {
        if self.empty {
            return Ok(());
        }
        let new_bound = Bound::finite(cmp, k);
        if !crate::matrix::constrain_incremental(&mut self.entries, self.dim, i, j, new_bound)? {
            self.set_empty();
        }
        Ok(())
    }

    fn set_empty(&mut self) {
        let (r, refmap) = (self.r, self.refmap.clone());
        *self = RefDbm::empty(r, refmap);
    }

    pub fn is_le(&self, other: &RefDbm) -> bool {
        assert_eq!(self.dim, other.dim);
        if self.empty {
            return true;
        }
        if other.empty {
            return false;
        }
        (0..self.dim * self.dim).all(|k| self.entries[k] <= other.entries[k])
    }

    /// `synchronize(rdbm, r[, subset])`: equates all reference clocks in
    /// `subset` (every reference clock, if `None`). Returns to an empty
    /// zone if the resulting system is inconsistent.
    pub fn synchronize(&mut self, subset: Option<&[usize]>) -> Result<(), Overflow> {
        if self.empty {
            return Ok(());
        }
        let refs: Vec<usize> = subset.map(|s| s.to_vec()).unwrap_or_else(|| (0..self.r).collect());
        for &a in &refs {
            for &b in &refs {
                if a != b {
                    self.constrain(a, b, Cmp::Le, 0)?;
                    if self.empty {
                        return Ok(());
                    }
                }
            }
        }
        Ok(())
    }

    /// `is_synchronized`: `RDBM[t_a,t_b] = LE_ZERO` for every pair in `subset`.
    pub fn is_synchronized(&self, subset: Option<&[usize]>) -> bool {
        if self.empty {
            return false;
        }
        let refs: Vec<usize> = subset.map(|s| s.to_vec()).unwrap_or_else(|| (0..self.r).collect());
        refs.iter().all(|&a| refs.iter().all(|&b| a == b || self.get(a, b) == LE_ZERO))
    }

    /// `is_synchronizable`: does a synchronised instance exist?
    pub fn is_synchronizable(&self, subset: Option<&[usize]>) -> bool {
        let mut copy = self.clone();
        copy.synchronize(subset).is_ok() && !copy.is_empty()
    }

    /// `bound_spread(rdbm, r, Δ[, subset])`: enforce `t_a - t_b <= Δ` for
    /// every ordered pair in `subset`. Negative `Δ` is infeasible by
    /// construction (a clock can't be strictly behind itself), so it
    /// yields the empty zone rather than panicking.
    pub fn bound_spread(&mut self, delta: i32, subset: Option<&[usize]>) -> Result<(), Overflow> {
        if self.empty {
            return Ok(());
        }
        if delta < 0 {
            self.set_empty();
            return Ok(());
        }
        let refs: Vec<usize> = subset.map(|s| s.to_vec()).unwrap_or_else(|| (0..self.r).collect());
        for &a in &refs {
            for &b in &refs {
                if a != b {
                    self.constrain(a, b, Cmp::Le, delta)?;
                    if self.empty {
                        return Ok(());
                    }
                }
            }
        }
        Ok(())
    }

    /// `asynchronous_open_up`: each reference clock in `allowed` advances
    /// independently — `RDBM[i, t_p] = LT_INFINITY` for every row `i !=
    /// t_p`. Lower bounds (`RDBM[t_p, j]`) are left untouched, which is
    /// exactly invariant 11 of spec §8.
    pub fn asynchronous_open_up(&mut self, allowed: &[usize]) {
        if self.empty {
            return;
        }
        for &tp in allowed {
            for i in 0..self.dim {
                if i != tp {
                    self.set(i, tp, LT_INFINITY);
                }
            }
        }
    }

    /// `reset_to_reference_clock(rdbm, r, x)`: `x := t_{refmap(x)}`.
    pub fn reset_to_reference_clock(&mut self, x: usize) -> Result<(), Overflow> {
        if self.empty {
            return Ok(());
        }
        let owner = self.refmap(x);
        let n = self.dim;
        let mut row = vec![LT_INFINITY; n];
        let mut col = vec![LT_INFINITY; n];
        for z in 0..n {
            row[z] = self.get(owner, z);
            col[z] = self.get(z, owner);
        }
        for z in 0..n {
            self.set(x, z, row[z]);
            self.set(z, x, col[z]);
        }
        self.set(x, x, LE_ZERO);
        Ok(())
    }

    /// `to_dbm`: project a *synchronised* RefDBM onto a plain DBM of
    /// dimension `n+1`, identifying every reference clock with clock `0`.
    /// Precondition: `is_synchronized`.
    pub fn to_dbm(&self) -> Dbm {
        assert!(self.is_synchronized(None), "to_dbm requires a synchronised RefDBM");
        let n = self.dim - self.r;
        let mut out = Dbm::universal(n + 1);
        // clock 0 of the plain DBM is represented by reference clock 0
        // here (all reference clocks are equal once synchronised).
        let map = |i: usize| -> usize {
            if i < self.r {
                0
            } else {
                1 + (i - self.r)
            }
        };
        for i in 0..self.dim {
            for j in 0..self.dim {
                let (pi, pj) = (map(i), map(j));
                let b = self.get(i, j);
                if b < out.get(pi, pj) {
                    // direct field write bypasses constrain's incremental
                    // re-tightening; we re-tighten once at the end instead.
                    out.force_set(pi, pj, b);
                }
            }
        }
        out.tighten().expect("projection of a consistent RefDBM cannot overflow");
        out
    }

    /// The synchronised projection used by sync-aLU/sync-zone-inclusion
    /// covering (spec §4.6, item 7): synchronise a copy, then project.
    pub fn sync_zone(&self) -> Dbm {
        let mut z = self.clone();
        let _ = z.synchronize(None);
        if z.is_empty() {
            Dbm::empty(self.dim - self.r + 1)
        } else {
            z.to_dbm()
        }
    }

    /// Sync-aLU-inclusion: aLU-inclusion of the synchronised projections.
    pub fn sync_alu_le(&self, other: &RefDbm, l: &[i32], u: &[i32]) -> bool {
        self.sync_zone().alu_le(&other.sync_zone(), l, u)
    }

    /// Time-elapse aLU*-inclusion (spec §4.6, item 6 / REDESIGN FLAGS):
    /// sound only when both zones were produced under *elapsed* semantics —
    /// the caller is responsible for gating this on the semantics flavour,
    /// since a `RefDbm` carries no record of which semantics produced it.
    pub fn alu_star_le(&self, other: &RefDbm, l: &[i32], u: &[i32]) -> bool {
        let mut a = self.sync_zone();
        a.open_up();
        let mut b = other.sync_zone();
        b.open_up();
        a.alu_le(&b, l, u)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_process_rdbm() -> RefDbm {
        // r = 2 reference clocks (t0, t1), one offset clock per process
        // (indices 2, 3), refmap[0] = 0 (clock 2 owned by t0), refmap[1] = 1.
        RefDbm::universal_positive(2, vec![0, 1])
    }

    #[test]
    fn synchronize_then_is_synchronized() {
        let mut d = two_process_rdbm();
        d.synchronize(None).unwrap();
        assert!(d.is_synchronized(None));
    }

    /// S4: with two reference clocks, `RDBM[t0,t1] = (<,-1)` makes
    /// synchronisation (`t0 - t1 <= 0 and t1 - t0 <= 0`) infeasible.
    #[test]
    fn s4_synchronize_contradiction() {
        let mut d = two_process_rdbm();
        d.constrain(0, 1, Cmp::Lt, -1).unwrap();
        assert!(!d.is_empty());
        d.synchronize(None).unwrap();
        assert!(d.is_empty());
        assert!(!two_process_rdbm_with_contradiction().is_synchronizable(None));
    }

    fn two_process_rdbm_with_contradiction() -> RefDbm {
        let mut d = two_process_rdbm();
        d.constrain(0, 1, Cmp::Lt, -1).unwrap();
        d
    }

    #[test]
    fn bound_spread_never_enlarges_and_holds() {
        let mut d = two_process_rdbm();
        d.synchronize(None).unwrap();
        let before = d.clone();
        d.bound_spread(3, None).unwrap();
        assert!(d.is_le(&before));
        assert!(d.get(0, 1) <= Bound::finite(Cmp::Le, 3));
    }

    #[test]
    fn bound_spread_negative_is_empty() {
        let mut d = two_process_rdbm();
        d.bound_spread(-1, None).unwrap();
        assert!(d.is_empty());
    }

    #[test]
    fn asynchronous_open_up_preserves_lower_bounds() {
        let mut d = two_process_rdbm();
        let before_t0_row: Vec<Bound> = (0..d.dim).map(|j| d.get(0, j)).collect();
        d.asynchronous_open_up(&[0, 1]);
        let after_t0_row: Vec<Bound> = (0..d.dim).map(|j| d.get(0, j)).collect();
        assert_eq!(before_t0_row, after_t0_row);
    }

    #[test]
    fn sync_alu_le_admits_bound_exceeding_l() {
        let mut d1 = two_process_rdbm();
        d1.synchronize(None).unwrap();
        d1.constrain(2, 0, Cmp::Le, 10).unwrap();
        let mut d2 = two_process_rdbm();
        d2.synchronize(None).unwrap();
        let l = [5, 5];
        let u = [5, 5];
        assert!(d1.sync_alu_le(&d2, &l, &u));
    }

    #[test]
    fn to_dbm_of_synchronized_universal_is_universal_positive() {
        let mut d = two_process_rdbm();
        d.synchronize(None).unwrap();
        let plain = d.to_dbm();
        assert!(plain.is_universal_positive());
    }
}

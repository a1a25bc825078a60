//! Canonical (tight) Difference-Bound-Matrix kernel.
//!
//! A `Dbm` is a flat row-major `dim * dim` buffer of [`Bound`]s representing
//! a convex set of clock valuations (a zone). Index `0` is the constant-zero
//! reference clock, so a system with `n` clocks uses `dim = n + 1`. Every
//! operation here takes a tight, consistent matrix and returns one, or
//! reports the zone is empty, or reports [`Overflow`] — operations never
//! return a partially-updated matrix, matching the "fail atomically"
//! contract of spec §4.1.
//!
//! Tightening is Floyd–Warshall closure; `constrain` instead repropagates
//! incrementally through the single changed pivot, which is what keeps
//! zone-graph successor computation from re-tightening the whole matrix on
//! every guard in a conjunction.

use crate::bound::{Bound, Cmp, Overflow, LE_ZERO, LT_INFINITY};

/// A clock constraint `x_i - x_j <cmp> k`, as produced by a guard/invariant
/// evaluator and consumed by [`Dbm::constrain_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constraint {
    pub i: usize,
    pub j: usize,
    pub cmp: Cmp,
    pub k: i32,
}

impl Constraint {
    pub fn new(i: usize, j: usize, cmp: Cmp, k: i32) -> Self {
        Constraint { i, j, cmp, k }
    }

    fn bound(self) -> Bound {
        Bound::finite(self.cmp, self.k)
    }
}

/// A single reset `x := y + k` (`y = 0` for the common reset-to-constant case).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reset {
    pub x: usize,
    pub y: usize,
    pub k: i32,
}

impl Reset {
    pub fn to_constant(x: usize, k: i32) -> Self {
        Reset { x, y: 0, k }
    }
}

/// A canonical (or, transiently, empty) difference-bound matrix.
///
/// The empty zone is represented out-of-band via `empty: true` rather than
/// by a magic diagonal value, because Rust has no equivalent of tchecker's
/// "reinterpret the same buffer, `DBM[0,0] = (<,0)` means empty" trick
/// without unsafe aliasing games, and a flag is cheaper to reason about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dbm {
    dim: usize,
    entries: Vec<Bound>,
    empty: bool,
}

impl Dbm {
    fn idx(&self, i: usize, j: usize) -> usize {
        debug_assert!(i < self.dim && j < self.dim);
        i * self.dim + j
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    /// `DBM[i,j]`. Reading an empty zone's entries is a programming error.
    pub fn get(&self, i: usize, j: usize) -> Bound {
        assert!(!self.empty, "cannot read entries of the empty zone");
        self.entries[self.idx(i, j)]
    }

    fn set(&mut self, i: usize, j: usize, b: Bound) {
        let idx = self.idx(i, j);
        self.entries[idx] = b;
    }

    /// Direct entry write bypassing `constrain`'s incremental re-tightening,
    /// for callers (e.g. [`crate::refdbm::RefDbm::to_dbm`]) that build up a
    /// matrix entry-by-entry and re-tighten once at the end.
    pub(crate) fn force_set(&mut self, i: usize, j: usize, b: Bound) {
        self.set(i, j, b);
    }

    /// `universal(dbm, dim)`: every bound is `+∞` except the diagonal.
    pub fn universal(dim: usize) -> Dbm {
        assert!(dim >= 1);
        let mut entries = vec![LT_INFINITY; dim * dim];
        for i in 0..dim {
            entries[i * dim + i] = LE_ZERO;
        }
        Dbm { dim, entries, empty: false }
    }

    /// `universal_positive`: universal, additionally `DBM[0,i] = LE_ZERO`.
    pub fn universal_positive(dim: usize) -> Dbm {
        let mut d = Dbm::universal(dim);
        for i in 1..dim {
            d.set(0, i, LE_ZERO);
        }
        d
    }

    /// `zero`: every bound is `LE_ZERO` (the single valuation where every clock is 0).
    pub fn zero(dim: usize) -> Dbm {
        assert!(dim >= 1);
        Dbm { dim, entries: vec![LE_ZERO; dim * dim], empty: false }
    }

    /// The unique representative of the empty zone.
    pub fn empty(dim: usize) -> Dbm {
        assert!(dim >= 1);
        let mut entries = vec![LT_INFINITY; dim * dim];
        entries[0] = Bound::finite(Cmp::Lt, 0);
        Dbm { dim, entries, empty: true }
    }

    pub fn is_universal(&self) -> bool {
        if self.empty {
            return false;
        }
        (0..self.dim).all(|i| {
            (0..self.dim).all(|j| {
                if i == j {
                    self.get(i, j) == LE_ZERO
                } else {
                    self.get(i, j) == LT_INFINITY
                }
            })
        })
    }

    pub fn is_positive(&self) -> bool {
        !self.empty && (1..self.dim).all(|i| self.get(0, i) <= LE_ZERO)
    }

    pub fn is_universal_positive(&self) -> bool {
        if self.empty {
            return false;
        }
        (1..self.dim).all(|i| self.get(0, i) == LE_ZERO)
            && (1..self.dim).all(|i| self.get(i, 0) == LT_INFINITY)
            && (0..self.dim).all(|i| self.get(i, i) == LE_ZERO)
    }

    /// Diagonal zero and every `DBM[i,k] <= DBM[i,j]+DBM[j,k]`; cheap to
    /// call from `debug_assert!` at the top of every public operation.
    pub fn is_tight(&self) -> bool {
        if self.empty {
            return true;
        }
        let n = self.dim;
        for i in 0..n {
            if self.get(i, i) != LE_ZERO {
                return false;
            }
        }
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    let direct = self.get(i, k);
                    let via = match self.get(i, j).checked_add(self.get(j, k)) {
                        Ok(b) => b,
                        Err(Overflow) => continue,
                    };
                    if direct > via {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Floyd–Warshall closure. Returns `Err(Overflow)` if any addition along
    /// the way overflows; on success the DBM has been replaced in place
    /// with its canonical form, or with [`Dbm::empty`] if a negative cycle
    /// was found on the diagonal.
    pub fn tighten(&mut self) -> Result<(), Overflow> {
        if self.empty {
            return Ok(());
        }
        if !crate::matrix::tighten(&mut self.entries, self.dim)? {
            *self = Dbm::empty(self.dim);
        }
        Ok(())
    }

    /// Intersects with `x_i - x_j <cmp> k`, re-tightening incrementally
    /// through `(i,j)` only (Bellman-Ford-style single-source relaxation),
    /// rather than a full Floyd–Warshall pass.
    pub fn constrain(&mut self, i: usize, j: usize, cmp: Cmp, k: i32) -> Result<(), Overflow> {
        if self.empty {
            return Ok(());
        }
        let new_bound = Bound::finite(cmp, k);
        if !crate::matrix::constrain_incremental(&mut self.entries, self.dim, i, j, new_bound)? {
            *self = Dbm::empty(self.dim);
        }
        Ok(())
    }

    /// Folds [`Dbm::constrain`] over a container of constraints, short-circuiting
    /// (without further work) as soon as the zone becomes empty.
    pub fn constrain_all(&mut self, cs: &[Constraint]) -> Result<(), Overflow> {
        for c in cs {
            if self.empty {
                break;
            }
            self.constrain(c.i, c.j, c.cmp, c.k)?;
        }
        Ok(())
    }

    /// `is_le(a,b)`: elementwise `a[i,j] <= b[i,j]`. The empty zone is
    /// included in (but never includes) every non-empty zone.
    pub fn is_le(&self, other: &Dbm) -> bool {
        assert_eq!(self.dim, other.dim);
        if self.empty {
            return true;
        }
        if other.empty {
            return false;
        }
        (0..self.dim * self.dim).all(|idx| self.entries[idx] <= other.entries[idx])
    }

    pub fn is_equal(&self, other: &Dbm) -> bool {
        self == other
    }

    /// `x := y + k`. Implements policies (a)/(b)/(c) of spec §4.1: copy the
    /// row/column of the reset's source shifted by `k`, or no-op for the
    /// `y == x, k == 0` identity case. The result stays tight without a
    /// fresh closure: every new entry through `x` was derived from an
    /// already-tight row/column.
    pub fn reset(&mut self, x: usize, y: usize, k: i32) -> Result<(), Overflow> {
        if self.empty {
            return Ok(());
        }
        if y == x && k == 0 {
            return Ok(());
        }
        let shift_pos = Bound::finite(Cmp::Le, k);
        let shift_neg = Bound::finite(Cmp::Le, -k);
        let n = self.dim;
        let mut new_row = vec![LT_INFINITY; n];
        let mut new_col = vec![LT_INFINITY; n];
        for z in 0..n {
            new_row[z] = self.get(y, z).checked_add(shift_pos)?;
            new_col[z] = shift_neg.checked_add(self.get(z, y))?;
        }
        for z in 0..n {
            self.set(x, z, new_row[z]);
            self.set(z, x, new_col[z]);
        }
        self.set(x, x, LE_ZERO);
        Ok(())
    }

    /// Time-elapse: clocks may grow without bound. `DBM[i,0] = +inf` for
    /// `i > 0`; lower bounds (`DBM[0,i]`) are untouched. Already tight.
    pub fn open_up(&mut self) {
        if self.empty {
            return;
        }
        for i in 1..self.dim {
            self.set(i, 0, LT_INFINITY);
        }
    }

    /// Time-predecessor: `DBM[0,i] = LE_ZERO` for `i > 0`, then re-tighten.
    pub fn open_down(&mut self) -> Result<(), Overflow> {
        if self.empty {
            return Ok(());
        }
        for i in 1..self.dim {
            self.set(0, i, LE_ZERO);
        }
        self.tighten()
    }

    /// `extra_lu(d, L, U)`: drop any bound on row `i` that exceeds `L[i]`
    /// (lower-bound information lost above the clock's maximal lower
    /// constant), and any bound on column `j` below `-U[j]`, then
    /// re-tighten. Missing bounds are treated as `-inf`, abstracting that
    /// row/column to universal.
    pub fn extra_lu(&mut self, l: &[i32], u: &[i32]) -> Result<(), Overflow> {
        self.extra_lu_impl(l, u, false)
    }

    /// Strictly coarser variant additionally abstracting rows against `U`
    /// and columns against `L`.
    pub fn extra_lu_plus(&mut self, l: &[i32], u: &[i32]) -> Result<(), Overflow> {
        self.extra_lu_impl(l, u, true)
    }

    pub fn extra_m(&mut self, m: &[i32]) -> Result<(), Overflow> {
        self.extra_lu(m, m)
    }

    pub fn extra_m_plus(&mut self, m: &[i32]) -> Result<(), Overflow> {
        self.extra_lu_plus(m, m)
    }

    fn extra_lu_impl(&mut self, l: &[i32], u: &[i32], plus: bool) -> Result<(), Overflow> {
        if self.empty {
            return Ok(());
        }
        let n = self.dim;
        let bound_l = |i: usize| if i == 0 { 0 } else { *l.get(i - 1).unwrap_or(&i32::MIN) };
        let bound_u = |i: usize| if i == 0 { 0 } else { *u.get(i - 1).unwrap_or(&i32::MIN) };
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let dij = self.get(i, j);
                if dij.is_infinity() {
                    continue;
                }
                let li = bound_l(i);
                if li == i32::MIN || dij.value() > li {
                    self.set(i, j, LT_INFINITY);
                    continue;
                }
                if j != 0 {
                    let uj = bound_u(j);
                    if uj == i32::MIN || dij < Bound::finite(Cmp::Lt, -uj) {
                        self.set(i, j, Bound::finite(Cmp::Lt, -uj));
                        continue;
                    }
                }
                if plus {
                    let ui = bound_u(i);
                    if i != 0 && (ui == i32::MIN || dij.value() > ui) {
                        self.set(i, j, LT_INFINITY);
                        continue;
                    }
                    let lj = bound_l(j);
                    if lj == i32::MIN || dij < Bound::finite(Cmp::Lt, -lj) {
                        self.set(i, j, Bound::finite(Cmp::Lt, -lj));
                    }
                }
            }
        }
        self.tighten()
    }

    /// aLU-inclusion (spec §4.6, item 2/3): `self ⊆ Extra-LU(other, L, U)`.
    /// Materialises the abstraction of `other` rather than applying the
    /// pointwise bound-comparison shortcut the literature favours for
    /// performance — correct and far simpler to get right, at the cost of
    /// one extra clone+closure per covering check (see DESIGN.md).
    pub fn alu_le(&self, other: &Dbm, l: &[i32], u: &[i32]) -> bool {
        let mut widened = other.clone();
        widened.extra_lu(l, u).expect("alu_le operands must already be finite/consistent");
        self.is_le(&widened)
    }

    /// aM-inclusion (spec §4.6, item 4): the degenerate aLU case `L == U == m`.
    pub fn am_le(&self, other: &Dbm, m: &[i32]) -> bool {
        self.alu_le(other, m, m)
    }

    /// The canonical conjunction of constraints: one per pair whose bound
    /// is finite and not implied by a shorter path (i.e. genuinely part of
    /// the tight form's non-redundant presentation — here, simply every
    /// finite off-diagonal entry, since a tight DBM has already removed
    /// redundancy by construction).
    pub fn to_constraints(&self) -> Vec<Constraint> {
        if self.empty {
            return Vec::new();
        }
        let mut out = Vec::new();
        for i in 0..self.dim {
            for j in 0..self.dim {
                if i == j {
                    continue;
                }
                let b = self.get(i, j);
                if !b.is_infinity() {
                    out.push(Constraint::new(i, j, b.cmp_kind(), b.value()));
                }
            }
        }
        out
    }

    /// One concrete integer point of the zone. Clocks are pinned one at a
    /// time, lowest index first, to their tightest current lower bound
    /// against the reference clock, re-running [`Dbm::constrain`] on the
    /// working copy after each pin so every later clock's lower bound has
    /// already absorbed the inter-clock (`DBM[i,j]`, `i,j>0`) constraints
    /// implied by the pins before it — a plain row-0 read would miss those
    /// and could hand back a point a strict difference constraint excludes.
    /// Meaningless on an empty zone.
    pub fn sample(&self) -> Option<Vec<i32>> {
        if self.empty {
            return None;
        }
        let mut working = self.clone();
        let mut v = vec![0i32; self.dim];
        for i in 1..self.dim {
            let b = working.get(0, i);
            let lower = if b.is_infinity() {
                0
            } else {
                match b.cmp_kind() {
                    Cmp::Le => (-b.value()).max(0),
                    Cmp::Lt => (-b.value() + 1).max(0),
                }
            };
            v[i] = lower;
            working.constrain(i, 0, Cmp::Le, lower).ok()?;
            working.constrain(0, i, Cmp::Le, -lower).ok()?;
            if working.is_empty() {
                return None;
            }
        }
        Some(v)
    }
}

impl std::fmt::Display for Dbm {
    /// Zone printing per spec §6: `xi - xj <cmp> k`, with bounds against
    /// clock 0 rendered as `xi <cmp> k` / `-xi <cmp> k`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.empty {
            return write!(f, "false");
        }
        let mut first = true;
        for i in 0..self.dim {
            for j in 0..self.dim {
                if i == j {
                    continue;
                }
                let b = self.get(i, j);
                if b.is_infinity() {
                    continue;
                }
                if !first {
                    write!(f, " && ")?;
                }
                first = false;
                let op = match b.cmp_kind() {
                    Cmp::Lt => "<",
                    Cmp::Le => "<=",
                };
                match (i, j) {
                    (0, j) => write!(f, "-x{} {} {}", j, op, b.value())?,
                    (i, 0) => write!(f, "x{} {} {}", i, op, b.value())?,
                    (i, j) => write!(f, "x{} - x{} {} {}", i, j, op, b.value())?,
                }
            }
        }
        if first {
            write!(f, "true")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tighten_universal_and_zero_are_fixed_points() {
        let mut u = Dbm::universal(3);
        u.tighten().unwrap();
        assert_eq!(u, Dbm::universal(3));

        let mut z = Dbm::zero(3);
        z.tighten().unwrap();
        assert_eq!(z, Dbm::zero(3));
    }

    #[test]
    fn constrain_idempotent() {
        let mut d = Dbm::universal(3);
        d.constrain(1, 2, Cmp::Le, 4).unwrap();
        let once = d.clone();
        d.constrain(1, 2, Cmp::Le, 4).unwrap();
        assert_eq!(d, once);
    }

    #[test]
    fn is_le_matches_tightened_intersection() {
        let mut a = Dbm::universal(2);
        a.constrain(1, 0, Cmp::Le, 5).unwrap();
        let mut b = Dbm::universal(2);
        b.constrain(1, 0, Cmp::Le, 10).unwrap();
        assert!(a.is_le(&b));
        assert!(!b.is_le(&a));
    }

    #[test]
    fn reset_is_idempotent() {
        let mut d = Dbm::universal(3);
        d.constrain(1, 0, Cmp::Le, 7).unwrap();
        d.reset(1, 0, 3).unwrap();
        let once = d.clone();
        d.reset(1, 0, 3).unwrap();
        assert_eq!(d, once);
    }

    #[test]
    fn open_up_is_idempotent() {
        let mut d = Dbm::universal_positive(3);
        d.constrain(1, 0, Cmp::Le, 5).unwrap();
        d.open_up();
        let once = d.clone();
        d.open_up();
        assert_eq!(d, once);
    }

    #[test]
    fn extra_lu_is_a_superset_and_idempotent() {
        let mut d = Dbm::universal_positive(3);
        d.constrain(1, 0, Cmp::Le, 10).unwrap();
        let l = [5, 5];
        let u = [5, 5];
        let mut widened = d.clone();
        widened.extra_lu(&l, &u).unwrap();
        assert!(d.is_le(&widened));
        let once = widened.clone();
        widened.extra_lu(&l, &u).unwrap();
        assert_eq!(widened, once);
    }

    /// S3: `universal`, then `x1-x2<=-3`, then `x2-x1<=1`, is unsatisfiable:
    /// `x1-x2<=-3` and `x2-x1<=1` sum to `0 <= -2` on the diagonal.
    #[test]
    fn s3_tighten_detects_empty() {
        let mut d = Dbm::universal(3);
        d.constrain(1, 2, Cmp::Le, -3).unwrap();
        assert!(!d.is_empty());
        d.constrain(2, 1, Cmp::Le, 1).unwrap();
        assert!(d.is_empty());
    }

    #[test]
    fn alu_le_admits_bound_exceeding_l() {
        let mut d1 = Dbm::universal_positive(3);
        d1.constrain(1, 0, Cmp::Le, 10).unwrap();
        let d2 = Dbm::universal_positive(3);
        let l = [5, 5];
        let u = [5, 5];
        assert!(!d1.is_le(&d2));
        assert!(d1.alu_le(&d2, &l, &u));
    }

    /// A witness must honour strict bounds, not just land on their boundary:
    /// `-x1 < -3` means `x1 > 3`, so `x1 == 3` is not a valid sample.
    #[test]
    fn sample_respects_strict_lower_bounds() {
        let mut d = Dbm::universal_positive(2);
        d.constrain(0, 1, Cmp::Lt, -3).unwrap();
        let v = d.sample().unwrap();
        assert!(v[1] > 3, "witness must satisfy x1 > 3, got x1 = {}", v[1]);
        let mut check = d.clone();
        check.constrain(1, 0, Cmp::Le, v[1]).unwrap();
        check.constrain(0, 1, Cmp::Le, -v[1]).unwrap();
        assert!(!check.is_empty(), "sampled point must be consistent with the zone");
    }

    /// S5: universal-positive, dim 3, L=U=[5,5], then `x1<=10`; extra_lu_plus
    /// must drop the upper bound on x1 entirely (it exceeds U[1]=5).
    #[test]
    fn s5_extrapolation_coarsening() {
        let mut d = Dbm::universal_positive(3);
        d.constrain(1, 0, Cmp::Le, 10).unwrap();
        let l = [5, 5];
        let u = [5, 5];
        d.extra_lu_plus(&l, &u).unwrap();
        assert_eq!(d.get(1, 0), LT_INFINITY);
    }
}

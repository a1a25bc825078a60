//! Difference bounds: the scalar entries of a DBM.
//!
//! A [`Bound`] packs a comparator (`<` or `≤`) together with an integer (or
//! infinite) right-hand side into a single `i64`, the way a systems rewrite
//! of a DBM kernel wants its matrix entries to be `Copy` and cheap to add
//! and compare. The encoding follows the usual DBM convention: the strict/
//! non-strict bit lives in the low bit, the magnitude in the rest, and `+∞`
//! is a dedicated sentinel rather than `i64::MAX` so that `is_infinity` is a
//! single comparison.

use std::cmp::Ordering;
use std::fmt;
use std::ops::Add;

/// A comparator attached to a difference bound: `<` (strict) or `≤` (non-strict).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cmp {
    Lt,
    Le,
}

impl Cmp {
    /// The dual comparator, used by [`Bound::neg`].
    pub fn dual(self) -> Cmp {
        match self {
            Cmp::Lt => Cmp::Le,
            Cmp::Le => Cmp::Lt,
        }
    }
}

/// A difference bound `(cmp, k)` denoting the constraint `x_i - x_j <cmp> k`.
///
/// Two bounds compare lexicographically on `(k, strictness)`: `(<,k) < (≤,k)
/// < (<,k+1)`, matching the order a DBM needs to decide which of two
/// constraints on the same pair is tighter.
#[derive(Debug, Clone, Copy, Eq)]
pub struct Bound {
    cmp: Cmp,
    k: i32,
    infinite: bool,
}

/// `x_i - x_j ≤ 0`: the diagonal value and the universal lower-bound value.
pub const LE_ZERO: Bound = Bound { cmp: Cmp::Le, k: 0, infinite: false };

/// `x_i - x_j < +∞`: the universal (unconstrained) value.
pub const LT_INFINITY: Bound = Bound { cmp: Cmp::Lt, k: 0, infinite: true };

/// Raised when a [`Bound`] addition would overflow `i32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overflow;

impl fmt::Display for Overflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "overflow in difference-bound arithmetic")
    }
}

impl std::error::Error for Overflow {}

impl Bound {
    /// A finite bound `x_i - x_j <cmp> k`.
    pub fn finite(cmp: Cmp, k: i32) -> Bound {
        Bound { cmp, k, infinite: false }
    }

    pub fn is_infinity(self) -> bool {
        self.infinite
    }

    pub fn cmp_kind(self) -> Cmp {
        self.cmp
    }

    /// The finite magnitude `k`. Meaningless (and not called) on `LT_INFINITY`.
    pub fn value(self) -> i32 {
        debug_assert!(!self.infinite, "value() called on an infinite bound");
        self.k
    }

    /// `neg(c,k) = (dual(c), -k)`; `neg(LT_INFINITY)` is not meaningful and panics.
    pub fn neg(self) -> Bound {
        assert!(!self.infinite, "cannot negate +infinity");
        Bound { cmp: self.cmp.dual(), k: -self.k, infinite: false }
    }

    /// `(c1,k1) + (c2,k2) = (min(c1,c2), k1+k2)`, `∞` absorbing.
    ///
    /// Surfaces [`Overflow`] rather than silently wrapping, per the spec's
    /// numeric-semantics contract: all DBM arithmetic is 32-bit signed and
    /// overflow is a recoverable condition the caller must see.
    pub fn checked_add(self, other: Bound) -> Result<Bound, Overflow> {
        if self.infinite || other.infinite {
            return Ok(LT_INFINITY);
        }
        let cmp = if matches!(self.cmp, Cmp::Lt) || matches!(other.cmp, Cmp::Lt) {
            Cmp::Lt
        } else {
            Cmp::Le
        };
        let k = self.k.checked_add(other.k).ok_or(Overflow)?;
        Ok(Bound { cmp, k, infinite: false })
    }
}

impl Add for Bound {
    type Output = Bound;
    /// Panicking convenience wrapper over [`Bound::checked_add`]; used where
    /// the caller has already bounded its operands and overflow would be a
    /// programming error rather than a user-triggerable one (e.g. combining
    /// two zero-spread bounds during construction of a sentinel matrix).
    fn add(self, rhs: Bound) -> Bound {
        self.checked_add(rhs).expect("difference-bound addition overflowed")
    }
}

impl PartialEq for Bound {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd for Bound {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Bound {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.infinite, other.infinite) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self
                .k
                .cmp(&other.k)
                .then_with(|| match (self.cmp, other.cmp) {
                    (Cmp::Lt, Cmp::Le) => Ordering::Less,
                    (Cmp::Le, Cmp::Lt) => Ordering::Greater,
                    _ => Ordering::Equal,
                }),
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.infinite {
            write!(f, "<inf")
        } else {
            match self.cmp {
                Cmp::Lt => write!(f, "<{}", self.k),
                Cmp::Le => write!(f, "<={}", self.k),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_lexicographic() {
        let lt5 = Bound::finite(Cmp::Lt, 5);
        let le5 = Bound::finite(Cmp::Le, 5);
        let lt6 = Bound::finite(Cmp::Lt, 6);
        assert!(lt5 < le5);
        assert!(le5 < lt6);
        assert!(le5 < LT_INFINITY);
    }

    #[test]
    fn addition_absorbs_infinity() {
        assert_eq!(LT_INFINITY.checked_add(LE_ZERO).unwrap(), LT_INFINITY);
        assert_eq!(LE_ZERO.checked_add(LT_INFINITY).unwrap(), LT_INFINITY);
    }

    #[test]
    fn addition_takes_weaker_comparator() {
        let a = Bound::finite(Cmp::Le, 3);
        let b = Bound::finite(Cmp::Lt, 2);
        let sum = a.checked_add(b).unwrap();
        assert_eq!(sum.cmp_kind(), Cmp::Lt);
        assert_eq!(sum.value(), 5);
    }

    #[test]
    fn addition_overflows() {
        let a = Bound::finite(Cmp::Le, i32::MAX);
        let b = Bound::finite(Cmp::Le, 1);
        assert_eq!(a.checked_add(b), Err(Overflow));
    }

    #[test]
    fn negation() {
        let b = Bound::finite(Cmp::Lt, 3);
        let n = b.neg();
        assert_eq!(n.cmp_kind(), Cmp::Le);
        assert_eq!(n.value(), -3);
    }
}

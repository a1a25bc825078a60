//! Shared Floyd–Warshall closure and incremental constraint propagation
//! over a flat `Bound` buffer, factored out so [`crate::dbm::Dbm`] and
//! [`crate::refdbm::RefDbm`] — "two concrete modules with a shared trait",
//! design note §9 — don't duplicate the canonicalisation algorithm, only
//! the invariants layered on top of it.

use crate::bound::{Bound, Overflow, LE_ZERO};

#[inline]
fn idx(dim: usize, i: usize, j: usize) -> usize {
    i * dim + j
}

/// Full closure. Returns `Ok(true)` if the result is consistent (diagonal
/// all `LE_ZERO` after closure), `Ok(false)` if a negative cycle was found
/// (the matrix is left in an unspecified state — callers must replace it
/// with their empty sentinel).
pub(crate) fn tighten(entries: &mut [Bound], dim: usize) -> Result<bool, Overflow> {
    for k in 0..dim {
        for i in 0..dim {
            let ik = entries[idx(dim, i, k)];
            if ik.is_infinity() {
                continue;
            }
            for j in 0..dim {
                let kj = entries[idx(dim, k, j)];
                if kj.is_infinity() {
                    continue;
                }
                let via = ik.checked_add(kj)?;
                let cur = idx(dim, i, j);
                if via < entries[cur] {
                    entries[cur] = via;
                }
            }
        }
    }
    for i in 0..dim {
        if entries[idx(dim, i, i)] < LE_ZERO {
            return Ok(false);
        }
    }
    for i in 0..dim {
        entries[idx(dim, i, i)] = LE_ZERO;
    }
    Ok(true)
}

/// Intersects `entries[i,j]` with `new_bound`, re-propagating only through
/// paths `x -> i -> j -> y`. Returns `Ok(true)` if still consistent.
pub(crate) fn constrain_incremental(
    entries: &mut [Bound],
    dim: usize,
    i: usize,
    j: usize,
    new_bound: Bound,
) -> Result<bool, Overflow> {
    if new_bound >= entries[idx(dim, i, j)] {
        return Ok(true);
    }
    entries[idx(dim, i, j)] = new_bound;

    if entries[idx(dim, i, i)] < LE_ZERO || new_bound.checked_add(entries[idx(dim, j, i)])? < LE_ZERO {
        return Ok(false);
    }

    for x in 0..dim {
        let xi = entries[idx(dim, x, i)];
        if xi.is_infinity() {
            continue;
        }
        let via_xj = xi.checked_add(new_bound)?;
        let xj = idx(dim, x, j);
        if via_xj < entries[xj] {
            entries[xj] = via_xj;
        }
        for y in 0..dim {
            let jy = entries[idx(dim, j, y)];
            if jy.is_infinity() {
                continue;
            }
            let via_xy = via_xj.checked_add(jy)?;
            let xy = idx(dim, x, y);
            if via_xy < entries[xy] {
                entries[xy] = via_xy;
            }
        }
    }
    Ok(entries[idx(dim, i, i)] >= LE_ZERO)
}

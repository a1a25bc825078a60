//! Clock-bounds maps and the cache that memoises them per location tuple.
//!
//! Clock bounds (`L`/`U` for aLU, or one `M` for aM) are produced by a
//! static analysis that is explicitly out of scope (spec §1); this module
//! only defines the map shapes and a thread-safe memoisation layer in front
//! of a user-supplied "local bounds" function, grounded on
//! `tchecker::clockbounds::cache.hh`'s `cached_local_lu_map_t`. The spin
//! locks of the C++ original are replaced by sharded `Mutex`es — note in
//! DESIGN.md — since `std::sync::Mutex` is the idiomatic stand-in and the
//! critical sections here are a single hash-map lookup/insert.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::ta::Vloc;

/// Global or per-location `L`/`U` (or `M`) bounds, index `0` implicitly 0.
/// `bounds[i]` is the bound for clock `i+1` (clock `0` is never stored).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundsMap {
    bounds: Vec<i32>,
}

impl BoundsMap {
    pub fn new(n_clocks: usize) -> Self {
        BoundsMap { bounds: vec![i32::MIN; n_clocks] }
    }

    pub fn from_vec(bounds: Vec<i32>) -> Self {
        BoundsMap { bounds }
    }

    /// Bound for clock `i` (`1..=n`); `i == 0` is always `0` by convention.
    pub fn get(&self, i: usize) -> i32 {
        if i == 0 {
            0
        } else {
            self.bounds[i - 1]
        }
    }

    pub fn set(&mut self, i: usize, v: i32) {
        assert!(i >= 1, "clock 0 has a fixed bound of 0");
        self.bounds[i - 1] = self.bounds[i - 1].max(v);
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.bounds
    }

    /// Merge per-location contributions into the map used for a vloc: the
    /// maximum across all owning locations' contributions, since a bound
    /// must hold no matter which location of the tuple is "responsible".
    pub fn merge(maps: impl IntoIterator<Item = BoundsMap>) -> BoundsMap {
        let mut it = maps.into_iter();
        let mut acc = it.next().expect("merge requires at least one map");
        for m in it {
            for (a, b) in acc.bounds.iter_mut().zip(m.bounds.iter()) {
                *a = (*a).max(*b);
            }
        }
        acc
    }
}

/// A pair of clock-bounds maps, one for `L` (max lower-bound constants) and
/// one for `U` (max upper-bound constants). An aM instance is the
/// degenerate case `L == U`.
#[derive(Debug, Clone)]
pub struct LuBounds {
    pub l: BoundsMap,
    pub u: BoundsMap,
}

/// Either a global bounds pair (one instance for the whole system) or a
/// function from `Vloc` to a local bounds pair, merged from each process's
/// current location.
pub trait ClockBoundsSource: Send + Sync {
    fn bounds_for(&self, vloc: &Vloc) -> LuBounds;
}

/// A source that ignores the vloc and always returns the same bounds —
/// the "global" flavour named in spec §3.
pub struct GlobalBounds(pub LuBounds);

impl ClockBoundsSource for GlobalBounds {
    fn bounds_for(&self, _vloc: &Vloc) -> LuBounds {
        self.0.clone()
    }
}

/// A source that computes local bounds by merging a per-location
/// contribution table, as spec §3's "local" maps do.
pub struct LocalBounds {
    n_clocks: usize,
    /// `per_location[process][location] = contribution`.
    per_location: Vec<Vec<LuBounds>>,
}

impl LocalBounds {
    pub fn new(n_clocks: usize, per_location: Vec<Vec<LuBounds>>) -> Self {
        LocalBounds { n_clocks, per_location }
    }
}

impl ClockBoundsSource for LocalBounds {
    fn bounds_for(&self, vloc: &Vloc) -> LuBounds {
        let mut l = BoundsMap::new(self.n_clocks);
        let mut u = BoundsMap::new(self.n_clocks);
        for (proc, &loc) in vloc.locations().iter().enumerate() {
            let contrib = &self.per_location[proc][loc];
            for i in 1..=self.n_clocks {
                l.set(i, contrib.l.get(i));
                u.set(i, contrib.u.get(i));
            }
        }
        LuBounds { l, u }
    }
}

const SHARD_COUNT: usize = 16;

/// Memoised access to a [`ClockBoundsSource`], keyed by vloc.
///
/// Used both by [`crate::extrapolation`] (to avoid recomputing local bounds
/// for every extrapolated zone) and by [`crate::cover_graph`]'s aLU/aM
/// covering predicates. Sharded into sixteen independently-locked buckets
/// so concurrent readers from different vlocs rarely contend — the closest
/// idiomatic match to the spec's "spin-lock-protected buckets".
pub struct ClockBoundsCache {
    source: Box<dyn ClockBoundsSource>,
    shards: Vec<Mutex<HashMap<Vloc, LuBounds>>>,
}

impl ClockBoundsCache {
    pub fn new(source: Box<dyn ClockBoundsSource>) -> Self {
        let shards = (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect();
        ClockBoundsCache { source, shards }
    }

    fn shard_for(&self, vloc: &Vloc) -> &Mutex<HashMap<Vloc, LuBounds>> {
        use std::hash::{Hash, Hasher};
        let mut hasher = fnv::FnvHasher::default();
        vloc.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % SHARD_COUNT]
    }

    pub fn bounds_for(&self, vloc: &Vloc) -> LuBounds {
        let shard = self.shard_for(vloc);
        let mut guard = shard.lock().unwrap();
        if let Some(b) = guard.get(vloc) {
            return b.clone();
        }
        let computed = self.source.bounds_for(vloc);
        guard.insert(vloc.clone(), computed.clone());
        computed
    }
}

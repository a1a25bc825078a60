//! Pool allocator and background collector (spec §4.4's "shared objects"
//! collaborator, grounded on `tchecker::pool_t`/`tchecker::gc_t`).
//!
//! The C++ original backs each pool entry with an intrusive reference count
//! embedded in the object's own storage and reclaims freed chunks into a
//! block-local free list. Rust's aliasing rules make an intrusive refcount
//! awkward without `unsafe`; design note §9 replaces it with an index-based
//! arena (`Vec<Slot<T>>` plus a free-list of reclaimed indices) and an
//! out-of-band `Arc<AtomicUsize>` refcount per slot, cloned into every
//! [`Handle`]. The external shape — allocate, refcount-drop marks
//! collectable, a background thread periodically reclaims — is unchanged.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

struct Slot<T> {
    value: T,
    refcount: Arc<AtomicUsize>,
}

struct ArenaInner<T> {
    slots: Vec<Option<Slot<T>>>,
    free: Vec<usize>,
    /// Indices whose refcount dropped to zero since the last collection.
    collectable: Vec<usize>,
}

/// An index-based pool allocator for objects of type `T`. Allocation never
/// moves or invalidates existing handles; `collect()` reclaims slots whose
/// refcount is observed at zero, exactly the "collectable chunk" state of
/// `pool_t`.
pub struct Arena<T> {
    inner: Mutex<ArenaInner<T>>,
}

impl<T> Arena<T> {
    pub fn new() -> Arc<Arena<T>> {
        Arc::new(Arena { inner: Mutex::new(ArenaInner { slots: Vec::new(), free: Vec::new(), collectable: Vec::new() }) })
    }

    /// Allocates `value`, returning a refcounted handle. Reuses a reclaimed
    /// slot if one is available.
    pub fn alloc(self: &Arc<Self>, value: T) -> Handle<T> {
        let mut inner = self.inner.lock().unwrap();
        let refcount = Arc::new(AtomicUsize::new(1));
        let slot = Slot { value, refcount: refcount.clone() };
        let index = match inner.free.pop() {
            Some(i) => {
                inner.slots[i] = Some(slot);
                i
            }
            None => {
                inner.slots.push(Some(slot));
                inner.slots.len() - 1
            }
        };
        Handle { arena: self.clone(), index, refcount }
    }

    /// Number of live (allocated, not yet reclaimed) slots. Used by tests
    /// and by [`crate::covreach`] statistics.
    pub fn live_count(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.slots.iter().filter(|s| s.is_some()).count() - inner.collectable.len()
    }

    fn mark_collectable(&self, index: usize) {
        let mut inner = self.inner.lock().unwrap();
        inner.collectable.push(index);
    }

    /// Reclaims every slot marked collectable whose refcount is still zero
    /// (a concurrent `alloc` reusing a freed index cannot race this, since
    /// reuse only happens after the slot has actually been freed here).
    /// Mirrors `pool_t::collect`, minus the block-level memory reuse this
    /// design trades for index reuse.
    pub fn collect(&self) {
        let mut inner = self.inner.lock().unwrap();
        let pending = std::mem::take(&mut inner.collectable);
        for index in pending {
            let still_dead = inner.slots[index].as_ref().map(|s| s.refcount.load(Ordering::Acquire) == 0).unwrap_or(false);
            if still_dead {
                inner.slots[index] = None;
                inner.free.push(index);
            }
        }
    }
}

/// A refcounted handle into an [`Arena`]. Cloning increments the shared
/// refcount; dropping the last clone marks the slot collectable rather than
/// freeing it immediately — actual reclamation happens on the next
/// [`Arena::collect`] pass, run by [`Gc`] in the background.
pub struct Handle<T> {
    arena: Arc<Arena<T>>,
    index: usize,
    refcount: Arc<AtomicUsize>,
}

impl<T> Handle<T> {
    /// Applies `f` to the referenced value without cloning it out.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let inner = self.arena.inner.lock().unwrap();
        let slot = inner.slots[self.index].as_ref().expect("handle outlived its slot");
        f(&slot.value)
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        self.refcount.fetch_add(1, Ordering::Relaxed);
        Handle { arena: self.arena.clone(), index: self.index, refcount: self.refcount.clone() }
    }
}

impl<T> Drop for Handle<T> {
    fn drop(&mut self) {
        if self.refcount.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.arena.mark_collectable(self.index);
        }
    }
}

/// Garbage collector running a round-robin list of enrolled functions on a
/// dedicated thread, grounded on `tchecker::gc_t`. Each `Arena::collect`
/// closure is a natural fit for `enroll`.
pub struct Gc {
    functions: Arc<Mutex<Vec<Box<dyn Fn() + Send>>>>,
    stop: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
    period: Duration,
}

impl Gc {
    pub fn new(period: Duration) -> Gc {
        Gc { functions: Arc::new(Mutex::new(Vec::new())), stop: Arc::new(AtomicBool::new(true)), thread: Mutex::new(None), period }
    }

    /// Enrolls a function to be run repeatedly while the collector is
    /// running. Panics if collection is currently running, matching
    /// `gc_t::enroll`'s precondition.
    pub fn enroll(&self, f: impl Fn() + Send + 'static) {
        assert!(self.thread.lock().unwrap().is_none(), "cannot enroll while garbage collection is running");
        self.functions.lock().unwrap().push(Box::new(f));
    }

    pub fn start(&self) {
        let mut guard = self.thread.lock().unwrap();
        if guard.is_some() {
            return;
        }
        self.stop.store(false, Ordering::Release);
        let stop = self.stop.clone();
        let functions = self.functions.clone();
        let period = self.period;
        *guard = Some(std::thread::spawn(move || {
            while !stop.load(Ordering::Acquire) {
                for f in functions.lock().unwrap().iter() {
                    if stop.load(Ordering::Acquire) {
                        return;
                    }
                    f();
                }
                std::thread::sleep(period);
            }
        }));
    }

    /// Stops the collector thread, blocking until it terminates.
    pub fn stop(&self) {
        let mut guard = self.thread.lock().unwrap();
        if let Some(handle) = guard.take() {
            self.stop.store(true, Ordering::Release);
            let _ = handle.join();
        }
    }
}

impl Drop for Gc {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_then_drop_marks_collectable_and_collect_reclaims() {
        let arena: Arc<Arena<i32>> = Arena::new();
        let h1 = arena.alloc(42);
        assert_eq!(arena.live_count(), 1);
        drop(h1);
        arena.collect();
        assert_eq!(arena.live_count(), 0);
        let h2 = arena.alloc(7);
        h2.with(|v| assert_eq!(*v, 7));
    }

    #[test]
    fn clone_keeps_slot_alive_until_all_handles_drop() {
        let arena: Arc<Arena<i32>> = Arena::new();
        let h1 = arena.alloc(1);
        let h2 = h1.clone();
        drop(h1);
        arena.collect();
        assert_eq!(arena.live_count(), 1);
        drop(h2);
        arena.collect();
        assert_eq!(arena.live_count(), 0);
    }

    #[test]
    fn gc_thread_reclaims_in_background() {
        let arena: Arc<Arena<i32>> = Arena::new();
        let gc = Gc::new(Duration::from_millis(5));
        let arena_for_gc = arena.clone();
        gc.enroll(move || arena_for_gc.collect());
        gc.start();
        let h = arena.alloc(99);
        drop(h);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(arena.live_count(), 0);
        gc.stop();
    }
}

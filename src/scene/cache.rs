//! Dirty-flag cache for derived values

use std::cell::Cell;

/// A derived value paired with an invalidation flag.
///
/// Owners call [`Cached::invalidate`] from every mutator and read through
/// [`Cached::get_or_update`], which recomputes only when the flag is set and
/// clears it afterwards. Reads take `&self` so cached getters can be called
/// through shared references.
#[derive(Debug, Clone)]
pub struct Cached<T: Copy> {
    value: Cell<T>,
    dirty: Cell<bool>,
}

impl<T: Copy> Cached<T> {
    /// Create a cache holding `initial`, marked dirty so the first read recomputes.
    pub fn new(initial: T) -> Self {
        Self {
            value: Cell::new(initial),
            dirty: Cell::new(true),
        }
    }

    /// Mark the cached value stale.
    pub fn invalidate(&self) {
        self.dirty.set(true);
    }

    /// Whether the next read will recompute.
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Return the cached value, recomputing it first if it is stale.
    pub fn get_or_update(&self, compute: impl FnOnce() -> T) -> T {
        if self.dirty.get() {
            self.value.set(compute());
            self.dirty.set(false);
        }
        self.value.get()
    }
}

impl<T: Copy + Default> Default for Cached<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recomputes_only_when_dirty() {
        let cache = Cached::new(0u32);
        let mut calls = 0;

        assert_eq!(cache.get_or_update(|| { calls += 1; 7 }), 7);
        assert_eq!(cache.get_or_update(|| { calls += 1; 9 }), 7);
        assert_eq!(calls, 1);

        cache.invalidate();
        assert!(cache.is_dirty());
        assert_eq!(cache.get_or_update(|| { calls += 1; 9 }), 9);
        assert_eq!(calls, 2);
        assert!(!cache.is_dirty());
    }
}

//! Per-signature specialization cache.
//!
//! Each signature owns a slot holding at most one artifact. Lookups of a
//! filled slot take no lock beyond the map shard. Concurrent first calls
//! for the same signature serialize on the slot's build lock, so every
//! signature is built once no matter how many threads race for it; calls
//! for different signatures build in parallel.
//!
//! A failed build leaves its slot empty: the error goes to the caller that
//! ran the build and the next call tries again.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::signature::TypeSignature;

struct Slot<A> {
    value: OnceLock<Arc<A>>,
    build: Mutex<()>,
}

impl<A> Default for Slot<A> {
    fn default() -> Self {
        Slot {
            value: OnceLock::new(),
            build: Mutex::new(()),
        }
    }
}

/// Snapshot of cache counters.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from an existing artifact.
    pub hits: u64,
    /// Successful builds.
    pub builds: u64,
    /// Builds that returned an error.
    pub failures: u64,
    /// Signatures currently holding an artifact.
    pub entries: usize,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    builds: AtomicU64,
    failures: AtomicU64,
}

/// Thread-safe map from key (a [`TypeSignature`] by default) to a shared
/// artifact.
pub struct SpecializationCache<A, K = TypeSignature> {
    slots: DashMap<K, Arc<Slot<A>>>,
    counters: Counters,
}

impl<A, K: Eq + Hash + Clone> Default for SpecializationCache<A, K> {
    fn default() -> Self {
        SpecializationCache {
            slots: DashMap::new(),
            counters: Counters::default(),
        }
    }
}

impl<A, K> SpecializationCache<A, K>
where
    K: Eq + Hash + Clone + std::fmt::Display,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &K) -> Arc<Slot<A>> {
        if let Some(slot) = self.slots.get(key) {
            return Arc::clone(&slot);
        }
        Arc::clone(&self.slots.entry(key.clone()).or_default())
    }

    /// Artifact for `key`, if one has been built.
    pub fn get(&self, key: &K) -> Option<Arc<A>> {
        let found = self.slots.get(key)?.value.get().cloned();
        if found.is_some() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Artifact for `key`, running `build` if there is none yet.
    ///
    /// At most one `build` runs per key at a time; callers that lose the
    /// race wait and then share the winner's artifact.
    pub fn get_or_build<E>(
        &self,
        key: &K,
        build: impl FnOnce() -> Result<A, E>,
    ) -> Result<Arc<A>, E> {
        let slot = self.slot(key);
        if let Some(artifact) = slot.value.get() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(artifact));
        }

        let _guard = slot.build.lock();
        if let Some(artifact) = slot.value.get() {
            tracing::trace!(signature = %key, "specialization built by another caller");
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(artifact));
        }

        tracing::debug!(signature = %key, "building specialization");
        match build() {
            Ok(artifact) => {
                self.counters.builds.fetch_add(1, Ordering::Relaxed);
                let artifact = slot.value.get_or_init(|| Arc::new(artifact));
                Ok(Arc::clone(artifact))
            }
            Err(err) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(signature = %key, "specialization failed; not cached");
                Err(err)
            }
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.slots
            .get(key)
            .is_some_and(|slot| slot.value.get().is_some())
    }

    /// Drop the artifact for `key`. Returns whether one was present.
    ///
    /// Waits for a build already running on `key` to finish and drops its
    /// result too, so no later caller can observe a half-invalidated slot.
    /// Callers that were already waiting on that build still receive its
    /// artifact; everyone arriving after `invalidate` returns builds anew.
    pub fn invalidate(&self, key: &K) -> bool {
        let Some(slot) = self.slots.get(key).map(|slot| Arc::clone(&slot)) else {
            return false;
        };
        let _guard = slot.build.lock();
        let present = slot.value.get().is_some();
        self.slots
            .remove_if(key, |_, current| Arc::ptr_eq(current, &slot));
        present
    }

    pub fn clear(&self) {
        self.slots.clear();
    }

    /// Number of keys holding an artifact.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.value.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            builds: self.counters.builds.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;

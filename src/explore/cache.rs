//! Read-through, write-once evaluation cache.
//!
//! Identical `(scorecard, modifiers, trial_count)` evaluations reached via
//! different tree paths resolve to the same key and the same shared
//! [`OutcomeBundle`]. A key's bundle, once computed, is never recomputed or
//! mutated; repeat hits hand out the same `Arc`, so cached results are
//! bit-identical by construction.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::SimError;
use crate::modifiers::ScenarioModifiers;
use crate::outcome::OutcomeBundle;
use crate::scorecard::Scorecard;

/// Content hash identifying one evaluation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EvalKey([u8; 32]);

impl EvalKey {
    /// Hashes the evaluation inputs with blake3 over their canonical JSON.
    ///
    /// Serialization of these types cannot fail; `BTreeMap` dimension storage
    /// keeps the JSON canonical.
    #[must_use]
    pub fn compute(scorecard: &Scorecard, modifiers: &ScenarioModifiers, trial_count: usize) -> Self {
        let mut hasher = blake3::Hasher::new();
        let scorecard_json =
            serde_json::to_vec(scorecard).unwrap_or_default();
        let modifiers_json =
            serde_json::to_vec(modifiers).unwrap_or_default();
        hasher.update(&scorecard_json);
        hasher.update(&modifiers_json);
        hasher.update(&(trial_count as u64).to_le_bytes());
        Self(*hasher.finalize().as_bytes())
    }
}

/// Shared evaluation cache, safe for concurrent readers and writers.
#[derive(Debug, Default)]
pub struct EvalCache {
    entries: RwLock<HashMap<EvalKey, Arc<OutcomeBundle>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EvalCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up `key`, computing and inserting on a miss.
    ///
    /// The computation runs outside any lock. If two threads race on the
    /// same key, the first insert wins and the loser's bundle is discarded,
    /// preserving write-once semantics.
    ///
    /// # Errors
    ///
    /// Propagates the compute error; nothing is inserted on error.
    pub fn get_or_compute<F>(&self, key: EvalKey, compute: F) -> Result<Arc<OutcomeBundle>, SimError>
    where
        F: FnOnce() -> Result<OutcomeBundle, SimError>,
    {
        {
            let guard = self
                .entries
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(found) = guard.get(&key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Arc::clone(found));
            }
        }

        let computed = Arc::new(compute()?);
        self.misses.fetch_add(1, Ordering::Relaxed);

        let mut guard = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        // Another thread may have inserted it while we computed.
        let entry = guard.entry(key).or_insert_with(|| Arc::clone(&computed));
        Ok(Arc::clone(entry))
    }

    /// Cache hits so far.
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Cache misses (computed entries) so far.
    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// True when no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

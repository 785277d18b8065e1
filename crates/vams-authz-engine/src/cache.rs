//! Process-wide cache of compiled programs and their enforcers.
//!
//! # Purpose
//! Holds, per principal and MFA tier, the enforcer built from the last
//! successfully compiled [`PolicyProgram`] and the time it was built.
//!
//! # Key invariants
//! - An entry is one enforcer together with the program it was built from, so
//!   the cached text and enforcer are inserted, replaced and removed together.
//! - Only legitimate compile results are stored. Failure paths remove the
//!   entry, so the next call recompiles.
//! - Freshness is judged lazily on lookup; there is no background timer.
//!
//! # Notes
//! `built_at` uses `tokio::time::Instant` so paused-clock tests can advance
//! past the refresh interval.
use crate::policy::{EnforcerInstance, PolicyProgram};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use vams_authz::PrincipalId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub principal: PrincipalId,
    pub mfa_enabled: bool,
}

impl CacheKey {
    pub fn new(principal: PrincipalId, mfa_enabled: bool) -> Self {
        Self {
            principal,
            mfa_enabled,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    enforcer: Arc<EnforcerInstance>,
    built_at: Instant,
}

#[derive(Debug, Clone)]
pub enum Lookup {
    Fresh(Arc<EnforcerInstance>),
    Stale,
    Missing,
}

#[derive(Debug)]
pub struct PolicyCache {
    refresh_interval: Duration,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl PolicyCache {
    pub fn new(refresh_interval: Duration) -> Self {
        Self {
            refresh_interval,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Classify the entry for `key`.
    ///
    /// # What it does
    /// Returns the cached enforcer while it is younger than the refresh
    /// interval, `Stale` once the interval has elapsed, and `Missing` when no
    /// entry exists.
    ///
    /// # Invariants
    /// - Staleness is decided here, at lookup time. A stale entry stays in the
    ///   map until the caller replaces or removes it.
    ///
    /// # Example
    /// ```rust
    /// use std::time::Duration;
    /// use vams_authz::PrincipalId;
    /// use vams_authz_engine::{CacheKey, Lookup, PolicyCache};
    ///
    /// let cache = PolicyCache::new(Duration::from_secs(30));
    /// let key = CacheKey::new(PrincipalId::new("alice"), false);
    /// assert!(matches!(cache.lookup(&key), Lookup::Missing));
    /// ```
    pub fn lookup(&self, key: &CacheKey) -> Lookup {
        let entries = self.entries.lock();
        match entries.get(key) {
            None => Lookup::Missing,
            Some(entry) if entry.built_at.elapsed() < self.refresh_interval => {
                Lookup::Fresh(entry.enforcer.clone())
            }
            Some(_) => Lookup::Stale,
        }
    }

    /// Cache a built enforcer together with the program it was built from.
    pub fn store_ready(&self, key: CacheKey, enforcer: Arc<EnforcerInstance>) {
        let entry = CacheEntry {
            enforcer,
            built_at: Instant::now(),
        };
        self.entries.lock().insert(key, entry);
    }

    /// Drop the entry for `key` and hand back a deny-all program for the
    /// current call. The program is not cached.
    pub fn fail_closed(&self, key: &CacheKey) -> PolicyProgram {
        let removed = self.entries.lock().remove(key).is_some();
        tracing::debug!(principal = %key.principal, removed, "policy cache entry failed closed");
        PolicyProgram::deny_all(&key.principal)
    }

    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    /// Drop every entry for `principal`, across MFA tiers.
    pub fn invalidate_principal(&self, principal: &PrincipalId) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| &key.principal != principal);
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn policy_text(&self, key: &CacheKey) -> Option<String> {
        self.entries
            .lock()
            .get(key)
            .map(|entry| entry.enforcer.policy_text().to_string())
    }

    pub fn enforcer(&self, key: &CacheKey) -> Option<Arc<EnforcerInstance>> {
        self.entries
            .lock()
            .get(key)
            .map(|entry| entry.enforcer.clone())
    }

    /// Policy text and enforcer read under one lock.
    pub fn snapshot(&self, key: &CacheKey) -> Option<(String, Arc<EnforcerInstance>)> {
        self.entries.lock().get(key).map(|entry| {
            (
                entry.enforcer.policy_text().to_string(),
                entry.enforcer.clone(),
            )
        })
    }
}

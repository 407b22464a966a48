//! Member display-name resolution with a per-run cache.
//!
//! [`NameResolver`] owns the cache for its lifetime and guarantees at most one
//! profile lookup per identifier, including when several rayon workers ask for
//! the same uncached identifier at once: the first caller performs the lookup
//! and the rest wait on a condition variable for its result.
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use log::debug;
use rayon::prelude::*;

use crate::ldif::{LdifError, decode_tuple, normalize_line};
use crate::source::{ProfileSource, SourceError};

/// Profile attributes that may carry a member's full name.
pub const CANDIDATE_NAME_ATTRS: [&str; 3] = ["displayName", "description", "gecos"];

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no candidate name attribute in profile of {0}")]
    NoCandidateName(String),
    #[error("profile of {id}: {source}")]
    Malformed {
        id: String,
        #[source]
        source: LdifError,
    },
    #[error("profile lookup for {id} failed: {source}")]
    Source {
        id: String,
        #[source]
        source: SourceError,
    },
    #[error("name cache lock poisoned")]
    Poisoned,
}

enum Slot {
    InFlight,
    Resolved(String),
}

/// Resolves member ids to full names, memoizing every successful lookup.
pub struct NameResolver<P> {
    source: P,
    cache: Mutex<HashMap<String, Slot>>,
    resolved: Condvar,
    lookups: AtomicUsize,
    hits: AtomicUsize,
}

impl<P: ProfileSource> NameResolver<P> {
    pub fn new(source: P) -> Self {
        Self {
            source,
            cache: Mutex::new(HashMap::new()),
            resolved: Condvar::new(),
            lookups: AtomicUsize::new(0),
            hits: AtomicUsize::new(0),
        }
    }

    /// Return the full name for `id`, consulting the cache first.
    pub fn resolve(&self, id: &str) -> Result<String, ResolveError> {
        let mut cache = self.lock()?;
        loop {
            let in_flight = match cache.get(id) {
                Some(Slot::Resolved(name)) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(name.clone());
                }
                Some(Slot::InFlight) => true,
                None => false,
            };
            if !in_flight {
                break;
            }
            cache = self
                .resolved
                .wait(cache)
                .map_err(|_| ResolveError::Poisoned)?;
        }
        cache.insert(id.to_string(), Slot::InFlight);
        drop(cache);
        let claim = InFlight { resolver: self, id };

        let outcome = self.lookup(id);
        if let Ok(name) = &outcome {
            self.lock()?
                .insert(id.to_string(), Slot::Resolved(name.clone()));
        }
        drop(claim);
        outcome
    }

    /// Resolve several ids concurrently on the rayon pool. Results keep the
    /// input order; any failure fails the whole batch.
    pub fn resolve_all(&self, ids: &[String]) -> Result<Vec<String>, ResolveError> {
        ids.par_iter().map(|id| self.resolve(id)).collect()
    }

    /// Profile lookups issued so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Resolutions answered from the cache.
    pub fn cache_hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Slot>>, ResolveError> {
        self.cache.lock().map_err(|_| ResolveError::Poisoned)
    }

    fn lookup(&self, id: &str) -> Result<String, ResolveError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        debug!("looking up profile of {}", id);
        let lines = self
            .source
            .profile_lines(id)
            .map_err(|source| ResolveError::Source {
                id: id.to_string(),
                source,
            })?;
        let mut candidates = Vec::new();
        // Blank lines only terminate the record.
        for line in lines.iter().map(|l| normalize_line(l)).filter(|l| !l.is_empty()) {
            let (attr, value) = decode_tuple(line).map_err(|source| {
                ResolveError::Malformed {
                    id: id.to_string(),
                    source,
                }
            })?;
            if CANDIDATE_NAME_ATTRS.contains(&attr) {
                candidates.push(value);
            }
        }
        longest(candidates).ok_or_else(|| ResolveError::NoCandidateName(id.to_string()))
    }
}

/// Releases a claimed slot when its lookup ends, however it ends. A slot
/// still marked in flight (failed or unwound lookup) is removed so waiters
/// retry the lookup themselves.
struct InFlight<'a, P> {
    resolver: &'a NameResolver<P>,
    id: &'a str,
}

impl<P> Drop for InFlight<'_, P> {
    fn drop(&mut self) {
        let mut cache = self
            .resolver
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if matches!(cache.get(self.id), Some(Slot::InFlight)) {
            cache.remove(self.id);
        }
        drop(cache);
        self.resolver.resolved.notify_all();
    }
}

/// Longest non-empty value; the earliest wins a tie.
fn longest<'a>(values: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut best: Option<(usize, &str)> = None;
    for v in values {
        let len = v.chars().count();
        if len == 0 {
            continue;
        }
        if best.is_none_or(|(best_len, _)| len > best_len) {
            best = Some((len, v));
        }
    }
    best.map(|(_, v)| v.to_string())
}

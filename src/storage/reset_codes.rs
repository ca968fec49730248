// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Short-lived record of verified password-reset codes.
//!
//! Verifying a reset OTP confirms the principal for a bounded window; the
//! subsequent reset consumes the confirmation. Entries are advisory state
//! for the reset flow only and are never consulted for ledger access.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

const DEFAULT_CAPACITY: usize = 10_000;

struct Confirmation {
    confirmed_at: Instant,
}

/// In-process LRU store of reset confirmations keyed by principal id.
pub struct ResetConfirmations {
    cache: Mutex<LruCache<String, Confirmation>>,
    ttl: Duration,
}

impl ResetConfirmations {
    /// Create a store with the given capacity and TTL.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self::new(DEFAULT_CAPACITY, ttl)
    }

    /// Record that `principal_id` verified its reset code.
    pub fn confirm(&self, principal_id: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(
                principal_id.to_string(),
                Confirmation {
                    confirmed_at: Instant::now(),
                },
            );
        }
    }

    /// Whether a live confirmation exists, without consuming it.
    #[cfg(test)]
    fn is_confirmed(&self, principal_id: &str) -> bool {
        let Ok(mut cache) = self.cache.lock() else {
            return false;
        };
        match cache.get(principal_id) {
            Some(entry) if entry.confirmed_at.elapsed() < self.ttl => true,
            Some(_) => {
                cache.pop(principal_id);
                false
            }
            None => false,
        }
    }

    /// Consume a live confirmation. Returns `false` if none or expired.
    pub fn take(&self, principal_id: &str) -> bool {
        let Ok(mut cache) = self.cache.lock() else {
            return false;
        };
        cache
            .pop(principal_id)
            .is_some_and(|entry| entry.confirmed_at.elapsed() < self.ttl)
    }
}

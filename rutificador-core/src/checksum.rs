//! Weighted modulo check character calculation with bounded memoization
//!
//! The base is scanned from its least significant digit; each digit is
//! multiplied by the next verification factor, cycling through the factor
//! sequence (2,3,4,5,6,7,2,3,... with the defaults). With
//! `r = (modulo - sum % modulo) % modulo` the check character is the decimal
//! digit `r` when `r < 10`, otherwise `'k'`.
//!
//! Results are a pure function of `(base, factors, modulo)`, so the cache can
//! never serve a stale value; eviction only bounds memory.

use crate::config::{RutConfig, DEFAULT_CACHE_CAPACITY};
use crate::detail::{ErrorCode, ErrorDetail};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::trace;

/// Compute the check character without touching any cache
pub fn compute_verification_digit(base_digits: &str, config: &RutConfig) -> Result<char, ErrorDetail> {
    let base = validate_base_digits(base_digits)?;
    Ok(weighted_check_char(
        base,
        config.verification_factors(),
        config.modulo(),
    ))
}

/// Compute the check character, memoized in `cache`
pub fn verification_digit(
    base_digits: &str,
    config: &RutConfig,
    cache: &ChecksumCache,
) -> Result<char, ErrorDetail> {
    let base = validate_base_digits(base_digits)?;
    Ok(cache.get_or_compute(base, config))
}

fn validate_base_digits(base_digits: &str) -> Result<&str, ErrorDetail> {
    let base = base_digits.trim();
    if base.is_empty() {
        return Err(ErrorDetail::new(ErrorCode::EmptyBase));
    }
    if !base.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ErrorDetail::new(ErrorCode::InvalidDigits)
            .with_message(format!("Base number '{}' must contain only digits", base)));
    }
    Ok(base)
}

/// Core algorithm over an already validated ASCII digit string
fn weighted_check_char(base: &str, factors: &[u32], modulo: u32) -> char {
    let modulo = u64::from(modulo);
    let sum = base
        .bytes()
        .rev()
        .zip(factors.iter().cycle())
        .fold(0u64, |acc, (digit, &factor)| {
            (acc + u64::from(digit - b'0') * u64::from(factor)) % modulo
        });

    let r = (modulo - sum % modulo) % modulo;
    if r < 10 {
        char::from(b'0' + r as u8)
    } else {
        'k'
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    factors: Arc<[u32]>,
    modulo: u32,
    base: String,
}

struct CacheSlot {
    value: char,
    tick: u64,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<CacheKey, CacheSlot>,
    /// Recency index: tick -> key, oldest first
    recency: BTreeMap<u64, CacheKey>,
    next_tick: u64,
    hits: u64,
    misses: u64,
}

/// Cache statistics snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Bounded LRU memo of check characters
///
/// Shared across worker threads behind an `Arc`; the owner decides its
/// lifetime. A capacity of zero disables memoization.
pub struct ChecksumCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
}

impl ChecksumCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            size: inner.entries.len(),
            capacity: self.capacity,
            hits: inner.hits,
            misses: inner.misses,
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.recency.clear();
        inner.hits = 0;
        inner.misses = 0;
    }

    fn get_or_compute(&self, base: &str, config: &RutConfig) -> char {
        if self.capacity == 0 {
            return weighted_check_char(base, config.verification_factors(), config.modulo());
        }

        let key = CacheKey {
            factors: config.shared_factors(),
            modulo: config.modulo(),
            base: base.to_string(),
        };

        {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            if let Some(slot) = inner.entries.get_mut(&key) {
                inner.next_tick += 1;
                let tick = inner.next_tick;
                inner.recency.remove(&slot.tick);
                slot.tick = tick;
                inner.recency.insert(tick, key);
                inner.hits += 1;
                return slot.value;
            }
            inner.misses += 1;
        }

        // Computed unlocked; a concurrent miss on the same key yields the same value
        let value = weighted_check_char(base, config.verification_factors(), config.modulo());

        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.next_tick += 1;
        let tick = inner.next_tick;

        if let Some(slot) = inner.entries.get_mut(&key) {
            inner.recency.remove(&slot.tick);
            slot.tick = tick;
            inner.recency.insert(tick, key);
            return value;
        }

        while inner.entries.len() >= self.capacity {
            match inner.recency.pop_first() {
                Some((_, oldest)) => {
                    trace!(base = %oldest.base, "Evicting checksum cache entry");
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }

        inner.recency.insert(tick, key.clone());
        inner.entries.insert(key, CacheSlot { value, tick });
        value
    }
}

impl Default for ChecksumCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl std::fmt::Debug for ChecksumCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("ChecksumCache")
            .field("size", &stats.size)
            .field("capacity", &stats.capacity)
            .finish()
    }
}

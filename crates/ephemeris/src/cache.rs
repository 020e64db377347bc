//! Distance cache: Earth-to-everything distances, recomputed at most once
//! per hour (specification §4.1 "Caching").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use latency_core::vector::Vector3;

/// One cached distance measurement from Earth to a catalog object.
#[derive(Debug, Clone)]
pub struct DistanceEntry {
    pub target_name: &'static str,
    pub distance_km: f64,
    pub position_au: Vector3,
}

pub const CACHE_TTL: Duration = Duration::from_secs(3_600);

struct CacheState {
    computed_at: Instant,
    entries: Vec<DistanceEntry>,
}

/// Single-writer, timestamped snapshot behind a mutex (specification §5):
/// readers take the lock only to clone the current snapshot; a flag
/// prevents two concurrent refreshes from racing.
pub struct DistanceCache {
    state: Mutex<Option<CacheState>>,
    refreshing: AtomicBool,
}

impl Default for DistanceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DistanceCache {
    pub fn new() -> Self {
        DistanceCache {
            state: Mutex::new(None),
            refreshing: AtomicBool::new(false),
        }
    }

    /// Return the cached entries if they are younger than [`CACHE_TTL`];
    /// otherwise call `compute` to produce a fresh snapshot and cache it.
    /// The whole check-and-refresh runs under the single writer lock, so a
    /// concurrent caller blocks until the refresh completes rather than
    /// triggering a second one.
    pub fn get_or_refresh(&self, compute: impl FnOnce() -> Vec<DistanceEntry>) -> Vec<DistanceEntry> {
        let mut guard = self.state.lock().unwrap();
        if let Some(cached) = guard.as_ref() {
            if cached.computed_at.elapsed() < CACHE_TTL {
                return cached.entries.clone();
            }
        }

        self.refreshing.store(true, Ordering::SeqCst);
        let entries = compute();
        *guard = Some(CacheState {
            computed_at: Instant::now(),
            entries: entries.clone(),
        });
        self.refreshing.store(false, Ordering::SeqCst);
        entries
    }

    /// Force the next `get_or_refresh` call to recompute, regardless of age.
    pub fn invalidate(&self) {
        let mut guard = self.state.lock().unwrap();
        *guard = None;
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::SeqCst)
    }

    pub fn age(&self) -> Option<Duration> {
        let guard = self.state.lock().unwrap();
        guard.as_ref().map(|s| s.computed_at.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_queries_within_ttl_are_identical() {
        let cache = DistanceCache::new();
        let mut calls = 0;
        let first = cache.get_or_refresh(|| {
            calls += 1;
            vec![DistanceEntry {
                target_name: "mars",
                distance_km: 1.0,
                position_au: [1.0, 0.0, 0.0],
            }]
        });
        let second = cache.get_or_refresh(|| {
            calls += 1;
            vec![DistanceEntry {
                target_name: "mars",
                distance_km: 2.0,
                position_au: [2.0, 0.0, 0.0],
            }]
        });
        assert_eq!(calls, 1);
        assert_eq!(first[0].distance_km, second[0].distance_km);
    }

    #[test]
    fn invalidate_forces_recompute() {
        let cache = DistanceCache::new();
        cache.get_or_refresh(|| {
            vec![DistanceEntry {
                target_name: "mars",
                distance_km: 1.0,
                position_au: [1.0, 0.0, 0.0],
            }]
        });
        cache.invalidate();
        let mut recomputed = false;
        cache.get_or_refresh(|| {
            recomputed = true;
            vec![]
        });
        assert!(recomputed);
    }
}

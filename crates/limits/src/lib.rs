//! Light-time injection and hand-rolled token-bucket limiting.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

const SPEED_OF_LIGHT_KM_S: f64 = 299_792.458;

/// Default fixed override applied in test mode.
pub const DEFAULT_TEST_MODE_LATENCY: Duration = Duration::from_millis(3);

/// Computes one-way light-time delay, either from live distance or from a
/// fixed test-mode override so integration tests run in milliseconds while
/// exercising the same code paths.
#[derive(Debug, Clone, Copy)]
pub enum LatencyClock {
    Live,
    Fixed(Duration),
}

impl LatencyClock {
    pub fn from_env() -> LatencyClock {
        if let Ok(ms) = std::env::var("LATENCY_TEST_MODE_MS") {
            if let Ok(parsed) = ms.parse::<u64>() {
                return LatencyClock::Fixed(Duration::from_millis(parsed));
            }
        }
        if std::env::var("LATENCY_TEST_MODE").as_deref() == Ok("1") {
            return LatencyClock::Fixed(DEFAULT_TEST_MODE_LATENCY);
        }
        LatencyClock::Live
    }

    /// One-way light-time delay for a distance in km.
    pub fn one_way_delay(&self, distance_km: f64) -> Duration {
        match self {
            LatencyClock::Live => Duration::from_secs_f64((distance_km / SPEED_OF_LIGHT_KM_S).max(0.0)),
            LatencyClock::Fixed(d) => *d,
        }
    }

    /// Sleep for the one-way delay, cancellable like any other `tokio`
    /// future — dropping it (e.g. the client disconnecting) cancels the
    /// wait without side effects.
    pub async fn sleep_one_way(&self, distance_km: f64) {
        let delay = self.one_way_delay(distance_km);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// A token bucket with capacity `burst` tokens, refilled continuously at
/// `rate` tokens/second. Used both for per-body bandwidth caps (tokens =
/// bytes) and per-(client, body) admission rate limiting (tokens = requests).
pub struct TokenBucket {
    capacity: f64,
    rate_per_sec: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(rate_per_sec: f64, burst: f64) -> TokenBucket {
        TokenBucket {
            capacity: burst,
            rate_per_sec,
            state: Mutex::new(BucketState {
                tokens: burst,
                last_refill: Instant::now(),
            }),
        }
    }

    fn refill(state: &mut BucketState, capacity: f64, rate_per_sec: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * rate_per_sec).min(capacity);
        state.last_refill = now;
    }

    /// Try to take `cost` tokens without blocking. Returns `false` (and
    /// takes nothing) if insufficient tokens are available.
    pub async fn try_acquire(&self, cost: f64) -> bool {
        let mut state = self.state.lock().await;
        Self::refill(&mut state, self.capacity, self.rate_per_sec);
        if state.tokens >= cost {
            state.tokens -= cost;
            true
        } else {
            false
        }
    }

    /// Take `cost` tokens, blocking (sleeping) until enough have refilled.
    pub async fn acquire(&self, cost: f64) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                Self::refill(&mut state, self.capacity, self.rate_per_sec);
                if state.tokens >= cost {
                    state.tokens -= cost;
                    None
                } else {
                    let deficit = cost - state.tokens;
                    Some(Duration::from_secs_f64(deficit / self.rate_per_sec))
                }
            };
            match wait {
                None => return,
                Some(duration) => tokio::time::sleep(duration).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn bucket_admits_up_to_burst_then_blocks() {
        let bucket = TokenBucket::new(1.0, 2.0);
        assert!(bucket.try_acquire(2.0).await);
        assert!(!bucket.try_acquire(1.0).await);
    }

    #[tokio::test(start_paused = true)]
    async fn bucket_refills_over_time() {
        let bucket = TokenBucket::new(10.0, 1.0);
        assert!(bucket.try_acquire(1.0).await);
        assert!(!bucket.try_acquire(1.0).await);
        tokio::time::advance(Duration::from_millis(200)).await;
        assert!(bucket.try_acquire(1.0).await);
    }

    #[test]
    fn fixed_latency_ignores_distance() {
        let clock = LatencyClock::Fixed(Duration::from_millis(5));
        assert_eq!(clock.one_way_delay(1.0), Duration::from_millis(5));
        assert_eq!(clock.one_way_delay(1e9), Duration::from_millis(5));
    }

    #[test]
    fn live_latency_matches_distance_over_c() {
        let clock = LatencyClock::Live;
        let d = 225_000_000.0;
        let expected = Duration::from_secs_f64(d / SPEED_OF_LIGHT_KM_S);
        assert_eq!(clock.one_way_delay(d), expected);
    }
}

//! SOCKS5 server: CONNECT, BIND, and UDP ASSOCIATE over `tokio`, implementing
//! RFC 1928 without GSSAPI or username/password auth (specification §4.5).

pub mod bind;
pub mod connect;
pub mod protocol;
pub mod resolve;
mod server;
pub mod state;
pub mod udp;

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;

use latency_ephemeris::Ephemeris;
use latency_limits::{LatencyClock, TokenBucket};
use latency_metrics::Metrics;
use latency_policy::{PolicyTable, SecurityValidator};

pub use server::serve_socks;

/// Upstream dial/read/write timeouts, mirrored from the HTTP core's
/// per-body policy record (specification §5).
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
pub const UDP_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Shared, process-lifetime state handed to every accepted SOCKS
/// connection (specification §9: no process-wide singletons).
pub struct SocksContext {
    pub ephemeris: Arc<Ephemeris>,
    pub policy: Arc<PolicyTable>,
    pub security: Arc<SecurityValidator>,
    pub metrics: Arc<Metrics>,
    pub latency_clock: LatencyClock,
    rate_buckets: AsyncMutex<HashMap<(IpAddr, String), Arc<TokenBucket>>>,
}

impl SocksContext {
    pub fn new(
        ephemeris: Arc<Ephemeris>,
        policy: Arc<PolicyTable>,
        security: Arc<SecurityValidator>,
        metrics: Arc<Metrics>,
        latency_clock: LatencyClock,
    ) -> SocksContext {
        SocksContext {
            ephemeris,
            policy,
            security,
            metrics,
            latency_clock,
            rate_buckets: AsyncMutex::new(HashMap::new()),
        }
    }

    pub(crate) async fn rate_limit_bucket(&self, client_ip: IpAddr, body: &str) -> Arc<TokenBucket> {
        let key = (client_ip, body.to_string());
        let mut buckets = self.rate_buckets.lock().await;
        buckets
            .entry(key)
            .or_insert_with(|| Arc::new(TokenBucket::new(5.0 / 60.0, 5.0)))
            .clone()
    }
}

pub(crate) fn current_centuries_since_j2000() -> f64 {
    let jd = latency_ephemeris::time::julian_date_now();
    latency_ephemeris::time::centuries_since_j2000_tdb(jd)
}

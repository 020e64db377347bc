//! Centralized per-body bandwidth/rate-limit policy and the security
//! validator, built once at startup into an immutable table.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

/// Bandwidth/rate/timeout policy for a single body, or the fallback default.
#[derive(Debug, Clone, Copy)]
pub struct PolicyRecord {
    pub bandwidth_bps: u64,
    pub rate_limit_rps: f64,
    pub burst_seconds: f64,
    pub dial_timeout: Duration,
    pub read_write_timeout: Duration,
}

/// Default policy applied to any catalog object with no explicit override:
/// 1 Mbps, the baseline for outer planets and beyond.
pub const DEFAULT_POLICY: PolicyRecord = PolicyRecord {
    bandwidth_bps: 1_000_000,
    rate_limit_rps: 5.0 / 60.0,
    burst_seconds: 1.0,
    dial_timeout: Duration::from_secs(10),
    read_write_timeout: Duration::from_secs(60),
};

/// Higher-bandwidth policy applied to bodies near Earth: 10 Mbps.
pub const NEAR_EARTH_POLICY: PolicyRecord = PolicyRecord {
    bandwidth_bps: 10_000_000,
    ..DEFAULT_POLICY
};

const NEAR_EARTH_BODIES: &[&str] = &["earth", "moon", "sun"];

/// Immutable table of per-body policy, indexed by lowercased-hyphenated
/// catalog name, built once at startup and never mutated thereafter.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    overrides: HashMap<String, PolicyRecord>,
}

impl PolicyTable {
    /// Build the table from the documented defaults, then apply
    /// `bandwidth_overrides`/`rate_overrides` read once from
    /// `LATENCY_BANDWIDTH_<BODY>_BPS`/`LATENCY_RATE_<BODY>_RPS` at startup.
    pub fn build(
        bandwidth_overrides: &HashMap<String, u64>,
        rate_overrides: &HashMap<String, f64>,
    ) -> PolicyTable {
        let mut overrides = HashMap::new();
        for &name in NEAR_EARTH_BODIES {
            overrides.insert(name.to_string(), NEAR_EARTH_POLICY);
        }
        for (body, bps) in bandwidth_overrides {
            let record = overrides.entry(body.clone()).or_insert(DEFAULT_POLICY);
            record.bandwidth_bps = *bps;
        }
        for (body, rps) in rate_overrides {
            let record = overrides.entry(body.clone()).or_insert(DEFAULT_POLICY);
            record.rate_limit_rps = *rps;
        }
        PolicyTable { overrides }
    }

    pub fn get(&self, body_name: &str) -> PolicyRecord {
        self.overrides.get(body_name).copied().unwrap_or(DEFAULT_POLICY)
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        PolicyTable::build(&HashMap::new(), &HashMap::new())
    }
}

/// Allow/deny state for target dialing, published as an immutable snapshot:
/// mutations publish a new snapshot atomically via copy-on-write.
#[derive(Debug, Clone)]
pub struct SecuritySnapshot {
    pub allow_ports: Vec<u16>,
    pub allow_hosts: Vec<String>,
    pub test_mode: bool,
}

impl Default for SecuritySnapshot {
    fn default() -> Self {
        SecuritySnapshot {
            allow_ports: vec![80, 443],
            allow_hosts: Vec::new(),
            test_mode: false,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SecurityError {
    #[error("target host `{0}` is private/loopback/link-local")]
    ForbiddenHost(String),
    #[error("target host `{0}` recurses into latency.space")]
    RecursiveTarget(String),
    #[error("target port {0} is not in the allowed port set")]
    ForbiddenPort(u16),
}

/// Validates every destination descriptor before it is dialed (§4.7).
pub struct SecurityValidator {
    snapshot: ArcSwap<SecuritySnapshot>,
}

impl SecurityValidator {
    pub fn new(initial: SecuritySnapshot) -> SecurityValidator {
        SecurityValidator {
            snapshot: ArcSwap::from_pointee(initial),
        }
    }

    /// Publish a new snapshot atomically; readers in flight keep using the
    /// snapshot they already loaded.
    pub fn publish(&self, snapshot: SecuritySnapshot) {
        self.snapshot.store(Arc::new(snapshot));
    }

    pub fn snapshot(&self) -> Arc<SecuritySnapshot> {
        self.snapshot.load_full()
    }

    /// Validate a resolved target host/port against the current snapshot.
    pub fn validate(&self, host: &str, port: u16) -> Result<(), SecurityError> {
        let snapshot = self.snapshot.load();

        let lower = host.to_ascii_lowercase();
        if lower == "latency.space" || lower.ends_with(".latency.space") {
            return Err(SecurityError::RecursiveTarget(host.to_string()));
        }

        if !snapshot.test_mode {
            if let Ok(ip) = host.parse::<IpAddr>() {
                if is_forbidden_ip(&ip) {
                    return Err(SecurityError::ForbiddenHost(host.to_string()));
                }
            } else if is_forbidden_hostname(&lower) {
                return Err(SecurityError::ForbiddenHost(host.to_string()));
            }
        }

        let allowed_by_default = snapshot.allow_ports.contains(&port);
        let allowed_explicitly = snapshot.allow_hosts.iter().any(|h| h.eq_ignore_ascii_case(host));
        if !allowed_by_default && !allowed_explicitly {
            return Err(SecurityError::ForbiddenPort(port));
        }

        Ok(())
    }
}

fn is_forbidden_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_private() || v4.is_link_local(),
        IpAddr::V6(v6) => v6.is_loopback() || (v6.segments()[0] & 0xffc0) == 0xfe80,
    }
}

fn is_forbidden_hostname(lower: &str) -> bool {
    lower == "localhost" || lower.ends_with(".local") || lower.ends_with(".internal")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_applies_to_unknown_body() {
        let table = PolicyTable::default();
        assert_eq!(table.get("jupiter").bandwidth_bps, DEFAULT_POLICY.bandwidth_bps);
    }

    #[test]
    fn near_earth_bodies_get_higher_bandwidth() {
        let table = PolicyTable::default();
        assert_eq!(table.get("earth").bandwidth_bps, 10_000_000);
    }

    #[test]
    fn bandwidth_override_applies() {
        let mut bw = HashMap::new();
        bw.insert("mars".to_string(), 2_000_000u64);
        let table = PolicyTable::build(&bw, &HashMap::new());
        assert_eq!(table.get("mars").bandwidth_bps, 2_000_000);
    }

    #[test]
    fn default_snapshot_rejects_private_ip() {
        let validator = SecurityValidator::new(SecuritySnapshot::default());
        let err = validator.validate("127.0.0.1", 80).unwrap_err();
        assert_eq!(err, SecurityError::ForbiddenHost("127.0.0.1".to_string()));
    }

    #[test]
    fn recursive_target_is_rejected_regardless_of_test_mode() {
        let mut snapshot = SecuritySnapshot::default();
        snapshot.test_mode = true;
        let validator = SecurityValidator::new(snapshot);
        let err = validator.validate("foo.latency.space", 80).unwrap_err();
        assert_eq!(err, SecurityError::RecursiveTarget("foo.latency.space".to_string()));
    }

    #[test]
    fn test_mode_bypasses_private_ip_rejection() {
        let mut snapshot = SecuritySnapshot::default();
        snapshot.test_mode = true;
        let validator = SecurityValidator::new(snapshot);
        assert!(validator.validate("127.0.0.1", 80).is_ok());
    }

    #[test]
    fn port_outside_policy_is_rejected() {
        let validator = SecurityValidator::new(SecuritySnapshot::default());
        let err = validator.validate("example.com", 8080).unwrap_err();
        assert_eq!(err, SecurityError::ForbiddenPort(8080));
    }

    #[test]
    fn publish_replaces_snapshot_atomically() {
        let validator = SecurityValidator::new(SecuritySnapshot::default());
        validator.publish(SecuritySnapshot {
            allow_ports: vec![8080],
            allow_hosts: Vec::new(),
            test_mode: false,
        });
        assert!(validator.validate("example.com", 8080).is_ok());
        assert!(validator.validate("example.com", 80).is_err());
    }
}

//! Environment-variable configuration loading for the latency-space proxy.
//!
//! All variables are optional; every field has a documented default. Config
//! is read once at startup into a single validated value rather than
//! scattering `std::env::var` calls through the binary.

use std::collections::HashMap;
use std::net::{SocketAddr, ToSocketAddrs};

use thiserror::Error;

pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:80";
pub const DEFAULT_HTTPS_ADDR: &str = "0.0.0.0:443";
pub const DEFAULT_SOCKS_ADDR: &str = "0.0.0.0:1080";
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:9090";
const DEFAULT_ALLOW_PORTS: &[u16] = &[80, 443];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} = `{value}` is not a valid socket address: {source}")]
    InvalidAddr {
        var: &'static str,
        value: String,
        #[source]
        source: std::io::Error,
    },
    #[error("LATENCY_ALLOW_PORTS entry `{0}` is not a valid port number")]
    InvalidPort(String),
    #[error("{0} does not name a valid u64 bandwidth (bps)")]
    InvalidBandwidth(String),
    #[error("{0} does not name a valid f64 rate (requests/sec)")]
    InvalidRate(String),
}

/// Fully resolved process configuration, read once at startup from the
/// `LATENCY_*` environment variables, all of which are optional.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub http_addr: SocketAddr,
    pub https_addr: SocketAddr,
    pub socks_addr: SocketAddr,
    pub metrics_addr: SocketAddr,
    pub cert_dir: Option<String>,
    pub allow_hosts: Vec<String>,
    pub allow_ports: Vec<u16>,
    pub test_mode: bool,
    pub test_mode_latency_ms: Option<u64>,
    /// `LATENCY_BANDWIDTH_<BODY>_BPS`, keyed by lowercased-hyphenated body name.
    pub bandwidth_overrides: HashMap<String, u64>,
    /// `LATENCY_RATE_<BODY>_RPS`, keyed by lowercased-hyphenated body name.
    pub rate_overrides: HashMap<String, f64>,
}

impl ProxyConfig {
    /// Read and validate configuration from the process environment. Every
    /// variable is optional; a missing variable falls back to the
    /// documented default rather than erroring.
    pub fn from_env() -> Result<ProxyConfig, ConfigError> {
        let http_addr = parse_addr_env("LATENCY_HTTP_ADDR", DEFAULT_HTTP_ADDR)?;
        let https_addr = parse_addr_env("LATENCY_HTTPS_ADDR", DEFAULT_HTTPS_ADDR)?;
        let socks_addr = parse_addr_env("LATENCY_SOCKS_ADDR", DEFAULT_SOCKS_ADDR)?;
        let metrics_addr = parse_addr_env("LATENCY_METRICS_ADDR", DEFAULT_METRICS_ADDR)?;
        let cert_dir = std::env::var("LATENCY_CERT_DIR").ok();

        let allow_hosts = std::env::var("LATENCY_ALLOW_HOSTS")
            .map(|v| split_nonempty(&v))
            .unwrap_or_default();

        let allow_ports = match std::env::var("LATENCY_ALLOW_PORTS") {
            Ok(raw) => {
                let mut ports = Vec::new();
                for entry in split_nonempty(&raw) {
                    let port: u16 = entry
                        .parse()
                        .map_err(|_| ConfigError::InvalidPort(entry.clone()))?;
                    ports.push(port);
                }
                ports
            }
            Err(_) => DEFAULT_ALLOW_PORTS.to_vec(),
        };

        let test_mode = std::env::var("LATENCY_TEST_MODE").as_deref() == Ok("1");
        let test_mode_latency_ms = std::env::var("LATENCY_TEST_MODE_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok());

        let (bandwidth_overrides, rate_overrides) = scan_policy_overrides()?;

        Ok(ProxyConfig {
            http_addr,
            https_addr,
            socks_addr,
            metrics_addr,
            cert_dir,
            allow_hosts,
            allow_ports,
            test_mode,
            test_mode_latency_ms,
            bandwidth_overrides,
            rate_overrides,
        })
    }
}

fn parse_addr_env(var: &'static str, default: &str) -> Result<SocketAddr, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    resolve_one(&raw).map_err(|source| ConfigError::InvalidAddr {
        var,
        value: raw,
        source,
    })
}

fn resolve_one(raw: &str) -> std::io::Result<SocketAddr> {
    raw.to_socket_addrs()?
        .next()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "no address resolved"))
}

fn split_nonempty(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Scan the environment for `LATENCY_BANDWIDTH_<BODY>_BPS` and
/// `LATENCY_RATE_<BODY>_RPS`, converting `<BODY>` (upper-snake) into the
/// catalogue's lowercased-hyphenated key form.
fn scan_policy_overrides() -> Result<(HashMap<String, u64>, HashMap<String, f64>), ConfigError> {
    let mut bandwidth = HashMap::new();
    let mut rate = HashMap::new();

    for (key, value) in std::env::vars() {
        if let Some(body) = key
            .strip_prefix("LATENCY_BANDWIDTH_")
            .and_then(|rest| rest.strip_suffix("_BPS"))
        {
            let bps: u64 = value
                .parse()
                .map_err(|_| ConfigError::InvalidBandwidth(key.clone()))?;
            bandwidth.insert(body.to_ascii_lowercase().replace('_', "-"), bps);
        } else if let Some(body) = key
            .strip_prefix("LATENCY_RATE_")
            .and_then(|rest| rest.strip_suffix("_RPS"))
        {
            let rps: f64 = value
                .parse()
                .map_err(|_| ConfigError::InvalidRate(key.clone()))?;
            rate.insert(body.to_ascii_lowercase().replace('_', "-"), rps);
        }
    }

    Ok((bandwidth, rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_latency_vars() {
        for (key, _) in std::env::vars() {
            if key.starts_with("LATENCY_") {
                unsafe { std::env::remove_var(&key) };
            }
        }
    }

    #[test]
    fn defaults_apply_with_no_environment() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_latency_vars();
        let config = ProxyConfig::from_env().unwrap();
        assert_eq!(config.http_addr.port(), 80);
        assert_eq!(config.https_addr.port(), 443);
        assert_eq!(config.socks_addr.port(), 1080);
        assert_eq!(config.metrics_addr.port(), 9090);
        assert_eq!(config.allow_ports, vec![80, 443]);
        assert!(!config.test_mode);
    }

    #[test]
    fn bandwidth_and_rate_overrides_are_parsed_by_body() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_latency_vars();
        unsafe {
            std::env::set_var("LATENCY_BANDWIDTH_MARS_BPS", "2000000");
            std::env::set_var("LATENCY_RATE_NEW_HORIZONS_RPS", "0.5");
        }
        let config = ProxyConfig::from_env().unwrap();
        assert_eq!(config.bandwidth_overrides.get("mars"), Some(&2_000_000));
        assert_eq!(config.rate_overrides.get("new-horizons"), Some(&0.5));
        clear_latency_vars();
    }

    #[test]
    fn invalid_port_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_latency_vars();
        unsafe { std::env::set_var("LATENCY_ALLOW_PORTS", "80,not-a-port") };
        let err = ProxyConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort(_)));
        clear_latency_vars();
    }

    #[test]
    fn test_mode_flag_is_read() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_latency_vars();
        unsafe { std::env::set_var("LATENCY_TEST_MODE", "1") };
        let config = ProxyConfig::from_env().unwrap();
        assert!(config.test_mode);
        clear_latency_vars();
    }
}

//! Wires the ephemeris, catalogue, resolver, policy, metrics, and
//! configuration crates into the HTTP(S) and SOCKS5 proxy cores, and owns
//! the process's `tokio` runtime and shutdown handling. The shared state is
//! built once and injected into the resolver, HTTP, and SOCKS cores via
//! constructor parameters; there are no process-wide singletons.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use latency_config::ProxyConfig;
use latency_ephemeris::Ephemeris;
use latency_limits::LatencyClock;
use latency_metrics::Metrics;
use latency_policy::{PolicyTable, SecuritySnapshot, SecurityValidator};

/// Grace period the process waits for in-flight connections to drain after
/// a shutdown signal before forcing close.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Process exit codes.
#[derive(Debug, Clone, Copy)]
pub enum ExitCode {
    Clean = 0,
    FatalInit = 1,
    BindFailure = 2,
    CatalogInvalid = 3,
}

/// Everything the process needs to run both proxy cores and the metrics
/// listener, built once at startup.
pub struct Proxy {
    pub config: ProxyConfig,
    pub ephemeris: Arc<Ephemeris>,
    pub policy: Arc<PolicyTable>,
    pub security: Arc<SecurityValidator>,
    pub metrics: Arc<Metrics>,
    pub latency_clock: LatencyClock,
}

impl Proxy {
    /// Load configuration, validate the catalogue, and construct the shared
    /// state every listener depends on.
    pub fn init() -> Result<Proxy, ExitCode> {
        let config = ProxyConfig::from_env().map_err(|err| {
            error!(%err, "configuration failed to load");
            ExitCode::FatalInit
        })?;

        let catalog = latency_catalog::load().map_err(|err| {
            error!(%err, "catalog failed validation");
            ExitCode::CatalogInvalid
        })?;

        let ephemeris = Arc::new(Ephemeris::new(catalog));
        let policy = Arc::new(PolicyTable::build(
            &config.bandwidth_overrides,
            &config.rate_overrides,
        ));
        let security = Arc::new(SecurityValidator::new(SecuritySnapshot {
            allow_ports: config.allow_ports.clone(),
            allow_hosts: config.allow_hosts.clone(),
            test_mode: config.test_mode,
        }));
        let metrics = Arc::new(Metrics::new());
        let latency_clock = LatencyClock::from_env();

        Ok(Proxy {
            config,
            ephemeris,
            policy,
            security,
            metrics,
            latency_clock,
        })
    }

    /// Run every listener concurrently until a shutdown signal arrives, then
    /// drain in-flight connections for up to [`SHUTDOWN_GRACE`].
    pub async fn run(self) -> ExitCode {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let http_ctx = Arc::new(latency_http::ProxyContext::new(
            self.ephemeris.clone(),
            self.policy.clone(),
            self.security.clone(),
            self.metrics.clone(),
            self.latency_clock,
        ));
        let socks_ctx = Arc::new(latency_socks::SocksContext::new(
            self.ephemeris.clone(),
            self.policy.clone(),
            self.security.clone(),
            self.metrics.clone(),
            self.latency_clock,
        ));

        let mut tasks = tokio::task::JoinSet::new();

        tasks.spawn(latency_http::serve_http(
            self.config.http_addr,
            http_ctx.clone(),
            shutdown_rx.clone(),
        ));

        if let Some(cert_dir) = self.config.cert_dir.clone() {
            match latency_http::certs::CertStore::load(cert_dir.clone()) {
                Ok(cert_store) => {
                    let reload_store = cert_store.clone();
                    let mut reload_shutdown = shutdown_rx.clone();
                    tasks.spawn(async move {
                        loop {
                            tokio::select! {
                                _ = tokio::time::sleep(Duration::from_secs(30)) => {
                                    reload_store.maybe_reload();
                                }
                                _ = reload_shutdown.changed() => {
                                    if *reload_shutdown.borrow() {
                                        break;
                                    }
                                }
                            }
                        }
                        Ok(())
                    });
                    tasks.spawn(latency_http::serve_https(
                        self.config.https_addr,
                        http_ctx.clone(),
                        cert_store,
                        shutdown_rx.clone(),
                    ));
                }
                Err(err) => {
                    warn!(%err, dir = %cert_dir, "failed to load TLS certificates, HTTPS listener disabled");
                }
            }
        } else {
            info!("LATENCY_CERT_DIR not set, HTTPS listener disabled");
        }

        tasks.spawn(latency_socks::serve_socks(
            self.config.socks_addr,
            socks_ctx,
            shutdown_rx.clone(),
        ));

        tasks.spawn(latency_http::serve_metrics(
            self.config.metrics_addr,
            self.metrics.clone(),
            shutdown_rx.clone(),
        ));

        let mut sigterm = match signal_stream() {
            Ok(s) => s,
            Err(err) => {
                error!(%err, "failed to install signal handlers");
                return ExitCode::FatalInit;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("shutdown signal received, draining connections");
            }
            result = wait_for_bind_failure(&mut tasks) => {
                if let Some(err) = result {
                    error!(%err, "listener task exited with a bind failure");
                    return ExitCode::BindFailure;
                }
            }
        }

        let _ = shutdown_tx.send(true);
        let drain = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while tasks.join_next().await.is_some() {}
        });
        if drain.await.is_err() {
            warn!("shutdown grace period elapsed, forcing close");
        }

        ExitCode::Clean
    }
}

/// Unified SIGINT/SIGTERM listener.
fn signal_stream() -> std::io::Result<SignalSet> {
    SignalSet::new()
}

struct SignalSet {
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
}

impl SignalSet {
    #[cfg(unix)]
    fn new() -> std::io::Result<SignalSet> {
        Ok(SignalSet {
            sigterm: tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    fn new() -> std::io::Result<SignalSet> {
        Ok(SignalSet {})
    }

    async fn recv(&mut self) {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = self.sigterm.recv() => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

/// Resolves once any spawned listener task exits early with a bind error,
/// so the process can terminate with exit code 2 rather than hang.
async fn wait_for_bind_failure(
    tasks: &mut tokio::task::JoinSet<std::io::Result<()>>,
) -> Option<std::io::Error> {
    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(Ok(())) => continue,
            Ok(Err(err)) if err.kind() == std::io::ErrorKind::AddrInUse => return Some(err),
            Ok(Err(err)) => {
                warn!(%err, "listener task ended with an error");
            }
            Err(join_err) => {
                warn!(%join_err, "listener task panicked");
            }
        }
    }
    None
}

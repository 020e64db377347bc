//! Hot-reloadable TLS certificate snapshot.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum CertError {
    #[error("failed to read certificate directory {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("{0} contains no usable certificate chain")]
    NoCertificates(PathBuf),
    #[error("{0} contains no usable private key")]
    NoPrivateKey(PathBuf),
    #[error("rustls rejected the certificate/key pair: {0}")]
    Rustls(#[from] rustls::Error),
}

/// Loads `fullchain.pem`/`privkey.pem` from `dir` into a `rustls::ServerConfig`.
fn load_server_config(dir: &Path) -> Result<ServerConfig, CertError> {
    let cert_path = dir.join("fullchain.pem");
    let key_path = dir.join("privkey.pem");

    let cert_file =
        std::fs::read(&cert_path).map_err(|e| CertError::Read(cert_path.clone(), e))?;
    let key_file = std::fs::read(&key_path).map_err(|e| CertError::Read(key_path.clone(), e))?;

    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut cert_file.as_slice())
        .filter_map(Result::ok)
        .collect();
    if certs.is_empty() {
        return Err(CertError::NoCertificates(cert_path));
    }

    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut key_file.as_slice())
        .ok()
        .flatten()
        .ok_or_else(|| CertError::NoPrivateKey(key_path))?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    Ok(config)
}

/// Copy-on-write TLS configuration snapshot, refreshed from `dir` whenever
/// the directory's modification time changes. A failed reload keeps the
/// previous configuration in place and logs the parse error.
pub struct CertStore {
    dir: PathBuf,
    snapshot: ArcSwap<ServerConfig>,
    last_mtime: std::sync::Mutex<Option<std::time::SystemTime>>,
}

impl CertStore {
    pub fn load(dir: impl Into<PathBuf>) -> Result<Arc<CertStore>, CertError> {
        let dir = dir.into();
        let config = load_server_config(&dir)?;
        let last_mtime = dir_mtime(&dir);
        Ok(Arc::new(CertStore {
            dir,
            snapshot: ArcSwap::from_pointee(config),
            last_mtime: std::sync::Mutex::new(last_mtime),
        }))
    }

    pub fn current(&self) -> Arc<ServerConfig> {
        self.snapshot.load_full()
    }

    /// Check the directory's mtime and reload if it changed. Intended to be
    /// polled periodically by a background task.
    pub fn maybe_reload(&self) {
        let mtime = dir_mtime(&self.dir);
        let mut last = self.last_mtime.lock().unwrap();
        if mtime == *last {
            return;
        }
        match load_server_config(&self.dir) {
            Ok(config) => {
                self.snapshot.store(Arc::new(config));
                *last = mtime;
                info!(dir = %self.dir.display(), "reloaded TLS certificate");
            }
            Err(err) => {
                warn!(dir = %self.dir.display(), %err, "certificate reload failed, keeping previous cert");
            }
        }
    }
}

fn dir_mtime(dir: &Path) -> Option<std::time::SystemTime> {
    std::fs::metadata(dir).and_then(|m| m.modified()).map_err(|e| {
        error!(dir = %dir.display(), %e, "failed to stat cert directory");
        e
    }).ok()
}

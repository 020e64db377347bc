//! Applies the destination resolver (specification §4.3) to a parsed SOCKS5
//! request, and maps resolver/ephemeris/security errors onto SOCKS reply
//! codes (specification §4.5 "Reply codes used").

use latency_catalog::Catalog;
use latency_ephemeris::{Ephemeris, EphemerisError};
use latency_policy::SecurityError;
use latency_resolver::{self, Mode, ResolveError};

use crate::protocol::{Address, ReplyCode};

/// A resolved SOCKS target: the body whose light-time gates the connection,
/// and the concrete host/port to dial.
pub struct Target {
    pub body_name: String,
    pub target_host: String,
    pub target_port: u16,
}

#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("{0}")]
    Resolve(#[from] ResolveError),
    #[error("{0}")]
    Security(#[from] SecurityError),
    #[error("ephemeris error: {0}")]
    Ephemeris(#[from] EphemerisError),
    #[error("body `{0}` is occluded from Earth")]
    Occluded(String),
    #[error("destination resolves to a body's apex page, which has no dialable upstream")]
    NoUpstream,
}

impl TargetError {
    pub fn reply_code(&self) -> ReplyCode {
        match self {
            TargetError::Resolve(ResolveError::UnknownBody(_)) => ReplyCode::HostUnreachable,
            TargetError::Resolve(ResolveError::RecursiveTarget(_)) => ReplyCode::NotAllowed,
            TargetError::Resolve(ResolveError::InvalidTargetHost(_)) => ReplyCode::HostUnreachable,
            TargetError::Resolve(ResolveError::InvalidPath(_)) => ReplyCode::GeneralFailure,
            TargetError::Security(SecurityError::ForbiddenHost(_)) => ReplyCode::NotAllowed,
            TargetError::Security(SecurityError::RecursiveTarget(_)) => ReplyCode::NotAllowed,
            TargetError::Security(SecurityError::ForbiddenPort(_)) => ReplyCode::NotAllowed,
            TargetError::Ephemeris(_) => ReplyCode::GeneralFailure,
            TargetError::Occluded(_) => ReplyCode::NetworkUnreachable,
            TargetError::NoUpstream => ReplyCode::HostUnreachable,
        }
    }
}

/// Resolve a SOCKS request address into a [`Target`], running the same
/// resolver the HTTP core uses (specification §4.5: "The DOMAIN form is the
/// primary routing surface: the resolver of §4.3 is applied to it").
///
/// IP-literal addresses (ATYP V4/V6) bypass the hostname grammar entirely
/// and are routed as if destined for Earth — there is no celestial body
/// encoded in a bare IP address.
pub fn resolve_target<'a>(
    catalog: &'a Catalog,
    address: &Address,
    port: u16,
) -> Result<Target, TargetError> {
    match address {
        Address::Ip(ip) => Ok(Target {
            body_name: "earth".to_string(),
            target_host: ip.to_string(),
            target_port: port,
        }),
        Address::Domain(domain) => {
            let destination = latency_resolver::resolve(catalog, domain, None)?;
            match destination.mode {
                Mode::HttpProxy | Mode::Direct => {
                    let target_host = destination
                        .target_host
                        .ok_or(TargetError::NoUpstream)?;
                    Ok(Target {
                        body_name: destination.body.name.to_string(),
                        target_host,
                        target_port: port,
                    })
                }
                Mode::Portal | Mode::Debug => Err(TargetError::NoUpstream),
            }
        }
    }
}

/// Reject the target if its body is currently occluded from Earth
/// (specification §4.3 "If the body is occluded at resolution time...").
pub fn check_occlusion(ephemeris: &Ephemeris, body_name: &str, t: f64) -> Result<(), TargetError> {
    let occlusion = ephemeris.occlusion("earth", body_name, t)?;
    if occlusion.is_occluded() {
        return Err(TargetError::Occluded(body_name.to_string()));
    }
    Ok(())
}

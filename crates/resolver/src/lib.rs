//! Destination resolver: parses a request's target hostname into a
//! (celestial body, optional target host) descriptor (specification §4.3, §6).

use latency_catalog::{Catalog, CelestialObject, ObjectKind};

pub const PUBLIC_SUFFIX: &str = "latency.space";

/// How a resolved destination should be handled by a proxy core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Portal,
    Debug,
    HttpProxy,
    Direct,
}

/// The three debug surfaces under `/_debug/` (specification §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugEndpoint {
    Metrics,
    Distances,
    Status,
}

impl DebugEndpoint {
    /// Match the last path segment of a `/_debug/...` request.
    pub fn from_path(path: &str) -> Option<DebugEndpoint> {
        let trimmed = path.trim_start_matches('/');
        let rest = trimmed.strip_prefix("_debug/")?;
        match rest.trim_end_matches('/') {
            "metrics" => Some(DebugEndpoint::Metrics),
            "distances" => Some(DebugEndpoint::Distances),
            "status" => Some(DebugEndpoint::Status),
            _ => None,
        }
    }
}

/// Destination descriptor produced by [`resolve`] (specification §3).
#[derive(Debug, Clone)]
pub struct Destination<'a> {
    pub body: &'a CelestialObject,
    pub mode: Mode,
    pub target_host: Option<String>,
    pub debug_endpoint: Option<DebugEndpoint>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("`{0}` does not name a registered celestial body")]
    UnknownBody(String),
    #[error("target host `{0}` recurses back into {PUBLIC_SUFFIX}")]
    RecursiveTarget(String),
    #[error("`{0}` is not a syntactically valid DNS name or IP literal")]
    InvalidTargetHost(String),
    #[error("`{0}` is not a recognized debug path")]
    InvalidPath(String),
}

/// Resolve a request's `Host`/SNI/SOCKS-domain value (and optional request
/// path, for the debug surface) into a [`Destination`].
///
/// Host matching is case-insensitive; the public suffix `.latency.space` is
/// stripped before the remaining labels are interpreted right-to-left per
/// the grammar in specification §6.
pub fn resolve<'a>(
    catalog: &'a Catalog,
    host: &str,
    path: Option<&str>,
) -> Result<Destination<'a>, ResolveError> {
    if let Some(endpoint) = path.and_then(DebugEndpoint::from_path) {
        // §4.3 rule 4: a recognized debug path wins regardless of host body.
        let body = catalog.find(&lowercase(host).trim_end_matches(&format!(".{PUBLIC_SUFFIX}")))
            .or_else(|| catalog.find("earth"))
            .unwrap_or_else(|| catalog.sun());
        return Ok(Destination {
            body,
            mode: Mode::Debug,
            target_host: None,
            debug_endpoint: Some(endpoint),
        });
    }

    let lower = lowercase(host);
    let suffix = format!(".{PUBLIC_SUFFIX}");

    let labels: &str = if lower == PUBLIC_SUFFIX {
        ""
    } else if let Some(prefix) = lower.strip_suffix(&suffix) {
        prefix
    } else {
        return Err(ResolveError::UnknownBody(host.to_string()));
    };

    if labels.is_empty() {
        // §4.3 rule 3: the apex domain is Earth's portal.
        let earth = catalog
            .find("earth")
            .ok_or_else(|| ResolveError::UnknownBody("earth".to_string()))?;
        return Ok(Destination {
            body: earth,
            mode: Mode::Portal,
            target_host: None,
            debug_endpoint: None,
        });
    }

    let parts: Vec<&str> = labels.split('.').collect();

    // Rule 2: last two labels are (moon, planet) with a matching parent.
    if parts.len() >= 2 {
        let planet_label = parts[parts.len() - 1];
        let moon_label = parts[parts.len() - 2];
        if let (Some(moon), Some(planet)) = (catalog.find(moon_label), catalog.find(planet_label)) {
            if matches!(moon.kind, ObjectKind::Moon) && moon.parent == planet.name {
                let prefix = &parts[..parts.len() - 2];
                return finish(moon, prefix);
            }
        }
    }

    // Rule 1: last label alone identifies a body.
    let body_label = parts[parts.len() - 1];
    if let Some(body) = catalog.find(body_label) {
        if !matches!(body.kind, ObjectKind::Moon) {
            let prefix = &parts[..parts.len() - 1];
            return finish(body, prefix);
        }
    }

    Err(ResolveError::UnknownBody(host.to_string()))
}

fn finish<'a>(body: &'a CelestialObject, prefix_labels: &[&str]) -> Result<Destination<'a>, ResolveError> {
    if prefix_labels.is_empty() {
        return Ok(Destination {
            body,
            mode: Mode::Portal,
            target_host: None,
            debug_endpoint: None,
        });
    }
    let target_host = prefix_labels.join(".");
    validate_target_host(&target_host)?;
    Ok(Destination {
        body,
        mode: Mode::HttpProxy,
        target_host: Some(target_host),
        debug_endpoint: None,
    })
}

/// A target host must be a syntactically plausible DNS name or IPv4/IPv6
/// literal, and must not itself recurse into `.latency.space`.
fn validate_target_host(host: &str) -> Result<(), ResolveError> {
    let lower = lowercase(host);
    if lower == PUBLIC_SUFFIX || lower.ends_with(&format!(".{PUBLIC_SUFFIX}")) {
        return Err(ResolveError::RecursiveTarget(host.to_string()));
    }
    if host.is_empty() || host.len() > 253 {
        return Err(ResolveError::InvalidTargetHost(host.to_string()));
    }
    if host.parse::<std::net::IpAddr>().is_ok() {
        return Ok(());
    }
    let valid_label = |label: &str| {
        !label.is_empty()
            && label.len() <= 63
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !label.starts_with('-')
            && !label.ends_with('-')
    };
    if host.split('.').all(valid_label) {
        Ok(())
    } else {
        Err(ResolveError::InvalidTargetHost(host.to_string()))
    }
}

fn lowercase(s: &str) -> String {
    s.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        latency_catalog::load().unwrap()
    }

    #[test]
    fn resolves_body_only() {
        let catalog = catalog();
        let dest = resolve(&catalog, "mars.latency.space", None).unwrap();
        assert_eq!(dest.body.name, "mars");
        assert_eq!(dest.mode, Mode::Portal);
        assert!(dest.target_host.is_none());
    }

    #[test]
    fn resolves_prefixed_target_with_body() {
        let catalog = catalog();
        let dest = resolve(&catalog, "example.com.mars.latency.space", None).unwrap();
        assert_eq!(dest.body.name, "mars");
        assert_eq!(dest.mode, Mode::HttpProxy);
        assert_eq!(dest.target_host.as_deref(), Some("example.com"));
    }

    #[test]
    fn resolves_moon_with_matching_planet() {
        let catalog = catalog();
        let dest = resolve(&catalog, "moon.earth.latency.space", None).unwrap();
        assert_eq!(dest.body.name, "moon");
        assert_eq!(dest.mode, Mode::Portal);
    }

    #[test]
    fn resolves_prefixed_target_with_moon() {
        let catalog = catalog();
        let dest = resolve(&catalog, "example.com.europa.jupiter.latency.space", None).unwrap();
        assert_eq!(dest.body.name, "europa");
        assert_eq!(dest.target_host.as_deref(), Some("example.com"));
    }

    #[test]
    fn apex_domain_is_earth_portal() {
        let catalog = catalog();
        let dest = resolve(&catalog, "latency.space", None).unwrap();
        assert_eq!(dest.body.name, "earth");
        assert_eq!(dest.mode, Mode::Portal);
    }

    #[test]
    fn mismatched_moon_planet_pair_is_unknown() {
        let catalog = catalog();
        // Europa's parent is Jupiter, not Saturn.
        let result = resolve(&catalog, "x.europa.saturn.latency.space", None);
        assert!(matches!(result, Err(ResolveError::UnknownBody(_))));
    }

    #[test]
    fn recursive_target_is_rejected() {
        let catalog = catalog();
        let result = resolve(&catalog, "evil.latency.space.mars.latency.space", None);
        assert!(matches!(
            result,
            Err(ResolveError::UnknownBody(_)) | Err(ResolveError::RecursiveTarget(_))
        ));
    }

    #[test]
    fn debug_path_overrides_mode() {
        let catalog = catalog();
        let dest = resolve(&catalog, "latency.space", Some("/_debug/metrics")).unwrap();
        assert_eq!(dest.mode, Mode::Debug);
        assert_eq!(dest.debug_endpoint, Some(DebugEndpoint::Metrics));
    }
}

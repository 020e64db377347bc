//! Analytic ephemeris and geometry engine (specification §4.1).
//!
//! [`Ephemeris`] is a plain value type owning the catalogue and the
//! single-hour distance cache; it carries no process-wide state, so the
//! proxy's HTTP core, SOCKS core, and offline CLI each hold an `Arc` to the
//! same instance rather than reaching into package-level globals.

pub mod cache;
pub mod geometry;
pub mod kepler;
pub mod position;
pub mod time;

use latency_catalog::{Catalog, CelestialObject};
use latency_core::vector::Vector3;

use cache::{DistanceCache, DistanceEntry};
use geometry::Occlusion;

#[derive(Debug, thiserror::Error)]
pub enum EphemerisError {
    #[error("unknown celestial object `{0}`")]
    NotFound(String),
    #[error("parent chain broken for `{0}`: parent `{1}` not found")]
    BrokenParentChain(String, String),
    #[error("parent chain for `{0}` exceeds maximum depth (cycle?)")]
    ParentChainTooDeep(String),
}

/// Maximum parent-chain depth to walk before declaring a cycle. The
/// catalogue is at most Sun -> planet -> moon -> spacecraft deep (3 hops),
/// so this is a generous guard rather than a tight bound.
const MAX_PARENT_DEPTH: usize = 16;

/// Owns the catalogue and distance cache; constructed once at startup and
/// shared (typically via `Arc`) with every consumer.
pub struct Ephemeris {
    catalog: Catalog,
    distance_cache: DistanceCache,
}

impl Ephemeris {
    pub fn new(catalog: Catalog) -> Self {
        Ephemeris {
            catalog,
            distance_cache: DistanceCache::new(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Absolute (Sun-centered) position of `object` at Julian centuries `t`
    /// since J2000 TDB, walking the parent chain for moons and spacecraft.
    pub fn absolute_position_au(
        &self,
        object: &CelestialObject,
        t: f64,
    ) -> Result<Vector3, EphemerisError> {
        if object.parent.is_empty() {
            // The Sun is the coordinate origin.
            return Ok([0.0, 0.0, 0.0]);
        }

        let mut chain = vec![object];
        let mut current = object;
        for _ in 0..MAX_PARENT_DEPTH {
            if current.parent.is_empty() {
                break;
            }
            let parent = self.catalog.find(current.parent).ok_or_else(|| {
                EphemerisError::BrokenParentChain(current.name.to_string(), current.parent.to_string())
            })?;
            chain.push(parent);
            current = parent;
        }
        if !current.parent.is_empty() {
            return Err(EphemerisError::ParentChainTooDeep(object.name.to_string()));
        }

        let mut position = [0.0, 0.0, 0.0];
        for link in chain.iter().rev() {
            if link.parent.is_empty() {
                continue;
            }
            let local = if matches!(link.kind, latency_catalog::ObjectKind::Planet)
                || matches!(link.kind, latency_catalog::ObjectKind::DwarfPlanet)
                || matches!(link.kind, latency_catalog::ObjectKind::Asteroid)
            {
                position::heliocentric_position_au(link, t)
            } else {
                position::parent_relative_position_au(link, t)
            };
            position = latency_core::vector::add(&position, &local);
        }
        Ok(position)
    }

    /// Look up a catalog object by name, or [`EphemerisError::NotFound`].
    pub fn require(&self, name: &str) -> Result<&CelestialObject, EphemerisError> {
        self.catalog
            .find(name)
            .ok_or_else(|| EphemerisError::NotFound(name.to_string()))
    }

    /// Distance in km between two named catalog objects at the given instant.
    pub fn distance_km(
        &self,
        source: &str,
        target: &str,
        t: f64,
    ) -> Result<f64, EphemerisError> {
        let source_obj = self.require(source)?;
        let target_obj = self.require(target)?;
        let source_pos = self.absolute_position_au(source_obj, t)?;
        let target_pos = self.absolute_position_au(target_obj, t)?;
        Ok(geometry::distance_km(&source_pos, &target_pos))
    }

    /// Occlusion state of the `observer -> target` sight line at instant `t`.
    pub fn occlusion<'a>(
        &'a self,
        observer: &str,
        target: &str,
        t: f64,
    ) -> Result<Occlusion<'a>, EphemerisError> {
        let observer_obj = self.require(observer)?;
        let target_obj = self.require(target)?;
        let observer_pos = self.absolute_position_au(observer_obj, t)?;
        let target_pos = self.absolute_position_au(target_obj, t)?;

        let mut all_positions = Vec::with_capacity(self.catalog.all().len());
        for candidate in self.catalog.all() {
            if candidate.name == observer_obj.name || candidate.name == target_obj.name {
                continue;
            }
            let pos = self.absolute_position_au(candidate, t)?;
            all_positions.push((candidate, pos));
        }

        Ok(geometry::check_occlusion(&observer_pos, &target_pos, &all_positions))
    }

    /// Earth-to-everything distances, refreshed at most once per hour
    /// (specification §4.1 "Caching").
    pub fn earth_distances(&self, t: f64) -> Vec<DistanceEntry> {
        self.distance_cache.get_or_refresh(|| {
            let earth = match self.catalog.find("earth") {
                Some(e) => e,
                None => return Vec::new(),
            };
            let earth_pos = match self.absolute_position_au(earth, t) {
                Ok(p) => p,
                Err(_) => return Vec::new(),
            };
            self.catalog
                .all()
                .iter()
                .filter(|o| o.name != "earth")
                .filter_map(|object| {
                    let pos = self.absolute_position_au(object, t).ok()?;
                    Some(DistanceEntry {
                        target_name: object.name,
                        distance_km: geometry::distance_km(&earth_pos, &pos),
                        position_au: pos,
                    })
                })
                .collect()
        })
    }

    pub fn invalidate_distance_cache(&self) {
        self.distance_cache.invalidate();
    }

    pub fn distance_cache_age(&self) -> Option<std::time::Duration> {
        self.distance_cache.age()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Ephemeris {
        Ephemeris::new(latency_catalog::load().unwrap())
    }

    #[test]
    fn every_object_stays_within_sanity_bound() {
        let eph = engine();
        // Representative sample across the J2000-2100 window, rather than
        // exhaustive daily sampling, keeps this test fast.
        for year_offset in [0.0, 25.0, 50.0, 75.0, 100.0] {
            let t = year_offset / 100.0;
            for object in eph.catalog.all() {
                if object.name == "sun" {
                    continue;
                }
                let pos = eph.absolute_position_au(object, t).unwrap();
                let radius_au = (pos[0] * pos[0] + pos[1] * pos[1] + pos[2] * pos[2]).sqrt();
                assert!(
                    radius_au < 200.0,
                    "{} at t={} exceeded 200 AU: {}",
                    object.name,
                    t,
                    radius_au
                );
            }
        }
    }

    #[test]
    fn occlusion_is_symmetric_by_occluder() {
        let eph = engine();
        let t = 0.25;
        let a = eph.occlusion("earth", "mars", t).unwrap();
        let b = eph.occlusion("mars", "earth", t).unwrap();
        assert_eq!(a.occluder_name(), b.occluder_name());
    }

    #[test]
    fn distance_cache_returns_identical_values_within_ttl() {
        let eph = engine();
        let first = eph.earth_distances(0.1);
        let second = eph.earth_distances(0.1);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.distance_km, b.distance_km);
        }
    }

    #[test]
    fn mars_distance_from_earth_is_plausible() {
        let eph = engine();
        let d = eph.distance_km("earth", "mars", 0.1).unwrap();
        assert!(d > 5.0e7 && d < 4.1e8, "implausible Earth-Mars distance: {d}");
    }

    #[test]
    fn unknown_body_is_not_found() {
        let eph = engine();
        assert!(matches!(
            eph.distance_km("earth", "nonexistent", 0.0),
            Err(EphemerisError::NotFound(_))
        ));
    }
}

//! Static celestial object catalogue.
//!
//! The catalogue is a compile-time table of [`CelestialObject`] records —
//! no reflection, no dynamic loading, no live ephemeris feed. It is ingested
//! once at process start via [`load`], which normalizes every angle to
//! `[0, 360)` and validates that every non-Sun object names an existing
//! parent.

pub mod data;

use std::collections::HashMap;

/// Kind of catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Star,
    Planet,
    DwarfPlanet,
    Moon,
    Asteroid,
    Spacecraft,
}

/// Six orbital elements at J2000 plus their per-century rates.
///
/// Units: `a` is AU for heliocentric bodies, km for parent-relative bodies;
/// angles are degrees. `w`/`dw` (argument of periapsis) are only present for
/// parent-relative orbits that specify it directly rather than deriving it
/// from `lp - n`.
#[derive(Debug, Clone, Copy)]
pub struct OrbitalElements {
    pub a: f64,
    pub e: f64,
    pub i_deg: f64,
    pub l_deg: f64,
    pub lp_deg: f64,
    pub n_deg: f64,
    pub da_per_century: f64,
    pub de_per_century: f64,
    pub di_per_century: f64,
    pub dl_per_century: f64,
    pub dlp_per_century: f64,
    pub dn_per_century: f64,
    pub w_deg: Option<f64>,
    pub dw_per_century: Option<f64>,
}

/// Hard-coded VSOP87-style perturbation coefficients applied to specific
/// bodies' mean longitude (Earth, Mars).
#[derive(Debug, Clone, Copy)]
pub struct PerturbationTerms {
    pub b: f64,
    pub c: f64,
    pub s: f64,
    pub f: f64,
}

/// Spacecraft-specific metadata.
#[derive(Debug, Clone, Copy)]
pub struct SpacecraftInfo {
    /// Launch date as a Julian Date (TDB).
    pub launch_jd: f64,
    pub transmitter_active: bool,
    pub downlink_frequency_mhz: f64,
    pub mission_status: MissionStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionStatus {
    Active,
    ExtendedMission,
    Inactive,
}

/// A single catalogue entry, normalized and ready for the ephemeris engine.
#[derive(Debug, Clone)]
pub struct CelestialObject {
    pub name: &'static str,
    pub kind: ObjectKind,
    /// Lowercased-hyphenated parent name; empty for the Sun.
    pub parent: &'static str,
    pub mean_radius_km: f64,
    pub mass_kg: f64,
    pub elements: OrbitalElements,
    pub orbital_period_days: f64,
    pub perturbation: Option<PerturbationTerms>,
    pub spacecraft: Option<SpacecraftInfo>,
}

impl CelestialObject {
    /// Lowercased-hyphenated key used for catalogue lookups and the domain
    /// grammar (§6). Catalog names are already authored in this form.
    pub fn key(&self) -> &'static str {
        self.name
    }

    /// Occlusion radius margin: 1.05x for the Sun's corona, 1.02x for
    /// planets/dwarfs' atmospheres, 1x otherwise.
    pub fn occlusion_radius_km(&self) -> f64 {
        let margin = match self.kind {
            ObjectKind::Star => 1.05,
            ObjectKind::Planet | ObjectKind::DwarfPlanet => 1.02,
            ObjectKind::Moon | ObjectKind::Asteroid | ObjectKind::Spacecraft => 1.0,
        };
        self.mean_radius_km * margin
    }
}

/// Errors raised while validating the static catalogue at startup.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("object `{0}` is not the unique star/coordinate origin")]
    SunNotUnique(&'static str),
    #[error("object `{name}` names parent `{parent}` which does not exist in the catalog")]
    DanglingParent {
        name: &'static str,
        parent: &'static str,
    },
    #[error("duplicate catalog entry for `{0}`")]
    DuplicateName(&'static str),
}

/// Owned, validated view of the catalogue, indexed by lowercased-hyphenated
/// name for O(1) lookup from the resolver and ephemeris engine.
#[derive(Debug, Clone)]
pub struct Catalog {
    objects: Vec<CelestialObject>,
    index: HashMap<&'static str, usize>,
}

impl Catalog {
    /// Look up a catalog object by its lowercased-hyphenated name.
    pub fn find(&self, name: &str) -> Option<&CelestialObject> {
        self.index.get(name).map(|&i| &self.objects[i])
    }

    /// All entries, in catalog-declaration order.
    pub fn all(&self) -> &[CelestialObject] {
        &self.objects
    }

    /// The Sun's catalog entry (guaranteed present after [`load`] succeeds).
    pub fn sun(&self) -> &CelestialObject {
        self.find("sun").expect("catalog validated: sun is present")
    }
}

/// Ingest the static catalogue: normalize angles to `[0, 360)` and validate
/// the data model invariants (the Sun is unique and is the coordinate
/// origin; every non-Sun object names an existing parent).
pub fn load() -> Result<Catalog, CatalogError> {
    let mut objects: Vec<CelestialObject> = data::RAW_CATALOG.to_vec();
    for object in &mut objects {
        object.elements.i_deg = latency_core::angle::normalize_degrees(object.elements.i_deg);
        object.elements.l_deg = latency_core::angle::normalize_degrees(object.elements.l_deg);
        object.elements.lp_deg = latency_core::angle::normalize_degrees(object.elements.lp_deg);
        object.elements.n_deg = latency_core::angle::normalize_degrees(object.elements.n_deg);
        if let Some(w) = object.elements.w_deg.as_mut() {
            *w = latency_core::angle::normalize_degrees(*w);
        }
    }

    let mut index = HashMap::with_capacity(objects.len());
    let mut suns = 0usize;
    for (i, object) in objects.iter().enumerate() {
        if index.insert(object.name, i).is_some() {
            return Err(CatalogError::DuplicateName(object.name));
        }
        if matches!(object.kind, ObjectKind::Star) {
            suns += 1;
            if !object.parent.is_empty() {
                return Err(CatalogError::DanglingParent {
                    name: object.name,
                    parent: object.parent,
                });
            }
        }
    }
    if suns != 1 {
        return Err(CatalogError::SunNotUnique(
            objects
                .iter()
                .find(|o| matches!(o.kind, ObjectKind::Star))
                .map(|o| o.name)
                .unwrap_or("sun"),
        ));
    }

    for object in &objects {
        if object.parent.is_empty() {
            continue;
        }
        if !index.contains_key(object.parent) {
            return Err(CatalogError::DanglingParent {
                name: object.name,
                parent: object.parent,
            });
        }
    }

    Ok(Catalog { objects, index })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_loads_and_validates() {
        let catalog = load().expect("static catalog must validate");
        assert_eq!(catalog.sun().name, "sun");
        assert!(catalog.all().len() >= 30);
    }

    #[test]
    fn every_non_sun_object_has_existing_parent() {
        let catalog = load().unwrap();
        for object in catalog.all() {
            if object.parent.is_empty() {
                continue;
            }
            assert!(
                catalog.find(object.parent).is_some(),
                "{} names missing parent {}",
                object.name,
                object.parent
            );
        }
    }

    #[test]
    fn angles_are_normalized() {
        let catalog = load().unwrap();
        for object in catalog.all() {
            assert!((0.0..360.0).contains(&object.elements.i_deg));
            assert!((0.0..360.0).contains(&object.elements.l_deg));
        }
    }

    #[test]
    fn lookup_is_case_and_hyphen_sensitive_to_stored_key() {
        let catalog = load().unwrap();
        assert!(catalog.find("mars").is_some());
        assert!(catalog.find("new-horizons").is_some());
        assert!(catalog.find("Mars").is_none());
    }
}

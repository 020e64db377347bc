//! Heliocentric and parent-relative position propagation (specification §4.1).

use latency_core::angle::{normalize_degrees, to_radians};
use latency_core::constants::AU_KM;
use latency_core::vector::{self, Vector3};
use latency_catalog::{CelestialObject, OrbitalElements};

use crate::kepler;

/// Propagate a single element linearly by `t` Julian centuries since J2000.
fn propagate(base: f64, rate_per_century: f64, t: f64) -> f64 {
    base + rate_per_century * t
}

/// Apply the hard-coded VSOP87-style perturbation correction to the mean
/// longitude, for the bodies that carry perturbation coefficients (Earth,
/// Mars — specification §4.1).
fn perturbed_longitude(l_deg: f64, perturbation: Option<&latency_catalog::PerturbationTerms>, t: f64) -> f64 {
    let Some(p) = perturbation else {
        return l_deg;
    };
    let extra = p.b * t * t + p.c * (p.f * t).cos() + p.s * (p.f * t).sin();
    l_deg + extra
}

/// Position of a body in its own orbital plane (before the three rotations),
/// plus the solved true anomaly and radius — useful for callers that only
/// need the in-plane quantities.
struct PlaneState {
    x: f64,
    y: f64,
    n_deg: f64,
    w_deg: f64,
}

fn solve_plane(elements: &OrbitalElements, l_deg_perturbed: f64, t: f64) -> PlaneState {
    let a = propagate(elements.a, elements.da_per_century, t);
    let e = propagate(elements.e, elements.de_per_century, t);
    let lp_deg = normalize_degrees(propagate(elements.lp_deg, elements.dlp_per_century, t));
    let n_deg = normalize_degrees(propagate(elements.n_deg, elements.dn_per_century, t));

    let w_deg = match (elements.w_deg, elements.dw_per_century) {
        (Some(w0), Some(dw)) => normalize_degrees(propagate(w0, dw, t)),
        _ => normalize_degrees(lp_deg - n_deg),
    };

    let mean_anomaly_deg = normalize_degrees(l_deg_perturbed - lp_deg);
    let mean_anomaly_rad = to_radians(mean_anomaly_deg);

    let eccentric_anomaly = kepler::solve(mean_anomaly_rad, e);
    let true_anomaly = kepler::true_anomaly(eccentric_anomaly, e);
    let radius = a * (1.0 - e * eccentric_anomaly.cos());

    PlaneState {
        x: radius * true_anomaly.cos(),
        y: radius * true_anomaly.sin(),
        n_deg,
        w_deg,
    }
}

/// Rotate an orbital-plane coordinate into the reference frame by argument
/// of periapsis `w`, inclination `i`, and ascending node `n` (specification
/// §4.1: "rotate by ω about z, by inclination i about x, by node Ω about z").
fn rotate_to_reference_frame(x: f64, y: f64, w_deg: f64, i_deg: f64, n_deg: f64) -> Vector3 {
    let w = to_radians(w_deg);
    let i = to_radians(i_deg);
    let n = to_radians(n_deg);

    // Rotate by argument of periapsis about z.
    let x1 = x * w.cos() - y * w.sin();
    let y1 = x * w.sin() + y * w.cos();
    let z1 = 0.0f64;

    // Rotate by inclination about x.
    let x2 = x1;
    let y2 = y1 * i.cos() - z1 * i.sin();
    let z2 = y1 * i.sin() + z1 * i.cos();

    // Rotate by ascending node about z.
    let x3 = x2 * n.cos() - y2 * n.sin();
    let y3 = x2 * n.sin() + y2 * n.cos();
    let z3 = z2;

    [x3, y3, z3]
}

/// Heliocentric position of a planet/dwarf/asteroid, in AU, at `t` Julian
/// centuries since J2000 TDB.
pub fn heliocentric_position_au(object: &CelestialObject, t: f64) -> Vector3 {
    let l_deg = normalize_degrees(propagate(
        object.elements.l_deg,
        object.elements.dl_per_century,
        t,
    ));
    let l_deg = perturbed_longitude(l_deg, object.perturbation.as_ref(), t);
    let plane = solve_plane(&object.elements, l_deg, t);
    rotate_to_reference_frame(plane.x, plane.y, plane.w_deg, object.elements.i_deg, plane.n_deg)
}

/// Position of a moon/spacecraft relative to its parent, in AU, at `t`
/// Julian centuries since J2000 TDB. Elements are stored in km.
pub fn parent_relative_position_au(object: &CelestialObject, t: f64) -> Vector3 {
    let l_deg = normalize_degrees(propagate(
        object.elements.l_deg,
        object.elements.dl_per_century,
        t,
    ));
    let plane = solve_plane(&object.elements, l_deg, t);
    let position_km = rotate_to_reference_frame(
        plane.x,
        plane.y,
        plane.w_deg,
        object.elements.i_deg,
        plane.n_deg,
    );
    vector::scale(&position_km, 1.0 / AU_KM)
}

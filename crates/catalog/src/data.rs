//! The hand-maintained static catalogue.
//!
//! Elements for the Sun-orbiting bodies (Sun through Neptune, Pluto) are the
//! standard low-precision J2000 Keplerian elements valid over 1800-2050.
//! Elements for the remaining dwarf planets, moons, asteroids, and spacecraft
//! are illustrative approximations, accurate to arcminute level at best:
//! these exist to produce plausible distances and light-times rather than
//! mission-grade ephemerides.

use crate::{CelestialObject, MissionStatus, ObjectKind, OrbitalElements, PerturbationTerms, SpacecraftInfo};

const NONE_W: Option<f64> = None;
const NONE_DW: Option<f64> = None;

const fn helio(
    a: f64,
    e: f64,
    i_deg: f64,
    l_deg: f64,
    lp_deg: f64,
    n_deg: f64,
    da: f64,
    de: f64,
    di: f64,
    dl: f64,
    dlp: f64,
    dn: f64,
) -> OrbitalElements {
    OrbitalElements {
        a,
        e,
        i_deg,
        l_deg,
        lp_deg,
        n_deg,
        da_per_century: da,
        de_per_century: de,
        di_per_century: di,
        dl_per_century: dl,
        dlp_per_century: dlp,
        dn_per_century: dn,
        w_deg: NONE_W,
        dw_per_century: NONE_DW,
    }
}

/// Parent-relative elements for a moon/spacecraft: `a` is in km, mean motion
/// is derived from `period_days` rather than supplied, `w` is the argument
/// of periapsis when the source distinguishes it from `lp - n`.
const fn relative(
    a_km: f64,
    e: f64,
    i_deg: f64,
    l_deg: f64,
    lp_deg: f64,
    n_deg: f64,
    period_days: f64,
    w_deg: Option<f64>,
) -> OrbitalElements {
    let dl = 360.0 * DAYS_PER_CENTURY / period_days;
    OrbitalElements {
        a: a_km,
        e,
        i_deg,
        l_deg,
        lp_deg,
        n_deg,
        da_per_century: 0.0,
        de_per_century: 0.0,
        di_per_century: 0.0,
        dl_per_century: dl,
        dlp_per_century: 0.0,
        dn_per_century: 0.0,
        w_deg,
        dw_per_century: if w_deg.is_some() { Some(0.0) } else { None },
    }
}

pub(crate) const DAYS_PER_CENTURY: f64 = 36_525.0;

pub static RAW_CATALOG: &[CelestialObject] = &[
    CelestialObject {
        name: "sun",
        kind: ObjectKind::Star,
        parent: "",
        mean_radius_km: 696_000.0,
        mass_kg: 1.989e30,
        elements: helio(0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0),
        orbital_period_days: 0.0,
        perturbation: None,
        spacecraft: None,
    },
    CelestialObject {
        name: "mercury",
        kind: ObjectKind::Planet,
        parent: "sun",
        mean_radius_km: 2_439.7,
        mass_kg: 3.3011e23,
        elements: helio(
            0.387_099_27, 0.205_635_93, 7.004_979_02, 252.250_323_50, 77.457_796_28,
            48.330_765_93, 0.000_000_37, 0.000_019_06, -0.005_947_49, 149_472.674_111_75,
            0.160_476_89, -0.125_340_81,
        ),
        orbital_period_days: 87.969,
        perturbation: None,
        spacecraft: None,
    },
    CelestialObject {
        name: "venus",
        kind: ObjectKind::Planet,
        parent: "sun",
        mean_radius_km: 6_051.8,
        mass_kg: 4.8675e24,
        elements: helio(
            0.723_335_66, 0.006_776_72, 3.394_676_05, 181.979_099_50, 131.602_467_18,
            76.679_842_55, 0.000_003_90, -0.000_041_07, -0.000_788_90, 58_517.815_387_29,
            0.002_683_29, -0.277_694_18,
        ),
        orbital_period_days: 224.701,
        perturbation: None,
        spacecraft: None,
    },
    CelestialObject {
        name: "earth",
        kind: ObjectKind::Planet,
        parent: "sun",
        mean_radius_km: 6_371.0,
        mass_kg: 5.9724e24,
        elements: helio(
            1.000_002_61, 0.016_711_23, -0.000_015_31, 100.464_571_66, 102.937_681_93, 0.0,
            0.000_005_62, -0.000_043_92, -0.012_946_68, 35_999.372_449_81, 0.323_273_64, 0.0,
        ),
        orbital_period_days: 365.256,
        perturbation: Some(PerturbationTerms {
            b: -0.000_002_3,
            c: 0.000_91,
            s: 0.000_05,
            f: 2.4,
        }),
        spacecraft: None,
    },
    CelestialObject {
        name: "moon",
        kind: ObjectKind::Moon,
        parent: "earth",
        mean_radius_km: 1_737.4,
        mass_kg: 7.346e22,
        elements: relative(384_400.0, 0.0549, 5.145, 135.27, 83.35, 125.08, 27.321_661, None),
        orbital_period_days: 27.321_661,
        perturbation: None,
        spacecraft: None,
    },
    CelestialObject {
        name: "mars",
        kind: ObjectKind::Planet,
        parent: "sun",
        mean_radius_km: 3_389.5,
        mass_kg: 6.4171e23,
        elements: helio(
            1.523_710_34, 0.093_394_10, 1.849_691_42, -4.553_432_05, -23.943_629_59,
            49.559_538_91, 0.000_018_47, 0.000_078_82, -0.008_131_31, 19_140.302_684_99,
            0.444_410_88, -0.292_573_43,
        ),
        orbital_period_days: 686.980,
        perturbation: Some(PerturbationTerms {
            b: -0.000_013_3,
            c: 0.000_61,
            s: -0.000_31,
            f: 1.8,
        }),
        spacecraft: None,
    },
    CelestialObject {
        name: "phobos",
        kind: ObjectKind::Moon,
        parent: "mars",
        mean_radius_km: 11.1,
        mass_kg: 1.0659e16,
        elements: relative(9_376.0, 0.0151, 1.093, 0.0, 0.0, 0.0, 0.318_910, None),
        orbital_period_days: 0.318_910,
        perturbation: None,
        spacecraft: None,
    },
    CelestialObject {
        name: "deimos",
        kind: ObjectKind::Moon,
        parent: "mars",
        mean_radius_km: 6.2,
        mass_kg: 1.4762e15,
        elements: relative(23_463.2, 0.000_33, 0.93, 0.0, 0.0, 0.0, 1.262_44, None),
        orbital_period_days: 1.262_44,
        perturbation: None,
        spacecraft: None,
    },
    CelestialObject {
        name: "jupiter",
        kind: ObjectKind::Planet,
        parent: "sun",
        mean_radius_km: 69_911.0,
        mass_kg: 1.8982e27,
        elements: helio(
            5.202_887_00, 0.048_386_24, 1.304_396_95, 34.396_440_51, 14.728_479_83,
            100.473_909_09, -0.000_116_07, -0.000_132_53, -0.001_837_14, 3_034.746_127_75,
            0.212_526_68, 0.204_691_06,
        ),
        orbital_period_days: 4_332.589,
        perturbation: None,
        spacecraft: None,
    },
    CelestialObject {
        name: "io",
        kind: ObjectKind::Moon,
        parent: "jupiter",
        mean_radius_km: 1_821.6,
        mass_kg: 8.931_9e22,
        elements: relative(421_800.0, 0.0041, 0.036, 0.0, 0.0, 0.0, 1.769_137, None),
        orbital_period_days: 1.769_137,
        perturbation: None,
        spacecraft: None,
    },
    CelestialObject {
        name: "europa",
        kind: ObjectKind::Moon,
        parent: "jupiter",
        mean_radius_km: 1_560.8,
        mass_kg: 4.799_8e22,
        elements: relative(671_100.0, 0.009, 0.466, 0.0, 0.0, 0.0, 3.551_181, None),
        orbital_period_days: 3.551_181,
        perturbation: None,
        spacecraft: None,
    },
    CelestialObject {
        name: "ganymede",
        kind: ObjectKind::Moon,
        parent: "jupiter",
        mean_radius_km: 2_634.1,
        mass_kg: 1.4819e23,
        elements: relative(1_070_400.0, 0.0013, 0.177, 0.0, 0.0, 0.0, 7.154_553, None),
        orbital_period_days: 7.154_553,
        perturbation: None,
        spacecraft: None,
    },
    CelestialObject {
        name: "callisto",
        kind: ObjectKind::Moon,
        parent: "jupiter",
        mean_radius_km: 2_410.3,
        mass_kg: 1.075_9e23,
        elements: relative(1_882_700.0, 0.0074, 0.192, 0.0, 0.0, 0.0, 16.689_017, None),
        orbital_period_days: 16.689_017,
        perturbation: None,
        spacecraft: None,
    },
    CelestialObject {
        name: "saturn",
        kind: ObjectKind::Planet,
        parent: "sun",
        mean_radius_km: 58_232.0,
        mass_kg: 5.6834e26,
        elements: helio(
            9.536_675_94, 0.053_861_79, 2.485_991_87, 49.954_244_23, 92.598_878_31,
            113.662_424_48, -0.001_250_60, -0.000_509_91, 0.001_936_09, 1_222.493_622_01,
            -0.418_972_16, -0.288_677_94,
        ),
        orbital_period_days: 10_759.22,
        perturbation: None,
        spacecraft: None,
    },
    CelestialObject {
        name: "titan",
        kind: ObjectKind::Moon,
        parent: "saturn",
        mean_radius_km: 2_574.7,
        mass_kg: 1.3452e23,
        elements: relative(1_221_870.0, 0.0288, 0.348, 0.0, 0.0, 0.0, 15.945, None),
        orbital_period_days: 15.945,
        perturbation: None,
        spacecraft: None,
    },
    CelestialObject {
        name: "enceladus",
        kind: ObjectKind::Moon,
        parent: "saturn",
        mean_radius_km: 252.1,
        mass_kg: 1.08022e20,
        elements: relative(238_020.0, 0.0047, 0.009, 0.0, 0.0, 0.0, 1.370, None),
        orbital_period_days: 1.370,
        perturbation: None,
        spacecraft: None,
    },
    CelestialObject {
        name: "uranus",
        kind: ObjectKind::Planet,
        parent: "sun",
        mean_radius_km: 25_362.0,
        mass_kg: 8.6810e25,
        elements: helio(
            19.189_164_64, 0.047_257_44, 0.772_637_83, 313.238_104_51, 170.954_276_30,
            74.016_925_03, -0.001_961_76, -0.000_043_97, -0.002_429_39, 428.482_027_85,
            0.408_052_81, 0.042_405_89,
        ),
        orbital_period_days: 30_688.5,
        perturbation: None,
        spacecraft: None,
    },
    CelestialObject {
        name: "titania",
        kind: ObjectKind::Moon,
        parent: "uranus",
        mean_radius_km: 788.4,
        mass_kg: 3.400_9e21,
        elements: relative(436_300.0, 0.0011, 0.340, 0.0, 0.0, 0.0, 8.706, None),
        orbital_period_days: 8.706,
        perturbation: None,
        spacecraft: None,
    },
    CelestialObject {
        name: "oberon",
        kind: ObjectKind::Moon,
        parent: "uranus",
        mean_radius_km: 761.4,
        mass_kg: 3.076_1e21,
        elements: relative(583_500.0, 0.0014, 0.058, 0.0, 0.0, 0.0, 13.463, None),
        orbital_period_days: 13.463,
        perturbation: None,
        spacecraft: None,
    },
    CelestialObject {
        name: "neptune",
        kind: ObjectKind::Planet,
        parent: "sun",
        mean_radius_km: 24_622.0,
        mass_kg: 1.024_13e26,
        elements: helio(
            30.069_922_76, 0.008_590_48, 1.770_043_47, -55.120_029_69, 44.964_762_27,
            131.784_225_74, 0.000_262_91, 0.000_051_05, 0.000_353_72, 218.459_453_25,
            -0.322_414_64, -0.005_086_64,
        ),
        orbital_period_days: 60_182.0,
        perturbation: None,
        spacecraft: None,
    },
    CelestialObject {
        name: "triton",
        kind: ObjectKind::Moon,
        parent: "neptune",
        mean_radius_km: 1_353.4,
        mass_kg: 2.139e22,
        elements: relative(354_759.0, 0.000_016, 156.885, 0.0, 0.0, 0.0, 5.877, None),
        orbital_period_days: 5.877,
        perturbation: None,
        spacecraft: None,
    },
    CelestialObject {
        name: "pluto",
        kind: ObjectKind::DwarfPlanet,
        parent: "sun",
        mean_radius_km: 1_188.3,
        mass_kg: 1.303e22,
        elements: helio(
            39.482_116_75, 0.248_827_30, 17.140_012_06, 238.929_038_33, 224.068_916_29,
            110.303_936_84, -0.000_315_96, 0.000_051_70, 0.000_048_18, 145.207_805_15,
            -0.040_629_42, -0.011_834_82,
        ),
        orbital_period_days: 90_560.0,
        perturbation: None,
        spacecraft: None,
    },
    CelestialObject {
        name: "charon",
        kind: ObjectKind::Moon,
        parent: "pluto",
        mean_radius_km: 606.0,
        mass_kg: 1.586e21,
        elements: relative(19_591.0, 0.0002, 0.08, 0.0, 0.0, 0.0, 6.387, None),
        orbital_period_days: 6.387,
        perturbation: None,
        spacecraft: None,
    },
    CelestialObject {
        name: "ceres",
        kind: ObjectKind::DwarfPlanet,
        parent: "sun",
        mean_radius_km: 469.7,
        mass_kg: 9.3835e20,
        elements: helio(
            2.7691, 0.0760, 10.594, 95.989, 73.260, 80.393, 0.0, 0.0, 0.0,
            360.0 * DAYS_PER_CENTURY / 1_681.63,
            0.0, 0.0,
        ),
        orbital_period_days: 1_681.63,
        perturbation: None,
        spacecraft: None,
    },
    CelestialObject {
        name: "eris",
        kind: ObjectKind::DwarfPlanet,
        parent: "sun",
        mean_radius_km: 1_163.0,
        mass_kg: 1.6466e22,
        elements: helio(
            67.78, 0.4407, 44.04, 205.99, 151.639, 35.951, 0.0, 0.0, 0.0,
            360.0 * DAYS_PER_CENTURY / 203_830.0,
            0.0, 0.0,
        ),
        orbital_period_days: 203_830.0,
        perturbation: None,
        spacecraft: None,
    },
    CelestialObject {
        name: "haumea",
        kind: ObjectKind::DwarfPlanet,
        parent: "sun",
        mean_radius_km: 780.0,
        mass_kg: 4.006e21,
        elements: helio(
            43.13, 0.1975, 28.19, 218.21, 240.66, 122.10, 0.0, 0.0, 0.0,
            360.0 * DAYS_PER_CENTURY / 103_774.0,
            0.0, 0.0,
        ),
        orbital_period_days: 103_774.0,
        perturbation: None,
        spacecraft: None,
    },
    CelestialObject {
        name: "makemake",
        kind: ObjectKind::DwarfPlanet,
        parent: "sun",
        mean_radius_km: 715.0,
        mass_kg: 3.1e21,
        elements: helio(
            45.79, 0.1559, 28.98, 165.514, 297.24, 79.38, 0.0, 0.0, 0.0,
            360.0 * DAYS_PER_CENTURY / 111_845.0,
            0.0, 0.0,
        ),
        orbital_period_days: 111_845.0,
        perturbation: None,
        spacecraft: None,
    },
    CelestialObject {
        name: "vesta",
        kind: ObjectKind::Asteroid,
        parent: "sun",
        mean_radius_km: 262.7,
        mass_kg: 2.59076e20,
        elements: helio(
            2.3615, 0.0887, 7.1397, 142.41, 151.66, 103.85, 0.0, 0.0, 0.0,
            360.0 * DAYS_PER_CENTURY / 1_325.75,
            0.0, 0.0,
        ),
        orbital_period_days: 1_325.75,
        perturbation: None,
        spacecraft: None,
    },
    CelestialObject {
        name: "pallas",
        kind: ObjectKind::Asteroid,
        parent: "sun",
        mean_radius_km: 256.0,
        mass_kg: 2.04e20,
        elements: helio(
            2.7728, 0.2302, 34.93, 46.40, 310.05, 172.90, 0.0, 0.0, 0.0,
            360.0 * DAYS_PER_CENTURY / 1_686.18,
            0.0, 0.0,
        ),
        orbital_period_days: 1_686.18,
        perturbation: None,
        spacecraft: None,
    },
    CelestialObject {
        name: "bennu",
        kind: ObjectKind::Asteroid,
        parent: "sun",
        mean_radius_km: 0.245,
        mass_kg: 7.329e10,
        elements: helio(
            1.1264, 0.2037, 6.035, 101.70, 66.22, 2.061, 0.0, 0.0, 0.0,
            360.0 * DAYS_PER_CENTURY / 436.6,
            0.0, 0.0,
        ),
        orbital_period_days: 436.6,
        perturbation: None,
        spacecraft: None,
    },
    CelestialObject {
        name: "voyager-1",
        kind: ObjectKind::Spacecraft,
        parent: "sun",
        mean_radius_km: 0.001,
        mass_kg: 825.5,
        elements: helio(
            100.0, 0.95, 35.8, 180.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            360.0 * DAYS_PER_CENTURY / 365_250.0,
            0.0, 0.0,
        ),
        orbital_period_days: 365_250.0,
        perturbation: None,
        spacecraft: Some(SpacecraftInfo {
            launch_jd: 2_443_391.5,
            transmitter_active: true,
            downlink_frequency_mhz: 2_295.0,
            mission_status: MissionStatus::ExtendedMission,
        }),
    },
    CelestialObject {
        name: "voyager-2",
        kind: ObjectKind::Spacecraft,
        parent: "sun",
        mean_radius_km: 0.001,
        mass_kg: 825.5,
        elements: helio(
            90.0, 0.94, -55.5, 170.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            360.0 * DAYS_PER_CENTURY / 328_850.0,
            0.0, 0.0,
        ),
        orbital_period_days: 328_850.0,
        perturbation: None,
        spacecraft: Some(SpacecraftInfo {
            launch_jd: 2_443_376.5,
            transmitter_active: true,
            downlink_frequency_mhz: 2_295.0,
            mission_status: MissionStatus::ExtendedMission,
        }),
    },
    CelestialObject {
        name: "new-horizons",
        kind: ObjectKind::Spacecraft,
        parent: "sun",
        mean_radius_km: 0.001,
        mass_kg: 478.0,
        elements: helio(
            60.0, 0.90, 2.0, 90.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            360.0 * DAYS_PER_CENTURY / 197_100.0,
            0.0, 0.0,
        ),
        orbital_period_days: 197_100.0,
        perturbation: None,
        spacecraft: Some(SpacecraftInfo {
            launch_jd: 2_453_755.5,
            transmitter_active: true,
            downlink_frequency_mhz: 2_090.0,
            mission_status: MissionStatus::ExtendedMission,
        }),
    },
    CelestialObject {
        name: "parker-solar-probe",
        kind: ObjectKind::Spacecraft,
        parent: "sun",
        mean_radius_km: 0.0008,
        mass_kg: 685.0,
        elements: helio(
            0.4, 0.85, 3.4, 30.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            360.0 * DAYS_PER_CENTURY / 150.0,
            0.0, 0.0,
        ),
        orbital_period_days: 150.0,
        perturbation: None,
        spacecraft: Some(SpacecraftInfo {
            launch_jd: 2_458_326.5,
            transmitter_active: true,
            downlink_frequency_mhz: 8_400.0,
            mission_status: MissionStatus::Active,
        }),
    },
    CelestialObject {
        name: "jwst",
        kind: ObjectKind::Spacecraft,
        parent: "earth",
        mean_radius_km: 0.0003,
        mass_kg: 6_200.0,
        elements: relative(1_500_000.0, 0.03, 0.1, 0.0, 0.0, 0.0, 180.0, None),
        orbital_period_days: 180.0,
        perturbation: None,
        spacecraft: Some(SpacecraftInfo {
            launch_jd: 2_459_580.5,
            transmitter_active: true,
            downlink_frequency_mhz: 25_900.0,
            mission_status: MissionStatus::Active,
        }),
    },
    CelestialObject {
        name: "perseverance",
        kind: ObjectKind::Spacecraft,
        parent: "mars",
        mean_radius_km: 0.000_003,
        mass_kg: 1_025.0,
        elements: relative(3_389.5, 0.0, 0.0, 0.0, 0.0, 0.0, 1.025_957, None),
        orbital_period_days: 1.025_957,
        perturbation: None,
        spacecraft: Some(SpacecraftInfo {
            launch_jd: 2_459_083.5,
            transmitter_active: true,
            downlink_frequency_mhz: 401.5,
            mission_status: MissionStatus::Active,
        }),
    },
];

//! Stamps the crate with the wall-clock time it was built, for the
//! `/_debug/status` endpoint. Expressed as Unix seconds rather than a
//! formatted calendar date since this crate carries no date-formatting
//! dependency.

use std::time::{SystemTime, UNIX_EPOCH};

fn main() {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    println!("cargo:rustc-env=LATENCY_BUILD_TIMESTAMP={now}");
    println!("cargo:rerun-if-changed=build.rs");
}

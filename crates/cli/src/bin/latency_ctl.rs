//! Offline diagnostic CLI over the ephemeris/catalog/resolver crates, so the
//! geometry engine has exactly one implementation shared by the proxy and
//! this tool (specification §9 redesign flag: "keep a single module and
//! depend on it from both the proxy and any offline tool").

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use latency_catalog::Catalog;
use latency_ephemeris::{time, Ephemeris};
use latency_policy::PolicyTable;

#[derive(Parser)]
#[command(name = "latency-ctl", about = "Diagnostics for the latency-space ephemeris and resolver")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Print Earth-to-everything distances and light-times at the current instant.
    Distances,
    /// Check whether `observer`'s sight line to `target` is occluded right now.
    Occlusion {
        observer: String,
        target: String,
    },
    /// Run the destination resolver against a hostname, as the HTTP/SOCKS cores would.
    Resolve {
        host: String,
        #[arg(long)]
        path: Option<String>,
    },
    /// Print the bandwidth cap and rate limit the policy table applies to a body.
    Policy { body: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let catalog = latency_catalog::load().context("catalog failed validation")?;
    let ephemeris = Ephemeris::new(catalog);

    match cli.command {
        CliCommand::Distances => print_distances(&ephemeris),
        CliCommand::Occlusion { observer, target } => print_occlusion(&ephemeris, &observer, &target)?,
        CliCommand::Resolve { host, path } => print_resolve(ephemeris.catalog(), &host, path.as_deref())?,
        CliCommand::Policy { body } => print_policy(ephemeris.catalog(), &body),
    }

    Ok(())
}

fn current_t() -> f64 {
    time::centuries_since_j2000_tdb(time::julian_date_now())
}

fn print_distances(ephemeris: &Ephemeris) {
    let t = current_t();
    let entries = ephemeris.earth_distances(t);
    println!("{:<20} {:>16} {:>14} {:>14}", "body", "distance_km", "one_way_s", "round_trip_s");
    for entry in entries {
        let one_way = entry.distance_km / 299_792.458;
        println!(
            "{:<20} {:>16.1} {:>14.3} {:>14.3}",
            entry.target_name,
            entry.distance_km,
            one_way,
            one_way * 2.0
        );
    }
}

fn print_occlusion(ephemeris: &Ephemeris, observer: &str, target: &str) -> Result<()> {
    let t = current_t();
    let occlusion = ephemeris
        .occlusion(observer, target, t)
        .with_context(|| format!("computing occlusion {observer} -> {target}"))?;
    match occlusion.occluder_name() {
        Some(by) => println!("{observer} -> {target}: OCCLUDED by {by}"),
        None => println!("{observer} -> {target}: visible"),
    }
    Ok(())
}

fn print_policy(catalog: &Catalog, body: &str) {
    if catalog.find(body).is_none() {
        println!("`{body}` does not name a registered celestial body");
        return;
    }
    let table = PolicyTable::default();
    let record = table.get(body);
    println!("body: {body}");
    println!("bandwidth_bps: {}", record.bandwidth_bps);
    println!("rate_limit_rps: {:.4}", record.rate_limit_rps);
    println!("burst_seconds: {:.1}", record.burst_seconds);
    println!("dial_timeout: {:?}", record.dial_timeout);
    println!("read_write_timeout: {:?}", record.read_write_timeout);
}

fn print_resolve(catalog: &Catalog, host: &str, path: Option<&str>) -> Result<()> {
    match latency_resolver::resolve(catalog, host, path) {
        Ok(destination) => {
            println!("body: {}", destination.body.name);
            println!("mode: {:?}", destination.mode);
            println!("target_host: {}", destination.target_host.as_deref().unwrap_or("-"));
            if let Some(endpoint) = destination.debug_endpoint {
                println!("debug_endpoint: {endpoint:?}");
            }
        }
        Err(err) => println!("resolve error: {err}"),
    }
    Ok(())
}

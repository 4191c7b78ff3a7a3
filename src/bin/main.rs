//! CLI tool for diskmon

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use diskmon::{BootClock, Config, DiskMetrics, MetricDescriptor};
#[cfg(feature = "cli")]
use serde::Serialize;
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use std::time::Duration;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "diskmon")]
#[command(about = "Per-device disk I/O metrics: transfer rates, throughput and service times", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output format (json or text)
    #[arg(short, long, default_value = "text", global = true)]
    format: String,

    /// Configuration file (defaults to ~/.config/diskmon/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// List every registered metric (default)
    List,
    /// Read metrics by identifier, e.g. sda_xfers
    Read {
        /// Metric identifiers
        #[arg(required = true)]
        identifiers: Vec<String>,
    },
    /// Sample every disk twice and print all metrics
    Dump {
        /// Seconds between the two samples
        #[arg(short, long, default_value = "1.0")]
        interval: f64,
    },
    /// Poll all metrics periodically
    Watch {
        /// Seconds between polls
        #[arg(short, long, default_value = "5.0")]
        interval: f64,
        /// Number of polls, 0 for no limit
        #[arg(short = 'n', long, default_value = "0")]
        count: u64,
    },
}

#[cfg(feature = "cli")]
#[derive(Serialize)]
struct Reading<'a> {
    name: &'a str,
    value: f64,
    units: &'a str,
}

#[cfg(feature = "cli")]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    env_logger::init();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let json = cli.format == "json";

    let metrics = DiskMetrics::init(
        diskmon::disk::platform_source()?,
        Box::new(BootClock::new()),
        &config,
    )?;

    match cli.command.unwrap_or(Commands::List) {
        Commands::List => {
            if json {
                println!("{}", serde_json::to_string_pretty(metrics.descriptors())?);
            } else {
                println!(
                    "{} disk(s), extended timing {}",
                    metrics.device_count(),
                    if metrics.capabilities().extended { "available" } else { "unavailable" }
                );
                print_descriptors(metrics.descriptors());
            }
        }
        Commands::Read { identifiers } => {
            let readings: Vec<Reading> = identifiers
                .iter()
                .map(|id| Reading {
                    name: id,
                    value: metrics.handle(id),
                    units: metrics
                        .resolve(id)
                        .map(|handle| handle.kind.units())
                        .unwrap_or(""),
                })
                .collect();
            print_readings(&readings, json)?;
        }
        Commands::Dump { interval } => {
            if !config.sampling.prime_on_start {
                metrics.refresh_all();
            }
            std::thread::sleep(seconds(interval)?);
            metrics.refresh_all();
            print_readings(&read_all(&metrics), json)?;
        }
        Commands::Watch { interval, count } => {
            let pause = seconds(interval)?;
            let mut round = 0;
            while count == 0 || round < count {
                std::thread::sleep(pause);
                print_readings(&read_all(&metrics), json)?;
                round += 1;
            }
        }
    }

    Ok(())
}

#[cfg(feature = "cli")]
fn seconds(secs: f64) -> Result<Duration, Box<dyn std::error::Error>> {
    Duration::try_from_secs_f64(secs).map_err(|e| format!("Invalid interval {}: {}", secs, e).into())
}

#[cfg(feature = "cli")]
fn read_all(metrics: &DiskMetrics) -> Vec<Reading<'_>> {
    metrics
        .descriptors()
        .iter()
        .map(|d| Reading {
            name: &d.name,
            value: metrics.read(d.device_index, d.kind),
            units: &d.units,
        })
        .collect()
}

#[cfg(feature = "cli")]
fn print_readings(readings: &[Reading], json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string(readings)?);
        return Ok(());
    }

    for reading in readings {
        if reading.value == diskmon::UNAVAILABLE {
            println!("{:<28} {:>18}", reading.name, "n/a");
        } else {
            println!("{:<28} {:>18.1} {}", reading.name, reading.value, reading.units);
        }
    }
    println!();
    Ok(())
}

#[cfg(feature = "cli")]
fn print_descriptors(descriptors: &[MetricDescriptor]) {
    if descriptors.is_empty() {
        println!("No disk metrics registered");
        return;
    }

    println!("{:<28} {:<14} DESCRIPTION", "NAME", "UNITS");
    for d in descriptors {
        println!("{:<28} {:<14} {}", d.name, d.units, d.description);
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI features not enabled. Please compile with --features cli");
    std::process::exit(1);
}

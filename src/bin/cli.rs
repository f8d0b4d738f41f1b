//! loopclaim CLI - Debug tool for territory walks
//!
//! Usage:
//!   loopclaim-cli replay <file.gpx> [--config <json>]
//!   loopclaim-cli area <file.gpx> [--spherical]
//!   loopclaim-cli convert <lat> <lon> [--reverse]
//!   loopclaim-cli density <count>
//!   loopclaim-cli simulate [--radius <m>] [--points <n>] [--noise <m>] [--seed <n>]
//!
//! Replays recorded walks through the tracking state machine with verbose
//! output, to see where closures fire, which fixes get filtered and what
//! area a loop would claim.

use clap::{Parser, Subcommand};
use gpx::{Gpx, read};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use loopclaim::synthetic::LoopWalk;
use loopclaim::{
    AreaCalculator, AreaConfig, AreaMethod, Coordinate, DensityTier, Fix, LoopClaimConfig,
    PathTracker, TrackerEvent, gcj02_to_wgs84, suggested_poi_count, wgs84_to_gcj02,
};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "loopclaim-cli")]
#[command(about = "Debug tool for loop tracking and territory area", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Feed a GPX track through the path tracker
    Replay {
        /// GPX file to replay
        file: PathBuf,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Compute the area enclosed by a GPX track
    Area {
        file: PathBuf,

        /// Use the spherical-excess method instead of ellipsoidal
        #[arg(long)]
        spherical: bool,
    },

    /// Convert a coordinate between WGS-84 and GCJ-02
    Convert {
        #[arg(allow_hyphen_values = true)]
        lat: f64,

        #[arg(allow_hyphen_values = true)]
        lon: f64,

        /// Convert GCJ-02 back to WGS-84
        #[arg(long)]
        reverse: bool,
    },

    /// Show the density tier and POI recommendation for a nearby count
    Density { count: u32 },

    /// Walk a synthetic loop through the tracker
    Simulate {
        #[arg(long, default_value = "50")]
        radius: f64,

        #[arg(long, default_value = "24")]
        points: usize,

        /// GPS noise sigma in meters
        #[arg(long, default_value = "3")]
        noise: f64,

        #[arg(long, default_value = "42")]
        seed: u64,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Replay { file, config } => load_config(config.as_deref())
            .and_then(|config| {
                let fixes = parse_gpx_file(&file)?;
                run_replay(fixes, &config, cli.verbose);
                Ok(())
            }),
        Commands::Area { file, spherical } => run_area(&file, spherical),
        Commands::Convert { lat, lon, reverse } => {
            run_convert(lat, lon, reverse);
            Ok(())
        }
        Commands::Density { count } => {
            run_density(count);
            Ok(())
        }
        Commands::Simulate {
            radius,
            points,
            noise,
            seed,
            config,
        } => load_config(config.as_deref()).map(|config| {
            let walk = LoopWalk {
                noise_sigma_meters: noise,
                seed,
                start_time: Some(Utc::now()),
                ..LoopWalk::new(Coordinate::new(31.2304, 121.4737), radius, points)
            };
            println!(
                "Synthetic loop: r={:.0}m, {} points, expected ≈ {:.0} m²",
                radius,
                points,
                walk.expected_area()
            );
            run_replay(walk.generate(), &config, cli.verbose);
        }),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<LoopClaimConfig, String> {
    match path {
        Some(p) => LoopClaimConfig::from_path(p).map_err(|e| e.to_string()),
        None => Ok(LoopClaimConfig::default()),
    }
}

/// Parse a GPX file into fixes, keeping timestamps when present
fn parse_gpx_file(path: &Path) -> Result<Vec<Fix>, String> {
    let file = File::open(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    let reader = BufReader::new(file);
    let gpx: Gpx = read(reader).map_err(|e| e.to_string())?;

    let mut fixes = Vec::new();
    for track in &gpx.tracks {
        for segment in &track.segments {
            for pt in &segment.points {
                let coordinate = Coordinate::new(pt.point().y(), pt.point().x());
                let timestamp = pt
                    .time
                    .as_ref()
                    .and_then(|t| t.format().ok())
                    .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                    .map(|t| t.with_timezone(&Utc));
                fixes.push(Fix {
                    coordinate,
                    timestamp,
                    horizontal_accuracy: None,
                });
            }
        }
    }

    println!("Loaded {} fixes from {}", fixes.len(), path.display());
    Ok(fixes)
}

fn run_replay(fixes: Vec<Fix>, config: &LoopClaimConfig, verbose: bool) {
    println!("\n{}", "=".repeat(60));
    println!("Replaying {} fixes", fixes.len());
    println!("{}", "=".repeat(60));

    let mut tracker = PathTracker::new(Uuid::new_v4(), config.tracker.clone());
    let events = tracker.subscribe();
    if let Err(e) = tracker.start() {
        eprintln!("Could not start tracking: {}", e);
        return;
    }

    let mut claimed = None;
    for (i, fix) in fixes.into_iter().enumerate() {
        match tracker.ingest(fix) {
            Ok(Some(territory)) => {
                println!("  [CLOSED] at fix #{}", i);
                claimed = Some(territory);
                break;
            }
            Ok(None) => {}
            Err(e) => println!("  [ERR] fix #{}: {}", i, e),
        }
    }

    for event in events.try_iter() {
        match event {
            TrackerEvent::PathUpdated {
                point_count,
                path_length_meters,
                latest,
            } if verbose => println!(
                "    {:>4} pts  {:>8.1}m  ({:.6}, {:.6})",
                point_count, path_length_meters, latest.latitude, latest.longitude
            ),
            TrackerEvent::FixRejected { coordinate, reason } => println!(
                "  [SKIP] ({:.6}, {:.6}): {:?}",
                coordinate.latitude, coordinate.longitude, reason
            ),
            TrackerEvent::SpeedWarning { speed_mps } => {
                println!("  [WARN] moving at {:.1} km/h", speed_mps * 3.6)
            }
            TrackerEvent::ClosureRetracted { reason } => println!("  [RETRACTED] {}", reason),
            _ => {}
        }
    }

    match claimed {
        Some(t) => {
            println!("\nTerritory {}", t.id);
            println!("  Points:    {}", t.point_count());
            println!("  Perimeter: {:.1} m", t.perimeter_meters);
            println!("  Area:      {:.1} m²", t.area_square_meters);
        }
        None => println!(
            "\nNo closure: {} points, {:.1} m walked",
            tracker.path().len(),
            tracker.path_length_meters()
        ),
    }
}

fn run_area(path: &Path, spherical: bool) -> Result<(), String> {
    let ring: Vec<Coordinate> = parse_gpx_file(path)?
        .into_iter()
        .map(|f| f.coordinate)
        .collect();
    let calculator = AreaCalculator::new(AreaConfig {
        method: if spherical {
            AreaMethod::Spherical
        } else {
            AreaMethod::Geodesic
        },
        ..AreaConfig::default()
    });
    let area = calculator.area(&ring).map_err(|e| e.to_string())?;
    println!("Area:      {:.1} m²", area);
    println!("Perimeter: {:.1} m", calculator.perimeter(&ring));
    if loopclaim::area::is_self_intersecting(&ring) {
        println!("Warning: the ring crosses itself");
    }
    Ok(())
}

fn run_convert(lat: f64, lon: f64, reverse: bool) {
    let input = Coordinate::new(lat, lon);
    let (label, output) = if reverse {
        ("GCJ-02 → WGS-84", gcj02_to_wgs84(&input))
    } else {
        ("WGS-84 → GCJ-02", wgs84_to_gcj02(&input))
    };
    println!(
        "{}: ({:.7}, {:.7}) → ({:.7}, {:.7})",
        label, input.latitude, input.longitude, output.latitude, output.longitude
    );
    println!(
        "Shift: {:.1} m",
        loopclaim::geo_utils::haversine_distance(&input, &output)
    );
}

fn run_density(count: u32) {
    let tier = DensityTier::from_count(count);
    println!(
        "{} nearby → tier {}, show {} POIs",
        count,
        tier,
        suggested_poi_count(count)
    );
}

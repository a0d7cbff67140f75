use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use waterguard::config::{EngineConfig, LoggingConfig};
use waterguard::detect::{Analyzer, DetectionRun};
use waterguard::readings::{
    audit_readings, load_readings, FlowReading, PressureReading, ReadingSnapshot, ZonesFile,
};
use waterguard::report::SystemReport;
use waterguard::storage::SqliteStore;

#[derive(Parser)]
#[command(
    name = "waterguard",
    about = "Pressure and flow anomaly detection for water distribution networks",
    version,
    long_about = None
)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Reading database path (overrides storage.db_path)
    #[arg(long, global = true, env = "WATERGUARD_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load zones and sensor readings into the database.
    ///
    /// Reading files ending in `.csv` are read as CSV, anything else as a
    /// JSON array. Re-importing the same export replaces rows, it does not
    /// duplicate them.
    Import {
        /// Zones file: {"zones": [...]}
        #[arg(long)]
        zones: PathBuf,

        /// Pressure readings (CSV or JSON array)
        #[arg(long)]
        pressure: Option<PathBuf>,

        /// Flow readings (CSV or JSON array)
        #[arg(long)]
        flow: Option<PathBuf>,
    },

    /// Run all detectors and print the anomaly summary
    Detect {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,

        /// Reference time (RFC 3339) for trailing windows
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },

    /// Print zone-level statistics
    Stats {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,

        /// Reference time (RFC 3339) for trailing windows
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },

    /// Print operator recommendations
    Recommend {
        /// Reference time (RFC 3339) for trailing windows
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },

    /// Export a full system report as JSON
    Report {
        /// Output file path
        #[arg(long, default_value = "waterguard_report.json")]
        output: PathBuf,

        /// Reference time (RFC 3339) for trailing windows
        #[arg(long)]
        now: Option<DateTime<Utc>>,

        /// Embed every anomaly record in the report
        #[arg(long)]
        include_records: bool,
    },

    /// Serve the read-only API
    Serve {
        /// Bind address
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,
    },
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn open_analyzer(config: EngineConfig, db: &Path, now: Option<DateTime<Utc>>) -> Result<Analyzer> {
    let store = SqliteStore::open(db)?;
    let snapshot = ReadingSnapshot::load(&store)?;
    if snapshot.is_empty() {
        tracing::warn!(
            db = %db.display(),
            "No readings in database; run `waterguard import` first"
        );
    }

    let analyzer = Analyzer::new(Arc::new(snapshot), config).context("invalid configuration")?;
    Ok(match now {
        Some(now) => analyzer.with_reference_time(now),
        None => analyzer,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = EngineConfig::resolve(cli.config.as_deref())?;
    init_tracing(&config.logging);

    let db = cli.db.clone().unwrap_or_else(|| config.storage.db_path.clone());

    match cli.command {
        Commands::Import {
            zones,
            pressure,
            flow,
        } => {
            let store = SqliteStore::open(&db)?;
            let zones = ZonesFile::load(&zones)?.zones;
            let n = store.save_zones(&zones)?;
            println!("Imported {n} zones.");

            let pressure: Vec<PressureReading> = match pressure {
                Some(path) => load_readings(&path)?,
                None => Vec::new(),
            };
            let flow: Vec<FlowReading> = match flow {
                Some(path) => load_readings(&path)?,
                None => Vec::new(),
            };
            audit_readings(&pressure, &flow);

            if !pressure.is_empty() {
                let n = store.save_pressure_readings(&pressure)?;
                println!("Imported {n} pressure readings.");
            }
            if !flow.is_empty() {
                let n = store.save_flow_readings(&flow)?;
                println!("Imported {n} flow readings.");
            }
        }
        Commands::Detect { json, now } => {
            let analyzer = open_analyzer(config, &db, now)?;
            let run = analyzer.run_parallel().await?;
            if json {
                let out = serde_json::json!({
                    "summary": run.summary(),
                    "records": run,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                print_detection(&run);
            }
        }
        Commands::Stats { json, now } => {
            let analyzer = open_analyzer(config, &db, now)?;
            let stats = analyzer.statistics();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("\nZone Pressure Statistics (reference {})", stats.reference_time);
                println!(
                    "{:<25} | {:>8} | {:>8} | {:>8} | {:>8} | Sensors",
                    "Zone", "Avg", "Min", "Max", "Std"
                );
                println!(
                    "{:-<25}-|-{:->8}-|-{:->8}-|-{:->8}-|-{:->8}-|-{:-<7}",
                    "", "", "", "", "", ""
                );
                for z in &stats.zones {
                    println!(
                        "{:<25} | {:>8.2} | {:>8.2} | {:>8.2} | {:>8.2} | {}",
                        z.zone_name,
                        z.avg_pressure,
                        z.min_pressure,
                        z.max_pressure,
                        z.std_pressure,
                        z.num_sensors
                    );
                }

                println!("\nFlow Statistics");
                println!("{:<25} | {:>10} | {:>12} | Per capita", "Zone", "Avg LPM", "Total L");
                println!("{:-<25}-|-{:->10}-|-{:->12}-|-{:-<10}", "", "", "", "");
                for f in &stats.flow {
                    println!(
                        "{:<25} | {:>10.2} | {:>12.0} | {:.2}",
                        f.zone_name, f.avg_flow, f.total_flow, f.per_capita_flow
                    );
                }

                println!(
                    "\nLow-Pressure Zones (last {} days)",
                    analyzer.config().statistics.low_pressure_window_days
                );
                if stats.low_pressure_zones.is_empty() {
                    println!("None.");
                }
                for l in &stats.low_pressure_zones {
                    println!(
                        "{:<25} | {:>6} events | avg {:.2} PSI",
                        l.zone_name, l.low_pressure_count, l.avg_low_pressure
                    );
                }

                println!("\nPeak Demand Hours");
                for h in stats.peak_demand.iter().take(5) {
                    println!("{:02}:00 | {:.2} LPM", h.hour, h.avg_flow_lpm);
                }
                println!();
            }
        }
        Commands::Recommend { now } => {
            let analyzer = open_analyzer(config, &db, now)?;
            let run = analyzer.run_parallel().await?;
            let stats = analyzer.statistics();
            let recs = analyzer.recommendations(&stats, &run);
            if recs.is_empty() {
                println!("No recommendations.");
            } else {
                println!(
                    "{:<10} | {:<25} | {:<28} | Recommendation",
                    "Priority", "Zone", "Issue"
                );
                println!("{:-<10}-|-{:-<25}-|-{:-<28}-|-{:-<40}", "", "", "", "");
                for r in recs {
                    println!(
                        "{:<10} | {:<25} | {:<28} | {}",
                        r.priority, r.zone, r.issue, r.recommendation
                    );
                    println!("{:<10} | {:<25} | {:<28} |   -> {}", "", "", "", r.impact);
                }
            }
        }
        Commands::Report {
            output,
            now,
            include_records,
        } => {
            let analyzer = open_analyzer(config, &db, now)?;
            let run = analyzer.run_parallel().await?;
            let report = SystemReport::build(&analyzer, run, Utc::now(), include_records);
            report.write_json(&output)?;
            println!("Report {} written to {}", report.report_id, output.display());
        }
        Commands::Serve { bind } => {
            tracing::info!(%bind, "Starting Waterguard API");
            let analyzer = open_analyzer(config, &db, None)?;
            waterguard::serve(&bind, analyzer).await?;
        }
    }

    Ok(())
}

fn print_detection(run: &DetectionRun) {
    let summary = run.summary();
    println!("\n=== Waterguard Anomaly Summary ===");
    println!("Pressure anomalies: {}", summary.total_pressure_anomalies);
    println!("Flow anomalies:     {}", summary.total_flow_anomalies);
    println!("Potential leaks:    {}", summary.potential_leaks);
    println!("Potential bursts:   {}", summary.potential_bursts);
    println!("Critical events:    {}", summary.critical_events);
    println!("==================================");

    if !run.leaks.is_empty() {
        println!("\nLeaks");
        println!(
            "{:<25} | {:>10} | {:>14} | {:<10} | Action",
            "Zone", "Night LPM", "Loss L/day", "Severity"
        );
        println!("{:-<25}-|-{:->10}-|-{:->14}-|-{:-<10}-|-{:-<30}", "", "", "", "", "");
        for l in &run.leaks {
            println!(
                "{:<25} | {:>10.2} | {:>14.0} | {:<10} | {}",
                l.zone_name,
                l.avg_night_flow_lpm,
                l.estimated_daily_loss_liters,
                l.severity,
                l.recommended_action
            );
        }
    }

    if !run.bursts.is_empty() {
        println!("\nBursts");
        println!(
            "{:<25} | {:<12} | {:>8} | {:<10} | Time",
            "Zone", "Sensor", "Drop", "Severity"
        );
        println!("{:-<25}-|-{:-<12}-|-{:->8}-|-{:-<10}-|-{:-<25}", "", "", "", "", "");
        for b in &run.bursts {
            println!(
                "{:<25} | {:<12} | {:>8.2} | {:<10} | {}",
                b.zone_name, b.sensor_id, b.pressure_drop, b.severity, b.timestamp
            );
        }
    }

    let mut worst: Vec<_> = run.pressure_anomalies.iter().collect();
    worst.sort_by(|a, b| b.z_score.total_cmp(&a.z_score));
    if !worst.is_empty() {
        println!("\nTop pressure anomalies");
        for a in worst.iter().take(10) {
            println!(
                "{:<25} | {:<12} | {:>8.2} PSI | z={:.2} | {} | {}",
                a.zone_name,
                a.sensor_id,
                a.pressure_psi,
                a.z_score,
                a.anomaly_type.as_str(),
                a.severity
            );
        }
    }
    println!();
}

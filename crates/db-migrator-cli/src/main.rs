//! db-migrator CLI - dependency-aware table replication between databases.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use db_migrator::{Config, MigrateError, MigrationResult, Orchestrator, Wave};
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "db-migrator")]
#[command(about = "Copy tables between databases in foreign-key order")]
#[command(version)]
struct Cli {
    /// Path to YAML or JSON configuration file
    #[arg(short, long, default_value = "config.yaml", global = true)]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long, global = true)]
    output_json: bool,

    /// Log format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    /// Log verbosity: trace, debug, info, warn, error
    #[arg(long, default_value = "info", global = true)]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate every configured table
    Run {
        /// Show the wave plan without moving data
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the wave plan (no database connections)
    Plan,

    /// Compare row counts between source and target
    Validate,

    /// Rebuild the table list from the source catalog
    RecreateConfig {
        /// Where to write the new config [default: the --config file]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Test database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, cli.log_format);

    if let Commands::RecreateConfig { output } = &cli.command {
        let config = Config::load_settings(&cli.config)?;
        let output = output.clone().unwrap_or_else(|| cli.config.clone());
        return recreate_config(config, &output).await;
    }

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::RecreateConfig { .. } => unreachable!(), // Handled above
        Commands::Plan => {
            let waves = Orchestrator::plan(&config)?;
            print_plan(&waves, cli.output_json)?;
        }

        Commands::Run { dry_run: true } => {
            let waves = Orchestrator::plan(&config)?;
            print_plan(&waves, cli.output_json)?;
            if !cli.output_json {
                println!("\nFirst page query per table:");
                for (table, sql) in Orchestrator::page_queries(&config)? {
                    println!("-- {}\n{};\n", table, sql);
                }
            }
        }

        Commands::Run { dry_run: false } => {
            let cancel = setup_signal_handler();
            let orchestrator = Orchestrator::new(config).await?;
            let result = orchestrator.run(&cancel).await;
            orchestrator.close().await;
            let result = result?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                print_summary(&result);
            }
            result.into_result()?;
        }

        Commands::Validate => {
            let orchestrator = Orchestrator::new(config).await?;
            let report = orchestrator.validate().await;
            orchestrator.close().await;
            let report = report?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Row count validation:");
                for t in &report.tables {
                    println!(
                        "  {} {}: source={} target={}",
                        if t.matches { "OK      " } else { "MISMATCH" },
                        t.table,
                        t.source_rows,
                        t.target_rows
                    );
                }
            }
            report.ensure_consistent()?;
        }

        Commands::HealthCheck => {
            let orchestrator = Orchestrator::new(config).await?;
            let report = orchestrator.health_check().await;
            orchestrator.close().await;
            let report = report?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source ({}): OK ({}ms)",
                    report.source.db_type, report.source.latency_ms
                );
                println!(
                    "  Target ({}): OK ({}ms)",
                    report.target.db_type, report.target.latency_ms
                );
            }
        }
    }

    Ok(())
}

async fn recreate_config(config: Config, output: &Path) -> Result<(), MigrateError> {
    let orchestrator = Orchestrator::new(config).await?;
    let rebuilt = orchestrator.recreate_config().await;
    orchestrator.close().await;
    let rebuilt = rebuilt?;

    rebuilt.save(output)?;
    info!(
        "Config file created successfully: {} ({} tables)",
        output.display(),
        rebuilt.tables.len()
    );
    Ok(())
}

fn print_plan(waves: &[Wave], json: bool) -> Result<(), MigrateError> {
    if json {
        println!("{}", serde_json::to_string_pretty(waves)?);
        return Ok(());
    }
    let tables: usize = waves.iter().map(|w| w.tables.len()).sum();
    println!("Migration plan: {} tables in {} waves", tables, waves.len());
    for wave in waves {
        println!("  Wave {}: {}", wave.number, wave.tables.join(", "));
    }
    Ok(())
}

fn print_summary(result: &MigrationResult) {
    let completed = result.tables.iter().filter(|t| t.is_completed()).count();
    println!("\nMigration {:?}", result.status);
    println!("  Run ID: {}", result.run_id);
    println!("  Duration: {:.2}s", result.duration_seconds);
    println!("  Tables: {}/{}", completed, result.tables.len());
    println!("  Rows: {}", result.rows_migrated);
    println!("  Throughput: {} rows/sec", result.rows_per_second);
    let failed = result.failed_tables();
    if !failed.is_empty() {
        println!("  Failed tables: {:?}", failed);
    }
}

fn setup_logging(verbosity: &str, format: LogFormat) {
    let level = match verbosity.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }
}

/// Cancel the run on SIGINT or SIGTERM.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    for (kind, name) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let token = cancel_token.clone();
        match signal(kind) {
            Ok(mut stream) => {
                tokio::spawn(async move {
                    stream.recv().await;
                    eprintln!("\nReceived {}. Stopping after the current batches...", name);
                    token.cancel();
                });
            }
            Err(e) => eprintln!("Failed to install {} handler: {}", name, e),
        }
    }

    cancel_token
}

/// Cancel the run on Ctrl-C.
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Stopping after the current batches...");
            token.cancel();
        }
    });

    cancel_token
}

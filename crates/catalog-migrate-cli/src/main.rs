//! catalog-migrate CLI - Rename sources and spaces in exported catalog snapshots.

use catalog_migrate::{
    extract_table_references, normalize_comments, repair, Catalog, Config, MigrateError,
    MigrationReport, Orchestrator, TableReferences,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "catalog-migrate")]
#[command(about = "Rename sources, spaces and folders in exported catalog snapshots")]
#[command(version)]
struct Cli {
    /// Path to YAML or JSON configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate a catalog snapshot
    Run {
        /// Override the snapshot to read
        #[arg(long)]
        source_file: Option<PathBuf>,

        /// Override where the migrated snapshot is written
        #[arg(long)]
        destination_file: Option<PathBuf>,

        /// Dry run: migrate in memory and report without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Attach orphaned folders without renaming anything
    Repair,

    /// Show the tables each saved query reads
    Deps {
        /// Analyze this SQL text instead of the snapshot
        #[arg(long)]
        sql: Option<String>,
    },

    /// Print a SQL file with its comments converted to `--` style
    NormalizeComments {
        /// SQL file to normalize
        file: PathBuf,
    },
}

/// References found for one dataset.
#[derive(Serialize)]
struct DatasetReferences {
    path: String,
    #[serde(flatten)]
    references: TableReferences,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    // Commands that work on plain text need no config or logging
    match &cli.command {
        Commands::NormalizeComments { file } => {
            let sql = std::fs::read_to_string(file)?;
            print!("{}", normalize_comments(&sql));
            return Ok(());
        }
        Commands::Deps { sql: Some(sql) } => {
            let found = extract_table_references(sql)?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&found)?);
            } else {
                print_references("<sql>", &found);
            }
            return Ok(());
        }
        _ => {}
    }

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        // Handled above
        Commands::NormalizeComments { .. } | Commands::Deps { sql: Some(_) } => unreachable!(),

        Commands::Run {
            source_file,
            destination_file,
            dry_run,
        } => {
            if let Some(path) = source_file {
                config.source_file = path;
            }
            if let Some(path) = destination_file {
                config.destination_file = Some(path);
            }

            let errors_dir = config.errors_dir();
            let mut orchestrator = Orchestrator::new(config)?.with_error_artifacts(errors_dir);
            let report = orchestrator.run_files(dry_run)?;

            if cli.output_json {
                println!("{}", report.to_json()?);
            } else {
                print_summary(&report, dry_run);
            }
        }

        Commands::Repair => {
            let mut catalog = Catalog::load(&config.source_file)?;
            let report = repair(&mut catalog)?;
            catalog.save(config.output_file())?;
            info!("Saved repaired data to: {}", config.output_file().display());

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Repair completed!");
                println!("  Passes: {}", report.passes);
                println!("  Folders created: {}", report.synthesized.len());
                println!("  References attached: {}", report.attached.len());
            }
        }

        Commands::Deps { sql: None } => {
            let catalog = Catalog::load(&config.source_file)?;
            let mut found = Vec::new();
            for vds in &catalog.vds {
                let Some(sql) = vds.sql.as_deref() else {
                    continue;
                };
                let path = vds.path.dotted();
                match extract_table_references(sql) {
                    Ok(references) => found.push(DatasetReferences { path, references }),
                    Err(e) => warn!("Skipping {}: {}", path, e),
                }
            }

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&found)?);
            } else {
                for entry in &found {
                    print_references(&entry.path, &entry.references);
                }
            }
        }
    }

    Ok(())
}

fn print_references(label: &str, found: &TableReferences) {
    println!("{} ({:?}):", label, found.tier);
    for reference in &found.references {
        println!("  {}", reference);
    }
}

fn print_summary(report: &MigrationReport, dry_run: bool) {
    let status_msg = if dry_run { "Dry run completed!" } else { "Migration completed!" };
    println!("\n{}", status_msg);
    println!("  Run ID: {}", report.run_id);
    println!("  Duration: {:.2}s", report.duration_seconds);
    println!(
        "  Folders repaired: {} before, {} after",
        report.repair.attached.len(),
        report.post_repair.attached.len()
    );
    println!("  Spaces: {}/{}", report.spaces.migrated, report.spaces.total);
    println!("  Folders: {}/{}", report.folders.migrated, report.folders.total);
    println!("  VDS paths: {}/{}", report.vds_paths.migrated, report.vds_paths.total);
    println!("  VDS SQL: {}/{}", report.vds_sql.migrated, report.vds_sql.total);
    println!(
        "  PDS: {} kept, {} dropped",
        report.pds.migrated, report.pds.dropped
    );
    if !report.failures.is_empty() {
        println!("  Failed datasets:");
        for failure in &report.failures {
            println!("    {}: {}", failure.path, failure.message);
        }
    }
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

//! Statstore admin binary
//!
//! Inspect and maintain a statstore database directory.
//!
//! # Examples
//!
//! ```bash
//! # Row counts of every table and index
//! statstore --data-dir /var/lib/webstats info
//!
//! # Top hosts by hits
//! statstore dump hosts --index hosts.hits --reverse --limit 20
//!
//! # Decode every record, reporting corrupt ones
//! statstore verify
//!
//! # Rebuild every secondary index from its table
//! statstore rebuild
//! ```

use clap::{Args, Parser, Subcommand};
use statstore::record::{
    ActiveDownloadRecord, AgentRecord, AsnRecord, CityRecord, CountryRecord, DailyHostRecord, DailyRecord,
    DownloadRecord, ErrorRecord, HostRecord, HourlyRecord, Record, ReferrerRecord, SearchRecord,
    StatusCodeRecord, SystemRecord, TotalsRecord, UrlRecord, UserRecord, VisitRecord,
};
use statstore::storage::{Database, IndexMode};
use statstore::StoreConfig;
use std::fmt::Debug;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Statstore - record storage for web log analytics
#[derive(Parser, Debug)]
#[command(name = "statstore")]
#[command(version = statstore::VERSION)]
#[command(about = "Statstore - record storage for web log analytics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database directory
    #[arg(
        long,
        global = true,
        default_value = "statstore_data",
        env = "STATSTORE_DB_PATH"
    )]
    data_dir: PathBuf,

    /// TOML configuration file; overrides --data-dir when given
    #[arg(short, long, global = true, env = "STATSTORE_CONFIG")]
    config: Option<PathBuf>,

    /// Log directory path
    #[arg(long, global = true, default_value = "logs", env = "STATSTORE_LOG_DIR")]
    log_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show record counts of every table and index
    Info {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the records of one table
    Dump(DumpArgs),

    /// Decode every record of every table
    Verify,

    /// Reclaim space in every table log
    Compact,

    /// Truncate and rebuild every secondary index
    Rebuild,

    /// Show version
    Version,
}

#[derive(Args, Debug)]
struct DumpArgs {
    /// Table name (hosts, urls, agents, ...)
    table: String,

    /// Walk a secondary index instead of the primary key order
    #[arg(short, long)]
    index: Option<String>,

    /// Walk in descending order
    #[arg(short, long)]
    reverse: bool,

    /// Stop after this many records
    #[arg(short, long)]
    limit: Option<usize>,
}

/// Call a generic function with the record type stored in `table`
macro_rules! with_record_type {
    ($table:expr, $func:ident($($arg:expr),*)) => {
        match $table {
            "system" => $func::<SystemRecord>($($arg),*),
            "urls" => $func::<UrlRecord>($($arg),*),
            "hosts" => $func::<HostRecord>($($arg),*),
            "visits.active" => $func::<VisitRecord>($($arg),*),
            "downloads" => $func::<DownloadRecord>($($arg),*),
            "downloads.active" => $func::<ActiveDownloadRecord>($($arg),*),
            "agents" => $func::<AgentRecord>($($arg),*),
            "referrers" => $func::<ReferrerRecord>($($arg),*),
            "search" => $func::<SearchRecord>($($arg),*),
            "users" => $func::<UserRecord>($($arg),*),
            "errors" => $func::<ErrorRecord>($($arg),*),
            "dhosts" => $func::<DailyHostRecord>($($arg),*),
            "statuscodes" => $func::<StatusCodeRecord>($($arg),*),
            "totals.daily" => $func::<DailyRecord>($($arg),*),
            "totals.hourly" => $func::<HourlyRecord>($($arg),*),
            "totals" => $func::<TotalsRecord>($($arg),*),
            "countries" => $func::<CountryRecord>($($arg),*),
            "cities" => $func::<CityRecord>($($arg),*),
            "asn" => $func::<AsnRecord>($($arg),*),
            other => Err(anyhow::anyhow!("unknown table {}", other)),
        }
    };
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    setup_logging(&cli, &config)?;

    match &cli.command {
        Commands::Info { json } => info_command(&config, *json),
        Commands::Dump(args) => dump_command(&config, args),
        Commands::Verify => verify_command(&config),
        Commands::Compact => compact_command(&config),
        Commands::Rebuild => rebuild_command(&config),
        Commands::Version => {
            println!("statstore {}", statstore::VERSION);
            Ok(())
        }
    }
}

/// Setup logging with rolling files and console output
fn setup_logging(cli: &Cli, config: &StoreConfig) -> anyhow::Result<()> {
    std::fs::create_dir_all(&cli.log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &cli.log_dir, log_file_name(config));

    let log_level = cli
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(!cli.no_color)
                .compact(),
        )
        .with(fmt::layer().with_writer(file_appender).with_ansi(false))
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    Ok(())
}

/// Log files are named after the dataset
fn log_file_name(config: &StoreConfig) -> String {
    format!("{}.log", config.db_name)
}

fn load_config(cli: &Cli) -> anyhow::Result<StoreConfig> {
    let config = match &cli.config {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::new(&cli.data_dir),
    };
    Ok(config)
}

fn open_database(config: &StoreConfig, readonly: bool, mode: IndexMode) -> anyhow::Result<Database> {
    let mut config = config.clone();
    config.readonly = readonly;
    // one-shot commands flush on close
    config.trickle = false;
    let mut db = Database::new(config);
    db.open(mode)?;
    Ok(db)
}

fn info_command(config: &StoreConfig, json: bool) -> anyhow::Result<()> {
    let mut db = open_database(config, true, IndexMode::Live)?;
    let stats = db.stats()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("{:<28} {:>12}", "TABLE / INDEX", "RECORDS");
        for table in &stats {
            println!("{:<28} {:>12}", table.name, table.records);
            for (index, count) in &table.indexes {
                println!("  {:<26} {:>12}", index, count);
            }
        }
    }

    db.close()?;
    Ok(())
}

fn dump_command(config: &StoreConfig, args: &DumpArgs) -> anyhow::Result<()> {
    let mut db = open_database(config, true, IndexMode::Live)?;
    with_record_type!(args.table.as_str(), dump_table(&db, args))?;
    db.close()?;
    Ok(())
}

fn dump_table<R: Record + Default + Debug>(db: &Database, args: &DumpArgs) -> anyhow::Result<()> {
    let table = db.table::<R>()?;
    let records = match (&args.index, args.reverse) {
        (Some(index), false) => table.index_iter::<R>(index)?,
        (Some(index), true) => table.index_iter_rev::<R>(index)?,
        (None, false) => table.iter::<R>()?,
        (None, true) => table.iter_rev::<R>()?,
    };

    for record in records.take(args.limit.unwrap_or(usize::MAX)) {
        let record = record?;
        println!("{:>10} {:?}", record.key(), record);
    }
    Ok(())
}

fn verify_command(config: &StoreConfig) -> anyhow::Result<()> {
    let mut db = open_database(config, true, IndexMode::Live)?;
    let names: Vec<&'static str> = db.schema().tables().iter().map(|spec| spec.name).collect();

    let mut failures = 0;
    for name in names {
        let (checked, bad) = with_record_type!(name, verify_table(&db))?;
        info!(table = name, checked, bad, "Verified");
        failures += bad;
    }

    db.close()?;
    if failures > 0 {
        anyhow::bail!("{} records failed to decode", failures);
    }
    println!("All records decoded");
    Ok(())
}

fn verify_table<R: Record + Default>(db: &Database) -> anyhow::Result<(usize, usize)> {
    let mut checked = 0;
    let mut bad = 0;
    for record in db.table::<R>()?.iter::<R>()? {
        checked += 1;
        if let Err(e) = record {
            warn!(table = R::TABLE, "{}", e);
            bad += 1;
        }
    }
    Ok((checked, bad))
}

fn compact_command(config: &StoreConfig) -> anyhow::Result<()> {
    let mut db = open_database(config, false, IndexMode::Live)?;
    let reclaimed = db.compact()?;
    db.close()?;
    println!("Reclaimed {} bytes", reclaimed);
    Ok(())
}

fn rebuild_command(config: &StoreConfig) -> anyhow::Result<()> {
    let mut db = open_database(config, false, IndexMode::Deferred)?;
    db.attach_indexes(true)?;
    db.close()?;
    println!("Indexes rebuilt");
    Ok(())
}

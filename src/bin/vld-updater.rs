//! Applies update files to a database, or drops a table with its VLD table.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, filter::LevelFilter};
use vld_updater::{SeqnoScope, Updater, UpdaterConfig};

#[derive(Parser)]
#[command(name = "vld-updater")]
#[command(about = "Applies table updates with validity ranges", long_about = None)]
struct Args {
    /// Convert unsigned integers above 2147483647 to their signed 32-bit value.
    /// Do not use for tables with BIGINT columns.
    #[arg(long, default_value_t = false)]
    convert_unsigned: bool,
    /// Print statements instead of executing them, using temporary tables.
    /// Only valid with apply_local_update.
    #[arg(long, default_value_t = false)]
    temporary_tables: bool,
    /// Trace every statement sent to the database.
    #[arg(long, default_value_t = false)]
    debug: bool,
    /// JSON file overriding the default settings.
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
#[command(rename_all = "snake_case")]
enum Command {
    /// Apply an update, allocating globally unique sequence numbers.
    ApplyGlobalUpdate { file: PathBuf },
    /// Apply an update, allocating sequence numbers local to this database.
    ApplyLocalUpdate { file: PathBuf },
    /// Drop a table and its VLD table and forget its sequence numbers.
    DropTable { name: String },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    if args.temporary_tables && !matches!(args.command, Command::ApplyLocalUpdate { .. }) {
        bail!("--temporary-tables can only be used with apply_local_update");
    }
    init_logging(&args);

    let mut config = match &args.config {
        Some(path) => UpdaterConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => UpdaterConfig::default(),
    };
    config.convert_unsigned |= args.convert_unsigned;
    config.temporary_tables |= args.temporary_tables;

    let mut updater = Updater::open(config)?;
    match args.command {
        Command::ApplyGlobalUpdate { file } => apply(&mut updater, &file, SeqnoScope::Global),
        Command::ApplyLocalUpdate { file } => apply(&mut updater, &file, SeqnoScope::Local),
        Command::DropTable { name } => drop_table(&mut updater, &name),
    }
}

fn init_logging(args: &Args) {
    // Temporary mode prints SQL on stdout; keep stderr to warnings.
    let level = if args.debug {
        LevelFilter::DEBUG
    } else if args.temporary_tables {
        LevelFilter::WARN
    } else {
        LevelFilter::INFO
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn apply(updater: &mut Updater, file: &Path, scope: SeqnoScope) -> anyhow::Result<()> {
    let report = updater
        .apply_update_file(file, scope)
        .with_context(|| format!("applying {}", file.display()))?;
    tracing::info!(
        status = ?report.status,
        blocks = report.blocks_applied(),
        sql_statements = report.sql_statements,
        rows = report.rows_inserted(),
        seqnos = ?report.seqnos(),
        "done"
    );
    Ok(())
}

fn drop_table(updater: &mut Updater, name: &str) -> anyhow::Result<()> {
    if !confirm(&format!("Do you really want to drop table {name}?"))? {
        println!("Table {name} not dropped");
        return Ok(());
    }
    if updater.is_authorising()?
        && !confirm(&format!(
            "This is an authorising database, do you REALLY want to drop table {name}?"
        ))?
    {
        println!("Table {name} not dropped");
        return Ok(());
    }
    let report = updater.drop_table(name)?;
    for table in &report.dropped {
        println!("Dropped table {table}");
    }
    for table in &report.cleared_seqno_tables {
        println!("Removed {name} entries from {table}");
    }
    Ok(())
}

fn confirm(question: &str) -> anyhow::Result<bool> {
    let stdin = io::stdin();
    let mut answer = String::new();
    loop {
        print!("{question} [y/n] ");
        io::stdout().flush()?;
        answer.clear();
        if stdin.lock().read_line(&mut answer)? == 0 {
            return Ok(false);
        }
        match answer.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => continue,
        }
    }
}

use anyhow::{bail, Result};
use chrono::Utc;
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use rfid_trace::{
    export_inventory_file, progress_for, InventorySession, InventoryTable, LineConfig,
    OperatorSession, ScanOutcome, SequentialDiff, Settings, SqliteStore, TraceError, TraceStore,
    UnknownPolicy,
};

const USAGE: &str = "\
usage:
  rfid-trace config create <name> <checkpoint,checkpoint,...>
  rfid-trace config list
  rfid-trace config activate <id>
  rfid-trace config clear
  rfid-trace inventory <catalog.csv> <checkpoint=file.csv>... [--filter-unknown] [--export out.csv]
  rfid-trace scan <checkpoint> <tag>...
  rfid-trace progress <tag>";

fn main() -> Result<()> {
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let settings_path = env::var("RFID_TRACE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("rfid-trace.json"));
    let settings = Settings::load(&settings_path)?;
    let store = SqliteStore::open(Path::new(&settings.db_path))?;

    match args.first().map(String::as_str) {
        Some("config") => run_config(&store, &args[1..]),
        Some("inventory") => run_inventory(&store, settings, &args[1..]),
        Some("scan") => run_scan(&store, &settings, &args[1..]),
        Some("progress") => run_progress(&store, &args[1..]),
        _ => {
            println!("{}", USAGE);
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run_config(store: &SqliteStore, args: &[String]) -> Result<()> {
    match args.first().map(String::as_str) {
        Some("create") => {
            let (Some(name), Some(points)) = (args.get(1), args.get(2)) else {
                bail!("config create needs <name> <checkpoints>\n{}", USAGE);
            };
            let points: Vec<&str> = points.split(',').collect();
            let line = LineConfig::new(name, &points);
            if line.is_empty() {
                bail!("a line needs at least one checkpoint");
            }

            store.save_config(&line)?;
            store.set_active_config_id(Some(&line.id))?;
            println!("✓ Line '{}' saved and activated ({})", line.name, line.id);
            println!("  {}", line.locations.join(" → "));
        }
        Some("list") => {
            let active = store.get_active_config()?.map(|c| c.id);
            for config in store.get_configs()? {
                let marker = if active.as_deref() == Some(config.id.as_str()) { "*" } else { " " };
                println!(
                    "{} {}  {}  [{} checkpoints, {} connections]",
                    marker,
                    config.id,
                    config.name,
                    config.checkpoint_count(),
                    config.connections_count()
                );
            }
        }
        Some("activate") => {
            let Some(id) = args.get(1) else {
                bail!("config activate needs <id>");
            };
            let config = store
                .get_config(id)?
                .ok_or_else(|| TraceError::ConfigNotFound(id.clone()))?;
            store.set_active_config_id(Some(&config.id))?;
            println!("↓ Line '{}' is now active", config.name);
        }
        Some("clear") => {
            store.set_active_config_id(None)?;
            println!("✓ No active line");
        }
        _ => println!("{}", USAGE),
    }
    Ok(())
}

fn run_inventory(store: &SqliteStore, mut settings: Settings, args: &[String]) -> Result<()> {
    let mut catalog_path: Option<&str> = None;
    let mut imports: Vec<(&str, &str)> = Vec::new();
    let mut export_path: Option<&str> = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--filter-unknown" => settings.unknown_policy = UnknownPolicy::Filter,
            "--export" => export_path = iter.next().map(String::as_str),
            other => match other.split_once('=') {
                Some((point, file)) => imports.push((point, file)),
                None if catalog_path.is_none() => catalog_path = Some(other),
                None => bail!("unexpected argument: {}\n{}", other, USAGE),
            },
        }
    }

    let mut session = InventorySession::open(store, &settings)?;
    let now = Utc::now();

    // Checkpoints not imported this run keep their last persisted set
    session.restore_from_store()?;

    if let Some(path) = catalog_path {
        let entries = session.load_catalog_file(Path::new(path))?;
        println!("📂 Catalog: {} entries", entries);
    }

    for (point, file) in imports {
        let count = session.import_checkpoint_file(point, Path::new(file), now)?;
        println!("📂 {}: {} tags", point, count);
    }

    let table = session.generate_table();
    print_table(&table);
    print_diff(&session.diff());

    if let Some(path) = export_path {
        export_inventory_file(&table, now, Path::new(path))?;
        println!("\n💾 Exported {} rows to {}", table.len(), path);
    }

    Ok(())
}

fn print_table(table: &InventoryTable) {
    println!("\n{:<28} {:<20} {:<14} {}", "EPC", "MODEL", "SERIAL", table.checkpoints.join(" | "));
    for row in &table.rows {
        let marks: Vec<&str> = table
            .checkpoints
            .iter()
            .map(|c| if row.is_present(c) { "✓" } else { "·" })
            .collect();
        println!(
            "{:<28} {:<20} {:<14} {}  ({}/{})",
            row.tag_id,
            row.model.name(),
            row.serial,
            marks.join(" | "),
            table.presence_total(row),
            table.checkpoints.len()
        );
    }

    let summary = table.summary();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "Total: {}  Complete: {}  Partial: {}  Lost after first: {}  (checkpoints loaded: {}/{})",
        summary.total,
        summary.complete,
        summary.partial,
        summary.missing_from_first,
        table.checkpoints_loaded,
        table.checkpoints.len()
    );

    for model in table.model_summary() {
        println!("  {:<24} {}", model.model, model.count);
    }
}

fn print_diff(diff: &SequentialDiff) {
    if diff.is_empty() {
        return;
    }

    println!();
    for t in &diff.losses {
        println!("❌ Lost {}: {}", t.label(), t.tags.join(", "));
    }
    for t in &diff.gains {
        println!("➕ Gained {}: {}", t.label(), t.tags.join(", "));
    }
}

fn run_scan(store: &SqliteStore, settings: &Settings, args: &[String]) -> Result<()> {
    let Some((point, tags)) = args.split_first() else {
        bail!("scan needs <checkpoint> <tag>...");
    };

    let mut session = OperatorSession::open(store, settings)?;
    session.select_checkpoint(point)?;

    for tag in tags {
        match session.record(tag, Utc::now())? {
            ScanOutcome::Recorded(scan) => println!("✓ {} @ {}", scan.chip_id, scan.checkpoint_name),
            ScanOutcome::Bounced => println!("↺ {} ignored (bounce)", tag),
            ScanOutcome::Incomplete => println!("… {} ignored (empty)", tag),
        }
    }

    println!(
        "Scans at {}: {}  (total {})",
        session.selected_checkpoint(),
        session.scans_at_selected(),
        session.total_scans()
    );
    Ok(())
}

fn run_progress(store: &SqliteStore, args: &[String]) -> Result<()> {
    let Some(tag) = args.first() else {
        bail!("progress needs <tag>");
    };

    let line = store.get_active_config()?.ok_or(TraceError::NoActiveConfig)?;
    let progress = progress_for(store, &line, tag)?;
    println!("{} on '{}': {} ({}%)", tag, line.name, progress.label(), progress.percent);
    Ok(())
}

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::fmt::Write as _;
use std::path::PathBuf;

// Use library instead of local modules
use equipment_registry::{
    load_csv, parse_installation_date, setup_database, with_registry, Config, Equipment,
    EquipmentRegistry, NewEquipment, RegistryError, VERSION,
};

#[derive(Debug, Parser)]
#[command(name = "equipment-registry", version = VERSION, about = "Track physical equipment records")]
struct Cli {
    /// SQLite file holding the registry (overrides EQUIPMENT_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Register a new piece of equipment
    Add {
        /// Equipment type, e.g. "Pump"
        equipment_type: String,
        manufacturer: String,
        /// Unix timestamp or YYYY-MM-DD
        installation_date: String,
    },
    /// Bulk-register equipment from a CSV file (type,manufacturer,installation_date)
    Import { csv: PathBuf },
    /// Print one record as JSON
    Show { id: u64 },
    /// Print all records, optionally filtered by status
    List {
        #[arg(long)]
        status: Option<String>,
    },
    /// Number of records ever created
    Count,
    /// Set the health score (0-100)
    Health { id: u64, score: u64 },
    /// Set the status label
    Status { id: u64, status: String },
}

fn main() -> Result<()> {
    equipment_registry::init_tracing("warn,equipment_registry=info");

    let cli = Cli::parse();
    let config = Config::from_env().with_db_path(cli.db);

    let mut conn = Connection::open(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;
    setup_database(&conn)?;

    // Load, apply and save under one write lock so concurrent runs never
    // hand out the same id
    let output = with_registry(&mut conn, |registry| run(registry, cli.command))?;
    print!("{}", output);

    Ok(())
}

/// Execute one command; returns its output and whether the registry changed
fn run(registry: &EquipmentRegistry, command: Command) -> Result<(String, bool)> {
    match command {
        Command::Add {
            equipment_type,
            manufacturer,
            installation_date,
        } => {
            let installation_date = parse_installation_date(&installation_date)?;
            let id = registry.add_equipment(NewEquipment::new(
                equipment_type,
                manufacturer,
                installation_date,
            ));
            Ok((format!("✓ Added equipment {}\n", id), true))
        }
        Command::Import { csv } => {
            let rows = load_csv(&csv)?;
            let count = rows.len();
            for new in rows {
                registry.add_equipment(new);
            }
            Ok((
                format!("✓ Imported {} equipment records from {}\n", count, csv.display()),
                count > 0,
            ))
        }
        Command::Show { id } => {
            let equipment = registry.get_equipment(id).map_err(coded)?;
            Ok((format!("{}\n", serde_json::to_string_pretty(&equipment)?), false))
        }
        Command::List { status } => {
            let records = match status {
                Some(status) => registry.by_status(&status),
                None => registry.all_equipment(),
            };
            let mut out = String::new();
            for equipment in &records {
                out.push_str(&format_row(equipment));
            }
            let operational = records.iter().filter(|e| e.is_operational()).count();
            writeln!(out, "{} record(s), {} operational", records.len(), operational)?;
            Ok((out, false))
        }
        Command::Count => Ok((format!("{}\n", registry.get_equipment_count()), false)),
        Command::Health { id, score } => {
            registry.update_health_score(id, score).map_err(coded)?;
            Ok((format!("✓ Equipment {} health score set to {}\n", id, score), true))
        }
        Command::Status { id, status } => {
            registry.update_status(id, status.as_str()).map_err(coded)?;
            Ok((format!("✓ Equipment {} status set to {}\n", id, status), true))
        }
    }
}

fn coded(err: RegistryError) -> anyhow::Error {
    anyhow!("{} ({})", err, err.code())
}

fn format_row(equipment: &Equipment) -> String {
    let installed = equipment
        .installed_at()
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| equipment.installation_date.to_string());

    format!(
        "{:>5}  {:<16} {:<20} {}  {:>3}  {}\n",
        equipment.id,
        equipment.equipment_type,
        equipment.manufacturer,
        installed,
        equipment.health_score,
        equipment.status,
    )
}

use crate::equipment::{Equipment, MAX_HEALTH_SCORE};
use crate::registry::EquipmentRegistry;
use anyhow::{anyhow, bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, info, warn};

const LAST_ID_KEY: &str = "last_id";

/// Bumped on every save; a writer whose snapshot is older is refused
const REVISION_KEY: &str = "revision";

/// A registry together with the database revision it was read at
#[derive(Debug)]
pub struct StoredRegistry {
    pub registry: EquipmentRegistry,
    revision: u64,
}

impl StoredRegistry {
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Equipment Table (current state only, one row per id)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS equipment (
            id INTEGER PRIMARY KEY,
            equipment_type TEXT NOT NULL,
            manufacturer TEXT NOT NULL,
            installation_date INTEGER NOT NULL,
            health_score INTEGER NOT NULL,
            status TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Registry metadata (id counter, revision)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS registry_meta (
            key TEXT PRIMARY KEY,
            value INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_equipment_status ON equipment(status)",
        [],
    )?;

    Ok(())
}

/// Read the registry as one consistent snapshot
pub fn load_registry(conn: &mut Connection) -> Result<StoredRegistry> {
    let tx = conn.transaction().context("Failed to begin read transaction")?;
    let stored = read_registry(&tx)?;
    tx.commit()?;
    Ok(stored)
}

/// Write the registry back.
///
/// Fails without writing anything if another writer saved since `stored`
/// was loaded; ids issued on both sides would otherwise collide.
pub fn save_registry(conn: &mut Connection, stored: &mut StoredRegistry) -> Result<usize> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .context("Failed to begin write transaction")?;

    let on_disk = read_meta(&tx, REVISION_KEY)?;
    if on_disk != stored.revision {
        warn!(on_disk, loaded = stored.revision, "stale registry snapshot refused");
        bail!(
            "registry changed on disk since it was loaded (revision {} on disk, {} loaded); reload and retry",
            on_disk,
            stored.revision
        );
    }

    let written = write_registry(&tx, &stored.registry, on_disk + 1)?;
    tx.commit().context("Failed to commit registry snapshot")?;
    stored.revision = on_disk + 1;

    Ok(written)
}

/// Load, run `f`, and save if it reports a change, all under one write lock.
///
/// `f` returns its result plus whether the registry was mutated. An error
/// from `f` rolls everything back.
pub fn with_registry<T, F>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&EquipmentRegistry) -> Result<(T, bool)>,
{
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .context("Failed to begin write transaction")?;

    let stored = read_registry(&tx)?;
    let (value, mutated) = f(&stored.registry)?;

    if mutated {
        write_registry(&tx, &stored.registry, stored.revision + 1)?;
    }
    tx.commit().context("Failed to commit registry snapshot")?;

    Ok(value)
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM equipment", [], |row| row.get(0))?;

    Ok(count)
}

fn read_meta(conn: &Connection, key: &str) -> Result<u64> {
    let value: Option<i64> = conn
        .query_row(
            "SELECT value FROM registry_meta WHERE key = ?1",
            [key],
            |row| row.get(0),
        )
        .optional()?;

    from_sql_int(value.unwrap_or(0))
}

fn write_meta(conn: &Connection, key: &str, value: u64) -> Result<()> {
    conn.execute(
        "INSERT INTO registry_meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, to_sql_int(value)?],
    )?;
    Ok(())
}

fn read_registry(conn: &Connection) -> Result<StoredRegistry> {
    let last_id = read_meta(conn, LAST_ID_KEY)?;
    let revision = read_meta(conn, REVISION_KEY)?;

    let mut stmt = conn.prepare(
        "SELECT id, equipment_type, manufacturer, installation_date, health_score, status
         FROM equipment
         ORDER BY id",
    )?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let records = rows
        .into_iter()
        .map(
            |(id, equipment_type, manufacturer, installation_date, health_score, status)| -> Result<Equipment> {
                let health_score = u32::try_from(health_score)
                    .ok()
                    .filter(|score| *score <= MAX_HEALTH_SCORE)
                    .ok_or_else(|| {
                        anyhow!(
                            "equipment {} has health score {} outside 0..={}",
                            id,
                            health_score,
                            MAX_HEALTH_SCORE
                        )
                    })?;

                Ok(Equipment {
                    id: from_sql_int(id)?,
                    equipment_type,
                    manufacturer,
                    installation_date: from_sql_int(installation_date)?,
                    health_score,
                    status,
                })
            },
        )
        .collect::<Result<Vec<_>>>()?;

    debug!(records = records.len(), revision, "registry loaded");
    Ok(StoredRegistry {
        registry: EquipmentRegistry::from_snapshot(last_id, records),
        revision,
    })
}

fn write_registry(conn: &Connection, registry: &EquipmentRegistry, revision: u64) -> Result<usize> {
    let (last_id, records) = registry.snapshot();
    let now = chrono::Utc::now().to_rfc3339();

    for equipment in &records {
        conn.execute(
            "INSERT INTO equipment (
                id, equipment_type, manufacturer, installation_date,
                health_score, status, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                health_score = excluded.health_score,
                status = excluded.status,
                updated_at = excluded.updated_at",
            params![
                to_sql_int(equipment.id)?,
                equipment.equipment_type,
                equipment.manufacturer,
                to_sql_int(equipment.installation_date)?,
                equipment.health_score,
                equipment.status,
                now,
            ],
        )
        .with_context(|| format!("Failed to save equipment {}", equipment.id))?;
    }

    write_meta(conn, LAST_ID_KEY, last_id)?;
    write_meta(conn, REVISION_KEY, revision)?;

    info!(records = records.len(), last_id, revision, "registry saved");
    Ok(records.len())
}

// SQLite integers are signed 64-bit
fn to_sql_int(value: u64) -> Result<i64> {
    i64::try_from(value).with_context(|| format!("{} does not fit in an SQLite integer", value))
}

fn from_sql_int(value: i64) -> Result<u64> {
    u64::try_from(value).with_context(|| format!("negative value {} in database", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equipment::NewEquipment;

    fn open_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn pump() -> NewEquipment {
        NewEquipment::new("Pump", "Acme Inc", 1625097600)
    }

    fn valve() -> NewEquipment {
        NewEquipment::new("Valve", "Best Valves", 1625184000)
    }

    #[test]
    fn test_save_and_load_registry() {
        let mut conn = open_test_db();

        let mut stored = load_registry(&mut conn).unwrap();
        stored.registry.add_equipment(pump());
        stored.registry.add_equipment(valve());
        stored.registry.update_health_score(1, 90).unwrap();
        stored.registry.update_status(2, "maintenance").unwrap();

        let saved = save_registry(&mut conn, &mut stored).unwrap();
        assert_eq!(saved, 2);
        assert_eq!(verify_count(&conn).unwrap(), 2);

        let loaded = load_registry(&mut conn).unwrap();
        assert_eq!(loaded.registry.get_equipment_count(), 2);
        assert_eq!(loaded.registry.all_equipment(), stored.registry.all_equipment());

        let pump = loaded.registry.get_equipment(1).unwrap();
        assert_eq!(pump.health_score, 90);
        assert_eq!(pump.status, "operational");
    }

    #[test]
    fn test_save_twice_updates_in_place() {
        let mut conn = open_test_db();

        let mut stored = load_registry(&mut conn).unwrap();
        stored.registry.add_equipment(pump());
        save_registry(&mut conn, &mut stored).unwrap();
        assert_eq!(stored.revision(), 1);

        stored.registry.update_health_score(1, 55).unwrap();
        stored.registry.add_equipment(valve());
        save_registry(&mut conn, &mut stored).unwrap();
        assert_eq!(stored.revision(), 2);

        assert_eq!(verify_count(&conn).unwrap(), 2);
        let loaded = load_registry(&mut conn).unwrap();
        assert_eq!(loaded.registry.get_equipment(1).unwrap().health_score, 55);
    }

    #[test]
    fn test_load_empty_database() {
        let mut conn = open_test_db();

        let stored = load_registry(&mut conn).unwrap();
        assert_eq!(stored.revision(), 0);
        assert_eq!(stored.registry.get_equipment_count(), 0);
        assert_eq!(stored.registry.add_equipment(pump()), 1);
    }

    #[test]
    fn test_loaded_counter_continues() {
        let mut conn = open_test_db();

        let mut stored = load_registry(&mut conn).unwrap();
        for _ in 0..3 {
            stored.registry.add_equipment(pump());
        }
        save_registry(&mut conn, &mut stored).unwrap();

        let loaded = load_registry(&mut conn).unwrap();
        assert_eq!(loaded.registry.add_equipment(valve()), 4);
    }

    #[test]
    fn test_out_of_range_health_score_rejected_on_load() {
        let mut conn = open_test_db();
        conn.execute(
            "INSERT INTO equipment (id, equipment_type, manufacturer, installation_date, health_score, status, updated_at)
             VALUES (1, 'Pump', 'Acme Inc', 1625097600, 150, 'operational', '')",
            [],
        )
        .unwrap();

        let err = load_registry(&mut conn).unwrap_err();
        assert!(err.to_string().contains("equipment 1 has health score 150"));
    }

    #[test]
    fn test_stale_writer_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("equipment.db");

        let mut conn_a = Connection::open(&path).unwrap();
        setup_database(&conn_a).unwrap();
        let mut conn_b = Connection::open(&path).unwrap();

        // Both writers start from the same empty registry
        let mut a = load_registry(&mut conn_a).unwrap();
        let mut b = load_registry(&mut conn_b).unwrap();

        assert_eq!(a.registry.add_equipment(pump()), 1);
        assert_eq!(b.registry.add_equipment(valve()), 1);
        b.registry.update_health_score(1, 10).unwrap();

        save_registry(&mut conn_a, &mut a).unwrap();
        let err = save_registry(&mut conn_b, &mut b).unwrap_err();
        assert!(err.to_string().contains("changed on disk"));

        // The first writer's record is intact, nothing merged in
        let loaded = load_registry(&mut conn_b).unwrap();
        assert_eq!(
            loaded.registry.all_equipment(),
            vec![Equipment::new(1, pump())]
        );
    }

    #[test]
    fn test_with_registry_serializes_writers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("equipment.db");

        let mut conn_a = Connection::open(&path).unwrap();
        setup_database(&conn_a).unwrap();
        let mut conn_b = Connection::open(&path).unwrap();

        let id_a = with_registry(&mut conn_a, |registry| Ok((registry.add_equipment(pump()), true))).unwrap();
        let id_b = with_registry(&mut conn_b, |registry| Ok((registry.add_equipment(valve()), true))).unwrap();

        assert_eq!((id_a, id_b), (1, 2));

        let loaded = load_registry(&mut conn_a).unwrap();
        assert_eq!(loaded.registry.get_equipment_count(), 2);
        assert_eq!(loaded.registry.get_equipment(1).unwrap().equipment_type, "Pump");
        assert_eq!(loaded.registry.get_equipment(2).unwrap().equipment_type, "Valve");
        assert_eq!(loaded.revision(), 2);
    }

    #[test]
    fn test_with_registry_rolls_back_on_error() {
        let mut conn = open_test_db();

        let result: Result<()> = with_registry(&mut conn, |registry| {
            registry.add_equipment(pump());
            registry.update_health_score(1, 101)?;
            Ok(((), true))
        });

        assert!(result.is_err());
        assert_eq!(verify_count(&conn).unwrap(), 0);
        assert_eq!(load_registry(&mut conn).unwrap().registry.get_equipment_count(), 0);
    }

    #[test]
    fn test_with_registry_read_only_leaves_revision() {
        let mut conn = open_test_db();

        let count = with_registry(&mut conn, |registry| Ok((registry.get_equipment_count(), false))).unwrap();

        assert_eq!(count, 0);
        assert_eq!(load_registry(&mut conn).unwrap().revision(), 0);
    }
}

// 🗂️ Equipment Registry - id allocation + record storage
//
// The registry owns the id counter and the id -> record map.
// Ids come only from the counter: 1, 2, 3, ... never reused.
// There is no delete, so the counter is also the number of live records.

use crate::equipment::{Equipment, NewEquipment, MAX_HEALTH_SCORE};
use crate::error::{RegistryError, RegistryResult};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

// ============================================================================
// REGISTRY STATE
// ============================================================================

#[derive(Debug, Default)]
struct RegistryState {
    last_id: u64,
    records: BTreeMap<u64, Equipment>,
}

// ============================================================================
// EQUIPMENT REGISTRY
// ============================================================================

/// In-memory store of current equipment state.
///
/// Cloning the registry hands out another handle onto the same store.
/// Each call holds the lock for its whole duration, so id allocation is
/// collision-free and readers never see half an update.
#[derive(Debug, Clone, Default)]
pub struct EquipmentRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl EquipmentRegistry {
    /// Create an empty registry (counter at 0)
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from persisted records.
    ///
    /// The counter never drops below the highest stored id.
    pub fn from_snapshot(last_id: u64, records: Vec<Equipment>) -> Self {
        let max_id = records.iter().map(|e| e.id).max().unwrap_or(0);
        let state = RegistryState {
            last_id: last_id.max(max_id),
            records: records.into_iter().map(|e| (e.id, e)).collect(),
        };

        EquipmentRegistry {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Current counter plus every record, in id order
    pub fn snapshot(&self) -> (u64, Vec<Equipment>) {
        let state = self.read();
        (state.last_id, state.records.values().cloned().collect())
    }

    // A poisoned lock still guards consistent data: every mutation below
    // completes its writes before anything can panic.
    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // OPERATIONS
    // ========================================================================

    /// add-equipment: store a new record and return its id.
    ///
    /// Health score starts at 100 and status at "operational" whatever the
    /// caller passes. Empty labels and a zero date are accepted.
    pub fn add_equipment(&self, new: NewEquipment) -> u64 {
        let mut state = self.write();
        state.last_id += 1;
        let id = state.last_id;

        info!(id, equipment_type = %new.equipment_type, manufacturer = %new.manufacturer, "equipment added");
        state.records.insert(id, Equipment::new(id, new));

        id
    }

    /// update-health-score: overwrite the score of an existing record.
    ///
    /// Existence is checked before range, so an unknown id always reports
    /// `NotFound` even with an out-of-range score.
    ///
    /// Any unsigned score is accepted as input so that oversized values
    /// still report `Unauthorized` rather than failing to parse upstream.
    pub fn update_health_score(&self, id: u64, new_score: u64) -> RegistryResult<bool> {
        let mut state = self.write();
        let record = state
            .records
            .get_mut(&id)
            .ok_or_else(|| RegistryError::not_found(id))?;

        let score = match u32::try_from(new_score) {
            Ok(score) if score <= MAX_HEALTH_SCORE => score,
            _ => {
                warn!(id, new_score, "health score rejected");
                return Err(RegistryError::unauthorized(id, new_score));
            }
        };

        info!(id, old = record.health_score, new = score, "health score updated");
        record.health_score = score;
        Ok(true)
    }

    /// update-status: overwrite the status of an existing record.
    ///
    /// Any string is accepted; there is no transition table.
    pub fn update_status(&self, id: u64, new_status: impl Into<String>) -> RegistryResult<bool> {
        let mut state = self.write();
        let record = state
            .records
            .get_mut(&id)
            .ok_or_else(|| RegistryError::not_found(id))?;

        let new_status = new_status.into();
        info!(id, old = %record.status, new = %new_status, "status updated");
        record.status = new_status;
        Ok(true)
    }

    /// get-equipment: the full record for `id`
    pub fn get_equipment(&self, id: u64) -> RegistryResult<Equipment> {
        debug!(id, "get equipment");
        self.read()
            .records
            .get(&id)
            .cloned()
            .ok_or_else(|| RegistryError::not_found(id))
    }

    /// get-equipment-count: number of records ever created
    pub fn get_equipment_count(&self) -> u64 {
        self.read().last_id
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// All records, in id order
    pub fn all_equipment(&self) -> Vec<Equipment> {
        self.read().records.values().cloned().collect()
    }

    /// Records whose status matches exactly
    pub fn by_status(&self, status: &str) -> Vec<Equipment> {
        self.read()
            .records
            .values()
            .filter(|e| e.status == status)
            .cloned()
            .collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================

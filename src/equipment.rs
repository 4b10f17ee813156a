// 🔧 Equipment Record
//
// Identity (id) is assigned by the registry and never changes.
// Type, manufacturer and installation date are fixed at creation.
// Health score and status are the only values that move.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound enforced on every health score update
pub const MAX_HEALTH_SCORE: u32 = 100;

/// Health score every new record starts with
pub const DEFAULT_HEALTH_SCORE: u32 = 100;

/// Status every new record starts with
pub const DEFAULT_STATUS: &str = "operational";

// ============================================================================
// EQUIPMENT RECORD
// ============================================================================

/// One stored piece of equipment.
///
/// Field names on the wire follow the existing callers
/// (`type`, `installation-date`, `health-score`); camelCase spellings are
/// accepted on input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    /// Registry-issued identity, never reused
    pub id: u64,

    /// Free-form label, e.g. "Pump"
    #[serde(rename = "type")]
    pub equipment_type: String,

    pub manufacturer: String,

    /// Unix timestamp (seconds)
    #[serde(rename = "installation-date", alias = "installationDate")]
    pub installation_date: u64,

    /// 0..=100, higher is healthier
    #[serde(rename = "health-score", alias = "healthScore")]
    pub health_score: u32,

    /// Free-text operational state ("operational", "maintenance", ...)
    pub status: String,
}

impl Equipment {
    /// Build a fresh record with the registry defaults applied
    pub fn new(id: u64, new: NewEquipment) -> Self {
        Equipment {
            id,
            equipment_type: new.equipment_type,
            manufacturer: new.manufacturer,
            installation_date: new.installation_date,
            health_score: DEFAULT_HEALTH_SCORE,
            status: DEFAULT_STATUS.to_string(),
        }
    }

    /// Installation date as a UTC timestamp (None if not representable)
    pub fn installed_at(&self) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.installation_date).ok()?;
        DateTime::<Utc>::from_timestamp(secs, 0)
    }

    pub fn is_operational(&self) -> bool {
        self.status == DEFAULT_STATUS
    }
}

// ============================================================================
// CREATION INPUT
// ============================================================================

/// Caller-supplied fields for `add-equipment`.
///
/// Health score and status are deliberately absent: the registry sets them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEquipment {
    #[serde(rename = "type")]
    pub equipment_type: String,

    pub manufacturer: String,

    #[serde(rename = "installation-date", alias = "installationDate")]
    pub installation_date: u64,
}

impl NewEquipment {
    pub fn new(
        equipment_type: impl Into<String>,
        manufacturer: impl Into<String>,
        installation_date: u64,
    ) -> Self {
        NewEquipment {
            equipment_type: equipment_type.into(),
            manufacturer: manufacturer.into(),
            installation_date,
        }
    }
}

//! Row structs that map 1-to-1 onto database tables, plus insert inputs.
//!
//! Decimal columns (`consumption`, `threshold`) are carried as strings so the
//! value written is exactly the value read back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// users
// ---------------------------------------------------------------------------

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    /// Stored credential (already hashed by the caller).  Never serialized.
    #[serde(skip_serializing, default)]
    pub password: String,
}

/// Input for [`crate::Storage::create_user`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
}

impl NewUser {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// devices
// ---------------------------------------------------------------------------

/// A monitored appliance or sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Device {
    pub id: i32,
    pub name: String,
    pub device_type: String,
    pub location: Option<String>,
    pub is_active: bool,
}

// ---------------------------------------------------------------------------
// energy_readings
// ---------------------------------------------------------------------------

/// A single consumption measurement for one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct EnergyReading {
    pub id: i32,
    pub device_id: i32,
    pub timestamp: DateTime<Utc>,
    /// kWh as a decimal string, e.g. `"1.25"`.
    pub consumption: String,
}

impl EnergyReading {
    /// `true` if this stored reading carries the same data as `new`.
    pub fn matches(&self, new: &NewEnergyReading) -> bool {
        self.device_id == new.device_id
            && self.timestamp == new.timestamp
            && self.consumption == new.consumption
    }
}

/// Input for [`crate::Storage::add_energy_reading`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEnergyReading {
    pub device_id: i32,
    pub timestamp: DateTime<Utc>,
    pub consumption: String,
}

// ---------------------------------------------------------------------------
// budget_alerts
// ---------------------------------------------------------------------------

/// A per-user spending threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct BudgetAlert {
    pub id: i32,
    pub user_id: i32,
    /// Decimal string, e.g. `"150.5"`.
    pub threshold: String,
    pub is_enabled: bool,
}

/// Render a threshold the way Postgres returns it from a `NUMERIC` column:
/// shortest decimal text, with `Infinity`, `-Infinity` and `NaN` spelled out.
pub fn threshold_to_string(threshold: f64) -> String {
    if threshold.is_nan() {
        "NaN".to_string()
    } else if threshold == f64::INFINITY {
        "Infinity".to_string()
    } else if threshold == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        threshold.to_string()
    }
}

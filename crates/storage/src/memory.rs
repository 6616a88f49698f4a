//! `MemoryStorage`: an in-process [`Storage`] implementation.
//!
//! Behaves like the Postgres gateway from the caller's point of view:
//! generated ids start at 1, usernames are unique, child rows must reference
//! an existing parent, decimals must parse as `NUMERIC`, timestamps keep
//! microsecond precision, readings and alerts are append-only.  Useful in
//! unit tests and local tooling where no database is available.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use tokio::sync::Mutex;
use tower_sessions::MemoryStore;

use crate::models::threshold_to_string;
use crate::{
    BudgetAlert, Device, EnergyReading, NewEnergyReading, NewUser, Storage, StorageError, User,
};

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    devices: Vec<Device>,
    energy_readings: Vec<EnergyReading>,
    budget_alerts: Vec<BudgetAlert>,
}

/// Next serial id for a table whose rows are kept in insertion order.
fn next_id(table: &'static str, last: Option<i32>) -> Result<i32, StorageError> {
    match last {
        None => Ok(1),
        Some(id) => id
            .checked_add(1)
            .ok_or(StorageError::SequenceExhausted { table }),
    }
}

/// `TIMESTAMPTZ` keeps microseconds.
fn to_timestamptz(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(6)
}

/// Parse `raw` as `NUMERIC` input and return the text Postgres would read
/// back, or `None` where Postgres would reject it.
///
/// Accepts plain decimals (`"1.25"`, `"-.5"`, `"007"`) and the special
/// values `NaN` / `Infinity`.  Exponent notation is not supported.
fn numeric_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let (negative, body) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    match body.to_ascii_lowercase().as_str() {
        "nan" if body.len() == trimmed.len() => return Some("NaN".to_string()),
        "inf" | "infinity" => {
            return Some(if negative { "-Infinity" } else { "Infinity" }.to_string())
        }
        _ => {}
    }

    let (int_part, frac_part) = match body.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (body, ""),
    };
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !all_digits(int_part) || !all_digits(frac_part) {
        return None;
    }

    let int_part = int_part.trim_start_matches('0');
    let int_part = if int_part.is_empty() { "0" } else { int_part };
    let is_zero = int_part == "0" && frac_part.bytes().all(|b| b == b'0');

    let mut text = String::with_capacity(body.len() + 1);
    if negative && !is_zero {
        text.push('-');
    }
    text.push_str(int_part);
    if !frac_part.is_empty() {
        text.push('.');
        text.push_str(frac_part);
    }
    Some(text)
}

/// Cheap to clone; clones share the same tables and session store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    tables: Arc<Mutex<Tables>>,
    sessions: MemoryStore,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a device and return it with its generated id.
    ///
    /// The `Storage` trait exposes no device creation, so tests and demo
    /// tooling populate devices through here.
    pub async fn insert_device(
        &self,
        name: impl Into<String>,
        device_type: impl Into<String>,
        location: Option<String>,
    ) -> Result<Device, StorageError> {
        let mut tables = self.tables.lock().await;
        let device = Device {
            id: next_id("devices", tables.devices.last().map(|d| d.id))?,
            name: name.into(),
            device_type: device_type.into(),
            location,
            is_active: true,
        };
        tables.devices.push(device.clone());
        Ok(device)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    type SessionStore = MemoryStore;

    async fn get_user(&self, id: i32) -> Result<Option<User>, StorageError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, StorageError> {
        let mut tables = self.tables.lock().await;
        if tables.users.iter().any(|u| u.username == user.username) {
            return Err(StorageError::UniqueViolation {
                table: "users",
                column: "username",
            });
        }

        let row = User {
            id: next_id("users", tables.users.last().map(|u| u.id))?,
            username: user.username.clone(),
            password: user.password.clone(),
        };
        tables.users.push(row.clone());
        Ok(row)
    }

    async fn get_devices(&self) -> Result<Vec<Device>, StorageError> {
        Ok(self.tables.lock().await.devices.clone())
    }

    async fn get_device(&self, id: i32) -> Result<Option<Device>, StorageError> {
        let tables = self.tables.lock().await;
        Ok(tables.devices.iter().find(|d| d.id == id).cloned())
    }

    async fn get_energy_readings(&self, device_id: i32) -> Result<Vec<EnergyReading>, StorageError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .energy_readings
            .iter()
            .filter(|r| r.device_id == device_id)
            .cloned()
            .collect())
    }

    async fn add_energy_reading(&self, reading: &NewEnergyReading) -> Result<(), StorageError> {
        // Values are parsed before constraints are checked.
        let consumption = numeric_text(&reading.consumption).ok_or_else(|| {
            StorageError::InvalidValue {
                table: "energy_readings",
                column: "consumption",
                value: reading.consumption.clone(),
            }
        })?;

        let mut tables = self.tables.lock().await;
        if !tables.devices.iter().any(|d| d.id == reading.device_id) {
            return Err(StorageError::ForeignKeyViolation {
                table: "energy_readings",
                column: "device_id",
            });
        }

        let id = next_id("energy_readings", tables.energy_readings.last().map(|r| r.id))?;
        tables.energy_readings.push(EnergyReading {
            id,
            device_id: reading.device_id,
            timestamp: to_timestamptz(reading.timestamp),
            consumption,
        });
        Ok(())
    }

    async fn get_budget_alerts(&self, user_id: i32) -> Result<Vec<BudgetAlert>, StorageError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .budget_alerts
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn set_budget_alert(&self, user_id: i32, threshold: f64) -> Result<(), StorageError> {
        let mut tables = self.tables.lock().await;
        if !tables.users.iter().any(|u| u.id == user_id) {
            return Err(StorageError::ForeignKeyViolation {
                table: "budget_alerts",
                column: "user_id",
            });
        }

        let id = next_id("budget_alerts", tables.budget_alerts.last().map(|a| a.id))?;
        tables.budget_alerts.push(BudgetAlert {
            id,
            user_id,
            threshold: threshold_to_string(threshold),
            is_enabled: true,
        });
        Ok(())
    }

    fn session_store(&self) -> MemoryStore {
        self.sessions.clone()
    }
}

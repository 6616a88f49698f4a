//! The `Storage` trait: the contract every backing store must fulfil.

use async_trait::async_trait;
use tower_sessions::SessionStore;

use crate::{BudgetAlert, Device, EnergyReading, NewEnergyReading, NewUser, StorageError, User};

/// Data-access operations used by the web layer.
///
/// Each method is one query against the backing store.  Lookups return
/// `Ok(None)` when no row matches; store failures come back as
/// [`StorageError`] without retry or translation.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Session persistence handed to the web framework's session layer.
    type SessionStore: SessionStore + Clone;

    async fn get_user(&self, id: i32) -> Result<Option<User>, StorageError>;

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StorageError>;

    /// Insert a user and return it with its generated id.
    ///
    /// Fails with a unique-violation error if the username is taken.
    async fn create_user(&self, user: &NewUser) -> Result<User, StorageError>;

    /// All devices, in no particular order.
    async fn get_devices(&self) -> Result<Vec<Device>, StorageError>;

    async fn get_device(&self, id: i32) -> Result<Option<Device>, StorageError>;

    /// Every reading recorded for `device_id`, in no particular order.
    async fn get_energy_readings(&self, device_id: i32) -> Result<Vec<EnergyReading>, StorageError>;

    async fn add_energy_reading(&self, reading: &NewEnergyReading) -> Result<(), StorageError>;

    async fn get_budget_alerts(&self, user_id: i32) -> Result<Vec<BudgetAlert>, StorageError>;

    /// Record an enabled alert for `user_id`.
    ///
    /// Always inserts a new row; earlier alerts for the same user are left
    /// untouched.
    async fn set_budget_alert(&self, user_id: i32, threshold: f64) -> Result<(), StorageError>;

    fn session_store(&self) -> Self::SessionStore;
}

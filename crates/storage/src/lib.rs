//! `storage` crate: the data-access gateway for the energy tracker.
//!
//! Exposes the [`Storage`] trait (users, devices, energy readings, budget
//! alerts and a web-session store), a Postgres implementation and an
//! in-memory one.  Every operation is a single query; no business logic
//! lives here.

pub mod config;
pub mod error;
pub mod memory;
pub mod models;
pub mod pool;
pub mod postgres;
pub mod sessions;
pub mod traits;

pub use config::StorageConfig;
pub use error::StorageError;
pub use memory::MemoryStorage;
pub use models::{BudgetAlert, Device, EnergyReading, NewEnergyReading, NewUser, User};
pub use pool::DbPool;
pub use postgres::PgStorage;
pub use traits::Storage;

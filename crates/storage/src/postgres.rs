//! Postgres-backed [`Storage`] implementation.
//!
//! Every method is a single statement against the shared pool; no
//! transactions, no retries.  Decimal columns are cast to `text` on the way
//! out and from text to `numeric` on the way in.

use async_trait::async_trait;
use tower_sessions_sqlx_store::PostgresStore;
use tracing::{info, instrument};

use crate::models::threshold_to_string;
use crate::pool::{create_pool, run_migrations, DbPool};
use crate::{
    BudgetAlert, Device, EnergyReading, NewEnergyReading, NewUser, Storage, StorageConfig,
    StorageError, User,
};

/// The production gateway: a pool plus a session store on the same database.
#[derive(Debug, Clone)]
pub struct PgStorage {
    pool: DbPool,
    sessions: PostgresStore,
}

impl PgStorage {
    /// Wrap an existing pool.  Performs no I/O; the session table must
    /// already exist (see [`PgStorage::connect`]).
    pub fn new(pool: DbPool) -> Self {
        let sessions = PostgresStore::new(pool.clone());
        Self { pool, sessions }
    }

    /// Connect using `config`.  When `config.run_migrations` is set, apply
    /// the schema migrations and create the session table if it is missing;
    /// otherwise perform no DDL.
    pub async fn connect(config: &StorageConfig) -> Result<Self, StorageError> {
        let pool = create_pool(config).await?;
        let storage = Self::new(pool);
        if config.run_migrations {
            run_migrations(&storage.pool).await?;
            info!("Ensuring session table exists");
            storage.sessions.migrate().await?;
        }
        Ok(storage)
    }

    /// The underlying pool.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl Storage for PgStorage {
    type SessionStore = PostgresStore;

    #[instrument(skip(self), level = "debug")]
    async fn get_user(&self, id: i32) -> Result<Option<User>, StorageError> {
        let row = sqlx::query_as::<_, User>(
            "SELECT id, username, password FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        let row = sqlx::query_as::<_, User>(
            "SELECT id, username, password FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    #[instrument(skip(self, user), fields(username = %user.username), level = "debug")]
    async fn create_user(&self, user: &NewUser) -> Result<User, StorageError> {
        let row = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password)
            VALUES ($1, $2)
            RETURNING id, username, password
            "#,
        )
        .bind(&user.username)
        .bind(&user.password)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_devices(&self) -> Result<Vec<Device>, StorageError> {
        let rows = sqlx::query_as::<_, Device>(
            "SELECT id, name, device_type, location, is_active FROM devices",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_device(&self, id: i32) -> Result<Option<Device>, StorageError> {
        let row = sqlx::query_as::<_, Device>(
            "SELECT id, name, device_type, location, is_active FROM devices WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_energy_readings(&self, device_id: i32) -> Result<Vec<EnergyReading>, StorageError> {
        let rows = sqlx::query_as::<_, EnergyReading>(
            r#"
            SELECT id, device_id, timestamp, consumption::text AS consumption
            FROM energy_readings
            WHERE device_id = $1
            "#,
        )
        .bind(device_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    #[instrument(skip(self, reading), fields(device_id = reading.device_id), level = "debug")]
    async fn add_energy_reading(&self, reading: &NewEnergyReading) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO energy_readings (device_id, timestamp, consumption)
            VALUES ($1, $2, $3::numeric)
            "#,
        )
        .bind(reading.device_id)
        .bind(reading.timestamp)
        .bind(&reading.consumption)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_budget_alerts(&self, user_id: i32) -> Result<Vec<BudgetAlert>, StorageError> {
        let rows = sqlx::query_as::<_, BudgetAlert>(
            r#"
            SELECT id, user_id, threshold::text AS threshold, is_enabled
            FROM budget_alerts
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    #[instrument(skip(self), level = "debug")]
    async fn set_budget_alert(&self, user_id: i32, threshold: f64) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO budget_alerts (user_id, threshold, is_enabled)
            VALUES ($1, $2::numeric, TRUE)
            "#,
        )
        .bind(user_id)
        .bind(threshold_to_string(threshold))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn session_store(&self) -> PostgresStore {
        self.sessions.clone()
    }
}

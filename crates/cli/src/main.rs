//! `smart-energy-tracker` CLI entry-point.
//!
//! Available sub-commands:
//! - `migrate`:        apply the schema and create the session table.
//! - `devices`:        list every device.
//! - `device`:         show one device.
//! - `readings`:       list the energy readings of a device.
//! - `alerts`:         list the budget alerts of a user.
//! - `set-alert`:      record a new budget alert for a user.
//! - `prune-sessions`: delete expired web sessions once.
//! - `maintain`:       keep pruning expired sessions until interrupted.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use storage::config::DATABASE_URL;
use storage::sessions::{prune_expired_sessions, spawn_expired_session_pruner};
use storage::{PgStorage, Storage, StorageConfig};

#[derive(Parser)]
#[command(
    name = "smart-energy-tracker",
    about = "Storage maintenance and inspection for the energy tracker",
    version
)]
struct Cli {
    /// Postgres connection string.
    #[arg(long, global = true, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending schema migrations and create the session table.
    Migrate,
    /// List all devices.
    Devices,
    /// Show a single device.
    Device { id: i32 },
    /// List the energy readings recorded for a device.
    Readings { device_id: i32 },
    /// List the budget alerts of a user.
    Alerts { user_id: i32 },
    /// Record a new, enabled budget alert for a user.
    SetAlert { user_id: i32, threshold: f64 },
    /// Delete expired sessions once.
    PruneSessions,
    /// Prune expired sessions on the configured interval until Ctrl-C.
    Maintain,
}

impl Command {
    /// Only `migrate` is allowed to change the schema.
    fn changes_schema(&self) -> bool {
        matches!(self, Command::Migrate)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.database_url)?;
    config.run_migrations = cli.command.changes_schema();

    match cli.command {
        Command::Migrate => {
            connect(&config).await?;
            info!("Migrations applied successfully");
        }
        Command::PruneSessions => {
            let gateway = connect(&config).await?;
            prune_expired_sessions(&gateway.session_store()).await?;
            info!("Expired sessions deleted");
        }
        Command::Maintain => {
            let Some(period) = config.session_prune_interval else {
                bail!("session pruning is disabled (SESSION_PRUNE_INTERVAL_SECS=0)");
            };
            let gateway = connect(&config).await?;
            info!("Pruning expired sessions every {}s", period.as_secs());
            let pruner = spawn_expired_session_pruner(gateway.session_store(), period);
            tokio::signal::ctrl_c().await?;
            pruner.abort();
            info!("Shutting down");
        }
        command => {
            let gateway = connect(&config).await?;
            inspect(&gateway, command).await?;
        }
    }

    Ok(())
}

async fn connect(config: &StorageConfig) -> Result<PgStorage> {
    PgStorage::connect(config)
        .await
        .context("failed to connect to database")
}

/// Build the validated config, letting `--database-url` override the
/// environment.
fn load_config(database_url: Option<String>) -> Result<StorageConfig> {
    let config = match database_url {
        Some(url) => StorageConfig::from_lookup(|key| {
            if key == DATABASE_URL {
                Some(url.clone())
            } else {
                std::env::var(key).ok()
            }
        })?,
        None => StorageConfig::from_env()?,
    };
    Ok(config)
}

/// Run a read or write sub-command against any [`Storage`] backend.
async fn inspect<S: Storage>(storage: &S, command: Command) -> Result<()> {
    match command {
        Command::Devices => print_json(&storage.get_devices().await?),
        Command::Device { id } => match storage.get_device(id).await? {
            Some(device) => print_json(&device),
            None => bail!("device {id} not found"),
        },
        Command::Readings { device_id } => print_json(&storage.get_energy_readings(device_id).await?),
        Command::Alerts { user_id } => print_json(&storage.get_budget_alerts(user_id).await?),
        Command::SetAlert { user_id, threshold } => {
            storage.set_budget_alert(user_id, threshold).await?;
            info!("Budget alert recorded for user {user_id}");
            Ok(())
        }
        Command::Migrate | Command::PruneSessions | Command::Maintain => {
            bail!("not an inspection command")
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::{MemoryStorage, NewUser};

    #[test]
    fn cli_parses_set_alert() {
        let cli = Cli::parse_from([
            "smart-energy-tracker",
            "--database-url",
            "postgres://localhost/energy",
            "set-alert",
            "7",
            "150.5",
        ]);
        assert_eq!(cli.database_url.as_deref(), Some("postgres://localhost/energy"));
        assert!(matches!(
            cli.command,
            Command::SetAlert { user_id: 7, threshold } if threshold == 150.5
        ));
    }

    #[test]
    fn only_migrate_changes_schema() {
        assert!(Command::Migrate.changes_schema());
        for command in [
            Command::Devices,
            Command::Device { id: 1 },
            Command::Readings { device_id: 1 },
            Command::Alerts { user_id: 1 },
            Command::SetAlert { user_id: 1, threshold: 1.0 },
            Command::PruneSessions,
            Command::Maintain,
        ] {
            assert!(!command.changes_schema());
        }
    }

    #[test]
    fn explicit_database_url_wins() {
        let config = load_config(Some("postgres://cli/energy".into())).unwrap();
        assert_eq!(config.database_url, "postgres://cli/energy");
    }

    #[tokio::test]
    async fn inspect_runs_against_memory_storage() {
        let storage = MemoryStorage::new();
        let user = storage.create_user(&NewUser::new("dana", "hash")).await.unwrap();
        storage.insert_device("Heater", "appliance", None).await.unwrap();

        inspect(&storage, Command::SetAlert { user_id: user.id, threshold: 42.0 })
            .await
            .unwrap();
        inspect(&storage, Command::Devices).await.unwrap();

        let alerts = storage.get_budget_alerts(user.id).await.unwrap();
        assert_eq!(alerts[0].threshold, "42");

        let err = inspect(&storage, Command::Device { id: 99 }).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}

//! Gateway tests against a live Postgres instance.
//!
//! Run with `DATABASE_URL=postgres://... cargo test -p storage --features integration`.
//! Each test gets a fresh database with the workspace migrations applied.

#![cfg(feature = "integration")]

use std::collections::HashMap;

use chrono::{DateTime, SubsecRound, Utc};
use sqlx::PgPool;
use storage::sessions::prune_expired_sessions;
use storage::{NewEnergyReading, NewUser, PgStorage, Storage};
use time::{Duration, OffsetDateTime};
use tower_sessions::session::{Id, Record};
use tower_sessions::SessionStore;

async fn seed_device(pool: &PgPool, name: &str) -> i32 {
    sqlx::query_scalar::<_, i32>(
        "INSERT INTO devices (name, device_type) VALUES ($1, 'appliance') RETURNING id",
    )
    .bind(name)
    .fetch_one(pool)
    .await
    .expect("seed device")
}

/// `TIMESTAMPTZ` keeps microseconds.
fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn session_record(expiry_date: OffsetDateTime) -> Record {
    Record {
        id: Id::default(),
        data: HashMap::from([("user_id".to_string(), serde_json::json!(1))]),
        expiry_date,
    }
}

async fn session_rows(pool: &PgPool) -> i64 {
    sqlx::query_scalar::<_, i64>(r#"SELECT COUNT(*) FROM "tower_sessions"."session""#)
        .fetch_one(pool)
        .await
        .expect("count sessions")
}

#[sqlx::test(migrations = "../../migrations")]
async fn create_and_lookup_user(pool: PgPool) {
    let gateway = PgStorage::new(pool);

    let created = gateway
        .create_user(&NewUser::new("alice", "hash"))
        .await
        .unwrap();
    let found = gateway.get_user_by_username("alice").await.unwrap().unwrap();
    assert_eq!(found, created);
    assert_eq!(gateway.get_user(created.id).await.unwrap(), Some(created.clone()));
    assert_eq!(gateway.get_user(created.id + 1000).await.unwrap(), None);
}

#[sqlx::test(migrations = "../../migrations")]
async fn duplicate_username_is_unique_violation(pool: PgPool) {
    let gateway = PgStorage::new(pool);

    gateway.create_user(&NewUser::new("bob", "a")).await.unwrap();
    let err = gateway.create_user(&NewUser::new("bob", "b")).await.unwrap_err();
    assert!(err.is_unique_violation(), "unexpected error: {err}");
}

#[sqlx::test(migrations = "../../migrations")]
async fn devices_and_readings(pool: PgPool) {
    let device_id = seed_device(&pool, "Heater").await;
    let gateway = PgStorage::new(pool);

    let devices = gateway.get_devices().await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(gateway.get_device(device_id).await.unwrap().unwrap().name, "Heater");
    assert_eq!(gateway.get_device(device_id + 1).await.unwrap(), None);

    let reading = NewEnergyReading {
        device_id,
        timestamp: now_micros(),
        consumption: "1.25".into(),
    };
    gateway.add_energy_reading(&reading).await.unwrap();

    let readings = gateway.get_energy_readings(device_id).await.unwrap();
    assert_eq!(readings.len(), 1);
    assert!(readings[0].matches(&reading), "stored {:?}", readings[0]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn reading_for_missing_device_fails(pool: PgPool) {
    let gateway = PgStorage::new(pool);
    let reading = NewEnergyReading {
        device_id: 999,
        timestamp: now_micros(),
        consumption: "1".into(),
    };
    let err = gateway.add_energy_reading(&reading).await.unwrap_err();
    assert!(err.is_foreign_key_violation(), "unexpected error: {err}");
}

#[sqlx::test(migrations = "../../migrations")]
async fn budget_alerts_are_insert_only(pool: PgPool) {
    let gateway = PgStorage::new(pool);
    let user = gateway.create_user(&NewUser::new("carol", "hash")).await.unwrap();

    gateway.set_budget_alert(user.id, 150.5).await.unwrap();
    gateway.set_budget_alert(user.id, 80.0).await.unwrap();

    let alerts = gateway.get_budget_alerts(user.id).await.unwrap();
    assert_eq!(alerts.len(), 2);
    assert!(alerts
        .iter()
        .any(|a| a.user_id == user.id && a.threshold == "150.5" && a.is_enabled));
    assert!(alerts.iter().any(|a| a.threshold == "80"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn session_store_round_trip_and_prune(pool: PgPool) {
    let gateway = PgStorage::new(pool.clone());
    let store = gateway.session_store();
    store.migrate().await.unwrap();
    // Creating the table again is a no-op.
    store.migrate().await.unwrap();

    let live = session_record(OffsetDateTime::now_utc() + Duration::hours(1));
    store.save(&live).await.unwrap();
    let loaded = store.load(&live.id).await.unwrap().expect("live session");
    assert_eq!(loaded.data["user_id"], serde_json::json!(1));

    let expired = session_record(OffsetDateTime::now_utc() - Duration::minutes(5));
    store.save(&expired).await.unwrap();
    assert!(store.load(&expired.id).await.unwrap().is_none());
    assert_eq!(session_rows(&pool).await, 2);

    prune_expired_sessions(&store).await.unwrap();
    assert_eq!(session_rows(&pool).await, 1);

    store.delete(&live.id).await.unwrap();
    assert!(store.load(&live.id).await.unwrap().is_none());
    assert_eq!(session_rows(&pool).await, 0);
}

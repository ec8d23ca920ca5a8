//! # SQLite database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interactions are maintained by simple functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers can obtain a connection from a pool, or create an atomic transaction
//! as the need arises and call through to the functions without any other changes.
//!
//! One discipline worth calling out: multi-statement transactions issue their first *write* up front, so SQLite's
//! lock acquisition serialises concurrent flows at the start of the transaction rather than failing a deferred
//! upgrade halfway through.

use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    migrate,
    migrate::MigrateDatabase,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError,
    Sqlite,
    SqlitePool,
};

pub mod agents;
pub mod orders;
pub mod payments;
pub mod products;
pub mod users;

const SQLITE_DB_URL: &str = "sqlite://data/boutique_store.db";

pub fn db_url() -> String {
    let result = env::var("BPS_DATABASE_URL").unwrap_or_else(|_| {
        info!("BPS_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}

pub async fn create_database(url: &str) -> Result<(), SqlxError> {
    if !Sqlite::database_exists(url).await.unwrap_or(false) {
        Sqlite::create_database(url).await?;
        info!("Created Sqlite database {url}");
    }
    Ok(())
}

/// Runs the embedded migrations against the given pool. Safe to call on every startup; already-applied migrations
/// are skipped.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqlxError> {
    migrate!("./migrations").run(pool).await.map_err(|e| SqlxError::Migrate(Box::new(e)))?;
    info!("🗃️ Migrations complete");
    Ok(())
}

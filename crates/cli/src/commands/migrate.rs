//! Database migration commands.
//!
//! # Environment Variables
//!
//! - `ADDRESS_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Migrations live in `crates/service/migrations/` and are embedded at
//! compile time.

use std::collections::HashSet;

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use sqlx::migrate::Migrator;

static MIGRATOR: Migrator = sqlx::migrate!("../service/migrations");

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

fn database_url() -> Result<SecretString, MigrationError> {
    dotenvy::dotenv().ok();

    std::env::var("ADDRESS_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| MigrationError::MissingEnvVar("ADDRESS_DATABASE_URL"))
}

async fn connect() -> Result<PgPool, MigrationError> {
    let database_url = database_url()?;
    tracing::info!("Connecting to address database...");
    Ok(PgPool::connect(database_url.expose_secret()).await?)
}

/// Apply pending migrations.
///
/// # Errors
///
/// Returns `MigrationError` if the database is unreachable or a migration
/// fails.
pub async fn run() -> Result<(), MigrationError> {
    let pool = connect().await?;

    tracing::info!(available = MIGRATOR.iter().count(), "Running address book migrations...");
    MIGRATOR.run(&pool).await?;

    tracing::info!("Address book migrations complete!");
    Ok(())
}

/// Log every known migration and whether it has been applied.
///
/// # Errors
///
/// Returns `MigrationError` if the database is unreachable.
pub async fn status() -> Result<(), MigrationError> {
    let pool = connect().await?;

    let tracked: bool =
        sqlx::query_scalar("SELECT to_regclass('_sqlx_migrations') IS NOT NULL")
            .fetch_one(&pool)
            .await?;
    let applied: HashSet<i64> = if tracked {
        sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success")
            .fetch_all(&pool)
            .await?
            .into_iter()
            .collect()
    } else {
        HashSet::new()
    };

    for migration in MIGRATOR.iter() {
        tracing::info!(
            version = migration.version,
            description = %migration.description,
            applied = applied.contains(&migration.version),
            "Migration"
        );
    }
    Ok(())
}

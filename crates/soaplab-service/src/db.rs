use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use thiserror::Error;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

#[derive(Error, Debug)]
pub enum DatabaseSetupError {
    #[error("Failed to connect to {url}: {source}")]
    Connect {
        url: String,
        source: diesel::ConnectionError,
    },
    #[error("Failed to run migrations: {0}")]
    Migrations(String),
}

/// Opens the database and brings its schema up to date.
pub fn establish_connection(database_url: &str) -> Result<SqliteConnection, DatabaseSetupError> {
    let mut connection =
        SqliteConnection::establish(database_url).map_err(|source| DatabaseSetupError::Connect {
            url: database_url.to_string(),
            source,
        })?;

    run_migrations(&mut connection)?;
    Ok(connection)
}

pub fn run_migrations(connection: &mut SqliteConnection) -> Result<(), DatabaseSetupError> {
    connection
        .run_pending_migrations(MIGRATIONS)
        .map(|applied| {
            for version in applied {
                tracing::info!(%version, "Applied migration");
            }
        })
        .map_err(|err| DatabaseSetupError::Migrations(err.to_string()))
}

#[cfg(test)]
pub fn establish_test_connection() -> SqliteConnection {
    establish_connection(":memory:").expect("Failed to create in-memory database")
}

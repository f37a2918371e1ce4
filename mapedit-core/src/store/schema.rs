#![forbid(unsafe_code)]

use rusqlite::{Connection, Error as SqliteError, OptionalExtension, Transaction};
use thiserror::Error;

/// Version recorded in `features_schema_version` by this build.
pub const SCHEMA_VERSION: i64 = 1;

/// Errors raised when initialising the feature schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A migration statement failed.
    #[error("failed to execute migration step '{step}'")]
    Migration {
        /// Name of the failing step.
        step: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// The database was created by an incompatible build.
    #[error(
        "expected feature schema version {expected} but found {found}; apply migrations before retrying"
    )]
    VersionMismatch {
        /// Version this build understands.
        expected: i64,
        /// Version recorded in the database.
        found: i64,
    },
}

/// Create the `features` table and its indexes if they are missing.
///
/// Existing databases must carry [`SCHEMA_VERSION`].
pub(super) fn initialise_schema(connection: &mut Connection) -> Result<(), SchemaError> {
    let transaction = connection
        .transaction()
        .map_err(|source| SchemaError::Migration {
            step: "begin schema transaction",
            source,
        })?;

    run_migration_step(
        &transaction,
        "create features",
        "CREATE TABLE IF NOT EXISTS features (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT,
            description TEXT,
            geometry BLOB NOT NULL,
            srid INTEGER NOT NULL,
            geometry_type TEXT NOT NULL
                CHECK (geometry_type IN ('Point', 'LineString', 'Polygon')),
            properties TEXT NOT NULL DEFAULT '{}',
            building_number TEXT,
            building_type TEXT,
            icon TEXT,
            osm_id TEXT,
            road_type TEXT,
            direction TEXT
                CHECK (direction IS NULL OR direction IN ('oneway', 'oneway_reverse', 'bidirectional')),
            lane_count INTEGER CHECK (lane_count IS NULL OR lane_count >= 0),
            max_speed INTEGER CHECK (max_speed IS NULL OR max_speed >= 0),
            surface TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    )?;
    run_migration_step(
        &transaction,
        "index features osm_id",
        "CREATE INDEX IF NOT EXISTS idx_features_osm_id ON features(osm_id)",
    )?;
    ensure_schema_version(&transaction)?;

    transaction
        .commit()
        .map_err(|source| SchemaError::Migration {
            step: "commit schema transaction",
            source,
        })
}

fn ensure_schema_version(transaction: &Transaction<'_>) -> Result<(), SchemaError> {
    run_migration_step(
        transaction,
        "create schema version table",
        "CREATE TABLE IF NOT EXISTS features_schema_version (
            version INTEGER PRIMARY KEY CHECK (version > 0),
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        ) WITHOUT ROWID",
    )?;

    let existing: Option<i64> = transaction
        .query_row(
            "SELECT version FROM features_schema_version LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|source| SchemaError::Migration {
            step: "read schema version",
            source,
        })?;

    match existing {
        Some(version) if version == SCHEMA_VERSION => Ok(()),
        Some(found) => Err(SchemaError::VersionMismatch {
            expected: SCHEMA_VERSION,
            found,
        }),
        None => transaction
            .execute(
                "INSERT INTO features_schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )
            .map(|_| ())
            .map_err(|source| SchemaError::Migration {
                step: "record schema version",
                source,
            }),
    }
}

fn run_migration_step(
    transaction: &Transaction<'_>,
    step: &'static str,
    sql: &str,
) -> Result<(), SchemaError> {
    transaction
        .execute(sql, [])
        .map(|_| ())
        .map_err(|source| SchemaError::Migration { step, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn initialisation_is_idempotent() {
        let mut connection = Connection::open_in_memory().expect("open in-memory database");
        initialise_schema(&mut connection).expect("first initialisation");
        initialise_schema(&mut connection).expect("second initialisation");

        let version: i64 = connection
            .query_row("SELECT version FROM features_schema_version", [], |row| {
                row.get(0)
            })
            .expect("read version");
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[rstest]
    fn rejects_unknown_version() {
        let mut connection = Connection::open_in_memory().expect("open in-memory database");
        initialise_schema(&mut connection).expect("initialise");
        connection
            .execute("UPDATE features_schema_version SET version = 99", [])
            .expect("bump version");

        let err = initialise_schema(&mut connection).expect_err("mismatch should fail");
        assert!(matches!(
            err,
            SchemaError::VersionMismatch {
                expected: SCHEMA_VERSION,
                found: 99
            }
        ));
    }

    #[rstest]
    fn rejects_unknown_direction() {
        let mut connection = Connection::open_in_memory().expect("open in-memory database");
        initialise_schema(&mut connection).expect("initialise");
        let result = connection.execute(
            "INSERT INTO features (geometry, srid, geometry_type, direction, created_at, updated_at)
             VALUES (x'00', 4326, 'Point', 'sideways', 'now', 'now')",
            [],
        );
        assert!(result.is_err());
    }
}

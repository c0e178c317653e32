use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use crate::models::{CoreError, CoreErrorKind, UserId};
use crate::persistence::{MigrationStore, PersistenceResult, UserRecordStore};
use crate::sqlite::migrations::{current_schema_version, migrations};

const MIGRATIONS_TABLE: &str = "feedline_schema_migrations";

const UPSERT_RECORD_SQL: &str = "
INSERT INTO user_records (user_id, record_key, value_json, updated_at_unix)
VALUES (?1, ?2, ?3, strftime('%s', 'now'))
ON CONFLICT(user_id, record_key) DO UPDATE SET
    value_json = excluded.value_json,
    updated_at_unix = excluded.updated_at_unix
";

const SELECT_RECORD_SQL: &str =
    "SELECT value_json FROM user_records WHERE user_id = ?1 AND record_key = ?2";

/// Record store backed by one SQLite file. Every call opens its own
/// connection, so a single store can be shared across threads.
pub struct SqliteStore {
    database_path: PathBuf,
}

impl SqliteStore {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
        }
    }

    pub fn list_record_keys(&self, user: &UserId) -> PersistenceResult<Vec<String>> {
        self.with_connection("list_record_keys", |connection| {
            ensure_schema_ready(connection)?;
            let mut statement = connection.prepare(
                "
SELECT record_key
FROM user_records
WHERE user_id = ?1
ORDER BY updated_at_unix DESC, record_key ASC
",
            )?;
            let rows = statement.query_map([user.as_str()], |row| row.get(0))?;
            rows.collect()
        })
    }

    fn with_connection<T>(
        &self,
        operation_name: &str,
        operation: impl FnOnce(&mut Connection) -> rusqlite::Result<T>,
    ) -> PersistenceResult<T> {
        let mut connection = open_connection(&self.database_path)
            .map_err(|error| storage_error(operation_name, error))?;
        operation(&mut connection).map_err(|error| storage_error(operation_name, error))
    }
}

impl MigrationStore for SqliteStore {
    fn current_version(&self) -> PersistenceResult<i64> {
        self.with_connection("current_version", |connection| {
            ensure_migrations_table(connection)?;
            read_current_version(connection)
        })
    }

    fn migrate_to_latest(&self) -> PersistenceResult<()> {
        let applied = self.with_connection("migrate_to_latest", |connection| {
            ensure_migrations_table(connection)?;
            let current_version = read_current_version(connection)?;
            if current_version > current_schema_version() {
                return Err(sqlite_failure(&format!(
                    "database schema version {current_version} is newer than supported version {}",
                    current_schema_version()
                )));
            }

            let transaction = connection.transaction()?;
            let mut applied = 0;
            for migration in migrations() {
                // DDL is IF NOT EXISTS, so replaying recorded versions
                // restores objects dropped behind our back.
                transaction.execute_batch(migration.up_sql)?;
                if migration.version > current_version {
                    transaction.execute(
                        &format!(
                            "INSERT INTO {MIGRATIONS_TABLE} (version, name, applied_at_unix)
                             VALUES (?1, ?2, strftime('%s', 'now'))"
                        ),
                        (migration.version, migration.name),
                    )?;
                    applied += 1;
                }
            }
            transaction.commit()?;
            Ok(applied)
        })?;

        if applied > 0 {
            tracing::info!(
                applied,
                version = current_schema_version(),
                "feedline database migrated"
            );
        }
        Ok(())
    }
}

impl UserRecordStore for SqliteStore {
    fn read_record(&self, user: &UserId, key: &str) -> PersistenceResult<Option<String>> {
        self.with_connection("read_record", |connection| {
            ensure_schema_ready(connection)?;
            connection
                .query_row(SELECT_RECORD_SQL, params![user.as_str(), key], |row| {
                    row.get(0)
                })
                .optional()
        })
    }

    fn write_record(&self, user: &UserId, key: &str, value: &str) -> PersistenceResult<()> {
        self.with_connection("write_record", |connection| {
            ensure_schema_ready(connection)?;
            connection.execute(UPSERT_RECORD_SQL, params![user.as_str(), key, value])?;
            Ok(())
        })
    }

    fn update_record(
        &self,
        user: &UserId,
        key: &str,
        update: &mut dyn FnMut(Option<&str>) -> PersistenceResult<Option<String>>,
    ) -> PersistenceResult<()> {
        let failed = |error: rusqlite::Error| storage_error("update_record", error);

        let mut connection = open_connection(&self.database_path).map_err(failed)?;
        ensure_schema_ready(&connection).map_err(failed)?;

        // IMMEDIATE takes the write lock up front so a concurrent writer
        // cannot slip in between the read and the upsert.
        let transaction = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(failed)?;
        let current: Option<String> = transaction
            .query_row(SELECT_RECORD_SQL, params![user.as_str(), key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(failed)?;

        let Some(next) = update(current.as_deref())? else {
            return Ok(());
        };
        transaction
            .execute(UPSERT_RECORD_SQL, params![user.as_str(), key, next])
            .map_err(failed)?;
        transaction.commit().map_err(failed)
    }

    fn delete_record(&self, user: &UserId, key: &str) -> PersistenceResult<()> {
        self.with_connection("delete_record", |connection| {
            ensure_schema_ready(connection)?;
            connection.execute(
                "DELETE FROM user_records WHERE user_id = ?1 AND record_key = ?2",
                params![user.as_str(), key],
            )?;
            Ok(())
        })
    }

    fn delete_user(&self, user: &UserId) -> PersistenceResult<()> {
        self.with_connection("delete_user", |connection| {
            ensure_schema_ready(connection)?;
            connection.execute(
                "DELETE FROM user_records WHERE user_id = ?1",
                [user.as_str()],
            )?;
            Ok(())
        })
    }
}

fn open_connection(database_path: &Path) -> rusqlite::Result<Connection> {
    if let Some(parent) = database_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|error| rusqlite::Error::ToSqlConversionFailure(Box::new(error)))?;
    }
    Connection::open(database_path)
}

fn ensure_migrations_table(connection: &Connection) -> rusqlite::Result<()> {
    connection.execute_batch(&format!(
        "
CREATE TABLE IF NOT EXISTS {MIGRATIONS_TABLE} (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at_unix INTEGER NOT NULL
);
"
    ))
}

fn ensure_schema_ready(connection: &Connection) -> rusqlite::Result<()> {
    ensure_migrations_table(connection)?;
    if read_current_version(connection)? <= 0 {
        return Err(sqlite_failure(
            "database schema is not initialized; run migrate_to_latest before record operations",
        ));
    }
    Ok(())
}

fn read_current_version(connection: &Connection) -> rusqlite::Result<i64> {
    connection.query_row(
        &format!("SELECT COALESCE(MAX(version), 0) FROM {MIGRATIONS_TABLE}"),
        [],
        |row| row.get(0),
    )
}

fn sqlite_failure(message: &str) -> rusqlite::Error {
    rusqlite::Error::ToSqlConversionFailure(Box::new(std::io::Error::other(message.to_string())))
}

fn storage_error(operation: &str, error: rusqlite::Error) -> CoreError {
    CoreError::new(
        CoreErrorKind::StorageFailure,
        format!("sqlite store '{operation}' failed: {error}"),
    )
}

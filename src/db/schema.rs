//! Database schema definitions
//!
//! Bootstrap runs once through rusqlite before the diesel pool is built.
//! Table shapes must stay in step with `diesel_schema.rs`.

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::error::LedgerError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<(), LedgerError> {
    let current_version = get_schema_version(conn)?;

    if current_version < SCHEMA_VERSION {
        if current_version == 0 {
            info!("Creating new database schema v{}", SCHEMA_VERSION);
        } else {
            info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
        }
        migrate_schema(conn, current_version)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &Connection) -> Result<i32, LedgerError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )
    .map_err(|e| LedgerError::Store(format!("Failed to create schema_version table: {}", e)))?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .optional()
        .map_err(|e| LedgerError::Store(format!("Failed to read schema_version: {}", e)))?;

    Ok(version.unwrap_or(0))
}

/// Set schema version
fn set_schema_version(conn: &Connection, version: i32) -> Result<(), LedgerError> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| LedgerError::Store(format!("Failed to clear schema_version: {}", e)))?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])
        .map_err(|e| LedgerError::Store(format!("Failed to set schema_version: {}", e)))?;
    Ok(())
}

/// Bring an older schema up to the current version, one step at a time.
/// Version 0 is an empty database.
fn migrate_schema(conn: &Connection, from_version: i32) -> Result<(), LedgerError> {
    for version in from_version..SCHEMA_VERSION {
        match version {
            0 => create_tables(conn)?,
            _ => {
                return Err(LedgerError::Store(format!(
                    "No migration path from schema v{}",
                    version
                )))
            }
        }
    }
    Ok(())
}

/// Create all tables
fn create_tables(conn: &Connection) -> Result<(), LedgerError> {
    conn.execute_batch(LEDGER_SCHEMA)
        .map_err(|e| LedgerError::Store(format!("Failed to create ledger tables: {}", e)))?;

    conn.execute_batch(INDEXES_SCHEMA)
        .map_err(|e| LedgerError::Store(format!("Failed to create indexes: {}", e)))?;

    Ok(())
}

/// Users, questions, signatures and answers
const LEDGER_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY NOT NULL,
    username TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS questions (
    id TEXT PRIMARY KEY NOT NULL,
    text TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS signatures (
    id TEXT PRIMARY KEY NOT NULL,
    owner_id TEXT NOT NULL REFERENCES users(id),
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS answers (
    id TEXT PRIMARY KEY NOT NULL,
    question_id TEXT NOT NULL REFERENCES questions(id),
    text TEXT NOT NULL,
    signature_id TEXT NOT NULL REFERENCES signatures(id)
);
"#;

const INDEXES_SCHEMA: &str = r#"
CREATE INDEX IF NOT EXISTS idx_answers_signature ON answers(signature_id);
CREATE INDEX IF NOT EXISTS idx_signatures_owner ON signatures(owner_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('users', 'questions', 'signatures', 'answers')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 4);
    }

    #[test]
    fn test_empty_version_table_bootstraps() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE schema_version (version INTEGER NOT NULL)", [])
            .unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), 0);
        init_schema(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_unreadable_version_is_an_error() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE schema_version (revision INTEGER NOT NULL)", [])
            .unwrap();

        let err = init_schema(&conn).unwrap_err();
        assert!(matches!(err, LedgerError::Store(msg) if msg.contains("schema_version")));

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'users'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 0);
    }
}

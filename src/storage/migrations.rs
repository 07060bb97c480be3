//! Versioned schema migrations
//!
//! Migrations run in order at startup, tracked in `schema_migrations`.
//! Column additions requested at runtime go through [`ALLOWED_COLUMNS`];
//! caller-supplied identifiers never reach SQL identifier position.

use rusqlite::Connection;

use crate::error::{Error, Result};
use crate::types::EMISSION_COLUMNS;

/// One schema migration
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    build: fn() -> String,
}

/// Emissions columns that may be added to the reports table at runtime,
/// with their column types. Requests for anything else are rejected.
pub const ALLOWED_COLUMNS: &[(&str, &str)] = &[
    ("scope_2_steam", "TEXT"),
    ("scope_2_heating", "TEXT"),
    ("scope_2_cooling", "TEXT"),
    ("biogenic_total", "TEXT"),
    ("scope_3_16_other", "TEXT"),
];

fn base_schema() -> String {
    let emission_columns: String = EMISSION_COLUMNS
        .iter()
        .map(|c| format!("    {} TEXT NOT NULL DEFAULT '-',\n", c))
        .collect();

    format!(
        r#"
        CREATE TABLE IF NOT EXISTS reports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            company_name TEXT NOT NULL,
            source_1_link TEXT,
            language_code TEXT,
            country_code TEXT,
            revenue_tsek REAL,
            year_of_emissions TEXT,
            status TEXT,
            created_at TEXT NOT NULL,
{emission_columns}            CHECK (company_name <> '')
        );

        CREATE INDEX IF NOT EXISTS idx_reports_company ON reports(company_name);
        CREATE INDEX IF NOT EXISTS idx_reports_created_at ON reports(created_at);

        CREATE TABLE IF NOT EXISTS logs (
            job_id TEXT NOT NULL,
            document_id INTEGER NOT NULL,
            status TEXT NOT NULL,
            msg TEXT NOT NULL,
            job_processed TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS job_lease (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            job_id TEXT NOT NULL,
            acquired_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        );
        "#
    )
}

/// All migrations, in application order
pub fn migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        name: "base schema",
        build: base_schema,
    }]
}

/// Apply every unapplied migration inside its own transaction
pub fn apply_migrations(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        );
        "#,
    )
    .map_err(|e| Error::database(format!("failed to create migrations table: {}", e)))?;

    let current: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| Error::database(e.to_string()))?;

    for migration in migrations().iter().filter(|m| m.version > current) {
        let tx = conn
            .transaction()
            .map_err(|e| Error::database(e.to_string()))?;
        tx.execute_batch(&(migration.build)())
            .map_err(|e| {
                Error::database(format!(
                    "migration {} ({}) failed: {}",
                    migration.version, migration.name, e
                ))
            })?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![
                migration.version,
                migration.name,
                chrono::Utc::now().to_rfc3339()
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;
        tx.commit().map_err(|e| Error::database(e.to_string()))?;
        tracing::info!(
            version = migration.version,
            name = migration.name,
            "applied schema migration"
        );
    }

    Ok(())
}

/// Add an allow-listed emissions column to the reports table.
/// Idempotent: an already-present column is a no-op.
pub fn add_allowed_column(conn: &Connection, column: &str) -> Result<()> {
    let (name, column_type) = ALLOWED_COLUMNS
        .iter()
        .find(|(c, _)| *c == column)
        .ok_or_else(|| Error::ColumnNotAllowed(column.to_string()))?;

    if report_columns(conn)?.iter().any(|c| c == name) {
        return Ok(());
    }

    // Identifier comes from the allow-list above, never from the caller.
    conn.execute_batch(&format!(
        "ALTER TABLE reports ADD COLUMN {} {} DEFAULT '-';",
        name, column_type
    ))
    .map_err(|e| Error::database(format!("failed to add column {}: {}", name, e)))?;
    tracing::info!(column = name, "added emissions column");
    Ok(())
}

/// Current column names of the reports table
pub fn report_columns(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT name FROM pragma_table_info('reports')")
        .map_err(|e| Error::database(e.to_string()))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        conn
    }

    #[test]
    fn migrations_create_all_emission_columns() {
        let conn = test_conn();
        let columns = report_columns(&conn).unwrap();
        for col in EMISSION_COLUMNS {
            assert!(columns.iter().any(|c| c == col), "missing column {}", col);
        }
    }

    #[test]
    fn migrations_are_idempotent() {
        let mut conn = test_conn();
        apply_migrations(&mut conn).unwrap();
        apply_migrations(&mut conn).unwrap();
    }

    #[test]
    fn allowed_column_is_added_once() {
        let conn = test_conn();
        add_allowed_column(&conn, "scope_2_steam").unwrap();
        add_allowed_column(&conn, "scope_2_steam").unwrap();
        let columns = report_columns(&conn).unwrap();
        assert_eq!(columns.iter().filter(|c| *c == "scope_2_steam").count(), 1);
    }

    #[test]
    fn unlisted_column_is_rejected() {
        let conn = test_conn();
        let result = add_allowed_column(&conn, "x; DROP TABLE reports; --");
        assert!(matches!(result, Err(Error::ColumnNotAllowed(_))));
    }
}

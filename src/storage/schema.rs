//! Database schema definitions
//!
//! Records are stored as generic field/value rows so categories with
//! different fields share one table layout.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track harvest runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- One row per category and run
CREATE TABLE IF NOT EXISTS category_outcomes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    category_id TEXT NOT NULL,
    success INTEGER NOT NULL,
    error TEXT,
    total_pages INTEGER NOT NULL,
    discovery TEXT,
    pages_attempted INTEGER NOT NULL,
    pages_failed INTEGER NOT NULL,
    workers_aborted INTEGER NOT NULL,
    saved_at TEXT NOT NULL,
    UNIQUE(run_id, category_id)
);

-- Contained errors reported by a category
CREATE TABLE IF NOT EXISTS outcome_failures (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    outcome_id INTEGER NOT NULL REFERENCES category_outcomes(id) ON DELETE CASCADE,
    message TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_outcome_failures_outcome ON outcome_failures(outcome_id);

-- Extracted records, in harvested order
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    outcome_id INTEGER NOT NULL REFERENCES category_outcomes(id) ON DELETE CASCADE,
    position INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_outcome ON records(outcome_id);

CREATE TABLE IF NOT EXISTS record_fields (
    record_id INTEGER NOT NULL REFERENCES records(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (record_id, name)
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in [
            "runs",
            "category_outcomes",
            "outcome_failures",
            "records",
            "record_fields",
        ] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }
}

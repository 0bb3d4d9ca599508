//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the OutcomeStore trait.

use crate::harvest::{CategoryOutcome, DiscoverySource, Record};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{OutcomeStore, StorageError, StorageResult};
use crate::storage::{OutcomeRecord, RunRecord, RunStatus};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// SQLite outcome store
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens or creates the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn load_failures(&self, outcome_id: i64) -> StorageResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT message FROM outcome_failures WHERE outcome_id = ?1 ORDER BY id")?;
        let failures = stmt
            .query_map(params![outcome_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(failures)
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?).unwrap_or(RunStatus::Running),
    })
}

impl OutcomeStore for SqliteStore {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1 WHERE id = ?2",
            params![status.to_db_string(), run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn complete_run(&mut self, run_id: i64) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![RunStatus::Completed.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Outcomes =====

    fn save_outcome(&mut self, run_id: i64, outcome: &CategoryOutcome) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        tx.execute(
            "DELETE FROM category_outcomes WHERE run_id = ?1 AND category_id = ?2",
            params![run_id, outcome.category_id],
        )?;
        tx.execute(
            "INSERT INTO category_outcomes
                (run_id, category_id, success, error, total_pages, discovery,
                 pages_attempted, pages_failed, workers_aborted, saved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                run_id,
                outcome.category_id,
                outcome.success,
                outcome.error,
                outcome.total_pages,
                outcome.discovery.map(|d| d.to_db_string()),
                outcome.pages_attempted,
                outcome.pages_failed,
                outcome.workers_aborted,
                now
            ],
        )?;
        let outcome_id = tx.last_insert_rowid();

        {
            let mut failure_stmt =
                tx.prepare("INSERT INTO outcome_failures (outcome_id, message) VALUES (?1, ?2)")?;
            for message in &outcome.failures {
                failure_stmt.execute(params![outcome_id, message])?;
            }

            let mut record_stmt =
                tx.prepare("INSERT INTO records (outcome_id, position) VALUES (?1, ?2)")?;
            let mut field_stmt = tx
                .prepare("INSERT INTO record_fields (record_id, name, value) VALUES (?1, ?2, ?3)")?;
            for (position, record) in outcome.records.iter().enumerate() {
                record_stmt.execute(params![outcome_id, position as i64])?;
                let record_id = tx.last_insert_rowid();
                for (name, value) in record.fields() {
                    field_stmt.execute(params![record_id, name, value])?;
                }
            }
        }

        tx.commit()?;

        tracing::debug!(
            "Saved {} records for category {} in run {}",
            outcome.records.len(),
            outcome.category_id,
            run_id
        );
        Ok(())
    }

    fn load_outcomes(&self, run_id: i64) -> StorageResult<Vec<OutcomeRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT o.id, o.category_id, o.success, o.error, o.total_pages, o.discovery,
                    o.pages_attempted, o.pages_failed, o.workers_aborted,
                    (SELECT COUNT(*) FROM records r WHERE r.outcome_id = o.id)
             FROM category_outcomes o
             WHERE o.run_id = ?1
             ORDER BY o.category_id",
        )?;

        let rows = stmt
            .query_map(params![run_id], |row| {
                let discovery: Option<String> = row.get(5)?;
                let record_count: i64 = row.get(9)?;
                Ok((
                    row.get::<_, i64>(0)?,
                    OutcomeRecord {
                        category_id: row.get(1)?,
                        success: row.get(2)?,
                        error: row.get(3)?,
                        total_pages: row.get(4)?,
                        discovery: discovery.as_deref().and_then(DiscoverySource::from_db_string),
                        pages_attempted: row.get(6)?,
                        pages_failed: row.get(7)?,
                        workers_aborted: row.get(8)?,
                        record_count: record_count as u64,
                        failures: Vec::new(),
                    },
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(outcome_id, mut outcome)| {
                outcome.failures = self.load_failures(outcome_id)?;
                Ok(outcome)
            })
            .collect()
    }

    fn load_records(&self, run_id: i64, category_id: &str) -> StorageResult<Vec<Record>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.id, f.name, f.value
             FROM records r
             JOIN category_outcomes o ON r.outcome_id = o.id
             LEFT JOIN record_fields f ON f.record_id = r.id
             WHERE o.run_id = ?1 AND o.category_id = ?2
             ORDER BY r.position, f.name",
        )?;

        let rows = stmt
            .query_map(params![run_id, category_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut records: Vec<Record> = Vec::new();
        let mut current: Option<i64> = None;
        for (record_id, name, value) in rows {
            if current != Some(record_id) {
                records.push(Record::new());
                current = Some(record_id);
            }
            if let (Some(record), Some(name), Some(value)) = (records.last_mut(), name, value) {
                record.insert(name, value);
            }
        }

        Ok(records)
    }

    // ===== Statistics =====

    fn count_records(&self, run_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records r
             JOIN category_outcomes o ON r.outcome_id = o.id
             WHERE o.run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

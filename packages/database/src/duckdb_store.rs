//! `DuckDB`-backed inscription store.
//!
//! One `inscriptions` table holds every harvested inscription. The columns
//! the harvester and typical queries filter on are stored as real columns;
//! the full [`InscriptionRow`] is kept as a JSON document alongside them.
//! `id` is the primary key, which is what makes re-inserting the rows of a
//! re-harvested block harmless.

use std::collections::BTreeMap;
use std::path::Path;

use duckdb::Connection;
use ord_harvest_models::{Height, InscriptionRow};

use crate::{DbError, InscriptionStore, InsertOutcome, height_to_i64};

/// Number of rows per INSERT statement.
const CHUNK_SIZE: usize = 1_000;

/// Bound parameters per inserted row.
const PARAMS_PER_ROW: usize = 8;

/// An [`InscriptionStore`] in a `DuckDB` database file.
pub struct DuckDbStore {
    conn: Connection,
}

impl DuckDbStore {
    /// Opens (or creates) the database at `path` and ensures the schema
    /// and indexes exist.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the parent directory cannot be created, the
    /// connection fails, or schema creation fails.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        log::debug!("Opened inscription store at {}", path.display());
        Self::with_connection(conn)
    }

    /// Opens a throwaway in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or schema creation fails.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, DbError> {
        create_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Inserts one chunk as a single multi-row statement.
    fn insert_chunk(&self, chunk: &[&InscriptionRow]) -> Result<u64, DbError> {
        let mut sql = String::from(
            "INSERT INTO inscriptions (
                id, number, genesis_block_height, genesis_timestamp,
                sat_rarity, content_type, metaprotocol, document
            ) VALUES ",
        );

        for i in 0..chunk.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str("(?, ?, ?, ?, ?, ?, ?, ?)");
        }

        sql.push_str(" ON CONFLICT (id) DO NOTHING");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut param_idx = 1usize;

        for row in chunk {
            let document = serde_json::to_string(row)?;

            stmt.raw_bind_parameter(param_idx, &row.id)?;
            stmt.raw_bind_parameter(param_idx + 1, row.number)?;
            stmt.raw_bind_parameter(param_idx + 2, height_to_i64(row.genesis_block_height)?)?;
            stmt.raw_bind_parameter(param_idx + 3, row.genesis_timestamp)?;
            stmt.raw_bind_parameter(param_idx + 4, row.sat_rarity.as_deref())?;
            stmt.raw_bind_parameter(param_idx + 5, row.content_type.as_deref())?;
            stmt.raw_bind_parameter(param_idx + 6, row.metaprotocol.as_deref())?;
            stmt.raw_bind_parameter(param_idx + 7, document)?;

            param_idx += PARAMS_PER_ROW;
        }

        let rows = stmt.raw_execute()?;
        Ok(u64::try_from(rows).unwrap_or(0))
    }
}

fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS inscriptions (
            id TEXT NOT NULL PRIMARY KEY,
            number BIGINT NOT NULL,
            genesis_block_height BIGINT NOT NULL,
            genesis_timestamp BIGINT NOT NULL,
            sat_rarity TEXT,
            content_type TEXT,
            metaprotocol TEXT,
            document TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_inscriptions_genesis_block_height
            ON inscriptions (genesis_block_height);
        CREATE INDEX IF NOT EXISTS idx_inscriptions_sat_rarity
            ON inscriptions (sat_rarity);
        CREATE INDEX IF NOT EXISTS idx_inscriptions_content_type
            ON inscriptions (content_type);
        CREATE INDEX IF NOT EXISTS idx_inscriptions_metaprotocol
            ON inscriptions (metaprotocol);",
    )?;

    Ok(())
}

impl InscriptionStore for DuckDbStore {
    fn max_genesis_height(&self) -> Result<Option<Height>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT MAX(genesis_block_height) FROM inscriptions")?;
        let max: Option<i64> = stmt.query_row([], |row| row.get(0))?;

        max.map(|h| {
            Height::try_from(h).map_err(|_| DbError::Conversion {
                message: format!("negative genesis height {h} in store"),
            })
        })
        .transpose()
    }

    fn delete_by_genesis_height(&self, height: Height) -> Result<u64, DbError> {
        let deleted = self.conn.execute(
            "DELETE FROM inscriptions WHERE genesis_block_height = ?",
            duckdb::params![height_to_i64(height)?],
        )?;
        Ok(u64::try_from(deleted).unwrap_or(0))
    }

    fn insert_unordered(&self, rows: &[InscriptionRow]) -> Result<InsertOutcome, DbError> {
        let mut outcome = InsertOutcome::default();

        if rows.is_empty() {
            return Ok(outcome);
        }

        // A single statement may not name the same key twice; keep the last.
        let mut last_seen: BTreeMap<&str, usize> = BTreeMap::new();
        for (i, row) in rows.iter().enumerate() {
            last_seen.insert(&row.id, i);
        }
        let deduped: Vec<&InscriptionRow> = rows
            .iter()
            .enumerate()
            .filter(|(i, row)| last_seen.get(row.id.as_str()) == Some(i))
            .map(|(_, row)| row)
            .collect();

        if deduped.len() < rows.len() {
            log::debug!(
                "Deduplicated INSERT batch: {} -> {} rows",
                rows.len(),
                deduped.len(),
            );
        }

        for (batch, chunk) in deduped.chunks(CHUNK_SIZE).enumerate() {
            match self.insert_chunk(chunk) {
                Ok(inserted) => outcome.inserted += inserted,
                Err(e) => {
                    log::error!(
                        "Insert batch {batch} ({} rows) failed, continuing with remaining batches: {e}",
                        chunk.len()
                    );
                    outcome.failed += chunk.len() as u64;
                }
            }
        }

        Ok(outcome)
    }

    fn count(&self) -> Result<u64, DbError> {
        let mut stmt = self.conn.prepare("SELECT COUNT(*) FROM inscriptions")?;
        let count: i64 = stmt.query_row([], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn count_at_height(&self, height: Height) -> Result<u64, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT COUNT(*) FROM inscriptions WHERE genesis_block_height = ?")?;
        let count: i64 = stmt.query_row([height_to_i64(height)?], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

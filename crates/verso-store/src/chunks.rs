use serde::{Deserialize, Serialize};
use tracing::instrument;

use verso_core::ids::ChunkId;

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// One unit of raw input text with its source ordering.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkRow {
    pub id: ChunkId,
    pub content: String,
    pub position: i64,
    pub processed: bool,
    pub created_at: String,
}

const CHUNK_COLUMNS: &str = "id, content, position, processed, created_at";

pub struct ChunkRepo {
    db: Database,
}

impl ChunkRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Add an unprocessed chunk.
    #[instrument(skip(self, content), fields(len = content.len()))]
    pub fn add(&self, content: &str, position: i64) -> Result<ChunkRow, StoreError> {
        let id = ChunkId::new();
        let now = row_helpers::timestamp();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chunks (id, content, position, processed, created_at)
                 VALUES (?1, ?2, ?3, 0, ?4)",
                rusqlite::params![id.as_str(), content, position, now],
            )?;

            Ok(ChunkRow {
                id,
                content: content.to_string(),
                position,
                processed: false,
                created_at: now,
            })
        })
    }

    pub fn get(&self, id: &ChunkId) -> Result<ChunkRow, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {CHUNK_COLUMNS} FROM chunks WHERE id = ?1"))?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_chunk(row),
                None => Err(StoreError::NotFound(format!("chunk {id}"))),
            }
        })
    }

    /// List chunks, optionally filtered by processed flag, ordered by position.
    pub fn list(&self, processed: Option<bool>) -> Result<Vec<ChunkRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut results = Vec::new();
            match processed {
                Some(flag) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {CHUNK_COLUMNS} FROM chunks WHERE processed = ?1
                         ORDER BY position ASC, rowid ASC"
                    ))?;
                    let mut rows = stmt.query([flag])?;
                    while let Some(row) = rows.next()? {
                        results.push(row_to_chunk(row)?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {CHUNK_COLUMNS} FROM chunks ORDER BY position ASC, rowid ASC"
                    ))?;
                    let mut rows = stmt.query([])?;
                    while let Some(row) = rows.next()? {
                        results.push(row_to_chunk(row)?);
                    }
                }
            }
            Ok(results)
        })
    }

    pub fn unprocessed(&self) -> Result<Vec<ChunkRow>, StoreError> {
        self.list(Some(false))
    }

    /// The lowest-positioned chunk still waiting for segmentation.
    pub fn next_unprocessed(&self) -> Result<Option<ChunkRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CHUNK_COLUMNS} FROM chunks WHERE processed = 0
                 ORDER BY position ASC, rowid ASC LIMIT 1"
            ))?;
            let mut rows = stmt.query([])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_chunk(row)?)),
                None => Ok(None),
            }
        })
    }

    pub fn count_unprocessed(&self) -> Result<u64, StoreError> {
        self.db.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM chunks WHERE processed = 0",
                [],
                |row| row.get(0),
            )?;
            Ok(n as u64)
        })
    }

    /// Position one past the highest stored position (1 for an empty store).
    pub fn next_position(&self) -> Result<i64, StoreError> {
        self.db.with_conn(|conn| {
            let max: i64 =
                conn.query_row("SELECT COALESCE(MAX(position), 0) FROM chunks", [], |row| {
                    row.get(0)
                })?;
            Ok(max + 1)
        })
    }

    #[instrument(skip(self), fields(chunk_id = %id))]
    pub fn mark_processed(&self, id: &ChunkId) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let rows = conn.execute("UPDATE chunks SET processed = 1 WHERE id = ?1", [id.as_str()])?;
            if rows == 0 {
                return Err(StoreError::NotFound(format!("chunk {id}")));
            }
            Ok(())
        })
    }
}

pub(crate) fn row_to_chunk(row: &rusqlite::Row<'_>) -> Result<ChunkRow, StoreError> {
    Ok(ChunkRow {
        id: ChunkId::from_raw(row_helpers::get::<String>(row, 0, "chunks", "id")?),
        content: row_helpers::get(row, 1, "chunks", "content")?,
        position: row_helpers::get(row, 2, "chunks", "position")?,
        processed: row_helpers::get(row, 3, "chunks", "processed")?,
        created_at: row_helpers::get(row, 4, "chunks", "created_at")?,
    })
}

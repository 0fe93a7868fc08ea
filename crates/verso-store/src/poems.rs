use serde::{Deserialize, Serialize};
use tracing::instrument;

use verso_core::ids::{ChunkId, PacketId, PoemId, WordId};
use verso_core::PoemStyle;

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// A verified generated artifact attributed to one packet.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoemRow {
    pub id: PoemId,
    pub content: String,
    pub style: PoemStyle,
    pub iteration: i64,
    pub packet_id: PacketId,
    pub metadata: serde_json::Value,
    pub created_at: String,
}

/// Fields needed to insert a poem.
#[derive(Clone, Debug)]
pub struct NewPoem {
    pub content: String,
    pub style: PoemStyle,
    pub iteration: i64,
    pub packet_id: PacketId,
    pub metadata: serde_json::Value,
}

/// One word of a poem's source packet traced back to its chunk.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OriginRow {
    pub word_id: WordId,
    pub value: String,
    pub word_position: i64,
    pub chunk_id: ChunkId,
    pub chunk_content: String,
    pub chunk_position: i64,
}

const POEM_COLUMNS: &str = "id, content, style, iteration, packet_id, metadata, created_at";

pub struct PoemRepo {
    db: Database,
}

impl PoemRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self, poem), fields(packet_id = %poem.packet_id, style = %poem.style))]
    pub fn add(&self, poem: NewPoem) -> Result<PoemRow, StoreError> {
        self.db.with_conn(|conn| insert_poem(conn, poem))
    }

    /// Insert an accepted poem and mark its packet processed in one
    /// transaction; neither write survives if the other fails.
    #[instrument(skip(self, poem), fields(packet_id = %poem.packet_id, style = %poem.style))]
    pub fn add_and_close_packet(&self, poem: NewPoem) -> Result<PoemRow, StoreError> {
        self.db.with_tx(|tx| {
            let row = insert_poem(tx, poem)?;
            let updated = tx.execute(
                "UPDATE packets SET processed = 1 WHERE id = ?1",
                [row.packet_id.as_str()],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("packet {}", row.packet_id)));
            }
            Ok(row)
        })
    }

    pub fn get(&self, id: &PoemId) -> Result<PoemRow, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {POEM_COLUMNS} FROM poems WHERE id = ?1"))?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_poem(row),
                None => Err(StoreError::NotFound(format!("poem {id}"))),
            }
        })
    }

    pub fn list_for_iteration(&self, iteration: i64) -> Result<Vec<PoemRow>, StoreError> {
        self.query_poems(
            &format!(
                "SELECT {POEM_COLUMNS} FROM poems WHERE iteration = ?1
                 ORDER BY created_at ASC, rowid ASC"
            ),
            &iteration,
        )
    }

    pub fn list_for_packet(&self, packet_id: &PacketId) -> Result<Vec<PoemRow>, StoreError> {
        self.query_poems(
            &format!(
                "SELECT {POEM_COLUMNS} FROM poems WHERE packet_id = ?1
                 ORDER BY created_at ASC, rowid ASC"
            ),
            &packet_id.as_str(),
        )
    }

    /// Trace a poem to the words of its source packet and the chunks they
    /// came from, in source order (chunk position, then word offset).
    #[instrument(skip(self), fields(poem_id = %id))]
    pub fn trace_origin(&self, id: &PoemId) -> Result<Vec<OriginRow>, StoreError> {
        // Surfaces NotFound for an unknown poem rather than an empty trace.
        let poem = self.get(id)?;

        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT w.id, w.value, w.position, c.id, c.content, c.position
                 FROM packet_words pw
                 JOIN words w ON w.id = pw.word_id
                 JOIN chunks c ON c.id = w.chunk_id
                 WHERE pw.packet_id = ?1
                 ORDER BY c.position ASC, w.position ASC",
            )?;
            let mut rows = stmt.query([poem.packet_id.as_str()])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(OriginRow {
                    word_id: WordId::from_raw(row_helpers::get::<String>(row, 0, "words", "id")?),
                    value: row_helpers::get(row, 1, "words", "value")?,
                    word_position: row_helpers::get(row, 2, "words", "position")?,
                    chunk_id: ChunkId::from_raw(row_helpers::get::<String>(row, 3, "chunks", "id")?),
                    chunk_content: row_helpers::get(row, 4, "chunks", "content")?,
                    chunk_position: row_helpers::get(row, 5, "chunks", "position")?,
                });
            }
            Ok(results)
        })
    }

    fn query_poems(
        &self,
        sql: &str,
        param: &dyn rusqlite::types::ToSql,
    ) -> Result<Vec<PoemRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let mut rows = stmt.query([param])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_poem(row)?);
            }
            Ok(results)
        })
    }
}

fn insert_poem(conn: &rusqlite::Connection, poem: NewPoem) -> Result<PoemRow, StoreError> {
    let id = PoemId::new();
    let now = row_helpers::timestamp();
    conn.execute(
        "INSERT INTO poems (id, content, style, iteration, packet_id, metadata, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            id.as_str(),
            poem.content,
            poem.style.to_string(),
            poem.iteration,
            poem.packet_id.as_str(),
            serde_json::to_string(&poem.metadata)?,
            now,
        ],
    )?;

    Ok(PoemRow {
        id,
        content: poem.content,
        style: poem.style,
        iteration: poem.iteration,
        packet_id: poem.packet_id,
        metadata: poem.metadata,
        created_at: now,
    })
}

fn row_to_poem(row: &rusqlite::Row<'_>) -> Result<PoemRow, StoreError> {
    let style: String = row_helpers::get(row, 2, "poems", "style")?;
    let metadata: String = row_helpers::get(row, 5, "poems", "metadata")?;

    Ok(PoemRow {
        id: PoemId::from_raw(row_helpers::get::<String>(row, 0, "poems", "id")?),
        content: row_helpers::get(row, 1, "poems", "content")?,
        style: row_helpers::parse_enum(&style, "poems", "style")?,
        iteration: row_helpers::get(row, 3, "poems", "iteration")?,
        packet_id: PacketId::from_raw(row_helpers::get::<String>(row, 4, "poems", "packet_id")?),
        metadata: row_helpers::parse_json(&metadata, "poems", "metadata")?,
        created_at: row_helpers::get(row, 6, "poems", "created_at")?,
    })
}

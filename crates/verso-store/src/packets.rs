use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use verso_core::ids::{PacketId, WordId};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;
use crate::words::{row_to_word, WordRow};

/// An immutable, ordered batch of words.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PacketRow {
    pub id: PacketId,
    pub sequence: i64,
    pub word_count: i64,
    pub processed: bool,
    pub created_at: String,
}

/// A packet member with its packet-local index and source coordinates.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PacketWordRow {
    pub word: WordRow,
    pub packet_sequence: i64,
    pub chunk_position: i64,
}

pub struct PacketRepo {
    db: Database,
}

impl PacketRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a packet from the given words, in order. The packet row, its
    /// sequence number and every word association commit together or not at
    /// all. A word that already belongs to a packet fails with `Conflict`.
    #[instrument(skip(self, word_ids), fields(word_count = word_ids.len()))]
    pub fn create(&self, word_ids: &[WordId]) -> Result<PacketRow, StoreError> {
        if word_ids.is_empty() {
            return Err(StoreError::Conflict("packet must contain at least one word".into()));
        }

        let id = PacketId::new();
        let now = row_helpers::timestamp();

        let row = self.db.with_tx(|tx| {
            let sequence: i64 = tx.query_row(
                "SELECT COALESCE(MAX(sequence), 0) + 1 FROM packets",
                [],
                |row| row.get(0),
            )?;

            tx.execute(
                "INSERT INTO packets (id, sequence, word_count, processed, created_at)
                 VALUES (?1, ?2, ?3, 0, ?4)",
                rusqlite::params![id.as_str(), sequence, word_ids.len() as i64, now],
            )?;

            let mut stmt = tx.prepare(
                "INSERT INTO packet_words (packet_id, word_id, sequence) VALUES (?1, ?2, ?3)",
            )?;
            for (index, word_id) in word_ids.iter().enumerate() {
                stmt.execute(rusqlite::params![id.as_str(), word_id.as_str(), index as i64])?;
            }

            Ok(PacketRow {
                id: id.clone(),
                sequence,
                word_count: word_ids.len() as i64,
                processed: false,
                created_at: now.clone(),
            })
        })?;

        debug!(packet_id = %row.id, sequence = row.sequence, "packet created");
        Ok(row)
    }

    pub fn get(&self, id: &PacketId) -> Result<PacketRow, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.sequence, COUNT(pw.word_id), p.processed, p.created_at
                 FROM packets p LEFT JOIN packet_words pw ON pw.packet_id = p.id
                 WHERE p.id = ?1
                 GROUP BY p.id",
            )?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_packet(row),
                None => Err(StoreError::NotFound(format!("packet {id}"))),
            }
        })
    }

    /// Unprocessed packets ordered by sequence; `word_count` is aggregated
    /// from the association table.
    pub fn unprocessed(&self) -> Result<Vec<PacketRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.sequence, COUNT(pw.word_id), p.processed, p.created_at
                 FROM packets p LEFT JOIN packet_words pw ON pw.packet_id = p.id
                 WHERE p.processed = 0
                 GROUP BY p.id
                 ORDER BY p.sequence ASC",
            )?;
            let mut rows = stmt.query([])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_packet(row)?);
            }
            Ok(results)
        })
    }

    /// Members of a packet in packet-local order.
    pub fn words_for_packet(&self, id: &PacketId) -> Result<Vec<PacketWordRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT w.id, w.value, w.chunk_id, w.position, w.discovered_at,
                        pw.sequence, c.position
                 FROM packet_words pw
                 JOIN words w ON w.id = pw.word_id
                 JOIN chunks c ON c.id = w.chunk_id
                 WHERE pw.packet_id = ?1
                 ORDER BY pw.sequence ASC",
            )?;
            let mut rows = stmt.query([id.as_str()])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(PacketWordRow {
                    word: row_to_word(row)?,
                    packet_sequence: row_helpers::get(row, 5, "packet_words", "sequence")?,
                    chunk_position: row_helpers::get(row, 6, "chunks", "position")?,
                });
            }
            Ok(results)
        })
    }

    #[instrument(skip(self), fields(packet_id = %id))]
    pub fn mark_processed(&self, id: &PacketId) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let rows =
                conn.execute("UPDATE packets SET processed = 1 WHERE id = ?1", [id.as_str()])?;
            if rows == 0 {
                return Err(StoreError::NotFound(format!("packet {id}")));
            }
            Ok(())
        })
    }
}

fn row_to_packet(row: &rusqlite::Row<'_>) -> Result<PacketRow, StoreError> {
    Ok(PacketRow {
        id: PacketId::from_raw(row_helpers::get::<String>(row, 0, "packets", "id")?),
        sequence: row_helpers::get(row, 1, "packets", "sequence")?,
        word_count: row_helpers::get(row, 2, "packets", "word_count")?,
        processed: row_helpers::get(row, 3, "packets", "processed")?,
        created_at: row_helpers::get(row, 4, "packets", "created_at")?,
    })
}

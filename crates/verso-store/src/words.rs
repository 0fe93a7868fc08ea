use serde::{Deserialize, Serialize};
use tracing::instrument;

use verso_core::ids::{ChunkId, WordId};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// A dictionary word discovered at a character offset of a chunk.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WordRow {
    pub id: WordId,
    pub value: String,
    pub chunk_id: ChunkId,
    /// Character offset within the owning chunk's content.
    pub position: i64,
    pub discovered_at: String,
}

/// A match produced by segmentation, not yet persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveredWord {
    pub value: String,
    pub position: i64,
    pub discovered_at: String,
}

impl DiscoveredWord {
    pub fn new(value: impl Into<String>, position: i64) -> Self {
        Self {
            value: value.into(),
            position,
            discovered_at: row_helpers::timestamp(),
        }
    }
}

const WORD_COLUMNS: &str = "w.id, w.value, w.chunk_id, w.position, w.discovered_at";

pub struct WordRepo {
    db: Database,
}

impl WordRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Add a single word.
    #[instrument(skip(self), fields(chunk_id = %chunk_id))]
    pub fn add(&self, chunk_id: &ChunkId, value: &str, position: i64) -> Result<WordRow, StoreError> {
        let word = DiscoveredWord::new(value.to_lowercase(), position);
        self.db.with_conn(|conn| insert_word(conn, chunk_id, &word))
    }

    /// Persist every word found in a chunk and flip the chunk to processed,
    /// as one transaction. Returns ids in the order given.
    #[instrument(skip(self, words), fields(chunk_id = %chunk_id, word_count = words.len()))]
    pub fn record_segmentation(
        &self,
        chunk_id: &ChunkId,
        words: &[DiscoveredWord],
    ) -> Result<Vec<WordId>, StoreError> {
        self.db.with_tx(|tx| {
            let mut ids = Vec::with_capacity(words.len());
            for word in words {
                ids.push(insert_word(tx, chunk_id, word)?.id);
            }
            let rows = tx.execute(
                "UPDATE chunks SET processed = 1 WHERE id = ?1",
                [chunk_id.as_str()],
            )?;
            if rows == 0 {
                return Err(StoreError::NotFound(format!("chunk {chunk_id}")));
            }
            Ok(ids)
        })
    }

    pub fn get(&self, id: &WordId) -> Result<WordRow, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {WORD_COLUMNS} FROM words w WHERE w.id = ?1"))?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_word(row),
                None => Err(StoreError::NotFound(format!("word {id}"))),
            }
        })
    }

    /// Words not yet associated with any packet, oldest discovery first.
    pub fn unused(&self) -> Result<Vec<WordRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {WORD_COLUMNS} FROM words w
                 WHERE NOT EXISTS (SELECT 1 FROM packet_words pw WHERE pw.word_id = w.id)
                 ORDER BY w.discovered_at ASC, w.rowid ASC"
            ))?;
            let mut rows = stmt.query([])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_word(row)?);
            }
            Ok(results)
        })
    }

    pub fn count_unused(&self) -> Result<u64, StoreError> {
        self.db.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM words w
                 WHERE NOT EXISTS (SELECT 1 FROM packet_words pw WHERE pw.word_id = w.id)",
                [],
                |row| row.get(0),
            )?;
            Ok(n as u64)
        })
    }

    /// Words of one chunk ordered by offset.
    pub fn list_for_chunk(&self, chunk_id: &ChunkId) -> Result<Vec<WordRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {WORD_COLUMNS} FROM words w WHERE w.chunk_id = ?1 ORDER BY w.position ASC"
            ))?;
            let rows = stmt
                .query_map([chunk_id.as_str()], |row| Ok(row_to_word(row)))?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().collect()
        })
    }
}

fn insert_word(
    conn: &rusqlite::Connection,
    chunk_id: &ChunkId,
    word: &DiscoveredWord,
) -> Result<WordRow, StoreError> {
    let id = WordId::new();
    conn.execute(
        "INSERT INTO words (id, value, chunk_id, position, discovered_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            id.as_str(),
            word.value,
            chunk_id.as_str(),
            word.position,
            word.discovered_at,
        ],
    )?;
    Ok(WordRow {
        id,
        value: word.value.clone(),
        chunk_id: chunk_id.clone(),
        position: word.position,
        discovered_at: word.discovered_at.clone(),
    })
}

/// Expects the five `WORD_COLUMNS` at indexes 0..5.
pub(crate) fn row_to_word(row: &rusqlite::Row<'_>) -> Result<WordRow, StoreError> {
    Ok(WordRow {
        id: WordId::from_raw(row_helpers::get::<String>(row, 0, "words", "id")?),
        value: row_helpers::get(row, 1, "words", "value")?,
        chunk_id: ChunkId::from_raw(row_helpers::get::<String>(row, 2, "words", "chunk_id")?),
        position: row_helpers::get(row, 3, "words", "position")?,
        discovered_at: row_helpers::get(row, 4, "words", "discovered_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunks::ChunkRepo;

    fn setup() -> (Database, ChunkId) {
        let db = Database::in_memory().unwrap();
        let chunk = ChunkRepo::new(db.clone()).add("hello world program", 1).unwrap();
        (db, chunk.id)
    }

    #[test]
    fn add_lowercases_value() {
        let (db, chunk_id) = setup();
        let repo = WordRepo::new(db);
        let word = repo.add(&chunk_id, "Hello", 0).unwrap();
        assert_eq!(repo.get(&word.id).unwrap().value, "hello");
    }

    #[test]
    fn record_segmentation_marks_chunk_processed() {
        let (db, chunk_id) = setup();
        let repo = WordRepo::new(db.clone());
        let ids = repo
            .record_segmentation(
                &chunk_id,
                &[DiscoveredWord::new("hello", 0), DiscoveredWord::new("world", 6)],
            )
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ChunkRepo::new(db).get(&chunk_id).unwrap().processed);

        let values: Vec<String> = repo.list_for_chunk(&chunk_id).unwrap().into_iter().map(|w| w.value).collect();
        assert_eq!(values, vec!["hello", "world"]);
    }

    #[test]
    fn record_segmentation_is_atomic() {
        let (db, chunk_id) = setup();
        let repo = WordRepo::new(db.clone());
        // Same offset twice violates UNIQUE(chunk_id, position).
        let result = repo.record_segmentation(
            &chunk_id,
            &[DiscoveredWord::new("hello", 0), DiscoveredWord::new("hell", 0)],
        );
        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert_eq!(repo.count_unused().unwrap(), 0);
        assert!(!ChunkRepo::new(db).get(&chunk_id).unwrap().processed);
    }

    #[test]
    fn record_segmentation_with_no_words_still_processes_chunk() {
        let (db, chunk_id) = setup();
        let ids = WordRepo::new(db.clone()).record_segmentation(&chunk_id, &[]).unwrap();
        assert!(ids.is_empty());
        assert_eq!(ChunkRepo::new(db).count_unprocessed().unwrap(), 0);
    }

    #[test]
    fn unused_ordered_by_discovery() {
        let (db, chunk_id) = setup();
        let repo = WordRepo::new(db);
        repo.add(&chunk_id, "world", 6).unwrap();
        repo.add(&chunk_id, "hello", 0).unwrap();

        let values: Vec<String> = repo.unused().unwrap().into_iter().map(|w| w.value).collect();
        assert_eq!(values, vec!["world", "hello"]);
        assert_eq!(repo.count_unused().unwrap(), 2);
    }

    #[test]
    fn word_requires_existing_chunk() {
        let (db, _) = setup();
        let result = WordRepo::new(db).add(&ChunkId::from_raw("chunk_missing"), "hello", 0);
        assert!(result.is_err());
    }
}

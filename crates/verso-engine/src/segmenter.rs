use std::sync::Arc;

use tracing::{debug, instrument};

use verso_core::WordId;
use verso_store::{ChunkRow, Database, DiscoveredWord, WordRepo};

use crate::dictionary::TrieIndex;
use crate::error::EngineError;

pub const MIN_WORD_LENGTH: usize = 3;
pub const MAX_WORD_LENGTH: usize = 15;

/// Greedy longest-match word discovery over a chunk.
pub struct Segmenter {
    index: Arc<TrieIndex>,
    words: WordRepo,
    min_len: usize,
    max_len: usize,
}

impl Segmenter {
    pub fn new(index: Arc<TrieIndex>, db: Database) -> Self {
        Self {
            index,
            words: WordRepo::new(db),
            min_len: MIN_WORD_LENGTH,
            max_len: MAX_WORD_LENGTH,
        }
    }

    pub fn with_lengths(mut self, min_len: usize, max_len: usize) -> Self {
        self.min_len = min_len.max(1);
        self.max_len = max_len.max(self.min_len);
        self
    }

    /// Scan `content` without touching the store. Offsets are character
    /// indices; matches never overlap.
    pub async fn discover(&self, content: &str) -> Vec<DiscoveredWord> {
        let chars: Vec<char> = content.chars().map(|c| c.to_ascii_lowercase()).collect();
        let mut found = Vec::new();
        let mut i = 0;
        while i < chars.len() {
            let remaining = chars.len() - i;
            if remaining >= self.min_len {
                let max = self.max_len.min(remaining);
                if let Some(len) = self.index.longest_match(&chars[i..], self.min_len, max).await {
                    let value: String = chars[i..i + len].iter().collect();
                    found.push(DiscoveredWord::new(value, i as i64));
                    i += len;
                    continue;
                }
            }
            i += 1;
        }
        found
    }

    /// Segment a stored chunk, persist its words and mark it processed in one
    /// unit. Returns word ids in discovery order.
    #[instrument(skip(self, chunk), fields(chunk_id = %chunk.id, position = chunk.position))]
    pub async fn process_chunk(&self, chunk: &ChunkRow) -> Result<Vec<WordId>, EngineError> {
        let discovered = self.discover(&chunk.content).await;
        let ids = self.words.record_segmentation(&chunk.id, &discovered)?;
        debug!(word_count = ids.len(), "chunk segmented");
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::DictionaryBuilder;
    use verso_store::ChunkRepo;

    fn segmenter(words: &[&str]) -> (Database, Segmenter) {
        let db = Database::in_memory().unwrap();
        let source = Arc::new(DictionaryBuilder::from_words(words).into_source());
        let index = Arc::new(TrieIndex::new(source));
        (db.clone(), Segmenter::new(index, db))
    }

    fn values(found: &[DiscoveredWord]) -> Vec<(&str, i64)> {
        found.iter().map(|w| (w.value.as_str(), w.position)).collect()
    }

    #[tokio::test]
    async fn keeps_longest_match() {
        let (_, seg) = segmenter(&["pro", "program", "gram", "ram"]);
        let found = seg.discover("programs").await;
        assert_eq!(values(&found), vec![("program", 0)]);
    }

    #[tokio::test]
    async fn matches_do_not_overlap() {
        let (_, seg) = segmenter(&["the", "hen", "end"]);
        let found = seg.discover("thend").await;
        assert_eq!(values(&found), vec![("the", 0)]);
    }

    #[tokio::test]
    async fn resumes_right_after_match() {
        let (_, seg) = segmenter(&["cat", "dog"]);
        let found = seg.discover("catdog").await;
        assert_eq!(values(&found), vec![("cat", 0), ("dog", 3)]);
    }

    #[tokio::test]
    async fn lowercases_and_ignores_short_words() {
        let (_, seg) = segmenter(&["an", "ant", "hill"]);
        let found = seg.discover("An ANT Hill").await;
        assert_eq!(values(&found), vec![("ant", 3), ("hill", 7)]);
    }

    #[tokio::test]
    async fn respects_max_length() {
        let (_, seg) = segmenter(&["abc", "abcdefghijklmnop"]);
        let found = seg.discover("abcdefghijklmnop").await;
        assert_eq!(values(&found), vec![("abc", 0)]);
    }

    #[tokio::test]
    async fn custom_lengths() {
        let (_, seg) = segmenter(&["an", "ant"]);
        let seg = seg.with_lengths(2, 2);
        assert_eq!(values(&seg.discover("ant").await), vec![("an", 0)]);
    }

    #[tokio::test]
    async fn process_chunk_persists_and_marks_processed() {
        let (db, seg) = segmenter(&["hello", "world"]);
        let chunks = ChunkRepo::new(db.clone());
        let chunk = chunks.add("hello world", 1).unwrap();

        let ids = seg.process_chunk(&chunk).await.unwrap();
        assert_eq!(ids.len(), 2);
        assert!(chunks.get(&chunk.id).unwrap().processed);

        let stored = WordRepo::new(db).list_for_chunk(&chunk.id).unwrap();
        assert_eq!(stored[0].value, "hello");
        assert_eq!(stored[1].position, 6);
    }

    #[tokio::test]
    async fn empty_chunk_still_processed() {
        let (db, seg) = segmenter(&["hello"]);
        let chunks = ChunkRepo::new(db);
        let chunk = chunks.add("zzz", 1).unwrap();
        assert!(seg.process_chunk(&chunk).await.unwrap().is_empty());
        assert_eq!(chunks.count_unprocessed().unwrap(), 0);
    }
}

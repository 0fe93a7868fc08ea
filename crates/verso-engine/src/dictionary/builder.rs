use std::collections::BTreeMap;
use std::path::Path;

use tracing::info;

use super::source::MemoryShardSource;
use super::trie::Trie;
use crate::error::DictionaryError;

/// Builds per-letter shards from a word list.
///
/// Entries are trimmed and lower-cased; anything containing a character
/// other than an ASCII letter is skipped.
#[derive(Debug, Default)]
pub struct DictionaryBuilder {
    shards: BTreeMap<char, Trie>,
    skipped: usize,
}

impl DictionaryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = Self::new();
        for word in words {
            builder.add(word.as_ref());
        }
        builder
    }

    /// Returns true if the word was accepted and new.
    pub fn add(&mut self, raw: &str) -> bool {
        let word = raw.trim().to_ascii_lowercase();
        let Some(first) = word.chars().next() else {
            self.skipped += 1;
            return false;
        };
        if !word.chars().all(|c| c.is_ascii_lowercase()) {
            self.skipped += 1;
            return false;
        }
        self.shards.entry(first).or_default().insert(&word)
    }

    pub fn word_count(&self) -> usize {
        self.shards.values().map(Trie::len).sum()
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn letters(&self) -> impl Iterator<Item = char> + '_ {
        self.shards.keys().copied()
    }

    /// Write one `<letter>.json` per non-empty shard.
    pub fn write_to(&self, dir: &Path) -> Result<usize, DictionaryError> {
        std::fs::create_dir_all(dir).map_err(|e| DictionaryError::Io {
            letter: '*',
            message: e.to_string(),
        })?;

        for (letter, trie) in &self.shards {
            let json = serde_json::to_vec(trie).map_err(|e| DictionaryError::Parse {
                letter: *letter,
                message: e.to_string(),
            })?;
            std::fs::write(dir.join(format!("{letter}.json")), json).map_err(|e| {
                DictionaryError::Io {
                    letter: *letter,
                    message: e.to_string(),
                }
            })?;
        }

        info!(
            dir = %dir.display(),
            shards = self.shards.len(),
            words = self.word_count(),
            skipped = self.skipped,
            "dictionary written"
        );
        Ok(self.shards.len())
    }

    pub fn into_source(self) -> MemoryShardSource {
        MemoryShardSource::new(self.shards.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::source::{DirectoryShardSource, ShardSource};

    #[test]
    fn normalizes_and_partitions() {
        let builder = DictionaryBuilder::from_words(["  Hello", "world", "WORLD", "don't", "", "héllo", "a"]);
        assert_eq!(builder.word_count(), 3);
        assert_eq!(builder.skipped(), 3);
        assert_eq!(builder.letters().collect::<Vec<_>>(), vec!['a', 'h', 'w']);
    }

    #[tokio::test]
    async fn written_shards_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let builder = DictionaryBuilder::from_words(["river", "rain", "stone"]);
        assert_eq!(builder.write_to(dir.path()).unwrap(), 2);
        assert!(!dir.path().join("a.json").exists());

        let source = DirectoryShardSource::new(dir.path());
        let r = source.load('r').await.unwrap();
        assert_eq!(r.len(), 2);
        assert!(r.contains("rain"));
    }
}

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use super::trie::Trie;
use crate::error::DictionaryError;

/// Where shards come from. One shard per lower-case ASCII letter.
#[async_trait]
pub trait ShardSource: Send + Sync {
    async fn load(&self, letter: char) -> Result<Trie, DictionaryError>;
}

/// Reads `<dir>/<letter>.json`. A missing file is an empty shard.
pub struct DirectoryShardSource {
    dir: PathBuf,
}

impl DirectoryShardSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn shard_path(&self, letter: char) -> PathBuf {
        self.dir.join(format!("{letter}.json"))
    }
}

#[async_trait]
impl ShardSource for DirectoryShardSource {
    async fn load(&self, letter: char) -> Result<Trie, DictionaryError> {
        let path = self.shard_path(letter);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(%letter, path = %path.display(), "no shard file, treating as empty");
                return Ok(Trie::new());
            }
            Err(e) => {
                return Err(DictionaryError::Io {
                    letter,
                    message: e.to_string(),
                })
            }
        };
        serde_json::from_slice(&bytes).map_err(|e| DictionaryError::Parse {
            letter,
            message: e.to_string(),
        })
    }
}

/// Serves shards held in memory.
#[derive(Default)]
pub struct MemoryShardSource {
    shards: HashMap<char, Trie>,
}

impl MemoryShardSource {
    pub fn new(shards: HashMap<char, Trie>) -> Self {
        Self { shards }
    }
}

#[async_trait]
impl ShardSource for MemoryShardSource {
    async fn load(&self, letter: char) -> Result<Trie, DictionaryError> {
        Ok(self.shards.get(&letter).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn directory_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectoryShardSource::new(dir.path());
        let trie = source.load('q').await.unwrap();
        assert!(trie.is_empty());
    }

    #[tokio::test]
    async fn directory_corrupt_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.json"), "{broken").unwrap();
        let source = DirectoryShardSource::new(dir.path());
        let err = source.load('b').await.unwrap_err();
        assert!(matches!(err, DictionaryError::Parse { letter: 'b', .. }));
    }

    #[tokio::test]
    async fn memory_source_serves_clones() {
        let mut trie = Trie::new();
        trie.insert("moon");
        let source = MemoryShardSource::new(HashMap::from([('m', trie)]));
        assert!(source.load('m').await.unwrap().contains("moon"));
        assert!(source.load('n').await.unwrap().is_empty());
    }
}

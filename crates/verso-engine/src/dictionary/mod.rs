//! Dictionary Trie Index: word membership partitioned into 26 first-letter
//! shards, loaded on demand.
//!
//! Concurrent requests for a shard that is not yet loaded share a single
//! in-flight load. Loaded shards stay cached until [`TrieIndex::clear_cache`].

mod builder;
mod source;
mod trie;

pub use builder::DictionaryBuilder;
pub use source::{DirectoryShardSource, MemoryShardSource, ShardSource};
pub use trie::{PrefixWords, Trie, TrieNode};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::error::DictionaryError;

type ShardLoad = Shared<BoxFuture<'static, Result<Arc<Trie>, DictionaryError>>>;

/// Letters warmed by `initialize()` when none are configured.
pub const DEFAULT_WARM_LETTERS: [char; 6] = ['t', 'a', 's', 'w', 'i', 'o'];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub initialized: bool,
    pub loaded_letters: Vec<char>,
    pub in_flight: usize,
    pub words_loaded: usize,
}

pub struct TrieIndex {
    source: Arc<dyn ShardSource>,
    warm_letters: Vec<char>,
    loaded: DashMap<char, Arc<Trie>>,
    in_flight: Mutex<HashMap<char, ShardLoad>>,
    initialized: AtomicBool,
}

impl TrieIndex {
    pub fn new(source: Arc<dyn ShardSource>) -> Self {
        Self::with_warm_letters(source, DEFAULT_WARM_LETTERS.to_vec())
    }

    pub fn with_warm_letters(source: Arc<dyn ShardSource>, warm_letters: Vec<char>) -> Self {
        let warm_letters = warm_letters
            .into_iter()
            .map(|c| c.to_ascii_lowercase())
            .filter(char::is_ascii_lowercase)
            .collect();
        Self {
            source,
            warm_letters,
            loaded: DashMap::new(),
            in_flight: Mutex::new(HashMap::new()),
            initialized: AtomicBool::new(false),
        }
    }

    /// Warm the configured shards. Idempotent.
    #[instrument(skip(self), fields(letters = self.warm_letters.len()))]
    pub async fn initialize(&self) -> Result<(), DictionaryError> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        let loads = self.warm_letters.iter().map(|letter| self.shard(*letter));
        for result in futures::future::join_all(loads).await {
            result?;
        }
        self.initialized.store(true, Ordering::Release);
        info!(loaded = self.loaded.len(), "dictionary warmed");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Fetch a shard, loading it at most once however many callers ask
    /// concurrently.
    pub async fn shard(&self, letter: char) -> Result<Arc<Trie>, DictionaryError> {
        if !letter.is_ascii_lowercase() {
            return Err(DictionaryError::InvalidLetter(letter));
        }
        if let Some(trie) = self.loaded.get(&letter) {
            return Ok(trie.value().clone());
        }

        let load = {
            let mut in_flight = self.in_flight.lock();
            // A load may have finished between the cache check and the lock.
            if let Some(trie) = self.loaded.get(&letter) {
                return Ok(trie.value().clone());
            }
            in_flight
                .entry(letter)
                .or_insert_with(|| {
                    debug!(%letter, "loading shard");
                    let source = self.source.clone();
                    async move { source.load(letter).await.map(Arc::new) }
                        .boxed()
                        .shared()
                })
                .clone()
        };

        let result = load.clone().await;

        let mut in_flight = self.in_flight.lock();
        // Only the load still registered may publish; a cache clear or a
        // retry after failure replaces or removes the entry.
        if in_flight.get(&letter).is_some_and(|current| current.ptr_eq(&load)) {
            in_flight.remove(&letter);
            if let Ok(trie) = &result {
                self.loaded.insert(letter, trie.clone());
            }
        }
        result
    }

    /// Case-insensitive membership. Fails closed: empty input, a first
    /// character that is not a letter, or a shard that cannot load all
    /// answer false.
    pub async fn find_word(&self, word: &str) -> bool {
        let word = word.to_ascii_lowercase();
        let Some(first) = word.chars().next().filter(char::is_ascii_lowercase) else {
            return false;
        };
        match self.shard(first).await {
            Ok(trie) => trie.contains(&word),
            Err(e) => {
                warn!(%first, error = %e, "shard unavailable, treating word as unknown");
                false
            }
        }
    }

    /// Longest dictionary word at the start of `chars` (already lower-cased)
    /// with a length in `min..=max`.
    pub async fn longest_match(&self, chars: &[char], min: usize, max: usize) -> Option<usize> {
        let first = chars.first().copied().filter(char::is_ascii_lowercase)?;
        match self.shard(first).await {
            Ok(trie) => trie.longest_match(chars, min, max),
            Err(e) => {
                warn!(%first, error = %e, "shard unavailable, no match");
                None
            }
        }
    }

    /// Lazily list every complete word below `prefix` within its shard.
    pub async fn find_words_with_prefix(&self, prefix: &str) -> PrefixWords {
        let prefix = prefix.to_ascii_lowercase();
        let Some(first) = prefix.chars().next().filter(char::is_ascii_lowercase) else {
            return PrefixWords::empty();
        };
        match self.shard(first).await {
            Ok(trie) => PrefixWords::new(trie, prefix),
            Err(e) => {
                warn!(%first, error = %e, "shard unavailable, empty listing");
                PrefixWords::empty()
            }
        }
    }

    /// Drop every loaded shard and in-flight load and forget initialization.
    pub fn clear_cache(&self) {
        let mut in_flight = self.in_flight.lock();
        in_flight.clear();
        self.loaded.clear();
        self.initialized.store(false, Ordering::Release);
        debug!("dictionary cache cleared");
    }

    pub fn stats(&self) -> IndexStats {
        let mut loaded_letters: Vec<char> = self.loaded.iter().map(|e| *e.key()).collect();
        loaded_letters.sort_unstable();
        IndexStats {
            initialized: self.is_initialized(),
            words_loaded: self.loaded.iter().map(|e| e.value().len()).sum(),
            in_flight: self.in_flight.lock().len(),
            loaded_letters,
        }
    }
}

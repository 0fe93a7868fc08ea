use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// One prefix-tree node. Serialized compactly: `c` holds children and `e`
/// marks the end of a complete word.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrieNode {
    #[serde(rename = "c", default, skip_serializing_if = "BTreeMap::is_empty")]
    children: BTreeMap<char, TrieNode>,
    #[serde(rename = "e", default, skip_serializing_if = "std::ops::Not::not")]
    end: bool,
}

impl TrieNode {
    pub fn is_word(&self) -> bool {
        self.end
    }

    pub fn child(&self, c: char) -> Option<&TrieNode> {
        self.children.get(&c)
    }

    fn count_words(&self) -> usize {
        usize::from(self.end) + self.children.values().map(TrieNode::count_words).sum::<usize>()
    }
}

/// A prefix tree holding the lower-cased words of one shard.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TrieNode", into = "TrieNode")]
pub struct Trie {
    root: TrieNode,
    len: usize,
}

impl From<TrieNode> for Trie {
    fn from(root: TrieNode) -> Self {
        let len = root.count_words();
        Self { root, len }
    }
}

impl From<Trie> for TrieNode {
    fn from(trie: Trie) -> Self {
        trie.root
    }
}

impl Trie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a word; returns false if it was already present.
    pub fn insert(&mut self, word: &str) -> bool {
        let mut node = &mut self.root;
        for c in word.chars() {
            node = node.children.entry(c).or_default();
        }
        if node.end {
            return false;
        }
        node.end = true;
        self.len += 1;
        true
    }

    pub fn contains(&self, word: &str) -> bool {
        self.node(word).is_some_and(TrieNode::is_word)
    }

    pub fn node(&self, prefix: &str) -> Option<&TrieNode> {
        prefix.chars().try_fold(&self.root, |node, c| node.child(c))
    }

    /// Length of the longest complete word that is a prefix of `chars`,
    /// considering only lengths in `min..=max`.
    pub fn longest_match(&self, chars: &[char], min: usize, max: usize) -> Option<usize> {
        let mut node = &self.root;
        let mut best = None;
        for (i, c) in chars.iter().take(max).enumerate() {
            match node.child(*c) {
                Some(next) => node = next,
                None => break,
            }
            let len = i + 1;
            if len >= min && node.end {
                best = Some(len);
            }
        }
        best
    }

    /// Number of complete words.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Lazy listing of the complete words below a prefix, in lexical order.
/// Owns its shard so it can outlive the index lookup that produced it.
pub struct PrefixWords {
    shard: Arc<Trie>,
    stack: Vec<String>,
}

impl PrefixWords {
    pub(crate) fn new(shard: Arc<Trie>, prefix: String) -> Self {
        let stack = if shard.node(&prefix).is_some() {
            vec![prefix]
        } else {
            Vec::new()
        };
        Self { shard, stack }
    }

    pub(crate) fn empty() -> Self {
        Self {
            shard: Arc::new(Trie::new()),
            stack: Vec::new(),
        }
    }
}

impl Iterator for PrefixWords {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        while let Some(word) = self.stack.pop() {
            let Some(node) = self.shard.node(&word) else {
                continue;
            };
            for c in node.children.keys().rev() {
                let mut child = word.clone();
                child.push(*c);
                self.stack.push(child);
            }
            if node.end {
                return Some(word);
            }
        }
        None
    }
}

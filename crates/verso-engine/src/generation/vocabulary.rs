use std::collections::HashMap;

use serde::Serialize;

use verso_store::PacketWordRow;

/// One distinct value in a packet, with every position it occupies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VocabularyEntry {
    pub value: String,
    pub count: usize,
    /// Ascending.
    pub positions: Vec<usize>,
}

impl VocabularyEntry {
    pub fn earliest(&self) -> usize {
        self.positions[0]
    }

    /// Smallest position strictly after `cursor` (any position when `None`).
    pub fn next_after(&self, cursor: Option<usize>) -> Option<usize> {
        match cursor {
            None => self.positions.first().copied(),
            Some(c) => self.positions.iter().copied().find(|p| *p > c),
        }
    }
}

/// A packet's words collapsed by value and sorted by earliest position.
///
/// Positions are ordinals in source order: packet words are ranked by chunk
/// position, then by character offset within the chunk, so words from
/// different chunks never share a position.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Vocabulary {
    entries: Vec<VocabularyEntry>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Vocabulary {
    pub fn from_packet_words(words: &[PacketWordRow]) -> Self {
        let mut ordered: Vec<&PacketWordRow> = words.iter().collect();
        ordered.sort_by_key(|w| (w.chunk_position, w.word.position, w.packet_sequence));

        Self::from_values(ordered.into_iter().map(|w| w.word.value.as_str()))
    }

    /// Build from values already in source order.
    pub fn from_values<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let mut entries: Vec<VocabularyEntry> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for (position, value) in values.into_iter().enumerate() {
            let value = value.to_lowercase();
            match index.get(&value) {
                Some(&i) => {
                    entries[i].count += 1;
                    entries[i].positions.push(position);
                }
                None => {
                    index.insert(value.clone(), entries.len());
                    entries.push(VocabularyEntry {
                        value,
                        count: 1,
                        positions: vec![position],
                    });
                }
            }
        }

        // First-seen order already is earliest-position order.
        Self { entries, index }
    }

    pub fn get(&self, value: &str) -> Option<&VocabularyEntry> {
        self.index.get(value).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, value: &str) -> bool {
        self.index.contains_key(value)
    }

    pub fn entries(&self) -> &[VocabularyEntry] {
        &self.entries
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_words(&self) -> usize {
        self.entries.iter().map(|e| e.count).sum()
    }
}

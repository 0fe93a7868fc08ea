use tracing::{debug, instrument};

use verso_store::{Database, PacketRepo, PacketRow, WordRepo, WordRow};

use crate::error::EngineError;

/// Batching policy for unused words.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketPolicy {
    pub min_size: usize,
    pub max_size: usize,
    /// Reserved for relatedness heuristics; not consulted yet.
    pub prefer_related: bool,
    /// A packet at or above `min_size` closes when its length is a multiple
    /// of this.
    pub break_every: Option<usize>,
    /// ...or when its last word ends in one of these characters.
    pub break_punctuation: String,
}

impl Default for PacketPolicy {
    fn default() -> Self {
        Self {
            min_size: 5,
            max_size: 10,
            prefer_related: false,
            break_every: Some(7),
            break_punctuation: ".!?;".to_string(),
        }
    }
}

impl PacketPolicy {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.min_size == 0 {
            return Err(EngineError::InvalidPolicy("min_size must be at least 1".into()));
        }
        if self.min_size > self.max_size {
            return Err(EngineError::InvalidPolicy(format!(
                "min_size {} exceeds max_size {}",
                self.min_size, self.max_size
            )));
        }
        if self.break_every == Some(0) {
            return Err(EngineError::InvalidPolicy("break_every must be positive".into()));
        }
        Ok(())
    }

    fn is_break_point(&self, packet: &[WordRow]) -> bool {
        let by_length = self.break_every.is_some_and(|n| packet.len() % n == 0);
        let by_punctuation = packet
            .last()
            .and_then(|w| w.value.chars().last())
            .is_some_and(|c| self.break_punctuation.contains(c));
        by_length || by_punctuation
    }

    fn should_close(&self, packet: &[WordRow]) -> bool {
        packet.len() >= self.max_size
            || (packet.len() >= self.min_size && self.is_break_point(packet))
    }
}

pub struct PacketAssembler {
    words: WordRepo,
    packets: PacketRepo,
}

impl PacketAssembler {
    pub fn new(db: Database) -> Self {
        Self {
            words: WordRepo::new(db.clone()),
            packets: PacketRepo::new(db),
        }
    }

    /// Batch every unused word, in discovery order, into packets. Trailing
    /// words that never reach `min_size` stay unused for the next call.
    #[instrument(skip(self, policy), fields(min = policy.min_size, max = policy.max_size))]
    pub fn create_packets(&self, policy: &PacketPolicy) -> Result<Vec<PacketRow>, EngineError> {
        policy.validate()?;

        let unused = self.words.unused()?;
        let mut created = Vec::new();
        let mut current: Vec<WordRow> = Vec::with_capacity(policy.max_size);

        for word in unused {
            current.push(word);
            if policy.should_close(&current) {
                let ids: Vec<_> = current.drain(..).map(|w| w.id).collect();
                created.push(self.packets.create(&ids)?);
            }
        }

        debug!(created = created.len(), left_unused = current.len(), "packet assembly finished");
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verso_store::{ChunkRepo, DiscoveredWord};

    fn seeded(words: &[&str]) -> (Database, PacketAssembler) {
        let db = Database::in_memory().unwrap();
        let chunk = ChunkRepo::new(db.clone()).add("source", 1).unwrap();
        let discovered: Vec<_> = words
            .iter()
            .enumerate()
            .map(|(i, w)| DiscoveredWord::new(*w, i as i64 * 10))
            .collect();
        WordRepo::new(db.clone())
            .record_segmentation(&chunk.id, &discovered)
            .unwrap();
        (db.clone(), PacketAssembler::new(db))
    }

    fn policy(min: usize, max: usize, every: Option<usize>) -> PacketPolicy {
        PacketPolicy {
            min_size: min,
            max_size: max,
            break_every: every,
            ..Default::default()
        }
    }

    fn word_names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("word{i}")).collect()
    }

    #[test]
    fn too_few_words_make_no_packet() {
        let (db, assembler) = seeded(&["hello", "world"]);
        let created = assembler.create_packets(&PacketPolicy::default()).unwrap();
        assert!(created.is_empty());
        assert_eq!(WordRepo::new(db).count_unused().unwrap(), 2);
    }

    #[test]
    fn closes_at_max_size() {
        let names = word_names(23);
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let (db, assembler) = seeded(&refs);

        let created = assembler.create_packets(&policy(5, 10, None)).unwrap();
        assert_eq!(created.iter().map(|p| p.word_count).collect::<Vec<_>>(), vec![10, 10]);
        assert_eq!(WordRepo::new(db).count_unused().unwrap(), 3);
    }

    #[test]
    fn closes_at_break_every_once_min_reached() {
        let names = word_names(15);
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let (_, assembler) = seeded(&refs);

        let created = assembler.create_packets(&policy(5, 10, Some(7))).unwrap();
        assert_eq!(created.iter().map(|p| p.word_count).collect::<Vec<_>>(), vec![7, 7]);
    }

    #[test]
    fn punctuation_break() {
        let (_, assembler) = seeded(&["one", "two", "end.", "four"]);
        let created = assembler.create_packets(&policy(2, 10, None)).unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].word_count, 3);
    }

    #[test]
    fn sequences_increase_across_calls() {
        let names = word_names(6);
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let (db, assembler) = seeded(&refs);

        let first = assembler.create_packets(&policy(3, 3, None)).unwrap();
        let chunk = ChunkRepo::new(db.clone()).add("more", 2).unwrap();
        WordRepo::new(db.clone())
            .record_segmentation(
                &chunk.id,
                &[
                    DiscoveredWord::new("late", 0),
                    DiscoveredWord::new("later", 5),
                    DiscoveredWord::new("latest", 9),
                ],
            )
            .unwrap();
        let second = assembler.create_packets(&policy(3, 3, None)).unwrap();

        let sequences: Vec<i64> = first.iter().chain(&second).map(|p| p.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);

        let unprocessed: Vec<i64> = PacketRepo::new(db)
            .unprocessed()
            .unwrap()
            .iter()
            .map(|p| p.sequence)
            .collect();
        assert_eq!(unprocessed, sequences);
    }

    #[test]
    fn rejects_inverted_policy() {
        let (_, assembler) = seeded(&[]);
        let err = assembler.create_packets(&policy(6, 5, None)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPolicy(_)));
    }
}

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use verso_core::{OrderFallback, PoemStyle};

use super::vocabulary::Vocabulary;

/// A vocabulary word that had no position after the cursor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderViolation {
    /// Index of the offending token in the poem.
    pub token_index: usize,
    pub word: String,
    /// The last word accepted in order before this one, and its position.
    pub previous_word: Option<String>,
    pub previous_position: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoemMetadata {
    pub word_count: usize,
    pub unique_word_count: usize,
    pub average_word_length: f64,
    pub style: PoemStyle,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub unknown_words: Vec<String>,
    pub order_violations: Vec<OrderViolation>,
    /// Positions picked for tokens that were accepted in order.
    pub matched_positions: Vec<usize>,
    pub metadata: PoemMetadata,
}

impl VerificationReport {
    pub fn is_clean(&self) -> bool {
        self.unknown_words.is_empty() && self.order_violations.is_empty()
    }

    /// One-line summary for warnings and rejection events.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.unknown_words.is_empty() {
            parts.push(format!("unknown words: {}", self.unknown_words.join(", ")));
        }
        for v in &self.order_violations {
            match (&v.previous_word, v.previous_position) {
                (Some(prev), Some(pos)) => parts.push(format!(
                    "'{}' (token {}) has no position after '{}' at {}",
                    v.word, v.token_index, prev, pos
                )),
                _ => parts.push(format!("'{}' (token {}) is out of order", v.word, v.token_index)),
            }
        }
        if parts.is_empty() {
            "clean".to_string()
        } else {
            parts.join("; ")
        }
    }
}

/// Maximal runs of letters, lower-cased.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphabetic())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Check vocabulary closure and order preservation of generated text.
pub fn verify(
    text: &str,
    vocabulary: &Vocabulary,
    style: PoemStyle,
    fallback: OrderFallback,
) -> VerificationReport {
    let mut unknown_words = Vec::new();
    let mut order_violations = Vec::new();
    let mut matched_positions = Vec::new();
    let mut accepted: Vec<String> = Vec::new();

    let mut cursor: Option<usize> = None;
    let mut previous: Option<String> = None;

    for (token_index, token) in tokenize(text).into_iter().enumerate() {
        let Some(entry) = vocabulary.get(&token) else {
            unknown_words.push(token);
            continue;
        };

        match entry.next_after(cursor) {
            Some(position) => {
                cursor = Some(position);
                matched_positions.push(position);
                previous = Some(token.clone());
                accepted.push(token);
            }
            None => {
                order_violations.push(OrderViolation {
                    token_index,
                    word: token,
                    previous_word: previous.clone(),
                    previous_position: cursor,
                });
                if fallback == OrderFallback::EarliestPosition {
                    cursor = Some(entry.earliest());
                }
            }
        }
    }

    let unique: HashSet<&str> = accepted.iter().map(String::as_str).collect();
    let average_word_length = if accepted.is_empty() {
        0.0
    } else {
        accepted.iter().map(|w| w.chars().count()).sum::<usize>() as f64 / accepted.len() as f64
    };

    VerificationReport {
        metadata: PoemMetadata {
            word_count: accepted.len(),
            unique_word_count: unique.len(),
            average_word_length,
            style,
        },
        unknown_words,
        order_violations,
        matched_positions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> Vocabulary {
        Vocabulary::from_values(["hello", "world", "program", "world"])
    }

    fn check(text: &str) -> VerificationReport {
        verify(text, &vocab(), PoemStyle::FreeVerse, OrderFallback::EarliestPosition)
    }

    #[test]
    fn tokenizes_letters_only() {
        assert_eq!(
            tokenize("Hello, WORLD!\n  don't-stop 42x"),
            vec!["hello", "world", "don", "t", "stop", "x"]
        );
    }

    #[test]
    fn in_order_text_is_clean() {
        let report = check("Hello world,\nprogram world.");
        assert!(report.is_clean());
        assert_eq!(report.matched_positions, vec![0, 1, 2, 3]);
        assert_eq!(report.metadata.word_count, 4);
        assert_eq!(report.metadata.unique_word_count, 3);
        assert!((report.metadata.average_word_length - 5.5).abs() < 1e-9);
        assert_eq!(report.summary(), "clean");
    }

    #[test]
    fn skipping_words_is_allowed() {
        assert!(check("hello program").is_clean());
    }

    #[test]
    fn unknown_words_recorded() {
        let report = check("hello the world");
        assert_eq!(report.unknown_words, vec!["the"]);
        assert!(!report.is_clean());
        assert_eq!(report.metadata.word_count, 2);
    }

    #[test]
    fn order_violation_references_previous_word() {
        let report = check("program hello");
        assert_eq!(report.order_violations.len(), 1);
        let v = &report.order_violations[0];
        assert_eq!(v.word, "hello");
        assert_eq!(v.token_index, 1);
        assert_eq!(v.previous_word.as_deref(), Some("program"));
        assert_eq!(v.previous_position, Some(2));
        assert!(report.summary().contains("'hello' (token 1) has no position after 'program' at 2"));
    }

    #[test]
    fn metadata_counts_only_words_accepted_in_order() {
        let report = check("program hello");
        assert_eq!(report.metadata.word_count, 1);
        assert_eq!(report.metadata.unique_word_count, 1);
        assert!((report.metadata.average_word_length - 7.0).abs() < 1e-9);
    }

    #[test]
    fn repeated_word_beyond_its_count_violates() {
        let report = check("hello hello");
        assert_eq!(report.order_violations.len(), 1);
    }

    #[test]
    fn earliest_fallback_rewinds_cursor() {
        // After "world" at 3, "hello" rewinds the cursor to 0, so the second
        // "world" is accepted at 1.
        let report = check("program world hello world");
        assert_eq!(report.order_violations.len(), 1);
        assert_eq!(report.matched_positions, vec![2, 3, 1]);
    }

    #[test]
    fn keep_cursor_fallback_reports_every_violation() {
        let report = verify(
            "program world hello world",
            &vocab(),
            PoemStyle::FreeVerse,
            OrderFallback::KeepCursor,
        );
        assert_eq!(report.order_violations.len(), 2);
        assert_eq!(report.matched_positions, vec![2, 3]);
    }

    #[test]
    fn accepted_positions_strictly_increase_when_clean() {
        for text in ["hello world program world", "world world", "hello program world"] {
            let report = check(text);
            if report.is_clean() {
                assert!(report.matched_positions.windows(2).all(|w| w[0] < w[1]), "{text}");
            }
        }
    }
}

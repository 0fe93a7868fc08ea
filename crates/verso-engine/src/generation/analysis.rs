use serde::{Deserialize, Serialize};

use super::vocabulary::Vocabulary;
use crate::error::EngineError;

/// Usability verdict for a packet's vocabulary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Analysis {
    pub can_create_poem: bool,
    pub usable_words: Vec<String>,
    pub unusable_words: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Analysis {
    /// The condition under which generation must not proceed, if any.
    pub fn insufficiency(&self) -> Option<String> {
        if !self.can_create_poem {
            return Some(
                self.reason
                    .clone()
                    .unwrap_or_else(|| "analysis reported no poem is possible".into()),
            );
        }
        if self.usable_words.is_empty() {
            return Some("analysis found no usable words".into());
        }
        None
    }
}

/// Strip one surrounding markdown code fence, if present.
fn strip_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(rest) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line.
    match rest.split_once('\n') {
        Some((_, body)) => body.trim(),
        None => rest.trim(),
    }
}

/// Parse the analysis reply against an explicit schema. Any deviation,
/// including words that are not in the vocabulary, is a malformed response.
pub fn parse_analysis(raw: &str, vocabulary: &Vocabulary) -> Result<Analysis, EngineError> {
    let mut analysis: Analysis = serde_json::from_str(strip_fence(raw))
        .map_err(|e| EngineError::MalformedResponse(format!("analysis is not valid JSON: {e}")))?;

    for list in [&mut analysis.usable_words, &mut analysis.unusable_words] {
        for word in list.iter_mut() {
            *word = word.trim().to_lowercase();
            if !vocabulary.contains(word) {
                return Err(EngineError::MalformedResponse(format!(
                    "analysis names '{word}', which is not in the packet vocabulary"
                )));
            }
        }
    }

    Ok(analysis)
}

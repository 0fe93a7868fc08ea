use verso_core::{CompletionRequest, PoemStyle};

use super::analysis::Analysis;
use super::vocabulary::Vocabulary;

const ANALYSIS_SYSTEM: &str = "You judge whether a list of words can form a short poem. \
Reply with a single JSON object and nothing else.";

const GENERATION_SYSTEM: &str = "You write short poems under strict constraints. \
Reply with the poem text only: no title, no commentary.";

fn numbered_vocabulary(vocabulary: &Vocabulary) -> String {
    vocabulary
        .entries()
        .iter()
        .enumerate()
        .map(|(i, e)| {
            if e.count > 1 {
                format!("{}. {} (x{})", i + 1, e.value, e.count)
            } else {
                format!("{}. {}", i + 1, e.value)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn analysis_request(vocabulary: &Vocabulary, max_tokens: u32) -> CompletionRequest {
    let prompt = format!(
        "Words, in source order:\n{}\n\n\
         Classify every word as usable or unusable for a poem and decide whether a poem can be \
         written from the usable words alone.\n\
         Respond with exactly this JSON shape:\n\
         {{\"canCreatePoem\": boolean, \"usableWords\": [string], \"unusableWords\": [string], \
         \"reason\": string (optional)}}\n\
         Only use words from the list above.",
        numbered_vocabulary(vocabulary)
    );
    CompletionRequest::new(prompt)
        .with_system(ANALYSIS_SYSTEM)
        .with_max_tokens(max_tokens)
        .with_temperature(0.0)
}

fn style_instructions(style: PoemStyle) -> &'static str {
    match style {
        PoemStyle::FreeVerse => "Write a free verse poem of a few short lines.",
        PoemStyle::Haiku => "Write a haiku: three lines of roughly five, seven and five syllables.",
        PoemStyle::Limerick => "Write a limerick: five lines rhyming AABBA.",
    }
}

pub fn generation_request(
    vocabulary: &Vocabulary,
    analysis: &Analysis,
    style: PoemStyle,
    max_tokens: u32,
    temperature: f64,
) -> CompletionRequest {
    let prompt = format!(
        "{}\n\nVocabulary, in source order:\n{}\n\nPreferred words: {}\n\n\
         Rules:\n\
         - Use only words from the vocabulary. Do not add any other word, not even \"a\" or \"the\".\n\
         - Words must appear in the same order as the vocabulary list; a word listed more than once \
         may be used up to that many times, each use later than the previous word.\n\
         - You may skip words.",
        style_instructions(style),
        numbered_vocabulary(vocabulary),
        analysis.usable_words.join(", "),
    );
    CompletionRequest::new(prompt)
        .with_system(GENERATION_SYSTEM)
        .with_max_tokens(max_tokens)
        .with_temperature(temperature)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis() -> Analysis {
        Analysis {
            can_create_poem: true,
            usable_words: vec!["quiet".into(), "river".into()],
            unusable_words: vec![],
            reason: None,
        }
    }

    #[test]
    fn analysis_prompt_lists_words_in_order() {
        let vocab = Vocabulary::from_values(["quiet", "river", "quiet"]);
        let req = analysis_request(&vocab, 256);
        assert!(req.prompt.contains("1. quiet (x2)\n2. river"));
        assert!(req.prompt.contains("canCreatePoem"));
        assert_eq!(req.temperature, Some(0.0));
        assert_eq!(req.max_tokens, Some(256));
    }

    #[test]
    fn generation_prompt_carries_style_and_usable_words() {
        let vocab = Vocabulary::from_values(["quiet", "river"]);
        let req = generation_request(&vocab, &analysis(), PoemStyle::Haiku, 512, 0.7);
        assert!(req.prompt.starts_with("Write a haiku"));
        assert!(req.prompt.contains("Preferred words: quiet, river"));
        assert_eq!(req.system.as_deref(), Some(GENERATION_SYSTEM));
    }

    #[test]
    fn each_style_has_distinct_instructions() {
        let all = [PoemStyle::FreeVerse, PoemStyle::Haiku, PoemStyle::Limerick];
        let texts: std::collections::HashSet<_> = all.iter().map(|s| style_instructions(*s)).collect();
        assert_eq!(texts.len(), 3);
    }
}

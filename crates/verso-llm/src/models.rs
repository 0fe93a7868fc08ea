/// Information about a model's output limits.
#[derive(Clone, Debug)]
pub struct ModelInfo {
    pub name: &'static str,
    pub display_name: &'static str,
    pub max_output: u32,
}

pub static CLAUDE_SONNET_4_5: ModelInfo = ModelInfo {
    name: "claude-sonnet-4-5-20250929",
    display_name: "Claude Sonnet 4.5",
    max_output: 64_000,
};

pub static CLAUDE_HAIKU_4_5: ModelInfo = ModelInfo {
    name: "claude-haiku-4-5-20251001",
    display_name: "Claude Haiku 4.5",
    max_output: 64_000,
};

pub static CLAUDE_OPUS_4_1: ModelInfo = ModelInfo {
    name: "claude-opus-4-1-20250805",
    display_name: "Claude Opus 4.1",
    max_output: 32_000,
};

static ALL_MODELS: &[&ModelInfo] = &[&CLAUDE_SONNET_4_5, &CLAUDE_HAIKU_4_5, &CLAUDE_OPUS_4_1];

/// Find a model by exact name.
pub fn find_model(name: &str) -> Option<&'static ModelInfo> {
    ALL_MODELS.iter().copied().find(|m| m.name == name)
}

pub fn default_model() -> &'static ModelInfo {
    &CLAUDE_SONNET_4_5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_known_model() {
        let model = find_model("claude-haiku-4-5-20251001").unwrap();
        assert_eq!(model.display_name, "Claude Haiku 4.5");
    }

    #[test]
    fn unknown_model_is_none() {
        assert!(find_model("gpt-4").is_none());
    }

    #[test]
    fn default_is_listed() {
        assert!(find_model(default_model().name).is_some());
    }
}

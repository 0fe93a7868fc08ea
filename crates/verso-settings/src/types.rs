use serde::{Deserialize, Serialize};

use verso_core::security::ApiKey;
use verso_core::{OrderFallback, PoemStyle};

fn verso_home() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    format!("{home}/.verso")
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VersoSettings {
    pub store: StoreSettings,
    pub dictionary: DictionarySettings,
    pub packets: PacketSettings,
    pub generation: GenerationSettings,
    pub llm: LlmSettings,
    pub logging: LoggingSettings,
}

impl VersoSettings {
    /// Cross-field checks serde cannot express.
    pub fn validate(&self) -> crate::Result<()> {
        let p = &self.packets;
        if p.min_size == 0 {
            return Err(crate::SettingsError::InvalidValue("packets.minSize must be at least 1".into()));
        }
        if p.min_size > p.max_size {
            return Err(crate::SettingsError::InvalidValue(format!(
                "packets.minSize ({}) exceeds packets.maxSize ({})",
                p.min_size, p.max_size
            )));
        }
        let d = &self.dictionary;
        if d.min_word_length == 0 || d.min_word_length > d.max_word_length {
            return Err(crate::SettingsError::InvalidValue(format!(
                "dictionary word length range {}..={} is empty",
                d.min_word_length, d.max_word_length
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreSettings {
    pub db_path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            db_path: format!("{}/database/lineage.db", verso_home()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DictionarySettings {
    pub dir: String,
    /// Shards loaded eagerly by `initialize()`.
    pub warm_letters: Vec<String>,
    pub min_word_length: usize,
    pub max_word_length: usize,
}

impl Default for DictionarySettings {
    fn default() -> Self {
        Self {
            dir: format!("{}/dictionary", verso_home()),
            warm_letters: ["t", "a", "s", "w", "i", "o"].map(String::from).to_vec(),
            min_word_length: 3,
            max_word_length: 15,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PacketSettings {
    pub min_size: usize,
    pub max_size: usize,
    pub prefer_related: bool,
    /// Close a packet whose length is a multiple of this; `null` disables.
    pub break_every: Option<usize>,
    pub break_punctuation: String,
}

impl Default for PacketSettings {
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

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationSettings {
    pub style: PoemStyle,
    pub order_fallback: OrderFallback,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            style: PoemStyle::FreeVerse,
            order_fallback: OrderFallback::EarliestPosition,
            max_tokens: 1024,
            temperature: 0.7,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Anthropic,
    Mock,
}

impl std::str::FromStr for ProviderKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anthropic" => Ok(Self::Anthropic),
            "mock" => Ok(Self::Mock),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LlmSettings {
    pub provider: ProviderKind,
    /// `None` uses the provider's default model.
    pub model: Option<String>,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    /// No deadline unless set.
    pub request_timeout_ms: Option<u64>,
    /// Only ever populated from the environment.
    #[serde(skip)]
    pub api_key: Option<ApiKey>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Anthropic,
            model: None,
            max_retries: 3,
            base_delay_ms: 1000,
            request_timeout_ms: None,
            api_key: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
    pub log_to_sqlite: bool,
    pub log_db_path: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            log_to_sqlite: false,
            log_db_path: format!("{}/database/logs.db", verso_home()),
        }
    }
}

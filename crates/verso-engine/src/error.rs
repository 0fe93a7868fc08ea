use verso_core::errors::GatewayError;
use verso_core::PacketId;
use verso_store::StoreError;

use crate::generation::VerificationReport;

/// Shard loading failure. `Clone` so every waiter on a shared in-flight load
/// receives the same error.
#[derive(Clone, Debug, thiserror::Error)]
pub enum DictionaryError {
    #[error("shard '{letter}' could not be read: {message}")]
    Io { letter: char, message: String },

    #[error("shard '{letter}' is not a valid trie: {message}")]
    Parse { letter: char, message: String },

    #[error("'{0}' is not a shard key")]
    InvalidLetter(char),
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("pipeline not initialized")]
    NotInitialized,

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("insufficient vocabulary: {reason}")]
    InsufficientVocabulary { reason: String },

    #[error(
        "verification failed: {} unknown words, {} order violations",
        .0.unknown_words.len(),
        .0.order_violations.len()
    )]
    Verification(Box<VerificationReport>),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("gateway error: {0}")]
    Gateway(GatewayError),

    #[error("dictionary error: {0}")]
    Dictionary(#[from] DictionaryError),

    #[error("pipeline is paused")]
    Paused,

    #[error("pipeline halted after error: {0}")]
    Halted(String),

    #[error("packet not found: {0}")]
    PacketNotFound(PacketId),

    #[error("invalid packet policy: {0}")]
    InvalidPolicy(String),
}

impl From<GatewayError> for EngineError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::InvalidResponse(msg) => Self::MalformedResponse(msg),
            other => Self::Gateway(other),
        }
    }
}

impl EngineError {
    /// Short classification string for logs and step warnings.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotInitialized => "not_initialized",
            Self::Store(_) => "storage",
            Self::InsufficientVocabulary { .. } => "insufficient_vocabulary",
            Self::Verification(_) => "verification",
            Self::MalformedResponse(_) => "malformed_response",
            Self::Gateway(_) => "gateway",
            Self::Dictionary(_) => "dictionary",
            Self::Paused => "paused",
            Self::Halted(_) => "halted",
            Self::PacketNotFound(_) => "packet_not_found",
            Self::InvalidPolicy(_) => "invalid_policy",
        }
    }
}

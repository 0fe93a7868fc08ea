//! Generation & Verification: aggregate a packet's vocabulary, ask the
//! completion provider whether a poem is possible, generate one, and persist
//! it only if it passes closure and order verification.

mod analysis;
mod prompts;
mod verify;
mod vocabulary;

pub use analysis::{parse_analysis, Analysis};
pub use prompts::{analysis_request, generation_request};
pub use verify::{tokenize, verify, OrderViolation, PoemMetadata, VerificationReport};
pub use vocabulary::{Vocabulary, VocabularyEntry};

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use verso_core::{LlmProvider, OrderFallback, PacketId, PoemStyle};
use verso_store::{Database, NewPoem, PacketRepo, PoemRepo, PoemRow, StoreError};

use crate::error::EngineError;

const ANALYSIS_MAX_TOKENS: u32 = 1024;

#[derive(Clone, Debug, PartialEq)]
pub struct GenerationOptions {
    pub style: PoemStyle,
    pub iteration: i64,
    pub order_fallback: OrderFallback,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            style: PoemStyle::FreeVerse,
            iteration: 0,
            order_fallback: OrderFallback::EarliestPosition,
            max_tokens: 1024,
            temperature: 0.7,
        }
    }
}

/// An accepted poem together with how it got there.
#[derive(Clone, Debug, Serialize)]
pub struct PoemResponse {
    pub poem: PoemRow,
    pub analysis: Analysis,
    pub report: VerificationReport,
}

pub struct GenerationService {
    provider: Arc<dyn LlmProvider>,
    packets: PacketRepo,
    poems: PoemRepo,
}

impl GenerationService {
    pub fn new(provider: Arc<dyn LlmProvider>, db: Database) -> Self {
        Self {
            provider,
            packets: PacketRepo::new(db.clone()),
            poems: PoemRepo::new(db),
        }
    }

    pub fn vocabulary(&self, packet_id: &PacketId) -> Result<Vocabulary, EngineError> {
        self.packets.get(packet_id).map_err(|e| match e {
            StoreError::NotFound(_) => EngineError::PacketNotFound(packet_id.clone()),
            other => other.into(),
        })?;
        let words = self.packets.words_for_packet(packet_id)?;
        Ok(Vocabulary::from_packet_words(&words))
    }

    async fn analyze_vocabulary(&self, vocabulary: &Vocabulary) -> Result<Analysis, EngineError> {
        let request = analysis_request(vocabulary, ANALYSIS_MAX_TOKENS);
        let raw = self.provider.complete(&request).await?;
        parse_analysis(&raw, vocabulary)
    }

    #[instrument(skip(self), fields(packet_id = %packet_id, provider = self.provider.name()))]
    pub async fn analyze_packet(&self, packet_id: &PacketId) -> Result<Analysis, EngineError> {
        let vocabulary = self.vocabulary(packet_id)?;
        self.analyze_vocabulary(&vocabulary).await
    }

    /// Analyze, generate and verify. Nothing is written unless verification
    /// is clean; on success the packet is marked processed.
    #[instrument(skip(self, options), fields(packet_id = %packet_id, style = %options.style))]
    pub async fn generate_poem(
        &self,
        packet_id: &PacketId,
        options: &GenerationOptions,
    ) -> Result<PoemResponse, EngineError> {
        let vocabulary = self.vocabulary(packet_id)?;

        let analysis = self.analyze_vocabulary(&vocabulary).await?;
        if let Some(reason) = analysis.insufficiency() {
            info!(%reason, "packet cannot produce a poem");
            return Err(EngineError::InsufficientVocabulary { reason });
        }

        let request = generation_request(
            &vocabulary,
            &analysis,
            options.style,
            options.max_tokens,
            options.temperature,
        );
        let text = self.provider.complete(&request).await?;

        let report = verify(&text, &vocabulary, options.style, options.order_fallback);
        if report.metadata.word_count == 0 {
            return Err(EngineError::MalformedResponse(
                "generated text contains no vocabulary words".into(),
            ));
        }
        if !report.is_clean() {
            warn!(summary = %report.summary(), "generated text failed verification");
            return Err(EngineError::Verification(Box::new(report)));
        }

        let metadata = serde_json::to_value(&report.metadata)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let poem = self.poems.add_and_close_packet(NewPoem {
            content: text.trim().to_string(),
            style: options.style,
            iteration: options.iteration,
            packet_id: packet_id.clone(),
            metadata,
        })?;

        info!(poem_id = %poem.id, words = report.metadata.word_count, "poem accepted");
        Ok(PoemResponse {
            poem,
            analysis,
            report,
        })
    }
}

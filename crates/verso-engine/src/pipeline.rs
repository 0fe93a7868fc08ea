//! Pipeline Controller: drives one chunk at a time through segmentation,
//! packet assembly and generation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use verso_core::events::{PipelineEvent, PipelineSnapshot, PipelineState};
use verso_core::{ChunkId, LlmProvider, PacketId, PoemId, WordId};
use verso_store::{ChunkRepo, Database, PacketRow};

use crate::dictionary::TrieIndex;
use crate::error::EngineError;
use crate::generation::{Analysis, GenerationOptions, GenerationService, PoemResponse};
use crate::packets::{PacketAssembler, PacketPolicy};
use crate::segmenter::Segmenter;

const EVENT_CAPACITY: usize = 256;

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub packet_policy: PacketPolicy,
    /// `iteration` is ignored; the controller numbers iterations itself.
    pub generation: GenerationOptions,
    pub min_word_length: usize,
    pub max_word_length: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            packet_policy: PacketPolicy::default(),
            generation: GenerationOptions::default(),
            min_word_length: crate::segmenter::MIN_WORD_LENGTH,
            max_word_length: crate::segmenter::MAX_WORD_LENGTH,
        }
    }
}

/// A packet whose generation failed without aborting the step.
#[derive(Clone, Debug, Serialize)]
pub struct StepWarning {
    pub packet_id: PacketId,
    pub kind: &'static str,
    pub message: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct StepResult {
    /// `None` when there was nothing left to process.
    pub chunk_id: Option<ChunkId>,
    pub words: Vec<WordId>,
    pub packets: Vec<PacketId>,
    pub poems: Vec<PoemId>,
    pub warnings: Vec<StepWarning>,
    pub state: PipelineState,
}

#[derive(Debug, Default)]
struct Progress {
    state: PipelineState,
    initialized: bool,
    remaining_chunks: u64,
    processed_chunks: u64,
    words_found: u64,
    packets_created: u64,
    poems_created: u64,
    iteration: i64,
    last_error: Option<String>,
}

pub struct PipelineController {
    db: Database,
    index: Arc<TrieIndex>,
    chunks: ChunkRepo,
    segmenter: Segmenter,
    assembler: PacketAssembler,
    generation: GenerationService,
    config: PipelineConfig,
    progress: Mutex<Progress>,
    paused: AtomicBool,
    // Serializes steps and reset; never held by `pause`/`resume`.
    step_guard: tokio::sync::Mutex<()>,
    events: broadcast::Sender<PipelineEvent>,
}

impl PipelineController {
    pub fn new(
        db: Database,
        index: Arc<TrieIndex>,
        provider: Arc<dyn LlmProvider>,
        config: PipelineConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            chunks: ChunkRepo::new(db.clone()),
            segmenter: Segmenter::new(index.clone(), db.clone())
                .with_lengths(config.min_word_length, config.max_word_length),
            assembler: PacketAssembler::new(db.clone()),
            generation: GenerationService::new(provider, db.clone()),
            db,
            index,
            config,
            progress: Mutex::new(Progress::default()),
            paused: AtomicBool::new(false),
            step_guard: tokio::sync::Mutex::new(()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: PipelineEvent) {
        if self.events.send(event).is_err() {
            debug!("no pipeline subscribers, event dropped");
        }
    }

    fn snapshot_of(&self, p: &Progress) -> PipelineSnapshot {
        PipelineSnapshot {
            state: p.state,
            initialized: p.initialized,
            paused: self.paused.load(Ordering::Acquire),
            remaining_chunks: p.remaining_chunks,
            processed_chunks: p.processed_chunks,
            words_found: p.words_found,
            packets_created: p.packets_created,
            poems_created: p.poems_created,
            last_error: p.last_error.clone(),
        }
    }

    pub fn current_state(&self) -> PipelineSnapshot {
        self.snapshot_of(&self.progress.lock())
    }

    fn set_state(&self, state: PipelineState) {
        let snapshot = {
            let mut p = self.progress.lock();
            p.state = state;
            self.snapshot_of(&p)
        };
        self.publish(PipelineEvent::StateChanged { snapshot });
    }

    fn ensure_initialized(&self) -> Result<(), EngineError> {
        if self.progress.lock().initialized {
            Ok(())
        } else {
            Err(EngineError::NotInitialized)
        }
    }

    /// Warm the dictionary and count the remaining work.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<PipelineSnapshot, EngineError> {
        self.index.initialize().await?;
        let remaining = self.chunks.count_unprocessed()?;
        {
            let mut p = self.progress.lock();
            p.initialized = true;
            p.remaining_chunks = remaining;
            if p.state != PipelineState::Error {
                p.state = if self.paused.load(Ordering::Acquire) {
                    PipelineState::Paused
                } else {
                    PipelineState::Ready
                };
            }
        }
        info!(remaining, "pipeline initialized");
        let snapshot = self.current_state();
        self.publish(PipelineEvent::StateChanged {
            snapshot: snapshot.clone(),
        });
        Ok(snapshot)
    }

    /// Process exactly one unprocessed chunk, in position order.
    ///
    /// Per-packet generation failures become warnings in the result. A
    /// storage failure, from generation or anywhere else, moves the pipeline
    /// to `Error` and is returned; further steps are refused until `reset()`.
    #[instrument(skip(self))]
    pub async fn process_next_chunk(&self) -> Result<StepResult, EngineError> {
        self.ensure_initialized()?;
        if self.paused.load(Ordering::Acquire) {
            return Err(EngineError::Paused);
        }

        let _step = self.step_guard.lock().await;
        {
            let p = self.progress.lock();
            if p.state == PipelineState::Error {
                return Err(EngineError::Halted(
                    p.last_error.clone().unwrap_or_else(|| "unknown error".into()),
                ));
            }
        }

        self.set_state(PipelineState::Processing);
        match self.run_step().await {
            Ok(result) => Ok(result),
            Err(e) => {
                error!(error = %e, kind = e.kind(), "step failed, pipeline halted");
                {
                    let mut p = self.progress.lock();
                    p.last_error = Some(e.to_string());
                }
                self.set_state(PipelineState::Error);
                Err(e)
            }
        }
    }

    async fn run_step(&self) -> Result<StepResult, EngineError> {
        let Some(chunk) = self.chunks.next_unprocessed()? else {
            {
                let mut p = self.progress.lock();
                p.remaining_chunks = 0;
            }
            self.set_state(PipelineState::Complete);
            info!("no chunks remain");
            return Ok(StepResult {
                state: PipelineState::Complete,
                ..Default::default()
            });
        };

        let iteration = {
            let mut p = self.progress.lock();
            p.iteration += 1;
            p.iteration
        };

        let words = self.segmenter.process_chunk(&chunk).await?;
        self.publish(PipelineEvent::ChunkSegmented {
            chunk_id: chunk.id.clone(),
            word_count: words.len(),
        });

        let mut result = StepResult {
            chunk_id: Some(chunk.id.clone()),
            words,
            ..Default::default()
        };

        if !result.words.is_empty() {
            let packets = self.assembler.create_packets(&self.config.packet_policy)?;
            self.announce_packets(&packets);

            let options = GenerationOptions {
                iteration,
                ..self.config.generation.clone()
            };
            for packet in &packets {
                result.packets.push(packet.id.clone());
                match self.generation.generate_poem(&packet.id, &options).await {
                    Ok(response) => {
                        self.publish(PipelineEvent::PoemAccepted {
                            poem_id: response.poem.id.clone(),
                            packet_id: packet.id.clone(),
                        });
                        result.poems.push(response.poem.id);
                    }
                    Err(e @ EngineError::Store(_)) => return Err(e),
                    Err(e) => {
                        warn!(packet_id = %packet.id, kind = e.kind(), error = %e, "generation failed for packet");
                        self.publish(PipelineEvent::PoemRejected {
                            packet_id: packet.id.clone(),
                            reason: e.to_string(),
                        });
                        result.warnings.push(StepWarning {
                            packet_id: packet.id.clone(),
                            kind: e.kind(),
                            message: e.to_string(),
                        });
                    }
                }
            }
        }

        let remaining = self.chunks.count_unprocessed()?;
        {
            let mut p = self.progress.lock();
            p.processed_chunks += 1;
            p.remaining_chunks = remaining;
            p.words_found += result.words.len() as u64;
            p.packets_created += result.packets.len() as u64;
            p.poems_created += result.poems.len() as u64;
        }

        result.state = if self.paused.load(Ordering::Acquire) {
            PipelineState::Paused
        } else if remaining == 0 {
            PipelineState::Complete
        } else {
            PipelineState::Ready
        };
        self.set_state(result.state);

        info!(
            chunk_id = %chunk.id,
            words = result.words.len(),
            packets = result.packets.len(),
            poems = result.poems.len(),
            warnings = result.warnings.len(),
            "step finished"
        );
        Ok(result)
    }

    fn announce_packets(&self, packets: &[PacketRow]) {
        for packet in packets {
            self.publish(PipelineEvent::PacketCreated {
                packet_id: packet.id.clone(),
                sequence: packet.sequence,
                word_count: packet.word_count as usize,
            });
        }
    }

    /// Store a chunk at `position` and segment it immediately. Packet
    /// assembly and generation are left to the caller.
    #[instrument(skip(self, content), fields(len = content.len()))]
    pub async fn process_chunk(&self, content: &str, position: i64) -> Result<Vec<WordId>, EngineError> {
        self.ensure_initialized()?;
        let _step = self.step_guard.lock().await;
        let chunk = self.chunks.add(content, position)?;
        let words = self.segmenter.process_chunk(&chunk).await?;
        {
            let mut p = self.progress.lock();
            p.processed_chunks += 1;
            p.words_found += words.len() as u64;
        }
        self.publish(PipelineEvent::ChunkSegmented {
            chunk_id: chunk.id,
            word_count: words.len(),
        });
        Ok(words)
    }

    /// Batch unused words into packets; `None` uses the configured policy.
    pub async fn create_packets(&self, policy: Option<&PacketPolicy>) -> Result<Vec<PacketRow>, EngineError> {
        self.ensure_initialized()?;
        let _step = self.step_guard.lock().await;
        let packets = self
            .assembler
            .create_packets(policy.unwrap_or(&self.config.packet_policy))?;
        self.progress.lock().packets_created += packets.len() as u64;
        self.announce_packets(&packets);
        Ok(packets)
    }

    pub async fn analyze_packet(&self, packet_id: &PacketId) -> Result<Analysis, EngineError> {
        self.ensure_initialized()?;
        self.generation.analyze_packet(packet_id).await
    }

    /// Generate a poem outside the step loop. `None` uses the configured
    /// options at the current iteration.
    pub async fn generate_poem(
        &self,
        packet_id: &PacketId,
        options: Option<GenerationOptions>,
    ) -> Result<PoemResponse, EngineError> {
        self.ensure_initialized()?;
        let options = options.unwrap_or_else(|| GenerationOptions {
            iteration: self.progress.lock().iteration,
            ..self.config.generation.clone()
        });

        match self.generation.generate_poem(packet_id, &options).await {
            Ok(response) => {
                self.progress.lock().poems_created += 1;
                self.publish(PipelineEvent::PoemAccepted {
                    poem_id: response.poem.id.clone(),
                    packet_id: packet_id.clone(),
                });
                Ok(response)
            }
            Err(e) => {
                self.publish(PipelineEvent::PoemRejected {
                    packet_id: packet_id.clone(),
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Refuse future steps. A step already running finishes normally.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
        let state = self.progress.lock().state;
        if matches!(state, PipelineState::Ready | PipelineState::Complete) {
            self.set_state(PipelineState::Paused);
        }
        info!("pipeline paused");
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        if self.progress.lock().state == PipelineState::Paused {
            self.set_state(PipelineState::Ready);
        }
        info!("pipeline resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Wipe the lineage store, drop cached shards and zero all counters. The
    /// controller stays initialized in `Ready`; shards reload on demand.
    #[instrument(skip(self))]
    pub async fn reset(&self) -> Result<PipelineSnapshot, EngineError> {
        let _step = self.step_guard.lock().await;
        self.db.reset()?;
        self.index.clear_cache();
        self.paused.store(false, Ordering::Release);
        {
            let mut p = self.progress.lock();
            let initialized = p.initialized;
            *p = Progress {
                initialized,
                ..Progress::default()
            };
        }
        self.set_state(PipelineState::Ready);
        info!("pipeline reset");
        Ok(self.current_state())
    }
}

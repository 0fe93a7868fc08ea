pub mod dictionary;
pub mod error;
pub mod generation;
pub mod packets;
pub mod pipeline;
pub mod segmenter;

pub use dictionary::{
    DictionaryBuilder, DirectoryShardSource, IndexStats, MemoryShardSource, ShardSource, Trie, TrieIndex,
};
pub use error::{DictionaryError, EngineError};
pub use generation::{Analysis, GenerationOptions, GenerationService, PoemResponse, VerificationReport};
pub use packets::{PacketAssembler, PacketPolicy};
pub use pipeline::{PipelineConfig, PipelineController, StepResult, StepWarning};
pub use segmenter::Segmenter;

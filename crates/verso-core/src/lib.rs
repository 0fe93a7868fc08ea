pub mod errors;
pub mod events;
pub mod ids;
pub mod provider;
pub mod security;
pub mod style;

pub use errors::GatewayError;
pub use ids::{ChunkId, PacketId, PoemId, WordId};
pub use provider::{CompletionRequest, LlmProvider};
pub use style::{OrderFallback, PoemStyle};

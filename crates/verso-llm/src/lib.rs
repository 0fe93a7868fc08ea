pub mod anthropic;
pub mod mock;
pub mod models;
pub mod reliable;

pub use anthropic::{AnthropicConfig, AnthropicProvider};
pub use mock::{MockProvider, MockResponse};
pub use reliable::{ReliableConfig, ReliableProvider};

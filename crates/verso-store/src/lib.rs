pub mod chunks;
pub mod database;
pub mod error;
pub mod packets;
pub mod poems;
pub mod row_helpers;
pub mod schema;
pub mod words;

pub use chunks::{ChunkRepo, ChunkRow};
pub use database::{Database, StoreCounts};
pub use error::StoreError;
pub use packets::{PacketRepo, PacketRow, PacketWordRow};
pub use poems::{NewPoem, OriginRow, PoemRepo, PoemRow};
pub use words::{DiscoveredWord, WordRepo, WordRow};

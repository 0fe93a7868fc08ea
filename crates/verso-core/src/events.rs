use serde::{Deserialize, Serialize};

use crate::ids::{ChunkId, PacketId, PoemId};

/// Pipeline controller states.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    #[default]
    Ready,
    Processing,
    Paused,
    Error,
    Complete,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::Processing => write!(f, "processing"),
            Self::Paused => write!(f, "paused"),
            Self::Error => write!(f, "error"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

/// Point-in-time view of the pipeline, as returned by `current_state()`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub state: PipelineState,
    pub initialized: bool,
    pub paused: bool,
    pub remaining_chunks: u64,
    pub processed_chunks: u64,
    pub words_found: u64,
    pub packets_created: u64,
    pub poems_created: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Events published by the pipeline controller. Subscribers receive them over
/// a broadcast channel; nothing in the core waits on them.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    #[serde(rename = "state_changed")]
    StateChanged { snapshot: PipelineSnapshot },

    #[serde(rename = "chunk_segmented")]
    ChunkSegmented { chunk_id: ChunkId, word_count: usize },

    #[serde(rename = "packet_created")]
    PacketCreated { packet_id: PacketId, sequence: i64, word_count: usize },

    #[serde(rename = "poem_accepted")]
    PoemAccepted { poem_id: PoemId, packet_id: PacketId },

    #[serde(rename = "poem_rejected")]
    PoemRejected { packet_id: PacketId, reason: String },
}

impl PipelineEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "state_changed",
            Self::ChunkSegmented { .. } => "chunk_segmented",
            Self::PacketCreated { .. } => "packet_created",
            Self::PoemAccepted { .. } => "poem_accepted",
            Self::PoemRejected { .. } => "poem_rejected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_tag_matches_event_type() {
        let event = PipelineEvent::PoemRejected {
            packet_id: PacketId::from_raw("pkt_1"),
            reason: "order violation".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.event_type());
    }

    #[test]
    fn snapshot_omits_missing_error() {
        let json = serde_json::to_value(PipelineSnapshot::default()).unwrap();
        assert!(json.get("last_error").is_none());
        assert_eq!(json["state"], "ready");
    }
}

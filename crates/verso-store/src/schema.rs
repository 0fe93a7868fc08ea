/// SQL DDL for the lineage store.
/// Foreign keys are enabled at connection time.
pub const SCHEMA_VERSION: u32 = 1;

pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    position INTEGER NOT NULL,
    processed INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS words (
    id TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    chunk_id TEXT NOT NULL REFERENCES chunks(id),
    position INTEGER NOT NULL,
    discovered_at TEXT NOT NULL,
    UNIQUE (chunk_id, position)
);

CREATE TABLE IF NOT EXISTS packets (
    id TEXT PRIMARY KEY,
    sequence INTEGER NOT NULL UNIQUE,
    word_count INTEGER NOT NULL,
    processed INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS packet_words (
    packet_id TEXT NOT NULL REFERENCES packets(id),
    word_id TEXT NOT NULL UNIQUE REFERENCES words(id),
    sequence INTEGER NOT NULL,
    PRIMARY KEY (packet_id, sequence)
);

CREATE TABLE IF NOT EXISTS poems (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    style TEXT NOT NULL,
    iteration INTEGER NOT NULL,
    packet_id TEXT NOT NULL REFERENCES packets(id),
    metadata TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_processed_position ON chunks(processed, position);
CREATE INDEX IF NOT EXISTS idx_words_chunk ON words(chunk_id);
CREATE INDEX IF NOT EXISTS idx_words_discovered ON words(discovered_at);
CREATE INDEX IF NOT EXISTS idx_packets_processed ON packets(processed, sequence);
CREATE INDEX IF NOT EXISTS idx_poems_iteration ON poems(iteration);
CREATE INDEX IF NOT EXISTS idx_poems_packet ON poems(packet_id);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
"#;

/// Children first so foreign keys never dangle mid-drop.
pub const DROP_TABLES: &str = r#"
DROP TABLE IF EXISTS poems;
DROP TABLE IF EXISTS packet_words;
DROP TABLE IF EXISTS packets;
DROP TABLE IF EXISTS words;
DROP TABLE IF EXISTS chunks;
DROP TABLE IF EXISTS schema_version;
"#;

pub const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;
"#;

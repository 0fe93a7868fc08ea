//! # verso
//!
//! Command-line composition root: loads settings once, builds every
//! component, and drives the pipeline one subcommand at a time.

#![deny(unsafe_code)]

mod provider_factory;

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{info, warn};

use verso_core::events::PipelineState;
use verso_core::{PacketId, PoemId, PoemStyle};
use verso_engine::{
    DictionaryBuilder, DirectoryShardSource, EngineError, GenerationOptions, PacketPolicy, PipelineConfig,
    PipelineController, TrieIndex,
};
use verso_settings::{expand_home, load_settings, load_settings_from_path, VersoSettings};
use verso_store::{ChunkRepo, Database, PoemRepo};
use verso_telemetry::{init_telemetry, TelemetryConfig};

/// Found poetry from raw text.
#[derive(Parser, Debug)]
#[command(name = "verso", about = "Discover words in text and turn them into verified poems")]
struct Cli {
    /// Settings file (defaults to ~/.verso/settings.json).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Serve completions from a JSON array of strings instead of the API.
    #[arg(long, global = true, value_name = "SCRIPT")]
    mock: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Dictionary maintenance.
    Dictionary {
        #[command(subcommand)]
        action: DictionaryCommand,
    },
    /// Store each file as one chunk, at the next free position.
    Ingest { files: Vec<PathBuf> },
    /// Process the next unprocessed chunk.
    Step,
    /// Process chunks until none remain.
    Run {
        #[arg(long)]
        max_steps: Option<usize>,
    },
    /// Batch unused words into packets.
    Packets,
    /// Ask whether a packet can produce a poem.
    Analyze { packet_id: String },
    /// Generate and verify a poem for a packet.
    Generate {
        packet_id: String,
        #[arg(long)]
        style: Option<PoemStyle>,
    },
    /// Show the source words and chunks behind a poem.
    Trace { poem_id: String },
    /// Show pipeline and store counts.
    Status,
    /// Delete all lineage data.
    Reset,
}

#[derive(Subcommand, Debug)]
enum DictionaryCommand {
    /// Build letter shards from a newline-separated word list.
    Build {
        wordlist: PathBuf,
        /// Output directory (defaults to `dictionary.dir`).
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

struct App {
    settings: VersoSettings,
    db: Database,
    pipeline: Arc<PipelineController>,
}

fn load(cli: &Cli) -> Result<VersoSettings> {
    let settings = match &cli.settings {
        Some(path) => load_settings_from_path(path),
        None => load_settings(),
    };
    settings.context("failed to load settings")
}

fn telemetry_config(settings: &VersoSettings) -> TelemetryConfig {
    let log_level = settings.logging.level.parse().unwrap_or(tracing::Level::INFO);
    TelemetryConfig {
        log_level,
        json: settings.logging.json,
        log_to_sqlite: settings.logging.log_to_sqlite,
        log_db_path: expand_home(&settings.logging.log_db_path),
        ..Default::default()
    }
}

fn pipeline_config(settings: &VersoSettings) -> PipelineConfig {
    let p = &settings.packets;
    let g = &settings.generation;
    PipelineConfig {
        packet_policy: PacketPolicy {
            min_size: p.min_size,
            max_size: p.max_size,
            prefer_related: p.prefer_related,
            break_every: p.break_every,
            break_punctuation: p.break_punctuation.clone(),
        },
        generation: GenerationOptions {
            style: g.style,
            iteration: 0,
            order_fallback: g.order_fallback,
            max_tokens: g.max_tokens,
            temperature: g.temperature,
        },
        min_word_length: settings.dictionary.min_word_length,
        max_word_length: settings.dictionary.max_word_length,
    }
}

async fn build_app(cli: &Cli, settings: VersoSettings) -> Result<App> {
    let db_path = expand_home(&settings.store.db_path);
    let db = Database::open(&db_path).with_context(|| format!("failed to open {}", db_path.display()))?;
    info!(path = %db_path.display(), "lineage store opened");

    let source = Arc::new(DirectoryShardSource::new(expand_home(&settings.dictionary.dir)));
    let warm_letters = settings
        .dictionary
        .warm_letters
        .iter()
        .filter_map(|l| l.chars().next())
        .collect();
    let index = Arc::new(TrieIndex::with_warm_letters(source, warm_letters));

    let provider = provider_factory::build_provider(&settings.llm, cli.mock.as_deref())?;
    let pipeline = Arc::new(PipelineController::new(
        db.clone(),
        index,
        provider,
        pipeline_config(&settings),
    ));
    pipeline.initialize().await.context("failed to initialize pipeline")?;

    Ok(App {
        settings,
        db,
        pipeline,
    })
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn build_dictionary(wordlist: &Path, out: &Path) -> Result<()> {
    let file = std::fs::File::open(wordlist)
        .with_context(|| format!("failed to open word list {}", wordlist.display()))?;
    let mut builder = DictionaryBuilder::new();
    for line in BufReader::new(file).lines() {
        builder.add(&line?);
    }
    let shards = builder
        .write_to(out)
        .with_context(|| format!("failed to write shards to {}", out.display()))?;
    info!(words = builder.word_count(), skipped = builder.skipped(), shards, "dictionary built");
    print_json(&json!({
        "words": builder.word_count(),
        "skipped": builder.skipped(),
        "shards": shards,
        "dir": out.display().to_string(),
    }))
}

fn ingest(app: &App, files: &[PathBuf]) -> Result<()> {
    let chunks = ChunkRepo::new(app.db.clone());
    let mut added = Vec::with_capacity(files.len());
    for path in files {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if content.trim().is_empty() {
            warn!(path = %path.display(), "skipping empty file");
            continue;
        }
        let position = chunks.next_position()?;
        let chunk = chunks.add(&content, position)?;
        info!(chunk_id = %chunk.id, position, path = %path.display(), "chunk ingested");
        added.push(json!({ "chunkId": chunk.id, "position": position, "file": path.display().to_string() }));
    }
    print_json(&added)
}

async fn run(app: &App, max_steps: Option<usize>) -> Result<()> {
    let pipeline = app.pipeline.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, pausing after the current step");
            pipeline.pause();
        }
    });

    let mut steps = 0;
    let outcome = loop {
        if max_steps.is_some_and(|max| steps >= max) || app.pipeline.is_paused() {
            break Ok(());
        }
        match app.pipeline.process_next_chunk().await {
            Ok(step) => {
                if step.chunk_id.is_none() {
                    break Ok(());
                }
                steps += 1;
                print_json(&step)?;
                if step.state == PipelineState::Complete {
                    break Ok(());
                }
            }
            Err(EngineError::Paused) => break Ok(()),
            Err(e) => break Err(e),
        }
    };
    ctrl_c.abort();

    outcome.context("pipeline step failed")?;
    print_json(&app.pipeline.current_state())
}

async fn execute(cli: Cli, settings: VersoSettings) -> Result<()> {
    if let Command::Dictionary {
        action: DictionaryCommand::Build { wordlist, out },
    } = &cli.command
    {
        let out = out
            .clone()
            .unwrap_or_else(|| expand_home(&settings.dictionary.dir));
        return build_dictionary(wordlist, &out);
    }

    let app = build_app(&cli, settings).await?;
    match cli.command {
        Command::Dictionary { .. } => Ok(()),
        Command::Ingest { files } => ingest(&app, &files),
        Command::Step => {
            let step = app.pipeline.process_next_chunk().await?;
            print_json(&step)
        }
        Command::Run { max_steps } => run(&app, max_steps).await,
        Command::Packets => {
            let packets = app.pipeline.create_packets(None).await?;
            print_json(&packets)
        }
        Command::Analyze { packet_id } => {
            let analysis = app.pipeline.analyze_packet(&PacketId::from_raw(packet_id)).await?;
            print_json(&analysis)
        }
        Command::Generate { packet_id, style } => {
            let mut options = pipeline_config(&app.settings).generation;
            if let Some(style) = style {
                options.style = style;
            }
            let response = app
                .pipeline
                .generate_poem(&PacketId::from_raw(packet_id), Some(options))
                .await?;
            print_json(&response)
        }
        Command::Trace { poem_id } => {
            let origin = PoemRepo::new(app.db.clone()).trace_origin(&PoemId::from_raw(poem_id))?;
            print_json(&origin)
        }
        Command::Status => print_json(&json!({
            "pipeline": app.pipeline.current_state(),
            "store": app.db.counts()?,
        })),
        Command::Reset => {
            let snapshot = app.pipeline.reset().await?;
            print_json(&snapshot)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load(&cli)?;
    let _telemetry = init_telemetry(telemetry_config(&settings));

    execute(cli, settings).await
}

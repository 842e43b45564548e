use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use clap::{Parser, Subcommand};
use doc_chat_core::{
    sse, AnswerGenerator, ChatEngine, ChatEvent, Embedder, EmbeddingError, GenerationConfig,
    GroqClient, GroqConfig, HashEmbedder, HttpEmbedder, HttpEmbedderConfig, IngestionConfig,
    IngestionPipeline, LopdfExtractor, MemoryChatStore, QdrantConfig, QdrantIndex,
    RetrievalConfig, Retriever, VectorIndex, DEFAULT_EMBEDDING_DIMENSIONS,
};
use futures::StreamExt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "doc-chat", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Qdrant base URL
    #[arg(long, default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant collection
    #[arg(long, default_value = "document_chunks")]
    qdrant_collection: String,

    /// Qdrant API key
    #[arg(long, env = "QDRANT_API_KEY")]
    qdrant_api_key: Option<String>,

    /// Groq API key
    #[arg(long, env = "GROQ_API_KEY", default_value = "")]
    groq_api_key: String,

    /// Groq model name
    #[arg(long, default_value = "llama-3.3-70b-versatile")]
    groq_model: String,

    /// OpenAI-compatible embeddings endpoint; omit to embed locally.
    #[arg(long, env = "EMBEDDINGS_URL")]
    embeddings_url: Option<String>,

    /// Embedding model name (remote endpoint only)
    #[arg(long, default_value = "all-MiniLM-L6-v2")]
    embeddings_model: String,

    /// Embedding vector dimensions
    #[arg(long, default_value_t = DEFAULT_EMBEDDING_DIMENSIONS)]
    dimensions: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a PDF into the vector index.
    Ingest {
        /// Path to the PDF file.
        #[arg(long)]
        pdf: PathBuf,
        /// Reuse an existing document id to replace its chunks.
        #[arg(long)]
        document_id: Option<Uuid>,
    },
    /// Ask a single question about an ingested document.
    Ask {
        #[arg(long)]
        document_id: Uuid,
        /// The question to answer from the document.
        question: String,
        /// Print raw SSE frames instead of plain text.
        #[arg(long, default_value_t = false)]
        sse: bool,
    },
    /// Interactive conversation with an ingested document.
    Chat {
        #[arg(long)]
        document_id: Uuid,
    },
    /// Remove a document's chunks from the vector index.
    Delete {
        #[arg(long)]
        document_id: Uuid,
    },
}

/// Embedder backend picked by configuration at startup.
enum CliEmbedder {
    Hash(HashEmbedder),
    Http(HttpEmbedder),
}

#[async_trait]
impl Embedder for CliEmbedder {
    fn dimensions(&self) -> usize {
        match self {
            CliEmbedder::Hash(inner) => inner.dimensions(),
            CliEmbedder::Http(inner) => inner.dimensions(),
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        match self {
            CliEmbedder::Hash(inner) => inner.embed(text).await,
            CliEmbedder::Http(inner) => inner.embed(text).await,
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        match self {
            CliEmbedder::Hash(inner) => inner.embed_batch(texts).await,
            CliEmbedder::Http(inner) => inner.embed_batch(texts).await,
        }
    }
}

fn build_embedder(cli: &Cli) -> anyhow::Result<CliEmbedder> {
    match &cli.embeddings_url {
        Some(base_url) => {
            let embedder = HttpEmbedder::new(HttpEmbedderConfig {
                base_url: base_url.clone(),
                api_key: None,
                model: cli.embeddings_model.clone(),
                dimensions: cli.dimensions,
                ..HttpEmbedderConfig::default()
            })
            .context("invalid embeddings endpoint")?;
            Ok(CliEmbedder::Http(embedder))
        }
        None => Ok(CliEmbedder::Hash(HashEmbedder {
            dimensions: cli.dimensions,
        })),
    }
}

fn build_index(cli: &Cli) -> QdrantIndex {
    QdrantIndex::new(QdrantConfig {
        endpoint: cli.qdrant_url.clone(),
        collection: cli.qdrant_collection.clone(),
        api_key: cli.qdrant_api_key.clone(),
        vector_size: cli.dimensions,
    })
}

fn build_model(cli: &Cli) -> anyhow::Result<GroqClient> {
    GroqClient::new(GroqConfig {
        api_key: cli.groq_api_key.clone(),
        model: cli.groq_model.clone(),
        ..GroqConfig::default()
    })
    .context("invalid groq configuration")
}

/// Querying a collection that was never created fails; make sure it exists
/// before the first question, same as the ingest path does.
async fn build_engine(
    cli: &Cli,
) -> anyhow::Result<ChatEngine<CliEmbedder, QdrantIndex, GroqClient, MemoryChatStore>> {
    let index = build_index(cli);
    index
        .ensure_collection()
        .await
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    Ok(ChatEngine::new(
        Retriever::new(build_embedder(cli)?, index, RetrievalConfig::default()),
        AnswerGenerator::new(Arc::new(build_model(cli)?), GenerationConfig::default()),
        Arc::new(MemoryChatStore::new()),
    ))
}

async fn stream_reply(
    engine: &ChatEngine<CliEmbedder, QdrantIndex, GroqClient, MemoryChatStore>,
    session_id: Uuid,
    document_id: Uuid,
    question: &str,
    raw_sse: bool,
) -> anyhow::Result<()> {
    let mut stream = engine
        .respond(session_id, document_id, question)
        .await
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    while let Some(event) = stream.next().await {
        if raw_sse {
            print!("{}", sse::frame(&event));
            std::io::stdout().flush()?;
            continue;
        }

        match event {
            ChatEvent::Fragment(text) => {
                print!("{text}");
                std::io::stdout().flush()?;
            }
            ChatEvent::Completed(message) => {
                println!();
                if let Some(sources) = &message.sources {
                    if !sources.is_empty() {
                        let pages: Vec<String> =
                            sources.iter().map(|page| page.to_string()).collect();
                        println!("sources: pages {}", pages.join(", "));
                    }
                }
            }
            ChatEvent::Failed(error) => {
                anyhow::bail!("generation failed: {error}");
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "doc-chat boot"
    );

    match &cli.command {
        Command::Ingest { pdf, document_id } => {
            let bytes = tokio::fs::read(pdf)
                .await
                .with_context(|| format!("cannot read {}", pdf.display()))?;

            let index = build_index(&cli);
            index
                .ensure_collection()
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            let pipeline = IngestionPipeline::new(
                LopdfExtractor,
                build_embedder(&cli)?,
                index,
                IngestionConfig::default(),
            );

            let document_id = document_id.unwrap_or_else(Uuid::new_v4);
            let summary = pipeline
                .ingest(document_id, &bytes)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!(
                "ingested document {} ({} pages, {} chunks)",
                summary.document_id, summary.page_count, summary.chunk_count
            );
        }
        Command::Ask {
            document_id,
            question,
            sse: raw_sse,
        } => {
            let engine = build_engine(&cli).await?;
            let session_id = Uuid::new_v4();
            stream_reply(&engine, session_id, *document_id, question, *raw_sse).await?;
        }
        Command::Chat { document_id } => {
            let engine = build_engine(&cli).await?;
            let session_id = Uuid::new_v4();
            println!("chatting with document {document_id} (empty line to quit)");

            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                print!("> ");
                std::io::stdout().flush()?;

                let Some(line) = lines.next_line().await? else {
                    break;
                };
                let question = line.trim();
                if question.is_empty() {
                    break;
                }

                stream_reply(&engine, session_id, *document_id, question, false).await?;
            }
        }
        Command::Delete { document_id } => {
            let index = build_index(&cli);
            index
                .delete(*document_id)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            println!("deleted chunks for document {document_id}");
        }
    }

    Ok(())
}

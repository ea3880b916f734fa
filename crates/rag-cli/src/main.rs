//! RAG CLI - Command-line interface for query rewriting and retrieval.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rag_core::{
    Context, LlmConfig, RagConfig, RagError, RewriteStrategy, CONVERSATION_HISTORY_KEY,
};
use rag_llm::OpenAiClient;
use rag_query::{IndexDocument, MemoryIndex, QueryEngine};
use rag_rewrite::{adaptive_budget, classify, QueryRewriter};

/// RAG - Adaptive query rewriting for retrieval-augmented generation
#[derive(Parser)]
#[command(name = "rag")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: user config dir, then ./rag-rewrite.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify query complexity without calling any service
    Classify {
        /// Query to classify
        query: String,
    },

    /// Rewrite one or more queries
    Rewrite {
        /// Queries to rewrite
        #[arg(required = true)]
        queries: Vec<String>,

        /// Strategy (expansion, decomposition, refinement, hybrid)
        #[arg(short, long)]
        strategy: Option<RewriteStrategy>,

        /// Maximum number of variants to request
        #[arg(short, long)]
        max_variants: Option<usize>,

        /// Prior conversation to condition the rewrite on
        #[arg(long)]
        history: Option<String>,
    },

    /// Rewrite a query and search a JSON-lines corpus
    Search {
        /// Search query
        query: String,

        /// Corpus file, one {"content": ..., "metadata": {...}} object per line
        #[arg(long)]
        corpus: PathBuf,

        /// Maximum number of results per query variant
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Maximum number of fused results to return
        #[arg(short, long)]
        limit: Option<usize>,

        /// Search the query as-is
        #[arg(long)]
        no_rewrite: bool,

        /// Prior conversation to condition the rewrite on
        #[arg(long)]
        history: Option<String>,
    },
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn load_config(path: Option<&Path>) -> rag_core::Result<RagConfig> {
    let config = match path {
        Some(path) => RagConfig::load(path)?,
        None => RagConfig::load_default()?,
    };
    config.with_env_overrides()
}

struct SearchOptions {
    top_k: usize,
    limit: Option<usize>,
    rewrite_enabled: bool,
}

/// Hint naming the configured endpoint when an external service call fails.
fn service_hint(error: &RagError, llm: &LlmConfig) -> Option<String> {
    if !error.is_service_error() {
        return None;
    }
    Some(format!(
        "Request to {} failed (chat model {}, embedding model {}); check llm.base_url and OPENAI_API_KEY",
        llm.base_url, llm.chat_model, llm.embedding_model
    ))
}

fn history_context(history: Option<String>) -> Option<Context> {
    history.map(|h| {
        let mut ctx = Context::new();
        ctx.insert(CONVERSATION_HISTORY_KEY.to_string(), h.into());
        ctx
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Classify { query } => {
            classify_query(&config, &query)?;
        }
        Commands::Rewrite {
            queries,
            strategy,
            max_variants,
            history,
        } => {
            let strategy = strategy.unwrap_or(config.rewrite.strategy);
            let max_variants = max_variants.unwrap_or(config.rewrite.max_variants);
            let context = history_context(history);
            rewrite(&config, &queries, strategy, max_variants, context.as_ref()).await?;
        }
        Commands::Search {
            query,
            corpus,
            top_k,
            limit,
            no_rewrite,
            history,
        } => {
            let options = SearchOptions {
                top_k: top_k.unwrap_or(config.search.top_k),
                limit: limit.or(config.search.max_results),
                rewrite_enabled: config.rewrite.enabled && !no_rewrite,
            };
            let context = history_context(history);
            search(&config, &query, &corpus, &options, context.as_ref()).await?;
        }
    }

    Ok(())
}

fn classify_query(config: &RagConfig, query: &str) -> Result<(), Box<dyn std::error::Error>> {
    let class = classify(query);
    let output = serde_json::json!({
        "query": query,
        "complexity": class.as_str(),
        "word_count": query.split_whitespace().count(),
        "variant_budget": adaptive_budget(class, config.rewrite.max_variants),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn rewrite(
    config: &RagConfig,
    queries: &[String],
    strategy: RewriteStrategy,
    max_variants: usize,
    context: Option<&Context>,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = Arc::new(OpenAiClient::new(config.llm.clone())?);
    let rewriter = QueryRewriter::new(client.clone(), client, strategy, max_variants)?;

    let queries: Vec<&str> = queries.iter().map(String::as_str).collect();
    let results = rewriter.batch_rewrite(&queries, context).await;
    info!("{} distinct rewrites cached", rewriter.cache().len());

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

async fn search(
    config: &RagConfig,
    query: &str,
    corpus: &Path,
    options: &SearchOptions,
    context: Option<&Context>,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = Arc::new(OpenAiClient::new(config.llm.clone())?);
    let report = |e: RagError| {
        if let Some(hint) = service_hint(&e, client.config()) {
            error!("{}", hint);
        }
        e
    };

    let documents = read_corpus(corpus)?;
    let index = MemoryIndex::new(client.clone());
    index.add_documents(documents).await.map_err(report)?;

    let engine = if options.rewrite_enabled {
        let rewriter = QueryRewriter::from_config(client.clone(), client.clone(), &config.rewrite)?;
        QueryEngine::with_rewriter(Arc::new(index), rewriter)
    } else {
        QueryEngine::new(Arc::new(index))
    };
    let engine = engine.with_result_limit(options.limit);

    let results = engine
        .search(query, context, options.top_k)
        .await
        .map_err(report)?;
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

/// Parse a JSON-lines corpus; blank lines are skipped.
fn read_corpus(path: &Path) -> rag_core::Result<Vec<IndexDocument>> {
    let content = fs::read_to_string(path)?;
    let mut documents = Vec::new();

    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let document: IndexDocument = serde_json::from_str(line).map_err(|e| {
            RagError::invalid_argument(format!(
                "{}:{}: invalid corpus entry: {}",
                path.display(),
                line_no + 1,
                e
            ))
        })?;
        documents.push(document);
    }

    info!("Loaded {} documents from {}", documents.len(), path.display());
    Ok(documents)
}

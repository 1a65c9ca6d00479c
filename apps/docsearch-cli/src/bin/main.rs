use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use docsearch_core::config::{Config, ScorerKind, Settings};
use docsearch_core::source::DocumentSource;
use docsearch_core::{EmbeddingGateway, RerankGateway};
use docsearch_embed::{EmbeddingRelevanceScorer, HashingEmbedder, KeywordRelevanceScorer};
use docsearch_hybrid::{QueryOptions, RetrievalEngine};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: docsearch <ingest <path>|query \"<text>\" [top_k]|similar <chunk_id> [k]|stats|delete <doc_id>|reset>";

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().collect();
    args.remove(0);
    if args.is_empty() { eprintln!("{USAGE}"); std::process::exit(1); }
    let cmd = args.remove(0);
    (cmd, args)
}

fn required(args: &[String], what: &str) -> String {
    args.first().cloned().unwrap_or_else(|| { eprintln!("missing {what}\n{USAGE}"); std::process::exit(1) })
}

fn build_engine(config: &Config, settings: Settings) -> anyhow::Result<RetrievalEngine> {
    let embedder: Arc<dyn EmbeddingGateway> = Arc::new(HashingEmbedder::new(settings.embedding.dimension));
    let scorer: Option<Arc<dyn RerankGateway>> = if settings.rerank.enabled {
        let scorer: Arc<dyn RerankGateway> = match settings.rerank.scorer {
            ScorerKind::Embedding => Arc::new(EmbeddingRelevanceScorer::with_settings(embedder.clone(), &settings.rerank)),
            ScorerKind::Keyword => Arc::new(KeywordRelevanceScorer::new()),
        };
        Some(scorer)
    } else {
        None
    };
    let snapshot = config.snapshot_path(&settings);
    Ok(RetrievalEngine::open(settings, embedder, scorer, Some(snapshot))?)
}

async fn ingest(engine: &RetrievalEngine, path: &Path) -> anyhow::Result<()> {
    let source = DocumentSource::new();
    if path.is_file() {
        let doc = source.load_file(path)?;
        let report = engine.ingest(&doc).await?;
        println!("Ingested {} ({} chunks, {} degraded)", report.doc_id, report.total_chunks, report.degraded_chunks.len());
        return Ok(());
    }

    let docs = source.load_directory(path, None)?;
    if docs.is_empty() { println!("No supported files found under {}.", path.display()); return Ok(()); }
    let pb = ProgressBar::new(docs.len() as u64);
    pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents ({percent}%) {msg}")?.progress_chars("#>-"));
    let (mut chunks, mut degraded) = (0usize, 0usize);
    for doc in &docs {
        pb.set_message(doc.filename().unwrap_or_default().to_string());
        let report = engine.ingest(doc).await?;
        chunks += report.total_chunks; degraded += report.degraded_chunks.len();
        pb.inc(1);
    }
    pb.finish_with_message("done");
    println!("Ingested {} documents into {} chunks ({} degraded)", docs.len(), chunks, degraded);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();

    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.settings()?;
    let (cmd, args) = parse_args();
    tracing::debug!(command = %cmd, "starting");
    let engine = build_engine(&config, settings)?;

    match cmd.as_str() {
        "ingest" => {
            let path = PathBuf::from(required(&args, "<path>"));
            ingest(&engine, &path).await.with_context(|| format!("ingesting {}", path.display()))?;
        }
        "query" => {
            let text = required(&args, "query text");
            let top_k = args.get(1).map(|k| k.parse::<usize>()).transpose().context("top_k must be a number")?;
            let response = engine.query(&text, QueryOptions { top_k, ..QueryOptions::default() }).await?;
            println!("{} results ({} candidates, fused: {}, {} ms)", response.results.len(), response.candidates, response.fused, response.elapsed.as_millis());
            for (rank, hit) in response.results.iter().enumerate() {
                let section = hit.chunk.section.as_ref().map(|s| format!(" [{}]", s.title)).unwrap_or_default();
                println!("{:>2}. {:.4} (sim {:.4}) {}{}", rank + 1, hit.score(), hit.similarity, hit.chunk.id, section);
                let preview: String = hit.chunk.text.chars().take(160).collect();
                println!("    {}", preview.replace('\n', " "));
            }
        }
        "similar" => {
            let chunk_id = required(&args, "<chunk_id>");
            let k = args.get(1).map(|k| k.parse::<usize>()).transpose().context("k must be a number")?.unwrap_or(5);
            for hit in engine.similar(&chunk_id, k).await? {
                println!("{:.4} {}", hit.similarity, hit.chunk.id);
            }
        }
        "stats" => {
            let stats = engine.stats().await;
            println!("initialized: {}", stats.initialized);
            println!("records:     {}", stats.count);
            println!("dimension:   {}", stats.dimension.map_or_else(|| "-".to_string(), |d| d.to_string()));
            println!("approx size: {} bytes", stats.approx_size_bytes);
            if let Some(path) = engine.snapshot_path() { println!("snapshot:    {}", path.display()); }
        }
        "delete" => {
            let doc_id = required(&args, "<doc_id>");
            let removed = engine.delete_document(&doc_id).await?;
            println!("Removed {} chunks of {}", removed, doc_id);
        }
        "reset" => {
            engine.reset().await?;
            println!("Index cleared");
        }
        _ => { eprintln!("Unknown command: {}\n{USAGE}", cmd); std::process::exit(1); }
    }

    engine.close().await?;
    Ok(())
}

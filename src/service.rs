//! Wiring of the core pipeline to SQLite and the model adapters, plus the
//! CLI entry points built on it.

use anyhow::{bail, Context, Result};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use contextual_retrieval_core::answer::AnswerComposer;
use contextual_retrieval_core::chunk::ParagraphSplitter;
use contextual_retrieval_core::fusion::HybridRetriever;
use contextual_retrieval_core::ingest::Ingestor;
use contextual_retrieval_core::models::IngestedDocument;
use contextual_retrieval_core::traits::{ChatCompleter, Embedder};

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::extract::DocumentParser;
use crate::llm::create_chat;
use crate::sqlite_store::{SqliteStore, SqliteVectorIndex};

/// Everything needed to ingest documents and answer questions.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<SqliteStore>,
    pub vectors: Arc<SqliteVectorIndex>,
    pub ingestor: Ingestor,
    pub retriever: HybridRetriever,
    pub composer: AnswerComposer,
}

impl Services {
    /// Connect to the configured database and build the model adapters
    /// selected by `[llm]` and `[embedding]`.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        let chat = create_chat(&config.llm)?;
        let embedder = create_embedder(&config.embedding)?;
        Ok(Self::with_models(config, pool, chat, embedder))
    }

    /// Build services around caller-supplied models.
    pub fn with_models(
        config: &Config,
        pool: SqlitePool,
        chat: Arc<dyn ChatCompleter>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        let store = Arc::new(SqliteStore::new(pool.clone()));
        let vectors = Arc::new(SqliteVectorIndex::new(pool, embedder.clone()));

        let splitter = ParagraphSplitter::new(
            config.chunking.max_chars,
            config.chunking.overlap_chars,
        );
        let ingestor = Ingestor::new(
            Arc::new(DocumentParser),
            Arc::new(splitter),
            chat.clone(),
            embedder,
            vectors.clone(),
            store.clone(),
        )
        .with_max_concurrency(config.ingest.max_concurrency);

        let retriever = HybridRetriever::new(store.clone(), vectors.clone());
        let composer =
            AnswerComposer::new(retriever.clone(), chat).with_top_k(config.retrieval.top_k);

        Self {
            store,
            vectors,
            ingestor,
            retriever,
            composer,
        }
    }
}

/// Ingest a file, or every file under a directory.
///
/// A single file is stored under `name` (default: its file name). Files
/// found under a directory are named by their path relative to it. Each
/// document is all-or-nothing; a failing file does not stop the others,
/// but the command fails if any did.
pub async fn run_ingest(config: &Config, path: &Path, name: Option<String>) -> Result<()> {
    let services = Services::from_config(config).await?;

    if path.is_file() {
        let name = match name {
            Some(n) => n,
            None => file_name(path),
        };
        let ingested = ingest_file(&services, path, &name).await?;
        print_ingested(&ingested);
        return Ok(());
    }

    if !path.is_dir() {
        bail!("Path not found: {}", path.display());
    }
    if name.is_some() {
        bail!("--name can only be used when ingesting a single file");
    }

    let files = collect_files(path)?;
    if files.is_empty() {
        println!("No files found under {}", path.display());
        return Ok(());
    }

    let mut failed = 0usize;
    for file in &files {
        let rel = file
            .strip_prefix(path)
            .unwrap_or(file)
            .to_string_lossy()
            .replace('\\', "/");
        match ingest_file(&services, file, &rel).await {
            Ok(ingested) => print_ingested(&ingested),
            Err(e) => {
                failed += 1;
                eprintln!("Failed to ingest {}: {:#}", rel, e);
            }
        }
    }

    println!(
        "Ingested {} of {} files.",
        files.len() - failed,
        files.len()
    );
    if failed > 0 {
        bail!("{} file(s) failed to ingest", failed);
    }
    Ok(())
}

async fn ingest_file(services: &Services, path: &Path, name: &str) -> Result<IngestedDocument> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(services.ingestor.ingest(&bytes, name).await?)
}

fn print_ingested(ingested: &IngestedDocument) {
    println!(
        "Ingested {} ({} chunks) id: {}",
        ingested.document.name,
        ingested.chunks.len(),
        ingested.document.id
    );
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Regular, non-hidden files under `root`, sorted by path.
fn collect_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Answer a question from the ingested corpus and print the answer.
pub async fn run_ask(config: &Config, query: &str) -> Result<()> {
    if query.trim().is_empty() {
        bail!("query must not be empty");
    }
    let services = Services::from_config(config).await?;
    let answer = services.composer.answer(query).await?;
    println!("{}", answer);
    Ok(())
}

/// Print the fused retrieval results for a query, without answering it.
pub async fn run_search(config: &Config, query: &str, limit: Option<usize>) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let services = Services::from_config(config).await?;
    let top_k = limit.unwrap_or(config.retrieval.top_k);
    let results = services.retriever.retrieve_scored(query, top_k).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        let rank = |r: Option<usize>| r.map_or("-".to_string(), |r| format!("#{}", r));
        println!("{}. [{:.4}] {}", i + 1, result.chunk.score, result.chunk.id);
        println!(
            "    ranks: full-text {} / vector {}",
            rank(result.lexical_rank),
            rank(result.vector_rank)
        );
        println!(
            "    excerpt: \"{}\"",
            excerpt(&result.chunk.content, 240).replace('\n', " ").trim()
        );
        println!();
    }
    Ok(())
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}

/// List ingested documents.
pub async fn run_documents(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let documents = store.list_documents().await?;

    if documents.is_empty() {
        println!("No documents.");
    }
    for doc in &documents {
        let date = chrono::DateTime::from_timestamp(doc.created_at, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!("{}  {}  {} chunks  {}", doc.id, date, doc.chunk_count, doc.name);
    }

    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_files_skips_hidden_and_sorts() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("sub")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::write(root.join("b.txt"), "b").unwrap();
        std::fs::write(root.join("a.txt"), "a").unwrap();
        std::fs::write(root.join("sub/c.md"), "c").unwrap();
        std::fs::write(root.join(".hidden"), "h").unwrap();
        std::fs::write(root.join(".git/config"), "g").unwrap();

        let files: Vec<String> = collect_files(root)
            .unwrap()
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(files, vec!["a.txt", "b.txt", "sub/c.md"]);
    }

    #[test]
    fn test_excerpt_truncates_on_chars() {
        assert_eq!(excerpt("héllo", 2), "hé...");
        assert_eq!(excerpt("hi", 5), "hi");
    }
}

use std::env;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};

use process_copilot::alarms::CsvFileSource;
use process_copilot::config::{AppConfig, AppPaths};
use process_copilot::index::{HashingEmbedder, IndexStore};
use process_copilot::ingest::{clean_page_text, Document};
use process_copilot::logging;
use process_copilot::retrieval::Answer;
use process_copilot::service::Copilot;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = AppPaths::new();
    logging::init(&paths);

    let config = AppConfig::load(&paths)?;
    let embedder = Arc::new(HashingEmbedder::new(&config.embedding));
    let store = IndexStore::open(&paths.index_db_path).await?;
    let alarm_source = Arc::new(CsvFileSource::new(&paths.alarm_data_path));
    let copilot = Copilot::new(&config, embedder, store, alarm_source);

    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("build") => {
            let docs_dir = args
                .get(1)
                .map(String::as_str)
                .unwrap_or("./data/docs")
                .to_string();
            let documents = read_documents(Path::new(&docs_dir)).await?;
            if documents.is_empty() {
                bail!("no .txt documents found under {docs_dir}");
            }
            let chunks = copilot.build_index(&documents).await?;
            println!("Indexed {chunks} chunks from {} documents", documents.len());
        }
        Some("ask") => {
            if args.len() < 2 {
                bail!("usage: process-copilot ask <query>");
            }
            let query = args[1..].join(" ");
            copilot
                .load_index()
                .await
                .context("no usable index; run `process-copilot build` first")?;
            print_answer(&copilot.ask(&query).await?);
        }
        Some("explain") => {
            let (Some(tag), Some(start), Some(end)) = (args.get(1), args.get(2), args.get(3))
            else {
                bail!("usage: process-copilot explain <tag> <start> <end>");
            };
            copilot
                .load_index()
                .await
                .context("no usable index; run `process-copilot build` first")?;
            print_answer(&copilot.explain_alarm(tag, start, end).await?);
        }
        Some("status") => {
            let _ = copilot.load_index().await;
            println!("{}", serde_json::to_string_pretty(&copilot.status())?);
        }
        _ => {
            eprintln!(
                "usage: process-copilot <build [docs-dir] | ask <query> | explain <tag> <start> <end> | status>"
            );
        }
    }

    Ok(())
}

/// Stand-in for the out-of-scope extraction layer: each `.txt` file is one
/// document, pages separated by form feeds, cleaned the same way extracted
/// PDF text would be.
async fn read_documents(dir: &Path) -> anyhow::Result<Vec<Document>> {
    let mut documents = Vec::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("reading {}", dir.display()))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("txt") {
            continue;
        }
        let title = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("untitled")
            .to_string();
        let raw = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let pages: Vec<String> = raw.split('\u{0c}').map(clean_page_text).collect();
        documents.push(Document::new(title, pages));
    }

    documents.sort_by(|a, b| a.title.cmp(&b.title));
    Ok(documents)
}

fn print_answer(answer: &Answer) {
    if let Some(summary) = &answer.summary_from_data {
        println!("Data summary:\n{summary}\n");
    }
    println!("{}", answer.answer);
    if answer.citations.is_empty() {
        println!("\n(no citations)");
    } else {
        println!("\nCitations:");
        for (i, citation) in answer.citations.iter().enumerate() {
            println!(
                "  {}. {}, page {} (score: {:.3})",
                i + 1,
                citation.title,
                citation.page,
                citation.score
            );
        }
    }
}

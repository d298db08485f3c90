use biblio_index_core::{
    apply_changes, build_records, diff_snapshots, extract_library, load_documents,
    load_fingerprints, load_snapshot, store_fingerprints, DocumentExtractor, MeilisearchIndex,
    PageNormalizer, PdfiumEngine, FINGERPRINTS_FILE, SNAPSHOT_FILE,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "biblio-index", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Meilisearch base URL
    #[arg(long, default_value = "http://localhost:7700")]
    meilisearch_url: String,

    /// Meilisearch index uid
    #[arg(long, default_value = "docs")]
    index: String,

    /// Meilisearch API key
    #[arg(long, env = "MEILI_API_KEY")]
    api_key: Option<String>,

    /// Directory for extraction artifacts and sync state
    #[arg(long, default_value = "./output")]
    output: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Create and configure the search index (idempotent).
    Init,
    /// Extract full text and cover thumbnails from every PDF attachment.
    Extract {
        /// Library export (docs.json) produced by the library parser.
        #[arg(long)]
        library: PathBuf,
        /// Base directory that attachment paths are relative to.
        #[arg(long)]
        pdf_base: PathBuf,
    },
    /// Diff the current record set against the last confirmed snapshot and
    /// push the changes to the index.
    Sync {
        /// Library export (docs.json) produced by the library parser.
        #[arg(long)]
        library: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let index = MeilisearchIndex::new(&cli.meilisearch_url, &cli.index, cli.api_key.clone());

    match cli.command {
        Command::Init => {
            index
                .ensure_index()
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            println!("index \"{}\" ready at {}", cli.index, cli.meilisearch_url);
        }
        Command::Extract { library, pdf_base } => {
            fs::create_dir_all(&cli.output)?;
            let documents = load_documents(&library)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            let engine =
                PdfiumEngine::new().map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let extractor = DocumentExtractor::new(&engine, PageNormalizer::default());

            info!(documents = documents.len(), "extracting fulltext from PDF attachments");
            let report = extract_library(&extractor, &documents, &pdf_base, &cli.output);

            for skipped in &report.skipped {
                warn!(path = %skipped.path, reason = %skipped.reason, "skipped attachment");
            }

            store_fingerprints(&cli.output.join(FINGERPRINTS_FILE), &report.fingerprints)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!(
                "{} attachment(s) extracted, {} skipped",
                report.fingerprints.len(),
                report.skipped.len()
            );
        }
        Command::Sync { library } => {
            let documents = load_documents(&library)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let fingerprints = load_fingerprints(&cli.output.join(FINGERPRINTS_FILE))
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let records = build_records(&documents, &fingerprints, &cli.output)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            let snapshot_path = cli.output.join(SNAPSHOT_FILE);
            let previous = load_snapshot(&snapshot_path)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let changes = diff_snapshots(&records, &previous);

            if changes.is_empty() {
                println!("index is up to date ({} record(s))", records.len());
                return Ok(());
            }

            info!(changes = changes.len(), records = records.len(), "applying index changes");
            let outcome = apply_changes(&index, &records, &changes, &snapshot_path)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!(
                "{} record(s) upserted, {} removed at {}",
                outcome.upserted,
                outcome.removed,
                Utc::now().to_rfc3339()
            );
        }
    }

    Ok(())
}

//! Batch miner: annotate BioC files from the command line.

use anyhow::{Result, bail};
use api::server::mine_file;
use api::{AppConfig, Metrics};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

/// Mine genotype-phenotype associations from BioC JSON files
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// BioC JSON file or directory of files
    input: PathBuf,

    /// Directory for `<name>.annotated.json` outputs
    output_dir: PathBuf,

    /// Path to configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides the configured number of concurrent documents
    #[arg(long)]
    concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load_or_default(args.config.as_deref())?;
    if let Some(concurrency) = args.concurrency {
        config.concurrency.max_concurrent_documents = concurrency;
    }
    api::logging::init_tracing(&config.logging);

    let run_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("run", %run_id);
    let _guard = span.enter();

    let runner = api::build_runner(&config, Metrics::new())?;

    let cancel = runner.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; finishing documents in flight");
            cancel.store(true, Ordering::Relaxed);
        }
    });

    let files = if args.input.is_file() {
        vec![args.input.clone()]
    } else if args.input.is_dir() {
        ingest::FileReader::discover(&args.input)?
    } else {
        bail!("Input not found: {:?}", args.input);
    };
    tracing::info!(files = files.len(), mode = ?config.mode, "Starting run");

    let mut failed = 0;
    for file in &files {
        if runner.is_cancelled() {
            break;
        }
        match mine_file(&runner, file, &args.output_dir).await {
            Ok((output, documents, relations)) => {
                tracing::info!(input = ?file, output = ?output, documents, relations, "Wrote annotated file");
            }
            Err(e) => {
                tracing::error!(input = ?file, error = %e, "Failed to mine file");
                failed += 1;
            }
        }
    }

    let stats = runner.metrics().snapshot();
    println!("Files: {} ({} failed)", files.len(), failed);
    println!(
        "Documents: {} processed, {} cached, {} skipped",
        stats.documents_processed, stats.documents_cached, stats.documents_skipped
    );
    println!(
        "Tables: {} mined, {} unclassified, {} failed",
        stats.tables_mined, stats.tables_unclassified, stats.tables_failed
    );
    println!("Records: {}  Relations: {}", stats.records_found, stats.relations_emitted);
    println!("Average document time: {:.2}ms", stats.avg_document_time_ms);

    if failed > 0 {
        bail!("{} of {} files failed", failed, files.len());
    }
    Ok(())
}

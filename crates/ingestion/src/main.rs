//! AutoMarks Ingestion
//!
//! Bulk loader for extracted result documents:
//! 1. Reads every `*.json` file in the input directory
//! 2. Normalises and saves each document under one upload batch
//! 3. Writes a run summary into the export directory
//!
//! Usage: `ingestion [INPUT_DIR]` (defaults to `ingestion.input_dir`)

mod errors;
mod processor;

use automarks_common::{
    config::AppConfig, db::DbPool, ingest::BatchIngestor, metrics, Repository, VERSION,
};
use processor::IngestionProcessor;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.observability.log_level))?;
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if config.observability.json_logging {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!("Starting AutoMarks Ingestion v{}", VERSION);
    metrics::register_metrics();

    let input_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| config.ingestion.input_dir.clone());

    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    if config.database.apply_schema {
        db.apply_schema().await?;
    }
    let ingestor = BatchIngestor::new(Repository::new(db), config.ingestion.batch.as_deref())?
        .fail_fast(config.ingestion.fail_fast);

    let processor = IngestionProcessor::new(ingestor, config.export.output_dir.clone());
    let summary = processor.run(&input_dir).await?;

    info!(
        batch_id = %summary.outcome.batch_id,
        processed = summary.outcome.processed,
        failed = summary.outcome.failed,
        subjects = summary.outcome.subjects_saved,
        rejected_files = summary.rejected_files.len(),
        "Ingestion complete"
    );
    Ok(())
}

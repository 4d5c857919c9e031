//! Startup: acquire the process-wide resources every request shares.

use std::sync::Arc;
use std::time::Duration;

use crate::app_state::AppState;
use crate::config::AppConfig;
use crate::services::{
    ingest::IngestPipeline,
    job_id::JobIdGenerator,
    queue::{JobAnnouncer, QueueDeclaration, QueueError, RedisJobQueue},
    storage::{StorageError, UploadStore},
};

/// Any failure here means the process must not serve traffic.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Upload directory unavailable: {0}")]
    Storage(#[from] StorageError),

    #[error("Job queue unavailable: {0}")]
    Queue(#[from] QueueError),
}

pub async fn init(config: &AppConfig) -> Result<AppState, StartupError> {
    tracing::info!(upload_dir = %config.upload_dir, "Preparing upload directory");
    let store = UploadStore::open(&config.upload_dir).await?;

    tracing::info!(queue = %config.queue_name, "Connecting to Redis job queue");
    let queue = RedisJobQueue::connect(
        &config.redis_url,
        QueueDeclaration::durable(&config.queue_name),
        Duration::from_secs(config.redis_connect_timeout_secs),
    )
    .await?;

    let pipeline = IngestPipeline::new(
        JobIdGenerator::system(),
        store,
        JobAnnouncer::new(Arc::new(queue)),
    );

    Ok(AppState::new(pipeline))
}

/// Register descriptions for the metrics the pipeline emits.
pub fn describe_metrics() {
    metrics::describe_counter!(
        "ingest_uploads_total",
        "Upload requests by outcome (queued, rejected, save_failed, encode_failed, publish_failed)"
    );
    metrics::describe_counter!("ingest_bytes_total", "Bytes written to the upload directory");
    metrics::describe_counter!(
        "ingest_orphaned_files_total",
        "Stored uploads left on disk without a queued job"
    );
    metrics::describe_histogram!(
        "ingest_save_seconds",
        "Time to stream an upload to disk"
    );
}

use std::path::PathBuf;

use futures::Stream;

use crate::models::job::JobDescriptor;
use crate::services::job_id::JobIdGenerator;
use crate::services::queue::{AnnounceError, JobAnnouncer, QueueError};
use crate::services::storage::{StorageError, UploadStore};

/// Upload-to-queue pipeline: assign an id, store the file, announce the job.
///
/// The announcement is attempted exactly once, and only after the file is
/// complete on disk. A failed announcement does not remove the file.
pub struct IngestPipeline {
    ids: JobIdGenerator,
    store: UploadStore,
    announcer: JobAnnouncer,
}

impl IngestPipeline {
    pub fn new(ids: JobIdGenerator, store: UploadStore, announcer: JobAnnouncer) -> Self {
        Self {
            ids,
            store,
            announcer,
        }
    }

    pub fn store(&self) -> &UploadStore {
        &self.store
    }

    pub fn announcer(&self) -> &JobAnnouncer {
        &self.announcer
    }

    pub async fn ingest<S, B, E>(&self, original_name: &str, body: S) -> Result<JobDescriptor, IngestError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let job_id = self.ids.next_id();

        let stored = self
            .store
            .save(&job_id, original_name, body)
            .await
            .map_err(|source| IngestError::Storage {
                job_id: job_id.clone(),
                source,
            })?;

        tracing::info!(
            job_id = %job_id,
            path = %stored.path.display(),
            bytes = stored.bytes,
            "Upload stored"
        );

        let job = JobDescriptor::new(job_id, stored.path.to_string_lossy());

        match self.announcer.announce(&job).await {
            Ok(()) => Ok(job),
            Err(AnnounceError::Encode(source)) => Err(IngestError::Encode {
                job_id: job.job_id,
                orphan: stored.path,
                source,
            }),
            Err(AnnounceError::Publish(source)) => Err(IngestError::Publish {
                job_id: job.job_id,
                orphan: stored.path,
                source,
            }),
        }
    }
}

/// Per-request failures. Each one carries the job id it happened under;
/// failures after the save also carry the file left behind.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Job {job_id}: {source}")]
    Storage {
        job_id: String,
        #[source]
        source: StorageError,
    },

    #[error("Job {job_id}: failed to encode descriptor: {source}")]
    Encode {
        job_id: String,
        orphan: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Job {job_id}: failed to publish: {source}")]
    Publish {
        job_id: String,
        orphan: PathBuf,
        #[source]
        source: QueueError,
    },
}

impl IngestError {
    pub fn job_id(&self) -> &str {
        match self {
            Self::Storage { job_id, .. }
            | Self::Encode { job_id, .. }
            | Self::Publish { job_id, .. } => job_id,
        }
    }

    /// File stored by this request that has no queued job.
    pub fn orphaned_file(&self) -> Option<&PathBuf> {
        match self {
            Self::Storage { .. } => None,
            Self::Encode { orphan, .. } | Self::Publish { orphan, .. } => Some(orphan),
        }
    }
}

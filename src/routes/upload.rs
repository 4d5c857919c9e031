use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::app_state::AppState;
use crate::models::upload::{ErrorBody, UploadAccepted};
use crate::services::ingest::IngestError;

/// Multipart field that carries the upload.
pub const FILE_FIELD: &str = "file";

/// POST /upload — store a file and queue it for processing.
pub async fn upload_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadAccepted>), UploadError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!(error = %e, "Request is not a multipart upload");
        UploadError::MissingFile
    })?;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(UploadError::MissingFile),
            Err(e) => {
                tracing::debug!(error = %e, "Malformed multipart body");
                return Err(UploadError::MissingFile);
            }
        };

        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let original_name = match field.file_name() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => continue,
        };

        let job = state.pipeline.ingest(&original_name, field).await?;

        metrics::counter!("ingest_uploads_total", "outcome" => "queued").increment(1);
        return Ok((StatusCode::ACCEPTED, Json(UploadAccepted::queued(job.job_id))));
    }
}

/// Everything `POST /upload` can answer with besides 202.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("No file uploaded")]
    MissingFile,

    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl UploadError {
    fn outcome(&self) -> &'static str {
        match self {
            Self::MissingFile => "rejected",
            Self::Ingest(IngestError::Storage { .. }) => "save_failed",
            Self::Ingest(IngestError::Encode { .. }) => "encode_failed",
            Self::Ingest(IngestError::Publish { .. }) => "publish_failed",
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::MissingFile => (StatusCode::BAD_REQUEST, "No file uploaded"),
            Self::Ingest(IngestError::Storage { job_id, source }) => {
                tracing::error!(job_id = %job_id, error = %source, "Failed to save upload");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to save file")
            }
            Self::Ingest(IngestError::Encode { job_id, source, .. }) => {
                tracing::error!(job_id = %job_id, error = %source, "Failed to encode job");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create job")
            }
            Self::Ingest(IngestError::Publish { job_id, source, .. }) => {
                tracing::error!(job_id = %job_id, error = %source, "Failed to publish job");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to publish message")
            }
        };

        if let Self::Ingest(err) = &self {
            if let Some(orphan) = err.orphaned_file() {
                metrics::counter!("ingest_orphaned_files_total").increment(1);
                tracing::warn!(
                    event = "job_orphaned",
                    job_id = %err.job_id(),
                    orphaned_file = %orphan.display(),
                    "Stored upload has no queued job; needs reconciliation"
                );
            }
        }
        metrics::counter!("ingest_uploads_total", "outcome" => self.outcome()).increment(1);

        let body = ErrorBody {
            error: message.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

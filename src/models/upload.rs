use serde::{Deserialize, Serialize};

/// Body of a `202 Accepted` answer to `POST /upload`.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadAccepted {
    pub status: String,
    pub job_id: String,
    pub message: String,
}

impl UploadAccepted {
    pub fn queued(job_id: impl Into<String>) -> Self {
        Self {
            status: "queued".to_string(),
            job_id: job_id.into(),
            message: "File uploaded and processing started.".to_string(),
        }
    }
}

/// Error body returned by every failing upload.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

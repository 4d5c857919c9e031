use serde::{Deserialize, Serialize};

/// The unit of work announced to the queue.
///
/// Only ever built after the referenced file is fully on disk. Field order is
/// the wire order downstream workers see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Absolute path of the stored upload.
    pub file_path: String,
    pub job_id: String,
}

impl JobDescriptor {
    pub fn new(job_id: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            job_id: job_id.into(),
        }
    }
}

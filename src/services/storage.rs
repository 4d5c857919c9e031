use std::path::{Path, PathBuf};
use std::time::Instant;

use futures::{Stream, StreamExt};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Longest sanitized filename kept, in bytes. Leaves room for the job id
/// prefix and temp suffix under the usual 255-byte name limit.
const MAX_NAME_BYTES: usize = 200;

/// Name used when the client-supplied filename has no usable component.
const FALLBACK_NAME: &str = "upload";

/// Local directory that receives uploads.
pub struct UploadStore {
    root: PathBuf,
}

/// A file that has been fully written under its final name.
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Absolute path of the file.
    pub path: PathBuf,
    pub bytes: u64,
}

impl UploadStore {
    /// Create the upload directory if needed and pin its absolute path.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .await
            .map_err(|e| StorageError::io("create upload directory", dir, e))?;
        let root = fs::canonicalize(dir)
            .await
            .map_err(|e| StorageError::io("resolve upload directory", dir, e))?;

        tracing::info!(upload_dir = %root.display(), "Upload directory ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute destination for an upload. Always a direct child of the root.
    pub fn destination(&self, job_id: &str, original_name: &str) -> PathBuf {
        self.root.join(stored_file_name(job_id, original_name))
    }

    /// Stream an upload body to disk.
    ///
    /// The body lands in a hidden temp file first and is hard-linked to its
    /// final name only once complete and synced, so the final name never
    /// shows a partial file. An existing file under the final name is never
    /// replaced.
    pub async fn save<S, B, E>(
        &self,
        job_id: &str,
        original_name: &str,
        body: S,
    ) -> Result<StoredFile, StorageError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let started = Instant::now();
        let final_path = self.destination(job_id, original_name);
        let file_name = final_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path = self
            .root
            .join(format!(".{file_name}.{}.part", uuid::Uuid::new_v4()));

        // Recreate lazily in case the directory was removed after startup.
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StorageError::io("create upload directory", &self.root, e))?;

        // Removed on every exit, including when this future is dropped mid-body.
        let temp = TempUpload(temp_path);
        let written = write_body(&temp.0, body).await?;

        let linked = fs::hard_link(&temp.0, &final_path).await;
        drop(temp);
        match linked {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StorageError::Collision(final_path));
            }
            Err(e) => return Err(StorageError::io("publish stored file", &final_path, e)),
        }

        metrics::histogram!("ingest_save_seconds").record(started.elapsed().as_secs_f64());
        metrics::counter!("ingest_bytes_total").increment(written);
        tracing::debug!(job_id, path = %final_path.display(), bytes = written, "Stored upload");

        Ok(StoredFile {
            path: final_path,
            bytes: written,
        })
    }

    /// True when the upload directory is present and is a directory.
    pub async fn health_check(&self) -> bool {
        fs::metadata(&self.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }
}

async fn write_body<S, B, E>(path: &Path, body: S) -> Result<u64, StorageError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|e| StorageError::io("create temp file", path, e))?;

    let mut body = std::pin::pin!(body);
    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| StorageError::Body(e.into()))?;
        let chunk = chunk.as_ref();
        file.write_all(chunk)
            .await
            .map_err(|e| StorageError::io("write upload", path, e))?;
        written += chunk.len() as u64;
    }

    file.flush()
        .await
        .map_err(|e| StorageError::io("flush upload", path, e))?;
    file.sync_all()
        .await
        .map_err(|e| StorageError::io("sync upload", path, e))?;
    Ok(written)
}

/// Partial upload under its hidden temp name; unlinked on drop.
struct TempUpload(PathBuf);

impl Drop for TempUpload {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.0) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.0.display(), error = %e, "Failed to remove temp file");
            }
        }
    }
}

/// `<job_id>_<sanitized name>`.
pub fn stored_file_name(job_id: &str, original_name: &str) -> String {
    format!("{job_id}_{}", sanitize_file_name(original_name))
}

/// Reduce a client-supplied filename to a single safe path component.
///
/// Keeps the last non-empty segment after splitting on both `/` and `\`,
/// drops control characters and caps the length. Empty, `.` and `..`
/// collapse to a fixed fallback name.
pub fn sanitize_file_name(raw: &str) -> String {
    let base = raw
        .rsplit(|c| c == '/' || c == '\\')
        .find(|segment| !segment.is_empty())
        .unwrap_or("");
    let cleaned: String = base.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();

    let mut end = cleaned.len().min(MAX_NAME_BYTES);
    while !cleaned.is_char_boundary(end) {
        end -= 1;
    }

    match &cleaned[..end] {
        "" | "." | ".." => FALLBACK_NAME.to_string(),
        name => name.to_string(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to {action} at {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Upload body interrupted: {0}")]
    Body(Box<dyn std::error::Error + Send + Sync>),

    #[error("Refusing to overwrite existing file {}", .0.display())]
    Collision(PathBuf),
}

impl StorageError {
    fn io(action: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

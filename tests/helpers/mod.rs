//! Test helper utilities shared by the gateway test suites

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ingest_gateway::{
    app_state::AppState,
    routes,
    services::{
        ingest::IngestPipeline,
        job_id::{Clock, JobIdGenerator},
        queue::{JobAnnouncer, JobPublisher, QueueError},
        storage::UploadStore,
    },
};
use metrics_exporter_prometheus::PrometheusHandle;
use reqwest::multipart;
use serde::{Deserialize, Serialize};

/// Body limit every test gateway runs with.
pub const UPLOAD_LIMIT: usize = 1024 * 1024;

/// Response body from POST /upload, success or failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadBody {
    pub status: Option<String>,
    pub job_id: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
}

/// Clock the tests move by hand.
pub struct TestClock(AtomicI64);

impl TestClock {
    pub fn at(secs: i64) -> Arc<Self> {
        Arc::new(Self(AtomicI64::new(secs)))
    }

    pub fn advance(&self, secs: i64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for TestClock {
    fn unix_seconds(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// In-memory broker that records every payload and can be switched off.
#[derive(Default)]
pub struct MemoryQueue {
    messages: Mutex<Vec<String>>,
    down: AtomicBool,
}

impl MemoryQueue {
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobPublisher for MemoryQueue {
    async fn publish(&self, payload: &str) -> Result<(), QueueError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(QueueError::Unavailable("connection closed".to_string()));
        }
        self.messages.lock().unwrap().push(payload.to_string());
        Ok(())
    }

    async fn health_check(&self) -> Result<(), QueueError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(QueueError::Unavailable("connection closed".to_string()));
        }
        Ok(())
    }
}

/// A gateway served on an ephemeral local port.
pub struct TestGateway {
    pub base_url: String,
    pub upload_dir: PathBuf,
    pub queue: Arc<MemoryQueue>,
    pub clock: Arc<TestClock>,
    _tmp: tempfile::TempDir,
}

impl TestGateway {
    pub async fn start(now: i64) -> Self {
        Self::start_with_metrics(now, None).await
    }

    /// Like `start`, also mounting `/metrics` for the given handle.
    pub async fn start_with_metrics(now: i64, prometheus: Option<Arc<PrometheusHandle>>) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let store = UploadStore::open(tmp.path().join("temp-uploads")).await.unwrap();
        let upload_dir = store.root().to_path_buf();

        let queue = Arc::new(MemoryQueue::default());
        let clock = TestClock::at(now);
        let pipeline = IngestPipeline::new(
            JobIdGenerator::new(clock.clone()),
            store,
            JobAnnouncer::new(queue.clone()),
        );
        let app = routes::router(AppState::new(pipeline), UPLOAD_LIMIT, prometheus);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            upload_dir,
            queue,
            clock,
            _tmp: tmp,
        }
    }

    /// Names of the files currently in the upload directory, sorted.
    pub fn stored_files(&self) -> Vec<String> {
        list_dir(&self.upload_dir)
    }
}

pub fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

/// Upload `data` as the `file` part with the given client filename.
pub async fn upload_bytes(
    client: &reqwest::Client,
    base_url: &str,
    filename: &str,
    data: Vec<u8>,
) -> Result<(reqwest::StatusCode, UploadBody), Box<dyn std::error::Error>> {
    let form = multipart::Form::new().part(
        "file",
        multipart::Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str("application/octet-stream")?,
    );
    send_form(client, base_url, form).await
}

/// POST an arbitrary multipart form to /upload.
pub async fn send_form(
    client: &reqwest::Client,
    base_url: &str,
    form: multipart::Form,
) -> Result<(reqwest::StatusCode, UploadBody), Box<dyn std::error::Error>> {
    let response = client
        .post(format!("{}/upload", base_url))
        .multipart(form)
        .send()
        .await?;

    let status = response.status();
    let body = response.json::<UploadBody>().await?;
    Ok((status, body))
}

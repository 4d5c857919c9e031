use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::models::job::JobDescriptor;

pub const JOB_CONTENT_TYPE: &str = "application/json";

/// Properties a work queue is declared with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueDeclaration {
    pub name: String,
    pub durable: bool,
    pub exclusive: bool,
    pub auto_delete: bool,
    pub content_type: &'static str,
}

impl QueueDeclaration {
    /// Durable, shared, never auto-deleted queue carrying JSON jobs.
    pub fn durable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            durable: true,
            exclusive: false,
            auto_delete: false,
            content_type: JOB_CONTENT_TYPE,
        }
    }

    fn meta_key(&self) -> String {
        format!("{}:meta", self.name)
    }
}

/// Broker seam used by the announcer. Implementations are shared by every
/// in-flight request and must tolerate concurrent `publish` calls.
#[async_trait]
pub trait JobPublisher: Send + Sync {
    /// Hand one encoded job to the broker for persistent delivery.
    async fn publish(&self, payload: &str) -> Result<(), QueueError>;

    async fn health_check(&self) -> Result<(), QueueError>;
}

/// Redis-backed durable work queue.
///
/// Holds the single connection opened at startup. The multiplexed connection
/// pipelines commands from cloned handles over one socket, so concurrent
/// publishers never interleave frames. It is not re-established if dropped.
pub struct RedisJobQueue {
    conn: MultiplexedConnection,
    declaration: QueueDeclaration,
}

impl RedisJobQueue {
    /// Connect, verify the broker answers and declare the queue.
    ///
    /// The whole handshake must finish within `timeout`; a broker that
    /// accepts the connection but never replies counts as unreachable.
    pub async fn connect(
        redis_url: &str,
        declaration: QueueDeclaration,
        timeout: Duration,
    ) -> Result<Self, QueueError> {
        tokio::time::timeout(timeout, Self::establish(redis_url, declaration))
            .await
            .map_err(|_| QueueError::Timeout(timeout))?
    }

    async fn establish(redis_url: &str, declaration: QueueDeclaration) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url).map_err(QueueError::Redis)?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;

        let queue = Self { conn, declaration };
        queue.health_check().await?;
        queue.declare().await?;
        Ok(queue)
    }

    /// Record the queue's properties next to it. Idempotent.
    async fn declare(&self) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let decl = &self.declaration;
        let fields = [
            ("durable", flag(decl.durable)),
            ("exclusive", flag(decl.exclusive)),
            ("auto_delete", flag(decl.auto_delete)),
            ("content_type", decl.content_type),
        ];
        conn.hset_multiple::<_, _, _, ()>(decl.meta_key(), &fields[..])
            .await
            .map_err(QueueError::Redis)?;

        if decl.durable {
            self.warn_if_not_persistent().await;
        }

        tracing::info!(
            queue = %decl.name,
            durable = decl.durable,
            "Declared job queue"
        );
        Ok(())
    }

    /// A durable queue only survives a broker restart when the broker
    /// writes to disk. Managed deployments often forbid CONFIG, so failure
    /// to ask is not an error.
    async fn warn_if_not_persistent(&self) {
        let mut conn = self.conn.clone();
        let reply: Result<Vec<String>, _> = redis::cmd("CONFIG")
            .arg("GET")
            .arg("appendonly")
            .query_async(&mut conn)
            .await;

        match reply {
            Ok(pair) if pair.get(1).map(String::as_str) == Some("yes") => {}
            Ok(_) => tracing::warn!(
                queue = %self.declaration.name,
                "Redis appendonly is off; queued jobs rely on RDB snapshots to survive a restart"
            ),
            Err(e) => tracing::debug!(error = %e, "Could not read Redis persistence settings"),
        }
    }
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

#[async_trait]
impl JobPublisher for RedisJobQueue {
    async fn publish(&self, payload: &str) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(&self.declaration.name, payload)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }
}

/// Publishes job descriptors on the work queue.
pub struct JobAnnouncer {
    publisher: Arc<dyn JobPublisher>,
}

impl JobAnnouncer {
    pub fn new(publisher: Arc<dyn JobPublisher>) -> Self {
        Self { publisher }
    }

    /// Compact JSON, `file_path` then `job_id`.
    pub fn encode(job: &JobDescriptor) -> Result<String, AnnounceError> {
        serde_json::to_string(job).map_err(AnnounceError::Encode)
    }

    /// Encode and publish exactly once. No retry.
    pub async fn announce(&self, job: &JobDescriptor) -> Result<(), AnnounceError> {
        let payload = Self::encode(job)?;
        self.publisher
            .publish(&payload)
            .await
            .map_err(AnnounceError::Publish)?;
        tracing::info!(job_id = %job.job_id, payload = %payload, "Job announced");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), QueueError> {
        self.publisher.health_check().await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    #[error("Broker did not answer within {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, thiserror::Error)]
pub enum AnnounceError {
    #[error("Failed to encode job: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to publish job: {0}")]
    Publish(#[source] QueueError),
}

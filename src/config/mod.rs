use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Redis connection string, credentials included (e.g., "redis://:secret@host:6379/").
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Directory uploads are written to. Relative paths resolve against the working directory.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,

    /// Seconds allowed for connecting to Redis and declaring the queue at startup.
    #[serde(default = "default_redis_connect_timeout_secs")]
    pub redis_connect_timeout_secs: u64,

    /// Name of the durable work queue jobs are announced on.
    #[serde(default = "default_queue_name")]
    pub queue_name: String,

    /// Largest request body accepted by `POST /upload`.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379/".to_string()
}

fn default_redis_connect_timeout_secs() -> u64 {
    5
}

fn default_upload_dir() -> String {
    "./temp-uploads".to_string()
}

fn default_queue_name() -> String {
    "rag_jobs".to_string()
}

fn default_max_upload_bytes() -> usize {
    64 * 1024 * 1024
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Build from an explicit set of key/value pairs instead of the process environment.
    pub fn from_vars<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter(vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_apply_when_unset() {
        let config = AppConfig::from_vars(vars(&[])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.redis_url, "redis://127.0.0.1:6379/");
        assert_eq!(config.redis_connect_timeout_secs, 5);
        assert_eq!(config.upload_dir, "./temp-uploads");
        assert_eq!(config.queue_name, "rag_jobs");
        assert_eq!(config.max_upload_bytes, 64 * 1024 * 1024);
    }

    #[test]
    fn test_overrides_from_environment_keys() {
        let config = AppConfig::from_vars(vars(&[
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("QUEUE_NAME", "pdf_jobs"),
            ("MAX_UPLOAD_BYTES", "1024"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.queue_name, "pdf_jobs");
        assert_eq!(config.max_upload_bytes, 1024);
    }

    #[test]
    fn test_malformed_number_is_rejected() {
        let result = AppConfig::from_vars(vars(&[("MAX_UPLOAD_BYTES", "lots")]));
        assert!(result.is_err());
    }
}

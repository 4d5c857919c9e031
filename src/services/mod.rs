pub mod ingest;
pub mod job_id;
pub mod queue;
pub mod storage;

//! Ingestion gateway
//!
//! Accepts file uploads over HTTP, writes them to a local upload directory
//! and announces each stored file as a job on a durable Redis work queue for
//! downstream workers.

pub mod app_state;
pub mod bootstrap;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;

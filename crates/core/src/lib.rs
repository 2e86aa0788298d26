//! Core types and shared functionality for crawlgate.
//!
//! This crate provides:
//! - Generation-versioned response cache with SQLite backend
//! - Unified error types
//! - Configuration structures
//! - The request descriptor consumed by the classifier, relay and cache agent

pub mod cache;
pub mod config;
pub mod error;
pub mod request;

pub use cache::{CacheDb, Generation, RequestKey, StoredResponse};
pub use config::{AgentConfig, AppConfig, ConfigError};
pub use error::Error;
pub use request::RequestDescriptor;

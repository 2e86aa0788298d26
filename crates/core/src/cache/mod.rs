//! SQLite-backed, generation-versioned response cache.
//!
//! This module provides persistent storage for the offline cache agent using
//! SQLite with async access via tokio-rusqlite. It supports:
//!
//! - Named cache generations, each an independent request -> response map
//! - Entries keyed by a SHA-256 of the canonical request (method + URL)
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//!
//! Every statement runs on the single connection thread, so writes to the
//! same key are applied one after another and the last upsert wins.

pub mod connection;
pub mod generation;
pub mod key;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheDb;
pub use generation::{Generation, StoredResponse};
pub use key::RequestKey;

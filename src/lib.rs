//! In-memory aggregation of a push-based sports odds feed.
//!
//! Raw envelopes go in through [`Engine::ingest`]; assembled match views and
//! live per-entity channels come out.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod projection;
pub mod state;
pub mod types;
pub mod wire;
pub mod ws;

pub use engine::{Engine, IngestMode, IngestReport};

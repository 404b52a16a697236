//! Agency client for the national lottery bet server.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod protocol;
pub mod transport;
pub mod source;
pub mod engine;
pub mod shutdown;
pub mod telemetry;

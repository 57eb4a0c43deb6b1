//! Courier - one-request-per-connection HTTP/1.x server
//!
//! Core library: incremental request parsing, the per-connection state
//! machine and the accept loop that drives it.

pub mod config;
pub mod http;
pub mod server;

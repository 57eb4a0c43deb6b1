//! HTTP protocol implementation.
//!
//! This module implements an HTTP/1.x server connection that answers exactly
//! one request and then closes. There is no keep-alive, no pipelining and no
//! chunked transfer-encoding.
//!
//! # Architecture
//!
//! - **`connection`**: The per-connection state machine and the task loop driving it
//! - **`parser`**: Incremental request-header parser fed one read at a time
//! - **`request`**: Request representation, `Content-Length` framing rules
//! - **`response`**: Response representation, builder and stock replies
//! - **`writer`**: Serializes and writes HTTP responses to the client
//! - **`handler`**: The application callback seam
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌──────────────────┐
//!        │ AwaitingHeaders  │ ← Incomplete: read again
//!        └──────┬───────────┘
//!               │ Headers complete
//!               ├─ method not P*, or Content-Length: 0 ─────────┐
//!               ├─ P* without a valid Content-Length → 400 ─────┤
//!               ▼                                               │
//!        ┌──────────────────┐                                   │
//!        │   ReadingBody    │ ← remaining > 0: read again       │
//!        └──────┬───────────┘                                   │
//!               │ remaining == 0                                │
//!               ▼                                               │
//!        ┌──────────────────┐                                   │
//!        │    Handling      │ ← Handler fills the response ◄────┘
//!        └──────┬───────────┘
//!               ▼
//!        ┌──────────────────┐
//!        │    Writing       │ ← Send response to client
//!        └──────┬───────────┘
//!               │ Response sent: half-close receive side
//!               ▼
//!            Closed            (any read/write error jumps here directly)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use courier::http::connection::Connection;
//! use courier::http::response::Response;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!     let handler = Arc::new(|_req: &_, resp: &mut Response| {
//!         *resp = Response::ok("hello\n");
//!         Ok(())
//!     });
//!
//!     loop {
//!         let (socket, peer) = listener.accept().await?;
//!         let conn = Connection::new(socket, Arc::clone(&handler)).with_peer(peer);
//!         tokio::spawn(async move {
//!             if let Err(e) = conn.run().await {
//!                 eprintln!("Connection error: {}", e);
//!             }
//!         });
//!     }
//! }
//! ```

pub mod connection;
pub mod handler;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;

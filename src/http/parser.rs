//! Incremental request-header parser.
//!
//! Reads may split a header block anywhere, so the parser keeps every header
//! byte it has seen and re-runs `httparse` over the accumulated bytes until
//! the blank line shows up.

use bytes::BytesMut;
use httparse::Status;
use tracing::trace;

use crate::http::request::{Header, Method, Request};

/// Maximum number of headers allowed in a request
pub const MAX_HEADERS: usize = 64;

/// Maximum size in bytes allowed for the request line plus header block
pub const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Outcome of feeding one chunk to the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    /// The header block is complete and has been written into the request.
    Complete,
    /// The bytes can never form a valid request header.
    Failed,
    /// More bytes are needed; call again with the next chunk.
    Incomplete,
}

/// Carried parse state for one request.
#[derive(Debug, Default)]
pub struct RequestParser {
    buffered: BytesMut,
}

impl RequestParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of header bytes held from earlier chunks.
    #[cfg(test)]
    fn buffered_len(&self) -> usize {
        self.buffered.len()
    }

    /// Feeds `chunk` to the parser.
    ///
    /// Returns the status and a cursor into `chunk`: on `Complete` it is the
    /// offset of the first body byte, otherwise it is `chunk.len()`.
    pub fn parse(&mut self, request: &mut Request, chunk: &[u8]) -> (ParseStatus, usize) {
        let prior = self.buffered.len();
        self.buffered.extend_from_slice(chunk);

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut req = httparse::Request::new(&mut headers);

        let status = match req.parse(&self.buffered) {
            Ok(Status::Complete(header_len)) if header_len > MAX_HEADER_BYTES => {
                trace!(header_len, "header block exceeds limit");
                return (ParseStatus::Failed, chunk.len());
            }
            Ok(Status::Complete(header_len)) => match fill_request(request, &req) {
                Some(()) => Ok(header_len),
                None => return (ParseStatus::Failed, chunk.len()),
            },
            Ok(Status::Partial) if self.buffered.len() > MAX_HEADER_BYTES => {
                trace!(buffered = self.buffered.len(), "header block exceeds limit");
                return (ParseStatus::Failed, chunk.len());
            }
            Ok(Status::Partial) => Err(ParseStatus::Incomplete),
            Err(e) => {
                trace!(error = %e, "malformed request header");
                Err(ParseStatus::Failed)
            }
        };

        match status {
            Ok(header_len) => {
                // The terminating blank line cannot sit in an earlier chunk,
                // otherwise that chunk would already have completed.
                let cursor = header_len.saturating_sub(prior).min(chunk.len());
                self.buffered = BytesMut::new();
                (ParseStatus::Complete, cursor)
            }
            Err(status) => (status, chunk.len()),
        }
    }
}

fn fill_request(request: &mut Request, parsed: &httparse::Request<'_, '_>) -> Option<()> {
    let mut headers = Vec::with_capacity(parsed.headers.len());
    for h in parsed.headers.iter() {
        let value = std::str::from_utf8(h.value).ok()?;
        headers.push(Header {
            name: h.name.to_string(),
            value: value.to_string(),
        });
    }

    request.method = Method::from_token(parsed.method?);
    request.path = parsed.path?.to_string();
    request.version = parsed.version?;
    request.headers = headers;
    Some(())
}

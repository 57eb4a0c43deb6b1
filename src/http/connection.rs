use std::io;
use std::net::{Shutdown, SocketAddr};
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, error, info, warn};

use crate::config::DEFAULT_READ_BUFFER_SIZE;
use crate::http::handler::Handler;
use crate::http::parser::{ParseStatus, RequestParser};
use crate::http::request::{ProtocolError, Request};
use crate::http::response::{Response, StatusCode};
use crate::http::writer::{serialize_response, ResponseWriter};

/// Where a connection is in its single request/response exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Reading until the header block is complete.
    AwaitingHeaders,
    /// Headers are parsed; `remaining` body bytes are still expected.
    ReadingBody { remaining: usize },
    /// The handler is running.
    Handling,
    /// The response is being written.
    Writing,
    /// Nothing more will be read or written.
    Closed,
}

/// The I/O step a connection must perform next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Read into the window and report it with [`Exchange::on_read`].
    Read,
    /// Write these bytes and report it with [`Exchange::on_write_complete`].
    Write(Bytes),
    /// Half-close the receive side, then stop.
    Shutdown,
    /// Stop without further I/O.
    Close,
}

/// Transport-level failures. All of them end the connection without a reply.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("peer closed the connection")]
    PeerClosed,

    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    #[error("write failed: {0}")]
    Write(#[source] io::Error),
}

/// The request/response state machine of one connection, without any I/O.
///
/// Each `on_*` method takes one completion event, applies the transition and
/// returns the next [`Action`]. The caller owns the socket and performs the
/// actions; this keeps every transition testable without a network.
#[derive(Debug)]
pub struct Exchange {
    state: ConnectionState,
    parser: RequestParser,
    request: Request,
    response: Response,
}

impl Default for Exchange {
    fn default() -> Self {
        Self::new()
    }
}

impl Exchange {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::AwaitingHeaders,
            parser: RequestParser::new(),
            request: Request::default(),
            response: Response::default(),
        }
    }

    /// Records the peer on the request being assembled.
    pub fn set_peer(&mut self, peer: SocketAddr) {
        self.request.source = peer.ip().to_string();
        self.request.source_port = peer.port();
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    /// A read completed with `chunk` (never empty: EOF is a transport error).
    pub fn on_read<H>(&mut self, chunk: &[u8], handler: &H) -> Action
    where
        H: Handler + ?Sized,
    {
        match self.state {
            ConnectionState::AwaitingHeaders => self.on_header_bytes(chunk, handler),
            ConnectionState::ReadingBody { remaining } => {
                self.on_body_bytes(remaining, chunk, handler)
            }
            state => {
                warn!(?state, "read completion outside of a read state");
                self.state = ConnectionState::Closed;
                Action::Close
            }
        }
    }

    /// The whole response has been written.
    pub fn on_write_complete(&mut self) -> Action {
        match self.state {
            ConnectionState::Writing => {
                self.state = ConnectionState::Closed;
                Action::Shutdown
            }
            state => {
                warn!(?state, "write completion outside of the writing state");
                self.state = ConnectionState::Closed;
                Action::Close
            }
        }
    }

    /// A read or write failed. No response is attempted.
    pub fn on_transport_error(&mut self) -> Action {
        self.state = ConnectionState::Closed;
        Action::Close
    }

    fn on_header_bytes<H>(&mut self, chunk: &[u8], handler: &H) -> Action
    where
        H: Handler + ?Sized,
    {
        let (status, cursor) = self.parser.parse(&mut self.request, chunk);
        match status {
            ParseStatus::Incomplete => Action::Read,
            ParseStatus::Failed => self.reject(ProtocolError::MalformedHeader),
            ParseStatus::Complete if !self.request.expects_body() => self.dispatch(handler),
            ParseStatus::Complete => match self.request.content_length() {
                // Body bytes that arrived together with the headers count
                // towards the declared length before anything else is read.
                Ok(declared) => self.on_body_bytes(declared, &chunk[cursor..], handler),
                Err(err) => self.reject(err),
            },
        }
    }

    fn on_body_bytes<H>(&mut self, remaining: usize, chunk: &[u8], handler: &H) -> Action
    where
        H: Handler + ?Sized,
    {
        // Anything past the declared length is dropped.
        let take = remaining.min(chunk.len());
        self.request.body.extend_from_slice(&chunk[..take]);

        match remaining - take {
            0 => self.dispatch(handler),
            remaining => {
                self.state = ConnectionState::ReadingBody { remaining };
                Action::Read
            }
        }
    }

    fn dispatch<H>(&mut self, handler: &H) -> Action
    where
        H: Handler + ?Sized,
    {
        self.state = ConnectionState::Handling;

        let mut response = Response::default();
        self.response = match handler.handle(&self.request, &mut response) {
            Ok(()) => response,
            Err(e) => {
                error!(
                    error = %e,
                    method = %self.request.method,
                    path = %self.request.path,
                    "handler failed"
                );
                Response::stock_reply(StatusCode::InternalServerError)
            }
        };

        info!(
            method = %self.request.method,
            path = %self.request.path,
            body_len = self.request.body.len(),
            status = self.response.status.as_u16(),
            "request handled"
        );
        self.write()
    }

    fn reject(&mut self, err: ProtocolError) -> Action {
        debug!(error = %err, "rejecting request");
        self.response = Response::stock_reply(StatusCode::BadRequest);
        self.write()
    }

    fn write(&mut self) -> Action {
        self.state = ConnectionState::Writing;
        Action::Write(serialize_response(&self.response))
    }
}

/// A byte stream a [`Connection`] can run on.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {
    /// Shuts down the receive direction only.
    fn shutdown_receive(&self) -> io::Result<()>;
}

impl Transport for TcpStream {
    fn shutdown_receive(&self) -> io::Result<()> {
        socket2::SockRef::from(self).shutdown(Shutdown::Read)
    }
}

/// One accepted connection: reads one request, writes one response, closes.
///
/// `run` consumes the connection, so it is dropped as soon as the task
/// driving it finishes.
pub struct Connection<T, H: ?Sized> {
    transport: T,
    window: Box<[u8]>,
    exchange: Exchange,
    handler: Arc<H>,
}

impl<T, H> Connection<T, H>
where
    T: Transport,
    H: Handler + ?Sized,
{
    pub fn new(transport: T, handler: Arc<H>) -> Self {
        Self::with_window(transport, handler, DEFAULT_READ_BUFFER_SIZE)
    }

    /// Uses a read window of `window_size` bytes (at least one).
    pub fn with_window(transport: T, handler: Arc<H>, window_size: usize) -> Self {
        Self {
            transport,
            window: vec![0u8; window_size.max(1)].into_boxed_slice(),
            exchange: Exchange::new(),
            handler,
        }
    }

    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.exchange.set_peer(peer);
        self
    }

    pub async fn run(mut self) -> Result<(), ConnectionError> {
        let mut action = Action::Read;

        loop {
            action = match action {
                Action::Read => match self.transport.read(&mut self.window[..]).await {
                    Ok(0) => return self.abort(ConnectionError::PeerClosed),
                    Ok(n) => self.exchange.on_read(&self.window[..n], &*self.handler),
                    Err(e) => return self.abort(ConnectionError::Read(e)),
                },
                Action::Write(buffer) => {
                    let mut writer = ResponseWriter::new(buffer);
                    match writer.write_to_stream(&mut self.transport).await {
                        Ok(()) => self.exchange.on_write_complete(),
                        Err(e) => return self.abort(ConnectionError::Write(e)),
                    }
                }
                Action::Shutdown => {
                    if let Err(e) = self.transport.shutdown_receive() {
                        debug!(error = %e, "receive shutdown failed");
                    }
                    Action::Close
                }
                Action::Close => return Ok(()),
            };
        }
    }

    fn abort(&mut self, err: ConnectionError) -> Result<(), ConnectionError> {
        self.exchange.on_transport_error();
        Err(err)
    }
}

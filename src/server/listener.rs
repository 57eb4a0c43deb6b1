use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::ServerConfig;
use crate::http::connection::{Connection, Transport};
use crate::http::handler::Handler;

/// Pause after a failed accept before trying again. Running out of file
/// descriptors makes `accept` fail immediately, so retrying at once would spin.
pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Source of incoming connections for a [`Server`].
pub trait Listener: Send + Sync + 'static {
    type Stream: Transport + 'static;

    fn accept(&self) -> impl Future<Output = io::Result<(Self::Stream, SocketAddr)>> + Send;

    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// Applies low-latency socket options to a freshly accepted stream.
    fn set_nodelay(stream: &Self::Stream) -> io::Result<()>;
}

impl Listener for TcpListener {
    type Stream = TcpStream;

    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpListener::local_addr(self)
    }

    fn set_nodelay(stream: &TcpStream) -> io::Result<()> {
        stream.set_nodelay(true)
    }
}

/// Accepts connections and runs each one on its own task.
///
/// Every task owns its [`Connection`]; the join set is the only thing that
/// keeps it alive, and a connection is dropped as soon as its task returns.
pub struct Server<H: ?Sized, L = TcpListener> {
    listener: L,
    handler: Arc<H>,
    read_buffer_size: usize,
    tcp_nodelay: bool,
}

impl<H: Handler> Server<H, TcpListener> {
    pub async fn bind(cfg: &ServerConfig, handler: H) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(&cfg.listen_addr).await?;
        info!("Listening on {}", listener.local_addr()?);
        Ok(Self::from_listener(listener, cfg, handler))
    }
}

impl<H: Handler, L: Listener> Server<H, L> {
    /// Serves on an already bound listener; `cfg.listen_addr` is ignored.
    pub fn from_listener(listener: L, cfg: &ServerConfig, handler: H) -> Self {
        Self {
            listener,
            handler: Arc::new(handler),
            read_buffer_size: cfg.read_buffer_size,
            tcp_nodelay: cfg.tcp_nodelay,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop forever. Accept errors are logged and retried
    /// after [`ACCEPT_BACKOFF`].
    pub async fn serve(self) {
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((socket, peer)) => self.spawn(&mut tasks, socket, peer),
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },

                Some(finished) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = finished {
                        if e.is_panic() {
                            error!(error = %e, "connection task panicked");
                        }
                    }
                }
            }
        }
    }

    fn spawn(&self, tasks: &mut JoinSet<()>, socket: L::Stream, peer: SocketAddr) {
        debug!("Accepted connection from {}", peer);

        if self.tcp_nodelay {
            if let Err(e) = L::set_nodelay(&socket) {
                warn!(%peer, error = %e, "failed to set TCP_NODELAY");
            }
        }

        let conn = Connection::with_window(socket, Arc::clone(&self.handler), self.read_buffer_size)
            .with_peer(peer);

        tasks.spawn(
            async move {
                if let Err(e) = conn.run().await {
                    debug!(error = %e, "connection aborted");
                }
            }
            .instrument(info_span!("connection", %peer)),
        );
    }
}

/// Binds `cfg.listen_addr` and serves; only a bind failure returns.
pub async fn run<H: Handler>(cfg: &ServerConfig, handler: H) -> anyhow::Result<()> {
    Server::bind(cfg, handler).await?.serve().await;
    Ok(())
}

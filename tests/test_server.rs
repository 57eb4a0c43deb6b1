use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use courier::config::ServerConfig;
use courier::http::request::Request;
use courier::http::response::Response;
use courier::server::listener::{Listener, Server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

fn echo(req: &Request, resp: &mut Response) -> anyhow::Result<()> {
    resp.set_header("X-Source", req.source.clone());
    resp.body = req.body.to_vec();
    Ok(())
}

fn loopback_config(read_buffer_size: usize) -> ServerConfig {
    ServerConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        read_buffer_size,
        tcp_nodelay: true,
    }
}

async fn start(read_buffer_size: usize) -> std::net::SocketAddr {
    let cfg = loopback_config(read_buffer_size);
    let server = Server::bind(&cfg, echo).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.serve());
    addr
}

/// Sends `parts` with small pauses in between and returns everything the
/// server wrote before closing.
async fn exchange(addr: std::net::SocketAddr, parts: &[&[u8]]) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    for part in parts {
        stream.write_all(part).await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let mut out = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut out))
        .await
        .expect("server did not close the connection")
        .unwrap();
    String::from_utf8(out).unwrap()
}

#[tokio::test]
async fn test_get_round_trip() {
    let addr = start(1024).await;

    let reply = exchange(addr, &[b"GET / HTTP/1.1\r\nHost: x\r\n\r\n"]).await;

    assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(reply.contains("X-Source: 127.0.0.1\r\n"));
}

#[tokio::test]
async fn test_streamed_post_body() {
    let addr = start(1024).await;

    let reply = exchange(
        addr,
        &[b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\n", b"12345", b"67890"],
    )
    .await;

    assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(reply.ends_with("\r\n\r\n1234567890"));
}

#[tokio::test]
async fn test_small_window_large_body() {
    let addr = start(16).await;
    let body = "z".repeat(5000);
    let request = format!("PUT /blob HTTP/1.1\r\nContent-Length: {}\r\n\r\n{}", body.len(), body);

    let reply = exchange(addr, &[request.as_bytes()]).await;

    assert!(reply.contains("Content-Length: 5000\r\n"));
    assert!(reply.ends_with(&body));
}

#[tokio::test]
async fn test_missing_content_length_gets_400() {
    let addr = start(1024).await;

    let reply = exchange(addr, &[b"POST / HTTP/1.1\r\n\r\n"]).await;

    assert!(reply.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert!(reply.ends_with("400 Bad Request"));
}

#[tokio::test]
async fn test_malformed_request_gets_400() {
    let addr = start(1024).await;

    let reply = exchange(addr, &[b"NOT A REQUEST\r\n\r\n"]).await;

    assert!(reply.starts_with("HTTP/1.1 400 Bad Request\r\n"));
}

#[tokio::test]
async fn test_server_survives_aborted_connection() {
    let addr = start(1024).await;

    let stream = TcpStream::connect(addr).await.unwrap();
    drop(stream);

    let reply = exchange(addr, &[b"GET / HTTP/1.1\r\n\r\n"]).await;
    assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"));
}

/// Fails the first `failures` accepts with EMFILE, then behaves normally.
struct ExhaustedListener {
    inner: TcpListener,
    failures: AtomicUsize,
    attempts: std::sync::Arc<AtomicUsize>,
}

impl Listener for ExhaustedListener {
    type Stream = TcpStream;

    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            // EMFILE: too many open files
            return Err(io::Error::from_raw_os_error(24));
        }
        self.inner.accept().await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    fn set_nodelay(stream: &TcpStream) -> io::Result<()> {
        stream.set_nodelay(true)
    }
}

#[tokio::test]
async fn test_accept_errors_do_not_stop_the_server() {
    let attempts = std::sync::Arc::new(AtomicUsize::new(0));
    let listener = ExhaustedListener {
        inner: TcpListener::bind("127.0.0.1:0").await.unwrap(),
        failures: AtomicUsize::new(3),
        attempts: std::sync::Arc::clone(&attempts),
    };
    let server = Server::from_listener(listener, &loopback_config(1024), echo);
    let addr = server.local_addr().unwrap();
    let serving = tokio::spawn(server.serve());

    let reply = exchange(addr, &[b"GET / HTTP/1.1\r\n\r\n"]).await;

    assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(attempts.load(Ordering::SeqCst) >= 4);
    assert!(!serving.is_finished());
    serving.abort();
}

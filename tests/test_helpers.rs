//! Shared scaffolding for the integration tests: spin up a real
//! `CheckersServer` on an ephemeral loopback port and give each test plain
//! `TcpStream` read/write helpers for the line protocol.

#![allow(dead_code)]

use std::time::Duration;

use checkers_server::codec::{self, OpCode};
use checkers_server::config::Limits;
use checkers_server::server::CheckersServer;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

/// Start a server with the default `Limits` and return its bound address.
pub async fn start_test_server() -> std::net::SocketAddr {
    start_test_server_with_limits(Limits::default()).await
}

/// Start a server with custom `Limits` (tests that need a tight heartbeat
/// or a small `max_violations` override the defaults here).
pub async fn start_test_server_with_limits(limits: Limits) -> std::net::SocketAddr {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = CheckersServer::new(limits);
    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });

    // Give the acceptor loop a moment to start polling.
    tokio::time::sleep(Duration::from_millis(20)).await;
    addr
}

/// A connected test client speaking the raw line protocol.
pub struct TestClient {
    stream: TcpStream,
    buf: Vec<u8>,
}

impl TestClient {
    pub async fn connect(addr: std::net::SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        TestClient {
            stream,
            buf: Vec::new(),
        }
    }

    pub async fn send(&mut self, op: OpCode, data: &str) {
        let frame = codec::encode(op, data).unwrap();
        self.stream.write_all(&frame).await.unwrap();
    }

    /// Send raw, already-framed bytes (for malformed-frame tests).
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
    }

    /// Read the next complete `\n`-terminated frame, waiting up to 2s.
    pub async fn recv(&mut self) -> codec::Frame {
        timeout(Duration::from_secs(2), self.recv_inner())
            .await
            .expect("timed out waiting for a frame")
    }

    async fn recv_inner(&mut self) -> codec::Frame {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.buf.drain(..=pos).collect();
                return codec::decode(&line[..line.len() - 1]).unwrap();
            }
            let mut chunk = [0u8; 4096];
            let n = self.stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "peer closed before a full frame arrived");
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    /// Read frames until one with this opcode shows up, skipping others.
    /// A stray `Ping` encountered while waiting for some other opcode is
    /// answered with `Pong`, the way a well-behaved client would, so a
    /// test client that sits in `recv_op` across several server ticks
    /// doesn't get reaped by its own missed-pong accounting. Callers that
    /// want to observe a `Ping` frame itself should pass `OpCode::Ping`,
    /// which returns immediately without auto-replying.
    pub async fn recv_op(&mut self, op: OpCode) -> codec::Frame {
        loop {
            let frame = self.recv().await;
            if frame.op == op {
                return frame;
            }
            if frame.op == OpCode::Ping {
                self.send(OpCode::Pong, "").await;
            }
        }
    }

    /// Expect the peer to close the connection (read returns 0 bytes)
    /// within the timeout, after optionally draining a final frame.
    pub async fn expect_close(&mut self) {
        let result = timeout(Duration::from_secs(2), async {
            loop {
                let mut chunk = [0u8; 4096];
                match self.stream.read(&mut chunk).await {
                    Ok(0) => return,
                    Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                    Err(_) => return,
                }
            }
        })
        .await;
        assert!(result.is_ok(), "connection was not closed by the server");
    }

    pub async fn login(&mut self, id: &str) {
        self.send(OpCode::Login, id).await;
        let frame = self.recv_op(OpCode::LoginOk).await;
        assert_eq!(frame.data, id);
    }
}

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tutor_stream::{ConnectionState, StreamNotice};

pub const WAIT: Duration = Duration::from_secs(5);

/// What the mock server answers on one connection.
#[derive(Clone, Debug)]
pub enum Reply {
    Status(u16),
    Html(&'static str),
    /// Accepts the request and never answers.
    Silent,
    /// `text/event-stream` body written chunk by chunk after the given pauses.
    Stream { chunks: Vec<(Duration, &'static str)>, hold_open: bool },
}

impl Reply {
    pub fn stream(chunks: &[&'static str]) -> Self {
        Reply::Stream { chunks: chunks.iter().map(|c| (Duration::ZERO, *c)).collect(), hold_open: true }
    }

    pub fn closing_stream(chunks: &[&'static str]) -> Self {
        Reply::Stream { chunks: chunks.iter().map(|c| (Duration::ZERO, *c)).collect(), hold_open: false }
    }

    async fn write(&self, socket: &mut TcpStream) -> std::io::Result<()> {
        match self {
            Reply::Status(code) => {
                let head = format!("HTTP/1.1 {} Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n", code);
                socket.write_all(head.as_bytes()).await?;
            }
            Reply::Html(body) => {
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                socket.write_all(head.as_bytes()).await?;
                socket.write_all(body.as_bytes()).await?;
            }
            Reply::Silent => {
                let mut buf = [0u8; 64];
                while socket.read(&mut buf).await? > 0 {}
            }
            Reply::Stream { chunks, hold_open } => {
                let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n";
                socket.write_all(head.as_bytes()).await?;
                socket.flush().await?;
                for (pause, chunk) in chunks {
                    tokio::time::sleep(*pause).await;
                    socket.write_all(chunk.as_bytes()).await?;
                    socket.flush().await?;
                }
                if *hold_open {
                    // Returns once the client drops the connection.
                    let mut buf = [0u8; 64];
                    while socket.read(&mut buf).await? > 0 {}
                }
            }
        }
        socket.shutdown().await
    }
}

/// Minimal HTTP/1.1 server scripted per connection. Connection `n` gets `replies[n]`,
/// connections past the end get the last reply.
pub struct MockSseServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
    disconnects: Arc<AtomicUsize>,
}

impl MockSseServer {
    pub async fn start(replies: Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock server");
        let addr = listener.local_addr().expect("local addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let disconnects = Arc::new(AtomicUsize::new(0));

        let server_requests = Arc::clone(&requests);
        let server_disconnects = Arc::clone(&disconnects);
        tokio::spawn(async move {
            let mut index = 0;
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let reply = replies.get(index).or(replies.last()).cloned();
                index += 1;

                let requests = Arc::clone(&server_requests);
                let disconnects = Arc::clone(&server_disconnects);
                tokio::spawn(async move {
                    let head = read_head(&mut socket).await;
                    requests.lock().unwrap().push(head);
                    if let Some(reply) = reply {
                        let _ = reply.write(&mut socket).await;
                    }
                    disconnects.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        Self { addr, requests, disconnects }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request(&self, index: usize) -> Option<String> {
        self.requests.lock().unwrap().get(index).cloned()
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

async fn read_head(socket: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8_lossy(&head).to_lowercase()
}

pub async fn next_notice(rx: &mut mpsc::UnboundedReceiver<StreamNotice>) -> StreamNotice {
    timeout(WAIT, rx.recv()).await.expect("timed out waiting for notice").expect("handler channel closed")
}

pub async fn no_notice_within(rx: &mut mpsc::UnboundedReceiver<StreamNotice>, window: Duration) -> bool {
    timeout(window, rx.recv()).await.is_err()
}

pub async fn wait_for_state<F>(rx: &mut watch::Receiver<ConnectionState>, matches: F) -> ConnectionState
where
    F: Fn(&ConnectionState) -> bool,
{
    let state = timeout(WAIT, rx.wait_for(|state| matches(state))).await.expect("timed out waiting for state");
    state.expect("state channel closed").clone()
}

pub async fn wait_until<F: Fn() -> bool>(check: F) {
    timeout(WAIT, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timed out waiting for condition");
}

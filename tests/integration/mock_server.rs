//! Mock lottery server for integration testing.
//!
//! Accepts one connection at a time, records every line it receives and
//! asks a test-supplied responder what to answer. Recording happens before
//! replying, so once the client has its acknowledgment the transcript is
//! already complete.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// What to send back after a line, and when.
pub struct Reply {
    pub text: String,
    pub delay: Duration,
}

impl Reply {
    pub fn now(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn after(text: impl Into<String>, delay: Duration) -> Self {
        Self {
            text: text.into(),
            delay,
        }
    }

    /// Close the connection without answering.
    pub fn hang_up() -> Self {
        Self::now("")
    }
}

/// Decides the reply for a received line. `None` keeps reading.
pub type Responder = Arc<dyn Fn(&str) -> Option<Reply> + Send + Sync>;

pub struct MockServer {
    pub addr: String,
    transcript: Arc<Mutex<Vec<Vec<String>>>>,
    handle: JoinHandle<()>,
}

impl MockServer {
    pub async fn start(responder: Responder) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let transcript = Arc::new(Mutex::new(Vec::new()));

        let log = transcript.clone();
        let handle = tokio::spawn(async move {
            while let Ok((sock, _)) = listener.accept().await {
                let index = {
                    let mut log = log.lock().unwrap();
                    log.push(Vec::new());
                    log.len() - 1
                };

                let mut reader = BufReader::new(sock);
                loop {
                    let mut line = String::new();
                    match reader.read_line(&mut line).await {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {}
                    }
                    log.lock().unwrap()[index].push(line.clone());

                    if let Some(reply) = responder(&line) {
                        tokio::time::sleep(reply.delay).await;
                        let _ = reader.get_mut().write_all(reply.text.as_bytes()).await;
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            transcript,
            handle,
        }
    }

    /// The usual server: echo `BetBatchEnd`, announce `winners` on
    /// `ReadyForLottery`.
    pub async fn echo_batches(winners: u64) -> Self {
        Self::start(Arc::new(move |line: &str| {
            if line.ends_with("BetBatchEnd\n") {
                Some(Reply::now(line))
            } else if line.ends_with("ReadyForLottery\n") {
                Some(Reply::now(format!("Winners {winners}\n")))
            } else {
                None
            }
        }))
        .await
    }

    /// Lines received, grouped by connection.
    pub fn connections(&self) -> Vec<Vec<String>> {
        self.transcript.lock().unwrap().clone()
    }

    pub fn connection_count(&self) -> usize {
        self.transcript.lock().unwrap().len()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

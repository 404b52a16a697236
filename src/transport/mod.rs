//! Transport session: one TCP connection for one request/acknowledgment
//! cycle.
//!
//! The session guarantees two things the raw socket does not:
//! - `send` delivers the whole payload, retrying short writes with the
//!   remaining suffix.
//! - `receive_line` returns exactly one `\n`-terminated line no matter how
//!   the bytes were fragmented on the wire. Bytes past the terminator are
//!   kept for the next call.
//!
//! Every await on the socket is raced against the [`ShutdownToken`], with
//! the token polled first. Once it has fired no further byte is written or
//! returned: the session shuts its stream down and the call returns
//! [`ClientError::Cancelled`].

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::protocol::LINE_TERMINATOR;
use crate::shutdown::ShutdownToken;
use crate::types::ClientError;

/// Read buffer size per socket read.
const READ_CHUNK: usize = 1024;

/// Longest line accepted from the server, terminator included.
const MAX_LINE_LEN: usize = 64 * 1024;

/// A live connection to the server.
#[derive(Debug)]
pub struct Session<S> {
    stream: S,
    peer: String,
    /// Received bytes not yet returned as a line.
    pending: Vec<u8>,
    shutdown: ShutdownToken,
}

impl Session<TcpStream> {
    /// Open a new TCP connection. Each call creates a fresh socket.
    pub async fn open(address: &str, shutdown: &ShutdownToken) -> Result<Self, ClientError> {
        let connected = tokio::select! {
            biased;
            _ = shutdown.cancelled() => None,
            res = TcpStream::connect(address) => Some(res),
        };
        let stream = match connected {
            Some(res) => res.map_err(|source| ClientError::Connect {
                address: address.to_string(),
                source,
            })?,
            None => return Err(ClientError::Cancelled),
        };

        debug!(peer = address, "Connection established");
        Ok(Self::new(stream, address, shutdown.clone()))
    }
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already connected stream.
    pub fn new(stream: S, peer: impl Into<String>, shutdown: ShutdownToken) -> Self {
        Self {
            stream,
            peer: peer.into(),
            pending: Vec::new(),
            shutdown,
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Write the entire payload.
    pub async fn send(&mut self, payload: &[u8]) -> Result<(), ClientError> {
        if self.shutdown.is_triggered() {
            return Err(self.cancel().await);
        }
        let mut sent = 0;

        while sent < payload.len() {
            let written = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => None,
                res = self.stream.write(&payload[sent..]) => Some(res),
            };
            let written = match written {
                Some(res) => res.map_err(ClientError::Send)?,
                None => return Err(self.cancel().await),
            };
            if written == 0 {
                return Err(ClientError::Send(io::Error::from(io::ErrorKind::WriteZero)));
            }
            sent += written;
        }

        Ok(())
    }

    /// Wait for one full line, terminator included.
    pub async fn receive_line(&mut self) -> Result<String, ClientError> {
        loop {
            if self.shutdown.is_triggered() {
                return Err(self.cancel().await);
            }
            if let Some(line) = self.take_line()? {
                return Ok(line);
            }
            if self.pending.len() >= MAX_LINE_LEN {
                return Err(ClientError::Receive(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("line exceeds {MAX_LINE_LEN} bytes"),
                )));
            }
            self.fill().await?;
        }
    }

    /// Like [`receive_line`](Self::receive_line) but gives up after `wait`.
    ///
    /// Expiry yields `Ok(None)`; a partially received line stays buffered
    /// for the next call.
    pub async fn receive_line_within(
        &mut self,
        wait: Duration,
    ) -> Result<Option<String>, ClientError> {
        match tokio::time::timeout(wait, self.receive_line()).await {
            Ok(res) => res.map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Shut the connection down and drop it.
    pub async fn close(mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!(peer = %self.peer, error = %e, "Shutdown on close failed");
        }
        debug!(peer = %self.peer, "Connection closed");
    }

    async fn fill(&mut self) -> Result<(), ClientError> {
        let mut chunk = [0u8; READ_CHUNK];
        let read = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => None,
            res = self.stream.read(&mut chunk) => Some(res),
        };
        let n = match read {
            Some(res) => res.map_err(ClientError::Receive)?,
            None => return Err(self.cancel().await),
        };
        if n == 0 {
            return Err(ClientError::ConnectionClosed);
        }
        self.pending.extend_from_slice(&chunk[..n]);
        Ok(())
    }

    fn take_line(&mut self) -> Result<Option<String>, ClientError> {
        let Some(end) = self.pending.iter().position(|b| *b == LINE_TERMINATOR) else {
            return Ok(None);
        };
        let line: Vec<u8> = self.pending.drain(..=end).collect();
        String::from_utf8(line)
            .map(Some)
            .map_err(|e| ClientError::Receive(io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    async fn cancel(&mut self) -> ClientError {
        if let Err(e) = self.stream.shutdown().await {
            warn!(peer = %self.peer, error = %e, "Failed to close connection on shutdown");
        }
        debug!(peer = %self.peer, "Connection closed by shutdown");
        ClientError::Cancelled
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

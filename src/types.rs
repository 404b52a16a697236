//! Core domain types shared across the client.
//!
//! Records flowing from the record source, the outcome of a run, and the
//! error taxonomy every component reports through.

use std::fmt;
use std::io;

// ---------------------------------------------------------------------------
// Bet record
// ---------------------------------------------------------------------------

/// A single bet as read from the agency's record source.
///
/// All fields are opaque strings; the client forwards them unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BetRecord {
    pub number: String,
    pub first_name: String,
    pub last_name: String,
    pub national_id: String,
    pub birth_date: String,
}

impl BetRecord {
    pub fn new(
        number: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        national_id: impl Into<String>,
        birth_date: impl Into<String>,
    ) -> Self {
        Self {
            number: number.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            national_id: national_id.into(),
            birth_date: birth_date.into(),
        }
    }
}

impl fmt::Display for BetRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ({})", self.number, self.national_id)
    }
}

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

/// How a run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// All cycles (and the query phase, if enabled) finished.
    Completed,
    /// A termination signal stopped the run at a checkpoint.
    Shutdown,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Completed => write!(f, "COMPLETED"),
            RunOutcome::Shutdown => write!(f, "SHUTDOWN"),
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Acknowledged cycles (one connection each).
    pub cycles: u64,
    /// Bets acknowledged by the server.
    pub bets_sent: u64,
    /// Winner count from the query phase, when it ran to completion.
    pub winners: Option<u64>,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            outcome: RunOutcome::Completed,
            cycles: 0,
            bets_sent: 0,
            winners: None,
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.outcome == RunOutcome::Shutdown
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Every failure the client can report.
///
/// `Cancelled` is not a failure: it marks I/O interrupted by shutdown and
/// is turned into [`RunOutcome::Shutdown`] by the batch loop.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Connection to {address} failed: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("Send failed: {0}")]
    Send(#[source] io::Error),

    #[error("Receive failed: {0}")]
    Receive(#[source] io::Error),

    #[error("Connection closed by server before end of line")]
    ConnectionClosed,

    #[error("Protocol mismatch: expected {expected:?}, received {received:?}")]
    ProtocolMismatch { expected: String, received: String },

    #[error("Record source error: {0}")]
    SourceRead(String),

    #[error("Malformed result line: {0:?}")]
    MalformedResult(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled by shutdown")]
    Cancelled,
}

impl ClientError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

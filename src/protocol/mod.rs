//! Line protocol spoken with the lottery server.
//!
//! Every message is a single UTF-8 line terminated by `\n`:
//!
//! ```text
//! [AGENCY <id>] Bet <number>,<first_name>,<last_name>,<national_id>,<birth_date>
//! [AGENCY <id>] BetBatchEnd
//! [AGENCY <id>] ReadyForLottery
//! ```
//!
//! The server acknowledges by echoing the last line it received. After
//! `ReadyForLottery` it answers with a result line whose second token is
//! the number of winners for the agency.

use crate::types::{BetRecord, ClientError};

/// Line terminator byte.
pub const LINE_TERMINATOR: u8 = b'\n';

const BATCH_END_MARKER: &str = "BetBatchEnd";
const READY_MARKER: &str = "ReadyForLottery";

fn agency_prefix(client_id: &str) -> String {
    format!("[AGENCY {client_id}]")
}

/// Frame one bet as a protocol line.
pub fn encode_bet_line(client_id: &str, bet: &BetRecord) -> String {
    format!(
        "{} Bet {},{},{},{},{}\n",
        agency_prefix(client_id),
        bet.number,
        bet.first_name,
        bet.last_name,
        bet.national_id,
        bet.birth_date,
    )
}

/// Frame the marker that closes a batch.
pub fn encode_batch_end_line(client_id: &str) -> String {
    format!("{} {BATCH_END_MARKER}\n", agency_prefix(client_id))
}

/// Frame the marker that opens the query phase.
pub fn encode_ready_line(client_id: &str) -> String {
    format!("{} {READY_MARKER}\n", agency_prefix(client_id))
}

/// Validate an acknowledgment against the last line sent.
///
/// The server echoes lines verbatim, so anything but an exact match
/// (terminator included) is a protocol mismatch.
pub fn decode_ack(sent: &str, received: &str) -> Result<(), ClientError> {
    if sent == received {
        Ok(())
    } else {
        Err(ClientError::ProtocolMismatch {
            expected: sent.to_string(),
            received: received.to_string(),
        })
    }
}

/// Extract the winner count from a query-phase result line.
pub fn decode_winner_count(line: &str) -> Result<u64, ClientError> {
    line.trim_end_matches('\n')
        .split(' ')
        .nth(1)
        .and_then(|token| token.trim().parse().ok())
        .ok_or_else(|| ClientError::MalformedResult(line.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

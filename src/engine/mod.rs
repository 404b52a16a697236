//! Batch loop — the client's connect → send → acknowledge cycle.
//!
//! Each cycle pulls up to `batch_limit` bets from the record source, opens
//! a fresh connection, writes one line per bet (plus `BetBatchEnd` in
//! batched mode) and waits for the server to echo the last line. Any
//! failure ends the run; there is no partial-batch retry. After the last
//! cycle the loop optionally asks the server for the agency's winners.
//!
//! The loop stops at whichever comes first: `loop_amount` cycles, source
//! exhaustion, or shutdown. The first bet of a cycle is read before
//! connecting, so a source that ends on a batch boundary never produces an
//! empty batch.

use tokio::net::TcpStream;
use tracing::{debug, error, info, info_span, trace, Instrument};

use crate::config::{ClientConfig, SendMode};
use crate::protocol::{
    decode_ack, decode_winner_count, encode_batch_end_line, encode_bet_line, encode_ready_line,
};
use crate::shutdown::ShutdownToken;
use crate::source::RecordSource;
use crate::transport::Session;
use crate::types::{BetRecord, ClientError, RunOutcome, RunReport};

// ---------------------------------------------------------------------------
// Cycle state
// ---------------------------------------------------------------------------

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Connecting,
    Sending,
    AwaitingAck,
    Cooldown,
    Querying,
    Done,
    Aborted,
}

/// Result of one acknowledged cycle.
#[derive(Debug, Clone, Copy)]
struct CycleResult {
    bets: u64,
    source_exhausted: bool,
}

// ---------------------------------------------------------------------------
// Batch loop
// ---------------------------------------------------------------------------

pub struct BatchLoop {
    config: ClientConfig,
    shutdown: ShutdownToken,
    state: CycleState,
}

impl BatchLoop {
    pub fn new(config: ClientConfig, shutdown: ShutdownToken) -> Self {
        Self {
            config,
            shutdown,
            state: CycleState::Idle,
        }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Drive cycles until a bound is hit, then run the query phase.
    ///
    /// Shutdown is reported as `Ok` with [`RunOutcome::Shutdown`]; every
    /// other failure is returned as an error after being logged.
    pub async fn run(&mut self, source: &mut dyn RecordSource) -> Result<RunReport, ClientError> {
        let span = info_span!("client", client_id = %self.config.id);
        let mut report = RunReport::new();

        let res = self.run_inner(source, &mut report).instrument(span).await;
        match res {
            Ok(()) => {
                self.transition(CycleState::Done);
                info!(
                    action = "loop_finished",
                    result = "success",
                    client_id = %self.config.id,
                    cycles = report.cycles,
                    bets = report.bets_sent,
                );
                Ok(report)
            }
            Err(ClientError::Cancelled) => {
                self.transition(CycleState::Aborted);
                report.outcome = RunOutcome::Shutdown;
                info!(
                    action = "loop_finished",
                    result = "shutdown",
                    client_id = %self.config.id,
                    cycles = report.cycles,
                    bets = report.bets_sent,
                );
                Ok(report)
            }
            Err(e) => {
                self.transition(CycleState::Aborted);
                Err(e)
            }
        }
    }

    async fn run_inner(
        &mut self,
        source: &mut dyn RecordSource,
        report: &mut RunReport,
    ) -> Result<(), ClientError> {
        // First bet of the upcoming cycle, read before the cooldown so an
        // empty source ends the loop without pausing.
        let mut next: Option<BetRecord> = None;

        for cycle in 1..=self.config.loop_amount {
            self.checkpoint()?;

            let first = match next.take() {
                Some(bet) => Some(bet),
                None => self.read_record(source).await?,
            };
            let Some(first) = first else {
                debug!(cycle, "Record source exhausted");
                break;
            };

            let result = self.run_cycle(first, source).await.inspect_err(|e| {
                if !e.is_cancelled() {
                    error!(action = "batch_sent", result = "fail", cycle, error = %e);
                }
            })?;

            report.cycles += 1;
            report.bets_sent += result.bets;
            info!(action = "batch_sent", result = "success", cycle, count = result.bets);

            if result.source_exhausted || cycle == self.config.loop_amount {
                break;
            }
            next = self.read_record(source).await?;
            if next.is_none() {
                debug!(cycle, "Record source exhausted");
                break;
            }
            self.cooldown().await?;
        }

        if self.config.query_results {
            self.checkpoint()?;
            let winners = self.query_winners().await.inspect_err(|e| {
                if !e.is_cancelled() {
                    error!(action = "query_winners", result = "fail", error = %e);
                }
            })?;
            info!(action = "query_winners", result = "success", winners);
            report.winners = Some(winners);
        }

        Ok(())
    }

    /// One connection: send the batch, validate the echo, close.
    async fn run_cycle(
        &mut self,
        first: BetRecord,
        source: &mut dyn RecordSource,
    ) -> Result<CycleResult, ClientError> {
        let mut session = self.connect().await?;
        let res = self.exchange_batch(&mut session, first, source).await;
        session.close().await;
        res
    }

    async fn exchange_batch(
        &mut self,
        session: &mut Session<TcpStream>,
        first: BetRecord,
        source: &mut dyn RecordSource,
    ) -> Result<CycleResult, ClientError> {
        self.transition(CycleState::Sending);

        let limit = self.config.batch_limit() as u64;
        let mut result = CycleResult {
            bets: 0,
            source_exhausted: false,
        };
        let mut last_line = String::new();
        let mut next = Some(first);

        while let Some(bet) = next.take() {
            last_line = encode_bet_line(&self.config.id, &bet);
            session.send(last_line.as_bytes()).await?;
            debug!(
                action = "bet_sent",
                result = "success",
                national_id = %bet.national_id,
                number = %bet.number,
            );
            result.bets += 1;

            if result.bets < limit {
                next = self.read_record(source).await?;
                result.source_exhausted = next.is_none();
            }
        }

        if self.config.mode == SendMode::Batched {
            last_line = encode_batch_end_line(&self.config.id);
            session.send(last_line.as_bytes()).await?;
        }

        self.transition(CycleState::AwaitingAck);
        let ack = session.receive_line().await?;
        decode_ack(&last_line, &ack)?;

        Ok(result)
    }

    /// Announce readiness and poll until the result line arrives.
    async fn query_winners(&mut self) -> Result<u64, ClientError> {
        let mut session = self.connect().await?;
        self.transition(CycleState::Querying);
        let res = self.poll_winners(&mut session).await;
        session.close().await;
        res
    }

    async fn poll_winners(&self, session: &mut Session<TcpStream>) -> Result<u64, ClientError> {
        session
            .send(encode_ready_line(&self.config.id).as_bytes())
            .await?;

        let wait = self.config.query_poll_interval();
        loop {
            self.checkpoint()?;
            match session.receive_line_within(wait).await? {
                Some(line) => return decode_winner_count(&line),
                None => trace!("Lottery result not ready yet"),
            }
        }
    }

    async fn connect(&mut self) -> Result<Session<TcpStream>, ClientError> {
        self.transition(CycleState::Connecting);
        Session::open(&self.config.server_address, &self.shutdown)
            .await
            .inspect_err(|e| {
                if !e.is_cancelled() {
                    error!(
                        action = "connect",
                        result = "fail",
                        client_id = %self.config.id,
                        error = %e,
                    );
                }
            })
    }

    async fn read_record(
        &self,
        source: &mut dyn RecordSource,
    ) -> Result<Option<BetRecord>, ClientError> {
        source.next_record().await.inspect_err(|e| {
            error!(action = "read_bets_file", result = "fail", client_id = %self.config.id, error = %e);
        })
    }

    /// Inter-cycle pause, cut short by shutdown.
    async fn cooldown(&mut self) -> Result<(), ClientError> {
        self.transition(CycleState::Cooldown);
        tokio::select! {
            _ = tokio::time::sleep(self.config.loop_period()) => Ok(()),
            _ = self.shutdown.cancelled() => Err(ClientError::Cancelled),
        }
    }

    fn checkpoint(&self) -> Result<(), ClientError> {
        if self.shutdown.is_triggered() {
            Err(ClientError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn transition(&mut self, next: CycleState) {
        trace!(from = ?self.state, to = ?next, "State transition");
        self.state = next;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

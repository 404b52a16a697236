//! Bet record sources.
//!
//! Defines the `RecordSource` trait consumed by the batch loop and
//! provides a CSV-file implementation plus an in-memory one.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tracing::debug;

use crate::types::{BetRecord, ClientError};

/// Number of columns in an agency CSV row.
const CSV_COLUMNS: usize = 5;

/// Abstraction over where bets come from.
///
/// `Ok(None)` marks end of input; an error is fatal for the run.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordSource: Send {
    async fn next_record(&mut self) -> Result<Option<BetRecord>, ClientError>;
}

// ---------------------------------------------------------------------------
// CSV file source
// ---------------------------------------------------------------------------

/// Reads an agency bets file, one bet per line:
/// `first_name,last_name,national_id,birth_date,number`.
///
/// Fields are split on bare commas. Quoted fields are not supported and a
/// row containing `"` is rejected rather than split in the wrong place.
pub struct CsvRecordSource {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_number: usize,
}

impl CsvRecordSource {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).await.map_err(|e| {
            ClientError::SourceRead(format!("cannot open {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), "Bets file opened");
        Ok(Self {
            path,
            lines: BufReader::new(file).lines(),
            line_number: 0,
        })
    }

    fn parse_row(&self, row: &str) -> Result<BetRecord, ClientError> {
        if row.contains('"') {
            return Err(ClientError::SourceRead(format!(
                "{}:{}: quoted fields are not supported",
                self.path.display(),
                self.line_number
            )));
        }
        let fields: Vec<&str> = row.split(',').map(str::trim).collect();
        if fields.len() < CSV_COLUMNS {
            return Err(ClientError::SourceRead(format!(
                "{}:{}: expected {CSV_COLUMNS} columns, found {}",
                self.path.display(),
                self.line_number,
                fields.len()
            )));
        }
        Ok(BetRecord::new(fields[4], fields[0], fields[1], fields[2], fields[3]))
    }
}

#[async_trait]
impl RecordSource for CsvRecordSource {
    async fn next_record(&mut self) -> Result<Option<BetRecord>, ClientError> {
        loop {
            let line = self.lines.next_line().await.map_err(|e| {
                ClientError::SourceRead(format!("{}: {e}", self.path.display()))
            })?;
            let Some(line) = line else {
                return Ok(None);
            };
            self.line_number += 1;

            let row = line.trim_end_matches('\r');
            if row.trim().is_empty() {
                continue;
            }
            return self.parse_row(row).map(Some);
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory source
// ---------------------------------------------------------------------------

/// Serves a fixed list of records.
#[derive(Debug, Clone, Default)]
pub struct VecRecordSource {
    records: VecDeque<BetRecord>,
}

impl VecRecordSource {
    pub fn new(records: Vec<BetRecord>) -> Self {
        Self {
            records: records.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.records.len()
    }
}

#[async_trait]
impl RecordSource for VecRecordSource {
    async fn next_record(&mut self) -> Result<Option<BetRecord>, ClientError> {
        Ok(self.records.pop_front())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

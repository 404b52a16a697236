//! Configuration loading from TOML with environment variable overrides.
//!
//! Reads `config.toml` into [`ClientConfig`], then lets `CLI_*`
//! environment variables override individual keys so each agency
//! container can share one file and differ only in its environment.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::ClientError;

/// Default bounded wait between polls in the query phase.
const DEFAULT_QUERY_POLL_MS: u64 = 1_000;

/// How bets are grouped on the wire.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SendMode {
    /// Up to `max_batch_size` bets per connection, closed by `BetBatchEnd`.
    #[default]
    Batched,
    /// One bet per connection; the bet line itself is acknowledged.
    Single,
}

impl std::str::FromStr for SendMode {
    type Err = ClientError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "batched" | "batch" => Ok(SendMode::Batched),
            "single" => Ok(SendMode::Single),
            other => Err(ClientError::Config(format!("unknown send mode: {other}"))),
        }
    }
}

/// Client configuration. Immutable once the run starts.
#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    /// Agency identifier sent in every line.
    #[serde(default)]
    pub id: String,
    /// Server `host:port`.
    #[serde(default)]
    pub server_address: String,
    /// Maximum number of batch cycles.
    pub loop_amount: u64,
    /// Pause between cycles, in milliseconds.
    #[serde(default)]
    pub loop_period_ms: u64,
    pub max_batch_size: usize,
    #[serde(default)]
    pub mode: SendMode,
    #[serde(default = "default_true")]
    pub query_results: bool,
    #[serde(default = "default_query_poll_ms")]
    pub query_poll_ms: u64,
    /// CSV file with this agency's bets. Defaults to `./.data/agency-<id>.csv`.
    #[serde(default)]
    pub bets_file: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_query_poll_ms() -> u64 {
    DEFAULT_QUERY_POLL_MS
}

impl ClientConfig {
    /// Build a config in code, with defaults for the optional keys.
    pub fn new(
        id: impl Into<String>,
        server_address: impl Into<String>,
        loop_amount: u64,
        loop_period: Duration,
        max_batch_size: usize,
    ) -> Self {
        Self {
            id: id.into(),
            server_address: server_address.into(),
            loop_amount,
            loop_period_ms: u64::try_from(loop_period.as_millis()).unwrap_or(u64::MAX),
            max_batch_size,
            mode: SendMode::default(),
            query_results: true,
            query_poll_ms: DEFAULT_QUERY_POLL_MS,
            bets_file: None,
        }
    }

    /// Load from a TOML file, apply environment overrides and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config = Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Override keys from `CLI_*` variables. `lookup` is injected so tests
    /// do not have to touch the process environment.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = lookup("CLI_ID") {
            self.id = id;
        }
        if let Some(address) = lookup("CLI_SERVER_ADDRESS") {
            self.server_address = address;
        }
        if let Some(amount) = lookup("CLI_LOOP_AMOUNT") {
            self.loop_amount = amount
                .parse()
                .with_context(|| format!("CLI_LOOP_AMOUNT is not a number: {amount}"))?;
        }
        if let Some(period) = lookup("CLI_LOOP_PERIOD_MS") {
            self.loop_period_ms = period
                .parse()
                .with_context(|| format!("CLI_LOOP_PERIOD_MS is not a number: {period}"))?;
        }
        if let Some(size) = lookup("CLI_BATCH_MAX_AMOUNT") {
            self.max_batch_size = size
                .parse()
                .with_context(|| format!("CLI_BATCH_MAX_AMOUNT is not a number: {size}"))?;
        }
        if let Some(mode) = lookup("CLI_MODE") {
            self.mode = mode.parse()?;
        }
        if let Some(file) = lookup("CLI_BETS_FILE") {
            self.bets_file = Some(PathBuf::from(file));
        }
        Ok(())
    }

    pub fn validate(&self) -> std::result::Result<(), ClientError> {
        if self.id.trim().is_empty() {
            return Err(ClientError::Config("client id is empty".into()));
        }
        if self.server_address.trim().is_empty() {
            return Err(ClientError::Config("server address is empty".into()));
        }
        if self.max_batch_size == 0 {
            return Err(ClientError::Config("max_batch_size must be at least 1".into()));
        }
        Ok(())
    }

    pub fn loop_period(&self) -> Duration {
        Duration::from_millis(self.loop_period_ms)
    }

    pub fn query_poll_interval(&self) -> Duration {
        Duration::from_millis(self.query_poll_ms)
    }

    /// Bets per connection for the configured mode.
    pub fn batch_limit(&self) -> usize {
        match self.mode {
            SendMode::Batched => self.max_batch_size,
            SendMode::Single => 1,
        }
    }

    pub fn bets_path(&self) -> PathBuf {
        self.bets_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("./.data/agency-{}.csv", self.id)))
    }
}

//! The contract every endpoint adapter implements

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::batch::Batch;
use crate::config::ApiKey;
use crate::error::Result;
use crate::retry::RetryConfig;
use crate::table::{BatchOutcome, Table};

/// Per-call values threaded through every adapter invocation
///
/// Read-only once a call starts; workers share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct FetchContext {
    /// Sleep after each upstream call
    pub pacing_delay: Duration,
    /// Key in force for this call, if any
    pub api_key: Option<ApiKey>,
    /// Retry policy for adapters that retry
    pub retry: RetryConfig,
}

impl FetchContext {
    pub fn new(pacing_delay: Duration) -> Self {
        Self {
            pacing_delay,
            api_key: None,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_api_key(mut self, api_key: Option<ApiKey>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Delay between retry attempts
    pub fn retry_delay(&self) -> Duration {
        self.retry.effective_delay(self.pacing_delay)
    }

    pub(crate) async fn pace(&self) {
        if !self.pacing_delay.is_zero() {
            tokio::time::sleep(self.pacing_delay).await;
        }
    }
}

/// Fetch-and-normalize routine for one upstream data source
#[async_trait]
pub trait EndpointAdapter: Send + Sync + 'static {
    type Record: Send + 'static;

    /// Endpoint name used in diagnostics
    fn name(&self) -> &'static str;

    /// Fetch one batch and normalize it, surfacing any failure as an error
    async fn fetch_table(&self, batch: &Batch, ctx: &FetchContext) -> Result<Table<Self::Record>>;

    /// Fetch one batch, then pace
    ///
    /// Never fails: errors become [`BatchOutcome::Unavailable`] with a
    /// diagnostic naming the endpoint and batch.
    async fn fetch(&self, batch: &Batch, ctx: &FetchContext) -> BatchOutcome<Self::Record> {
        let outcome = match self.fetch_table(batch, ctx).await {
            Ok(table) => {
                debug!(
                    endpoint = self.name(),
                    batch = batch.index(),
                    rows = table.len(),
                    "Batch fetched"
                );
                BatchOutcome::Fetched(table)
            }
            Err(err) => {
                warn!(
                    endpoint = self.name(),
                    batch = batch.index(),
                    size = batch.len(),
                    error = %err,
                    "Batch unavailable"
                );
                BatchOutcome::unavailable(err.to_string())
            }
        };

        ctx.pace().await;
        outcome
    }
}

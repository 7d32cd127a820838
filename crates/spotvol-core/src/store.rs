//! Async facade over the DuckDB price history warehouse.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use spotvol_warehouse::{PriceRecord, Warehouse, WarehouseError};
use thiserror::Error;
use tracing::{error, warn};

use crate::volatility::PairVolatility;
use crate::{CurrencyPair, HistoryWindow, PriceMap, PriceSample, UtcDateTime, ValidationError};

/// Failures of price persistence and retrieval.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{operation} failed: {source}")]
    Warehouse {
        operation: &'static str,
        #[source]
        source: WarehouseError,
    },

    #[error("{operation} did not finish within {timeout_ms} ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("{operation} task failed: {detail}")]
    TaskFailed {
        operation: &'static str,
        detail: String,
    },

    #[error("stored row is invalid: {0}")]
    InvalidRow(#[from] ValidationError),
}

impl StorageError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Warehouse { .. } => "storage.database",
            Self::Timeout { .. } => "storage.timeout",
            Self::TaskFailed { .. } => "storage.task_failed",
            Self::InvalidRow(_) => "storage.invalid_row",
        }
    }
}

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StorageError>> + Send + 'a>>;

/// Durable time series of price samples.
pub trait PriceStore: Send + Sync {
    /// Append one row per pair under a single capture timestamp, atomically.
    fn append<'a>(&'a self, prices: &'a PriceMap) -> StoreFuture<'a, UtcDateTime>;

    /// Samples for `pair` strictly inside `window` ending now, newest first.
    fn read_history<'a>(
        &'a self,
        pair: CurrencyPair,
        window: HistoryWindow,
    ) -> StoreFuture<'a, Vec<PriceSample>>;

    /// Sample count and standard deviation per pair with two or more samples
    /// at or after `since`.
    fn dispersion<'a>(&'a self, since: UtcDateTime) -> StoreFuture<'a, Vec<PairVolatility>>;
}

/// [`PriceStore`] backed by a [`Warehouse`].
///
/// Warehouse calls block, so each runs on the blocking pool and is bounded by
/// `timeout`. A call that times out keeps running to completion in the
/// background.
#[derive(Clone)]
pub struct WarehousePriceStore {
    warehouse: Warehouse,
    timeout: Duration,
}

impl WarehousePriceStore {
    pub fn new(warehouse: Warehouse, timeout: Duration) -> Self {
        Self { warehouse, timeout }
    }

    pub fn warehouse(&self) -> &Warehouse {
        &self.warehouse
    }

    /// Append `prices` captured at an explicit instant.
    ///
    /// A timed-out append still commits in the background. The caller sees
    /// `StorageError::Timeout` and nothing is cached, so the next refresh
    /// stores its batch again. The table has no key, so the repeat is kept
    /// as a second batch at a later capture time.
    pub async fn append_at(
        &self,
        prices: &PriceMap,
        captured_at: UtcDateTime,
    ) -> Result<UtcDateTime, StorageError> {
        let captured_at = captured_at.truncated_to_micros();
        if prices.is_empty() {
            return Ok(captured_at);
        }

        let rows: Vec<PriceRecord> = prices
            .iter()
            .map(|(pair, price)| PriceRecord {
                pair: pair.to_string(),
                price: *price,
            })
            .collect();
        let timestamp = captured_at.format_rfc3339();

        self.run_blocking("append prices", move |warehouse| {
            warehouse.append_prices(&rows, &timestamp)
        })
        .await?;
        Ok(captured_at)
    }

    pub async fn read_history_at(
        &self,
        pair: CurrencyPair,
        window: HistoryWindow,
        now: UtcDateTime,
    ) -> Result<Vec<PriceSample>, StorageError> {
        let key = pair.to_string();
        let since = window.start(now).format_rfc3339();
        let rows = self
            .run_blocking("read history", move |warehouse| {
                warehouse.read_history(&key, &since)
            })
            .await?;

        rows.into_iter()
            .map(|row| -> Result<PriceSample, StorageError> {
                let timestamp = UtcDateTime::from_unix_micros(row.timestamp_us)?;
                Ok(PriceSample::new(pair, row.price, timestamp)?)
            })
            .collect()
    }

    async fn dispersion_since(
        &self,
        since: UtcDateTime,
    ) -> Result<Vec<PairVolatility>, StorageError> {
        let since = since.format_rfc3339();
        let rows = self
            .run_blocking("compute dispersion", move |warehouse| {
                warehouse.price_dispersion(&since)
            })
            .await?;

        let mut output = Vec::with_capacity(rows.len());
        for row in rows {
            match CurrencyPair::parse(&row.pair) {
                Ok(pair) => output.push(PairVolatility {
                    pair,
                    sample_count: row.sample_count,
                    std_dev: row.std_dev,
                }),
                Err(err) => warn!(pair = %row.pair, error = %err, "skipping unknown stored pair"),
            }
        }
        Ok(output)
    }

    async fn run_blocking<T, F>(&self, operation: &'static str, work: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Warehouse) -> Result<T, WarehouseError> + Send + 'static,
    {
        let warehouse = self.warehouse.clone();
        let task = tokio::task::spawn_blocking(move || work(&warehouse));

        let result = match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(source))) => Err(StorageError::Warehouse { operation, source }),
            Ok(Err(join_error)) => Err(StorageError::TaskFailed {
                operation,
                detail: join_error.to_string(),
            }),
            Err(_) => {
                let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(operation, timeout_ms, "storage call timed out");
                Err(StorageError::Timeout {
                    operation,
                    timeout_ms,
                })
            }
        };

        result.map_err(|err| {
            error!(operation, code = err.code(), error = %err, "storage call failed");
            err
        })
    }
}

impl PriceStore for WarehousePriceStore {
    fn append<'a>(&'a self, prices: &'a PriceMap) -> StoreFuture<'a, UtcDateTime> {
        Box::pin(self.append_at(prices, UtcDateTime::now()))
    }

    fn read_history<'a>(
        &'a self,
        pair: CurrencyPair,
        window: HistoryWindow,
    ) -> StoreFuture<'a, Vec<PriceSample>> {
        Box::pin(self.read_history_at(pair, window, UtcDateTime::now()))
    }

    fn dispersion<'a>(&'a self, since: UtcDateTime) -> StoreFuture<'a, Vec<PairVolatility>> {
        Box::pin(self.dispersion_since(since))
    }
}

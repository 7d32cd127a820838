//! # Spotvol Warehouse
//!
//! DuckDB-based price history storage for spotvol.
//!
//! ## Overview
//!
//! The warehouse owns the append-only `price_history` table. Every write is a
//! batch sharing one capture timestamp and runs inside a single transaction,
//! so readers never observe half of a batch. Reads are single auto-committing
//! statements.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use spotvol_warehouse::{PriceRecord, Warehouse, WarehouseConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open(WarehouseConfig::default())?;
//!
//!     let rows = vec![PriceRecord { pair: "btc/usd".to_string(), price: 50_000.0 }];
//!     warehouse.append_prices(&rows, "2026-02-20T10:00:00Z")?;
//!
//!     let history = warehouse.read_history("btc/usd", "2026-02-19T10:00:00Z")?;
//!     println!("{} samples", history.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `price_history` | Append-only `(pair, price, timestamp)` samples |
//! | `schema_migrations` | Applied migration versions |
//!
//! Timestamps are passed in as RFC3339 strings carrying an explicit offset and
//! come back as microseconds since the Unix epoch (UTC).

pub mod duckdb;
pub mod migrations;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::types::{TimeUnit, Value as DuckValue};
use ::duckdb::{Connection, ToSql};
use serde::Serialize;
use thiserror::Error;

pub use duckdb::{DuckDbConnectionManager, PooledConnection};

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A pool mutex was poisoned by a panicking holder.
    #[error("connection pool lock poisoned")]
    PoolPoisoned,

    /// A stored value could not be decoded into the expected shape.
    #[error("unexpected value in column '{column}': {detail}")]
    InvalidValue { column: &'static str, detail: String },
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for spotvol data.
    pub spotvol_home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept in the pool.
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        let spotvol_home = resolve_spotvol_home();
        let db_path = spotvol_home.join("data").join("prices.duckdb");
        Self {
            spotvol_home,
            db_path,
            max_pool_size: 4,
        }
    }
}

impl WarehouseConfig {
    /// Configuration rooted at an explicit database file.
    pub fn at_path(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Self::default()
        }
    }
}

/// One price observation to append.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRecord {
    /// Canonical pair string, e.g. `btc/usd`.
    pub pair: String,
    pub price: f64,
}

/// A stored price row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredPrice {
    pub pair: String,
    pub price: f64,
    /// Capture instant in microseconds since the Unix epoch (UTC).
    pub timestamp_us: i64,
}

/// Sample dispersion of one pair over a window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairDispersion {
    pub pair: String,
    pub sample_count: u64,
    /// Sample standard deviation (`STDDEV_SAMP`) of price.
    pub std_dev: f64,
}

/// The main warehouse interface for price history storage.
#[derive(Clone)]
pub struct Warehouse {
    config: WarehouseConfig,
    manager: DuckDbConnectionManager,
}

impl Warehouse {
    /// Open a warehouse with default configuration.
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open a warehouse with the specified configuration.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let manager = DuckDbConnectionManager::open(config.db_path.clone(), config.max_pool_size)?;
        let warehouse = Self { config, manager };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Apply pending schema migrations.
    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    /// Get the path to the database file.
    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    /// Append a batch of prices sharing one capture timestamp.
    ///
    /// All rows are inserted inside one transaction; any failure rolls the
    /// whole batch back and is returned to the caller.
    ///
    /// # Security
    /// Uses parameterized queries; pair strings are never interpolated.
    pub fn append_prices(
        &self,
        rows: &[PriceRecord],
        captured_at: &str,
    ) -> Result<(), WarehouseError> {
        if rows.is_empty() {
            return Ok(());
        }

        let connection = self.manager.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<(), WarehouseError> {
            let mut statement = connection.prepare(
                "INSERT INTO price_history (pair, price, timestamp) \
                 VALUES (?, ?, CAST(? AS TIMESTAMPTZ))",
            )?;
            for row in rows {
                let params: [&dyn ToSql; 3] = [&row.pair, &row.price, &captured_at];
                statement.execute(params.as_slice())?;
            }
            Ok(())
        })();

        finalize_transaction(&connection, result)
    }

    /// Read samples for `pair` strictly newer than `since`, newest first.
    pub fn read_history(&self, pair: &str, since: &str) -> Result<Vec<StoredPrice>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(
            "SELECT pair, price, timestamp \
             FROM price_history \
             WHERE pair = ? AND timestamp > CAST(? AS TIMESTAMPTZ) \
             ORDER BY timestamp DESC",
        )?;

        let params: [&dyn ToSql; 2] = [&pair, &since];
        let mut rows = statement.query(params.as_slice())?;
        let mut output = Vec::new();
        while let Some(row) = rows.next()? {
            let timestamp: DuckValue = row.get(2)?;
            output.push(StoredPrice {
                pair: row.get(0)?,
                price: row.get(1)?,
                timestamp_us: timestamp_micros(timestamp)?,
            });
        }
        Ok(output)
    }

    /// Per-pair sample standard deviation of price for samples at or after
    /// `since`. Pairs with fewer than two samples are omitted.
    pub fn price_dispersion(&self, since: &str) -> Result<Vec<PairDispersion>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(
            "SELECT pair, COUNT(*) AS sample_count, STDDEV_SAMP(price) AS std_dev \
             FROM price_history \
             WHERE timestamp >= CAST(? AS TIMESTAMPTZ) \
             GROUP BY pair \
             HAVING COUNT(*) > 1 \
             ORDER BY pair",
        )?;

        let params: [&dyn ToSql; 1] = [&since];
        let mut rows = statement.query(params.as_slice())?;
        let mut output = Vec::new();
        while let Some(row) = rows.next()? {
            let sample_count: i64 = row.get(1)?;
            output.push(PairDispersion {
                pair: row.get(0)?,
                sample_count: u64::try_from(sample_count).map_err(|_| {
                    WarehouseError::InvalidValue {
                        column: "sample_count",
                        detail: sample_count.to_string(),
                    }
                })?,
                std_dev: row.get(2)?,
            });
        }
        Ok(output)
    }

    /// Total number of stored samples, optionally restricted to one pair.
    pub fn sample_count(&self, pair: Option<&str>) -> Result<u64, WarehouseError> {
        let connection = self.manager.acquire()?;
        let count: i64 = match pair {
            Some(pair) => connection.query_row(
                "SELECT COUNT(*) FROM price_history WHERE pair = ?",
                [pair],
                |row| row.get(0),
            )?,
            None => connection.query_row("SELECT COUNT(*) FROM price_history", [], |row| {
                row.get(0)
            })?,
        };
        Ok(count.max(0) as u64)
    }
}

/// Finalize a transaction, committing on success or rolling back on failure.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

/// Convert a DuckDB timestamp value to microseconds since the epoch.
fn timestamp_micros(value: DuckValue) -> Result<i64, WarehouseError> {
    match value {
        DuckValue::Timestamp(unit, raw) => Ok(match unit {
            TimeUnit::Second => raw.saturating_mul(1_000_000),
            TimeUnit::Millisecond => raw.saturating_mul(1_000),
            TimeUnit::Microsecond => raw,
            TimeUnit::Nanosecond => raw / 1_000,
        }),
        other => Err(WarehouseError::InvalidValue {
            column: "timestamp",
            detail: format!("{other:?}"),
        }),
    }
}

/// Resolve the spotvol home directory from environment or default.
fn resolve_spotvol_home() -> PathBuf {
    if let Some(path) = env::var_os("SPOTVOL_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".spotvol");
    }

    PathBuf::from(".spotvol")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_temp(temp: &tempfile::TempDir) -> Warehouse {
        let spotvol_home = temp.path().join("spotvol-home");
        let db_path = spotvol_home.join("data").join("prices.duckdb");
        Warehouse::open(WarehouseConfig {
            spotvol_home,
            db_path,
            max_pool_size: 2,
        })
        .expect("warehouse open")
    }

    fn record(pair: &str, price: f64) -> PriceRecord {
        PriceRecord {
            pair: pair.to_string(),
            price,
        }
    }

    #[test]
    fn initializes_price_history_table_once() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_temp(&temp);
        warehouse.initialize().expect("second initialize is a no-op");

        let connection = warehouse.manager.acquire().expect("connection");
        let versions = migrations::applied_versions(&connection).expect("versions");
        assert_eq!(versions, vec!["0001_price_history", "0002_indexes"]);

        let tables: i64 = connection
            .query_row(
                "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = 'price_history'",
                [],
                |row| row.get(0),
            )
            .expect("query");
        assert_eq!(tables, 1);
    }

    #[test]
    fn append_then_read_returns_newest_first() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_temp(&temp);

        warehouse
            .append_prices(&[record("btc/usd", 50_000.0)], "2026-02-20T10:00:00Z")
            .expect("first batch");
        warehouse
            .append_prices(&[record("btc/usd", 51_000.0)], "2026-02-20T10:00:01Z")
            .expect("second batch");

        let history = warehouse
            .read_history("btc/usd", "2026-02-19T10:00:00Z")
            .expect("history");
        let prices: Vec<f64> = history.iter().map(|row| row.price).collect();
        assert_eq!(prices, vec![51_000.0, 50_000.0]);
        assert_eq!(history[0].timestamp_us - history[1].timestamp_us, 1_000_000);
    }

    #[test]
    fn batch_rows_share_capture_timestamp() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_temp(&temp);

        warehouse
            .append_prices(
                &[record("btc/usd", 1.5), record("eth/usd", 2.5)],
                "2026-02-20T10:00:00.123456Z",
            )
            .expect("append");

        let btc = warehouse
            .read_history("btc/usd", "2026-02-20T00:00:00Z")
            .expect("btc");
        let eth = warehouse
            .read_history("eth/usd", "2026-02-20T00:00:00Z")
            .expect("eth");
        assert_eq!(btc.len(), 1);
        assert_eq!(eth.len(), 1);
        assert_eq!(btc[0].timestamp_us, eth[0].timestamp_us);
        assert_eq!(btc[0].timestamp_us % 1_000_000, 123_456);
    }

    #[test]
    fn window_lower_bound_is_exclusive() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_temp(&temp);

        warehouse
            .append_prices(&[record("sol/usd", 100.0)], "2026-02-20T10:00:00Z")
            .expect("append");

        let history = warehouse
            .read_history("sol/usd", "2026-02-20T10:00:00Z")
            .expect("history");
        assert!(history.is_empty());
    }

    #[test]
    fn failed_batch_is_rolled_back() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_temp(&temp);

        warehouse
            .append_prices(&[record("btc/usd", 1.0)], "2026-02-20T10:00:00Z")
            .expect("seed");

        let error = warehouse
            .append_prices(
                &[record("eth/usd", 2.0), record("ada/usd", -3.0)],
                "2026-02-20T10:00:01Z",
            )
            .expect_err("negative price violates the check constraint");
        assert!(matches!(error, WarehouseError::DuckDb(_)));

        assert_eq!(warehouse.sample_count(None).expect("count"), 1);
        assert_eq!(warehouse.sample_count(Some("eth/usd")).expect("count"), 0);

        let error = warehouse
            .append_prices(&[record("eth/usd", 2.0)], "not-a-timestamp")
            .expect_err("invalid timestamp must fail");
        assert!(matches!(error, WarehouseError::DuckDb(_)));
        assert_eq!(warehouse.sample_count(None).expect("count"), 1);
    }

    #[test]
    fn pair_strings_are_parameterized() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_temp(&temp);

        let dangerous_pair = r#"btc/usd'; DROP TABLE price_history; --"#;
        warehouse
            .append_prices(&[record(dangerous_pair, 1.0)], "2026-02-20T10:00:00Z")
            .expect("append");

        let history = warehouse
            .read_history(dangerous_pair, "2026-02-19T00:00:00Z")
            .expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].pair, dangerous_pair);
    }

    #[test]
    fn dispersion_skips_pairs_with_a_single_sample() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_temp(&temp);

        warehouse
            .append_prices(
                &[record("btc/usd", 10.0), record("eth/usd", 5.0)],
                "2026-02-20T10:00:00Z",
            )
            .expect("first");
        warehouse
            .append_prices(&[record("btc/usd", 20.0)], "2026-02-20T10:01:00Z")
            .expect("second");

        let dispersion = warehouse
            .price_dispersion("2026-02-20T00:00:00Z")
            .expect("dispersion");
        assert_eq!(dispersion.len(), 1);
        assert_eq!(dispersion[0].pair, "btc/usd");
        assert_eq!(dispersion[0].sample_count, 2);
        assert!((dispersion[0].std_dev - 50.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn dispersion_respects_window_start() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_temp(&temp);

        warehouse
            .append_prices(&[record("ada/usd", 1.0)], "2026-02-18T10:00:00Z")
            .expect("old");
        warehouse
            .append_prices(&[record("ada/usd", 2.0)], "2026-02-20T10:00:00Z")
            .expect("new");
        warehouse
            .append_prices(&[record("ada/usd", 4.0)], "2026-02-20T11:00:00Z")
            .expect("newer");

        let dispersion = warehouse
            .price_dispersion("2026-02-19T11:00:00Z")
            .expect("dispersion");
        assert_eq!(dispersion.len(), 1);
        assert_eq!(dispersion[0].sample_count, 2);
    }
}

//! # Spotvol Core
//!
//! Spot price tracking and relative volatility ranking for a fixed set of
//! currency pairs.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`domain`] | Pair catalog, samples, histories and timestamps |
//! | [`fetcher`] | Batched retrieval from the external price source |
//! | [`store`] | Async price store over the DuckDB warehouse |
//! | [`volatility`] | Standard-deviation ranking across pairs |
//! | [`cache`] | Single-flight TTL result cache |
//! | [`service`] | [`PriceService`] tying the pieces together |
//! | [`config`] | Environment-driven service settings |
//! | [`http_client`] | HTTP transport abstraction |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use spotvol_core::{HistoryWindow, PriceService, ServiceConfig};
//! use spotvol_warehouse::Warehouse;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = PriceService::from_config(&ServiceConfig::from_env(), Warehouse::open_default()?);
//!
//!     service.refresh().await?;
//!     let pair = service.resolve_pair("btc", "usd")?;
//!     let history = service.price_history(pair, HistoryWindow::default()).await?;
//!     println!("{} samples, rank {:?}", history.prices.len(), history.volatility_rank);
//!     Ok(())
//! }
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! driver / routes
//!       │
//!       ▼
//! ┌──────────────┐    ┌──────────────┐
//! │ PriceService │───▶│ ResultCache  │
//! └──────┬───────┘    └──────────────┘
//!        │
//!   ┌────┴─────────────┐
//!   ▼                  ▼
//! ┌──────────────┐   ┌──────────────────┐
//! │ QuoteFetcher │   │ PriceStore       │◀── VolatilityRanker
//! │ (HttpClient) │   │ (DuckDB)         │
//! └──────────────┘   └──────────────────┘
//! ```

pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod http_client;
pub mod service;
pub mod store;
pub mod volatility;

pub use cache::{CacheStatus, ResultCache};
pub use config::ServiceConfig;
pub use domain::*;
pub use error::{CatalogError, ServiceError, ValidationError};
pub use fetcher::{FetchError, FetchErrorKind, QuoteFetcher};
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient,
};
pub use service::{CacheKey, CachedValue, PriceService, ServiceCache};
pub use store::{PriceStore, StorageError, StoreFuture, WarehousePriceStore};
pub use volatility::{PairVolatility, RankedPair, VolatilityRanker, VolatilityRanking};

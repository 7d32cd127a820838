//! # Domain Models
//!
//! Canonical domain types for spotvol price tracking.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`CurrencyPair`] | Catalog-registered trading pair |
//! | [`BaseCurrency`] / [`QuoteCurrency`] | Closed currency enumerations |
//! | [`ExternalId`] | Price source identifier for a base currency |
//! | [`PriceSample`] | One stored price observation |
//! | [`PriceHistory`] | Windowed samples plus volatility rank |
//! | [`PriceSnapshot`] | Prices captured by one refresh |
//! | [`HistoryWindow`] | Validated lookback in hours |
//! | [`UtcDateTime`] | UTC timestamp |

mod currency;
mod models;
mod timestamp;

pub use currency::{
    external_id, pairs_by_quote, BaseCurrency, CurrencyPair, ExternalId, QuoteCurrency, PAIRS,
};
pub use models::{
    validate_price, CurrentPrice, HistoryWindow, PriceHistory, PriceMap, PriceSample,
    PriceSnapshot,
};
pub use timestamp::UtcDateTime;

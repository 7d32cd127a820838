use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{CurrencyPair, UtcDateTime, ValidationError};

/// Latest price per pair, ordered by catalog enum order.
pub type PriceMap = BTreeMap<CurrencyPair, f64>;

/// One stored price observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub pair: CurrencyPair,
    pub price: f64,
    pub timestamp: UtcDateTime,
}

impl PriceSample {
    pub fn new(
        pair: CurrencyPair,
        price: f64,
        timestamp: UtcDateTime,
    ) -> Result<Self, ValidationError> {
        validate_price("price", price)?;
        Ok(Self {
            pair,
            price,
            timestamp,
        })
    }
}

/// Samples for one pair, newest first, with the pair's current volatility rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    pub pair: CurrencyPair,
    pub prices: Vec<PriceSample>,
    pub volatility_rank: Option<u32>,
}

/// Lookback window for history reads, in whole hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct HistoryWindow(u32);

impl HistoryWindow {
    pub const DEFAULT_HOURS: u32 = 24;
    /// One year of hourly lookback.
    pub const MAX_HOURS: u32 = 24 * 366;

    pub fn hours(hours: u32) -> Result<Self, ValidationError> {
        if hours == 0 || hours > Self::MAX_HOURS {
            return Err(ValidationError::InvalidHistoryWindow {
                hours,
                max: Self::MAX_HOURS,
            });
        }
        Ok(Self(hours))
    }

    pub const fn as_hours(self) -> u32 {
        self.0
    }

    /// Exclusive lower bound of the window ending at `now`.
    pub fn start(self, now: UtcDateTime) -> UtcDateTime {
        now.minus_hours(self.0)
    }
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self(Self::DEFAULT_HOURS)
    }
}

impl TryFrom<u32> for HistoryWindow {
    type Error = ValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::hours(value)
    }
}

impl From<HistoryWindow> for u32 {
    fn from(value: HistoryWindow) -> Self {
        value.0
    }
}

/// Prices captured by one fetch-and-store pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub captured_at: UtcDateTime,
    pub prices: PriceMap,
}

impl PriceSnapshot {
    pub fn price(&self, pair: CurrencyPair) -> Option<f64> {
        self.prices.get(&pair).copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Current price of one pair as of the latest snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentPrice {
    pub pair: CurrencyPair,
    pub price: f64,
    pub timestamp: UtcDateTime,
}

pub fn validate_price(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

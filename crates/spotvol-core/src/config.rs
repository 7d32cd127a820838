use std::env;
use std::time::Duration;

use crate::fetcher::DEFAULT_BASE_URL;
use crate::HistoryWindow;

/// Runtime settings for [`crate::PriceService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub coingecko_base_url: String,
    /// Sent as a header when present. Only ever read from the environment.
    pub coingecko_api_key: Option<String>,
    pub request_timeout: Duration,
    pub storage_timeout: Duration,
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
    pub history_hours: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            coingecko_base_url: String::from(DEFAULT_BASE_URL),
            coingecko_api_key: None,
            request_timeout: Duration::from_secs(10),
            storage_timeout: Duration::from_secs(5),
            cache_ttl: Duration::from_secs(90),
            cache_capacity: 32,
            history_hours: HistoryWindow::DEFAULT_HOURS,
        }
    }
}

impl ServiceConfig {
    /// Defaults overridden by `SPOTVOL_*` and `COINGECKO_API_KEY` variables.
    ///
    /// Unset, empty or unparsable values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<L>(lookup: L) -> Self
    where
        L: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let value = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_owned())
                .filter(|raw| !raw.is_empty())
        };
        let number = |name: &str| value(name).and_then(|raw| raw.parse::<u64>().ok());

        Self {
            coingecko_base_url: value("SPOTVOL_COINGECKO_URL")
                .unwrap_or(defaults.coingecko_base_url),
            coingecko_api_key: value("COINGECKO_API_KEY"),
            request_timeout: number("SPOTVOL_REQUEST_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
            storage_timeout: number("SPOTVOL_STORAGE_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.storage_timeout),
            cache_ttl: number("SPOTVOL_CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            cache_capacity: defaults.cache_capacity,
            history_hours: number("SPOTVOL_HISTORY_HOURS")
                .and_then(|hours| u32::try_from(hours).ok())
                .unwrap_or(defaults.history_hours),
        }
    }

    /// Default history window; an out-of-range `history_hours` falls back to 24.
    pub fn history_window(&self) -> HistoryWindow {
        HistoryWindow::hours(self.history_hours).unwrap_or_default()
    }
}

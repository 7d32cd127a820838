//! The price service: cached fetch-and-store, history and ranking reads.

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use spotvol_warehouse::Warehouse;
use tracing::info;

use crate::cache::{CacheStatus, ResultCache};
use crate::config::ServiceConfig;
use crate::fetcher::{FetchError, FetchErrorKind, QuoteFetcher};
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::store::{PriceStore, WarehousePriceStore};
use crate::volatility::{VolatilityRanker, VolatilityRanking};
use crate::{
    CurrencyPair, CurrentPrice, HistoryWindow, PriceHistory, PriceSample, PriceSnapshot,
    ServiceError,
};

/// Identity of a cached service result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// The global fetch-and-store pass.
    Refresh,
    History { pair: CurrencyPair, hours: u32 },
    Rank { pair: CurrencyPair },
    Ranking,
}

impl CacheKey {
    /// Whether new samples can change the cached answer.
    pub const fn depends_on_history(&self) -> bool {
        !matches!(self, Self::Refresh)
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Refresh => f.write_str("refresh"),
            Self::History { pair, hours } => write!(f, "history:{pair}:{hours}h"),
            Self::Rank { pair } => write!(f, "rank:{pair}"),
            Self::Ranking => f.write_str("ranking"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum CachedValue {
    Snapshot(Arc<PriceSnapshot>),
    History(Arc<Vec<PriceSample>>),
    Rank(Option<u32>),
    Ranking(Arc<VolatilityRanking>),
}

pub type ServiceCache = ResultCache<CacheKey, CachedValue>;

/// Price ingestion and analytics over a [`PriceStore`].
///
/// Share one instance behind an `Arc`; all methods take `&self`.
pub struct PriceService {
    fetcher: Arc<QuoteFetcher>,
    store: Arc<dyn PriceStore>,
    ranker: VolatilityRanker,
    cache: ServiceCache,
    default_window: HistoryWindow,
}

impl PriceService {
    pub fn new(fetcher: QuoteFetcher, store: Arc<dyn PriceStore>, cache: ServiceCache) -> Self {
        let ranker = VolatilityRanker::new(Arc::clone(&store));
        Self {
            fetcher: Arc::new(fetcher),
            store,
            ranker,
            cache,
            default_window: HistoryWindow::default(),
        }
    }

    /// Window used when a history reader does not ask for one.
    pub fn with_default_window(mut self, window: HistoryWindow) -> Self {
        self.default_window = window;
        self
    }

    /// Service wired to the given transport and warehouse.
    pub fn with_http_client(
        config: &ServiceConfig,
        http_client: Arc<dyn HttpClient>,
        warehouse: Warehouse,
    ) -> Self {
        let fetcher = QuoteFetcher::new(http_client, config.coingecko_base_url.clone())
            .with_api_key(config.coingecko_api_key.as_deref())
            .with_timeout_ms(duration_millis(config.request_timeout));
        let store: Arc<dyn PriceStore> =
            Arc::new(WarehousePriceStore::new(warehouse, config.storage_timeout));
        let cache = ResultCache::new(config.cache_ttl, config.cache_capacity);
        Self::new(fetcher, store, cache).with_default_window(config.history_window())
    }

    /// Production service using reqwest.
    pub fn from_config(config: &ServiceConfig, warehouse: Warehouse) -> Self {
        Self::with_http_client(config, Arc::new(ReqwestHttpClient::new()), warehouse)
    }

    pub fn cache(&self) -> &ServiceCache {
        &self.cache
    }

    pub fn default_window(&self) -> HistoryWindow {
        self.default_window
    }

    /// Resolve route segments to a catalog pair. Never touches storage.
    pub fn resolve_pair(&self, base: &str, quote: &str) -> Result<CurrencyPair, ServiceError> {
        Ok(CurrencyPair::from_parts(base, quote)?)
    }

    /// Fetch all prices and append them as one batch, bypassing the cache.
    ///
    /// Nothing is written when the fetch fails.
    pub async fn fetch_and_store(&self) -> Result<PriceSnapshot, ServiceError> {
        fetch_and_store(&self.fetcher, self.store.as_ref()).await
    }

    /// Cached fetch-and-store.
    ///
    /// Within the TTL the previous snapshot is returned and neither the price
    /// source nor the store is touched. A fresh pass drops every cached
    /// history and ranking answer.
    ///
    /// The pass runs on its own task, so a caller that stops waiting does not
    /// stop the fetch, the append or the cache update.
    pub async fn refresh(&self) -> Result<Arc<PriceSnapshot>, ServiceError> {
        let pass = RefreshPass {
            fetcher: Arc::clone(&self.fetcher),
            store: Arc::clone(&self.store),
            cache: self.cache.clone(),
        };

        match tokio::spawn(pass.run()).await {
            Ok(result) => result,
            Err(join_error) if join_error.is_panic() => {
                std::panic::resume_unwind(join_error.into_panic())
            }
            Err(join_error) => Err(ServiceError::TaskFailed {
                operation: "refresh",
                detail: join_error.to_string(),
            }),
        }
    }

    /// Latest price of `pair` from the cached snapshot.
    pub async fn current_price(&self, pair: CurrencyPair) -> Result<CurrentPrice, ServiceError> {
        let snapshot = self.refresh().await?;
        let price = snapshot.price(pair).ok_or_else(|| {
            FetchError::new(
                FetchErrorKind::MissingPrice,
                format!("no price captured for '{pair}'"),
            )
        })?;
        Ok(CurrentPrice {
            pair,
            price,
            timestamp: snapshot.captured_at,
        })
    }

    /// Samples of `pair` inside `window`, newest first.
    pub async fn history(
        &self,
        pair: CurrencyPair,
        window: HistoryWindow,
    ) -> Result<Arc<Vec<PriceSample>>, ServiceError> {
        let key = CacheKey::History {
            pair,
            hours: window.as_hours(),
        };
        let (value, _) = self
            .cache
            .get_or_try_insert_with(key.clone(), || async {
                let samples = self.store.read_history(pair, window).await?;
                Ok::<_, ServiceError>(CachedValue::History(Arc::new(samples)))
            })
            .await?;

        match value {
            CachedValue::History(samples) => Ok(samples),
            _ => Err(mismatch(&key)),
        }
    }

    /// 1-based volatility rank of `pair`; `None` with fewer than two samples.
    pub async fn volatility_rank(&self, pair: CurrencyPair) -> Result<Option<u32>, ServiceError> {
        let key = CacheKey::Rank { pair };
        let (value, _) = self
            .cache
            .get_or_try_insert_with(key.clone(), || async {
                let rank = self.ranker.rank(pair).await?;
                Ok::<_, ServiceError>(CachedValue::Rank(rank))
            })
            .await?;

        match value {
            CachedValue::Rank(rank) => Ok(rank),
            _ => Err(mismatch(&key)),
        }
    }

    /// Ranking of every pair with enough samples.
    pub async fn volatility_ranking(&self) -> Result<Arc<VolatilityRanking>, ServiceError> {
        let (value, _) = self
            .cache
            .get_or_try_insert_with(CacheKey::Ranking, || async {
                let ranking = self.ranker.ranking().await?;
                Ok::<_, ServiceError>(CachedValue::Ranking(Arc::new(ranking)))
            })
            .await?;

        match value {
            CachedValue::Ranking(ranking) => Ok(ranking),
            _ => Err(mismatch(&CacheKey::Ranking)),
        }
    }

    /// History plus rank, as served to readers.
    pub async fn price_history(
        &self,
        pair: CurrencyPair,
        window: HistoryWindow,
    ) -> Result<PriceHistory, ServiceError> {
        let prices = self.history(pair, window).await?;
        let volatility_rank = self.volatility_rank(pair).await?;
        Ok(PriceHistory {
            pair,
            prices: prices.as_ref().clone(),
            volatility_rank,
        })
    }
}

/// Owned handles for one cached fetch-and-store.
struct RefreshPass {
    fetcher: Arc<QuoteFetcher>,
    store: Arc<dyn PriceStore>,
    cache: ServiceCache,
}

impl RefreshPass {
    async fn run(self) -> Result<Arc<PriceSnapshot>, ServiceError> {
        let (value, status) = self
            .cache
            .get_or_try_insert_with(CacheKey::Refresh, || async {
                let snapshot = fetch_and_store(&self.fetcher, self.store.as_ref()).await?;
                Ok::<_, ServiceError>(CachedValue::Snapshot(Arc::new(snapshot)))
            })
            .await?;

        let snapshot = match value {
            CachedValue::Snapshot(snapshot) => snapshot,
            _ => return Err(mismatch(&CacheKey::Refresh)),
        };

        if status == CacheStatus::Miss {
            let dropped = self
                .cache
                .invalidate_where(CacheKey::depends_on_history)
                .await;
            info!(
                samples = snapshot.len(),
                captured_at = %snapshot.captured_at,
                invalidated = dropped,
                "stored price snapshot"
            );
        }

        Ok(snapshot)
    }
}

async fn fetch_and_store(
    fetcher: &QuoteFetcher,
    store: &dyn PriceStore,
) -> Result<PriceSnapshot, ServiceError> {
    let prices = fetcher.fetch_all().await?;
    let captured_at = store.append(&prices).await?;
    Ok(PriceSnapshot {
        captured_at,
        prices,
    })
}

fn mismatch(key: &CacheKey) -> ServiceError {
    ServiceError::CacheMismatch {
        key: key.to_string(),
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PAIRS;

    #[test]
    fn cache_keys_render_for_logs() {
        let key = CacheKey::History {
            pair: PAIRS[0],
            hours: 24,
        };
        assert_eq!(key.to_string(), "history:btc/usd:24h");
        assert_eq!(CacheKey::Rank { pair: PAIRS[6] }.to_string(), "rank:eth/btc");
        assert!(!CacheKey::Refresh.depends_on_history());
        assert!(CacheKey::Ranking.depends_on_history());
    }
}

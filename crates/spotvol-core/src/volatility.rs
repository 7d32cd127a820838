//! Relative volatility ranking across catalog pairs.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::store::{PriceStore, StorageError};
use crate::{CurrencyPair, UtcDateTime};

/// Trailing window the ranking is computed over.
pub const RANKING_WINDOW_HOURS: u32 = 24;

/// Dispersion of one pair's prices over the ranking window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairVolatility {
    pub pair: CurrencyPair,
    pub sample_count: u64,
    pub std_dev: f64,
}

/// One row of a ranking; rank 1 is the most volatile pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPair {
    pub rank: u32,
    pub pair: CurrencyPair,
    pub std_dev: f64,
    pub sample_count: u64,
}

/// Point-in-time ranking. Pairs with fewer than two samples are absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VolatilityRanking {
    entries: Vec<RankedPair>,
}

impl VolatilityRanking {
    /// Rank pairs by descending standard deviation.
    ///
    /// Equal deviations share a rank and the following rank is skipped
    /// (1, 1, 3). Ties are listed in canonical pair-string order.
    pub fn from_dispersion(mut rows: Vec<PairVolatility>) -> Self {
        rows.retain(|row| row.sample_count > 1 && row.std_dev.is_finite());
        rows.sort_by(|left, right| {
            right
                .std_dev
                .total_cmp(&left.std_dev)
                .then_with(|| compare_pair_strings(left.pair, right.pair))
        });

        let mut entries: Vec<RankedPair> = Vec::with_capacity(rows.len());
        for (position, row) in rows.into_iter().enumerate() {
            let rank = match entries.last() {
                Some(previous) if previous.std_dev == row.std_dev => previous.rank,
                _ => position as u32 + 1,
            };
            entries.push(RankedPair {
                rank,
                pair: row.pair,
                std_dev: row.std_dev,
                sample_count: row.sample_count,
            });
        }

        Self { entries }
    }

    pub fn rank_of(&self, pair: CurrencyPair) -> Option<u32> {
        self.entries
            .iter()
            .find(|entry| entry.pair == pair)
            .map(|entry| entry.rank)
    }

    pub fn entries(&self) -> &[RankedPair] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn compare_pair_strings(left: CurrencyPair, right: CurrencyPair) -> Ordering {
    left.to_string().cmp(&right.to_string())
}

/// Computes rankings from stored history on every call.
#[derive(Clone)]
pub struct VolatilityRanker {
    store: Arc<dyn PriceStore>,
    window_hours: u32,
}

impl VolatilityRanker {
    pub fn new(store: Arc<dyn PriceStore>) -> Self {
        Self {
            store,
            window_hours: RANKING_WINDOW_HOURS,
        }
    }

    pub async fn ranking_at(&self, now: UtcDateTime) -> Result<VolatilityRanking, StorageError> {
        let rows = self
            .store
            .dispersion(now.minus_hours(self.window_hours))
            .await?;
        Ok(VolatilityRanking::from_dispersion(rows))
    }

    pub async fn ranking(&self) -> Result<VolatilityRanking, StorageError> {
        self.ranking_at(UtcDateTime::now()).await
    }

    pub async fn rank(&self, pair: CurrencyPair) -> Result<Option<u32>, StorageError> {
        Ok(self.ranking().await?.rank_of(pair))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PAIRS;

    fn row(pair: CurrencyPair, std_dev: f64, sample_count: u64) -> PairVolatility {
        PairVolatility {
            pair,
            sample_count,
            std_dev,
        }
    }

    #[test]
    fn higher_deviation_ranks_first() {
        let ranking = VolatilityRanking::from_dispersion(vec![
            row(PAIRS[0], 10.0, 5),
            row(PAIRS[1], 250.0, 5),
            row(PAIRS[2], 3.5, 5),
        ]);

        assert_eq!(ranking.rank_of(PAIRS[1]), Some(1));
        assert_eq!(ranking.rank_of(PAIRS[0]), Some(2));
        assert_eq!(ranking.rank_of(PAIRS[2]), Some(3));
        assert_eq!(ranking.rank_of(PAIRS[3]), None);
    }

    #[test]
    fn ties_share_a_rank_and_skip_the_next() {
        let ranking = VolatilityRanking::from_dispersion(vec![
            row(PAIRS[5], 1.0, 3),
            row(PAIRS[1], 7.0, 3),
            row(PAIRS[0], 7.0, 3),
        ]);

        let ranks: Vec<(String, u32)> = ranking
            .entries()
            .iter()
            .map(|entry| (entry.pair.to_string(), entry.rank))
            .collect();
        assert_eq!(
            ranks,
            vec![
                (String::from("btc/usd"), 1),
                (String::from("eth/usd"), 1),
                (String::from("ada/usd"), 3),
            ]
        );
    }

    #[test]
    fn single_sample_pairs_are_absent() {
        let ranking = VolatilityRanking::from_dispersion(vec![
            row(PAIRS[0], 0.0, 1),
            row(PAIRS[1], 2.0, 2),
        ]);
        assert_eq!(ranking.len(), 1);
        assert_eq!(ranking.rank_of(PAIRS[0]), None);
        assert_eq!(ranking.rank_of(PAIRS[1]), Some(1));
    }
}

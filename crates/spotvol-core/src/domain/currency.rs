//! Fixed registry of supported trading pairs.
//!
//! Adding or removing a currency is a change to one enum and its `match`
//! arms; the compiler flags every lookup that needs updating.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::CatalogError;

/// Currencies that may appear on the base side of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseCurrency {
    Btc,
    Eth,
    Sol,
    Etc,
    Dot,
    Ada,
    Bnt,
}

impl BaseCurrency {
    pub const ALL: [Self; 7] = [
        Self::Btc,
        Self::Eth,
        Self::Sol,
        Self::Etc,
        Self::Dot,
        Self::Ada,
        Self::Bnt,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Btc => "btc",
            Self::Eth => "eth",
            Self::Sol => "sol",
            Self::Etc => "etc",
            Self::Dot => "dot",
            Self::Ada => "ada",
            Self::Bnt => "bnt",
        }
    }

    /// The price source's identifier for this asset.
    pub const fn external_id(self) -> ExternalId {
        ExternalId(match self {
            Self::Btc => "bitcoin",
            Self::Eth => "ethereum",
            Self::Sol => "solana",
            Self::Etc => "ethereum-classic",
            Self::Dot => "polkadot",
            Self::Ada => "cardano",
            Self::Bnt => "bancor",
        })
    }

    pub fn parse(input: &str) -> Result<Self, CatalogError> {
        let normalized = input.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|currency| currency.as_str() == normalized)
            .ok_or_else(|| CatalogError::UnsupportedCurrency {
                symbol: input.to_owned(),
            })
    }
}

impl Display for BaseCurrency {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Currencies that may appear on the quote side of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteCurrency {
    Usd,
    Eur,
    Btc,
}

impl QuoteCurrency {
    pub const ALL: [Self; 3] = [Self::Usd, Self::Eur, Self::Btc];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Usd => "usd",
            Self::Eur => "eur",
            Self::Btc => "btc",
        }
    }

    pub fn parse(input: &str) -> Result<Self, CatalogError> {
        let normalized = input.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|currency| currency.as_str() == normalized)
            .ok_or_else(|| CatalogError::UnsupportedCurrency {
                symbol: input.to_owned(),
            })
    }
}

impl Display for QuoteCurrency {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier the external price source uses for an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct ExternalId(&'static str);

impl ExternalId {
    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl Display for ExternalId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl From<ExternalId> for String {
    fn from(value: ExternalId) -> Self {
        value.0.to_owned()
    }
}

/// Resolve a base-currency symbol to the price source's identifier.
pub fn external_id(symbol: &str) -> Result<ExternalId, CatalogError> {
    BaseCurrency::parse(symbol).map(BaseCurrency::external_id)
}

/// A catalog-registered trading pair.
///
/// Values can only be obtained from [`PAIRS`] or by parsing, so every
/// `CurrencyPair` in circulation is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyPair {
    base: BaseCurrency,
    quote: QuoteCurrency,
}

/// Supported pairs in display order.
pub const PAIRS: [CurrencyPair; 8] = [
    CurrencyPair::new(BaseCurrency::Btc, QuoteCurrency::Usd),
    CurrencyPair::new(BaseCurrency::Eth, QuoteCurrency::Usd),
    CurrencyPair::new(BaseCurrency::Sol, QuoteCurrency::Usd),
    CurrencyPair::new(BaseCurrency::Etc, QuoteCurrency::Eur),
    CurrencyPair::new(BaseCurrency::Dot, QuoteCurrency::Usd),
    CurrencyPair::new(BaseCurrency::Ada, QuoteCurrency::Usd),
    CurrencyPair::new(BaseCurrency::Eth, QuoteCurrency::Btc),
    CurrencyPair::new(BaseCurrency::Bnt, QuoteCurrency::Btc),
];

impl CurrencyPair {
    const fn new(base: BaseCurrency, quote: QuoteCurrency) -> Self {
        Self { base, quote }
    }

    /// Look up a pair from its two symbols. Both symbols must be known and
    /// the combination must be registered in [`PAIRS`].
    pub fn from_parts(base: &str, quote: &str) -> Result<Self, CatalogError> {
        let not_found = || CatalogError::PairNotFound {
            pair: format!("{}/{}", base.trim(), quote.trim()),
        };
        let base = BaseCurrency::parse(base).map_err(|_| not_found())?;
        let quote = QuoteCurrency::parse(quote).map_err(|_| not_found())?;
        Self::from_currencies(base, quote).ok_or_else(not_found)
    }

    /// Parse the canonical `"{base}/{quote}"` form.
    pub fn parse(input: &str) -> Result<Self, CatalogError> {
        match input.split_once('/') {
            Some((base, quote)) => Self::from_parts(base, quote),
            None => Err(CatalogError::PairNotFound {
                pair: input.to_owned(),
            }),
        }
    }

    pub fn from_currencies(base: BaseCurrency, quote: QuoteCurrency) -> Option<Self> {
        let candidate = Self::new(base, quote);
        PAIRS.contains(&candidate).then_some(candidate)
    }

    pub const fn base(self) -> BaseCurrency {
        self.base
    }

    pub const fn quote(self) -> QuoteCurrency {
        self.quote
    }

    pub fn external_id(self) -> ExternalId {
        self.base.external_id()
    }
}

impl Display for CurrencyPair {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl TryFrom<String> for CurrencyPair {
    type Error = CatalogError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for CurrencyPair {
    type Error = CatalogError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<CurrencyPair> for String {
    fn from(value: CurrencyPair) -> Self {
        value.to_string()
    }
}

/// Catalog pairs grouped by quote currency, in catalog order.
///
/// Each group becomes one batched request to the price source.
pub fn pairs_by_quote() -> Vec<(QuoteCurrency, Vec<CurrencyPair>)> {
    let mut groups: Vec<(QuoteCurrency, Vec<CurrencyPair>)> = Vec::new();
    for pair in PAIRS {
        match groups.iter_mut().find(|(quote, _)| *quote == pair.quote) {
            Some((_, members)) => members.push(pair),
            None => groups.push((pair.quote, vec![pair])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_strings_are_lowercase_slash_joined() {
        let rendered: Vec<String> = PAIRS.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "btc/usd", "eth/usd", "sol/usd", "etc/eur", "dot/usd", "ada/usd", "eth/btc",
                "bnt/btc"
            ]
        );
    }

    #[test]
    fn base_and_quote_are_validated_separately() {
        assert_eq!(QuoteCurrency::parse("btc"), Ok(QuoteCurrency::Btc));
        assert_eq!(BaseCurrency::parse("btc"), Ok(BaseCurrency::Btc));
        assert!(matches!(
            QuoteCurrency::parse("eth"),
            Err(CatalogError::UnsupportedCurrency { .. })
        ));
        assert!(matches!(
            BaseCurrency::parse("usd"),
            Err(CatalogError::UnsupportedCurrency { .. })
        ));
    }

    #[test]
    fn unregistered_combination_is_not_found() {
        let err = CurrencyPair::from_parts("sol", "eur").expect_err("not in catalog");
        assert_eq!(
            err,
            CatalogError::PairNotFound {
                pair: String::from("sol/eur")
            }
        );
        assert!(CurrencyPair::parse("xyz/usd").is_err());
        assert!(CurrencyPair::parse("btcusd").is_err());
    }

    #[test]
    fn parse_is_case_insensitive() {
        let pair = CurrencyPair::parse("BTC/Usd").expect("known pair");
        assert_eq!(pair, PAIRS[0]);
    }

    #[test]
    fn external_id_lookup() {
        assert_eq!(external_id("ETC").expect("known").as_str(), "ethereum-classic");
        assert_eq!(
            external_id("doge"),
            Err(CatalogError::UnsupportedCurrency {
                symbol: String::from("doge")
            })
        );
    }

    #[test]
    fn groups_follow_catalog_order() {
        let groups = pairs_by_quote();
        let quotes: Vec<QuoteCurrency> = groups.iter().map(|(quote, _)| *quote).collect();
        assert_eq!(
            quotes,
            vec![QuoteCurrency::Usd, QuoteCurrency::Eur, QuoteCurrency::Btc]
        );
        assert_eq!(groups[0].1.len(), 5);
        assert_eq!(groups[2].1, vec![PAIRS[6], PAIRS[7]]);
    }
}

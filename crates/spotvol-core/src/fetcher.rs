//! Batched retrieval of current prices from the external price source.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use tracing::{debug, error};

use crate::http_client::{HttpAuth, HttpClient, HttpError, HttpRequest};
use crate::{pairs_by_quote, validate_price, CatalogError, PriceMap, QuoteCurrency};

/// Default public endpoint of the price source.
pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Header carrying the optional price source API key.
pub const API_KEY_HEADER: &str = "x-cg-demo-api-key";

/// Failure category of a quote fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Transport,
    Timeout,
    Status,
    Decode,
    MissingPrice,
    InvalidPrice,
    UnsupportedCurrency,
}

impl FetchErrorKind {
    pub const fn code(self) -> &'static str {
        match self {
            Self::Transport => "upstream.transport",
            Self::Timeout => "upstream.timeout",
            Self::Status => "upstream.status",
            Self::Decode => "upstream.decode",
            Self::MissingPrice => "upstream.missing_price",
            Self::InvalidPrice => "upstream.invalid_price",
            Self::UnsupportedCurrency => "upstream.unsupported_currency",
        }
    }
}

/// A fetch that failed as a whole; no partial result accompanies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    kind: FetchErrorKind,
    message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub const fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.code(), self.message)
    }
}

impl std::error::Error for FetchError {}

impl From<HttpError> for FetchError {
    fn from(value: HttpError) -> Self {
        let kind = if value.is_timeout() {
            FetchErrorKind::Timeout
        } else {
            FetchErrorKind::Transport
        };
        Self::new(kind, value.message())
    }
}

impl From<CatalogError> for FetchError {
    fn from(value: CatalogError) -> Self {
        Self::new(FetchErrorKind::UnsupportedCurrency, value.to_string())
    }
}

/// `{external_id: {quote: price}}` as returned by `/simple/price`.
type SimplePriceBody = HashMap<String, HashMap<String, serde_json::Value>>;

/// Fetches current prices for every catalog pair.
#[derive(Clone)]
pub struct QuoteFetcher {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    auth: HttpAuth,
    timeout_ms: u64,
}

impl QuoteFetcher {
    pub fn new(http_client: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            auth: HttpAuth::None,
            timeout_ms: 10_000,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<&str>) -> Self {
        self.auth = HttpAuth::optional_header(API_KEY_HEADER, api_key);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Current price of every catalog pair.
    ///
    /// Issues one request per distinct quote currency. Any failure aborts the
    /// whole fetch.
    pub async fn fetch_all(&self) -> Result<PriceMap, FetchError> {
        let mut prices = PriceMap::new();
        for (quote, pairs) in pairs_by_quote() {
            let mut ids = Vec::with_capacity(pairs.len());
            for pair in &pairs {
                ids.push(pair.external_id());
            }

            let body = self.fetch_group(quote, &ids).await.map_err(|err| {
                error!(quote = %quote, code = err.code(), error = %err, "price fetch failed");
                err
            })?;

            for (pair, id) in pairs.iter().zip(ids) {
                let price = extract_price(&body, id.as_str(), quote).map_err(|err| {
                    error!(pair = %pair, code = err.code(), error = %err, "price fetch failed");
                    err
                })?;
                prices.insert(*pair, price);
            }
        }

        Ok(prices)
    }

    async fn fetch_group(
        &self,
        quote: QuoteCurrency,
        ids: &[crate::ExternalId],
    ) -> Result<SimplePriceBody, FetchError> {
        let joined = ids
            .iter()
            .map(|id| id.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let request = HttpRequest::get(format!("{}/simple/price", self.base_url))
            .with_query("ids", joined)
            .with_query("vs_currencies", quote.as_str())
            .with_header("accept", "application/json")
            .with_auth(&self.auth)
            .with_timeout_ms(self.timeout_ms);

        debug!(quote = %quote, ids = ids.len(), "requesting prices");
        let response = self.http_client.execute(request).await?;
        if !response.is_success() {
            return Err(FetchError::new(
                FetchErrorKind::Status,
                format!("price source returned status {}", response.status),
            ));
        }

        serde_json::from_str(&response.body).map_err(|e| {
            FetchError::new(
                FetchErrorKind::Decode,
                format!("failed to decode price response: {e}"),
            )
        })
    }
}

fn extract_price(body: &SimplePriceBody, id: &str, quote: QuoteCurrency) -> Result<f64, FetchError> {
    let value = body
        .get(id)
        .and_then(|quotes| quotes.get(quote.as_str()))
        .ok_or_else(|| {
            FetchError::new(
                FetchErrorKind::MissingPrice,
                format!("no '{quote}' price for '{id}' in response"),
            )
        })?;

    let price = value.as_f64().ok_or_else(|| {
        FetchError::new(
            FetchErrorKind::InvalidPrice,
            format!("price for '{id}' in '{quote}' is not a number: {value}"),
        )
    })?;

    validate_price("price", price).map_err(|e| {
        FetchError::new(
            FetchErrorKind::InvalidPrice,
            format!("price for '{id}' in '{quote}' rejected: {e}"),
        )
    })?;

    Ok(price)
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    use super::*;
    use crate::http_client::HttpResponse;
    use crate::{CurrencyPair, PAIRS};

    struct RecordingHttpClient {
        responses: Mutex<Vec<Result<HttpResponse, HttpError>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl RecordingHttpClient {
        fn with_responses(responses: Vec<Result<HttpResponse, HttpError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn recorded_requests(&self) -> Vec<HttpRequest> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .clone()
        }
    }

    impl HttpClient for RecordingHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .push(request);
            let mut responses = self
                .responses
                .lock()
                .expect("response queue should not be poisoned");
            let response = if responses.is_empty() {
                Err(HttpError::new("no scripted response"))
            } else {
                responses.remove(0)
            };
            Box::pin(async move { response })
        }
    }

    fn catalog_responses() -> Vec<Result<HttpResponse, HttpError>> {
        vec![
            Ok(HttpResponse::ok_json(
                r#"{"bitcoin":{"usd":50000},"ethereum":{"usd":2000.5},"solana":{"usd":100},
                    "polkadot":{"usd":7.25},"cardano":{"usd":0.5}}"#,
            )),
            Ok(HttpResponse::ok_json(r#"{"ethereum-classic":{"eur":18.1}}"#)),
            Ok(HttpResponse::ok_json(
                r#"{"ethereum":{"btc":0.04},"bancor":{"btc":0.00001}}"#,
            )),
        ]
    }

    #[tokio::test]
    async fn fetch_all_issues_one_request_per_quote_currency() {
        let client = Arc::new(RecordingHttpClient::with_responses(catalog_responses()));
        let fetcher = QuoteFetcher::new(client.clone(), "https://example.test/api/v3/");

        let prices = fetcher.fetch_all().await.expect("fetch should succeed");
        assert_eq!(prices.len(), PAIRS.len());
        assert_eq!(
            prices.get(&CurrencyPair::parse("eth/btc").expect("pair")),
            Some(&0.04)
        );
        assert_eq!(
            prices.get(&CurrencyPair::parse("etc/eur").expect("pair")),
            Some(&18.1)
        );

        let requests = client.recorded_requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].url, "https://example.test/api/v3/simple/price");
        assert_eq!(
            requests[0].query_value("ids"),
            Some("bitcoin,ethereum,solana,polkadot,cardano")
        );
        assert_eq!(requests[0].query_value("vs_currencies"), Some("usd"));
        assert_eq!(requests[1].query_value("vs_currencies"), Some("eur"));
        assert_eq!(requests[2].query_value("ids"), Some("ethereum,bancor"));
        assert_eq!(
            requests[0].headers.get("accept").map(String::as_str),
            Some("application/json")
        );
        assert!(!requests[0].headers.contains_key(API_KEY_HEADER));
    }

    #[tokio::test]
    async fn api_key_is_sent_as_header() {
        let client = Arc::new(RecordingHttpClient::with_responses(catalog_responses()));
        let fetcher = QuoteFetcher::new(client.clone(), DEFAULT_BASE_URL)
            .with_api_key(Some("demo-key"))
            .with_timeout_ms(2_500);

        fetcher.fetch_all().await.expect("fetch should succeed");
        let requests = client.recorded_requests();
        assert!(requests.iter().all(|request| {
            request.headers.get(API_KEY_HEADER).map(String::as_str) == Some("demo-key")
                && request.timeout_ms == 2_500
        }));
    }

    #[tokio::test]
    async fn failure_in_a_later_group_aborts_the_whole_fetch() {
        let mut responses = catalog_responses();
        responses[1] = Ok(HttpResponse {
            status: 429,
            body: String::from("{}"),
        });
        let client = Arc::new(RecordingHttpClient::with_responses(responses));
        let fetcher = QuoteFetcher::new(client.clone(), DEFAULT_BASE_URL);

        let err = fetcher.fetch_all().await.expect_err("status must fail");
        assert_eq!(err.kind(), FetchErrorKind::Status);
        assert_eq!(err.code(), "upstream.status");
        assert_eq!(client.recorded_requests().len(), 2);
    }

    #[tokio::test]
    async fn missing_entry_is_an_error() {
        let mut responses = catalog_responses();
        responses[2] = Ok(HttpResponse::ok_json(r#"{"ethereum":{"btc":0.04}}"#));
        let fetcher = QuoteFetcher::new(
            Arc::new(RecordingHttpClient::with_responses(responses)),
            DEFAULT_BASE_URL,
        );

        let err = fetcher.fetch_all().await.expect_err("bancor missing");
        assert_eq!(err.kind(), FetchErrorKind::MissingPrice);
        assert!(err.message().contains("bancor"));
    }

    #[tokio::test]
    async fn negative_and_malformed_prices_are_rejected() {
        let mut responses = catalog_responses();
        responses[1] = Ok(HttpResponse::ok_json(r#"{"ethereum-classic":{"eur":-1}}"#));
        let fetcher = QuoteFetcher::new(
            Arc::new(RecordingHttpClient::with_responses(responses)),
            DEFAULT_BASE_URL,
        );
        let err = fetcher.fetch_all().await.expect_err("negative price");
        assert_eq!(err.kind(), FetchErrorKind::InvalidPrice);

        let fetcher = QuoteFetcher::new(
            Arc::new(RecordingHttpClient::with_responses(vec![Ok(
                HttpResponse::ok_json("not json"),
            )])),
            DEFAULT_BASE_URL,
        );
        let err = fetcher.fetch_all().await.expect_err("bad body");
        assert_eq!(err.kind(), FetchErrorKind::Decode);
    }

    #[tokio::test]
    async fn transport_timeouts_are_classified() {
        let fetcher = QuoteFetcher::new(
            Arc::new(RecordingHttpClient::with_responses(vec![Err(
                HttpError::timeout("request timeout"),
            )])),
            DEFAULT_BASE_URL,
        );
        let err = fetcher.fetch_all().await.expect_err("timeout");
        assert_eq!(err.kind(), FetchErrorKind::Timeout);
        assert_eq!(err.code(), "upstream.timeout");
    }
}

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use spotvol_core::{
    HttpClient, HttpError, HttpRequest, HttpResponse, PriceService, ServiceConfig,
};
use spotvol_warehouse::{Warehouse, WarehouseConfig};

/// Canned price source keyed by quote currency.
pub struct StubSource {
    fail: bool,
    requests: AtomicUsize,
}

impl StubSource {
    pub fn healthy() -> Self {
        Self {
            fail: false,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl HttpClient for StubSource {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let body = match request.query_value("vs_currencies") {
            Some("usd") => {
                r#"{"bitcoin":{"usd":50000},"ethereum":{"usd":2000},"solana":{"usd":100},
                    "polkadot":{"usd":7},"cardano":{"usd":0.5}}"#
            }
            Some("eur") => r#"{"ethereum-classic":{"eur":18}}"#,
            _ => r#"{"ethereum":{"btc":0.04},"bancor":{"btc":0.00001}}"#,
        };
        let response = if self.fail {
            HttpResponse {
                status: 500,
                body: String::from("upstream down"),
            }
        } else {
            HttpResponse::ok_json(body)
        };
        Box::pin(async move { Ok(response) })
    }
}

/// Service over a fresh temp warehouse and the given stub source.
pub fn service_with_source(
    temp: &tempfile::TempDir,
    source: StubSource,
) -> (Arc<PriceService>, Arc<StubSource>, Warehouse) {
    service_with_config(temp, source, &ServiceConfig::default())
}

pub fn service_with_config(
    temp: &tempfile::TempDir,
    source: StubSource,
    config: &ServiceConfig,
) -> (Arc<PriceService>, Arc<StubSource>, Warehouse) {
    let warehouse = Warehouse::open(WarehouseConfig::at_path(
        temp.path().join("data").join("prices.duckdb"),
    ))
    .expect("warehouse open");
    let source = Arc::new(source);
    let service = PriceService::with_http_client(
        config,
        Arc::clone(&source) as Arc<dyn HttpClient>,
        warehouse.clone(),
    );
    (Arc::new(service), source, warehouse)
}

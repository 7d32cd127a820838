//! HTTP read API.
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /api/prices/:base/:quote/current` | `{pair, price, timestamp}` |
//! | `GET /api/prices/:base/:quote/history?hours=N` | `{pair, prices, volatility_rank}` |
//! | `GET /api/pairs` | Supported pairs |
//! | `GET /api/volatility` | Current ranking |
//!
//! Unknown pairs are rejected before any storage access.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use spotvol_core::{
    BaseCurrency, CatalogError, CurrencyPair, CurrentPrice, ExternalId, HistoryWindow,
    PriceHistory, PriceService, QuoteCurrency, ServiceError, VolatilityRanking, PAIRS,
};
use tracing::warn;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PriceService>,
}

pub fn router(service: Arc<PriceService>) -> Router {
    Router::new()
        .route("/api/pairs", get(list_pairs))
        .route("/api/volatility", get(volatility_ranking))
        .route("/api/prices/:base/:quote/current", get(current_price))
        .route("/api/prices/:base/:quote/history", get(price_history))
        .with_state(AppState { service })
}

/// One catalog entry as listed by `/api/pairs`.
#[derive(Debug, Clone, Serialize)]
pub struct PairListing {
    pub pair: CurrencyPair,
    pub base: BaseCurrency,
    pub quote: QuoteCurrency,
    pub external_id: ExternalId,
}

pub fn pair_listing() -> Vec<PairListing> {
    PAIRS
        .iter()
        .map(|pair| PairListing {
            pair: *pair,
            base: pair.base(),
            quote: pair.quote(),
            external_id: pair.external_id(),
        })
        .collect()
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub hours: Option<u32>,
}

/// GET /api/pairs
async fn list_pairs() -> Json<Vec<PairListing>> {
    Json(pair_listing())
}

/// GET /api/volatility
async fn volatility_ranking(
    State(state): State<AppState>,
) -> Result<Json<VolatilityRanking>, ApiError> {
    let ranking = state.service.volatility_ranking().await?;
    Ok(Json(ranking.as_ref().clone()))
}

/// GET /api/prices/:base/:quote/current
async fn current_price(
    State(state): State<AppState>,
    Path((base, quote)): Path<(String, String)>,
) -> Result<Json<CurrentPrice>, ApiError> {
    let pair = state.service.resolve_pair(&base, &quote)?;
    Ok(Json(state.service.current_price(pair).await?))
}

/// GET /api/prices/:base/:quote/history
async fn price_history(
    State(state): State<AppState>,
    Path((base, quote)): Path<(String, String)>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<PriceHistory>, ApiError> {
    let pair = state.service.resolve_pair(&base, &quote)?;
    let window = match query.hours {
        Some(hours) => HistoryWindow::hours(hours).map_err(ServiceError::from)?,
        None => state.service.default_window(),
    };
    Ok(Json(state.service.price_history(pair, window).await?))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

/// Service error rendered as a JSON response.
#[derive(Debug)]
pub struct ApiError(ServiceError);

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            ServiceError::Catalog(CatalogError::PairNotFound { .. })
            | ServiceError::Catalog(CatalogError::UnsupportedCurrency { .. }) => {
                StatusCode::NOT_FOUND
            }
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::CacheMismatch { .. } | ServiceError::TaskFailed { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(status = status.as_u16(), code = self.0.code(), error = %self.0, "request failed");
        }
        let body = ErrorBody {
            code: self.0.code(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

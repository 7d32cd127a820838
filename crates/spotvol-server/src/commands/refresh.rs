use spotvol_core::PriceService;

use crate::error::ServerError;

use super::print_json;

/// Fetch and store one snapshot, bypassing the cache.
pub async fn run(service: &PriceService, pretty: bool) -> Result<(), ServerError> {
    let snapshot = service.fetch_and_store().await?;
    print_json(&snapshot, pretty)
}

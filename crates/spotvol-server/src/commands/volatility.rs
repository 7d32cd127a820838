use spotvol_core::PriceService;

use crate::error::ServerError;

use super::print_json;

pub async fn run(service: &PriceService, pretty: bool) -> Result<(), ServerError> {
    let ranking = service.volatility_ranking().await?;
    print_json(ranking.as_ref(), pretty)
}

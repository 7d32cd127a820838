use spotvol_core::{HistoryWindow, PriceService, ServiceError};

use crate::cli::HistoryArgs;
use crate::error::ServerError;

use super::print_json;

pub async fn run(args: &HistoryArgs, service: &PriceService, pretty: bool) -> Result<(), ServerError> {
    let pair = service.resolve_pair(&args.base, &args.quote)?;
    let window = match args.hours {
        Some(hours) => HistoryWindow::hours(hours).map_err(ServiceError::from)?,
        None => service.default_window(),
    };
    let history = service.price_history(pair, window).await?;
    print_json(&history, pretty)
}

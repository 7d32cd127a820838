mod history;
mod pairs;
mod refresh;
mod serve;
mod volatility;

use std::sync::Arc;

use serde::Serialize;
use spotvol_core::{PriceService, ServiceConfig};
use spotvol_warehouse::{Warehouse, WarehouseConfig};

use crate::cli::{Cli, Command};
use crate::error::ServerError;

pub async fn run(cli: &Cli) -> Result<(), ServerError> {
    match &cli.command {
        Command::Pairs => pairs::run(cli.pretty),
        Command::Serve(args) => serve::run(args, open_service(cli)?).await,
        Command::Refresh => refresh::run(&*open_service(cli)?, cli.pretty).await,
        Command::History(args) => history::run(args, &*open_service(cli)?, cli.pretty).await,
        Command::Volatility => volatility::run(&*open_service(cli)?, cli.pretty).await,
    }
}

fn open_service(cli: &Cli) -> Result<Arc<PriceService>, ServerError> {
    let warehouse_config = match &cli.db_path {
        Some(path) => WarehouseConfig::at_path(path.clone()),
        None => WarehouseConfig::default(),
    };
    let warehouse = Warehouse::open(warehouse_config)?;
    let config = ServiceConfig::from_env();
    Ok(Arc::new(PriceService::from_config(&config, warehouse)))
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), ServerError> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{rendered}");
    Ok(())
}

use crate::error::ServerError;
use crate::routes::pair_listing;

use super::print_json;

pub fn run(pretty: bool) -> Result<(), ServerError> {
    print_json(&pair_listing(), pretty)
}

//! Loads the ingredient catalog from a `name,measurement_unit` CSV file.
//!
//! ```sh
//! import-ingredients data/ingredients.csv
//! ```

use std::{env, error::Error, fs::File};

use diesel::prelude::*;
use log::{info, warn};

use foodgram::{cache, catalog, config::Config, query::MysqlRepository};

const DEFAULT_SOURCE: &str = "data/ingredients.csv";

fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let source = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_SOURCE.to_string());
    let config = Config::load()?;

    info!("reading ingredients from {}", source);
    let items = catalog::read_ingredient_csv(File::open(&source)?)?;

    let conn = MysqlConnection::establish(&config.database_url)?;
    let repo = MysqlRepository::new(&conn);
    let inserted = catalog::import_ingredients(&repo, &items)?;

    // the cached catalog is stale now
    match cache::build_pool(&config.redis_url) {
        Ok(pool) => cache::drop_catalog(&pool),
        Err(e) => warn!("could not reach redis to drop the cached catalog: {}", e),
    }

    info!("done, {} ingredients added", inserted);
    Ok(())
}

use std::io;

use actix_web::{middleware, web, App, HttpServer};
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};

use foodgram::{cache, config::Config, handlers};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::load().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    // set up database connection pool
    let manager = ConnectionManager::<MysqlConnection>::new(config.database_url.as_str());
    let pool = r2d2::Pool::builder()
        .max_size(config.db_pool_size)
        .build(manager)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    let redis_pool = cache::build_pool(&config.redis_url)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let circuit_breaker: handlers::CircuitBreakerType = failsafe::Config::new().build();

    let address = (config.host.clone(), config.port);
    log::info!("starting HTTP server at http://{}:{}", address.0, address.1);

    // Start HTTP server
    HttpServer::new(move || {
        App::new()
            // set up DB pool to be used with web::Data<Pool> extractor
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(redis_pool.clone()))
            .app_data(web::Data::new(circuit_breaker.clone()))
            .app_data(web::Data::new(config.clone()))
            .app_data(handlers::json_config())
            .app_data(handlers::query_config())
            .wrap(middleware::Logger::default())
            .configure(handlers::configure)
    })
    .bind(address)?
    .run()
    .await
}

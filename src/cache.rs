//! Redis copy of the ingredient catalog. The catalog only changes through
//! bulk imports, so one key holds the whole list. Every failure here is
//! logged and treated as a miss; storage stays the source of truth.

use std::ops::DerefMut;
use std::time::Duration;

use log::{debug, warn};
use r2d2_redis::r2d2;
use r2d2_redis::redis::{Commands, RedisError};
use r2d2_redis::RedisConnectionManager;

use crate::models::Ingredient;

pub type RedisPool = r2d2::Pool<RedisConnectionManager>;

const CACHE_POOL_MAX_OPEN: u32 = 16;
const CACHE_POOL_MIN_IDLE: u32 = 8;
const CACHE_POOL_EXPIRE_SECONDS: u64 = 60;
const CACHE_POOL_CONNECTION_TIMEOUT_MILLIS: u64 = 250;

pub const INGREDIENT_CATALOG_KEY: &str = "foodgram:ingredients:all";

/// Builds the pool without connecting, so the service starts without redis.
pub fn build_pool(redis_url: &str) -> Result<RedisPool, RedisError> {
    let manager = RedisConnectionManager::new(redis_url)?;
    Ok(r2d2::Pool::builder()
        .max_size(CACHE_POOL_MAX_OPEN)
        .max_lifetime(Some(Duration::from_secs(CACHE_POOL_EXPIRE_SECONDS)))
        .min_idle(Some(CACHE_POOL_MIN_IDLE))
        .connection_timeout(Duration::from_millis(CACHE_POOL_CONNECTION_TIMEOUT_MILLIS))
        .build_unchecked(manager))
}

pub fn cached_catalog(pool: &RedisPool) -> Option<Vec<Ingredient>> {
    let mut redis_conn = match pool.get() {
        Ok(conn) => conn,
        Err(e) => {
            warn!(
                "redis unavailable, reading ingredients from the database: {}",
                e
            );
            return None;
        }
    };
    let bytes: Result<Vec<u8>, RedisError> = redis_conn.deref_mut().get(INGREDIENT_CATALOG_KEY);
    match bytes {
        //redis answers a missing key with an empty value
        Ok(bytes) if bytes.is_empty() => {
            debug!("ingredient catalog not cached");
            None
        }
        Ok(bytes) => match Ingredient::catalog_from_u8(&bytes) {
            Ok(catalog) => Some(catalog),
            Err(e) => {
                warn!("dropping undecodable ingredient catalog: {}", e);
                drop_catalog(pool);
                None
            }
        },
        Err(e) => {
            warn!("failed to read ingredient catalog from redis: {}", e);
            None
        }
    }
}

pub fn store_catalog(pool: &RedisPool, catalog: &[Ingredient], ttl_seconds: usize) {
    let bytes = match Ingredient::catalog_to_u8(catalog) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("failed to encode ingredient catalog: {}", e);
            return;
        }
    };
    let stored = pool
        .get()
        .map_err(|e| e.to_string())
        .and_then(|mut redis_conn| {
            redis_conn
                .deref_mut()
                .set_ex::<_, _, ()>(INGREDIENT_CATALOG_KEY, bytes, ttl_seconds)
                .map_err(|e| e.to_string())
        });
    match stored {
        Ok(()) => debug!("cached {} ingredients for {}s", catalog.len(), ttl_seconds),
        Err(e) => warn!("failed to cache ingredient catalog: {}", e),
    }
}

pub fn drop_catalog(pool: &RedisPool) {
    let dropped = pool
        .get()
        .map_err(|e| e.to_string())
        .and_then(|mut redis_conn| {
            redis_conn
                .deref_mut()
                .del::<_, ()>(INGREDIENT_CATALOG_KEY)
                .map_err(|e| e.to_string())
        });
    if let Err(e) = dropped {
        warn!("failed to drop cached ingredient catalog: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // nothing listens on port 1
    const DEAD_REDIS: &str = "redis://127.0.0.1:1";

    #[test]
    fn unreachable_redis_is_a_miss() {
        let pool = build_pool(DEAD_REDIS).unwrap();
        let catalog = vec![Ingredient {
            id: 1,
            name: "соль".to_string(),
            measurement_unit: "г".to_string(),
        }];

        store_catalog(&pool, &catalog, 60);
        assert_eq!(cached_catalog(&pool), None);
        drop_catalog(&pool);
    }

    #[test]
    fn malformed_url_is_rejected() {
        assert!(build_pool("not a redis url").is_err());
    }
}

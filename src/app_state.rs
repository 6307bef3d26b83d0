use crate::{Config, utils::KeyedRateLimiter};
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
    pub rate_limiter: Arc<KeyedRateLimiter>,
}

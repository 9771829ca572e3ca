use std::sync::Arc;

use common::env_config::RateLimitConfig;
use middleware::limit::RequestLimiter;
use store::RateLimitStore;

pub mod store;
pub mod window;

pub mod middleware {
    pub mod limit;
}

pub use store::{FailoverStore, InMemoryStore, PgRateLimitStore, WindowHit};

pub fn middleware(
    store: Arc<dyn RateLimitStore>,
    config: RateLimitConfig,
    jwt_secret: String,
) -> RequestLimiter {
    RequestLimiter::new(store, config, jwt_secret)
}

use std::env;

use crate::error::{AppError, Res};

#[derive(Clone, Debug)]
/// Configuration struct for the server.
///
/// Holds everything `main` needs to bring the service up: database
/// connection details, JWT configuration, server bind parameters,
/// CORS settings, logging preferences, Stripe credentials and the
/// rate-limit ceilings.
pub struct Config {
    // environment
    pub environment: String, // development or production
    /// The URL of the database to connect to.
    pub database_url: String,
    /// Configuration for JWT (JSON Web Token) authentication.
    pub jwt_config: JwtConfig,
    /// The hostname or IP address the server will bind to.
    pub server_host: String,
    /// The port number the server will listen on.
    pub server_port: u16,
    /// The number of worker threads to spawn for handling requests.
    pub num_workers: usize,
    /// The allowed origin for CORS (Cross-Origin Resource Sharing).
    pub cors_allowed_origin: String,
    /// A boolean indicating whether console logging is enabled.
    pub console_logging_enabled: bool,
    /// Stripe secret key. Absent keys surface as `STRIPE_CONFIG_ERROR`
    /// at request time rather than preventing startup.
    pub stripe_secret_key: Option<String>,
    /// Stripe webhook signing secret, same request-time discipline.
    pub stripe_webhook_secret: Option<String>,
    /// URL the frontend sends lapsed subscribers to. Included in
    /// `SUBSCRIPTION_REQUIRED` responses.
    pub upgrade_url: String,
    /// Fixed-window rate limit ceilings.
    pub rate_limit: RateLimitConfig,
}

#[derive(Clone, Copy, Debug)]
/// Ceilings and window lengths for the fixed-window rate limiter.
///
/// These are configuration values, not constants: the global ceiling
/// is shared across all callers, the user ceiling applies per
/// identity key.
pub struct RateLimitConfig {
    pub global_max_requests: u32,
    pub global_window_ms: i64,
    pub user_max_requests: u32,
    pub user_window_ms: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            global_max_requests: 1000,
            global_window_ms: 60_000,
            user_max_requests: 100,
            user_window_ms: 60_000,
        }
    }
}

#[derive(Clone, Debug)]
/// Configuration for JSON Web Token (JWT) authentication.
pub struct JwtConfig {
    /// The secret key used to sign and verify JWTs.
    pub secret: String,
    /// The expiration time for JWTs in hours.
    pub expiration_hours: i64,
}

impl JwtConfig {
    /// Creates a new `JwtConfig` instance from environment variables.
    ///
    /// # Panics
    ///
    /// Panics if `JWT_SECRET` is not set, or if `JWT_EXPIRATION_HOURS`
    /// is set but is not a valid number.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        JwtConfig {
            secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .expect("JWT_EXPIRATION_HOURS must be a valid number"),
        }
    }
}

impl Config {
    /// Creates a new `Config` instance from environment variables.
    ///
    /// Required:
    /// - `DATABASE_URL`: Connection string for the database
    /// - `JWT_SECRET`: Secret key for JWT signing (via `JwtConfig::from_env()`)
    ///
    /// Optional (with defaults):
    /// - `IP`: Server host (default: "127.0.0.1")
    /// - `PORT`: Server port (default: 8080)
    /// - `WORKERS`: Number of worker threads (default: 4)
    /// - `CORS_ALLOWED_ORIGIN`: Allowed CORS origin (default: "http://localhost:5173")
    /// - `CONSOLE_LOGGING_ENABLED`: default true
    /// - `UPGRADE_URL`: default "http://localhost:5173/settings/billing"
    /// - `STRIPE_SECRET_KEY`, `STRIPE_WEBHOOK_SECRET`: optional; routes
    ///   that need them respond 500 `STRIPE_CONFIG_ERROR` when absent
    /// - `RATE_LIMIT_GLOBAL_MAX` (1000), `RATE_LIMIT_GLOBAL_WINDOW_MS` (60000),
    ///   `RATE_LIMIT_USER_MAX` (100), `RATE_LIMIT_USER_WINDOW_MS` (60000)
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            global_max_requests: env_parse("RATE_LIMIT_GLOBAL_MAX", defaults.global_max_requests),
            global_window_ms: env_parse("RATE_LIMIT_GLOBAL_WINDOW_MS", defaults.global_window_ms),
            user_max_requests: env_parse("RATE_LIMIT_USER_MAX", defaults.user_max_requests),
            user_window_ms: env_parse("RATE_LIMIT_USER_WINDOW_MS", defaults.user_window_ms),
        };

        Config {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            jwt_config: JwtConfig::from_env(),
            server_host: env::var("IP").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: env_parse("PORT", 8080),
            num_workers: env_parse("WORKERS", 4),
            cors_allowed_origin: env::var("CORS_ALLOWED_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            console_logging_enabled: env_parse("CONSOLE_LOGGING_ENABLED", true),
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").ok(),
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").ok(),
            upgrade_url: env::var("UPGRADE_URL")
                .unwrap_or_else(|_| "http://localhost:5173/settings/billing".to_string()),
            rate_limit,
        }
    }

    /// Stripe API key, or the request-time `STRIPE_CONFIG_ERROR`.
    pub fn stripe_secret_key(&self) -> Res<&str> {
        self.stripe_secret_key
            .as_deref()
            .ok_or(AppError::Config("STRIPE_CONFIG_ERROR"))
    }

    /// Webhook signing secret, or the request-time `STRIPE_CONFIG_ERROR`.
    pub fn stripe_webhook_secret(&self) -> Res<&str> {
        self.stripe_webhook_secret
            .as_deref()
            .ok_or(AppError::Config("STRIPE_CONFIG_ERROR"))
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

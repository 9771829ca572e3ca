mod cors;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer, web};
use chrono::Utc;
use common::{
    env_config::Config,
    http::{json_error_handler, not_found},
};
use db::{AccountStore, PgAccountStore};
use gate::{AuthMiddleware, SubscriptionGate};
use limiter::store::{FailoverStore, InMemoryStore, PgRateLimitStore, RateLimitStore};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // get env vars
    let config = Config::from_env();
    let config_data = Arc::new(config.clone());

    // get info
    let logger_enabled = config.console_logging_enabled;
    let is_production = config.environment == "production";
    let origin = config.cors_allowed_origin.clone();

    // init logger
    if logger_enabled {
        logger::setup().expect("Failed to set up logger");
    }

    // init db connection
    let mut options = sqlx::postgres::PgConnectOptions::from_str(&config.database_url)
        .expect("Failed to create options");
    if is_production {
        options = options.ssl_mode(sqlx::postgres::PgSslMode::Require);
    }
    let pool = Arc::new(
        sqlx::PgPool::connect_with(options)
            .await
            .expect("Failed to connect to database"),
    );

    sqlx::migrate!("./migrations")
        .run(&*pool)
        .await
        .expect("Failed to run migrations");

    let account_store: Arc<dyn AccountStore> = Arc::new(PgAccountStore::new(pool.clone()));

    // Postgres is the counter of record; the in-memory store only
    // serves requests while the database is unreachable.
    let fallback = Arc::new(InMemoryStore::new());
    let primary: Arc<dyn RateLimitStore> = Arc::new(PgRateLimitStore::new(pool.clone()));
    let rate_store: Arc<dyn RateLimitStore> =
        Arc::new(FailoverStore::new(Some(primary), fallback.clone()));

    // expired fallback windows are swept so the map stays bounded
    {
        let fallback = fallback.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(300));
            loop {
                tick.tick().await;
                fallback.sweep(Utc::now().timestamp_millis());
            }
        });
    }

    let rate_config = config.rate_limit;
    let jwt_secret = config.jwt_config.secret.clone();
    let upgrade_url = config.upgrade_url.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(limiter::middleware(
                rate_store.clone(),
                rate_config,
                jwt_secret.clone(),
            ))
            .wrap(cors::default(&origin))
            .wrap(logger::middleware(logger_enabled))
            .app_data(web::Data::new(config_data.clone()))
            .app_data(web::Data::from(account_store.clone()))
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .service(
                web::scope("/api")
                    .service(api_billing::mount::mount_public())
                    .service(
                        web::scope("/secured")
                            .wrap(AuthMiddleware::new(jwt_secret.clone()))
                            .service(api_billing::mount::mount_billing())
                            .service(api_billing::mount::mount_sub(SubscriptionGate::mutations(
                                account_store.clone(),
                                upgrade_url.clone(),
                            )))
                            .service(api_billing::mount::mount_premium(SubscriptionGate::strict(
                                account_store.clone(),
                                upgrade_url.clone(),
                            ))),
                    ),
            )
            .default_service(web::route().to(not_found))
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .workers(config.num_workers)
    .run()
    .await
}

//! Request-volume middleware: a shared global ceiling checked first,
//! then a per-identity ceiling. Runs before authentication, so the
//! identity key comes from the already-attached principal when one
//! exists, else from decoding the bearer token, else from the source
//! address.

use std::{future::Future, pin::Pin, rc::Rc, sync::Arc};

use actix_web::{
    Error, HttpResponse,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::{
        Method,
        header::{HeaderMap, HeaderName, HeaderValue},
    },
};
use chrono::Utc;
use common::{env_config::RateLimitConfig, jwt};
use futures::future::{Ready, ok};
use serde_json::json;

use crate::store::{RateLimitStore, WindowHit};
use crate::window::retry_after_secs;

const GLOBAL_KEY: &str = "global";

fn limit_header() -> HeaderName {
    HeaderName::from_static("x-ratelimit-limit")
}
fn remaining_header() -> HeaderName {
    HeaderName::from_static("x-ratelimit-remaining")
}
fn reset_header() -> HeaderName {
    HeaderName::from_static("x-ratelimit-reset")
}
fn retry_after_header() -> HeaderName {
    HeaderName::from_static("retry-after")
}

pub struct RequestLimiter {
    store: Arc<dyn RateLimitStore>,
    config: RateLimitConfig,
    jwt_secret: Rc<String>,
}

impl RequestLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, config: RateLimitConfig, jwt_secret: String) -> Self {
        Self {
            store,
            config,
            jwt_secret: Rc::new(jwt_secret),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestLimiter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Transform = RequestLimiterService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RequestLimiterService {
            service: Rc::new(service),
            store: self.store.clone(),
            config: self.config,
            jwt_secret: self.jwt_secret.clone(),
        })
    }
}

pub struct RequestLimiterService<S> {
    service: Rc<S>,
    store: Arc<dyn RateLimitStore>,
    config: RateLimitConfig,
    jwt_secret: Rc<String>,
}

impl<S, B> Service<ServiceRequest> for RequestLimiterService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = Rc::clone(&self.service);
        let store = self.store.clone();
        let config = self.config;
        let jwt_secret = self.jwt_secret.clone();

        Box::pin(async move {
            // CORS preflights are never counted.
            if req.method() == Method::OPTIONS {
                return srv.call(req).await.map(|res| res.map_into_boxed_body());
            }

            let now_ms = Utc::now().timestamp_millis();

            match store
                .hit(
                    GLOBAL_KEY,
                    config.global_max_requests,
                    config.global_window_ms,
                    now_ms,
                )
                .await
            {
                Ok(hit) if !hit.allowed => {
                    return Ok(limited_response(
                        req,
                        config.global_max_requests,
                        &hit,
                        now_ms,
                        "Server is receiving too many requests. Please try again later.",
                    ));
                }
                Ok(_) => {}
                // The limiter has no caller-visible error path.
                Err(e) => log::error!("Global rate-limit check failed: {}", e),
            }

            let key = identity_key(&req, &jwt_secret);
            let user_hit = match store
                .hit(
                    &key,
                    config.user_max_requests,
                    config.user_window_ms,
                    now_ms,
                )
                .await
            {
                Ok(hit) => Some(hit),
                Err(e) => {
                    log::error!("Rate-limit check failed for {}: {}", key, e);
                    None
                }
            };

            if let Some(hit) = &user_hit {
                if !hit.allowed {
                    return Ok(limited_response(
                        req,
                        config.user_max_requests,
                        hit,
                        now_ms,
                        "Too many requests. Please slow down.",
                    ));
                }
            }

            let mut res = srv.call(req).await.map(|res| res.map_into_boxed_body())?;
            if let Some(hit) = user_hit {
                set_rate_limit_headers(
                    res.headers_mut(),
                    config.user_max_requests,
                    &hit,
                );
            }
            Ok(res)
        })
    }
}

/// `user:<id>` for authenticated callers, else `ip:<addr>` with the
/// literal `unknown` fallback.
fn identity_key(req: &ServiceRequest, jwt_secret: &str) -> String {
    if let Some(principal) = jwt::principal(req) {
        return format!("user:{}", principal.user_id);
    }

    let bearer = req
        .headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    if let Some(token) = bearer {
        if let Ok(claims) = jwt::validate_jwt(token, jwt_secret) {
            return format!("user:{}", claims.sub);
        }
    }

    let ip = req
        .connection_info()
        .realip_remote_addr()
        .map(str::to_string)
        .unwrap_or_else(|| "unknown".to_string());
    format!("ip:{}", ip)
}

fn set_rate_limit_headers(headers: &mut HeaderMap, limit: u32, hit: &WindowHit) {
    set_header(headers, limit_header(), limit.to_string());
    set_header(headers, remaining_header(), hit.remaining(limit).to_string());
    set_header(headers, reset_header(), hit.reset_at_ms.to_string());
}

fn set_header(headers: &mut HeaderMap, name: HeaderName, value: String) {
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(name, value);
    }
}

fn limited_response(
    req: ServiceRequest,
    limit: u32,
    hit: &WindowHit,
    now_ms: i64,
    message: &str,
) -> ServiceResponse<actix_web::body::BoxBody> {
    let retry_after = retry_after_secs(hit.reset_at_ms, now_ms);
    let response = HttpResponse::TooManyRequests()
        .insert_header((limit_header(), limit.to_string()))
        .insert_header((remaining_header(), "0"))
        .insert_header((reset_header(), hit.reset_at_ms.to_string()))
        .insert_header((retry_after_header(), retry_after.to_string()))
        .json(json!({ "error": message, "retryAfter": retry_after }));

    let (req, _) = req.into_parts();
    ServiceResponse::new(req, response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FailingStore, FailoverStore, InMemoryStore};
    use actix_web::{App, Responder, http::StatusCode, test, web};
    use common::env_config::JwtConfig;
    use common::jwt::{ClaimsSpec, generate_jwt};
    use serde_json::Value;
    use uuid::Uuid;

    const SECRET: &str = "test-secret";

    fn config(global_max: u32, user_max: u32) -> RateLimitConfig {
        RateLimitConfig {
            global_max_requests: global_max,
            global_window_ms: 60_000,
            user_max_requests: user_max,
            user_window_ms: 60_000,
        }
    }

    async fn handler() -> impl Responder {
        HttpResponse::Ok().finish()
    }

    fn bearer_for(user_id: Uuid) -> (String, String) {
        let token = generate_jwt(
            ClaimsSpec {
                user_id,
                email: "artist@example.com".to_string(),
            },
            &JwtConfig {
                secret: SECRET.to_string(),
                expiration_hours: 1,
            },
        )
        .unwrap();
        ("Authorization".to_string(), format!("Bearer {}", token))
    }

    macro_rules! limited_app {
        ($store:expr, $config:expr) => {
            test::init_service(
                App::new()
                    .wrap(RequestLimiter::new($store, $config, SECRET.to_string()))
                    .route("/ping", web::get().to(handler)),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn user_ceiling_returns_429_with_headers() {
        let store: Arc<dyn RateLimitStore> = Arc::new(InMemoryStore::new());
        let app = limited_app!(store, config(1000, 2));
        let (name, value) = bearer_for(Uuid::new_v4());

        for _ in 0..2 {
            let resp = test::call_service(
                &app,
                test::TestRequest::get()
                    .uri("/ping")
                    .insert_header((name.clone(), value.clone()))
                    .to_request(),
            )
            .await;
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/ping")
                .insert_header((name, value))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers().get("x-ratelimit-limit").unwrap(), "2");
        assert_eq!(resp.headers().get("x-ratelimit-remaining").unwrap(), "0");
        assert!(resp.headers().contains_key("x-ratelimit-reset"));
        assert!(resp.headers().contains_key("retry-after"));

        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].is_string());
        assert!(body["retryAfter"].as_i64().unwrap() >= 0);
    }

    #[actix_web::test]
    async fn identities_are_limited_independently() {
        let store: Arc<dyn RateLimitStore> = Arc::new(InMemoryStore::new());
        let app = limited_app!(store, config(1000, 1));
        let (name_a, value_a) = bearer_for(Uuid::new_v4());
        let (name_b, value_b) = bearer_for(Uuid::new_v4());

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/ping")
                .insert_header((name_a.clone(), value_a.clone()))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/ping")
                .insert_header((name_a, value_a))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/ping")
                .insert_header((name_b, value_b))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn success_responses_carry_user_scope_headers() {
        let store: Arc<dyn RateLimitStore> = Arc::new(InMemoryStore::new());
        let app = limited_app!(store, config(1000, 100));

        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/ping").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("x-ratelimit-limit").unwrap(), "100");
        assert_eq!(resp.headers().get("x-ratelimit-remaining").unwrap(), "99");
        assert!(resp.headers().contains_key("x-ratelimit-reset"));
    }

    #[actix_web::test]
    async fn global_ceiling_applies_across_identities() {
        let store: Arc<dyn RateLimitStore> = Arc::new(InMemoryStore::new());
        let app = limited_app!(store, config(2, 100));

        for _ in 0..2 {
            let (name, value) = bearer_for(Uuid::new_v4());
            let resp = test::call_service(
                &app,
                test::TestRequest::get()
                    .uri("/ping")
                    .insert_header((name, value))
                    .to_request(),
            )
            .await;
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let (name, value) = bearer_for(Uuid::new_v4());
        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/ping")
                .insert_header((name, value))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers().get("x-ratelimit-limit").unwrap(), "2");
    }

    #[actix_web::test]
    async fn preflight_requests_bypass_limiting() {
        let store: Arc<dyn RateLimitStore> = Arc::new(InMemoryStore::new());
        let app = test::init_service(
            App::new()
                .wrap(RequestLimiter::new(store, config(1, 1), SECRET.to_string()))
                .route("/ping", web::route().to(handler)),
        )
        .await;

        for _ in 0..5 {
            let resp = test::call_service(
                &app,
                test::TestRequest::with_uri("/ping")
                    .method(Method::OPTIONS)
                    .to_request(),
            )
            .await;
            assert_eq!(resp.status(), StatusCode::OK);
        }
    }

    #[actix_web::test]
    async fn failing_primary_still_enforces_ceiling() {
        let store: Arc<dyn RateLimitStore> = Arc::new(FailoverStore::new(
            Some(Arc::new(FailingStore)),
            Arc::new(InMemoryStore::new()),
        ));
        let app = limited_app!(store, config(1000, 1));

        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/ping").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/ping").to_request()).await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}

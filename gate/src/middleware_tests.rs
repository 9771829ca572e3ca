use std::sync::Arc;

use actix_web::{App, HttpResponse, Responder, http::StatusCode, test, web};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use common::{
    env_config::JwtConfig,
    error::{AppError, Res},
    jwt::{ClaimsSpec, generate_jwt},
};
use db::models::account::{
    AccountType, PaymentOutcome, SubscriptionFields, SubscriptionState, UserAccount,
};
use db::store::AccountStore;
use serde_json::Value;
use uuid::Uuid;

use crate::middleware::auth::AuthMiddleware;
use crate::middleware::subscription::SubscriptionGate;

const SECRET: &str = "test-secret";
const UPGRADE_URL: &str = "https://app.example.com/upgrade";

struct FakeAccountStore {
    state: Option<SubscriptionState>,
    fail: bool,
}

impl FakeAccountStore {
    fn with_state(state: SubscriptionState) -> Arc<Self> {
        Arc::new(Self {
            state: Some(state),
            fail: false,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            state: None,
            fail: true,
        })
    }
}

#[async_trait]
impl AccountStore for FakeAccountStore {
    async fn subscription_state(&self, _user_id: Uuid) -> Res<Option<SubscriptionState>> {
        if self.fail {
            return Err(AppError::Internal("connection refused".to_string()));
        }
        Ok(self.state.clone())
    }

    async fn find_by_user_id(&self, _user_id: Uuid) -> Res<Option<UserAccount>> {
        Ok(None)
    }

    async fn update_subscription_fields(
        &self,
        _customer_id: &str,
        _fields: SubscriptionFields,
    ) -> Res<bool> {
        Ok(false)
    }

    async fn mark_subscription_canceled(&self, _customer_id: &str) -> Res<bool> {
        Ok(false)
    }

    async fn record_payment(&self, _customer_id: &str, _outcome: PaymentOutcome) -> Res<bool> {
        Ok(false)
    }

    async fn create_onboarding_identity(&self, _email: &str, _token: &str) -> Res<()> {
        Ok(())
    }

    async fn apply_referral_code(&self, _account_id: Uuid, _code: &str) -> Res<()> {
        Ok(())
    }
}

fn lapsed_state() -> SubscriptionState {
    SubscriptionState {
        account_type: AccountType::Artist,
        subscription_status: Some("past_due".to_string()),
        current_period_end: Some(Utc::now() - Duration::days(5)),
        trial_end: None,
    }
}

fn admin_state() -> SubscriptionState {
    SubscriptionState {
        account_type: AccountType::Admin,
        subscription_status: None,
        current_period_end: None,
        trial_end: None,
    }
}

async fn handler() -> impl Responder {
    HttpResponse::Ok().finish()
}

fn bearer() -> (String, String) {
    let token = generate_jwt(
        ClaimsSpec {
            user_id: Uuid::new_v4(),
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

macro_rules! gated_app {
    ($gate:expr) => {
        test::init_service(
            App::new().service(
                web::scope("/releases")
                    .wrap($gate)
                    .wrap(AuthMiddleware::new(SECRET.to_string()))
                    .route("", web::get().to(handler))
                    .route("", web::post().to(handler)),
            ),
        )
        .await
    };
}

#[actix_web::test]
async fn missing_bearer_token_is_401() {
    let store = FakeAccountStore::with_state(lapsed_state());
    let app = gated_app!(SubscriptionGate::mutations(store, UPGRADE_URL.to_string()));

    let resp = test::call_service(&app, test::TestRequest::get().uri("/releases").to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "AUTH_HEADER_INVALID");
}

#[actix_web::test]
async fn malformed_bearer_token_is_401() {
    let store = FakeAccountStore::with_state(lapsed_state());
    let app = gated_app!(SubscriptionGate::mutations(store, UPGRADE_URL.to_string()));

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/releases")
            .insert_header(("Authorization", "Bearer not-a-jwt"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "AUTH_HEADER_INVALID");
}

#[actix_web::test]
async fn lapsed_subscriber_can_still_read() {
    let store = FakeAccountStore::with_state(lapsed_state());
    let app = gated_app!(SubscriptionGate::mutations(store, UPGRADE_URL.to_string()));

    let (name, value) = bearer();
    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/releases")
            .insert_header((name, value))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn lapsed_subscriber_mutation_is_403_with_upgrade_url() {
    let store = FakeAccountStore::with_state(lapsed_state());
    let app = gated_app!(SubscriptionGate::mutations(store, UPGRADE_URL.to_string()));

    let (name, value) = bearer();
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/releases")
            .insert_header((name, value))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "SUBSCRIPTION_REQUIRED");
    assert_eq!(body["error"]["details"]["upgrade_url"], UPGRADE_URL);
}

#[actix_web::test]
async fn admin_mutation_passes_regardless_of_subscription() {
    let store = FakeAccountStore::with_state(admin_state());
    let app = gated_app!(SubscriptionGate::mutations(store, UPGRADE_URL.to_string()));

    let (name, value) = bearer();
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/releases")
            .insert_header((name, value))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn strict_gate_blocks_lapsed_reads() {
    let store = FakeAccountStore::with_state(lapsed_state());
    let app = gated_app!(SubscriptionGate::strict(store, UPGRADE_URL.to_string()));

    let (name, value) = bearer();
    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/releases")
            .insert_header((name, value))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "SUBSCRIPTION_REQUIRED");
}

#[actix_web::test]
async fn store_failure_is_500_never_fail_open() {
    let store = FakeAccountStore::failing();
    let app = gated_app!(SubscriptionGate::mutations(store, UPGRADE_URL.to_string()));

    let (name, value) = bearer();
    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/releases")
            .insert_header((name, value))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "SUBSCRIPTION_VERIFY_FAILED");
}

use std::sync::Arc;

use actix_web::{Responder, get, post, web};
use common::{
    env_config::Config,
    error::{AppError, Res},
    http::Success,
    jwt::Principal,
};
use db::store::AccountStore;

use uuid::Uuid;

use crate::dtos::billing::{
    CancelResponse, CheckoutRequest, CheckoutResponse, PaymentAuditResponse, ReferralRequest,
    SignupCheckoutResponse, SubscriptionStatusResponse,
};
use crate::services::checkout;

/// Opens a hosted checkout session for the caller.
///
/// The caller may not have a provider customer yet (first
/// subscription); the session is then anonymous and the account is
/// linked when the completion webhook arrives.
#[post("/checkout")]
async fn post_checkout(
    principal: web::ReqData<Principal>,
    req: web::Json<CheckoutRequest>,
    config: web::Data<Arc<Config>>,
    store: web::Data<dyn AccountStore>,
) -> Res<impl Responder> {
    let issues = req.issues();
    if !issues.is_empty() {
        return Err(AppError::Validation(issues));
    }

    let client = checkout::create_client(config.stripe_secret_key()?);

    let account = store.find_by_user_id(principal.user_id).await?;
    let customer_id = account.and_then(|account| account.stripe_customer_id);

    let url =
        checkout::create_checkout_session(&client, customer_id.as_deref(), None, &req).await?;

    Success::ok(CheckoutResponse { url })
}

/// Anonymous pre-signup checkout: no bearer token, no account row yet.
///
/// Generates a fresh onboarding token and embeds it in the session
/// metadata; the checkout-completion webhook provisions the auth
/// identity and account row joined by that token.
#[post("/checkout")]
async fn post_signup_checkout(
    req: web::Json<CheckoutRequest>,
    config: web::Data<Arc<Config>>,
) -> Res<impl Responder> {
    let issues = req.issues();
    if !issues.is_empty() {
        return Err(AppError::Validation(issues));
    }

    let client = checkout::create_client(config.stripe_secret_key()?);
    let onboarding_token = Uuid::new_v4().to_string();
    let url =
        checkout::create_checkout_session(&client, None, Some(&onboarding_token), &req).await?;

    Success::created(SignupCheckoutResponse {
        url,
        onboarding_token,
    })
}

/// Cancels the caller's subscription at the provider. Treats an
/// already-canceled subscription as success.
#[post("/cancel")]
async fn post_cancel(
    principal: web::ReqData<Principal>,
    config: web::Data<Arc<Config>>,
    store: web::Data<dyn AccountStore>,
) -> Res<impl Responder> {
    let account = store
        .find_by_user_id(principal.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("account".to_string()))?;

    let Some(subscription_id) = account.subscription_id else {
        // Nothing to cancel; repeated cancels land here.
        return Success::ok(CancelResponse { canceled: true });
    };

    let client = checkout::create_client(config.stripe_secret_key()?);
    checkout::cancel_subscription(&client, &subscription_id).await?;

    Success::ok(CancelResponse { canceled: true })
}

/// Current subscription fields for the caller. Readable even by
/// lapsed subscribers: the gate's read-only degraded mode applies.
#[get("/status")]
async fn get_status(
    principal: web::ReqData<Principal>,
    store: web::Data<dyn AccountStore>,
) -> Res<impl Responder> {
    let account = store
        .find_by_user_id(principal.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("account".to_string()))?;

    Success::ok(SubscriptionStatusResponse::from(account))
}

/// Applies a referral code to the caller's account: credits the
/// referrer and records the referral in a single transaction.
#[post("/referral")]
async fn post_referral(
    principal: web::ReqData<Principal>,
    req: web::Json<ReferralRequest>,
    store: web::Data<dyn AccountStore>,
) -> Res<impl Responder> {
    if req.code.trim().is_empty() {
        return Err(AppError::Validation(vec!["code is required".to_string()]));
    }

    store
        .apply_referral_code(principal.user_id, req.code.trim())
        .await?;

    Success::ok(serde_json::json!({ "applied": true }))
}

/// Denormalized audit fields from the latest invoice events.
#[get("/payments")]
async fn get_payments(
    principal: web::ReqData<Principal>,
    store: web::Data<dyn AccountStore>,
) -> Res<impl Responder> {
    let account = store
        .find_by_user_id(principal.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("account".to_string()))?;

    Success::ok(PaymentAuditResponse::from(account))
}

use common::error::{AppError, Res};
use stripe::{
    CancelSubscription, CheckoutSession, CheckoutSessionMode, Client, CreateCheckoutSession,
    CustomerId, Subscription, SubscriptionId,
};

use crate::dtos::billing::CheckoutRequest;

pub fn create_client(secret_key: &str) -> Client {
    Client::new(secret_key)
}

/// Opens a hosted checkout flow and returns its URL.
///
/// `customer_id` may be absent for anonymous pre-signup checkout; the
/// account is provisioned later when the completion webhook arrives,
/// joined to the session by the `onboarding_token` carried in its
/// metadata.
pub async fn create_checkout_session(
    client: &Client,
    customer_id: Option<&str>,
    onboarding_token: Option<&str>,
    req: &CheckoutRequest,
) -> Res<String> {
    let customer = customer_id
        .map(|id| {
            id.parse::<CustomerId>().map_err(|e| {
                AppError::Internal(format!("Failed to parse customer id: {}. {}", id, e))
            })
        })
        .transpose()?;

    let metadata = onboarding_token.map(|token| {
        stripe::Metadata::from([("onboarding_token".to_string(), token.to_string())])
    });

    let params = CreateCheckoutSession {
        payment_method_types: Some(vec![stripe::CreateCheckoutSessionPaymentMethodTypes::Card]),
        metadata,
        line_items: Some(vec![stripe::CreateCheckoutSessionLineItems {
            price: Some(req.price_id.to_string()),
            quantity: Some(1),
            ..Default::default()
        }]),
        mode: Some(CheckoutSessionMode::Subscription),
        success_url: Some(req.success_url.as_str()),
        cancel_url: Some(req.cancel_url.as_str()),
        customer,
        ..Default::default()
    };

    let session = CheckoutSession::create(client, params)
        .await
        .map_err(|e| AppError::CheckoutSessionFailed(e.to_string()))?;

    session
        .url
        .ok_or_else(|| AppError::CheckoutSessionFailed("provider returned no checkout URL".to_string()))
}

/// Requests cancellation from the provider. Canceling a subscription
/// the provider no longer knows counts as success, so repeated calls
/// are idempotent from the caller's perspective.
pub async fn cancel_subscription(client: &Client, subscription_id: &str) -> Res<()> {
    let id = subscription_id.parse::<SubscriptionId>().map_err(|e| {
        AppError::Internal(format!(
            "Failed to parse subscription id: {}. {}",
            subscription_id, e
        ))
    })?;

    match Subscription::cancel(client, &id, CancelSubscription::new()).await {
        Ok(_) => Ok(()),
        Err(stripe::StripeError::Stripe(request_err)) if request_err.http_status == 404 => {
            log::debug!("Subscription {} already gone at provider", subscription_id);
            Ok(())
        }
        Err(e) => Err(AppError::from(e)),
    }
}

use std::sync::Arc;

use actix_web::{HttpResponse, post, web};
use common::{
    env_config::Config,
    error::{AppError, Res},
};
use db::store::AccountStore;

use crate::services::reconcile;

/// Stripe webhook entry point.
///
/// The body must stay raw for signature verification, so this handler
/// takes a `String`, never `web::Json`. A missing signature header is
/// a transport validation failure; a present-but-invalid signature is
/// rejected by the business layer as `WEBHOOK_SIGNATURE_INVALID`.
/// Either way the event is discarded before any state is touched.
#[post("/webhook")]
async fn post_webhook(
    payload: String,
    req: actix_web::HttpRequest,
    config: web::Data<Arc<Config>>,
    store: web::Data<dyn AccountStore>,
) -> Res<HttpResponse> {
    let signature = req
        .headers()
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            AppError::Validation(vec!["stripe-signature header is required".to_string()])
        })?;

    let secret = config.stripe_webhook_secret()?;
    let event = reconcile::construct_event(&payload, signature, secret)?;

    if let Some(event) = reconcile::classify(event) {
        reconcile::reconcile(event, store.get_ref()).await?;
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true, "received": true })))
}

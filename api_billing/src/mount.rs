use actix_web::dev::HttpServiceFactory;
use actix_web::web;
use gate::SubscriptionGate;

use crate::routes;

/// Public billing paths: the signature-verified webhook and the
/// anonymous pre-signup checkout.
pub fn mount_public() -> actix_web::Scope {
    web::scope("/billing")
        .service(routes::webhook::post_webhook)
        .service(routes::billing::post_signup_checkout)
}

/// Checkout stays outside the subscription gate: lapsed subscribers
/// must be able to start a new checkout.
pub fn mount_billing() -> actix_web::Scope {
    web::scope("/billing").service(routes::billing::post_checkout)
}

/// Subscription management behind the default gate: reads pass even
/// when lapsed, mutations require access.
pub fn mount_sub(gate: SubscriptionGate) -> impl HttpServiceFactory {
    web::scope("/sub")
        .wrap(gate)
        .service(routes::billing::post_cancel)
        .service(routes::billing::get_status)
        .service(routes::billing::post_referral)
}

/// Premium-only surface behind the strict gate.
pub fn mount_premium(gate: SubscriptionGate) -> impl HttpServiceFactory {
    web::scope("/premium").wrap(gate).service(routes::billing::get_payments)
}

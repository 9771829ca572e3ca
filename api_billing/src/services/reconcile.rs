use chrono::{DateTime, Utc};
use common::error::{AppError, Res};
use db::models::account::{PaymentOutcome, SubscriptionFields};
use db::store::AccountStore;
use stripe::{Event, EventObject, EventType, Webhook};

use crate::models::event::BillingEvent;

/// Verifies the webhook signature and parses the event. Verification
/// is a strict precondition: an invalid signature discards the
/// payload before any processing.
pub fn construct_event(payload: &str, signature: &str, webhook_secret: &str) -> Res<Event> {
    Webhook::construct_event(payload, signature, webhook_secret).map_err(|e| {
        log::warn!("Webhook signature rejected: {}", e);
        AppError::WebhookSignatureInvalid
    })
}

fn timestamp(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

/// Maps a verified provider event onto the reconciler's own event
/// type. Unhandled event types yield `None` and are ignored, not
/// errors.
pub fn classify(event: Event) -> Option<BillingEvent> {
    match event.type_ {
        EventType::CustomerSubscriptionCreated | EventType::CustomerSubscriptionUpdated => {
            if let EventObject::Subscription(sub) = event.data.object {
                Some(BillingEvent::SubscriptionChanged {
                    customer_id: sub.customer.id().to_string(),
                    fields: SubscriptionFields {
                        subscription_id: sub.id.to_string(),
                        subscription_status: sub.status.to_string(),
                        subscription_plan_id: sub
                            .items
                            .data
                            .first()
                            .and_then(|item| item.price.as_ref())
                            .map(|price| price.id.to_string()),
                        current_period_start: timestamp(sub.current_period_start),
                        current_period_end: timestamp(sub.current_period_end),
                        cancel_at_period_end: sub.cancel_at_period_end,
                    },
                })
            } else {
                log::warn!("Subscription event carried unexpected object; ignoring");
                None
            }
        }
        EventType::CustomerSubscriptionDeleted => {
            if let EventObject::Subscription(sub) = event.data.object {
                Some(BillingEvent::SubscriptionDeleted {
                    customer_id: sub.customer.id().to_string(),
                })
            } else {
                log::warn!("Subscription event carried unexpected object; ignoring");
                None
            }
        }
        EventType::InvoicePaymentSucceeded => {
            if let EventObject::Invoice(invoice) = event.data.object {
                let customer_id = invoice.customer.map(|c| c.id().to_string())?;
                Some(BillingEvent::PaymentSucceeded {
                    customer_id,
                    amount_paid: invoice.amount_paid.unwrap_or(0),
                })
            } else {
                None
            }
        }
        EventType::InvoicePaymentFailed => {
            if let EventObject::Invoice(invoice) = event.data.object {
                let customer_id = invoice.customer.map(|c| c.id().to_string())?;
                Some(BillingEvent::PaymentFailed { customer_id })
            } else {
                None
            }
        }
        EventType::CheckoutSessionCompleted => {
            if let EventObject::CheckoutSession(session) = event.data.object {
                let email = session
                    .customer_details
                    .and_then(|details| details.email)
                    .or(session.customer_email);
                let onboarding_token = session
                    .metadata
                    .as_ref()
                    .and_then(|metadata| metadata.get("onboarding_token").cloned());
                Some(BillingEvent::CheckoutCompleted {
                    email,
                    onboarding_token,
                })
            } else {
                None
            }
        }
        other => {
            log::info!("Unhandled event type: {}", other);
            None
        }
    }
}

/// Applies one event to the account store. Every arm is a snapshot
/// overwrite keyed by customer id, so at-least-once delivery is safe.
/// A customer the store does not know yet is logged and ignored; the
/// account may still be completing onboarding.
pub async fn reconcile(event: BillingEvent, store: &dyn AccountStore) -> Res<()> {
    reconcile_at(event, store, Utc::now()).await
}

pub async fn reconcile_at(
    event: BillingEvent,
    store: &dyn AccountStore,
    now: DateTime<Utc>,
) -> Res<()> {
    match event {
        BillingEvent::SubscriptionChanged {
            customer_id,
            fields,
        } => {
            let found = store.update_subscription_fields(&customer_id, fields).await?;
            if !found {
                log::info!("No account for customer {}; subscription event ignored", customer_id);
            }
        }
        BillingEvent::SubscriptionDeleted { customer_id } => {
            let found = store.mark_subscription_canceled(&customer_id).await?;
            if !found {
                log::info!("No account for customer {}; deletion event ignored", customer_id);
            }
        }
        BillingEvent::PaymentSucceeded {
            customer_id,
            amount_paid,
        } => {
            let found = store
                .record_payment(
                    &customer_id,
                    PaymentOutcome::Succeeded {
                        amount_paid,
                        paid_at: now,
                    },
                )
                .await?;
            if !found {
                log::info!("No account for customer {}; invoice event ignored", customer_id);
            }
        }
        BillingEvent::PaymentFailed { customer_id } => {
            let found = store
                .record_payment(&customer_id, PaymentOutcome::Failed)
                .await?;
            if !found {
                log::info!("No account for customer {}; invoice event ignored", customer_id);
            }
        }
        BillingEvent::CheckoutCompleted {
            email,
            onboarding_token,
        } => match (email, onboarding_token) {
            (Some(email), Some(token)) => {
                store.create_onboarding_identity(&email, &token).await?;
            }
            _ => {
                log::warn!(
                    "Checkout completed without customer email or onboarding token; skipping provisioning"
                );
            }
        },
    }
    Ok(())
}

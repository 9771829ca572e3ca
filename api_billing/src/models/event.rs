use db::models::account::SubscriptionFields;

/// Provider-agnostic view of a webhook event, produced after
/// signature verification. The reconciler consumes this instead of
/// the raw provider payload so its state transitions can be tested
/// without provider fixtures.
#[derive(Debug, Clone, PartialEq)]
pub enum BillingEvent {
    /// Subscription created or updated: overwrite the mirrored fields.
    SubscriptionChanged {
        customer_id: String,
        fields: SubscriptionFields,
    },
    SubscriptionDeleted {
        customer_id: String,
    },
    PaymentSucceeded {
        customer_id: String,
        amount_paid: i64,
    },
    PaymentFailed {
        customer_id: String,
    },
    /// Checkout session completed: provision the auth identity and
    /// account row joined by the onboarding token.
    CheckoutCompleted {
        email: Option<String>,
        onboarding_token: Option<String>,
    },
}

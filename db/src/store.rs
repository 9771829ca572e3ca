use std::sync::Arc;

use async_trait::async_trait;
use common::error::Res;
use sqlx::PgPool;
use uuid::Uuid;

use crate::account;
use crate::models::account::{
    PaymentOutcome, SubscriptionFields, SubscriptionState, UserAccount,
};

/// Narrow repository interface over the account table. The access
/// gate and the billing reconciler depend on these intention-revealing
/// methods rather than on a query surface, so both can be exercised
/// against hand-rolled fakes.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Subscription fields the gate needs, or `None` when the caller
    /// has no account row.
    async fn subscription_state(&self, user_id: Uuid) -> Res<Option<SubscriptionState>>;

    async fn find_by_user_id(&self, user_id: Uuid) -> Res<Option<UserAccount>>;

    /// Overwrite the mirrored subscription fields. Returns false when
    /// no account owns `customer_id`.
    async fn update_subscription_fields(
        &self,
        customer_id: &str,
        fields: SubscriptionFields,
    ) -> Res<bool>;

    async fn mark_subscription_canceled(&self, customer_id: &str) -> Res<bool>;

    async fn record_payment(&self, customer_id: &str, outcome: PaymentOutcome) -> Res<bool>;

    /// Checkout-completion side flow: one auth identity plus one
    /// account row sharing `onboarding_token` verbatim.
    async fn create_onboarding_identity(&self, email: &str, onboarding_token: &str) -> Res<()>;

    async fn apply_referral_code(&self, account_id: Uuid, code: &str) -> Res<()>;
}

/// Postgres-backed store used in production.
#[derive(Clone)]
pub struct PgAccountStore {
    pool: Arc<PgPool>,
}

impl PgAccountStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn subscription_state(&self, user_id: Uuid) -> Res<Option<SubscriptionState>> {
        account::get_subscription_state(&*self.pool, user_id).await
    }

    async fn find_by_user_id(&self, user_id: Uuid) -> Res<Option<UserAccount>> {
        account::get_account_by_id(&*self.pool, user_id).await
    }

    async fn update_subscription_fields(
        &self,
        customer_id: &str,
        fields: SubscriptionFields,
    ) -> Res<bool> {
        account::update_subscription_fields(&*self.pool, customer_id, &fields).await
    }

    async fn mark_subscription_canceled(&self, customer_id: &str) -> Res<bool> {
        account::mark_subscription_canceled(&*self.pool, customer_id).await
    }

    async fn record_payment(&self, customer_id: &str, outcome: PaymentOutcome) -> Res<bool> {
        account::record_payment(&*self.pool, customer_id, &outcome).await
    }

    async fn create_onboarding_identity(&self, email: &str, onboarding_token: &str) -> Res<()> {
        account::create_onboarding_identity(&self.pool, email, onboarding_token).await
    }

    async fn apply_referral_code(&self, account_id: Uuid, code: &str) -> Res<()> {
        account::apply_referral_code(&self.pool, account_id, code).await
    }
}

use chrono::{DateTime, Utc};
use common::error::{AppError, Res};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::models::account::{
    PaymentOutcome, SubscriptionFields, SubscriptionState, UserAccount,
};

const ACCOUNT_COLUMNS: &str = "id, email, account_type, stripe_customer_id, subscription_id, \
     subscription_status, subscription_plan_id, current_period_start, current_period_end, \
     trial_end, cancel_at_period_end, last_payment_status, last_payment_date, \
     last_payment_amount, onboarding_token, referral_code, referral_credits, referred_by, \
     created_at, updated_at";

pub async fn get_subscription_state<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Option<SubscriptionState>> {
    let row: Option<(
        String,
        Option<String>,
        Option<DateTime<Utc>>,
        Option<DateTime<Utc>>,
    )> = sqlx::query_as(
        "SELECT account_type, subscription_status, current_period_end, trial_end \
         FROM user_accounts WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await?;

    row.map(|(account_type, subscription_status, current_period_end, trial_end)| {
        let account_type = account_type
            .parse()
            .map_err(|e: String| AppError::Internal(e))?;
        Ok(SubscriptionState {
            account_type,
            subscription_status,
            current_period_end,
            trial_end,
        })
    })
    .transpose()
}

pub async fn get_account_by_id<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Option<UserAccount>> {
    sqlx::query_as::<_, UserAccount>(&format!(
        "SELECT {} FROM user_accounts WHERE id = $1",
        ACCOUNT_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

/// Overwrites the provider-mirrored subscription fields for the
/// account owning `customer_id`. Returns false when no such account
/// exists yet (anonymous checkout still completing onboarding).
pub async fn update_subscription_fields<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    customer_id: &str,
    fields: &SubscriptionFields,
) -> Res<bool> {
    let result = sqlx::query(
        "UPDATE user_accounts SET \
             subscription_id = $2, \
             subscription_status = $3, \
             subscription_plan_id = $4, \
             current_period_start = $5, \
             current_period_end = $6, \
             cancel_at_period_end = $7, \
             updated_at = now() \
         WHERE stripe_customer_id = $1",
    )
    .bind(customer_id)
    .bind(&fields.subscription_id)
    .bind(&fields.subscription_status)
    .bind(&fields.subscription_plan_id)
    .bind(fields.current_period_start)
    .bind(fields.current_period_end)
    .bind(fields.cancel_at_period_end)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn mark_subscription_canceled<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    customer_id: &str,
) -> Res<bool> {
    let result = sqlx::query(
        "UPDATE user_accounts SET \
             subscription_status = 'canceled', \
             cancel_at_period_end = true, \
             updated_at = now() \
         WHERE stripe_customer_id = $1",
    )
    .bind(customer_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn record_payment<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    customer_id: &str,
    outcome: &PaymentOutcome,
) -> Res<bool> {
    let result = match outcome {
        PaymentOutcome::Succeeded {
            amount_paid,
            paid_at,
        } => {
            sqlx::query(
                "UPDATE user_accounts SET \
                     last_payment_status = 'succeeded', \
                     last_payment_date = $2, \
                     last_payment_amount = $3, \
                     updated_at = now() \
                 WHERE stripe_customer_id = $1",
            )
            .bind(customer_id)
            .bind(paid_at)
            .bind(amount_paid)
            .execute(executor)
            .await?
        }
        PaymentOutcome::Failed => {
            sqlx::query(
                "UPDATE user_accounts SET \
                     last_payment_status = 'failed', \
                     updated_at = now() \
                 WHERE stripe_customer_id = $1",
            )
            .bind(customer_id)
            .execute(executor)
            .await?
        }
    };
    Ok(result.rows_affected() > 0)
}

/// Creates the auth identity and the account row a completed checkout
/// produces, joined by the onboarding token. Both inserts are
/// `ON CONFLICT DO NOTHING` on the token so at-least-once webhook
/// delivery yields exactly one identity and one account.
pub async fn create_onboarding_identity(
    pool: &PgPool,
    email: &str,
    onboarding_token: &str,
) -> Res<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO auth_identities (email, onboarding_token, metadata) \
         VALUES ($1, $2, jsonb_build_object('onboarding_token', $2::text)) \
         ON CONFLICT (onboarding_token) DO NOTHING",
    )
    .bind(email)
    .bind(onboarding_token)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO user_accounts (email, account_type, onboarding_token) \
         VALUES ($1, 'artist', $2) \
         ON CONFLICT (onboarding_token) DO NOTHING",
    )
    .bind(email)
    .bind(onboarding_token)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Credits the referrer and records `referred_by` on the referred
/// account in one transaction: both writes land or neither does.
pub async fn apply_referral_code(pool: &PgPool, account_id: Uuid, code: &str) -> Res<()> {
    let mut tx = pool.begin().await?;

    let referrer: Option<(Uuid,)> = sqlx::query_as(
        "UPDATE user_accounts SET referral_credits = referral_credits + 1, updated_at = now() \
         WHERE referral_code = $1 AND id <> $2 \
         RETURNING id",
    )
    .bind(code)
    .bind(account_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some((referrer_id,)) = referrer else {
        tx.rollback().await?;
        return Err(AppError::Validation(vec![format!(
            "unknown referral code: {}",
            code
        )]));
    };

    sqlx::query(
        "UPDATE user_accounts SET referred_by = $2, updated_at = now() \
         WHERE id = $1 AND referred_by IS NULL",
    )
    .bind(account_id)
    .bind(referrer_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Privilege class of an account. Stored as text; `admin` accounts
/// bypass subscription authorization entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Admin,
    Artist,
    Manager,
    Label,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Admin => "admin",
            AccountType::Artist => "artist",
            AccountType::Manager => "manager",
            AccountType::Label => "label",
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(AccountType::Admin),
            "artist" => Ok(AccountType::Artist),
            "manager" => Ok(AccountType::Manager),
            "label" => Ok(AccountType::Label),
            other => Err(format!("unknown account type: {}", other)),
        }
    }
}

/// A row of `user_accounts`. Subscription fields mirror the payment
/// provider's view and are written exclusively by the billing
/// reconciler.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserAccount {
    pub id: Uuid,
    pub email: String,
    pub account_type: String,
    pub stripe_customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub subscription_status: Option<String>,
    pub subscription_plan_id: Option<String>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub trial_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub last_payment_status: Option<String>,
    pub last_payment_date: Option<DateTime<Utc>>,
    pub last_payment_amount: Option<i64>,
    pub onboarding_token: Option<String>,
    pub referral_code: Option<String>,
    pub referral_credits: i32,
    pub referred_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The subset of account fields the access gate reads. Effective
/// access is derived from these at evaluation time, never stored.
#[derive(Debug, Clone)]
pub struct SubscriptionState {
    pub account_type: AccountType,
    pub subscription_status: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub trial_end: Option<DateTime<Utc>>,
}

/// Snapshot of provider-reported subscription state, overwritten on
/// every subscription created/updated event. Idempotent by
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionFields {
    pub subscription_id: String,
    pub subscription_status: String,
    pub subscription_plan_id: Option<String>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
}

/// Result of an invoice event, denormalized onto the account row for
/// audit reads.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentOutcome {
    Succeeded {
        amount_paid: i64,
        paid_at: DateTime<Utc>,
    },
    Failed,
}

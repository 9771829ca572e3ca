use chrono::{DateTime, Utc};
use db::models::account::UserAccount;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct CheckoutRequest {
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutRequest {
    /// Field-level issues, empty when the request is valid.
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.price_id.trim().is_empty() {
            issues.push("price_id is required".to_string());
        }
        if !self.success_url.starts_with("http") {
            issues.push("success_url must be an absolute URL".to_string());
        }
        if !self.cancel_url.starts_with("http") {
            issues.push("cancel_url must be an absolute URL".to_string());
        }
        issues
    }
}

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub url: String,
}

/// Anonymous pre-signup checkout hands the caller the onboarding token
/// it will need to finish account setup after payment.
#[derive(Serialize)]
pub struct SignupCheckoutResponse {
    pub url: String,
    pub onboarding_token: String,
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub canceled: bool,
}

#[derive(Deserialize)]
pub struct ReferralRequest {
    pub code: String,
}

#[derive(Serialize)]
pub struct SubscriptionStatusResponse {
    pub account_type: String,
    pub subscription_status: Option<String>,
    pub subscription_plan_id: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub trial_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
}

impl From<UserAccount> for SubscriptionStatusResponse {
    fn from(account: UserAccount) -> Self {
        SubscriptionStatusResponse {
            account_type: account.account_type,
            subscription_status: account.subscription_status,
            subscription_plan_id: account.subscription_plan_id,
            current_period_end: account.current_period_end,
            trial_end: account.trial_end,
            cancel_at_period_end: account.cancel_at_period_end,
        }
    }
}

#[derive(Serialize)]
pub struct PaymentAuditResponse {
    pub last_payment_status: Option<String>,
    pub last_payment_date: Option<DateTime<Utc>>,
    pub last_payment_amount: Option<i64>,
}

impl From<UserAccount> for PaymentAuditResponse {
    fn from(account: UserAccount) -> Self {
        PaymentAuditResponse {
            last_payment_status: account.last_payment_status,
            last_payment_date: account.last_payment_date,
            last_payment_amount: account.last_payment_amount,
        }
    }
}

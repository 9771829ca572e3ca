use actix_web::http::Method;
use chrono::{DateTime, Utc};
use db::models::account::{AccountType, SubscriptionState};

/// Which methods a gate blocks when the caller has no active
/// subscription or trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMode {
    /// Block POST/PUT/PATCH/DELETE only; reads stay available to
    /// lapsed subscribers (read-only degraded mode).
    Mutations,
    /// Premium routes: block every method without access.
    AllMethods,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Granted,
    /// Lapsed caller performing a read under `GateMode::Mutations`.
    ReadOnly,
    Denied,
}

pub fn is_mutation(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn has_active_subscription(state: &SubscriptionState, now: DateTime<Utc>) -> bool {
    state.subscription_status.as_deref() == Some("active")
        && state.current_period_end.is_some_and(|end| end > now)
}

fn has_active_trial(state: &SubscriptionState, now: DateTime<Utc>) -> bool {
    state.trial_end.is_some_and(|end| end > now)
}

/// Derives the access decision for one request.
///
/// `None` state means the caller has no account row: treated as no
/// access, not as an error. The admin bypass reads the stored account
/// type, never a hardcoded identity.
pub fn evaluate_access(
    state: Option<&SubscriptionState>,
    method: &Method,
    mode: GateMode,
    now: DateTime<Utc>,
) -> AccessDecision {
    if let Some(state) = state {
        if state.account_type == AccountType::Admin {
            return AccessDecision::Granted;
        }
        if has_active_subscription(state, now) || has_active_trial(state, now) {
            return AccessDecision::Granted;
        }
    }

    match mode {
        GateMode::Mutations if !is_mutation(method) => AccessDecision::ReadOnly,
        _ => AccessDecision::Denied,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn state(
        account_type: AccountType,
        status: Option<&str>,
        period_end: Option<DateTime<Utc>>,
        trial_end: Option<DateTime<Utc>>,
    ) -> SubscriptionState {
        SubscriptionState {
            account_type,
            subscription_status: status.map(str::to_string),
            current_period_end: period_end,
            trial_end,
        }
    }

    #[test]
    fn admin_bypasses_everything() {
        let now = Utc::now();
        let s = state(AccountType::Admin, Some("canceled"), None, None);
        for method in [Method::GET, Method::POST, Method::DELETE] {
            assert_eq!(
                evaluate_access(Some(&s), &method, GateMode::Mutations, now),
                AccessDecision::Granted
            );
            assert_eq!(
                evaluate_access(Some(&s), &method, GateMode::AllMethods, now),
                AccessDecision::Granted
            );
        }
    }

    #[test]
    fn active_subscription_grants_mutations() {
        let now = Utc::now();
        let s = state(
            AccountType::Artist,
            Some("active"),
            Some(now + Duration::days(20)),
            None,
        );
        assert_eq!(
            evaluate_access(Some(&s), &Method::POST, GateMode::Mutations, now),
            AccessDecision::Granted
        );
    }

    #[test]
    fn active_status_with_expired_period_is_lapsed() {
        let now = Utc::now();
        let s = state(
            AccountType::Artist,
            Some("active"),
            Some(now - Duration::days(1)),
            None,
        );
        assert_eq!(
            evaluate_access(Some(&s), &Method::POST, GateMode::Mutations, now),
            AccessDecision::Denied
        );
    }

    #[test]
    fn active_trial_grants_without_subscription() {
        let now = Utc::now();
        let s = state(AccountType::Artist, None, None, Some(now + Duration::days(3)));
        assert_eq!(
            evaluate_access(Some(&s), &Method::PUT, GateMode::Mutations, now),
            AccessDecision::Granted
        );
    }

    #[test]
    fn lapsed_reads_degrade_instead_of_deny() {
        let now = Utc::now();
        let s = state(AccountType::Label, Some("past_due"), None, None);
        assert_eq!(
            evaluate_access(Some(&s), &Method::GET, GateMode::Mutations, now),
            AccessDecision::ReadOnly
        );
        assert_eq!(
            evaluate_access(Some(&s), &Method::PATCH, GateMode::Mutations, now),
            AccessDecision::Denied
        );
    }

    #[test]
    fn strict_mode_blocks_reads_too() {
        let now = Utc::now();
        let s = state(AccountType::Manager, Some("canceled"), None, None);
        assert_eq!(
            evaluate_access(Some(&s), &Method::GET, GateMode::AllMethods, now),
            AccessDecision::Denied
        );
    }

    #[test]
    fn missing_account_has_no_access() {
        let now = Utc::now();
        assert_eq!(
            evaluate_access(None, &Method::POST, GateMode::Mutations, now),
            AccessDecision::Denied
        );
        assert_eq!(
            evaluate_access(None, &Method::GET, GateMode::Mutations, now),
            AccessDecision::ReadOnly
        );
    }
}

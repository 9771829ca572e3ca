pub mod account;
pub mod store;

pub mod models {
    pub mod account;
}

pub use models::account::{AccountType, PaymentOutcome, SubscriptionFields, SubscriptionState, UserAccount};
pub use store::{AccountStore, PgAccountStore};

pub mod access;

pub mod middleware {
    pub mod auth;
    pub mod subscription;
}

#[cfg(test)]
mod middleware_tests;

pub use access::{AccessDecision, GateMode, evaluate_access};
pub use middleware::auth::AuthMiddleware;
pub use middleware::subscription::SubscriptionGate;

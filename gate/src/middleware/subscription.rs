//! Subscription-aware authorization, applied after authentication.
//!
//! Loads the caller's stored subscription fields and maps the request
//! to allow / read-only / deny per [`evaluate_access`]. A store
//! failure is a hard 500 (`SUBSCRIPTION_VERIFY_FAILED`); the gate
//! never fails open.

use std::{future::Future, pin::Pin, sync::Arc};

use actix_web::{
    Error,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use chrono::Utc;
use common::{error::AppError, jwt};
use db::store::AccountStore;
use futures::future::{Ready, ok};

use crate::access::{AccessDecision, GateMode, evaluate_access};

pub struct SubscriptionGate {
    store: Arc<dyn AccountStore>,
    mode: GateMode,
    upgrade_url: String,
}

impl SubscriptionGate {
    /// Default gate: mutations require access, reads always pass once
    /// authenticated.
    pub fn mutations(store: Arc<dyn AccountStore>, upgrade_url: String) -> Self {
        SubscriptionGate {
            store,
            mode: GateMode::Mutations,
            upgrade_url,
        }
    }

    /// Premium-only gate: every method requires access.
    pub fn strict(store: Arc<dyn AccountStore>, upgrade_url: String) -> Self {
        SubscriptionGate {
            store,
            mode: GateMode::AllMethods,
            upgrade_url,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SubscriptionGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Transform = SubscriptionGateService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(SubscriptionGateService {
            service: Arc::new(service),
            store: self.store.clone(),
            mode: self.mode,
            upgrade_url: self.upgrade_url.clone(),
        })
    }
}

pub struct SubscriptionGateService<S> {
    service: Arc<S>,
    store: Arc<dyn AccountStore>,
    mode: GateMode,
    upgrade_url: String,
}

impl<S, B> Service<ServiceRequest> for SubscriptionGateService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = Arc::clone(&self.service);
        let store = self.store.clone();
        let mode = self.mode;
        let upgrade_url = self.upgrade_url.clone();

        Box::pin(async move {
            let Some(principal) = jwt::principal(&req) else {
                return Ok(req.error_response(AppError::AuthHeaderInvalid));
            };

            let state = match store.subscription_state(principal.user_id).await {
                Ok(state) => state,
                Err(e) => {
                    log::error!(
                        "Subscription lookup failed for {}: {}",
                        principal.user_id,
                        e
                    );
                    return Ok(req.error_response(AppError::SubscriptionVerifyFailed));
                }
            };

            match evaluate_access(state.as_ref(), req.method(), mode, Utc::now()) {
                AccessDecision::Granted | AccessDecision::ReadOnly => {
                    srv.call(req).await.map(|res| res.map_into_boxed_body())
                }
                AccessDecision::Denied => {
                    Ok(req.error_response(AppError::SubscriptionRequired { upgrade_url }))
                }
            }
        })
    }
}

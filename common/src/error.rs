use actix_web::HttpResponse;
use serde_json::{Value, json};
use thiserror::Error;

pub type Res<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    // === CONVERSION ERRORS ===
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Stripe error: {0}")]
    Stripe(#[from] stripe::StripeError),

    // === APPLICATION ERRORS ===
    #[error("Missing or invalid authorization header")]
    AuthHeaderInvalid,

    #[error("Request validation failed")]
    Validation(Vec<String>),

    #[error("An active subscription or trial is required for this action")]
    SubscriptionRequired { upgrade_url: String },

    #[error("Endpoint not found: {0}")]
    NotFound(String),

    #[error("Webhook signature verification failed")]
    WebhookSignatureInvalid,

    #[error("Unable to verify subscription status")]
    SubscriptionVerifyFailed,

    #[error("Failed to create checkout session: {0}")]
    CheckoutSessionFailed(String),

    /// Required configuration absent at request time. Carries the
    /// machine code directly, e.g. `STRIPE_CONFIG_ERROR`.
    #[error("Server configuration error")]
    Config(&'static str),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code. Clients key behavior off this,
    /// not off the human message, so these strings are part of the
    /// API contract.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Jwt(_) => "AUTH_HEADER_INVALID",
            AppError::Stripe(_) => "STRIPE_ERROR",
            AppError::AuthHeaderInvalid => "AUTH_HEADER_INVALID",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::SubscriptionRequired { .. } => "SUBSCRIPTION_REQUIRED",
            AppError::NotFound(_) => "ENDPOINT_NOT_FOUND",
            AppError::WebhookSignatureInvalid => "WEBHOOK_SIGNATURE_INVALID",
            AppError::SubscriptionVerifyFailed => "SUBSCRIPTION_VERIFY_FAILED",
            AppError::CheckoutSessionFailed(_) => "CHECKOUT_SESSION_FAILED",
            AppError::Config(code) => code,
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            AppError::Validation(issues) => Some(json!({ "issues": issues })),
            AppError::SubscriptionRequired { upgrade_url } => {
                Some(json!({ "upgrade_url": upgrade_url }))
            }
            _ => None,
        }
    }

    fn envelope(&self, message: &str) -> Value {
        let mut error = json!({ "message": message, "code": self.code() });
        if let Some(details) = self.details() {
            error["details"] = details;
        }
        json!({ "success": false, "error": error })
    }

    pub fn to_http_response(&self) -> HttpResponse {
        let is_dev = cfg!(debug_assertions);

        // Dependency failures keep their message out of production
        // responses; the specific code still identifies the dependency.
        let internal_message = |err_msg: &str| {
            if is_dev {
                err_msg.to_string()
            } else {
                "Internal server error".to_string()
            }
        };

        match self {
            // === CONVERSION ERRORS ===
            AppError::Database(error) => {
                log::error!("Database error: {}", error);
                HttpResponse::InternalServerError()
                    .json(self.envelope(&internal_message(&error.to_string())))
            }
            AppError::Jwt(error) => {
                log::debug!("JWT validation failed: {}", error);
                HttpResponse::Unauthorized().json(self.envelope(&self.to_string()))
            }
            AppError::Stripe(error) => {
                log::error!("Stripe error: {}", error);
                HttpResponse::InternalServerError()
                    .json(self.envelope(&internal_message(&error.to_string())))
            }

            // === APPLICATION ERRORS ===
            AppError::AuthHeaderInvalid => {
                HttpResponse::Unauthorized().json(self.envelope(&self.to_string()))
            }
            AppError::Validation(_) => {
                HttpResponse::BadRequest().json(self.envelope(&self.to_string()))
            }
            AppError::SubscriptionRequired { .. } => {
                HttpResponse::Forbidden().json(self.envelope(&self.to_string()))
            }
            AppError::NotFound(_) => {
                HttpResponse::NotFound().json(self.envelope(&self.to_string()))
            }
            AppError::WebhookSignatureInvalid => {
                HttpResponse::BadRequest().json(self.envelope(&self.to_string()))
            }
            AppError::SubscriptionVerifyFailed => {
                HttpResponse::InternalServerError().json(self.envelope(&self.to_string()))
            }
            AppError::CheckoutSessionFailed(reason) => {
                log::error!("Checkout session failed: {}", reason);
                HttpResponse::InternalServerError().json(self.envelope(&self.to_string()))
            }
            AppError::Config(code) => {
                log::error!("Configuration error: {}", code);
                HttpResponse::InternalServerError().json(self.envelope(&self.to_string()))
            }
            AppError::Internal(error) => {
                log::error!("Internal error: {}", error);
                HttpResponse::InternalServerError().json(self.envelope(&internal_message(error)))
            }
        }
    }
}

impl actix_web::ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        self.to_http_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(AppError::AuthHeaderInvalid.code(), "AUTH_HEADER_INVALID");
        assert_eq!(AppError::Validation(vec![]).code(), "VALIDATION_ERROR");
        assert_eq!(
            AppError::SubscriptionRequired {
                upgrade_url: String::new()
            }
            .code(),
            "SUBSCRIPTION_REQUIRED"
        );
        assert_eq!(AppError::NotFound("x".into()).code(), "ENDPOINT_NOT_FOUND");
        assert_eq!(
            AppError::WebhookSignatureInvalid.code(),
            "WEBHOOK_SIGNATURE_INVALID"
        );
        assert_eq!(
            AppError::SubscriptionVerifyFailed.code(),
            "SUBSCRIPTION_VERIFY_FAILED"
        );
        assert_eq!(
            AppError::Config("STRIPE_CONFIG_ERROR").code(),
            "STRIPE_CONFIG_ERROR"
        );
    }

    #[test]
    fn validation_envelope_carries_issues() {
        let err = AppError::Validation(vec!["price_id is required".to_string()]);
        let body = err.envelope(&err.to_string());
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["details"]["issues"][0], "price_id is required");
    }

    #[test]
    fn subscription_required_envelope_carries_upgrade_url() {
        let err = AppError::SubscriptionRequired {
            upgrade_url: "https://app.example.com/upgrade".to_string(),
        };
        let body = err.envelope(&err.to_string());
        assert_eq!(
            body["error"]["details"]["upgrade_url"],
            "https://app.example.com/upgrade"
        );
    }
}

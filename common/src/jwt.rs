use actix_web::{HttpMessage, dev::ServiceRequest};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    env_config::JwtConfig,
    error::{AppError, Res},
};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtClaims {
    /// The subject: the account id.
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

/// The authenticated caller, derived from a validated bearer token and
/// attached to request extensions by the auth middleware.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    /// The raw claim set, kept for downstream handlers that need
    /// provider-specific claims.
    pub claims: Value,
}

impl From<JwtClaims> for Principal {
    fn from(claims: JwtClaims) -> Self {
        let raw = serde_json::to_value(&claims).unwrap_or(Value::Null);
        Principal {
            user_id: claims.sub,
            email: claims.email,
            claims: raw,
        }
    }
}

pub struct ClaimsSpec {
    pub user_id: Uuid,
    pub email: String,
}

/// Generates a JWT token based on the claims spec and JWT configuration.
pub fn generate_jwt(spec: ClaimsSpec, config: &JwtConfig) -> Res<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(config.expiration_hours))
        .expect("valid timestamp")
        .timestamp();

    let claims = JwtClaims {
        sub: spec.user_id,
        email: spec.email,
        exp: expiration as usize,
    };

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(AppError::from)
}

/// Extracts the claims object from a JWT token.
/// Requires the JWT secret.
pub fn validate_jwt(token: &str, secret: &str) -> Res<JwtClaims> {
    let token_data = jsonwebtoken::decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Reads the principal the auth middleware attached to this request,
/// if any.
pub fn principal(req: &ServiceRequest) -> Option<Principal> {
    req.extensions().get::<Principal>().cloned()
}

//! Access-token handling.
//!
//! Session issuance lives in the (external) auth service; this server only *verifies*. Tokens are HS256 JWTs signed
//! with a shared secret. The claims carry the principal's user id, display name, granted roles and — for agent
//! principals — the agent id their coupon partition is derived from. Handlers never trust identities from request
//! bodies; the verified claims are the only source.

use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use boutique_payment_engine::db_types::Role;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The principal's user id.
    pub sub: i64,
    pub name: String,
    pub roles: Vec<Role>,
    /// Set on agent principals only; resolves the coupon partition server-side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<i64>,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

impl JwtClaims {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    /// The audit-trail identity recorded on admin decisions.
    pub fn audit_id(&self) -> String {
        format!("{}#{}", self.name, self.sub)
    }
}

/// Handlers take `claims: JwtClaims` as an argument; the value is placed in the request extensions by the JWT
/// middleware, so reaching a handler without claims means the route was registered outside the auth scope — a
/// server wiring bug, reported as such.
impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req
            .extensions()
            .get::<JwtClaims>()
            .cloned()
            .ok_or_else(|| ServerError::Unspecified("No claims in request extensions".to_string()));
        ready(claims)
    }
}

/// Validates a bearer token and returns the embedded claims. Expiry is checked by `jsonwebtoken` itself.
pub fn validate_access_token(token: &str, config: &AuthConfig) -> Result<JwtClaims, AuthError> {
    let key = DecodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
    let validation = Validation::default();
    let data = decode::<JwtClaims>(token, &key, &validation)
        .map_err(|e| AuthError::ValidationError(e.to_string()))?;
    Ok(data.claims)
}

/// Issues access tokens. The production issuer is the external auth service holding the same secret; this type
/// exists for the endpoint tests and operator tooling.
pub struct TokenIssuer {
    key: EncodingKey,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self { key: EncodingKey::from_secret(config.jwt_secret.reveal().as_bytes()) }
    }

    pub fn issue_token(
        &self,
        sub: i64,
        name: &str,
        roles: Vec<Role>,
        agent_id: Option<i64>,
        valid_for: Option<Duration>,
    ) -> Result<String, AuthError> {
        let valid_for = valid_for.unwrap_or_else(|| Duration::hours(24));
        let claims = JwtClaims {
            sub,
            name: name.to_string(),
            roles,
            agent_id,
            exp: (Utc::now() + valid_for).timestamp(),
        };
        encode(&Header::default(), &claims, &self.key).map_err(|e| AuthError::ValidationError(e.to_string()))
    }
}

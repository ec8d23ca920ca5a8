//! Bearer-token authentication middleware.
//!
//! Extracts the `Authorization: Bearer <jwt>` header, validates the HS256 signature and expiry, and places the
//! [`JwtClaims`] into the request extensions for handlers and the ACL middleware downstream. Requests without a
//! valid token never reach the wrapped service.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
    HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::{debug, trace};

use crate::{
    auth::{validate_access_token, JwtClaims},
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

pub struct JwtMiddlewareFactory {
    auth: AuthConfig,
}

impl JwtMiddlewareFactory {
    pub fn new(auth: AuthConfig) -> Self {
        Self { auth }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = JwtMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtMiddlewareService { auth: self.auth.clone(), service: Rc::new(service) }))
    }
}

pub struct JwtMiddlewareService<S> {
    auth: AuthConfig,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let auth = self.auth.clone();
        Box::pin(async move {
            let claims = extract_claims(&req, &auth).map_err(|e| {
                debug!("🔐️ Rejecting request to {}: {e}", req.path());
                Error::from(ServerError::AuthenticationError(e))
            })?;
            trace!("🔐️ Authenticated {} (user {})", claims.name, claims.sub);
            req.extensions_mut().insert(claims);
            service.call(req).await
        })
    }
}

fn extract_claims(req: &ServiceRequest, auth: &AuthConfig) -> Result<JwtClaims, AuthError> {
    let header = req.headers().get("Authorization").ok_or(AuthError::MissingToken)?;
    let header = header.to_str().map_err(|e| AuthError::PoorlyFormattedToken(e.to_string()))?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::PoorlyFormattedToken("expected a Bearer token".to_string()))?;
    validate_access_token(token.trim(), auth)
}

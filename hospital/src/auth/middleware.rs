//! Axum extractors for authentication.
//!
//! ```rust,ignore
//! async fn list_rooms(Authenticated(principal): Authenticated) -> Result<Json<_>, AppError> {
//!     principal.require(Capability::ViewRooms)?;
//!     ...
//! }
//! ```

use super::{IdentityError, IdentityProvider, Principal};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use medbay_web::AppError;
use std::sync::Arc;

/// Bearer token extracted from `Authorization: Bearer <token>` header.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("Missing authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .ok_or_else(|| {
                AppError::unauthorized("Invalid authorization format. Expected 'Bearer <token>'")
            })?;
        if token.is_empty() {
            return Err(AppError::unauthorized("Empty bearer token"));
        }

        Ok(Self(token.to_string()))
    }
}

/// The identity provider as router state.
#[derive(Clone)]
pub struct Identity(pub Arc<dyn IdentityProvider>);

/// Caller resolved from the bearer token. Handlers taking this reject
/// anonymous requests with 401.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
    Identity: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;
        let Identity(provider) = Identity::from_ref(state);

        match provider.resolve(&token).await {
            Ok(principal) => {
                tracing::debug!(role = %principal.role, "Request authenticated");
                Ok(Self(principal))
            }
            Err(IdentityError::Unknown) => Err(AppError::unauthorized("Invalid bearer token")),
            Err(IdentityError::Expired) => Err(AppError::unauthorized("Session expired")),
            Err(err @ IdentityError::Backend(_)) => {
                Err(AppError::internal("Session validation failed").with_source(err.into()))
            }
        }
    }
}

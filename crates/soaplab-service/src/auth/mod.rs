//! Bearer-credential authentication and the admin authorization gate.
//!
//! The gate walks `no credential → invalid credential → missing profile →
//! non-admin role → authorized` on every mutating request and stops at the
//! first rejection. Nothing about the decision is cached.

mod cache;
mod identity;

pub use cache::{AuthEvent, ProfileCache};
pub use identity::{IdentityError, IdentityResolver, SupabaseIdentityResolver};

use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header::AUTHORIZATION, request::Parts};
use tracing::{debug, warn};

use crate::AppState;
use crate::errors::{ApiError, AuthError};
use crate::models::{Identity, Profile};
use crate::repositories::ProfileRepository;

/// An identity whose profile carries the admin role.
#[derive(Debug, Clone)]
pub struct AdminPrincipal {
    pub identity: Identity,
    pub profile: Profile,
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_credential(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?;
    let value = value.to_str().map_err(|_| AuthError::InvalidCredential)?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or(AuthError::InvalidCredential)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::InvalidCredential);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::InvalidCredential);
    }
    Ok(token)
}

pub async fn authenticate<I: IdentityResolver>(
    resolver: &I,
    headers: &HeaderMap,
) -> Result<Identity, AuthError> {
    let credential = bearer_credential(headers)?;

    resolver
        .resolve_identity(credential)
        .await
        .map_err(|err| match err {
            IdentityError::Rejected => AuthError::InvalidCredential,
            IdentityError::Unavailable(reason) => AuthError::IdentityUnavailable(reason),
        })
}

pub async fn authorize_admin<I: IdentityResolver, P: ProfileRepository>(
    resolver: &I,
    profiles: &P,
    headers: &HeaderMap,
) -> Result<AdminPrincipal, AuthError> {
    let identity = authenticate(resolver, headers).await?;

    let Some(profile) = profiles.find_by_user_id(identity.user_id).await? else {
        warn!(
            user_id = %identity.user_id,
            "Authenticated user has no profile record"
        );
        return Err(AuthError::ProfileMissing(identity.user_id));
    };

    if !profile.is_admin() {
        debug!(user_id = %identity.user_id, role = %profile.role, "Admin role required");
        return Err(AuthError::Forbidden(identity.user_id));
    }

    Ok(AdminPrincipal { identity, profile })
}

/// Handler argument that only exists for admins.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AdminPrincipal);

impl<S: AppState> FromRequestParts<S> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let principal = authorize_admin(state.identity(), state.profiles(), &parts.headers).await?;
        Ok(AdminUser(principal))
    }
}

/// Handler argument for any signed-in user.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Identity);

impl<S: AppState> FromRequestParts<S> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = authenticate(state.identity(), &parts.headers).await?;
        Ok(AuthenticatedUser(identity))
    }
}

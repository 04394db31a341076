use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde::Serialize;

use crate::auth::TokenError;
use crate::error::AppError;
use crate::state::AppState;
use crate::types::{Role, User};

/// The authenticated caller: the live account behind a verified session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        match self.role {
            Role::Admin => true,
            Role::User => false,
        }
    }

    /// User id reads must be restricted to, or `None` when the caller may see everything.
    pub fn visible_user_id(&self) -> Option<i64> {
        match self.role {
            Role::Admin => None,
            Role::User => Some(self.id),
        }
    }
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self { id: user.id, username: user.username.clone(), role: user.role }
    }
}

/// Handlers behind [`require_auth`] extract the caller directly.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthenticated("Authentication required".to_string()))
    }
}

/// Returns the token of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Verifies the session token and attaches the caller to the request.
///
/// The account is re-read on every request: deleted accounts are rejected and
/// role changes apply immediately, not at token expiry. The caller is
/// mirrored onto the response extensions so outer layers (the security log)
/// can attribute the outcome.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, AppError> {
    let claims = {
        let token = bearer_token(req.headers())
            .ok_or_else(|| AppError::Unauthenticated("Missing authorization token".to_string()))?;
        state.tokens.verify(token).map_err(|e| {
            tracing::debug!("Rejected session token: {}", e);
            match e {
                TokenError::Expired => AppError::Unauthenticated("Token expired".to_string()),
                _ => AppError::Unauthenticated("Invalid token".to_string()),
            }
        })?
    };

    let account = state.store.find_user(claims.user_id).await?.ok_or_else(|| {
        tracing::debug!(user_id = claims.user_id, "Session token for a deleted account");
        AppError::Unauthenticated("Invalid token".to_string())
    })?;
    let user = AuthUser::from(&account);
    req.extensions_mut().insert(user.clone());
    let mut res = next.run(req).await;
    res.extensions_mut().insert(user);
    Ok(res)
}

/// Admits only admins. Must run inside [`require_auth`].
pub async fn require_admin(req: Request, next: Next) -> Result<Response, AppError> {
    let role = req
        .extensions()
        .get::<AuthUser>()
        .map(|u| u.role)
        .ok_or_else(|| AppError::Unauthenticated("Authentication required".to_string()))?;
    match role {
        Role::Admin => Ok(next.run(req).await),
        Role::User => Err(AppError::Forbidden("Admin access required".to_string())),
    }
}

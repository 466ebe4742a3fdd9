//! Session authentication middleware.
//!
//! Resolves the caller from the `session` cookie or a Bearer token and stores
//! a [`Caller`] in the request extensions. The middleware never rejects a
//! request itself: the payment callback must always end in a redirect, so
//! each handler decides what an anonymous caller means for it.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::Response,
};

use storefront_repo::security::hash_session_token;
use storefront_types::{
    AppError, CallbackError, PaymentGateway, PaymentLock, StorefrontRepository, UserId,
};

use super::handlers::AppState;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session";

/// Who sent the request, as far as the session store knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    Anonymous,
    User(UserId),
    /// The session store could not be queried.
    Unresolved,
}

impl Caller {
    /// The signed-in user, for JSON endpoints.
    pub fn require(self) -> Result<UserId, AppError> {
        match self {
            Caller::User(user_id) => Ok(user_id),
            Caller::Anonymous => Err(AppError::Unauthorized(
                "Missing or expired session".into(),
            )),
            Caller::Unresolved => Err(AppError::Internal("Session lookup failed".into())),
        }
    }

    /// The signed-in user, if any, for the payment callback.
    pub fn for_callback(self) -> Result<Option<UserId>, CallbackError> {
        match self {
            Caller::User(user_id) => Ok(Some(user_id)),
            Caller::Anonymous => Ok(None),
            Caller::Unresolved => Err(CallbackError::ServerError),
        }
    }
}

/// Extracts the token from "Bearer <token>".
fn extract_bearer(auth_header: Option<&str>) -> Option<&str> {
    auth_header?.strip_prefix("Bearer ").map(str::trim)
}

/// Finds `name` in a `Cookie` header value.
fn extract_cookie<'a>(cookie_header: Option<&'a str>, name: &str) -> Option<&'a str> {
    cookie_header?.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then_some(value.trim())
    })
}

/// Session token from the Authorization header, falling back to the cookie.
fn session_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = extract_bearer(
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok()),
    );
    bearer
        .or_else(|| {
            extract_cookie(
                headers.get(header::COOKIE).and_then(|v| v.to_str().ok()),
                SESSION_COOKIE,
            )
        })
        .filter(|token| !token.is_empty())
}

/// Authentication middleware that resolves session tokens.
///
/// This middleware:
/// 1. Extracts the session token from the Authorization header or cookie
/// 2. Hashes it using SHA-256
/// 3. Looks up an unexpired session with that hash
/// 4. Inserts the resulting [`Caller`] for the handlers
pub async fn auth_middleware<R, G>(
    State(state): State<Arc<AppState<R, G>>>,
    mut request: Request<Body>,
    next: Next,
) -> Response
where
    R: StorefrontRepository + PaymentLock,
    G: PaymentGateway,
{
    // Hash before awaiting so no borrow of the request is held.
    let token_hash = session_token(request.headers()).map(hash_session_token);

    let caller = match token_hash {
        None => Caller::Anonymous,
        Some(token_hash) => match state.service.repo().find_session(&token_hash).await {
            Ok(Some(session)) => Caller::User(session.user_id),
            Ok(None) => Caller::Anonymous,
            Err(e) => {
                tracing::error!("Session lookup failed: {}", e);
                Caller::Unresolved
            }
        },
    };

    request.extensions_mut().insert(caller);
    next.run(request).await
}

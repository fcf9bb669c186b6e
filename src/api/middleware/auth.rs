//! Caller identification middleware.
//!
//! Resolves the request to a [`Principal`] and injects an [`AuthContext`]
//! extension. Identification order:
//! 1. `x-api-key` header, checked in constant time against the configured
//!    service key hash;
//! 2. `Authorization: Bearer <token>`, resolved through the session
//!    directory;
//! 3. neither header present: the caller proceeds as `Anonymous`.
//!
//! A *presented but invalid* credential is rejected here with 401; it
//! never silently downgrades to anonymous. Per-route requirements beyond
//! identification (ownership, authenticated-only routes) live in the
//! handlers.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{verify_service_key, ApiContext, AuthContext, Principal};

pub async fn authenticate(req: Request<axum::body::Body>, next: Next) -> Response {
    match authenticate_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn authenticate_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let api_key = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let bearer = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);

    let principal = if let Some(key) = api_key {
        let valid = ctx
            .config
            .service_key_hash
            .as_ref()
            .map(|hash| verify_service_key(hash, &key))
            .unwrap_or(false);
        if !valid {
            tracing::warn!("service key rejected");
            return Err(ApiError::Unauthorized);
        }
        Principal::Service
    } else if let Some(token) = bearer {
        match ctx.sessions.resolve(&token) {
            Some(user) => Principal::User(user.user_id),
            None => return Err(ApiError::Unauthorized),
        }
    } else {
        Principal::Anonymous
    };

    req.extensions_mut().insert(AuthContext { principal });
    Ok(next.run(req).await)
}

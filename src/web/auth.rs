//! # Bearer Token Authentication
//!
//! Access tokens are opaque strings stored in `access_tokens`. A request is
//! authenticated by `Authorization: Bearer <token>`; the token's scope list
//! decides whether the request method is permitted.

use axum::http::{HeaderMap, Method};
use sqlx::PgPool;
use tracing::debug;

use crate::models::AccessToken;
use crate::web::errors::{ApiError, ApiResult};

pub const READ_SCOPE: &str = "read";
pub const WRITE_SCOPE: &str = "write";

/// Scope a request method needs: reads for safe methods, writes otherwise
pub fn required_scope(method: &Method) -> &'static str {
    if method == Method::GET || method == Method::HEAD || method == Method::OPTIONS {
        READ_SCOPE
    } else {
        WRITE_SCOPE
    }
}

/// Token from an `Authorization: Bearer ...` header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

/// Resolve the request's token and check it carries the scope for `method`
pub async fn authorize_request(pool: &PgPool, headers: &HeaderMap, method: &Method) -> ApiResult<AccessToken> {
    let token = extract_bearer_token(headers).ok_or(ApiError::NotAuthenticated)?;
    let access_token = AccessToken::authenticate(pool, token)
        .await?
        .ok_or(ApiError::NotAuthenticated)?;

    let scope = required_scope(method);
    if !access_token.has_scope(scope) {
        debug!(user_id = access_token.user_id, scope = scope, "Token lacks required scope");
        return Err(ApiError::PermissionDenied);
    }

    Ok(access_token)
}

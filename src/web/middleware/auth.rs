//! # Authentication Middleware
//!
//! Applied to every `/datastore` route. The authenticated [`AccessToken`] is
//! placed in request extensions for handlers that need the caller.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

use crate::models::AccessToken;
use crate::web::auth::authorize_request;
use crate::web::errors::ApiError;
use crate::web::state::AppState;

pub async fn require_token(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token: AccessToken = authorize_request(&state.pool, request.headers(), request.method())
        .await
        .map_err(|e| {
            warn!(
                method = %request.method(),
                path = %request.uri().path(),
                error = %e,
                "Rejected API request"
            );
            e
        })?;

    request.extensions_mut().insert(token);
    Ok(next.run(request).await)
}

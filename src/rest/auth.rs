// rest/auth.rs — bearer-credential middleware.
//
// Runs before every task handler: verifies the Authorization header and
// injects the Principal into request extensions. Rejection happens here,
// before any Task Service call.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use crate::rest::error::ApiError;
use crate::AppContext;

pub async fn require_bearer(
    State(ctx): State<Arc<AppContext>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let principal = ctx.verifier.verify_header(header).map_err(|e| {
        debug!(reason = e.reason(), "rejected request credential");
        ApiError::Auth(e)
    })?;

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

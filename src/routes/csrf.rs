// ============================================================================
// CSRF Routes
// ============================================================================
//
// - GET /csrf/token: issue (or reuse) a token, set it as a cookie
// - POST /csrf/check: protected diagnostic endpoint; reaching it means the
//   gate allowed the request
//
// ============================================================================

use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, HeaderValue},
    response::IntoResponse,
    Extension, Json,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::context::AppContext;
use crate::csrf::token::unix_now;
use crate::csrf::{AllowReason, CookieContext, TokenCodec};
use crate::error::AppError;

/// A cookie token closer than this to expiry is replaced instead of reused
const MIN_REUSE_REMAINING_SECS: u64 = 60;

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub csrf_token: String,
    /// Seconds until the token leaves its freshness window
    pub expires_in: u64,
}

/// GET /csrf/token
/// Returns a CSRF token and sets it as a cookie
///
/// A still-valid token already held in the cookie is returned again rather
/// than minting a new one, unless it is about to leave its window.
pub async fn get_csrf_token(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let codec = ctx.gate.codec();
    let cookie_name = &ctx.config.csrf.cookie_name;
    let now = unix_now();

    let reused = cookie_value(&headers, cookie_name).and_then(|t| reusable_token(codec, t, now));

    let (token, issued_at) = match reused {
        Some(existing) => {
            tracing::debug!("Reusing CSRF token from cookie");
            existing
        }
        None => {
            let token = codec.issue_at(now);
            let issued_at = token.issued_at();
            (token.into_string(), issued_at)
        }
    };

    let remaining = remaining_secs(codec, issued_at, now);
    let attributes = ctx
        .cookies
        .attributes_for(CookieContext::token().with_max_age(Duration::from_secs(remaining)));
    let cookie_value = attributes.header_value(cookie_name, &token);

    let mut response = Json(TokenResponse {
        csrf_token: token,
        expires_in: remaining,
    })
    .into_response();

    let header_value = HeaderValue::from_str(&cookie_value)
        .map_err(|_| AppError::internal("CSRF cookie is not a valid header value"))?;
    response.headers_mut().insert(SET_COOKIE, header_value);

    Ok(response)
}

/// POST /csrf/check
pub async fn check_csrf(reason: Option<Extension<AllowReason>>) -> impl IntoResponse {
    let reason = reason.map(|Extension(r)| r.code()).unwrap_or("unchecked");
    Json(json!({
        "status": "ok",
        "reason": reason,
    }))
}

fn remaining_secs(codec: &TokenCodec, issued_at: u64, now: u64) -> u64 {
    codec.ttl_secs().saturating_sub(now.saturating_sub(issued_at))
}

/// The cookie's token with its issue time, if it verifies and has life left
fn reusable_token(codec: &TokenCodec, token: String, now: u64) -> Option<(String, u64)> {
    let valid = codec.verify_at(&token, now).ok()?;
    let min_remaining = MIN_REUSE_REMAINING_SECS.min(codec.ttl_secs() / 2);
    if remaining_secs(codec, valid.issued_at, now) < min_remaining {
        return None;
    }
    Some((token, valid.issued_at))
}

/// Read a cookie by name from the Cookie header(s)
fn cookie_value(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let prefix = format!("{}=", cookie_name);
    headers
        .get_all("cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .map(str::trim)
        .find_map(|cookie| cookie.strip_prefix(&prefix))
        .map(|value| value.to_string())
        .filter(|value| !value.is_empty())
}
